mod common;

use common::RecordingTransport;
use pwmctl::interpreter::{CommandInterpreter, parse_line};
use pwmctl::ramp::{ControlState, RampController, lock};
use std::sync::{Arc, Mutex};
use std::thread;

fn controller(transport: &RecordingTransport, max_level: u16) -> RampController<RecordingTransport> {
    let state = Arc::new(Mutex::new(ControlState::default()));
    RampController::new(state, transport.clone(), [5, 6], max_level, 5)
}

#[test]
fn nine_ticks_at_rate_five_reach_45() {
    let transport = RecordingTransport::new();
    let ramp = controller(&transport, 255);
    let interp = CommandInterpreter::new(ramp.state(), 5);
    assert!(interp.apply(parse_line("CTL1", 5)));
    assert!(interp.apply(parse_line("5", 5)));

    for _ in 0..9 {
        ramp.tick().unwrap();
    }
    assert_eq!(lock(&ramp.state()).levels(), [45, 0]);

    ramp.tick().unwrap();
    assert_eq!(transport.levels_for(5).last(), Some(&45));
    assert_eq!(lock(&ramp.state()).levels(), [50, 0]);
    assert!(transport.levels_for(6).iter().all(|&l| l == 0));
}

#[test]
fn ramps_up_then_down_with_one_period_lag() {
    let transport = RecordingTransport::new();
    let ramp = controller(&transport, 255);
    let interp = CommandInterpreter::new(ramp.state(), 5);
    interp.apply(parse_line("3", 5));
    for _ in 0..3 {
        ramp.tick().unwrap();
    }
    interp.apply(parse_line("-5", 5));
    for _ in 0..3 {
        ramp.tick().unwrap();
    }
    assert_eq!(transport.levels_for(5), vec![0, 3, 6, 9, 4, 0]);
    assert_eq!(lock(&ramp.state()).levels(), [0, 0]);
}

#[test]
fn saturates_at_max_level() {
    let transport = RecordingTransport::new();
    let ramp = controller(&transport, 255);
    {
        let state = ramp.state();
        let mut state = lock(&state);
        state.channels[0].output_level = 250;
        state.channels[0].requested_rate = 5;
    }
    ramp.tick().unwrap();
    assert_eq!(lock(&ramp.state()).channels[0].output_level, 255);
    ramp.tick().unwrap();
    assert_eq!(lock(&ramp.state()).channels[0].output_level, 255);
}

#[test]
fn each_channel_sends_its_own_level() {
    let transport = RecordingTransport::new();
    let ramp = controller(&transport, 255);
    let interp = CommandInterpreter::new(ramp.state(), 5);
    interp.run(["2", "CTL2", "5"].map(|s| Ok(s.to_string())));
    for _ in 0..4 {
        ramp.tick().unwrap();
    }
    assert_eq!(transport.levels_for(5), vec![0, 2, 4, 6]);
    assert_eq!(transport.levels_for(6), vec![0, 5, 10, 15]);
}

#[test]
fn failing_bus_keeps_ramping() {
    let transport = RecordingTransport::failing();
    let ramp = controller(&transport, 255);
    CommandInterpreter::new(ramp.state(), 5).apply(parse_line("4", 5));
    for _ in 0..5 {
        assert!(ramp.tick().is_err());
    }
    assert_eq!(lock(&ramp.state()).channels[0].output_level, 20);
    assert_eq!(transport.packets().len(), 10);
}

#[test]
fn interleaved_ticks_and_input_stay_consistent() {
    let transport = RecordingTransport::new();
    let ramp = Arc::new(controller(&transport, 255));
    let interp = CommandInterpreter::new(ramp.state(), 5);

    // Only ticks change levels, so the levels read just before a tick are the
    // ones that tick must send.
    let ticker = {
        let ramp = Arc::clone(&ramp);
        thread::spawn(move || {
            let mut committed = Vec::with_capacity(1000);
            for _ in 0..1000 {
                committed.push(lock(&ramp.state()).levels());
                let _ = ramp.tick();
            }
            committed
        })
    };
    let inputs = ["5", "CTL2", "-5", "3", "CTL1", "-2", "9", "junk", "4", "CTL2", "5"];
    for i in 0..1000 {
        interp.apply(parse_line(inputs[i % inputs.len()], 5));
    }
    let committed = ticker.join().unwrap();

    let state = ramp.state();
    let state = lock(&state);
    assert!(state.levels().iter().all(|&l| l <= 255));

    for (index, pin) in [5u8, 6].into_iter().enumerate() {
        let levels = transport.levels_for(pin);
        let expected: Vec<u8> = committed.iter().map(|l| l[index] as u8).collect();
        assert_eq!(levels, expected, "pin {pin} sent a level no tick committed");
        assert_eq!(levels[0], 0);
        for pair in levels.windows(2) {
            let step = pair[1] as i32 - pair[0] as i32;
            assert!(step.abs() <= 5, "pin {pin} jumped {} -> {}", pair[0], pair[1]);
        }
    }
}
