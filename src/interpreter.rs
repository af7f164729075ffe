use log::{debug, info, warn};
use std::io;

use crate::ramp::{Channel, SharedState, coerce_rate, lock};

pub const EXIT_KEYWORD: &str = "exit";
pub const SELECT_CHANNEL1: &str = "CTL1";
pub const SELECT_CHANNEL2: &str = "CTL2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Exit,
    Select(Channel),
    Rate(i32),
}

/// Maps one operator line to a command. Never fails: anything that is not a
/// keyword or an in-range integer becomes a rate of 0.
pub fn parse_line(line: &str, max_rate: i32) -> Command {
    match line.trim() {
        EXIT_KEYWORD => Command::Exit,
        SELECT_CHANNEL1 => Command::Select(Channel::Channel1),
        SELECT_CHANNEL2 => Command::Select(Channel::Channel2),
        other => Command::Rate(coerce_rate(leading_int(other), max_rate)),
    }
}

/// Value of the optional sign and decimal digits at the start of `text`,
/// ignoring whatever follows ("5abc" is 5, "3.7" is 3). No digits or a
/// value beyond `i32` gives 0.
pub fn leading_int(text: &str) -> i32 {
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let mut value: i64 = 0;
    for digit in digits.bytes().take_while(u8::is_ascii_digit) {
        value = value * 10 + i64::from(digit - b'0');
        if value > i64::from(i32::MAX) + 1 {
            return 0;
        }
    }
    let value = if negative { -value } else { value };
    i32::try_from(value).unwrap_or(0)
}

pub struct CommandInterpreter {
    state: SharedState,
    max_rate: i32,
}

impl CommandInterpreter {
    pub fn new(state: SharedState, max_rate: i32) -> Self {
        CommandInterpreter { state, max_rate }
    }

    /// Applies one command. Returns `false` once the run should end.
    pub fn apply(&self, command: Command) -> bool {
        match command {
            Command::Exit => {
                info!("Exiting program...");
                return false;
            }
            Command::Select(channel) => {
                lock(&self.state).active = channel;
                info!("Active channel: {:?}", channel);
            }
            Command::Rate(rate) => {
                let mut state = lock(&self.state);
                let active = state.active;
                state.channels[active.index()].requested_rate = rate;
                debug!("{:?} rate set to {}", active, rate);
            }
        }
        true
    }

    /// Reads lines until `exit`, end of input or a read error.
    pub fn run<I>(&self, lines: I)
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut lines = lines.into_iter();
        loop {
            info!("Waiting for inputs...");
            let line = match lines.next() {
                Some(Ok(line)) => line,
                Some(Err(e)) => {
                    warn!("Input read failed, stopping: {}", e);
                    break;
                }
                None => {
                    info!("End of input, stopping");
                    break;
                }
            };
            if !self.apply(parse_line(&line, self.max_rate)) {
                break;
            }
        }
    }
}
