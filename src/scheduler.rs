//! Periodic timer driving the ramp update.
//!
//! A worker thread stands in for the hardware timer interrupt: after an
//! initial delay it fires every hardware tick, and every Nth firing runs the
//! update callback. The thread sleeps on the stop channel, so disarming wakes
//! it immediately and `disarm` returns only once no update is in flight.

use log::{debug, info, warn};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::config::ControllerConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    Idle,
    Armed,
    Running,
    Disarmed,
}

/// Counts hardware firings and reports every `ticks_per_update`th one.
#[derive(Debug, Clone)]
pub struct TickDivider {
    count: u32,
    ticks_per_update: u32,
}

impl TickDivider {
    pub fn new(ticks_per_update: u32) -> Self {
        TickDivider { count: 0, ticks_per_update: ticks_per_update.max(1) }
    }

    pub fn fire(&mut self) -> bool {
        self.count = (self.count + 1) % self.ticks_per_update;
        self.count == 0
    }
}

pub struct PeriodicScheduler {
    initial_delay: Duration,
    interval: Duration,
    ticks_per_update: u32,
    phase: Arc<Mutex<SchedulerPhase>>,
    stop: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl PeriodicScheduler {
    pub fn new(initial_delay: Duration, interval: Duration, ticks_per_update: u32) -> Self {
        PeriodicScheduler {
            initial_delay,
            interval,
            ticks_per_update,
            phase: Arc::new(Mutex::new(SchedulerPhase::Idle)),
            stop: None,
            worker: None,
        }
    }

    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        Ok(Self::new(config.initial_delay(), config.hardware_tick(), config.ticks_per_update()?))
    }

    pub fn phase(&self) -> SchedulerPhase {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Starts the timer worker. On failure the scheduler stays `Idle`.
    pub fn arm<F>(&mut self, on_update: F) -> Result<()>
    where
        F: FnMut() + Send + 'static,
    {
        if self.phase() != SchedulerPhase::Idle {
            return Err(Error::TimerArm(format!("scheduler is {:?}, not Idle", self.phase())));
        }
        if self.interval.is_zero() || self.ticks_per_update == 0 {
            return Err(Error::TimerArm("zero timer interval".into()));
        }

        let (stop_tx, stop_rx) = mpsc::channel();
        let phase = Arc::clone(&self.phase);
        let (initial_delay, interval) = (self.initial_delay, self.interval);
        let divider = TickDivider::new(self.ticks_per_update);

        // Armed before spawning so the worker's switch to Running is never overwritten.
        self.set_phase(SchedulerPhase::Armed);
        let spawned = thread::Builder::new()
            .name("pwm-timer".into())
            .spawn(move || run_timer(stop_rx, initial_delay, interval, divider, phase, on_update));
        let worker = match spawned {
            Ok(worker) => worker,
            Err(e) => {
                self.set_phase(SchedulerPhase::Idle);
                return Err(Error::TimerRegistration(e));
            }
        };

        self.stop = Some(stop_tx);
        self.worker = Some(worker);
        info!(
            "Timer armed: first firing in {:?}, every {:?}, update every {} firings",
            self.initial_delay, self.interval, self.ticks_per_update
        );
        Ok(())
    }

    /// Cancels the timer and waits for the worker to exit. Terminal.
    pub fn disarm(&mut self) {
        drop(self.stop.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Timer worker panicked");
            }
            info!("Timer disarmed");
        }
        self.set_phase(SchedulerPhase::Disarmed);
    }

    fn set_phase(&self, next: SchedulerPhase) {
        *self.phase.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }
}

impl Drop for PeriodicScheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.disarm();
        }
    }
}

fn run_timer<F: FnMut()>(
    stop: mpsc::Receiver<()>,
    initial_delay: Duration,
    interval: Duration,
    mut divider: TickDivider,
    phase: Arc<Mutex<SchedulerPhase>>,
    mut on_update: F,
) {
    let mut deadline = Instant::now() + initial_delay;
    let mut running = false;

    loop {
        let timeout = deadline.saturating_duration_since(Instant::now());
        match stop.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {}
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }

        if !running {
            *phase.lock().unwrap_or_else(|p| p.into_inner()) = SchedulerPhase::Running;
            running = true;
            debug!("Timer running");
        }

        if divider.fire() {
            on_update();
        }

        // Overruns are dropped rather than replayed in a burst.
        deadline += interval;
        let now = Instant::now();
        if deadline < now {
            deadline = now + interval;
        }
    }
}
