//! Startup and shutdown ordering around the ramp, timer and command loop.
//!
//! Startup: pin modes, then the timer. If any step fails the shutdown path
//! runs before the error is returned. Shutdown disarms the timer, zeroes and
//! transmits both outputs, then releases the transport. It runs exactly once,
//! from `shutdown` or from `Drop` if the supervisor is dropped early.

use log::{error, info, warn};
use std::io;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::ControllerConfig;
use crate::error::Result;
use crate::interpreter::CommandInterpreter;
use crate::ramp::{ControlState, RampController, SharedState};
use crate::scheduler::{PeriodicScheduler, SchedulerPhase};
use crate::transport::TransportPort;

/// Consecutive failed updates between two error reports.
pub const FAILURE_REPORT_INTERVAL: u32 = 100;

/// Tracks failed periodic writes so a dead bus shows up in the log
/// without flooding it at the update rate.
#[derive(Debug, Default)]
pub struct WriteFailureMonitor {
    consecutive: AtomicU32,
    total: AtomicU64,
}

impl WriteFailureMonitor {
    pub fn record(&self, outcome: &Result<()>) {
        match outcome {
            Ok(()) => {
                let streak = self.consecutive.swap(0, Ordering::Relaxed);
                if streak > 0 {
                    info!("Transport recovered after {} failed updates", streak);
                }
            }
            Err(e) => {
                self.total.fetch_add(1, Ordering::Relaxed);
                let streak = self.consecutive.fetch_add(1, Ordering::Relaxed) + 1;
                if streak == 1 {
                    warn!("Update write failed: {}", e);
                } else if streak % FAILURE_REPORT_INTERVAL == 0 {
                    error!("{} consecutive update writes failed, last: {}", streak, e);
                }
            }
        }
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Relaxed)
    }
}

pub struct Supervisor<T: TransportPort + 'static> {
    controller: Arc<RampController<T>>,
    scheduler: Option<PeriodicScheduler>,
    failures: Arc<WriteFailureMonitor>,
    max_rate: i32,
    shut_down: bool,
}

impl<T: TransportPort + 'static> Supervisor<T> {
    /// Takes an already opened transport and brings the controller up.
    pub fn start(config: &ControllerConfig, transport: T) -> Result<Self> {
        let state = Arc::new(Mutex::new(ControlState::default()));
        let controller = RampController::new(state, transport, config.channel_pins, config.max_level, config.max_rate);
        let mut supervisor = Supervisor {
            controller: Arc::new(controller),
            scheduler: None,
            failures: Arc::new(WriteFailureMonitor::default()),
            max_rate: config.max_rate,
            shut_down: false,
        };

        if let Err(e) = supervisor.bring_up(config) {
            error!("Startup failed: {}", e);
            if let Err(shutdown_err) = supervisor.shutdown_outputs() {
                error!("Recovery shutdown failed: {}", shutdown_err);
            }
            return Err(e);
        }
        Ok(supervisor)
    }

    fn bring_up(&mut self, config: &ControllerConfig) -> Result<()> {
        config.validate()?;
        self.controller.configure_outputs()?;
        info!("Pins {:?} set to output", self.controller.pins());

        let mut scheduler = PeriodicScheduler::from_config(config)?;
        let controller = Arc::clone(&self.controller);
        let failures = Arc::clone(&self.failures);
        scheduler.arm(move || failures.record(&controller.tick()))?;
        self.scheduler = Some(scheduler);
        Ok(())
    }

    pub fn state(&self) -> SharedState {
        self.controller.state()
    }

    pub fn failures(&self) -> Arc<WriteFailureMonitor> {
        Arc::clone(&self.failures)
    }

    pub fn scheduler_phase(&self) -> Option<SchedulerPhase> {
        self.scheduler.as_ref().map(PeriodicScheduler::phase)
    }

    /// Runs the command loop in the foreground until it terminates.
    pub fn run<I>(&self, lines: I)
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        CommandInterpreter::new(self.controller.state(), self.max_rate).run(lines);
    }

    /// Zeroes the outputs and releases the transport.
    pub fn shutdown(mut self) -> Result<()> {
        let outcome = self.shutdown_outputs();
        drop(self);
        info!("Transport released");
        outcome
    }

    fn shutdown_outputs(&mut self) -> Result<()> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        // No update may be in flight once the zeroed levels go out.
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.disarm();
        }
        let outcome = self.controller.zero_outputs();
        match &outcome {
            Ok(()) => info!("All outputs turned off"),
            Err(e) => error!("Failed to turn outputs off: {}", e),
        }
        outcome
    }
}

impl<T: TransportPort + 'static> Drop for Supervisor<T> {
    fn drop(&mut self) {
        let _ = self.shutdown_outputs();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn monitor_counts_streaks() {
        let monitor = WriteFailureMonitor::default();
        monitor.record(&Err(Error::TransportWrite("nack".into())));
        monitor.record(&Err(Error::TransportWrite("nack".into())));
        assert_eq!(monitor.consecutive(), 2);
        monitor.record(&Ok(()));
        assert_eq!(monitor.consecutive(), 0);
        assert_eq!(monitor.total(), 2);
    }
}
