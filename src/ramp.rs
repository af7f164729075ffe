//! Per-channel ramp state and the periodic update that drives the PWM outputs.
//!
//! The state is shared between the timer worker and the foreground command
//! loop, so every access goes through [`lock`]. A tick copies what it has to
//! send while holding the lock and performs the transport writes after
//! releasing it.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::WIRE_MAX_LEVEL;
use crate::error::{Error, Result};
use crate::packet::Packet;
use crate::transport::TransportPort;

pub const CHANNELS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Channel {
    #[default]
    Channel1,
    Channel2,
}

impl Channel {
    pub fn index(self) -> usize {
        match self {
            Channel::Channel1 => 0,
            Channel::Channel2 => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelState {
    pub output_level: u16,
    pub requested_rate: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ControlState {
    pub channels: [ChannelState; CHANNELS],
    pub active: Channel,
}

impl ControlState {
    pub fn levels(&self) -> [u16; CHANNELS] {
        [self.channels[0].output_level, self.channels[1].output_level]
    }
}

pub type SharedState = Arc<Mutex<ControlState>>;

/// Locks the shared state, recovering it if a holder panicked.
///
/// Every update leaves the state consistent, so a poisoned guard is still
/// safe to use and shutdown must be able to zero the outputs regardless.
pub fn lock(state: &Mutex<ControlState>) -> MutexGuard<'_, ControlState> {
    state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Returns `rate` if it lies in `[-max_rate, max_rate]`, otherwise 0.
pub fn coerce_rate(rate: i32, max_rate: i32) -> i32 {
    if (-max_rate..=max_rate).contains(&rate) { rate } else { 0 }
}

pub fn saturate(level: i32, max_level: u16) -> u16 {
    level.clamp(0, max_level as i32) as u16
}

/// Level after one logical period, with the rate re-checked against stale input.
pub fn advance(current: ChannelState, max_level: u16, max_rate: i32) -> u16 {
    let rate = coerce_rate(current.requested_rate, max_rate);
    saturate((current.output_level as i32).saturating_add(rate), max_level)
}

pub struct RampController<T: TransportPort> {
    state: SharedState,
    transport: Mutex<T>,
    pins: [u8; CHANNELS],
    max_level: u16,
    max_rate: i32,
}

impl<T: TransportPort> RampController<T> {
    pub fn new(state: SharedState, transport: T, pins: [u8; CHANNELS], max_level: u16, max_rate: i32) -> Self {
        RampController { state, transport: Mutex::new(transport), pins, max_level, max_rate }
    }

    pub fn state(&self) -> SharedState {
        Arc::clone(&self.state)
    }

    pub fn pins(&self) -> [u8; CHANNELS] {
        self.pins
    }

    /// One logical update: sends the levels committed by the previous tick,
    /// then the next levels become current. Output therefore lags the ramp
    /// by exactly one period.
    pub fn tick(&self) -> Result<()> {
        let sent = {
            let mut state = lock(&self.state);
            let previous = state.levels();
            for channel in state.channels.iter_mut() {
                channel.output_level = advance(*channel, self.max_level, self.max_rate);
            }
            previous
        };
        self.transmit(sent)
    }

    /// Sets both pins to output mode on the expander.
    pub fn configure_outputs(&self) -> Result<()> {
        let mut transport = self.lock_transport();
        for pin in self.pins {
            transport
                .write(Packet::pin_mode(pin, true).to_u32())
                .map_err(|e| Error::TransportConfigure(format!("pin {pin} mode: {e}")))?;
        }
        Ok(())
    }

    /// Forces both channels to zero, rates included, and sends the zeroed levels.
    pub fn zero_outputs(&self) -> Result<()> {
        {
            let mut state = lock(&self.state);
            for channel in state.channels.iter_mut() {
                *channel = ChannelState::default();
            }
        }
        self.transmit([0; CHANNELS])
    }

    /// Writes one packet per channel. Both writes are attempted even if the
    /// first fails; the first error is returned.
    fn transmit(&self, levels: [u16; CHANNELS]) -> Result<()> {
        let mut transport = self.lock_transport();
        let mut outcome = Ok(());
        for (pin, level) in self.pins.into_iter().zip(levels) {
            let wire_level = level.min(WIRE_MAX_LEVEL) as u8;
            let result = transport.write(Packet::analog_write(pin, wire_level).to_u32());
            if outcome.is_ok() {
                outcome = result;
            }
        }
        outcome
    }

    fn lock_transport(&self) -> MutexGuard<'_, T> {
        self.transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
