use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_I2C_BUS: u8 = 1;
pub const DEFAULT_DEVICE_ADDRESS: u16 = 0x04;
pub const DEFAULT_MAX_LEVEL: u16 = 255;
pub const DEFAULT_MAX_RATE: i32 = 5;
pub const DEFAULT_HARDWARE_TICK_MS: u64 = 2;
pub const DEFAULT_LOGICAL_TICK_MS: u64 = 10;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_CHANNEL_PINS: [u8; 2] = [5, 6];

/// Highest level the expander's 8-bit payload can carry.
pub const WIRE_MAX_LEVEL: u16 = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    I2c,
    Log,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub transport: TransportKind,
    pub i2c_bus: u8,
    pub device_address: u16,
    pub max_level: u16,
    pub max_rate: i32,
    pub hardware_tick_ms: u64,
    pub logical_tick_ms: u64,
    pub initial_delay_ms: u64,
    pub channel_pins: [u8; 2],
    pub status_port: Option<u16>,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            transport: TransportKind::I2c,
            i2c_bus: DEFAULT_I2C_BUS,
            device_address: DEFAULT_DEVICE_ADDRESS,
            max_level: DEFAULT_MAX_LEVEL,
            max_rate: DEFAULT_MAX_RATE,
            hardware_tick_ms: DEFAULT_HARDWARE_TICK_MS,
            logical_tick_ms: DEFAULT_LOGICAL_TICK_MS,
            initial_delay_ms: DEFAULT_INITIAL_DELAY_MS,
            channel_pins: DEFAULT_CHANNEL_PINS,
            status_port: None,
        }
    }
}

impl ControllerConfig {
    pub fn load(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("reading {path}: {e}")))?;
        let loaded: ControllerConfig = serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("parsing {path}: {e}")))?;
        Ok(loaded)
    }

    pub fn save(&self, path: &str) -> io::Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }

    /// Checks level and rate bounds. Timing is checked by [`Self::ticks_per_update`].
    pub fn validate(&self) -> Result<()> {
        if self.max_level == 0 || self.max_level > 256 {
            return Err(Error::Config(format!("max_level {} not in 1..=256", self.max_level)));
        }
        if !(0..=DEFAULT_MAX_RATE).contains(&self.max_rate) {
            return Err(Error::Config(format!("max_rate {} not in 0..={}", self.max_rate, DEFAULT_MAX_RATE)));
        }
        if self.channel_pins[0] == self.channel_pins[1] {
            return Err(Error::Config(format!("both channels use pin {}", self.channel_pins[0])));
        }
        Ok(())
    }

    /// Hardware ticks per logical tick (5 for a 2ms tick and a 10ms update).
    pub fn ticks_per_update(&self) -> Result<u32> {
        if self.hardware_tick_ms == 0 {
            return Err(Error::TimerArm("hardware tick interval is zero".into()));
        }
        if self.logical_tick_ms == 0 || self.logical_tick_ms % self.hardware_tick_ms != 0 {
            return Err(Error::TimerArm(format!(
                "logical tick {}ms is not a multiple of hardware tick {}ms",
                self.logical_tick_ms, self.hardware_tick_ms
            )));
        }
        u32::try_from(self.logical_tick_ms / self.hardware_tick_ms)
            .map_err(|_| Error::TimerArm("logical tick too long".into()))
    }

    pub fn hardware_tick(&self) -> Duration {
        Duration::from_millis(self.hardware_tick_ms)
    }

    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }
}
