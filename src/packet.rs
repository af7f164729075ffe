//! Fixed-format command packet understood by the GrovePi expander.
//!
//! A packet is four bytes sent least significant first:
//!
//! | bits   | field   |
//! |--------|---------|
//! | 0..8   | command |
//! | 8..16  | target  |
//! | 16..24 | data1   |
//! | 24..32 | data2   |

pub const ANALOG_WRITE: u8 = 4;
pub const PIN_MODE: u8 = 5;

/// `data1` value for [`PIN_MODE`] selecting output direction.
pub const MODE_OUTPUT: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet {
    pub command: u8,
    pub target: u8,
    pub data1: u8,
    pub data2: u8,
}

impl Packet {
    pub fn analog_write(pin: u8, level: u8) -> Self {
        Packet { command: ANALOG_WRITE, target: pin, data1: level, data2: 0 }
    }

    pub fn pin_mode(pin: u8, output: bool) -> Self {
        Packet { command: PIN_MODE, target: pin, data1: if output { MODE_OUTPUT } else { 0 }, data2: 0 }
    }

    pub fn to_u32(self) -> u32 {
        encode(self.command, self.target, self.data1, self.data2)
    }

    pub fn from_u32(raw: u32) -> Self {
        decode(raw)
    }
}

pub fn encode(command: u8, target: u8, data1: u8, data2: u8) -> u32 {
    u32::from_le_bytes([command, target, data1, data2])
}

pub fn decode(raw: u32) -> Packet {
    let [command, target, data1, data2] = raw.to_le_bytes();
    Packet { command, target, data1, data2 }
}
