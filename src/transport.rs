use log::{debug, info};
use rppal::i2c::I2c;

use crate::config::{ControllerConfig, TransportKind};
use crate::error::{Error, Result};
use crate::packet;

/// Register the GrovePi firmware reads command packets from.
const GROVEPI_COMMAND_REGISTER: u8 = 1;

/// Byte-level conduit to the I/O expander.
pub trait TransportPort: Send {
    fn write(&mut self, packet: u32) -> Result<()>;
}

impl<T: TransportPort + ?Sized> TransportPort for Box<T> {
    fn write(&mut self, packet: u32) -> Result<()> {
        (**self).write(packet)
    }
}

pub struct I2cTransport {
    i2c: I2c,
}

impl I2cTransport {
    pub fn new(bus: u8, address: u16) -> Result<Self> {
        let mut i2c = I2c::with_bus(bus).map_err(|e| Error::TransportOpen(format!("i2c bus {bus}: {e}")))?;
        i2c.set_slave_address(address)
            .map_err(|e| Error::TransportConfigure(format!("address {address:#04x}: {e}")))?;

        info!("GrovePi transport opened on I2C bus {}, address {:#04x}", bus, address);
        Ok(I2cTransport { i2c })
    }
}

impl TransportPort for I2cTransport {
    fn write(&mut self, packet: u32) -> Result<()> {
        self.i2c
            .block_write(GROVEPI_COMMAND_REGISTER, &packet.to_le_bytes())
            .map_err(|e| Error::TransportWrite(e.to_string()))
    }
}

/// Dry-run backend that only logs what would have been sent.
#[derive(Default)]
pub struct LogTransport;

impl TransportPort for LogTransport {
    fn write(&mut self, raw: u32) -> Result<()> {
        let p = packet::decode(raw);
        debug!("packet cmd={} target={} data1={} data2={}", p.command, p.target, p.data1, p.data2);
        Ok(())
    }
}

pub fn open(config: &ControllerConfig) -> Result<Box<dyn TransportPort>> {
    match config.transport {
        TransportKind::I2c => Ok(Box::new(I2cTransport::new(config.i2c_bus, config.device_address)?)),
        TransportKind::Log => {
            info!("Using log-only transport, no packets reach the expander");
            Ok(Box::new(LogTransport))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_transport_never_fails() {
        let mut t: Box<dyn TransportPort> = Box::new(LogTransport);
        assert!(t.write(packet::encode(4, 5, 10, 0)).is_ok());
    }
}
