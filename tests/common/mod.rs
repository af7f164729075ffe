//! Recording transport for integration tests.
//!
//! Keeps every packet it was asked to send, including failed attempts, so
//! tests can assert on the full bus history without a GrovePi attached.

use pwmctl::error::{Error, Result};
use pwmctl::packet::{self, ANALOG_WRITE, Packet};
use pwmctl::transport::TransportPort;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
pub struct RecordingTransport {
    pub sent: Arc<Mutex<Vec<u32>>>,
    pub failing: Arc<AtomicBool>,
}

#[allow(dead_code)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let t = Self::default();
        t.failing.store(true, Ordering::SeqCst);
        t
    }

    pub fn packets(&self) -> Vec<Packet> {
        self.sent.lock().unwrap().iter().map(|&raw| packet::decode(raw)).collect()
    }

    /// Levels sent with ANALOG_WRITE to `pin`, in order.
    pub fn levels_for(&self, pin: u8) -> Vec<u8> {
        self.packets()
            .into_iter()
            .filter(|p| p.command == ANALOG_WRITE && p.target == pin)
            .map(|p| p.data1)
            .collect()
    }
}

impl TransportPort for RecordingTransport {
    fn write(&mut self, raw: u32) -> Result<()> {
        self.sent.lock().unwrap().push(raw);
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::TransportWrite("simulated bus error".into()))
        } else {
            Ok(())
        }
    }
}
