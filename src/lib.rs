//! Ramps two PWM outputs on a GrovePi expander toward operator-selected rates.
//!
//! A timer worker runs the ramp update every logical tick and sends the
//! levels over I2C; the foreground reads operator lines from stdin.

pub mod config;
pub mod error;
pub mod interpreter;
pub mod logger;
pub mod packet;
pub mod ramp;
pub mod scheduler;
pub mod status;
pub mod supervisor;
pub mod transport;
