//! Protocol engine for an NMEA GNSS receiver on a byte-oriented bus.
//!
//! One [`engine::Engine`] instance owns the whole pipeline: framing the
//! receiver's sentence stream, checksum verification, RMC/GLL/ZDA dispatch,
//! the outbound configuration command queue with ack/timeout/retry, the fix
//! state machine, and the clock-sync policy that reconciles GPS time against
//! the local RTC. The bus and RTC are injected capabilities ([`io::Transport`],
//! [`io::Rtc`]), so the engine is deterministic under test.

#![no_std]

pub mod diag;
pub mod engine;
pub mod fix;
pub mod io;
pub mod queue;
pub mod timesync;

pub use engine::{Config, Engine};
