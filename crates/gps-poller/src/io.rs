use chrono::NaiveDateTime;

use crate::diag::StatusRecord;

/// Byte-oriented bus to the receiver (I2C on real hardware).
pub trait Transport {
    type Error;

    /// Non-blocking bounded read; returns however many bytes are available,
    /// possibly zero.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;
}

/// Local real-time clock, UTC.
pub trait Rtc {
    type Error;

    fn now(&self) -> NaiveDateTime;

    fn set(&mut self, t: NaiveDateTime) -> Result<(), Self::Error>;

    /// Whether the clock was synchronized externally (e.g. NTP) before the
    /// engine started. Consulted once, at construction.
    fn synced(&self) -> bool;
}

/// Receives the periodic status snapshot. Durable storage, rotation, and any
/// console echo are the sink's business.
pub trait LogSink {
    fn log_state(&mut self, record: &StatusRecord<'_>);
}

impl LogSink for () {
    fn log_state(&mut self, _record: &StatusRecord<'_>) {}
}
