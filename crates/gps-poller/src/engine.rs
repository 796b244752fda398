//! The synchronous protocol engine, driven by one external polling loop.
//!
//! Each [`Engine::step`] performs one bounded bus read, frames and dispatches
//! every complete sentence it produced, pumps the command queue, and emits
//! the periodic status snapshot. No malformed input or unresponsive receiver
//! ever halts a step; only transport failures propagate, and those belong to
//! the outer loop.

use core::time::Duration;

use chrono::{NaiveDateTime, TimeDelta};
use heapless::Vec;
use misc::cr_stream::{CrStream, trim_newlines};
use nmea::checksum::{self, Checked};
use nmea::messages::{Gll, Rmc, gll, rmc, zda};

use crate::diag::{Diagnostics, KEY_LEN, StatusRecord, Trunc, trunc_format};
use crate::fix::FixState;
use crate::io::{LogSink, Rtc, Transport};
use crate::queue::{Command, CommandQueue};
use crate::timesync::{ClockSync, TimeSyncMode};

/// One bus read per tick, sized to the receiver's transfer window.
pub const READ_CHUNK: usize = 255;

const STREAM_CAP: usize = 1024;
const MAX_SENTENCE: usize = 128;

/// Chunks above this are counted separately; a steady run of them means the
/// poll interval is not keeping up with the receiver's output rate.
const LARGE_BUF_THRESHOLD: usize = 55;

/// Receiver setup sent once at startup, ahead of any configured extras.
/// These literal bodies are part of the receiver compatibility contract.
pub fn baseline_commands() -> [Command; 10] {
    [
        // Report intervals per sentence type.
        Command::new("$PMTK314,1,1,1,1,1,1,0,0,0,0,0,0,0,0,0,0,0,1,0"),
        // Query report intervals.
        Command::with_ack("$PMTK414", "$PMTK514"),
        // Coordinate decimal precision.
        Command::with_ack("$PQPREC,W,6,6,3,1", "$PQPREC,W,"),
        // Text messages on.
        Command::with_ack("$PQTXT,W,1,1", "$PQTXT,W,"),
        // Velocity reporting on.
        Command::with_ack("$PQVEL,W,1,1", "$PQVEL,W,"),
        // Return link messages on.
        Command::with_ack("$PQRLM,W,1,1", "$PQRLM,W,"),
        // EASY orbit prediction on.
        Command::new("$PMTK869,1,1"),
        // GPS + GLONASS + Galileo constellations.
        Command::new("$PMTK353,1,1,1,1,0"),
        // SBAS DGPS mode.
        Command::new("$PMTK301,2"),
        // Search for SBAS satellites.
        Command::new("$PMTK313,1"),
    ]
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub log_interval_secs: u32,
    /// Appended after the baseline sequence.
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub extra_cmds: Vec<Command, 8>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_interval_secs: 10,
            extra_cmds: Vec::new(),
        }
    }
}

pub struct Engine<T, R, L> {
    transport: T,
    rtc: R,
    log: L,
    log_interval: TimeDelta,
    next_log_at: NaiveDateTime,
    buf: CrStream<STREAM_CAP>,
    read_count: u32,
    queue: CommandQueue,
    sync: ClockSync,
    fix: FixState,
    diag: Diagnostics,
}

impl<T: Transport, R: Rtc, L: LogSink> Engine<T, R, L> {
    pub fn new(transport: T, rtc: R, log: L, cfg: Config) -> Self {
        let sync = ClockSync::new(TimeSyncMode::from_rtc(&rtc));
        let mut queue = CommandQueue::new();
        for cmd in baseline_commands() {
            let _ = queue.enqueue(cmd);
        }
        for cmd in &cfg.extra_cmds {
            let _ = queue.enqueue(cmd.clone());
        }
        let log_interval = TimeDelta::seconds(cfg.log_interval_secs as i64);
        let next_log_at = rtc.now() + log_interval;
        Self {
            transport,
            rtc,
            log,
            log_interval,
            next_log_at,
            buf: CrStream::new(),
            read_count: 0,
            queue,
            sync,
            fix: FixState::new(),
            diag: Diagnostics::new(),
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    pub fn fix(&self) -> &FixState {
        &self.fix
    }

    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    pub fn mode(&self) -> TimeSyncMode {
        self.sync.mode()
    }

    pub fn read_count(&self) -> u32 {
        self.read_count
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn rtc(&self) -> &R {
        &self.rtc
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// One polling tick. Returns a hint for how long the caller should
    /// sleep before the next tick; zero after an idle read.
    pub fn step(&mut self) -> Result<Duration, T::Error> {
        self.read_count += 1;
        let now = self.rtc.now();

        let mut chunk = [0u8; READ_CHUNK];
        let n = self.transport.read(&mut chunk)?;
        let chunk = trim_newlines(&chunk[..n]);

        if chunk.len() > self.diag.max_buf_len {
            self.diag.max_buf_len = chunk.len();
        }
        if chunk.len() > LARGE_BUF_THRESHOLD {
            self.diag.last_large_buf = self.read_count;
            self.diag.count_large_buf += 1;
        }

        // A less-than-full read means the receiver's output buffer has
        // drained enough to accept commands.
        if chunk.len() < READ_CHUNK - 1 {
            self.queue.pump(&mut self.transport, now)?;
            self.queue
                .on_tick(&mut self.transport, now, self.read_count, &mut self.diag)?;
        }

        if chunk.is_empty() {
            return Ok(Duration::ZERO);
        }
        self.diag.last_read_bytes = chunk.len();

        if !self.buf.push(chunk) {
            self.diag.record(
                "buf_overflow",
                self.read_count,
                format_args!("dropping {} buffered bytes", self.buf.len()),
            );
            self.buf.clear();
            let _ = self.buf.push(chunk);
        }

        loop {
            let popped = self
                .buf
                .pop()
                .map(|raw| Vec::<u8, MAX_SENTENCE>::from_slice(raw).map_err(|_| raw.len()));
            let Some(popped) = popped else {
                break;
            };
            let pkt = match popped {
                Ok(pkt) => pkt,
                Err(len) => {
                    self.diag.record(
                        "decode_err",
                        self.read_count,
                        format_args!("oversize sentence ({len} bytes)"),
                    );
                    continue;
                }
            };
            if pkt.len() > self.diag.max_pkt_len {
                self.diag.max_pkt_len = pkt.len();
            }
            match core::str::from_utf8(&pkt) {
                Ok(s) if s.is_ascii() => self.handle_sentence(s, now)?,
                _ => self.diag.record(
                    "decode_err",
                    self.read_count,
                    format_args!("non-ascii sentence ({} bytes)", pkt.len()),
                ),
            }
        }

        if now >= self.next_log_at {
            self.next_log_at = now + self.log_interval;
            self.log.log_state(&StatusRecord {
                time: StatusRecord::timestamp(now),
                read_count: self.read_count,
                have_fix: self.fix.have_fix,
                queue_len: self.queue.len(),
                fix: &self.fix,
                state: &self.diag,
            });
        }

        Ok(if self.queue.is_empty() {
            Duration::from_millis(100)
        } else {
            Duration::from_millis(10)
        })
    }

    /// Checksum gate, ack matcher, then family dispatch.
    fn handle_sentence(&mut self, pkt: &str, now: NaiveDateTime) -> Result<(), T::Error> {
        match checksum::check(pkt) {
            Ok(Checked::Valid) => (),
            Ok(Checked::NotChecksummed) => return Ok(()),
            Err(nmea::Error::MalformedChecksum) => {
                self.diag.record(
                    "split_err",
                    self.read_count,
                    format_args!("split failed: {pkt}"),
                );
                return Ok(());
            }
            Err(nmea::Error::ChecksumMismatch { expected, actual }) => {
                self.diag.record(
                    "chkerr",
                    self.read_count,
                    format_args!("skipping invalid checksum {actual:02x} != {expected:02x}: [{pkt}]"),
                );
                return Ok(());
            }
            Err(_) => return Ok(()),
        }

        // Acks ride the same sentence stream; a consumed ack is still
        // dispatched below so it shows up in the observable state.
        self.queue.on_sentence(pkt, &mut self.transport, now)?;
        self.dispatch(pkt);
        Ok(())
    }

    /// Stores every sentence under its leading token, with validity or
    /// sequence suffixes disambiguating the RMC/GLL/GSV families.
    fn dispatch(&mut self, pkt: &str) {
        let token = match pkt.split_once(',') {
            Some((token, _)) => token,
            None => pkt,
        };
        let mut key: heapless::String<KEY_LEN> = trunc_format(format_args!("{token}"));

        if token.len() == 6 {
            let suffix = match &token[3..] {
                "RMC" => {
                    self.handle_rmc(pkt);
                    pkt.split(',').nth(2)
                }
                "GLL" => {
                    self.handle_gll(pkt);
                    pkt.split(',').nth(6)
                }
                "ZDA" => {
                    self.handle_zda(pkt);
                    None
                }
                // Multi-part satellite view: keep each part, parse none.
                "GSV" => pkt.split(',').nth(2),
                _ => None,
            };
            if let Some(suffix) = suffix {
                use core::fmt::Write;
                let _ = write!(Trunc(&mut key), "-{suffix}");
            }
        }

        self.diag.store_sentence(&key, pkt);
    }

    fn handle_rmc(&mut self, pkt: &str) {
        match rmc(pkt) {
            Ok(Rmc::Void) => self.fix.clear("rmc", self.read_count, &mut self.diag),
            Ok(Rmc::Fix(data)) => {
                if data.pos.is_none() {
                    self.diag.record(
                        "parse_ll_fix_error",
                        self.read_count,
                        format_args!("error parsing position: {pkt}"),
                    );
                }
                self.sync.consider(
                    data.date,
                    data.time,
                    "rmc",
                    !self.queue.is_empty(),
                    &mut self.rtc,
                    self.read_count,
                    &mut self.diag,
                );
                self.fix
                    .set(data.pos, data.time, self.read_count, &mut self.diag);
            }
            Err(_) => self.diag.record(
                "parse_rmc_fail",
                self.read_count,
                format_args!("failed to parse: {pkt}"),
            ),
        }
    }

    fn handle_gll(&mut self, pkt: &str) {
        match gll(pkt) {
            Ok(Gll::Void) => self.fix.clear("gll", self.read_count, &mut self.diag),
            Ok(Gll::Fix { pos, time }) => {
                if pos.is_none() {
                    self.diag.record(
                        "parse_ll_fix_error",
                        self.read_count,
                        format_args!("error parsing position: {pkt}"),
                    );
                }
                self.fix.set(pos, time, self.read_count, &mut self.diag);
            }
            Err(_) => self.diag.record(
                "parse_gll_fail",
                self.read_count,
                format_args!("failed to parse: {pkt}"),
            ),
        }
    }

    fn handle_zda(&mut self, pkt: &str) {
        match zda(pkt) {
            Ok(data) => self.sync.consider(
                data.date,
                data.time,
                "zda",
                !self.queue.is_empty(),
                &mut self.rtc,
                self.read_count,
                &mut self.diag,
            ),
            Err(_) => self.diag.record(
                "parse_zda_fail",
                self.read_count,
                format_args!("failed to parse: {pkt}"),
            ),
        }
    }
}
