//! Decides whether a GPS-derived time may correct the local RTC.
//!
//! The receiver reports time over RMC and ZDA long before its clock is
//! trustworthy (a cold receiver emits GPS week zero, 1980-01-06), and bus
//! traffic from a draining command queue skews read timing. The policy layers
//! guards in front of the RTC: no pending commands, a fully known candidate,
//! a plausible year, an untrusted local clock, and more than a minute of
//! drift. The week-zero sentinel is deliberately not special-cased; the year
//! guard is the only date filter.

use chrono::{Datelike, NaiveDate, NaiveTime, Timelike};

use crate::diag::{Diagnostics, Stamp, trunc_format};
use crate::io::Rtc;

/// Picked once at construction; never transitions while running.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TimeSyncMode {
    /// The local clock is already trustworthy; GPS time is never pushed
    /// onto it.
    Locked,
    /// The local clock is not trusted and GPS time may correct it.
    Searching,
}

impl TimeSyncMode {
    /// A battery-backed or externally synchronized RTC reads a sane year at
    /// boot; one that lost power reads its epoch default.
    pub fn from_rtc<R: Rtc>(rtc: &R) -> Self {
        if rtc.synced() || rtc.now().year() >= 1981 {
            TimeSyncMode::Locked
        } else {
            TimeSyncMode::Searching
        }
    }
}

/// Acceptable drift between GPS time and the RTC, in whole seconds.
const DRIFT_LIMIT_SECS: i64 = 60;

/// Oldest believable GPS year; anything at or below is an uninitialized
/// receiver clock.
const MIN_PLAUSIBLE_YEAR: i32 = 2010;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub struct ClockSync {
    mode: TimeSyncMode,
}

impl ClockSync {
    pub fn new(mode: TimeSyncMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> TimeSyncMode {
        self.mode
    }

    /// Evaluates one time candidate from the sentence stream.
    ///
    /// Every invocation leaves a `gps_time_<source>` diagnostic with the
    /// candidate and the local clock, accepted or not, for forensic replay.
    /// A correction carries the candidate's full sub-second precision; drift
    /// is compared in whole seconds. RTC write failures are swallowed, the
    /// next candidate simply tries again.
    pub fn consider<R: Rtc>(
        &self,
        date: NaiveDate,
        time: Option<NaiveTime>,
        source: &str,
        queue_pending: bool,
        rtc: &mut R,
        read_count: u32,
        diag: &mut Diagnostics,
    ) {
        let local = rtc.now();
        let category: heapless::String<24> = trunc_format(format_args!("gps_time_{source}"));
        diag.record(
            &category,
            read_count,
            format_args!(
                "gps time {source}: {:04}-{:02}-{:02} {time:?} rtc: {}",
                date.year(),
                date.month(),
                date.day(),
                Stamp(local),
            ),
        );

        // Extra bus activity while commands drain makes read timing jittery.
        if queue_pending {
            return;
        }
        if self.mode == TimeSyncMode::Locked {
            return;
        }
        let Some(time) = time else {
            return;
        };
        if date.year() <= MIN_PLAUSIBLE_YEAR {
            return;
        }

        let candidate = date.and_time(time);
        let whole = candidate.with_nanosecond(0).unwrap_or(candidate);
        let drift = whole.signed_duration_since(local).num_seconds().abs();
        diag.clock_drift_secs = Some(drift);

        if drift > DRIFT_LIMIT_SECS && rtc.set(candidate).is_ok() {
            diag.record(
                "rtc_set",
                read_count,
                format_args!("rtc set to {} because drift is {drift}", Stamp(candidate)),
            );
        }
    }
}
