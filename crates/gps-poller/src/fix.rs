use core::fmt;

use chrono::{NaiveTime, Timelike};
use heapless::String;

use crate::diag::{Diagnostics, MSG_LEN, trunc_format};

/// Two-state fix tracker fed by RMC/GLL validity flags.
///
/// `fix_start` is written only on the no-fix to fix transition, `fix_end`
/// only on the reverse; a repeated validity flag refreshes the `last_fix`
/// diagnostic and nothing else. There are no fix-quality levels.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Default, Debug, serde::Serialize)]
pub struct FixState {
    pub have_fix: bool,
    /// `(lat, lon) @ hh:mm:ss.mmm` of the sample that started the fix.
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub fix_start: Option<String<MSG_LEN>>,
    /// `<source> @ <read_count>` of the sample that ended it.
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub fix_end: Option<String<MSG_LEN>>,
}

struct Sample {
    pos: Option<(f64, f64)>,
    time: Option<NaiveTime>,
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.pos {
            Some((lat, lon)) => write!(f, "({lat:.6}, {lon:.6})")?,
            None => write!(f, "(?, ?)")?,
        }
        match self.time {
            Some(t) => write!(
                f,
                " @ {:02}:{:02}:{:02}.{:03}",
                t.hour(),
                t.minute(),
                t.second(),
                t.nanosecond() / 1_000_000
            ),
            None => write!(f, " @ ?"),
        }
    }
}

impl FixState {
    pub fn new() -> Self {
        Self::default()
    }

    /// An accepted (active) RMC/GLL sample.
    pub fn set(
        &mut self,
        pos: Option<(f64, f64)>,
        time: Option<NaiveTime>,
        read_count: u32,
        diag: &mut Diagnostics,
    ) {
        let sample = Sample { pos, time };
        if !self.have_fix {
            self.fix_start = Some(trunc_format(format_args!("{sample}")));
        }
        self.have_fix = true;
        diag.record("last_fix", read_count, format_args!("{sample}"));
    }

    /// A void RMC/GLL sample.
    pub fn clear(&mut self, source: &str, read_count: u32, diag: &mut Diagnostics) {
        if self.have_fix {
            self.have_fix = false;
            self.fix_end = Some(trunc_format(format_args!("{source} @ {read_count}")));
            diag.record("clear_fix", read_count, format_args!("{source}"));
        }
    }
}
