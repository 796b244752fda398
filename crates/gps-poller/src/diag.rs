//! Bounded observability state.
//!
//! Each sentence key and error category keeps only its most recent value plus
//! an occurrence counter, in fixed-capacity maps; once a map is full, new
//! categories are dropped rather than evicting old ones. The periodic
//! [`StatusRecord`] snapshot is the engine's entire user-visible failure
//! surface: nothing in the pipeline escalates a malformed sentence or an
//! unresponsive receiver beyond these entries.

use core::fmt::{self, Write};

use chrono::{Datelike, NaiveDateTime, Timelike};
use heapless::{FnvIndexMap, String};

pub const KEY_LEN: usize = 24;
pub const MSG_LEN: usize = 120;

/// `fmt::Write` that drops what does not fit instead of erroring.
pub(crate) struct Trunc<'a, const N: usize>(pub &'a mut String<N>);

impl<const N: usize> Write for Trunc<'_, N> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for c in s.chars() {
            if self.0.push(c).is_err() {
                break;
            }
        }
        Ok(())
    }
}

pub(crate) fn trunc_format<const N: usize>(args: fmt::Arguments<'_>) -> String<N> {
    let mut s = String::new();
    let _ = Trunc(&mut s).write_fmt(args);
    s
}

/// `YYYY-MM-DD HH:MM:SS.mmm` without pulling in chrono's alloc formatting.
pub(crate) struct Stamp(pub NaiveDateTime);

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (d, t) = (self.0.date(), self.0.time());
        write!(
            f,
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
            d.year(),
            d.month(),
            d.day(),
            t.hour(),
            t.minute(),
            t.second(),
            t.nanosecond() / 1_000_000,
        )
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Default, Debug, serde::Serialize)]
pub struct Diagnostics {
    /// Last verbatim sentence per dispatch key (e.g. `$GNRMC-A`).
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    sentences: FnvIndexMap<String<KEY_LEN>, String<MSG_LEN>, 32>,
    /// Last message per error category, stamped with the read counter.
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    last_errors: FnvIndexMap<String<KEY_LEN>, String<MSG_LEN>, 16>,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    counters: FnvIndexMap<String<KEY_LEN>, u32, 16>,

    pub max_buf_len: usize,
    pub max_pkt_len: usize,
    pub last_read_bytes: usize,
    /// Read counter at the last chunk larger than the large-buffer
    /// threshold, and how often that happened; sizing aids for the bus.
    pub last_large_buf: u32,
    pub count_large_buf: u32,
    pub clock_drift_secs: Option<i64>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a recoverable error: overwrites the category's last message
    /// and bumps its counter.
    pub fn record(&mut self, category: &str, read_count: u32, msg: fmt::Arguments<'_>) {
        let key: String<KEY_LEN> = trunc_format(format_args!("{category}"));
        let entry: String<MSG_LEN> = trunc_format(format_args!("@{read_count}: {msg}"));
        let count = self.counters.get(&key).copied().unwrap_or(0) + 1;
        let _ = self.last_errors.insert(key.clone(), entry);
        let _ = self.counters.insert(key, count);
    }

    /// Last-seen-per-category contract: every dispatched sentence overwrites
    /// its key's entry verbatim.
    pub fn store_sentence(&mut self, key: &str, pkt: &str) {
        let key: String<KEY_LEN> = trunc_format(format_args!("{key}"));
        let val: String<MSG_LEN> = trunc_format(format_args!("{pkt}"));
        let _ = self.sentences.insert(key, val);
    }

    pub fn count(&self, category: &str) -> u32 {
        let key: String<KEY_LEN> = trunc_format(format_args!("{category}"));
        self.counters.get(&key).copied().unwrap_or(0)
    }

    pub fn last_error(&self, category: &str) -> Option<&str> {
        let key: String<KEY_LEN> = trunc_format(format_args!("{category}"));
        self.last_errors.get(&key).map(|s| s.as_str())
    }

    pub fn last_sentence(&self, key: &str) -> Option<&str> {
        let key: String<KEY_LEN> = trunc_format(format_args!("{key}"));
        self.sentences.get(&key).map(|s| s.as_str())
    }
}

/// Periodic snapshot handed to the [`crate::io::LogSink`].
#[derive(Debug, serde::Serialize)]
pub struct StatusRecord<'a> {
    /// Local clock at snapshot time, `YYYY-MM-DD HH:MM:SS UTC`.
    pub time: String<28>,
    pub read_count: u32,
    pub have_fix: bool,
    pub queue_len: usize,
    pub fix: &'a crate::fix::FixState,
    pub state: &'a Diagnostics,
}

impl StatusRecord<'_> {
    pub(crate) fn timestamp(now: NaiveDateTime) -> String<28> {
        let (d, t) = (now.date(), now.time());
        trunc_format(format_args!(
            "{:04}-{:02}-{:02} {:02}:{:02}:{:02} UTC",
            d.year(),
            d.month(),
            d.day(),
            t.hour(),
            t.minute(),
            t.second(),
        ))
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use crate::diag::*;

    #[test]
    fn record_overwrites_and_counts() {
        let mut diag = Diagnostics::new();
        assert_eq!(diag.count("chkerr"), 0);
        assert_eq!(diag.last_error("chkerr"), None);

        diag.record("chkerr", 3, format_args!("first"));
        diag.record("chkerr", 9, format_args!("second"));
        assert_eq!(diag.count("chkerr"), 2);
        assert_eq!(diag.last_error("chkerr"), Some("@9: second"));
    }

    #[test]
    fn store_sentence_keeps_latest() {
        let mut diag = Diagnostics::new();
        diag.store_sentence("$GNZDA", "$GNZDA,1*00");
        diag.store_sentence("$GNZDA", "$GNZDA,2*00");
        assert_eq!(diag.last_sentence("$GNZDA"), Some("$GNZDA,2*00"));
        assert_eq!(diag.last_sentence("$GNGLL-A"), None);
    }

    #[test]
    fn long_values_truncate() {
        let mut diag = Diagnostics::new();
        let long = core::str::from_utf8(&[b'x'; 300]).unwrap();
        diag.record("decode_err", 1, format_args!("{long}"));
        let stored = diag.last_error("decode_err").unwrap();
        assert_eq!(stored.len(), MSG_LEN);
        assert!(stored.starts_with("@1: xxx"));
    }

    #[test]
    fn timestamp_format() {
        let now = chrono::NaiveDate::from_ymd_opt(2018, 3, 28)
            .unwrap()
            .and_hms_opt(14, 23, 23)
            .unwrap();
        assert_eq!(
            StatusRecord::timestamp(now).as_str(),
            "2018-03-28 14:23:23 UTC"
        );
        assert_eq!(
            trunc_format::<32>(format_args!("{}", Stamp(now))).as_str(),
            "2018-03-28 14:23:23.000"
        );
    }
}
