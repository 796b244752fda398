//! Outbound configuration commands, one in flight at a time.
//!
//! A command goes on the wire as `<body>*XX\r\n` and normally stays at the
//! head of the queue until a sentence arrives whose text starts with the
//! expected ack prefix. Timeouts force a resend of the same head, forever;
//! configuration is best-effort and an unresponsive receiver stalls the
//! queue without stalling the read loop.

use chrono::{NaiveDateTime, TimeDelta};
use heapless::{Deque, String};

use crate::diag::{Diagnostics, trunc_format};
use crate::io::Transport;

pub const CMD_LEN: usize = 72;
pub const ACK_LEN: usize = 40;
pub const QUEUE_CAP: usize = 32;

const DEFAULT_TIMEOUT_SECS: u32 = 10;

/// How a command learns it was accepted.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum Ack {
    /// Fire and forget: dequeued as soon as it is written.
    None,
    /// Expect the vendor acknowledgment `$PMTK001,<mnemonic>,3`, with the
    /// mnemonic lifted from the command body at send time.
    Default,
    /// Expect a sentence starting with this literal prefix.
    Prefix(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] String<ACK_LEN>),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Command {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub body: String<CMD_LEN>,
    pub ack: Ack,
    pub timeout_secs: u32,
}

impl Command {
    pub fn new(body: &str) -> Self {
        Self {
            body: trunc_format(format_args!("{body}")),
            ack: Ack::Default,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_ack(body: &str, prefix: &str) -> Self {
        Self {
            ack: Ack::Prefix(trunc_format(format_args!("{prefix}"))),
            ..Self::new(body)
        }
    }

    pub fn fire_and_forget(body: &str) -> Self {
        Self {
            ack: Ack::None,
            ..Self::new(body)
        }
    }
}

#[derive(Default)]
pub struct CommandQueue {
    queue: Deque<Command, QUEUE_CAP>,
    wait_for: Option<String<ACK_LEN>>,
    deadline: Option<NaiveDateTime>,
}

impl CommandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, cmd: Command) -> Result<(), Command> {
        self.queue.push_back(cmd)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// The ack prefix currently being waited on, if a command is in flight.
    pub fn in_flight(&self) -> Option<&str> {
        self.wait_for.as_deref()
    }

    /// The transport reported room to send; push the head out if nothing is
    /// in flight.
    pub fn pump<T: Transport>(
        &mut self,
        transport: &mut T,
        now: NaiveDateTime,
    ) -> Result<(), T::Error> {
        self.send_head(transport, now, false)
    }

    /// Offers an incoming checksum-valid sentence to the ack matcher.
    ///
    /// On a prefix match the head is dequeued and the next command goes out
    /// immediately; bus headroom was just demonstrated by the sentence
    /// itself. Returns whether the sentence matched.
    pub fn on_sentence<T: Transport>(
        &mut self,
        pkt: &str,
        transport: &mut T,
        now: NaiveDateTime,
    ) -> Result<bool, T::Error> {
        let Some(wait_for) = &self.wait_for else {
            return Ok(false);
        };
        if !pkt.starts_with(wait_for.as_str()) {
            return Ok(false);
        }
        self.wait_for = None;
        self.deadline = None;
        self.queue.pop_front();
        self.send_head(transport, now, false)?;
        Ok(true)
    }

    /// Deadline check; a timed-out command is re-sent without being
    /// dequeued. No backoff, no attempt cap.
    pub fn on_tick<T: Transport>(
        &mut self,
        transport: &mut T,
        now: NaiveDateTime,
        read_count: u32,
        diag: &mut Diagnostics,
    ) -> Result<(), T::Error> {
        if self.wait_for.is_none() {
            return Ok(());
        }
        let Some(deadline) = self.deadline else {
            return Ok(());
        };
        if now <= deadline {
            return Ok(());
        }
        if let Some(cmd) = self.queue.front() {
            diag.record(
                "cmd_timeout",
                read_count,
                format_args!("timeout sending {}", cmd.body),
            );
        }
        self.send_head(transport, now, true)
    }

    fn send_head<T: Transport>(
        &mut self,
        transport: &mut T,
        now: NaiveDateTime,
        force: bool,
    ) -> Result<(), T::Error> {
        if self.wait_for.is_some() && !force {
            return Ok(());
        }
        let (wire, wait_for, timeout_secs) = {
            let Some(cmd) = self.queue.front() else {
                return Ok(());
            };
            let wire: String<{ CMD_LEN + 8 }> = trunc_format(format_args!(
                "{}*{:02X}\r\n",
                cmd.body,
                nmea::checksum::checksum(&cmd.body)
            ));
            let wait_for: Option<String<ACK_LEN>> = match &cmd.ack {
                Ack::None => None,
                Ack::Prefix(prefix) => Some(prefix.clone()),
                Ack::Default => Some(trunc_format(format_args!(
                    "$PMTK001,{},3",
                    cmd.body.get(5..8).unwrap_or("")
                ))),
            };
            (wire, wait_for, cmd.timeout_secs)
        };

        transport.write(wire.as_bytes())?;
        self.deadline = Some(now + TimeDelta::seconds(timeout_secs as i64));
        match wait_for {
            Some(prefix) => self.wait_for = Some(prefix),
            None => {
                self.wait_for = None;
                self.queue.pop_front();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::string::String as StdString;
    use std::vec::Vec;

    use chrono::NaiveDate;

    use crate::queue::*;

    #[derive(Default)]
    struct FakeBus {
        writes: Vec<StdString>,
    }

    impl Transport for FakeBus {
        type Error = ();

        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, ()> {
            Ok(0)
        }

        fn write(&mut self, bytes: &[u8]) -> Result<(), ()> {
            self.writes.push(StdString::from_utf8(bytes.to_vec()).unwrap());
            Ok(())
        }
    }

    fn t(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 29)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            + TimeDelta::seconds(secs as i64)
    }

    #[test]
    fn wire_form_has_checksum_and_terminator() {
        let mut q = CommandQueue::new();
        let mut bus = FakeBus::default();
        q.enqueue(Command::with_ack("$PMTK414", "$PMTK514")).unwrap();

        q.pump(&mut bus, t(0)).unwrap();
        assert_eq!(bus.writes, ["$PMTK414*33\r\n"]);
        assert_eq!(q.in_flight(), Some("$PMTK514"));
    }

    #[test]
    fn default_ack_synthesized_from_mnemonic() {
        let mut q = CommandQueue::new();
        let mut bus = FakeBus::default();
        q.enqueue(Command::new("$PMTK313,1")).unwrap();

        q.pump(&mut bus, t(0)).unwrap();
        assert_eq!(bus.writes, ["$PMTK313,1*2E\r\n"]);
        assert_eq!(q.in_flight(), Some("$PMTK001,313,3"));
    }

    #[test]
    fn ack_match_chains_to_fire_and_forget() {
        let mut q = CommandQueue::new();
        let mut bus = FakeBus::default();
        q.enqueue(Command::with_ack("$PQTXT,W,1,1", "X")).unwrap();
        q.enqueue(Command::fire_and_forget("$PMTK301,2")).unwrap();

        q.pump(&mut bus, t(0)).unwrap();
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(q.len(), 2);

        // Unrelated sentences do not advance the queue.
        assert!(!q.on_sentence("$GNZDA,1,2", &mut bus, t(1)).unwrap());
        assert_eq!(q.len(), 2);

        // The ack dequeues the head and sends the next command without
        // waiting for another pump; fire-and-forget dequeues at send.
        assert!(q.on_sentence("X,OK*00", &mut bus, t(2)).unwrap());
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[1], "$PMTK301,2*2E\r\n");
        assert!(q.is_empty());
        assert_eq!(q.in_flight(), None);
    }

    #[test]
    fn timeout_resends_same_head() {
        let mut q = CommandQueue::new();
        let mut bus = FakeBus::default();
        let mut diag = Diagnostics::new();
        q.enqueue(Command::with_ack("$PQVEL,W,1,1", "$PQVEL,W,")).unwrap();

        q.pump(&mut bus, t(0)).unwrap();
        assert_eq!(bus.writes.len(), 1);

        // Not yet expired at exactly the deadline.
        q.on_tick(&mut bus, t(10), 5, &mut diag).unwrap();
        assert_eq!(bus.writes.len(), 1);
        assert_eq!(diag.count("cmd_timeout"), 0);

        q.on_tick(&mut bus, t(11), 6, &mut diag).unwrap();
        assert_eq!(bus.writes.len(), 2);
        assert_eq!(bus.writes[1], bus.writes[0]);
        assert_eq!(q.len(), 1);
        assert_eq!(diag.count("cmd_timeout"), 1);
        assert_eq!(diag.last_error("cmd_timeout"), Some("@6: timeout sending $PQVEL,W,1,1"));

        // The retry re-arms the deadline from the resend time.
        q.on_tick(&mut bus, t(21), 7, &mut diag).unwrap();
        assert_eq!(bus.writes.len(), 2);
        q.on_tick(&mut bus, t(22), 8, &mut diag).unwrap();
        assert_eq!(bus.writes.len(), 3);
    }

    #[cfg(feature = "defmt")]
    #[test]
    fn command_types_are_loggable() {
        fn has_format<T: defmt::Format>() {}
        has_format::<Ack>();
        has_format::<Command>();
    }

    #[test]
    fn pump_is_idempotent_while_in_flight() {
        let mut q = CommandQueue::new();
        let mut bus = FakeBus::default();
        q.enqueue(Command::new("$PMTK869,1,1")).unwrap();

        q.pump(&mut bus, t(0)).unwrap();
        q.pump(&mut bus, t(1)).unwrap();
        q.pump(&mut bus, t(2)).unwrap();
        assert_eq!(bus.writes.len(), 1);
    }
}
