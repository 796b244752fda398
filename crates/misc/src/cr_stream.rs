/// Fixed-capacity stream of `\r`-terminated sentences.
///
/// GNSS receivers terminate sentences with `\r\n`, but a sentence read over a
/// byte-oriented bus may be split at any point, and idle reads pad the stream
/// with stray `\n` bytes. `CrStream` accumulates chunks and yields one
/// sentence per `pop`, treating `\r\n` and a bare `\r` as the same
/// terminator. The extracted set of sentences does not depend on how the
/// input was chunked.
pub struct CrStream<const N: usize> {
    buf: [u8; N],
    begin: usize,
    end: usize,
}

/// Strips leading and trailing `\n` bytes; an idle bus pads reads with them.
pub fn trim_newlines(mut chunk: &[u8]) -> &[u8] {
    while let [b'\n', rest @ ..] = chunk {
        chunk = rest;
    }
    while let [rest @ .., b'\n'] = chunk {
        chunk = rest;
    }
    chunk
}

impl<const N: usize> Default for CrStream<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> CrStream<N> {
    pub fn new() -> Self {
        Self {
            buf: [0; N],
            begin: 0,
            end: 0,
        }
    }

    /// Appends one bus chunk, with leading/trailing `\n` bytes stripped.
    ///
    /// All-or-nothing: returns `false` and leaves the stream untouched when
    /// the stripped chunk does not fit.
    pub fn push(&mut self, chunk: &[u8]) -> bool {
        let chunk = trim_newlines(chunk);
        if chunk.is_empty() {
            return true;
        }
        if N - self.end < chunk.len() {
            self.buf.copy_within(self.begin..self.end, 0);
            self.end -= self.begin;
            self.begin = 0;
            if N - self.end < chunk.len() {
                return false;
            }
        }
        self.buf[self.end..self.end + chunk.len()].copy_from_slice(chunk);
        self.end += chunk.len();
        true
    }

    /// Extracts the next complete sentence, without its terminator.
    ///
    /// Consumes the `\r` and an immediately following `\n` when one is
    /// already buffered.
    pub fn pop(&mut self) -> Option<&[u8]> {
        let rel = self.buf[self.begin..self.end]
            .iter()
            .position(|&b| b == b'\r')?;
        let start = self.begin;
        let term = start + rel;
        self.begin = term + 1;
        if self.begin < self.end && self.buf[self.begin] == b'\n' {
            self.begin += 1;
        }
        if self.begin == self.end {
            self.begin = 0;
            self.end = 0;
            return Some(&self.buf[start..term]);
        }
        Some(&self.buf[start..term])
    }

    pub fn clear(&mut self) {
        self.begin = 0;
        self.end = 0;
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::vec::Vec;

    use crate::cr_stream::*;

    #[test]
    fn empty() {
        let mut buf = CrStream::<16>::new();
        assert!(buf.is_empty());
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn push_and_pop() {
        let mut buf = CrStream::<32>::new();

        assert!(buf.push(b"abc\r\ndef\r\n"));
        assert_eq!(buf.pop(), Some(b"abc".as_slice()));
        assert_eq!(buf.pop(), Some(b"def".as_slice()));
        assert_eq!(buf.pop(), None);

        assert!(buf.push(b"ghi\rjkl\r"));
        assert_eq!(buf.pop(), Some(b"ghi".as_slice()));
        assert_eq!(buf.pop(), Some(b"jkl".as_slice()));
        assert_eq!(buf.pop(), None);
        assert!(buf.is_empty());
    }

    #[test]
    fn partial_sentence_kept() {
        let mut buf = CrStream::<32>::new();

        assert!(buf.push(b"abcdef\rghi"));
        assert_eq!(buf.pop(), Some(b"abcdef".as_slice()));
        assert_eq!(buf.pop(), None);
        assert_eq!(buf.len(), 3);

        assert!(buf.push(b"jkl\r"));
        assert_eq!(buf.pop(), Some(b"ghijkl".as_slice()));
        assert_eq!(buf.pop(), None);
    }

    #[test]
    fn strips_chunk_newlines() {
        let mut buf = CrStream::<32>::new();

        // Idle bus reads are runs of '\n'; they vanish entirely.
        assert!(buf.push(b"\n\n\n"));
        assert!(buf.is_empty());

        // A '\n' that belongs to a terminator already consumed in a previous
        // chunk is stripped rather than prepended to the next sentence.
        assert!(buf.push(b"abc\r"));
        assert_eq!(buf.pop(), Some(b"abc".as_slice()));
        assert!(buf.push(b"\ndef\r"));
        assert_eq!(buf.pop(), Some(b"def".as_slice()));
    }

    #[test]
    fn split_invariant() {
        let stream = b"$GNZDA,142323.000,28,03,2018,,*4F\r\n$GNGLL,a,b\rxyz\r\n";

        let mut whole = CrStream::<128>::new();
        assert!(whole.push(stream));
        let mut expected = Vec::new();
        while let Some(s) = whole.pop() {
            expected.push(s.to_vec());
        }

        let mut bytewise = CrStream::<128>::new();
        let mut actual = Vec::new();
        for b in stream {
            assert!(bytewise.push(core::slice::from_ref(b)));
            while let Some(s) = bytewise.pop() {
                actual.push(s.to_vec());
            }
        }

        assert_eq!(actual, expected);
        assert_eq!(expected.len(), 3);
    }

    #[test]
    fn overflow_rejected() {
        let mut buf = CrStream::<8>::new();

        assert!(buf.push(b"abcde\r"));
        assert_eq!(buf.pop(), Some(b"abcde".as_slice()));

        // Shifting the consumed prefix away makes room again.
        assert!(buf.push(b"fgh"));
        assert!(buf.push(b"ijklm"));
        assert_eq!(buf.len(), 8);

        // No partial copies once genuinely full.
        assert!(!buf.push(b"x"));
        assert_eq!(buf.len(), 8);

        buf.clear();
        assert!(buf.is_empty());
        assert!(buf.push(b"x"));
    }
}
