//! NMEA XOR checksum.
//!
//! Both directions of the protocol use the same frame: the running XOR of
//! every byte between `$` and `*`, rendered as two uppercase hex digits.

use crate::error::Error;

/// Computes the checksum over a sentence body, skipping one leading `$`.
pub fn checksum(body: &str) -> u8 {
    let body = body.strip_prefix('$').unwrap_or(body);
    body.bytes().fold(0, |acc, b| acc ^ b)
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum Checked {
    Valid,
    /// No `*` separator, or nothing before it. Not a checksummed protocol
    /// sentence; skip it rather than count it as an error.
    NotChecksummed,
}

/// Verifies the `*XX` suffix of a complete sentence.
pub fn check(pkt: &str) -> Result<Checked, Error<'_>> {
    let Some((body, suffix)) = pkt.split_once('*') else {
        return Ok(Checked::NotChecksummed);
    };
    if suffix.contains('*') {
        return Err(Error::MalformedChecksum);
    }
    let expected = u8::from_str_radix(suffix, 16).map_err(|_| Error::MalformedChecksum)?;
    if body.is_empty() {
        return Ok(Checked::NotChecksummed);
    }
    let actual = checksum(body);
    if actual != expected {
        return Err(Error::ChecksumMismatch { expected, actual });
    }
    Ok(Checked::Valid)
}
