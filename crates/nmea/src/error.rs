use core::fmt;

type NomError<'a> = nom::Err<nom::error::Error<&'a str>>;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum Error<'a> {
    /// The `*XX` suffix is present but repeated or not two hex digits.
    MalformedChecksum,
    ChecksumMismatch {
        expected: u8,
        actual: u8,
    },
    /// A required field is missing or does not parse.
    Field(#[cfg_attr(feature = "defmt", defmt(Debug2Format))] NomError<'a>),
    InvalidDate,
}

impl fmt::Display for Error<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MalformedChecksum => write!(f, "malformed checksum suffix"),
            Error::ChecksumMismatch { expected, actual } => write!(
                f,
                "checksum mismatch, expected: {expected:02x}, actual: {actual:02x}"
            ),
            Error::Field(e) => e.fmt(f),
            Error::InvalidDate => write!(f, "invalid date"),
        }
    }
}

impl<'a> From<nom::Err<nom::error::Error<&'a str>>> for Error<'a> {
    fn from(e: nom::Err<nom::error::Error<&'a str>>) -> Self {
        Self::Field(e)
    }
}

impl core::error::Error for Error<'_> {}
