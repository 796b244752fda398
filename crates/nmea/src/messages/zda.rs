use chrono::{NaiveDate, NaiveTime};

use crate::error::Error;
use crate::parser::{field, number, utc_field};

/// Time & date sentence: `$GNZDA,142323.000,28,03,2018,,*4F`
/// fields: 1 UTC, 2 day, 3 month, 4 year (four digits).
///
/// A week-zero receiver reports `$GNZDA,000507.800,06,01,1980,,*45` before it
/// has acquired time; the date is numerically valid and parsed as-is. Whether
/// it is trustworthy is the clock-sync policy's call, not the parser's.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub struct Zda {
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub time: Option<NaiveTime>,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub date: NaiveDate,
}

pub fn zda(pkt: &str) -> Result<Zda, Error<'_>> {
    let (i, _) = field(pkt)?; // address
    let (i, utc) = field(i)?;
    let (i, day) = field(i)?;
    let (i, month) = field(i)?;
    let (_, year) = field(i)?;
    let (_, day) = number::<u32>(day)?;
    let (_, month) = number::<u32>(month)?;
    let (_, year) = number::<i32>(year)?;
    let date = NaiveDate::from_ymd_opt(year, month, day).ok_or(Error::InvalidDate)?;
    Ok(Zda {
        time: utc_field(utc),
        date,
    })
}
