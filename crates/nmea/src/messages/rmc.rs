use chrono::{NaiveDate, NaiveTime};

use crate::error::Error;
use crate::parser::{date_dmy, field, latlon, utc_field};

/// Recommended minimum sentence:
/// `$GNRMC,142323.000,A,3446.4447,N,11145.9536,W,0.00,206.73,280318,,,D*6D`
/// fields: 1 UTC, 2 status (`A`/`V`), 3-6 lat/NS/lon/EW, 7 speed, 8 course,
/// 9 date `ddmmyy`.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum Rmc {
    /// Status `V`: the receiver reports no fix.
    Void,
    Fix(RmcFix),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub struct RmcFix {
    /// Signed decimal degrees; `None` when the position fields are empty or
    /// malformed even though the status says active.
    pub pos: Option<(f64, f64)>,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub time: Option<NaiveTime>,
    #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
    pub date: NaiveDate,
}

pub fn rmc(pkt: &str) -> Result<Rmc, Error<'_>> {
    let (i, _) = field(pkt)?; // address
    let (i, utc) = field(i)?;
    let (i, status) = field(i)?;
    if status != "A" {
        return Ok(Rmc::Void);
    }
    let (i, lat) = field(i)?;
    let (i, ns) = field(i)?;
    let (i, lon) = field(i)?;
    let (i, ew) = field(i)?;
    let (i, _) = field(i)?; // speed over ground
    let (i, _) = field(i)?; // course over ground
    let (_, date) = field(i)?;
    let (_, date) = date_dmy(date)?;
    Ok(Rmc::Fix(RmcFix {
        pos: latlon(lat, ns, lon, ew),
        time: utc_field(utc),
        date,
    }))
}
