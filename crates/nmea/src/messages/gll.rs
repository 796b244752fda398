use chrono::NaiveTime;

use crate::error::Error;
use crate::parser::{field, latlon, utc_field};

/// Geographic position sentence:
/// `$GNGLL,3324.8933,N,11200.4470,W,161732.000,A,A*57`
/// fields: 1-4 lat/NS/lon/EW, 5 UTC, 6 status. Carries no date.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, PartialEq)]
pub enum Gll {
    Void,
    Fix {
        pos: Option<(f64, f64)>,
        #[cfg_attr(feature = "defmt", defmt(Debug2Format))]
        time: Option<NaiveTime>,
    },
}

pub fn gll(pkt: &str) -> Result<Gll, Error<'_>> {
    let (i, _) = field(pkt)?; // address
    let (i, lat) = field(i)?;
    let (i, ns) = field(i)?;
    let (i, lon) = field(i)?;
    let (i, ew) = field(i)?;
    let (i, utc) = field(i)?;
    let (_, status) = field(i)?;
    if status != "A" {
        return Ok(Gll::Void);
    }
    Ok(Gll::Fix {
        pos: latlon(lat, ns, lon, ew),
        time: utc_field(utc),
    })
}
