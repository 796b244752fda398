use nom::{
    IResult, Parser,
    bytes::complete::{take, take_until},
    character::complete::{char, digit1},
    combinator::{all_consuming, map_res, opt},
    sequence::{preceded, terminated},
};

use chrono::{NaiveDate, NaiveTime};

pub(crate) fn number<T: core::str::FromStr>(i: &str) -> IResult<&str, T> {
    map_res(digit1, str::parse::<T>).parse(i)
}

/// One comma-delimited field, comma consumed. Every field a parser reads is
/// followed by at least one more (the checksum suffix rides on the last
/// field), so a missing trailing comma means a truncated sentence.
pub(crate) fn field(i: &str) -> IResult<&str, &str> {
    terminated(take_until(","), char(',')).parse(i)
}

pub(crate) fn time_hms_nano(i: &str) -> IResult<&str, NaiveTime> {
    map_res(
        (
            map_res(take(2usize), str::parse::<u32>),
            map_res(take(2usize), str::parse::<u32>),
            map_res(take(2usize), str::parse::<u32>),
            opt(preceded(char('.'), digit1)),
        ),
        |(h, m, s, nanos)| {
            let nanos = if let Some(nanos) = nanos {
                let num = nanos.parse::<u32>().map_err(|_| "invalid time")?;
                let len = nanos.len() as u32;
                if len > 9 {
                    num / 10_u32.pow(len - 9)
                } else {
                    num * 10_u32.pow(9 - len)
                }
            } else {
                0
            };
            NaiveTime::from_hms_nano_opt(h, m, s, nanos).ok_or("invalid time")
        },
    )
    .parse(i)
}

/// `hhmmss.sss` UTC field; any failure means the whole time is unknown.
pub(crate) fn utc_field(i: &str) -> Option<NaiveTime> {
    all_consuming(time_hms_nano)
        .parse(i)
        .ok()
        .map(|(_, t)| t)
}

/// `ddmmyy`, two-digit years pivoting into the 2000's.
pub(crate) fn date_dmy(i: &str) -> IResult<&str, NaiveDate> {
    map_res(
        (
            map_res(take(2usize), str::parse::<u32>),
            map_res(take(2usize), str::parse::<u32>),
            number::<i32>,
        ),
        |(d, m, y)| {
            let y = if y < 100 { y + 2000 } else { y };
            NaiveDate::from_ymd_opt(y, m, d).ok_or("invalid date")
        },
    )
    .parse(i)
}

fn angle(f: &str, dir_digits: usize) -> Option<f64> {
    if f.len() < dir_digits {
        return None;
    }
    let (deg, min) = f.split_at(dir_digits);
    let deg = deg.parse::<f64>().ok()?;
    let min = min.parse::<f64>().ok()?;
    Some(deg + min / 60.0)
}

/// Signed decimal degrees from `ddmm.mmmm,{N|S},dddmm.mmmm,{E|W}` field
/// texts. `None` when either angle is malformed; the receiver occasionally
/// emits an `A`-status sentence with empty position fields.
pub(crate) fn latlon(lat: &str, ns: &str, lon: &str, ew: &str) -> Option<(f64, f64)> {
    let mut lat = angle(lat, 2)?;
    if ns == "S" {
        lat = -lat;
    }
    let mut lon = angle(lon, 3)?;
    if ew == "W" {
        lon = -lon;
    }
    Some((lat, lon))
}
