//! Typed GPS fix records and derived navigation quantities
//!
//! A [`FixRecord`] is parsed from one [`RawReport`] (a gpsd TPV object).
//! Which fields exist depends on the fix mode, and that dependency is
//! carried by the [`Fix`] variant: a record without a fix simply has no
//! horizontal data to read, and a 2D fix has no vertical data.
//!
//! Accessors distinguish two failures:
//! - [`GpsdError::ModeTooLow`]: the fix is not good enough for the value
//! - [`GpsdError::FieldUnavailable`]: the fix qualifies but gpsd did not
//!   report the field
//!
//! Zero is a valid reading of every mode-gated field and is never used as
//! a placeholder for one that is missing.
//!
//! # Example
//!
//! ```
//! use gpsd_fix::fix::FixRecord;
//! use gpsd_fix::protocol::v3::response::RawReport;
//!
//! let raw = RawReport::try_from(serde_json::json!({
//!     "mode": 3, "lat": 45.0, "lon": -93.0, "alt": 300.0,
//!     "track": 10.0, "speed": 1.2, "climb": 0.1,
//!     "time": "2024-01-01T00:00:00Z", "sats": 7
//! }))
//! .unwrap();
//!
//! let fix = FixRecord::parse(&raw).unwrap();
//! assert_eq!(fix.position().unwrap(), (45.0, -93.0));
//! assert_eq!(fix.altitude().unwrap(), 300.0);
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::Deserialize;

use crate::{
    Result,
    error::GpsdError,
    protocol::v3::{
        response::RawReport,
        types::{FixMode, epoch_time},
    },
};

/// Base of the map link produced by [`FixRecord::map_url`]
pub const MAP_URL_BASE: &str = "http://www.openstreetmap.org/";

/// Zoom level of the map link
pub const MAP_URL_ZOOM: u8 = 15;

/// Fields of a TPV report this crate reads
///
/// Reference: [json_tpv_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L34)
#[derive(Debug, Deserialize)]
struct TpvFields {
    /// GPS fix mode (NoFix, 2D, 3D)
    mode: FixMode,
    /// Device path that provided this data
    device: Option<String>,
    /// GPS time of fix
    time: Option<TpvTime>,
    /// Latitude in degrees (positive = North)
    lat: Option<f64>,
    /// Longitude in degrees (positive = East)
    lon: Option<f64>,
    /// Altitude in meters (deprecated, use altMSL or altHAE)
    alt: Option<f64>,
    /// Altitude, MSL (mean sea level) in meters
    #[serde(rename = "altMSL")]
    alt_msl: Option<f64>,
    /// Altitude, height above ellipsoid, in meters
    #[serde(rename = "altHAE")]
    alt_hae: Option<f64>,
    /// True track (course over ground) in degrees
    track: Option<f64>,
    /// Speed over ground in meters/second
    #[serde(alias = "hspeed")]
    speed: Option<f64>,
    /// Climb/sink rate in meters per second
    climb: Option<f64>,
    /// Longitude error estimate in meters
    epx: Option<f64>,
    /// Latitude error estimate in meters
    epy: Option<f64>,
    /// Estimated horizontal position error in meters
    eph: Option<f64>,
    /// Estimated vertical error in meters
    epv: Option<f64>,
    /// Estimated speed error in meters/second
    eps: Option<f64>,
    /// Estimated time error in seconds
    ept: Option<f64>,
    /// Estimated track error in degrees
    epd: Option<f64>,
    /// Estimated climb error in meters/second
    epc: Option<f64>,
    /// Number of satellites used in solution
    sats: Option<u32>,
    /// Number of satellites in view
    #[serde(rename = "nSat")]
    n_sat: Option<u32>,
}

/// TPV `time`: ISO-8601 in current gpsd, float Unix seconds in early 3.x
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TpvTime {
    Iso(String),
    Epoch(f64),
}

impl TpvTime {
    /// Parsed time plus its ISO-8601 text
    fn resolve(self) -> Result<(DateTime<Utc>, String)> {
        match self {
            TpvTime::Iso(iso) => {
                let time = DateTime::parse_from_rfc3339(&iso)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|err| {
                        GpsdError::MalformedReport(format!("invalid time {iso:?}: {err}"))
                    })?;
                Ok((time, iso))
            }
            TpvTime::Epoch(secs) => {
                let time = epoch_time(secs).ok_or_else(|| {
                    GpsdError::MalformedReport(format!("invalid time {secs}"))
                })?;
                Ok((time, time.to_rfc3339_opts(SecondsFormat::Millis, true)))
            }
        }
    }
}

/// Error estimates reported alongside a fix
///
/// All values are the gpsd `ep*` fields; each is absent when gpsd did not
/// report it. `vertical` and `climb` are only kept for 3D fixes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ErrorEstimates {
    /// Longitude error in meters (`epx`)
    pub x: Option<f64>,
    /// Latitude error in meters (`epy`)
    pub y: Option<f64>,
    /// Combined horizontal (circular) error in meters (`eph`)
    pub horizontal: Option<f64>,
    /// Speed error in meters/second (`eps`)
    pub speed: Option<f64>,
    /// Time error in seconds (`ept`)
    pub time: Option<f64>,
    /// Track error in degrees (`epd`)
    pub track: Option<f64>,
    /// Vertical error in meters (`epv`)
    pub vertical: Option<f64>,
    /// Climb error in meters/second (`epc`)
    pub climb: Option<f64>,
}

impl ErrorEstimates {
    /// Reported estimates keyed by their gpsd field name
    pub fn to_map(&self) -> BTreeMap<&'static str, f64> {
        [
            ("epx", self.x),
            ("epy", self.y),
            ("eph", self.horizontal),
            ("eps", self.speed),
            ("ept", self.time),
            ("epd", self.track),
            ("epv", self.vertical),
            ("epc", self.climb),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect()
    }
}

/// Horizontal part of a fix, present from mode 2 on
#[derive(Debug, Clone, PartialEq)]
pub struct Horizontal {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Course over ground in degrees from true north
    pub track: Option<f64>,
    /// Speed over ground in meters/second
    pub speed: Option<f64>,
    pub time: Option<DateTime<Utc>>,
    /// `time` as gpsd sent it
    pub time_iso: Option<String>,
    pub errors: ErrorEstimates,
}

/// Vertical part of a fix, present in mode 3
#[derive(Debug, Clone, PartialEq)]
pub struct Vertical {
    /// Altitude in meters
    pub altitude: Option<f64>,
    /// Vertical speed in meters/second, positive upwards
    pub climb: Option<f64>,
}

/// Fix data legal for a given mode
#[derive(Debug, Clone, PartialEq)]
pub enum Fix {
    /// Mode 0 or 1
    None,
    /// Mode 2
    TwoD(Horizontal),
    /// Mode 3
    ThreeD(Horizontal, Vertical),
}

/// Motion of the receiver: horizontal speed, heading and vertical rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Movement {
    /// Meters/second over ground
    pub speed: f64,
    /// Degrees from true north
    pub track: f64,
    /// Meters/second, positive upwards
    pub climb: f64,
}

/// Validated snapshot of one report
///
/// Immutable once parsed and independent of the session it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct FixRecord {
    mode: FixMode,
    satellites_used: u32,
    satellites_visible: Option<u32>,
    device: Option<String>,
    fix: Fix,
}

impl FixRecord {
    /// Parses a raw TPV report
    ///
    /// Fails with [`GpsdError::MalformedReport`] when `mode` is missing or
    /// not 0..=3, when a field has the wrong JSON type, or when `time` is
    /// neither ISO-8601 nor Unix seconds. Fields not legal for the mode are
    /// dropped.
    pub fn parse(raw: &RawReport) -> Result<Self> {
        let value = serde_json::Value::Object(raw.as_map().clone());
        let tpv = TpvFields::deserialize(&value)
            .map_err(|err| GpsdError::MalformedReport(err.to_string()))?;

        let (time, time_iso) = match tpv.time {
            Some(time) => {
                let (time, iso) = time.resolve()?;
                (Some(time), Some(iso))
            }
            None => (None, None),
        };

        let is_3d = tpv.mode == FixMode::Fix3D;
        let horizontal = Horizontal {
            latitude: tpv.lat,
            longitude: tpv.lon,
            track: tpv.track,
            speed: tpv.speed,
            time,
            time_iso,
            errors: ErrorEstimates {
                x: tpv.epx,
                y: tpv.epy,
                horizontal: tpv.eph,
                speed: tpv.eps,
                time: tpv.ept,
                track: tpv.epd,
                vertical: tpv.epv.filter(|_| is_3d),
                climb: tpv.epc.filter(|_| is_3d),
            },
        };

        let fix = match tpv.mode {
            FixMode::NotSeen | FixMode::NoFix => Fix::None,
            FixMode::Fix2D => Fix::TwoD(horizontal),
            FixMode::Fix3D => Fix::ThreeD(
                horizontal,
                Vertical {
                    altitude: tpv.alt.or(tpv.alt_msl).or(tpv.alt_hae),
                    climb: tpv.climb,
                },
            ),
        };

        Ok(FixRecord {
            mode: tpv.mode,
            satellites_used: tpv.sats.unwrap_or(0),
            satellites_visible: tpv.n_sat,
            device: tpv.device,
            fix,
        })
    }

    pub fn mode(&self) -> FixMode {
        self.mode
    }

    /// Satellites used in the solution; 0 when gpsd reported no count
    pub fn satellites_used(&self) -> u32 {
        self.satellites_used
    }

    pub fn satellites_visible(&self) -> Option<u32> {
        self.satellites_visible
    }

    /// Device path that produced the report
    pub fn device(&self) -> Option<&str> {
        self.device.as_deref()
    }

    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    /// (latitude, longitude) in degrees; needs a 2D fix
    pub fn position(&self) -> Result<(f64, f64)> {
        let h = self.horizontal()?;
        Ok((
            require(h.latitude, "latitude")?,
            require(h.longitude, "longitude")?,
        ))
    }

    /// Horizontal speed in meters/second; needs a 2D fix
    pub fn speed(&self) -> Result<f64> {
        require(self.horizontal()?.speed, "speed")
    }

    /// Course over ground in degrees; needs a 2D fix
    pub fn track(&self) -> Result<f64> {
        require(self.horizontal()?.track, "track")
    }

    /// (x, y) position error in meters; needs a 2D fix
    ///
    /// Each component falls back to the combined circular error `eph` when
    /// gpsd did not report it.
    pub fn position_precision(&self) -> Result<(f64, f64)> {
        let errors = &self.horizontal()?.errors;
        Ok((
            require(errors.x.or(errors.horizontal), "epx")?,
            require(errors.y.or(errors.horizontal), "epy")?,
        ))
    }

    /// Every error estimate gpsd reported; needs a 2D fix
    pub fn error_estimates(&self) -> Result<&ErrorEstimates> {
        Ok(&self.horizontal()?.errors)
    }

    /// Time of the fix in UTC; needs a 2D fix
    pub fn time(&self) -> Result<DateTime<Utc>> {
        require(self.horizontal()?.time, "time")
    }

    /// Time of the fix converted to `tz`; needs a 2D fix
    ///
    /// Pass [`chrono::Local`] for the process time zone.
    pub fn time_in<Tz: TimeZone>(&self, tz: &Tz) -> Result<DateTime<Tz>> {
        Ok(self.time()?.with_timezone(tz))
    }

    /// Time of the fix as ISO-8601 text; needs a 2D fix
    ///
    /// The string gpsd sent, or the rendering of an epoch time from an
    /// older daemon.
    pub fn time_iso(&self) -> Result<&str> {
        self.horizontal()?
            .time_iso
            .as_deref()
            .ok_or(GpsdError::FieldUnavailable("time"))
    }

    /// OpenStreetMap link centered on the position; needs a 2D fix
    pub fn map_url(&self) -> Result<String> {
        let (lat, lon) = self.position()?;
        Ok(map_url(lat, lon))
    }

    /// Altitude in meters; needs a 3D fix
    pub fn altitude(&self) -> Result<f64> {
        require(self.vertical()?.1.altitude, "altitude")
    }

    /// Vertical speed in meters/second; needs a 3D fix
    pub fn speed_vertical(&self) -> Result<f64> {
        require(self.vertical()?.1.climb, "climb")
    }

    /// Vertical position error in meters; needs a 3D fix
    pub fn vertical_precision(&self) -> Result<f64> {
        require(self.vertical()?.0.errors.vertical, "epv")
    }

    /// Speed, heading and climb as one value; needs a 3D fix
    ///
    /// Speed and track alone only need 2D, but the combined view is gated
    /// by its strictest member.
    pub fn movement(&self) -> Result<Movement> {
        let (h, v) = self.vertical()?;
        Ok(Movement {
            speed: require(h.speed, "speed")?,
            track: require(h.track, "track")?,
            climb: require(v.climb, "climb")?,
        })
    }

    fn horizontal(&self) -> Result<&Horizontal> {
        match &self.fix {
            Fix::TwoD(h) | Fix::ThreeD(h, _) => Ok(h),
            Fix::None => Err(GpsdError::ModeTooLow {
                required: FixMode::Fix2D,
                actual: self.mode,
            }),
        }
    }

    fn vertical(&self) -> Result<(&Horizontal, &Vertical)> {
        match &self.fix {
            Fix::ThreeD(h, v) => Ok((h, v)),
            Fix::None | Fix::TwoD(_) => Err(GpsdError::ModeTooLow {
                required: FixMode::Fix3D,
                actual: self.mode,
            }),
        }
    }
}

impl TryFrom<&RawReport> for FixRecord {
    type Error = GpsdError;

    fn try_from(raw: &RawReport) -> Result<Self> {
        FixRecord::parse(raw)
    }
}

/// Map link for a position in decimal degrees
pub fn map_url(lat: f64, lon: f64) -> String {
    format!(
        "{}?mlat={}&mlon={}&zoom={}",
        MAP_URL_BASE, lat, lon, MAP_URL_ZOOM
    )
}

fn require<T>(value: Option<T>, field: &'static str) -> Result<T> {
    value.ok_or(GpsdError::FieldUnavailable(field))
}
