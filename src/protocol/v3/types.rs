use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_repr::Deserialize_repr;
use serde_with::skip_serializing_none;

/// Quality of a GPS fix as reported in the TPV `mode` field
///
/// Variants are ordered, so `mode >= FixMode::Fix2D` reads as "has at least
/// a horizontal fix".
///
/// * [gps_fix_t.mode](https://gitlab.com/gpsd/gpsd/-/blob/release-3.25/include/gps.h?ref_type=tags#L181)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize_repr)]
#[repr(u8)]
pub enum FixMode {
    /// Mode update not seen yet
    NotSeen = 0,
    NoFix = 1,
    /// Latitude/longitude only
    Fix2D = 2,
    /// Latitude/longitude and altitude
    Fix3D = 3,
}

impl FixMode {
    /// Whether the receiver has any position solution
    pub fn has_fix(self) -> bool {
        self >= FixMode::Fix2D
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u32 {
        /// GPS data has been seen on this device
        const SEEN_GPS = 0x01;
        /// RTCM2 data has been seen on this device
        const SEEN_RTCM2 = 0x02;
        /// RTCM3 data has been seen on this device
        const SEEN_RTCM3 = 0x04;
        /// AIS data has been seen on this device
        const SEEN_AIS = 0x08;
    }
}

impl<'de> Deserialize<'de> for PropertyFlags {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bits = u32::deserialize(deserializer)?;
        Ok(PropertyFlags::from_bits_truncate(bits))
    }
}

/// One entry of a SKY satellite list
///
/// Only what is needed to count satellites is kept.
/// - [json_attrs_satellites](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c?ref_type=heads#L295)
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Satellite {
    #[serde(rename = "PRN")]
    pub prn: Option<i16>,
    #[serde(rename = "az")]
    pub azimuth: Option<f64>,
    #[serde(rename = "el")]
    pub elevation: Option<f64>,
    /// Signal strength in dB-Hz
    pub ss: Option<f64>,
    /// Used in the current solution
    #[serde(default)]
    pub used: bool,
}

/// A receiver attached to gpsd, as listed in DEVICES
///
/// - [json_device_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L28)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Device {
    pub path: Option<String>,
    /// When gpsd opened the device
    #[serde(default, deserialize_with = "activation_time")]
    pub activated: Option<DateTime<Utc>>,
    pub flags: Option<PropertyFlags>,
    pub driver: Option<String>,
    pub subtype: Option<String>,
    /// Serial speed in bits per second
    pub bps: Option<i32>,
    /// Reporting cycle in seconds
    pub cycle: Option<f64>,
}

/// `activated` is an ISO-8601 string in current gpsd and a float Unix
/// timestamp in older releases; an unparsable string reads as unknown.
fn activation_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::String(iso_time)) => Ok(DateTime::parse_from_rfc3339(&iso_time)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))),
        Some(serde_json::Value::Number(secs)) => Ok(secs.as_f64().and_then(epoch_time)),
        Some(serde_json::Value::Null) | None => Ok(None),
        Some(_) => Err(serde::de::Error::custom(
            "Invalid type for 'activated' field",
        )),
    }
}

/// Converts a float Unix timestamp, as sent by gpsd before 3.10
pub(crate) fn epoch_time(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::<Utc>::from_timestamp(secs.trunc() as i64, (secs.fract().abs() * 1e9) as u32)
}

/// Watch policy sent with `?WATCH`
///
/// Unset fields are left out of the request so gpsd keeps their current
/// values.
/// - [json_watch_read](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/shared_json.c#L95)
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Watch {
    /// Restrict watching to one device path
    pub device: Option<String>,
    pub enable: Option<bool>,
    /// Stream JSON reports; polling clients leave this unset
    pub json: Option<bool>,
}
