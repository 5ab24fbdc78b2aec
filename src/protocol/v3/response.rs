//! gpsd protocol v3 response messages
//!
//! Response messages are identified by their "class" field. A polling
//! client sees:
//! - VERSION: banner sent by gpsd right after the connection opens
//! - DEVICES / WATCH: replies to `?WATCH` and `?DEVICES`
//! - POLL: latest TPV (time-position-velocity) and SKY reports per device
//! - ERROR: gpsd rejected a request
//!
//! TPV objects are kept untyped as [`RawReport`]; turning them into a
//! validated fix is the job of [`crate::fix::FixRecord::parse`].

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};

use super::types::*;
use crate::error::SourceError;

/// One TPV report exactly as received, keyed by field name
///
/// May miss any field depending on fix quality. Besides the gpsd TPV keys,
/// reports built by [`Poll::latest_report`] may carry `sats` and `nSat`
/// merged in from the matching SKY report.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct RawReport(Map<String, Value>);

impl RawReport {
    /// Wraps an already decoded field map
    pub fn new(fields: Map<String, Value>) -> Self {
        RawReport(fields)
    }

    /// Looks up a field by its gpsd key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Fills in satellite counts from a SKY report when the TPV lacks them
    ///
    /// `sats` is the number of satellites used in the solution, `nSat` the
    /// number in view. Fields already present are left untouched.
    pub fn merge_sky(&mut self, sky: &Sky) {
        if !self.0.contains_key("sats") {
            if let Some(used) = sky.satellites_used() {
                self.0.insert("sats".into(), Value::from(used));
            }
        }
        if !self.0.contains_key("nSat") {
            if let Some(visible) = sky.satellites_visible() {
                self.0.insert("nSat".into(), Value::from(visible));
            }
        }
    }
}

impl From<Map<String, Value>> for RawReport {
    fn from(fields: Map<String, Value>) -> Self {
        RawReport(fields)
    }
}

impl TryFrom<Value> for RawReport {
    type Error = SourceError;

    /// Accepts a JSON object; any other JSON value is rejected
    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(fields) => Ok(RawReport(fields)),
            _ => Err(SourceError::Incomplete(
                "report is not a JSON object".into(),
            )),
        }
    }
}

/// Satellite Sky View (SKY) report
///
/// Reports the satellites visible to the receiver and which of them are
/// used in the navigation solution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Sky {
    /// Device path that provided this data
    pub device: Option<String>,
    /// GPS time of this sky view
    pub time: Option<DateTime<Utc>>,
    /// Number of satellites visible
    #[serde(rename = "nSat")]
    pub n_sat: Option<u32>,
    /// Number of satellites used in navigation solution
    #[serde(rename = "uSat")]
    pub u_sat: Option<u32>,
    /// List of visible satellites with their properties
    #[serde(default)]
    pub satellites: Vec<Satellite>,
}

impl Sky {
    /// Satellites used in the solution, counted from the list when present
    pub fn satellites_used(&self) -> Option<u32> {
        if self.satellites.is_empty() {
            self.u_sat
        } else {
            Some(self.satellites.iter().filter(|sat| sat.used).count() as u32)
        }
    }

    /// Satellites in view
    pub fn satellites_visible(&self) -> Option<u32> {
        if self.satellites.is_empty() {
            self.n_sat
        } else {
            Some(self.satellites.len() as u32)
        }
    }
}

/// gpsd daemon version information
///
/// Sent unsolicited as the connection banner.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Version {
    /// gpsd release version string
    pub release: String,
    /// Git revision hash
    #[serde(default)]
    pub rev: String,
    /// Protocol major version number
    pub proto_major: i32,
    /// Protocol minor version number
    pub proto_minor: i32,
    /// Remote server URL (if applicable)
    pub remote: Option<String>,
}

/// List of GPS devices known to gpsd
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceList {
    /// List of available GPS devices
    #[serde(default)]
    pub devices: Vec<Device>,
}

impl DeviceList {
    /// Paths of all listed devices, skipping entries without one
    pub fn paths(&self) -> Vec<String> {
        self.devices
            .iter()
            .filter_map(|device| device.path.clone())
            .collect()
    }
}

/// Poll response with current GPS state
///
/// A snapshot of the latest fix data of every active device.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Poll {
    /// Number of active devices
    pub active: Option<i32>,
    /// Timestamp of this poll
    pub time: Option<DateTime<Utc>>,
    /// TPV data from active devices
    #[serde(default)]
    pub tpv: Vec<RawReport>,
    /// Sky view from active devices
    #[serde(default)]
    pub sky: Vec<Sky>,
}

impl Poll {
    /// Builds the report of the most recent epoch
    ///
    /// Takes the last TPV and merges satellite counts from the last SKY.
    /// Fails with [`SourceError::Inactive`] when gpsd has no active device,
    /// and with [`SourceError::Incomplete`] when the poll carries no TPV.
    pub fn latest_report(&self) -> Result<RawReport, SourceError> {
        if self.active == Some(0) {
            return Err(SourceError::Inactive);
        }

        let mut report = self
            .tpv
            .last()
            .cloned()
            .ok_or_else(|| SourceError::Incomplete("POLL carried no TPV report".into()))?;

        if let Some(sky) = self.sky.last() {
            report.merge_sky(sky);
        }

        Ok(report)
    }
}

/// Error notification from gpsd
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Error {
    /// Error message text
    pub message: String,
}

/// - [libgps_json_unpack](https://gitlab.com/gpsd/gpsd/-/blob/master/libgps/libgps_json.c#L792)
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "class", rename_all = "UPPERCASE")]
/// gpsd response message types
///
/// Each variant corresponds to a specific "class" value in the JSON response.
pub enum Message {
    /// Time-Position-Velocity report
    Tpv(RawReport),
    /// Satellite sky view report
    Sky(Sky),
    /// List of available GPS devices
    Devices(DeviceList),
    /// Current watch settings
    Watch(Watch),
    /// gpsd version information
    Version(Version),
    /// Poll response with current fixes
    Poll(Poll),
    /// Error message from gpsd
    Error(Error),
    /// Any class this client does not model
    #[serde(other)]
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    const POLL: &str = r#"{"class":"POLL","time":"2024-01-01T00:00:01.000Z","active":1,
        "tpv":[{"class":"TPV","device":"/dev/ttyUSB0","mode":3,"time":"2024-01-01T00:00:00.000Z",
                "lat":45.0,"lon":-93.0,"alt":300.0,"track":10.0,"speed":1.2,"climb":0.1}],
        "gst":[],
        "sky":[{"class":"SKY","device":"/dev/ttyUSB0","satellites":[
            {"PRN":1,"el":40,"az":120,"ss":38,"used":true},
            {"PRN":7,"el":10,"az":300,"ss":20,"used":false},
            {"PRN":9,"el":70,"az":10,"ss":44,"used":true}]}]}"#;

    #[test]
    fn test_poll_latest_report_merges_sky() {
        let msg: Message = serde_json::from_str(POLL).unwrap();
        let Message::Poll(poll) = msg else {
            panic!("expected POLL, got {msg:?}");
        };

        let report = poll.latest_report().unwrap();
        assert_eq!(report.get("mode"), Some(&Value::from(3)));
        assert_eq!(report.get("sats"), Some(&Value::from(2)));
        assert_eq!(report.get("nSat"), Some(&Value::from(3)));
    }

    #[test]
    fn test_poll_keeps_reported_sats() {
        let mut report =
            RawReport::try_from(serde_json::json!({"mode": 2, "sats": 9})).unwrap();
        let sky = Sky {
            device: None,
            time: None,
            n_sat: Some(12),
            u_sat: Some(5),
            satellites: vec![],
        };
        report.merge_sky(&sky);
        assert_eq!(report.get("sats"), Some(&Value::from(9)));
        assert_eq!(report.get("nSat"), Some(&Value::from(12)));
    }

    #[test]
    fn test_poll_without_active_device() {
        let poll: Poll =
            serde_json::from_str(r#"{"active":0,"tpv":[],"sky":[]}"#).unwrap();
        assert!(matches!(poll.latest_report(), Err(SourceError::Inactive)));

        let poll: Poll = serde_json::from_str(r#"{"active":1}"#).unwrap();
        assert!(matches!(
            poll.latest_report(),
            Err(SourceError::Incomplete(_))
        ));
    }

    #[test]
    fn test_devices_activated_formats() {
        let msg: Message = serde_json::from_str(
            r#"{"class":"DEVICES","devices":[
                {"class":"DEVICE","path":"/dev/ttyUSB0","activated":"2024-01-01T00:00:00.000Z","driver":"u-blox","bps":9600,"parity":"N","flags":1},
                {"class":"DEVICE","path":"/dev/ttyACM0","activated":1704067200.5},
                {"class":"DEVICE","driver":"NMEA0183"}]}"#,
        )
        .unwrap();
        let Message::Devices(list) = msg else {
            panic!("expected DEVICES");
        };

        assert_eq!(list.devices.len(), 3);
        assert_eq!(list.devices[0].bps, Some(9600));
        assert_eq!(list.devices[0].flags, Some(PropertyFlags::SEEN_GPS));
        assert_eq!(
            list.devices[1].activated.map(|t| t.timestamp()),
            Some(1_704_067_200)
        );
        assert_eq!(list.paths(), vec!["/dev/ttyUSB0", "/dev/ttyACM0"]);
    }

    #[test]
    fn test_unknown_class_is_other() {
        let msg: Message =
            serde_json::from_str(r#"{"class":"PPS","device":"/dev/pps0"}"#).unwrap();
        assert_eq!(msg, Message::Other);
    }

    #[test]
    fn test_version_banner() {
        let msg: Message = serde_json::from_str(
            r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#,
        )
        .unwrap();
        assert!(matches!(msg, Message::Version(Version { proto_major: 3, .. })));
    }
}
