//! Session management for gpsd
//!
//! A session owns the connection to gpsd and hands out [`FixRecord`]s.
//! The async [`Session`] here runs on tokio; the blocking variant lives in
//! [`blocking`].
//!
//! Sessions never retry on their own. "No fix yet" is a normal state while
//! a receiver warms up, so callers decide how long to wait, usually with
//! [`crate::retry::RetryPolicy`].

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::{
    Result,
    error::{GpsdError, SourceError},
    fix::FixRecord,
    protocol::v3::{response::DeviceList, response::Poll, types::Device},
};

/// Blocking (synchronous) session implementation
pub mod blocking;

/// Host gpsd listens on by default
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Port gpsd listens on by default
pub const DEFAULT_PORT: u16 = 2947;

/// Connection settings of a session
///
/// Deserializable so an application can embed it in its own config file;
/// missing keys take the defaults.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    /// Bound on establishing the TCP connection
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// Bound on waiting for any single reply, banner included
    #[serde(with = "millis")]
    pub read_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

impl SessionConfig {
    pub fn host<S: AsRef<str>>(mut self, host: S) -> Self {
        self.host = host.as_ref().into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}

/// Timeouts are written as integer milliseconds, e.g. `read_timeout = 250`
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Identity of a receiver attached to gpsd
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    /// Device path, e.g. `/dev/ttyUSB0`
    pub path: Option<String>,
    /// Serial speed in bits per second
    pub bps: Option<i32>,
    /// gpsd driver name
    pub driver: Option<String>,
}

impl From<&Device> for DeviceSummary {
    fn from(device: &Device) -> Self {
        DeviceSummary {
            path: device.path.clone(),
            bps: device.bps,
            driver: device.driver.clone(),
        }
    }
}

/// Turns a POLL reply into a fix, mapping every failure to `ReportUnavailable`
pub(crate) fn fix_from_poll(poll: &Poll) -> Result<FixRecord> {
    let raw = poll
        .latest_report()
        .map_err(GpsdError::ReportUnavailable)?;

    FixRecord::parse(&raw).map_err(|err| match err {
        GpsdError::MalformedReport(msg) => {
            GpsdError::ReportUnavailable(SourceError::Incomplete(msg))
        }
        other => other,
    })
}

/// Maps a failed request to `ReportUnavailable`
///
/// When the error leaves the reply stream out of step, the connection is
/// dropped so later calls fail with `NotConnected` instead of reading a
/// stale reply.
pub(crate) fn request_failed<C>(connection: &mut Option<C>, err: SourceError) -> GpsdError {
    if err.breaks_link() && connection.take().is_some() {
        warn!(error = %err, "dropping gpsd connection");
    }
    GpsdError::ReportUnavailable(err)
}

pub(crate) fn log_devices(devices: &DeviceList) {
    if devices.devices.is_empty() {
        warn!("gpsd reports no devices");
    } else {
        debug!(devices = ?devices.paths(), "gpsd devices");
    }
}

#[cfg(feature = "tokio")]
pub use self::nonblocking::{Connection, Session};

#[cfg(feature = "tokio")]
mod nonblocking {
    use tokio_util::compat::Compat;
    use tracing::{debug, info};

    use super::*;
    use crate::{client::GpsdClient, protocol::SourceResult, protocol::v3::response::Version};

    type TcpCompat = Compat<tokio::net::TcpStream>;

    /// Bounds `fut` by `limit`, reporting expiry as [`SourceError::Timeout`]
    async fn bounded<T>(
        limit: Duration,
        fut: impl std::future::Future<Output = SourceResult<T>>,
    ) -> SourceResult<T> {
        tokio::time::timeout(limit, fut)
            .await
            .unwrap_or(Err(SourceError::Timeout))
    }

    /// One live link to gpsd
    #[derive(Debug)]
    pub struct Connection {
        host: String,
        port: u16,
        client: GpsdClient<TcpCompat>,
        devices: DeviceList,
    }

    impl Connection {
        async fn open(host: &str, port: u16, config: &SessionConfig) -> SourceResult<Self> {
            let mut client = bounded(
                config.connect_timeout + config.read_timeout,
                GpsdClient::connect((host, port)),
            )
            .await?;
            let devices = bounded(config.read_timeout, client.watch_mode(true)).await?;
            log_devices(&devices);

            Ok(Connection {
                host: host.to_string(),
                port,
                client,
                devices,
            })
        }

        pub fn host(&self) -> &str {
            &self.host
        }

        pub fn port(&self) -> u16 {
            self.port
        }

        /// Version banner gpsd sent on connect
        pub fn version(&self) -> &Version {
            self.client.banner()
        }
    }

    /// Async session manager for a gpsd daemon
    ///
    /// Same contract as [`super::blocking::Session`], with every I/O
    /// operation bounded by `tokio::time::timeout`.
    ///
    /// # Example
    /// ```no_run
    /// use gpsd_fix::session::{Session, SessionConfig};
    ///
    /// # async fn example() -> gpsd_fix::Result<()> {
    /// let mut session = Session::new(SessionConfig::default().host("10.0.0.2"));
    /// session.connect().await?;
    /// let fix = session.fetch_current().await?;
    /// println!("mode {:?}", fix.mode());
    /// # Ok(())
    /// # }
    /// ```
    #[derive(Debug, Default)]
    pub struct Session {
        config: SessionConfig,
        connection: Option<Connection>,
    }

    impl Session {
        pub fn new(config: SessionConfig) -> Self {
            Session {
                config,
                connection: None,
            }
        }

        pub fn config(&self) -> &SessionConfig {
            &self.config
        }

        /// Connects to the configured endpoint
        pub async fn connect(&mut self) -> Result<()> {
            let host = self.config.host.clone();
            self.connect_to(&host, self.config.port).await
        }

        /// Connects to `host:port`, replacing any live connection
        pub async fn connect_to(&mut self, host: &str, port: u16) -> Result<()> {
            if self.connection.take().is_some() {
                debug!("dropping previous gpsd connection");
            }

            let connection = Connection::open(host, port, &self.config)
                .await
                .map_err(GpsdError::ConnectionError)?;
            info!(
                host,
                port,
                release = %connection.version().release,
                "connected to gpsd"
            );
            self.connection = Some(connection);
            Ok(())
        }

        /// Drops the live connection, if any
        pub fn disconnect(&mut self) {
            self.connection = None;
        }

        pub fn is_connected(&self) -> bool {
            self.connection.is_some()
        }

        pub fn connection(&self) -> Option<&Connection> {
            self.connection.as_ref()
        }

        /// `(host, port)` of the live connection
        pub fn endpoint(&self) -> Option<(&str, u16)> {
            self.connection.as_ref().map(|c| (c.host(), c.port()))
        }

        /// Version banner of the live connection
        pub fn version(&self) -> Option<&Version> {
            self.connection.as_ref().map(Connection::version)
        }

        /// Polls gpsd for the latest report and parses it
        ///
        /// A timeout drops the connection: the half-read reply cannot be
        /// resumed, so the session has to be connected again.
        pub async fn fetch_current(&mut self) -> Result<FixRecord> {
            let limit = self.config.read_timeout;
            let result = bounded(limit, self.connection_mut()?.client.poll()).await;
            let poll = result.map_err(|err| request_failed(&mut self.connection, err))?;
            fix_from_poll(&poll)
        }

        /// Paths of the devices currently attached to gpsd
        pub async fn list_devices(&mut self) -> Result<Vec<String>> {
            let limit = self.config.read_timeout;
            let result = bounded(limit, self.connection_mut()?.client.devices()).await;
            let devices = result.map_err(|err| request_failed(&mut self.connection, err))?;
            Ok(devices.paths())
        }

        /// First device gpsd reported during the handshake
        pub fn device(&self) -> Result<Option<DeviceSummary>> {
            let connection = self.connection.as_ref().ok_or(GpsdError::NotConnected)?;
            Ok(connection.devices.devices.first().map(DeviceSummary::from))
        }

        fn connection_mut(&mut self) -> Result<&mut Connection> {
            self.connection.as_mut().ok_or(GpsdError::NotConnected)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_builder() {
        let config = SessionConfig::default();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 2947);

        let config = config.host("gps.local").port(3000);
        assert_eq!((config.host.as_str(), config.port), ("gps.local", 3000));
    }

    #[test]
    fn test_config_deserialize_partial() {
        let config: SessionConfig =
            serde_json::from_str(r#"{"host":"10.0.0.2","read_timeout":250}"#).unwrap();
        assert_eq!(config.host, "10.0.0.2");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_fix_from_poll_maps_failures() {
        let poll: Poll = serde_json::from_str(r#"{"active":0}"#).unwrap();
        assert!(matches!(
            fix_from_poll(&poll),
            Err(GpsdError::ReportUnavailable(SourceError::Inactive))
        ));

        let poll: Poll =
            serde_json::from_str(r#"{"active":1,"tpv":[{"class":"TPV","lat":1.0}]}"#).unwrap();
        assert!(matches!(
            fix_from_poll(&poll),
            Err(GpsdError::ReportUnavailable(SourceError::Incomplete(_)))
        ));

        let poll: Poll =
            serde_json::from_str(r#"{"active":1,"tpv":[{"class":"TPV","mode":1}]}"#).unwrap();
        let fix = fix_from_poll(&poll).unwrap();
        assert!(!fix.mode().has_fix());
    }

    #[test]
    fn test_request_failed_drops_broken_link() {
        let mut connection = Some(());
        let err = request_failed(&mut connection, SourceError::Inactive);
        assert!(matches!(err, GpsdError::ReportUnavailable(SourceError::Inactive)));
        assert!(connection.is_some());

        let err = request_failed(&mut connection, SourceError::Timeout);
        assert!(matches!(err, GpsdError::ReportUnavailable(SourceError::Timeout)));
        assert!(connection.is_none());
    }

    #[test]
    fn test_device_summary() {
        let device = Device {
            path: Some("/dev/ttyUSB0".into()),
            bps: Some(9600),
            driver: Some("u-blox".into()),
            ..Default::default()
        };
        assert_eq!(
            DeviceSummary::from(&device),
            DeviceSummary {
                path: Some("/dev/ttyUSB0".into()),
                bps: Some(9600),
                driver: Some("u-blox".into()),
            }
        );
    }
}
