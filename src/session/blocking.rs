//! Blocking session manager
//!
//! [`Session`] owns at most one [`Connection`] to gpsd. Every operation
//! blocks until it succeeds, fails, or hits the timeouts of its
//! [`SessionConfig`]. There is no internal retry; see [`crate::retry`].

use std::net::TcpStream;

use tracing::{debug, info};

use crate::{
    Result,
    client::blocking::GpsdClient,
    error::GpsdError,
    fix::FixRecord,
    protocol::{
        SourceResult,
        v3::response::{DeviceList, Version},
    },
    session::{DeviceSummary, SessionConfig, fix_from_poll, log_devices, request_failed},
};

/// One live link to gpsd
#[derive(Debug)]
pub struct Connection {
    host: String,
    port: u16,
    client: GpsdClient<TcpStream>,
    devices: DeviceList,
}

impl Connection {
    /// Connects, reads the banner and enables watching
    fn open(host: &str, port: u16, config: &SessionConfig) -> SourceResult<Self> {
        let mut client = GpsdClient::connect_timeout(
            (host, port),
            config.connect_timeout,
            config.read_timeout,
        )?;
        let devices = client.watch_mode(true)?;
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

/// Session manager for a gpsd daemon
///
/// # Example
/// ```no_run
/// use gpsd_fix::session::{SessionConfig, blocking::Session};
///
/// let mut session = Session::new(SessionConfig::default());
/// session.connect().unwrap();
///
/// let fix = session.fetch_current().unwrap();
/// if let Ok((lat, lon)) = fix.position() {
///     println!("lat {lat}, lon {lon}");
/// }
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
    ///
    /// See [`Session::connect_to`].
    pub fn connect(&mut self) -> Result<()> {
        let host = self.config.host.clone();
        self.connect_to(&host, self.config.port)
    }

    /// Connects to `host:port`, replacing any live connection
    ///
    /// The previous connection is dropped before the new one is opened, so
    /// a failed attempt leaves the session disconnected. Fails with
    /// [`GpsdError::ConnectionError`] when the endpoint is unreachable or
    /// the handshake fails.
    pub fn connect_to(&mut self, host: &str, port: u16) -> Result<()> {
        if self.connection.take().is_some() {
            debug!("dropping previous gpsd connection");
        }

        let connection =
            Connection::open(host, port, &self.config).map_err(GpsdError::ConnectionError)?;
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
    /// Fails with [`GpsdError::NotConnected`] before a successful connect
    /// and with [`GpsdError::ReportUnavailable`] when gpsd cannot produce a
    /// valid report (no active device, malformed data, timeout).
    ///
    /// A timeout, an unreadable reply or a closed stream also drops the
    /// connection, since a late reply could otherwise answer the next poll.
    pub fn fetch_current(&mut self) -> Result<FixRecord> {
        let result = self.connection_mut()?.client.poll();
        let poll = result.map_err(|err| request_failed(&mut self.connection, err))?;
        fix_from_poll(&poll)
    }

    /// Paths of the devices currently attached to gpsd
    ///
    /// Returns an empty list when none are attached.
    pub fn list_devices(&mut self) -> Result<Vec<String>> {
        let result = self.connection_mut()?.client.devices();
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
