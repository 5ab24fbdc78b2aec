//! Blocking (synchronous) gpsd client implementation
//!
//! Same request/response pairing as the async client, over any
//! `Read + Write` stream, typically a [`TcpStream`].

use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::client::{GpsdJsonProtocol, MAX_UNSOLICITED, check_version};
use crate::error::SourceError;
use crate::protocol::{GpsdJsonDecode, GpsdJsonEncode, SourceResult, v3};

/// Core implementation of a blocking gpsd client
///
/// Handles the version banner, message serialization/deserialization and
/// keeps the read buffer between requests.
///
/// # Type Parameters
/// * `Stream` - The underlying I/O stream type (e.g., TcpStream)
/// * `Proto` - The gpsd protocol version implementation
#[derive(Debug)]
pub struct GpsdClientCore<Stream, Proto> {
    reader: std::io::BufReader<Stream>,
    buf: String,
    banner: v3::response::Version,
    _proto: std::marker::PhantomData<Proto>,
}

impl<Stream, Proto> GpsdClientCore<Stream, Proto>
where
    Proto: GpsdJsonProtocol,
{
    /// Opens a client over an established stream
    ///
    /// Reads the VERSION banner gpsd sends on connect and checks protocol
    /// compatibility.
    pub fn open(stream: Stream) -> SourceResult<Self>
    where
        Stream: std::io::Read + std::io::Write,
    {
        let mut reader = std::io::BufReader::new(stream);
        let mut buf = String::new();
        let banner = Self::ensure_version(&mut reader, &mut buf)?;

        Ok(GpsdClientCore {
            reader,
            buf,
            banner,
            _proto: std::marker::PhantomData,
        })
    }

    /// Version banner received when the connection was opened
    pub fn banner(&self) -> &v3::response::Version {
        &self.banner
    }

    /// Sends a request message to the gpsd server
    fn send(&mut self, msg: &Proto::Request) -> SourceResult<()>
    where
        Stream: std::io::Write,
    {
        self.reader.get_mut().write_request(msg)
    }

    /// Receives a response message from the gpsd server
    ///
    /// Returns `None` if the connection is closed.
    fn recv(&mut self) -> SourceResult<Option<Proto::Response>>
    where
        Stream: std::io::Read,
    {
        self.reader.read_response(&mut self.buf)
    }

    fn ensure_version(
        reader: &mut std::io::BufReader<Stream>,
        buf: &mut String,
    ) -> SourceResult<v3::response::Version>
    where
        Stream: std::io::Read,
    {
        match reader.read_response(buf) {
            Ok(Some(v3::ResponseMessage::Version(version))) => {
                check_version::<Proto>(&version)?;
                debug!(release = %version.release, "gpsd banner received");
                Ok(version)
            }
            Ok(None) => Err(SourceError::ProtocolError(
                "Connection closed by gpsd before version message",
            )),
            Err(SourceError::Timeout) => Err(SourceError::Timeout),
            Ok(Some(_)) | Err(_) => Err(SourceError::ProtocolError(
                "Failed to read version message from gpsd",
            )),
        }
    }
}

impl<Proto> GpsdClientCore<TcpStream, Proto>
where
    Proto: GpsdJsonProtocol,
{
    /// Connects to a gpsd server over TCP
    ///
    /// # Example
    /// ```no_run
    /// # use gpsd_fix::client::blocking::GpsdClient;
    /// let client = GpsdClient::connect("127.0.0.1:2947").unwrap();
    /// ```
    pub fn connect<A: ToSocketAddrs>(addr: A) -> SourceResult<Self> {
        let stream = TcpStream::connect(addr).map_err(SourceError::from_io)?;
        Self::open(stream)
    }

    /// Connects with a bounded connect time and per-read/write timeout
    ///
    /// Every resolved address is tried in turn; the last error is returned
    /// when none accepts.
    pub fn connect_timeout<A: ToSocketAddrs>(
        addr: A,
        connect_timeout: Duration,
        io_timeout: Duration,
    ) -> SourceResult<Self> {
        let mut last_err = None;
        for sock_addr in addr.to_socket_addrs().map_err(SourceError::IoError)? {
            match TcpStream::connect_timeout(&sock_addr, connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(io_timeout))
                        .and_then(|_| stream.set_write_timeout(Some(io_timeout)))
                        .map_err(SourceError::IoError)?;
                    return Self::open(stream);
                }
                Err(err) => {
                    debug!(addr = %sock_addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(match last_err {
            Some(err) => SourceError::from_io(err),
            None => SourceError::ProtocolError("address resolved to nothing"),
        })
    }
}

impl<Proto> TryFrom<TcpStream> for GpsdClientCore<TcpStream, Proto>
where
    Proto: GpsdJsonProtocol,
{
    type Error = SourceError;

    fn try_from(stream: TcpStream) -> SourceResult<Self> {
        Self::open(stream)
    }
}

/// Type alias for a gpsd client using protocol version 3
#[cfg(feature = "proto-v3")]
pub type GpsdClient<Stream> = GpsdClientCore<Stream, v3::V3>;

impl<Stream> GpsdClientCore<Stream, v3::V3>
where
    Stream: std::io::Read + std::io::Write,
{
    /// Lists all GPS devices known to the gpsd server
    pub fn devices(&mut self) -> SourceResult<v3::response::DeviceList> {
        self.send(&v3::RequestMessage::Devices)?;
        let v3::ResponseMessage::Devices(devices) = self.recv_reply()? else {
            return Err(SourceError::ProtocolError(
                "Expected devices response from gpsd",
            ));
        };
        Ok(devices)
    }

    /// Polls for the current GPS fix data
    ///
    /// Returns the most recent fix information of all active devices.
    pub fn poll(&mut self) -> SourceResult<v3::response::Poll> {
        self.send(&v3::RequestMessage::Poll)?;
        let v3::ResponseMessage::Poll(poll) = self.recv_reply()? else {
            return Err(SourceError::ProtocolError(
                "Expected poll response from gpsd",
            ));
        };
        Ok(poll)
    }

    /// Enables or disables watching without requesting a data stream
    ///
    /// gpsd only polls devices while at least one client watches, so a
    /// POLL-driven client enables watching once after connecting. Returns
    /// the device list gpsd sends along with the confirmation.
    pub fn watch_mode(&mut self, enable: bool) -> SourceResult<v3::response::DeviceList> {
        let (watch, devices) = self.set_watch(v3::types::Watch {
            enable: Some(enable),
            ..Default::default()
        })?;

        if watch.enable != Some(enable) {
            return Err(SourceError::ProtocolError(
                "gpsd did not confirm the watch policy",
            ));
        }
        Ok(devices)
    }

    /// Configures watch mode settings
    fn set_watch(
        &mut self,
        watch: v3::types::Watch,
    ) -> SourceResult<(v3::types::Watch, v3::response::DeviceList)> {
        self.send(&v3::RequestMessage::Watch(Some(watch)))?;
        let v3::ResponseMessage::Devices(devices) = self.recv_reply()? else {
            return Err(SourceError::ProtocolError(
                "Expected devices response from gpsd",
            ));
        };
        let v3::ResponseMessage::Watch(watch) = self.recv_reply()? else {
            return Err(SourceError::ProtocolError(
                "Expected watch response from gpsd",
            ));
        };

        Ok((watch, devices))
    }

    /// Reads the next reply, skipping unsolicited reports
    ///
    /// An ERROR message becomes [`SourceError::Daemon`], EOF a protocol error.
    fn recv_reply(&mut self) -> SourceResult<v3::ResponseMessage> {
        for _ in 0..=MAX_UNSOLICITED {
            match self.recv()? {
                None => {
                    return Err(SourceError::ProtocolError(
                        "Connection closed by gpsd",
                    ));
                }
                Some(v3::ResponseMessage::Error(err)) => {
                    return Err(SourceError::Daemon(err.message));
                }
                Some(
                    v3::ResponseMessage::Tpv(_)
                    | v3::ResponseMessage::Sky(_)
                    | v3::ResponseMessage::Other,
                ) => debug!("skipping unsolicited message"),
                Some(reply) => return Ok(reply),
            }
        }

        Err(SourceError::ProtocolError(
            "Too many unsolicited messages while waiting for a reply",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory duplex: reads from a script, records writes
    #[derive(Debug)]
    struct Scripted {
        input: std::io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Scripted {
        fn new(lines: &[&str]) -> Self {
            let mut script = String::new();
            for line in lines {
                script.push_str(line);
                script.push('\n');
            }
            Scripted {
                input: std::io::Cursor::new(script.into_bytes()),
                output: Vec::new(),
            }
        }
    }

    impl std::io::Read for Scripted {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl std::io::Write for Scripted {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    const BANNER: &str =
        r#"{"class":"VERSION","release":"3.25","rev":"3.25","proto_major":3,"proto_minor":15}"#;

    #[test]
    fn test_open_reads_banner() {
        let client = GpsdClient::open(Scripted::new(&[BANNER])).unwrap();
        assert_eq!(client.banner().release, "3.25");
    }

    #[test]
    fn test_open_rejects_foreign_banner() {
        let err = GpsdClient::open(Scripted::new(&["SSH-2.0-OpenSSH_9.6"])).unwrap_err();
        assert!(matches!(err, SourceError::ProtocolError(_)));

        let err = GpsdClient::open(Scripted::new(&[])).unwrap_err();
        assert!(matches!(err, SourceError::ProtocolError(_)));
    }

    #[test]
    fn test_open_rejects_other_major_version() {
        let banner = r#"{"class":"VERSION","release":"2.95","rev":"","proto_major":2,"proto_minor":0}"#;
        let err = GpsdClient::open(Scripted::new(&[banner])).unwrap_err();
        assert!(matches!(
            err,
            SourceError::UnsupportedProtocolVersion((2, 0))
        ));
    }

    #[test]
    fn test_poll_skips_unsolicited_and_reports_errors() {
        let mut client = GpsdClient::open(Scripted::new(&[
            BANNER,
            r#"{"class":"SKY","satellites":[]}"#,
            r#"{"class":"POLL","active":1,"tpv":[{"class":"TPV","mode":1}],"sky":[]}"#,
            r#"{"class":"ERROR","message":"Unrecognized request"}"#,
        ]))
        .unwrap();

        let poll = client.poll().unwrap();
        assert_eq!(poll.tpv.len(), 1);

        let err = client.poll().unwrap_err();
        assert!(matches!(err, SourceError::Daemon(ref msg) if msg == "Unrecognized request"));

        let sent = String::from_utf8(client.reader.get_ref().output.clone()).unwrap();
        assert_eq!(sent, "?POLL;?POLL;");
    }

    #[test]
    fn test_watch_mode_returns_devices() {
        let mut client = GpsdClient::open(Scripted::new(&[
            BANNER,
            r#"{"class":"DEVICES","devices":[{"class":"DEVICE","path":"/dev/ttyUSB0"}]}"#,
            r#"{"class":"WATCH","enable":true,"json":false}"#,
        ]))
        .unwrap();

        let devices = client.watch_mode(true).unwrap();
        assert_eq!(devices.paths(), vec!["/dev/ttyUSB0"]);
    }
}
