//! Asynchronous gpsd client implementation
//!
//! This module provides the low-level async client: it reads the version
//! banner, sends requests and pairs them with their replies. Sessions in
//! [`crate::session`] are built on top of it.
//!
//! For synchronous/blocking operations, see the `blocking` submodule.
//!
//! # Example
//!
//! ```no_run
//! use gpsd_fix::client::GpsdClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = GpsdClient::connect("127.0.0.1:2947").await?;
//! client.watch_mode(true).await?;
//!
//! let poll = client.poll().await?;
//! println!("Active devices: {:?}", poll.active);
//! # Ok(())
//! # }
//! ```

use tracing::debug;

use crate::{
    error::SourceError,
    protocol::{
        GpsdJsonDecodeAsync, GpsdJsonEncodeAsync, GpsdJsonRequest, GpsdJsonResponse,
        SourceResult, v3,
    },
};

/// Blocking (synchronous) client implementation
pub mod blocking;

/// Upper bound of unrelated messages skipped while waiting for a reply
pub(crate) const MAX_UNSOLICITED: usize = 32;

/// Trait defining a gpsd protocol version implementation
///
/// This trait specifies the protocol version and associated message types
/// for a particular version of the gpsd JSON protocol.
pub trait GpsdJsonProtocol: Send + Sync {
    /// Major version number of the protocol
    const API_VERSION_MAJOR: i32;
    /// Oldest supported minor version of the protocol
    const API_VERSION_MINOR: i32;

    /// Request message type for this protocol version
    type Request: GpsdJsonRequest + Send + Sync;
    /// Response message type for this protocol version
    type Response: GpsdJsonResponse + Send + Sync;
}

/// The major version must match exactly, the minor must be at least the
/// oldest supported one.
pub(crate) fn check_version<Proto: GpsdJsonProtocol>(
    version: &v3::response::Version,
) -> SourceResult<()> {
    if Proto::API_VERSION_MAJOR != version.proto_major
        || version.proto_minor < Proto::API_VERSION_MINOR
    {
        Err(SourceError::UnsupportedProtocolVersion((
            version.proto_major,
            version.proto_minor,
        )))
    } else {
        Ok(())
    }
}

/// Core implementation of an asynchronous gpsd client
///
/// # Type Parameters
/// * `Stream` - The underlying async I/O stream type
/// * `Proto` - The gpsd protocol version implementation
#[derive(Debug)]
pub struct GpsdClientCore<Stream, Proto> {
    reader: futures_util::io::BufReader<Stream>,
    buf: String,
    banner: v3::response::Version,
    _proto: std::marker::PhantomData<Proto>,
}

impl<Stream, Proto> GpsdClientCore<Stream, Proto>
where
    Proto: GpsdJsonProtocol,
{
    /// Opens a client over an established async stream
    ///
    /// Reads the VERSION banner gpsd sends on connect and checks protocol
    /// compatibility.
    pub async fn open(stream: Stream) -> SourceResult<Self>
    where
        Stream: futures_io::AsyncRead + futures_io::AsyncWrite + Unpin,
    {
        let mut reader = futures_util::io::BufReader::new(stream);
        let mut buf = String::new();

        let banner = match reader.read_response_async(&mut buf).await {
            Ok(Some(v3::ResponseMessage::Version(version))) => {
                check_version::<Proto>(&version)?;
                debug!(release = %version.release, "gpsd banner received");
                version
            }
            Ok(None) => {
                return Err(SourceError::ProtocolError(
                    "Connection closed by gpsd before version message",
                ));
            }
            Err(SourceError::Timeout) => return Err(SourceError::Timeout),
            Ok(Some(_)) | Err(_) => {
                return Err(SourceError::ProtocolError(
                    "Failed to read version message from gpsd",
                ));
            }
        };

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
    async fn send(&mut self, msg: &Proto::Request) -> SourceResult<()>
    where
        Stream: futures_io::AsyncWrite + Unpin,
    {
        self.reader.get_mut().write_request_async(msg).await
    }

    /// Receives a response message from the gpsd server
    ///
    /// Returns `None` if the connection is closed.
    async fn recv(&mut self) -> SourceResult<Option<Proto::Response>>
    where
        Stream: futures_io::AsyncRead + Unpin,
    {
        self.reader.read_response_async(&mut self.buf).await
    }
}

#[cfg(feature = "tokio")]
impl<Proto> GpsdClientCore<tokio_util::compat::Compat<tokio::net::TcpStream>, Proto>
where
    Proto: GpsdJsonProtocol,
{
    /// Connects to a gpsd server over TCP asynchronously
    ///
    /// # Example
    /// ```no_run
    /// # use gpsd_fix::client::GpsdClient;
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = GpsdClient::connect("127.0.0.1:2947").await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect<A: tokio::net::ToSocketAddrs>(addr: A) -> SourceResult<Self> {
        use tokio_util::compat::TokioAsyncReadCompatExt;

        let stream = tokio::net::TcpStream::connect(addr)
            .await
            .map_err(SourceError::from_io)?;
        GpsdClientCore::open(stream.compat()).await
    }
}

/// Type alias for an async gpsd client using protocol version 3
#[cfg(feature = "proto-v3")]
pub type GpsdClient<Stream> = GpsdClientCore<Stream, v3::V3>;

impl<Stream> GpsdClientCore<Stream, v3::V3>
where
    Stream: futures_io::AsyncRead + futures_io::AsyncWrite + Unpin,
{
    /// Lists all GPS devices known to the gpsd server
    pub async fn devices(&mut self) -> SourceResult<v3::response::DeviceList> {
        self.send(&v3::RequestMessage::Devices).await?;
        let v3::ResponseMessage::Devices(devices) = self.recv_reply().await? else {
            return Err(SourceError::ProtocolError(
                "Expected devices response from gpsd",
            ));
        };
        Ok(devices)
    }

    /// Polls for the current GPS fix data
    ///
    /// Returns the most recent fix information of all active devices.
    pub async fn poll(&mut self) -> SourceResult<v3::response::Poll> {
        self.send(&v3::RequestMessage::Poll).await?;
        let v3::ResponseMessage::Poll(poll) = self.recv_reply().await? else {
            return Err(SourceError::ProtocolError(
                "Expected poll response from gpsd",
            ));
        };
        Ok(poll)
    }

    /// Enables or disables watching without requesting a data stream
    ///
    /// Returns the device list gpsd sends along with the confirmation.
    pub async fn watch_mode(&mut self, enable: bool) -> SourceResult<v3::response::DeviceList> {
        let watch = v3::types::Watch {
            enable: Some(enable),
            ..Default::default()
        };
        self.send(&v3::RequestMessage::Watch(Some(watch))).await?;

        let v3::ResponseMessage::Devices(devices) = self.recv_reply().await? else {
            return Err(SourceError::ProtocolError(
                "Expected devices response from gpsd",
            ));
        };
        let v3::ResponseMessage::Watch(watch) = self.recv_reply().await? else {
            return Err(SourceError::ProtocolError(
                "Expected watch response from gpsd",
            ));
        };

        if watch.enable != Some(enable) {
            return Err(SourceError::ProtocolError(
                "gpsd did not confirm the watch policy",
            ));
        }
        Ok(devices)
    }

    /// Reads the next reply, skipping unsolicited reports
    async fn recv_reply(&mut self) -> SourceResult<v3::ResponseMessage> {
        for _ in 0..=MAX_UNSOLICITED {
            match self.recv().await? {
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
