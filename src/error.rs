//! Error types for gpsd sessions and fix records
//!
//! Two levels are used: [`GpsdError`] is what every public operation returns
//! and tells the caller *which* contract failed (connect, fetch, parse or a
//! derived accessor). [`SourceError`] carries the underlying cause coming
//! from the daemon link.

use crate::protocol::v3::types::FixMode;

/// Main error type for gpsd sessions and fix records
#[derive(Debug)]
pub enum GpsdError {
    /// Connecting to the daemon or the initial handshake failed
    ///
    /// Never retried internally; call `connect()` again.
    ConnectionError(SourceError),

    /// A request was attempted without a live connection
    NotConnected,

    /// The daemon is reachable but did not produce a usable report
    ///
    /// This includes "no fix yet" situations such as a POLL with no active
    /// device, which are normal while a receiver warms up.
    ReportUnavailable(SourceError),

    /// The raw report lacks a valid fix mode or carries mistyped fields
    MalformedReport(String),

    /// A derived accessor needs a better fix than the record has
    ModeTooLow {
        /// Minimum mode the accessor needs
        required: FixMode,
        /// Mode of the record
        actual: FixMode,
    },

    /// The mode qualifies but the daemon did not report this field
    FieldUnavailable(&'static str),
}

impl GpsdError {
    /// Whether trying the same operation again may succeed
    ///
    /// Only [`GpsdError::ReportUnavailable`] is transient; a lost
    /// connection or a malformed record will not fix itself.
    pub fn is_transient(&self) -> bool {
        matches!(self, GpsdError::ReportUnavailable(_))
    }
}

impl core::fmt::Display for GpsdError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpsdError::ConnectionError(err) => write!(f, "ConnectionError: {}", err),
            GpsdError::NotConnected => write!(f, "NotConnected: call connect() first"),
            GpsdError::ReportUnavailable(err) => write!(f, "ReportUnavailable: {}", err),
            GpsdError::MalformedReport(msg) => write!(f, "MalformedReport: {}", msg),
            GpsdError::ModeTooLow { required, actual } => {
                write!(f, "ModeTooLow: needs {:?}, have {:?}", required, actual)
            }
            GpsdError::FieldUnavailable(field) => write!(f, "FieldUnavailable: {}", field),
        }
    }
}

impl core::error::Error for GpsdError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            GpsdError::ConnectionError(err) | GpsdError::ReportUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

/// Cause of a failure on the daemon link
#[derive(Debug)]
pub enum SourceError {
    /// I/O error occurred during network communication
    ///
    /// This typically happens when the connection to gpsd is lost,
    /// the server is unreachable, or there are network-related issues.
    IoError(std::io::Error),

    /// JSON serialization/deserialization error
    ///
    /// Occurs when gpsd sends malformed JSON or when the response
    /// doesn't match the expected message structure.
    SerdeError(serde_json::Error),

    /// gpsd protocol version is not supported
    ///
    /// The tuple contains (major, minor) version numbers.
    UnsupportedProtocolVersion((i32, i32)),

    /// Protocol-level error
    ///
    /// Unexpected message sequences, missing banner or missing responses.
    ProtocolError(&'static str),

    /// gpsd answered with an ERROR message
    Daemon(String),

    /// No data arrived within the configured timeout
    Timeout,

    /// gpsd has no active device, so there is no fix to report
    Inactive,

    /// The report is missing required content
    Incomplete(String),
}

impl SourceError {
    /// Classifies an I/O error, folding read/connect timeouts into [`SourceError::Timeout`]
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => SourceError::Timeout,
            _ => SourceError::IoError(err),
        }
    }

    /// Whether the reply stream can no longer be trusted after this error
    ///
    /// After a timeout, a transport failure, an unreadable line or a closed
    /// stream, a late or partial reply may still be in flight, so the next
    /// request could be paired with it. Errors decoded from a complete reply
    /// (`Daemon`, `Inactive`, `Incomplete`) leave the stream in step.
    pub fn breaks_link(&self) -> bool {
        matches!(
            self,
            SourceError::IoError(_)
                | SourceError::SerdeError(_)
                | SourceError::ProtocolError(_)
                | SourceError::Timeout
        )
    }
}

impl core::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::IoError(err) => write!(f, "IoError: {}", err),
            SourceError::SerdeError(err) => write!(f, "SerdeError: {}", err),
            SourceError::UnsupportedProtocolVersion((major, minor)) => {
                write!(f, "UnsupportedProtocolVersion: {}.{}", major, minor)
            }
            SourceError::ProtocolError(msg) => write!(f, "ProtocolError: {}", msg),
            SourceError::Daemon(msg) => write!(f, "gpsd error: {}", msg),
            SourceError::Timeout => write!(f, "timed out waiting for gpsd"),
            SourceError::Inactive => write!(f, "gpsd has no active device"),
            SourceError::Incomplete(msg) => write!(f, "incomplete report: {}", msg),
        }
    }
}

impl core::error::Error for SourceError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            SourceError::IoError(err) => Some(err),
            SourceError::SerdeError(err) => Some(err),
            _ => None,
        }
    }
}
