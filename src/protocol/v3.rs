//! gpsd JSON protocol version 3
//!
//! Only the part of the protocol a fix-polling client needs is modeled:
//! the VERSION banner, WATCH, DEVICES and POLL (with its TPV and SKY
//! payloads), plus ERROR replies.
//!
//! # Protocol Overview
//!
//! - Commands start with '?' and end with ';'
//! - Responses are JSON objects with a "class" field indicating message type
//! - With watching enabled but no output format requested, gpsd only
//!   answers explicit requests, which is how POLL-driven clients run
//!
//! # References
//!
//! - [gpsd protocol documentation](https://gpsd.io/gpsd_json.html)

use crate::{
    client::GpsdJsonProtocol,
    protocol::{GpsdJsonRequest, GpsdJsonResponse},
};

/// Request message types
pub mod request;
/// Response message types and parsers
pub mod response;
/// Common data types used in protocol messages
pub mod types;

/// Protocol major version this client speaks
pub const API_VERSION_MAJOR: i32 = 3;

/// Oldest protocol minor version accepted
///
/// `?POLL;` has been available since the first 3.x protocol release.
pub const API_VERSION_MINOR: i32 = 1;

/// Protocol version 3 implementation marker
#[derive(Debug)]
pub struct V3;

impl GpsdJsonProtocol for V3 {
    const API_VERSION_MAJOR: i32 = API_VERSION_MAJOR;
    const API_VERSION_MINOR: i32 = API_VERSION_MINOR;

    type Request = request::Message;
    type Response = response::Message;
}

/// Type alias for version 3 response messages
pub type ResponseMessage = response::Message;
impl GpsdJsonResponse for ResponseMessage {}

/// Type alias for version 3 request messages
pub type RequestMessage = request::Message;

impl GpsdJsonRequest for RequestMessage {
    /// Converts a request message into a gpsd command string
    ///
    /// - Simple commands: `?COMMAND;`
    /// - Commands with parameters: `?COMMAND={"json":"params"};`
    fn to_command(&self) -> String {
        match self {
            RequestMessage::Devices => "?DEVICES;".into(),
            RequestMessage::Watch(Some(watch)) => match serde_json::to_string(watch) {
                Ok(body) => format!("?WATCH={};", body),
                Err(_) => "?WATCH;".into(),
            },
            RequestMessage::Watch(None) => "?WATCH;".into(),
            RequestMessage::Poll => "?POLL;".into(),
        }
    }
}
