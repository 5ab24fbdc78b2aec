use super::types::Watch;

/// Requests a polling client sends to gpsd
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// `?DEVICES;` — list attached receivers
    Devices,
    /// `?WATCH;` — query or change the watch policy
    Watch(Option<Watch>),
    /// `?POLL;` — latest fix of every active device
    Poll,
}
