// Error values crossing the trait seams. All of these are recoverable:
// the control loop maps them to an error screen and waits for the next
// button press.

use core::fmt;

/// Failure anywhere between issuing a request and receiving image bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    /// The network link is down; no request was attempted.
    LinkDown,
    /// The request exceeded the configured deadline.
    Timeout,
    /// Non-200 status line.
    Status(u16),
    /// The response body could not be interpreted as an image.
    Malformed(&'static str),
    /// 200 with no usable body.
    Empty,
    /// Socket-level read/write failure.
    Io(&'static str),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::LinkDown => write!(f, "network link down"),
            TransportError::Timeout => write!(f, "request timed out"),
            TransportError::Status(code) => write!(f, "http status {}", code),
            TransportError::Malformed(m) => write!(f, "malformed response: {}", m),
            TransportError::Empty => write!(f, "empty response"),
            TransportError::Io(m) => write!(f, "transport io: {}", m),
        }
    }
}

/// Display-bus failure. Any of these aborts the current frame; frames
/// are only ever re-rendered whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkError {
    Bus(&'static str),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::Bus(m) => write!(f, "display bus: {}", m),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    Io(&'static str),
    OutOfSpace,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::Io(m) => write!(f, "storage io: {}", m),
            StorageError::OutOfSpace => write!(f, "storage full"),
        }
    }
}
