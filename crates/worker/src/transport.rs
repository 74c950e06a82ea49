//! Transport endpoints.
//!
//! The pipeline consumes the two narrow traits below, one socket per stage;
//! production wiring is ZeroMQ push/pull over the well-known `ipc://`
//! endpoints, connected (not bound) like the rest of the pipeline's workers.
//! Tests substitute channel-backed endpoints.

use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Failure reported by a transport endpoint.
#[derive(Debug, Error)]
#[error("transport: {0}")]
pub struct TransportError(String);

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<zmq::Error> for TransportError {
    fn from(err: zmq::Error) -> Self {
        Self(err.to_string())
    }
}

/// Receiving side of the pipeline, owned by the ingress thread.
pub trait PullEndpoint: Send {
    /// Wait up to `timeout` for one message; `None` when none arrived.
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError>;
}

/// Sending side of the pipeline, owned by the egress thread.
pub trait PushEndpoint: Send {
    fn send(&mut self, envelope: &[u8]) -> Result<(), TransportError>;
}

/// How long a send may block before the frame is counted as dropped.
const SEND_TIMEOUT_MS: i32 = 1_000;

/// ZeroMQ PULL socket.
pub struct ZmqPull {
    socket: zmq::Socket,
    timeout_ms: i32,
}

impl ZmqPull {
    pub fn connect(context: &zmq::Context, endpoint: &str) -> Result<Self, TransportError> {
        let socket = context.socket(zmq::PULL)?;
        socket.connect(endpoint)?;
        debug!(endpoint, "pull endpoint connected");
        Ok(Self {
            socket,
            timeout_ms: -1,
        })
    }
}

impl PullEndpoint for ZmqPull {
    fn recv(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, TransportError> {
        let ms = timeout.as_millis().min(i32::MAX as u128) as i32;
        if ms != self.timeout_ms {
            self.socket.set_rcvtimeo(ms)?;
            self.timeout_ms = ms;
        }
        match self.socket.recv_bytes(0) {
            Ok(payload) => Ok(Some(payload)),
            Err(zmq::Error::EAGAIN) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

/// ZeroMQ PUSH socket.
pub struct ZmqPush {
    socket: zmq::Socket,
}

impl ZmqPush {
    pub fn connect(context: &zmq::Context, endpoint: &str) -> Result<Self, TransportError> {
        let socket = context.socket(zmq::PUSH)?;
        socket.set_sndtimeo(SEND_TIMEOUT_MS)?;
        // in-flight envelopes are dropped at shutdown, not flushed
        socket.set_linger(0)?;
        socket.connect(endpoint)?;
        debug!(endpoint, "push endpoint connected");
        Ok(Self { socket })
    }
}

impl PushEndpoint for ZmqPush {
    fn send(&mut self, envelope: &[u8]) -> Result<(), TransportError> {
        self.socket.send(envelope, 0).map_err(Into::into)
    }
}
