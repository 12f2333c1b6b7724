//! The contract between the binding layer and a transport.
//!
//! A transport opens one call per invocation and hands back a
//! [`CallHandle`]: a request queue, a response queue and a cancellation
//! token shared with the peer. The peer side of the same call is a
//! [`ServerCall`]. Closing a queue (dropping its sender) is the normal
//! completion signal; an `Err` frame is the error-termination signal.

use crate::{error::CallError, types::MethodInfo};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// One unit on a call's queue: a marshalled message or a terminal error.
pub type Frame = Result<Bytes, CallError>;

/// Client end of an open call.
#[derive(Debug)]
pub struct CallHandle {
    pub requests: mpsc::Sender<Frame>,
    pub responses: mpsc::Receiver<Frame>,
    pub cancel: CancellationToken,
}

/// Server end of an open call.
#[derive(Debug)]
pub struct ServerCall {
    pub requests: mpsc::Receiver<Frame>,
    pub responses: mpsc::Sender<Frame>,
    pub cancel: CancellationToken,
}

/// Build the two connected ends of one call.
pub fn call_pair(buffer: usize) -> (CallHandle, ServerCall) {
    let buffer = buffer.max(1);
    let (request_tx, request_rx) = mpsc::channel(buffer);
    let (response_tx, response_rx) = mpsc::channel(buffer);
    let cancel = CancellationToken::new();
    let handle = CallHandle {
        requests: request_tx,
        responses: response_rx,
        cancel: cancel.clone(),
    };
    let server = ServerCall {
        requests: request_rx,
        responses: response_tx,
        cancel,
    };
    (handle, server)
}

/// Anything able to open a call for a method.
///
/// The binding layer only supplies marshalled bytes; framing, connection
/// management and routing by [`MethodInfo::full_name`] belong to the
/// implementation.
pub trait Channel: Send + Sync + 'static {
    fn open_call(&self, method: &MethodInfo, options: &CallOptions) -> Result<CallHandle, CallError>;
}

pub const DEFAULT_BUFFER: usize = 32;

/// Per-call settings carried by a client stub.
///
/// The binding layer does not interpret these; they are handed to the
/// channel on every call. Deserializable so they can live in configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CallOptions {
    /// Treated by the channel exactly like a cancellation once elapsed.
    pub timeout: Option<Duration>,
    /// Capacity of each of the call's queues.
    pub buffer: usize,
    /// Opaque key/value pairs for the transport and its interceptors.
    pub metadata: BTreeMap<String, String>,
}

impl Default for CallOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            buffer: DEFAULT_BUFFER,
            metadata: BTreeMap::new(),
        }
    }
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
