//! Typed views over a call's queues.

use crate::{
    channel::Frame,
    error::CallError,
    marshal::Marshaller,
};
use futures::{future::BoxFuture, stream, Stream};
use std::{future::IntoFuture, sync::Arc};
use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Outbound half of a call: requests on the client, responses on the server.
pub struct MessageSink<T> {
    tx: mpsc::Sender<Frame>,
    marshaller: Arc<dyn Marshaller<T>>,
    cancel: CancellationToken,
}

pub type RequestSink<T> = MessageSink<T>;
pub type ResponseSink<T> = MessageSink<T>;

impl<T> MessageSink<T> {
    pub(crate) fn new(
        tx: mpsc::Sender<Frame>,
        marshaller: Arc<dyn Marshaller<T>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tx,
            marshaller,
            cancel,
        }
    }

    /// Marshal and enqueue one message, waiting for queue capacity.
    pub async fn send(&self, value: T) -> Result<(), CallError> {
        if self.cancel.is_cancelled() {
            return Err(CallError::Cancelled);
        }
        let bytes = self.marshaller.serialize(&value)?;
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CallError::Cancelled),
            sent = self.tx.send(Ok(bytes)) => {
                sent.map_err(|_| CallError::Transport("peer closed the stream".to_owned()))
            }
        }
    }

    /// Close this direction normally.
    pub fn finish(self) {}

    /// Terminate this direction with an error. Nothing is delivered once the
    /// call is cancelled.
    pub async fn fail(self, error: CallError) {
        if self.cancel.is_cancelled() {
            return;
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            sent = self.tx.send(Err(error)) => {
                if sent.is_err() {
                    tracing::trace!("peer gone before error frame was delivered");
                }
            }
        }
    }

    /// Cancel the whole call, both directions.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the call is cancelled by either side.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl<T> Clone for MessageSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            marshaller: self.marshaller.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

enum StreamState {
    Open,
    Closed,
    Failed(CallError),
}

/// Inbound half of a call: responses on the client, requests on the server.
pub struct MessageStream<T> {
    rx: mpsc::Receiver<Frame>,
    marshaller: Arc<dyn Marshaller<T>>,
    cancel: CancellationToken,
    state: StreamState,
    on_close: Option<CallError>,
    _guard: Option<DropGuard>,
}

pub type RequestStream<T> = MessageStream<T>;
pub type ResponseStream<T> = MessageStream<T>;

impl<T> MessageStream<T> {
    pub(crate) fn new(
        rx: mpsc::Receiver<Frame>,
        marshaller: Arc<dyn Marshaller<T>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            rx,
            marshaller,
            cancel,
            state: StreamState::Open,
            on_close: None,
            _guard: None,
        }
    }

    /// Cancel the call when this stream is dropped.
    pub(crate) fn cancel_on_drop(mut self) -> Self {
        self._guard = Some(self.cancel.clone().drop_guard());
        self
    }

    /// Report `error` instead of normal completion if the peer closes the
    /// stream without a terminal frame.
    pub(crate) fn fail_on_close(&mut self, error: CallError) {
        self.on_close = Some(error);
    }

    /// The next message, `Ok(None)` once the peer completed normally.
    ///
    /// After cancellation has been observed every read reports
    /// [`CallError::Cancelled`], even if messages are still queued.
    pub async fn message(&mut self) -> Result<Option<T>, CallError> {
        if self.cancel.is_cancelled() {
            self.rx.close();
            return Err(CallError::Cancelled);
        }
        match &self.state {
            StreamState::Open => {}
            StreamState::Closed => return Ok(None),
            StreamState::Failed(err) => return Err(err.clone()),
        }

        let frame = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            frame = self.rx.recv() => Some(frame),
        };
        let Some(frame) = frame else {
            self.rx.close();
            return Err(CallError::Cancelled);
        };

        match frame {
            None => match self.on_close.take() {
                Some(err) => {
                    self.state = StreamState::Failed(err.clone());
                    Err(err)
                }
                None => {
                    self.state = StreamState::Closed;
                    Ok(None)
                }
            },
            Some(Ok(bytes)) => match self.marshaller.deserialize(bytes) {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    let err = CallError::from(err);
                    self.rx.close();
                    self.state = StreamState::Failed(err.clone());
                    Err(err)
                }
            },
            Some(Err(err)) => {
                self.rx.close();
                self.state = StreamState::Failed(err.clone());
                Err(err)
            }
        }
    }

    /// Cancel the whole call, both directions.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Adapt into a [`Stream`] that ends after completion or the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<T, CallError>> + Send
    where
        T: Send + 'static,
    {
        stream::unfold(Some(self), |state| async move {
            let mut messages = state?;
            match messages.message().await {
                Ok(Some(value)) => Some((Ok(value), Some(messages))),
                Ok(None) => None,
                Err(err) => Some((Err(err), None)),
            }
        })
    }

    /// Read exactly one message; a stream that completes empty is a
    /// protocol violation.
    pub(crate) async fn single(&mut self) -> Result<T, CallError> {
        self.message()
            .await?
            .ok_or_else(|| CallError::Protocol("stream completed without a message".to_owned()))
    }
}

/// The single response of a client-streaming call.
///
/// Await it after finishing the request sink.
pub struct PendingResponse<T> {
    responses: MessageStream<T>,
}

impl<T> PendingResponse<T> {
    pub(crate) fn new(responses: MessageStream<T>) -> Self {
        Self { responses }
    }

    pub fn cancel(&self) {
        self.responses.cancel();
    }

    pub async fn response(mut self) -> Result<T, CallError> {
        self.responses.single().await
    }
}

impl<T> IntoFuture for PendingResponse<T>
where
    T: Send + 'static,
{
    type Output = Result<T, CallError>;
    type IntoFuture = BoxFuture<'static, Result<T, CallError>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.response())
    }
}
