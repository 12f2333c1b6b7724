use crate::{
    channel::{CallHandle, CallOptions, Channel},
    descriptor::MethodDescriptor,
    error::CallError,
    registry::Registry,
    stream::{MessageSink, MessageStream, PendingResponse, RequestSink, ResponseStream},
    types::CallShape,
};
use std::{fmt, sync::Arc};

/// The client half of a service.
///
/// Holds a shared channel, the service registry and the options applied to
/// every call. It keeps no per-call state, so one stub may issue any number
/// of concurrent calls; clone it freely.
#[derive(Clone)]
pub struct ClientStub {
    channel: Arc<dyn Channel>,
    registry: Registry,
    options: CallOptions,
}

impl ClientStub {
    pub fn new(channel: Arc<dyn Channel>, registry: Registry) -> Self {
        Self::with_call_options(channel, registry, CallOptions::default())
    }

    pub fn with_call_options(channel: Arc<dyn Channel>, registry: Registry, options: CallOptions) -> Self {
        Self {
            channel,
            registry,
            options,
        }
    }

    /// A stub over the same channel and registry using other options.
    pub fn with_options(&self, options: CallOptions) -> Self {
        Self {
            channel: self.channel.clone(),
            registry: self.registry.clone(),
            options,
        }
    }

    pub fn options(&self) -> &CallOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn open<Req, Resp>(
        &self,
        method: &MethodDescriptor<Req, Resp>,
        accepted: &[CallShape],
    ) -> Result<(RequestSink<Req>, ResponseStream<Resp>), CallError> {
        self.registry.resolve(method.info(), accepted)?;
        let CallHandle {
            requests,
            responses,
            cancel,
        } = self.channel.open_call(method.info(), &self.options)?;
        tracing::trace!(method = method.full_name(), "call opened");

        let requests = MessageSink::new(requests, method.request_marshaller().clone(), cancel.clone());
        let responses =
            MessageStream::new(responses, method.response_marshaller().clone(), cancel).cancel_on_drop();
        Ok((requests, responses))
    }

    /// Send the single request of a call and close the request side.
    ///
    /// A closed request queue is not reported here: the peer's reason for
    /// closing it arrives on the response side. If the peer closes that side
    /// too without a reason, the transport error is reported there instead.
    async fn send_only<Req, Resp>(
        requests: RequestSink<Req>,
        responses: &mut ResponseStream<Resp>,
        request: Req,
    ) -> Result<(), CallError> {
        match requests.send(request).await {
            Ok(()) => Ok(()),
            Err(err @ CallError::Transport(_)) => {
                responses.fail_on_close(err);
                Ok(())
            }
            Err(err) => {
                requests.cancel();
                Err(err)
            }
        }
    }

    /// One request, exactly one response or one error.
    pub async fn unary<Req, Resp>(
        &self,
        method: &MethodDescriptor<Req, Resp>,
        request: Req,
    ) -> Result<Resp, CallError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
    {
        let (requests, mut responses) = self.open(method, &[CallShape::Unary])?;
        Self::send_only(requests, &mut responses, request).await?;
        responses.single().await
    }

    /// Push any number of requests, then await the single response.
    pub fn client_streaming<Req, Resp>(
        &self,
        method: &MethodDescriptor<Req, Resp>,
    ) -> Result<(RequestSink<Req>, PendingResponse<Resp>), CallError> {
        let (requests, responses) = self.open(method, &[CallShape::ClientStreaming])?;
        Ok((requests, PendingResponse::new(responses)))
    }

    /// One request, any number of responses.
    pub async fn server_streaming<Req, Resp>(
        &self,
        method: &MethodDescriptor<Req, Resp>,
        request: Req,
    ) -> Result<ResponseStream<Resp>, CallError>
    where
        Req: Send + 'static,
    {
        let (requests, mut responses) = self.open(method, &[CallShape::ServerStreaming])?;
        Self::send_only(requests, &mut responses, request).await?;
        Ok(responses)
    }

    /// Independent request and response streams.
    ///
    /// Undetermined methods are called this way too.
    pub fn bidi_streaming<Req, Resp>(
        &self,
        method: &MethodDescriptor<Req, Resp>,
    ) -> Result<(RequestSink<Req>, ResponseStream<Resp>), CallError> {
        self.open(method, &[CallShape::BidiStreaming, CallShape::Undetermined])
    }
}

impl fmt::Debug for ClientStub {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ClientStub")
            .field("service", &self.registry.service_name())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
