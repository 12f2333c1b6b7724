use crate::{
    channel::ServerCall,
    descriptor::MethodDescriptor,
    error::{CallError, RegistryError},
    registry::Registry,
    stream::{MessageSink, MessageStream, RequestStream, ResponseSink},
    types::{CallShape, MethodInfo},
};
use futures::future::{ready, BoxFuture};
use std::{fmt, future::Future, sync::Arc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Where a single server-side call ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Completed,
    Failed(CallError),
    Unimplemented,
}

/// States of a call on the server.
///
/// `Received -> (Dispatched -> {Completed | Failed}) | Unimplemented`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Received,
    Dispatched,
    Completed,
    Failed,
    Unimplemented,
}

impl CallOutcome {
    pub fn state(&self) -> CallState {
        match self {
            CallOutcome::Completed => CallState::Completed,
            CallOutcome::Failed(_) => CallState::Failed,
            CallOutcome::Unimplemented => CallState::Unimplemented,
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use CallState::*;
        f.write_str(match self {
            Received => "received",
            Dispatched => "dispatched",
            Completed => "completed",
            Failed => "failed",
            Unimplemented => "unimplemented",
        })
    }
}

/// A type-erased handler for one method, fed raw calls.
trait MethodHandler: Send + Sync {
    fn is_implemented(&self) -> bool {
        true
    }

    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome>;
}

/// Answer a call with `Unimplemented` without reading its request.
pub(crate) fn reject(full_name: &str, call: ServerCall) -> CallOutcome {
    let ServerCall {
        requests,
        responses,
        ..
    } = call;
    drop(requests);
    let err = CallError::Unimplemented(full_name.to_owned());
    if responses.try_send(Err(err)).is_err() {
        tracing::warn!(method = full_name, "could not deliver unimplemented status");
    }
    CallOutcome::Unimplemented
}

struct Unimplemented {
    info: Arc<MethodInfo>,
}

impl MethodHandler for Unimplemented {
    fn is_implemented(&self) -> bool {
        false
    }

    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        Box::pin(ready(reject(self.info.full_name(), call)))
    }
}

fn open<Req, Resp>(
    method: &MethodDescriptor<Req, Resp>,
    call: ServerCall,
) -> (RequestStream<Req>, ResponseSink<Resp>) {
    let ServerCall {
        requests,
        responses,
        cancel,
    } = call;
    let requests = MessageStream::new(requests, method.request_marshaller().clone(), cancel.clone());
    let responses = MessageSink::new(responses, method.response_marshaller().clone(), cancel);
    (requests, responses)
}

/// Run `fut` unless the call is cancelled first, in which case `fut` is
/// dropped right away.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, CallError>
where
    F: Future<Output = Result<T, CallError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(CallError::Cancelled),
        result = fut => result,
    }
}

async fn conclude<Resp>(responses: ResponseSink<Resp>, result: Result<(), CallError>) -> CallOutcome {
    match result {
        Ok(()) => {
            responses.finish();
            CallOutcome::Completed
        }
        Err(err) => {
            responses.fail(err.clone()).await;
            CallOutcome::Failed(err)
        }
    }
}

struct UnaryHandler<Req, Resp, F> {
    method: MethodDescriptor<Req, Resp>,
    handler: Arc<F>,
}

impl<Req, Resp, F, Fut> MethodHandler for UnaryHandler<Req, Resp, F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, CallError>> + Send + 'static,
{
    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let handler = self.handler.clone();
        let (mut requests, responses) = open(&self.method, call);
        Box::pin(async move {
            let result = match requests.single().await {
                Ok(request) => {
                    let token = responses.token().clone();
                    match cancellable(&token, (*handler)(request)).await {
                        Ok(response) => responses.send(response).await,
                        Err(err) => Err(err),
                    }
                }
                Err(err) => Err(err),
            };
            conclude(responses, result).await
        })
    }
}

struct ClientStreamingHandler<Req, Resp, F> {
    method: MethodDescriptor<Req, Resp>,
    handler: Arc<F>,
}

impl<Req, Resp, F, Fut> MethodHandler for ClientStreamingHandler<Req, Resp, F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(RequestStream<Req>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, CallError>> + Send + 'static,
{
    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let handler = self.handler.clone();
        let (requests, responses) = open(&self.method, call);
        Box::pin(async move {
            let token = responses.token().clone();
            let result = match cancellable(&token, (*handler)(requests)).await {
                Ok(response) => responses.send(response).await,
                Err(err) => Err(err),
            };
            conclude(responses, result).await
        })
    }
}

struct ServerStreamingHandler<Req, Resp, F> {
    method: MethodDescriptor<Req, Resp>,
    handler: Arc<F>,
}

impl<Req, Resp, F, Fut> MethodHandler for ServerStreamingHandler<Req, Resp, F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(Req, ResponseSink<Resp>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallError>> + Send + 'static,
{
    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let handler = self.handler.clone();
        let (mut requests, responses) = open(&self.method, call);
        Box::pin(async move {
            let result = match requests.single().await {
                Ok(request) => {
                    let token = responses.token().clone();
                    cancellable(&token, (*handler)(request, responses.clone())).await
                }
                Err(err) => Err(err),
            };
            conclude(responses, result).await
        })
    }
}

struct BidiStreamingHandler<Req, Resp, F> {
    method: MethodDescriptor<Req, Resp>,
    handler: Arc<F>,
}

impl<Req, Resp, F, Fut> MethodHandler for BidiStreamingHandler<Req, Resp, F>
where
    Req: Send + 'static,
    Resp: Send + 'static,
    F: Fn(RequestStream<Req>, ResponseSink<Resp>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CallError>> + Send + 'static,
{
    fn call(&self, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let handler = self.handler.clone();
        let (requests, responses) = open(&self.method, call);
        Box::pin(async move {
            let token = responses.token().clone();
            let result = cancellable(&token, (*handler)(requests, responses.clone())).await;
            conclude(responses, result).await
        })
    }
}

/// The server half of a service: one handler per registered method.
///
/// Every method starts out unimplemented. Individual handlers are replaced
/// with the shape-specific setters, and [`ServerStub::bind`] snapshots the
/// table into a [`ServiceDefinition`] for the transport's dispatcher.
pub struct ServerStub {
    registry: Registry,
    handlers: Vec<Arc<dyn MethodHandler>>,
}

impl ServerStub {
    pub fn new(registry: Registry) -> Self {
        let handlers = registry
            .methods()
            .map(|info| Arc::new(Unimplemented { info: info.clone() }) as Arc<dyn MethodHandler>)
            .collect();
        Self { registry, handlers }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn install(
        &mut self,
        info: &MethodInfo,
        accepted: &[CallShape],
        handler: Arc<dyn MethodHandler>,
    ) -> Result<&mut Self, RegistryError> {
        let index = self.registry.resolve(info, accepted)?;
        tracing::debug!(method = info.full_name(), "handler bound");
        self.handlers[index] = handler;
        Ok(self)
    }

    pub fn unary<Req, Resp, F, Fut>(
        &mut self,
        method: &MethodDescriptor<Req, Resp>,
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, CallError>> + Send + 'static,
    {
        let handler = Arc::new(UnaryHandler {
            method: method.clone(),
            handler: Arc::new(handler),
        });
        self.install(method.info(), &[CallShape::Unary], handler)
    }

    pub fn client_streaming<Req, Resp, F, Fut>(
        &mut self,
        method: &MethodDescriptor<Req, Resp>,
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(RequestStream<Req>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, CallError>> + Send + 'static,
    {
        let handler = Arc::new(ClientStreamingHandler {
            method: method.clone(),
            handler: Arc::new(handler),
        });
        self.install(method.info(), &[CallShape::ClientStreaming], handler)
    }

    pub fn server_streaming<Req, Resp, F, Fut>(
        &mut self,
        method: &MethodDescriptor<Req, Resp>,
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(Req, ResponseSink<Resp>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallError>> + Send + 'static,
    {
        let handler = Arc::new(ServerStreamingHandler {
            method: method.clone(),
            handler: Arc::new(handler),
        });
        self.install(method.info(), &[CallShape::ServerStreaming], handler)
    }

    /// Bind a bidirectional handler. Also used for undetermined methods.
    pub fn bidi_streaming<Req, Resp, F, Fut>(
        &mut self,
        method: &MethodDescriptor<Req, Resp>,
        handler: F,
    ) -> Result<&mut Self, RegistryError>
    where
        Req: Send + 'static,
        Resp: Send + 'static,
        F: Fn(RequestStream<Req>, ResponseSink<Resp>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CallError>> + Send + 'static,
    {
        let handler = Arc::new(BidiStreamingHandler {
            method: method.clone(),
            handler: Arc::new(handler),
        });
        self.install(
            method.info(),
            &[CallShape::BidiStreaming, CallShape::Undetermined],
            handler,
        )
    }

    /// Put a method back to the unimplemented default.
    pub fn unimplemented(&mut self, method_name: &str) -> Result<&mut Self, RegistryError> {
        let index = self
            .registry
            .index_of(method_name)
            .ok_or_else(|| RegistryError::UnknownMethod(method_name.to_owned()))?;
        let info = self.registry.info_at(index).clone();
        self.handlers[index] = Arc::new(Unimplemented { info });
        Ok(self)
    }

    /// Snapshot the current handlers. Later changes to this stub do not
    /// affect the returned definition.
    pub fn bind(&self) -> ServiceDefinition {
        ServiceDefinition {
            inner: Arc::new(DefinitionInner {
                registry: self.registry.clone(),
                handlers: self.handlers.clone(),
            }),
        }
    }
}

/// An immutable, dispatch-ready mapping from method name to handler.
#[derive(Clone)]
pub struct ServiceDefinition {
    inner: Arc<DefinitionInner>,
}

struct DefinitionInner {
    registry: Registry,
    handlers: Vec<Arc<dyn MethodHandler>>,
}

impl ServiceDefinition {
    pub fn service_name(&self) -> &str {
        self.inner.registry.service_name()
    }

    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    pub fn methods(&self) -> impl ExactSizeIterator<Item = &Arc<MethodInfo>> {
        self.inner.registry.methods()
    }

    /// Whether a method has a bound handler; `None` for unknown methods.
    pub fn is_implemented(&self, method_name: &str) -> Option<bool> {
        let index = self.inner.registry.index_of(method_name)?;
        Some(self.inner.handlers[index].is_implemented())
    }

    /// Route one incoming call by its full name.
    ///
    /// Unknown names are answered like unbound methods.
    pub fn dispatch(&self, full_name: &str, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let span = tracing::debug_span!("rpc", method = full_name);
        let entered = span.enter();
        tracing::debug!(state = %CallState::Received);

        let Some(index) = self.inner.registry.index_of_full(full_name) else {
            tracing::warn!("no such method");
            return Box::pin(ready(reject(full_name, call)));
        };
        let handler = self.inner.handlers[index].clone();

        if !handler.is_implemented() {
            let outcome = handler.call(call);
            tracing::debug!(state = %CallState::Unimplemented);
            return outcome;
        }

        let shape = self.inner.registry.info_at(index).shape();
        tracing::debug!(state = %CallState::Dispatched, %shape);
        let fut = handler.call(call);
        drop(entered);
        Box::pin(
            async move {
                let outcome = fut.await;
                match &outcome {
                    CallOutcome::Failed(err) => {
                        tracing::warn!(state = %outcome.state(), error = %err, "call failed")
                    }
                    _ => tracing::debug!(state = %outcome.state()),
                }
                outcome
            }
            .instrument(span),
        )
    }
}

impl fmt::Debug for ServiceDefinition {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ServiceDefinition")
            .field("service_name", &self.service_name())
            .field("methods", &self.inner.registry.len())
            .finish()
    }
}
