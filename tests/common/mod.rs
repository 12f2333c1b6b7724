//! A `MyService` binding shaped like what a schema compiler would emit.
#![allow(dead_code)]

use rpcstub::{
    CallError, CallShape, Channel, ClientStub, EmptyMarshaller, JsonMarshaller, MemoryChannel,
    MethodDescriptor, PendingResponse, Registry, RequestSink, ResponseStream, ServerStub,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

pub const SERVICE: &str = "service.MyService";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub tag: u64,
    pub name: Option<String>,
}

impl Entry {
    pub fn new(tag: u64) -> Self {
        Self { tag, name: None }
    }

    pub fn named(tag: u64, name: &str) -> Self {
        Self {
            tag,
            name: Some(name.to_owned()),
        }
    }
}

pub struct MyService {
    pub unknown: MethodDescriptor<(), ()>,
    pub unknown_return: MethodDescriptor<(), Entry>,
    pub unknown_argument: MethodDescriptor<Entry, ()>,
    pub unary: MethodDescriptor<Entry, Entry>,
    pub server_streaming: MethodDescriptor<Entry, Entry>,
    pub client_streaming: MethodDescriptor<Entry, Entry>,
    pub bidi_streaming: MethodDescriptor<Entry, Entry>,
    pub registry: Registry,
}

impl MyService {
    pub fn new() -> Arc<Self> {
        let unknown: MethodDescriptor<(), ()> = MethodDescriptor::new(
            SERVICE,
            "unknown",
            CallShape::Undetermined,
            EmptyMarshaller,
            EmptyMarshaller,
        );
        let unknown_return: MethodDescriptor<(), Entry> = MethodDescriptor::new(
            SERVICE,
            "unknown_return",
            CallShape::Undetermined,
            EmptyMarshaller,
            JsonMarshaller::<Entry>::new(),
        );
        let unknown_argument: MethodDescriptor<Entry, ()> = MethodDescriptor::new(
            SERVICE,
            "unknown_argument",
            CallShape::Undetermined,
            JsonMarshaller::<Entry>::new(),
            EmptyMarshaller,
        );
        let unary: MethodDescriptor<Entry, Entry> =
            MethodDescriptor::json(SERVICE, "unary", CallShape::Unary);
        let server_streaming: MethodDescriptor<Entry, Entry> =
            MethodDescriptor::json(SERVICE, "server_streaming", CallShape::ServerStreaming);
        let client_streaming: MethodDescriptor<Entry, Entry> =
            MethodDescriptor::json(SERVICE, "client_streaming", CallShape::ClientStreaming);
        let bidi_streaming: MethodDescriptor<Entry, Entry> =
            MethodDescriptor::json(SERVICE, "bidi_streaming", CallShape::BidiStreaming);

        let registry = Registry::builder(SERVICE)
            .add(&unknown)
            .add(&unknown_return)
            .add(&unknown_argument)
            .add(&unary)
            .add(&server_streaming)
            .add(&client_streaming)
            .add(&bidi_streaming)
            .build()
            .expect("MyService method names are unique");

        Arc::new(Self {
            unknown,
            unknown_return,
            unknown_argument,
            unary,
            server_streaming,
            client_streaming,
            bidi_streaming,
            registry,
        })
    }
}

/// Typed client over [`MyService`], one operation per method.
pub struct MyServiceClient {
    stub: ClientStub,
    methods: Arc<MyService>,
}

impl MyServiceClient {
    pub fn new(channel: Arc<dyn Channel>, methods: Arc<MyService>) -> Self {
        let stub = ClientStub::new(channel, methods.registry.clone());
        Self { stub, methods }
    }

    pub fn stub(&self) -> &ClientStub {
        &self.stub
    }

    pub fn unknown(&self) -> Result<(RequestSink<()>, ResponseStream<()>), CallError> {
        self.stub.bidi_streaming(&self.methods.unknown)
    }

    pub fn unknown_return(&self) -> Result<(RequestSink<()>, ResponseStream<Entry>), CallError> {
        self.stub.bidi_streaming(&self.methods.unknown_return)
    }

    pub fn unknown_argument(&self) -> Result<(RequestSink<Entry>, ResponseStream<()>), CallError> {
        self.stub.bidi_streaming(&self.methods.unknown_argument)
    }

    pub async fn unary(&self, request: Entry) -> Result<Entry, CallError> {
        self.stub.unary(&self.methods.unary, request).await
    }

    pub async fn server_streaming(&self, request: Entry) -> Result<ResponseStream<Entry>, CallError> {
        self.stub.server_streaming(&self.methods.server_streaming, request).await
    }

    pub fn client_streaming(&self) -> Result<(RequestSink<Entry>, PendingResponse<Entry>), CallError> {
        self.stub.client_streaming(&self.methods.client_streaming)
    }

    pub fn bidi_streaming(&self) -> Result<(RequestSink<Entry>, ResponseStream<Entry>), CallError> {
        self.stub.bidi_streaming(&self.methods.bidi_streaming)
    }
}

/// Bind `server` and connect a typed client to it in-process.
pub fn connect(server: &ServerStub, methods: &Arc<MyService>) -> MyServiceClient {
    let channel = Arc::new(MemoryChannel::serve(server.bind()));
    MyServiceClient::new(channel, methods.clone())
}

/// Drain a response stream, failing on the first error.
pub async fn collect<T>(mut responses: ResponseStream<T>) -> Result<Vec<T>, CallError> {
    let mut out = Vec::new();
    while let Some(message) = responses.message().await? {
        out.push(message);
    }
    Ok(out)
}
