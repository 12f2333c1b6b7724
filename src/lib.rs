//! Typed binding layer between generated service definitions and an RPC
//! transport.
//!
//! A service is described once as a set of [`MethodDescriptor`]s collected
//! in a [`Registry`]. A [`ClientStub`] and a [`ServerStub`] built against the
//! same registry agree on every method's name, call shape and wire format.
//! The transport is anything implementing [`Channel`]; [`MemoryChannel`]
//! wires both halves together inside one process.

pub mod channel;
pub mod client;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod marshal;
pub mod memory;
pub mod registry;
pub mod schema;
pub mod server;
pub mod stream;
pub mod types;

pub use channel::{call_pair, CallHandle, CallOptions, Channel, Frame, ServerCall};
pub use client::ClientStub;
pub use descriptor::MethodDescriptor;
pub use dispatcher::Dispatcher;
pub use error::{CallError, MarshallingError, RegistryError};
pub use marshal::{BincodeMarshaller, EmptyMarshaller, JsonMarshaller, Marshaller, RawMarshaller};
pub use memory::MemoryChannel;
pub use registry::{Registry, RegistryBuilder};
pub use schema::{DynamicDescriptor, DynamicService, MethodSchema, PayloadSchema, ServiceSchema};
pub use server::{CallOutcome, CallState, ServerStub, ServiceDefinition};
pub use stream::{
    MessageSink, MessageStream, PendingResponse, RequestSink, RequestStream, ResponseSink,
    ResponseStream,
};
pub use types::{full_method_name, CallShape, MethodInfo, PayloadKind};
