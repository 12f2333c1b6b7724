//! The schema compiler's view of a service, as consumed by this crate.
//!
//! A [`ServiceSchema`] is plain data (usually deserialized from the
//! compiler's JSON output). Building it classifies every method's call shape
//! and produces raw-bytes descriptors plus the matching [`Registry`], which
//! is enough to stand up stubs for services whose payload types are not
//! known at compile time.

use crate::{
    descriptor::MethodDescriptor,
    error::RegistryError,
    marshal::{EmptyMarshaller, Marshaller, RawMarshaller},
    registry::Registry,
    types::{CallShape, MethodInfo, PayloadKind},
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceSchema {
    /// Fully-qualified service name, e.g. `service.MyService`.
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MethodSchema {
    pub name: String,
    #[serde(default)]
    pub request: Option<PayloadSchema>,
    #[serde(default)]
    pub response: Option<PayloadSchema>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PayloadSchema {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub stream: bool,
}

fn payload_kind(payload: Option<&PayloadSchema>) -> PayloadKind {
    match payload {
        None => PayloadKind::Absent,
        Some(PayloadSchema { stream: true, .. }) => PayloadKind::Stream,
        Some(_) => PayloadKind::Single,
    }
}

fn marshaller_for(payload: Option<&PayloadSchema>) -> Arc<dyn Marshaller<Bytes>> {
    match payload {
        Some(_) => Arc::new(RawMarshaller),
        None => Arc::new(EmptyMarshaller),
    }
}

impl MethodSchema {
    pub fn shape(&self) -> CallShape {
        CallShape::classify(
            payload_kind(self.request.as_ref()),
            payload_kind(self.response.as_ref()),
        )
    }
}

/// A descriptor whose payloads stay as raw bytes.
pub type DynamicDescriptor = MethodDescriptor<Bytes, Bytes>;

/// Descriptors and registry built from a [`ServiceSchema`].
#[derive(Debug, Clone)]
pub struct DynamicService {
    registry: Registry,
    descriptors: Vec<DynamicDescriptor>,
}

impl DynamicService {
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn descriptors(&self) -> &[DynamicDescriptor] {
        &self.descriptors
    }

    pub fn descriptor(&self, method_name: &str) -> Option<&DynamicDescriptor> {
        self.descriptors
            .iter()
            .find(|descriptor| descriptor.method_name() == method_name)
    }
}

impl ServiceSchema {
    /// Emit one descriptor per declared method.
    ///
    /// Methods whose shape cannot be classified become
    /// [`CallShape::Undetermined`]; only duplicate method names fail.
    pub fn build(&self) -> Result<DynamicService, RegistryError> {
        let descriptors: Vec<DynamicDescriptor> = self
            .methods
            .iter()
            .map(|method| {
                MethodDescriptor::from_shared(
                    MethodInfo::new(&self.name, &method.name, method.shape()),
                    marshaller_for(method.request.as_ref()),
                    marshaller_for(method.response.as_ref()),
                )
            })
            .collect();

        let registry = descriptors
            .iter()
            .fold(Registry::builder(&self.name), |builder, descriptor| builder.add(descriptor))
            .build()?;

        Ok(DynamicService {
            registry,
            descriptors,
        })
    }
}
