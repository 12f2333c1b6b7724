use crate::{
    marshal::{JsonMarshaller, Marshaller},
    types::{CallShape, MethodInfo},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{fmt, sync::Arc};

/// Immutable description of one RPC method.
///
/// Created once when the service definition is built and shared read-only
/// by every client and server bound to the service. Cloning is cheap.
pub struct MethodDescriptor<Req, Resp> {
    info: Arc<MethodInfo>,
    request_marshaller: Arc<dyn Marshaller<Req>>,
    response_marshaller: Arc<dyn Marshaller<Resp>>,
}

impl<Req, Resp> MethodDescriptor<Req, Resp> {
    pub fn new<ReqM, RespM>(
        service_name: &str,
        method_name: &str,
        shape: CallShape,
        request_marshaller: ReqM,
        response_marshaller: RespM,
    ) -> Self
    where
        ReqM: Marshaller<Req> + 'static,
        RespM: Marshaller<Resp> + 'static,
    {
        Self::from_shared(
            MethodInfo::new(service_name, method_name, shape),
            Arc::new(request_marshaller),
            Arc::new(response_marshaller),
        )
    }

    /// Build from marshallers that are already type-erased.
    pub fn from_shared(
        info: MethodInfo,
        request_marshaller: Arc<dyn Marshaller<Req>>,
        response_marshaller: Arc<dyn Marshaller<Resp>>,
    ) -> Self {
        Self {
            info: Arc::new(info),
            request_marshaller,
            response_marshaller,
        }
    }

    pub fn info(&self) -> &Arc<MethodInfo> {
        &self.info
    }

    pub fn service_name(&self) -> &str {
        self.info.service_name()
    }

    pub fn method_name(&self) -> &str {
        self.info.method_name()
    }

    pub fn full_name(&self) -> &str {
        self.info.full_name()
    }

    pub fn shape(&self) -> CallShape {
        self.info.shape()
    }

    pub fn request_marshaller(&self) -> &Arc<dyn Marshaller<Req>> {
        &self.request_marshaller
    }

    pub fn response_marshaller(&self) -> &Arc<dyn Marshaller<Resp>> {
        &self.response_marshaller
    }
}

impl<Req, Resp> MethodDescriptor<Req, Resp>
where
    Req: Serialize + DeserializeOwned + 'static,
    Resp: Serialize + DeserializeOwned + 'static,
{
    /// A descriptor marshalling both directions as JSON.
    pub fn json(service_name: &str, method_name: &str, shape: CallShape) -> Self {
        Self::new(
            service_name,
            method_name,
            shape,
            JsonMarshaller::<Req>::new(),
            JsonMarshaller::<Resp>::new(),
        )
    }
}

impl<Req, Resp> Clone for MethodDescriptor<Req, Resp> {
    fn clone(&self) -> Self {
        Self {
            info: self.info.clone(),
            request_marshaller: self.request_marshaller.clone(),
            response_marshaller: self.response_marshaller.clone(),
        }
    }
}

impl<Req, Resp> fmt::Debug for MethodDescriptor<Req, Resp> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("full_name", &self.full_name())
            .field("shape", &self.shape())
            .finish_non_exhaustive()
    }
}
