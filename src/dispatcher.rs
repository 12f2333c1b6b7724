use crate::{
    channel::ServerCall,
    error::RegistryError,
    server::{reject, CallOutcome, ServiceDefinition},
    types::{split_full_name, MethodInfo},
};
use futures::future::{ready, BoxFuture};
use std::{collections::BTreeMap, sync::Arc};

/// Routes incoming calls to bound [`ServiceDefinition`]s by full method name.
///
/// Services are registered with [`Dispatcher::add`], calls are routed with
/// [`Dispatcher::dispatch`] and the served methods are listed by
/// [`Dispatcher::methods`]. Names that match no service are answered with
/// `Unimplemented`, like unbound methods.
#[derive(Default, Clone, Debug)]
pub struct Dispatcher {
    services: BTreeMap<String, ServiceDefinition>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, definition: ServiceDefinition) -> Result<&mut Self, RegistryError> {
        let name = definition.service_name().to_owned();
        if self.services.contains_key(&name) {
            return Err(RegistryError::DuplicateService(name));
        }
        tracing::debug!(service = %name, methods = definition.methods().len(), "service added");
        self.services.insert(name, definition);
        Ok(self)
    }

    pub fn service(&self, service_name: &str) -> Option<&ServiceDefinition> {
        self.services.get(service_name)
    }

    pub fn dispatch(&self, full_name: &str, call: ServerCall) -> BoxFuture<'static, CallOutcome> {
        let service = split_full_name(full_name).and_then(|(service, _)| self.services.get(service));
        match service {
            Some(definition) => definition.dispatch(full_name, call),
            None => {
                tracing::warn!(method = full_name, "no service for call");
                Box::pin(ready(reject(full_name, call)))
            }
        }
    }

    /// Every method served, grouped by service name.
    pub fn methods(&self) -> Vec<Arc<MethodInfo>> {
        self.services
            .values()
            .flat_map(|definition| definition.methods().cloned())
            .collect()
    }
}
