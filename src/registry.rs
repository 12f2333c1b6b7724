use crate::{
    descriptor::MethodDescriptor,
    error::RegistryError,
    types::{CallShape, MethodInfo},
};
use std::{collections::HashMap, sync::Arc};

/// The fixed set of methods making up one service's contract.
///
/// Built once with [`Registry::builder`] and then passed (by cheap clone)
/// into both the client and the server stub. Enumeration follows insertion
/// order; lookups go through the method name or the full name.
///
/// A registry pins each method's identity as seen on the wire: service
/// name, method name and call shape. Payload types and marshallers are not
/// part of that identity, so any descriptor with a matching [`MethodInfo`]
/// binds, and a codec disagreement surfaces per call as
/// [`CallError::Marshalling`](crate::CallError::Marshalling).
#[derive(Debug, Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

#[derive(Debug)]
struct RegistryInner {
    service_name: String,
    methods: Vec<Arc<MethodInfo>>,
    by_method: HashMap<String, usize>,
}

impl Registry {
    pub fn builder(service_name: impl Into<String>) -> RegistryBuilder {
        RegistryBuilder {
            service_name: service_name.into(),
            methods: Vec::new(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.inner.service_name
    }

    pub fn get(&self, method_name: &str) -> Option<&Arc<MethodInfo>> {
        self.inner
            .by_method
            .get(method_name)
            .map(|&index| &self.inner.methods[index])
    }

    pub fn get_full(&self, full_name: &str) -> Option<&Arc<MethodInfo>> {
        self.index_of_full(full_name).map(|index| self.info_at(index))
    }

    pub fn contains(&self, method_name: &str) -> bool {
        self.inner.by_method.contains_key(method_name)
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> impl ExactSizeIterator<Item = &Arc<MethodInfo>> {
        self.inner.methods.iter()
    }

    pub fn len(&self) -> usize {
        self.inner.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.methods.is_empty()
    }

    pub(crate) fn index_of(&self, method_name: &str) -> Option<usize> {
        self.inner.by_method.get(method_name).copied()
    }

    pub(crate) fn index_of_full(&self, full_name: &str) -> Option<usize> {
        let (service, method) = crate::types::split_full_name(full_name)?;
        if service != self.service_name() {
            return None;
        }
        self.index_of(method)
    }

    pub(crate) fn info_at(&self, index: usize) -> &Arc<MethodInfo> {
        &self.inner.methods[index]
    }

    /// Check that `info` is the registered method of that name and that its
    /// shape is one of `accepted`.
    pub(crate) fn resolve(
        &self,
        info: &MethodInfo,
        accepted: &[CallShape],
    ) -> Result<usize, RegistryError> {
        let index = self
            .index_of(info.method_name())
            .filter(|&index| *self.inner.methods[index] == *info)
            .ok_or_else(|| RegistryError::UnknownMethod(info.full_name().to_owned()))?;

        if !accepted.contains(&info.shape()) {
            return Err(RegistryError::ShapeMismatch {
                method: info.full_name().to_owned(),
                expected: accepted[0],
                actual: info.shape(),
            });
        }
        Ok(index)
    }
}

pub struct RegistryBuilder {
    service_name: String,
    methods: Vec<Arc<MethodInfo>>,
}

impl RegistryBuilder {
    pub fn add<Req, Resp>(self, descriptor: &MethodDescriptor<Req, Resp>) -> Self {
        self.add_info(descriptor.info().clone())
    }

    pub fn add_info(mut self, info: Arc<MethodInfo>) -> Self {
        self.methods.push(info);
        self
    }

    /// Fails if a method names another service, two methods share a name,
    /// or a full name does not split back into its service and method.
    pub fn build(self) -> Result<Registry, RegistryError> {
        let mut by_method = HashMap::with_capacity(self.methods.len());
        for (index, info) in self.methods.iter().enumerate() {
            if info.service_name() != self.service_name {
                return Err(RegistryError::ServiceMismatch {
                    method: info.full_name().to_owned(),
                    expected: self.service_name,
                    actual: info.service_name().to_owned(),
                });
            }
            if crate::types::split_full_name(info.full_name())
                != Some((info.service_name(), info.method_name()))
            {
                return Err(RegistryError::InvalidName(info.full_name().to_owned()));
            }
            if by_method.insert(info.method_name().to_owned(), index).is_some() {
                return Err(RegistryError::DuplicateMethod(info.full_name().to_owned()));
            }
        }

        tracing::debug!(
            service = %self.service_name,
            methods = self.methods.len(),
            "built method registry"
        );

        Ok(Registry {
            inner: Arc::new(RegistryInner {
                service_name: self.service_name,
                methods: self.methods,
                by_method,
            }),
        })
    }
}
