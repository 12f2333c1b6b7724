use serde::{Deserialize, Serialize};
use std::fmt;

/// The cardinality and direction of the messages exchanged in one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum CallShape {
    /// One request, one response.
    Unary,
    /// Zero or more requests, one response.
    ClientStreaming,
    /// One request, zero or more responses.
    ServerStreaming,
    /// Independent request and response streams.
    BidiStreaming,
    /// The schema did not yield a usable signature. Dispatched like
    /// [`CallShape::BidiStreaming`].
    Undetermined,
}

/// How one side of a method declares its payload in the schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Absent,
    Single,
    Stream,
}

impl CallShape {
    /// Classify a method from the payload declared on each side.
    ///
    /// A method missing either payload cannot be classified and is
    /// [`CallShape::Undetermined`].
    pub fn classify(request: PayloadKind, response: PayloadKind) -> Self {
        use PayloadKind::*;
        match (request, response) {
            (Absent, _) | (_, Absent) => CallShape::Undetermined,
            (Single, Single) => CallShape::Unary,
            (Stream, Single) => CallShape::ClientStreaming,
            (Single, Stream) => CallShape::ServerStreaming,
            (Stream, Stream) => CallShape::BidiStreaming,
        }
    }

    /// The calling convention this shape is dispatched with.
    pub fn convention(self) -> Self {
        match self {
            CallShape::Undetermined => CallShape::BidiStreaming,
            shape => shape,
        }
    }

    pub fn client_streams(self) -> bool {
        matches!(
            self.convention(),
            CallShape::ClientStreaming | CallShape::BidiStreaming
        )
    }

    pub fn server_streams(self) -> bool {
        matches!(
            self.convention(),
            CallShape::ServerStreaming | CallShape::BidiStreaming
        )
    }

    fn name(&self) -> &'static str {
        use CallShape::*;
        match self {
            Unary => "UNARY",
            ClientStreaming => "CLIENT_STREAMING",
            ServerStreaming => "SERVER_STREAMING",
            BidiStreaming => "BIDI_STREAMING",
            Undetermined => "UNKNOWN",
        }
    }
}

impl fmt::Display for CallShape {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Build the dispatch key of a method.
pub fn full_method_name(service_name: &str, method_name: &str) -> String {
    format!("{service_name}/{method_name}")
}

/// Split a dispatch key into its service and method parts.
pub fn split_full_name(full_name: &str) -> Option<(&str, &str)> {
    full_name
        .rsplit_once('/')
        .filter(|(service, method)| !service.is_empty() && !method.is_empty())
}

/// The type-erased identity of a method: everything but its marshallers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct MethodInfo {
    service_name: String,
    method_name: String,
    full_name: String,
    shape: CallShape,
}

impl MethodInfo {
    pub fn new(service_name: impl Into<String>, method_name: impl Into<String>, shape: CallShape) -> Self {
        let service_name = service_name.into();
        let method_name = method_name.into();
        let full_name = full_method_name(&service_name, &method_name);
        Self {
            service_name,
            method_name,
            full_name,
            shape,
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn shape(&self) -> CallShape {
        self.shape
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.full_name, self.shape)
    }
}
