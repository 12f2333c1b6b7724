//! Conversion between typed payloads and wire bytes.
//!
//! A [`Marshaller`] is the only place where a payload type meets its codec.
//! Descriptors carry one marshaller per direction, so both stubs built from
//! the same descriptor always agree on the wire format.

use crate::error::MarshallingError;
use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};
use std::{any::type_name, fmt, marker::PhantomData};

/// A codec for one payload type.
///
/// `deserialize(serialize(x))` must be equivalent to `x` for every value
/// the codec can represent.
pub trait Marshaller<T>: Send + Sync {
    fn serialize(&self, value: &T) -> Result<Bytes, MarshallingError>;
    fn deserialize(&self, bytes: Bytes) -> Result<T, MarshallingError>;
}

/// Marshaller for methods without a logical payload on one side.
///
/// Always writes zero bytes and never looks at what it is asked to read.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyMarshaller;

impl Marshaller<()> for EmptyMarshaller {
    fn serialize(&self, _value: &()) -> Result<Bytes, MarshallingError> {
        Ok(Bytes::new())
    }

    fn deserialize(&self, _bytes: Bytes) -> Result<(), MarshallingError> {
        Ok(())
    }
}

// Raw-bytes descriptors built from a schema use this on undeclared sides.
impl Marshaller<Bytes> for EmptyMarshaller {
    fn serialize(&self, _value: &Bytes) -> Result<Bytes, MarshallingError> {
        Ok(Bytes::new())
    }

    fn deserialize(&self, _bytes: Bytes) -> Result<Bytes, MarshallingError> {
        Ok(Bytes::new())
    }
}

/// Pass-through marshaller for payloads that are already bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawMarshaller;

impl Marshaller<Bytes> for RawMarshaller {
    fn serialize(&self, value: &Bytes) -> Result<Bytes, MarshallingError> {
        Ok(value.clone())
    }

    fn deserialize(&self, bytes: Bytes) -> Result<Bytes, MarshallingError> {
        Ok(bytes)
    }
}

/// JSON marshaller for any serde type.
pub struct JsonMarshaller<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> JsonMarshaller<T> {
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for JsonMarshaller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for JsonMarshaller<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for JsonMarshaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "JsonMarshaller<{}>", type_name::<T>())
    }
}

impl<T> Marshaller<T> for JsonMarshaller<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn serialize(&self, value: &T) -> Result<Bytes, MarshallingError> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| MarshallingError::new("json", type_name::<T>(), e))
    }

    fn deserialize(&self, bytes: Bytes) -> Result<T, MarshallingError> {
        serde_json::from_slice(&bytes).map_err(|e| MarshallingError::new("json", type_name::<T>(), e))
    }
}

/// Compact binary marshaller for any serde type.
pub struct BincodeMarshaller<T> {
    _type: PhantomData<fn() -> T>,
}

impl<T> BincodeMarshaller<T> {
    pub fn new() -> Self {
        Self { _type: PhantomData }
    }
}

impl<T> Default for BincodeMarshaller<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for BincodeMarshaller<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for BincodeMarshaller<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "BincodeMarshaller<{}>", type_name::<T>())
    }
}

impl<T> Marshaller<T> for BincodeMarshaller<T>
where
    T: Serialize + DeserializeOwned + 'static,
{
    fn serialize(&self, value: &T) -> Result<Bytes, MarshallingError> {
        bincode::serialize(value)
            .map(Bytes::from)
            .map_err(|e| MarshallingError::new("bincode", type_name::<T>(), e))
    }

    fn deserialize(&self, bytes: Bytes) -> Result<T, MarshallingError> {
        bincode::deserialize(&bytes).map_err(|e| MarshallingError::new("bincode", type_name::<T>(), e))
    }
}
