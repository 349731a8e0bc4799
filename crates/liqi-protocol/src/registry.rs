//! Runtime type resolution for tagged payloads.
//!
//! Stored records and notifications name their payload type in a string
//! (`.lq.RecordNewRound`), so the concrete message type is only known at
//! runtime. The [`TypeRegistry`] maps a normalized tag to a decode
//! function that turns the payload bytes into structured fields.

use std::collections::HashMap;
use std::sync::LazyLock;

use prost::Message;
use serde::Serialize;

use crate::lq::{self, NAMESPACE_PREFIX};
use crate::ProtocolError;

/// Leading marker character of a fully qualified type tag.
pub const TAG_MARKER: char = '.';

/// Decodes payload bytes of one registered type into JSON fields.
pub type DecodeFn = fn(&[u8]) -> Result<serde_json::Value, ProtocolError>;

/// A payload decoded through the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedMessage {
    /// Bare type name, e.g. `RecordNewRound`.
    pub name: String,
    /// The decoded message as structured fields.
    pub data: serde_json::Value,
}

/// Maps type names to decode functions.
///
/// Built once and then only read; the process-wide instance behind
/// [`TypeRegistry::global`] needs no locking.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<&'static str, DecodeFn>,
}

static LQ_REGISTRY: LazyLock<TypeRegistry> = LazyLock::new(lq::registry);

impl TypeRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The registry of every message in the [`lq`](crate::lq) schema.
    pub fn global() -> &'static TypeRegistry {
        &LQ_REGISTRY
    }

    /// Registers `M` under its bare name (no marker, no namespace).
    pub fn register<M>(mut self, name: &'static str) -> Self
    where
        M: Message + Default + Serialize,
    {
        self.decoders.insert(name, decode_as::<M>);
        self
    }

    /// Returns the decode function for a wire tag such as `.lq.ResLogin`.
    ///
    /// # Errors
    /// [`ProtocolError::UnknownType`] with the original tag if the tag
    /// does not normalize or nothing is registered under the result.
    pub fn resolve(&self, tag: &str) -> Result<DecodeFn, ProtocolError> {
        normalize_tag(tag)
            .and_then(|name| self.decoders.get(name).copied())
            .ok_or_else(|| ProtocolError::UnknownType(tag.to_owned()))
    }

    /// Resolves `tag` and decodes `bytes` with it.
    pub fn decode(
        &self,
        tag: &str,
        bytes: &[u8],
    ) -> Result<ResolvedMessage, ProtocolError> {
        let decode = self.resolve(tag)?;
        let data = decode(bytes)?;
        // resolve() succeeded, so the tag normalizes.
        let name = normalize_tag(tag).unwrap_or(tag).to_owned();
        Ok(ResolvedMessage { name, data })
    }

    /// Decodes every `(tag, bytes)` entry of a compound record, in order.
    /// Fails on the first entry that cannot be resolved or decoded.
    pub fn decode_all<'a, I>(
        &self,
        entries: I,
    ) -> Result<Vec<ResolvedMessage>, ProtocolError>
    where
        I: IntoIterator<Item = (&'a str, &'a [u8])>,
    {
        entries
            .into_iter()
            .map(|(tag, bytes)| self.decode(tag, bytes))
            .collect()
    }

    /// Whether a bare name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.decoders.contains_key(name)
    }

    /// Number of registered types.
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }
}

/// Strips a wire tag down to the registry key.
///
/// The leading `.` marker is dropped if present, then the `lq.` namespace
/// prefix must follow and is dropped too. Returns `None` when the prefix
/// is missing or nothing is left after it.
pub fn normalize_tag(tag: &str) -> Option<&str> {
    let rest = tag.strip_prefix(TAG_MARKER).unwrap_or(tag);
    let name = rest.strip_prefix(NAMESPACE_PREFIX)?;
    (!name.is_empty()).then_some(name)
}

fn decode_as<M>(bytes: &[u8]) -> Result<serde_json::Value, ProtocolError>
where
    M: Message + Default + Serialize,
{
    let message = M::decode(bytes)?;
    Ok(serde_json::to_value(&message)?)
}
