//! Serialization and revision emission.

mod revision;
mod serializer;

pub use serializer::ObjectSerializer;

pub(crate) use revision::emit;
