//! PDF object types.
//!
//! [`Object`] is the tagged variant over every PDF value form. Dictionaries
//! are insertion-ordered so that serialization is deterministic and mirrors
//! the order keys were written in.

use bytes::Bytes;

/// PDF object representation.
#[derive(Debug, Clone, PartialEq)]
pub enum Object {
    /// Null object
    Null,
    /// Boolean value
    Boolean(bool),
    /// Integer value
    Integer(i64),
    /// Real (floating-point) value
    Real(f64),
    /// Literal string `(...)` (byte array)
    String(Vec<u8>),
    /// Hexadecimal string `<...>` (decoded byte array)
    HexString(Vec<u8>),
    /// Name (starting with /)
    Name(String),
    /// Array of objects
    Array(Vec<Object>),
    /// Dictionary (insertion-ordered key-value pairs)
    Dictionary(Dict),
    /// Indirect object reference
    Reference(ObjectRef),
    /// Opaque pre-serialized bytes, written verbatim.
    ///
    /// Used for constant-width placeholders whose byte length must be exact.
    Raw(Vec<u8>),
}

/// Reference to an indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object number
    pub id: u32,
    /// Generation number
    pub gen: u16,
}

impl ObjectRef {
    /// Create a new object reference.
    pub fn new(id: u32, gen: u16) -> Self {
        Self { id, gen }
    }
}

impl std::fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} R", self.id, self.gen)
    }
}

/// Insertion-ordered PDF dictionary.
///
/// Keys keep the position of their first insertion; setting an existing key
/// replaces the value in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Dict {
    entries: Vec<(String, Object)>,
}

impl Dict {
    /// Create an empty dictionary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a dictionary from key/value pairs, keeping their order.
    pub fn from_pairs(pairs: Vec<(&str, Object)>) -> Self {
        let mut dict = Self::new();
        for (k, v) in pairs {
            dict.set(k, v);
        }
        dict
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<&Object> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Get a mutable value for a key.
    pub fn get_mut(&mut self, key: &str) -> Option<&mut Object> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Insert or replace a key. Replacement keeps the original position.
    pub fn set(&mut self, key: impl Into<String>, value: Object) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, v)) => *v = value,
            None => self.entries.push((key, value)),
        }
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Object> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Whether the key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the dictionary is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Object)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }
}

impl Object {
    /// Get the type name of this object (without data).
    pub fn type_name(&self) -> &'static str {
        match self {
            Object::Null => "Null",
            Object::Boolean(_) => "Boolean",
            Object::Integer(_) => "Integer",
            Object::Real(_) => "Real",
            Object::String(_) => "String",
            Object::HexString(_) => "HexString",
            Object::Name(_) => "Name",
            Object::Array(_) => "Array",
            Object::Dictionary(_) => "Dictionary",
            Object::Reference(_) => "Reference",
            Object::Raw(_) => "Raw",
        }
    }

    /// Try to cast to integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Object::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value as f64, accepting both integers and reals.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Object::Integer(i) => Some(*i as f64),
            Object::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to name.
    pub fn as_name(&self) -> Option<&str> {
        match self {
            Object::Name(s) => Some(s),
            _ => None,
        }
    }

    /// Try to cast to dictionary.
    pub fn as_dict(&self) -> Option<&Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to a mutable dictionary.
    pub fn as_dict_mut(&mut self) -> Option<&mut Dict> {
        match self {
            Object::Dictionary(d) => Some(d),
            _ => None,
        }
    }

    /// Try to cast to array.
    pub fn as_array(&self) -> Option<&Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to a mutable array.
    pub fn as_array_mut(&mut self) -> Option<&mut Vec<Object>> {
        match self {
            Object::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Try to cast to reference.
    ///
    /// Returns `Some` only for the indirect-reference variant; a list of
    /// references is not a reference.
    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            Object::Reference(r) => Some(*r),
            _ => None,
        }
    }

    /// Try to cast to string bytes (literal or hex).
    pub fn as_string(&self) -> Option<&[u8]> {
        match self {
            Object::String(s) | Object::HexString(s) => Some(s),
            _ => None,
        }
    }

    /// Check if object is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Object::Null)
    }

    /// Whether this is a list whose elements are all references.
    ///
    /// Used by callers that must reject a list where a single reference is
    /// expected.
    pub fn is_reference_list(&self) -> bool {
        match self {
            Object::Array(items) => {
                !items.is_empty() && items.iter().all(|o| o.as_reference().is_some())
            },
            _ => false,
        }
    }

    /// Read a `[x0 y0 x1 y1]` rectangle, accepting integers and reals.
    pub fn as_rectangle(&self) -> Option<[f64; 4]> {
        let arr = self.as_array()?;
        if arr.len() != 4 {
            return None;
        }
        let mut out = [0.0; 4];
        for (i, item) in arr.iter().enumerate() {
            out[i] = item.as_number()?;
        }
        Some(out)
    }
}

/// A numbered container holding one value plus an optional stream payload.
///
/// Serializes as an `oid gen obj ... endobj` record. An object may carry a
/// stream only when its value is a dictionary.
#[derive(Debug, Clone, PartialEq)]
pub struct IndirectObject {
    /// Object number (>= 1)
    pub id: u32,
    /// Generation number
    pub gen: u16,
    /// The object value
    pub value: Object,
    /// Optional stream payload
    pub stream: Option<Bytes>,
    /// Whether the stream payload is already filtered (compressed)
    pub stream_filtered: bool,
}

impl IndirectObject {
    /// Create a new indirect object without a stream.
    pub fn new(id: u32, gen: u16, value: Object) -> Self {
        debug_assert!(id >= 1, "object ids start at 1");
        Self {
            id,
            gen,
            value,
            stream: None,
            stream_filtered: false,
        }
    }

    /// Create a new indirect object carrying a stream payload.
    ///
    /// The value must be a dictionary; `/Length` is synthesized at
    /// serialization time.
    pub fn with_stream(id: u32, gen: u16, dict: Dict, data: impl Into<Bytes>) -> Self {
        Self {
            id,
            gen,
            value: Object::Dictionary(dict),
            stream: Some(data.into()),
            stream_filtered: false,
        }
    }

    /// Reference to this object.
    pub fn reference(&self) -> ObjectRef {
        ObjectRef::new(self.id, self.gen)
    }

    /// Dictionary view of the value, if it is one.
    pub fn dict(&self) -> Option<&Dict> {
        self.value.as_dict()
    }

    /// Mutable dictionary view of the value, if it is one.
    pub fn dict_mut(&mut self) -> Option<&mut Dict> {
        self.value.as_dict_mut()
    }
}
