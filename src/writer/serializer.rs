//! Object serialization.
//!
//! Serializes objects to the canonical textual forms used by every emitted
//! revision:
//!
//! - integers in base 10; reals with a plain decimal point, no exponent;
//! - names `#hh`-escaped for bytes outside `!`..`~` or among `()<>[]{}/%#`;
//! - literal strings with the standard escape set and octal fallback;
//! - uppercase hex strings without whitespace;
//! - `[ v v v ]` arrays, `<< /K V >>` dictionaries in insertion order;
//! - `oid gen obj ... endobj` records with LF line endings only.

use crate::object::{Dict, IndirectObject, Object};
use std::io::Write;

/// Serializer for PDF objects.
#[derive(Debug, Clone, Default)]
pub struct ObjectSerializer;

impl ObjectSerializer {
    /// Create a new serializer.
    pub fn new() -> Self {
        Self
    }

    /// Serialize an object to bytes.
    pub fn serialize(&self, obj: &Object) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_object(&mut buf, obj).expect("vec write");
        buf
    }

    /// Serialize an object to a string (for debugging and tests).
    pub fn serialize_to_string(&self, obj: &Object) -> String {
        String::from_utf8_lossy(&self.serialize(obj)).to_string()
    }

    /// Serialize a full indirect object record.
    ///
    /// Format: `{id} {gen} obj\n{value}\n[stream\n{data}\nendstream\n]endobj\n`.
    /// When a stream payload is present the dictionary gains `/Length`; no
    /// `/Filter` is added for unfiltered payloads.
    pub fn serialize_indirect(&self, obj: &IndirectObject) -> Vec<u8> {
        let mut buf = Vec::new();
        write!(buf, "{} {} obj\n", obj.id, obj.gen).expect("vec write");

        match (&obj.stream, obj.value.as_dict()) {
            (Some(data), Some(dict)) => {
                let mut dict = dict.clone();
                dict.set("Length", Object::Integer(data.len() as i64));
                self.write_object(&mut buf, &Object::Dictionary(dict))
                    .expect("vec write");
                buf.extend_from_slice(b"\nstream\n");
                buf.extend_from_slice(data);
                buf.extend_from_slice(b"\nendstream\nendobj\n");
            },
            _ => {
                self.write_object(&mut buf, &obj.value).expect("vec write");
                buf.extend_from_slice(b"\nendobj\n");
            },
        }

        buf
    }

    fn write_object<W: Write>(&self, w: &mut W, obj: &Object) -> std::io::Result<()> {
        match obj {
            Object::Null => write!(w, "null"),
            Object::Boolean(b) => write!(w, "{}", if *b { "true" } else { "false" }),
            Object::Integer(i) => write!(w, "{}", i),
            Object::Real(r) => self.write_real(w, *r),
            Object::String(s) => self.write_literal_string(w, s),
            Object::HexString(s) => self.write_hex_string(w, s),
            Object::Name(n) => self.write_name(w, n),
            Object::Array(arr) => self.write_array(w, arr),
            Object::Dictionary(dict) => self.write_dictionary(w, dict),
            Object::Reference(r) => write!(w, "{} {} R", r.id, r.gen),
            Object::Raw(bytes) => w.write_all(bytes),
        }
    }

    /// Write a real number: plain decimal point, no exponent, trailing
    /// zeros trimmed.
    fn write_real<W: Write>(&self, w: &mut W, value: f64) -> std::io::Result<()> {
        if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
            write!(w, "{}", value as i64)
        } else {
            let formatted = format!("{:.5}", value);
            let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
            write!(w, "{}", trimmed)
        }
    }

    /// Write a literal string `(...)`.
    ///
    /// Escapes `\ ( ) \r \n \t \b \f`; any other non-printable byte is
    /// written as a three-digit octal escape.
    fn write_literal_string<W: Write>(&self, w: &mut W, data: &[u8]) -> std::io::Result<()> {
        write!(w, "(")?;
        for &byte in data {
            match byte {
                b'\\' => write!(w, "\\\\")?,
                b'(' => write!(w, "\\(")?,
                b')' => write!(w, "\\)")?,
                b'\r' => write!(w, "\\r")?,
                b'\n' => write!(w, "\\n")?,
                b'\t' => write!(w, "\\t")?,
                0x08 => write!(w, "\\b")?,
                0x0C => write!(w, "\\f")?,
                0x20..=0x7E => w.write_all(&[byte])?,
                _ => write!(w, "\\{:03o}", byte)?,
            }
        }
        write!(w, ")")
    }

    /// Write a hex string `<...>`: uppercase, no whitespace.
    fn write_hex_string<W: Write>(&self, w: &mut W, data: &[u8]) -> std::io::Result<()> {
        write!(w, "<")?;
        for byte in data {
            write!(w, "{:02X}", byte)?;
        }
        write!(w, ">")
    }

    /// Write a name: `/` plus its characters, `#hh`-escaping anything
    /// outside `!`..`~` and the delimiter set `()<>[]{}/%#`.
    ///
    /// Characters up to U+00FF stand for the name byte with the same code
    /// point (mirroring how the lexer decodes `#hh` escapes), so a parsed
    /// name serializes back to its original bytes. Anything above U+00FF
    /// is written as escaped UTF-8.
    fn write_name<W: Write>(&self, w: &mut W, name: &str) -> std::io::Result<()> {
        write!(w, "/")?;
        for c in name.chars() {
            let code = c as u32;
            if code > 0xFF {
                let mut buf = [0u8; 4];
                for &byte in c.encode_utf8(&mut buf).as_bytes() {
                    write!(w, "#{:02X}", byte)?;
                }
                continue;
            }
            let byte = code as u8;
            let needs_escape = !(b'!'..=b'~').contains(&byte)
                || matches!(
                    byte,
                    b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%' | b'#'
                );
            if needs_escape {
                write!(w, "#{:02X}", byte)?;
            } else {
                w.write_all(&[byte])?;
            }
        }
        Ok(())
    }

    /// Write an array: `[ v v v ]`, single-space separated.
    fn write_array<W: Write>(&self, w: &mut W, arr: &[Object]) -> std::io::Result<()> {
        if arr.is_empty() {
            return write!(w, "[ ]");
        }
        write!(w, "[ ")?;
        for (i, obj) in arr.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_object(w, obj)?;
        }
        write!(w, " ]")
    }

    /// Write a dictionary: `<< /K V /K V >>`, keys in insertion order.
    fn write_dictionary<W: Write>(&self, w: &mut W, dict: &Dict) -> std::io::Result<()> {
        if dict.is_empty() {
            return write!(w, "<< >>");
        }
        write!(w, "<< ")?;
        for (i, (key, value)) in dict.iter().enumerate() {
            if i > 0 {
                write!(w, " ")?;
            }
            self.write_name(w, key)?;
            write!(w, " ")?;
            self.write_object(w, value)?;
        }
        write!(w, " >>")
    }
}
