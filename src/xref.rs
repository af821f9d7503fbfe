//! Cross-reference tables.
//!
//! The xref table maps object numbers to byte offsets, enabling random
//! access to objects. This module holds the in-memory table type shared by
//! the reader and the writer, plus the two section writers: the classic
//! `xref`/`trailer` form (PDF 1.0-1.4 revisions) and the cross-reference
//! stream form (PDF 1.5+ revisions). Emitted xref streams are never
//! filtered.

use crate::object::{Dict, IndirectObject, Object};
use std::collections::BTreeMap;

/// Cross-reference entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntryType {
    /// Entry for a free object
    Free,
    /// Entry for an uncompressed object
    Uncompressed,
    /// Entry for an object inside an object stream (input only; this
    /// library never writes compressed entries)
    Compressed,
}

/// Cross-reference table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XRefEntry {
    /// Type of entry
    pub entry_type: XRefEntryType,
    /// Byte offset (uncompressed), next free id (free), or container
    /// stream number (compressed)
    pub offset: u64,
    /// Generation number (uncompressed/free) or index within the
    /// container stream (compressed)
    pub generation: u16,
}

impl XRefEntry {
    /// Create an in-use, uncompressed entry.
    pub fn uncompressed(offset: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Uncompressed,
            offset,
            generation,
        }
    }

    /// Create a free entry.
    pub fn free(next_free: u64, generation: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Free,
            offset: next_free,
            generation,
        }
    }

    /// Create a compressed entry (object lives in an object stream).
    pub fn compressed(container: u64, index: u16) -> Self {
        Self {
            entry_type: XRefEntryType::Compressed,
            offset: container,
            generation: index,
        }
    }

    /// Whether the entry points at a live object.
    pub fn in_use(&self) -> bool {
        self.entry_type != XRefEntryType::Free
    }
}

/// Cross-reference table mapping object numbers to their locations.
///
/// Kept sorted by object number so subsection ranges fall out of plain
/// iteration.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: BTreeMap<u32, XRefEntry>,
}

impl CrossRefTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry.
    pub fn add_entry(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Get an entry by object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Whether the object number has an entry.
    pub fn contains(&self, id: u32) -> bool {
        self.entries.contains_key(&id)
    }

    /// Merge entries from an older table; entries already present win.
    ///
    /// Used when following `/Prev` pointers: the newest revision's entries
    /// shadow earlier ones.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
    }

    /// Iterate entries in ascending object number order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &XRefEntry)> {
        self.entries.iter().map(|(id, e)| (*id, e))
    }

    /// Largest object number present, if any.
    pub fn max_id(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split sorted ids into maximal contiguous ranges: `(start, count)`.
fn subsections(ids: &[u32]) -> Vec<(u32, u32)> {
    let mut out = Vec::new();
    let mut iter = ids.iter().copied();
    let Some(first) = iter.next() else {
        return out;
    };
    let mut start = first;
    let mut prev = first;
    for id in iter {
        if id == prev + 1 {
            prev = id;
        } else {
            out.push((start, prev - start + 1));
            start = id;
            prev = id;
        }
    }
    out.push((start, prev - start + 1));
    out
}

/// Write a classic `xref` section followed by its trailer.
///
/// Entries are grouped into one subsection per maximal contiguous object
/// number range; each entry is the fixed 20-byte record
/// `NNNNNNNNNN GGGGG n \n`. The caller supplies the trailer dictionary
/// already carrying `/Size` (and `/Prev` for incremental revisions).
pub fn write_classic_section(
    entries: &BTreeMap<u32, XRefEntry>,
    trailer: &Dict,
    xref_offset: u64,
    serialize_value: impl Fn(&Object) -> Vec<u8>,
) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"xref\n");

    let ids: Vec<u32> = entries.keys().copied().collect();
    for (start, count) in subsections(&ids) {
        out.extend_from_slice(format!("{} {}\n", start, count).as_bytes());
        for id in start..start + count {
            let entry = &entries[&id];
            let kind = if entry.in_use() { 'n' } else { 'f' };
            out.extend_from_slice(
                format!("{:010} {:05} {} \n", entry.offset, entry.generation, kind).as_bytes(),
            );
        }
    }

    out.extend_from_slice(b"trailer\n");
    out.extend_from_slice(&serialize_value(&Object::Dictionary(trailer.clone())));
    out.extend_from_slice(format!("\nstartxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// Build the cross-reference stream object for a PDF 1.5+ revision.
///
/// The returned object holds the trailer dictionary (cloned and cleaned of
/// any inherited `/Filter`/`/DecodeParms`) extended with `/Type /XRef`,
/// `/Size`, `/W` and `/Index`, and an uncompressed three-field entry
/// stream. Field widths are `[1, ceil(log256(max_offset)), 2]`; only type
/// codes 0 (free) and 1 (in-use) are produced.
pub fn build_xref_stream_object(
    xref_id: u32,
    entries: &BTreeMap<u32, XRefEntry>,
    size: u32,
    trailer_base: &Dict,
    prev: Option<u64>,
) -> IndirectObject {
    let max_offset = entries.values().map(|e| e.offset).max().unwrap_or(0);
    let mut offset_width = 1;
    while (max_offset >> (8 * offset_width)) > 0 {
        offset_width += 1;
    }

    let ids: Vec<u32> = entries.keys().copied().collect();
    let ranges = subsections(&ids);

    let mut data = Vec::with_capacity(entries.len() * (3 + offset_width));
    for entry in entries.values() {
        let type_code: u8 = match entry.entry_type {
            XRefEntryType::Free => 0,
            XRefEntryType::Uncompressed => 1,
            // Never produced by this writer; entries are built locally
            XRefEntryType::Compressed => unreachable!("compressed entries are not written"),
        };
        data.push(type_code);
        for i in (0..offset_width).rev() {
            data.push(((entry.offset >> (8 * i)) & 0xFF) as u8);
        }
        data.extend_from_slice(&entry.generation.to_be_bytes());
    }

    let mut dict = trailer_base.clone();
    dict.remove("Filter");
    dict.remove("DecodeParms");
    dict.remove("Prev");
    dict.remove("XRefStm");
    dict.set("Type", Object::Name("XRef".to_string()));
    dict.set("Size", Object::Integer(size as i64));
    dict.set(
        "W",
        Object::Array(vec![
            Object::Integer(1),
            Object::Integer(offset_width as i64),
            Object::Integer(2),
        ]),
    );
    let mut index = Vec::with_capacity(ranges.len() * 2);
    for (start, count) in &ranges {
        index.push(Object::Integer(*start as i64));
        index.push(Object::Integer(*count as i64));
    }
    dict.set("Index", Object::Array(index));
    if let Some(prev) = prev {
        dict.set("Prev", Object::Integer(prev as i64));
    }

    IndirectObject::with_stream(xref_id, 0, dict, data)
}
