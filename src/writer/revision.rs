//! Revision emission.
//!
//! Serializes a document either as an incremental update appended to the
//! verbatim input bytes or as a fully rebuilt file, choosing the xref form
//! mandated by the input's newest revision. When a signature is pending,
//! emission is two-pass: the body and suffix are laid out around a
//! reserved signature slot, `/ByteRange` is patched in place (length
//! preserved), the covered ranges are signed through a scratch file, and
//! the hex signature is spliced into the `/Contents` window.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::Object;
use crate::parser::version_minor;
use crate::signatures::byterange;
use crate::writer::serializer::ObjectSerializer;
use crate::xref::{self, XRefEntry};
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;

/// Serialize the document. See [`Document::emit`].
pub(crate) fn emit(doc: &Document, rebuild: bool) -> Result<Vec<u8>> {
    // Incremental identity: nothing changed, nothing appended
    if !rebuild && doc.overrides.is_empty() && doc.pending_signature.is_none() {
        return Ok(doc.original_bytes.to_vec());
    }

    let serializer = ObjectSerializer::new();

    // Revision style is pinned by the input; the version only ratchets up
    // when a stream revision requires it.
    let xref_minor = version_minor(&doc.xref_revision_version).unwrap_or(4);
    let doc_minor = version_minor(&doc.version).unwrap_or(4);
    let use_stream = xref_minor >= 5;
    let target_minor = if use_stream {
        xref_minor.max(doc_minor)
    } else {
        xref_minor.min(doc_minor)
    };

    let sig_id = doc.pending_signature.as_ref().map(|p| p.sig_id);

    let mut prefix: Vec<u8> = Vec::new();
    let mut entries: BTreeMap<u32, XRefEntry> = BTreeMap::new();

    if rebuild {
        prefix.extend_from_slice(format!("%PDF-1.{}\n", target_minor).as_bytes());
        // Binary comment line marks the file as non-text
        prefix.extend_from_slice(b"%\x80\x81\x82\x83\n");

        for id in reachable_ids(doc) {
            if Some(id) == sig_id {
                continue;
            }
            let Some(obj) = doc.get_object(id) else {
                log::warn!("reachable object {} could not be loaded, skipping", id);
                continue;
            };
            entries.insert(id, XRefEntry::uncompressed(prefix.len() as u64, obj.gen));
            prefix.extend_from_slice(&serializer.serialize_indirect(&obj));
        }
    } else {
        prefix.extend_from_slice(&doc.original_bytes);
        if !prefix.ends_with(b"\n") {
            prefix.push(b'\n');
        }

        for obj in doc.overrides.iter() {
            if Some(obj.id) == sig_id {
                continue;
            }
            entries.insert(obj.id, XRefEntry::uncompressed(prefix.len() as u64, obj.gen));
            prefix.extend_from_slice(&serializer.serialize_indirect(obj));
        }
    }

    // The signature record occupies a slot between body and xref
    let mut sig_entry: Option<Vec<u8>> = None;
    let mut contents_start = 0usize;
    if let Some(pending) = &doc.pending_signature {
        let obj = doc.overrides.get(pending.sig_id).ok_or_else(|| {
            Error::Signer("pending signature object missing from overrides".to_string())
        })?;
        let entry_bytes = serializer.serialize_indirect(obj);
        contents_start =
            byterange::locate_contents(&entry_bytes, doc.config.signature_hex_capacity)?;
        entries.insert(obj.id, XRefEntry::uncompressed(prefix.len() as u64, obj.gen));
        sig_entry = Some(entry_bytes);
    }

    let prefix_len = prefix.len();
    let sig_len = sig_entry.as_ref().map(|e| e.len()).unwrap_or(0);
    let xref_offset = (prefix_len + sig_len) as u64;

    let prev = (!rebuild).then_some(doc.xref_offset_of_input);

    let suffix = if use_stream {
        // The xref stream is itself an object and appears in its own table
        let xref_id = doc.max_oid + 1;
        if rebuild {
            entries.insert(0, XRefEntry::free(0, 65535));
        }
        entries.insert(xref_id, XRefEntry::uncompressed(xref_offset, 0));

        let xref_obj =
            xref::build_xref_stream_object(xref_id, &entries, xref_id + 1, &doc.trailer, prev);
        let mut out = serializer.serialize_indirect(&xref_obj);
        out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
        out
    } else {
        entries.insert(0, XRefEntry::free(0, 65535));

        let mut trailer = doc.trailer.clone();
        trailer.remove("XRefStm");
        trailer.set("Size", Object::Integer(doc.max_oid as i64 + 1));
        match prev {
            Some(p) => trailer.set("Prev", Object::Integer(p as i64)),
            None => {
                trailer.remove("Prev");
            },
        }
        xref::write_classic_section(&entries, &trailer, xref_offset, |v| serializer.serialize(v))
    };

    let Some(mut entry) = sig_entry else {
        let mut full = prefix;
        full.extend_from_slice(&suffix);
        return Ok(full);
    };
    let pending = doc
        .pending_signature
        .as_ref()
        .ok_or_else(|| Error::Signer("signature slot without pending signature".to_string()))?;

    // Pass 1: ByteRange is computable before signing because every
    // placeholder has a fixed width
    let cap = doc.config.signature_hex_capacity;
    let br = byterange::compute_byte_range(prefix_len, suffix.len(), entry.len(), contents_start, cap);
    let len_before_patch = entry.len();
    byterange::patch_byte_range(&mut entry, br, doc.config.byte_range_capacity)?;
    if entry.len() != len_before_patch {
        return Err(Error::Signer("/ByteRange patch changed the record length".to_string()));
    }

    let mut full = prefix;
    full.extend_from_slice(&entry);
    full.extend_from_slice(&suffix);

    // Pass 2: sign the covered ranges through a scratch file, then splice
    let signable = byterange::extract_signable(&full, br);
    let mut scratch = tempfile::Builder::new()
        .prefix("sello-sign-")
        .tempfile_in(&doc.config.temp_dir)?;
    scratch.write_all(&signable)?;
    scratch.flush()?;
    let signed = pending.signer.sign_detached(scratch.path());
    drop(scratch);
    let der = signed?;

    let hex = byterange::to_upper_hex(&der);
    byterange::splice_signature(&mut full, br[1] as usize, &hex, cap)?;
    Ok(full)
}

/// Every object id reachable from the trailer, ascending.
fn reachable_ids(doc: &Document) -> Vec<u32> {
    let mut seen: BTreeSet<u32> = BTreeSet::new();
    let mut stack: Vec<u32> = Vec::new();

    for (_, value) in doc.trailer().iter() {
        collect_refs(value, &mut stack);
    }

    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(obj) = doc.get_object(id) {
            collect_refs(&obj.value, &mut stack);
        } else {
            log::debug!("dangling reference to object {}", id);
        }
    }

    seen.into_iter().collect()
}

fn collect_refs(value: &Object, stack: &mut Vec<u32>) {
    match value {
        Object::Reference(r) => stack.push(r.id),
        Object::Array(items) => {
            for item in items {
                collect_refs(item, stack);
            }
        },
        Object::Dictionary(dict) => {
            for (_, v) in dict.iter() {
                collect_refs(v, stack);
            }
        },
        _ => {},
    }
}
