//! Document model.
//!
//! A [`Document`] owns the immutable input bytes, the cross-reference view
//! over them, and the in-memory override store for objects created or
//! replaced in this session. Object lookup is dual-source: overrides win
//! unless the caller explicitly prefers the original bytes. The override
//! store is only ever written through [`Document::add_object`] /
//! [`Document::create_object`]; lookups never mutate it.

use crate::config::SigningConfig;
use crate::error::{Error, Result};
use crate::object::{Dict, IndirectObject, Object};
use crate::pages::{self, PageRecord};
use crate::parser;
use crate::signatures::{self, AppearanceImage, OpensslSigner, PendingSignature, Pkcs7Signer,
                        SigningCredentials};
use crate::xref::CrossRefTable;
use bytes::Bytes;
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref VERSION_RE: Regex = Regex::new(r"^PDF-1\.[0-7]$").expect("static regex");
}

/// Insertion-ordered store of created/replaced objects.
#[derive(Debug, Clone, Default)]
pub(crate) struct ObjectStore {
    order: Vec<u32>,
    map: HashMap<u32, IndirectObject>,
}

impl ObjectStore {
    /// Insert or replace; replacement keeps the original position.
    pub(crate) fn insert(&mut self, obj: IndirectObject) {
        if !self.map.contains_key(&obj.id) {
            self.order.push(obj.id);
        }
        self.map.insert(obj.id, obj);
    }

    pub(crate) fn get(&self, id: u32) -> Option<&IndirectObject> {
        self.map.get(&id)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &IndirectObject> {
        self.order.iter().filter_map(|id| self.map.get(id))
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }
}

/// An opened PDF document.
///
/// Single-threaded and non-reentrant; the input buffer is read-only for
/// the life of the document. After a final [`Document::emit`] the caller
/// is expected to open a fresh document from the emitted bytes to chain
/// further changes (signatures do not compose within one instance).
pub struct Document {
    pub(crate) version: String,
    pub(crate) original_bytes: Bytes,
    pub(crate) original_xref: CrossRefTable,
    pub(crate) xref_revision_version: String,
    pub(crate) overrides: ObjectStore,
    pub(crate) trailer: Dict,
    pub(crate) xref_offset_of_input: u64,
    pub(crate) max_oid: u32,
    pub(crate) page_index: Vec<PageRecord>,
    pub(crate) pending_signature: Option<PendingSignature>,
    pub(crate) config: SigningConfig,
    pub(crate) encrypted: bool,
}

impl Document {
    /// Open a document from raw bytes with the default configuration.
    pub fn open(bytes: impl Into<Bytes>) -> Result<Self> {
        Self::open_with_config(bytes, SigningConfig::default())
    }

    /// Open a document from raw bytes.
    pub fn open_with_config(bytes: impl Into<Bytes>, config: SigningConfig) -> Result<Self> {
        let original_bytes = bytes.into();
        let structure = parser::parse_structure(&original_bytes)?;

        // Size counts one past the largest object number; either source
        // may know about ids the other does not.
        let from_xref = structure.xref.max_id().unwrap_or(0);
        let from_size = structure
            .trailer
            .get("Size")
            .and_then(|o| o.as_integer())
            .map(|s| (s.max(1) - 1) as u32)
            .unwrap_or(0);
        let max_oid = from_xref.max(from_size);

        let mut doc = Self {
            version: structure.version,
            original_bytes,
            original_xref: structure.xref,
            xref_revision_version: structure.xref_version,
            overrides: ObjectStore::default(),
            trailer: structure.trailer,
            xref_offset_of_input: structure.xref_position,
            max_oid,
            page_index: Vec::new(),
            pending_signature: None,
            config,
            encrypted: structure.encrypted,
        };

        doc.page_index = pages::build_page_index(&doc)?;
        Ok(doc)
    }

    /// The document version string (`PDF-1.x`).
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Set the document version. Validated against `^PDF-1\.[0-7]$`.
    pub fn set_version(&mut self, version: &str) -> Result<()> {
        if !VERSION_RE.is_match(version) {
            return Err(Error::UnsupportedVersion(version.to_string()));
        }
        self.version = version.to_string();
        Ok(())
    }

    /// The trailer dictionary of the newest input revision.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Whether the input declared `/Encrypt`.
    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    /// Largest object number ever seen by this document.
    pub fn max_object_id(&self) -> u32 {
        self.max_oid
    }

    /// Look up an object, overrides first.
    pub fn get_object(&self, id: u32) -> Option<IndirectObject> {
        self.get_object_with(id, false)
    }

    /// Look up an object with explicit source preference.
    ///
    /// `prefer_original` inverts the usual overrides-first order. Absence
    /// is not an error; only callers know whether it is fatal.
    pub fn get_object_with(&self, id: u32, prefer_original: bool) -> Option<IndirectObject> {
        let from_original = || match parser::find_object(&self.original_bytes, &self.original_xref, id)
        {
            Ok(obj) => Some(obj),
            Err(e) => {
                log::debug!("object {} not loadable from input: {}", id, e);
                None
            },
        };

        if prefer_original {
            from_original().or_else(|| self.overrides.get(id).cloned())
        } else {
            self.overrides.get(id).cloned().or_else(from_original)
        }
    }

    /// Resolve a value through the document.
    ///
    /// An indirect reference resolves via [`Document::get_object`]; a list
    /// of references fails with [`Error::MixedReference`]; any other value
    /// is returned wrapped as a synthetic object (id 0).
    pub fn resolve(&self, value: &Object) -> Result<Option<IndirectObject>> {
        if let Some(r) = value.as_reference() {
            return Ok(self.get_object(r.id));
        }
        if value.is_reference_list() {
            return Err(Error::MixedReference);
        }
        Ok(Some(IndirectObject {
            id: 0,
            gen: 0,
            value: value.clone(),
            stream: None,
            stream_filtered: false,
        }))
    }

    /// Allocate a fresh object number.
    pub fn new_oid(&mut self) -> u32 {
        self.max_oid += 1;
        self.max_oid
    }

    /// Allocate and register a new object holding `value`. Returns its id.
    pub fn create_object(&mut self, value: Object) -> u32 {
        let id = self.new_oid();
        self.overrides.insert(IndirectObject::new(id, 0, value));
        id
    }

    /// Insert or replace an object in the override store.
    pub fn add_object(&mut self, obj: IndirectObject) {
        if obj.id > self.max_oid {
            self.max_oid = obj.id;
        }
        self.overrides.insert(obj);
    }

    /// Number of pages reachable from the catalog.
    pub fn page_count(&self) -> usize {
        self.page_index.len()
    }

    /// Load page `i` (0-based).
    pub fn get_page(&self, i: usize) -> Option<IndirectObject> {
        let record = self.page_index.get(i)?;
        self.get_object(record.id)
    }

    /// Effective MediaBox of page `i`.
    pub fn page_size(&self, i: usize) -> Option<[f64; 4]> {
        self.page_index.get(i).map(|r| r.media_box)
    }

    /// Prepare a signature using a PKCS#12 bundle from disk.
    ///
    /// `rect` is `[x0 y0 x1 y1]` in top-left page coordinates; the widget
    /// rectangle is flipped against the page height during preparation.
    pub fn sign_document(
        &mut self,
        pkcs12_path: &Path,
        password: &str,
        page: usize,
        rect: [f64; 4],
        image: Option<AppearanceImage>,
    ) -> Result<()> {
        let credentials = SigningCredentials::from_pkcs12_file(pkcs12_path, password)?;
        self.sign_document_with(Box::new(OpensslSigner::new(credentials)), page, rect, image)
    }

    /// Prepare a signature using a caller-supplied signer primitive.
    pub fn sign_document_with(
        &mut self,
        signer: Box<dyn Pkcs7Signer>,
        page: usize,
        rect: [f64; 4],
        image: Option<AppearanceImage>,
    ) -> Result<()> {
        signatures::prepare(self, signer, page, rect, image)
    }

    /// Serialize the document.
    ///
    /// `rebuild = false` appends an incremental revision after the input
    /// bytes (and returns the input unchanged when nothing was modified);
    /// `rebuild = true` writes a complete file containing every reachable
    /// object exactly once. A pending signature is signed and spliced in
    /// either mode.
    pub fn emit(&self, rebuild: bool) -> Result<Vec<u8>> {
        crate::writer::emit(self, rebuild)
    }
}
