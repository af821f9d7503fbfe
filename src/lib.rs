//! # pdf-sello
//!
//! A PDF document mutator: open an existing PDF, modify its object graph
//! in memory, and emit a byte-compatible successor — either as an
//! incremental update appended to the original bytes or as a fully
//! rebuilt file. Its distinguishing feature is preparing a detached
//! PKCS#7 signature whose `/ByteRange` exactly excludes the signature's
//! own `/Contents` placeholder.
//!
//! ## Quick start
//!
//! ```ignore
//! use pdf_sello::Document;
//!
//! let bytes = std::fs::read("contract.pdf")?;
//! let mut doc = Document::open(bytes)?;
//!
//! doc.sign_document(
//!     std::path::Path::new("cert.p12"),
//!     "password",
//!     0,
//!     [50.0, 50.0, 200.0, 100.0],
//!     None,
//! )?;
//!
//! std::fs::write("contract-signed.pdf", doc.emit(false)?)?;
//! ```
//!
//! The emitted incremental revision preserves the input bytes verbatim;
//! the appended body, xref section (classic or stream, matching the
//! input's style) and trailer carry only the new and replaced objects.

#![warn(missing_docs)]

pub mod config;
pub mod document;
pub mod error;
pub mod lexer;
pub mod metadata;
pub mod object;
pub mod pages;
pub mod parser;
pub mod signatures;
pub mod writer;
pub mod xref;

pub use config::SigningConfig;
pub use document::Document;
pub use error::{Error, Result};
pub use object::{Dict, IndirectObject, Object, ObjectRef};
pub use signatures::{AppearanceImage, OpensslSigner, Pkcs7Signer, SigningCredentials};
pub use writer::ObjectSerializer;
