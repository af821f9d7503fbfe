//! Error types for the library.
//!
//! Every boundary operation (`open`, `sign_document`, `emit`) surfaces its
//! failures through the single [`Error`] enum defined here.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while reading, mutating or signing a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Structural parse failure at a specific byte offset
    #[error("failed to parse at byte {offset}: {reason}")]
    Parse {
        /// Byte offset where parsing failed
        offset: usize,
        /// Reason for the failure
        reason: String,
    },

    /// The trailer has no usable /Root entry
    #[error("trailer /Root missing or not resolvable")]
    MissingRoot,

    /// The trailer has no usable /Info entry
    #[error("trailer /Info missing or not resolvable")]
    MissingInfo,

    /// A page index was out of range or the page object is malformed
    #[error("invalid page {0}")]
    InvalidPage(usize),

    /// The page tree is malformed (bad /Type or /Kids)
    #[error("invalid page tree: {0}")]
    InvalidTree(String),

    /// A list of references appeared where a single reference was expected
    #[error("expected a single reference, found a list of references")]
    MixedReference,

    /// The PKCS#12 bundle could not be loaded or lacks key material
    #[error("certificate load failed: {0}")]
    CertLoad(String),

    /// Building the signature appearance failed
    #[error("appearance image error: {0}")]
    Image(String),

    /// A signature has already been prepared on this document
    #[error("a signature is already pending on this document")]
    AlreadyPrepared,

    /// The external signer primitive failed
    #[error("signer error: {0}")]
    Signer(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The requested PDF version string is not recognized
    #[error("unsupported version: {0}")]
    UnsupportedVersion(String),
}
