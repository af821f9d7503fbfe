//! Configuration for signature emission.

use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Hex characters reserved for the signature `/Contents` placeholder.
pub const DEFAULT_SIG_HEX_CAP: usize = 11742;

/// Bytes reserved for the `/ByteRange [ a b c d ]` value.
pub const DEFAULT_BYTE_RANGE_CAP: usize = 68;

/// Default `/Producer` string written into the Info dictionary on signing.
pub const DEFAULT_PRODUCER: &str = "Modificado con SAPP";

/// Signing configuration.
///
/// Holds the placeholder capacities and the environment knobs used while
/// preparing and emitting a signature. The capacities default to values
/// sized for a full PKCS#7 chain and must match on both emission passes.
#[derive(Debug, Clone)]
pub struct SigningConfig {
    /// Capacity of the `/Contents` hex placeholder, in hex characters.
    pub signature_hex_capacity: usize,

    /// Capacity of the `/ByteRange` value, in bytes.
    pub byte_range_capacity: usize,

    /// Directory for the scratch file holding the signable byte image.
    pub temp_dir: PathBuf,

    /// `/Producer` value written to the Info dictionary.
    pub producer: String,

    /// Seed for the widget-name suffix generator. `None` uses OS entropy.
    pub widget_rng_seed: Option<u64>,

    /// Fixed signing time. `None` uses the current time at emission.
    pub signing_time: Option<DateTime<Utc>>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl SigningConfig {
    /// Create a new configuration with defaults.
    pub fn new() -> Self {
        Self {
            signature_hex_capacity: DEFAULT_SIG_HEX_CAP,
            byte_range_capacity: DEFAULT_BYTE_RANGE_CAP,
            temp_dir: std::env::temp_dir(),
            producer: DEFAULT_PRODUCER.to_string(),
            widget_rng_seed: None,
            signing_time: None,
        }
    }

    /// Override the scratch directory.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = dir.into();
        self
    }

    /// Override the `/Producer` string.
    pub fn with_producer(mut self, producer: impl Into<String>) -> Self {
        self.producer = producer.into();
        self
    }

    /// Seed the widget-name generator for reproducible output.
    pub fn with_widget_rng_seed(mut self, seed: u64) -> Self {
        self.widget_rng_seed = Some(seed);
        self
    }

    /// Pin the signing time for reproducible output.
    pub fn with_signing_time(mut self, time: DateTime<Utc>) -> Self {
        self.signing_time = Some(time);
        self
    }

    /// The effective signing time.
    pub fn effective_signing_time(&self) -> DateTime<Utc> {
        self.signing_time.unwrap_or_else(Utc::now)
    }

    /// The signing time formatted as a PDF date string (`D:YYYYMMDDHHMMSS+HH'MM'`).
    pub fn pdf_date(&self) -> String {
        self.effective_signing_time()
            .format("D:%Y%m%d%H%M%S+00'00'")
            .to_string()
    }

    /// The signing time formatted as an ISO-8601 timestamp for XMP fields.
    pub fn xmp_date(&self) -> String {
        self.effective_signing_time()
            .format("%Y-%m-%dT%H:%M:%S+00:00")
            .to_string()
    }
}
