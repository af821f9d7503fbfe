//! Shared fixtures: small PDFs assembled with correct offsets, plus a
//! deterministic fake signer.
#![allow(dead_code)]

use pdf_sello::{Pkcs7Signer, Result};
use std::path::Path;
use std::sync::Once;

static LOGGER: Once = Once::new();

/// Initialize logging once per test binary so `RUST_LOG=debug` surfaces
/// the library's parse/emit diagnostics.
pub fn init_logging() {
    LOGGER.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

/// Assemble a classic-xref PDF from object bodies with ids 1..=n.
pub fn assemble_classic(minor: u8, objects: &[(u32, String)], trailer_body: &str) -> Vec<u8> {
    init_logging();
    let mut out = format!("%PDF-1.{}\n", minor).into_bytes();
    let mut offsets: Vec<(u32, usize)> = Vec::new();

    for (id, body) in objects {
        offsets.push((*id, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }

    let xref_offset = out.len();
    let max = objects.iter().map(|(id, _)| *id).max().expect("objects");
    out.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
    out.extend_from_slice(b"0000000000 65535 f \n");
    for id in 1..=max {
        let off = offsets
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, o)| *o)
            .expect("fixture ids must be contiguous from 1");
        out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< {} >>\nstartxref\n{}\n%%EOF\n",
            trailer_body, xref_offset
        )
        .as_bytes(),
    );
    out
}

/// One-page PDF 1.4, classic xref, MediaBox [0 0 612 792].
pub fn minimal_pdf() -> Vec<u8> {
    assemble_classic(
        4,
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
            (
                2,
                "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_string(),
            ),
            (3, "<< /Type /Page /Parent 2 0 R >>".to_string()),
            (4, "<< /Producer (fixture) >>".to_string()),
        ],
        "/Size 5 /Root 1 0 R /Info 4 0 R",
    )
}

/// Like [`minimal_pdf`] but the page carries an inline `/Annots [ 5 0 R ]`.
pub fn pdf_with_inline_annots() -> Vec<u8> {
    assemble_classic(
        4,
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
            (
                2,
                "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_string(),
            ),
            (
                3,
                "<< /Type /Page /Parent 2 0 R /Annots [ 5 0 R ] >>".to_string(),
            ),
            (4, "<< /Producer (fixture) >>".to_string()),
            (
                5,
                "<< /Type /Annot /Subtype /Text /Rect [ 0 0 10 10 ] >>".to_string(),
            ),
        ],
        "/Size 6 /Root 1 0 R /Info 4 0 R",
    )
}

/// Like [`minimal_pdf`] but the catalog points at an XMP metadata stream.
pub fn pdf_with_metadata() -> Vec<u8> {
    let xmp = "<x:xmpmeta xmlns:x=\"adobe:ns:meta/\">\
               <xmp:ModifyDate>2020-01-01T00:00:00Z</xmp:ModifyDate>\
               <xmp:MetadataDate>2020-01-01T00:00:00Z</xmp:MetadataDate>\
               </x:xmpmeta>";
    let metadata_body = format!(
        "<< /Type /Metadata /Subtype /XML /Length {} >>\nstream\n{}\nendstream",
        xmp.len(),
        xmp
    );
    assemble_classic(
        4,
        &[
            (
                1,
                "<< /Type /Catalog /Pages 2 0 R /Metadata 5 0 R >>".to_string(),
            ),
            (
                2,
                "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_string(),
            ),
            (3, "<< /Type /Page /Parent 2 0 R >>".to_string()),
            (4, "<< /Producer (fixture) >>".to_string()),
            (5, metadata_body),
        ],
        "/Size 6 /Root 1 0 R /Info 4 0 R",
    )
}

/// One-page PDF whose trailer has no /Info entry.
pub fn pdf_without_info() -> Vec<u8> {
    assemble_classic(
        4,
        &[
            (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
            (
                2,
                "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_string(),
            ),
            (3, "<< /Type /Page /Parent 2 0 R >>".to_string()),
        ],
        "/Size 4 /Root 1 0 R",
    )
}

/// One-page PDF 1.6 using a cross-reference stream (uncompressed, W [1 2 2]).
pub fn xref_stream_pdf() -> Vec<u8> {
    let objects: Vec<(u32, String)> = vec![
        (1, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (
            2,
            "<< /Type /Pages /Kids [ 3 0 R ] /Count 1 /MediaBox [ 0 0 612 792 ] >>".to_string(),
        ),
        (3, "<< /Type /Page /Parent 2 0 R >>".to_string()),
        (4, "<< /Producer (fixture) >>".to_string()),
    ];

    init_logging();
    let mut out = b"%PDF-1.6\n".to_vec();
    let mut offsets: Vec<(u32, usize)> = Vec::new();
    for (id, body) in &objects {
        offsets.push((*id, out.len()));
        out.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", id, body).as_bytes());
    }

    let xref_offset = out.len();
    let mut data: Vec<u8> = Vec::new();
    // object 0: free
    data.extend_from_slice(&[0, 0, 0, 0xFF, 0xFF]);
    for id in 1..=4u32 {
        let off = offsets.iter().find(|(i, _)| *i == id).map(|(_, o)| *o).unwrap();
        data.extend_from_slice(&[1, (off >> 8) as u8, off as u8, 0, 0]);
    }
    // object 5: the xref stream itself
    data.extend_from_slice(&[1, (xref_offset >> 8) as u8, xref_offset as u8, 0, 0]);

    let dict = format!(
        "<< /Type /XRef /Size 6 /W [ 1 2 2 ] /Index [ 0 6 ] /Root 1 0 R /Info 4 0 R /Length {} >>",
        data.len()
    );
    out.extend_from_slice(format!("5 0 obj\n{}\nstream\n", dict).as_bytes());
    out.extend_from_slice(&data);
    out.extend_from_slice(b"\nendstream\nendobj\n");
    out.extend_from_slice(format!("startxref\n{}\n%%EOF\n", xref_offset).as_bytes());
    out
}

/// Deterministic signer returning a fixed DER blob.
pub struct FakeSigner {
    pub der: Vec<u8>,
}

impl FakeSigner {
    pub fn new() -> Self {
        Self {
            der: vec![0xAB; 1500],
        }
    }
}

impl Pkcs7Signer for FakeSigner {
    fn sign_detached(&self, signable: &Path) -> Result<Vec<u8>> {
        // Reading back proves the scratch file exists while signing runs
        let data = std::fs::read(signable)?;
        assert!(!data.is_empty());
        Ok(self.der.clone())
    }
}

/// Parse `/ByteRange [0 a b c]` out of emitted bytes.
pub fn parse_byte_range(bytes: &[u8]) -> Option<[i64; 4]> {
    let text = String::from_utf8_lossy(bytes);
    let idx = text.find("/ByteRange [0 ")?;
    let rest = &text[idx + "/ByteRange [0 ".len()..];
    let end = rest.find(']')?;
    let nums: Vec<i64> = rest[..end]
        .split_whitespace()
        .map(|s| s.parse().ok())
        .collect::<Option<_>>()?;
    if nums.len() != 3 {
        return None;
    }
    Some([0, nums[0], nums[1], nums[2]])
}
