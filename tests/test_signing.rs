//! Signature preparation and two-pass emission.

mod common;

use chrono::TimeZone;
use common::*;
use pdf_sello::config::DEFAULT_SIG_HEX_CAP;
use pdf_sello::{Document, Error, Object, SigningConfig};

fn test_config(temp_dir: &std::path::Path) -> SigningConfig {
    SigningConfig::new()
        .with_widget_rng_seed(42)
        .with_signing_time(chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap())
        .with_temp_dir(temp_dir)
}

fn sign_fixture(input: Vec<u8>) -> (Vec<u8>, Vec<u8>) {
    let temp = tempfile::tempdir().unwrap();
    let mut doc = Document::open_with_config(input.clone(), test_config(temp.path())).unwrap();
    doc.sign_document_with(
        Box::new(FakeSigner::new()),
        0,
        [50.0, 50.0, 200.0, 100.0],
        None,
    )
    .unwrap();
    let out = doc.emit(false).unwrap();
    (input, out)
}

#[test]
fn signed_output_layout() {
    let (input, out) = sign_fixture(minimal_pdf());

    // The input bytes are preserved verbatim
    assert_eq!(&out[..input.len()], &input[..]);
    assert!(out.ends_with(b"%%EOF\n"));

    // The revision body opens with the widget annotation object
    let tail = &out[input.len()..];
    assert!(tail.starts_with(b"6 0 obj\n"), "revision starts with the annotation");

    let br = parse_byte_range(&out).expect("ByteRange must parse");
    let [_, a, b, c] = br;

    // Coverage: the two ranges plus the excluded window span the file
    assert_eq!(a + (b - a) + (c - b), out.len() as i64);
    // Exclusion: the window is exactly < + hex + >
    let (a, b) = (a as usize, b as usize);
    assert_eq!(out[a], b'<');
    assert_eq!(out[b - 1], b'>');
    assert_eq!(b - a, DEFAULT_SIG_HEX_CAP + 2);
    let window = &out[a + 1..b - 1];
    assert!(window.iter().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn signature_hex_holds_signer_output_padded_with_zeros() {
    let (_, out) = sign_fixture(minimal_pdf());
    let br = parse_byte_range(&out).unwrap();
    let (a, b) = (br[1] as usize, br[2] as usize);
    let window = &out[a + 1..b - 1];

    // FakeSigner returns 1500 bytes of 0xAB
    let expected_hex = "AB".repeat(1500);
    assert_eq!(&window[..expected_hex.len()], expected_hex.as_bytes());
    assert!(window[expected_hex.len()..].iter().all(|&c| c == b'0'));
}

#[test]
fn signed_output_is_deterministic() {
    let (_, first) = sign_fixture(minimal_pdf());
    let (_, second) = sign_fixture(minimal_pdf());
    assert_eq!(first, second);
}

#[test]
fn widget_and_form_entries_present() {
    let (input, out) = sign_fixture(minimal_pdf());
    let tail = String::from_utf8_lossy(&out[input.len()..]).to_string();

    assert!(tail.contains("/Subtype /Widget"));
    assert!(tail.contains("/FT /Sig"));
    assert!(tail.contains("(Signature"));
    assert!(tail.contains("/F 132"));
    assert!(tail.contains("/SigFlags 3"));
    assert!(tail.contains("/Filter /Adobe.PPKLite"));
    assert!(tail.contains("/SubFilter /adbe.pkcs7.detached"));

    // rect [50, 50, 200, 100] flipped against a 792-high page
    assert!(tail.contains("/Rect [ 50 742 200 692 ]"));
}

#[test]
fn info_dictionary_updated() {
    let (input, out) = sign_fixture(minimal_pdf());
    let tail = String::from_utf8_lossy(&out[input.len()..]).to_string();

    assert!(tail.contains("/ModDate (D:20240615120000+00'00')"));
    assert!(tail.contains("/M (D:20240615120000+00'00')"));
    assert!(tail.contains("/Producer (Modificado con SAPP)"));
}

#[test]
fn second_preparation_fails() {
    let temp = tempfile::tempdir().unwrap();
    let mut doc =
        Document::open_with_config(minimal_pdf(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();

    let result =
        doc.sign_document_with(Box::new(FakeSigner::new()), 0, [0.0, 0.0, 10.0, 10.0], None);
    assert!(matches!(result, Err(Error::AlreadyPrepared)));

    // The first preparation still emits cleanly
    assert!(doc.emit(false).is_ok());
}

#[test]
fn failed_preparation_rolls_back() {
    let input = pdf_without_info();
    let temp = tempfile::tempdir().unwrap();
    let mut doc = Document::open_with_config(input.clone(), test_config(temp.path())).unwrap();

    let result =
        doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None);
    assert!(matches!(result, Err(Error::MissingInfo)));

    // No partial commit: emission is still the identity
    assert_eq!(doc.emit(false).unwrap(), input);
}

#[test]
fn invalid_page_rolls_back() {
    let input = minimal_pdf();
    let temp = tempfile::tempdir().unwrap();
    let mut doc = Document::open_with_config(input.clone(), test_config(temp.path())).unwrap();

    let result =
        doc.sign_document_with(Box::new(FakeSigner::new()), 9, [50.0, 50.0, 200.0, 100.0], None);
    assert!(matches!(result, Err(Error::InvalidPage(9))));
    assert_eq!(doc.emit(false).unwrap(), input);
}

#[test]
fn cert_load_failure_leaves_document_untouched() {
    let input = minimal_pdf();
    let mut doc = Document::open(input.clone()).unwrap();
    let result = doc.sign_document(
        std::path::Path::new("/nonexistent/bundle.p12"),
        "pw",
        0,
        [50.0, 50.0, 200.0, 100.0],
        None,
    );
    assert!(matches!(result, Err(Error::CertLoad(_))));
    assert_eq!(doc.emit(false).unwrap(), input);
}

#[test]
fn inline_annots_promoted_to_indirect_list() {
    let input = pdf_with_inline_annots();
    let temp = tempfile::tempdir().unwrap();
    let mut doc = Document::open_with_config(input.clone(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();
    let out = doc.emit(false).unwrap();

    let reopened = Document::open(out).unwrap();
    let page = reopened.get_page(0).unwrap();
    let annots = page.dict().unwrap().get("Annots").cloned().unwrap();

    // Promoted to an indirect reference pointing at a list holding the
    // original entry first and the new widget second
    let list_ref = annots.as_reference().expect("/Annots is an indirect reference");
    let list = reopened.get_object(list_ref.id).unwrap();
    let items = list.value.as_array().unwrap().clone();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].as_reference().unwrap().id, 5);

    let widget_id = items[1].as_reference().unwrap().id;
    let widget = reopened.get_object(widget_id).unwrap();
    assert_eq!(
        widget.dict().unwrap().get("Subtype").unwrap().as_name(),
        Some("Widget")
    );
}

#[test]
fn metadata_dates_rewritten_at_signing_time() {
    let input = pdf_with_metadata();
    let temp = tempfile::tempdir().unwrap();
    let mut doc = Document::open_with_config(input.clone(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();
    let out = doc.emit(false).unwrap();

    let tail = String::from_utf8_lossy(&out[input.len()..]).to_string();
    assert!(tail.contains("<xmp:ModifyDate>2024-06-15T12:00:00+00:00</xmp:ModifyDate>"));
    assert!(tail.contains("<xmp:MetadataDate>2024-06-15T12:00:00+00:00</xmp:MetadataDate>"));
    assert!(!tail.contains("2020-01-01"));

    // The replacement object wins on lookup
    let reopened = Document::open(out).unwrap();
    let metadata = reopened.get_object(5).unwrap();
    let text = String::from_utf8_lossy(metadata.stream.as_ref().unwrap());
    assert!(text.contains("2024-06-15T12:00:00+00:00"));
}

#[test]
fn signing_xref_stream_input_keeps_stream_form() {
    let (input, out) = sign_fixture(xref_stream_pdf());

    assert_eq!(&out[..input.len()], &input[..]);
    let tail = String::from_utf8_lossy(&out[input.len()..]).to_string();
    assert!(tail.contains("/Type /XRef"));
    assert!(!tail.contains("trailer\n"));

    let br = parse_byte_range(&out).unwrap();
    assert_eq!(br[1] + (br[2] - br[1]) + br[3], out.len() as i64);
    assert_eq!(out[br[1] as usize], b'<');
    assert_eq!(out[br[2] as usize - 1], b'>');
}

#[test]
fn scratch_files_are_removed() {
    let temp = tempfile::tempdir().unwrap();
    let mut doc =
        Document::open_with_config(minimal_pdf(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();
    doc.emit(false).unwrap();

    let leftovers: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch dir must be empty after emit");
}

#[test]
fn scratch_files_are_removed_when_signer_fails() {
    struct FailingSigner;
    impl pdf_sello::Pkcs7Signer for FailingSigner {
        fn sign_detached(&self, _: &std::path::Path) -> pdf_sello::Result<Vec<u8>> {
            Err(Error::Signer("induced failure".to_string()))
        }
    }

    let temp = tempfile::tempdir().unwrap();
    let mut doc =
        Document::open_with_config(minimal_pdf(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FailingSigner), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();

    assert!(matches!(doc.emit(false), Err(Error::Signer(_))));
    let leftovers: Vec<_> = std::fs::read_dir(temp.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "scratch dir must be empty after failure");
}

#[test]
fn rebuild_mode_signs_too() {
    let temp = tempfile::tempdir().unwrap();
    let mut doc =
        Document::open_with_config(minimal_pdf(), test_config(temp.path())).unwrap();
    doc.sign_document_with(Box::new(FakeSigner::new()), 0, [50.0, 50.0, 200.0, 100.0], None)
        .unwrap();
    let out = doc.emit(true).unwrap();

    assert!(out.starts_with(b"%PDF-1.4\n"));
    assert!(out.ends_with(b"%%EOF\n"));
    let text = String::from_utf8_lossy(&out);
    assert!(!text.contains("/Prev"));

    let br = parse_byte_range(&out).unwrap();
    assert_eq!(br[1] + (br[2] - br[1]) + br[3], out.len() as i64);
    assert_eq!(out[br[1] as usize], b'<');

    let reopened = Document::open(out).unwrap();
    assert_eq!(reopened.page_count(), 1);
}

#[test]
fn visible_signature_builds_appearance_stack() {
    let temp = tempfile::tempdir().unwrap();
    let mut doc =
        Document::open_with_config(minimal_pdf(), test_config(temp.path())).unwrap();

    let image = pdf_sello::AppearanceImage {
        draw_command: "q 150 0 0 50 0 0 cm /Img0 Do Q\n".to_string(),
        resources: Object::Dictionary(pdf_sello::Dict::from_pairs(vec![(
            "XObject",
            Object::Dictionary(pdf_sello::Dict::new()),
        )])),
    };
    doc.sign_document_with(
        Box::new(FakeSigner::new()),
        0,
        [50.0, 50.0, 200.0, 100.0],
        Some(image),
    )
    .unwrap();
    let out = doc.emit(false).unwrap();
    let text = String::from_utf8_lossy(&out);

    assert!(text.contains("% DSBlank"));
    assert!(text.contains("/FRM Do"));
    assert!(text.contains("q 1 0 0 1 0 0 cm /n0 Do Q"));
    assert!(text.contains("/Group << /S /Transparency /CS /DeviceRGB >>"));
    assert!(text.contains("/AP << /N "));
}
