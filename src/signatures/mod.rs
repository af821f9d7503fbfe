//! Digital signature preparation.
//!
//! The coordinator reserves the constant-width placeholders, synthesizes
//! the widget annotation (and its appearance stack), rewires the page,
//! AcroForm, metadata and Info objects, and registers the pending
//! signature that [`crate::Document::emit`] later signs and splices.
//!
//! Preparation is all-or-nothing: if any step fails, the override store
//! is restored to its pre-call snapshot and no signature stays pending.

pub(crate) mod appearance;
pub(crate) mod byterange;
mod types;

pub use appearance::AppearanceImage;
pub use types::{OpensslSigner, Pkcs7Signer, SigningCredentials};

use crate::config::SigningConfig;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::metadata;
use crate::object::{Dict, IndirectObject, Object, ObjectRef};
use rand::distributions::Alphanumeric;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Annotation flag value for the signature widget (Print | Locked).
const WIDGET_FLAGS: i64 = 132;

/// A prepared, not yet emitted signature.
pub(crate) struct PendingSignature {
    /// Object number of the signature dictionary
    pub(crate) sig_id: u32,
    /// Signer invoked during emission
    pub(crate) signer: Box<dyn Pkcs7Signer>,
}

/// Build the signature dictionary object with its fixed keys and the
/// reserved `/ByteRange` and `/Contents` placeholders.
pub(crate) fn signature_object(id: u32, config: &SigningConfig) -> IndirectObject {
    let dict = Dict::from_pairs(vec![
        ("Filter", Object::Name("Adobe.PPKLite".to_string())),
        ("Type", Object::Name("Sig".to_string())),
        ("SubFilter", Object::Name("adbe.pkcs7.detached".to_string())),
        (
            "ByteRange",
            Object::Raw(byterange::byte_range_placeholder(config.byte_range_capacity)),
        ),
        (
            "Contents",
            Object::Raw(byterange::contents_placeholder(config.signature_hex_capacity)),
        ),
        ("M", Object::String(config.pdf_date().into_bytes())),
    ]);
    IndirectObject::new(id, 0, Object::Dictionary(dict))
}

/// `Signature` plus eight random alphanumeric characters.
fn widget_name(config: &SigningConfig) -> String {
    let mut rng: StdRng = match config.widget_rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let suffix: String = (0..8).map(|_| rng.sample(Alphanumeric) as char).collect();
    format!("Signature{}", suffix)
}

/// Run the preparation protocol. See module docs for the rollback rule.
pub(crate) fn prepare(
    doc: &mut Document,
    signer: Box<dyn Pkcs7Signer>,
    page: usize,
    rect: [f64; 4],
    image: Option<AppearanceImage>,
) -> Result<()> {
    if doc.pending_signature.is_some() {
        return Err(Error::AlreadyPrepared);
    }

    // Pin the signing time so /M, /ModDate and the XMP stamps agree
    if doc.config.signing_time.is_none() {
        doc.config.signing_time = Some(chrono::Utc::now());
    }

    let overrides_snapshot = doc.overrides.clone();
    let max_oid_snapshot = doc.max_oid;

    match prepare_inner(doc, page, rect, image) {
        Ok(sig_id) => {
            doc.pending_signature = Some(PendingSignature { sig_id, signer });
            Ok(())
        },
        Err(e) => {
            doc.overrides = overrides_snapshot;
            doc.max_oid = max_oid_snapshot;
            Err(e)
        },
    }
}

fn prepare_inner(
    doc: &mut Document,
    page: usize,
    rect: [f64; 4],
    image: Option<AppearanceImage>,
) -> Result<u32> {
    // Catalog via the trailer
    let root_ref = doc
        .trailer
        .get("Root")
        .and_then(|o| o.as_reference())
        .ok_or(Error::MissingRoot)?;
    let catalog = doc.get_object(root_ref.id).ok_or(Error::MissingRoot)?;
    let mut catalog_dict = catalog.dict().ok_or(Error::MissingRoot)?.clone();

    // Target page and its height for rect flipping
    let record = doc
        .page_index
        .get(page)
        .cloned()
        .ok_or(Error::InvalidPage(page))?;
    let page_obj = doc.get_object(record.id).ok_or(Error::InvalidPage(page))?;
    let page_height = record.media_box[3] - record.media_box[1];

    // Signature dictionary with reserved placeholders
    let sig_id = doc.new_oid();
    let sig_obj = signature_object(sig_id, &doc.config);
    doc.add_object(sig_obj);

    // Widget annotation
    let [x0, y0, x1, y1] = rect;
    let annot_id = doc.new_oid();
    let mut annot_dict = Dict::from_pairs(vec![
        ("Type", Object::Name("Annot".to_string())),
        ("Subtype", Object::Name("Widget".to_string())),
        ("FT", Object::Name("Sig".to_string())),
        ("V", Object::Reference(ObjectRef::new(sig_id, 0))),
        (
            "T",
            Object::String(widget_name(&doc.config).into_bytes()),
        ),
        ("P", Object::Reference(ObjectRef::new(record.id, page_obj.gen))),
        (
            "Rect",
            Object::Array(vec![
                Object::Real(x0),
                Object::Real(page_height - y0),
                Object::Real(x1),
                Object::Real(page_height - y1),
            ]),
        ),
        ("F", Object::Integer(WIDGET_FLAGS)),
    ]);
    doc.add_object(IndirectObject::new(
        annot_id,
        0,
        Object::Dictionary(annot_dict.clone()),
    ));

    // Appearance stack; re-registering the widget keeps its position in
    // the override order
    if let Some(image) = image {
        let width = (x1 - x0).abs();
        let height = (y1 - y0).abs();
        let form_ref = appearance::build_appearance_stack(doc, width, height, &image)?;
        annot_dict.set(
            "AP",
            Object::Dictionary(Dict::from_pairs(vec![("N", Object::Reference(form_ref))])),
        );
        doc.add_object(IndirectObject::new(annot_id, 0, Object::Dictionary(annot_dict)));
    }

    // Page update: /Annots always ends up an indirect reference to a list
    let annot_ref = Object::Reference(ObjectRef::new(annot_id, 0));
    let mut page_dict = page_obj.dict().ok_or(Error::InvalidPage(page))?.clone();
    let annots_ref = match page_dict.get("Annots").cloned() {
        None => {
            let list_id = doc.create_object(Object::Array(vec![annot_ref.clone()]));
            ObjectRef::new(list_id, 0)
        },
        Some(Object::Array(mut items)) => {
            items.push(annot_ref.clone());
            let list_id = doc.create_object(Object::Array(items));
            ObjectRef::new(list_id, 0)
        },
        Some(Object::Reference(r)) => {
            let mut list_obj = doc.get_object(r.id).ok_or(Error::InvalidPage(page))?;
            match &mut list_obj.value {
                Object::Array(items) => items.push(annot_ref.clone()),
                _ => {
                    return Err(Error::InvalidTree(
                        "page /Annots reference does not point at a list".to_string(),
                    ));
                },
            }
            doc.add_object(list_obj);
            r
        },
        Some(other) => {
            return Err(Error::InvalidTree(format!(
                "page /Annots is a {}",
                other.type_name()
            )));
        },
    };
    page_dict.set("Annots", Object::Reference(annots_ref));
    doc.add_object(IndirectObject::new(
        record.id,
        page_obj.gen,
        Object::Dictionary(page_dict),
    ));

    // AcroForm update
    match catalog_dict.get("AcroForm").cloned() {
        None => {
            let acro = Dict::from_pairs(vec![
                ("Fields", Object::Array(vec![annot_ref.clone()])),
                ("SigFlags", Object::Integer(3)),
            ]);
            catalog_dict.set("AcroForm", Object::Dictionary(acro));
            doc.add_object(IndirectObject::new(
                root_ref.id,
                catalog.gen,
                Object::Dictionary(catalog_dict.clone()),
            ));
        },
        Some(Object::Dictionary(mut acro)) => {
            update_acroform(doc, &mut acro, &annot_ref)?;
            catalog_dict.set("AcroForm", Object::Dictionary(acro));
            doc.add_object(IndirectObject::new(
                root_ref.id,
                catalog.gen,
                Object::Dictionary(catalog_dict.clone()),
            ));
        },
        Some(Object::Reference(r)) => {
            let mut acro_obj = doc
                .get_object(r.id)
                .ok_or_else(|| Error::InvalidTree("missing AcroForm object".to_string()))?;
            let mut acro = acro_obj
                .dict()
                .ok_or_else(|| Error::InvalidTree("AcroForm is not a dictionary".to_string()))?
                .clone();
            update_acroform(doc, &mut acro, &annot_ref)?;
            acro_obj.value = Object::Dictionary(acro);
            doc.add_object(acro_obj);
        },
        Some(other) => {
            return Err(Error::InvalidTree(format!(
                "catalog /AcroForm is a {}",
                other.type_name()
            )));
        },
    }

    // Metadata update (optional): refresh XMP dates when present
    if let Some(Object::Reference(meta_ref)) = catalog_dict.get("Metadata") {
        if let Some(meta_obj) = doc.get_object(meta_ref.id) {
            match metadata::refresh_xmp_dates(meta_obj, &doc.config) {
                Ok(Some(updated)) => doc.add_object(updated),
                Ok(None) => {},
                Err(e) => return Err(e),
            }
        }
    }

    // Info update
    let info_ref = doc
        .trailer
        .get("Info")
        .and_then(|o| o.as_reference())
        .ok_or(Error::MissingInfo)?;
    let mut info_obj = doc.get_object(info_ref.id).ok_or(Error::MissingInfo)?;
    let mut info_dict = info_obj.dict().ok_or(Error::MissingInfo)?.clone();
    info_dict.set("ModDate", Object::String(doc.config.pdf_date().into_bytes()));
    info_dict.set(
        "Producer",
        Object::String(doc.config.producer.clone().into_bytes()),
    );
    info_obj.value = Object::Dictionary(info_dict);
    doc.add_object(info_obj);

    Ok(sig_id)
}

/// Mark the form as signed and append the widget to `/Fields`.
fn update_acroform(doc: &mut Document, acro: &mut Dict, annot_ref: &Object) -> Result<()> {
    acro.set("SigFlags", Object::Integer(3));

    match acro.get("Fields").cloned() {
        Some(Object::Array(mut items)) => {
            items.push(annot_ref.clone());
            acro.set("Fields", Object::Array(items));
        },
        Some(Object::Reference(r)) => {
            let mut fields_obj = doc
                .get_object(r.id)
                .ok_or_else(|| Error::InvalidTree("missing /Fields object".to_string()))?;
            match &mut fields_obj.value {
                Object::Array(items) => items.push(annot_ref.clone()),
                _ => {
                    return Err(Error::InvalidTree(
                        "AcroForm /Fields reference does not point at a list".to_string(),
                    ));
                },
            }
            doc.add_object(fields_obj);
        },
        _ => {
            acro.set("Fields", Object::Array(vec![annot_ref.clone()]));
        },
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_signature_object_layout() {
        let config = SigningConfig::new()
            .with_signing_time(chrono::Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap());
        let obj = signature_object(12, &config);
        let dict = obj.dict().unwrap();

        let keys: Vec<&str> = dict.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["Filter", "Type", "SubFilter", "ByteRange", "Contents", "M"]);
        assert_eq!(dict.get("Filter").unwrap().as_name(), Some("Adobe.PPKLite"));
        assert_eq!(dict.get("SubFilter").unwrap().as_name(), Some("adbe.pkcs7.detached"));

        match dict.get("ByteRange").unwrap() {
            Object::Raw(bytes) => assert_eq!(bytes.len(), 68),
            other => panic!("unexpected ByteRange value: {:?}", other),
        }
        match dict.get("Contents").unwrap() {
            Object::Raw(bytes) => assert_eq!(bytes.len(), 11742 + 2),
            other => panic!("unexpected Contents value: {:?}", other),
        }
        assert_eq!(
            dict.get("M").unwrap().as_string(),
            Some(&b"D:20240615120000+00'00'"[..])
        );
    }

    #[test]
    fn test_widget_name_seeded_is_deterministic() {
        let config = SigningConfig::new().with_widget_rng_seed(42);
        let a = widget_name(&config);
        let b = widget_name(&config);
        assert_eq!(a, b);
        assert!(a.starts_with("Signature"));
        assert_eq!(a.len(), "Signature".len() + 8);
        assert!(a["Signature".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_widget_name_differs_across_seeds() {
        let a = widget_name(&SigningConfig::new().with_widget_rng_seed(1));
        let b = widget_name(&SigningConfig::new().with_widget_rng_seed(2));
        assert_ne!(a, b);
    }
}
