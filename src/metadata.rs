//! XMP metadata date refresh.
//!
//! When a signature is prepared, the catalog's `/Metadata` stream (if any)
//! gets its `xmp:ModifyDate` and `xmp:MetadataDate` values replaced with
//! the signing time. Filtered input streams are inflated first; the
//! rewritten stream is always written uncompressed.

use crate::config::SigningConfig;
use crate::error::Result;
use crate::object::IndirectObject;
use crate::parser;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref MODIFY_DATE_RE: Regex =
        Regex::new(r"<xmp:ModifyDate>[^<]*</xmp:ModifyDate>").expect("static regex");
    static ref METADATA_DATE_RE: Regex =
        Regex::new(r"<xmp:MetadataDate>[^<]*</xmp:MetadataDate>").expect("static regex");
}

/// Rewrite the XMP dates of a `/Metadata` stream object.
///
/// Returns the replacement object, or `None` when the object carries no
/// stream or uses a filter this library does not decode.
pub(crate) fn refresh_xmp_dates(
    obj: IndirectObject,
    config: &SigningConfig,
) -> Result<Option<IndirectObject>> {
    let Some(data) = obj.stream.as_ref() else {
        return Ok(None);
    };
    let Some(dict) = obj.dict() else {
        return Ok(None);
    };

    let decoded = match dict.get("Filter") {
        None => data.to_vec(),
        Some(filter) if filter.as_name() == Some("FlateDecode") => parser::inflate(data)?,
        Some(other) => {
            log::warn!(
                "skipping XMP date refresh: /Metadata uses unsupported filter {:?}",
                other
            );
            return Ok(None);
        },
    };

    let text = String::from_utf8_lossy(&decoded).into_owned();
    let stamp = config.xmp_date();
    let text = MODIFY_DATE_RE.replace_all(
        &text,
        format!("<xmp:ModifyDate>{}</xmp:ModifyDate>", stamp).as_str(),
    );
    let text = METADATA_DATE_RE.replace_all(
        &text,
        format!("<xmp:MetadataDate>{}</xmp:MetadataDate>", stamp).as_str(),
    );

    let mut new_dict = dict.clone();
    new_dict.remove("Filter");
    new_dict.remove("DecodeParms");
    new_dict.remove("Length");

    Ok(Some(IndirectObject::with_stream(
        obj.id,
        obj.gen,
        new_dict,
        text.into_owned().into_bytes(),
    )))
}
