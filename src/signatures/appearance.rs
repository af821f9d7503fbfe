//! Signature appearance stack.
//!
//! Builds the Adobe four-object appearance idiom for visible signatures:
//! an outer form that draws `/FRM`, a container form layering `/n0` and
//! `/n2`, a blank background layer and the image layer supplied by the
//! caller.

use crate::document::Document;
use crate::error::{Error, Result};
use crate::object::{Dict, IndirectObject, Object, ObjectRef};

/// Pre-rendered image content for the signature's `/n2` layer.
///
/// Produced by an external raster helper: `draw_command` is the content
/// stream that paints the image, `resources` the matching `/Resources`
/// dictionary.
#[derive(Debug, Clone)]
pub struct AppearanceImage {
    /// Content stream painting the image (e.g. `q ... /Img Do Q`)
    pub draw_command: String,
    /// Resources dictionary referenced by the command
    pub resources: Object,
}

fn form_dict(width: f64, height: f64) -> Dict {
    Dict::from_pairs(vec![
        ("Type", Object::Name("XObject".to_string())),
        ("Subtype", Object::Name("Form".to_string())),
        (
            "BBox",
            Object::Array(vec![
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(width),
                Object::Real(height),
            ]),
        ),
    ])
}

/// Build the four-object stack and return a reference to the outer form.
///
/// Object layout: `form -> /FRM container -> /n0 (blank), /n2 (image)`.
pub(crate) fn build_appearance_stack(
    doc: &mut Document,
    width: f64,
    height: f64,
    image: &AppearanceImage,
) -> Result<ObjectRef> {
    if image.resources.as_dict().is_none() {
        return Err(Error::Image("image resources must be a dictionary".to_string()));
    }

    // Blank background layer
    let n0_id = doc.new_oid();
    doc.add_object(IndirectObject::with_stream(
        n0_id,
        0,
        form_dict(100.0, 100.0),
        &b"% DSBlank\n"[..],
    ));

    // Image layer
    let n2_id = doc.new_oid();
    let mut n2_dict = form_dict(width, height);
    n2_dict.set("Resources", image.resources.clone());
    doc.add_object(IndirectObject::with_stream(
        n2_id,
        0,
        n2_dict,
        image.draw_command.clone().into_bytes(),
    ));

    // Container layering both
    let container_id = doc.new_oid();
    let mut container_dict = form_dict(width, height);
    container_dict.set(
        "Resources",
        Object::Dictionary(Dict::from_pairs(vec![(
            "XObject",
            Object::Dictionary(Dict::from_pairs(vec![
                ("n0", Object::Reference(ObjectRef::new(n0_id, 0))),
                ("n2", Object::Reference(ObjectRef::new(n2_id, 0))),
            ])),
        )])),
    );
    doc.add_object(IndirectObject::with_stream(
        container_id,
        0,
        container_dict,
        &b"q 1 0 0 1 0 0 cm /n0 Do Q\nq 1 0 0 1 0 0 cm /n2 Do Q\n"[..],
    ));

    // Outer form with a transparency group
    let form_id = doc.new_oid();
    let mut outer_dict = form_dict(width, height);
    outer_dict.set(
        "Group",
        Object::Dictionary(Dict::from_pairs(vec![
            ("S", Object::Name("Transparency".to_string())),
            ("CS", Object::Name("DeviceRGB".to_string())),
        ])),
    );
    outer_dict.set(
        "Resources",
        Object::Dictionary(Dict::from_pairs(vec![(
            "XObject",
            Object::Dictionary(Dict::from_pairs(vec![(
                "FRM",
                Object::Reference(ObjectRef::new(container_id, 0)),
            )])),
        )])),
    );
    doc.add_object(IndirectObject::with_stream(
        form_id,
        0,
        outer_dict,
        &b"/FRM Do"[..],
    ));

    Ok(ObjectRef::new(form_id, 0))
}
