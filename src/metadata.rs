// SPDX-License-Identifier: GPL-3.0-or-later
use exif::{Exif, Field, In, Reader, Value};
use image::ImageFormat;
use serde::Serialize;
use tracing::{debug, warn};

use std::collections::BTreeMap;
use std::io::Cursor;

const MISSING_MESSAGE: &str = "No EXIF found (Common in AI/Edited images).";
const ERROR_MESSAGE: &str = "Failed to parse metadata.";

/// The metadata embedded in an image.
///
/// Failing to read metadata isn't an error for the request as a whole; it's just reported.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(into = "SerializedMetadata")]
pub(crate) enum MetadataReport {
    /// Tag names mapped to their values.
    Found(BTreeMap<String, String>),

    /// There was no metadata in the image.
    Missing,

    /// There was metadata, but it couldn't be parsed. The reason is only used for logging.
    Error(String),
}

#[derive(Serialize)]
#[serde(untagged)]
enum SerializedData {
    Fields(BTreeMap<String, String>),
    Message(&'static str),
}

#[derive(Serialize)]
struct SerializedMetadata {
    status: &'static str,
    data: SerializedData,
}

impl From<MetadataReport> for SerializedMetadata {
    fn from(report: MetadataReport) -> Self {
        match report {
            MetadataReport::Found(fields) => Self {
                status: "Found",
                data: SerializedData::Fields(fields),
            },
            MetadataReport::Missing => Self {
                status: "Missing",
                data: SerializedData::Message(MISSING_MESSAGE),
            },
            MetadataReport::Error(_) => Self {
                status: "Error",
                data: SerializedData::Message(ERROR_MESSAGE),
            },
        }
    }
}

/// Render a field's value as text. Strings are left unquoted.
fn field_value(field: &Field, exif: &Exif) -> String {
    match &field.value {
        Value::Ascii(strings) => strings
            .iter()
            .map(|s| String::from_utf8_lossy(s))
            .collect::<Vec<_>>()
            .join(", "),
        _ => field.display_value().with_unit(exif).to_string(),
    }
}

/// Extract the EXIF metadata from an encoded image.
pub(crate) fn extract(image_bytes: &[u8]) -> MetadataReport {
    // Only some containers can carry EXIF data.
    match image::guess_format(image_bytes) {
        Ok(ImageFormat::Jpeg) | Ok(ImageFormat::Tiff) | Ok(ImageFormat::Png)
        | Ok(ImageFormat::WebP) => (),
        format => {
            debug!(?format, "image format cannot contain EXIF metadata");
            return MetadataReport::Missing;
        }
    }
    let exif = match Reader::new().read_from_container(&mut Cursor::new(image_bytes)) {
        Ok(exif) => exif,
        Err(exif::Error::NotFound(_)) => return MetadataReport::Missing,
        Err(err) => {
            warn!(error = %err, "unable to parse image metadata");
            return MetadataReport::Error(err.to_string());
        }
    };
    let fields: BTreeMap<String, String> = exif
        .fields()
        .filter(|field| field.ifd_num == In::PRIMARY)
        .filter(|field| field.tag.description().is_some())
        .map(|field| (field.tag.to_string(), field_value(field, &exif)))
        .collect();
    debug!(field_count = fields.len(), "extracted metadata");
    if fields.is_empty() {
        MetadataReport::Missing
    } else {
        MetadataReport::Found(fields)
    }
}
