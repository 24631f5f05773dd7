use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use anyhow::Context;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{StudioError, StudioResult};

const DATA_PREFIX: &str = "data:";
const BASE64_MARKER: &str = ";base64,";

/// A self-describing `data:<media type>;base64,<payload>` image string.
///
/// Construction always validates the media type, so holders never need to
/// re-check it before sending the image to a provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncodedImage {
    uri: String,
    media_type_end: usize,
}

impl EncodedImage {
    pub fn parse(raw: &str) -> StudioResult<Self> {
        let trimmed = raw.trim();
        let Some(rest) = trimmed.strip_prefix(DATA_PREFIX) else {
            return Err(StudioError::MalformedEncoding(
                "missing data: prefix".to_string(),
            ));
        };
        let Some((media_type, payload)) = rest.split_once(BASE64_MARKER) else {
            return Err(StudioError::MalformedEncoding(
                "missing ;base64, marker".to_string(),
            ));
        };
        if !is_image_media_type(media_type) {
            return Err(StudioError::MalformedEncoding(format!(
                "unsupported media type '{media_type}'"
            )));
        }
        if payload.is_empty() {
            return Err(StudioError::MalformedEncoding("empty payload".to_string()));
        }
        Ok(Self {
            uri: trimmed.to_string(),
            media_type_end: DATA_PREFIX.len() + media_type.len(),
        })
    }

    /// Builds an image from a provider's `(mimeType, data)` pair.
    pub fn from_base64_parts(media_type: &str, payload_base64: &str) -> StudioResult<Self> {
        Self::parse(&format!(
            "{DATA_PREFIX}{}{BASE64_MARKER}{}",
            media_type.trim(),
            payload_base64.trim()
        ))
    }

    pub fn media_type(&self) -> &str {
        &self.uri[DATA_PREFIX.len()..self.media_type_end]
    }

    pub fn payload_base64(&self) -> &str {
        &self.uri[self.media_type_end + BASE64_MARKER.len()..]
    }

    pub fn as_str(&self) -> &str {
        &self.uri
    }

    pub fn decode_bytes(&self) -> StudioResult<Vec<u8>> {
        BASE64
            .decode(self.payload_base64().as_bytes())
            .map_err(|err| StudioError::MalformedEncoding(err.to_string()))
    }

    pub fn file_extension(&self) -> &'static str {
        extension_for_media_type(self.media_type())
    }
}

impl fmt::Display for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

impl FromStr for EncodedImage {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::parse(raw)
    }
}

impl TryFrom<String> for EncodedImage {
    type Error = StudioError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<EncodedImage> for String {
    fn from(image: EncodedImage) -> Self {
        image.uri
    }
}

/// Encodes raw file bytes into a data URI.
pub fn encode(bytes: &[u8], media_type: &str) -> StudioResult<EncodedImage> {
    if bytes.is_empty() {
        return Err(StudioError::invalid_input("Image file is empty."));
    }
    let media_type = media_type.trim();
    if !is_image_media_type(media_type) {
        return Err(StudioError::invalid_input(format!(
            "Unsupported file type '{media_type}'; please upload an image."
        )));
    }
    EncodedImage::from_base64_parts(media_type, &BASE64.encode(bytes))
}

/// Splits a data URI back into `(media_type, payload_bytes)` for transport.
pub fn decode(encoded: &str) -> StudioResult<(String, Vec<u8>)> {
    let image = EncodedImage::parse(encoded)?;
    let bytes = image.decode_bytes()?;
    Ok((image.media_type().to_string(), bytes))
}

pub fn is_image_media_type(media_type: &str) -> bool {
    media_type
        .strip_prefix("image/")
        .map(|subtype| !subtype.is_empty() && subtype.chars().all(|ch| ch.is_ascii_alphabetic()))
        .unwrap_or(false)
}

/// Detects the media type from magic bytes, then from the file extension.
pub fn sniff_media_type(bytes: &[u8], path: Option<&Path>) -> Option<&'static str> {
    if let Ok(format) = image::guess_format(bytes) {
        let mime = format.to_mime_type();
        if is_image_media_type(mime) {
            return Some(mime);
        }
    }
    path.and_then(mime_for_path)
}

pub fn read_image_file(path: &Path) -> anyhow::Result<EncodedImage> {
    let bytes = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let media_type = sniff_media_type(&bytes, Some(path))
        .with_context(|| format!("{} is not a recognized image", path.display()))?;
    encode(&bytes, media_type).with_context(|| format!("failed encoding {}", path.display()))
}

pub fn extension_for_media_type(media_type: &str) -> &'static str {
    let lowered = media_type.trim().to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    "png"
}

fn mime_for_path(path: &Path) -> Option<&'static str> {
    let ext = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}
