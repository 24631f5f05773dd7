use std::io::Cursor;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use tryon_contracts::image::EncodedImage;

use super::{ContentPart, GenerationRequest, GenerationResponse, GenerationTransport};

/// Offline transport: answers every request with a flat PNG whose color is
/// derived from the prompt and the number of input images.
pub struct DryrunTransport {
    width: u32,
    height: u32,
}

impl DryrunTransport {
    pub fn new() -> Self {
        Self {
            width: 512,
            height: 768,
        }
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}

impl Default for DryrunTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl GenerationTransport for DryrunTransport {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn generate_content(&self, request: &GenerationRequest) -> Result<GenerationResponse> {
        let (r, g, b) = color_from_prompt(&request.prompt_text(), request.image_count() as u64);
        let image = RgbImage::from_pixel(self.width, self.height, Rgb([r, g, b]));
        let mut png = Cursor::new(Vec::new());
        image
            .write_to(&mut png, ImageFormat::Png)
            .context("dryrun image encode failed")?;
        let encoded = EncodedImage::from_base64_parts("image/png", &BASE64.encode(png.into_inner()))?;
        Ok(GenerationResponse {
            parts: vec![
                ContentPart::Text(format!("dryrun render for model {}", request.model)),
                ContentPart::InlineImage(encoded),
            ],
        })
    }
}

fn color_from_prompt(prompt: &str, seed: u64) -> (u8, u8, u8) {
    let mut hasher = Sha256::new();
    hasher.update(prompt.as_bytes());
    hasher.update(seed.to_be_bytes());
    let digest = hasher.finalize();
    (digest[0], digest[1], digest[2])
}

#[cfg(test)]
mod tests {
    use tryon_contracts::image::EncodedImage;
    use tryon_contracts::models::AvatarStyle;

    use super::{color_from_prompt, DryrunTransport};
    use crate::generation::GenerationClient;

    #[test]
    fn dryrun_avatar_is_a_decodable_png() -> anyhow::Result<()> {
        let client = GenerationClient::new(Box::new(DryrunTransport::with_size(8, 12)), "dry");
        let photo = EncodedImage::from_base64_parts("image/jpeg", "AAEC")?;
        let avatar = client.generate_avatar(&photo, AvatarStyle::Anime)?;
        assert_eq!(avatar.media_type(), "image/png");

        let decoded = image::load_from_memory(&avatar.decode_bytes()?)?;
        assert_eq!((decoded.width(), decoded.height()), (8, 12));
        Ok(())
    }

    #[test]
    fn color_depends_on_prompt_and_seed() {
        assert_eq!(color_from_prompt("a", 1), color_from_prompt("a", 1));
        assert_ne!(color_from_prompt("a", 1), color_from_prompt("a", 2));
    }
}
