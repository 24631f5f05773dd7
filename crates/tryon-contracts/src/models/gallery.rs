use chrono::{DateTime, Local, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::wardrobe::{ClothingDetails, Measurements};
use crate::image::EncodedImage;

/// Saved results, newest first.
pub type Gallery = Vec<TryOnResult>;

/// One saved try-on. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TryOnResult {
    pub id: String,
    pub final_image: EncodedImage,
    pub avatar_image: EncodedImage,
    pub clothing_images: Vec<EncodedImage>,
    pub clothing_details: ClothingDetails,
    pub measurements: Measurements,
    pub timestamp: String,
}

impl TryOnResult {
    pub fn new(
        final_image: EncodedImage,
        avatar_image: EncodedImage,
        clothing_images: Vec<EncodedImage>,
        clothing_details: ClothingDetails,
        measurements: Measurements,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: created_at.to_rfc3339_opts(SecondsFormat::Millis, true),
            final_image,
            avatar_image,
            clothing_images,
            clothing_details,
            measurements,
            timestamp: created_at
                .with_timezone(&Local)
                .format("%-m/%-d/%Y, %-I:%M:%S %p")
                .to_string(),
        }
    }

    pub fn headline(&self) -> String {
        format!(
            "{} Fit · {}",
            self.clothing_details.fit, self.clothing_details.material
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::TryOnResult;
    use crate::image::EncodedImage;
    use crate::models::{ClothingDetails, Measurements};

    #[test]
    fn identity_is_creation_instant_and_json_is_camel_case() -> anyhow::Result<()> {
        let image = EncodedImage::from_base64_parts("image/png", "AAAA")?;
        let created_at = Utc
            .with_ymd_and_hms(2025, 3, 4, 5, 6, 7)
            .single()
            .ok_or_else(|| anyhow::anyhow!("bad date"))?;
        let details = ClothingDetails {
            item_type: "Shirt".to_string(),
            material: "Linen".to_string(),
            fit: "Loose".to_string(),
            description: String::new(),
        };
        let result = TryOnResult::new(
            image.clone(),
            image.clone(),
            vec![image],
            details,
            Measurements::default(),
            created_at,
        );
        assert_eq!(result.id, "2025-03-04T05:06:07.000Z");
        assert_eq!(result.headline(), "Loose Fit · Linen");

        let json = serde_json::to_value(&result)?;
        assert!(json.get("finalImage").is_some());
        assert!(json.get("clothingImages").is_some());
        assert_eq!(json["clothingDetails"]["itemType"], "Shirt");
        Ok(())
    }
}
