use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Rendering style requested for a generated avatar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AvatarStyle {
    #[default]
    Hyperrealistic,
    Anime,
    Cartoon,
    #[serde(rename = "Pixel Art")]
    PixelArt,
    #[serde(rename = "Sci-Fi")]
    SciFi,
}

impl AvatarStyle {
    pub const ALL: [AvatarStyle; 5] = [
        AvatarStyle::Hyperrealistic,
        AvatarStyle::Anime,
        AvatarStyle::Cartoon,
        AvatarStyle::PixelArt,
        AvatarStyle::SciFi,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Hyperrealistic => "Hyperrealistic",
            Self::Anime => "Anime",
            Self::Cartoon => "Cartoon",
            Self::PixelArt => "Pixel Art",
            Self::SciFi => "Sci-Fi",
        }
    }

    pub fn is_photorealistic(self) -> bool {
        self == Self::Hyperrealistic
    }
}

impl fmt::Display for AvatarStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AvatarStyle {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "hyperrealistic" | "realistic" | "photo" => Ok(Self::Hyperrealistic),
            "anime" => Ok(Self::Anime),
            "cartoon" => Ok(Self::Cartoon),
            "pixelart" | "pixel" => Ok(Self::PixelArt),
            "scifi" => Ok(Self::SciFi),
            _ => Err(StudioError::invalid_input(format!(
                "Unknown avatar style '{}'. Choose one of: {}.",
                raw.trim(),
                Self::ALL
                    .iter()
                    .map(|style| style.label())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::AvatarStyle;

    #[test]
    fn parses_labels_loosely() {
        assert_eq!("Pixel Art".parse::<AvatarStyle>().ok(), Some(AvatarStyle::PixelArt));
        assert_eq!("pixel_art".parse::<AvatarStyle>().ok(), Some(AvatarStyle::PixelArt));
        assert_eq!("SCI-FI".parse::<AvatarStyle>().ok(), Some(AvatarStyle::SciFi));
        assert_eq!("anime".parse::<AvatarStyle>().ok(), Some(AvatarStyle::Anime));
        assert!("watercolor".parse::<AvatarStyle>().is_err());
    }

    #[test]
    fn serializes_with_display_labels() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&AvatarStyle::SciFi)?, "\"Sci-Fi\"");
        let parsed: AvatarStyle = serde_json::from_str("\"Pixel Art\"")?;
        assert_eq!(parsed, AvatarStyle::PixelArt);
        Ok(())
    }
}
