use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

pub const CLOTHING_TYPES: &[&str] = &[
    "T-Shirt", "Shirt", "Jeans", "Trousers", "Dress", "Skirt", "Jacket", "Sweater", "Hoodie",
];

pub const CLOTHING_FITS: &[&str] = &["Slim", "Regular", "Loose", "Oversized", "Skinny"];

/// Body measurements as entered by the user. Empty means "not provided".
///
/// `height` carries no serde default: a stored object without it is an
/// older shape and gets discarded by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurements {
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub chest: String,
    #[serde(default)]
    pub waist: String,
    #[serde(default)]
    pub hips: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasurementField {
    Height,
    Weight,
    Chest,
    Waist,
    Hips,
}

impl MeasurementField {
    pub const ALL: [MeasurementField; 5] = [
        MeasurementField::Height,
        MeasurementField::Weight,
        MeasurementField::Chest,
        MeasurementField::Waist,
        MeasurementField::Hips,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Height => "Height",
            Self::Weight => "Weight",
            Self::Chest => "Chest",
            Self::Waist => "Waist",
            Self::Hips => "Hips",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Weight => "kg",
            _ => "cm",
        }
    }

    pub fn is_required_for_try_on(self) -> bool {
        matches!(self, Self::Height | Self::Weight)
    }
}

impl fmt::Display for MeasurementField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MeasurementField {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "height" => Ok(Self::Height),
            "weight" => Ok(Self::Weight),
            "chest" => Ok(Self::Chest),
            "waist" => Ok(Self::Waist),
            "hips" | "hip" => Ok(Self::Hips),
            other => Err(StudioError::invalid_input(format!(
                "Unknown measurement '{other}'. Use height, weight, chest, waist or hips."
            ))),
        }
    }
}

impl Measurements {
    pub fn get(&self, field: MeasurementField) -> &str {
        match field {
            MeasurementField::Height => &self.height,
            MeasurementField::Weight => &self.weight,
            MeasurementField::Chest => &self.chest,
            MeasurementField::Waist => &self.waist,
            MeasurementField::Hips => &self.hips,
        }
    }

    pub fn set(&mut self, field: MeasurementField, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        match field {
            MeasurementField::Height => self.height = value,
            MeasurementField::Weight => self.weight = value,
            MeasurementField::Chest => self.chest = value,
            MeasurementField::Waist => self.waist = value,
            MeasurementField::Hips => self.hips = value,
        }
    }

    pub fn provided(&self, field: MeasurementField) -> Option<&str> {
        let value = self.get(field).trim();
        (!value.is_empty()).then_some(value)
    }

    /// `"Height: 175 cm"` style lines, with `fallback` for empty fields.
    pub fn lines(&self, fallback: &str) -> Vec<String> {
        MeasurementField::ALL
            .iter()
            .map(|field| {
                format!(
                    "{}: {} {}",
                    field.label(),
                    self.provided(*field).unwrap_or(fallback),
                    field.unit()
                )
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClothingDetails {
    #[serde(default)]
    pub item_type: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub fit: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClothingField {
    ItemType,
    Material,
    Fit,
    Description,
}

impl ClothingField {
    pub const REQUIRED: [ClothingField; 3] = [
        ClothingField::ItemType,
        ClothingField::Material,
        ClothingField::Fit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::ItemType => "Item Type",
            Self::Material => "Material",
            Self::Fit => "Fit",
            Self::Description => "Description",
        }
    }
}

impl FromStr for ClothingField {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .map(|ch| ch.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "itemtype" | "type" | "item" => Ok(Self::ItemType),
            "material" | "fabric" => Ok(Self::Material),
            "fit" => Ok(Self::Fit),
            "description" | "desc" | "notes" => Ok(Self::Description),
            _ => Err(StudioError::invalid_input(format!(
                "Unknown clothing field '{}'. Use type, material, fit or description.",
                raw.trim()
            ))),
        }
    }
}

impl ClothingDetails {
    pub fn get(&self, field: ClothingField) -> &str {
        match field {
            ClothingField::ItemType => &self.item_type,
            ClothingField::Material => &self.material,
            ClothingField::Fit => &self.fit,
            ClothingField::Description => &self.description,
        }
    }

    pub fn set(&mut self, field: ClothingField, value: impl Into<String>) {
        let value = value.into().trim().to_string();
        match field {
            ClothingField::ItemType => self.item_type = value,
            ClothingField::Material => self.material = value,
            ClothingField::Fit => self.fit = value,
            ClothingField::Description => self.description = value,
        }
    }

    pub fn missing_required(&self) -> Vec<ClothingField> {
        ClothingField::REQUIRED
            .into_iter()
            .filter(|field| self.get(*field).trim().is_empty())
            .collect()
    }
}
