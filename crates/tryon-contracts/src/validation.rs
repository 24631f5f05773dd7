use crate::error::{StudioError, StudioResult};
use crate::models::{ClothingDetails, MeasurementField, Measurements};

pub const MAX_CLOTHING_IMAGES: usize = 4;

pub const MISSING_PHOTO: &str = "Please upload an image first.";
pub const TRY_ON_INCOMPLETE: &str =
    "Please upload clothing images and fill in all required clothing and measurement fields.";
pub const CLOTHING_LIMIT_REACHED: &str = "You have already uploaded the maximum of 4 images.";
pub const REQUEST_IN_FLIGHT: &str = "A request is already in progress.";
pub const UPLOAD_READ_FAILED: &str = "Could not read image files. Please try again.";
pub const NO_IMAGE_RETURNED: &str = "AI did not return an image. Please try again.";

/// How many of an incoming batch fit in the remaining clothing slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAllocation {
    pub accepted: usize,
    pub message: Option<String>,
}

pub fn allocate_clothing_slots(existing: usize, incoming: usize) -> SlotAllocation {
    let available = MAX_CLOTHING_IMAGES.saturating_sub(existing);
    if available == 0 {
        return SlotAllocation {
            accepted: 0,
            message: Some(CLOTHING_LIMIT_REACHED.to_string()),
        };
    }
    let accepted = incoming.min(available);
    let message = (incoming > accepted).then(|| {
        format!("You can only add {available} more image(s). {accepted} were added.")
    });
    SlotAllocation { accepted, message }
}

/// A provided measurement must be a positive number.
pub fn validate_measurement(field: MeasurementField, raw: &str) -> StudioResult<()> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(());
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(()),
        _ => Err(StudioError::invalid_input(format!(
            "{} must be a positive number in {}.",
            field.label(),
            field.unit()
        ))),
    }
}

/// Checks the try-on form before anything is sent to the model.
pub fn validate_try_on_form(
    clothing_images: usize,
    details: &ClothingDetails,
    measurements: &Measurements,
) -> StudioResult<()> {
    let measurements_missing = MeasurementField::ALL
        .iter()
        .any(|field| field.is_required_for_try_on() && measurements.provided(*field).is_none());
    if clothing_images == 0 || measurements_missing || !details.missing_required().is_empty() {
        return Err(StudioError::invalid_input(TRY_ON_INCOMPLETE));
    }
    if clothing_images > MAX_CLOTHING_IMAGES {
        return Err(StudioError::invalid_input(CLOTHING_LIMIT_REACHED));
    }
    for field in MeasurementField::ALL {
        validate_measurement(field, measurements.get(field))?;
    }
    Ok(())
}
