mod dryrun;
mod gemini;

use serde_json::json;
use tracing::{info, warn};
use tryon_contracts::events::{EventPayload, EventWriter};
use tryon_contracts::image::EncodedImage;
use tryon_contracts::models::{AvatarStyle, ClothingDetails, Measurements};
use tryon_contracts::validation::{validate_try_on_form, MAX_CLOTHING_IMAGES, NO_IMAGE_RETURNED};
use tryon_contracts::{StudioError, StudioResult};

use crate::prompts::{avatar_prompt, try_on_prompt};

pub use dryrun::DryrunTransport;
pub use gemini::{GeminiTransport, DEFAULT_GEMINI_API_BASE};

pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image-preview";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    InlineImage(EncodedImage),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseModality {
    Image,
    Text,
}

impl ResponseModality {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Image => "IMAGE",
            Self::Text => "TEXT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub model: String,
    pub parts: Vec<ContentPart>,
    pub response_modalities: Vec<ResponseModality>,
}

impl GenerationRequest {
    pub fn image_count(&self) -> usize {
        self.parts
            .iter()
            .filter(|part| matches!(part, ContentPart::InlineImage(_)))
            .count()
    }

    pub fn prompt_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(text.as_str()),
                ContentPart::InlineImage(_) => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationResponse {
    pub parts: Vec<ContentPart>,
}

/// Wire-level access to a hosted multimodal model.
pub trait GenerationTransport: Send + Sync {
    fn name(&self) -> &str;
    fn generate_content(&self, request: &GenerationRequest) -> anyhow::Result<GenerationResponse>;
}

/// First inline image wins; anything after it is ignored.
pub fn first_inline_image<I>(parts: I) -> Option<EncodedImage>
where
    I: IntoIterator<Item = ContentPart>,
{
    parts.into_iter().find_map(|part| match part {
        ContentPart::InlineImage(image) => Some(image),
        ContentPart::Text(_) => None,
    })
}

/// Avatar and try-on generation on top of a [`GenerationTransport`].
///
/// One request per call: no retry, no timeout override, and transport
/// errors come back as [`StudioError::Transport`] with the original text.
pub struct GenerationClient {
    transport: Box<dyn GenerationTransport>,
    model: String,
    events: Option<EventWriter>,
}

impl GenerationClient {
    pub fn new(transport: Box<dyn GenerationTransport>, model: impl Into<String>) -> Self {
        Self {
            transport,
            model: model.into(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn transport_name(&self) -> &str {
        self.transport.name()
    }

    pub fn generate_avatar(
        &self,
        photo: &EncodedImage,
        style: AvatarStyle,
    ) -> StudioResult<EncodedImage> {
        let request = GenerationRequest {
            model: self.model.clone(),
            parts: vec![
                ContentPart::InlineImage(photo.clone()),
                ContentPart::Text(avatar_prompt(style)),
            ],
            response_modalities: vec![ResponseModality::Image, ResponseModality::Text],
        };
        self.execute("avatar", request)
    }

    pub fn perform_try_on(
        &self,
        avatar: &EncodedImage,
        clothing_images: &[EncodedImage],
        details: &ClothingDetails,
        measurements: &Measurements,
    ) -> StudioResult<EncodedImage> {
        if clothing_images.is_empty() || clothing_images.len() > MAX_CLOTHING_IMAGES {
            return Err(StudioError::invalid_input(format!(
                "Between 1 and {MAX_CLOTHING_IMAGES} clothing images are required, got {}.",
                clothing_images.len()
            )));
        }
        if !details.missing_required().is_empty() {
            return Err(StudioError::invalid_input(
                "Item type, material and fit are required for a try-on.",
            ));
        }

        let mut parts = Vec::with_capacity(clothing_images.len() + 2);
        parts.push(ContentPart::InlineImage(avatar.clone()));
        parts.extend(clothing_images.iter().cloned().map(ContentPart::InlineImage));
        parts.push(ContentPart::Text(try_on_prompt(details, measurements)));

        let request = GenerationRequest {
            model: self.model.clone(),
            parts,
            response_modalities: vec![ResponseModality::Image, ResponseModality::Text],
        };
        self.execute("try_on", request)
    }

    fn execute(&self, operation: &str, request: GenerationRequest) -> StudioResult<EncodedImage> {
        self.emit(
            "generation_requested",
            json!({
                "operation": operation,
                "transport": self.transport.name(),
                "model": &request.model,
                "images": request.image_count(),
            }),
        );
        info!(operation, transport = self.transport.name(), model = %request.model, "sending generation request");

        let response = match self.transport.generate_content(&request) {
            Ok(response) => response,
            Err(err) => {
                let message = format!("{err:#}");
                warn!(operation, error = %message, "generation transport failed");
                self.emit(
                    "generation_failed",
                    json!({"operation": operation, "kind": "transport", "error": message}),
                );
                return Err(StudioError::Transport(message));
            }
        };

        let part_count = response.parts.len();
        match first_inline_image(response.parts) {
            Some(image) => {
                self.emit(
                    "generation_completed",
                    json!({
                        "operation": operation,
                        "media_type": image.media_type(),
                        "parts": part_count,
                    }),
                );
                Ok(image)
            }
            None => {
                warn!(operation, parts = part_count, "response carried no inline image");
                self.emit(
                    "generation_failed",
                    json!({"operation": operation, "kind": "no_image", "parts": part_count}),
                );
                Err(StudioError::GenerationFailed(NO_IMAGE_RETURNED.to_string()))
            }
        }
    }

    fn emit(&self, event_type: &str, payload: serde_json::Value) {
        if let Some(events) = self.events.as_ref() {
            let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
            events.emit_quiet(event_type, payload);
        }
    }
}

/// Full try-on check used by one-shot callers that skip the controller.
pub fn check_try_on_inputs(
    clothing_images: &[EncodedImage],
    details: &ClothingDetails,
    measurements: &Measurements,
) -> StudioResult<()> {
    validate_try_on_form(clothing_images.len(), details, measurements)
}
