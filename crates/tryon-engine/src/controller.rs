use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use tryon_contracts::events::{EventPayload, EventWriter};
use tryon_contracts::image::EncodedImage;
use tryon_contracts::models::{
    AvatarStyle, ClothingDetails, ClothingField, Gallery, MeasurementField, Measurements,
    TryOnResult,
};
use tryon_contracts::store::PersistedStore;
use tryon_contracts::validation::{
    allocate_clothing_slots, validate_measurement, validate_try_on_form, SlotAllocation,
    MAX_CLOTHING_IMAGES, MISSING_PHOTO, REQUEST_IN_FLIGHT,
};
use tryon_contracts::{StudioError, StudioResult};

use crate::dispatcher::{GenerationJob, JobCompletion, JobId};

pub const SAVED_TO_GALLERY: &str = "Saved to gallery!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StudioTab {
    #[default]
    TryOn,
    Gallery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Step {
    #[default]
    Landing,
    AvatarGenerator,
    Studio(StudioTab),
}

impl Step {
    pub fn label(self) -> &'static str {
        match self {
            Self::Landing => "landing",
            Self::AvatarGenerator => "avatar-generator",
            Self::Studio(StudioTab::TryOn) => "studio:try-on",
            Self::Studio(StudioTab::Gallery) => "studio:gallery",
        }
    }

    pub fn is_studio(self) -> bool {
        matches!(self, Self::Studio(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormStatus {
    #[default]
    Idle,
    InFlight(JobId),
    Failed,
}

impl FormStatus {
    pub fn is_in_flight(self) -> bool {
        matches!(self, Self::InFlight(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvatarForm {
    pub photo: Option<EncodedImage>,
    pub style: AvatarStyle,
    pub status: FormStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TryOnForm {
    pub clothing_images: Vec<EncodedImage>,
    pub details: ClothingDetails,
    pub final_image: Option<EncodedImage>,
    pub status: FormStatus,
    pub error: Option<String>,
}

/// What applying a finished job did to the workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    AvatarReady,
    TryOnReady,
    Failed(StudioError),
    Discarded,
}

/// Owns the session: current step, both forms, the avatar pair, and the
/// persisted measurements and gallery.
pub struct WorkflowController {
    step: Step,
    avatar_image: Option<EncodedImage>,
    original_image: Option<EncodedImage>,
    avatar_form: AvatarForm,
    try_on_form: TryOnForm,
    measurements: Measurements,
    gallery: Gallery,
    store: PersistedStore,
    events: Option<EventWriter>,
    next_job_id: JobId,
}

impl WorkflowController {
    pub fn new(store: PersistedStore) -> Self {
        let measurements = store.load_measurements();
        let gallery = store.load_gallery();
        debug!(
            store = %store.path().display(),
            saved = gallery.len(),
            "workflow state loaded"
        );
        Self {
            step: Step::Landing,
            avatar_image: None,
            original_image: None,
            avatar_form: AvatarForm::default(),
            try_on_form: TryOnForm::default(),
            measurements,
            gallery,
            store,
            events: None,
            next_job_id: 1,
        }
    }

    pub fn with_events(mut self, events: EventWriter) -> Self {
        self.events = Some(events);
        self
    }

    pub fn step(&self) -> Step {
        self.step
    }

    /// The step to render. A studio step without both images is not
    /// renderable, so it falls back to a full start over.
    pub fn current_view(&mut self) -> Step {
        if self.step.is_studio() && (self.avatar_image.is_none() || self.original_image.is_none()) {
            warn!(step = self.step.label(), "studio entered without an avatar; starting over");
            self.start_over();
        }
        self.step
    }

    pub fn avatar_image(&self) -> Option<&EncodedImage> {
        self.avatar_image.as_ref()
    }

    pub fn original_image(&self) -> Option<&EncodedImage> {
        self.original_image.as_ref()
    }

    pub fn avatar_form(&self) -> &AvatarForm {
        &self.avatar_form
    }

    pub fn try_on_form(&self) -> &TryOnForm {
        &self.try_on_form
    }

    pub fn measurements(&self) -> &Measurements {
        &self.measurements
    }

    pub fn gallery(&self) -> &[TryOnResult] {
        &self.gallery
    }

    pub fn store(&self) -> &PersistedStore {
        &self.store
    }

    pub fn start(&mut self) -> StudioResult<()> {
        if self.step != Step::Landing {
            return Err(self.invalid_transition("start"));
        }
        self.avatar_form = AvatarForm::default();
        self.set_step(Step::AvatarGenerator);
        Ok(())
    }

    pub fn avatar_generated(
        &mut self,
        avatar: EncodedImage,
        original: EncodedImage,
    ) -> StudioResult<()> {
        if self.step != Step::AvatarGenerator {
            return Err(self.invalid_transition("avatar_generated"));
        }
        self.avatar_image = Some(avatar);
        self.original_image = Some(original);
        self.avatar_form.status = FormStatus::Idle;
        self.avatar_form.error = None;
        // A new avatar invalidates any look rendered on the previous one.
        self.try_on_form = TryOnForm::default();
        self.set_step(Step::Studio(StudioTab::TryOn));
        Ok(())
    }

    pub fn create_new_avatar(&mut self) -> StudioResult<()> {
        if !self.step.is_studio() {
            return Err(self.invalid_transition("create_new_avatar"));
        }
        self.avatar_form = AvatarForm::default();
        self.set_step(Step::AvatarGenerator);
        Ok(())
    }

    pub fn switch_tab(&mut self, tab: StudioTab) -> StudioResult<()> {
        if !self.step.is_studio() {
            return Err(self.invalid_transition("switch_tab"));
        }
        self.set_step(Step::Studio(tab));
        Ok(())
    }

    /// Back to the landing step. Saved looks and measurements survive.
    pub fn start_over(&mut self) {
        self.avatar_image = None;
        self.original_image = None;
        self.avatar_form = AvatarForm::default();
        self.try_on_form = TryOnForm::default();
        self.emit("start_over", json!({ "from": self.step.label() }));
        self.set_step(Step::Landing);
    }

    pub fn save_to_gallery(&mut self, result: TryOnResult) -> &'static str {
        let id = result.id.clone();
        self.gallery.insert(0, result);
        self.store.save_gallery(&self.gallery);
        info!(id = %id, saved = self.gallery.len(), "look saved to gallery");
        self.emit("gallery_saved", json!({ "id": id, "count": self.gallery.len() }));
        SAVED_TO_GALLERY
    }

    pub fn set_photo(&mut self, photo: EncodedImage) -> StudioResult<()> {
        self.require_step(Step::AvatarGenerator, "set_photo")?;
        self.avatar_form.photo = Some(photo);
        self.avatar_form.error = None;
        Ok(())
    }

    pub fn set_style(&mut self, style: AvatarStyle) -> StudioResult<()> {
        self.require_step(Step::AvatarGenerator, "set_style")?;
        self.avatar_form.style = style;
        Ok(())
    }

    pub fn submit_avatar(&mut self) -> StudioResult<GenerationJob> {
        self.require_step(Step::AvatarGenerator, "submit_avatar")?;
        if self.avatar_form.status.is_in_flight() {
            return Err(StudioError::invalid_input(REQUEST_IN_FLIGHT));
        }
        let Some(photo) = self.avatar_form.photo.clone() else {
            self.avatar_form.error = Some(MISSING_PHOTO.to_string());
            return Err(StudioError::invalid_input(MISSING_PHOTO));
        };

        let id = self.allocate_job_id();
        self.avatar_form.status = FormStatus::InFlight(id);
        self.avatar_form.error = None;
        let style = self.avatar_form.style;
        self.emit("avatar_requested", json!({ "job": id, "style": style.label() }));
        Ok(GenerationJob::Avatar { id, photo, style })
    }

    /// How many of `incoming` uploads fit in the free slots. Callers read
    /// only the accepted prefix of their batch.
    pub fn clothing_slots_for(&self, incoming: usize) -> StudioResult<SlotAllocation> {
        self.require_try_on_tab("clothing_slots_for")?;
        Ok(allocate_clothing_slots(
            self.try_on_form.clothing_images.len(),
            incoming,
        ))
    }

    /// Adds what fits in the remaining slots; the rest of the batch is
    /// dropped and the returned message says so.
    pub fn add_clothing_images(
        &mut self,
        images: Vec<EncodedImage>,
    ) -> StudioResult<SlotAllocation> {
        let allocation = self.clothing_slots_for(images.len())?;
        self.accept_clothing_images(allocation, images)
    }

    /// Stores images read for an allocation from [`Self::clothing_slots_for`].
    /// The allocation message, if any, becomes the form error.
    pub fn accept_clothing_images(
        &mut self,
        allocation: SlotAllocation,
        images: Vec<EncodedImage>,
    ) -> StudioResult<SlotAllocation> {
        self.require_try_on_tab("accept_clothing_images")?;
        let free = MAX_CLOTHING_IMAGES.saturating_sub(self.try_on_form.clothing_images.len());
        self.try_on_form
            .clothing_images
            .extend(images.into_iter().take(allocation.accepted.min(free)));
        self.try_on_form.error = allocation.message.clone();
        Ok(allocation)
    }

    pub fn remove_clothing_image(&mut self, index: usize) -> StudioResult<EncodedImage> {
        self.require_try_on_tab("remove_clothing_image")?;
        let count = self.try_on_form.clothing_images.len();
        if index >= count {
            return Err(StudioError::invalid_input(format!(
                "No clothing image #{} (have {count}).",
                index + 1
            )));
        }
        Ok(self.try_on_form.clothing_images.remove(index))
    }

    pub fn set_clothing_detail(&mut self, field: ClothingField, value: &str) -> StudioResult<()> {
        self.require_try_on_tab("set_clothing_detail")?;
        self.try_on_form.details.set(field, value);
        Ok(())
    }

    /// Measurements are kept across sessions, so every edit is written out.
    pub fn set_measurement(&mut self, field: MeasurementField, value: &str) -> StudioResult<()> {
        validate_measurement(field, value)?;
        self.measurements.set(field, value);
        self.store.save_measurements(&self.measurements);
        Ok(())
    }

    /// "Start New": empties the try-on form but keeps the measurements.
    pub fn clear_try_on(&mut self) -> StudioResult<()> {
        self.require_try_on_tab("clear_try_on")?;
        self.try_on_form = TryOnForm::default();
        Ok(())
    }

    pub fn submit_try_on(&mut self) -> StudioResult<GenerationJob> {
        self.require_try_on_tab("submit_try_on")?;
        if self.try_on_form.status.is_in_flight() {
            return Err(StudioError::invalid_input(REQUEST_IN_FLIGHT));
        }
        let Some(avatar) = self.avatar_image.clone() else {
            return Err(self.invalid_transition("submit_try_on"));
        };
        if let Err(err) = validate_try_on_form(
            self.try_on_form.clothing_images.len(),
            &self.try_on_form.details,
            &self.measurements,
        ) {
            self.try_on_form.error = Some(err.to_string());
            return Err(err);
        }

        let id = self.allocate_job_id();
        self.try_on_form.status = FormStatus::InFlight(id);
        self.try_on_form.error = None;
        self.try_on_form.final_image = None;
        self.emit(
            "try_on_requested",
            json!({
                "job": id,
                "images": self.try_on_form.clothing_images.len(),
                "item_type": &self.try_on_form.details.item_type,
            }),
        );
        Ok(GenerationJob::TryOn {
            id,
            avatar,
            clothing_images: self.try_on_form.clothing_images.clone(),
            details: self.try_on_form.details.clone(),
            measurements: self.measurements.clone(),
        })
    }

    /// Applies a finished job if its form is still waiting on it.
    pub fn apply_completion(&mut self, completion: JobCompletion) -> CompletionOutcome {
        let JobCompletion { job, outcome } = completion;
        let id = job.id();
        match job {
            GenerationJob::Avatar { photo, .. } => {
                if self.avatar_form.status != FormStatus::InFlight(id)
                    || self.step != Step::AvatarGenerator
                {
                    return self.discard(id, "avatar");
                }
                match outcome {
                    Ok(avatar) => match self.avatar_generated(avatar, photo) {
                        Ok(()) => CompletionOutcome::AvatarReady,
                        Err(err) => CompletionOutcome::Failed(err),
                    },
                    Err(err) => {
                        self.avatar_form.status = FormStatus::Failed;
                        self.avatar_form.error = Some(err.to_string());
                        self.emit_failure("avatar", id, &err);
                        CompletionOutcome::Failed(err)
                    }
                }
            }
            GenerationJob::TryOn { .. } => {
                if self.try_on_form.status != FormStatus::InFlight(id) {
                    return self.discard(id, "try_on");
                }
                match outcome {
                    Ok(image) => {
                        self.try_on_form.final_image = Some(image);
                        self.try_on_form.status = FormStatus::Idle;
                        self.emit("try_on_ready", json!({ "job": id }));
                        CompletionOutcome::TryOnReady
                    }
                    Err(err) => {
                        self.try_on_form.status = FormStatus::Failed;
                        self.try_on_form.error = Some(err.to_string());
                        self.emit_failure("try_on", id, &err);
                        CompletionOutcome::Failed(err)
                    }
                }
            }
        }
    }

    pub fn save_current_result(&mut self) -> StudioResult<&'static str> {
        let result = self.current_result()?;
        Ok(self.save_to_gallery(result))
    }

    pub fn download_current_result(&self, dir: &Path) -> StudioResult<PathBuf> {
        let Some(image) = self.try_on_form.final_image.as_ref() else {
            return Err(StudioError::invalid_input("There is no try-on result to download yet."));
        };
        let bytes = image.decode_bytes()?;
        let file_name = format!(
            "try-on-result-{}.{}",
            Utc::now().timestamp_millis(),
            image.file_extension()
        );
        let path = dir.join(file_name);
        fs::create_dir_all(dir)
            .and_then(|()| fs::write(&path, bytes))
            .map_err(|err| StudioError::Persistence(format!("{}: {err}", path.display())))?;
        info!(path = %path.display(), "try-on result downloaded");
        Ok(path)
    }

    fn current_result(&self) -> StudioResult<TryOnResult> {
        let (Some(final_image), Some(avatar)) =
            (self.try_on_form.final_image.clone(), self.avatar_image.clone())
        else {
            return Err(StudioError::invalid_input("There is no try-on result to save yet."));
        };
        Ok(TryOnResult::new(
            final_image,
            avatar,
            self.try_on_form.clothing_images.clone(),
            self.try_on_form.details.clone(),
            self.measurements.clone(),
            Utc::now(),
        ))
    }

    fn require_step(&self, expected: Step, operation: &str) -> StudioResult<()> {
        if self.step == expected {
            Ok(())
        } else {
            Err(self.invalid_transition(operation))
        }
    }

    fn require_try_on_tab(&self, operation: &str) -> StudioResult<()> {
        self.require_step(Step::Studio(StudioTab::TryOn), operation)
    }

    fn invalid_transition(&self, operation: &str) -> StudioError {
        StudioError::invalid_input(format!(
            "'{operation}' is not available on the {} step.",
            self.step.label()
        ))
    }

    fn allocate_job_id(&mut self) -> JobId {
        let id = self.next_job_id;
        self.next_job_id += 1;
        id
    }

    fn set_step(&mut self, next: Step) {
        if self.step == next {
            return;
        }
        debug!(from = self.step.label(), to = next.label(), "step changed");
        self.emit(
            "step_changed",
            json!({ "from": self.step.label(), "to": next.label() }),
        );
        self.step = next;
    }

    fn discard(&self, id: JobId, kind: &str) -> CompletionOutcome {
        debug!(job = id, kind, step = self.step.label(), "stale completion discarded");
        self.emit("completion_discarded", json!({ "job": id, "kind": kind }));
        CompletionOutcome::Discarded
    }

    fn emit_failure(&self, kind: &str, id: JobId, err: &StudioError) {
        self.emit(
            "request_failed",
            json!({ "job": id, "kind": kind, "error_kind": err.kind(), "error": err.to_string() }),
        );
    }

    fn emit(&self, event_type: &str, payload: Value) {
        if let Some(events) = self.events.as_ref() {
            let payload: EventPayload = payload.as_object().cloned().unwrap_or_default();
            events.emit_quiet(event_type, payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::time::Duration;

    use tryon_contracts::image::EncodedImage;
    use tryon_contracts::models::{AvatarStyle, ClothingField, MeasurementField};
    use tryon_contracts::store::PersistedStore;
    use tryon_contracts::validation::{
        CLOTHING_LIMIT_REACHED, MISSING_PHOTO, REQUEST_IN_FLIGHT, TRY_ON_INCOMPLETE,
    };
    use tryon_contracts::validation::SlotAllocation;
    use tryon_contracts::StudioError;

    use super::{CompletionOutcome, FormStatus, Step, StudioTab, WorkflowController, SAVED_TO_GALLERY};
    use crate::dispatcher::{GenerationDispatcher, JobCompletion};
    use crate::generation::testing::{Scripted, ScriptedTransport};
    use crate::generation::{ContentPart, GenerationClient};

    fn image(tag: &str) -> EncodedImage {
        EncodedImage::from_base64_parts("image/png", tag).expect("valid image")
    }

    fn partial_of(accepted: usize) -> SlotAllocation {
        SlotAllocation {
            accepted,
            message: None,
        }
    }

    fn in_studio(store: PersistedStore) -> anyhow::Result<WorkflowController> {
        let mut controller = WorkflowController::new(store);
        controller.start()?;
        controller.avatar_generated(image("AVATAR"), image("ORIGINAL"))?;
        Ok(controller)
    }

    fn fill_try_on_form(controller: &mut WorkflowController) -> anyhow::Result<()> {
        controller.add_clothing_images(vec![image("SHIRT")])?;
        controller.set_clothing_detail(ClothingField::ItemType, "Shirt")?;
        controller.set_clothing_detail(ClothingField::Material, "Linen")?;
        controller.set_clothing_detail(ClothingField::Fit, "Loose")?;
        controller.set_measurement(MeasurementField::Height, "180")?;
        controller.set_measurement(MeasurementField::Weight, "75")?;
        Ok(())
    }

    #[test]
    fn avatar_flow_moves_from_landing_to_studio() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default();
        transport.push(Scripted::Parts(vec![ContentPart::InlineImage(image("AVATAR"))]));
        let client = GenerationClient::new(Box::new(transport.clone()), "m");

        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        assert_eq!(controller.current_view(), Step::Landing);
        controller.start()?;

        let err = controller.submit_avatar().unwrap_err();
        assert_eq!(err, StudioError::InvalidInput(MISSING_PHOTO.to_string()));
        assert_eq!(controller.avatar_form().error.as_deref(), Some(MISSING_PHOTO));
        assert!(transport.recorded().is_empty());

        controller.set_photo(image("PHOTO"))?;
        controller.set_style(AvatarStyle::Anime)?;
        let job = controller.submit_avatar()?;
        assert!(controller.avatar_form().status.is_in_flight());

        let outcome = controller.apply_completion(job.run(&client));
        assert_eq!(outcome, CompletionOutcome::AvatarReady);
        assert_eq!(controller.current_view(), Step::Studio(StudioTab::TryOn));
        assert_eq!(controller.avatar_image(), Some(&image("AVATAR")));
        assert_eq!(controller.original_image(), Some(&image("PHOTO")));
        Ok(())
    }

    #[test]
    fn second_submit_while_in_flight_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        controller.start()?;
        controller.set_photo(image("PHOTO"))?;
        controller.submit_avatar()?;
        assert_eq!(
            controller.submit_avatar().unwrap_err(),
            StudioError::InvalidInput(REQUEST_IN_FLIGHT.to_string())
        );
        Ok(())
    }

    #[test]
    fn failed_avatar_keeps_generator_step() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        controller.start()?;
        controller.set_photo(image("PHOTO"))?;
        let job = controller.submit_avatar()?;

        let failure = StudioError::Transport("quota exceeded".to_string());
        let outcome = controller.apply_completion(JobCompletion {
            job,
            outcome: Err(failure.clone()),
        });
        assert_eq!(outcome, CompletionOutcome::Failed(failure));
        assert_eq!(controller.step(), Step::AvatarGenerator);
        assert_eq!(controller.avatar_form().status, FormStatus::Failed);
        assert_eq!(controller.avatar_form().error.as_deref(), Some("quota exceeded"));
        assert!(controller.avatar_image().is_none());

        // Retrying after a failure is allowed.
        assert!(controller.submit_avatar().is_ok());
        Ok(())
    }

    #[test]
    fn completion_after_start_over_is_discarded() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        controller.start()?;
        controller.set_photo(image("PHOTO"))?;
        let job = controller.submit_avatar()?;
        controller.start_over();

        let outcome = controller.apply_completion(JobCompletion {
            job,
            outcome: Ok(image("LATE")),
        });
        assert_eq!(outcome, CompletionOutcome::Discarded);
        assert_eq!(controller.step(), Step::Landing);
        assert!(controller.avatar_image().is_none());
        Ok(())
    }

    #[test]
    fn start_over_keeps_gallery_and_measurements() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        fill_try_on_form(&mut controller)?;
        let job = controller.submit_try_on()?;
        controller.apply_completion(JobCompletion {
            job,
            outcome: Ok(image("LOOK")),
        });
        assert_eq!(controller.save_current_result()?, SAVED_TO_GALLERY);

        controller.start_over();
        assert_eq!(controller.step(), Step::Landing);
        assert!(controller.avatar_image().is_none());
        assert!(controller.original_image().is_none());
        assert_eq!(controller.gallery().len(), 1);
        assert_eq!(controller.measurements().height, "180");
        assert!(controller.try_on_form().clothing_images.is_empty());
        Ok(())
    }

    #[test]
    fn studio_without_images_heals_to_landing() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        controller.original_image = None;
        assert_eq!(controller.current_view(), Step::Landing);
        assert!(controller.avatar_image().is_none());
        Ok(())
    }

    #[test]
    fn transitions_are_checked() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        assert!(controller.switch_tab(StudioTab::Gallery).is_err());
        assert!(controller.create_new_avatar().is_err());
        assert!(controller.submit_try_on().is_err());

        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        assert!(controller.start().is_err());
        controller.switch_tab(StudioTab::Gallery)?;
        assert_eq!(controller.step(), Step::Studio(StudioTab::Gallery));
        controller.create_new_avatar()?;
        assert_eq!(controller.step(), Step::AvatarGenerator);
        assert!(controller.avatar_image().is_some());
        Ok(())
    }

    #[test]
    fn fifth_clothing_image_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        let first = controller.add_clothing_images(vec![image("AAAA"), image("BBBB"), image("CCCC")])?;
        assert_eq!(first.accepted, 3);
        assert_eq!(first.message, None);

        let second = controller.add_clothing_images(vec![image("DDDD"), image("EEEE")])?;
        assert_eq!(second.accepted, 1);
        assert_eq!(
            second.message.as_deref(),
            Some("You can only add 1 more image(s). 1 were added.")
        );

        let third = controller.add_clothing_images(vec![image("FFFF")])?;
        assert_eq!(third.accepted, 0);
        assert_eq!(controller.try_on_form().error.as_deref(), Some(CLOTHING_LIMIT_REACHED));
        assert_eq!(controller.try_on_form().clothing_images.len(), 4);
        assert_eq!(controller.try_on_form().clothing_images[3], image("DDDD"));

        controller.remove_clothing_image(0)?;
        assert_eq!(controller.try_on_form().clothing_images[0], image("BBBB"));
        assert!(controller.remove_clothing_image(3).is_err());
        Ok(())
    }

    #[test]
    fn incomplete_try_on_never_reaches_transport() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default();
        let mut dispatcher =
            GenerationDispatcher::new(GenerationClient::new(Box::new(transport.clone()), "m"));
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        fill_try_on_form(&mut controller)?;
        controller.set_clothing_detail(ClothingField::ItemType, "")?;

        let submitted = controller.submit_try_on();
        if let Ok(job) = submitted.clone() {
            dispatcher.dispatch(job);
        }
        assert_eq!(
            submitted,
            Err(StudioError::InvalidInput(TRY_ON_INCOMPLETE.to_string()))
        );
        assert_eq!(controller.try_on_form().status, FormStatus::Idle);
        assert_eq!(
            controller.try_on_form().error.as_deref(),
            Some(TRY_ON_INCOMPLETE)
        );
        assert_eq!(dispatcher.outstanding(), 0);
        assert!(transport.recorded().is_empty());

        // The same dispatcher does reach the transport once the form is complete.
        controller.set_clothing_detail(ClothingField::ItemType, "Shirt")?;
        dispatcher.dispatch(controller.submit_try_on()?);
        for _ in 0..100 {
            if dispatcher.wait_next(Duration::from_millis(100)).is_some() {
                break;
            }
        }
        assert_eq!(transport.recorded().len(), 1);
        Ok(())
    }

    #[test]
    fn slots_are_counted_before_images_are_read() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        controller.add_clothing_images(vec![image("AAAA"), image("BBBB"), image("CCCC")])?;

        let partial = controller.clothing_slots_for(2)?;
        assert_eq!(partial.accepted, 1);
        assert_eq!(controller.try_on_form().clothing_images.len(), 3);
        controller.accept_clothing_images(partial, vec![image("DDDD")])?;
        assert_eq!(controller.try_on_form().clothing_images.len(), 4);
        assert_eq!(
            controller.try_on_form().error.as_deref(),
            Some("You can only add 1 more image(s). 1 were added.")
        );

        let full = controller.clothing_slots_for(1)?;
        assert_eq!(full.accepted, 0);
        // An allocation can never push the form past its limit.
        controller.accept_clothing_images(partial_of(1), vec![image("EEEE")])?;
        assert_eq!(controller.try_on_form().clothing_images.len(), 4);
        controller.accept_clothing_images(full, Vec::new())?;
        assert_eq!(controller.try_on_form().error.as_deref(), Some(CLOTHING_LIMIT_REACHED));

        controller.switch_tab(StudioTab::Gallery)?;
        assert!(controller.clothing_slots_for(1).is_err());
        Ok(())
    }

    #[test]
    fn try_on_result_survives_tab_switch_and_only_latest_job_applies() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::default();
        transport.push(Scripted::Parts(vec![ContentPart::InlineImage(image("LOOK"))]));
        let client = GenerationClient::new(Box::new(transport.clone()), "m");

        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        fill_try_on_form(&mut controller)?;
        let stale = controller.submit_try_on()?;
        controller.clear_try_on()?;
        assert_eq!(
            controller.apply_completion(JobCompletion {
                job: stale,
                outcome: Ok(image("OLD")),
            }),
            CompletionOutcome::Discarded
        );
        assert_eq!(controller.measurements().weight, "75");

        fill_try_on_form(&mut controller)?;
        let job = controller.submit_try_on()?;
        controller.switch_tab(StudioTab::Gallery)?;
        assert_eq!(controller.apply_completion(job.run(&client)), CompletionOutcome::TryOnReady);
        controller.switch_tab(StudioTab::TryOn)?;
        assert_eq!(controller.try_on_form().final_image, Some(image("LOOK")));
        assert_eq!(transport.recorded()[0].image_count(), 2);
        Ok(())
    }

    #[test]
    fn saved_looks_and_measurements_reload_from_store() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        assert!(controller.save_current_result().is_err());

        fill_try_on_form(&mut controller)?;
        for look in ["LOOK", "NEXT"] {
            let job = controller.submit_try_on()?;
            controller.apply_completion(JobCompletion {
                job,
                outcome: Ok(image(look)),
            });
            controller.save_current_result()?;
        }

        let reloaded = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        assert_eq!(reloaded.gallery().len(), 2);
        assert_eq!(reloaded.gallery()[0].final_image, image("NEXT"));
        assert_eq!(reloaded.gallery()[1].final_image, image("LOOK"));
        assert_eq!(reloaded.gallery()[0].clothing_details.fit, "Loose");
        assert_eq!(reloaded.measurements().height, "180");
        assert_eq!(reloaded.step(), Step::Landing);
        Ok(())
    }

    #[test]
    fn bad_measurement_is_rejected_and_not_saved() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = WorkflowController::new(PersistedStore::in_dir(temp.path()));
        assert!(controller.set_measurement(MeasurementField::Chest, "wide").is_err());
        assert_eq!(controller.measurements().chest, "");
        Ok(())
    }

    #[test]
    fn download_writes_timestamped_file() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut controller = in_studio(PersistedStore::in_dir(temp.path()))?;
        let downloads = temp.path().join("downloads");
        assert!(controller.download_current_result(&downloads).is_err());

        fill_try_on_form(&mut controller)?;
        let job = controller.submit_try_on()?;
        controller.apply_completion(JobCompletion {
            job,
            outcome: Ok(image("iVBORw0K")),
        });
        let path = controller.download_current_result(&downloads)?;
        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        assert!(name.starts_with("try-on-result-"));
        assert!(name.ends_with(".png"));
        assert_eq!(fs::read(&path)?, image("iVBORw0K").decode_bytes()?);
        Ok(())
    }
}
