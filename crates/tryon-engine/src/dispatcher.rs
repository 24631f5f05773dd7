use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use tracing::{debug, error};
use tryon_contracts::image::EncodedImage;
use tryon_contracts::models::{AvatarStyle, ClothingDetails, Measurements};
use tryon_contracts::{StudioError, StudioResult};

use crate::generation::GenerationClient;

pub type JobId = u64;

pub const WORKER_PANICKED: &str = "Generation worker stopped unexpectedly";

/// A snapshot of one form submission, detached from the controller so it
/// can run off the event thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationJob {
    Avatar {
        id: JobId,
        photo: EncodedImage,
        style: AvatarStyle,
    },
    TryOn {
        id: JobId,
        avatar: EncodedImage,
        clothing_images: Vec<EncodedImage>,
        details: ClothingDetails,
        measurements: Measurements,
    },
}

impl GenerationJob {
    pub fn id(&self) -> JobId {
        match self {
            Self::Avatar { id, .. } | Self::TryOn { id, .. } => *id,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Avatar { .. } => "avatar",
            Self::TryOn { .. } => "try_on",
        }
    }

    pub fn run(self, client: &GenerationClient) -> JobCompletion {
        let outcome = self.generate(client);
        JobCompletion { job: self, outcome }
    }

    fn generate(&self, client: &GenerationClient) -> StudioResult<EncodedImage> {
        match self {
            Self::Avatar { photo, style, .. } => client.generate_avatar(photo, *style),
            Self::TryOn {
                avatar,
                clothing_images,
                details,
                measurements,
                ..
            } => client.perform_try_on(avatar, clothing_images, details, measurements),
        }
    }

    /// Like [`Self::run`], but a panic inside the client becomes a
    /// transport failure so every job still reports back.
    fn run_guarded(self, client: &GenerationClient) -> JobCompletion {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.generate(client)))
            .unwrap_or_else(|payload| {
                let reason = panic_reason(payload.as_ref());
                error!(
                    job = self.id(),
                    kind = self.label(),
                    reason = %reason,
                    "generation worker panicked"
                );
                Err(StudioError::Transport(format!("{WORKER_PANICKED}: {reason}")))
            });
        JobCompletion { job: self, outcome }
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobCompletion {
    pub job: GenerationJob,
    pub outcome: StudioResult<EncodedImage>,
}

/// Runs generation jobs on worker threads and hands completions back over a
/// channel, so the event loop never blocks on the network.
pub struct GenerationDispatcher {
    client: Arc<GenerationClient>,
    sender: mpsc::Sender<JobCompletion>,
    receiver: mpsc::Receiver<JobCompletion>,
    outstanding: usize,
}

impl GenerationDispatcher {
    pub fn new(client: GenerationClient) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            client: Arc::new(client),
            sender,
            receiver,
            outstanding: 0,
        }
    }

    pub fn client(&self) -> &GenerationClient {
        &self.client
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn dispatch(&mut self, job: GenerationJob) {
        let client = Arc::clone(&self.client);
        let sender = self.sender.clone();
        let fallback = job.clone();
        let spawned = thread::Builder::new()
            .name(format!("tryon-{}-{}", job.label(), job.id()))
            .spawn(move || {
                let completion = job.run_guarded(&client);
                // The receiver only disappears when the dispatcher is dropped.
                let _ = sender.send(completion);
            });
        self.outstanding += 1;
        if let Err(err) = spawned {
            error!(error = %err, "generation worker spawn failed");
            let _ = self.sender.send(JobCompletion {
                job: fallback,
                outcome: Err(StudioError::Transport(format!(
                    "Generation worker spawn failed: {err}"
                ))),
            });
        } else {
            debug!(job = fallback.id(), kind = fallback.label(), "generation job dispatched");
        }
    }

    pub fn try_next(&mut self) -> Option<JobCompletion> {
        let completion = self.receiver.try_recv().ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(completion)
    }

    pub fn wait_next(&mut self, timeout: Duration) -> Option<JobCompletion> {
        if self.outstanding == 0 {
            return None;
        }
        let completion = self.receiver.recv_timeout(timeout).ok()?;
        self.outstanding = self.outstanding.saturating_sub(1);
        Some(completion)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tryon_contracts::image::EncodedImage;
    use tryon_contracts::models::AvatarStyle;
    use tryon_contracts::StudioError;

    use super::{GenerationDispatcher, GenerationJob, WORKER_PANICKED};
    use crate::generation::testing::{Scripted, ScriptedTransport};
    use crate::generation::{
        ContentPart, GenerationClient, GenerationRequest, GenerationResponse, GenerationTransport,
    };

    fn image(tag: &str) -> EncodedImage {
        EncodedImage::from_base64_parts("image/png", tag).expect("valid image")
    }

    fn wait(dispatcher: &mut GenerationDispatcher) -> super::JobCompletion {
        for _ in 0..100 {
            if let Some(completion) = dispatcher.wait_next(Duration::from_millis(100)) {
                return completion;
            }
        }
        panic!("job never completed");
    }

    #[test]
    fn completion_comes_back_with_its_job() {
        let transport = ScriptedTransport::default();
        transport.push(Scripted::Parts(vec![ContentPart::InlineImage(image("DONE"))]));
        let mut dispatcher =
            GenerationDispatcher::new(GenerationClient::new(Box::new(transport), "m"));

        let job = GenerationJob::Avatar {
            id: 7,
            photo: image("PHOTO"),
            style: AvatarStyle::Cartoon,
        };
        dispatcher.dispatch(job.clone());
        assert_eq!(dispatcher.outstanding(), 1);

        let completion = wait(&mut dispatcher);
        assert_eq!(completion.job, job);
        assert_eq!(completion.outcome, Ok(image("DONE")));
        assert_eq!(dispatcher.outstanding(), 0);
        assert!(dispatcher.try_next().is_none());
    }

    #[test]
    fn failures_are_delivered_as_completions() {
        let transport = ScriptedTransport::default();
        transport.push(Scripted::Fail("network unreachable".to_string()));
        let mut dispatcher =
            GenerationDispatcher::new(GenerationClient::new(Box::new(transport), "m"));

        dispatcher.dispatch(GenerationJob::Avatar {
            id: 1,
            photo: image("PHOTO"),
            style: AvatarStyle::Anime,
        });
        let completion = wait(&mut dispatcher);
        assert_eq!(
            completion.outcome,
            Err(StudioError::Transport("network unreachable".to_string()))
        );
    }

    struct PanickingTransport;

    impl GenerationTransport for PanickingTransport {
        fn name(&self) -> &str {
            "panicking"
        }

        fn generate_content(
            &self,
            _request: &GenerationRequest,
        ) -> anyhow::Result<GenerationResponse> {
            panic!("decoder exploded");
        }
    }

    #[test]
    fn panicking_worker_still_reports_a_failure() {
        let mut dispatcher =
            GenerationDispatcher::new(GenerationClient::new(Box::new(PanickingTransport), "m"));
        let job = GenerationJob::Avatar {
            id: 3,
            photo: image("PHOTO"),
            style: AvatarStyle::Anime,
        };
        dispatcher.dispatch(job.clone());

        let completion = wait(&mut dispatcher);
        assert_eq!(completion.job, job);
        assert_eq!(
            completion.outcome,
            Err(StudioError::Transport(format!("{WORKER_PANICKED}: decoder exploded")))
        );
        assert_eq!(dispatcher.outstanding(), 0);
        assert!(dispatcher.wait_next(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn wait_without_outstanding_jobs_returns_immediately() {
        let mut dispatcher = GenerationDispatcher::new(GenerationClient::new(
            Box::new(ScriptedTransport::default()),
            "m",
        ));
        assert!(dispatcher.wait_next(Duration::from_secs(5)).is_none());
    }
}
