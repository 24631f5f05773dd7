//! Generation client, workflow controller and supporting plumbing for the
//! try-on studio.

pub mod config;
pub mod controller;
pub mod dispatcher;
pub mod export;
pub mod generation;
pub mod prompts;
pub mod uploads;

pub use config::{StudioConfig, TransportKind};
pub use controller::{
    CompletionOutcome, FormStatus, Step, StudioTab, WorkflowController, SAVED_TO_GALLERY,
};
pub use dispatcher::{GenerationDispatcher, GenerationJob, JobCompletion, JobId};
pub use generation::{GenerationClient, GenerationTransport};
