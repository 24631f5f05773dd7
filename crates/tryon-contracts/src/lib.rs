//! Shared data model, codecs and persistence for the avatar try-on studio.

pub mod chat;
pub mod error;
pub mod events;
pub mod image;
pub mod models;
pub mod store;
pub mod validation;

pub use error::{StudioError, StudioResult};
