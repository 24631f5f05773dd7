use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Result};
use tryon_contracts::events::EventWriter;

use crate::generation::{
    DryrunTransport, GeminiTransport, GenerationClient, GenerationTransport,
    DEFAULT_GEMINI_API_BASE, DEFAULT_IMAGE_MODEL,
};

pub const DEFAULT_DATA_DIR: &str = ".tryon-studio";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportKind {
    #[default]
    Gemini,
    Dryrun,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Gemini => "gemini",
            Self::Dryrun => "dryrun",
        })
    }
}

impl FromStr for TransportKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "dryrun" | "dry-run" | "offline" => Ok(Self::Dryrun),
            other => bail!("unknown transport '{other}' (expected gemini or dryrun)"),
        }
    }
}

/// Runtime settings, resolved from the environment and then overridden by
/// command-line flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioConfig {
    pub data_dir: PathBuf,
    pub transport: TransportKind,
    pub model: String,
    pub api_base: String,
    pub api_key: Option<String>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            transport: TransportKind::default(),
            model: DEFAULT_IMAGE_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            api_key: None,
        }
    }
}

impl StudioConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(non_empty_env)
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(dir) = lookup("TRYON_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(transport) = lookup("TRYON_TRANSPORT") {
            config.transport = transport.parse()?;
        }
        if let Some(model) = lookup("TRYON_IMAGE_MODEL") {
            config.model = model;
        }
        if let Some(base) = lookup("GEMINI_API_BASE") {
            config.api_base = base.trim_end_matches('/').to_string();
        }
        config.api_key = lookup("API_KEY")
            .or_else(|| lookup("GEMINI_API_KEY"))
            .or_else(|| lookup("GOOGLE_API_KEY"));
        Ok(config)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    pub fn events_path(&self) -> PathBuf {
        self.data_dir.join("events.jsonl")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }

    pub fn build_transport(&self) -> Result<Box<dyn GenerationTransport>> {
        match self.transport {
            TransportKind::Dryrun => Ok(Box::new(DryrunTransport::new())),
            TransportKind::Gemini => {
                let Some(api_key) = self.api_key.as_deref() else {
                    bail!("API_KEY environment variable not set");
                };
                Ok(Box::new(GeminiTransport::new(&self.api_base, api_key)?))
            }
        }
    }

    pub fn build_client(&self, events: Option<EventWriter>) -> Result<GenerationClient> {
        let client = GenerationClient::new(self.build_transport()?, self.model.clone());
        Ok(match events {
            Some(events) => client.with_events(events),
            None => client,
        })
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use super::{StudioConfig, TransportKind};
    use crate::generation::DEFAULT_IMAGE_MODEL;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_without_environment() -> anyhow::Result<()> {
        let config = StudioConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config.data_dir, PathBuf::from(".tryon-studio"));
        assert_eq!(config.model, DEFAULT_IMAGE_MODEL);
        assert_eq!(config.transport, TransportKind::Gemini);
        assert_eq!(config.api_key, None);
        assert!(config.build_transport().is_err());
        Ok(())
    }

    #[test]
    fn api_key_prefers_api_key_over_gemini_key() -> anyhow::Result<()> {
        let config = StudioConfig::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "gemini"),
            ("API_KEY", "primary"),
        ]))?;
        assert_eq!(config.api_key.as_deref(), Some("primary"));

        let fallback = StudioConfig::from_lookup(lookup_from(&[("GOOGLE_API_KEY", "google")]))?;
        assert_eq!(fallback.api_key.as_deref(), Some("google"));
        Ok(())
    }

    #[test]
    fn dryrun_transport_needs_no_key() -> anyhow::Result<()> {
        let config = StudioConfig::from_lookup(lookup_from(&[
            ("TRYON_TRANSPORT", "dryrun"),
            ("TRYON_DATA_DIR", "/tmp/studio"),
        ]))?;
        assert_eq!(config.store_path(), PathBuf::from("/tmp/studio/store.json"));
        let client = config.build_client(None)?;
        assert_eq!(client.transport_name(), "dryrun");
        Ok(())
    }

    #[test]
    fn unknown_transport_is_an_error() {
        assert!(StudioConfig::from_lookup(lookup_from(&[("TRYON_TRANSPORT", "carrier-pigeon")])).is_err());
    }
}
