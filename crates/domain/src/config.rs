use std::{env, path::PathBuf, str::FromStr};

use crate::activity::DEFAULT_RETENTION;
use crate::prescriptions::AttachmentLimits;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub bind_addr: String,
    /// Upper bound on one request body, multipart uploads included
    pub max_body_bytes: usize,
    pub limits: AttachmentLimits,
    pub activity_retention: usize,
    pub event_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".hospital-data"),
            bind_addr: "127.0.0.1:3000".to_string(),
            max_body_bytes: 64 * 1024 * 1024,
            limits: AttachmentLimits::default(),
            activity_retention: DEFAULT_RETENTION,
            event_buffer: 64,
        }
    }
}

impl Config {
    /// Reads overrides from the environment; anything unset keeps its default.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        Self {
            data_dir: lookup("HOSPITAL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            bind_addr: lookup("API_BIND_ADDR").unwrap_or(defaults.bind_addr),
            max_body_bytes: parsed(&lookup, "API_MAX_BODY_BYTES", defaults.max_body_bytes),
            limits: AttachmentLimits {
                max_photos: parsed(&lookup, "DISPENSE_MAX_PHOTOS", defaults.limits.max_photos),
                max_photo_bytes: parsed(
                    &lookup,
                    "DISPENSE_MAX_PHOTO_BYTES",
                    defaults.limits.max_photo_bytes,
                ),
                max_document_bytes: parsed(
                    &lookup,
                    "DISPENSE_MAX_DOCUMENT_BYTES",
                    defaults.limits.max_document_bytes,
                ),
            },
            activity_retention: parsed(&lookup, "ACTIVITY_RETENTION", defaults.activity_retention),
            event_buffer: parsed(&lookup, "EVENT_BUFFER", defaults.event_buffer),
        }
    }
}

fn parsed<T: FromStr + Copy>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    match lookup(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid {}={:?}", key, raw);
            default
        }),
    }
}
