//! Payload configuration and the shared cell that hands it to tag sessions.
//!
//! The cell is written by the host's UI side and read by the APDU side on another thread.
//! Text and kind always travel together as one `Arc<Snapshot>`.

use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::ndef::{self, EncodeError};

/// Default payload, served until the host configures one.
pub const DEFAULT_PAYLOAD: &str = "https://www.example.com";

/// Which NDEF record the payload is wrapped in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    Uri,
    Text,
}

impl PayloadKind {
    pub fn from_is_url(is_url: bool) -> Self {
        if is_url {
            PayloadKind::Uri
        } else {
            PayloadKind::Text
        }
    }
}

/// Text plus record kind. Any string is accepted; encodability is checked separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadConfig {
    pub text: String,
    pub kind: PayloadKind,
}

impl PayloadConfig {
    pub fn new(text: impl Into<String>, kind: PayloadKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    pub fn uri(text: impl Into<String>) -> Self {
        Self::new(text, PayloadKind::Uri)
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self::new(text, PayloadKind::Text)
    }

    /// Check that the payload fits a short NDEF record.
    pub fn validate(&self) -> Result<(), EncodeError> {
        ndef::check_len(self)
    }
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self::uri(DEFAULT_PAYLOAD)
    }
}

/// Config and the NDEF file derived from it. Immutable once published.
#[derive(Debug)]
pub struct Snapshot {
    config: PayloadConfig,
    ndef_file: Result<Vec<u8>, EncodeError>,
}

impl Snapshot {
    fn new(config: PayloadConfig) -> Self {
        let ndef_file = ndef::encode(&config);
        Self { config, ndef_file }
    }

    pub fn config(&self) -> &PayloadConfig {
        &self.config
    }

    /// Encoded NDEF file (`NLEN` + record), or why the payload cannot be encoded.
    pub fn ndef_file(&self) -> Result<&[u8], &EncodeError> {
        self.ndef_file.as_deref()
    }
}

/// Thread-safe, last-write-wins payload holder shared between the host and tag sessions.
#[derive(Debug)]
pub struct PayloadCell {
    current: RwLock<Arc<Snapshot>>,
}

impl PayloadCell {
    pub fn new(config: PayloadConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(Snapshot::new(config))),
        }
    }

    /// Replace the payload. Never fails; a payload too long to encode is stored anyway
    /// and NDEF reads answer file-not-found until a valid one replaces it.
    pub fn set(&self, config: PayloadConfig) {
        let snapshot = Arc::new(Snapshot::new(config));
        match snapshot.ndef_file() {
            Ok(file) => tracing::info!(
                kind = ?snapshot.config().kind,
                len = snapshot.config().text.len(),
                ndef_len = file.len(),
                "payload set"
            ),
            Err(e) => tracing::warn!(kind = ?snapshot.config().kind, "payload set but not servable: {e}"),
        }
        // The slot only ever holds a whole Arc, so a poisoned lock is still usable.
        let mut current = self.current.write().unwrap_or_else(|p| p.into_inner());
        *current = snapshot;
    }

    /// Same as `set` with the text/flag pair used by host UIs.
    pub fn set_payload(&self, text: &str, is_url: bool) {
        self.set(PayloadConfig::new(text, PayloadKind::from_is_url(is_url)));
    }

    /// Current snapshot. Cheap: clones an `Arc`.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        let current = self.current.read().unwrap_or_else(|p| p.into_inner());
        Arc::clone(&current)
    }
}

impl Default for PayloadCell {
    fn default() -> Self {
        Self::new(PayloadConfig::default())
    }
}
