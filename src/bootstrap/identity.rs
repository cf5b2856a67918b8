//! Overlay identity configuration
//!
//! Identity files are the JSON documents produced by enrolling an identity
//! with the controller:
//!
//! ```json
//! {
//!   "ztAPI": "https://controller.example.com:1280",
//!   "id": { "cert": "pem:...", "key": "pem:...", "ca": "pem:..." }
//! }
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Enrolled identity handed to the transport's `init`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Controller edge API URL
    #[serde(rename = "ztAPI")]
    pub controller_url: String,
    /// Key material
    pub id: IdentityMaterial,
    /// Service config types requested from the controller
    #[serde(rename = "configTypes", default, skip_serializing_if = "Vec::is_empty")]
    pub config_types: Vec<String>,
}

/// Certificate, key and CA bundle of an identity
///
/// Values are either inline PEM (`pem:` prefix) or references understood by
/// the transport (`file://...`, `keychain:...`).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMaterial {
    /// Client certificate
    pub cert: String,
    /// Private key
    pub key: String,
    /// CA bundle used to verify the controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
}

impl fmt::Debug for IdentityMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityMaterial")
            .field("cert", &self.cert)
            .field("key", &"<redacted>")
            .field("ca", &self.ca)
            .finish()
    }
}

impl IdentityConfig {
    /// Parse and validate an identity document
    pub fn from_json(json: &str) -> Result<Self> {
        let identity: IdentityConfig = serde_json::from_str(json)?;
        identity.validate()?;
        Ok(identity)
    }

    /// Load and validate an identity file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            Error::Identity(format!("failed to read identity file {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    /// Check that the identity can be handed to the transport
    pub fn validate(&self) -> Result<()> {
        if !self.controller_url.starts_with("https://") {
            return Err(Error::Identity(format!(
                "controller URL must use https: '{}'",
                self.controller_url
            )));
        }
        if self.controller_url.trim_start_matches("https://").is_empty() {
            return Err(Error::Identity("controller URL has no host".into()));
        }
        if self.id.cert.trim().is_empty() {
            return Err(Error::Identity("identity certificate is empty".into()));
        }
        if self.id.key.trim().is_empty() {
            return Err(Error::Identity("identity key is empty".into()));
        }
        Ok(())
    }
}
