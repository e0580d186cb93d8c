//! Identity management for the transport endpoint.
//!
//! The endpoint keypair is generated on first run and persisted, so the
//! local peer id stays stable across restarts. Conversation data is never
//! persisted; only the key material is.

use crate::error::{Error, Result};
use crate::platform;
use chrono::{DateTime, Utc};
use iroh::SecretKey;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Identity data as persisted to disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityData {
    /// The public endpoint ID (node id string)
    pub peer_id: String,

    /// Display name for this device
    pub name: String,

    /// When this identity was created
    pub created_at: DateTime<Utc>,

    /// The secret key in hex format
    secret_key_hex: String,
}

/// Runtime identity with parsed secret key.
#[derive(Debug, Clone)]
pub struct Identity {
    /// The public endpoint ID (node id string)
    pub peer_id: String,

    /// Display name for this device
    pub name: String,

    /// When this identity was created
    pub created_at: DateTime<Utc>,

    /// The secret key backing the endpoint
    secret_key: SecretKey,
}

impl Identity {
    /// Get the secret key for binding the endpoint.
    pub fn secret_key(&self) -> &SecretKey {
        &self.secret_key
    }

    /// Load an existing identity or create a new one.
    ///
    /// The device name defaults to the hostname if not provided.
    pub fn load_or_create(name: Option<String>) -> Result<Self> {
        let identity_path = platform::identity_file_path();

        if identity_path.exists() {
            Self::load_from_file(&identity_path)
        } else {
            let name = name.unwrap_or_else(default_device_name);
            let identity = Self::generate(name)?;
            identity.save()?;
            Ok(identity)
        }
    }

    /// Generate a new identity with the given device name.
    pub fn generate(name: String) -> Result<Self> {
        let secret_key = SecretKey::generate(rand::rngs::OsRng);
        let peer_id = secret_key.public().to_string();

        Ok(Self {
            peer_id,
            name,
            created_at: Utc::now(),
            secret_key,
        })
    }

    /// Load identity from a file.
    fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let data: IdentityData = serde_json::from_str(&contents)?;

        let secret_key_bytes = hex::decode(&data.secret_key_hex)
            .map_err(|e| Error::Identity(format!("invalid secret key hex: {}", e)))?;

        let secret_key_array: [u8; 32] = secret_key_bytes
            .try_into()
            .map_err(|_| Error::Identity("secret key must be 32 bytes".to_string()))?;

        let secret_key = SecretKey::from_bytes(&secret_key_array);

        // The stored peer id must match the key it was derived from.
        let expected_id = secret_key.public().to_string();
        if expected_id != data.peer_id {
            return Err(Error::Identity(
                "peer_id does not match secret key".to_string(),
            ));
        }

        Ok(Self {
            peer_id: data.peer_id,
            name: data.name,
            created_at: data.created_at,
            secret_key,
        })
    }

    /// Save identity to the default location.
    pub fn save(&self) -> Result<()> {
        let identity_path = platform::identity_file_path();
        self.save_to_file(&identity_path)
    }

    /// Save identity to a specific file.
    fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let data = IdentityData {
            peer_id: self.peer_id.clone(),
            name: self.name.clone(),
            created_at: self.created_at,
            secret_key_hex: hex::encode(self.secret_key.to_bytes()),
        };

        let contents = serde_json::to_string_pretty(&data)?;
        std::fs::write(path, contents)?;

        Ok(())
    }
}

/// Get the default device name (hostname or fallback).
fn default_device_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "Unknown Device".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_generate_identity() {
        let identity = Identity::generate("Test Device".to_string()).unwrap();
        assert!(!identity.peer_id.is_empty());
        assert_eq!(identity.name, "Test Device");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let identity_path = temp_dir.path().join("identity.json");

        let original = Identity::generate("Test Device".to_string()).unwrap();
        original.save_to_file(&identity_path).unwrap();

        let loaded = Identity::load_from_file(&identity_path).unwrap();
        assert_eq!(loaded.peer_id, original.peer_id);
        assert_eq!(loaded.name, original.name);
    }

    #[test]
    fn test_load_rejects_mismatched_peer_id() {
        let temp_dir = TempDir::new().unwrap();
        let identity_path = temp_dir.path().join("identity.json");

        let identity = Identity::generate("Test Device".to_string()).unwrap();
        let other = Identity::generate("Other".to_string()).unwrap();

        let data = IdentityData {
            peer_id: other.peer_id.clone(),
            name: identity.name.clone(),
            created_at: identity.created_at,
            secret_key_hex: hex::encode(identity.secret_key.to_bytes()),
        };
        std::fs::write(&identity_path, serde_json::to_string(&data).unwrap()).unwrap();

        assert!(matches!(
            Identity::load_from_file(&identity_path),
            Err(Error::Identity(_))
        ));
    }
}
