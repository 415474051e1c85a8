//! Configuration loading: the on-disk TOML file plus the user-identity
//! derivation the caller needs before it can build a `SessionIdentity`.
//!
//! Decoupled from the core session constructors on purpose — they take
//! plain validated values, not a `Config`, so the core stays usable from
//! tests and other front ends without touching the filesystem.

use std::fs;
use std::path::PathBuf;

use base64::Engine;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::crypto::EncryptionMode;
use crate::error::{Result, VoiceError};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub user: UserConfig,
    pub voice: VoiceConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// The raw authentication token. Never logged.
    pub token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Set for a guild voice channel; absent for a DM call.
    pub guild_id: Option<String>,
    pub channel_id: String,
    pub preferred_region: Option<String>,
    /// Wire name understood by `EncryptionMode::parse`.
    #[serde(default = "default_encryption_mode")]
    pub encryption_mode: String,
}

fn default_encryption_mode() -> String {
    EncryptionMode::Lite.wire_name().to_string()
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            guild_id: None,
            channel_id: String::new(),
            preferred_region: None,
            encryption_mode: default_encryption_mode(),
        }
    }
}

impl Config {
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "voicebridge", "voicebridge")
            .ok_or_else(|| VoiceError::Config("could not determine config directory".to_string()))?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;

        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)
            .map_err(|err| VoiceError::Config(format!("failed to read config file: {err}")))?;
        toml::from_str(&content).map_err(|err| VoiceError::Config(format!("failed to parse config file: {err}")))
    }

    pub fn save(&self) -> Result<()> {
        let dir = Self::config_dir()?;
        fs::create_dir_all(&dir)
            .map_err(|err| VoiceError::Config(format!("failed to create config directory: {err}")))?;

        let path = Self::config_path()?;
        let content = toml::to_string_pretty(self)
            .map_err(|err| VoiceError::Config(format!("failed to serialize config: {err}")))?;
        fs::write(&path, content).map_err(|err| VoiceError::Config(format!("failed to write config file: {err}")))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&path, perms)
                .map_err(|err| VoiceError::Config(format!("failed to set config permissions: {err}")))?;
        }

        Ok(())
    }

    pub fn encryption_mode(&self) -> Result<EncryptionMode> {
        EncryptionMode::parse(&self.voice.encryption_mode)
    }
}

/// Derive the caller's user ID from the first dot-segment of its token —
/// base64 of the ASCII user ID, re-padded before decoding since tokens carry
/// it unpadded. Bot tokens (prefixed `Bot `) aren't supported; voice
/// sessions authenticate as the user issuing them.
pub fn derive_user_id(token: &str) -> Result<String> {
    if token.starts_with("Bot ") {
        return Err(VoiceError::Config(
            "bot tokens are not supported for voice sessions".to_string(),
        ));
    }

    let first_segment = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| VoiceError::Config("malformed token".to_string()))?;

    let mut padded = first_segment.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }

    let decoded = base64::engine::general_purpose::URL_SAFE
        .decode(&padded)
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(&padded))
        .map_err(|err| VoiceError::Config(format!("malformed token: {err}")))?;

    String::from_utf8(decoded).map_err(|err| VoiceError::Config(format!("malformed token: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_user_id_from_unpadded_segment() {
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode("123456789012345678");
        let token = format!("{encoded}.ts.hmac");
        assert_eq!(derive_user_id(&token).unwrap(), "123456789012345678");
    }

    #[test]
    fn test_derive_user_id_rejects_bot_prefix() {
        assert!(matches!(derive_user_id("Bot abc.def.ghi"), Err(VoiceError::Config(_))));
    }

    #[test]
    fn test_derive_user_id_rejects_malformed_token() {
        assert!(derive_user_id("").is_err());
    }

    #[test]
    fn test_default_encryption_mode_is_lite() {
        let config = Config::default();
        assert_eq!(config.encryption_mode().unwrap(), EncryptionMode::Lite);
    }
}
