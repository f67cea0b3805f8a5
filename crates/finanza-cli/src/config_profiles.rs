//! Named connection profiles for the CLI.
//!
//! A profile points at one Supabase project, names the user whose records
//! are read and written, and may pin the local cache to a file. Profiles
//! live in `<config dir>/finanza/profiles.json`; environment variables
//! override stored values when a profile is resolved.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use finanza_core::util::{is_http_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const PROFILES_FILE_NAME: &str = "profiles.json";
const DEFAULT_PROFILE: &str = "default";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProfileFile {
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_anon_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Local cache file; the platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}

/// First non-empty value of an environment variable
pub fn env_text(name: &str) -> Option<String> {
    normalize_text_option(std::env::var(name).ok())
}

impl ProfileFile {
    pub fn default_path() -> Result<PathBuf, String> {
        dirs::config_dir()
            .map(|dir| dir.join("finanza").join(PROFILES_FILE_NAME))
            .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
    }

    pub fn load() -> Result<Self, String> {
        Self::load_from(&Self::default_path()?)
    }

    /// Read profiles from `path`; a missing file yields no profiles.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(error) => {
                return Err(format!(
                    "Failed to read profiles at {}: {error}",
                    path.display()
                ))
            }
        };
        let mut file = serde_json::from_str::<Self>(&raw).map_err(|error| {
            format!("Failed to parse profiles at {}: {error}", path.display())
        })?;
        file.active_profile = normalize_text_option(file.active_profile.take());
        for profile in file.profiles.values_mut() {
            profile.trim();
        }
        Ok(file)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = Self::default_path()?;
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!("Failed to create {}: {error}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(self)
            .map_err(|error| format!("Failed to serialize profiles: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write profiles at {}: {error}", path.display()))
    }

    /// Profile to use: the explicit name, then `FINANZA_PROFILE`, then the
    /// active profile, then `default`.
    pub fn resolve_name(&self, explicit: Option<&str>) -> String {
        normalize_text_option(explicit.map(str::to_string))
            .or_else(|| env_text("FINANZA_PROFILE"))
            .or_else(|| self.active_profile.clone())
            .unwrap_or_else(|| DEFAULT_PROFILE.to_string())
    }

    /// Stored values of `name` with environment overrides applied
    pub fn effective(&self, name: &str) -> Profile {
        self.profiles
            .get(name)
            .cloned()
            .unwrap_or_default()
            .with_env_overrides()
    }

    pub fn entry(&mut self, name: &str) -> &mut Profile {
        self.profiles.entry(name.to_string()).or_default()
    }
}

impl Profile {
    fn trim(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.user_id = normalize_text_option(self.user_id.take());
        self.db_path = self
            .db_path
            .take()
            .filter(|path| !path.as_os_str().is_empty());
    }

    /// Apply `SUPABASE_URL`, `SUPABASE_ANON_KEY`, `FINANZA_USER_ID` and
    /// `FINANZA_DB_PATH` over the stored values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        self.trim();
        if let Some(url) = env_text("SUPABASE_URL") {
            self.supabase_url = Some(url);
        }
        if let Some(key) = env_text("SUPABASE_ANON_KEY") {
            self.supabase_anon_key = Some(key);
        }
        if let Some(user_id) = env_text("FINANZA_USER_ID") {
            self.user_id = Some(user_id);
        }
        if let Some(path) = env_text("FINANZA_DB_PATH") {
            self.db_path = Some(PathBuf::from(path));
        }
        self
    }

    /// Settings a session cannot start without
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("supabase_url", self.supabase_url.is_none()),
            ("supabase_anon_key", self.supabase_anon_key.is_none()),
            ("user_id", self.user_id.is_none()),
        ]
        .into_iter()
        .filter_map(|(name, missing)| missing.then_some(name))
        .collect()
    }

    pub fn validate(&self) -> Result<(), String> {
        match &self.supabase_url {
            Some(url) if !is_http_url(url) => {
                Err("supabase_url must include http:// or https://".to_string())
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn profiles_survive_a_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PROFILES_FILE_NAME);

        let mut file = ProfileFile {
            active_profile: Some("casa".to_string()),
            profiles: BTreeMap::new(),
        };
        *file.entry("casa") = Profile {
            supabase_url: Some("https://project.supabase.co".to_string()),
            supabase_anon_key: Some("anon-key".to_string()),
            user_id: None,
            db_path: Some(PathBuf::from("/var/lib/finanza/casa.db")),
        };

        file.save_to(&path).unwrap();
        let loaded = ProfileFile::load_from(&path).unwrap();
        assert_eq!(loaded, file);
        assert!(!std::fs::read_to_string(&path).unwrap().contains("user_id"));
    }

    #[test]
    fn loading_trims_hand_edited_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PROFILES_FILE_NAME);
        std::fs::write(
            &path,
            r#"{"active_profile": " casa ", "profiles": {"casa": {"user_id": "  ", "supabase_url": " https://x.supabase.co "}}}"#,
        )
        .unwrap();

        let loaded = ProfileFile::load_from(&path).unwrap();
        assert_eq!(loaded.active_profile.as_deref(), Some("casa"));
        let profile = &loaded.profiles["casa"];
        assert_eq!(profile.user_id, None);
        assert_eq!(profile.supabase_url.as_deref(), Some("https://x.supabase.co"));
    }

    #[test]
    fn missing_file_loads_no_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = ProfileFile::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded, ProfileFile::default());
    }

    #[test]
    fn explicit_profile_name_wins() {
        let file = ProfileFile {
            active_profile: Some("trabalho".to_string()),
            profiles: BTreeMap::new(),
        };
        assert_eq!(file.resolve_name(Some(" casa ")), "casa");
    }

    #[test]
    fn missing_fields_and_url_validation() {
        let profile = Profile {
            supabase_url: Some("project.supabase.co".to_string()),
            ..Profile::default()
        };
        assert_eq!(
            profile.missing_fields(),
            vec!["supabase_anon_key", "user_id"]
        );
        assert!(profile.validate().is_err());
        assert!(Profile::default().validate().is_ok());
    }
}
