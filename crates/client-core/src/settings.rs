use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pace requested from the job service for the automation itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Slow,
    Fast,
}

/// Persisted client defaults. Every field is optional; flags and environment win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSettings {
    #[serde(default)]
    pub backend_url: Option<String>,
    #[serde(default)]
    pub speed: Option<Speed>,
    #[serde(default)]
    pub poll_interval_ms: Option<u64>,
}

impl ClientSettings {
    fn normalize(&mut self) {
        self.backend_url = self.backend_url.as_ref().map(|s| s.trim().to_string());
        if matches!(self.backend_url.as_deref(), Some(s) if s.is_empty()) {
            self.backend_url = None;
        }
        if self.poll_interval_ms == Some(0) {
            self.poll_interval_ms = None;
        }
    }
}

fn xdg_config_home() -> anyhow::Result<PathBuf> {
    if let Some(dir) = std::env::var_os("XDG_CONFIG_HOME") {
        let dir = PathBuf::from(dir);
        if dir.as_os_str().is_empty() {
            anyhow::bail!("XDG_CONFIG_HOME is set but empty");
        }
        return Ok(dir);
    }

    let home = std::env::var_os("HOME").ok_or_else(|| anyhow::anyhow!("HOME is not set"))?;
    let home = PathBuf::from(home);
    if home.as_os_str().is_empty() {
        anyhow::bail!("HOME is set but empty");
    }
    Ok(home.join(".config"))
}

pub fn settings_path() -> anyhow::Result<PathBuf> {
    Ok(xdg_config_home()?.join("nlsub").join("config.json"))
}

pub fn load_settings_from(path: &Path) -> anyhow::Result<Option<ClientSettings>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)?;
    let mut settings: ClientSettings = serde_json::from_str(&raw)?;
    settings.normalize();
    Ok(Some(settings))
}

pub fn save_settings_to(path: &Path, settings: &ClientSettings) -> anyhow::Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid config path: {}", path.display()))?;
    std::fs::create_dir_all(dir)?;

    let mut settings = settings.clone();
    settings.normalize();

    let json = serde_json::to_string_pretty(&settings)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(tmp, path)?;
    Ok(())
}

pub fn load_settings() -> anyhow::Result<Option<ClientSettings>> {
    load_settings_from(&settings_path()?)
}

pub fn save_settings(settings: &ClientSettings) -> anyhow::Result<()> {
    save_settings_to(&settings_path()?, settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "nlsub-settings-{tag}-{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn missing_file_is_not_an_error() {
        let dir = scratch_dir("missing");
        assert_eq!(load_settings_from(&dir.join("config.json")).unwrap(), None);
    }

    #[test]
    fn save_then_load_normalizes_fields() {
        let dir = scratch_dir("roundtrip");
        let path = dir.join("nested").join("config.json");
        let settings = ClientSettings {
            backend_url: Some("  http://10.0.0.5:8000  ".to_string()),
            speed: Some(Speed::Fast),
            poll_interval_ms: Some(0),
        };
        save_settings_to(&path, &settings).unwrap();

        let loaded = load_settings_from(&path).unwrap().unwrap();
        assert_eq!(loaded.backend_url.as_deref(), Some("http://10.0.0.5:8000"));
        assert_eq!(loaded.speed, Some(Speed::Fast));
        assert_eq!(loaded.poll_interval_ms, None);
        assert!(!path.with_extension("json.tmp").exists());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = scratch_dir("corrupt");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_settings_from(&path).is_err());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
