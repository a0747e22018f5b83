use anyhow::{Context, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::fs::{create_dir_all, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SettingsHandle {
    path: PathBuf,
    settings: Arc<RwLock<Settings>>,
}

impl SettingsHandle {
    pub async fn load(path: PathBuf) -> Result<SettingsHandle> {
        let settings = Settings::read(&path)?;
        let handle = SettingsHandle {
            path,
            settings: Arc::new(RwLock::new(settings)),
        };
        handle.save().await;
        Ok(handle)
    }

    pub async fn save(&self) {
        let settings = self.settings.read().await;
        if let Err(e) = settings.write(&self.path) {
            error!(
                "Couldn't save settings to {}: {}",
                self.path.to_string_lossy(),
                e
            );
        }
    }

    pub async fn get_verbose_logging(&self) -> bool {
        self.settings.read().await.verbose_logging.unwrap_or(false)
    }

    pub async fn set_verbose_logging(&self, enabled: bool) {
        self.settings.write().await.verbose_logging = Some(enabled);
    }

    pub async fn get_last_device(&self) -> Option<String> {
        self.settings.read().await.last_device.clone()
    }

    pub async fn set_last_device(&self, device: String) {
        self.settings.write().await.last_device = Some(device);
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    verbose_logging: Option<bool>,
    last_device: Option<String>,
}

impl Settings {
    pub fn read(path: &Path) -> Result<Settings> {
        match File::open(path) {
            Ok(reader) => serde_json::from_reader(reader).context(format!(
                "Could not parse daemon settings file at {}",
                path.to_string_lossy()
            )),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Settings::default()),
            Err(error) => Err(error).context(format!(
                "Could not open daemon settings file for reading at {}",
                path.to_string_lossy()
            )),
        }
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if let Err(e) = create_dir_all(parent) {
                if e.kind() != ErrorKind::AlreadyExists {
                    return Err(e).context(format!(
                        "Could not create settings directory at {}",
                        parent.to_string_lossy()
                    ))?;
                }
            }
        }
        let writer = File::create(path).context(format!(
            "Could not open daemon settings file for writing at {}",
            path.to_string_lossy()
        ))?;
        serde_json::to_writer_pretty(writer, self).context(format!(
            "Could not write to daemon settings file at {}",
            path.to_string_lossy()
        ))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = SettingsHandle::load(path.clone()).await.unwrap();
        assert!(path.exists());
        assert!(!settings.get_verbose_logging().await);
        assert_eq!(settings.get_last_device().await, None);
    }

    #[tokio::test]
    async fn values_survive_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = SettingsHandle::load(path.clone()).await.unwrap();
        settings.set_verbose_logging(true).await;
        settings
            .set_last_device(String::from("Anyma uDMX (VID:16C0 PID:05DC)"))
            .await;
        settings.save().await;

        let reloaded = SettingsHandle::load(path).await.unwrap();
        assert!(reloaded.get_verbose_logging().await);
        assert_eq!(
            reloaded.get_last_device().await.as_deref(),
            Some("Anyma uDMX (VID:16C0 PID:05DC)")
        );
    }

    #[test]
    fn broken_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(Settings::read(&path).is_err());
    }
}
