//! Persistent settings: the Gemini API key in the OS credential store, system
//! instructions and named instruction presets in a JSON document.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const KEYRING_SERVICE: &str = "com.spotlight.app";
const API_KEY_ACCOUNT: &str = "GEMINI_API_KEY";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("credential store error: {0}")]
    Secret(String),
    #[error("failed to access settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("settings file is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("preset name must not be empty")]
    EmptyPresetName,
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

/// Where secrets live. The desktop build uses the OS keyring.
pub trait SecretStore: Send + Sync {
    fn get(&self) -> Result<Option<String>, SettingsError>;
    fn set(&self, value: &str) -> Result<(), SettingsError>;
    fn clear(&self) -> Result<(), SettingsError>;
}

pub struct KeyringSecret {
    service: String,
    account: String,
}

impl Default for KeyringSecret {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE, API_KEY_ACCOUNT)
    }
}

impl KeyringSecret {
    pub fn new(service: &str, account: &str) -> Self {
        Self {
            service: service.to_string(),
            account: account.to_string(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, SettingsError> {
        keyring::Entry::new(&self.service, &self.account).map_err(|e| SettingsError::Secret(e.to_string()))
    }
}

impl SecretStore for KeyringSecret {
    fn get(&self) -> Result<Option<String>, SettingsError> {
        match self.entry()?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(SettingsError::Secret(e.to_string())),
        }
    }

    fn set(&self, value: &str) -> Result<(), SettingsError> {
        self.entry()?
            .set_password(value)
            .map_err(|e| SettingsError::Secret(e.to_string()))
    }

    fn clear(&self) -> Result<(), SettingsError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(SettingsError::Secret(e.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstructionPreset {
    pub id: String,
    pub name: String,
    pub instructions: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    system_instructions: Option<String>,
    #[serde(default)]
    presets: Vec<InstructionPreset>,
}

pub struct SettingsStore {
    path: PathBuf,
    secret: Box<dyn SecretStore>,
    fallback_api_key: Option<String>,
    // serialises read-modify-write cycles on the document
    lock: Mutex<()>,
}

impl SettingsStore {
    pub fn new(dir: &Path, secret: Box<dyn SecretStore>, fallback_api_key: Option<String>) -> Self {
        Self {
            path: dir.join(SETTINGS_FILE),
            secret,
            fallback_api_key,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stored key, else the environment fallback.
    pub fn api_key(&self) -> Result<Option<String>, SettingsError> {
        let stored = self.secret.get()?.filter(|k| !k.trim().is_empty());
        Ok(stored.or_else(|| self.fallback_api_key.clone()))
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), SettingsError> {
        let key = key.trim();
        if key.is_empty() {
            return self.clear_api_key();
        }
        self.secret.set(key)?;
        log::info!("[settings] API key saved");
        Ok(())
    }

    pub fn clear_api_key(&self) -> Result<(), SettingsError> {
        self.secret.clear()?;
        log::info!("[settings] API key cleared");
        Ok(())
    }

    pub fn system_instructions(&self) -> Result<Option<String>, SettingsError> {
        let _guard = self.lock();
        Ok(self.read()?.system_instructions)
    }

    pub fn set_system_instructions(&self, instructions: &str) -> Result<(), SettingsError> {
        let instructions = instructions.trim();
        let _guard = self.lock();
        let mut doc = self.read()?;
        doc.system_instructions = (!instructions.is_empty()).then(|| instructions.to_string());
        self.write(&doc)
    }

    pub fn clear_system_instructions(&self) -> Result<(), SettingsError> {
        let _guard = self.lock();
        let mut doc = self.read()?;
        doc.system_instructions = None;
        self.write(&doc)
    }

    /// Presets, most recently updated first.
    pub fn presets(&self) -> Result<Vec<InstructionPreset>, SettingsError> {
        let _guard = self.lock();
        // stored in touch order, so position breaks timestamp ties
        let mut presets: Vec<_> = self.read()?.presets.into_iter().enumerate().collect();
        presets.sort_by(|(ia, a), (ib, b)| b.updated_at.cmp(&a.updated_at).then(ib.cmp(ia)));
        Ok(presets.into_iter().map(|(_, p)| p).collect())
    }

    /// Create a preset, or update the one with `id`.
    pub fn save_preset(
        &self,
        id: Option<&str>,
        name: &str,
        instructions: &str,
    ) -> Result<InstructionPreset, SettingsError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SettingsError::EmptyPresetName);
        }
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let _guard = self.lock();
        let mut doc = self.read()?;
        let preset = match id {
            Some(id) => {
                let index = doc
                    .presets
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or_else(|| SettingsError::UnknownPreset(id.to_string()))?;
                let mut preset = doc.presets.remove(index);
                preset.name = name.to_string();
                preset.instructions = instructions.to_string();
                preset.updated_at = updated_at;
                doc.presets.push(preset.clone());
                preset
            }
            None => {
                let preset = InstructionPreset {
                    id: Uuid::new_v4().to_string(),
                    name: name.to_string(),
                    instructions: instructions.to_string(),
                    updated_at,
                };
                doc.presets.push(preset.clone());
                preset
            }
        };
        self.write(&doc)?;
        log::info!("[settings] saved preset {} ({})", preset.name, preset.id);
        Ok(preset)
    }

    pub fn delete_preset(&self, id: &str) -> Result<(), SettingsError> {
        let _guard = self.lock();
        let mut doc = self.read()?;
        let before = doc.presets.len();
        doc.presets.retain(|p| p.id != id);
        if doc.presets.len() == before {
            return Err(SettingsError::UnknownPreset(id.to_string()));
        }
        self.write(&doc)?;
        log::info!("[settings] deleted preset {id}");
        Ok(())
    }

    fn read(&self) -> Result<SettingsDocument, SettingsError> {
        match fs::read_to_string(&self.path) {
            Ok(raw) if raw.trim().is_empty() => Ok(SettingsDocument::default()),
            Ok(raw) => Ok(serde_json::from_str(&raw)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SettingsDocument::default()),
            Err(source) => Err(self.io_error(source)),
        }
    }

    // write to a sibling temp file then rename over the original
    fn write(&self, doc: &SettingsDocument) -> Result<(), SettingsError> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).map_err(|e| self.io_error(e))?;
        }
        let raw = serde_json::to_string_pretty(doc)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| self.io_error(e))?;
        fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))
    }

    fn io_error(&self, source: io::Error) -> SettingsError {
        SettingsError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
