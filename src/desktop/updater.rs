use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tauri::{AppHandle, Emitter};
use tauri_plugin_updater::{Update, UpdaterExt};

use crate::events::UPDATE_STATUS;
use crate::update::{UpdateError, UpdateInfo, UpdateObserver, UpdateSource, UpdateStatus};

/// Update source backed by the updater plugin's manifest endpoint.
pub struct TauriUpdateSource {
    app: AppHandle,
    timeout: Duration,
    pending: Mutex<Option<Update>>,
}

impl TauriUpdateSource {
    pub fn new(app: AppHandle, timeout: Duration) -> Self {
        Self {
            app,
            timeout,
            pending: Mutex::new(None),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<Update>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn describe(e: tauri_plugin_updater::Error) -> UpdateError {
    UpdateError::from_description(e.to_string())
}

#[async_trait]
impl UpdateSource for TauriUpdateSource {
    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        let updater = self
            .app
            .updater_builder()
            .timeout(self.timeout)
            .build()
            .map_err(describe)?;
        let update = updater.check().await.map_err(describe)?;

        let info = update.as_ref().map(|u| UpdateInfo {
            version: u.version.clone(),
            body: u.body.clone().unwrap_or_default(),
            date: u.date.map(|d| d.to_string()).unwrap_or_default(),
        });
        *self.pending() = update;
        Ok(info)
    }

    async fn download_and_install(&self) -> Result<(), UpdateError> {
        let Some(update) = self.pending().take() else {
            return Err(UpdateError::Other("No pending update".to_string()));
        };

        let mut downloaded: u64 = 0;
        update
            .download_and_install(
                |chunk, total| {
                    downloaded = downloaded.saturating_add(chunk as u64);
                    log::debug!("[update] downloaded {downloaded} of {total:?} bytes");
                },
                || log::info!("[update] download finished, installing"),
            )
            .await
            .map_err(describe)
    }
}

/// Pushes every status change to all webviews for the banner.
pub struct BannerObserver {
    app: AppHandle,
}

impl BannerObserver {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }
}

impl UpdateObserver for BannerObserver {
    fn status_changed(&self, status: &UpdateStatus) {
        if let Err(e) = self.app.emit(UPDATE_STATUS, status) {
            log::warn!("[update] failed to publish status: {e}");
        }
    }
}
