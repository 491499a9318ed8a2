//! Background software update lifecycle.
//!
//! ```text
//! Idle -> Checking -> Idle | Available | Error
//! Available -> Idle (dismiss) | Installing (confirm)
//! Installing -> Installed | Error
//! Installed -> Idle (after the success banner has been shown)
//! Error -> Idle (dismiss) | Checking (manual retry)
//! ```
//!
//! One instance serves both the startup check and the manual check from the
//! settings window, so a check only starts from `Idle` or `Error`. An offered
//! update stays offered until it is installed or dismissed. Nothing here can
//! affect chat or window handling; the only output is a status snapshot
//! pushed to the banner.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// How long the "installed" banner stays up before the state returns to idle.
pub const INSTALLED_DISPLAY: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateState {
    Idle,
    Checking,
    Available,
    Installing,
    Installed,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateInfo {
    pub version: String,
    pub body: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatus {
    pub state: UpdateState,
    pub info: Option<UpdateInfo>,
    pub error: Option<String>,
}

impl UpdateStatus {
    fn idle() -> Self {
        Self {
            state: UpdateState::Idle,
            info: None,
            error: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UpdateError {
    #[error("no update manifest published: {0}")]
    ManifestUnavailable(String),
    #[error("update server unreachable: {0}")]
    Network(String),
    #[error("{0}")]
    Other(String),
}

impl UpdateError {
    /// Map an updater failure description onto the expected/unexpected split.
    pub fn from_description(description: impl Into<String>) -> Self {
        let description = description.into();
        let d = description.to_lowercase();
        if d.contains("release json") || d.contains("404") || d.contains("not found") {
            Self::ManifestUnavailable(description)
        } else if [
            "error sending request",
            "network",
            "connect",
            "dns",
            "timed out",
            "unreachable",
        ]
        .iter()
        .any(|marker| d.contains(marker))
        {
            Self::Network(description)
        } else {
            Self::Other(description)
        }
    }

    /// Expected conditions are reported as "no update" rather than as errors.
    pub fn is_expected(&self) -> bool {
        matches!(self, Self::ManifestUnavailable(_) | Self::Network(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckTrigger {
    Startup,
    Manual,
}

#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// `None` when the running version is current.
    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError>;
    /// Download and install whatever the last successful check found.
    async fn download_and_install(&self) -> Result<(), UpdateError>;
}

/// Receives every state change, e.g. to drive the update banner.
pub trait UpdateObserver: Send + Sync {
    fn status_changed(&self, status: &UpdateStatus);
}

pub struct UpdateLifecycleController {
    source: Arc<dyn UpdateSource>,
    observer: Arc<dyn UpdateObserver>,
    status: Mutex<UpdateStatus>,
    installed_display: Duration,
}

impl UpdateLifecycleController {
    pub fn new(source: Arc<dyn UpdateSource>, observer: Arc<dyn UpdateObserver>) -> Self {
        Self {
            source,
            observer,
            status: Mutex::new(UpdateStatus::idle()),
            installed_display: INSTALLED_DISPLAY,
        }
    }

    fn lock(&self) -> MutexGuard<'_, UpdateStatus> {
        self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn status(&self) -> UpdateStatus {
        self.lock().clone()
    }

    fn transition(&self, next: UpdateStatus) {
        {
            let mut status = self.lock();
            log::info!("[update] {:?} -> {:?}", status.state, next.state);
            *status = next.clone();
        }
        self.observer.status_changed(&next);
    }

    /// Move to `next` only if the current state passes `allowed`; otherwise
    /// hand back the unchanged snapshot.
    fn transition_from(
        &self,
        allowed: impl Fn(&UpdateStatus) -> bool,
        next: impl FnOnce(&UpdateStatus) -> UpdateStatus,
    ) -> Result<UpdateStatus, UpdateStatus> {
        let next = {
            let mut status = self.lock();
            if !allowed(&status) {
                return Err(status.clone());
            }
            let next = next(&status);
            log::info!("[update] {:?} -> {:?}", status.state, next.state);
            *status = next.clone();
            next
        };
        self.observer.status_changed(&next);
        Ok(next)
    }

    pub async fn check(&self, trigger: CheckTrigger) -> UpdateStatus {
        let started = self.transition_from(
            |s| matches!(s.state, UpdateState::Idle | UpdateState::Error),
            |_| UpdateStatus {
                state: UpdateState::Checking,
                info: None,
                error: None,
            },
        );
        if let Err(current) = started {
            log::debug!("[update] {trigger:?} check ignored while {:?}", current.state);
            return current;
        }

        let next = match self.source.check().await {
            Ok(None) => {
                log::info!("[update] running the latest version");
                UpdateStatus::idle()
            }
            Ok(Some(info)) => {
                log::info!("[update] version {} available", info.version);
                UpdateStatus {
                    state: UpdateState::Available,
                    info: Some(info),
                    error: None,
                }
            }
            Err(e) if e.is_expected() => {
                log::info!("[update] check skipped: {e}");
                UpdateStatus::idle()
            }
            Err(e) => match trigger {
                CheckTrigger::Manual => UpdateStatus {
                    state: UpdateState::Error,
                    info: None,
                    error: Some(e.to_string()),
                },
                CheckTrigger::Startup => {
                    log::warn!("[update] startup check failed: {e}");
                    UpdateStatus::idle()
                }
            },
        };

        self.transition(next.clone());
        next
    }

    /// Throw away an offered update or an error banner.
    pub fn dismiss(&self) -> UpdateStatus {
        self.transition_from(
            |s| matches!(s.state, UpdateState::Available | UpdateState::Error),
            |_| UpdateStatus::idle(),
        )
        .unwrap_or_else(|current| {
            log::debug!("[update] dismiss ignored in {:?}", current.state);
            current
        })
    }

    /// Install the offered update. Only valid from `Available`.
    pub async fn install(self: &Arc<Self>) -> UpdateStatus {
        let started = self.transition_from(
            |s| s.state == UpdateState::Available,
            |s| UpdateStatus {
                state: UpdateState::Installing,
                info: s.info.clone(),
                error: None,
            },
        );
        let info = match started {
            Ok(installing) => installing.info,
            Err(current) => {
                log::debug!("[update] install ignored in {:?}", current.state);
                return current;
            }
        };

        match self.source.download_and_install().await {
            Ok(()) => {
                self.transition(UpdateStatus {
                    state: UpdateState::Installed,
                    info,
                    error: None,
                });
                self.schedule_reset();
            }
            Err(e) => {
                log::error!("[update] install failed: {e}");
                self.transition(UpdateStatus {
                    state: UpdateState::Error,
                    info: None,
                    error: Some(e.to_string()),
                });
            }
        }
        self.status()
    }

    fn schedule_reset(self: &Arc<Self>) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(this.installed_display).await;
            if let Err(current) = this.transition_from(
                |s| s.state == UpdateState::Installed,
                |_| UpdateStatus::idle(),
            ) {
                log::debug!("[update] installed banner already gone: {:?}", current.state);
            }
        });
    }
}
