//! Capability seams between the orchestration core and the native shell.
//!
//! Every side effect the controllers need (moving a window, notifying the tray,
//! grabbing the screen, calling the model) goes through one of these traits.
//! The desktop build implements them on top of Tauri; tests use fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::message::{CompletionRequest, ConversationSnapshot};

/// Failure of an external capability call, carried as its description.
///
/// Classification downstream works on the text, the same way a failed
/// IPC invoke only ever hands back a string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct CapabilityError(pub String);

impl CapabilityError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn description(&self) -> &str {
        &self.0
    }
}

impl From<String> for CapabilityError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for CapabilityError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// Logical window size in points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WindowSize {
    pub width: f64,
    pub height: f64,
}

impl WindowSize {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The primary overlay window plus the webview it hosts.
#[async_trait]
pub trait PrimaryWindow: Send + Sync {
    async fn is_visible(&self) -> CapabilityResult<bool>;
    async fn set_size(&self, size: WindowSize) -> CapabilityResult<()>;
    async fn show(&self) -> CapabilityResult<()>;
    async fn hide(&self) -> CapabilityResult<()>;
    async fn set_focus(&self) -> CapabilityResult<()>;
    /// Tell the webview whether the entrance animation should be playing.
    async fn set_animating(&self, animating: bool) -> CapabilityResult<()>;
    /// Move keyboard focus into the text input inside the webview.
    async fn focus_input(&self) -> CapabilityResult<()>;
}

/// Keeps the tray menu in step with the primary window.
#[async_trait]
pub trait TraySync: Send + Sync {
    async fn sync_tray_visibility(&self, visible: bool) -> CapabilityResult<()>;
}

/// Everything a chat turn may touch outside the conversation itself.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// Base64 PNG of the current screen.
    async fn capture_screen(&self) -> CapabilityResult<String>;
    async fn open_api_settings_window(&self) -> CapabilityResult<()>;
    /// Grow the primary window to its chat size if it is collapsed.
    async fn expand_window(&self) -> CapabilityResult<()>;
    /// Drop whatever is typed in the search box.
    async fn clear_input(&self) -> CapabilityResult<()>;
    /// Push the latest conversation state to the rendering surface.
    fn conversation_changed(&self, snapshot: &ConversationSnapshot);
}

/// The model behind a chat turn. Returns the `{text, sources}` JSON document.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn send_to_gemini(&self, request: CompletionRequest) -> CapabilityResult<String>;
}
