//! Capability implementations on top of Tauri windows, the tray and the event bus.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tauri::menu::MenuItem;
use tauri::{AppHandle, Emitter, LogicalSize, Manager, WebviewUrl, WebviewWindow, WebviewWindowBuilder, Wry};

use super::capture;
use super::{MAIN_WINDOW, SETTINGS_WINDOW};
use crate::capabilities::{
    CapabilityError, CapabilityResult, ChatHost, PrimaryWindow, TraySync, WindowSize,
};
use crate::events::{ANIMATE, CHAT_UPDATED, CLEAR_INPUT, FOCUS_INPUT};
use crate::message::ConversationSnapshot;
use crate::window::WindowVisibilityController;

fn failed(e: tauri::Error) -> CapabilityError {
    CapabilityError::new(e.to_string())
}

fn emit_to_main<S: Serialize + Clone>(app: &AppHandle, event: &str, payload: S) -> CapabilityResult<()> {
    app.emit_to(MAIN_WINDOW, event, payload).map_err(failed)
}

pub struct TauriWindow {
    app: AppHandle,
}

impl TauriWindow {
    pub fn new(app: AppHandle) -> Self {
        Self { app }
    }

    fn window(&self) -> CapabilityResult<WebviewWindow> {
        self.app
            .get_webview_window(MAIN_WINDOW)
            .ok_or_else(|| CapabilityError::new("main window not found"))
    }
}

#[async_trait]
impl PrimaryWindow for TauriWindow {
    async fn is_visible(&self) -> CapabilityResult<bool> {
        self.window()?.is_visible().map_err(failed)
    }

    async fn set_size(&self, size: WindowSize) -> CapabilityResult<()> {
        self.window()?
            .set_size(LogicalSize::new(size.width, size.height))
            .map_err(failed)
    }

    async fn show(&self) -> CapabilityResult<()> {
        let window = self.window()?;
        window.center().map_err(failed)?;
        window.show().map_err(failed)
    }

    async fn hide(&self) -> CapabilityResult<()> {
        self.window()?.hide().map_err(failed)
    }

    async fn set_focus(&self) -> CapabilityResult<()> {
        self.window()?.set_focus().map_err(failed)
    }

    async fn set_animating(&self, animating: bool) -> CapabilityResult<()> {
        emit_to_main(&self.app, ANIMATE, json!({ "animating": animating }))
    }

    async fn focus_input(&self) -> CapabilityResult<()> {
        emit_to_main(&self.app, FOCUS_INPUT, ())
    }
}

/// Keeps the tray's Show/Hide item label in step with the overlay.
pub struct TauriTray {
    toggle_item: MenuItem<Wry>,
}

impl TauriTray {
    pub fn new(toggle_item: MenuItem<Wry>) -> Self {
        Self { toggle_item }
    }
}

pub fn toggle_label(visible: bool) -> &'static str {
    if visible {
        "Hide Spotlight"
    } else {
        "Show Spotlight"
    }
}

#[async_trait]
impl TraySync for TauriTray {
    async fn sync_tray_visibility(&self, visible: bool) -> CapabilityResult<()> {
        self.toggle_item.set_text(toggle_label(visible)).map_err(failed)
    }
}

pub struct TauriChatHost {
    app: AppHandle,
    window: Arc<WindowVisibilityController>,
}

impl TauriChatHost {
    pub fn new(app: AppHandle, window: Arc<WindowVisibilityController>) -> Self {
        Self { app, window }
    }
}

#[async_trait]
impl ChatHost for TauriChatHost {
    async fn capture_screen(&self) -> CapabilityResult<String> {
        capture_under_overlay(&self.app).await
    }

    async fn open_api_settings_window(&self) -> CapabilityResult<()> {
        open_settings_window(&self.app).map_err(failed)
    }

    async fn expand_window(&self) -> CapabilityResult<()> {
        self.window.expand_if_collapsed().await
    }

    async fn clear_input(&self) -> CapabilityResult<()> {
        emit_to_main(&self.app, CLEAR_INPUT, ())
    }

    fn conversation_changed(&self, snapshot: &ConversationSnapshot) {
        if let Err(e) = self.app.emit_to(MAIN_WINDOW, CHAT_UPDATED, snapshot) {
            log::warn!("[chat] failed to publish conversation: {e}");
        }
    }
}

/// Screenshot of whatever the overlay is covering.
pub async fn capture_under_overlay(app: &AppHandle) -> CapabilityResult<String> {
    let overlay = app
        .get_webview_window(MAIN_WINDOW)
        .and_then(|window| capture::overlay_window_id(&window));
    tauri::async_runtime::spawn_blocking(move || capture::capture_screen(overlay))
        .await
        .map_err(failed)?
        .map_err(|e| CapabilityError::new(e.to_string()))
}

/// Focus the settings window, creating it on first use.
pub fn open_settings_window(app: &AppHandle) -> tauri::Result<()> {
    if let Some(window) = app.get_webview_window(SETTINGS_WINDOW) {
        window.show()?;
        return window.set_focus();
    }

    log::info!("[settings] opening settings window");
    let window = WebviewWindowBuilder::new(app, SETTINGS_WINDOW, WebviewUrl::App("settings.html".into()))
        .title("Spotlight Settings")
        .inner_size(520.0, 640.0)
        .resizable(false)
        .center()
        .build()?;
    window.set_focus()
}

pub fn close_settings_window(app: &AppHandle) -> tauri::Result<()> {
    match app.get_webview_window(SETTINGS_WINDOW) {
        Some(window) => window.close(),
        None => Ok(()),
    }
}
