//! Size, visibility, focus and entrance animation of the primary window.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;

use crate::capabilities::{CapabilityResult, PrimaryWindow, TraySync, WindowSize};

pub const COLLAPSED_SIZE: WindowSize = WindowSize::new(700.0, 130.0);
pub const EXPANDED_SIZE: WindowSize = WindowSize::new(700.0, 600.0);

/// Extra height for native title-bar chrome on the offset platform class.
pub const PLATFORM_HEIGHT_OFFSET: f64 = 50.0;

/// Delay before the text input is focused again after a show.
pub const INPUT_REFOCUS_DELAY: Duration = Duration::from_millis(100);

// one frame at 60Hz
const ANIMATION_FRAME_DELAY: Duration = Duration::from_millis(16);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlatformClass {
    Windows,
    Other,
}

impl PlatformClass {
    pub fn detect() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Other
        }
    }

    pub fn height_offset(self) -> f64 {
        match self {
            Self::Windows => PLATFORM_HEIGHT_OFFSET,
            Self::Other => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowConfig {
    pub collapsed: WindowSize,
    pub expanded: WindowSize,
    pub height_offset: f64,
    pub frame_delay: Duration,
    pub refocus_delay: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self::for_platform(PlatformClass::detect())
    }
}

impl WindowConfig {
    pub fn for_platform(platform: PlatformClass) -> Self {
        Self {
            collapsed: COLLAPSED_SIZE,
            expanded: EXPANDED_SIZE,
            height_offset: platform.height_offset(),
            frame_delay: ANIMATION_FRAME_DELAY,
            refocus_delay: INPUT_REFOCUS_DELAY,
        }
    }

    pub fn size_for(&self, expanded: bool) -> WindowSize {
        let base = if expanded { self.expanded } else { self.collapsed };
        WindowSize::new(base.width, base.height + self.height_offset)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowVisibilityState {
    pub visible: bool,
    pub expanded: bool,
    pub animating: bool,
}

pub struct WindowVisibilityController {
    window: Arc<dyn PrimaryWindow>,
    tray: Arc<dyn TraySync>,
    config: WindowConfig,
    state: Mutex<WindowVisibilityState>,
}

impl WindowVisibilityController {
    pub fn new(
        window: Arc<dyn PrimaryWindow>,
        tray: Arc<dyn TraySync>,
        config: WindowConfig,
    ) -> Self {
        Self {
            window,
            tray,
            config,
            state: Mutex::new(WindowVisibilityState::default()),
        }
    }

    pub fn state(&self) -> WindowVisibilityState {
        *self.lock()
    }

    fn lock(&self) -> MutexGuard<'_, WindowVisibilityState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Reads visibility from the window itself; it can be hidden behind our back
    /// (focus loss, native close button).
    async fn refresh_visibility(&self) -> CapabilityResult<bool> {
        let visible = self.window.is_visible().await?;
        let mut state = self.lock();
        if state.visible != visible {
            log::debug!("[window] visibility drifted to {visible}, resyncing");
            state.visible = visible;
            if !visible {
                state.expanded = false;
                state.animating = false;
            }
        }
        Ok(visible)
    }

    pub async fn toggle(&self, has_history: bool) -> CapabilityResult<()> {
        if self.refresh_visibility().await? {
            self.hide().await
        } else {
            self.show(has_history).await
        }
    }

    pub async fn show(&self, has_history: bool) -> CapabilityResult<()> {
        if self.refresh_visibility().await? {
            log::debug!("[window] already visible, refocusing");
            self.window.set_focus().await?;
            return self.window.focus_input().await;
        }

        let expanded = has_history;
        let size = self.config.size_for(expanded);
        log::info!(
            "[window] show: {}x{} (expanded={expanded})",
            size.width,
            size.height
        );

        self.window.set_size(size).await?;
        self.window.show().await?;
        // mapped from here on, whatever happens to focus
        *self.lock() = WindowVisibilityState {
            visible: true,
            expanded,
            animating: false,
        };
        self.sync_tray(true).await;
        self.window.set_focus().await?;

        // entrance animation starts on the frame after the window is mapped
        tokio::time::sleep(self.config.frame_delay).await;
        if !self.lock().visible {
            return Ok(());
        }
        self.lock().animating = true;
        if let Err(e) = self.window.set_animating(true).await {
            log::warn!("[window] failed to start entrance animation: {e}");
        }

        tokio::time::sleep(self.config.refocus_delay).await;
        if self.lock().visible {
            self.window.focus_input().await?;
        }
        Ok(())
    }

    pub async fn hide(&self) -> CapabilityResult<()> {
        if !self.refresh_visibility().await? {
            log::debug!("[window] already hidden");
            return Ok(());
        }

        // no exit animation: drop the flag before anything else happens
        self.lock().animating = false;
        if let Err(e) = self.window.set_animating(false).await {
            log::warn!("[window] failed to clear animation flag: {e}");
        }

        log::info!("[window] hide");
        self.window.hide().await?;
        {
            let mut state = self.lock();
            state.visible = false;
            state.expanded = false;
        }

        self.sync_tray(false).await;
        Ok(())
    }

    /// Resize for the given expansion without touching visibility or focus.
    pub async fn adjust_size(&self, expanded: bool) -> CapabilityResult<()> {
        let size = self.config.size_for(expanded);
        self.window.set_size(size).await?;
        self.lock().expanded = expanded;
        Ok(())
    }

    pub async fn expand_if_collapsed(&self) -> CapabilityResult<()> {
        if self.lock().expanded {
            return Ok(());
        }
        log::debug!("[window] expanding for chat");
        self.adjust_size(true).await
    }

    pub async fn clear_animation(&self) -> CapabilityResult<()> {
        self.lock().animating = false;
        self.window.set_animating(false).await
    }

    async fn sync_tray(&self, visible: bool) {
        if let Err(e) = self.tray.sync_tray_visibility(visible).await {
            log::warn!("[window] tray sync failed (visible={visible}): {e}");
        }
    }
}
