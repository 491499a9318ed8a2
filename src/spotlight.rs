//! Single owner of the controllers and the one place triggers are routed.
//!
//! The hotkey handler, the tray menu and the cross-window listeners all end
//! up in [`Spotlight::toggle`], [`Spotlight::show`] or [`Spotlight::hide`], so
//! every visibility change passes through the same guard regardless of where
//! it came from.

use std::sync::Arc;

use crate::chat::{ChatSessionController, SendOutcome};
use crate::events::CrossWindowEvent;
use crate::toggle_guard::ToggleGuard;
use crate::update::{CheckTrigger, UpdateLifecycleController};
use crate::window::WindowVisibilityController;

pub struct Spotlight {
    guard: ToggleGuard,
    window: Arc<WindowVisibilityController>,
    chat: Arc<ChatSessionController>,
    updates: Arc<UpdateLifecycleController>,
}

impl Spotlight {
    pub fn new(
        guard: ToggleGuard,
        window: Arc<WindowVisibilityController>,
        chat: Arc<ChatSessionController>,
        updates: Arc<UpdateLifecycleController>,
    ) -> Self {
        Self {
            guard,
            window,
            chat,
            updates,
        }
    }

    pub fn window(&self) -> &Arc<WindowVisibilityController> {
        &self.window
    }

    pub fn chat(&self) -> &Arc<ChatSessionController> {
        &self.chat
    }

    pub fn updates(&self) -> &Arc<UpdateLifecycleController> {
        &self.updates
    }

    pub async fn toggle(&self) -> bool {
        self.guard
            .guarded_run("toggle", || self.window.toggle(self.chat.has_history()))
            .await
    }

    pub async fn show(&self) -> bool {
        self.guard
            .guarded_run("show", || self.window.show(self.chat.has_history()))
            .await
    }

    pub async fn hide(&self) -> bool {
        self.guard
            .guarded_run("hide", || self.window.hide())
            .await
    }

    pub async fn handle_event(&self, event: CrossWindowEvent) {
        log::debug!("[spotlight] event {}", event.name());
        match event {
            CrossWindowEvent::Show => {
                self.show().await;
            }
            CrossWindowEvent::Hide => {
                self.hide().await;
            }
            CrossWindowEvent::ApiKeyUpdated { api_key } => self.chat.set_api_key(api_key),
            CrossWindowEvent::SystemInstructionsUpdated {
                system_instructions,
            } => self.chat.set_system_instructions(system_instructions),
            CrossWindowEvent::ResetAnimationState => {
                if let Err(e) = self.window.clear_animation().await {
                    log::warn!("[spotlight] failed to reset animation state: {e}");
                }
            }
        }
    }

    pub async fn send_message(&self, query: &str) -> SendOutcome {
        self.chat.send_message(query).await
    }

    /// Clear the conversation and fall back to the search-box size.
    pub async fn reset_conversation(&self) -> bool {
        if !self.chat.reset_conversation() {
            return false;
        }
        if self.window.state().visible {
            if let Err(e) = self.window.adjust_size(false).await {
                log::warn!("[spotlight] failed to collapse after reset: {e}");
            }
        }
        true
    }

    /// The one automatic update check for this process. Failures never
    /// reach the banner from here.
    pub async fn startup_update_check(&self) {
        let status = self.updates.check(CheckTrigger::Startup).await;
        log::debug!("[spotlight] startup update check finished: {:?}", status.state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::WindowSize;
    use crate::test_support::{
        FakeChatHost, FakeCompletion, FakeTray, FakeUpdateSource, FakeWindow, HostCall,
        RecordingObserver, WindowCall,
    };
    use crate::update::UpdateState;
    use crate::window::{PlatformClass, WindowConfig};
    use std::time::Duration;
    use tokio::time::sleep;

    struct Harness {
        spotlight: Arc<Spotlight>,
        window: Arc<FakeWindow>,
        host: Arc<FakeChatHost>,
        backend: Arc<FakeCompletion>,
    }

    fn harness(backend: FakeCompletion) -> Harness {
        let window = Arc::new(FakeWindow::default());
        let controller = Arc::new(WindowVisibilityController::new(
            window.clone(),
            Arc::new(FakeTray::default()),
            WindowConfig::for_platform(PlatformClass::Other),
        ));
        let backend = Arc::new(backend);
        let host = Arc::new(FakeChatHost::default());
        let chat = Arc::new(ChatSessionController::new(host.clone(), backend.clone()));
        let updates = Arc::new(UpdateLifecycleController::new(
            Arc::new(FakeUpdateSource::current()),
            Arc::new(RecordingObserver::default()),
        ));
        let spotlight = Arc::new(Spotlight::new(ToggleGuard::new(), controller, chat, updates));
        Harness {
            spotlight,
            window,
            host,
            backend,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hotkey_burst_runs_one_toggle() {
        let h = harness(FakeCompletion::default());

        let mut presses = Vec::new();
        for _ in 0..5 {
            let spotlight = h.spotlight.clone();
            presses.push(tokio::spawn(async move { spotlight.toggle().await }));
            sleep(Duration::from_millis(40)).await;
        }
        let mut ran = 0;
        for press in presses {
            if press.await.unwrap() {
                ran += 1;
            }
        }

        assert_eq!(ran, 1);
        assert_eq!(h.window.count(&WindowCall::Show), 1);
        assert_eq!(h.window.count(&WindowCall::Hide), 0);
        assert!(h.window.is_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_share_the_hotkey_guard() {
        let h = harness(FakeCompletion::default());

        let toggle = {
            let spotlight = h.spotlight.clone();
            tokio::spawn(async move { spotlight.toggle().await })
        };
        while !h.window.is_shown() {
            tokio::task::yield_now().await;
        }
        h.spotlight.handle_event(CrossWindowEvent::Hide).await;
        assert!(toggle.await.unwrap());

        assert!(h.window.is_shown());
        assert_eq!(h.window.count(&WindowCall::Hide), 0);

        h.spotlight.handle_event(CrossWindowEvent::Hide).await;
        assert!(!h.window.is_shown());
    }

    #[tokio::test(start_paused = true)]
    async fn test_show_event_routes_through_guard() {
        let h = harness(FakeCompletion::default());

        h.spotlight.handle_event(CrossWindowEvent::Show).await;
        assert!(h.window.is_shown());
        assert_eq!(h.window.count(&WindowCall::Show), 1);
        assert_eq!(h.window.last_size(), Some(WindowSize::new(700.0, 130.0)));

        let hide = {
            let spotlight = h.spotlight.clone();
            tokio::spawn(async move { spotlight.hide().await })
        };
        while h.window.is_shown() {
            tokio::task::yield_now().await;
        }
        // the hide is still cooling down, so this show is dropped
        h.spotlight.handle_event(CrossWindowEvent::Show).await;
        assert!(!h.window.is_shown());
        assert!(hide.await.unwrap());

        h.spotlight.handle_event(CrossWindowEvent::Show).await;
        assert!(h.window.is_shown());
        assert_eq!(h.window.count(&WindowCall::Show), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_key_event_guides_to_settings() {
        let h = harness(FakeCompletion::replying(r#"{"text":"hi"}"#));
        h.spotlight
            .handle_event(CrossWindowEvent::ApiKeyUpdated {
                api_key: Some("key".to_string()),
            })
            .await;
        h.spotlight
            .handle_event(CrossWindowEvent::ApiKeyUpdated { api_key: None })
            .await;

        assert_eq!(h.spotlight.send_message("hello").await, SendOutcome::NeedsApiKey);

        assert_eq!(h.backend.request_count(), 0);
        assert_eq!(h.host.count(&HostCall::OpenSettings), 1);
        assert_eq!(h.spotlight.chat().history().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reopen_size_follows_history() {
        let h = harness(FakeCompletion::replying(r#"{"text":"Paris."}"#));
        h.spotlight
            .handle_event(CrossWindowEvent::ApiKeyUpdated {
                api_key: Some("key".to_string()),
            })
            .await;

        h.spotlight.toggle().await;
        assert_eq!(h.window.last_size(), Some(WindowSize::new(700.0, 130.0)));

        assert_eq!(h.spotlight.send_message("capital of France?").await, SendOutcome::Answered);
        assert_eq!(h.backend.request_count(), 1);

        h.spotlight.toggle().await;
        assert!(!h.window.is_shown());
        h.spotlight.toggle().await;
        assert_eq!(h.window.last_size(), Some(WindowSize::new(700.0, 600.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_collapses_visible_window() {
        let h = harness(FakeCompletion::replying(r#"{"text":"hi"}"#));
        h.spotlight.chat().set_api_key(Some("key".to_string()));
        h.spotlight.send_message("hello").await;
        h.spotlight.show().await;
        assert!(h.spotlight.window().state().expanded);

        assert!(h.spotlight.reset_conversation().await);

        assert!(!h.spotlight.chat().has_history());
        assert!(!h.spotlight.window().state().expanded);
        assert_eq!(h.window.last_size(), Some(WindowSize::new(700.0, 130.0)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_instructions_event_updates_chat() {
        let h = harness(FakeCompletion::replying(r#"{"text":"ok"}"#));
        h.spotlight.chat().set_api_key(Some("key".to_string()));

        h.spotlight
            .handle_event(CrossWindowEvent::SystemInstructionsUpdated {
                system_instructions: Some("Reply in French.".to_string()),
            })
            .await;
        h.spotlight.send_message("hello").await;

        assert_eq!(
            h.backend.requests()[0].system_instructions.as_deref(),
            Some("Reply in French.")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_animation_event_clears_flag() {
        let h = harness(FakeCompletion::default());
        h.spotlight.show().await;
        assert!(h.spotlight.window().state().animating);

        h.spotlight.handle_event(CrossWindowEvent::ResetAnimationState).await;

        assert!(!h.spotlight.window().state().animating);
    }

    #[tokio::test]
    async fn test_startup_check_with_no_update_stays_idle() {
        let h = harness(FakeCompletion::default());

        h.spotlight.startup_update_check().await;

        assert_eq!(h.spotlight.updates().status().state, UpdateState::Idle);
    }
}
