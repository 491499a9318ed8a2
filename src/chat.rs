//! Conversation history and the lifecycle of a single chat turn.
//!
//! The `loading` flag is the only concurrency guard: while a turn is in
//! flight every further `send_message` is dropped, so turns complete in the
//! order they were accepted and history stays append-only.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::capabilities::{CapabilityError, CapabilityResult, ChatHost, CompletionBackend};
use crate::message::{
    ChatMessage, CompletionRequest, CompletionResult, ConversationSnapshot, FeatureToggles,
    Message,
};

pub const MISSING_API_KEY_MESSAGE: &str =
    "To start chatting, add your Gemini API key in Settings. I've opened the settings window for you.";
pub const UPSTREAM_ERROR_MESSAGE: &str =
    "The AI service returned an error. Please check your API key and try again.";
pub const PARSE_ERROR_MESSAGE: &str =
    "I received a response I couldn't understand. Please try again.";
pub const NETWORK_ERROR_MESSAGE: &str =
    "I couldn't reach the AI service. Please check your internet connection and try again.";
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, something went wrong. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Upstream,
    Parse,
    Network,
    Unknown,
}

impl ErrorCategory {
    /// Classify a failed turn from the description the capability returned.
    pub fn classify(description: &str) -> Self {
        let d = description.to_lowercase();
        if d.contains("api error") {
            Self::Upstream
        } else if d.contains("parse") || d.contains("deserialize") {
            Self::Parse
        } else if ["request failed", "fetch", "network", "connect", "timed out", "dns"]
            .iter()
            .any(|marker| d.contains(marker))
        {
            Self::Network
        } else {
            Self::Unknown
        }
    }

    pub fn user_message(self) -> &'static str {
        match self {
            Self::Upstream => UPSTREAM_ERROR_MESSAGE,
            Self::Parse => PARSE_ERROR_MESSAGE,
            Self::Network => NETWORK_ERROR_MESSAGE,
            Self::Unknown => GENERIC_ERROR_MESSAGE,
        }
    }
}

/// How a `send_message` call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank query or a turn already in flight; nothing happened.
    Rejected,
    /// No API key: guidance appended and settings requested.
    NeedsApiKey,
    Answered,
    Failed(ErrorCategory),
}

#[derive(Debug, Default)]
struct Session {
    history: Vec<Message>,
    toggles: FeatureToggles,
    api_key: Option<String>,
    system_instructions: Option<String>,
}

pub struct ChatSessionController {
    host: Arc<dyn ChatHost>,
    backend: Arc<dyn CompletionBackend>,
    session: Mutex<Session>,
    loading: AtomicBool,
}

impl ChatSessionController {
    pub fn new(host: Arc<dyn ChatHost>, backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            host,
            backend,
            session: Mutex::new(Session::default()),
            loading: AtomicBool::new(false),
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst)
    }

    pub fn has_history(&self) -> bool {
        !self.session().history.is_empty()
    }

    pub fn history(&self) -> Vec<Message> {
        self.session().history.clone()
    }

    pub fn snapshot(&self) -> ConversationSnapshot {
        let session = self.session();
        ConversationSnapshot {
            messages: session.history.clone(),
            loading: self.is_loading(),
            toggles: session.toggles,
        }
    }

    fn publish(&self) {
        self.host.conversation_changed(&self.snapshot());
    }

    pub fn set_api_key(&self, api_key: Option<String>) {
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        log::info!("[chat] API key {}", if api_key.is_some() { "updated" } else { "cleared" });
        self.session().api_key = api_key;
    }

    pub fn set_system_instructions(&self, instructions: Option<String>) {
        let instructions = instructions.filter(|i| !i.trim().is_empty());
        log::info!(
            "[chat] system instructions {}",
            if instructions.is_some() { "updated" } else { "cleared" }
        );
        self.session().system_instructions = instructions;
    }

    pub fn set_feature_toggles(&self, toggles: FeatureToggles) {
        self.session().toggles = toggles;
        self.publish();
    }

    /// Clear the conversation. Refused while a turn is in flight.
    pub fn reset_conversation(&self) -> bool {
        if self.is_loading() {
            log::debug!("[chat] reset ignored: turn in flight");
            return false;
        }
        self.session().history.clear();
        log::info!("[chat] conversation reset");
        self.publish();
        true
    }

    pub async fn send_message(&self, query: &str) -> SendOutcome {
        let query = query.trim();
        if query.is_empty() || self.is_loading() {
            return SendOutcome::Rejected;
        }

        let api_key = self.session().api_key.clone();
        let Some(api_key) = api_key else {
            self.guide_to_settings(query).await;
            return SendOutcome::NeedsApiKey;
        };

        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return SendOutcome::Rejected;
        }
        // loading is reset (and the final state published) on every exit
        let _loading = Loading { controller: self };

        let (chat_history, toggles, system_instructions) = {
            let mut session = self.session();
            let prior = session.history.iter().map(ChatMessage::from).collect::<Vec<_>>();
            session.history.push(Message::user(query));
            (prior, session.toggles, session.system_instructions.clone())
        };
        self.publish();

        if let Err(e) = self.host.clear_input().await {
            log::warn!("[chat] failed to clear input: {e}");
        }
        if let Err(e) = self.host.expand_window().await {
            log::warn!("[chat] failed to expand window: {e}");
        }

        log::info!(
            "[chat] sending turn (history: {} msgs, capture: {}, grounding: {}, thinking: {})",
            chat_history.len(),
            toggles.screen_capture,
            toggles.grounding,
            toggles.thinking
        );

        let turn = self
            .run_turn(query, api_key, toggles, chat_history, system_instructions)
            .await;

        match turn {
            Ok(result) => {
                let sources = result.sources.unwrap_or_default();
                log::info!("[chat] turn answered ({} sources)", sources.len());
                self.session()
                    .history
                    .push(Message::assistant_with_sources(result.text, sources));
                SendOutcome::Answered
            }
            Err(e) => {
                let category = ErrorCategory::classify(e.description());
                log::warn!("[chat] turn failed ({category:?}): {e}");
                self.session()
                    .history
                    .push(Message::assistant(category.user_message()));
                SendOutcome::Failed(category)
            }
        }
    }

    async fn run_turn(
        &self,
        query: &str,
        api_key: String,
        toggles: FeatureToggles,
        chat_history: Vec<ChatMessage>,
        system_instructions: Option<String>,
    ) -> CapabilityResult<CompletionResult> {
        let image_data = if toggles.screen_capture {
            Some(self.host.capture_screen().await?)
        } else {
            None
        };

        let request = CompletionRequest {
            message: query.to_string(),
            image_data,
            api_key,
            grounding_enabled: Some(toggles.grounding),
            thinking_enabled: Some(toggles.thinking),
            chat_history,
            system_instructions,
        };

        let raw = self.backend.send_to_gemini(request).await?;
        serde_json::from_str::<CompletionResult>(&raw)
            .map_err(|e| CapabilityError::new(format!("Failed to parse response: {e}")))
    }

    async fn guide_to_settings(&self, query: &str) {
        log::info!("[chat] no API key configured, opening settings");
        {
            let mut session = self.session();
            session.history.push(Message::user(query));
            session.history.push(Message::assistant(MISSING_API_KEY_MESSAGE));
        }
        self.publish();

        if let Err(e) = self.host.clear_input().await {
            log::warn!("[chat] failed to clear input: {e}");
        }
        if let Err(e) = self.host.open_api_settings_window().await {
            log::warn!("[chat] failed to open settings window: {e}");
        }
        if let Err(e) = self.host.expand_window().await {
            log::warn!("[chat] failed to expand window: {e}");
        }
    }
}

struct Loading<'a> {
    controller: &'a ChatSessionController,
}

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.controller.loading.store(false, Ordering::SeqCst);
        self.controller.publish();
    }
}
