//! Names and payloads of the events exchanged between the overlay, the
//! settings window and the tray.

use serde::Deserialize;
use thiserror::Error;

pub const SPOTLIGHT_SHOW: &str = "spotlight-show";
pub const SPOTLIGHT_HIDE: &str = "spotlight-hide";
pub const API_KEY_UPDATED: &str = "api-key-updated";
pub const SYSTEM_INSTRUCTIONS_UPDATED: &str = "system-instructions-updated";
pub const RESET_ANIMATION_STATE: &str = "reset-animation-state";

// pushed from the core to the webviews
pub const CHAT_UPDATED: &str = "chat:updated";
pub const CLEAR_INPUT: &str = "spotlight:clear-input";
pub const FOCUS_INPUT: &str = "spotlight:focus-input";
pub const ANIMATE: &str = "spotlight:animate";
pub const UPDATE_STATUS: &str = "update:status";

#[derive(Error, Debug)]
pub enum EventError {
    #[error("unknown event: {0}")]
    Unknown(String),
    #[error("malformed payload for {name}: {source}")]
    Payload {
        name: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// Event received from another window and routed into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrossWindowEvent {
    Show,
    Hide,
    ApiKeyUpdated { api_key: Option<String> },
    SystemInstructionsUpdated { system_instructions: Option<String> },
    ResetAnimationState,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct ApiKeyPayload {
    #[serde(default)]
    api_key: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct SystemInstructionsPayload {
    #[serde(default)]
    system_instructions: Option<String>,
}

impl CrossWindowEvent {
    /// Every event the core listens for.
    pub const NAMES: [&'static str; 5] = [
        SPOTLIGHT_SHOW,
        SPOTLIGHT_HIDE,
        API_KEY_UPDATED,
        SYSTEM_INSTRUCTIONS_UPDATED,
        RESET_ANIMATION_STATE,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Show => SPOTLIGHT_SHOW,
            Self::Hide => SPOTLIGHT_HIDE,
            Self::ApiKeyUpdated { .. } => API_KEY_UPDATED,
            Self::SystemInstructionsUpdated { .. } => SYSTEM_INSTRUCTIONS_UPDATED,
            Self::ResetAnimationState => RESET_ANIMATION_STATE,
        }
    }

    /// Decode an event from its name and raw JSON payload. Payload-less events
    /// ignore whatever they were sent.
    pub fn parse(name: &str, payload: &str) -> Result<Self, EventError> {
        match name {
            SPOTLIGHT_SHOW => Ok(Self::Show),
            SPOTLIGHT_HIDE => Ok(Self::Hide),
            RESET_ANIMATION_STATE => Ok(Self::ResetAnimationState),
            API_KEY_UPDATED => {
                let p: ApiKeyPayload = decode(API_KEY_UPDATED, payload)?;
                Ok(Self::ApiKeyUpdated { api_key: p.api_key })
            }
            SYSTEM_INSTRUCTIONS_UPDATED => {
                let p: SystemInstructionsPayload = decode(SYSTEM_INSTRUCTIONS_UPDATED, payload)?;
                Ok(Self::SystemInstructionsUpdated {
                    system_instructions: p.system_instructions,
                })
            }
            other => Err(EventError::Unknown(other.to_string())),
        }
    }
}

fn decode<T>(name: &'static str, payload: &str) -> Result<T, EventError>
where
    T: for<'de> Deserialize<'de> + Default,
{
    let trimmed = payload.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return Ok(T::default());
    }
    serde_json::from_str(trimmed).map_err(|source| EventError::Payload { name, source })
}
