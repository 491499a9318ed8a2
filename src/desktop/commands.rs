use tauri::{AppHandle, State};

use super::shell::{capture_under_overlay, close_settings_window, open_settings_window};
use super::AppState;
use crate::capabilities::{CompletionBackend, TraySync};
use crate::message::{ChatMessage, CompletionRequest, ConversationSnapshot, FeatureToggles};
use crate::settings::InstructionPreset;
use crate::update::{CheckTrigger, UpdateStatus};

// --- settings ---

#[tauri::command]
pub fn get_api_key(state: State<'_, AppState>) -> Result<Option<String>, String> {
    state.settings.api_key().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_api_key(state: State<'_, AppState>, api_key: String) -> Result<(), String> {
    state.settings.set_api_key(&api_key).map_err(|e| e.to_string())?;
    let current = state.settings.api_key().map_err(|e| e.to_string())?;
    state.spotlight.chat().set_api_key(current);
    Ok(())
}

#[tauri::command]
pub fn clear_api_key(state: State<'_, AppState>) -> Result<(), String> {
    state.settings.clear_api_key().map_err(|e| e.to_string())?;
    let fallback = state.settings.api_key().map_err(|e| e.to_string())?;
    state.spotlight.chat().set_api_key(fallback);
    Ok(())
}

#[tauri::command]
pub fn get_system_instructions(state: State<'_, AppState>) -> Result<Option<String>, String> {
    state.settings.system_instructions().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn set_system_instructions(state: State<'_, AppState>, instructions: String) -> Result<(), String> {
    state
        .settings
        .set_system_instructions(&instructions)
        .map_err(|e| e.to_string())?;
    state.spotlight.chat().set_system_instructions(Some(instructions));
    Ok(())
}

#[tauri::command]
pub fn clear_system_instructions(state: State<'_, AppState>) -> Result<(), String> {
    state
        .settings
        .clear_system_instructions()
        .map_err(|e| e.to_string())?;
    state.spotlight.chat().set_system_instructions(None);
    Ok(())
}

#[tauri::command]
pub fn get_instruction_presets(state: State<'_, AppState>) -> Result<Vec<InstructionPreset>, String> {
    state.settings.presets().map_err(|e| e.to_string())
}

#[tauri::command]
pub fn save_instruction_preset(
    state: State<'_, AppState>,
    id: Option<String>,
    name: String,
    instructions: String,
) -> Result<InstructionPreset, String> {
    state
        .settings
        .save_preset(id.as_deref(), &name, &instructions)
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub fn delete_instruction_preset(state: State<'_, AppState>, id: String) -> Result<(), String> {
    state.settings.delete_preset(&id).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn open_api_settings_window(app: AppHandle) -> Result<(), String> {
    open_settings_window(&app).map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn close_api_settings_window(app: AppHandle) -> Result<(), String> {
    close_settings_window(&app).map_err(|e| e.to_string())
}

// --- native capabilities ---

#[tauri::command]
pub async fn capture_screen(app: AppHandle) -> Result<String, String> {
    capture_under_overlay(&app).await.map_err(|e| e.to_string())
}

#[tauri::command]
#[allow(clippy::too_many_arguments)]
pub async fn send_to_gemini(
    state: State<'_, AppState>,
    message: String,
    image_data: Option<String>,
    api_key: String,
    grounding_enabled: Option<bool>,
    thinking_enabled: Option<bool>,
    chat_history: Vec<ChatMessage>,
    system_instructions: Option<String>,
) -> Result<String, String> {
    let request = CompletionRequest {
        message,
        image_data,
        api_key,
        grounding_enabled,
        thinking_enabled,
        chat_history,
        system_instructions,
    };
    state
        .gemini
        .send_to_gemini(request)
        .await
        .map_err(|e| e.to_string())
}

#[tauri::command]
pub async fn sync_tray_visibility(state: State<'_, AppState>, visible: bool) -> Result<(), String> {
    state
        .tray
        .sync_tray_visibility(visible)
        .await
        .map_err(|e| e.to_string())
}

// --- overlay ---

#[tauri::command]
pub async fn toggle_spotlight(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.spotlight.toggle().await)
}

#[tauri::command]
pub async fn show_spotlight(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.spotlight.show().await)
}

#[tauri::command]
pub async fn hide_spotlight(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.spotlight.hide().await)
}

// --- chat ---

#[tauri::command]
pub async fn send_message(state: State<'_, AppState>, query: String) -> Result<ConversationSnapshot, String> {
    let outcome = state.spotlight.send_message(&query).await;
    log::debug!("[chat] send_message -> {outcome:?}");
    Ok(state.spotlight.chat().snapshot())
}

#[tauri::command]
pub async fn reset_conversation(state: State<'_, AppState>) -> Result<bool, String> {
    Ok(state.spotlight.reset_conversation().await)
}

#[tauri::command]
pub fn get_conversation(state: State<'_, AppState>) -> ConversationSnapshot {
    state.spotlight.chat().snapshot()
}

#[tauri::command]
pub fn set_feature_toggles(state: State<'_, AppState>, toggles: FeatureToggles) {
    state.spotlight.chat().set_feature_toggles(toggles);
}

// --- updates ---

#[tauri::command]
pub async fn check_for_updates(state: State<'_, AppState>) -> Result<UpdateStatus, String> {
    Ok(state.spotlight.updates().check(CheckTrigger::Manual).await)
}

#[tauri::command]
pub async fn install_update(state: State<'_, AppState>) -> Result<UpdateStatus, String> {
    Ok(state.spotlight.updates().install().await)
}

#[tauri::command]
pub fn dismiss_update(state: State<'_, AppState>) -> UpdateStatus {
    state.spotlight.updates().dismiss()
}

#[tauri::command]
pub fn get_update_status(state: State<'_, AppState>) -> UpdateStatus {
    state.spotlight.updates().status()
}
