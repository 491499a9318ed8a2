//! Native shell: builds the Tauri app, binds the hotkey, tray and event
//! listeners to the shared [`Spotlight`] orchestrator.

mod capture;
mod commands;
mod shell;
mod updater;

use std::sync::Arc;

use anyhow::Context;
use tauri::menu::{Menu, MenuItem, PredefinedMenuItem};
use tauri::tray::TrayIconBuilder;
use tauri::{App, AppHandle, Listener, Manager, WindowEvent};
use tauri_plugin_global_shortcut::{Code, GlobalShortcutExt, Modifiers, Shortcut, ShortcutState};
use tauri_plugin_log::{Target, TargetKind};

use crate::chat::ChatSessionController;
use crate::config::{app_data_dir, AppConfig};
use crate::events::CrossWindowEvent;
use crate::gemini::GeminiClient;
use crate::settings::{KeyringSecret, SettingsStore};
use crate::spotlight::Spotlight;
use crate::toggle_guard::ToggleGuard;
use crate::update::{CheckTrigger, UpdateLifecycleController};
use crate::window::{WindowConfig, WindowVisibilityController};

use shell::{TauriChatHost, TauriTray, TauriWindow};
use updater::{BannerObserver, TauriUpdateSource};

pub const MAIN_WINDOW: &str = "main";
pub const SETTINGS_WINDOW: &str = "settings";

const TRAY_TOGGLE: &str = "toggle";
const TRAY_CHECK_UPDATES: &str = "check-updates";
const TRAY_QUIT: &str = "quit";

pub struct AppState {
    spotlight: Arc<Spotlight>,
    settings: Arc<SettingsStore>,
    gemini: Arc<GeminiClient>,
    tray: Arc<TauriTray>,
}

#[cfg(target_os = "macos")]
const TOGGLE_MODIFIER: Modifiers = Modifiers::SUPER;
#[cfg(not(target_os = "macos"))]
const TOGGLE_MODIFIER: Modifiers = Modifiers::CONTROL;

fn log_plugin() -> tauri::plugin::TauriPlugin<tauri::Wry> {
    let level = if cfg!(debug_assertions) {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    tauri_plugin_log::Builder::default()
        .level(level)
        .level_for("reqwest", log::LevelFilter::Warn)
        .level_for("tauri_plugin_updater", log::LevelFilter::Warn)
        .clear_targets()
        .targets([
            Target::new(TargetKind::Stdout),
            Target::new(TargetKind::LogDir { file_name: None }),
        ])
        .build()
}

pub fn run() {
    let config = AppConfig::load();

    tauri::Builder::default()
        .plugin(log_plugin())
        .plugin(tauri_plugin_global_shortcut::Builder::new().build())
        .plugin(tauri_plugin_updater::Builder::new().build())
        .setup(move |app| {
            setup(app, &config)?;
            Ok(())
        })
        .on_window_event(|window, event| {
            // the overlay is never destroyed, only hidden
            if window.label() == MAIN_WINDOW {
                if let WindowEvent::CloseRequested { api, .. } = event {
                    api.prevent_close();
                    if let Some(spotlight) = spotlight(window.app_handle()) {
                        tauri::async_runtime::spawn(async move {
                            spotlight.hide().await;
                        });
                    }
                }
            }
        })
        .invoke_handler(tauri::generate_handler![
            commands::get_api_key,
            commands::set_api_key,
            commands::clear_api_key,
            commands::get_system_instructions,
            commands::set_system_instructions,
            commands::clear_system_instructions,
            commands::get_instruction_presets,
            commands::save_instruction_preset,
            commands::delete_instruction_preset,
            commands::open_api_settings_window,
            commands::close_api_settings_window,
            commands::capture_screen,
            commands::send_to_gemini,
            commands::sync_tray_visibility,
            commands::toggle_spotlight,
            commands::show_spotlight,
            commands::hide_spotlight,
            commands::send_message,
            commands::reset_conversation,
            commands::get_conversation,
            commands::set_feature_toggles,
            commands::check_for_updates,
            commands::install_update,
            commands::dismiss_update,
            commands::get_update_status,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

fn spotlight(app: &AppHandle) -> Option<Arc<Spotlight>> {
    app.try_state::<AppState>().map(|state| Arc::clone(&state.spotlight))
}

fn setup(app: &mut App, config: &AppConfig) -> anyhow::Result<()> {
    // menubar app only
    #[cfg(target_os = "macos")]
    app.set_activation_policy(tauri::ActivationPolicy::Accessory);

    let handle = app.handle().clone();

    let toggle_item = MenuItem::with_id(app, TRAY_TOGGLE, shell::toggle_label(false), true, None::<&str>)?;
    let check_item = MenuItem::with_id(app, TRAY_CHECK_UPDATES, "Check for Updates", true, None::<&str>)?;
    let quit_item = MenuItem::with_id(app, TRAY_QUIT, "Quit", true, None::<&str>)?;
    let separator = PredefinedMenuItem::separator(app)?;
    let tray_menu = Menu::with_items(app, &[&toggle_item, &check_item, &separator, &quit_item])?;
    let tray = Arc::new(TauriTray::new(toggle_item));

    let settings = Arc::new(SettingsStore::new(
        &app_data_dir(),
        Box::new(KeyringSecret::default()),
        config.fallback_api_key.clone(),
    ));
    let gemini = Arc::new(GeminiClient::new(config).context("failed to build HTTP client")?);

    let window = Arc::new(WindowVisibilityController::new(
        Arc::new(TauriWindow::new(handle.clone())),
        tray.clone(),
        WindowConfig::default(),
    ));
    let chat = Arc::new(ChatSessionController::new(
        Arc::new(TauriChatHost::new(handle.clone(), window.clone())),
        gemini.clone(),
    ));
    let updates = Arc::new(UpdateLifecycleController::new(
        Arc::new(TauriUpdateSource::new(handle.clone(), config.update_timeout)),
        Arc::new(BannerObserver::new(handle.clone())),
    ));

    match settings.api_key() {
        Ok(key) => chat.set_api_key(key),
        Err(e) => log::warn!("[settings] could not read API key: {e}"),
    }
    match settings.system_instructions() {
        Ok(instructions) => chat.set_system_instructions(instructions),
        Err(e) => log::warn!("[settings] could not read system instructions: {e}"),
    }

    let spotlight = Arc::new(Spotlight::new(ToggleGuard::new(), window, chat, updates));
    app.manage(AppState {
        spotlight: spotlight.clone(),
        settings,
        gemini,
        tray,
    });

    let mut tray_builder = TrayIconBuilder::with_id("spotlight")
        .tooltip("Spotlight")
        .menu(&tray_menu)
        .show_menu_on_left_click(true)
        .on_menu_event(|app, event| on_tray_menu(app, event.id.as_ref()));
    if let Some(icon) = app.default_window_icon() {
        tray_builder = tray_builder.icon(icon.clone());
    }
    tray_builder.build(app)?;

    for name in CrossWindowEvent::NAMES {
        let spotlight = spotlight.clone();
        app.listen_any(name, move |event| {
            match CrossWindowEvent::parse(name, event.payload()) {
                Ok(parsed) => {
                    let spotlight = spotlight.clone();
                    tauri::async_runtime::spawn(async move {
                        spotlight.handle_event(parsed).await;
                    });
                }
                Err(e) => log::warn!("[spotlight] dropped event: {e}"),
            }
        });
    }

    let shortcut = Shortcut::new(Some(TOGGLE_MODIFIER), Code::KeyK);
    log::info!("[spotlight] registering hotkey {shortcut:?}");
    let hotkey_target = spotlight.clone();
    app.global_shortcut()
        .on_shortcut(shortcut, move |_app, _shortcut, event| {
            // key repeat and release are ignored; the guard absorbs the rest
            if let ShortcutState::Pressed = event.state {
                let spotlight = hotkey_target.clone();
                tauri::async_runtime::spawn(async move {
                    spotlight.toggle().await;
                });
            }
        })
        .context("failed to register the global hotkey")?;

    // off the startup path
    tauri::async_runtime::spawn(async move {
        spotlight.startup_update_check().await;
    });

    Ok(())
}

fn on_tray_menu(app: &AppHandle, id: &str) {
    let Some(spotlight) = spotlight(app) else {
        return;
    };
    match id {
        TRAY_TOGGLE => {
            tauri::async_runtime::spawn(async move {
                spotlight.toggle().await;
            });
        }
        TRAY_CHECK_UPDATES => {
            tauri::async_runtime::spawn(async move {
                spotlight.updates().check(CheckTrigger::Manual).await;
            });
        }
        TRAY_QUIT => app.exit(0),
        _ => {}
    }
}
