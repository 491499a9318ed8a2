//! Global-hotkey launcher overlay: window orchestration, chat turns and the
//! background updater, with the native shell behind the `desktop` feature.

pub mod capabilities;
pub mod chat;
pub mod config;
pub mod events;
pub mod gemini;
pub mod message;
pub mod settings;
pub mod spotlight;
pub mod toggle_guard;
pub mod update;
pub mod window;

#[cfg(feature = "desktop")]
mod desktop;

#[cfg(test)]
mod test_support;

#[cfg(feature = "desktop")]
pub use desktop::run;
