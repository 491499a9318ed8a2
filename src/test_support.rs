//! In-memory stand-ins for the native capabilities, shared by the unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use crate::capabilities::{
    CapabilityError, CapabilityResult, ChatHost, CompletionBackend, PrimaryWindow, TraySync,
    WindowSize,
};
use crate::message::{CompletionRequest, ConversationSnapshot};
use crate::update::{UpdateError, UpdateInfo, UpdateObserver, UpdateSource, UpdateState, UpdateStatus};

#[derive(Debug, Clone, PartialEq)]
pub enum WindowCall {
    IsVisible,
    SetSize(WindowSize),
    Show,
    Hide,
    SetFocus,
    SetAnimating(bool),
    FocusInput,
}

#[derive(Default)]
pub struct FakeWindow {
    visible: AtomicBool,
    calls: Mutex<Vec<WindowCall>>,
    focus_failure: Mutex<Option<String>>,
}

impl FakeWindow {
    fn record(&self, call: WindowCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<WindowCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn count(&self, call: &WindowCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn last_size(&self) -> Option<WindowSize> {
        self.calls.lock().unwrap().iter().rev().find_map(|call| match call {
            WindowCall::SetSize(size) => Some(*size),
            _ => None,
        })
    }

    pub fn is_shown(&self) -> bool {
        self.visible.load(Ordering::SeqCst)
    }

    pub fn fail_focus(&self, message: &str) {
        *self.focus_failure.lock().unwrap() = Some(message.to_string());
    }

    /// Simulates the OS hiding the window without going through the controller.
    pub fn set_visible_externally(&self, visible: bool) {
        self.visible.store(visible, Ordering::SeqCst);
    }
}

#[async_trait]
impl PrimaryWindow for FakeWindow {
    async fn is_visible(&self) -> CapabilityResult<bool> {
        self.record(WindowCall::IsVisible);
        Ok(self.is_shown())
    }

    async fn set_size(&self, size: WindowSize) -> CapabilityResult<()> {
        self.record(WindowCall::SetSize(size));
        Ok(())
    }

    async fn show(&self) -> CapabilityResult<()> {
        self.record(WindowCall::Show);
        self.visible.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn hide(&self) -> CapabilityResult<()> {
        self.record(WindowCall::Hide);
        self.visible.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn set_focus(&self) -> CapabilityResult<()> {
        self.record(WindowCall::SetFocus);
        match self.focus_failure.lock().unwrap().clone() {
            Some(message) => Err(CapabilityError::new(message)),
            None => Ok(()),
        }
    }

    async fn set_animating(&self, animating: bool) -> CapabilityResult<()> {
        self.record(WindowCall::SetAnimating(animating));
        Ok(())
    }

    async fn focus_input(&self) -> CapabilityResult<()> {
        self.record(WindowCall::FocusInput);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeTray {
    syncs: Mutex<Vec<bool>>,
    failure: Mutex<Option<String>>,
}

impl FakeTray {
    pub fn syncs(&self) -> Vec<bool> {
        self.syncs.lock().unwrap().clone()
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl TraySync for FakeTray {
    async fn sync_tray_visibility(&self, visible: bool) -> CapabilityResult<()> {
        self.syncs.lock().unwrap().push(visible);
        match self.failure.lock().unwrap().clone() {
            Some(message) => Err(CapabilityError::new(message)),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    CaptureScreen,
    OpenSettings,
    ExpandWindow,
    ClearInput,
}

pub struct FakeChatHost {
    calls: Mutex<Vec<HostCall>>,
    capture: Mutex<CapabilityResult<String>>,
    snapshots: Mutex<Vec<ConversationSnapshot>>,
}

impl Default for FakeChatHost {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            capture: Mutex::new(Err(CapabilityError::new("screen capture not configured"))),
            snapshots: Mutex::new(Vec::new()),
        }
    }
}

impl FakeChatHost {
    fn record(&self, call: HostCall) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, call: &HostCall) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == call).count()
    }

    pub fn set_capture(&self, result: CapabilityResult<String>) {
        *self.capture.lock().unwrap() = result;
    }

    pub fn last_snapshot(&self) -> Option<ConversationSnapshot> {
        self.snapshots.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl ChatHost for FakeChatHost {
    async fn capture_screen(&self) -> CapabilityResult<String> {
        self.record(HostCall::CaptureScreen);
        self.capture.lock().unwrap().clone()
    }

    async fn open_api_settings_window(&self) -> CapabilityResult<()> {
        self.record(HostCall::OpenSettings);
        Ok(())
    }

    async fn expand_window(&self) -> CapabilityResult<()> {
        self.record(HostCall::ExpandWindow);
        Ok(())
    }

    async fn clear_input(&self) -> CapabilityResult<()> {
        self.record(HostCall::ClearInput);
        Ok(())
    }

    fn conversation_changed(&self, snapshot: &ConversationSnapshot) {
        self.snapshots.lock().unwrap().push(snapshot.clone());
    }
}

#[derive(Default)]
pub struct FakeCompletion {
    replies: Mutex<VecDeque<CapabilityResult<String>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    gate: Option<Semaphore>,
}

impl FakeCompletion {
    pub fn replying(body: &str) -> Self {
        let fake = Self::default();
        fake.push_reply(body);
        fake
    }

    pub fn failing(description: &str) -> Self {
        let fake = Self::default();
        fake.replies
            .lock()
            .unwrap()
            .push_back(Err(CapabilityError::new(description)));
        fake
    }

    /// Holds every request until `release` is called.
    pub fn gated(body: &str) -> Self {
        let mut fake = Self::replying(body);
        fake.gate = Some(Semaphore::new(0));
        fake
    }

    pub fn push_reply(&self, body: &str) {
        self.replies.lock().unwrap().push_back(Ok(body.to_string()));
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl CompletionBackend for FakeCompletion {
    async fn send_to_gemini(&self, request: CompletionRequest) -> CapabilityResult<String> {
        self.requests.lock().unwrap().push(request);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| CapabilityError::new(e.to_string()))?;
            permit.forget();
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(CapabilityError::new("No response from Gemini")))
    }
}

#[derive(Default)]
pub struct FakeUpdateSource {
    offer: Mutex<Option<UpdateInfo>>,
    check_error: Mutex<Option<UpdateError>>,
    install_error: Mutex<Option<UpdateError>>,
    checks: AtomicUsize,
    installs: AtomicUsize,
    gate: Option<Semaphore>,
}

impl FakeUpdateSource {
    pub fn current() -> Self {
        Self::default()
    }

    pub fn offering(info: UpdateInfo) -> Self {
        let source = Self::default();
        source.set_offer(Some(info));
        source
    }

    pub fn failing(error: UpdateError) -> Self {
        let source = Self::default();
        *source.check_error.lock().unwrap() = Some(error);
        source
    }

    /// Holds every check until `release` is called.
    pub fn gated(info: UpdateInfo) -> Self {
        let mut source = Self::offering(info);
        source.gate = Some(Semaphore::new(0));
        source
    }

    pub fn set_offer(&self, info: Option<UpdateInfo>) {
        *self.offer.lock().unwrap() = info;
    }

    pub fn clear_check_error(&self) {
        *self.check_error.lock().unwrap() = None;
    }

    pub fn fail_install(&self, error: UpdateError) {
        *self.install_error.lock().unwrap() = Some(error);
    }

    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn check_count(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn install_count(&self) -> usize {
        self.installs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UpdateSource for FakeUpdateSource {
    async fn check(&self) -> Result<Option<UpdateInfo>, UpdateError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| UpdateError::Other(e.to_string()))?;
            permit.forget();
        }
        if let Some(error) = self.check_error.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.offer.lock().unwrap().clone())
    }

    async fn download_and_install(&self) -> Result<(), UpdateError> {
        self.installs.fetch_add(1, Ordering::SeqCst);
        match self.install_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[derive(Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<UpdateStatus>>,
}

impl RecordingObserver {
    pub fn states(&self) -> Vec<UpdateState> {
        self.statuses.lock().unwrap().iter().map(|s| s.state).collect()
    }
}

impl UpdateObserver for RecordingObserver {
    fn status_changed(&self, status: &UpdateStatus) {
        self.statuses.lock().unwrap().push(status.clone());
    }
}
