//! Test double for the engine gateway.
//!
//! Records every command in a journal and returns `0` for everything
//! unless a failure code has been programmed for the command name.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use uawire_client_core::{CallHandle, EngineGateway, VideoDirection};

#[derive(Default)]
pub struct MockEngine {
    journal: Mutex<Vec<String>>,
    failures: Mutex<HashMap<&'static str, i32>>,
    next_handle: AtomicU64,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Program `command` to fail with `code` from now on.
    pub fn fail_with(&self, command: &'static str, code: i32) {
        self.failures.lock().unwrap().insert(command, code);
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn record(&self, entry: String) {
        self.journal.lock().unwrap().push(entry);
    }

    fn code_for(&self, command: &'static str) -> i32 {
        self.failures
            .lock()
            .unwrap()
            .get(command)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl EngineGateway for MockEngine {
    async fn call_alloc(&self, owner: &str) -> Result<CallHandle, i32> {
        self.record(format!("call_alloc {owner}"));
        let code = self.code_for("call_alloc");
        if code != 0 {
            return Err(code);
        }
        let n = self.next_handle.fetch_add(1, Ordering::Relaxed);
        Ok(CallHandle::from(format!("call-{n}")))
    }

    async fn connect(&self, handle: &CallHandle, peer_uri: &str) -> i32 {
        self.record(format!("connect {handle} {peer_uri}"));
        self.code_for("connect")
    }

    async fn hold(&self, handle: &CallHandle) -> i32 {
        self.record(format!("hold {handle}"));
        self.code_for("hold")
    }

    async fn unhold(&self, handle: &CallHandle) -> i32 {
        self.record(format!("unhold {handle}"));
        self.code_for("unhold")
    }

    async fn transfer(&self, handle: &CallHandle, target_uri: &str) -> i32 {
        self.record(format!("transfer {handle} {target_uri}"));
        self.code_for("transfer")
    }

    async fn send_digit(&self, handle: &CallHandle, digit: char) -> i32 {
        self.record(format!("send_digit {handle} {digit}"));
        self.code_for("send_digit")
    }

    async fn set_video(&self, handle: &CallHandle, enabled: bool) -> i32 {
        self.record(format!("set_video {handle} {enabled}"));
        self.code_for("set_video")
    }

    async fn set_video_source(&self, handle: &CallHandle, front: bool) -> i32 {
        self.record(format!("set_video_source {handle} {front}"));
        self.code_for("set_video_source")
    }

    async fn start_video_display(&self, handle: &CallHandle) -> i32 {
        self.record(format!("start_video_display {handle}"));
        self.code_for("start_video_display")
    }

    async fn stop_video_display(&self, handle: &CallHandle) {
        self.record(format!("stop_video_display {handle}"));
    }

    async fn set_video_direction(&self, handle: &CallHandle, direction: VideoDirection) {
        self.record(format!("set_video_direction {handle} {direction:?}"));
    }

    async fn disable_video_stream(&self, handle: &CallHandle, disable: bool) {
        self.record(format!("disable_video_stream {handle} {disable}"));
    }

    async fn notify_sipfrag(&self, handle: &CallHandle, code: u16, reason: &str) {
        self.record(format!("notify_sipfrag {handle} {code} {reason}"));
    }

    async fn status(&self, handle: &CallHandle) -> String {
        self.record(format!("status {handle}"));
        "established".to_string()
    }

    async fn audio_codecs(&self, handle: &CallHandle) -> String {
        self.record(format!("audio_codecs {handle}"));
        "opus/48000/2,pcmu/8000/1".to_string()
    }

    async fn has_video(&self, handle: &CallHandle) -> bool {
        self.record(format!("has_video {handle}"));
        false
    }

    async fn send_message(&self, owner: &str, peer_uri: &str, body: &str, token: u64) -> i32 {
        self.record(format!("send_message {owner} {peer_uri} {body} {token}"));
        self.code_for("send_message")
    }

    async fn set_name_servers(&self, servers: &str) -> i32 {
        self.record(format!("set_name_servers {servers}"));
        self.code_for("set_name_servers")
    }
}
