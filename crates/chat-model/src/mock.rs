use crate::{ChatError, ChatModel, ChatRequest, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Scripted model: echoes a fixed reply after an optional delay.
pub struct MockChatModel {
    reply: String,
    delay: Duration,
    fail: bool,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl MockChatModel {
    pub fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            delay: Duration::ZERO,
            fail: false,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new("")
        }
    }

    /// Requests seen so far, in call order.
    pub fn requests(&self) -> Arc<Mutex<Vec<ChatRequest>>> {
        Arc::clone(&self.requests)
    }
}

impl ChatModel for MockChatModel {
    fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.requests.lock().push(request.clone());
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        if self.fail {
            return Err(ChatError::Request("mock failure".to_string()));
        }
        Ok(self.reply.clone())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
