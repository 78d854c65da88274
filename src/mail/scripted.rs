use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{MailError, Mailer, OutgoingMessage};

/// Test mailer that replays a script of outcomes, then succeeds.
#[derive(Default)]
pub struct ScriptedMailer {
    script: Mutex<VecDeque<Result<(), String>>>,
    sent: Mutex<Vec<OutgoingMessage>>,
    calls: Mutex<usize>,
}

impl ScriptedMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next `times` calls with a transport error.
    pub fn failing(times: usize) -> Self {
        let mailer = Self::default();
        for _ in 0..times {
            mailer
                .script
                .lock()
                .unwrap()
                .push_back(Err("connection refused".to_string()));
        }
        mailer
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl Mailer for ScriptedMailer {
    async fn send(&self, message: OutgoingMessage) -> Result<(), MailError> {
        *self.calls.lock().unwrap() += 1;
        if let Some(Err(reason)) = self.script.lock().unwrap().pop_front() {
            return Err(MailError::Transport(reason));
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }
}
