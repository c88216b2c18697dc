//! Stand-ins for the external services, shared by unit tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::groupme::poster::BotPoster;
use crate::groupme::BotPostRequest;

/// Records every request. Answers from a script first, then with a fixed status.
pub struct StubPoster {
    script: Mutex<VecDeque<StatusCode>>,
    fallback: StatusCode,
    sent: Mutex<Vec<BotPostRequest>>,
}

impl StubPoster {
    pub fn new(status: StatusCode) -> Arc<Self> {
        Self::scripted(Vec::new(), status)
    }

    pub fn scripted(script: Vec<StatusCode>, fallback: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            fallback,
            sent: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<BotPostRequest> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<String> {
        self.sent().into_iter().map(|r| r.text).collect()
    }
}

#[async_trait]
impl BotPoster for StubPoster {
    async fn post(&self, request: &BotPostRequest) -> StatusCode {
        self.sent.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.fallback)
    }
}
