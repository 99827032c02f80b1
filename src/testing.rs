//! Test doubles for the prompt and transport seams.
//!
//! - [`ScriptedPrompter`]: answers prompts from a fixed list and counts them
//! - [`ScriptedTransport`]: replays canned responses and records every request
//! - [`connected_client`]: a client wired to both, already authenticated

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::path::Path;

use serde_json::Value;

use crate::api::ApiClient;
use crate::config::Paths;
use crate::session::SessionContext;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::ui::Prompter;

pub struct ScriptedPrompter {
    answers: RefCell<VecDeque<String>>,
    prompts: Cell<usize>,
}

impl ScriptedPrompter {
    pub fn new(answers: &[&str]) -> Self {
        ScriptedPrompter {
            answers: RefCell::new(answers.iter().map(|a| a.to_string()).collect()),
            prompts: Cell::new(0),
        }
    }

    /// Number of prompts shown so far.
    pub fn count(&self) -> usize {
        self.prompts.get()
    }
}

impl Prompter for ScriptedPrompter {
    fn password(&self, _prompt: &str) -> Option<String> {
        self.prompts.set(self.prompts.get() + 1);
        self.answers.borrow_mut().pop_front()
    }
}

type Reply = Result<HttpResponse, TransportError>;

/// Replays responses in order. Running out of responses is reported as a
/// transport failure.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: RefCell<VecDeque<Reply>>,
    requests: RefCell<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, status: u16, body: impl Into<String>) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn reply_json(self, status: u16, body: Value) -> Self {
        self.reply(status, body.to_string())
    }

    pub fn fail(self, message: &str) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Err(TransportError(message.to_string())));
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.borrow().clone()
    }

    pub fn urls(&self) -> Vec<String> {
        self.requests.borrow().iter().map(|r| r.url.clone()).collect()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError("no scripted reply".to_string())))
    }
}

/// Client over the scripted doubles with an authenticated context for `c1`.
pub fn connected_client<'a>(
    transport: &'a ScriptedTransport,
    prompter: &'a ScriptedPrompter,
    dir: &Path,
) -> ApiClient<&'a ScriptedTransport, &'a ScriptedPrompter> {
    let mut client = ApiClient::with_parts(transport, prompter, &Paths::in_dir(dir));
    let mut ctx = SessionContext::for_vip("c1");
    ctx.authenticated = true;
    client.context = ctx;
    client
}
