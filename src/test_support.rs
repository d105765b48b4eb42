//! Test-only scripted fake for the remote API.
//!
//! [`FakeRemote`] answers calls from per-method response queues without any
//! network. Methods with no scripted response succeed with an empty `ok`
//! envelope, which decodes into defaulted response types (empty listings,
//! blank entities). Every call is recorded for sequence assertions.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};

use serde_json::{json, Value};

use crate::remote::{RemoteClient, RemoteError};

/// One recorded [`RemoteClient::call_method`] invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub payload: Value,
}

/// Scripted in-memory [`RemoteClient`].
#[derive(Debug, Default)]
pub struct FakeRemote {
    responses: RefCell<HashMap<String, VecDeque<Result<Value, RemoteError>>>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl FakeRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for the next call to `method`.
    pub fn respond(&self, method: &str, response: Value) {
        self.responses
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(Ok(response));
    }

    /// Queue a failure for the next call to `method`.
    pub fn fail(&self, method: &str, err: RemoteError) {
        self.responses
            .borrow_mut()
            .entry(method.to_string())
            .or_default()
            .push_back(Err(err));
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// The method names of every call made so far, in order.
    pub fn methods(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.method.clone()).collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls.borrow().iter().filter(|c| c.method == method).count()
    }
}

impl RemoteClient for FakeRemote {
    fn call_method(&self, method: &str, payload: Value) -> Result<Value, RemoteError> {
        self.calls.borrow_mut().push(RecordedCall {
            method: method.to_string(),
            payload,
        });
        if let Some(queue) = self.responses.borrow_mut().get_mut(method) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        Ok(json!({"ok": true}))
    }
}
