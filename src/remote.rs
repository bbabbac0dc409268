//! Remote Channel: correlates outgoing calls with a request id, decodes the
//! backend protocol and feeds returned directives back into the dispatcher.
//!
//! The transport is a trait seam so tests can script completions; the real
//! implementation blocks on `ureq`, which is the engine's only network
//! suspension point. Every completion path, success or failure, decrements
//! the pending set and redraws the busy indicator.

use anyhow::{Context as _, Result};
use serde_json::{json, Map, Value};

use crate::engine::Engine;
use crate::log::LogLevel;

/// A completed HTTP exchange as seen by the engine: status plus raw body.
/// Transport-level failures (no connection, DNS) are `Err` instead.
#[derive(Clone, Debug)]
pub struct TransportReply {
    pub status: u16,
    pub body: String,
}

pub trait Transport {
    fn post(&mut self, url: &str, body: &Value) -> Result<TransportReply>;
}

/// Blocking HTTP transport over `ureq`.
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::Agent::new(),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn post(&mut self, url: &str, body: &Value) -> Result<TransportReply> {
        let request = self
            .agent
            .post(url)
            .set("Content-Type", "application/json");
        match request.send_string(&body.to_string()) {
            Ok(response) => {
                let status = response.status();
                let body = response
                    .into_string()
                    .context("reading response body failed")?;
                Ok(TransportReply { status, body })
            }
            Err(ureq::Error::Status(status, response)) => Ok(TransportReply {
                status,
                body: response.into_string().unwrap_or_default(),
            }),
            Err(err) => Err(err).context("transport failure"),
        }
    }
}

impl Engine {
    /// Issues a backend call: assigns the next request id, posts
    /// `{request_id, ...args}` as JSON to `url` (or the configured default
    /// callback) and processes the completion.
    pub fn send_cmd(&mut self, url: Option<&str>, args: Map<String, Value>) {
        self.request_id += 1;
        let request_id = self.request_id;
        self.pending.push(request_id);
        self.update_indicator();

        let url = url
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.cfg.callback)
            .to_string();
        let mut body = Map::new();
        body.insert("request_id".to_string(), json!(request_id));
        for (key, value) in args {
            body.insert(key, value);
        }

        let outcome = self.transport.post(&url, &Value::Object(body));
        match outcome {
            Err(err) => {
                self.finish_request(request_id);
                self.log(
                    LogLevel::Error,
                    "request-failed",
                    json!({ "url": url, "error": err.to_string() }),
                );
            }
            Ok(reply) if !(200..300).contains(&reply.status) => {
                self.finish_request(request_id);
                self.log(
                    LogLevel::Error,
                    "request-error",
                    json!({ "url": url, "status": reply.status }),
                );
            }
            Ok(reply) if reply.body.is_empty() => {
                self.finish_request(request_id);
                self.log(
                    LogLevel::Error,
                    "response-is-empty",
                    json!({ "url": url, "status": reply.status }),
                );
            }
            Ok(reply) => match serde_json::from_str::<Value>(&reply.body) {
                Ok(resp) => self.process_response(request_id, &url, resp),
                Err(err) => {
                    self.finish_request(request_id);
                    self.log(
                        LogLevel::Error,
                        "response-parse-error",
                        json!({ "url": url, "error": err.to_string() }),
                    );
                }
            },
        }
    }

    /// Handles a decoded backend response: an error array surfaces its code,
    /// a record with a `directives` array is executed, anything else is a
    /// protocol error. Pending accounting happens in every branch.
    pub(crate) fn process_response(&mut self, request_id: u64, url: &str, resp: Value) {
        self.finish_request(request_id);
        if let Some(code) = resp
            .as_array()
            .and_then(|items| items.first())
            .and_then(|first| first.get("code"))
        {
            self.log(
                LogLevel::Error,
                "backend-error",
                json!({ "code": code, "requestId": request_id, "url": url }),
            );
            return;
        }
        match resp.get("directives") {
            Some(directives) => {
                let directives = directives.clone();
                self.exec(&directives, None, None);
            }
            None => self.log(
                LogLevel::Error,
                "directives-not-found",
                json!({ "requestId": request_id, "url": url, "response": resp }),
            ),
        }
    }

    fn finish_request(&mut self, request_id: u64) {
        self.pending.retain(|id| *id != request_id);
        self.update_indicator();
    }
}
