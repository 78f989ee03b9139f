use std::sync::{Arc, Mutex};

use reqwest::header::HeaderMap;
use tokio::sync::watch;
use tracing::debug;

use crate::capture::parse::header_lines;
use crate::http::client::{build_headers, encode_body, parse_method};
use crate::intercept::{Completion, EventKind, Listener, ProgressiveRequest};
use crate::sanitize::Value;
use crate::{ApiHackerError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyState {
    Unsent,
    Opened,
    Loading,
}

#[derive(Default)]
struct State {
    listeners: Vec<(EventKind, Listener)>,
    completion: Option<Completion>,
}

/// 基于 reqwest 的事件式请求，行为类似 XMLHttpRequest
///
/// `send` 把请求交给当前 tokio 运行时后立即返回；终止时按注册顺序
/// 调用对应类型的监听器，然后唤醒 `completed()` 的等待者。
pub struct HttpRequest {
    client: reqwest::Client,
    ready_state: ReadyState,
    method: Option<reqwest::Method>,
    url: Option<reqwest::Url>,
    headers: Vec<(String, String)>,
    state: Arc<Mutex<State>>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl Default for HttpRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpRequest {
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            client,
            ready_state: ReadyState::Unsent,
            method: None,
            url: None,
            headers: Vec::new(),
            state: Arc::new(Mutex::new(State::default())),
            done_tx,
            done_rx,
        }
    }

    fn completion(&self) -> Option<Completion> {
        self.state.lock().ok().and_then(|s| s.completion.clone())
    }
}

impl ProgressiveRequest for HttpRequest {
    fn open(&mut self, method: &str, url: &str) -> Result<()> {
        if self.ready_state == ReadyState::Loading {
            return Err(ApiHackerError::InvalidState(
                "open() called while a request is in flight".to_string(),
            ));
        }
        self.method = Some(parse_method(method)?);
        self.url = Some(reqwest::Url::parse(url)?);
        self.headers.clear();
        self.ready_state = ReadyState::Opened;
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        if self.ready_state != ReadyState::Opened {
            return Err(ApiHackerError::InvalidState(
                "set_request_header() requires an opened, unsent request".to_string(),
            ));
        }
        let header = (name.to_string(), value.to_string());
        // 非法的头名或头值在这里拒绝，send 不会因此失败
        build_headers(std::slice::from_ref(&header))?;
        self.headers.push(header);
        Ok(())
    }

    fn add_event_listener(&mut self, kind: EventKind, listener: Listener) {
        if let Ok(mut state) = self.state.lock()
            && state.completion.is_none()
        {
            state.listeners.push((kind, listener));
        }
    }

    fn send(&mut self, body: Option<Value>) -> Result<()> {
        let (Some(method), Some(url)) = (self.method.clone(), self.url.clone()) else {
            return Err(ApiHackerError::InvalidState(
                "send() called before open()".to_string(),
            ));
        };
        if self.ready_state != ReadyState::Opened {
            return Err(ApiHackerError::InvalidState(
                "send() called twice".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ApiHackerError::InvalidState(format!("no async runtime: {e}")))?;

        let headers = build_headers(&self.headers)?;
        let mut req = self.client.request(method, url).headers(headers);
        if let Some(body) = encode_body(body.as_ref())? {
            req = req.body(body);
        }

        self.ready_state = ReadyState::Loading;
        let state = Arc::clone(&self.state);
        let done_tx = self.done_tx.clone();

        runtime.spawn(async move {
            let completion = match req.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    let headers: HeaderMap = response.headers().clone();
                    match response.text().await {
                        Ok(text) => Completion::load(status, header_lines(&headers), text),
                        Err(e) => {
                            debug!(status, error = %e, "Response body unreadable");
                            Completion::without_body(status, header_lines(&headers))
                        }
                    }
                }
                Err(e) => Completion::error(e.to_string()),
            };
            debug!(kind = ?completion.kind, status = completion.status, "Request finished");

            let listeners = match state.lock() {
                Ok(mut state) => {
                    state.completion = Some(completion.clone());
                    std::mem::take(&mut state.listeners)
                }
                Err(_) => Vec::new(),
            };
            for (kind, listener) in listeners {
                if kind == completion.kind {
                    listener(&completion);
                }
            }
            let _ = done_tx.send(true);
        });

        Ok(())
    }

    fn status(&self) -> u16 {
        self.completion().map(|c| c.status).unwrap_or(0)
    }

    fn response_text(&self) -> Option<String> {
        self.completion().and_then(|c| c.response_text)
    }

    fn all_response_headers(&self) -> String {
        self.completion()
            .map(|c| c.response_headers)
            .unwrap_or_default()
    }

    async fn completed(&self) {
        if matches!(self.ready_state, ReadyState::Unsent | ReadyState::Opened) {
            return;
        }
        let mut done = self.done_rx.clone();
        // 发送端随 self 存活，wait_for 只会在完成时返回
        let _ = done.wait_for(|finished| *finished).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_rejected_before_send() {
        let mut request = HttpRequest::new();
        request.open("GET", "http://127.0.0.1/").unwrap();

        assert!(request.set_request_header("X-Bad", "a\nb").is_err());
        assert!(request.set_request_header("bad name", "1").is_err());
        request.set_request_header("X-Empty", "").unwrap();
        assert_eq!(request.headers, vec![("X-Empty".to_string(), String::new())]);
    }

    #[test]
    fn test_header_requires_open() {
        let mut request = HttpRequest::new();
        let err = request.set_request_header("X-Token", "abc").unwrap_err();
        assert!(matches!(err, ApiHackerError::InvalidState(_)));
    }
}
