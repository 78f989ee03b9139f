use std::future::Future;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::Result;
use crate::capture::InFlight;
use crate::capture::parse::{normalize_request_body, parse_body_text, parse_header_lines};
use crate::intercept::{Completion, EventKind, Listener, ProgressiveRequest, RecordSink};
use crate::sanitize::{SanitizeOptions, Value};

/// 包装事件式请求
///
/// `open` 时建立进行中的记录，`send` 时固定请求头和请求体，并在内部请求上
/// 注册 load / error 监听器，由先触发的一个生成记录。
/// `send` 之后再设置的请求头不会出现在记录里。
pub struct InterceptedRequest<X, S> {
    inner: X,
    sink: S,
    options: SanitizeOptions,
    in_flight: Option<InFlight>,
}

impl<X, S> InterceptedRequest<X, S>
where
    X: ProgressiveRequest,
    S: RecordSink + Clone + 'static,
{
    pub fn new(inner: X, sink: S) -> Self {
        Self::with_options(inner, sink, SanitizeOptions::default())
    }

    pub fn with_options(inner: X, sink: S, options: SanitizeOptions) -> Self {
        Self {
            inner,
            sink,
            options,
            in_flight: None,
        }
    }

    pub fn inner(&self) -> &X {
        &self.inner
    }
}

impl<X, S> ProgressiveRequest for InterceptedRequest<X, S>
where
    X: ProgressiveRequest,
    S: RecordSink + Clone + 'static,
{
    fn open(&mut self, method: &str, url: &str) -> Result<()> {
        let in_flight = InFlight::open(method, url);
        self.inner.open(method, url)?;
        debug!(method, url, "Request opened");
        self.in_flight = Some(in_flight);
        Ok(())
    }

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.inner.set_request_header(name, value)?;
        if let Some(in_flight) = self.in_flight.as_mut() {
            in_flight.set_request_header(name, value);
        }
        Ok(())
    }

    fn add_event_listener(&mut self, kind: EventKind, listener: Listener) {
        self.inner.add_event_listener(kind, listener);
    }

    fn send(&mut self, body: Option<Value>) -> Result<()> {
        let Some(mut in_flight) = self.in_flight.take() else {
            // 没有经过 open 的请求不做记录
            return self.inner.send(body);
        };
        in_flight.set_request_body(normalize_request_body(body.as_ref(), &self.options));

        // load 与 error 只会触发其一，先到者取走记录
        let slot = Arc::new(Mutex::new(Some(in_flight)));

        let on_load = {
            let slot = Arc::clone(&slot);
            let sink = self.sink.clone();
            move |completion: &Completion| {
                if let Some(in_flight) = slot.lock().ok().and_then(|mut s| s.take()) {
                    let body = completion
                        .response_text
                        .as_deref()
                        .map(parse_body_text)
                        .unwrap_or(serde_json::Value::Null);
                    sink.emit(in_flight.complete(
                        completion.status,
                        parse_header_lines(&completion.response_headers),
                        body,
                    ));
                }
            }
        };
        let on_error = {
            let slot = Arc::clone(&slot);
            let sink = self.sink.clone();
            move |completion: &Completion| {
                if let Some(in_flight) = slot.lock().ok().and_then(|mut s| s.take()) {
                    let error = completion.error.as_deref().unwrap_or("network error");
                    sink.emit(in_flight.fail(error));
                }
            }
        };
        self.inner.add_event_listener(EventKind::Load, Box::new(on_load));
        self.inner.add_event_listener(EventKind::Error, Box::new(on_error));

        if let Err(e) = self.inner.send(body) {
            // 请求没有发出：取走记录，已注册的监听器不再生效
            if let Some(in_flight) = slot.lock().ok().and_then(|mut s| s.take()) {
                self.sink.emit(in_flight.fail(&e));
            }
            return Err(e);
        }
        Ok(())
    }

    fn status(&self) -> u16 {
        self.inner.status()
    }

    fn response_text(&self) -> Option<String> {
        self.inner.response_text()
    }

    fn all_response_headers(&self) -> String {
        self.inner.all_response_headers()
    }

    fn completed(&self) -> impl Future<Output = ()> + Send {
        self.inner.completed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CapturedRequest;
    use serde_json::json;
    use tokio::sync::mpsc;

    /// 手动触发终止事件的请求
    #[derive(Default)]
    struct Manual {
        listeners: Vec<(EventKind, Listener)>,
        sent: bool,
        reject_send: bool,
    }

    impl Manual {
        fn finish(&mut self, completion: Completion) {
            for (kind, listener) in std::mem::take(&mut self.listeners) {
                if kind == completion.kind {
                    listener(&completion);
                }
            }
        }
    }

    impl ProgressiveRequest for Manual {
        fn open(&mut self, _method: &str, _url: &str) -> Result<()> {
            Ok(())
        }
        fn set_request_header(&mut self, _name: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        fn add_event_listener(&mut self, kind: EventKind, listener: Listener) {
            self.listeners.push((kind, listener));
        }
        fn send(&mut self, _body: Option<Value>) -> Result<()> {
            if self.reject_send {
                return Err(crate::ApiHackerError::Other(
                    "Invalid header value x-bad".to_string(),
                ));
            }
            self.sent = true;
            Ok(())
        }
        fn status(&self) -> u16 {
            0
        }
        fn response_text(&self) -> Option<String> {
            None
        }
        fn all_response_headers(&self) -> String {
            String::new()
        }
        fn completed(&self) -> impl Future<Output = ()> + Send {
            std::future::ready(())
        }
    }

    #[test]
    fn test_load_emits_record() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let mut request = InterceptedRequest::new(Manual::default(), tx);

        request.open("POST", "https://a.com/submit").unwrap();
        request.set_request_header("Content-Type", "application/json").unwrap();
        request.send(Some(Value::string(r#"{"a":1}"#))).unwrap();
        assert!(request.inner().sent);
        // 发送之后设置的请求头不会被记录
        request.set_request_header("X-Late", "1").unwrap();

        request.inner.finish(Completion::load(
            201,
            "Content-Type: application/json\r\nX-Id: 9".to_string(),
            r#"{"id":9}"#.to_string(),
        ));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.method, "POST");
        assert_eq!(record.request_headers.len(), 1);
        assert_eq!(record.request_body, json!({"a": 1}));
        assert_eq!(record.response_status, 201);
        assert_eq!(record.response_headers["x-id"], "9");
        assert_eq!(record.response_body, json!({"id": 9}));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_error_emits_failure_record() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let mut request = InterceptedRequest::new(Manual::default(), tx);

        request.open("GET", "https://a.com/x").unwrap();
        request.send(None).unwrap();
        request.inner.finish(Completion::error("connection reset"));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.response_status, 0);
        assert_eq!(record.response_body, serde_json::Value::Null);
        assert_eq!(record.error.as_deref(), Some("connection reset"));
    }

    #[test]
    fn test_non_json_text_kept_raw() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let mut request = InterceptedRequest::new(Manual::default(), tx);

        request.open("GET", "https://a.com/page").unwrap();
        request.send(None).unwrap();
        request.inner.finish(Completion::load(
            200,
            String::new(),
            "<html></html>".to_string(),
        ));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.response_body, json!("<html></html>"));
        assert_eq!(record.request_body, serde_json::Value::Null);
    }

    #[test]
    fn test_send_without_open_is_not_recorded() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let mut request = InterceptedRequest::new(Manual::default(), tx);

        request.send(None).unwrap();
        request.inner.finish(Completion::load(200, String::new(), String::new()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_rejected_send_emits_failure_once() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let manual = Manual {
            reject_send: true,
            ..Default::default()
        };
        let mut request = InterceptedRequest::new(manual, tx);

        request.open("GET", "https://a.com/x").unwrap();
        assert!(request.send(None).is_err());

        let record = rx.try_recv().unwrap();
        assert_eq!(record.response_status, 0);
        assert_eq!(record.error.as_deref(), Some("Invalid header value x-bad"));

        // 留在内部请求上的监听器不会再生成记录
        request.inner.finish(Completion::error("late"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_unreadable_body_keeps_status() {
        let (tx, mut rx) = mpsc::unbounded_channel::<CapturedRequest>();
        let mut request = InterceptedRequest::new(Manual::default(), tx);

        request.open("GET", "https://a.com/x").unwrap();
        request.send(None).unwrap();
        request.inner.finish(Completion::without_body(
            200,
            "Content-Length: 100".to_string(),
        ));

        let record = rx.try_recv().unwrap();
        assert_eq!(record.response_status, 200);
        assert_eq!(record.response_headers["content-length"], "100");
        assert_eq!(record.response_body, serde_json::Value::Null);
        assert!(record.error.is_none());
    }
}
