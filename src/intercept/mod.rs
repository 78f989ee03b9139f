//! 网络调用拦截
//!
//! 两种"网络调用发起者"能力：一次性的 [`FetchIssuer`] 与基于事件的
//! [`ProgressiveRequest`]。拦截器以装饰器的方式包装原始实现，
//! 观察调用并把记录交给 [`RecordSink`]，返回值和错误原样交还调用方。

pub mod fetch;
pub mod progressive;

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::Result;
use crate::capture::CapturedRequest;
use crate::http::{FetchRequest, FetchResponse};
use crate::sanitize::Value;

pub use fetch::InterceptedFetch;
pub use progressive::InterceptedRequest;

/// 记录的去向
pub trait RecordSink: Send + Sync {
    fn emit(&self, record: CapturedRequest);
}

impl<S: RecordSink + ?Sized> RecordSink for Arc<S> {
    fn emit(&self, record: CapturedRequest) {
        (**self).emit(record)
    }
}

impl RecordSink for mpsc::UnboundedSender<CapturedRequest> {
    fn emit(&self, record: CapturedRequest) {
        if self.send(record).is_err() {
            debug!("Record receiver dropped, record discarded");
        }
    }
}

/// 一次性请求/响应
pub trait FetchIssuer: Send + Sync {
    fn fetch(&self, request: FetchRequest) -> impl Future<Output = Result<FetchResponse>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Load,
    Error,
}

/// 终止事件发生时请求的状态
#[derive(Debug, Clone)]
pub struct Completion {
    pub kind: EventKind,
    /// 网络错误时为 0
    pub status: u16,
    pub response_text: Option<String>,
    /// CRLF 分隔的 `name: value` 行
    pub response_headers: String,
    pub error: Option<String>,
}

impl Completion {
    pub fn load(status: u16, response_headers: String, response_text: String) -> Self {
        Self {
            kind: EventKind::Load,
            status,
            response_text: Some(response_text),
            response_headers,
            error: None,
        }
    }

    /// 响应头已到达但响应体读取失败
    pub fn without_body(status: u16, response_headers: String) -> Self {
        Self {
            kind: EventKind::Load,
            status,
            response_text: None,
            response_headers,
            error: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Error,
            status: 0,
            response_text: None,
            response_headers: String::new(),
            error: Some(error.into()),
        }
    }
}

/// 终止事件监听器，只会被调用一次
pub type Listener = Box<dyn FnOnce(&Completion) + Send + 'static>;

/// 基于事件的请求：open → set_request_header* → send → load | error
pub trait ProgressiveRequest: Send {
    fn open(&mut self, method: &str, url: &str) -> Result<()>;

    fn set_request_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// 终止事件之后注册的监听器不会被调用
    fn add_event_listener(&mut self, kind: EventKind, listener: Listener);

    /// 发出请求并立即返回，结果通过监听器送达
    fn send(&mut self, body: Option<Value>) -> Result<()>;

    fn status(&self) -> u16;

    fn response_text(&self) -> Option<String>;

    fn all_response_headers(&self) -> String;

    /// 在终止事件及其全部监听器执行完毕后完成
    fn completed(&self) -> impl Future<Output = ()> + Send;
}
