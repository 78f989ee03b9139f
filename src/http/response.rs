use reqwest::header::HeaderMap as Headers;
use serde::de::DeserializeOwned;

use crate::http::types::Status;
use crate::{ApiHackerError, Result};

/// 一次性请求的响应，响应体已完整读入，可以被多次读取
///
/// 收到响应头之后读取响应体失败时 `body` 为 None，状态码和响应头照常保留。
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: Status,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
}

impl FetchResponse {
    pub fn new(status: u16, headers: Headers, body: Vec<u8>) -> Self {
        Self {
            status: Status::new(status),
            headers,
            body: Some(body),
        }
    }

    /// 响应体读取失败
    pub fn without_body(status: u16, headers: Headers) -> Self {
        Self {
            status: Status::new(status),
            headers,
            body: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// 响应体不可用时为空字符串
    pub fn text(&self) -> String {
        self.body
            .as_deref()
            .map(|body| String::from_utf8_lossy(body).into_owned())
            .unwrap_or_default()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| ApiHackerError::ParseError("response body unavailable".to_string()))?;
        Ok(serde_json::from_slice(body)?)
    }
}
