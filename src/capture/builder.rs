use std::fmt::Display;
use std::time::Instant;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::capture::model::{CapturedRequest, Headers};

const ID_LEN: usize = 11;
const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// 随机 base-36 标识
pub fn random_id() -> String {
    let mut rng = rand::rng();
    (0..ID_LEN)
        .map(|_| ID_ALPHABET[rng.random_range(0..ID_ALPHABET.len())] as char)
        .collect()
}

/// 进行中的请求
///
/// 在调用开始时创建，随调用推进逐步填充；`complete` / `fail` 消费自身，
/// 因此每个请求只会生成一条记录。
#[derive(Debug, Clone)]
pub struct InFlight {
    id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    method: String,
    url: String,
    request_headers: Headers,
    request_body: serde_json::Value,
}

impl InFlight {
    pub fn open(method: &str, url: &str) -> Self {
        let now = Utc::now();
        Self {
            id: random_id(),
            // 截断到毫秒，与线上格式一致
            started_at: DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now),
            started: Instant::now(),
            method: method.to_string(),
            url: url.to_string(),
            request_headers: Headers::new(),
            request_body: serde_json::Value::Null,
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set_request_header(&mut self, name: &str, value: &str) {
        self.request_headers
            .insert(name.trim().to_lowercase(), value.trim().to_string());
    }

    pub fn set_request_body(&mut self, body: serde_json::Value) {
        self.request_body = body;
    }

    fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// 收到响应：生成成功记录
    pub fn complete(
        self,
        status: u16,
        response_headers: Headers,
        response_body: serde_json::Value,
    ) -> CapturedRequest {
        let duration = self.elapsed_ms();
        CapturedRequest {
            id: self.id,
            timestamp: self.started_at,
            method: self.method,
            url: self.url,
            request_headers: self.request_headers,
            request_body: self.request_body,
            response_status: status,
            response_headers,
            response_body,
            duration,
            error: None,
        }
    }

    /// 传输失败：状态为 0，无响应头和响应体
    pub fn fail(self, error: impl Display) -> CapturedRequest {
        let duration = self.elapsed_ms();
        CapturedRequest {
            id: self.id,
            timestamp: self.started_at,
            method: self.method,
            url: self.url,
            request_headers: self.request_headers,
            request_body: self.request_body,
            response_status: 0,
            response_headers: Headers::new(),
            response_body: serde_json::Value::Null,
            duration,
            error: Some(error.to_string()),
        }
    }
}
