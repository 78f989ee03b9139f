use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::debug;

use crate::http::request::FetchRequest;
use crate::http::response::FetchResponse;
use crate::intercept::FetchIssuer;
use crate::sanitize::{SanitizeOptions, Value, sanitize};
use crate::{ApiHackerError, Result};

/// 基于 reqwest 的一次性请求发起者
#[derive(Clone, Default)]
pub struct HttpFetcher {
    inner: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(inner: reqwest::Client) -> Self {
        Self { inner }
    }
}

impl FetchIssuer for HttpFetcher {
    async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse> {
        let method = parse_method(request.method_or_default())?;
        let url = reqwest::Url::parse(&request.url)?;
        let headers = build_headers(&request.headers)?;

        let mut req = self.inner.request(method, url).headers(headers);
        if let Some(body) = encode_body(request.body.as_ref())? {
            req = req.body(body);
        }

        let response = req.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        // 响应头已经到达，响应体读取失败不算传输失败
        match response.bytes().await {
            Ok(body) => Ok(FetchResponse::new(status, headers, body.to_vec())),
            Err(e) => {
                debug!(status, error = %e, "Response body unreadable");
                Ok(FetchResponse::without_body(status, headers))
            }
        }
    }
}

pub(crate) fn parse_method(method: &str) -> Result<reqwest::Method> {
    reqwest::Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|_| ApiHackerError::ParseError(format!("Invalid HTTP method: {}", method)))
}

pub(crate) fn build_headers(pairs: &[(String, String)]) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (key, value) in pairs {
        let name = HeaderName::from_bytes(key.trim().as_bytes())
            .map_err(|e| ApiHackerError::ParseError(format!("Invalid header name {key}: {e}")))?;
        let value = HeaderValue::from_str(value.trim())
            .map_err(|e| ApiHackerError::ParseError(format!("Invalid header value {key}: {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}

/// 文本原样发送，结构化值清洗后按 JSON 发送
pub(crate) fn encode_body(body: Option<&Value>) -> Result<Option<String>> {
    match body {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.clone())),
        Some(other) => {
            let json: serde_json::Value = sanitize(other, &SanitizeOptions::default()).into();
            Ok(Some(serde_json::to_string(&json)?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method_case_insensitive() {
        assert_eq!(parse_method("post").unwrap(), reqwest::Method::POST);
        assert!(parse_method("BAD METHOD").is_err());
    }

    #[test]
    fn test_build_headers_rejects_invalid_name() {
        let pairs = vec![("bad name".to_string(), "x".to_string())];
        assert!(build_headers(&pairs).is_err());
    }

    #[test]
    fn test_encode_body() {
        assert_eq!(encode_body(None).unwrap(), None);
        assert_eq!(
            encode_body(Some(&Value::string("raw"))).unwrap(),
            Some("raw".to_string())
        );
        let object = Value::object([("a", Value::Number(1.0))]);
        assert_eq!(
            encode_body(Some(&object)).unwrap(),
            Some(r#"{"a":1}"#.to_string())
        );
    }
}
