use serde::Serialize;

use crate::Result;
use crate::sanitize::Value;

/// 一次性请求的描述，对应 `fetch(input, init)`
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    /// 未指定时按 GET 发送
    pub method: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl FetchRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: None,
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn method_or_default(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = Some(method.to_string());
        self
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.push((key.to_string(), value.to_string()));
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.body = Some(Value::string(text));
        self
    }

    pub fn with_json<T: Serialize>(mut self, data: &T) -> Result<Self> {
        let json = serde_json::to_string(data)?;
        self = self.with_header("Content-Type", "application/json");
        self.body = Some(Value::String(json));
        Ok(self)
    }

    /// 结构化请求体（表单对象等），发送前会被清洗并序列化为 JSON
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults_to_get() {
        let request = FetchRequest::new("https://a.com/x");
        assert_eq!(request.method_or_default(), "GET");
        assert!(request.body.is_none());
    }

    #[test]
    fn test_with_json_sets_content_type() {
        let request = FetchRequest::new("https://a.com/x")
            .with_method("POST")
            .with_json(&json!({"a": 1}))
            .unwrap();
        assert_eq!(
            request.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert_eq!(
            request.body.as_ref().and_then(Value::as_str),
            Some(r#"{"a":1}"#)
        );
    }
}
