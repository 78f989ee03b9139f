use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// 小写键的头部映射，保持首次出现的顺序，重复键以最后一次写入为准
pub type Headers = IndexMap<String, String>;

/// 一次被拦截的 HTTP 调用
///
/// 在终止事件（成功或失败）时一次性生成，之后不再修改。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedRequest {
    /// 随机 base-36 标识，不保证全局唯一
    pub id: String,

    /// 请求开始时间，线上格式为毫秒时间戳
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,

    pub method: String,
    pub url: String,
    pub request_headers: Headers,

    /// 看起来像 JSON 时为结构化数据，否则为原始文本；无请求体时为 null
    pub request_body: serde_json::Value,

    /// 0 表示请求没有到达服务器
    pub response_status: u16,
    pub response_headers: Headers,
    pub response_body: serde_json::Value,

    /// 请求耗时 (毫秒)
    pub duration: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CapturedRequest {
    pub fn is_transport_failure(&self) -> bool {
        self.response_status == 0
    }

    /// 过滤时匹配的文本: "url method"
    pub fn search_text(&self) -> String {
        format!("{} {}", self.url, self.method)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> CapturedRequest {
        CapturedRequest {
            id: "k3j2h1".to_string(),
            timestamp: DateTime::from_timestamp_millis(1_714_557_600_123).unwrap(),
            method: "GET".to_string(),
            url: "https://a.com/x".to_string(),
            request_headers: Headers::new(),
            request_body: serde_json::Value::Null,
            response_status: 200,
            response_headers: Headers::from([(
                "content-type".to_string(),
                "application/json".to_string(),
            )]),
            response_body: json!({"ok": true}),
            duration: 12,
            error: None,
        }
    }

    #[test]
    fn test_wire_field_names() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["timestamp"], json!(1_714_557_600_123i64));
        assert_eq!(value["responseStatus"], json!(200));
        assert_eq!(value["responseBody"], json!({"ok": true}));
        assert_eq!(
            value["responseHeaders"]["content-type"],
            json!("application/json")
        );
        assert!(value.get("error").is_none());
    }

    #[test]
    fn test_deserialize_from_wire() {
        let wire = json!({
            "id": "abc",
            "timestamp": 1_714_557_600_000i64,
            "method": "POST",
            "url": "https://b.com/y",
            "requestHeaders": {},
            "requestBody": "raw",
            "responseStatus": 0,
            "responseHeaders": {},
            "responseBody": null,
            "duration": 3,
            "error": "connection refused"
        });
        let record: CapturedRequest = serde_json::from_value(wire).unwrap();
        assert!(record.is_transport_failure());
        assert_eq!(record.error.as_deref(), Some("connection refused"));
        assert_eq!(record.search_text(), "https://b.com/y POST");
    }
}
