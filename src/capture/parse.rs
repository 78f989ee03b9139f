use reqwest::header::HeaderMap;

use crate::capture::model::Headers;
use crate::sanitize::{SanitizeOptions, Value, sanitize};

/// 解析 `getAllResponseHeaders` 风格的原始头部文本
///
/// 每行 `name: value`，行之间以 CRLF 分隔。键转为小写，重复键以最后一次为准，
/// 没有冒号或名字为空的行被忽略；值可以为空。
pub fn parse_header_lines(raw: &str) -> Headers {
    let mut headers = Headers::new();
    for line in raw.split('\n') {
        let line = line.trim_end_matches('\r');
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            continue;
        }
        headers.insert(name.to_lowercase(), value.to_string());
    }
    headers
}

/// 把 `HeaderMap` 转为小写键映射，非 UTF-8 的值按空字符串处理
pub fn headers_from_map(map: &HeaderMap) -> Headers {
    let mut headers = Headers::new();
    for (name, value) in map.iter() {
        // HeaderName 已经是小写
        let value = value.to_str().unwrap_or("").to_string();
        headers.insert(name.as_str().to_string(), value);
    }
    headers
}

/// 转回 CRLF 分隔的头部文本
pub fn header_lines(map: &HeaderMap) -> String {
    map.iter()
        .map(|(name, value)| format!("{}: {}", name, value.to_str().unwrap_or("")))
        .collect::<Vec<_>>()
        .join("\r\n")
}

/// 文本是合法 JSON 时返回解析结果，否则返回原始文本
pub fn parse_body_text(text: &str) -> serde_json::Value {
    serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.to_string()))
}

/// JSON → UTF-8 文本 → null
pub fn parse_body_bytes(bytes: &[u8]) -> serde_json::Value {
    if let Ok(json) = serde_json::from_slice(bytes) {
        return json;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::Value::String(text.to_string()),
        Err(_) => serde_json::Value::Null,
    }
}

/// 规范化调用方声明的请求体
///
/// 缺省或空文本为 null；文本按 JSON 尝试解析；其他结构化值先经过清洗。
pub fn normalize_request_body(
    body: Option<&Value>,
    options: &SanitizeOptions,
) -> serde_json::Value {
    match body {
        None | Some(Value::Null) => serde_json::Value::Null,
        Some(Value::String(text)) if text.is_empty() => serde_json::Value::Null,
        Some(Value::String(text)) => parse_body_text(text),
        Some(other) => sanitize(other, options).into(),
    }
}
