//! 上下文之间的消息格式
//!
//! ```text
//! { "type": "contentScriptReady" }                        -> { "status": "received" }
//! { "type": "apiRequestUpdate", "data": [CapturedRequest] } -> { "status": "received" }
//! ```

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::capture::CapturedRequest;

/// 消息格式版本，格式变化时递增
pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// 页面侧加载完成
    ContentScriptReady,
    /// 一批新捕获的请求
    ApiRequestUpdate {
        #[serde(default)]
        data: Vec<CapturedRequest>,
    },
    /// 检查器挂载完成；代理不识别这种消息，不会应答
    SidebarReady,
    /// 其他任何类型
    #[serde(other)]
    Unknown,
}

impl Message {
    pub fn update(data: Vec<CapturedRequest>) -> Self {
        Message::ApiRequestUpdate { data }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Message::ContentScriptReady => "contentScriptReady",
            Message::ApiRequestUpdate { .. } => "apiRequestUpdate",
            Message::SidebarReady => "sidebarReady",
            Message::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckStatus {
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub status: AckStatus,
}

impl Ack {
    pub fn received() -> Self {
        Self {
            status: AckStatus::Received,
        }
    }
}

/// 发送方信息
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderInfo {
    pub tab_id: Option<u32>,
}

impl SenderInfo {
    pub fn tab(tab_id: u32) -> Self {
        Self {
            tab_id: Some(tab_id),
        }
    }
}

/// 投递给代理的信封：线上格式的消息、发送方和应答通道
///
/// 代理不应答时 `reply` 被直接丢弃，发送方据此得知没有应答。
#[derive(Debug)]
pub struct Envelope {
    pub message: serde_json::Value,
    pub sender: SenderInfo,
    pub reply: oneshot::Sender<Ack>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ready_wire_shape() {
        let value = serde_json::to_value(Message::ContentScriptReady).unwrap();
        assert_eq!(value, json!({"type": "contentScriptReady"}));
    }

    #[test]
    fn test_update_wire_shape() {
        let value = serde_json::to_value(Message::update(Vec::new())).unwrap();
        assert_eq!(value, json!({"type": "apiRequestUpdate", "data": []}));
    }

    #[test]
    fn test_update_without_data() {
        let message: Message = serde_json::from_value(json!({"type": "apiRequestUpdate"})).unwrap();
        assert_eq!(message, Message::update(Vec::new()));
    }

    #[test]
    fn test_unknown_type() {
        let message: Message = serde_json::from_value(json!({"type": "somethingElse"})).unwrap();
        assert_eq!(message, Message::Unknown);
        assert_eq!(message.kind(), "unknown");
    }

    #[test]
    fn test_ack_wire_shape() {
        let value = serde_json::to_value(Ack::received()).unwrap();
        assert_eq!(value, json!({"status": "received"}));
    }
}
