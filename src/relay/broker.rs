use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, warn};

use crate::relay::protocol::{Ack, Envelope, Message, SenderInfo};
use crate::{ApiHackerError, Result};

/// 检查器订阅通道的缓冲区大小
const SUBSCRIBER_CAPACITY: usize = 256;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("没有检查器在监听")]
    NoListener,
}

/// 后台代理：应答已识别的消息，并把请求更新转发给所有订阅者
///
/// 除了订阅通道外不保存任何状态，不保留也不修改 `data`。
#[derive(Debug, Clone)]
pub struct Broker {
    updates: broadcast::Sender<Message>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        let (updates, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        debug!("Background broker initialized");
        Self { updates }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.updates.subscribe()
    }

    /// 处理一条线上格式的消息
    ///
    /// 已识别的类型返回应答；未识别或格式错误的消息返回 None，不报错。
    pub fn handle(&self, raw: &serde_json::Value, sender: &SenderInfo) -> Option<Ack> {
        let message = match serde_json::from_value::<Message>(raw.clone()) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Malformed message ignored");
                return None;
            }
        };
        debug!(kind = message.kind(), tab_id = ?sender.tab_id, "Received message");

        match message {
            Message::ContentScriptReady => {
                debug!(tab_id = ?sender.tab_id, "Content script ready message received");
                Some(Ack::received())
            }
            Message::ApiRequestUpdate { data } => {
                debug!(
                    request_count = data.len(),
                    tab_id = ?sender.tab_id,
                    "API request update received"
                );
                // 投递失败只记录日志，发送方照常收到应答
                let _ = self.forward(Message::ApiRequestUpdate { data });
                Some(Ack::received())
            }
            Message::SidebarReady | Message::Unknown => None,
        }
    }

    /// 转发给所有订阅者，返回收到消息的订阅者数量
    pub fn forward(&self, message: Message) -> std::result::Result<usize, DeliveryError> {
        match self.updates.send(message) {
            Ok(receivers) => Ok(receivers),
            Err(_) => {
                warn!("Error forwarding message: no inspector is listening");
                Err(DeliveryError::NoListener)
            }
        }
    }

    /// 在当前 tokio 运行时上启动代理，返回句柄
    ///
    /// 所有句柄被丢弃后代理任务退出。
    pub fn spawn(self) -> BrokerHandle {
        let (inbox, mut rx) = mpsc::unbounded_channel::<Envelope>();
        let handle = BrokerHandle {
            inbox,
            broker: self.clone(),
        };

        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                if let Some(ack) = self.handle(&envelope.message, &envelope.sender) {
                    // 发送方可能已经不再等待应答
                    let _ = envelope.reply.send(ack);
                }
            }
            debug!("Background broker stopped");
        });

        handle
    }
}

/// 与代理通信的句柄
#[derive(Debug, Clone)]
pub struct BrokerHandle {
    inbox: mpsc::UnboundedSender<Envelope>,
    broker: Broker,
}

impl BrokerHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<Message> {
        self.broker.subscribe()
    }

    /// 同步投递消息，返回应答接收端
    ///
    /// 同一个句柄上的消息按发送顺序到达代理。
    pub fn dispatch(
        &self,
        message: &Message,
        sender: SenderInfo,
    ) -> Result<oneshot::Receiver<Ack>> {
        let (reply, ack) = oneshot::channel();
        let envelope = Envelope {
            message: serde_json::to_value(message)?,
            sender,
            reply,
        };
        self.inbox
            .send(envelope)
            .map_err(|_| ApiHackerError::ChannelClosed("background broker stopped".to_string()))?;
        Ok(ack)
    }

    /// 发送消息并等待应答；代理没有应答时返回 None
    pub async fn send(&self, message: &Message, sender: SenderInfo) -> Result<Option<Ack>> {
        let ack = self.dispatch(message, sender)?;
        Ok(ack.await.ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_recognized_types_are_acked() {
        let broker = Broker::new();
        let _subscriber = broker.subscribe();
        let sender = SenderInfo::tab(3);

        assert_eq!(
            broker.handle(&json!({"type": "contentScriptReady"}), &sender),
            Some(Ack::received())
        );
        assert_eq!(
            broker.handle(&json!({"type": "apiRequestUpdate", "data": []}), &sender),
            Some(Ack::received())
        );
    }

    #[test]
    fn test_unrecognized_types_are_ignored() {
        let broker = Broker::new();
        let sender = SenderInfo::default();

        assert_eq!(broker.handle(&json!({"type": "sidebarReady"}), &sender), None);
        assert_eq!(broker.handle(&json!({"type": "bogus"}), &sender), None);
        assert_eq!(broker.handle(&json!({"no_type": true}), &sender), None);
        assert_eq!(broker.handle(&json!("text"), &sender), None);
    }

    #[test]
    fn test_forward_without_listener() {
        let broker = Broker::new();
        assert_eq!(
            broker.forward(Message::update(Vec::new())),
            Err(DeliveryError::NoListener)
        );
        // 没有监听者时发送方依然得到应答
        assert_eq!(
            broker.handle(
                &json!({"type": "apiRequestUpdate", "data": []}),
                &SenderInfo::default()
            ),
            Some(Ack::received())
        );
    }

    #[tokio::test]
    async fn test_forward_reaches_subscriber() {
        let broker = Broker::new();
        let mut subscriber = broker.subscribe();

        assert_eq!(broker.forward(Message::update(Vec::new())), Ok(1));
        assert_eq!(subscriber.recv().await.unwrap(), Message::update(Vec::new()));
    }

    #[tokio::test]
    async fn test_spawned_broker_replies() {
        let handle = Broker::new().spawn();
        let sender = SenderInfo::tab(1);

        let ack = handle.send(&Message::ContentScriptReady, sender).await.unwrap();
        assert_eq!(ack, Some(Ack::received()));

        let ack = handle.send(&Message::SidebarReady, sender).await.unwrap();
        assert_eq!(ack, None);
    }
}
