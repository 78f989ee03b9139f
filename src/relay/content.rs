use tracing::{debug, warn};

use crate::Result;
use crate::capture::CapturedRequest;
use crate::intercept::RecordSink;
use crate::relay::broker::BrokerHandle;
use crate::relay::protocol::{Ack, Message, SenderInfo};

/// 页面侧的中继：把每条记录包装成 `apiRequestUpdate` 发给代理
///
/// 发送不阻塞页面；应答（或没有应答）只写日志。
#[derive(Debug, Clone)]
pub struct Relay {
    broker: BrokerHandle,
    sender: SenderInfo,
}

impl Relay {
    pub fn new(broker: BrokerHandle, sender: SenderInfo) -> Self {
        Self { broker, sender }
    }

    /// 通知代理页面侧已就绪
    pub async fn announce_ready(&self) -> Result<Option<Ack>> {
        debug!("Page loaded, sending ready message");
        let ack = self
            .broker
            .send(&Message::ContentScriptReady, self.sender)
            .await?;
        debug!(?ack, "Ready message sent");
        Ok(ack)
    }
}

impl RecordSink for Relay {
    fn emit(&self, record: CapturedRequest) {
        debug!(id = %record.id, url = %record.url, "Sending request update");
        let ack = match self.broker.dispatch(&Message::update(vec![record]), self.sender) {
            Ok(ack) => ack,
            Err(e) => {
                warn!("Error sending message: {}", e);
                return;
            }
        };

        // 投递已经按顺序完成，这里只等待应答用于日志
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                match ack.await {
                    Ok(ack) => debug!(?ack, "Message sent successfully"),
                    Err(_) => debug!("Message was not acknowledged"),
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::InFlight;
    use crate::relay::broker::Broker;

    #[tokio::test]
    async fn test_emit_reaches_subscriber() {
        let broker = Broker::new().spawn();
        let mut subscriber = broker.subscribe();
        let relay = Relay::new(broker, SenderInfo::tab(7));

        let record = InFlight::open("GET", "https://a.com/x").fail("boom");
        relay.emit(record.clone());

        let message = subscriber.recv().await.unwrap();
        assert_eq!(message, Message::update(vec![record]));
    }

    #[tokio::test]
    async fn test_emit_preserves_order() {
        let broker = Broker::new().spawn();
        let mut subscriber = broker.subscribe();
        let relay = Relay::new(broker, SenderInfo::default());

        for i in 0..5 {
            relay.emit(InFlight::open("GET", &format!("https://a.com/{i}")).fail("x"));
        }
        for i in 0..5 {
            let Message::ApiRequestUpdate { data } = subscriber.recv().await.unwrap() else {
                panic!("expected update");
            };
            assert_eq!(data[0].url, format!("https://a.com/{i}"));
        }
    }

    #[tokio::test]
    async fn test_announce_ready_is_acked() {
        let relay = Relay::new(Broker::new().spawn(), SenderInfo::tab(1));
        assert_eq!(relay.announce_ready().await.unwrap(), Some(Ack::received()));
    }

    #[tokio::test]
    async fn test_emit_without_inspector_does_not_fail() {
        let relay = Relay::new(Broker::new().spawn(), SenderInfo::default());
        relay.emit(InFlight::open("GET", "https://a.com/x").fail("boom"));
        // 代理仍然正常工作
        assert_eq!(relay.announce_ready().await.unwrap(), Some(Ack::received()));
    }
}
