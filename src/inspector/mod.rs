//! 请求检查器
//!
//! 订阅代理转发的 `apiRequestUpdate`，把收到的批次插入有界日志，
//! 提供文本过滤和主从视图。

pub mod filter;
pub mod log;
pub mod render;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, warn};

use crate::capture::CapturedRequest;
use crate::relay::{Ack, BrokerHandle, Message, SenderInfo};
use crate::{ApiHackerError, Result};

pub use filter::TextFilter;
pub use log::RequestLog;

/// uninitialized → listening → torn-down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectorState {
    Uninitialized,
    Listening,
    TornDown,
}

pub struct Inspector {
    state: InspectorState,
    log: RequestLog,
    filter: TextFilter,
    selected: Option<String>,
    subscription: Option<broadcast::Receiver<Message>>,
}

impl Inspector {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: InspectorState::Uninitialized,
            log: RequestLog::with_capacity(capacity),
            filter: TextFilter::default(),
            selected: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> InspectorState {
        self.state
    }

    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// 订阅代理并宣告就绪
    pub async fn mount(&mut self, broker: &BrokerHandle) -> Result<()> {
        if self.state != InspectorState::Uninitialized {
            return Err(ApiHackerError::InvalidState(format!(
                "cannot mount inspector in state {:?}",
                self.state
            )));
        }
        self.subscription = Some(broker.subscribe());
        self.state = InspectorState::Listening;
        debug!("Message listener set up successfully");

        // 代理不应答 sidebarReady，这里只确认消息已送出
        match broker.send(&Message::SidebarReady, SenderInfo::default()).await {
            Ok(_) => debug!("Sidebar ready message sent"),
            Err(e) => warn!("Error sending sidebar ready message: {}", e),
        }
        Ok(())
    }

    /// 取消订阅，之后不再接收任何消息
    pub fn unmount(&mut self) {
        if self.state == InspectorState::Listening {
            debug!("Cleaning up message listener");
        }
        self.subscription = None;
        self.state = InspectorState::TornDown;
    }

    /// 处理一条转发来的消息
    ///
    /// 只处理 `apiRequestUpdate`，其他类型返回 None。
    pub fn deliver(&mut self, message: Message) -> Result<Option<Ack>> {
        if self.state != InspectorState::Listening {
            return Err(ApiHackerError::InvalidState(format!(
                "inspector is not listening (state {:?})",
                self.state
            )));
        }
        match message {
            Message::ApiRequestUpdate { data } => {
                debug!(request_count = data.len(), "Updating requests in sidebar");
                let evicted = self.log.prepend_batch(data);
                if evicted > 0 {
                    debug!(evicted, "Oldest requests evicted");
                }
                Ok(Some(Ack::received()))
            }
            _ => Ok(None),
        }
    }

    /// 处理所有已到达的消息，不等待；返回处理的消息数
    pub fn pump(&mut self) -> Result<usize> {
        let mut handled = 0;
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(handled);
            };
            match subscription.try_recv() {
                Ok(message) => {
                    self.deliver(message)?;
                    handled += 1;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Inspector fell behind, updates dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(handled),
            }
        }
    }

    /// 等待并处理下一条消息；订阅已关闭或未挂载时返回 false
    pub async fn next_delivery(&mut self) -> Result<bool> {
        loop {
            let Some(subscription) = self.subscription.as_mut() else {
                return Ok(false);
            };
            match subscription.recv().await {
                Ok(message) => {
                    self.deliver(message)?;
                    return Ok(true);
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Inspector fell behind, updates dropped");
                }
                Err(RecvError::Closed) => return Ok(false),
            }
        }
    }

    pub fn set_filter(&mut self, text: &str) {
        self.filter = TextFilter::new(text);
    }

    pub fn filter(&self) -> &TextFilter {
        &self.filter
    }

    /// 过滤后的视图，保持日志顺序
    pub fn visible(&self) -> Vec<&CapturedRequest> {
        self.filter.apply(self.log.iter())
    }

    pub fn select(&mut self, id: &str) -> Option<&CapturedRequest> {
        let record = self.log.get(id)?;
        self.selected = Some(record.id.clone());
        Some(record)
    }

    /// 选中的记录被淘汰后返回 None
    pub fn selected(&self) -> Option<&CapturedRequest> {
        self.selected.as_deref().and_then(|id| self.log.get(id))
    }

    pub fn render(&self, color: bool) -> String {
        let visible = self.visible();
        let mut output = render::render_list(&visible, self.log.len(), color);
        if let Some(record) = self.selected() {
            output.push_str("\n\n");
            output.push_str(&render::render_detail(record, color));
        }
        output
    }
}
