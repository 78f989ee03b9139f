pub mod broker;
pub mod content;
pub mod protocol;

pub use broker::{Broker, BrokerHandle, DeliveryError};
pub use content::Relay;
pub use protocol::{Ack, AckStatus, Envelope, Message, PROTOCOL_VERSION, SenderInfo};
