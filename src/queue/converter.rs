//! Mapping between application messages and broker-native messages
//!
//! Outbound messages carry only key and payload; the topic is chosen by the
//! producer. Inbound messages carry topic, key and payload, plus the
//! redelivery count and id for diagnostics. Acknowledgement still uses the
//! native [`BrokerMessage`].

use crate::broker::{BrokerMessage, OutboundMessage};
use crate::queue::message::Message;

pub fn to_outbound(message: &Message) -> OutboundMessage {
    OutboundMessage {
        key: message.key.clone(),
        payload: message.payload.clone(),
    }
}

pub fn from_broker(message: &BrokerMessage) -> Message {
    Message {
        topic: message.topic.clone(),
        key: message.key.clone(),
        payload: message.payload.clone(),
        redelivery_count: message.redelivery_count,
        message_id: Some(message.id),
    }
}
