mod client;
mod message_builder;

pub use client::{rcode_name, AnswerRecord, DnsExchange, DnsReply, QueryType, UdpDnsClient};
pub use message_builder::MessageBuilder;
