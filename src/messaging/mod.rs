mod publisher;

pub use publisher::KafkaPublisher;
