//! Protocol client implementations for pubsub-bench
//!
//! This crate provides implementations of the `ProtocolClient` trait for:
//!
//! - MQTT 3.1.1 (via rumqttc)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod mqtt;

pub use mqtt::MqttClient;
