//! Usage event publishing to the billing subsystem.

pub mod events;
pub mod publisher;

pub use events::UsageEvent;
pub use publisher::{BrokerConnection, BrokerConnector, NatsConnector, UsagePublisher};
