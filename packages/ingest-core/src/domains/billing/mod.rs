//! Pre-flight quota checks against the billing service.

pub mod client;

pub use client::{BillingClient, LimitCheck, UsageType};
