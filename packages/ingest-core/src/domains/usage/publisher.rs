//! The process-wide usage event publisher.
//!
//! One long-lived broker connection serves every publish in the
//! process. A connection that has idled for hours can still report
//! itself open, so before each publish the connection is verified with
//! a liveness probe (a bounded flush, the broker-side analogue of a
//! passive declare). Transient failures retry up to three times with
//! exponential backoff, and every retry forces a fresh connection:
//! re-publishing on a stale channel fails repeatedly. Serialization
//! failures are bugs, not outages, and never retry.
//!
//! Publish methods return `bool` and never panic or propagate; a lost
//! event after three attempts is logged as a definitive failure.

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

use super::events::UsageEvent;
use crate::common::{DocumentId, IngestionId, TenantId};

const MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const BACKOFF_FACTOR: u32 = 2;
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// A live broker connection.
#[async_trait]
pub trait BrokerConnection: Send + Sync {
    /// Cheap local check; an open connection can still be stale.
    fn is_open(&self) -> bool;

    /// Round-trip liveness probe. The only reliable staleness check.
    async fn probe(&self) -> Result<()>;

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()>;
}

/// Dials new broker connections.
#[async_trait]
pub trait BrokerConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>>;
}

pub struct NatsConnector {
    url: String,
}

impl NatsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

struct NatsConnection {
    client: async_nats::Client,
}

#[async_trait]
impl BrokerConnection for NatsConnection {
    fn is_open(&self) -> bool {
        self.client.connection_state() == async_nats::connection::State::Connected
    }

    async fn probe(&self) -> Result<()> {
        tokio::time::timeout(PROBE_TIMEOUT, self.client.flush())
            .await
            .map_err(|_| anyhow::anyhow!("broker probe timed out"))??;
        Ok(())
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<()> {
        self.client.publish(subject.to_string(), payload).await?;
        // Flush so the event is on the wire before we report success.
        self.client.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl BrokerConnector for NatsConnector {
    async fn connect(&self) -> Result<Box<dyn BrokerConnection>> {
        let client = async_nats::connect(&self.url).await?;
        tracing::info!(url = %self.url, "Connected usage publisher to broker");
        Ok(Box::new(NatsConnection { client }))
    }
}

pub struct UsagePublisher {
    connector: Box<dyn BrokerConnector>,
    /// Guards the connection across the state check, probe, and publish.
    connection: Mutex<Option<Box<dyn BrokerConnection>>>,
    initial_backoff: Duration,
    reconnections: AtomicU64,
}

impl UsagePublisher {
    pub fn new(connector: Box<dyn BrokerConnector>) -> Self {
        Self {
            connector,
            connection: Mutex::new(None),
            initial_backoff: DEFAULT_INITIAL_BACKOFF,
            reconnections: AtomicU64::new(0),
        }
    }

    /// Shorter backoff for tests.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// How many times the publisher had to dial a fresh connection.
    pub fn reconnection_count(&self) -> u64 {
        self.reconnections.load(Ordering::SeqCst)
    }

    pub async fn publish_document_added(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        filename: &str,
        file_size: i64,
    ) -> bool {
        self.publish_event(UsageEvent::document_added(
            tenant_id,
            document_id,
            filename,
            file_size,
        ))
        .await
    }

    pub async fn publish_document_removed(
        &self,
        tenant_id: TenantId,
        document_id: DocumentId,
        filename: &str,
    ) -> bool {
        self.publish_event(UsageEvent::document_removed(tenant_id, document_id, filename))
            .await
    }

    pub async fn publish_website_added(
        &self,
        tenant_id: TenantId,
        website_id: IngestionId,
        url: &str,
        pages_scraped: i64,
    ) -> bool {
        self.publish_event(UsageEvent::website_added(
            tenant_id,
            website_id,
            url,
            pages_scraped,
        ))
        .await
    }

    pub async fn publish_website_removed(
        &self,
        tenant_id: TenantId,
        website_id: IngestionId,
        url: &str,
    ) -> bool {
        self.publish_event(UsageEvent::website_removed(tenant_id, website_id, url))
            .await
    }

    async fn publish_event(&self, event: UsageEvent) -> bool {
        let subject = event.subject();
        let tenant_id = event.tenant_id();

        // Serialization failures are fatal: retrying a bug is pointless.
        let payload = match serde_json::to_vec(&event) {
            Ok(bytes) => Bytes::from(bytes),
            Err(err) => {
                tracing::error!(
                    subject = %subject,
                    tenant_id = %tenant_id,
                    error = %err,
                    "Non-retryable error serializing usage event"
                );
                return false;
            }
        };

        // Held across verification and publish for every attempt.
        let mut connection = self.connection.lock().await;

        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                let backoff = self.initial_backoff * BACKOFF_FACTOR.pow(attempt - 1);
                tracing::warn!(
                    subject = %subject,
                    tenant_id = %tenant_id,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "Retrying usage event publish"
                );
                tokio::time::sleep(backoff).await;
                // Force a fresh connection: drop the stale handle so the
                // attempt below must re-dial.
                *connection = None;
            }

            match self.try_publish(&mut connection, subject, &payload).await {
                Ok(()) => {
                    tracing::debug!(subject = %subject, tenant_id = %tenant_id, "Published usage event");
                    return true;
                }
                Err(err) => {
                    tracing::warn!(
                        subject = %subject,
                        tenant_id = %tenant_id,
                        attempt,
                        error = %err,
                        "Usage event publish attempt failed"
                    );
                    *connection = None;
                }
            }
        }

        tracing::error!(
            subject = %subject,
            tenant_id = %tenant_id,
            attempts = MAX_RETRIES + 1,
            "Failed to publish usage event after retries"
        );
        false
    }

    async fn try_publish(
        &self,
        connection: &mut Option<Box<dyn BrokerConnection>>,
        subject: &str,
        payload: &Bytes,
    ) -> Result<()> {
        if connection.is_none() {
            *connection = Some(self.connector.connect().await?);
            self.reconnections.fetch_add(1, Ordering::SeqCst);
        }
        let Some(conn) = connection.as_ref() else {
            anyhow::bail!("broker connection unavailable");
        };

        if !conn.is_open() {
            anyhow::bail!("broker connection reports closed");
        }
        conn.probe().await?;
        conn.publish(subject, payload.clone()).await?;
        Ok(())
    }
}
