//! HTTP client for the billing service.
//!
//! The gate runs before any heavy work. It fails open: billing exists
//! to prevent abuse, not to take the platform down with it, so an
//! unreachable or broken billing service allows the operation and
//! records a machine-readable reason. The one exception is a 401,
//! which is the caller's problem and is never failed open.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::common::TenantId;
use crate::domains::error::{ServiceError, ServiceResult};

/// Fast timeout: a slow billing service must not stall uploads.
const BILLING_TIMEOUT: Duration = Duration::from_secs(5);

/// Billable resource kinds the gate can check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageType {
    Documents,
    Websites,
    DailyChats,
    MonthlyChats,
}

impl std::fmt::Display for UsageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UsageType::Documents => write!(f, "documents"),
            UsageType::Websites => write!(f, "websites"),
            UsageType::DailyChats => write!(f, "daily_chats"),
            UsageType::MonthlyChats => write!(f, "monthly_chats"),
        }
    }
}

/// Billing's verdict, or a synthesized fail-open verdict.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitCheck {
    pub allowed: bool,
    #[serde(default)]
    pub usage_type: Option<String>,
    #[serde(default)]
    pub current_usage: Option<i64>,
    /// -1 means unlimited.
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub remaining: Option<i64>,
    #[serde(default)]
    pub unlimited: Option<bool>,
    #[serde(default)]
    pub reason: Option<String>,
}

impl LimitCheck {
    fn fail_open(reason: &str) -> Self {
        Self {
            allowed: true,
            usage_type: None,
            current_usage: None,
            limit: None,
            remaining: None,
            unlimited: None,
            reason: Some(reason.to_string()),
        }
    }
}

pub struct BillingClient {
    http: reqwest::Client,
    base_url: String,
}

impl BillingClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Check remaining quota for one resource type.
    pub async fn check_usage_limit(
        &self,
        access_token: &str,
        usage_type: UsageType,
    ) -> ServiceResult<LimitCheck> {
        let endpoint = format!("{}/api/v1/usage/check/{}", self.base_url, usage_type);
        self.get_check(&endpoint, access_token, &usage_type.to_string())
            .await
    }

    /// Combined subscription + website-limit check used before starting
    /// an ingestion.
    pub async fn check_can_ingest_website(
        &self,
        access_token: &str,
        tenant_id: TenantId,
    ) -> ServiceResult<LimitCheck> {
        let endpoint = format!("{}/api/v1/restrictions/can-ingest-website", self.base_url);
        tracing::debug!(tenant_id = %tenant_id, "Checking website ingestion restriction");
        self.get_check(&endpoint, access_token, "websites").await
    }

    async fn get_check(
        &self,
        endpoint: &str,
        access_token: &str,
        usage_type: &str,
    ) -> ServiceResult<LimitCheck> {
        let response = match self
            .http
            .get(endpoint)
            .bearer_auth(access_token)
            .timeout(BILLING_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) if err.is_timeout() => {
                tracing::warn!(
                    usage_type = %usage_type,
                    "Billing service timeout - allowing operation (fail-open)"
                );
                return Ok(LimitCheck::fail_open("billing_service_timeout"));
            }
            Err(err) if err.is_connect() => {
                tracing::error!(
                    usage_type = %usage_type,
                    error = %err,
                    "Cannot connect to billing service - allowing operation (fail-open)"
                );
                return Ok(LimitCheck::fail_open("billing_service_unavailable"));
            }
            Err(err) => {
                tracing::error!(
                    usage_type = %usage_type,
                    error = %err,
                    "Billing service request error - allowing operation (fail-open)"
                );
                return Ok(LimitCheck::fail_open("billing_service_request_error"));
            }
        };

        match response.status().as_u16() {
            200 => match response.json::<LimitCheck>().await {
                Ok(check) => {
                    tracing::info!(
                        usage_type = %usage_type,
                        allowed = check.allowed,
                        current_usage = ?check.current_usage,
                        limit = ?check.limit,
                        "Usage limit check completed"
                    );
                    Ok(check)
                }
                Err(err) => {
                    tracing::error!(usage_type = %usage_type, error = %err, "Unparseable billing response");
                    Ok(LimitCheck::fail_open("billing_service_unexpected_error"))
                }
            },
            401 => {
                tracing::error!(usage_type = %usage_type, "Billing service authentication failed");
                Err(ServiceError::Auth(
                    "Authentication failed with billing service".to_string(),
                ))
            }
            404 => {
                tracing::error!(
                    usage_type = %usage_type,
                    "Billing service endpoint not found - allowing operation (fail-open)"
                );
                Ok(LimitCheck::fail_open("billing_service_endpoint_not_found"))
            }
            status => {
                tracing::warn!(
                    usage_type = %usage_type,
                    status,
                    "Billing service returned non-2xx status - allowing operation (fail-open)"
                );
                Ok(LimitCheck::fail_open("billing_service_error"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_allowed_response_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/usage/check/documents"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allowed": true,
                "usage_type": "documents",
                "current_usage": 3,
                "limit": 10,
                "remaining": 7,
                "unlimited": false,
                "reason": null
            })))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let check = client
            .check_usage_limit("tok", UsageType::Documents)
            .await
            .unwrap();
        assert!(check.allowed);
        assert_eq!(check.remaining, Some(7));
    }

    #[tokio::test]
    async fn test_denied_response_passes_through() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/usage/check/websites"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allowed": false,
                "usage_type": "websites",
                "current_usage": 5,
                "limit": 5,
                "remaining": 0,
                "unlimited": false,
                "reason": "Website limit reached for current plan"
            })))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let check = client
            .check_usage_limit("tok", UsageType::Websites)
            .await
            .unwrap();
        assert!(!check.allowed);
        assert!(check.reason.unwrap().contains("limit"));
    }

    #[tokio::test]
    async fn test_401_is_not_failed_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let err = client
            .check_usage_limit("bad", UsageType::Documents)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Auth(_)));
    }

    #[tokio::test]
    async fn test_404_fails_open_with_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let check = client
            .check_usage_limit("tok", UsageType::Documents)
            .await
            .unwrap();
        assert!(check.allowed);
        assert_eq!(
            check.reason.as_deref(),
            Some("billing_service_endpoint_not_found")
        );
    }

    #[tokio::test]
    async fn test_5xx_fails_open() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let check = client
            .check_usage_limit("tok", UsageType::MonthlyChats)
            .await
            .unwrap();
        assert!(check.allowed);
        assert_eq!(check.reason.as_deref(), Some("billing_service_error"));
    }

    #[tokio::test]
    async fn test_unreachable_service_fails_open() {
        // Nothing is listening on this port.
        let client = BillingClient::new("http://127.0.0.1:9");
        let check = client
            .check_usage_limit("tok", UsageType::Websites)
            .await
            .unwrap();
        assert!(check.allowed);
        assert!(check.reason.is_some());
    }

    #[tokio::test]
    async fn test_can_ingest_website_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/restrictions/can-ingest-website"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "allowed": true
            })))
            .mount(&server)
            .await;

        let client = BillingClient::new(server.uri());
        let check = client
            .check_can_ingest_website("tok", TenantId::new())
            .await
            .unwrap();
        assert!(check.allowed);
    }
}
