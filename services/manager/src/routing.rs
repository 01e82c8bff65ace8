//! Routing manager client.
//!
//! The routing manager learns from us which terminator instances exist and
//! which nodes each of them carries, so that RIC applications' messages reach
//! the right terminator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error};

/// Any routing manager failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    #[error("routing manager request failed: {0}")]
    Request(String),

    #[error("routing manager returned {status}: {body}")]
    Status { status: u16, body: String },
}

#[async_trait]
pub trait RoutingClient: Send + Sync {
    async fn add_instance(&self, address: &str) -> Result<(), RoutingError>;

    /// Deregister an instance together with the nodes it was carrying.
    async fn remove_instance(&self, address: &str, orphaned: &[String]) -> Result<(), RoutingError>;

    async fn associate_node(&self, address: &str, node: &str) -> Result<(), RoutingError>;

    async fn dissociate_node(&self, address: &str, node: &str) -> Result<(), RoutingError>;

    /// Drop every association of the given instances.
    async fn dissociate_all(&self, addresses: &[String]) -> Result<(), RoutingError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceBody<'a> {
    #[serde(rename = "E2TAddress")]
    address: &'a str,
    ran_name_list: &'a [String],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AssociationBody<'a> {
    #[serde(rename = "E2TAddress")]
    address: &'a str,
    ran_name_list: Vec<&'a str>,
}

/// HTTP client for the routing manager.
pub struct HttpRoutingClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRoutingClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| RoutingError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, what: &str) -> Result<(), RoutingError> {
        let response = request
            .send()
            .await
            .map_err(|e| RoutingError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, what, "Routing manager rejected request");
            return Err(RoutingError::Status {
                status: status.as_u16(),
                body,
            });
        }

        debug!(what, "Routing manager updated");
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}/ric/v1/handles/{}", self.base_url, path)
    }
}

#[async_trait]
impl RoutingClient for HttpRoutingClient {
    async fn add_instance(&self, address: &str) -> Result<(), RoutingError> {
        let body = InstanceBody {
            address,
            ran_name_list: &[],
        };
        self.send(self.client.post(self.url("e2t")).json(&body), "add instance")
            .await
    }

    async fn remove_instance(&self, address: &str, orphaned: &[String]) -> Result<(), RoutingError> {
        let body = InstanceBody {
            address,
            ran_name_list: orphaned,
        };
        self.send(self.client.delete(self.url("e2t")).json(&body), "remove instance")
            .await
    }

    async fn associate_node(&self, address: &str, node: &str) -> Result<(), RoutingError> {
        let body = [AssociationBody {
            address,
            ran_name_list: vec![node],
        }];
        self.send(
            self.client
                .post(self.url("associate-ran-to-e2t"))
                .json(&body),
            "associate node",
        )
        .await
    }

    async fn dissociate_node(&self, address: &str, node: &str) -> Result<(), RoutingError> {
        let body = [AssociationBody {
            address,
            ran_name_list: vec![node],
        }];
        self.send(
            self.client.put(self.url("dissociate-ran")).json(&body),
            "dissociate node",
        )
        .await
    }

    async fn dissociate_all(&self, addresses: &[String]) -> Result<(), RoutingError> {
        let body: Vec<_> = addresses
            .iter()
            .map(|address| AssociationBody {
                address,
                ran_name_list: Vec::new(),
            })
            .collect();
        self.send(
            self.client.put(self.url("dissociate-ran")).json(&body),
            "dissociate all",
        )
        .await
    }
}

/// A call recorded by [`MockRoutingClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingCall {
    AddInstance(String),
    RemoveInstance(String, Vec<String>),
    Associate(String, String),
    Dissociate(String, String),
    DissociateAll(Vec<String>),
}

/// Routing client that records calls instead of sending them.
#[derive(Default)]
pub struct MockRoutingClient {
    calls: Mutex<Vec<RoutingCall>>,
    failing: AtomicBool,
}

impl MockRoutingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client whose every call fails.
    pub fn failing() -> Self {
        let client = Self::default();
        client.set_failing(true);
        client
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<RoutingCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn record(&self, call: RoutingCall) -> Result<(), RoutingError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RoutingError::Status {
                status: 503,
                body: "mock routing manager configured to fail".to_string(),
            });
        }
        debug!(?call, "[MOCK] Routing call");
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
        Ok(())
    }
}

#[async_trait]
impl RoutingClient for MockRoutingClient {
    async fn add_instance(&self, address: &str) -> Result<(), RoutingError> {
        self.record(RoutingCall::AddInstance(address.to_string()))
    }

    async fn remove_instance(&self, address: &str, orphaned: &[String]) -> Result<(), RoutingError> {
        self.record(RoutingCall::RemoveInstance(
            address.to_string(),
            orphaned.to_vec(),
        ))
    }

    async fn associate_node(&self, address: &str, node: &str) -> Result<(), RoutingError> {
        self.record(RoutingCall::Associate(address.to_string(), node.to_string()))
    }

    async fn dissociate_node(&self, address: &str, node: &str) -> Result<(), RoutingError> {
        self.record(RoutingCall::Dissociate(address.to_string(), node.to_string()))
    }

    async fn dissociate_all(&self, addresses: &[String]) -> Result<(), RoutingError> {
        self.record(RoutingCall::DissociateAll(addresses.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_records_calls() {
        let client = MockRoutingClient::new();
        client.add_instance("10.0.2.15:38000").await.unwrap();
        client
            .associate_node("10.0.2.15:38000", "ran1")
            .await
            .unwrap();

        assert_eq!(
            client.calls(),
            vec![
                RoutingCall::AddInstance("10.0.2.15:38000".into()),
                RoutingCall::Associate("10.0.2.15:38000".into(), "ran1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_failing() {
        let client = MockRoutingClient::failing();
        let err = client.add_instance("10.0.2.15:38000").await.unwrap_err();
        assert!(matches!(err, RoutingError::Status { status: 503, .. }));
        assert!(client.calls().is_empty());
    }

    #[test]
    fn test_association_body_shape() {
        let body = AssociationBody {
            address: "10.0.2.15:38000",
            ran_name_list: vec!["ran1"],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["E2TAddress"], "10.0.2.15:38000");
        assert_eq!(json["ranNameList"][0], "ran1");
    }
}
