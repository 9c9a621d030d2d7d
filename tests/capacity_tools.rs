//! Operation template tests using in-process stubs
//!
//! These tests pin down the behavior of the four capacity operations:
//! handle release on every path, unchanged error propagation, and the
//! fire-and-forget acknowledgment of long-running operations.

use async_trait::async_trait;
use fabric_admin_mcp::build_server;
use fabric_admin_mcp::capacity::remote::{CapacityApi, Connector, Credential, Poller};
use fabric_admin_mcp::capacity::{CapacityTools, RawCapacity};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

/// Error the stub client raises for missing resources
#[derive(Debug, thiserror::Error)]
#[error("sentinel: capacity {0} not found")]
struct NotFoundSentinel(String);

#[derive(Default)]
struct Counters {
    credentials_opened: AtomicUsize,
    credentials_closed: AtomicUsize,
    clients_opened: AtomicUsize,
    clients_closed: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> (usize, usize, usize, usize) {
        (
            self.credentials_opened.load(Ordering::SeqCst),
            self.credentials_closed.load(Ordering::SeqCst),
            self.clients_opened.load(Ordering::SeqCst),
            self.clients_closed.load(Ordering::SeqCst),
        )
    }
}

struct StubCredential {
    counters: Arc<Counters>,
}

#[async_trait]
impl Credential for StubCredential {
    async fn token(&self) -> anyhow::Result<String> {
        Ok("stub-token".to_string())
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.credentials_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Poller of an operation that never finishes
struct PendingPoller;

impl Poller for PendingPoller {
    fn status(&self) -> String {
        "InProgress".to_string()
    }
}

#[derive(Clone, Default)]
struct Fixture {
    items: Vec<Value>,
    fail_calls: bool,
    hang_calls: bool,
    fail_client: bool,
    fail_close: bool,
}

struct StubClient {
    counters: Arc<Counters>,
    fixture: Fixture,
}

impl StubClient {
    fn check(&self, capacity_name: &str) -> anyhow::Result<()> {
        if self.fixture.fail_calls {
            return Err(NotFoundSentinel(capacity_name.to_string()).into());
        }
        Ok(())
    }
}

#[async_trait]
impl CapacityApi for StubClient {
    async fn list_by_subscription(&self) -> anyhow::Result<Vec<RawCapacity>> {
        self.check("*")?;
        Ok(self.fixture.items.iter().cloned().map(RawCapacity::from).collect())
    }

    async fn get(&self, _resource_group: &str, capacity_name: &str) -> anyhow::Result<RawCapacity> {
        self.check(capacity_name)?;
        if self.fixture.hang_calls {
            std::future::pending::<()>().await;
        }
        let item = self
            .fixture
            .items
            .iter()
            .find(|i| i["name"] == capacity_name)
            .cloned()
            .ok_or_else(|| NotFoundSentinel(capacity_name.to_string()))?;
        Ok(RawCapacity::from(item))
    }

    async fn begin_resume(&self, _resource_group: &str, capacity_name: &str) -> anyhow::Result<Box<dyn Poller>> {
        self.check(capacity_name)?;
        Ok(Box::new(PendingPoller))
    }

    async fn begin_suspend(&self, _resource_group: &str, capacity_name: &str) -> anyhow::Result<Box<dyn Poller>> {
        self.check(capacity_name)?;
        Ok(Box::new(PendingPoller))
    }

    async fn close(&self) -> anyhow::Result<()> {
        self.counters.clients_closed.fetch_add(1, Ordering::SeqCst);
        if self.fixture.fail_close {
            anyhow::bail!("close failed");
        }
        Ok(())
    }
}

struct StubConnector {
    counters: Arc<Counters>,
    fixture: Fixture,
}

#[async_trait]
impl Connector for StubConnector {
    async fn credential(&self) -> anyhow::Result<Arc<dyn Credential>> {
        self.counters.credentials_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubCredential {
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn client(
        &self,
        _credential: Arc<dyn Credential>,
        _subscription_id: &str,
    ) -> anyhow::Result<Arc<dyn CapacityApi>> {
        if self.fixture.fail_client {
            anyhow::bail!("client construction failed");
        }
        self.counters.clients_opened.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(StubClient {
            counters: Arc::clone(&self.counters),
            fixture: self.fixture.clone(),
        }))
    }
}

fn stub(fixture: Fixture) -> (Arc<StubConnector>, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let connector = Arc::new(StubConnector {
        counters: Arc::clone(&counters),
        fixture,
    });
    (connector, counters)
}

fn tools(fixture: Fixture) -> (CapacityTools, Arc<Counters>) {
    let (connector, counters) = stub(fixture);
    (CapacityTools::new(connector), counters)
}

fn capacity(name: &str) -> Value {
    json!({
        "id": format!("/subscriptions/sub-1/resourceGroups/rg-{}/providers/Microsoft.Fabric/capacities/{}", name, name),
        "name": name,
        "properties": {"state": "Active"}
    })
}

#[tokio::test]
async fn test_list_empty_subscription() {
    let (tools, counters) = tools(Fixture::default());

    let list = assert_ok!(tools.list_capacities("sub-1").await);
    assert_eq!(serde_json::to_value(&list).unwrap(), json!({"capacities": []}));
    assert_eq!(counters.snapshot(), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_list_keeps_remote_order() {
    let (tools, counters) = tools(Fixture {
        items: vec![capacity("zeta"), capacity("alpha"), capacity("mid")],
        ..Default::default()
    });

    let list = assert_ok!(tools.list_capacities("sub-1").await);
    let groups: Vec<_> = list
        .capacities
        .iter()
        .map(|c| c.resource_group.clone().unwrap())
        .collect();
    assert_eq!(groups, vec!["rg-zeta", "rg-alpha", "rg-mid"]);
    assert_eq!(counters.snapshot(), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_get_returns_normalized_capacity() {
    let (tools, counters) = tools(Fixture {
        items: vec![capacity("alpha")],
        ..Default::default()
    });

    let cap = assert_ok!(tools.get_capacity("sub-1", "rg-alpha", "alpha").await);
    assert_eq!(cap.name.as_deref(), Some("alpha"));
    assert_eq!(cap.state.as_deref(), Some("Active"));
    assert!(cap.sku.is_empty());
    assert_eq!(counters.snapshot(), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_get_missing_propagates_sentinel_and_releases() {
    let (tools, counters) = tools(Fixture::default());

    let err = assert_err!(tools.get_capacity("sub-1", "rg", "ghost").await);
    let sentinel = err.downcast_ref::<NotFoundSentinel>().expect("error must be passed through unchanged");
    assert_eq!(sentinel.0, "ghost");
    assert_eq!(err.to_string(), "sentinel: capacity ghost not found");
    assert_eq!(counters.snapshot(), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_every_operation_releases_on_failure() {
    let (tools, counters) = tools(Fixture {
        fail_calls: true,
        ..Default::default()
    });

    assert_err!(tools.list_capacities("sub-1").await);
    assert_err!(tools.get_capacity("sub-1", "rg", "c").await);
    assert_err!(tools.resume_capacity("sub-1", "rg", "c").await);
    assert_err!(tools.pause_capacity("sub-1", "rg", "c").await);

    assert_eq!(counters.snapshot(), (4, 4, 4, 4));
}

#[tokio::test]
async fn test_resume_and_pause_do_not_wait() {
    let (tools, counters) = tools(Fixture::default());

    let resumed = tokio::time::timeout(Duration::from_secs(5), tools.resume_capacity("sub-1", "rg", "c"))
        .await
        .expect("resume must not block on the operation");
    let resumed = serde_json::to_value(assert_ok!(resumed)).unwrap();
    assert_eq!(
        resumed,
        json!({
            "status": "accepted",
            "message": "Resume operation started. Check Azure portal for progress.",
            "poller_status": "InProgress"
        })
    );

    let paused = tokio::time::timeout(Duration::from_secs(5), tools.pause_capacity("sub-1", "rg", "c"))
        .await
        .expect("pause must not block on the operation");
    let paused = serde_json::to_value(assert_ok!(paused)).unwrap();
    assert_eq!(paused["status"], "accepted");
    assert_eq!(paused["message"], "Pause operation started. Check Azure portal for progress.");
    assert_eq!(paused["poller_status"], "InProgress");
    assert_eq!(paused.as_object().unwrap().len(), 3);

    assert_eq!(counters.snapshot(), (2, 2, 2, 2));
}

#[tokio::test]
async fn test_client_construction_failure_closes_credential() {
    let (tools, counters) = tools(Fixture {
        fail_client: true,
        ..Default::default()
    });

    let err = assert_err!(tools.list_capacities("sub-1").await);
    assert_eq!(err.to_string(), "client construction failed");
    assert_eq!(counters.snapshot(), (1, 1, 0, 0));
}

#[tokio::test]
async fn test_close_failure_does_not_mask_result() {
    let (tools, counters) = tools(Fixture {
        items: vec![capacity("alpha")],
        fail_close: true,
        ..Default::default()
    });

    let list = assert_ok!(tools.list_capacities("sub-1").await);
    assert_eq!(list.capacities.len(), 1);
    assert_eq!(counters.snapshot(), (1, 1, 1, 1));
}

#[tokio::test]
async fn test_cancelled_operation_releases_handles() {
    let (tools, counters) = tools(Fixture {
        hang_calls: true,
        ..Default::default()
    });

    // The remote call never completes, so the timeout drops the operation mid-call
    let outcome = tokio::time::timeout(Duration::from_millis(50), tools.get_capacity("sub-1", "rg", "c")).await;
    assert!(outcome.is_err());
    assert_eq!(counters.snapshot().2, 1);

    tokio::time::timeout(Duration::from_secs(5), async {
        while counters.snapshot() != (1, 1, 1, 1) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("handles must be closed after cancellation");
}

#[tokio::test]
async fn test_concurrent_calls_use_their_own_handles() {
    let (tools, counters) = tools(Fixture {
        items: vec![capacity("alpha")],
        ..Default::default()
    });

    let (a, b) = tokio::join!(
        tools.get_capacity("sub-1", "rg-alpha", "alpha"),
        tools.get_capacity("sub-1", "rg-alpha", "alpha")
    );
    assert_ok!(a);
    assert_ok!(b);
    assert_eq!(counters.snapshot(), (2, 2, 2, 2));
}

/// Through the MCP surface
mod mcp_surface {
    use super::*;
    use rmcp::model::{CallToolRequestParams, RawContent};

    fn request(name: &str, arguments: Value) -> CallToolRequestParams {
        CallToolRequestParams {
            meta: None,
            name: name.to_string().into(),
            arguments: arguments.as_object().cloned(),
            task: None,
        }
    }

    fn capacity_args(name: &str) -> Value {
        json!({"subscription_id": "sub-1", "resource_group": format!("rg-{}", name), "capacity_name": name})
    }

    #[tokio::test]
    async fn test_tools_are_listed_in_order() {
        let (connector, _) = stub(Fixture::default());
        let server = build_server(connector);

        let names: Vec<String> = server.tools().iter().map(|t| t.name.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "list_fabric_capacities",
                "get_fabric_capacity",
                "resume_fabric_capacity",
                "pause_fabric_capacity"
            ]
        );
    }

    #[tokio::test]
    async fn test_call_get_returns_flat_capacity() {
        let (connector, counters) = stub(Fixture {
            items: vec![capacity("alpha")],
            ..Default::default()
        });
        let server = build_server(connector);

        let result = assert_ok!(server.call(request("get_fabric_capacity", capacity_args("alpha"))).await);
        assert_ne!(result.is_error, Some(true));
        let structured = result.structured_content.expect("structured result");
        let capacity = structured.as_object().unwrap();
        assert_eq!(capacity.len(), 13);
        assert_eq!(capacity["resource_group"], "rg-alpha");
        assert_eq!(counters.snapshot(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_call_failure_is_reported_in_band() {
        let (connector, counters) = stub(Fixture::default());
        let server = build_server(connector);

        let result = assert_ok!(server.call(request("get_fabric_capacity", capacity_args("ghost"))).await);
        assert_eq!(result.is_error, Some(true));
        let text: Vec<String> = result
            .content
            .iter()
            .filter_map(|c| match &c.raw {
                RawContent::Text(text) => Some(text.text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(text, vec!["sentinel: capacity ghost not found".to_string()]);
        assert_eq!(counters.snapshot(), (1, 1, 1, 1));
    }

    #[tokio::test]
    async fn test_missing_arguments_are_invalid_params() {
        let (connector, counters) = stub(Fixture::default());
        let server = build_server(connector);

        let err = assert_err!(
            server
                .call(request("pause_fabric_capacity", json!({"subscription_id": "sub-1"})))
                .await
        );
        assert_eq!(err.code.0, -32602);
        // Rejected before any handle was acquired
        assert_eq!(counters.snapshot(), (0, 0, 0, 0));
    }
}
