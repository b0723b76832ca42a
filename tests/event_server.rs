//! Event server round trips over a real Unix socket.

mod util;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use inventory_report::handler::{FailurePolicy, RequestHandler};
use inventory_report::transport::{EventClient, EventServer, InboundEvent, ServerConfig};
use serde_json::Value;
use tempfile::TempDir;
use util::{inventory_catalogue, memory_searcher};

const SKU_EQUAL: &str = r#"{"inventory":[{"field":"sku","type":"int","equal":"343434"}]}"#;
const WAIT: Duration = Duration::from_secs(5);

struct Running {
    server: Arc<EventServer>,
    task: tokio::task::JoinHandle<std::io::Result<()>>,
    _dir: TempDir,
}

impl Running {
    async fn stop(self) {
        self.server.request_shutdown();
        self.task
            .await
            .expect("server task")
            .expect("server exits cleanly");
        assert!(!self.server.socket_path().exists());
    }
}

async fn start(policy: FailurePolicy, max_connections: usize) -> Running {
    let dir = TempDir::new().expect("tempdir");
    let socket_path = dir.path().join("report.sock");
    let handler = RequestHandler::new(memory_searcher(inventory_catalogue()), policy);
    let server = Arc::new(EventServer::new(
        ServerConfig {
            socket_path: socket_path.clone(),
            max_connections,
        },
        handler,
    ));

    let task = tokio::spawn({
        let server = Arc::clone(&server);
        async move { server.run().await }
    });
    wait_for_socket(&socket_path).await;

    Running {
        server,
        task,
        _dir: dir,
    }
}

async fn wait_for_socket(path: &Path) {
    for _ in 0..100 {
        if path.exists() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("server never bound {}", path.display());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn query_round_trip() {
    let running = start(FailurePolicy::Silent, 4).await;
    let mut client = EventClient::connect(running.server.socket_path(), WAIT)
        .await
        .unwrap();

    client
        .publish(&InboundEvent::new(9, "round-trip", SKU_EQUAL.as_bytes().to_vec()))
        .await
        .unwrap();
    let reply = client.next_result(WAIT).await.unwrap().expect("reply");

    assert_eq!(reply.aggregate_id, 9);
    assert_eq!(reply.correlation_id, "round-trip");
    let body: Value = serde_json::from_slice(&reply.result).unwrap();
    assert_eq!(body[0]["Name"], "test");
    assert_eq!(running.server.total_events(), 1);

    drop(client);
    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn silent_failure_looks_like_no_reply() {
    let running = start(FailurePolicy::Silent, 4).await;
    let mut client = EventClient::connect(running.server.socket_path(), WAIT)
        .await
        .unwrap();

    client
        .publish(&InboundEvent::new(1, "dropped", b"not json".to_vec()))
        .await
        .unwrap();
    client
        .publish(&InboundEvent::new(1, "answered", SKU_EQUAL.as_bytes().to_vec()))
        .await
        .unwrap();

    let reply = client.next_result(WAIT).await.unwrap().expect("reply");
    assert_eq!(reply.correlation_id, "answered");
    assert!(
        client
            .next_result(Duration::from_millis(200))
            .await
            .unwrap()
            .is_none()
    );

    drop(client);
    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn respond_policy_returns_error_events() {
    let running = start(FailurePolicy::Respond, 4).await;
    let mut client = EventClient::connect(running.server.socket_path(), WAIT)
        .await
        .unwrap();

    client
        .publish(&InboundEvent::new(
            3,
            "miss",
            br#"{"inventory":[{"field":"sku","type":"int","lower_limit":3000,"upper_limit":4000}]}"#
                .to_vec(),
        ))
        .await
        .unwrap();

    let reply = client.next_result(WAIT).await.unwrap().expect("error reply");
    assert_eq!(reply.correlation_id, "miss");
    assert!(reply.is_error());
    assert!(reply.result.is_empty());
    assert!(reply.error.unwrap().contains("no results found"));

    drop(client);
    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_requests_are_all_answered() {
    let running = start(FailurePolicy::Silent, 4).await;
    let mut client = EventClient::connect(running.server.socket_path(), WAIT)
        .await
        .unwrap();

    let skus = [343434, 1001, 1002, 1003];
    for sku in skus {
        let payload = format!(r#"{{"inventory":[{{"field":"sku","type":"int","equal":"{sku}"}}]}}"#);
        client
            .publish(&InboundEvent::new(1, sku.to_string(), payload.into_bytes()))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    for _ in skus {
        let reply = client.next_result(WAIT).await.unwrap().expect("reply");
        let body: Value = serde_json::from_slice(&reply.result).unwrap();
        assert_eq!(body[0]["SKU"].to_string(), reply.correlation_id);
        seen.push(reply.correlation_id);
    }
    seen.sort();
    let mut want: Vec<String> = skus.iter().map(ToString::to_string).collect();
    want.sort();
    assert_eq!(seen, want);

    drop(client);
    running.stop().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_without_clients_removes_socket() {
    let running = start(FailurePolicy::Silent, 1).await;
    assert_eq!(running.server.active_connections(), 0);
    running.stop().await;
}
