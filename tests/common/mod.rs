//! Common test utilities

#![allow(dead_code)]

use async_trait::async_trait;
use axum::serve::Listener;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use gotime::coordinator::{CoordinatorConfig, CoordinatorServer, ProcessExit, ReadinessProbe};

/// Records exit requests instead of terminating the test binary
#[derive(Default)]
pub struct RecordingExit {
    codes: Mutex<Vec<i32>>,
    notify: Notify,
}

impl RecordingExit {
    pub fn codes(&self) -> Vec<i32> {
        self.codes.lock().unwrap().clone()
    }

    /// Wait for the first exit request, or `None` after `limit`
    pub async fn wait_for(&self, limit: Duration) -> Option<i32> {
        tokio::time::timeout(limit, async {
            loop {
                let notified = self.notify.notified();
                if let Some(code) = self.codes.lock().unwrap().first().copied() {
                    return code;
                }
                notified.await;
            }
        })
        .await
        .ok()
    }
}

impl ProcessExit for RecordingExit {
    fn exit(&self, code: i32) {
        self.codes.lock().unwrap().push(code);
        self.notify.notify_waiters();
    }
}

/// Readiness probe flipped by the test
pub struct SwitchProbe {
    ready: AtomicBool,
}

impl SwitchProbe {
    pub fn new(ready: bool) -> Self {
        Self {
            ready: AtomicBool::new(ready),
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }
}

#[async_trait]
impl ReadinessProbe for SwitchProbe {
    async fn check(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

/// Coordinator running on an ephemeral local port
pub struct TestCoordinator {
    pub addr: SocketAddr,
    pub exit: Arc<RecordingExit>,
    pub probe: Arc<SwitchProbe>,
}

impl TestCoordinator {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Bind a coordinator on 127.0.0.1:0 and serve it in the background
pub async fn spawn_coordinator(quota: u64, ready: bool) -> TestCoordinator {
    let config = CoordinatorConfig::builder()
        .bind_address_str("127.0.0.1:0")
        .unwrap()
        .quota(quota)
        .readiness_command(["true"])
        .build()
        .unwrap();

    let exit = Arc::new(RecordingExit::default());
    let probe = Arc::new(SwitchProbe::new(ready));
    let server = CoordinatorServer::with_parts(config, probe.clone(), exit.clone()).unwrap();

    let listener = server.bind().await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    TestCoordinator { addr, exit, probe }
}

/// GET `url` and return the body
pub async fn get_body(client: &reqwest::Client, url: &str) -> String {
    client.get(url).send().await.unwrap().text().await.unwrap()
}
