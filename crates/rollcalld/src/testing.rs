//! Local stand-in for the attendance endpoint.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct Recorded {
    hits: AtomicUsize,
    bodies: Mutex<Vec<Value>>,
}

#[derive(Clone)]
struct MockState {
    status: StatusCode,
    delay: Duration,
    recorded: Arc<Recorded>,
}

/// Counts calls and records JSON bodies; answers `{"recorded": true}` with a fixed status.
pub struct MockAttendance {
    pub url: String,
    recorded: Arc<Recorded>,
}

impl MockAttendance {
    pub async fn start(status: StatusCode, delay: Duration) -> Self {
        let recorded = Arc::new(Recorded::default());
        let state = MockState {
            status,
            delay,
            recorded: recorded.clone(),
        };

        let app = Router::new()
            .route("/api/attendance", post(record))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{addr}/api/attendance"),
            recorded,
        }
    }

    pub fn hits(&self) -> usize {
        self.recorded.hits.load(Ordering::SeqCst)
    }

    pub fn bodies(&self) -> Vec<Value> {
        self.recorded.bodies.lock().unwrap().clone()
    }
}

async fn record(State(state): State<MockState>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    state.recorded.hits.fetch_add(1, Ordering::SeqCst);
    state.recorded.bodies.lock().unwrap().push(body);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(json!({"recorded": true})))
}

/// URL of a port that was just released, so connections are refused.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/attendance")
}
