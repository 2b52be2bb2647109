//! Attendance notification with bounded retry.
//!
//! A 200 reply ends the loop as delivered. Any other status ends it as a
//! partial success without retrying. Only transport failures (connect errors,
//! timeouts, unreadable reply bodies) are retried.

use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

/// Body posted to the attendance endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct AttendancePayload {
    pub name: String,
    /// Formatted percentage, e.g. `"70.00%"`.
    pub confidence: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotificationOutcome {
    /// Endpoint answered 200; carries the parsed JSON reply.
    Delivered(Value),
    /// Endpoint answered with another status.
    PartialSuccess(u16),
    /// Every attempt failed at the transport level.
    Failed,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub timeout: Duration,
    pub retry_delay: Duration,
}

#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    url: String,
    policy: RetryPolicy,
}

impl Notifier {
    pub fn new(url: impl Into<String>, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("rollcalld/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            policy,
        })
    }

    pub async fn notify(&self, payload: &AttendancePayload) -> NotificationOutcome {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            tracing::info!(
                attempt,
                url = %self.url,
                name = %payload.name,
                confidence = %payload.confidence,
                "sending attendance"
            );

            match self.send_once(payload).await {
                Ok(outcome) => return outcome,
                Err(err) => {
                    tracing::error!(attempt, error = %err, "attendance request failed");
                    if attempt < attempts {
                        tokio::time::sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        tracing::error!(attempts, name = %payload.name, "attendance not delivered");
        NotificationOutcome::Failed
    }

    async fn send_once(
        &self,
        payload: &AttendancePayload,
    ) -> Result<NotificationOutcome, reqwest::Error> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.policy.timeout)
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::OK {
            return Ok(NotificationOutcome::Delivered(response.json().await?));
        }

        tracing::warn!(status = status.as_u16(), "attendance endpoint returned non-200 status");
        Ok(NotificationOutcome::PartialSuccess(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{closed_url, MockAttendance};
    use axum::http::StatusCode as HttpStatus;
    use serde_json::json;
    use std::time::Instant;

    fn policy(timeout_ms: u64, delay_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            timeout: Duration::from_millis(timeout_ms),
            retry_delay: Duration::from_millis(delay_ms),
        }
    }

    fn payload() -> AttendancePayload {
        AttendancePayload {
            name: "alice".into(),
            confidence: "70.00%".into(),
        }
    }

    #[tokio::test]
    async fn test_delivered_on_first_attempt() {
        let mock = MockAttendance::start(HttpStatus::OK, Duration::ZERO).await;
        let notifier = Notifier::new(&mock.url, policy(1000, 10)).unwrap();

        let outcome = notifier.notify(&payload()).await;

        assert_eq!(outcome, NotificationOutcome::Delivered(json!({"recorded": true})));
        assert_eq!(mock.hits(), 1);
        assert_eq!(
            mock.bodies(),
            vec![json!({"name": "alice", "confidence": "70.00%"})]
        );
    }

    #[tokio::test]
    async fn test_non_200_is_not_retried() {
        let mock = MockAttendance::start(HttpStatus::NOT_FOUND, Duration::ZERO).await;
        let notifier = Notifier::new(&mock.url, policy(1000, 10)).unwrap();

        let outcome = notifier.notify(&payload()).await;

        assert_eq!(outcome, NotificationOutcome::PartialSuccess(404));
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let mock = MockAttendance::start(HttpStatus::INTERNAL_SERVER_ERROR, Duration::ZERO).await;
        let notifier = Notifier::new(&mock.url, policy(1000, 10)).unwrap();

        assert_eq!(
            notifier.notify(&payload()).await,
            NotificationOutcome::PartialSuccess(500)
        );
        assert_eq!(mock.hits(), 1);
    }

    #[tokio::test]
    async fn test_timeouts_exhaust_all_attempts() {
        let mock = MockAttendance::start(HttpStatus::OK, Duration::from_millis(500)).await;
        let notifier = Notifier::new(&mock.url, policy(50, 40)).unwrap();

        let started = Instant::now();
        let outcome = notifier.notify(&payload()).await;

        assert_eq!(outcome, NotificationOutcome::Failed);
        assert_eq!(mock.hits(), 3);
        // two delays between three attempts
        assert!(started.elapsed() >= Duration::from_millis(80));
    }

    #[tokio::test]
    async fn test_connection_refused_is_retried_then_fails() {
        let url = closed_url().await;
        let notifier = Notifier::new(url, policy(1000, 30)).unwrap();

        let started = Instant::now();
        let outcome = notifier.notify(&payload()).await;

        assert_eq!(outcome, NotificationOutcome::Failed);
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let mock = MockAttendance::start(HttpStatus::OK, Duration::ZERO).await;
        let notifier = Notifier::new(
            &mock.url,
            RetryPolicy {
                max_attempts: 0,
                ..policy(1000, 10)
            },
        )
        .unwrap();

        assert!(matches!(
            notifier.notify(&payload()).await,
            NotificationOutcome::Delivered(_)
        ));
        assert_eq!(mock.hits(), 1);
    }
}
