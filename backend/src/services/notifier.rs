//! Login notifications
//!
//! The auth service reports every login attempt to a [`LoginNotifier`].
//! Delivery is best effort: events are dispatched on a detached task and
//! failures are only logged.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoginOutcome {
    Success,
    Failure,
}

/// One login attempt. Never carries the submitted password.
#[derive(Debug, Clone, Serialize)]
pub struct LoginEvent {
    pub outcome: LoginOutcome,
    pub identifier: String,
    pub client_ip: String,
    pub user_agent: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl LoginEvent {
    pub fn success(identifier: &str, client_ip: &str, user_agent: &str) -> Self {
        Self {
            outcome: LoginOutcome::Success,
            identifier: identifier.to_string(),
            client_ip: client_ip.to_string(),
            user_agent: user_agent.to_string(),
            reason: None,
            at: Utc::now(),
        }
    }

    pub fn failure(identifier: &str, client_ip: &str, user_agent: &str, reason: &str) -> Self {
        Self {
            outcome: LoginOutcome::Failure,
            reason: Some(reason.to_string()),
            ..Self::success(identifier, client_ip, user_agent)
        }
    }
}

/// Receiver of login events
#[async_trait]
pub trait LoginNotifier: Send + Sync {
    async fn notify(&self, event: &LoginEvent) -> Result<()>;
}

/// Writes login events to the `audit` tracing target
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait]
impl LoginNotifier for TracingNotifier {
    async fn notify(&self, event: &LoginEvent) -> Result<()> {
        match event.outcome {
            LoginOutcome::Success => info!(
                target: "audit",
                identifier = %event.identifier,
                client_ip = %event.client_ip,
                user_agent = %event.user_agent,
                "Login succeeded"
            ),
            LoginOutcome::Failure => warn!(
                target: "audit",
                identifier = %event.identifier,
                client_ip = %event.client_ip,
                user_agent = %event.user_agent,
                reason = event.reason.as_deref().unwrap_or_default(),
                "Login failed"
            ),
        }
        Ok(())
    }
}

/// Discards every event
#[derive(Debug, Default, Clone)]
pub struct NoopNotifier;

#[async_trait]
impl LoginNotifier for NoopNotifier {
    async fn notify(&self, _event: &LoginEvent) -> Result<()> {
        Ok(())
    }
}

/// Send an event without waiting for delivery
pub fn dispatch(notifier: &Arc<dyn LoginNotifier>, event: LoginEvent) {
    let notifier = Arc::clone(notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&event).await {
            warn!(error = %e, identifier = %event.identifier, "Failed to deliver login notification");
        }
    });
}
