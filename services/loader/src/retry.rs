//! Bounded connect retries.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::warehouse::Connector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no waiting.
    pub fn once() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Open a warehouse session, retrying up to `policy.max_attempts` times.
///
/// Returns `None` once the attempts are exhausted; the caller decides how to
/// abort. A policy with zero attempts still tries once.
pub async fn connect_with_retry<C: Connector>(
    connector: &C,
    policy: &RetryPolicy,
) -> Option<C::Warehouse> {
    let attempts = policy.max_attempts.max(1);

    for attempt in 1..=attempts {
        info!(attempt, "connecting to warehouse");
        match connector.connect().await {
            Ok(warehouse) => {
                info!("connected");
                return Some(warehouse);
            }
            Err(e) => {
                let remaining = attempts - attempt;
                warn!(attempt, remaining, error = %e, "warehouse connection failed");
                if remaining > 0 {
                    sleep(policy.delay).await;
                }
            }
        }
    }

    error!(attempts, "could not connect to the warehouse");
    None
}
