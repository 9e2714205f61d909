//! Busy flag and last-error string for asynchronous actions.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::error;

use compass_core::Result;

/// Point-in-time view of an [`ActionState`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionSnapshot {
    pub busy: bool,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
struct Inner {
    in_flight: usize,
    last_error: Option<String>,
}

/// Tracks the actions of one component. Clones share state.
///
/// `busy` is true while any tracked action is running. A failed action
/// always leaves its message in `last_error`; a later success clears it.
#[derive(Debug, Clone, Default)]
pub struct ActionState {
    inner: Arc<RwLock<Inner>>,
}

impl ActionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `fut` with the busy flag raised and record its outcome.
    pub async fn track<T, F>(&self, action: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.inner.write().await.in_flight += 1;
        let result = fut.await;

        let mut inner = self.inner.write().await;
        inner.in_flight = inner.in_flight.saturating_sub(1);
        match &result {
            Ok(_) => inner.last_error = None,
            Err(e) => {
                error!(action, error = %e, "Action failed");
                inner.last_error = Some(e.to_string());
            }
        }
        result
    }

    pub async fn is_busy(&self) -> bool {
        self.inner.read().await.in_flight > 0
    }

    pub async fn last_error(&self) -> Option<String> {
        self.inner.read().await.last_error.clone()
    }

    pub async fn snapshot(&self) -> ActionSnapshot {
        let inner = self.inner.read().await;
        ActionSnapshot {
            busy: inner.in_flight > 0,
            last_error: inner.last_error.clone(),
        }
    }
}
