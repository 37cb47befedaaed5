//! Bounded-concurrency execution of independent async units.
//!
//! [`run_limited`] spawns every unit onto a [`JoinSet`] and gates the body of
//! each behind a shared [`Semaphore`], so at most `limit` units do work at
//! once. A unit that fails, or panics, is reported as its own outcome and
//! never cancels its siblings.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::error;

/// Why a unit did not produce a value.
#[derive(Debug, Error)]
pub enum UnitError<E> {
    #[error("{0}")]
    Failed(E),

    #[error("Unit panicked: {0}")]
    Panicked(String),
}

/// Settled result of one unit, keyed by the caller's id.
#[derive(Debug)]
pub struct UnitOutcome<K, T, E> {
    pub key: K,
    pub result: Result<T, UnitError<E>>,
}

/// Run `units` with at most `limit` in flight and wait for all of them.
///
/// Outcomes are returned in completion order, one per input. A `limit` of 0
/// is treated as 1. Must be called from within a tokio runtime.
pub async fn run_limited<K, T, E, F>(units: Vec<(K, F)>, limit: usize) -> Vec<UnitOutcome<K, T, E>>
where
    K: Send + 'static,
    T: Send + 'static,
    E: Send + 'static,
    F: Future<Output = Result<T, E>> + Send + 'static,
{
    if units.is_empty() {
        return Vec::new();
    }

    let total = units.len();
    let semaphore = Arc::new(Semaphore::new(limit.max(1)));
    let mut set = JoinSet::new();

    for (key, unit) in units {
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            // Held until the unit settles. The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await;
            let result = match AssertUnwindSafe(unit).catch_unwind().await {
                Ok(result) => result.map_err(UnitError::Failed),
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    error!(error = %message, "Unit panicked");
                    Err(UnitError::Panicked(message))
                }
            };
            UnitOutcome { key, result }
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            // Only reachable if the runtime is shutting down
            Err(e) => error!(error = %e, "Unit task did not complete"),
        }
    }

    outcomes
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
