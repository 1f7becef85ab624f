//! Move-request assignment and route resequencing.
//!
//! Every mutating operation follows the same shape: open a store
//! transaction, validate against the staged state, apply all writes, commit,
//! and only then run the notification fan-out. An error anywhere before the
//! commit drops the transaction and nothing is published.

pub mod assignment;
pub mod edit;
pub mod history;
pub mod intake;
pub mod ranking;
pub mod route;
pub mod sequencing;
pub mod shifts;
pub mod views;

use std::future::Future;
use std::time::Instant;

use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;

async fn instrumented<T, F>(state: &AppState, operation: &'static str, work: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, AppError>>,
{
    let started = Instant::now();
    let result = work.await;
    state
        .metrics
        .record_mutation(operation, started, result.is_ok());
    if let Err(err) = &result {
        warn!(operation, error = %err, "move request mutation rejected");
    }
    result
}
