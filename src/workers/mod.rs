//! Built-in domain processors.
//!
//! These are the swappable analysis bodies behind the worker contract.
//! Their domain logic is mocked — fixed payloads with plausible shapes —
//! but they honor the cancellation contract like any real processor
//! must, so they double as fixtures for the execution machinery.

pub mod compound;
pub mod crossref;
pub mod literature;

pub use compound::CompoundProcessor;
pub use crossref::CrossReferenceProcessor;
pub use literature::LiteratureProcessor;

use crate::error::{Error, Result};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Simulate analysis latency while honoring cancellation.
pub(crate) async fn simulate_latency(delay: Duration, cancel: &CancellationToken) -> Result<()> {
    tokio::select! {
        _ = tokio::time::sleep(delay) => Ok(()),
        _ = cancel.cancelled() => Err(Error::Cancelled),
    }
}
