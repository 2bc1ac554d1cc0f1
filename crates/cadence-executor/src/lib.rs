//! HTTP [`cadence_worker::WorkExecutor`] that delegates each tenant's job to
//! an external generator service.

pub mod client;
pub mod error;
mod retry;

pub use client::{ExecutorSettings, HttpWorkExecutor};
pub use error::ExecutorError;
