//! Outbound HTTP with timeout and bounded retry.
//!
//! Every call to the remote platform goes through [`RetryingTransport`]. The
//! retry decision lives in [`RetryPolicy`] so fetch and publish share one
//! definition of "transient".

mod client;
mod policy;
mod types;

pub use client::RetryingTransport;
pub use policy::{RetryPolicy, RetryPredicate};
pub use types::*;
