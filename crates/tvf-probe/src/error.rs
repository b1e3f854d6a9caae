//! Probe error types

use thiserror::Error;

/// Errors that can occur before a probe is attempted.
///
/// Connectivity failures are not errors; they are reported through
/// [`crate::ConnectivityTestResult`].
#[derive(Error, Debug)]
pub enum ProbeError {
    /// The target is not an IP literal
    #[error("Invalid IP address: {0:?}")]
    InvalidAddress(String),
}
