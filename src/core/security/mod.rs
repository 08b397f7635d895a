// Security module for remote source validation
//
// This module decides which URLs the registry may fetch from, so that
// untrusted hosts are refused before any network traffic happens.

pub mod trust_policy;

pub use trust_policy::{TrustError, TrustPolicy};
