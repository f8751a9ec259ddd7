//! Churn predictor: inference gateway, endpoint reconciler and client invoker
//!
//! The gateway and reconciler live in their own crates; this crate wires
//! them into the `churn` binary and provides the client side.
//!
//! # Architecture
//!
//! - `churn serve` runs the inference gateway inside the serving container
//!   ([`churn_serving`])
//! - `churn deploy` converges the managed endpoint toward the desired state
//!   ([`churn_deploy`])
//! - `churn invoke` scores one customer record against a gateway or the
//!   managed endpoint ([`invoke`])
//!
//! # Modules
//!
//! - [`invoke`] - Client invoker with retry and response validation

#![deny(missing_docs)]

pub mod invoke;

pub use invoke::{build_record, default_record, InvokeError, Invoker, Prediction, RiskLevel, Target};
