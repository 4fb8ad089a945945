//! Operation execution and reporting engine.
//!
//! Runs discrete units of work, composes them into sequences, retries failed
//! attempts, and keeps an auditable tree of every execution:
//!
//! - **[`core`]**: Value types. Definitions, reports, the retry policy and the
//!   unrecoverable-error marker. No shared state.
//! - **[`reporter`]**: Report storage behind the [`reporter::Reporter`] trait,
//!   with an in-memory backend and the child-capturing decorator.
//!
//! [`execute`] ties them together: [`execute::execute_operation`] and
//! [`execute::execute_sequence`] take a [`bundle::Bundle`] (reporter, tracing
//! span, cancellation, retry policy) and a unit of work from [`operation`].

pub mod bundle;
pub mod config;
pub mod core;
pub mod execute;
pub mod logging;
pub mod operation;
pub mod reporter;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
