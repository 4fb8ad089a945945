//! Value types shared by the execution engine.
//!
//! Core modules hold no shared state and perform no storage. They describe
//! units of work, their reports, and the retry budget applied to them.

pub mod definition;
pub mod report;
pub mod retry;
pub mod unrecoverable;
