//! Streaming estimators over a directory of append-only JSON log event files.
//!
//! A [`source::DirectoryWatcher`] turns each new file into a [`source::Batch`]
//! and hands it to one of the [`estimator`]s through a bounded channel. The
//! caller pulls [`estimator::Estimate`]s from a [`pipeline::ResultStream`]
//! until it cancels the shared token.

pub mod cli;
pub mod config;
pub mod estimator;
pub mod pipeline;
pub mod source;
