//! Shared sweep orchestration primitives.
//!
//! This crate owns the serialisable run request read from configuration
//! files, its validation and fingerprinting, and deterministic batch planning
//! for the runner. It intentionally excludes dataset loading and execution.

pub mod batching;
pub mod contract;
