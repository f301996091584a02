// crates/browserscope-config/src/lib.rs
// ============================================================================
// Module: Browserscope Config Library
// Description: Canonical config model, validation, and runtime builders.
// Purpose: Single source of truth for browserscope.toml semantics.
// Dependencies: browserscope-core, browserscope-store-sqlite, serde, toml
// ============================================================================

//! ## Overview
//! `browserscope-config` defines the configuration model for the stats
//! pipeline. It provides strict, fail-closed validation and builders that
//! produce the test set registry, gating policy, and pipeline settings.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
