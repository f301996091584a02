// crates/browserscope-store-sqlite/src/lib.rs
// ============================================================================
// Module: Browserscope SQLite Store Library
// Description: Public API surface for the SQLite entity store.
// Purpose: Expose the durable EntityStore and its configuration.
// Dependencies: crate::store
// ============================================================================

//! ## Overview
//! Provides [`SqliteEntityStore`], a durable
//! [`browserscope_core::EntityStore`] that keeps submissions, rankers, and
//! browser rows in a single `SQLite` database.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::SqliteEntityStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
