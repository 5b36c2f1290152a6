//! # banyan-sync
//!
//! Replication queue processor for banyan linked files.
//!
//! The worker drains the durable LinkQueue on an interval: rows are
//! grouped per linked-file id, groups run concurrently, rows within a
//! group deliver strictly in insertion order, and a failed delivery
//! stops its group until the next pass. Delivery is at-least-once; the
//! inbound acceptor deduplicates by link GUID.

pub mod acceptor;
pub mod delivery;
pub mod worker;

pub use acceptor::{AcceptOutcome, SyncAcceptor};
pub use delivery::{DeliveryClient, DeliveryOutcome, HttpDeliveryClient};
pub use worker::{SyncWorker, WorkerConfig, WorkerEvent, WorkerHandle};

/// Default polling interval in milliseconds when the queue is empty.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = banyan_core::defaults::SYNC_POLL_INTERVAL_MS;
