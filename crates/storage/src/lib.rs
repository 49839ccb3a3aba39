//! Storage layer for ordo
//!
//! This crate implements an in-process backing store:
//! - MemoryItemStore: multi-table [`ItemStore`](ordo_core::ItemStore)
//! - Table: DashMap-partitioned rows with BTreeMap range order
//! - SecondaryIndex: sparse global secondary indexes
//! - FaultInjector: scripted transient failures for tests
//!
//! # Concurrency
//!
//! - Point reads and single-item writes lock one partition shard
//! - Conditional writes and `ADD` are atomic under that lock
//! - Transactions exclude all other access to their table

#![warn(missing_docs)]
#![warn(clippy::all)]

mod eval;
pub mod fault;
pub mod index;
pub mod memory;
pub mod table;

pub use fault::{FaultInjector, Operation};
pub use index::SecondaryIndex;
pub use memory::MemoryItemStore;
pub use table::Table;
