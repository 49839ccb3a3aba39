//! In-process item store
//!
//! [`MemoryItemStore`] implements [`ItemStore`] with the same observable
//! semantics the engine relies on from the hosted service: atomic conditional
//! single-item writes, atomic `ADD`, all-or-nothing transactions, and sparse
//! all-projecting global secondary indexes.
//!
//! Tables must be created before use; requests against an unknown table or
//! index fail with `ResourceNotFound`.

use crate::fault::{FaultInjector, Operation};
use crate::table::Table;
use ordo_core::{
    GetItem, Item, ItemStore, PutItem, Query, QueryOutput, StoreError, StoreResult,
    TableDefinition, TransactWrite, UpdateItem, MAX_TRANSACT_ITEMS,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// In-memory [`ItemStore`]
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    tables: RwLock<FxHashMap<String, Arc<Table>>>,
    faults: FaultInjector,
}

impl MemoryItemStore {
    /// Create a store with no tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with one table
    pub fn with_table(definition: TableDefinition) -> Self {
        let store = Self::new();
        store.create_table(definition);
        store
    }

    /// Create a table; an existing table of the same name is kept
    ///
    /// Returns whether the table was created.
    pub fn create_table(&self, definition: TableDefinition) -> bool {
        let mut tables = self.tables.write();
        if tables.contains_key(&definition.name) {
            return false;
        }
        debug!(
            target: "ordo::store",
            table = %definition.name,
            indexes = definition.indexes.len(),
            "Created table"
        );
        tables.insert(definition.name.clone(), Arc::new(Table::new(definition)));
        true
    }

    /// Number of rows in a table
    pub fn item_count(&self, table: &str) -> StoreResult<usize> {
        Ok(self.table(table)?.len())
    }

    /// Make the next `times` calls of `operation` fail with `error`
    pub fn inject_fault(&self, operation: Operation, error: StoreError, times: usize) {
        self.faults.inject(operation, error, times);
    }

    fn table(&self, name: &str) -> StoreResult<Arc<Table>> {
        self.tables
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::ResourceNotFound(format!("table {}", name)))
    }
}

impl ItemStore for MemoryItemStore {
    fn get_item(&self, request: GetItem) -> StoreResult<Option<Item>> {
        self.faults.check(Operation::GetItem)?;
        Ok(self.table(&request.table)?.get(&request.key))
    }

    fn put_item(&self, request: PutItem) -> StoreResult<()> {
        self.faults.check(Operation::PutItem)?;
        self.table(&request.table)?
            .put(request.item, request.condition.as_ref())
    }

    fn update_item(&self, request: UpdateItem) -> StoreResult<Option<Item>> {
        self.faults.check(Operation::UpdateItem)?;
        self.table(&request.table)?.update(
            &request.key,
            &request.actions,
            request.condition.as_ref(),
            request.return_values,
        )
    }

    fn query(&self, request: Query) -> StoreResult<QueryOutput> {
        self.faults.check(Operation::Query)?;
        self.table(&request.table)?.query(&request)
    }

    fn transact_write(&self, request: TransactWrite) -> StoreResult<()> {
        self.faults.check(Operation::TransactWrite)?;
        if request.puts.is_empty() || request.puts.len() > MAX_TRANSACT_ITEMS {
            return Err(StoreError::Validation(format!(
                "transactions take 1 to {} items, got {}",
                MAX_TRANSACT_ITEMS,
                request.puts.len()
            )));
        }
        let mut by_table: Vec<(Arc<Table>, Vec<PutItem>)> = Vec::new();
        for put in request.puts {
            match by_table.iter_mut().find(|(t, _)| t.definition().name == put.table) {
                Some((_, puts)) => puts.push(put),
                None => by_table.push((self.table(&put.table)?, vec![put])),
            }
        }
        // one table per transaction
        let [(table, puts)] = <[_; 1]>::try_from(by_table).map_err(|_| {
            StoreError::Validation("transactions across tables are not supported".to_string())
        })?;

        let start = Instant::now();
        let result = table.transact(&puts);
        match &result {
            Ok(()) => debug!(
                target: "ordo::store",
                table = %table.definition().name,
                items = puts.len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Transaction committed"
            ),
            Err(e) => warn!(
                target: "ordo::store",
                table = %table.definition().name,
                items = puts.len(),
                error = %e,
                "Transaction cancelled"
            ),
        }
        result
    }
}
