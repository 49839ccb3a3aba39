//! One in-memory table
//!
//! # Design
//!
//! - Rows are hash-partitioned in a DashMap; each partition is a BTreeMap
//!   ordered by range key, so range queries are a single ordered walk.
//! - A single-item write holds its partition's shard lock while it evaluates
//!   the condition, writes the row and updates every index. That is what makes
//!   conditional writes and `ADD` atomic.
//! - A per-table gate serializes transactions against everything else:
//!   single-item operations take it shared, transactions take it exclusive.
//!
//! Lock order is gate, then partition, then index. Nothing acquires them in
//! any other order.

use crate::eval::{apply_actions, evaluate, project_return};
use crate::index::{collect_limited, SecondaryIndex};
use dashmap::DashMap;
use ordo_core::{
    AttributeValue, CancellationReason, Condition, Item, ItemKey, PutItem, Query, QueryOutput,
    ReturnValues, StoreError, StoreResult, TableDefinition, UpdateAction,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;

type Partition = BTreeMap<AttributeValue, Item>;

/// Rows and indexes of one table
#[derive(Debug)]
pub struct Table {
    definition: TableDefinition,
    gate: RwLock<()>,
    partitions: DashMap<AttributeValue, Partition>,
    indexes: FxHashMap<String, SecondaryIndex>,
}

impl Table {
    /// Create an empty table
    pub fn new(definition: TableDefinition) -> Self {
        let indexes = definition
            .indexes
            .iter()
            .map(|d| (d.name.clone(), SecondaryIndex::new(d.clone())))
            .collect();
        Self {
            definition,
            gate: RwLock::new(()),
            partitions: DashMap::new(),
            indexes,
        }
    }

    /// Key schema
    pub fn definition(&self) -> &TableDefinition {
        &self.definition
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        let _gate = self.gate.read();
        self.partitions.iter().map(|p| p.len()).sum()
    }

    /// Whether the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of hash keys holding at least one row
    pub fn partition_count(&self) -> usize {
        let _gate = self.gate.read();
        self.partitions.len()
    }

    // =========================================================================
    // Keys
    // =========================================================================

    fn key_of(&self, item: &Item) -> StoreResult<ItemKey> {
        let part = |name: &str| {
            item.get(name).cloned().ok_or_else(|| {
                StoreError::Validation(format!(
                    "item is missing key attribute '{}' of table {}",
                    name, self.definition.name
                ))
            })
        };
        Ok(ItemKey {
            hash: part(&self.definition.hash_key)?,
            range: part(&self.definition.range_key)?,
        })
    }

    fn key_item(&self, key: &ItemKey) -> Item {
        let mut item = Item::new();
        item.insert(self.definition.hash_key.clone(), key.hash.clone());
        item.insert(self.definition.range_key.clone(), key.range.clone());
        item
    }

    // A refused write may have just created its partition; drop it again if
    // nothing else landed there meanwhile.
    fn prune(&self, hash: &AttributeValue) {
        self.partitions.remove_if(hash, |_, p| p.is_empty());
    }

    fn reindex(&self, key: &ItemKey, old: Option<&Item>, new: Option<&Item>) {
        for index in self.indexes.values() {
            index.update(key, old, new);
        }
    }

    // =========================================================================
    // Single-item operations
    // =========================================================================

    /// Point read
    pub fn get(&self, key: &ItemKey) -> Option<Item> {
        let _gate = self.gate.read();
        self.partitions
            .get(&key.hash)
            .and_then(|p| p.get(&key.range).cloned())
    }

    /// Conditional whole-item write
    pub fn put(&self, item: Item, condition: Option<&Condition>) -> StoreResult<()> {
        let key = self.key_of(&item)?;
        let _gate = self.gate.read();
        let mut partition = self.partitions.entry(key.hash.clone()).or_default();
        if let Err(e) = check(condition, partition.get(&key.range)) {
            drop(partition);
            self.prune(&key.hash);
            return Err(e);
        }
        let old = partition.insert(key.range.clone(), item.clone());
        self.reindex(&key, old.as_ref(), Some(&item));
        Ok(())
    }

    /// Conditional partial update, creating the item if absent
    pub fn update(
        &self,
        key: &ItemKey,
        actions: &[UpdateAction],
        condition: Option<&Condition>,
        return_values: ReturnValues,
    ) -> StoreResult<Option<Item>> {
        let _gate = self.gate.read();
        let mut partition = self.partitions.entry(key.hash.clone()).or_default();
        let old = partition.get(&key.range).cloned();
        let applied = check(condition, old.as_ref()).and_then(|()| {
            let base = old.clone().unwrap_or_else(|| self.key_item(key));
            apply_actions(&self.definition, base, actions)
        });
        let new = match applied {
            Ok(new) => new,
            Err(e) => {
                drop(partition);
                self.prune(&key.hash);
                return Err(e);
            }
        };
        partition.insert(key.range.clone(), new.clone());
        self.reindex(key, old.as_ref(), Some(&new));

        Ok(project_return(return_values, old.as_ref(), actions))
    }

    /// Range read over the table or one of its indexes
    pub fn query(&self, request: &Query) -> StoreResult<QueryOutput> {
        let _gate = self.gate.read();
        let (items, more) = match &request.index {
            Some(name) => {
                if request.consistent_read {
                    return Err(StoreError::Validation(
                        "consistent reads are not supported on global secondary indexes"
                            .to_string(),
                    ));
                }
                let index = self.indexes.get(name).ok_or_else(|| {
                    StoreError::ResourceNotFound(format!(
                        "index {} on table {}",
                        name, self.definition.name
                    ))
                })?;
                index.query(
                    &request.hash,
                    request.range.as_ref(),
                    request.scan_forward,
                    request.limit,
                )
            }
            None => match self.partitions.get(&request.hash) {
                None => (Vec::new(), false),
                Some(partition) => {
                    let matching = partition
                        .iter()
                        .filter(|(r, _)| request.range.as_ref().map_or(true, |c| c.matches(r)))
                        .map(|(_, item)| item);
                    if request.scan_forward {
                        collect_limited(matching, request.limit)
                    } else {
                        collect_limited(matching.rev(), request.limit)
                    }
                }
            },
        };

        let last_evaluated_key = if more {
            match items.last() {
                Some(last) => Some(self.key_of(last)?),
                None => None,
            }
        } else {
            None
        };
        Ok(QueryOutput {
            items,
            last_evaluated_key,
        })
    }

    // =========================================================================
    // Transactions
    // =========================================================================

    /// All-or-nothing conditional puts
    ///
    /// Conditions are evaluated in request order against the table as already
    /// modified by the earlier puts of the same transaction.
    pub fn transact(&self, puts: &[PutItem]) -> StoreResult<()> {
        let keys = puts
            .iter()
            .map(|p| self.key_of(&p.item))
            .collect::<StoreResult<Vec<_>>>()?;

        let _gate = self.gate.write();

        let mut staged: BTreeMap<&ItemKey, &Item> = BTreeMap::new();
        let mut reasons = Vec::with_capacity(puts.len());
        for (put, key) in puts.iter().zip(&keys) {
            let current = match staged.get(key) {
                Some(item) => Some((*item).clone()),
                None => self
                    .partitions
                    .get(&key.hash)
                    .and_then(|p| p.get(&key.range).cloned()),
            };
            let holds = put
                .condition
                .as_ref()
                .map_or(true, |c| evaluate(c, current.as_ref()));
            reasons.push(if holds {
                CancellationReason::None
            } else {
                CancellationReason::ConditionalCheckFailed
            });
            staged.insert(key, &put.item);
        }

        if reasons
            .iter()
            .any(|r| *r == CancellationReason::ConditionalCheckFailed)
        {
            return Err(StoreError::TransactionCanceled { reasons });
        }

        for (key, item) in staged {
            let old = self
                .partitions
                .entry(key.hash.clone())
                .or_default()
                .insert(key.range.clone(), item.clone());
            self.reindex(key, old.as_ref(), Some(item));
        }
        Ok(())
    }
}

fn check(condition: Option<&Condition>, existing: Option<&Item>) -> StoreResult<()> {
    match condition {
        Some(c) if !evaluate(c, existing) => Err(StoreError::ConditionalCheckFailed {
            item: existing.cloned(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Table {
        Table::new(TableDefinition::new("t", "hk", "sk"))
    }

    fn key(hash: &str, range: i64) -> ItemKey {
        ItemKey {
            hash: hash.into(),
            range: AttributeValue::N(range),
        }
    }

    fn row(hash: &str, range: i64) -> Item {
        [
            ("hk".to_string(), AttributeValue::from(hash)),
            ("sk".to_string(), AttributeValue::N(range)),
        ]
        .into()
    }

    #[test]
    fn test_refused_put_leaves_no_partition() {
        let t = table();
        let must_exist = Condition::Equals("v".into(), AttributeValue::N(1));
        assert!(t.put(row("a", 0), Some(&must_exist)).is_err());
        assert_eq!(t.partition_count(), 0);
        assert!(t.is_empty());
    }

    #[test]
    fn test_refused_update_leaves_no_partition() {
        let t = table();
        let owned = Condition::Equals("o".into(), "node-a".into());
        let set = [UpdateAction::Set("o".into(), "node-b".into())];
        for hash in ["a", "b", "c"] {
            assert!(t
                .update(&key(hash, 0), &set, Some(&owned), ReturnValues::AllOld)
                .is_err());
        }
        // an invalid action is refused after the condition held
        let bad = [UpdateAction::Set("sk".into(), AttributeValue::N(1))];
        assert!(t.update(&key("d", 0), &bad, None, ReturnValues::None).is_err());
        assert_eq!(t.partition_count(), 0);
    }

    #[test]
    fn test_refused_write_keeps_populated_partition() {
        let t = table();
        t.put(row("a", 0), None).unwrap();
        let absent = Condition::AttributeNotExists("hk".into());
        assert!(t.put(row("a", 0), Some(&absent)).is_err());
        let must_exist = Condition::Equals("v".into(), AttributeValue::N(1));
        assert!(t.put(row("a", 1), Some(&must_exist)).is_err());
        assert_eq!(t.partition_count(), 1);
        assert_eq!(t.len(), 1);
    }
}
