//! Global secondary indexes
//!
//! Each index re-keys items by its own (hash, range) attribute pair and
//! projects every attribute. Index keys are not unique, so entries are ordered
//! by (index range, base hash, base range). Items missing either index
//! attribute are not indexed (sparse index).

use dashmap::DashMap;
use ordo_core::{AttributeValue, IndexDefinition, Item, ItemKey, RangeCondition};
use std::collections::BTreeMap;

type EntryKey = (AttributeValue, AttributeValue, AttributeValue);

/// One global secondary index
#[derive(Debug)]
pub struct SecondaryIndex {
    definition: IndexDefinition,
    partitions: DashMap<AttributeValue, BTreeMap<EntryKey, Item>>,
}

impl SecondaryIndex {
    /// Create an empty index
    pub fn new(definition: IndexDefinition) -> Self {
        Self {
            definition,
            partitions: DashMap::new(),
        }
    }

    /// Index name
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    fn entry_of(&self, base: &ItemKey, item: &Item) -> Option<(AttributeValue, EntryKey)> {
        let hash = item.get(&self.definition.hash_key)?;
        let range = item.get(&self.definition.range_key)?;
        Some((
            hash.clone(),
            (range.clone(), base.hash.clone(), base.range.clone()),
        ))
    }

    /// Replace the entry of one base item
    ///
    /// `old` is the item before the write, `new` after (`None` on delete).
    pub fn update(&self, base: &ItemKey, old: Option<&Item>, new: Option<&Item>) {
        if let Some((hash, key)) = old.and_then(|o| self.entry_of(base, o)) {
            let now_empty = match self.partitions.get_mut(&hash) {
                Some(mut partition) => {
                    partition.remove(&key);
                    partition.is_empty()
                }
                None => false,
            };
            if now_empty {
                self.partitions.remove_if(&hash, |_, p| p.is_empty());
            }
        }
        if let Some(item) = new {
            if let Some((hash, key)) = self.entry_of(base, item) {
                self.partitions
                    .entry(hash)
                    .or_default()
                    .insert(key, item.clone());
            }
        }
    }

    /// Items under `hash` whose index range key satisfies `range`, in range
    /// order; `limit` bounds the result and reports whether more matched
    pub fn query(
        &self,
        hash: &AttributeValue,
        range: Option<&RangeCondition>,
        scan_forward: bool,
        limit: Option<usize>,
    ) -> (Vec<Item>, bool) {
        let Some(partition) = self.partitions.get(hash) else {
            return (Vec::new(), false);
        };
        let matching = partition
            .iter()
            .filter(|((r, _, _), _)| range.map_or(true, |c| c.matches(r)))
            .map(|(_, item)| item);
        if scan_forward {
            collect_limited(matching, limit)
        } else {
            collect_limited(matching.rev(), limit)
        }
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.partitions.iter().map(|p| p.len()).sum()
    }

    /// Whether nothing is indexed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collect up to `limit` items and report whether any were left over
pub(crate) fn collect_limited<'a>(
    mut items: impl Iterator<Item = &'a Item>,
    limit: Option<usize>,
) -> (Vec<Item>, bool) {
    match limit {
        None => (items.cloned().collect(), false),
        Some(limit) => {
            let taken: Vec<Item> = items.by_ref().take(limit).cloned().collect();
            let more = items.next().is_some();
            (taken, more)
        }
    }
}
