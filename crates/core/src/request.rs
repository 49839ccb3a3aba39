//! Request and response shapes for the item store
//!
//! Every request names its table. Keys are always a (hash, range) pair; the
//! attribute names they bind to are part of the table definition, not of the
//! request.

use crate::attribute::{AttributeValue, Item};
use crate::expression::{Condition, ReturnValues, UpdateAction};

/// Maximum number of items in one write transaction
pub const MAX_TRANSACT_ITEMS: usize = 100;

/// Primary key of an item
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemKey {
    /// Hash (partition) key value
    pub hash: AttributeValue,
    /// Range (sort) key value
    pub range: AttributeValue,
}

impl ItemKey {
    /// Build a key from its two components
    pub fn new(hash: impl Into<AttributeValue>, range: impl Into<AttributeValue>) -> Self {
        Self {
            hash: hash.into(),
            range: range.into(),
        }
    }
}

/// Point read
#[derive(Debug, Clone)]
pub struct GetItem {
    /// Table name
    pub table: String,
    /// Key to read
    pub key: ItemKey,
}

/// Whole-item write, optionally conditional
#[derive(Debug, Clone)]
pub struct PutItem {
    /// Table name
    pub table: String,
    /// Full item, including key attributes
    pub item: Item,
    /// Precondition on the existing item
    pub condition: Option<Condition>,
}

impl PutItem {
    /// Unconditional put
    pub fn new(table: impl Into<String>, item: Item) -> Self {
        Self {
            table: table.into(),
            item,
            condition: None,
        }
    }

    /// Attach a precondition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }
}

/// Partial update of one item; creates the item if it does not exist
#[derive(Debug, Clone)]
pub struct UpdateItem {
    /// Table name
    pub table: String,
    /// Key to update
    pub key: ItemKey,
    /// Actions, applied in order
    pub actions: Vec<UpdateAction>,
    /// Precondition on the existing item
    pub condition: Option<Condition>,
    /// What to return on success
    pub return_values: ReturnValues,
}

impl UpdateItem {
    /// Update with no condition and no return values
    pub fn new(table: impl Into<String>, key: ItemKey) -> Self {
        Self {
            table: table.into(),
            key,
            actions: Vec::new(),
            condition: None,
            return_values: ReturnValues::None,
        }
    }

    /// Append an action
    pub fn action(mut self, action: UpdateAction) -> Self {
        self.actions.push(action);
        self
    }

    /// Attach a precondition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    /// Choose what the update returns
    pub fn returning(mut self, return_values: ReturnValues) -> Self {
        self.return_values = return_values;
        self
    }
}

/// Key condition on the range key of a query
#[derive(Debug, Clone, PartialEq)]
pub enum RangeCondition {
    /// `range = :v`
    Eq(AttributeValue),
    /// `range >= :v`
    Ge(AttributeValue),
}

impl RangeCondition {
    /// Whether a range key value satisfies the condition
    pub fn matches(&self, value: &AttributeValue) -> bool {
        match self {
            RangeCondition::Eq(v) => value == v,
            RangeCondition::Ge(v) => same_type(value, v) && value >= v,
        }
    }
}

fn same_type(a: &AttributeValue, b: &AttributeValue) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

/// Range read over one hash key of the table or of a secondary index
#[derive(Debug, Clone)]
pub struct Query {
    /// Table name
    pub table: String,
    /// Secondary index to query instead of the base table
    pub index: Option<String>,
    /// Hash key value (of the table or of the index)
    pub hash: AttributeValue,
    /// Optional range key condition
    pub range: Option<RangeCondition>,
    /// Maximum number of items to return
    pub limit: Option<usize>,
    /// Ascending (true) or descending range order
    pub scan_forward: bool,
    /// Read the latest committed state (base table only)
    pub consistent_read: bool,
}

impl Query {
    /// Ascending, eventually consistent query over the base table
    pub fn table(table: impl Into<String>, hash: impl Into<AttributeValue>) -> Self {
        Self {
            table: table.into(),
            index: None,
            hash: hash.into(),
            range: None,
            limit: None,
            scan_forward: true,
            consistent_read: false,
        }
    }

    /// Ascending query over a secondary index
    pub fn index(
        table: impl Into<String>,
        index: impl Into<String>,
        hash: impl Into<AttributeValue>,
    ) -> Self {
        Self {
            index: Some(index.into()),
            ..Self::table(table, hash)
        }
    }

    /// Restrict the range key
    pub fn range(mut self, range: RangeCondition) -> Self {
        self.range = Some(range);
        self
    }

    /// Bound the number of items
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Return items in descending range order
    pub fn descending(mut self) -> Self {
        self.scan_forward = false;
        self
    }

    /// Request a strongly consistent read
    pub fn consistent(mut self) -> Self {
        self.consistent_read = true;
        self
    }
}

/// Result of a [`Query`]
#[derive(Debug, Clone, Default)]
pub struct QueryOutput {
    /// Matching items in range order
    pub items: Vec<Item>,
    /// Set when `limit` cut the result short: key of the last returned item
    pub last_evaluated_key: Option<ItemKey>,
}

/// All-or-nothing conditional write of up to [`MAX_TRANSACT_ITEMS`] items
#[derive(Debug, Clone)]
pub struct TransactWrite {
    /// Puts, evaluated and applied in order
    pub puts: Vec<PutItem>,
}
