//! Table key schemas
//!
//! A table is identified by name and keyed by a (hash, range) attribute pair.
//! Global secondary indexes re-key the same items by another attribute pair;
//! items lacking either index attribute are simply not indexed.

/// Key schema of a global secondary index (all attributes projected)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// Index name
    pub name: String,
    /// Index hash key attribute
    pub hash_key: String,
    /// Index range key attribute
    pub range_key: String,
}

/// Key schema of a table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDefinition {
    /// Table name
    pub name: String,
    /// Hash key attribute
    pub hash_key: String,
    /// Range key attribute
    pub range_key: String,
    /// Global secondary indexes
    pub indexes: Vec<IndexDefinition>,
}

impl TableDefinition {
    /// Table without indexes
    pub fn new(
        name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            hash_key: hash_key.into(),
            range_key: range_key.into(),
            indexes: Vec::new(),
        }
    }

    /// Add a global secondary index
    pub fn with_index(
        mut self,
        name: impl Into<String>,
        hash_key: impl Into<String>,
        range_key: impl Into<String>,
    ) -> Self {
        self.indexes.push(IndexDefinition {
            name: name.into(),
            hash_key: hash_key.into(),
            range_key: range_key.into(),
        });
        self
    }

    /// Look up an index by name
    pub fn index(&self, name: &str) -> Option<&IndexDefinition> {
        self.indexes.iter().find(|i| i.name == name)
    }

    /// Whether `attribute` is part of the table's primary key
    pub fn is_key_attribute(&self, attribute: &str) -> bool {
        attribute == self.hash_key || attribute == self.range_key
    }
}
