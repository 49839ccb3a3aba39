//! Condition and update expressions
//!
//! Conditions are evaluated by the store against the item as it exists at
//! write time, atomically with the write. That is the only synchronization
//! primitive the engine relies on: there is no client-side locking anywhere.

use crate::attribute::{Attribute, AttributeType, AttributeValue};

/// A server-evaluated precondition on the existing item
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The named attribute is absent (also true when the item is absent)
    AttributeNotExists(String),
    /// The named attribute equals the value
    Equals(String, AttributeValue),
    /// The named attribute is strictly less than the value (same type only)
    LessThan(String, AttributeValue),
    /// At least one sub-condition holds
    Or(Vec<Condition>),
}

impl Condition {
    /// `attribute_not_exists(name)`
    pub fn not_exists<T>(attr: Attribute<T>) -> Self {
        Condition::AttributeNotExists(attr.name().to_string())
    }

    /// `name = :value`
    pub fn equals<T: AttributeType>(attr: Attribute<T>, value: &T) -> Self {
        Condition::Equals(attr.name().to_string(), attr.value(value))
    }

    /// `name < :value`
    pub fn less_than<T: AttributeType>(attr: Attribute<T>, value: &T) -> Self {
        Condition::LessThan(attr.name().to_string(), attr.value(value))
    }

    /// `self or other`, flattening nested disjunctions
    pub fn or(self, other: Condition) -> Self {
        match self {
            Condition::Or(mut terms) => {
                terms.push(other);
                Condition::Or(terms)
            }
            first => Condition::Or(vec![first, other]),
        }
    }
}

/// One action of an update expression
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateAction {
    /// `SET name = :value`
    Set(String, AttributeValue),
    /// `ADD name :delta`; a missing attribute counts as zero
    Add(String, i64),
    /// `REMOVE name`
    Remove(String),
}

impl UpdateAction {
    /// Name of the attribute the action touches
    pub fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set(name, _) | UpdateAction::Add(name, _) | UpdateAction::Remove(name) => {
                name
            }
        }
    }

    /// `SET` from a typed attribute
    pub fn set<T: AttributeType>(attr: Attribute<T>, value: &T) -> Self {
        UpdateAction::Set(attr.name().to_string(), attr.value(value))
    }

    /// `ADD` on a numeric attribute
    pub fn add(attr: Attribute<i64>, delta: i64) -> Self {
        UpdateAction::Add(attr.name().to_string(), delta)
    }

    /// `REMOVE` a typed attribute
    pub fn remove<T>(attr: Attribute<T>) -> Self {
        UpdateAction::Remove(attr.name().to_string())
    }
}

/// Which attributes an update returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnValues {
    /// Nothing
    #[default]
    None,
    /// The whole item as it was before the update
    AllOld,
    /// Only the updated attributes, as they were before the update
    UpdatedOld,
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: Attribute<String> = Attribute::new("o");
    const TIMESTAMP: Attribute<i64> = Attribute::new("ts");

    #[test]
    fn test_or_flattens() {
        let cond = Condition::not_exists(OWNER)
            .or(Condition::equals(OWNER, &"a".to_string()))
            .or(Condition::less_than(TIMESTAMP, &5));

        match cond {
            Condition::Or(terms) => assert_eq!(terms.len(), 3),
            other => panic!("expected Or, got {:?}", other),
        }
    }

    #[test]
    fn test_update_action_attribute() {
        assert_eq!(UpdateAction::add(TIMESTAMP, 2).attribute(), "ts");
        assert_eq!(UpdateAction::remove(OWNER).attribute(), "o");
        assert_eq!(
            UpdateAction::set(OWNER, &"x".to_string()),
            UpdateAction::Set("o".to_string(), AttributeValue::S("x".into()))
        );
    }
}
