//! Condition evaluation and update application
//!
//! Both run with the partition locked, against the item as it exists at that
//! moment. An absent item behaves as an item with no attributes.

use ordo_core::{
    AttributeValue, Condition, Item, ReturnValues, StoreError, StoreResult, TableDefinition,
    UpdateAction,
};
use std::collections::BTreeMap;

/// Evaluate a condition against the current item
pub(crate) fn evaluate(condition: &Condition, item: Option<&Item>) -> bool {
    let lookup = |name: &str| item.and_then(|i| i.get(name));
    match condition {
        Condition::AttributeNotExists(name) => lookup(name).is_none(),
        Condition::Equals(name, value) => lookup(name) == Some(value),
        Condition::LessThan(name, value) => match lookup(name) {
            Some(current) => comparable(current, value) && current < value,
            None => false,
        },
        Condition::Or(terms) => terms.iter().any(|t| evaluate(t, item)),
    }
}

fn comparable(a: &AttributeValue, b: &AttributeValue) -> bool {
    matches!(
        (a, b),
        (AttributeValue::N(_), AttributeValue::N(_))
            | (AttributeValue::S(_), AttributeValue::S(_))
            | (AttributeValue::B(_), AttributeValue::B(_))
    )
}

/// Apply update actions, producing the new item
///
/// `base` is the existing item, or the bare key attributes when the item does
/// not exist yet.
pub(crate) fn apply_actions(
    definition: &TableDefinition,
    base: Item,
    actions: &[UpdateAction],
) -> StoreResult<Item> {
    let mut item = base;
    for action in actions {
        let name = action.attribute();
        if definition.is_key_attribute(name) {
            return Err(StoreError::Validation(format!(
                "cannot update key attribute '{}'",
                name
            )));
        }
        match action {
            UpdateAction::Set(name, value) => {
                item.insert(name.clone(), value.clone());
            }
            UpdateAction::Add(name, delta) => {
                let current = match item.get(name) {
                    None => 0,
                    Some(AttributeValue::N(n)) => *n,
                    Some(other) => {
                        return Err(StoreError::Validation(format!(
                            "ADD on attribute '{}' of type {}",
                            name,
                            other.type_name()
                        )))
                    }
                };
                let next = current.checked_add(*delta).ok_or_else(|| {
                    StoreError::Validation(format!("ADD overflows attribute '{}'", name))
                })?;
                item.insert(name.clone(), AttributeValue::N(next));
            }
            UpdateAction::Remove(name) => {
                item.remove(name);
            }
        }
    }
    Ok(item)
}

/// Select what an update returns
pub(crate) fn project_return(
    return_values: ReturnValues,
    old: Option<&Item>,
    actions: &[UpdateAction],
) -> Option<Item> {
    match return_values {
        ReturnValues::None => None,
        ReturnValues::AllOld => old.cloned(),
        ReturnValues::UpdatedOld => {
            let old = old?;
            let touched: BTreeMap<String, AttributeValue> = actions
                .iter()
                .filter_map(|a| {
                    old.get(a.attribute())
                        .map(|v| (a.attribute().to_string(), v.clone()))
                })
                .collect();
            if touched.is_empty() {
                None
            } else {
                Some(touched)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> TableDefinition {
        TableDefinition::new("t", "hk", "sk")
    }

    fn item(pairs: &[(&str, AttributeValue)]) -> Item {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_not_exists_holds_for_absent_item() {
        let cond = Condition::AttributeNotExists("o".into());
        assert!(evaluate(&cond, None));
        assert!(!evaluate(&cond, Some(&item(&[("o", "a".into())]))));
    }

    #[test]
    fn test_equals_and_or() {
        let current = item(&[("o", "a".into()), ("ts", AttributeValue::N(10))]);
        let cond = Condition::AttributeNotExists("o".into())
            .or(Condition::Equals("o".into(), "b".into()))
            .or(Condition::LessThan("ts".into(), AttributeValue::N(11)));
        assert!(evaluate(&cond, Some(&current)));

        let cond = Condition::AttributeNotExists("o".into())
            .or(Condition::Equals("o".into(), "b".into()))
            .or(Condition::LessThan("ts".into(), AttributeValue::N(10)));
        assert!(!evaluate(&cond, Some(&current)));
    }

    #[test]
    fn test_less_than_across_types_is_false() {
        let current = item(&[("ts", AttributeValue::S("1".into()))]);
        assert!(!evaluate(
            &Condition::LessThan("ts".into(), AttributeValue::N(100)),
            Some(&current)
        ));
    }

    #[test]
    fn test_add_treats_missing_as_zero() {
        let out = apply_actions(&def(), Item::new(), &[UpdateAction::Add("value".into(), 3)]).unwrap();
        assert_eq!(out.get("value"), Some(&AttributeValue::N(3)));
    }

    #[test]
    fn test_add_on_string_is_rejected() {
        let base = item(&[("value", "x".into())]);
        let err = apply_actions(&def(), base, &[UpdateAction::Add("value".into(), 1)]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_key_attributes_are_immutable() {
        let err = apply_actions(&def(), Item::new(), &[UpdateAction::Set("sk".into(), AttributeValue::N(1))])
            .unwrap_err();
        assert!(err.to_string().contains("key attribute"));
    }

    #[test]
    fn test_updated_old_only_returns_touched_attributes() {
        let old = item(&[("value", AttributeValue::N(4)), ("other", "x".into())]);
        let actions = [UpdateAction::Add("value".into(), 1)];
        let returned = project_return(ReturnValues::UpdatedOld, Some(&old), &actions).unwrap();
        assert_eq!(returned, item(&[("value", AttributeValue::N(4))]));
    }

    #[test]
    fn test_updated_old_without_previous_value_is_none() {
        let actions = [UpdateAction::Add("value".into(), 1)];
        assert!(project_return(ReturnValues::UpdatedOld, None, &actions).is_none());
    }
}
