use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum MergeError {
    #[error("Cannot merge {0} state, since it is not a JSON object")]
    NotAnObject(&'static str),
    #[error("Summing key '{0}' produced a value that cannot be stored")]
    NumericOverflow(String),
}

fn is_empty_state(state: &Value) -> bool {
    match state {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}

/// Merges a shadow balance's strategy state into a wallet's strategy state.
///
/// * If either side is empty (`null` or `{}`), the other side is returned verbatim.
/// * Otherwise keys are merged one by one: numeric values present on both sides are summed, and every other wallet
///   key is kept unchanged. Keys that only the shadow has are added.
///
/// Integers are summed as integers so that counters still deserialize as counters afterwards.
pub fn merge_states(wallet_state: &Value, shadow_state: &Value) -> Result<Value, MergeError> {
    if is_empty_state(wallet_state) {
        return Ok(shadow_state.clone());
    }
    if is_empty_state(shadow_state) {
        return Ok(wallet_state.clone());
    }
    let wallet = wallet_state.as_object().ok_or(MergeError::NotAnObject("wallet"))?;
    let shadow = shadow_state.as_object().ok_or(MergeError::NotAnObject("shadow"))?;
    let mut merged: Map<String, Value> = wallet.clone();
    for (key, shadow_value) in shadow {
        let summed = match (merged.get(key), shadow_value) {
            (Some(Value::Number(a)), Value::Number(b)) => Some(sum_numbers(key, a, b)?),
            _ => None,
        };
        match summed {
            Some(n) => {
                merged.insert(key.clone(), Value::Number(n));
            },
            None => {
                merged.entry(key.clone()).or_insert_with(|| shadow_value.clone());
            },
        }
    }
    Ok(Value::Object(merged))
}

fn sum_numbers(key: &str, a: &Number, b: &Number) -> Result<Number, MergeError> {
    if let (Some(a), Some(b)) = (a.as_i64(), b.as_i64()) {
        if let Some(sum) = a.checked_add(b) {
            return Ok(Number::from(sum));
        }
    }
    let sum = a.as_f64().unwrap_or_default() + b.as_f64().unwrap_or_default();
    Number::from_f64(sum).ok_or_else(|| MergeError::NumericOverflow(key.to_string()))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::merge_states;

    #[test]
    fn empty_wallet_takes_shadow_verbatim() {
        let shadow = json!({"current_punches": 2, "total_redeemed": 0});
        assert_eq!(merge_states(&json!({}), &shadow).unwrap(), shadow);
        assert_eq!(merge_states(&json!(null), &shadow).unwrap(), shadow);
    }

    #[test]
    fn empty_shadow_keeps_wallet_verbatim() {
        let wallet = json!({"total_earned": 12.5});
        assert_eq!(merge_states(&wallet, &json!({})).unwrap(), wallet);
        assert_eq!(merge_states(&wallet, &json!(null)).unwrap(), wallet);
    }

    #[test]
    fn overlapping_numeric_keys_are_summed() {
        let wallet = json!({"current_punches": 1, "total_points": 10.5, "label": "gold"});
        let shadow = json!({"current_punches": 2, "total_points": 4.0, "label": "bronze", "streak": 3});
        let merged = merge_states(&wallet, &shadow).unwrap();
        assert_eq!(merged["current_punches"], json!(3));
        assert!(merged["current_punches"].is_i64());
        assert_eq!(merged["total_points"], json!(14.5));
        // non-numeric wallet keys win
        assert_eq!(merged["label"], json!("gold"));
        // shadow-only keys are added
        assert_eq!(merged["streak"], json!(3));
    }

    #[test]
    fn numeric_shadow_value_does_not_replace_non_numeric_wallet_value() {
        let wallet = json!({"tier": "silver"});
        let shadow = json!({"tier": 2});
        assert_eq!(merge_states(&wallet, &shadow).unwrap(), json!({"tier": "silver"}));
    }

    #[test]
    fn non_object_states_are_rejected() {
        assert!(merge_states(&json!([1, 2]), &json!({"a": 1})).is_err());
        assert!(merge_states(&json!({"a": 1}), &json!("x")).is_err());
    }
}
