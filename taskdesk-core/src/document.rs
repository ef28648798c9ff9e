//! Helpers over plain JSON documents.
//!
//! The task form data and the delay settings live in separate on-disk
//! documents; validation runs on their flat union.

use serde_json::{Map, Value};

use crate::error::CoreError;

/// Flat union of two documents; `overlay` wins on key collisions.
pub fn merge(base: Map<String, Value>, overlay: Map<String, Value>) -> Map<String, Value> {
    let mut merged = base;
    for (key, value) in overlay {
        merged.insert(key, value);
    }
    merged
}

/// Walk `keys` down from `root`, returning the value at the end of the path.
pub fn get_path<'a>(root: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    let (first, rest) = keys.split_first()?;
    let mut current = root.get(*first)?;
    for key in rest {
        current = current.as_object()?.get(*key)?;
    }
    Some(current)
}

/// Set the value at a nested key path, creating intermediate objects as
/// needed. Works at any depth.
pub fn set_path(root: &mut Value, keys: &[&str], value: Value) -> Result<(), CoreError> {
    match keys {
        [] => Err(CoreError::SettingsData(
            "пустой путь к настройке".to_owned(),
        )),
        [last] => {
            let object = root.as_object_mut().ok_or_else(|| {
                CoreError::SettingsData(format!("значение {last} нельзя записать: не объект"))
            })?;
            object.insert((*last).to_owned(), value);
            Ok(())
        }
        [head, rest @ ..] => {
            let object = root.as_object_mut().ok_or_else(|| {
                CoreError::SettingsData(format!("значение {head} нельзя записать: не объект"))
            })?;
            let child = object
                .entry((*head).to_owned())
                .or_insert_with(|| Value::Object(Map::new()));
            set_path(child, rest, value)
        }
    }
}

/// Python-style truthiness, used by the sleep-block checks.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::String(text) => !text.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(entries) => !entries.is_empty(),
    }
}
