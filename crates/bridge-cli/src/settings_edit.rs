//! Editing a single setting addressed by a dotted key, for `config set`.
//!
//! Keys use the JSON field names (`pod.authToken`); snake_case spellings
//! (`pod.auth_token`) are accepted too. The value is parsed according to
//! the type of the field it replaces.

use bridge_core::{BridgeSettings, SettingsError, validate_settings};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingEditError {
    #[error("Unknown setting '{key}'. Known settings: {known}")]
    UnknownKey { key: String, known: String },

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error(transparent)]
    Invalid(#[from] SettingsError),
}

/// Every key `config set` accepts, as `section.field`.
pub fn setting_keys() -> Vec<String> {
    let Ok(Value::Object(document)) = serde_json::to_value(BridgeSettings::default()) else {
        return Vec::new();
    };
    document
        .iter()
        .filter_map(|(section, fields)| fields.as_object().map(|f| (section, f)))
        .flat_map(|(section, fields)| fields.keys().map(move |field| format!("{section}.{field}")))
        .collect()
}

/// Return a copy of `settings` with `key` set to `raw`, validated.
pub fn apply_setting(
    settings: &BridgeSettings,
    key: &str,
    raw: &str,
) -> Result<BridgeSettings, SettingEditError> {
    let unknown = || SettingEditError::UnknownKey {
        key: key.to_string(),
        known: setting_keys().join(", "),
    };
    let invalid = |message: String| SettingEditError::InvalidValue {
        key: key.to_string(),
        message,
    };

    let (section, field) = key.split_once('.').ok_or_else(unknown)?;
    let field = camel_case(field);

    let mut document = serde_json::to_value(settings).map_err(|e| invalid(e.to_string()))?;
    let slot = document
        .get_mut(section)
        .and_then(|s| s.get_mut(field.as_str()))
        .ok_or_else(unknown)?;
    *slot = parse_value(slot, raw).map_err(invalid)?;

    let updated: BridgeSettings =
        serde_json::from_value(document).map_err(|e| invalid(e.to_string()))?;
    validate_settings(&updated)?;
    Ok(updated)
}

fn parse_value(current: &Value, raw: &str) -> Result<Value, String> {
    let trimmed = raw.trim();
    match current {
        Value::Bool(_) => match trimmed.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(Value::Bool(true)),
            "false" | "no" | "off" | "0" => Ok(Value::Bool(false)),
            _ => Err(format!("expected true or false, got '{raw}'")),
        },
        Value::Number(_) => trimmed
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| format!("expected a non-negative integer, got '{raw}'")),
        Value::Array(_) => Ok(Value::Array(
            trimmed
                .split(',')
                .map(str::trim)
                .filter(|item| !item.is_empty())
                .map(|item| Value::String(item.to_string()))
                .collect(),
        )),
        _ => Ok(Value::String(trimmed.to_string())),
    }
}

fn camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper = false;
    for c in field.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}
