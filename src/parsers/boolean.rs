use serde_json::Value;

use crate::errors::NormalizeError;
use tracing::debug;

static TRUTHY: [&str; 3] = ["true", "1", "yes"];
static FALSY: [&str; 4] = ["false", "0", "no", ""];

// numbers are true when non-zero; anything unrecognized folds to false
pub fn parse_bool(value: &Value) -> bool {
    try_parse_bool(value).unwrap_or_else(|e| {
        debug!("{}", e);
        false
    })
}

pub fn parse_bool_opt(value: Option<&Value>) -> bool {
    value.is_some_and(parse_bool)
}

pub fn try_parse_bool(value: &Value) -> Result<bool, NormalizeError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => {
            let lower = s.to_lowercase();
            if TRUTHY.contains(&lower.as_str()) {
                Ok(true)
            } else if FALSY.contains(&lower.as_str()) {
                Ok(false)
            } else {
                Err(NormalizeError::UnknownBooleanRepresentation(s.clone()))
            }
        }
        other => Err(NormalizeError::UnknownBooleanRepresentation(other.to_string())),
    }
}
