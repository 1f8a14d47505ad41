//! Scalar values and declared-type coercion
//!
//! Every CSV cell passes through [`coerce`] before it can touch a document.
//! The null check always runs first: a null token is skipped outright, never
//! stored, so it can never clobber a real value already in the document.

use crate::error::{IngestError, Result};
use crate::schema::DataType;
use serde::{Deserialize, Serialize};

/// Tokens treated as null after trimming, compared case-insensitively
const NULL_TOKENS: [&str; 5] = ["n/a", "n.a.", "null", "nil", "none"];

/// A typed scalar stored in a document.
///
/// Serialized untagged, so documents read as plain JSON scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    Float(f64),
    Text(String),
}

/// Outcome of coercing one raw CSV cell
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// The cell is a null token; nothing is stored
    Null,
    /// The cell coerced to a value. `fallback` carries the observed type
    /// when the declared type had to give way to text.
    Value {
        value: FieldValue,
        fallback: Option<DataType>,
    },
}

/// Whether a raw cell is one of the recognized null spellings
pub fn is_null_token(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || NULL_TOKENS.iter().any(|t| trimmed.eq_ignore_ascii_case(t))
}

/// Letters or underscores mark a cell as prose rather than a number
fn contains_alpha(raw: &str) -> bool {
    raw.chars().any(|c| c.is_ascii_alphabetic() || c == '_')
}

/// Coerce a raw cell through the column's declared type.
///
/// Numeric declared types fall back to text when the cell carries letters;
/// a cell that is neither numeric nor prose (e.g. "--") is a recoverable
/// error the caller logs and skips. Declared types outside the coercion set
/// get best-effort inference with no fallback reported.
pub fn coerce(raw: &str, declared: &DataType, column: &str) -> Result<Coerced> {
    if is_null_token(raw) {
        return Ok(Coerced::Null);
    }

    let cannot_coerce = || IngestError::Coercion {
        value: raw.to_string(),
        column: column.to_string(),
        declared: declared.to_string(),
    };

    match declared {
        DataType::Integer => {
            if let Ok(v) = raw.parse::<i64>() {
                return Ok(value(FieldValue::Int(v), None));
            }
            if contains_alpha(raw) {
                return Ok(value(
                    FieldValue::Text(raw.to_string()),
                    Some(DataType::Text),
                ));
            }
            // Decimal deliveries into integer columns lose the fraction.
            // A digit run too large for f64 overflows to infinity and lands
            // as text instead.
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    return Ok(value(FieldValue::Int(v as i64), None));
                }
                return Ok(value(
                    FieldValue::Text(raw.to_string()),
                    Some(DataType::Text),
                ));
            }
            Err(cannot_coerce())
        }
        DataType::Float => {
            // serde_json writes non-finite floats as JSON null, which the
            // untagged enum cannot read back, so "NaN"/"inf" land as text.
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    return Ok(value(FieldValue::Float(v), None));
                }
                return Ok(value(
                    FieldValue::Text(raw.to_string()),
                    Some(DataType::Text),
                ));
            }
            if contains_alpha(raw) {
                return Ok(value(
                    FieldValue::Text(raw.to_string()),
                    Some(DataType::Text),
                ));
            }
            Err(cannot_coerce())
        }
        DataType::Text => Ok(value(FieldValue::Text(raw.to_string()), None)),
        DataType::Other(_) => {
            if let Ok(v) = raw.parse::<i64>() {
                return Ok(value(FieldValue::Int(v), None));
            }
            if let Ok(v) = raw.parse::<f64>() {
                if v.is_finite() {
                    return Ok(value(FieldValue::Float(v), None));
                }
            }
            Ok(value(FieldValue::Text(raw.to_string()), None))
        }
    }
}

fn value(value: FieldValue, fallback: Option<DataType>) -> Coerced {
    Coerced::Value { value, fallback }
}
