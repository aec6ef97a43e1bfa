//! Canonical JSON encoding.
//!
//! Both the consent-token signing message and the chained-entry hash input
//! are produced here.  The encoding is compact JSON with every object's keys
//! emitted in lexicographic byte order, recursively, so the output depends
//! only on the value and never on field declaration order or map insertion
//! order.

use serde::Serialize;
use serde_json::Value;

use crate::error::{SealError, SealResult};

/// Encode `value` as canonical JSON bytes.
///
/// Returns `SealError::Serialization` if `value` cannot be represented as
/// JSON (e.g. a map with non-string keys).
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> SealResult<Vec<u8>> {
    let value = serde_json::to_value(value).map_err(|e| SealError::Serialization {
        reason: format!("value is not representable as JSON: {}", e),
    })?;

    let mut out = Vec::with_capacity(256);
    write_value(&value, &mut out)?;
    Ok(out)
}

fn write_value(value: &Value, out: &mut Vec<u8>) -> SealResult<()> {
    match value {
        Value::Object(map) => {
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_by(|a, b| a.0.cmp(b.0));

            out.push(b'{');
            for (i, (key, inner)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_scalar(&Value::String(key.clone()), out)?;
                out.push(b':');
                write_value(inner, out)?;
            }
            out.push(b'}');
        }
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_value(item, out)?;
            }
            out.push(b']');
        }
        scalar => write_scalar(scalar, out)?,
    }
    Ok(())
}

fn write_scalar(value: &Value, out: &mut Vec<u8>) -> SealResult<()> {
    serde_json::to_writer(&mut *out, value).map_err(|e| SealError::Serialization {
        reason: format!("failed to encode JSON scalar: {}", e),
    })
}
