//! Transparent JSON Value Codec
//!
//! The wrapped store only understands strings. The codec is a best-effort
//! bridge that lets callers pass objects, arrays, numbers and booleans:
//!
//! - [`encode`] turns every non-string argument into its JSON text. Strings are
//!   assumed to be wire-ready already and are never quoted.
//! - [`decode`] parses replies back into structured values, recursing into
//!   arrays (e.g. `MGET` or batch `EXEC` results).
//!
//! Neither direction can fail. A value that cannot be serialized or parsed is
//! passed through unchanged, which means a caller cannot tell "plain text" from
//! "text that failed to parse". [`decode_outcome`] exposes which of the two
//! happened for a single scalar.
//!
//! ## Example
//!
//! ```
//! use flashkv_q::codec::{decode, encode};
//! use serde_json::json;
//!
//! let wire = encode(&[json!("foo"), json!({"a": 1})]);
//! assert_eq!(wire, vec![json!("foo"), json!("{\"a\":1}")]);
//!
//! assert_eq!(decode(json!(["BAR", "{\"a\":1}"])), json!(["BAR", {"a": 1}]));
//! ```

use serde_json::Value;
use tracing::trace;

/// The outcome of decoding a single reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// The value was JSON text and has been parsed.
    Parsed(Value),
    /// The value was left as it arrived.
    Passthrough(Value),
}

impl Decoded {
    /// Returns the decoded value, whichever way it was produced.
    pub fn into_value(self) -> Value {
        match self {
            Decoded::Parsed(v) | Decoded::Passthrough(v) => v,
        }
    }

    /// Returns true if the value was parsed from JSON text.
    pub fn is_parsed(&self) -> bool {
        matches!(self, Decoded::Parsed(_))
    }
}

/// Encodes call arguments for the wire.
///
/// The result always has the same length and order as `values`.
pub fn encode(values: &[Value]) -> Vec<Value> {
    let encoded: Vec<Value> = values.iter().map(encode_one).collect();
    trace!(?values, ?encoded, "encode");
    encoded
}

fn encode_one(value: &Value) -> Value {
    match value {
        Value::String(_) => value.clone(),
        other => match serde_json::to_string(other) {
            Ok(text) => Value::String(text),
            Err(_) => other.clone(),
        },
    }
}

/// Decodes a reply, recursing into arrays element by element.
pub fn decode(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.into_iter().map(decode).collect()),
        scalar => decode_outcome(scalar).into_value(),
    }
}

/// Decodes a single scalar reply and reports whether it was parsed.
///
/// Arrays are not traversed here; use [`decode`] for that.
pub fn decode_outcome(value: Value) -> Decoded {
    let outcome = match value {
        Value::String(text) => match serde_json::from_str::<Value>(&text) {
            Ok(parsed) => Decoded::Parsed(parsed),
            Err(_) => Decoded::Passthrough(Value::String(text)),
        },
        other => Decoded::Passthrough(other),
    };
    trace!(?outcome, "decode");
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_encode_leaves_strings_alone() {
        let encoded = encode(&[json!("FOO"), json!(""), json!("{\"a\":1}")]);
        assert_eq!(encoded, vec![json!("FOO"), json!(""), json!("{\"a\":1}")]);
    }

    #[test]
    fn test_encode_serializes_everything_else() {
        let encoded = encode(&[
            json!(["BAZ", 123, true]),
            json!({"str": "QUX", "num": 123, "bool": true}),
            json!(42),
            json!(false),
            Value::Null,
        ]);

        assert_eq!(encoded[0], json!("[\"BAZ\",123,true]"));
        assert_eq!(encoded[1], json!("{\"bool\":true,\"num\":123,\"str\":\"QUX\"}"));
        assert_eq!(encoded[2], json!("42"));
        assert_eq!(encoded[3], json!("false"));
        assert_eq!(encoded[4], json!("null"));
    }

    #[test]
    fn test_encode_preserves_order_and_length() {
        let input = vec![json!(1), json!("two"), json!([3]), json!({"four": 4})];
        let encoded = encode(&input);
        assert_eq!(encoded.len(), input.len());
        assert_eq!(encoded[1], json!("two"));
        assert_eq!(encoded[2], json!("[3]"));
    }

    #[test]
    fn test_decode_json_text() {
        assert_eq!(decode(json!("{\"a\":1}")), json!({"a": 1}));
        assert_eq!(decode(json!("[\"BAZ\",123,true]")), json!(["BAZ", 123, true]));
        assert_eq!(decode(json!("123")), json!(123));
        assert_eq!(decode(json!("true")), json!(true));
    }

    #[test]
    fn test_decode_falls_back_to_original_text() {
        assert_eq!(decode(json!("FOO")), json!("FOO"));
        assert_eq!(decode(json!("OK")), json!("OK"));
        assert_eq!(decode(json!("{broken")), json!("{broken"));
    }

    #[test]
    fn test_decode_passes_non_strings_through() {
        assert_eq!(decode(Value::Null), Value::Null);
        assert_eq!(decode(json!(7)), json!(7));
    }

    #[test]
    fn test_decode_recurses_into_nested_arrays() {
        let reply = json!(["OK", "OK", ["FOO", "[\"BAZ\",123,true]", "{\"str\":\"QUX\"}", null]]);
        assert_eq!(
            decode(reply),
            json!(["OK", "OK", ["FOO", ["BAZ", 123, true], {"str": "QUX"}, null]])
        );
    }

    #[test]
    fn test_decode_outcome_distinguishes_parse() {
        assert!(decode_outcome(json!("{\"a\":1}")).is_parsed());
        assert!(!decode_outcome(json!("plain text")).is_parsed());
        assert_eq!(
            decode_outcome(json!("plain text")),
            Decoded::Passthrough(json!("plain text"))
        );
    }

    #[test]
    fn test_round_trip_for_json_safe_values() {
        let values = vec![
            json!({"str": "FOO", "num": 123, "bool": true}),
            json!(["FOO", 123, true]),
            json!(3.5),
            json!(false),
        ];
        for (value, wire) in values.iter().zip(encode(&values)) {
            assert_eq!(&decode(wire), value);
        }
    }

    #[test]
    fn test_numeric_looking_strings_do_not_round_trip() {
        // Strings bypass encoding, so "123" comes back as a number.
        let wire = encode(&[json!("123")]);
        assert_eq!(decode(wire[0].clone()), json!(123));
    }
}
