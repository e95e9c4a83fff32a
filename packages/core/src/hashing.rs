// Hashing
//
// Content digests and canonical object hashing. Every hash produced by the
// core goes through this module so that one canonicalization applies
// everywhere: blake3 over bytes, and serde_json with sorted object keys for
// structured values.

use serde::Serialize;

/// Hex digest of a byte slice.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Hex digest of a string.
pub fn hash_string(input: &str) -> String {
    hash_bytes(input.as_bytes())
}

/// Canonical textual form of a JSON value. `serde_json`'s default map is
/// ordered by key, so object keys always serialize sorted; numbers and
/// strings use serde_json's single stable formatting.
pub fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

/// Deterministic digest of any serializable value, independent of field
/// declaration order or map insertion order.
pub fn hash_object<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let value = serde_json::to_value(value)?;
    Ok(hash_string(&canonical_json(&value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    mod hash_bytes_tests {
        use super::*;

        #[test]
        fn should_be_stable() {
            assert_eq!(hash_bytes(b"hi"), hash_bytes(b"hi"));
            assert_ne!(hash_bytes(b"hi"), hash_bytes(b"ho"));
        }

        #[test]
        fn should_produce_hex_of_a_256_bit_digest() {
            assert_eq!(hash_bytes(b"").len(), 64);
        }
    }

    mod hash_object_tests {
        use super::*;

        #[test]
        fn should_sort_object_keys() {
            let a = json!({"b": 1, "a": 2});
            let b = json!({"a": 2, "b": 1});
            assert_eq!(hash_object(&a).unwrap(), hash_object(&b).unwrap());
        }

        #[test]
        fn should_distinguish_values() {
            let a = json!({"a": 1});
            let b = json!({"a": 2});
            assert_ne!(hash_object(&a).unwrap(), hash_object(&b).unwrap());
        }

        #[test]
        fn should_preserve_array_order() {
            let a = json!([1, 2]);
            let b = json!([2, 1]);
            assert_ne!(hash_object(&a).unwrap(), hash_object(&b).unwrap());
        }
    }
}
