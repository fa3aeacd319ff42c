//! Serde helpers shared by the wire types.

use serde::{Deserialize, Deserializer};

/// Treats an explicit JSON `null` like a missing key.
///
/// Pair with `#[serde(default)]` so both shapes yield `T::default()`.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<u32>,
        #[serde(default, deserialize_with = "null_as_default")]
        count: u64,
    }

    #[test]
    fn null_and_missing_both_default() {
        let nulls: Sample = serde_json::from_str(r#"{"items":null,"count":null}"#).expect("nulls");
        assert!(nulls.items.is_empty());
        assert_eq!(nulls.count, 0);

        let missing: Sample = serde_json::from_str("{}").expect("missing");
        assert!(missing.items.is_empty());

        let present: Sample = serde_json::from_str(r#"{"items":[1],"count":3}"#).expect("present");
        assert_eq!(present.items, vec![1]);
        assert_eq!(present.count, 3);
    }
}
