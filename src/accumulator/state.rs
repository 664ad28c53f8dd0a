//! Serde helpers for numeric accumulator state
//!
//! JSON has no representation for infinities or NaN; `serde_json` turns them
//! into `null`, which cannot be decoded back into an `f64`. Fields holding a
//! [`Numeric`] go through [`Numeric::encode`] / [`Numeric::decode`] instead,
//! which spell non-finite floats as `"inf"`, `"-inf"` and `"NaN"`.

use super::Numeric;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

pub(crate) fn serialize<T: Numeric, S: Serializer>(
    value: &T,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    value.encode(serializer)
}

pub(crate) fn deserialize<'de, T: Numeric, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<T, D::Error> {
    T::decode(deserializer)
}

/// Same encoding for `Option<T>` fields; `None` stays `null`
pub(crate) mod option {
    use super::{Encoded, Numeric};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<T: Numeric, S: Serializer>(
        value: &Option<T>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&Encoded(value)),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, T: Numeric, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<T>, D::Error> {
        Ok(Option::<Encoded<T>>::deserialize(deserializer)?.map(|encoded| encoded.0))
    }
}

/// Result value of a numeric accumulator, with the same non-finite spelling
pub(crate) fn to_value<T: Numeric>(value: T) -> serde_json::Result<Value> {
    value.encode(serde_json::value::Serializer)
}

pub(crate) fn option_to_value<T: Numeric>(value: Option<T>) -> serde_json::Result<Value> {
    match value {
        Some(value) => to_value(value),
        None => Ok(Value::Null),
    }
}

struct Encoded<T>(T);

impl<T: Numeric> Serialize for Encoded<&T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.encode(serializer)
    }
}

impl<'de, T: Numeric> Deserialize<'de> for Encoded<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        T::decode(deserializer).map(Encoded)
    }
}
