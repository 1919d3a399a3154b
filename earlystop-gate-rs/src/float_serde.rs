//! Serde helpers for `f32` values that may be NaN or infinite.
//!
//! JSON has no representation for non-finite numbers, and loss streams do
//! produce them. Finite values are written as plain numbers; NaN and the
//! infinities are written as the strings `"NaN"`, `"inf"` and `"-inf"`.

use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum Repr {
    Number(f32),
    Text(String),
}

impl Repr {
    fn into_f32<E: serde::de::Error>(self) -> Result<f32, E> {
        match self {
            Repr::Number(v) => Ok(v),
            Repr::Text(text) => text
                .parse::<f32>()
                .map_err(|e| E::custom(format!("invalid float {text:?}: {e}"))),
        }
    }
}

/// Serializes one `f32`.
pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f32(*value)
    } else {
        serializer.serialize_str(&value.to_string())
    }
}

/// Deserializes one `f32`.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
    Repr::deserialize(deserializer)?.into_f32()
}

/// Helpers for `Option<f32>`.
pub mod option {
    use super::Repr;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes an optional `f32`.
    pub fn serialize<S: Serializer>(value: &Option<f32>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional `f32`.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<f32>, D::Error> {
        Option::<Repr>::deserialize(deserializer)?
            .map(Repr::into_f32)
            .transpose()
    }
}

/// Helpers for `Vec<f32>`.
pub mod vec {
    use super::Repr;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    struct Item(f32);

    impl serde::Serialize for Item {
        fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
            super::serialize(&self.0, serializer)
        }
    }

    /// Serializes a sequence of `f32`.
    pub fn serialize<S: Serializer>(values: &[f32], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for v in values {
            seq.serialize_element(&Item(*v))?;
        }
        seq.end()
    }

    /// Deserializes a sequence of `f32`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f32>, D::Error> {
        Vec::<Repr>::deserialize(deserializer)?
            .into_iter()
            .map(Repr::into_f32)
            .collect()
    }
}
