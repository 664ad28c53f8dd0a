//! Summing counters

use super::{Accumulator, AccumulatorKind};
use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;

/// Numeric types usable in counters and extrema
pub trait Numeric:
    Copy + Default + PartialOrd + fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// Short name used in kind tags (`counter.long`)
    const TYPE_NAME: &'static str;

    /// Sum two values; integer sums wrap so combining stays associative
    fn sum(self, other: Self) -> Self;

    fn max_of(self, other: Self) -> Self;

    fn min_of(self, other: Self) -> Self;

    /// Write this value into accumulator state
    fn encode<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.serialize(serializer)
    }

    /// Read a value written by [`Numeric::encode`]
    fn decode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Self::deserialize(deserializer)
    }
}

impl Numeric for i32 {
    const TYPE_NAME: &'static str = "int";

    fn sum(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn max_of(self, other: Self) -> Self {
        self.max(other)
    }

    fn min_of(self, other: Self) -> Self {
        self.min(other)
    }
}

impl Numeric for i64 {
    const TYPE_NAME: &'static str = "long";

    fn sum(self, other: Self) -> Self {
        self.wrapping_add(other)
    }

    fn max_of(self, other: Self) -> Self {
        self.max(other)
    }

    fn min_of(self, other: Self) -> Self {
        self.min(other)
    }
}

impl Numeric for f64 {
    const TYPE_NAME: &'static str = "double";

    fn sum(self, other: Self) -> Self {
        self + other
    }

    // f64::max/min ignore NaN, which keeps the result independent of order
    fn max_of(self, other: Self) -> Self {
        self.max(other)
    }

    fn min_of(self, other: Self) -> Self {
        self.min(other)
    }

    fn encode<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.is_nan() {
            serializer.serialize_str("NaN")
        } else if self.is_infinite() && self.is_sign_positive() {
            serializer.serialize_str("inf")
        } else if self.is_infinite() {
            serializer.serialize_str("-inf")
        } else {
            serializer.serialize_f64(*self)
        }
    }

    fn decode<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Number(f64),
            Text(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Number(value) => Ok(value),
            Repr::Text(text) => match text.as_str() {
                "NaN" => Ok(f64::NAN),
                "inf" => Ok(f64::INFINITY),
                "-inf" => Ok(f64::NEG_INFINITY),
                _ => Err(D::Error::custom(format!("'{text}' is not a number"))),
            },
        }
    }
}

/// Running total; identity element is zero
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Numeric")]
pub struct Counter<T: Numeric> {
    #[serde(with = "super::state")]
    total: T,
}

pub type IntCounter = Counter<i32>;
pub type LongCounter = Counter<i64>;
pub type DoubleCounter = Counter<f64>;

impl<T: Numeric> Counter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at `total`
    pub fn with_total(total: T) -> Self {
        Self { total }
    }

    pub fn total(&self) -> T {
        self.total
    }
}

impl<T: Numeric> Accumulator for Counter<T> {
    type Input = T;
    type Output = T;

    fn kind() -> AccumulatorKind {
        AccumulatorKind::new(format!("counter.{}", T::TYPE_NAME))
    }

    fn add(&mut self, value: T) {
        self.total = self.total.sum(value);
    }

    fn merge(&mut self, other: &Self) {
        self.total = self.total.sum(other.total);
    }

    fn result(&self) -> T {
        self.total
    }

    fn result_value(&self) -> serde_json::Result<Value> {
        super::state::to_value(self.total)
    }
}
