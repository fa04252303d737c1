// src/exec/params.rs

use std::collections::BTreeMap;

use crate::errors::ParamError;
use crate::value::{Payload, Value, ValueType};

/// Read-only configuration of one node, resolved before any pass.
///
/// Keys and meanings are defined per operation (kernel size, sigma, a
/// region of interest, a file path, ...).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(BTreeMap<String, Value>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert used while assembling a pipeline.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn raw(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Typed lookup of a required parameter.
    pub fn get<T: Payload>(&self, key: &str) -> Result<T, ParamError> {
        let value = self
            .0
            .get(key)
            .ok_or_else(|| ParamError::Missing(key.to_string()))?;
        T::from_value(value).ok_or_else(|| ParamError::WrongType {
            key: key.to_string(),
            expected: T::TYPE,
            actual: value.value_type(),
        })
    }

    /// Typed lookup with a fallback when the key is absent.
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<T: Payload>(&self, key: &str, default: T) -> Result<T, ParamError> {
        if self.0.contains_key(key) {
            self.get(key)
        } else {
            Ok(default)
        }
    }

    /// Numeric lookup accepting both `Int` and `Float`.
    ///
    /// Config files frequently spell `sigma = 2` where a float is meant.
    pub fn number(&self, key: &str) -> Result<f64, ParamError> {
        match self.0.get(key) {
            Some(Value::Float(f)) => Ok(*f),
            Some(Value::Int(i)) => Ok(*i as f64),
            Some(other) => Err(ParamError::WrongType {
                key: key.to_string(),
                expected: ValueType::Float,
                actual: other.value_type(),
            }),
            None => Err(ParamError::Missing(key.to_string())),
        }
    }

    pub fn number_or(&self, key: &str, default: f64) -> Result<f64, ParamError> {
        if self.0.contains_key(key) {
            self.number(key)
        } else {
            Ok(default)
        }
    }
}

impl FromIterator<(String, Value)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Rect;

    #[test]
    fn typed_lookup() {
        let params = Parameters::new()
            .with("kernel_size", 5_i64)
            .with("roi", Rect::new(0.0, 0.0, 4.0, 4.0));

        assert_eq!(params.get::<i64>("kernel_size"), Ok(5));
        assert_eq!(params.get::<Rect>("roi").unwrap().width, 4.0);
        assert_eq!(
            params.get::<f64>("sigma"),
            Err(ParamError::Missing("sigma".into()))
        );
        assert!(matches!(
            params.get::<String>("kernel_size"),
            Err(ParamError::WrongType {
                expected: ValueType::Text,
                actual: ValueType::Int,
                ..
            })
        ));
    }

    #[test]
    fn get_or_only_defaults_when_absent() {
        let params = Parameters::new().with("path", "a.pgm".to_string());
        assert_eq!(params.get_or("missing", 3_i64), Ok(3));
        assert!(params.get_or("path", 3_i64).is_err());
    }

    #[test]
    fn number_accepts_ints_and_floats() {
        let params = Parameters::new().with("a", 2_i64).with("b", 1.5_f64).with("c", true);
        assert_eq!(params.number("a"), Ok(2.0));
        assert_eq!(params.number("b"), Ok(1.5));
        assert!(params.number("c").is_err());
        assert_eq!(params.number_or("d", 0.25), Ok(0.25));
    }
}
