//! Named factory arguments.

use crate::config::AUTO_DEVICE;
use crate::dtype::DType;
use crate::error::{BlockError, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Arguments handed to a block factory, keyed by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockArgs {
    values: HashMap<String, Value>,
}

impl BlockArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.values.insert(key.to_owned(), value.into());
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Value>) {
        self.values.insert(key.to_owned(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key).filter(|v| !v.is_null())
    }

    /// A required argument.
    pub fn value(&self, key: &str) -> Result<&Value> {
        self.get(key)
            .ok_or_else(|| BlockError::invalid(format!("missing argument \"{key}\"")))
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str> {
        self.get(key).map_or(Ok(default), Value::as_str)
    }

    pub fn dtype_or(&self, key: &str, default: DType) -> Result<DType> {
        self.get(key).map_or(Ok(default), Value::as_dtype)
    }

    pub fn usize_or(&self, key: &str, default: usize) -> Result<usize> {
        self.get(key).map_or(Ok(default), Value::as_usize)
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64> {
        self.get(key).map_or(Ok(default), Value::as_f64)
    }

    pub fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        self.get(key).map_or(Ok(default), Value::as_bool)
    }

    pub fn f64_list_or(&self, key: &str, default: &[f64]) -> Result<Vec<f64>> {
        self.get(key).map_or_else(|| Ok(default.to_vec()), Value::as_f64_list)
    }

    /// The `device` argument, `"Auto"` when absent.
    pub fn device(&self) -> Result<&str> {
        self.str_or("device", AUTO_DEVICE)
    }

    /// The `dtype` argument, `float64` when absent.
    pub fn dtype(&self) -> Result<DType> {
        self.dtype_or("dtype", DType::Float64)
    }

    /// The `numChannels` argument, 1 when absent.
    pub fn num_channels(&self) -> Result<usize> {
        self.usize_or("numChannels", 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let args = BlockArgs::new().with("dtype", DType::Int32).with("numChannels", 3usize);
        assert_eq!(args.dtype().unwrap(), DType::Int32);
        assert_eq!(args.num_channels().unwrap(), 3);
        assert_eq!(args.device().unwrap(), "Auto");
        assert_eq!(args.f64_or("norm", 1.0).unwrap(), 1.0);
        assert!(args.value("taps").is_err());
        let bad = BlockArgs::new().with("numChannels", "two");
        assert!(bad.num_channels().is_err());
    }
}
