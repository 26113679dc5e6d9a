//! Configuration for [`crate::BucketHashTable`].

use crate::error::{Error, Result};

/// Default number of buckets.
pub const DEFAULT_CAPACITY: usize = 50;

/// Default load factor above which the table grows.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Default multiplier applied to the capacity on growth.
pub const DEFAULT_GROWTH_RATIO: usize = 2;

/// Sizing policy of a bucket hash table.
#[derive(Debug, Clone, PartialEq)]
pub struct HashTableConfig {
    /// Number of buckets the table starts with.
    pub initial_capacity: usize,
    /// The table grows as soon as `len / capacity` exceeds this value.
    pub load_factor: f64,
    /// Multiplier applied to the capacity on every growth.
    pub growth_ratio: usize,
}

impl Default for HashTableConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            load_factor: DEFAULT_LOAD_FACTOR,
            growth_ratio: DEFAULT_GROWTH_RATIO,
        }
    }
}

impl HashTableConfig {
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity == 0 {
            return Err(Error::InvalidConfig("initial capacity must be at least 1"));
        }
        if !self.load_factor.is_finite() || self.load_factor <= 0.0 {
            return Err(Error::InvalidConfig("load factor must be a positive number"));
        }
        if self.growth_ratio < 2 {
            return Err(Error::InvalidConfig("growth ratio must be at least 2"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = HashTableConfig::default();
        assert_eq!(config.initial_capacity, 50);
        assert_eq!(config.load_factor, 0.75);
        assert_eq!(config.growth_ratio, 2);
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(HashTableConfig::with_capacity(0).validate().is_err());

        let config = HashTableConfig {
            load_factor: f64::NAN,
            ..HashTableConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HashTableConfig {
            load_factor: -1.0,
            ..HashTableConfig::default()
        };
        assert!(config.validate().is_err());

        let config = HashTableConfig {
            growth_ratio: 1,
            ..HashTableConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
