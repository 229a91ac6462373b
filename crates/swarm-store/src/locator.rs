//! Object locators: `swarm://<bucket>/<key>`.

use std::fmt;
use std::str::FromStr;

use crate::error::StoreError;

const SCHEME: &str = "swarm://";

/// Address of an object in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator {
    pub bucket: String,
    pub key: String,
}

impl Locator {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Composite table key.
    pub(crate) fn table_key(&self) -> String {
        format!("{}/{}", self.bucket, self.key)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl FromStr for Locator {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix(SCHEME)
            .ok_or_else(|| StoreError::InvalidLocator(s.to_string()))?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(Locator::new(bucket, key))
            }
            _ => Err(StoreError::InvalidLocator(s.to_string())),
        }
    }
}
