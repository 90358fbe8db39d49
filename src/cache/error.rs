//! Content cache errors.

use crate::{config::ConfigError, store::StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    /// The requested entry, page or front page has no parsed document.
    #[error("not found: `{0}`")]
    NotFound(String),

    /// Reload secret mismatch.
    #[error("unauthorized")]
    Unauthorized,

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Whether the HTTP layer should answer "not found".
    ///
    /// Unauthorized reloads are deliberately indistinguishable from a
    /// missing route.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Unauthorized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_mapping() {
        assert!(CacheError::NotFound("x".into()).is_not_found());
        assert!(CacheError::Unauthorized.is_not_found());
        assert!(!CacheError::Config(ConfigError::Validation("bad".into())).is_not_found());
    }
}
