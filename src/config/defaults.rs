//! Default values for `folio.toml` fields.
//!
//! These functions are used by serde for default deserialization.

pub fn r#true() -> bool {
    true
}

// ============================================================================
// [site] Section Defaults
// ============================================================================

pub mod site {
    use std::path::PathBuf;

    pub fn content() -> PathBuf {
        "blog".into()
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        8080
    }
}

// ============================================================================
// [store] Section Defaults
// ============================================================================

pub mod store {
    use super::super::StoreMode;
    use std::path::PathBuf;

    pub fn mode() -> StoreMode {
        StoreMode::Memory
    }

    pub fn path() -> PathBuf {
        ".folio-store".into()
    }
}
