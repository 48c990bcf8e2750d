//! Default values for configuration fields.
//!
//! These functions are used by serde for default deserialization.

// ============================================================================
// Common Defaults
// ============================================================================

pub fn r#true() -> bool {
    true
}

pub fn r#false() -> bool {
    false
}

// ============================================================================
// [build] Section Defaults
// ============================================================================

pub mod build {
    use std::path::PathBuf;

    pub fn source() -> PathBuf {
        ".".into()
    }

    pub fn output() -> PathBuf {
        "public/collie/dist".into()
    }

    pub fn extension() -> String {
        "collie".into()
    }

    pub fn strip_suffix() -> String {
        "-collie".into()
    }

    pub fn skip_dirs() -> Vec<String> {
        ["node_modules", ".git", "dist", "build", "target"]
            .into_iter()
            .map(String::from)
            .collect()
    }

    pub mod compiler {
        pub fn command() -> Vec<String> {
            vec!["collie".into(), "compile".into()]
        }
    }
}

// ============================================================================
// [serve] Section Defaults
// ============================================================================

pub mod serve {
    use std::path::PathBuf;

    pub fn root() -> PathBuf {
        "public".into()
    }

    pub fn fallback() -> PathBuf {
        "index.html".into()
    }

    pub fn interface() -> String {
        "127.0.0.1".into()
    }

    pub fn port() -> u16 {
        5173
    }

    pub fn port_env() -> String {
        "PORT".into()
    }
}

// ============================================================================
// [loader] Section Defaults
// ============================================================================

pub mod loader {
    use std::path::PathBuf;

    pub fn script() -> PathBuf {
        "main.js".into()
    }

    pub fn placeholder_suffix() -> String {
        "collie".into()
    }

    pub mod toggle {
        pub fn control() -> String {
            ".menu-toggle".into()
        }

        pub fn target() -> String {
            ".nav".into()
        }

        pub fn class() -> String {
            "nav-open".into()
        }
    }
}
