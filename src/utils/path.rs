//! Path helpers shared by the builder, the server and the loader.

use std::path::{Component, Path};

/// Render a relative path with `/` separators regardless of platform.
pub fn to_posix(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// True if joining `path` onto a directory can only reach inside it:
/// no root, prefix or `..` components.
pub fn is_contained(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_to_posix() {
        let path: PathBuf = ["nav", "Menu.collie"].iter().collect();
        assert_eq!(to_posix(&path), "nav/Menu.collie");
        assert_eq!(to_posix(Path::new("Hero.collie")), "Hero.collie");
        assert_eq!(to_posix(Path::new("")), "");
    }

    #[test]
    fn test_is_contained() {
        assert!(is_contained(Path::new("Hero")));
        assert!(is_contained(Path::new("nav/Menu")));
        assert!(is_contained(Path::new("./nav/Menu")));
        assert!(!is_contained(Path::new("../escape")));
        assert!(!is_contained(Path::new("nav/../../escape")));
        assert!(!is_contained(Path::new("/etc/passwd")));
    }
}
