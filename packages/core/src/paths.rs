// Project Paths
//
// Project-relative paths in POSIX form, with conversions to and from
// absolute paths at the plugin and filesystem boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// A path relative to the project root, always using `/` separators.
///
/// Everything inside the core speaks `ProjectPath`; absolute paths appear
/// only when crossing into plugins, the filesystem, or the package manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectPath(String);

impl ProjectPath {
    pub fn new(path: impl Into<String>) -> Self {
        let mut path = path.into().replace('\\', "/");
        while let Some(stripped) = path.strip_prefix("./") {
            path = stripped.to_string();
        }
        ProjectPath(path)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// The file extension without the leading dot, if any.
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.0.rsplit('/').next().unwrap_or(&self.0);
        match file_name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() => Some(ext),
            _ => None,
        }
    }

    /// Replace the extension, producing `<stem>.<new_type>` in the same
    /// directory. A path with no extension gains one.
    pub fn with_type(&self, new_type: &str) -> ProjectPath {
        let (dir, file_name) = match self.0.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, self.0.as_str()),
        };
        let stem = match file_name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => file_name,
        };
        let renamed = format!("{}.{}", stem, new_type);
        match dir {
            Some(dir) => ProjectPath(format!("{}/{}", dir, renamed)),
            None => ProjectPath(renamed),
        }
    }

    pub fn to_absolute(&self, project_root: &Path) -> PathBuf {
        project_root.join(&self.0)
    }

    /// Convert an absolute path back to project-relative form. Paths outside
    /// the project root are kept verbatim (normalized to `/` separators).
    pub fn from_absolute(project_root: &Path, path: &Path) -> ProjectPath {
        match path.strip_prefix(project_root) {
            Ok(relative) => ProjectPath::new(relative.to_string_lossy().into_owned()),
            Err(_) => ProjectPath::new(path.to_string_lossy().into_owned()),
        }
    }
}

impl fmt::Display for ProjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ProjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectPath {
    fn from(path: &str) -> Self {
        ProjectPath::new(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod project_path_tests {
        use super::*;

        #[test]
        fn should_normalize_separators_and_leading_dot() {
            assert_eq!(ProjectPath::new("./src\\app\\main.ts").as_str(), "src/app/main.ts");
        }

        #[test]
        fn should_extract_extension() {
            assert_eq!(ProjectPath::new("src/a.ts").extension(), Some("ts"));
            assert_eq!(ProjectPath::new("src/.gitignore").extension(), None);
            assert_eq!(ProjectPath::new("Makefile").extension(), None);
        }

        #[test]
        fn should_replace_type() {
            assert_eq!(ProjectPath::new("src/x.ts").with_type("js").as_str(), "src/x.js");
            assert_eq!(ProjectPath::new("x").with_type("js").as_str(), "x.js");
        }

        #[test]
        fn should_round_trip_through_absolute() {
            let root = Path::new("/project");
            let path = ProjectPath::new("src/a.ts");
            let abs = path.to_absolute(root);
            assert_eq!(ProjectPath::from_absolute(root, &abs), path);
        }

        #[test]
        fn should_keep_paths_outside_the_root() {
            let root = Path::new("/project");
            let outside = Path::new("/elsewhere/dep.js");
            assert_eq!(
                ProjectPath::from_absolute(root, outside).as_str(),
                "/elsewhere/dep.js"
            );
        }
    }
}
