//! Filename filtering for transfers and deletes.
//!
//! A filter restricts which files participate in a walk. Directories always
//! pass so the walk can descend into them; only file base names are tested
//! against the glob pattern (`*`, `?`, character classes - shell semantics).

use crate::error::{Error, Result};
use glob::Pattern;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct FileFilter {
    pattern: Option<Pattern>,
}

impl FileFilter {
    /// The configured pattern text, if any. Used to forward the filter as a
    /// query parameter.
    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|p| p.as_str())
    }
}

impl FileFilter {
    /// Build a filter from an optional glob pattern. A malformed pattern is
    /// a configuration error and fails immediately.
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let pattern = match pattern {
            Some(p) if !p.is_empty() => {
                Some(Pattern::new(p).map_err(|source| Error::Pattern {
                    pattern: p.to_string(),
                    source,
                })?)
            }
            _ => None,
        };
        Ok(Self { pattern })
    }

    pub fn is_unfiltered(&self) -> bool {
        self.pattern.is_none()
    }

    /// Whether an entry participates in the transfer. `name` is the base
    /// name of the entry, not its full path.
    pub fn matches(&self, is_dir: bool, name: &str) -> bool {
        match &self.pattern {
            None => true,
            // Directories always pass so the walk can descend
            Some(_) if is_dir => true,
            Some(p) => p.matches(name),
        }
    }

    /// Delete under `root`: the whole subtree when no pattern is set,
    /// otherwise only the files whose base name matches, leaving directories
    /// and non-matching files in place.
    pub fn delete_filtered(&self, root: &Path) -> Result<()> {
        if self.pattern.is_none() {
            fs::remove_dir_all(root)?;
            return Ok(());
        }

        for entry in WalkDir::new(root) {
            let entry = entry?;
            if entry.file_type().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if self.matches(false, &name) {
                fs::remove_file(entry.path())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_pattern_matches_everything() {
        let f = FileFilter::new(None).unwrap();
        assert!(f.matches(false, "a.txt"));
        assert!(f.matches(true, "sub"));
        let f = FileFilter::new(Some("")).unwrap();
        assert!(f.matches(false, "b.log"));
    }

    #[test]
    fn pattern_filters_files_not_dirs() {
        let f = FileFilter::new(Some("*.txt")).unwrap();
        assert!(f.matches(false, "a.txt"));
        assert!(!f.matches(false, "b.log"));
        assert!(f.matches(true, "b.log"), "directories always pass");
    }

    #[test]
    fn malformed_pattern_is_rejected() {
        let err = FileFilter::new(Some("[")).unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[test]
    fn delete_without_pattern_removes_subtree() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(root.join("sub/b.log"), "xyz").unwrap();

        FileFilter::new(None).unwrap().delete_filtered(&root).unwrap();
        assert!(!root.exists());
    }

    #[test]
    fn filtered_delete_keeps_non_matching_files() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(root.join("sub")).unwrap();
        fs::write(root.join("a.txt"), "hello").unwrap();
        fs::write(root.join("sub/b.log"), "xyz").unwrap();
        fs::write(root.join("sub/c.txt"), "abc").unwrap();

        FileFilter::new(Some("*.txt"))
            .unwrap()
            .delete_filtered(&root)
            .unwrap();

        assert!(!root.join("a.txt").exists());
        assert!(!root.join("sub/c.txt").exists());
        assert!(root.join("sub/b.log").exists());
        assert!(root.join("sub").is_dir());
    }

    #[test]
    fn filtered_delete_with_no_matches_is_a_noop() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("tree");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("b.log"), "xyz").unwrap();

        FileFilter::new(Some("*.txt"))
            .unwrap()
            .delete_filtered(&root)
            .unwrap();

        assert!(root.join("b.log").exists());
    }
}
