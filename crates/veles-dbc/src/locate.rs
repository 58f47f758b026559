//! Build directory discovery and raw file location.
//!
//! A dump root holds one directory per client build, named by version
//! (`1.12.1.5875`, with an occasional `a` suffix inside a component).
//! Lookups go through an uppercase file index per directory, so entry names
//! like `SPELL.DBC` find `Spell.dbc` on case-sensitive filesystems too.

use std::fs;
use std::path::{Path, PathBuf};

use crate::{FxHashMap, Result};

/// Index of build directories under one dump root.
#[derive(Debug, Default)]
pub struct BuildDirs {
    dirs: FxHashMap<i32, BuildDir>,
    builds: Vec<i32>,
}

#[derive(Debug)]
struct BuildDir {
    /// Uppercased file name to on-disk path, database extensions only.
    files: FxHashMap<String, PathBuf>,
}

impl BuildDirs {
    /// Scan a dump root.
    ///
    /// Directories whose names are not dotted version numbers (definition
    /// folders, stray output) are ignored.
    pub fn discover<P: AsRef<Path>>(base: P) -> Result<Self> {
        let mut found: Vec<(Vec<i32>, i32, PathBuf)> = Vec::new();

        for dir_entry in fs::read_dir(base)? {
            let dir_entry = dir_entry?;
            if !dir_entry.file_type()?.is_dir() {
                continue;
            }
            let name = dir_entry.file_name().to_string_lossy().into_owned();
            if let Some(version) = parse_version(&name) {
                let build = version[version.len() - 1];
                found.push((version, build, dir_entry.path()));
            }
        }

        // Numeric component order, oldest first.
        found.sort_by(|a, b| a.0.cmp(&b.0));

        let mut dirs = FxHashMap::default();
        let mut builds = Vec::with_capacity(found.len());
        for (_, build, path) in found {
            dirs.insert(build, BuildDir::index(&path)?);
            builds.push(build);
        }

        Ok(Self { dirs, builds })
    }

    /// Builds in version order.
    pub fn builds(&self) -> &[i32] {
        &self.builds
    }

    pub fn contains(&self, build: i32) -> bool {
        self.dirs.contains_key(&build)
    }

    /// Database files of one build, `(uppercased name, path)`, name-sorted.
    pub fn files(&self, build: i32) -> Vec<(String, PathBuf)> {
        let Some(dir) = self.dirs.get(&build) else {
            return Vec::new();
        };
        let mut files: Vec<(String, PathBuf)> = dir
            .files
            .iter()
            .map(|(name, path)| (name.clone(), path.clone()))
            .collect();
        files.sort();
        files
    }

    /// Locate the raw file behind an entry name, preferring the extended
    /// variant when both extensions exist.
    pub fn raw_path(&self, build: i32, name: &str) -> Option<PathBuf> {
        let dir = self.dirs.get(&build)?;
        let upper = name.to_uppercase();
        let stem = upper
            .rsplit_once('.')
            .map_or(upper.as_str(), |(stem, _)| stem);

        for extension in ["DB2", "DBC"] {
            if let Some(path) = dir.files.get(&format!("{stem}.{extension}")) {
                return Some(path.clone());
            }
        }
        None
    }
}

impl BuildDir {
    fn index(path: &Path) -> Result<Self> {
        let mut files = FxHashMap::default();
        for file_entry in fs::read_dir(path)? {
            let file_path = file_entry?.path();
            let is_db = file_path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dbc") || ext.eq_ignore_ascii_case("db2"));
            if !is_db {
                continue;
            }
            if let Some(name) = file_path.file_name() {
                files.insert(name.to_string_lossy().to_uppercase(), file_path.clone());
            }
        }
        Ok(Self { files })
    }
}

/// Parse a dotted version directory name into numeric components.
fn parse_version(name: &str) -> Option<Vec<i32>> {
    let components: Option<Vec<i32>> = name
        .split('.')
        .map(|component| component.replace('a', "").parse::<i32>().ok())
        .collect();
    components.filter(|c| !c.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_discover_and_order() {
        let root = tempfile::tempdir().unwrap();
        for dir in ["1.12.1.5875", "0.5.3a.3368", "2.0.0.6080", "_definitions", "notes"] {
            fs::create_dir(root.path().join(dir)).unwrap();
        }
        touch(&root.path().join("1.12.1.5875/Spell.dbc"));

        let dirs = BuildDirs::discover(root.path()).unwrap();
        assert_eq!(dirs.builds(), &[3368, 5875, 6080]);
        assert!(dirs.contains(5875));
        assert!(!dirs.contains(9999));
    }

    #[test]
    fn test_raw_path_prefers_db2() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("4.0.0.12065");
        fs::create_dir(&dir).unwrap();
        touch(&dir.join("Item.dbc"));
        touch(&dir.join("Item.db2"));
        touch(&dir.join("Spell.dbc"));
        touch(&dir.join("readme.txt"));

        let dirs = BuildDirs::discover(root.path()).unwrap();

        let item = dirs.raw_path(12065, "ITEM.DBC").unwrap();
        assert_eq!(item.file_name().unwrap(), "Item.db2");

        let spell = dirs.raw_path(12065, "SPELL.DBC").unwrap();
        assert_eq!(spell.file_name().unwrap(), "Spell.dbc");

        assert!(dirs.raw_path(12065, "MISSING.DBC").is_none());
        assert!(dirs.raw_path(1, "ITEM.DBC").is_none());

        let files = dirs.files(12065);
        let names: Vec<&str> = files.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["ITEM.DB2", "ITEM.DBC", "SPELL.DBC"]);
    }
}
