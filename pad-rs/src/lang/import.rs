//! Module path resolution for `import` / `from ... import`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolves import paths against the importing file and the standard
/// library directory.
#[derive(Debug, Clone, Default)]
pub struct Importer {
    std_lib_dir: Option<PathBuf>,
}

impl Importer {
    pub fn new(std_lib_dir: impl Into<PathBuf>) -> Self {
        Importer { std_lib_dir: Some(std_lib_dir.into()) }
    }

    pub fn std_lib_dir(&self) -> Option<&Path> {
        self.std_lib_dir.as_deref()
    }

    /// Try `path` as given, then next to `from_file`, then under the
    /// standard library directory.
    pub fn resolve(&self, path: &str, from_file: Option<&str>) -> Result<PathBuf, String> {
        let mut candidates = vec![PathBuf::from(path)];
        if let Some(dir) = from_file.and_then(|f| Path::new(f).parent()) {
            candidates.push(dir.join(path));
        }
        if let Some(std) = &self.std_lib_dir {
            candidates.push(std.join(path));
        }
        let found = candidates
            .into_iter()
            .find(|p| p.is_file())
            .ok_or_else(|| format!("\"{path}\" is not found"))?;
        debug!(path, resolved = %found.display(), "import resolved");
        Ok(found.canonicalize().unwrap_or(found))
    }

    pub fn read(&self, path: &Path) -> Result<String, String> {
        fs::read_to_string(path).map_err(|e| format!("failed to read \"{}\": {e}", path.display()))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_relative_to_importing_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("lib.pad"), "x").unwrap();
        let main = dir.path().join("main.pad");
        let imp = Importer::default();
        let found = imp.resolve("lib.pad", main.to_str()).unwrap();
        assert!(found.ends_with("lib.pad"));
    }

    #[test]
    fn falls_back_to_std_lib() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("util.pad"), "x").unwrap();
        let imp = Importer::new(dir.path());
        assert!(imp.resolve("util.pad", None).is_ok());
    }

    #[test]
    fn missing_module() {
        let imp = Importer::default();
        assert_eq!(imp.resolve("nope/none.pad", None).unwrap_err(), "\"nope/none.pad\" is not found");
    }
}
