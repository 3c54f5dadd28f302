//! On-disk extension package fixtures.

use std::fs;
use std::path::{Path, PathBuf};

use relayd_core::config::{CoreConfig, ModuleDirs};

/// Builds extension packages inside a temporary directory and hands out a
/// matching [`CoreConfig`].
pub struct PackageBuilder {
    root: tempfile::TempDir,
    code_dir: PathBuf,
    data_dir: PathBuf,
}

impl PackageBuilder {
    pub fn new() -> Self {
        let root = tempfile::tempdir().expect("create fixture dir");
        let code_dir = root.path().join("modules");
        let data_dir = root.path().join("moddata");
        fs::create_dir_all(&code_dir).expect("create code dir");
        Self {
            root,
            code_dir,
            data_dir,
        }
    }

    pub fn code_dir(&self) -> &Path {
        &self.code_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Write a package directory with the given manifest text.
    pub fn write_package(&self, name: &str, manifest: &str) -> PathBuf {
        let pkg = self.code_dir.join(name);
        fs::create_dir_all(&pkg).expect("create package dir");
        fs::write(pkg.join("extension.toml"), manifest).expect("write manifest");
        pkg
    }

    /// Write a package with a minimal manifest supporting the given scopes.
    pub fn write_simple_package(&self, name: &str, scopes: &[&str]) -> PathBuf {
        let scope_list = scopes
            .iter()
            .map(|s| format!("\"{s}\""))
            .collect::<Vec<_>>()
            .join(", ");
        self.write_package(
            name,
            &format!("name = \"{name}\"\nscopes = [{scope_list}]\n"),
        )
    }

    /// A config whose search path is this builder's directories.
    pub fn config(&self) -> CoreConfig {
        CoreConfig {
            module_dirs: vec![ModuleDirs {
                code_dir: self.code_dir.clone(),
                data_dir: self.data_dir.clone(),
            }],
            ..CoreConfig::default()
        }
    }

    /// Root of the fixture tree, for tests that add more directories.
    pub fn root(&self) -> &Path {
        self.root.path()
    }
}

impl Default for PackageBuilder {
    fn default() -> Self {
        Self::new()
    }
}
