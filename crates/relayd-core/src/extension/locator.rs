//! Package discovery across the host's configured search directories.
//!
//! The locator walks `(code_dir, data_dir)` pairs in configuration order and
//! resolves an extension name to a [`Located`] package: manifest metadata
//! plus the factory registered for that name. Descriptors are cached per
//! name; every locate re-reads the manifest from disk and refreshes the
//! cache, so a reload observes on-disk changes without a process restart.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::config::ModuleDirs;

use super::manifest::{self, is_package_dir};
use super::system::{ExtensionFactory, FactoryRegistry};
use super::types::{validate_name, ExtensionDescriptor, LoadError};

/// A successfully located package, ready for construction.
pub struct Located {
    pub descriptor: ExtensionDescriptor,
    pub factory: ExtensionFactory,
}

impl std::fmt::Debug for Located {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Located")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Locates extension packages by name.
pub struct ModuleLocator {
    dirs: Vec<ModuleDirs>,
    factories: FactoryRegistry,
    cache: RwLock<HashMap<String, ExtensionDescriptor>>,
}

impl ModuleLocator {
    pub fn new(dirs: Vec<ModuleDirs>, factories: FactoryRegistry) -> Self {
        Self {
            dirs,
            factories,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The factory table packages resolve their code through.
    pub fn factories(&self) -> &FactoryRegistry {
        &self.factories
    }

    /// Resolve `name` to a loadable package.
    ///
    /// `Ok(None)` means no search directory contains a package of that name,
    /// which is a normal negative result. A directory that *does* contain
    /// the package but cannot supply a well-formed manifest or a registered
    /// factory produces a [`LoadError`]; later directories are not tried,
    /// the first match wins.
    pub fn locate(&self, name: &str) -> Result<Option<Located>, LoadError> {
        validate_name(name)?;

        for pair in &self.dirs {
            let pkg_dir = pair.code_dir.join(name);
            if !is_package_dir(&pkg_dir) {
                continue;
            }

            let meta = manifest::read_manifest(&pkg_dir, name)?;
            let factory = self
                .factories
                .get(name)
                .ok_or_else(|| LoadError::MissingDefinition {
                    path: pkg_dir.display().to_string(),
                    name: name.to_string(),
                })?;

            let descriptor = ExtensionDescriptor {
                meta,
                path: pkg_dir,
                data_dir: pair.data_dir.join(name),
            };

            // Refresh the cached state so reloads pick up manifest edits.
            self.cache
                .write()
                .insert(name.to_string(), descriptor.clone());

            return Ok(Some(Located {
                descriptor,
                factory,
            }));
        }

        self.cache.write().remove(name);
        Ok(None)
    }

    /// Drop any cached descriptor for `name`.
    pub fn invalidate(&self, name: &str) {
        self.cache.write().remove(name);
    }

    /// The cached descriptor from the most recent locate, if any.
    pub fn cached(&self, name: &str) -> Option<ExtensionDescriptor> {
        self.cache.read().get(name).cloned()
    }

    /// Scan every search directory and describe all well-formed packages.
    ///
    /// Duplicate names keep the first directory's package, matching the
    /// locate order. Malformed packages and packages without a registered
    /// factory are skipped with a warning rather than failing the scan.
    pub fn available(&self) -> Vec<ExtensionDescriptor> {
        let mut seen: HashMap<String, ExtensionDescriptor> = HashMap::new();
        let mut order: Vec<String> = Vec::new();

        for pair in &self.dirs {
            let entries = match std::fs::read_dir(&pair.code_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::debug!(dir = %pair.code_dir.display(), error = %e, "skipping unreadable module directory");
                    continue;
                }
            };

            for entry in entries.flatten() {
                let pkg_dir = entry.path();
                if !is_package_dir(&pkg_dir) {
                    continue;
                }
                let Some(name) = pkg_dir.file_name().and_then(|n| n.to_str()) else {
                    continue;
                };
                if validate_name(name).is_err() || seen.contains_key(name) {
                    continue;
                }

                match manifest::read_manifest(&pkg_dir, name) {
                    Ok(meta) => {
                        if !self.factories.contains(name) {
                            tracing::warn!(
                                name,
                                path = %pkg_dir.display(),
                                "package has no registered factory, skipping"
                            );
                            continue;
                        }
                        seen.insert(
                            name.to_string(),
                            ExtensionDescriptor {
                                meta,
                                path: pkg_dir.clone(),
                                data_dir: pair.data_dir.join(name),
                            },
                        );
                        order.push(name.to_string());
                    }
                    Err(e) => {
                        tracing::warn!(name, error = %e, "skipping malformed package");
                    }
                }
            }
        }

        order.sort();
        order
            .into_iter()
            .filter_map(|name| seen.remove(&name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extension::system::Extension;
    use crate::extension::types::Scope;
    use std::fs;
    use std::path::Path;

    struct NullExtension;
    impl Extension for NullExtension {}

    fn write_package(code_dir: &Path, name: &str, manifest: &str) {
        let pkg = code_dir.join(name);
        fs::create_dir_all(&pkg).unwrap();
        fs::write(pkg.join("extension.toml"), manifest).unwrap();
    }

    fn locator_for(tmp: &tempfile::TempDir) -> ModuleLocator {
        let code = tmp.path().join("mods");
        let data = tmp.path().join("data");
        fs::create_dir_all(&code).unwrap();
        let factories = FactoryRegistry::new();
        factories.register("echo", || Box::new(NullExtension));
        ModuleLocator::new(
            vec![ModuleDirs {
                code_dir: code,
                data_dir: data,
            }],
            factories,
        )
    }

    #[test]
    fn test_locate_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = locator_for(&tmp);
        assert!(locator.locate("echo").unwrap().is_none());
    }

    #[test]
    fn test_locate_found() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = locator_for(&tmp);
        write_package(&tmp.path().join("mods"), "echo", r#"name = "echo""#);

        let located = locator.locate("echo").unwrap().unwrap();
        assert_eq!(located.descriptor.name(), "echo");
        assert!(located.descriptor.data_dir.ends_with("data/echo"));
        assert!(locator.cached("echo").is_some());
    }

    #[test]
    fn test_locate_invalid_name_before_fs() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = locator_for(&tmp);
        let err = locator.locate("../echo").unwrap_err();
        assert!(matches!(err, LoadError::InvalidName(_)));
    }

    #[test]
    fn test_locate_without_factory_is_load_error() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = locator_for(&tmp);
        write_package(&tmp.path().join("mods"), "ghost", r#"name = "ghost""#);

        let err = locator.locate("ghost").unwrap_err();
        assert!(matches!(err, LoadError::MissingDefinition { .. }));
        assert!(err.to_string().contains("[ghost]"));
    }

    #[test]
    fn test_first_directory_wins() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        write_package(&first, "echo", "name = \"echo\"\ndescription = \"one\"");
        write_package(&second, "echo", "name = \"echo\"\ndescription = \"two\"");

        let factories = FactoryRegistry::new();
        factories.register("echo", || Box::new(NullExtension));
        let locator = ModuleLocator::new(
            vec![
                ModuleDirs {
                    code_dir: first,
                    data_dir: tmp.path().join("d1"),
                },
                ModuleDirs {
                    code_dir: second,
                    data_dir: tmp.path().join("d2"),
                },
            ],
            factories,
        );

        let located = locator.locate("echo").unwrap().unwrap();
        assert_eq!(located.descriptor.meta.description, "one");
    }

    #[test]
    fn test_relocate_picks_up_manifest_edits() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = locator_for(&tmp);
        let mods = tmp.path().join("mods");
        write_package(&mods, "echo", "name = \"echo\"\ndescription = \"old\"");
        locator.locate("echo").unwrap().unwrap();
        assert_eq!(locator.cached("echo").unwrap().meta.description, "old");

        write_package(&mods, "echo", "name = \"echo\"\ndescription = \"new\"");
        let located = locator.locate("echo").unwrap().unwrap();
        assert_eq!(located.descriptor.meta.description, "new");
        assert_eq!(locator.cached("echo").unwrap().meta.description, "new");

        locator.invalidate("echo");
        assert!(locator.cached("echo").is_none());
    }

    #[test]
    fn test_available_skips_malformed_and_dedups() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("first");
        let second = tmp.path().join("second");
        fs::create_dir_all(&first).unwrap();
        fs::create_dir_all(&second).unwrap();
        write_package(&first, "echo", "name = \"echo\"\ndescription = \"one\"");
        write_package(&first, "broken", "name = ");
        write_package(
            &second,
            "echo",
            "name = \"echo\"\ndescription = \"shadowed\"",
        );
        write_package(
            &second,
            "stats",
            "name = \"stats\"\nscopes = [\"global\"]",
        );

        let factories = FactoryRegistry::new();
        factories.register("echo", || Box::new(NullExtension));
        factories.register("stats", || Box::new(NullExtension));
        factories.register("broken", || Box::new(NullExtension));
        let locator = ModuleLocator::new(
            vec![
                ModuleDirs {
                    code_dir: first,
                    data_dir: tmp.path().join("d1"),
                },
                ModuleDirs {
                    code_dir: second,
                    data_dir: tmp.path().join("d2"),
                },
            ],
            factories,
        );

        let available = locator.available();
        let names: Vec<&str> = available.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["echo", "stats"]);
        assert_eq!(available[0].meta.description, "one");
        assert_eq!(available[1].meta.scopes, vec![Scope::Global]);
    }
}
