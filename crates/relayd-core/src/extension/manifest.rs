//! Extension package manifests.
//!
//! A package is a directory named after the extension containing an
//! `extension.toml` manifest. The manifest carries the metadata half of a
//! package; the loadable-code half lives in the host's factory table.

use std::path::Path;

use serde::Deserialize;

use super::types::{ExtensionMetadata, LoadError, Scope};

/// File name of the package manifest inside a package directory.
pub const MANIFEST_FILE: &str = "extension.toml";

/// Manifest as written on disk; `default_scope` may be omitted, in which case
/// the first declared scope wins.
#[derive(Debug, Deserialize)]
struct RawManifest {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    wiki_page: String,
    #[serde(default)]
    has_args: bool,
    #[serde(default)]
    args_help: String,
    #[serde(default = "RawManifest::default_scopes")]
    scopes: Vec<Scope>,
    #[serde(default)]
    default_scope: Option<Scope>,
    #[serde(default)]
    version: Option<semver::Version>,
}

impl RawManifest {
    fn default_scopes() -> Vec<Scope> {
        vec![Scope::User]
    }
}

/// Read and validate the manifest of the package at `dir`.
///
/// The manifest's `name` field must equal `expected`, which in turn is the
/// package directory name. A readable-but-wrong manifest is a [`LoadError`],
/// never a not-found: the package exists, it is just malformed.
pub fn read_manifest(dir: &Path, expected: &str) -> Result<ExtensionMetadata, LoadError> {
    let path = dir.join(MANIFEST_FILE);
    let text = std::fs::read_to_string(&path).map_err(|e| LoadError::MalformedPackage {
        path: dir.display().to_string(),
        reason: format!("cannot read {MANIFEST_FILE}: {e}"),
    })?;
    parse_manifest(&text, dir, expected)
}

/// Parse manifest text; split out from [`read_manifest`] for testability.
pub fn parse_manifest(
    text: &str,
    dir: &Path,
    expected: &str,
) -> Result<ExtensionMetadata, LoadError> {
    let raw: RawManifest = toml::from_str(text).map_err(|e| LoadError::MalformedPackage {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    if raw.name != expected {
        return Err(LoadError::MalformedPackage {
            path: dir.display().to_string(),
            reason: format!(
                "manifest declares name [{}] but the package is [{expected}]",
                raw.name
            ),
        });
    }
    if raw.scopes.is_empty() {
        return Err(LoadError::MalformedPackage {
            path: dir.display().to_string(),
            reason: "manifest declares no supported scopes".to_string(),
        });
    }
    let default_scope = raw.default_scope.unwrap_or(raw.scopes[0]);
    if !raw.scopes.contains(&default_scope) {
        return Err(LoadError::MalformedPackage {
            path: dir.display().to_string(),
            reason: format!("default scope [{default_scope}] is not in the supported scope list"),
        });
    }

    Ok(ExtensionMetadata {
        name: raw.name,
        description: raw.description,
        wiki_page: raw.wiki_page,
        has_args: raw.has_args,
        args_help: raw.args_help,
        scopes: raw.scopes,
        default_scope,
        version: raw.version,
    })
}

/// Whether `dir` looks like an extension package (has a manifest file).
pub fn is_package_dir(dir: &Path) -> bool {
    dir.is_dir() && dir.join(MANIFEST_FILE).is_file()
}
