//! Core extension types: scopes, metadata, descriptors, instance states
//! and the error taxonomy of the loader.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The granularity an extension instance is bound to.
///
/// Every instance is bound to exactly one scope for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Bound to a single user.
    User,
    /// Bound to one of a user's connection groups.
    Network,
    /// Bound to the process-wide container.
    Global,
}

impl Scope {
    /// String form used in manifests and messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Network => "network",
            Scope::Global => "global",
        }
    }

    /// Parse from the manifest string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Scope::User),
            "network" => Some(Scope::Network),
            "global" => Some(Scope::Global),
            _ => None,
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Metadata an extension package declares in its manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtensionMetadata {
    /// Unique extension name; letters, digits and underscores only.
    pub name: String,

    /// Human-readable description shown in listings.
    #[serde(default)]
    pub description: String,

    /// Documentation page name.
    #[serde(default)]
    pub wiki_page: String,

    /// Whether the extension accepts a load-argument string.
    #[serde(default)]
    pub has_args: bool,

    /// Usage text for the load arguments.
    #[serde(default)]
    pub args_help: String,

    /// Scopes the extension supports.
    #[serde(default = "default_scopes")]
    pub scopes: Vec<Scope>,

    /// The scope used when the caller does not pick one.
    #[serde(default = "default_scope")]
    pub default_scope: Scope,

    /// Optional package version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<semver::Version>,
}

fn default_scopes() -> Vec<Scope> {
    vec![Scope::User]
}

fn default_scope() -> Scope {
    Scope::User
}

impl ExtensionMetadata {
    /// Create metadata with the defaults a bare manifest would get.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            wiki_page: String::new(),
            has_args: false,
            args_help: String::new(),
            scopes: default_scopes(),
            default_scope: default_scope(),
            version: None,
        }
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the wiki page.
    pub fn with_wiki_page(mut self, wiki_page: impl Into<String>) -> Self {
        self.wiki_page = wiki_page.into();
        self
    }

    /// Declare the supported scopes; the first becomes the default.
    pub fn with_scopes(mut self, scopes: Vec<Scope>) -> Self {
        if let Some(first) = scopes.first() {
            self.default_scope = *first;
        }
        self.scopes = scopes;
        self
    }

    /// Declare load-argument support.
    pub fn with_args_help(mut self, args_help: impl Into<String>) -> Self {
        self.has_args = true;
        self.args_help = args_help.into();
        self
    }

    /// Whether the given scope is declared as supported.
    pub fn supports(&self, scope: Scope) -> bool {
        self.scopes.contains(&scope)
    }
}

/// A located extension package: manifest metadata plus resolved paths.
///
/// Created when a package is located; immutable once the instance is built.
#[derive(Debug, Clone)]
pub struct ExtensionDescriptor {
    /// Declared metadata from the package manifest.
    pub meta: ExtensionMetadata,
    /// Path of the package directory the manifest was read from.
    pub path: PathBuf,
    /// Directory the instance may use for its data files.
    pub data_dir: PathBuf,
}

impl ExtensionDescriptor {
    /// The extension name.
    pub fn name(&self) -> &str {
        &self.meta.name
    }
}

/// Lifecycle state of an extension instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    /// Built by the factory but not yet tracked.
    Constructed,
    /// Tracked in the active-instance set, not yet bound to a container.
    Registered,
    /// Bound to a container and past its load hook.
    Active,
    /// Unload has begun; events are no longer delivered.
    ShuttingDown,
    /// Fully torn down.
    Unloaded,
}

impl InstanceState {
    /// Whether a transition between two states is part of the lifecycle.
    pub fn can_transition(from: InstanceState, to: InstanceState) -> bool {
        use InstanceState::*;
        matches!(
            (from, to),
            (Constructed, Registered)
                | (Registered, Active)
                | (Registered, ShuttingDown)
                | (Active, ShuttingDown)
                | (ShuttingDown, Unloaded)
        )
    }
}

impl std::fmt::Display for InstanceState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceState::Constructed => "constructed",
            InstanceState::Registered => "registered",
            InstanceState::Active => "active",
            InstanceState::ShuttingDown => "shutting_down",
            InstanceState::Unloaded => "unloaded",
        };
        write!(f, "{s}")
    }
}

/// Why a load or info request failed.
///
/// `NotFound` is deliberately *not* part of this enum: an absent package is a
/// normal negative result and is reported through [`super::lifecycle::LoadReport`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("Extension names can only contain letters, numbers and underscores, [{0}] is invalid")]
    InvalidName(String),

    #[error("Malformed extension package [{path}]: {reason}")]
    MalformedPackage { path: String, reason: String },

    #[error("Package [{path}] doesn't have an extension named [{name}]")]
    MissingDefinition { path: String, name: String },

    #[error("Extension [{name}] doesn't support {scope} scope")]
    UnsupportedScope { name: String, scope: Scope },

    #[error("Extension [{name}] requires a {scope} context to load")]
    MissingContext { name: String, scope: Scope },

    #[error("Extension [{name}] is already loaded")]
    AlreadyLoaded { name: String },

    #[error("Extension [{name}] aborted{}", display_abort(.message))]
    Aborted {
        name: String,
        message: Option<String>,
    },

    #[error("Extension [{name}] failed to load: {fault}")]
    HookFault { name: String, fault: String },
}

fn display_abort(message: &Option<String>) -> String {
    match message {
        Some(m) if !m.is_empty() => format!(": {m}"),
        _ => ".".to_string(),
    }
}

/// Errors extension hooks report back to the bridge.
///
/// [`ExtensionError::Aborted`] is the deliberate-rejection variant of the
/// load hook; every other variant is treated as a fault. Faults outside the
/// load hook are caught at the dispatch boundary, logged, and the event
/// delivery is dropped.
#[derive(Debug, thiserror::Error)]
pub enum ExtensionError {
    /// The load hook declined to load; the message (possibly empty) ends up
    /// in the load report.
    #[error("{0}")]
    Aborted(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Store error: {0}")]
    Store(#[from] crate::store::StoreError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] crate::bridge::BridgeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

/// Validate an extension name against the allowed character set.
///
/// Runs before any filesystem access so that a hostile or mistyped name never
/// turns into a path lookup.
pub fn validate_name(name: &str) -> Result<(), LoadError> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(LoadError::InvalidName(name.to_string()));
    }
    Ok(())
}
