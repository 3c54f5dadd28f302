//! Extension discovery and lifecycle.
//!
//! Extensions are trusted, co-located units of behavior bound to a host
//! container (a user, one of a user's connection groups, or the global
//! singleton). A package on disk supplies metadata; a registered factory
//! supplies code; the lifecycle manager joins the two.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   LifecycleManager                   │
//! │  - locate + validate packages                        │
//! │  - construct, bind, load-hook, unload                │
//! │  - owns the ActiveSet and the global container       │
//! └──────────────────────────────────────────────────────┘
//!            │                            │
//!            ▼                            ▼
//!    ┌───────────────┐           ┌─────────────────┐
//!    │ ModuleLocator │           │ ExtensionInstance│
//!    │ dirs+manifests│           │ ctx / hooks / nv │
//!    │ FactoryRegistry│          └─────────────────┘
//!    └───────────────┘
//! ```

pub mod instance;
pub mod lifecycle;
pub mod locator;
pub mod manifest;
pub mod system;
pub mod types;

pub use instance::ExtensionInstance;
pub use lifecycle::{ActiveSet, BindContext, InfoReport, LifecycleManager, LoadReport};
pub use locator::{Located, ModuleLocator};
pub use manifest::MANIFEST_FILE;
pub use system::{Extension, ExtensionFactory, FactoryRegistry, HookResult};
pub use types::{
    validate_name, ExtensionDescriptor, ExtensionError, ExtensionMetadata, InstanceState,
    LoadError, Scope,
};
