//! relayd extension host core.
//!
//! This crate is the bridge that lets the relayd host load, run and unload
//! extension modules while exposing a stable capability surface back to
//! them: sockets, timers, persistent key-value storage, commands, web
//! sub-pages and translations.
//!
//! # Overview
//!
//! - [`extension`]: package discovery ([`extension::ModuleLocator`]),
//!   validation and the instance lifecycle
//!   ([`extension::LifecycleManager`]).
//! - [`bridge`]: translation of host events into extension hooks and of
//!   extension requests into host operations.
//! - [`host`]: the capability traits the host implements and the
//!   containers instances bind to.
//! - [`store`]: durable per-instance key-value storage.
//! - [`i18n`]: per-extension translation domains.
//!
//! # Example
//!
//! ```no_run
//! use relayd_core::config::CoreConfig;
//! use relayd_core::extension::{BindContext, FactoryRegistry, LifecycleManager, Scope};
//! # use relayd_core::host::HostServices;
//!
//! # async fn run(services: HostServices) {
//! let config = CoreConfig::default()
//!     .with_module_dir("/usr/lib/relayd/modules", "/var/lib/relayd/moddata");
//! let factories = FactoryRegistry::new();
//! // factories.register("echo", || Box::new(EchoExtension::new()));
//!
//! let manager = LifecycleManager::new(config, factories, services);
//! let report = manager
//!     .load("echo", "", Scope::Global, &BindContext::none())
//!     .await;
//! assert!(report.is_loaded());
//! manager.unload_all().await;
//! # }
//! ```

pub mod bridge;
pub mod config;
pub mod extension;
pub mod host;
pub mod i18n;
pub mod macros;
pub mod store;

pub use bridge::{BridgeError, ExtensionContext};
pub use config::{CoreConfig, DuplicatePolicy, ModuleDirs};
pub use extension::{
    BindContext, Extension, ExtensionError, FactoryRegistry, InfoReport, LifecycleManager,
    LoadError, LoadReport, Scope,
};
pub use host::{Container, HostServices};
pub use store::{NvStore, StoreError};
