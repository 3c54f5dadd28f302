//! The `Extension` trait and the factory table extensions register through.
//!
//! Extensions are trusted, co-located Rust code. A package on disk supplies
//! the metadata half (see [`super::manifest`]); the code half is a factory
//! registered here under the package name. The lifecycle manager resolves
//! both before an instance is ever constructed.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bridge::context::ExtensionContext;
use crate::bridge::web::WebTemplate;

use super::types::ExtensionError;

/// Result type extension hooks return.
pub type HookResult = Result<(), ExtensionError>;

/// Behavior an extension plugs into the host.
///
/// Every hook defaults to a no-op so extensions override only what they
/// need. Hooks are invoked serially per instance by the host's dispatch
/// task; a hook returning `Err` is recovered by the bridge (logged, event
/// dropped), except in `on_load`, where it aborts the load.
#[async_trait::async_trait]
pub trait Extension: Send + Sync {
    /// Invoked once after the instance is bound to its container.
    ///
    /// Returning [`ExtensionError::Aborted`] rejects the load with the given
    /// message; any other error is reported as a load fault. Either way the
    /// instance is torn down and never becomes observable as loaded.
    async fn on_load(&mut self, _ctx: &ExtensionContext, _args: &str) -> HookResult {
        Ok(())
    }

    /// Invoked when the instance is being unloaded. Best-effort: errors are
    /// logged and do not stop the teardown.
    async fn on_shutdown(&mut self, _ctx: &ExtensionContext) -> HookResult {
        Ok(())
    }

    /// Invoked once when the host finishes booting.
    async fn on_boot(&mut self, _ctx: &ExtensionContext) -> HookResult {
        Ok(())
    }

    /// Fallback for command lines that match no registered command.
    async fn on_command(&mut self, _ctx: &ExtensionContext, _line: &str) -> HookResult {
        Ok(())
    }

    /// Render one of the instance's registered web sub-pages.
    async fn on_web_request(
        &mut self,
        _ctx: &ExtensionContext,
        _page: &str,
        _tmpl: &mut WebTemplate,
    ) -> HookResult {
        Ok(())
    }
}

/// Constructor for an extension, registered under the extension name.
pub type ExtensionFactory = Arc<dyn Fn() -> Box<dyn Extension> + Send + Sync>;

/// Lookup table mapping extension names to their constructors.
///
/// This is the "loadable code" side of a package: a package directory is
/// only loadable if a factory is registered under its name. Re-registering
/// a name replaces the factory, which is how in-process code updates are
/// rolled out.
#[derive(Clone, Default)]
pub struct FactoryRegistry {
    inner: Arc<RwLock<HashMap<String, ExtensionFactory>>>,
}

impl FactoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `name`.
    pub fn register<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Extension> + Send + Sync + 'static,
    {
        self.inner.write().insert(name.into(), Arc::new(factory));
    }

    /// Remove the factory for `name`, returning whether one was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.inner.write().remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.read().contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<ExtensionFactory> {
        self.inner.read().get(name).cloned()
    }

    /// Names with a registered factory, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().keys().cloned().collect();
        names.sort();
        names
    }
}
