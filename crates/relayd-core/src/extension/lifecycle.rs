//! Extension lifecycle: load, unload, shutdown drain and metadata queries.
//!
//! The [`LifecycleManager`] owns the process-wide [`ActiveSet`] of loaded
//! instances. Loading walks the state machine
//! `Constructed -> Registered -> Active`; unloading removes the instance
//! from the active set *before* its shutdown hook runs, which is what makes
//! double-unload idempotent and lets shutdown hooks unload other instances
//! without tripping over the drain loop.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::CoreConfig;
use crate::host::{Container, HostServices, InstanceId};
use crate::store::NvStore;

use super::instance::ExtensionInstance;
use super::locator::ModuleLocator;
use super::system::{Extension, FactoryRegistry};
use super::types::{
    validate_name, ExtensionDescriptor, ExtensionError, InstanceState, LoadError, Scope,
};
use crate::bridge::context::ExtensionContext;

/// Process-wide set of all currently loaded instances.
///
/// An instance is a member iff its load hook has run (or is running) and
/// its unload has not yet begun. Membership doubles as the liveness test
/// the bridge uses to suppress event deliveries.
pub struct ActiveSet {
    inner: Mutex<HashMap<InstanceId, Arc<ExtensionInstance>>>,
}

impl ActiveSet {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn insert(&self, instance: Arc<ExtensionInstance>) {
        self.inner.lock().insert(instance.id(), instance);
    }

    pub(crate) fn remove(&self, id: InstanceId) -> bool {
        self.inner.lock().remove(&id).is_some()
    }

    /// Membership test: is this object still a live extension?
    pub fn contains(&self, id: InstanceId) -> bool {
        self.inner.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Snapshot of the current members.
    pub fn instances(&self) -> Vec<Arc<ExtensionInstance>> {
        self.inner.lock().values().cloned().collect()
    }

    /// Any one member, for the shutdown drain.
    fn pick(&self) -> Option<Arc<ExtensionInstance>> {
        self.inner.lock().values().next().cloned()
    }
}

/// Outcome of a load request.
///
/// `NotFound` is a normal negative result so callers can fall back to other
/// extension kinds; only `Failed` carries an error.
#[derive(Debug)]
pub enum LoadReport {
    /// No search directory contains a package of that name.
    NotFound,
    /// The package exists but could not be loaded.
    Failed(LoadError),
    /// Loaded; the message embeds the resolved package path.
    Loaded {
        message: String,
        instance: Arc<ExtensionInstance>,
    },
}

impl LoadReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self, LoadReport::Loaded { .. })
    }

    /// The loaded instance, if any.
    pub fn instance(&self) -> Option<&Arc<ExtensionInstance>> {
        match self {
            LoadReport::Loaded { instance, .. } => Some(instance),
            _ => None,
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&LoadError> {
        match self {
            LoadReport::Failed(e) => Some(e),
            _ => None,
        }
    }
}

/// Outcome of a metadata query.
#[derive(Debug)]
pub enum InfoReport {
    NotFound,
    Failed(LoadError),
    Info(ExtensionDescriptor),
}

impl InfoReport {
    pub fn descriptor(&self) -> Option<&ExtensionDescriptor> {
        match self {
            InfoReport::Info(d) => Some(d),
            _ => None,
        }
    }
}

/// The containers a load may bind to, besides the global one the manager
/// owns itself.
#[derive(Clone, Default)]
pub struct BindContext {
    pub user: Option<Arc<Container>>,
    pub network: Option<Arc<Container>>,
}

impl BindContext {
    /// No user or network context; only global loads can succeed.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn for_user(container: Arc<Container>) -> Self {
        Self {
            user: Some(container),
            ..Self::default()
        }
    }

    pub fn for_network(container: Arc<Container>) -> Self {
        Self {
            network: Some(container),
            ..Self::default()
        }
    }
}

/// Owns discovery, the active set and the global container; drives every
/// load and unload.
pub struct LifecycleManager {
    config: CoreConfig,
    locator: ModuleLocator,
    active: Arc<ActiveSet>,
    global: Arc<Container>,
    services: HostServices,
}

impl LifecycleManager {
    pub fn new(config: CoreConfig, factories: FactoryRegistry, services: HostServices) -> Self {
        let locator = ModuleLocator::new(config.module_dirs.clone(), factories);
        Self {
            config,
            locator,
            active: ActiveSet::new(),
            global: Container::global(),
            services,
        }
    }

    /// The process-wide container global-scope extensions bind to.
    pub fn global_container(&self) -> Arc<Container> {
        self.global.clone()
    }

    /// The set of currently loaded instances.
    pub fn active(&self) -> &Arc<ActiveSet> {
        &self.active
    }

    pub fn locator(&self) -> &ModuleLocator {
        &self.locator
    }

    /// Load `name` at `scope`, binding into the matching container from
    /// `bind` (global scope uses the manager's own container).
    pub async fn load(
        &self,
        name: &str,
        args: &str,
        scope: Scope,
        bind: &BindContext,
    ) -> LoadReport {
        // 1. Name syntax, before any filesystem access.
        if let Err(e) = validate_name(name) {
            return LoadReport::Failed(e);
        }

        // 2. Locate the package.
        let located = match self.locator.locate(name) {
            Err(e) => return LoadReport::Failed(e),
            Ok(None) => return LoadReport::NotFound,
            Ok(Some(located)) => located,
        };

        // 3. Scope support.
        if !located.descriptor.meta.supports(scope) {
            return LoadReport::Failed(LoadError::UnsupportedScope {
                name: name.to_string(),
                scope,
            });
        }

        // 4. Construct, allocate the store handle, join the active set.
        let extension = (located.factory)();
        let instance = self.construct(located.descriptor, scope, args, bind, extension);
        instance.set_state(InstanceState::Registered);

        // 5. Resolve the binding container.
        let container = match scope {
            Scope::Global => Some(self.global.clone()),
            Scope::User => bind.user.clone(),
            Scope::Network => bind.network.clone(),
        };
        let container = match container {
            Some(container) => container,
            None => {
                self.unload(&instance).await;
                return LoadReport::Failed(LoadError::MissingContext {
                    name: name.to_string(),
                    scope,
                });
            }
        };

        // 6. Bind; the duplicate check and the append are one critical
        // section on the container.
        instance.bind_container(&container);
        if !container.try_push(instance.clone(), self.config.duplicate_policy) {
            self.unload(&instance).await;
            return LoadReport::Failed(LoadError::AlreadyLoaded {
                name: name.to_string(),
            });
        }
        instance.set_state(InstanceState::Active);

        // 7. Load hook, outside any lock.
        let ctx = instance.context();
        let hook = instance.extension().write().await.on_load(&ctx, args).await;

        match hook {
            Ok(()) => {
                let message = format!(
                    "Loaded extension [{name}] [{}]",
                    instance.descriptor().path.display()
                );
                tracing::info!(extension = name, scope = %scope, container = container.label(), "extension loaded");
                LoadReport::Loaded { message, instance }
            }
            Err(ExtensionError::Aborted(message)) => {
                self.unload(&instance).await;
                let message = (!message.is_empty()).then_some(message);
                LoadReport::Failed(LoadError::Aborted {
                    name: name.to_string(),
                    message,
                })
            }
            Err(e) => {
                self.unload(&instance).await;
                LoadReport::Failed(LoadError::HookFault {
                    name: name.to_string(),
                    fault: e.to_string(),
                })
            }
        }
    }

    /// Unload an instance.
    ///
    /// Returns `false` without running any hook when the instance is not a
    /// member of the active set, which makes a double unload a no-op. The
    /// instance leaves the set before its shutdown hook runs, so reentrant
    /// unloads issued from inside shutdown hooks see a consistent set.
    pub async fn unload(&self, instance: &Arc<ExtensionInstance>) -> bool {
        if !self.active.remove(instance.id()) {
            return false;
        }
        instance.set_state(InstanceState::ShuttingDown);

        let ctx = instance.context();
        if let Err(e) = instance.extension().write().await.on_shutdown(&ctx).await {
            tracing::warn!(
                extension = instance.descriptor().name(),
                error = %e,
                "shutdown hook failed"
            );
        }

        if let Some(container) = instance.container() {
            container.remove(instance.id());
        }
        ctx.release().await;
        instance.set_state(InstanceState::Unloaded);
        tracing::info!(extension = instance.descriptor().name(), "extension unloaded");
        true
    }

    /// Drain the active set, unloading one member at a time until empty.
    ///
    /// Shutdown hooks that themselves unload other instances shrink the
    /// set further; each iteration removes at least the picked member, so
    /// the drain terminates.
    pub async fn unload_all(&self) {
        let mut drained = 0usize;
        while let Some(instance) = self.active.pick() {
            if self.unload(&instance).await {
                drained += 1;
            }
        }
        tracing::info!(count = drained, "all extensions unloaded");
    }

    /// Locate and describe `name` without constructing anything.
    pub fn get_info(&self, name: &str) -> InfoReport {
        if let Err(e) = validate_name(name) {
            return InfoReport::Failed(e);
        }
        match self.locator.locate(name) {
            Err(e) => InfoReport::Failed(e),
            Ok(None) => InfoReport::NotFound,
            Ok(Some(located)) => InfoReport::Info(located.descriptor),
        }
    }

    /// Descriptors of every discoverable package across the search
    /// directories.
    pub fn available(&self) -> Vec<ExtensionDescriptor> {
        self.locator.available()
    }

    /// Discoverable packages that declare support for `scope`.
    pub fn available_for(&self, scope: Scope) -> Vec<ExtensionDescriptor> {
        self.locator
            .available()
            .into_iter()
            .filter(|d| d.meta.supports(scope))
            .collect()
    }

    /// Unload any instance of `name` bound to the target container, drop
    /// cached locate state and load fresh, picking up on-disk changes.
    pub async fn reload(
        &self,
        name: &str,
        args: &str,
        scope: Scope,
        bind: &BindContext,
    ) -> LoadReport {
        let container = match scope {
            Scope::Global => Some(self.global.clone()),
            Scope::User => bind.user.clone(),
            Scope::Network => bind.network.clone(),
        };
        if let Some(container) = container {
            let existing: Vec<Arc<ExtensionInstance>> = container
                .iter()
                .filter(|m| m.descriptor().name() == name)
                .collect();
            for instance in existing {
                self.unload(&instance).await;
            }
        }
        self.locator.invalidate(name);
        self.load(name, args, scope, bind).await
    }

    /// Deliver the boot event to every loaded instance.
    pub async fn boot_all(&self) {
        for instance in self.active.instances() {
            let ctx = instance.context();
            if !ctx.is_live() {
                continue;
            }
            if let Err(e) = instance.extension().write().await.on_boot(&ctx).await {
                tracing::warn!(
                    extension = instance.descriptor().name(),
                    error = %e,
                    "boot hook failed"
                );
            }
        }
    }

    fn construct(
        &self,
        descriptor: ExtensionDescriptor,
        scope: Scope,
        args: &str,
        bind: &BindContext,
        extension: Box<dyn Extension>,
    ) -> Arc<ExtensionInstance> {
        let id = InstanceId::new_v4();

        // Store data is keyed by the target container, so it survives
        // unload and reload of the same extension in the same place. The
        // container is only *validated* later; a load that fails there
        // never touches the store.
        let container_label = match scope {
            Scope::Global => Some(self.global.label().to_string()),
            Scope::User => bind.user.as_ref().map(|c| c.label().to_string()),
            Scope::Network => bind.network.as_ref().map(|c| c.label().to_string()),
        }
        .unwrap_or_else(|| "unbound".to_string());
        let namespace = format!("{container_label}/{}", descriptor.name());
        let nv = NvStore::new(self.services.store.clone(), namespace);

        let context = ExtensionContext::new(
            id,
            &descriptor,
            args,
            nv,
            self.services.clone(),
            Arc::downgrade(&self.active),
        );
        let instance = ExtensionInstance::new(id, descriptor, scope, args, extension, context);
        self.active.insert(instance.clone());
        instance
    }
}
