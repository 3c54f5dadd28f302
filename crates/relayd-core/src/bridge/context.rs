//! The per-instance capability surface handed to extension hooks.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use crate::extension::lifecycle::ActiveSet;
use crate::extension::types::{ExtensionDescriptor, ExtensionError};
use crate::host::{HostServices, InstanceId};
use crate::i18n::{domain_for, DeferredText};
use crate::store::NvStore;

use super::command::{CommandDescriptor, CommandEntry, CommandHelp};
use super::handoff::{offer, Handoff};
use super::socket::{SocketHandle, SocketHooks};
use super::timer::{TimerHandle, TimerHooks};
use super::web::WebSubPage;

/// Capability surface of one extension instance.
///
/// Created when the instance is constructed and handed (by reference) to
/// every hook invocation. All bridge-allocated resources are tracked here
/// so unload can tear them down.
pub struct ExtensionContext {
    instance_id: InstanceId,
    name: String,
    args: String,
    data_dir: PathBuf,
    domain: String,
    nv: NvStore,
    services: HostServices,
    registry: Weak<ActiveSet>,
    self_weak: Weak<ExtensionContext>,
    sockets: Mutex<Vec<Arc<SocketHandle>>>,
    timers: Mutex<Vec<Arc<TimerHandle>>>,
    commands: RwLock<HashMap<String, Arc<CommandEntry>>>,
}

impl ExtensionContext {
    pub(crate) fn new(
        instance_id: InstanceId,
        descriptor: &ExtensionDescriptor,
        args: &str,
        nv: NvStore,
        services: HostServices,
        registry: Weak<ActiveSet>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            instance_id,
            name: descriptor.name().to_string(),
            args: args.to_string(),
            data_dir: descriptor.data_dir.clone(),
            domain: domain_for(descriptor.name()),
            nv,
            services,
            registry,
            self_weak: self_weak.clone(),
            sockets: Mutex::new(Vec::new()),
            timers: Mutex::new(Vec::new()),
            commands: RwLock::new(HashMap::new()),
        })
    }

    pub fn instance_id(&self) -> InstanceId {
        self.instance_id
    }

    /// The extension name this instance was loaded as.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The argument string passed to load.
    pub fn args(&self) -> &str {
        &self.args
    }

    /// Directory reserved for this extension's data files.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Persistent key-value store scoped to this instance.
    pub fn nv(&self) -> &NvStore {
        &self.nv
    }

    /// Whether the owning instance is still in the active set. Event
    /// dispatch uses this to suppress deliveries once unload begins.
    pub fn is_live(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.contains(self.instance_id))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Sockets and timers
    // ------------------------------------------------------------------

    /// Create a socket wrapper backed by a host-allocated resource.
    ///
    /// The hooks' `on_init` runs with `init_args` before the handle is
    /// returned; an init fault releases the resource and surfaces the
    /// error to the caller.
    pub async fn create_socket(
        &self,
        hooks: Box<dyn SocketHooks>,
        label: &str,
        init_args: serde_json::Value,
    ) -> Result<Arc<SocketHandle>, ExtensionError> {
        let host_id = self.services.sockets.allocate(self.instance_id, label);
        let handle = SocketHandle::new(
            self.instance_id,
            host_id,
            label.to_string(),
            self.services.sockets.clone(),
            self.registry.clone(),
            self.self_weak.clone(),
            hooks,
        );

        if let Err(e) = handle.init(&init_args).await {
            handle.close();
            return Err(e);
        }

        self.sockets.lock().push(handle.clone());
        Ok(handle)
    }

    /// Create a periodic timer. `cycles == 0` runs until cancelled.
    pub fn create_timer(
        &self,
        hooks: Box<dyn TimerHooks>,
        interval: Duration,
        cycles: u32,
        label: &str,
        description: &str,
    ) -> Arc<TimerHandle> {
        let host_id = self
            .services
            .timers
            .schedule(self.instance_id, interval, cycles, label);
        let handle = TimerHandle::new(
            self.instance_id,
            host_id,
            label.to_string(),
            description.to_string(),
            interval,
            cycles,
            self.services.timers.clone(),
            self.registry.clone(),
            hooks,
        );
        self.timers.lock().push(handle.clone());
        handle
    }

    pub(crate) fn track_socket(&self, handle: Arc<SocketHandle>) {
        self.sockets.lock().push(handle);
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Register a command with the host dispatcher. Command names match
    /// case-insensitively; a name already registered on this instance is
    /// refused.
    pub fn add_command(&self, descriptor: CommandDescriptor) -> bool {
        let key = descriptor.name.to_ascii_lowercase();
        let mut commands = self.commands.write();
        if commands.contains_key(&key) {
            return false;
        }
        commands.insert(
            key,
            Arc::new(CommandEntry {
                name: descriptor.name,
                args_usage: descriptor.args_usage,
                description: descriptor.description,
                handler: tokio::sync::Mutex::new(descriptor.handler),
            }),
        );
        true
    }

    /// Remove a registered command.
    pub fn remove_command(&self, name: &str) -> bool {
        self.commands
            .write()
            .remove(&name.to_ascii_lowercase())
            .is_some()
    }

    pub(crate) fn lookup_command(&self, name: &str) -> Option<Arc<CommandEntry>> {
        self.commands
            .read()
            .get(&name.to_ascii_lowercase())
            .cloned()
    }

    /// Help table of the registered commands, descriptions resolved
    /// against the current locale.
    pub fn command_table(&self) -> Vec<CommandHelp> {
        let catalog = &self.services.catalog;
        let mut rows: Vec<CommandHelp> = self
            .commands
            .read()
            .values()
            .map(|entry| CommandHelp {
                name: entry.name.clone(),
                args_usage: entry.args_usage.clone(),
                description: entry.description.resolve(catalog),
            })
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));
        rows
    }

    // ------------------------------------------------------------------
    // Web pages
    // ------------------------------------------------------------------

    /// Offer a web sub-page to the host. On acceptance the host owns the
    /// page object.
    pub fn register_web_page(&self, page: WebSubPage) -> Handoff<WebSubPage> {
        offer(page, |p| {
            self.services.directory.add_web_page(self.instance_id, p)
        })
    }

    // ------------------------------------------------------------------
    // Translations
    // ------------------------------------------------------------------

    /// Immediate singular translation in this extension's domain.
    pub fn t_s(&self, text: &str) -> String {
        self.services.catalog.singular(&self.domain, text)
    }

    /// Immediate plural translation selected by `count`.
    pub fn t_p(&self, singular: &str, plural: &str, count: u64) -> String {
        self.services
            .catalog
            .plural(&self.domain, singular, plural, count)
    }

    /// Deferred translation token, resolved when rendered.
    pub fn t_d(&self, text: &str) -> DeferredText {
        self.services.catalog.deferred(&self.domain, text)
    }

    // ------------------------------------------------------------------
    // Teardown
    // ------------------------------------------------------------------

    /// Release every bridge-allocated resource: sockets get their shutdown
    /// hook and are closed, timers likewise and cancelled, commands are
    /// dropped. Called once by unload.
    pub(crate) async fn release(&self) {
        let sockets: Vec<Arc<SocketHandle>> = std::mem::take(&mut *self.sockets.lock());
        for socket in sockets {
            socket.shutdown_and_close().await;
        }

        let timers: Vec<Arc<TimerHandle>> = std::mem::take(&mut *self.timers.lock());
        for timer in timers {
            timer.shutdown_and_cancel().await;
        }

        self.commands.write().clear();
    }
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("instance_id", &self.instance_id)
            .field("name", &self.name)
            .field("data_dir", &self.data_dir)
            .field("domain", &self.domain)
            .finish()
    }
}
