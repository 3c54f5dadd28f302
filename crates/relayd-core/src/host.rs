//! Host-side capability traits and containers.
//!
//! The host application (connection handling, scheduling, persistence) is a
//! black box to this crate. Everything the bridge needs from it is expressed
//! as a small trait per concern, implemented by the host and injected
//! through [`HostServices`]. Socket and timer I/O is owned and scheduled by
//! the host; the bridge only wraps and forwards.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::bridge::socket::{ConnectConfig, ListenConfig};
use crate::bridge::web::WebSubPage;
use crate::bridge::BridgeError;
use crate::config::DuplicatePolicy;
use crate::extension::instance::ExtensionInstance;
use crate::extension::types::Scope;
use crate::i18n::TranslationCatalog;
use crate::store::StoreBackend;

/// Identity of an extension instance.
pub type InstanceId = uuid::Uuid;

/// Opaque handle to a host-owned socket resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostSocketId(pub u64);

/// Opaque handle to a host-owned timer resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostTimerId(pub u64);

/// Address families a listener can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrFamily {
    Ipv4,
    Ipv6,
    All,
}

impl AddrFamily {
    /// Resolve the textual selector used by extension code.
    ///
    /// Fails with [`BridgeError::InvalidAddrType`] before any host resource
    /// is touched.
    pub fn from_selector(selector: &str) -> Result<Self, BridgeError> {
        match selector.to_ascii_lowercase().as_str() {
            "ipv4" => Ok(AddrFamily::Ipv4),
            "ipv6" => Ok(AddrFamily::Ipv6),
            "all" => Ok(AddrFamily::All),
            _ => Err(BridgeError::InvalidAddrType(selector.to_string())),
        }
    }
}

/// Socket primitives the host provides.
///
/// All calls are non-blocking bookkeeping operations; actual I/O happens on
/// the host's event loop, which reports back through socket events.
pub trait SocketHost: Send + Sync {
    /// Allocate a socket resource owned by `owner`.
    fn allocate(&self, owner: InstanceId, label: &str) -> HostSocketId;

    /// Bind a listener. With `Some(port)` returns that port on success or 0
    /// on bind failure; with `None` the host picks a random port and
    /// returns it.
    fn listen(
        &self,
        sock: HostSocketId,
        family: AddrFamily,
        port: Option<u16>,
        config: &ListenConfig,
    ) -> u16;

    /// Start an outbound connection; `false` if the host refused to start.
    fn connect(&self, sock: HostSocketId, host: &str, port: u16, config: &ConnectConfig) -> bool;

    /// Queue a text payload for writing.
    fn write_text(&self, sock: HostSocketId, data: &str) -> bool;

    /// Queue a binary payload for writing.
    fn write_bytes(&self, sock: HostSocketId, data: &[u8]) -> bool;

    /// Release the socket resource.
    fn close(&self, sock: HostSocketId);
}

/// Timer primitives the host provides.
pub trait TimerHost: Send + Sync {
    /// Schedule a periodic timer; `cycles == 0` means run until cancelled.
    fn schedule(
        &self,
        owner: InstanceId,
        interval: Duration,
        cycles: u32,
        label: &str,
    ) -> HostTimerId;

    /// Cancel a scheduled timer.
    fn cancel(&self, timer: HostTimerId);
}

/// A listener specification offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerSpec {
    pub bind_host: String,
    pub port: u16,
    pub family: AddrFamily,
    pub ssl: bool,
}

/// A user record offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSpec {
    pub name: String,
}

/// A connection-group record offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkSpec {
    pub user: String,
    pub name: String,
}

/// A channel record offered to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelSpec {
    pub network: String,
    pub name: String,
}

/// Registration operations on host-owned collections.
///
/// Each returns `true` when the host accepted the object. On acceptance the
/// host takes ownership of what was passed; see
/// [`crate::bridge::handoff`] for the calling convention that enforces this.
pub trait HostDirectory: Send + Sync {
    fn add_listener(&self, spec: &ListenerSpec) -> bool;
    fn add_user(&self, spec: &UserSpec) -> bool;
    fn add_network(&self, spec: &NetworkSpec) -> bool;
    fn add_channel(&self, spec: &ChannelSpec) -> bool;
    fn add_web_page(&self, owner: InstanceId, page: &WebSubPage) -> bool;
}

/// Everything the extension core needs from the host, bundled for injection.
#[derive(Clone)]
pub struct HostServices {
    pub sockets: Arc<dyn SocketHost>,
    pub timers: Arc<dyn TimerHost>,
    pub directory: Arc<dyn HostDirectory>,
    pub store: Arc<dyn StoreBackend>,
    pub catalog: Arc<TranslationCatalog>,
}

/// A host object owning a list of active extension instances.
///
/// One container exists per user, one per connection group, and a single
/// process-wide one for global extensions. The container *references* its
/// instances; the lifecycle manager's active set is the authoritative owner.
pub struct Container {
    scope: Scope,
    label: String,
    modules: RwLock<Vec<Arc<ExtensionInstance>>>,
}

impl Container {
    /// Container for a single user.
    pub fn user(name: impl AsRef<str>) -> Arc<Self> {
        Arc::new(Self {
            scope: Scope::User,
            label: format!("user/{}", name.as_ref()),
            modules: RwLock::new(Vec::new()),
        })
    }

    /// Container for one of a user's connection groups.
    pub fn network(user: impl AsRef<str>, name: impl AsRef<str>) -> Arc<Self> {
        Arc::new(Self {
            scope: Scope::Network,
            label: format!("network/{}/{}", user.as_ref(), name.as_ref()),
            modules: RwLock::new(Vec::new()),
        })
    }

    /// The process-wide container.
    pub fn global() -> Arc<Self> {
        Arc::new(Self {
            scope: Scope::Global,
            label: "global".to_string(),
            modules: RwLock::new(Vec::new()),
        })
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Identity label; also the first half of the persistent-store
    /// namespace of instances bound here.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Append atomically with the duplicate check: under
    /// [`DuplicatePolicy::Reject`] a second instance of the same extension
    /// name is refused.
    pub(crate) fn try_push(&self, instance: Arc<ExtensionInstance>, policy: DuplicatePolicy) -> bool {
        let mut modules = self.modules.write();
        if policy == DuplicatePolicy::Reject
            && modules
                .iter()
                .any(|m| m.descriptor().name() == instance.descriptor().name())
        {
            return false;
        }
        modules.push(instance);
        true
    }

    pub(crate) fn remove(&self, id: InstanceId) -> bool {
        let mut modules = self.modules.write();
        let before = modules.len();
        modules.retain(|m| m.id() != id);
        modules.len() != before
    }

    /// Whether an instance of the named extension is bound here.
    pub fn contains_name(&self, name: &str) -> bool {
        self.modules
            .read()
            .iter()
            .any(|m| m.descriptor().name() == name)
    }

    pub fn len(&self) -> usize {
        self.modules.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.read().is_empty()
    }

    /// Snapshot iterator over the bound instances.
    ///
    /// The snapshot is taken when called; mutations after that are not
    /// observed, so extension code may iterate while loads and unloads
    /// proceed.
    pub fn iter(&self) -> impl Iterator<Item = Arc<ExtensionInstance>> {
        self.modules.read().clone().into_iter()
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container")
            .field("scope", &self.scope)
            .field("label", &self.label)
            .field("modules", &self.len())
            .finish()
    }
}
