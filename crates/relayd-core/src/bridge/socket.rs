//! Bridge-side socket wrappers.
//!
//! A [`SocketHandle`] pairs a host-owned socket resource with the extension's
//! [`SocketHooks`]. The host drives all I/O and reports through
//! [`SocketHandle::deliver`]; the handle forwards each event to the matching
//! hook. A hook fault closes the socket and drops the event, leaving the
//! host and other instances untouched.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use crate::extension::lifecycle::ActiveSet;
use crate::extension::system::HookResult;
use crate::extension::types::ExtensionError;
use crate::host::{AddrFamily, HostSocketId, InstanceId, SocketHost};

use super::context::ExtensionContext;

/// Listener parameters.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub bind_host: String,
    pub ssl: bool,
    pub max_conns: u32,
    pub timeout_secs: u64,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            bind_host: String::new(),
            ssl: false,
            max_conns: 128,
            timeout_secs: 0,
        }
    }
}

/// Outbound connection parameters.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    pub timeout_secs: u64,
    pub ssl: bool,
    pub bind_host: String,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            ssl: false,
            bind_host: String::new(),
        }
    }
}

/// Socket callbacks an extension may override; every hook defaults to a
/// no-op.
#[async_trait::async_trait]
pub trait SocketHooks: Send + Sync {
    /// Invoked once when the wrapper is created, with the arguments the
    /// extension passed to `create_socket`.
    async fn on_init(&mut self, _args: &serde_json::Value) -> HookResult {
        Ok(())
    }

    async fn on_connected(&mut self) -> HookResult {
        Ok(())
    }

    async fn on_disconnected(&mut self) -> HookResult {
        Ok(())
    }

    async fn on_timed_out(&mut self) -> HookResult {
        Ok(())
    }

    async fn on_connection_refused(&mut self) -> HookResult {
        Ok(())
    }

    async fn on_read_data(&mut self, _data: &[u8]) -> HookResult {
        Ok(())
    }

    async fn on_read_line(&mut self, _line: &str) -> HookResult {
        Ok(())
    }

    /// An inbound connection was accepted on a listening socket. Return
    /// hooks for the new connection to adopt it; returning `None` closes
    /// it.
    async fn on_accepted(
        &mut self,
        _host: &str,
        _port: u16,
    ) -> Result<Option<Box<dyn SocketHooks>>, ExtensionError> {
        Ok(None)
    }

    /// The socket is going away.
    async fn on_shutdown(&mut self) -> HookResult {
        Ok(())
    }
}

/// Host-originated socket events forwarded into hooks.
#[derive(Debug)]
pub enum SocketEvent {
    Connected,
    Disconnected,
    TimedOut,
    ConnectionRefused,
    ReadData(Vec<u8>),
    ReadLine(String),
    Accepted {
        remote_host: String,
        remote_port: u16,
        conn: HostSocketId,
    },
    Shutdown,
}

/// Bridge-side wrapper around a host socket resource.
///
/// The host owns the resource and its I/O; the handle owns the hooks and
/// the back-reference to the owning instance.
pub struct SocketHandle {
    owner: InstanceId,
    host_id: HostSocketId,
    label: String,
    host: Arc<dyn SocketHost>,
    registry: Weak<ActiveSet>,
    context: Weak<ExtensionContext>,
    hooks: tokio::sync::Mutex<Box<dyn SocketHooks>>,
    closed: AtomicBool,
}

impl SocketHandle {
    pub(crate) fn new(
        owner: InstanceId,
        host_id: HostSocketId,
        label: String,
        host: Arc<dyn SocketHost>,
        registry: Weak<ActiveSet>,
        context: Weak<ExtensionContext>,
        hooks: Box<dyn SocketHooks>,
    ) -> Arc<Self> {
        Arc::new(Self {
            owner,
            host_id,
            label,
            host,
            registry,
            context,
            hooks: tokio::sync::Mutex::new(hooks),
            closed: AtomicBool::new(false),
        })
    }

    pub fn host_id(&self) -> HostSocketId {
        self.host_id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn is_live(&self) -> bool {
        self.registry
            .upgrade()
            .map(|r| r.contains(self.owner))
            .unwrap_or(false)
    }

    /// Bind a listener.
    ///
    /// `addrtype` is one of `"ipv4"`, `"ipv6"` or `"all"`; anything else
    /// fails before the host is asked for anything. With a concrete port
    /// the bound port comes back (0 if binding failed); with `None` the
    /// host picks a random port and returns it.
    pub fn listen(
        &self,
        addrtype: &str,
        port: Option<u16>,
        config: ListenConfig,
    ) -> Result<u16, ExtensionError> {
        let family = AddrFamily::from_selector(addrtype)?;
        Ok(self.host.listen(self.host_id, family, port, &config))
    }

    /// Start an outbound connection.
    pub fn connect(&self, host: &str, port: u16, config: ConnectConfig) -> bool {
        self.host.connect(self.host_id, host, port, &config)
    }

    /// Queue a text line for writing. Binary payloads go through
    /// [`SocketHandle::write_bytes`].
    pub fn write(&self, line: &str) -> bool {
        self.host.write_text(self.host_id, line)
    }

    /// Queue a binary payload for writing.
    pub fn write_bytes(&self, data: &[u8]) -> bool {
        self.host.write_bytes(self.host_id, data)
    }

    /// Release the host resource. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            self.host.close(self.host_id);
        }
    }

    pub(crate) async fn init(&self, args: &serde_json::Value) -> HookResult {
        self.hooks.lock().await.on_init(args).await
    }

    /// Forward a host event to the matching hook.
    ///
    /// Deliveries to a closed socket or to an instance whose unload has
    /// begun are suppressed. For [`SocketEvent::Accepted`] the return value
    /// is the handle adopted for the new connection, if the hooks took it.
    pub async fn deliver(&self, event: SocketEvent) -> Option<Arc<SocketHandle>> {
        if self.is_closed() || !self.is_live() {
            if let SocketEvent::Accepted { conn, .. } = &event {
                self.host.close(*conn);
            }
            return None;
        }

        let mut hooks = self.hooks.lock().await;
        let result = match event {
            SocketEvent::Connected => hooks.on_connected().await,
            SocketEvent::Disconnected => hooks.on_disconnected().await,
            SocketEvent::TimedOut => hooks.on_timed_out().await,
            SocketEvent::ConnectionRefused => hooks.on_connection_refused().await,
            SocketEvent::ReadData(data) => hooks.on_read_data(&data).await,
            SocketEvent::ReadLine(line) => hooks.on_read_line(&line).await,
            SocketEvent::Shutdown => hooks.on_shutdown().await,
            SocketEvent::Accepted {
                remote_host,
                remote_port,
                conn,
            } => match hooks.on_accepted(&remote_host, remote_port).await {
                Ok(Some(new_hooks)) => {
                    drop(hooks);
                    return self.adopt(conn, new_hooks);
                }
                Ok(None) => {
                    tracing::debug!(socket = %self.label, "accept hook returned no handler, closing connection");
                    self.host.close(conn);
                    return None;
                }
                Err(e) => Err(e),
            },
        };

        if let Err(e) = result {
            tracing::warn!(socket = %self.label, error = %e, "socket hook failed, closing socket");
            drop(hooks);
            self.close();
        }
        None
    }

    /// Wrap an accepted host connection with the hooks the extension
    /// returned, tracking it alongside the instance's other sockets.
    fn adopt(&self, conn: HostSocketId, hooks: Box<dyn SocketHooks>) -> Option<Arc<SocketHandle>> {
        match self.context.upgrade() {
            Some(ctx) => {
                let handle = SocketHandle::new(
                    self.owner,
                    conn,
                    format!("{}/accepted", self.label),
                    self.host.clone(),
                    self.registry.clone(),
                    self.context.clone(),
                    hooks,
                );
                ctx.track_socket(handle.clone());
                Some(handle)
            }
            None => {
                self.host.close(conn);
                None
            }
        }
    }

    /// Teardown path used at unload: run the shutdown hook (the liveness
    /// check would suppress it by now) and release the resource.
    pub(crate) async fn shutdown_and_close(&self) {
        if self.is_closed() {
            return;
        }
        if let Err(e) = self.hooks.lock().await.on_shutdown().await {
            tracing::warn!(socket = %self.label, error = %e, "socket shutdown hook failed");
        }
        self.close();
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("owner", &self.owner)
            .field("host_id", &self.host_id)
            .field("label", &self.label)
            .field("closed", &self.is_closed())
            .finish()
    }
}
