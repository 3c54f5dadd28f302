//! Mock host services that record every call.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use relayd_core::bridge::socket::{ConnectConfig, ListenConfig};
use relayd_core::bridge::web::WebSubPage;
use relayd_core::host::{
    AddrFamily, ChannelSpec, HostDirectory, HostServices, HostSocketId, HostTimerId, InstanceId,
    ListenerSpec, NetworkSpec, SocketHost, TimerHost, UserSpec,
};
use relayd_core::i18n::TranslationCatalog;
use relayd_core::store::MemoryStore;

/// Recording socket host.
///
/// Allocation hands out sequential ids; `fail_bind` makes concrete-port
/// binds report failure (port 0) while random-port requests keep working.
#[derive(Default)]
pub struct MockSocketHost {
    next_id: AtomicU64,
    pub fail_bind: AtomicBool,
    pub random_port: AtomicU64,
    allocations: Mutex<Vec<(InstanceId, String)>>,
    listens: Mutex<Vec<(HostSocketId, AddrFamily, Option<u16>)>>,
    connects: Mutex<Vec<(HostSocketId, String, u16)>>,
    text_writes: Mutex<Vec<(HostSocketId, String)>>,
    byte_writes: Mutex<Vec<(HostSocketId, Vec<u8>)>>,
    closed: Mutex<HashSet<HostSocketId>>,
}

impl MockSocketHost {
    pub fn new() -> Arc<Self> {
        let host = Self::default();
        host.random_port.store(40000, Ordering::Relaxed);
        Arc::new(host)
    }

    pub fn allocation_count(&self) -> usize {
        self.allocations.lock().len()
    }

    pub fn listen_count(&self) -> usize {
        self.listens.lock().len()
    }

    pub fn text_written(&self, sock: HostSocketId) -> Vec<String> {
        self.text_writes
            .lock()
            .iter()
            .filter(|(id, _)| *id == sock)
            .map(|(_, line)| line.clone())
            .collect()
    }

    pub fn bytes_written(&self, sock: HostSocketId) -> Vec<Vec<u8>> {
        self.byte_writes
            .lock()
            .iter()
            .filter(|(id, _)| *id == sock)
            .map(|(_, data)| data.clone())
            .collect()
    }

    pub fn is_closed(&self, sock: HostSocketId) -> bool {
        self.closed.lock().contains(&sock)
    }

    /// Hand out an id as if the host accepted an inbound connection.
    pub fn accept_connection(&self) -> HostSocketId {
        HostSocketId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl SocketHost for MockSocketHost {
    fn allocate(&self, owner: InstanceId, label: &str) -> HostSocketId {
        let id = HostSocketId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.allocations.lock().push((owner, label.to_string()));
        id
    }

    fn listen(
        &self,
        sock: HostSocketId,
        family: AddrFamily,
        port: Option<u16>,
        _config: &ListenConfig,
    ) -> u16 {
        self.listens.lock().push((sock, family, port));
        match port {
            Some(port) => {
                if self.fail_bind.load(Ordering::Relaxed) {
                    0
                } else {
                    port
                }
            }
            None => self.random_port.load(Ordering::Relaxed) as u16,
        }
    }

    fn connect(
        &self,
        sock: HostSocketId,
        host: &str,
        port: u16,
        _config: &ConnectConfig,
    ) -> bool {
        self.connects.lock().push((sock, host.to_string(), port));
        true
    }

    fn write_text(&self, sock: HostSocketId, data: &str) -> bool {
        self.text_writes.lock().push((sock, data.to_string()));
        true
    }

    fn write_bytes(&self, sock: HostSocketId, data: &[u8]) -> bool {
        self.byte_writes.lock().push((sock, data.to_vec()));
        true
    }

    fn close(&self, sock: HostSocketId) {
        self.closed.lock().insert(sock);
    }
}

/// Recording timer host.
#[derive(Default)]
pub struct MockTimerHost {
    next_id: AtomicU64,
    scheduled: Mutex<Vec<(InstanceId, Duration, u32, String)>>,
    cancelled: Mutex<HashSet<HostTimerId>>,
}

impl MockTimerHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn schedule_count(&self) -> usize {
        self.scheduled.lock().len()
    }

    pub fn is_cancelled(&self, timer: HostTimerId) -> bool {
        self.cancelled.lock().contains(&timer)
    }
}

impl TimerHost for MockTimerHost {
    fn schedule(
        &self,
        owner: InstanceId,
        interval: Duration,
        cycles: u32,
        label: &str,
    ) -> HostTimerId {
        let id = HostTimerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.scheduled
            .lock()
            .push((owner, interval, cycles, label.to_string()));
        id
    }

    fn cancel(&self, timer: HostTimerId) {
        self.cancelled.lock().insert(timer);
    }
}

/// Recording directory; `accept` decides whether registrations succeed.
pub struct MockDirectory {
    pub accept: AtomicBool,
    listeners: Mutex<Vec<ListenerSpec>>,
    users: Mutex<Vec<UserSpec>>,
    networks: Mutex<Vec<NetworkSpec>>,
    channels: Mutex<Vec<ChannelSpec>>,
    web_pages: Mutex<Vec<(InstanceId, WebSubPage)>>,
}

impl MockDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            accept: AtomicBool::new(true),
            listeners: Mutex::new(Vec::new()),
            users: Mutex::new(Vec::new()),
            networks: Mutex::new(Vec::new()),
            channels: Mutex::new(Vec::new()),
            web_pages: Mutex::new(Vec::new()),
        })
    }

    pub fn web_pages_for(&self, owner: InstanceId) -> Vec<WebSubPage> {
        self.web_pages
            .lock()
            .iter()
            .filter(|(id, _)| *id == owner)
            .map(|(_, page)| page.clone())
            .collect()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }
}

impl HostDirectory for MockDirectory {
    fn add_listener(&self, spec: &ListenerSpec) -> bool {
        if !self.accept.load(Ordering::Relaxed) {
            return false;
        }
        self.listeners.lock().push(spec.clone());
        true
    }

    fn add_user(&self, spec: &UserSpec) -> bool {
        if !self.accept.load(Ordering::Relaxed) {
            return false;
        }
        self.users.lock().push(spec.clone());
        true
    }

    fn add_network(&self, spec: &NetworkSpec) -> bool {
        if !self.accept.load(Ordering::Relaxed) {
            return false;
        }
        self.networks.lock().push(spec.clone());
        true
    }

    fn add_channel(&self, spec: &ChannelSpec) -> bool {
        if !self.accept.load(Ordering::Relaxed) {
            return false;
        }
        self.channels.lock().push(spec.clone());
        true
    }

    fn add_web_page(&self, owner: InstanceId, page: &WebSubPage) -> bool {
        if !self.accept.load(Ordering::Relaxed) {
            return false;
        }
        self.web_pages.lock().push((owner, page.clone()));
        true
    }
}

/// Host services wired to fresh mocks and an in-memory store.
pub fn test_services() -> (HostServices, Arc<MockSocketHost>, Arc<MockTimerHost>, Arc<MockDirectory>) {
    let sockets = MockSocketHost::new();
    let timers = MockTimerHost::new();
    let directory = MockDirectory::new();
    let services = HostServices {
        sockets: sockets.clone(),
        timers: timers.clone(),
        directory: directory.clone(),
        store: Arc::new(MemoryStore::new()),
        catalog: Arc::new(TranslationCatalog::new("en")),
    };
    (services, sockets, timers, directory)
}
