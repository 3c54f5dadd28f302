//! A constructed, tracked extension instance.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::RwLock;

use crate::bridge::context::ExtensionContext;
use crate::host::{Container, InstanceId};

use super::system::Extension;
use super::types::{ExtensionDescriptor, InstanceState, Scope};

/// One loaded extension.
///
/// Owned by the lifecycle manager's active set from construction until its
/// unload completes; the container it is bound to holds a reference, not
/// ownership. At most one handle per instance ever exists.
pub struct ExtensionInstance {
    id: InstanceId,
    descriptor: ExtensionDescriptor,
    scope: Scope,
    args: String,
    loaded_at: DateTime<Utc>,
    state: Mutex<InstanceState>,
    container: Mutex<Option<Weak<Container>>>,
    context: Arc<ExtensionContext>,
    extension: RwLock<Box<dyn Extension>>,
}

impl ExtensionInstance {
    pub(crate) fn new(
        id: InstanceId,
        descriptor: ExtensionDescriptor,
        scope: Scope,
        args: &str,
        extension: Box<dyn Extension>,
        context: Arc<ExtensionContext>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            descriptor,
            scope,
            args: args.to_string(),
            loaded_at: Utc::now(),
            state: Mutex::new(InstanceState::Constructed),
            container: Mutex::new(None),
            context,
            extension: RwLock::new(extension),
        })
    }

    pub fn id(&self) -> InstanceId {
        self.id
    }

    pub fn descriptor(&self) -> &ExtensionDescriptor {
        &self.descriptor
    }

    /// The scope this instance is bound to.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// The argument string it was loaded with.
    pub fn args(&self) -> &str {
        &self.args
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn state(&self) -> InstanceState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, to: InstanceState) {
        let mut state = self.state.lock();
        if !InstanceState::can_transition(*state, to) {
            tracing::warn!(
                extension = self.descriptor.name(),
                from = %*state,
                to = %to,
                "unexpected instance state transition"
            );
        }
        *state = to;
    }

    /// The container this instance is bound to, while it still exists.
    pub fn container(&self) -> Option<Arc<Container>> {
        self.container.lock().as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn bind_container(&self, container: &Arc<Container>) {
        *self.container.lock() = Some(Arc::downgrade(container));
    }

    /// The capability surface hooks receive.
    pub fn context(&self) -> Arc<ExtensionContext> {
        self.context.clone()
    }

    /// The extension object; hooks are invoked through its write half so
    /// each instance sees its callbacks serially.
    pub fn extension(&self) -> &RwLock<Box<dyn Extension>> {
        &self.extension
    }
}

impl PartialEq for ExtensionInstance {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ExtensionInstance {}

impl std::fmt::Debug for ExtensionInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionInstance")
            .field("id", &self.id)
            .field("name", &self.descriptor.name())
            .field("scope", &self.scope)
            .field("state", &self.state())
            .finish()
    }
}
