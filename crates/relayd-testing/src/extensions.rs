//! Sample extensions exercising the lifecycle paths.

use std::sync::Arc;

use parking_lot::Mutex;

use relayd_core::bridge::context::ExtensionContext;
use relayd_core::bridge::command::CommandHandler;
use relayd_core::extension::instance::ExtensionInstance;
use relayd_core::extension::lifecycle::LifecycleManager;
use relayd_core::extension::system::{Extension, HookResult};
use relayd_core::extension::types::ExtensionError;

use crate::EventLog;

/// Records every hook invocation into an [`EventLog`].
pub struct RecordingExtension {
    log: EventLog,
}

impl RecordingExtension {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait::async_trait]
impl Extension for RecordingExtension {
    async fn on_load(&mut self, _ctx: &ExtensionContext, args: &str) -> HookResult {
        self.log.lock().push(format!("load:{args}"));
        Ok(())
    }

    async fn on_shutdown(&mut self, _ctx: &ExtensionContext) -> HookResult {
        self.log.lock().push("shutdown".to_string());
        Ok(())
    }

    async fn on_boot(&mut self, _ctx: &ExtensionContext) -> HookResult {
        self.log.lock().push("boot".to_string());
        Ok(())
    }

    async fn on_command(&mut self, _ctx: &ExtensionContext, line: &str) -> HookResult {
        self.log.lock().push(format!("command:{line}"));
        Ok(())
    }

    async fn on_web_request(
        &mut self,
        _ctx: &ExtensionContext,
        page: &str,
        tmpl: &mut relayd_core::bridge::web::WebTemplate,
    ) -> HookResult {
        self.log.lock().push(format!("web:{page}"));
        tmpl.set("rendered_by", "RecordingExtension");
        Ok(())
    }
}

/// Load hook declines with [`ExtensionError::Aborted`].
pub struct RejectingExtension {
    message: String,
}

impl RejectingExtension {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait::async_trait]
impl Extension for RejectingExtension {
    async fn on_load(&mut self, _ctx: &ExtensionContext, _args: &str) -> HookResult {
        Err(ExtensionError::Aborted(self.message.clone()))
    }
}

/// Load hook fails with an unexpected error.
pub struct FaultyExtension;

#[async_trait::async_trait]
impl Extension for FaultyExtension {
    async fn on_load(&mut self, _ctx: &ExtensionContext, _args: &str) -> HookResult {
        Err(ExtensionError::ExecutionFailed(
            "boom during load".to_string(),
        ))
    }
}

/// A pending unload-another-instance request.
pub type UnloadRequest = (Arc<LifecycleManager>, Arc<ExtensionInstance>);

/// Shutdown hook unloads another still-active instance, exercising the
/// reentrancy guarantees of the drain loop.
pub struct ChainUnloadExtension {
    target: Arc<Mutex<Option<UnloadRequest>>>,
    log: EventLog,
}

impl ChainUnloadExtension {
    pub fn new(target: Arc<Mutex<Option<UnloadRequest>>>, log: EventLog) -> Self {
        Self { target, log }
    }
}

#[async_trait::async_trait]
impl Extension for ChainUnloadExtension {
    async fn on_shutdown(&mut self, ctx: &ExtensionContext) -> HookResult {
        self.log.lock().push(format!("shutdown:{}", ctx.name()));
        let request = self.target.lock().take();
        if let Some((manager, instance)) = request {
            manager.unload(&instance).await;
        }
        Ok(())
    }
}

/// Command handler appending `"<tag>:<args>"` to the log.
pub struct RecordingHandler {
    tag: String,
    log: EventLog,
}

impl RecordingHandler {
    pub fn new(tag: impl Into<String>, log: EventLog) -> Self {
        Self {
            tag: tag.into(),
            log,
        }
    }
}

#[async_trait::async_trait]
impl CommandHandler for RecordingHandler {
    async fn handle(&mut self, _ctx: &ExtensionContext, args: &str) -> HookResult {
        self.log.lock().push(format!("{}:{args}", self.tag));
        Ok(())
    }
}
