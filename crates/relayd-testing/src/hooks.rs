//! Socket and timer hooks that record events or fault on demand.

use relayd_core::bridge::socket::SocketHooks;
use relayd_core::bridge::timer::TimerHooks;
use relayd_core::extension::system::HookResult;
use relayd_core::extension::types::ExtensionError;

use crate::EventLog;

/// Records every socket event; `on_accepted` adopts the connection with a
/// fresh recording hook set.
pub struct RecordingSocketHooks {
    log: EventLog,
}

impl RecordingSocketHooks {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait::async_trait]
impl SocketHooks for RecordingSocketHooks {
    async fn on_init(&mut self, args: &serde_json::Value) -> HookResult {
        self.log.lock().push(format!("init:{args}"));
        Ok(())
    }

    async fn on_connected(&mut self) -> HookResult {
        self.log.lock().push("connected".to_string());
        Ok(())
    }

    async fn on_disconnected(&mut self) -> HookResult {
        self.log.lock().push("disconnected".to_string());
        Ok(())
    }

    async fn on_read_data(&mut self, data: &[u8]) -> HookResult {
        self.log.lock().push(format!("data:{}", data.len()));
        Ok(())
    }

    async fn on_read_line(&mut self, line: &str) -> HookResult {
        self.log.lock().push(format!("line:{line}"));
        Ok(())
    }

    async fn on_accepted(
        &mut self,
        host: &str,
        port: u16,
    ) -> Result<Option<Box<dyn SocketHooks>>, ExtensionError> {
        self.log.lock().push(format!("accepted:{host}:{port}"));
        Ok(Some(Box::new(RecordingSocketHooks::new(self.log.clone()))))
    }

    async fn on_shutdown(&mut self) -> HookResult {
        self.log.lock().push("socket_shutdown".to_string());
        Ok(())
    }
}

/// `on_read_line` faults; everything else records.
pub struct FaultySocketHooks {
    log: EventLog,
}

impl FaultySocketHooks {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait::async_trait]
impl SocketHooks for FaultySocketHooks {
    async fn on_connected(&mut self) -> HookResult {
        self.log.lock().push("connected".to_string());
        Ok(())
    }

    async fn on_read_line(&mut self, _line: &str) -> HookResult {
        Err(ExtensionError::ExecutionFailed(
            "read hook fault".to_string(),
        ))
    }

    async fn on_shutdown(&mut self) -> HookResult {
        self.log.lock().push("socket_shutdown".to_string());
        Ok(())
    }
}

/// Records timer runs and shutdowns.
pub struct RecordingTimerHooks {
    log: EventLog,
}

impl RecordingTimerHooks {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait::async_trait]
impl TimerHooks for RecordingTimerHooks {
    async fn run(&mut self) -> HookResult {
        self.log.lock().push("tick".to_string());
        Ok(())
    }

    async fn on_shutdown(&mut self) -> HookResult {
        self.log.lock().push("timer_shutdown".to_string());
        Ok(())
    }
}

/// `run` faults on every tick.
pub struct FaultyTimerHooks;

#[async_trait::async_trait]
impl TimerHooks for FaultyTimerHooks {
    async fn run(&mut self) -> HookResult {
        Err(ExtensionError::ExecutionFailed("timer fault".to_string()))
    }
}
