//! Per-instance command registration and dispatch.
//!
//! Commands are registered through [`super::context::ExtensionContext::add_command`]
//! and invoked by the host dispatcher with the raw remaining argument line.
//! A line whose first token matches no registered command falls through to
//! the extension's `on_command` hook.

use std::sync::Arc;

use crate::extension::instance::ExtensionInstance;
use crate::extension::system::HookResult;
use crate::i18n::{DeferredText, TranslationCatalog};

use super::context::ExtensionContext;

/// Text that is either plain or a deferred translation token.
///
/// Command descriptions are produced when the command is registered, long
/// before anyone asks for help in a concrete locale; deferring the lookup
/// keeps the description translatable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Text {
    Plain(String),
    Deferred(DeferredText),
}

impl Text {
    /// Resolve to a concrete string against the catalog's current locale.
    pub fn resolve(&self, catalog: &TranslationCatalog) -> String {
        match self {
            Text::Plain(s) => s.clone(),
            Text::Deferred(d) => d.resolve(catalog),
        }
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::Plain(s.to_string())
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::Plain(s)
    }
}

impl From<DeferredText> for Text {
    fn from(d: DeferredText) -> Self {
        Text::Deferred(d)
    }
}

/// Handler invoked when a registered command matches.
#[async_trait::async_trait]
pub trait CommandHandler: Send + Sync {
    /// `args` is the raw argument line after the command token.
    async fn handle(&mut self, ctx: &ExtensionContext, args: &str) -> HookResult;
}

/// A command an extension registers with the host dispatcher.
pub struct CommandDescriptor {
    pub name: String,
    pub args_usage: String,
    pub description: Text,
    pub handler: Box<dyn CommandHandler>,
}

impl CommandDescriptor {
    pub fn new(name: impl Into<String>, handler: Box<dyn CommandHandler>) -> Self {
        Self {
            name: name.into(),
            args_usage: String::new(),
            description: Text::Plain(String::new()),
            handler,
        }
    }

    pub fn with_args_usage(mut self, usage: impl Into<String>) -> Self {
        self.args_usage = usage.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<Text>) -> Self {
        self.description = description.into();
        self
    }
}

/// Registered command, keyed case-insensitively by name.
pub(crate) struct CommandEntry {
    pub(crate) name: String,
    pub(crate) args_usage: String,
    pub(crate) description: Text,
    pub(crate) handler: tokio::sync::Mutex<Box<dyn CommandHandler>>,
}

/// One row of the command help table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHelp {
    pub name: String,
    pub args_usage: String,
    pub description: String,
}

/// Split a command line into its first token and the raw remainder.
pub(crate) fn split_first_word(line: &str) -> (&str, &str) {
    let line = line.trim_start();
    match line.find(char::is_whitespace) {
        Some(idx) => (&line[..idx], line[idx..].trim_start()),
        None => (line, ""),
    }
}

/// Route a command line to the instance.
///
/// Returns `true` when a registered command handled the line. Unmatched
/// lines go to the extension's `on_command` hook and return `false`. Hook
/// faults are logged and the delivery dropped. Nothing is delivered to an
/// instance whose unload has begun.
pub async fn dispatch_command(instance: &Arc<ExtensionInstance>, line: &str) -> bool {
    let ctx = instance.context();
    if !ctx.is_live() {
        return false;
    }

    let (command, rest) = split_first_word(line);
    if !command.is_empty() {
        if let Some(entry) = ctx.lookup_command(command) {
            if let Err(e) = entry.handler.lock().await.handle(&ctx, rest).await {
                tracing::warn!(
                    extension = instance.descriptor().name(),
                    command = entry.name,
                    error = %e,
                    "command handler failed"
                );
            }
            return true;
        }
    }

    let result = instance
        .extension()
        .write()
        .await
        .on_command(&ctx, line.trim())
        .await;
    if let Err(e) = result {
        tracing::warn!(
            extension = instance.descriptor().name(),
            error = %e,
            "command hook failed"
        );
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_first_word() {
        assert_eq!(split_first_word("set key value"), ("set", "key value"));
        assert_eq!(split_first_word("help"), ("help", ""));
        assert_eq!(split_first_word("  help   me  "), ("help", "me  "));
        assert_eq!(split_first_word(""), ("", ""));
    }

    #[test]
    fn test_text_resolution() {
        let catalog = TranslationCatalog::new("de");
        catalog.add("relayd-echo", "de", "Say it back", "Sag es zurück");

        let plain: Text = "Say it back".into();
        assert_eq!(plain.resolve(&catalog), "Say it back");

        let deferred: Text = DeferredText::new("relayd-echo", "Say it back").into();
        assert_eq!(deferred.resolve(&catalog), "Sag es zurück");
    }
}
