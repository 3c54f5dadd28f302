//! Web sub-page registration and rendering.

use std::collections::HashMap;
use std::sync::Arc;

use crate::extension::instance::ExtensionInstance;

/// A web sub-page an extension adds under the host's web interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebSubPage {
    /// Page name, used in the request path.
    pub name: String,
    /// Title shown in the host's navigation.
    pub title: String,
    /// Static query parameters for the page link.
    pub params: Vec<(String, String)>,
    /// Whether the page requires a logged-in session.
    pub requires_login: bool,
    /// Whether the page is restricted to admins.
    pub requires_admin: bool,
}

impl WebSubPage {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            params: Vec::new(),
            requires_login: true,
            requires_admin: false,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.requires_admin = true;
        self
    }
}

/// Key-value sink the extension fills while rendering a page.
#[derive(Debug, Default)]
pub struct WebTemplate {
    values: HashMap<String, String>,
}

impl WebTemplate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Deliver a web request to an instance's `on_web_request` hook.
///
/// Returns `false` when the instance is no longer live or the hook failed;
/// the failure is logged and the template left as the hook produced it.
pub async fn dispatch_web_request(
    instance: &Arc<ExtensionInstance>,
    page: &str,
    tmpl: &mut WebTemplate,
) -> bool {
    let ctx = instance.context();
    if !ctx.is_live() {
        return false;
    }

    let result = instance
        .extension()
        .write()
        .await
        .on_web_request(&ctx, page, tmpl)
        .await;

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(
                extension = instance.descriptor().name(),
                page,
                error = %e,
                "web request hook failed"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_builder() {
        let page = WebSubPage::new("settings")
            .with_title("Echo Settings")
            .with_param("tab", "general")
            .admin_only();
        assert_eq!(page.name, "settings");
        assert_eq!(page.title, "Echo Settings");
        assert!(page.requires_admin);
        assert!(page.requires_login);
    }

    #[test]
    fn test_template() {
        let mut tmpl = WebTemplate::new();
        assert!(tmpl.is_empty());
        tmpl.set("count", "3");
        assert_eq!(tmpl.get("count"), Some("3"));
        assert_eq!(tmpl.get("missing"), None);
    }
}
