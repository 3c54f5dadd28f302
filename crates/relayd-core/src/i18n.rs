//! Translation indirection for extension-facing text.
//!
//! Every extension class gets a translation domain derived from its name
//! (`relayd-<name>`). Lookups fall back to the source text, so an untranslated
//! catalog behaves as identity. Deferred text exists for call sites where the
//! final locale is unknown when the message is produced (command descriptions,
//! queued status lines); the token resolves against the catalog only when
//! rendered.

use std::collections::HashMap;

use parking_lot::RwLock;

/// One translated message: singular form, optional plural form.
#[derive(Debug, Clone)]
struct Entry {
    singular: String,
    plural: Option<String>,
}

/// Key: (domain, locale) -> source singular -> entry.
type DomainTable = HashMap<(String, String), HashMap<String, Entry>>;

/// Process-wide catalog of translations, owned by the lifecycle manager.
pub struct TranslationCatalog {
    locale: RwLock<String>,
    tables: RwLock<DomainTable>,
}

/// Translation domain name for an extension class.
pub fn domain_for(extension: &str) -> String {
    format!("relayd-{extension}")
}

impl TranslationCatalog {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: RwLock::new(locale.into()),
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// The locale lookups currently resolve against.
    pub fn locale(&self) -> String {
        self.locale.read().clone()
    }

    /// Switch the active locale; already-produced [`DeferredText`] tokens
    /// pick the new locale up when rendered.
    pub fn set_locale(&self, locale: impl Into<String>) {
        *self.locale.write() = locale.into();
    }

    /// Register a singular translation.
    pub fn add(
        &self,
        domain: &str,
        locale: &str,
        source: impl Into<String>,
        translated: impl Into<String>,
    ) {
        self.tables
            .write()
            .entry((domain.to_string(), locale.to_string()))
            .or_default()
            .insert(
                source.into(),
                Entry {
                    singular: translated.into(),
                    plural: None,
                },
            );
    }

    /// Register a plural-capable translation, keyed by the source singular.
    pub fn add_plural(
        &self,
        domain: &str,
        locale: &str,
        source_singular: impl Into<String>,
        translated_singular: impl Into<String>,
        translated_plural: impl Into<String>,
    ) {
        self.tables
            .write()
            .entry((domain.to_string(), locale.to_string()))
            .or_default()
            .insert(
                source_singular.into(),
                Entry {
                    singular: translated_singular.into(),
                    plural: Some(translated_plural.into()),
                },
            );
    }

    /// Immediate singular lookup; falls back to the source text.
    pub fn singular(&self, domain: &str, text: &str) -> String {
        let locale = self.locale();
        self.tables
            .read()
            .get(&(domain.to_string(), locale))
            .and_then(|entries| entries.get(text))
            .map(|e| e.singular.clone())
            .unwrap_or_else(|| text.to_string())
    }

    /// Immediate plural lookup selected by `count`; falls back to the
    /// source forms with the English one/many rule.
    pub fn plural(&self, domain: &str, singular: &str, plural: &str, count: u64) -> String {
        let locale = self.locale();
        let tables = self.tables.read();
        let entry = tables
            .get(&(domain.to_string(), locale))
            .and_then(|entries| entries.get(singular));

        match entry {
            Some(e) if count == 1 => e.singular.clone(),
            Some(e) => e.plural.clone().unwrap_or_else(|| e.singular.clone()),
            None if count == 1 => singular.to_string(),
            None => plural.to_string(),
        }
    }

    /// Produce a deferred token; resolution happens at render time.
    pub fn deferred(&self, domain: &str, text: &str) -> DeferredText {
        DeferredText {
            domain: domain.to_string(),
            text: text.to_string(),
        }
    }
}

/// An opaque translatable token, resolved to text only when rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredText {
    domain: String,
    text: String,
}

impl DeferredText {
    pub fn new(domain: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            text: text.into(),
        }
    }

    /// The untranslated source text.
    pub fn source(&self) -> &str {
        &self.text
    }

    /// Resolve against the catalog's locale at this moment.
    pub fn resolve(&self, catalog: &TranslationCatalog) -> String {
        catalog.singular(&self.domain, &self.text)
    }
}
