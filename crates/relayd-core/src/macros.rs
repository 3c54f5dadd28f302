//! Convenience macros for host setup.

/// Register an extension constructor under its package name.
///
/// The constructor expression is evaluated once per load, so each instance
/// gets a fresh extension object.
///
/// # Example
///
/// ```rust,ignore
/// use relayd_core::register_extension;
///
/// let factories = FactoryRegistry::new();
/// register_extension!(factories, "echo", EchoExtension::new());
/// ```
#[macro_export]
macro_rules! register_extension {
    ($registry:expr, $name:expr, $ctor:expr) => {
        $registry.register($name, move || {
            Box::new($ctor) as Box<dyn $crate::extension::Extension>
        })
    };
}

#[cfg(test)]
mod tests {
    use crate::extension::system::{Extension, FactoryRegistry};

    #[derive(Default)]
    struct NullExtension;
    impl Extension for NullExtension {}

    #[test]
    fn test_register_extension() {
        let factories = FactoryRegistry::new();
        register_extension!(factories, "echo", NullExtension::default());
        assert!(factories.contains("echo"));
        let _ext = factories.get("echo").unwrap()();
    }
}
