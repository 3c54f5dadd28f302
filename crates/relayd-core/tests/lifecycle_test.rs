//! Integration tests for the extension lifecycle.

use std::sync::Arc;

use parking_lot::Mutex;

use relayd_core::config::DuplicatePolicy;
use relayd_core::extension::{
    BindContext, FactoryRegistry, InfoReport, InstanceState, LifecycleManager, LoadError,
    LoadReport, Scope,
};
use relayd_core::host::Container;
use relayd_testing::{
    event_log, log_entries, test_services, ChainUnloadExtension, FaultyExtension, PackageBuilder,
    RecordingExtension, RejectingExtension,
};

fn manager(pack: &PackageBuilder, factories: FactoryRegistry) -> Arc<LifecycleManager> {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (services, _, _, _) = test_services();
    Arc::new(LifecycleManager::new(pack.config(), factories, services))
}

#[tokio::test]
async fn invalid_name_fails_before_the_filesystem() {
    let pack = PackageBuilder::new();
    let manager = manager(&pack, FactoryRegistry::new());

    for bad in ["../echo", "na me", "sémaphore", "dash-ed", ""] {
        let report = manager
            .load(bad, "", Scope::Global, &BindContext::none())
            .await;
        match report {
            LoadReport::Failed(LoadError::InvalidName(name)) => assert_eq!(name, bad),
            other => panic!("expected InvalidName for {bad:?}, got {other:?}"),
        }
    }
    assert!(manager.active().is_empty());
}

#[tokio::test]
async fn absent_package_is_not_found_not_an_error() {
    let pack = PackageBuilder::new();
    let manager = manager(&pack, FactoryRegistry::new());

    let report = manager
        .load("missing", "", Scope::Global, &BindContext::none())
        .await;
    assert!(matches!(report, LoadReport::NotFound));
}

#[tokio::test]
async fn load_binds_and_reports_the_package_path() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["global"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));

    let manager = manager(&pack, factories);
    let report = manager
        .load("echo", "some args", Scope::Global, &BindContext::none())
        .await;

    let LoadReport::Loaded { message, instance } = report else {
        panic!("expected Loaded, got {report:?}");
    };
    assert!(message.contains("[echo]"));
    assert!(message.contains("echo"));
    assert_eq!(instance.state(), InstanceState::Active);
    assert_eq!(instance.scope(), Scope::Global);
    assert_eq!(instance.args(), "some args");
    assert_eq!(manager.active().len(), 1);
    assert_eq!(manager.global_container().len(), 1);
    assert_eq!(log_entries(&log), vec!["load:some args"]);
}

#[tokio::test]
async fn load_then_unload_restores_everything() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));

    let manager = manager(&pack, factories);
    let user = Container::user("alice");
    let bind = BindContext::for_user(user.clone());

    let report = manager.load("echo", "", Scope::User, &bind).await;
    let instance = report.instance().expect("loaded").clone();
    assert_eq!(manager.active().len(), 1);
    assert_eq!(user.len(), 1);

    assert!(manager.unload(&instance).await);
    assert!(manager.active().is_empty());
    assert!(user.is_empty());
    assert_eq!(instance.state(), InstanceState::Unloaded);
    assert_eq!(log_entries(&log), vec!["load:", "shutdown"]);
}

#[tokio::test]
async fn double_unload_is_a_silent_no_op() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["global"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));

    let manager = manager(&pack, factories);
    let report = manager
        .load("echo", "", Scope::Global, &BindContext::none())
        .await;
    let instance = report.instance().expect("loaded").clone();

    assert!(manager.unload(&instance).await);
    assert!(!manager.unload(&instance).await);

    // Exactly one shutdown hook ran.
    let shutdowns = log_entries(&log)
        .iter()
        .filter(|e| *e == "shutdown")
        .count();
    assert_eq!(shutdowns, 1);
}

#[tokio::test]
async fn rejecting_load_hook_reports_aborted_and_leaves_no_trace() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("grumpy", &["global"]);

    let factories = FactoryRegistry::new();
    factories.register("grumpy", || Box::new(RejectingExtension::new("bad args")));

    let manager = manager(&pack, factories);
    let report = manager
        .load("grumpy", "", Scope::Global, &BindContext::none())
        .await;

    let error = report.error().expect("failed");
    assert_eq!(
        error.to_string(),
        "Extension [grumpy] aborted: bad args"
    );
    assert!(manager.active().is_empty());
    assert!(manager.global_container().is_empty());
}

#[tokio::test]
async fn rejecting_without_message_reports_plain_aborted() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("grumpy", &["global"]);

    let factories = FactoryRegistry::new();
    factories.register("grumpy", || Box::new(RejectingExtension::new("")));

    let manager = manager(&pack, factories);
    let report = manager
        .load("grumpy", "", Scope::Global, &BindContext::none())
        .await;
    assert_eq!(
        report.error().expect("failed").to_string(),
        "Extension [grumpy] aborted."
    );
}

#[tokio::test]
async fn faulting_load_hook_reports_the_fault_text() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("shaky", &["global"]);

    let factories = FactoryRegistry::new();
    factories.register("shaky", || Box::new(FaultyExtension));

    let manager = manager(&pack, factories);
    let report = manager
        .load("shaky", "", Scope::Global, &BindContext::none())
        .await;

    let message = report.error().expect("failed").to_string();
    assert!(message.contains("[shaky]"));
    assert!(message.contains("boom during load"));
    assert!(manager.active().is_empty());
}

#[tokio::test]
async fn unsupported_scope_names_the_extension_and_scope() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["global"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));

    let manager = manager(&pack, factories);
    let user = Container::user("alice");
    let report = manager
        .load("echo", "", Scope::User, &BindContext::for_user(user.clone()))
        .await;

    let message = report.error().expect("failed").to_string();
    assert!(message.contains("[echo]"));
    assert!(message.contains("user scope"));
    assert!(user.is_empty());
    assert!(manager.active().is_empty());
}

#[tokio::test]
async fn missing_context_unloads_the_half_built_instance() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));

    let manager = manager(&pack, factories);
    let report = manager
        .load("echo", "", Scope::User, &BindContext::none())
        .await;

    match report.error().expect("failed") {
        LoadError::MissingContext { name, scope } => {
            assert_eq!(name, "echo");
            assert_eq!(*scope, Scope::User);
        }
        other => panic!("expected MissingContext, got {other:?}"),
    }
    assert!(manager.active().is_empty());
    // The load hook never ran; only the teardown's shutdown hook did.
    assert_eq!(log_entries(&log), vec!["shutdown"]);
}

#[tokio::test]
async fn duplicate_loads_are_rejected_by_default() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));

    let manager = manager(&pack, factories);
    let user = Container::user("alice");
    let bind = BindContext::for_user(user.clone());

    assert!(manager.load("echo", "", Scope::User, &bind).await.is_loaded());
    let second = manager.load("echo", "", Scope::User, &bind).await;
    assert!(matches!(
        second.error(),
        Some(LoadError::AlreadyLoaded { .. })
    ));
    assert_eq!(user.len(), 1);
    assert_eq!(manager.active().len(), 1);

    // A different container is unaffected by the duplicate check.
    let bob = Container::user("bob");
    assert!(manager
        .load("echo", "", Scope::User, &BindContext::for_user(bob.clone()))
        .await
        .is_loaded());
    assert_eq!(bob.len(), 1);
}

#[tokio::test]
async fn duplicate_loads_allowed_when_configured() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));

    let (services, _, _, _) = test_services();
    let config = pack.config().with_duplicate_policy(DuplicatePolicy::Allow);
    let manager = LifecycleManager::new(config, factories, services);

    let user = Container::user("alice");
    let bind = BindContext::for_user(user.clone());
    let first = manager.load("echo", "", Scope::User, &bind).await;
    let second = manager.load("echo", "", Scope::User, &bind).await;

    let first = first.instance().expect("loaded");
    let second = second.instance().expect("loaded");
    assert_ne!(first.id(), second.id());
    assert_eq!(user.len(), 2);
    assert_eq!(manager.active().len(), 2);
}

#[tokio::test]
async fn unload_all_survives_reentrant_unloads() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("chain", &["global"]);
    pack.write_simple_package("echo", &["global"]);

    let log = event_log();
    let target = Arc::new(Mutex::new(None));

    let factories = FactoryRegistry::new();
    let chain_log = log.clone();
    let chain_target = target.clone();
    factories.register("chain", move || {
        Box::new(ChainUnloadExtension::new(
            chain_target.clone(),
            chain_log.clone(),
        ))
    });
    let echo_log = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(echo_log.clone())));

    let manager = manager(&pack, factories);
    let bind = BindContext::none();
    assert!(manager.load("chain", "", Scope::Global, &bind).await.is_loaded());
    let echo = manager
        .load("echo", "", Scope::Global, &bind)
        .await
        .instance()
        .expect("loaded")
        .clone();

    // When the chain extension shuts down it unloads echo too.
    *target.lock() = Some((manager.clone(), echo));

    manager.unload_all().await;
    assert!(manager.active().is_empty());
    assert!(manager.global_container().is_empty());

    // However the drain ordered things, each shutdown ran exactly once.
    let entries = log_entries(&log);
    assert_eq!(
        entries.iter().filter(|e| *e == "shutdown").count(),
        1,
        "echo shutdown exactly once: {entries:?}"
    );
    assert_eq!(
        entries
            .iter()
            .filter(|e| e.starts_with("shutdown:"))
            .count(),
        1,
        "chain shutdown exactly once: {entries:?}"
    );
}

#[tokio::test]
async fn get_info_describes_without_side_effects() {
    let pack = PackageBuilder::new();
    pack.write_package(
        "echo",
        "name = \"echo\"\ndescription = \"Echoes back\"\nwiki_page = \"echo\"\nhas_args = true\nargs_help = \"<prefix>\"\nscopes = [\"user\", \"global\"]\n",
    );

    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));

    let manager = manager(&pack, factories);

    let info = manager.get_info("echo");
    let descriptor = info.descriptor().expect("info");
    assert_eq!(descriptor.meta.description, "Echoes back");
    assert!(descriptor.meta.has_args);
    assert_eq!(descriptor.meta.scopes, vec![Scope::User, Scope::Global]);
    assert!(manager.active().is_empty());

    assert!(matches!(manager.get_info("nope"), InfoReport::NotFound));
    assert!(matches!(
        manager.get_info("no/pe"),
        InfoReport::Failed(LoadError::InvalidName(_))
    ));
}

#[tokio::test]
async fn package_without_factory_is_a_load_error_not_not_found() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("ghost", &["global"]);

    let manager = manager(&pack, FactoryRegistry::new());
    let report = manager
        .load("ghost", "", Scope::Global, &BindContext::none())
        .await;
    let message = report.error().expect("failed").to_string();
    assert!(message.contains("doesn't have an extension named [ghost]"));
}

#[tokio::test]
async fn available_lists_discoverable_packages() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);
    pack.write_simple_package("stats", &["global"]);
    pack.write_package("broken", "name = ");

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));
    factories.register("stats", move || Box::new(RecordingExtension::new(log.clone())));

    let manager = manager(&pack, factories);
    let names: Vec<String> = manager
        .available()
        .into_iter()
        .map(|d| d.meta.name)
        .collect();
    assert_eq!(names, vec!["echo", "stats"]);

    let global_only: Vec<String> = manager
        .available_for(Scope::Global)
        .into_iter()
        .map(|d| d.meta.name)
        .collect();
    assert_eq!(global_only, vec!["stats"]);
}

#[tokio::test]
async fn reload_picks_up_manifest_changes() {
    let pack = PackageBuilder::new();
    pack.write_package("echo", "name = \"echo\"\ndescription = \"old\"\nscopes = [\"global\"]\n");

    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));

    let manager = manager(&pack, factories);
    let bind = BindContext::none();
    let first = manager.load("echo", "", Scope::Global, &bind).await;
    let first_id = first.instance().expect("loaded").id();
    assert_eq!(
        first.instance().unwrap().descriptor().meta.description,
        "old"
    );

    pack.write_package("echo", "name = \"echo\"\ndescription = \"new\"\nscopes = [\"global\"]\n");

    let second = manager.reload("echo", "", Scope::Global, &bind).await;
    let instance = second.instance().expect("reloaded");
    assert_ne!(instance.id(), first_id);
    assert_eq!(instance.descriptor().meta.description, "new");
    assert_eq!(manager.active().len(), 1);
    assert_eq!(manager.global_container().len(), 1);
}

#[tokio::test]
async fn boot_event_reaches_every_instance() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["global"]);

    let log = event_log();
    let factories = FactoryRegistry::new();
    let log2 = log.clone();
    factories.register("echo", move || Box::new(RecordingExtension::new(log2.clone())));

    let manager = manager(&pack, factories);
    manager
        .load("echo", "", Scope::Global, &BindContext::none())
        .await;
    manager.boot_all().await;
    assert!(log_entries(&log).contains(&"boot".to_string()));
}
