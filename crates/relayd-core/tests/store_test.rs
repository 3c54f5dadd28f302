//! Integration tests for per-instance persistent storage.

use std::sync::Arc;

use relayd_core::extension::{BindContext, FactoryRegistry, LifecycleManager, Scope};
use relayd_core::host::Container;
use relayd_core::store::StoreError;
use relayd_testing::{event_log, test_services, PackageBuilder, RecordingExtension};

fn setup(pack: &PackageBuilder) -> Arc<LifecycleManager> {
    let log = event_log();
    let factories = FactoryRegistry::new();
    factories.register("echo", move || Box::new(RecordingExtension::new(log.clone())));
    let (services, _, _, _) = test_services();
    Arc::new(LifecycleManager::new(pack.config(), factories, services))
}

#[tokio::test]
async fn values_survive_unload_and_reload() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);
    let manager = setup(&pack);

    let user = Container::user("alice");
    let bind = BindContext::for_user(user.clone());

    let first = manager
        .load("echo", "", Scope::User, &bind)
        .await
        .instance()
        .expect("loaded")
        .clone();
    first.context().nv().set("greeting", "hello").unwrap();
    manager.unload(&first).await;

    // Same extension, same container: the data is still there.
    let second = manager
        .load("echo", "", Scope::User, &bind)
        .await
        .instance()
        .expect("loaded")
        .clone();
    assert_eq!(second.context().nv().get("greeting").unwrap(), "hello");
}

#[tokio::test]
async fn containers_have_isolated_namespaces() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["user"]);
    let manager = setup(&pack);

    let alice = manager
        .load(
            "echo",
            "",
            Scope::User,
            &BindContext::for_user(Container::user("alice")),
        )
        .await
        .instance()
        .expect("loaded")
        .clone();
    let bob = manager
        .load(
            "echo",
            "",
            Scope::User,
            &BindContext::for_user(Container::user("bob")),
        )
        .await
        .instance()
        .expect("loaded")
        .clone();

    alice.context().nv().set("color", "red").unwrap();
    assert!(!bob.context().nv().contains("color").unwrap());
    assert!(matches!(
        bob.context().nv().get("color"),
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn store_contract_through_a_live_instance() {
    let pack = PackageBuilder::new();
    pack.write_simple_package("echo", &["global"]);
    let manager = setup(&pack);

    let instance = manager
        .load("echo", "", Scope::Global, &BindContext::none())
        .await
        .instance()
        .expect("loaded")
        .clone();
    let nv = instance.context().nv().clone();

    nv.set("k", "v").unwrap();
    assert_eq!(nv.get("k").unwrap(), "v");
    assert!(nv.delete("k").unwrap());
    assert!(!nv.contains("k").unwrap());

    nv.set("b", "2").unwrap();
    nv.set("a", "1").unwrap();
    let keys: Vec<String> = nv.keys().unwrap().collect();
    assert_eq!(keys, vec!["a", "b"]);

    assert!(matches!(nv.len(), Err(StoreError::Unsupported("len"))));
}
