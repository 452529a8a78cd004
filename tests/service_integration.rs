//! Integration tests for tenant routing and units of work over SQLite.
//!
//! Every tenant gets its own database file in a temporary directory.

use pretty_assertions::assert_eq;
use serde_json::json;
use strata::prelude::*;
use strata::work::ContextId;
use tempfile::TempDir;

fn config_for(dir: &TempDir, tenants: &[&str], auto_begin: bool) -> StrataConfig {
    let mut toml = format!(
        r#"
        [persistence]
        unit = "billing"
        default_tenant = "{}"
        auto_begin = {}

        [pool]
        max_connections = 4
        connection_timeout = "5s"
        "#,
        tenants[0], auto_begin
    );
    for tenant in tenants {
        toml.push_str(&format!(
            r#"
            [[tenants]]
            id = "{tenant}"
            jdbc_driver = "org.sqlite.JDBC"
            jdbc_url = "jdbc:sqlite:{}"
            "#,
            dir.path().join(format!("{tenant}.db")).display()
        ));
    }
    StrataConfig::from_str(&toml).unwrap()
}

fn service(dir: &TempDir, tenants: &[&str]) -> PersistenceService {
    let config = config_for(dir, tenants, true);
    let service =
        PersistenceService::from_config(&config, DriverRegistry::new().with(SqliteDriver::new()))
            .unwrap();
    service.start(None).unwrap();
    service
}

async fn create_schema(service: &PersistenceService, tenant: &str) {
    with_tenant(
        tenant,
        service.run(async {
            let handle = service.get().await?;
            handle
                .execute("CREATE TABLE invoice (id INTEGER PRIMARY KEY, total INTEGER)")
                .await?;
            handle.commit().await
        }),
    )
    .await
    .unwrap();
}

async fn invoice_count(service: &PersistenceService, tenant: &str) -> serde_json::Value {
    let rows = with_tenant(
        tenant,
        service.run(async {
            let handle = service.get().await?;
            handle.query("SELECT COUNT(*) AS n FROM invoice").await
        }),
    )
    .await
    .unwrap();
    rows[0]["n"].clone()
}

/// Test that a known tenant is served and an unknown one is rejected
#[tokio::test]
async fn test_known_and_unknown_tenant() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme"]);

    create_schema(&service, "acme").await;
    with_tenant(
        "acme",
        service.run(async {
            let handle = service.get().await?;
            assert_eq!(handle.tenant_id().as_str(), "acme");
            assert_eq!(handle.unit(), "billing");
            handle.execute("INSERT INTO invoice (total) VALUES (120)").await?;
            handle.commit().await
        }),
    )
    .await
    .unwrap();
    assert_eq!(invoice_count(&service, "acme").await, json!(1));
    assert_eq!(service.router().cached_tenants(), vec!["acme".to_string()]);

    let err = with_tenant("ghost", service.run(async { service.get().await.map(|_| ()) }))
        .await
        .unwrap_err();
    assert!(matches!(err, StrataError::TenantNotFound { ref tenant_id } if tenant_id == "ghost"));
    assert!(err.is_not_found());
    assert!(!service.router().is_cached("ghost"));
    assert_eq!(service.unit_of_work().active_count(), 0);

    service.stop().unwrap();
}

/// Test that each tenant's data lives in its own database
#[tokio::test]
async fn test_tenants_are_isolated() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme", "globex"]);

    create_schema(&service, "acme").await;
    create_schema(&service, "globex").await;

    with_tenant(
        "globex",
        service.run(async {
            let handle = service.get().await?;
            handle.execute("INSERT INTO invoice (total) VALUES (7)").await?;
            handle.execute("INSERT INTO invoice (total) VALUES (8)").await?;
            handle.commit().await
        }),
    )
    .await
    .unwrap();

    assert_eq!(invoice_count(&service, "acme").await, json!(0));
    assert_eq!(invoice_count(&service, "globex").await, json!(2));
    assert_eq!(service.router().pool_count(), 2);
    assert!(dir.path().join("acme.db").exists());
    assert!(dir.path().join("globex.db").exists());

    service.stop().unwrap();
}

/// Test that work left uncommitted is rolled back when the unit ends
#[tokio::test]
async fn test_uncommitted_work_is_rolled_back() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme"]);
    create_schema(&service, "acme").await;

    with_tenant(
        "acme",
        service.run(async {
            let handle = service.get().await?;
            handle.execute("INSERT INTO invoice (total) VALUES (99)").await?;
            Ok(())
        }),
    )
    .await
    .unwrap();

    assert_eq!(invoice_count(&service, "acme").await, json!(0));
    service.stop().unwrap();
}

/// Test begin/get/end on an explicit context
#[tokio::test]
async fn test_begin_get_end() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme"]);

    with_work_context(async {
        let begun = service.begin().await.unwrap();
        assert_eq!(service.get().await.unwrap(), begun);
        assert_eq!(begun.context(), ContextId::current());

        let err = service.begin().await.unwrap_err();
        assert!(matches!(err, StrataError::DoubleBegin { .. }));
        assert_eq!(service.get().await.unwrap(), begun);

        let bound = service
            .transactions()
            .current_connection(service.unit_of_work().resource_key())
            .unwrap();
        assert!(std::sync::Arc::ptr_eq(&bound, &begun.connection().unwrap()));

        service.end().await.unwrap();
        service.end().await.unwrap();
        assert!(!begun.is_open());
        assert!(!service.unit_of_work().is_working());
        assert!(service
            .transactions()
            .current_connection(service.unit_of_work().resource_key())
            .is_none());

        // auto-begin opens a fresh handle on the idle context
        let again = service.get().await.unwrap();
        assert_ne!(again, begun);
        service.end().await.unwrap();
    })
    .await;

    service.stop().unwrap();
}

/// Test that concurrent contexts hold distinct handles
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_contexts() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme"]);
    create_schema(&service, "acme").await;

    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));

    let worker = |total: i64| {
        let service = service.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            service
                .run(async {
                    let handle = service.get().await?;
                    barrier.wait().await;
                    assert_eq!(service.unit_of_work().active_count(), 2);
                    barrier.wait().await;

                    handle
                        .execute(&format!("INSERT INTO invoice (total) VALUES ({total})"))
                        .await?;
                    handle.commit().await?;
                    Ok(handle.id())
                })
                .await
        })
    };

    let a = worker(1);
    let b = worker(2);
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_ne!(a, b);
    assert_eq!(service.unit_of_work().active_count(), 0);
    assert_eq!(invoice_count(&service, "acme").await, json!(2));
    service.stop().unwrap();
}

/// Test that spawned tasks without a scope each get their own unit of work
#[tokio::test]
async fn test_unscoped_tasks_hold_distinct_handles() {
    let dir = TempDir::new().unwrap();
    let service = service(&dir, &["acme"]);
    let barrier = std::sync::Arc::new(tokio::sync::Barrier::new(2));

    let worker = || {
        let service = service.clone();
        let barrier = barrier.clone();
        tokio::spawn(async move {
            let begun = service.begin().await?;
            barrier.wait().await;

            assert_eq!(service.get().await?, begun);
            assert_eq!(service.unit_of_work().active_count(), 2);
            let bound = service
                .transactions()
                .current_connection(service.unit_of_work().resource_key())
                .unwrap();
            assert!(std::sync::Arc::ptr_eq(&bound, &begun.connection().unwrap()));

            barrier.wait().await;
            service.end().await?;
            Ok::<_, StrataError>(begun)
        })
    };

    let a = worker();
    let b = worker();
    let (a, b) = (a.await.unwrap().unwrap(), b.await.unwrap().unwrap());

    assert_ne!(a, b);
    assert_ne!(a.context(), b.context());
    assert_eq!(service.unit_of_work().active_count(), 0);
    service.stop().unwrap();
}

/// Test lifecycle ordering errors
#[tokio::test]
async fn test_lifecycle_ordering() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, &["acme"], true);
    let service =
        PersistenceService::from_config(&config, DriverRegistry::new().with(SqliteDriver::new()))
            .unwrap();

    assert!(matches!(
        service.stop().unwrap_err(),
        StrataError::AlreadyStopped { ref unit } if unit == "billing"
    ));
    let err = with_work_context(service.begin()).await.unwrap_err();
    assert!(matches!(err, StrataError::NotStarted { .. }));

    service.start(None).unwrap();
    assert!(matches!(
        service.start(None).unwrap_err(),
        StrataError::AlreadyStarted { .. }
    ));

    create_schema(&service, "acme").await;
    assert!(service.router().is_cached("acme"));

    service.stop().unwrap();
    assert_eq!(service.router().pool_count(), 0);
    assert!(matches!(
        service.stop().unwrap_err(),
        StrataError::AlreadyStopped { .. }
    ));

    // a stopped unit can be started again
    service.start(None).unwrap();
    assert_eq!(invoice_count(&service, "acme").await, json!(0));
    service.stop().unwrap();
}

/// Test strict mode, where get() does not begin work implicitly
#[tokio::test]
async fn test_strict_mode() {
    let dir = TempDir::new().unwrap();
    let config = config_for(&dir, &["acme"], false);
    let service =
        PersistenceService::from_config(&config, DriverRegistry::new().with(SqliteDriver::new()))
            .unwrap();
    service.start(None).unwrap();

    with_work_context(async {
        let err = service.get().await.unwrap_err();
        assert!(matches!(err, StrataError::NoActiveWork { .. }));

        let handle = service.begin().await.unwrap();
        assert_eq!(service.get().await.unwrap(), handle);
        service.end().await.unwrap();
    })
    .await;

    service.stop().unwrap();
}
