//! Integration tests for configuration loading and service wiring.
//!
//! These tests verify that `strata.toml` files drive the persistence
//! service end to end.

use std::time::Duration;

use pretty_assertions::assert_eq;
use strata::config::{EnvExpander, MapEnvSource};
use strata::prelude::*;
use strata::work::{DEFAULT_TENANT_PROPERTY, Properties};
use tempfile::TempDir;

const CONFIG: &str = r#"
    [persistence]
    unit = "erp"
    default_tenant = "acme"

    [persistence.properties]
    "erp.region" = "eu-west"

    [pool]
    max_connections = 2
    min_idle = 1
    connection_timeout = "250ms"
    idle_timeout = "1m"
    max_lifetime = "1h"

    [[tenants]]
    id = "acme"
    jdbc_driver = "sqlite"
    jdbc_url = "jdbc:sqlite:${DATA_DIR}/acme.db"

    [[tenants]]
    id = "globex"
    jdbc_driver = "sqlite3"
    jdbc_url = "sqlite://${DATA_DIR}/globex.db"
    jdbc_user = "globex"
    jdbc_password = "${GLOBEX_PASSWORD:-changeme}"

    [environments.test.pool]
    max_connections = 1
    connection_timeout = "100ms"

    [environments.test.persistence]
    default_tenant = "globex"
"#;

fn load(dir: &TempDir) -> StrataConfig {
    let env = MapEnvSource::new().set("DATA_DIR", dir.path().display().to_string());
    StrataConfig::from_str_with_env(CONFIG, &EnvExpander::with_source(env)).unwrap()
}

/// Test that tenants and pool settings are read from the file
#[test]
fn test_config_full() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir);

    assert_eq!(config.persistence.unit, "erp");
    assert_eq!(config.tenants.len(), 2);
    assert_eq!(
        config.tenants[0].url(),
        Some(format!("jdbc:sqlite:{}/acme.db", dir.path().display()).as_str())
    );
    assert_eq!(config.tenants[1].jdbc_password.as_deref(), Some("changeme"));
    assert!(config.tenants.iter().all(TenantConfig::is_valid));

    let settings = config.pool_settings().unwrap();
    assert_eq!(settings.max_connections, 2);
    assert_eq!(settings.min_idle, 1);
    assert_eq!(settings.connection_timeout, Duration::from_millis(250));
    assert_eq!(settings.idle_timeout, Some(Duration::from_secs(60)));
    assert_eq!(settings.max_lifetime, Some(Duration::from_secs(3600)));
}

/// Test that environment overrides replace the base values
#[test]
fn test_config_environment() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir).with_environment("test");

    assert_eq!(config.persistence.default_tenant, "globex");
    assert_eq!(config.persistence.unit, "erp");
    assert_eq!(config.pool_settings().unwrap().max_connections, 1);
}

/// Test loading the file from disk
#[test]
fn test_config_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("strata.toml");
    std::fs::write(
        &path,
        r#"
        [[tenants]]
        id = "initech"
        jndi_name = "jdbc/initech"
        "#,
    )
    .unwrap();

    let config = StrataConfig::from_file(&path).unwrap();
    assert_eq!(config.persistence.unit, "default");
    assert_eq!(config.tenants[0].data_source_name(), Some("jdbc/initech"));

    let err = StrataConfig::from_file(dir.path().join("missing.toml")).unwrap_err();
    assert!(matches!(err, StrataError::Io { .. }));
}

/// Test that invalid files are rejected with configuration errors
#[test]
fn test_config_invalid() {
    let err = StrataConfig::from_str("[pool]\nmax_connections = \"many\"").unwrap_err();
    assert!(err.is_config_error());

    let err = StrataConfig::from_str("[[tenants]]\nid = \"acme\"\nschema = \"acme\"").unwrap_err();
    assert!(err.is_config_error());

    let err = StrataConfig::from_str("[[tenants]]\nid = \"acme\"\njdbc_url = \"${MISSING_DB_URL_FOR_TEST}\"")
        .unwrap_err();
    assert!(err.is_config_error());
}

/// Test a service built from the file, including start properties
#[tokio::test]
async fn test_service_from_config() {
    let dir = TempDir::new().unwrap();
    let config = load(&dir);
    let service =
        PersistenceService::from_config(&config, DriverRegistry::new().with(SqliteDriver::new()))
            .unwrap();

    let mut overrides = Properties::new();
    overrides.insert(DEFAULT_TENANT_PROPERTY.to_string(), "globex".to_string());
    service.start(Some(overrides)).unwrap();

    let engine = service.lifecycle().engine().unwrap();
    assert_eq!(engine.property("erp.region"), Some("eu-west"));
    assert_eq!(engine.default_tenant().as_str(), "globex");

    // no tenant bound: the unit routes to the default tenant
    let tenant = service
        .run(async {
            let handle = service.get().await?;
            handle.execute("CREATE TABLE audit (id INTEGER PRIMARY KEY)").await?;
            handle.commit().await?;
            Ok(handle.tenant_id().clone())
        })
        .await
        .unwrap();
    assert_eq!(tenant.as_str(), "globex");
    assert!(dir.path().join("globex.db").exists());
    assert!(!dir.path().join("acme.db").exists());

    // min_idle warms the pool, and the unit's connection came back to it
    let pool = service.router().resolve(&"globex".into()).await.unwrap();
    assert_eq!(pool.settings().max_connections, 2);
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.stats().connections_opened, 1);

    service.stop().unwrap();
    assert!(pool.is_closed());
}
