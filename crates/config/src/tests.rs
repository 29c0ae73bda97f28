use crate::{AppConfig, DatabaseConfig};
use figment::Jail;
use secrecy::{ExposeSecret, Secret};

fn load_in_jail() -> Result<AppConfig, figment::Error> {
    AppConfig::load(".").map_err(|e| figment::Error::from(e.to_string()))
}

#[test]
fn test_defaults_without_files() {
    Jail::expect_with(|_jail| {
        let config = load_in_jail()?;
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.name, "nobalcasting");
        assert_eq!(config.migrator.ledger_table, "_schema_migrations");
        assert!(!config.migrator.allow_checksum_drift);
        assert_eq!(config.api.endpoints.len(), 3);
        Ok(())
    });
}

#[test]
fn test_toml_then_db_env_override() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "default.toml",
            r#"
            app_name = "erp-migrate"

            [database]
            host = "10.0.0.5"
            name = "aluminium_erp"
            max_connections = 2

            [migrator]
            lock_timeout_secs = 3
            "#,
        )?;
        jail.set_env("DB_HOST", "db.internal");
        jail.set_env("DB_PORT", "3307");
        jail.set_env("DB_PASSWORD", "s3cret");

        let config = load_in_jail()?;
        assert_eq!(config.database.host, "db.internal");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.name, "aluminium_erp");
        assert_eq!(config.database.max_connections, 2);
        assert_eq!(config.database.password.expose_secret(), "s3cret");
        assert_eq!(config.migrator.lock_timeout_secs, 3);
        Ok(())
    });
}

#[test]
fn test_environment_file_and_prefixed_env() {
    Jail::expect_with(|jail| {
        jail.create_file("default.toml", "[telemetry]\nlog_level = \"info\"\n")?;
        jail.create_file("staging.toml", "[telemetry]\nlog_level = \"debug\"\njson = true\n")?;
        jail.set_env("APP_ENV", "staging");
        jail.set_env("ERP_MIGRATOR__LEDGER_TABLE", "erp_schema_ledger");
        jail.set_env("ERP_API__TOKEN", "abc");

        let config = load_in_jail()?;
        assert_eq!(config.app_env, "staging");
        assert_eq!(config.telemetry.log_level, "debug");
        assert!(config.telemetry.json);
        assert_eq!(config.migrator.ledger_table, "erp_schema_ledger");
        assert_eq!(config.api.token(), Some("abc"));
        Ok(())
    });
}

#[test]
fn test_invalid_ledger_table_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("ERP_MIGRATOR__LEDGER_TABLE", "bad name");
        assert!(AppConfig::load(".").is_err());
        Ok(())
    });
}

#[test]
fn test_config_struct_redaction() {
    let config = DatabaseConfig {
        password: Secret::new("C0digix$309".to_string()),
        ..Default::default()
    };
    let debug_output = format!("{:?}", config);
    assert!(!debug_output.contains("C0digix$309"));
    assert!(debug_output.contains("REDACTED"));
    assert_eq!(config.display_target(), "root@localhost:3306/nobalcasting");
}

#[test]
fn test_single_connection_pool_rejected() {
    Jail::expect_with(|jail| {
        jail.set_env("ERP_DATABASE__MAX_CONNECTIONS", "1");
        let err = AppConfig::load(".").unwrap_err();
        assert!(err.to_string().contains("max_connections"));

        jail.set_env("ERP_DATABASE__MAX_CONNECTIONS", "2");
        assert_eq!(load_in_jail()?.database.max_connections, 2);
        Ok(())
    });
}
