//! Server settings.
//!
//! Read from an optional TOML file (`stockroom.toml`, or the path in
//! `STOCKROOM_CONFIG`) overlaid with `STOCKROOM__*` environment variables,
//! e.g. `STOCKROOM__DB__URL` or `STOCKROOM__BACKUP__RETENTION`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use stockroom_auth::AuthConfig;
use stockroom_db::DbConfig;
use stockroom_service::BackupConfig;

const DEFAULT_CONFIG_FILE: &str = "stockroom";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub db: DbConfig,
    pub auth: AuthConfig,
    pub backup: BackupConfig,
    /// Password for the reserved `admin` account, used only when that
    /// account has to be created.
    pub admin_password: Option<String>,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var("STOCKROOM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.into());

        Config::builder()
            .add_source(File::with_name(&file).required(false))
            .add_source(
                Environment::with_prefix("STOCKROOM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use stockroom_core::models::role::Role;
    use stockroom_service::BackupSchedule;

    fn parse(toml: &str) -> AppConfig {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn empty_file_yields_defaults() {
        let config = parse("");
        assert_eq!(config.db.namespace, "stockroom");
        assert_eq!(config.auth.access_token_lifetime_secs, 3600);
        assert_eq!(config.backup.retention, 10);
        assert_eq!(config.backup.schedule, BackupSchedule::Disabled);
        assert!(config.admin_password.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = parse(
            r#"
            admin_password = "s3cret"

            [db]
            url = "ws://db:8000"

            [auth]
            default_role = "moderator"

            [backup]
            dir = "/var/lib/stockroom/backups"
            retention = 3

            [backup.schedule]
            frequency = "daily"
            hour = 2
            minute = 30
            "#,
        );
        assert_eq!(config.admin_password.as_deref(), Some("s3cret"));
        assert_eq!(config.db.url, "ws://db:8000");
        assert_eq!(config.db.database, "main");
        assert_eq!(config.auth.default_role, Role::Moderator);
        assert_eq!(config.backup.retention, 3);
        assert_eq!(
            config.backup.schedule,
            BackupSchedule::Daily { hour: 2, minute: 30 }
        );
    }
}
