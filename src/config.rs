//! Configuration for schema conventions, tag parsing and preload rendering.
//!
//! Settings are read from `config/lifeline.toml` (optional) and overridden by
//! `LIFELINE__*` environment variables, e.g. `LIFELINE__SCHEMA__PRIMARY_KEY=uid`.

use std::collections::HashMap;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const CONFIG_FILE: &str = "config/lifeline.toml";
const ENV_PREFIX: &str = "LIFELINE";

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct LifelineConfig {
    #[serde(default)]
    pub schema: SchemaConfig,
    #[serde(default)]
    pub tags: TagConfig,
    #[serde(default)]
    pub preload: PreloadConfig,
}

/// Column naming conventions applied when a model does not override them.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SchemaConfig {
    #[serde(default = "default_primary_key")]
    pub primary_key: String,
    #[serde(default = "default_created_key")]
    pub created_key: String,
    #[serde(default = "default_updated_key")]
    pub updated_key: String,
    #[serde(default = "default_deleted_key")]
    pub deleted_key: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TagConfig {
    /// Canonical namespace every parsed property is stored under.
    #[serde(default = "default_tag_name")]
    pub name: String,
    /// Namespaces read from a raw tag, in order.
    #[serde(default = "default_tag_namespaces")]
    pub namespaces: Vec<String>,
    /// Namespaces whose bare value is a column name (`db:"user_name"`).
    #[serde(default = "default_column_namespaces")]
    pub column_namespaces: Vec<String>,
    #[serde(default = "default_key_aliases")]
    pub key_aliases: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
pub struct PreloadConfig {
    #[serde(default)]
    pub dialect: Dialect,
}

/// SQL dialect used to render preload statements.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    #[default]
    Postgres,
    Mysql,
    Sqlite,
}

fn default_primary_key() -> String {
    "id".to_string()
}

fn default_created_key() -> String {
    "created_at".to_string()
}

fn default_updated_key() -> String {
    "updated_at".to_string()
}

fn default_deleted_key() -> String {
    "deleted_at".to_string()
}

fn default_tag_name() -> String {
    "lifeline".to_string()
}

fn default_tag_namespaces() -> Vec<String> {
    vec!["lifeline".to_string(), "ll".to_string(), "db".to_string()]
}

fn default_column_namespaces() -> Vec<String> {
    vec!["db".to_string()]
}

fn default_key_aliases() -> HashMap<String, String> {
    HashMap::from([
        ("col".to_string(), "column".to_string()),
        ("rel".to_string(), "relation".to_string()),
    ])
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            primary_key: default_primary_key(),
            created_key: default_created_key(),
            updated_key: default_updated_key(),
            deleted_key: default_deleted_key(),
        }
    }
}

impl Default for TagConfig {
    fn default() -> Self {
        Self {
            name: default_tag_name(),
            namespaces: default_tag_namespaces(),
            column_namespaces: default_column_namespaces(),
            key_aliases: default_key_aliases(),
        }
    }
}

impl LifelineConfig {
    /// Load the configuration from `config/lifeline.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));

        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // An unreadable file should not hide env overrides.
                if std::path::Path::new(CONFIG_FILE).exists() {
                    log::warn!(
                        "failed to load {}, falling back to env: {}",
                        CONFIG_FILE,
                        err
                    );
                }
                Config::builder()
                    .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        settings.try_deserialize::<LifelineConfig>()
    }
}
