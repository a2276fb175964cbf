//! Configuration loading backed by the `config` crate

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use config::{Config, Environment, File};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

/// Extensions tried, in order, when resolving a named configuration file.
const EXTENSIONS: &[&str] = &["yaml", "yml", "toml", "json"];

/// Builder for [`Settings`].
///
/// Resolves `<name>.<ext>` in each search path in order and loads the first
/// file found, with optional defaults below it and an optional environment
/// overlay above it.
#[derive(Debug)]
pub struct SettingsLoader {
    name: String,
    paths: Vec<PathBuf>,
    env_prefix: Option<String>,
    defaults: Vec<(String, config::Value)>,
}

impl SettingsLoader {
    /// Start a loader for the configuration file `name` (without extension).
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            paths: Vec::new(),
            env_prefix: None,
            defaults: Vec::new(),
        }
    }

    /// Add a directory to search for the configuration file. Directories are
    /// tried in the order they were added; without any, the current directory
    /// is searched.
    pub fn search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.paths.push(dir.into());
        self
    }

    /// Register a fallback value used when the file and environment do not
    /// provide `key`.
    pub fn default_value(mut self, key: impl Into<String>, value: impl Into<config::Value>) -> Self {
        self.defaults.push((key.into(), value.into()));
        self
    }

    /// Overlay environment variables with the given prefix on top of the
    /// file, so `PREFIX_SERVER__PORT=9200` overrides `server.port`. A `.env`
    /// file is honored before the environment is read.
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Resolve and read the configuration.
    pub fn load(self) -> Result<Settings> {
        dotenvy::dotenv().ok();

        let file = self.find_file()?;
        debug!(file = %file.display(), "loading configuration");

        let mut builder = Config::builder();
        for (key, value) in self.defaults {
            builder = builder
                .set_default(key.clone(), value)
                .with_context(|| format!("invalid default for key {key:?}"))?;
        }
        builder = builder.add_source(File::from(file));
        if let Some(prefix) = &self.env_prefix {
            builder = builder.add_source(Environment::with_prefix(prefix).separator("__"));
        }

        let inner = builder
            .build()
            .with_context(|| format!("failed to read configuration {:?}", self.name))?;
        Ok(Settings { inner })
    }

    fn find_file(&self) -> Result<PathBuf> {
        let current = PathBuf::from(".");
        let dirs = if self.paths.is_empty() {
            std::slice::from_ref(&current)
        } else {
            &self.paths[..]
        };
        for dir in dirs {
            for ext in EXTENSIONS {
                let candidate = dir.join(format!("{}.{}", self.name, ext));
                if candidate.is_file() {
                    return Ok(candidate);
                }
            }
        }
        error!(
            name = %self.name,
            paths = ?self.paths,
            "configuration file not found"
        );
        bail!("configuration file {:?} not found", self.name);
    }
}

/// Loaded configuration with typed accessors.
#[derive(Debug, Clone)]
pub struct Settings {
    inner: Config,
}

impl Settings {
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.inner
            .get_string(key)
            .with_context(|| format!("no string value for key {key:?}"))
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.inner
            .get_int(key)
            .with_context(|| format!("no integer value for key {key:?}"))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.inner
            .get_bool(key)
            .with_context(|| format!("no boolean value for key {key:?}"))
    }

    pub fn get_string_array(&self, key: &str) -> Result<Vec<String>> {
        self.inner
            .get::<Vec<String>>(key)
            .with_context(|| format!("no string array for key {key:?}"))
    }

    /// Deserialize the value under `key` into a struct or map.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.inner
            .get::<T>(key)
            .with_context(|| format!("failed to deserialize key {key:?}"))
    }
}
