//! Process configuration.
//!
//! Loaded once at startup: code defaults, then the JSON file named by
//! `SEMANTIC_CONFIG` (if set), then individual `SEMANTIC_*` environment
//! overrides. The result is validated before anything is wired up.

use crate::error::ConfigError;
use crate::model::RdfFormat;
use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

pub const CONFIG_FILE_VAR: &str = "SEMANTIC_CONFIG";

/// Routing key of every request kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoutingKeys {
    pub register_model: String,
    pub modify_model: String,
    pub delete_model: String,
    pub validate_model: String,
    pub validate_platform: String,
    pub translate_platform: String,
    pub validate_resources: String,
    pub translate_resources: String,
    pub translate_scoped_resources: String,
    pub location_lookup: String,
    pub location_upsert: String,
}

impl Default for RoutingKeys {
    fn default() -> Self {
        Self {
            register_model: "model.register".to_string(),
            modify_model: "model.modify".to_string(),
            delete_model: "model.delete".to_string(),
            validate_model: "model.validate".to_string(),
            validate_platform: "platform.validate".to_string(),
            translate_platform: "platform.translate".to_string(),
            validate_resources: "resource.validate".to_string(),
            translate_resources: "resource.translate".to_string(),
            translate_scoped_resources: "resource.translate.scoped".to_string(),
            location_lookup: "location.lookup".to_string(),
            location_upsert: "location.upsert".to_string(),
        }
    }
}

impl RoutingKeys {
    /// `(request kind, routing key)` pairs.
    pub fn all(&self) -> [(&'static str, &str); 11] {
        [
            ("registerModel", self.register_model.as_str()),
            ("modifyModel", self.modify_model.as_str()),
            ("deleteModel", self.delete_model.as_str()),
            ("validateModel", self.validate_model.as_str()),
            ("validatePlatform", self.validate_platform.as_str()),
            ("translatePlatform", self.translate_platform.as_str()),
            ("validateResources", self.validate_resources.as_str()),
            ("translateResources", self.translate_resources.as_str()),
            ("translateScopedResources", self.translate_scoped_resources.as_str()),
            ("locationLookup", self.location_lookup.as_str()),
            ("locationUpsert", self.location_upsert.as_str()),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub exchange: String,
    pub routing_keys: RoutingKeys,
    pub rpc_timeout_ms: u64,
    /// Namespace under which instance nodes are minted.
    pub base_iri: String,
    pub core_model_id: String,
    pub platform_model_id: String,
    pub output_format: RdfFormat,
    pub ontology_dir: Option<PathBuf>,
    pub catalog_snapshot: Option<PathBuf>,
    /// Answer location lookups from an in-process cache.
    pub serve_location_cache: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exchange: "semantic".to_string(),
            routing_keys: RoutingKeys::default(),
            rpc_timeout_ms: 20_000,
            base_iri: "http://www.symbiote-h2020.eu/ontology/instances/".to_string(),
            core_model_id: "CORE".to_string(),
            platform_model_id: "MIM".to_string(),
            output_format: RdfFormat::Turtle,
            ontology_dir: None,
            catalog_snapshot: None,
            serve_location_cache: true,
        }
    }
}

impl Config {
    /// Load from the process environment and validate.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(|name| std::env::var(name).ok())
    }

    /// Load using `var` to read environment variables.
    pub fn load(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match var(CONFIG_FILE_VAR) {
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
                    path: path.clone(),
                    source,
                })?;
                serde_json::from_str(&text)?
            }
            None => Config::default(),
        };

        config.apply_overrides(&var)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides(&mut self, var: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(exchange) = var("SEMANTIC_EXCHANGE") {
            self.exchange = exchange;
        }
        if let Some(timeout) = var("SEMANTIC_RPC_TIMEOUT_MS") {
            self.rpc_timeout_ms = timeout.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("SEMANTIC_RPC_TIMEOUT_MS is not a number: {}", timeout))
            })?;
        }
        if let Some(base) = var("SEMANTIC_BASE_IRI") {
            self.base_iri = base;
        }
        if let Some(dir) = var("SEMANTIC_ONTOLOGY_DIR") {
            self.ontology_dir = Some(PathBuf::from(dir));
        }
        if let Some(path) = var("SEMANTIC_CATALOG_SNAPSHOT") {
            self.catalog_snapshot = Some(PathBuf::from(path));
        }
        if let Some(format) = var("SEMANTIC_OUTPUT_FORMAT") {
            self.output_format = format.parse().map_err(ConfigError::Invalid)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.exchange.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange must not be empty".to_string()));
        }
        if self.rpc_timeout_ms == 0 {
            return Err(ConfigError::Invalid("rpcTimeoutMs must be positive".to_string()));
        }
        if self.core_model_id.is_empty() || self.platform_model_id.is_empty() {
            return Err(ConfigError::Invalid("model ids must not be empty".to_string()));
        }
        NamedNode::new(self.base_iri.as_str()).map_err(|e| {
            ConfigError::Invalid(format!("baseIri '{}' is not an absolute IRI: {}", self.base_iri, e))
        })?;

        let mut seen = HashSet::new();
        for (kind, key) in self.routing_keys.all() {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("routing key for {} is empty", kind)));
            }
            if !seen.insert(key) {
                return Err(ConfigError::Invalid(format!(
                    "routing key '{}' is used by more than one request kind",
                    key
                )));
            }
        }
        Ok(())
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    /// The durable queue serving `routing_key`.
    pub fn queue_name(&self, routing_key: &str) -> String {
        format!("{}.{}", self.exchange, routing_key)
    }
}
