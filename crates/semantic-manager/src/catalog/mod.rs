//! The registry of schema models.
//!
//! A [`SchemaCatalog`] is built once at startup and shared by handle. It
//! loads its bootstrap models lazily: the first caller of any operation runs
//! every [`ModelSource`] exactly once while concurrent callers wait. Reads
//! share a lock; register, modify, delete and initialization are serialized.

pub mod snapshot;
pub mod sources;

use crate::error::CatalogError;
use crate::graph::Graph;
use crate::model::SchemaModel;
use oxigraph::model::NamedNode;
use regex::Regex;
use snapshot::SnapshotFile;
use sources::ModelSource;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// A schema model together with its parsed graph.
pub struct RegisteredModel {
    pub model: SchemaModel,
    pub graph: Graph,
}

impl RegisteredModel {
    fn build(model: SchemaModel) -> Result<Self, CatalogError> {
        check_model(&model)?;
        let graph = Graph::parse(&model.rdf, model.rdf_format)?;
        Ok(Self { model, graph })
    }
}

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.\-]*$").expect("valid regex"))
}

/// Identifier and URI checks shared by register, modify and validate.
pub fn check_model(model: &SchemaModel) -> Result<(), CatalogError> {
    if !id_pattern().is_match(&model.id) {
        return Err(CatalogError::InvalidArgument(format!(
            "Model id '{}' must be non-empty and contain only letters, digits, '_', '-' or '.'",
            model.id
        )));
    }
    NamedNode::new(model.uri.as_str()).map_err(|e| {
        CatalogError::InvalidArgument(format!("Model uri '{}' is not an absolute IRI: {}", model.uri, e))
    })?;
    Ok(())
}

pub struct SchemaCatalog {
    models: RwLock<HashMap<String, Arc<RegisteredModel>>>,
    initialized: OnceCell<()>,
    builtin_ids: OnceLock<HashSet<String>>,
    sources: Vec<Arc<dyn ModelSource>>,
    snapshot: Option<SnapshotFile>,
}

impl SchemaCatalog {
    pub fn new(sources: Vec<Arc<dyn ModelSource>>) -> Self {
        Self {
            models: RwLock::new(HashMap::new()),
            initialized: OnceCell::new(),
            builtin_ids: OnceLock::new(),
            sources,
            snapshot: None,
        }
    }

    /// Persist the catalog to `snapshot` after every mutation.
    pub fn with_snapshot(mut self, snapshot: SnapshotFile) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Run the bootstrap sources unless that already happened.
    ///
    /// A failing source fails initialization; the next caller retries.
    /// Built-in models are never replaced by a later source.
    pub async fn initialize(&self) -> Result<(), CatalogError> {
        self.initialized
            .get_or_try_init(|| async {
                let mut models = self.models.write().await;
                let mut builtin = HashSet::new();
                for source in &self.sources {
                    let loaded = source.load().await.map_err(|e| {
                        CatalogError::Bootstrap(format!("source '{}': {:#}", source.name(), e))
                    })?;
                    for model in loaded {
                        let id = model.id.clone();
                        if !source.is_builtin() && builtin.contains(&id) {
                            warn!(model = %id, source = source.name(), "Ignoring override of built-in model");
                            continue;
                        }
                        match RegisteredModel::build(model) {
                            Ok(entry) => {
                                if source.is_builtin() {
                                    builtin.insert(id.clone());
                                }
                                if models.insert(id.clone(), Arc::new(entry)).is_some() {
                                    debug!(model = %id, source = source.name(), "Bootstrap model overrides earlier entry");
                                }
                            }
                            Err(e) => {
                                warn!(model = %id, source = source.name(), error = %e, "Skipping bootstrap model")
                            }
                        }
                    }
                }
                info!(models = models.len(), builtin = builtin.len(), "Schema catalog initialized");
                let _ = self.builtin_ids.set(builtin);
                Ok::<(), CatalogError>(())
            })
            .await
            .map(|_| ())
    }

    pub async fn register(&self, model: SchemaModel) -> Result<Arc<RegisteredModel>, CatalogError> {
        self.initialize().await?;
        let mut models = self.models.write().await;
        if models.contains_key(&model.id) {
            return Err(CatalogError::DuplicateModel(model.id));
        }

        let entry = Arc::new(RegisteredModel::build(model)?);
        models.insert(entry.model.id.clone(), Arc::clone(&entry));
        info!(model = %entry.model.id, owner = %entry.model.owner, "Schema model registered");
        self.persist(&models);
        Ok(entry)
    }

    pub async fn modify(&self, model: SchemaModel) -> Result<Arc<RegisteredModel>, CatalogError> {
        self.initialize().await?;
        let mut models = self.models.write().await;
        if !models.contains_key(&model.id) {
            return Err(CatalogError::NotFound(model.id));
        }

        let entry = Arc::new(RegisteredModel::build(model)?);
        models.insert(entry.model.id.clone(), Arc::clone(&entry));
        info!(model = %entry.model.id, "Schema model modified");
        self.persist(&models);
        Ok(entry)
    }

    /// Remove a model. Returns whether it was present; absence is not an error.
    pub async fn delete(&self, id: &str) -> Result<bool, CatalogError> {
        self.initialize().await?;
        let mut models = self.models.write().await;
        let removed = models.remove(id).is_some();
        if removed {
            info!(model = %id, "Schema model deleted");
            self.persist(&models);
        } else {
            debug!(model = %id, "Delete of absent schema model ignored");
        }
        Ok(removed)
    }

    pub async fn resolve(&self, id: &str) -> Result<SchemaModel, CatalogError> {
        Ok(self.resolve_entry(id).await?.model.clone())
    }

    /// The model and its parsed graph.
    pub async fn resolve_entry(&self, id: &str) -> Result<Arc<RegisteredModel>, CatalogError> {
        self.initialize().await?;
        self.models
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))
    }

    /// Ids of every registered model, sorted.
    pub async fn model_ids(&self) -> Result<Vec<String>, CatalogError> {
        self.initialize().await?;
        let mut ids: Vec<String> = self.models.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Union of the graphs of `ids`, in order.
    pub async fn combined_graph(&self, ids: &[&str]) -> Result<Graph, CatalogError> {
        let mut combined = Graph::new()?;
        for id in ids {
            let entry = self.resolve_entry(id).await?;
            combined = combined.union(&entry.graph).map_err(CatalogError::from)?;
        }
        Ok(combined)
    }

    /// Whether `id` was supplied by a built-in source.
    pub fn is_builtin(&self, id: &str) -> bool {
        self.builtin_ids.get().is_some_and(|ids| ids.contains(id))
    }

    /// Write every registered model except the built-in ones.
    fn persist(&self, models: &HashMap<String, Arc<RegisteredModel>>) {
        if let Some(snapshot) = &self.snapshot {
            let mut sorted: Vec<&SchemaModel> = models
                .values()
                .map(|e| &e.model)
                .filter(|model| !self.is_builtin(&model.id))
                .collect();
            sorted.sort_by(|a, b| a.id.cmp(&b.id));
            if let Err(e) = snapshot.save(sorted) {
                warn!(path = ?snapshot.path(), error = %e, "Failed to save catalog snapshot");
            }
        }
    }
}
