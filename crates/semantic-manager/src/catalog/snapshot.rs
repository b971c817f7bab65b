use crate::model::{RdfFormat, SchemaModel};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Registered schema models persisted between restarts.
#[derive(Serialize, Deserialize)]
pub struct CatalogSnapshot {
    pub saved_at: String,
    pub models: Vec<StoredModel>,
}

/// Flat form of [`SchemaModel`] for the binary snapshot.
#[derive(Serialize, Deserialize)]
pub struct StoredModel {
    pub id: String,
    pub name: String,
    pub owner: String,
    pub uri: String,
    pub rdf: String,
    pub rdf_format: RdfFormat,
}

impl From<&SchemaModel> for StoredModel {
    fn from(model: &SchemaModel) -> Self {
        Self {
            id: model.id.clone(),
            name: model.name.clone(),
            owner: model.owner.clone(),
            uri: model.uri.clone(),
            rdf: model.rdf.clone(),
            rdf_format: model.rdf_format,
        }
    }
}

impl From<StoredModel> for SchemaModel {
    fn from(stored: StoredModel) -> Self {
        Self {
            id: stored.id,
            name: stored.name,
            owner: stored.owner,
            uri: stored.uri,
            rdf: stored.rdf,
            rdf_format: stored.rdf_format,
        }
    }
}

/// Location of a catalog snapshot on disk.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save<'a>(&self, models: impl IntoIterator<Item = &'a SchemaModel>) -> Result<()> {
        let snapshot = CatalogSnapshot {
            saved_at: chrono::Utc::now().to_rfc3339(),
            models: models.into_iter().map(StoredModel::from).collect(),
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = bincode::serialize(&snapshot)?;
        fs::write(&self.path, data)
            .with_context(|| format!("Failed to write catalog snapshot {:?}", self.path))?;
        info!(path = ?self.path, models = snapshot.models.len(), "Catalog snapshot saved");
        Ok(())
    }

    /// Load the snapshot; a missing file is an empty catalog.
    pub fn load(&self) -> Result<Vec<SchemaModel>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let data = fs::read(&self.path)
            .with_context(|| format!("Failed to read catalog snapshot {:?}", self.path))?;
        let snapshot: CatalogSnapshot = bincode::deserialize(&data)?;
        info!(
            path = ?self.path,
            models = snapshot.models.len(),
            saved_at = %snapshot.saved_at,
            "Catalog snapshot loaded"
        );
        Ok(snapshot.models.into_iter().map(SchemaModel::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_a_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let file = SnapshotFile::new(dir.path().join("nested").join("catalog.bin"));
        assert!(file.load()?.is_empty());

        let model = SchemaModel {
            id: "BIM".to_string(),
            name: "Best information model".to_string(),
            owner: "acme".to_string(),
            uri: "http://example.org/bim".to_string(),
            rdf: "<http://example.org/bim> a <http://www.w3.org/2002/07/owl#Ontology> .".to_string(),
            rdf_format: RdfFormat::Turtle,
        };
        file.save([&model])?;

        assert_eq!(file.load()?, vec![model]);
        Ok(())
    }
}
