use crate::catalog::snapshot::SnapshotFile;
use crate::model::{RdfFormat, SchemaModel};
use crate::vocab;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Supplies schema models when the catalog initializes.
#[async_trait]
pub trait ModelSource: Send + Sync {
    fn name(&self) -> &str;

    /// Models compiled into the binary. They are never snapshotted or
    /// replaced by a later source.
    fn is_builtin(&self) -> bool {
        false
    }

    async fn load(&self) -> Result<Vec<SchemaModel>>;
}

/// The core resource ontology and the platform meta model compiled into the binary.
pub struct BuiltinModels {
    core_id: String,
    platform_id: String,
}

impl BuiltinModels {
    pub fn new(core_id: impl Into<String>, platform_id: impl Into<String>) -> Self {
        Self {
            core_id: core_id.into(),
            platform_id: platform_id.into(),
        }
    }
}

#[async_trait]
impl ModelSource for BuiltinModels {
    fn name(&self) -> &str {
        "builtin"
    }

    fn is_builtin(&self) -> bool {
        true
    }

    async fn load(&self) -> Result<Vec<SchemaModel>> {
        Ok(vec![
            SchemaModel {
                id: self.core_id.clone(),
                name: "Core resource ontology".to_string(),
                owner: "system".to_string(),
                uri: "http://www.symbiote-h2020.eu/ontology/core".to_string(),
                rdf: vocab::CORE_ONTOLOGY.to_string(),
                rdf_format: RdfFormat::Turtle,
            },
            SchemaModel {
                id: self.platform_id.clone(),
                name: "Platform meta model".to_string(),
                owner: "system".to_string(),
                uri: "http://www.symbiote-h2020.eu/ontology/meta".to_string(),
                rdf: vocab::META_ONTOLOGY.to_string(),
                rdf_format: RdfFormat::Turtle,
            },
        ])
    }
}

/// Every ontology file of a directory, one schema model per file.
///
/// The file stem becomes the model id and the extension picks the format.
/// Unreadable files are logged and skipped.
pub struct OntologyDirectory {
    dir: PathBuf,
}

impl OntologyDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load_file(path: &Path, format: RdfFormat) -> Result<SchemaModel> {
        let id = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Ontology file name is not valid UTF-8")?
            .to_string();
        let rdf = fs::read_to_string(path)
            .with_context(|| format!("Failed to read ontology: {:?}", path))?;
        let canonical = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        Ok(SchemaModel {
            name: id.clone(),
            owner: "system".to_string(),
            uri: format!("file://{}", canonical.display()),
            id,
            rdf,
            rdf_format: format,
        })
    }
}

#[async_trait]
impl ModelSource for OntologyDirectory {
    fn name(&self) -> &str {
        "ontology-directory"
    }

    async fn load(&self) -> Result<Vec<SchemaModel>> {
        let mut models = Vec::new();

        if !self.dir.exists() {
            warn!(dir = ?self.dir, "Ontology directory not found");
            return Ok(models);
        }

        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file())
            .collect();
        paths.sort();

        for path in paths {
            let Some(format) = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(RdfFormat::from_extension)
            else {
                continue;
            };

            match Self::load_file(&path, format) {
                Ok(model) => {
                    info!(model = %model.id, path = ?path, "Loaded ontology");
                    models.push(model);
                }
                Err(e) => warn!(path = ?path, error = %e, "Failed to load ontology"),
            }
        }

        Ok(models)
    }
}

#[async_trait]
impl ModelSource for SnapshotFile {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn load(&self) -> Result<Vec<SchemaModel>> {
        SnapshotFile::load(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builtin_models_use_configured_ids() -> Result<()> {
        let models = BuiltinModels::new("CORE", "MIM").load().await?;
        let ids: Vec<&str> = models.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["CORE", "MIM"]);
        Ok(())
    }

    #[tokio::test]
    async fn directory_loads_known_extensions_only() -> Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(
            dir.path().join("bim.ttl"),
            "<http://example.org/bim> a <http://www.w3.org/2002/07/owl#Ontology> .",
        )?;
        fs::write(dir.path().join("notes.txt"), "not an ontology")?;

        let models = OntologyDirectory::new(dir.path()).load().await?;
        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "bim");
        assert_eq!(models[0].rdf_format, RdfFormat::Turtle);
        Ok(())
    }

    #[tokio::test]
    async fn missing_directory_is_empty() -> Result<()> {
        let models = OntologyDirectory::new("/nonexistent/ontologies").load().await?;
        assert!(models.is_empty());
        Ok(())
    }
}
