//! The domain operations behind every request kind.
//!
//! Each operation answers with a [`ValidationResult`]; failures of any kind
//! become a failed result carrying the error message. A result is successful
//! only when the instance graph produced no constraint violation.

use crate::catalog::{check_model, SchemaCatalog};
use crate::config::Config;
use crate::error::{CatalogError, ServiceError, TranslationError};
use crate::graph::Graph;
use crate::location::{LocationQuery, LocationResolver};
use crate::model::{
    ModelIdRequest, PlatformInstanceDescription, RdfFormat, ResourceDescription,
    ResourceTranslationRequest, ResourceValidationRequest, SchemaModel,
    ScopedResourceTranslationRequest, ValidationResult,
};
use crate::translator::{verify_resource, DescriptionTranslator, LocationBindings};
use crate::validator::{ConstraintValidator, ConstraintViolation};
use oxigraph::model::NamedNode;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Resources translated into one graph, before the verdict is built.
struct ResourceTranslation {
    resources: Vec<ResourceDescription>,
    serialized: String,
    against: String,
    violations: Vec<ConstraintViolation>,
}

pub struct SemanticService {
    catalog: Arc<SchemaCatalog>,
    translator: DescriptionTranslator,
    validator: ConstraintValidator,
    locations: Option<LocationResolver>,
    core_model_id: String,
    platform_model_id: String,
    output_format: RdfFormat,
}

impl SemanticService {
    pub fn new(catalog: Arc<SchemaCatalog>, config: &Config) -> Self {
        Self {
            catalog,
            translator: DescriptionTranslator::new(config.base_iri.clone()),
            validator: ConstraintValidator::new(),
            locations: None,
            core_model_id: config.core_model_id.clone(),
            platform_model_id: config.platform_model_id.clone(),
            output_format: config.output_format,
        }
    }

    /// Share location nodes through the location cache.
    pub fn with_locations(mut self, resolver: LocationResolver) -> Self {
        self.locations = Some(resolver);
        self
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    // Schema models

    pub async fn register_model(&self, model: SchemaModel) -> ValidationResult<SchemaModel> {
        let id = model.id.clone();
        let outcome = self.catalog.register(model).await.map(|entry| {
            ValidationResult::success(format!("Model '{}' registered", id))
                .against(id.clone())
                .with_object(entry.model.clone())
        });
        settle("register model", outcome.map_err(ServiceError::from))
    }

    pub async fn modify_model(&self, model: SchemaModel) -> ValidationResult<SchemaModel> {
        let id = model.id.clone();
        let outcome = self.catalog.modify(model).await.map(|entry| {
            ValidationResult::success(format!("Model '{}' modified", id))
                .against(id.clone())
                .with_object(entry.model.clone())
        });
        settle("modify model", outcome.map_err(ServiceError::from))
    }

    pub async fn delete_model(&self, request: ModelIdRequest) -> ValidationResult<String> {
        settle("delete model", self.try_delete_model(request.id).await)
    }

    async fn try_delete_model(&self, id: String) -> Result<ValidationResult<String>, ServiceError> {
        if id == self.core_model_id || id == self.platform_model_id {
            return Err(ServiceError::Rejected(format!(
                "Built-in model '{}' cannot be deleted",
                id
            )));
        }

        let message = if self.catalog.delete(&id).await? {
            format!("Model '{}' deleted", id)
        } else {
            format!("Model '{}' was not present", id)
        };
        Ok(ValidationResult::success(message).with_object(id))
    }

    /// Check a schema model without registering it.
    pub async fn validate_model(&self, model: SchemaModel) -> ValidationResult<SchemaModel> {
        settle("validate model", self.try_validate_model(model))
    }

    fn try_validate_model(&self, model: SchemaModel) -> Result<ValidationResult<SchemaModel>, ServiceError> {
        check_model(&model)?;
        let graph = Graph::parse(&model.rdf, model.rdf_format)?;
        let problems = self.validator.check_schema(&graph)?;

        let result = if problems.is_empty() {
            ValidationResult::success(format!("Model '{}' is valid", model.id))
        } else {
            ValidationResult::failure(format!(
                "Model '{}' is invalid: {}",
                model.id,
                problems.join("; ")
            ))
        };
        Ok(result.with_model(model.rdf.clone()).with_object(model))
    }

    // Platforms

    /// Validate a platform, either as supplied graph (`rdf` set) or as a
    /// typed description.
    pub async fn validate_platform(
        &self,
        platform: PlatformInstanceDescription,
    ) -> ValidationResult<PlatformInstanceDescription> {
        let outcome = match platform.rdf.clone() {
            Some(rdf) => self.validate_platform_graph(platform, rdf).await,
            None => self.check_platform(platform, false).await,
        };
        settle("validate platform", outcome)
    }

    /// Validate a platform description and return it with its canonical graph.
    pub async fn translate_platform(
        &self,
        platform: PlatformInstanceDescription,
    ) -> ValidationResult<PlatformInstanceDescription> {
        settle("translate platform", self.check_platform(platform, true).await)
    }

    async fn check_platform(
        &self,
        mut platform: PlatformInstanceDescription,
        attach_graph: bool,
    ) -> Result<ValidationResult<PlatformInstanceDescription>, ServiceError> {
        if platform.id.trim().is_empty() {
            platform.id = fresh_id();
        }
        platform.rdf = None;
        platform.rdf_format = None;

        let graph = self.translator.generate_platform(&platform)?;
        let serialized = graph.serialize(self.output_format)?;
        let violations = self.violations(&graph, &[&self.platform_model_id]).await?;
        if !violations.is_empty() {
            return Ok(rejection(&self.platform_model_id, &violations).with_model(serialized));
        }
        self.require_information_models(&platform).await?;

        if attach_graph {
            platform.rdf = Some(serialized.clone());
            platform.rdf_format = Some(self.output_format);
        }
        info!(platform = %platform.id, "Platform validated");
        Ok(
            ValidationResult::success(format!("Platform '{}' is valid", platform.id))
                .with_model(serialized)
                .against(self.platform_model_id.clone())
                .with_object(platform),
        )
    }

    async fn validate_platform_graph(
        &self,
        platform: PlatformInstanceDescription,
        rdf: String,
    ) -> Result<ValidationResult<PlatformInstanceDescription>, ServiceError> {
        let format = platform.rdf_format.unwrap_or(RdfFormat::Turtle);
        let graph = Graph::parse(&rdf, format)?;
        let violations = self.violations(&graph, &[&self.platform_model_id]).await?;
        if !violations.is_empty() {
            return Ok(rejection(&self.platform_model_id, &violations).with_model(rdf));
        }

        let root = Some(platform.id.as_str()).filter(|id| !id.is_empty());
        let Some(mut described) = self
            .translator
            .extract_platforms(&graph, root)?
            .into_iter()
            .next()
        else {
            return Err(ServiceError::Rejected(match root {
                Some(id) => format!("No platform '{}' found in the supplied graph", id),
                None => "No platform found in the supplied graph".to_string(),
            }));
        };
        self.require_information_models(&described).await?;

        described.rdf = Some(rdf.clone());
        described.rdf_format = Some(format);
        Ok(
            ValidationResult::success(format!("Platform '{}' is valid", described.id))
                .with_model(rdf)
                .against(self.platform_model_id.clone())
                .with_object(described),
        )
    }

    /// Every interworking service must name a registered model.
    async fn require_information_models(
        &self,
        platform: &PlatformInstanceDescription,
    ) -> Result<(), ServiceError> {
        let mut missing = Vec::new();
        for service in &platform.interworking_services {
            match self.catalog.resolve_entry(&service.information_model_id).await {
                Ok(_) => {}
                Err(CatalogError::NotFound(id)) => missing.push(id),
                Err(e) => return Err(e.into()),
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Rejected(format!(
                "Platform '{}' references unknown information models: {}",
                platform.id,
                missing.join(", ")
            )))
        }
    }

    // Resources

    /// Validate resources supplied as a graph and read them back.
    pub async fn validate_resources(
        &self,
        request: ResourceValidationRequest,
    ) -> ValidationResult<Vec<ResourceDescription>> {
        settle("validate resources", self.try_validate_resources(request).await)
    }

    async fn try_validate_resources(
        &self,
        request: ResourceValidationRequest,
    ) -> Result<ValidationResult<Vec<ResourceDescription>>, ServiceError> {
        let (against, ids) = self.resource_models(request.information_model_id.as_deref()).await?;
        let graph = Graph::parse(&request.rdf, request.rdf_format)?;
        let violations = self.violations(&graph, ids.as_slice()).await?;
        if !violations.is_empty() {
            return Ok(rejection(&against, &violations).with_model(request.rdf));
        }

        let resources = self.translator.extract_resources(&graph)?;
        debug!(platform = %request.platform_id, resources = resources.len(), "Resources validated");
        Ok(
            ValidationResult::success(format!("{} resource(s) are valid", resources.len()))
                .with_model(request.rdf)
                .against(against)
                .with_object(resources),
        )
    }

    pub async fn translate_resources(
        &self,
        request: ResourceTranslationRequest,
    ) -> ValidationResult<Vec<ResourceDescription>> {
        let outcome = self
            .translate(
                &request.platform_id,
                request.information_model_id.as_deref(),
                request.resources,
            )
            .await
            .map(|translation| verdict(translation, |resources| resources));
        settle("translate resources", outcome)
    }

    /// Like [`Self::translate_resources`], keeping the caller's keys.
    pub async fn translate_scoped_resources(
        &self,
        request: ScopedResourceTranslationRequest,
    ) -> ValidationResult<BTreeMap<String, ResourceDescription>> {
        let (keys, resources): (Vec<String>, Vec<ResourceDescription>) =
            request.resources.into_iter().unzip();
        let outcome = self
            .translate(
                &request.platform_id,
                request.information_model_id.as_deref(),
                resources,
            )
            .await
            .map(|translation| {
                verdict(translation, |resources| {
                    keys.into_iter().zip(resources).collect::<BTreeMap<_, _>>()
                })
            });
        settle("translate scoped resources", outcome)
    }

    async fn translate(
        &self,
        platform_id: &str,
        information_model_id: Option<&str>,
        mut resources: Vec<ResourceDescription>,
    ) -> Result<ResourceTranslation, ServiceError> {
        let (against, ids) = self.resource_models(information_model_id).await?;

        for resource in &mut resources {
            if resource.id.trim().is_empty() {
                resource.id = fresh_id();
            }
        }
        for resource in &resources {
            verify_resource(resource)?;
        }

        let (bindings, minted) = self.bind_locations(platform_id, &resources).await;
        let graph = self.translator.generate_resources(&resources, &bindings)?;
        let violations = self.violations(&graph, ids.as_slice()).await?;

        if violations.is_empty() {
            if let Some(resolver) = &self.locations {
                for (query, node) in &minted {
                    resolver.upsert(query, node).await;
                }
            }
        }

        Ok(ResourceTranslation {
            serialized: graph.serialize(self.output_format)?,
            resources,
            against,
            violations,
        })
    }

    /// Location nodes for every WGS84-located resource. Equal locations
    /// within one request share a node; nodes minted here are returned so
    /// they can be recorded once the request succeeds.
    async fn bind_locations(
        &self,
        platform_id: &str,
        resources: &[ResourceDescription],
    ) -> (LocationBindings, Vec<(LocationQuery, NamedNode)>) {
        let mut bindings = LocationBindings::new();
        let mut known: HashMap<String, NamedNode> = HashMap::new();
        let mut minted = Vec::new();

        for resource in resources {
            let Some(query) = resource
                .kind
                .location()
                .and_then(|location| LocationQuery::for_location(platform_id, location))
            else {
                continue;
            };

            let key = query.key();
            let node = match known.get(&key) {
                Some(node) => node.clone(),
                None => {
                    let cached = match &self.locations {
                        Some(resolver) => resolver.lookup(&query).await,
                        None => None,
                    };
                    let node = match cached {
                        Some(node) => node,
                        None => {
                            let node = self.translator.mint_location_iri();
                            minted.push((query, node.clone()));
                            node
                        }
                    };
                    known.insert(key, node.clone());
                    node
                }
            };
            bindings.insert(resource.id.clone(), node);
        }

        (bindings, minted)
    }

    /// The model resources are validated against, and the schema graphs that
    /// make it up: the core ontology plus the information model, if any.
    async fn resource_models(
        &self,
        information_model_id: Option<&str>,
    ) -> Result<(String, Vec<String>), ServiceError> {
        match information_model_id.filter(|id| !id.is_empty() && *id != self.core_model_id) {
            Some(id) => {
                self.catalog.resolve_entry(id).await?;
                Ok((id.to_string(), vec![self.core_model_id.clone(), id.to_string()]))
            }
            None => Ok((self.core_model_id.clone(), vec![self.core_model_id.clone()])),
        }
    }

    async fn violations<S: AsRef<str>>(
        &self,
        instance: &Graph,
        model_ids: &[S],
    ) -> Result<Vec<ConstraintViolation>, ServiceError> {
        let violations = match model_ids {
            [single] => {
                let entry = self.catalog.resolve_entry(single.as_ref()).await?;
                self.validator.validate(&entry.graph, instance)?
            }
            _ => {
                let ids: Vec<&str> = model_ids.iter().map(|id| id.as_ref()).collect();
                let schema = self.catalog.combined_graph(&ids).await?;
                self.validator.validate(&schema, instance)?
            }
        };
        Ok(violations)
    }
}

fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn rejection<T>(against: &str, violations: &[ConstraintViolation]) -> ValidationResult<T> {
    let details: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
    ValidationResult::failure(format!(
        "Validation against '{}' failed with {} violation(s): {}",
        against,
        violations.len(),
        details.join("; ")
    ))
    .against(against.to_string())
}

fn verdict<T>(
    translation: ResourceTranslation,
    shape: impl FnOnce(Vec<ResourceDescription>) -> T,
) -> ValidationResult<T> {
    let ResourceTranslation {
        resources,
        serialized,
        against,
        violations,
    } = translation;

    if !violations.is_empty() {
        return rejection(&against, &violations).with_model(serialized);
    }
    ValidationResult::success(format!("{} resource(s) translated", resources.len()))
        .with_model(serialized)
        .against(against)
        .with_object(shape(resources))
}

fn settle<T>(
    operation: &str,
    outcome: Result<ValidationResult<T>, ServiceError>,
) -> ValidationResult<T> {
    match outcome {
        Ok(result) => {
            debug!(operation, success = result.success, "Request handled");
            result
        }
        Err(e) => {
            match &e {
                ServiceError::Translation(TranslationError::UnsupportedVariant(_)) => {
                    error!(operation, error = %e, "Description variant has no mapping")
                }
                _ => warn!(operation, error = %e, "Request rejected"),
            }
            ValidationResult::failure(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sources::{BuiltinModels, ModelSource};
    use crate::model::{InterworkingService, Location, ResourceKind, SensorFields};

    fn service() -> SemanticService {
        let catalog = SchemaCatalog::new(vec![
            Arc::new(BuiltinModels::new("CORE", "MIM")) as Arc<dyn ModelSource>
        ]);
        SemanticService::new(Arc::new(catalog), &Config::default())
    }

    fn bim() -> SchemaModel {
        SchemaModel {
            id: "BIM".to_string(),
            name: "Base information model".to_string(),
            owner: "admin".to_string(),
            uri: "http://example.org/bim".to_string(),
            rdf: "<http://example.org/bim> a <http://www.w3.org/2002/07/owl#Ontology> .".to_string(),
            rdf_format: RdfFormat::Turtle,
        }
    }

    fn platform() -> PlatformInstanceDescription {
        PlatformInstanceDescription {
            id: "p1".to_string(),
            labels: vec!["PlatformA".to_string()],
            comments: vec!["demo".to_string()],
            interworking_services: vec![InterworkingService {
                information_model_id: "BIM".to_string(),
                url: "http://x/y".to_string(),
            }],
            rdf: None,
            rdf_format: None,
        }
    }

    fn sensor(id: &str, latitude: f64) -> ResourceDescription {
        ResourceDescription {
            id: id.to_string(),
            labels: vec![format!("Sensor {id}")],
            comments: vec![],
            interworking_service_url: "http://x/y".to_string(),
            kind: ResourceKind::StationarySensor(SensorFields {
                located_at: Some(Location::Wgs84 {
                    name: "Roof".to_string(),
                    description: None,
                    latitude,
                    longitude: 15.97,
                    altitude: 120.0,
                }),
                feature_of_interest: None,
                observes_property: vec!["temperature".to_string()],
            }),
        }
    }

    #[tokio::test]
    async fn platform_with_unknown_model_fails() {
        let result = service().validate_platform(platform()).await;
        assert!(!result.success);
        assert!(result.message.contains("BIM"), "{}", result.message);
    }

    #[tokio::test]
    async fn translated_platform_carries_its_graph() {
        let service = service();
        assert!(service.register_model(bim()).await.success);

        let result = service.translate_platform(platform()).await;
        assert!(result.success, "{}", result.message);
        let described = result.object_description.unwrap();
        assert_eq!(described.rdf_format, Some(RdfFormat::Turtle));

        let again = service.validate_platform(described).await;
        assert!(again.success, "{}", again.message);
        assert_eq!(again.object_description.unwrap().labels, vec!["PlatformA"]);
    }

    #[tokio::test]
    async fn missing_id_is_generated() {
        let service = service();
        service.register_model(bim()).await;
        let mut anonymous = platform();
        anonymous.id.clear();

        let result = service.validate_platform(anonymous).await;
        assert!(result.success, "{}", result.message);
        assert!(!result.object_description.unwrap().id.is_empty());
    }

    #[tokio::test]
    async fn equal_locations_share_one_node() {
        let service = service();
        let result = service
            .translate_resources(ResourceTranslationRequest {
                platform_id: "p1".to_string(),
                information_model_id: None,
                resources: vec![sensor("a", 45.8), sensor("b", 45.8), sensor("c", 10.0)],
            })
            .await;
        assert!(result.success, "{}", result.message);

        let graph = Graph::parse(&result.model_validated.unwrap(), RdfFormat::Turtle).unwrap();
        let locations = graph
            .query("SELECT DISTINCT ?l WHERE { ?r <http://www.symbiote-h2020.eu/ontology/core#locatedAt> ?l }")
            .unwrap();
        assert_eq!(locations.len(), 2);
    }

    #[tokio::test]
    async fn differently_described_locations_stay_apart() {
        let service = service();
        let mut described = sensor("b", 45.8);
        if let ResourceKind::StationarySensor(fields) = &mut described.kind {
            if let Some(Location::Wgs84 { description, .. }) = &mut fields.located_at {
                *description = Some("north corner".to_string());
            }
        }
        let resources = vec![sensor("a", 45.8), described];

        let result = service
            .translate_resources(ResourceTranslationRequest {
                platform_id: "p1".to_string(),
                information_model_id: None,
                resources: resources.clone(),
            })
            .await;
        assert!(result.success, "{}", result.message);

        let graph = Graph::parse(&result.model_validated.unwrap(), RdfFormat::Turtle).unwrap();
        let locations = graph
            .query("SELECT DISTINCT ?l WHERE { ?r <http://www.symbiote-h2020.eu/ontology/core#locatedAt> ?l }")
            .unwrap();
        assert_eq!(locations.len(), 2);
        let extracted = DescriptionTranslator::new("http://example.org/")
            .extract_resources(&graph)
            .unwrap();
        assert_eq!(extracted, resources);
    }

    #[tokio::test]
    async fn scoped_translation_keeps_keys() {
        let service = service();
        let mut resources = BTreeMap::new();
        resources.insert("first".to_string(), sensor("", 1.0));
        resources.insert("second".to_string(), sensor("s2", 2.0));

        let result = service
            .translate_scoped_resources(ScopedResourceTranslationRequest {
                platform_id: "p1".to_string(),
                information_model_id: None,
                resources,
            })
            .await;
        assert!(result.success, "{}", result.message);
        let described = result.object_description.unwrap();
        assert_eq!(described.keys().collect::<Vec<_>>(), vec!["first", "second"]);
        assert!(!described["first"].id.is_empty());
        assert_eq!(described["second"].id, "s2");
    }

    #[tokio::test]
    async fn resource_graph_violations_are_reported() {
        let service = service();
        let rdf = r#"
            @prefix core: <http://www.symbiote-h2020.eu/ontology/core#> .
            @prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
            <http://example.org/resources/x> a core:MobileSensor ;
                rdfs:label "x" ;
                core:interworkingServiceURL "http://x/y" .
        "#;
        let result = service
            .validate_resources(ResourceValidationRequest {
                platform_id: "p1".to_string(),
                information_model_id: None,
                rdf: rdf.to_string(),
                rdf_format: RdfFormat::Turtle,
            })
            .await;
        assert!(!result.success);
        assert!(result.message.contains("core#id"), "{}", result.message);
        assert_eq!(result.model_validated_against.as_deref(), Some("CORE"));
    }

    #[tokio::test]
    async fn model_lifecycle() {
        let service = service();
        assert!(service.validate_model(bim()).await.success);
        assert!(service.register_model(bim()).await.success);
        assert!(!service.register_model(bim()).await.success);
        assert!(service.modify_model(bim()).await.success);

        let deleted = service.delete_model(ModelIdRequest { id: "BIM".to_string() }).await;
        assert!(deleted.success);
        let again = service.delete_model(ModelIdRequest { id: "BIM".to_string() }).await;
        assert!(again.success);
        assert!(again.message.contains("not present"));

        let builtin = service.delete_model(ModelIdRequest { id: "MIM".to_string() }).await;
        assert!(!builtin.success);
    }

    #[tokio::test]
    async fn invalid_schema_model_is_reported() {
        let mut broken = bim();
        broken.rdf = "<http://example.org/a> <http://example.org/b> <http://example.org/c> .".to_string();
        let result = service().validate_model(broken).await;
        assert!(!result.success);
        assert!(result.message.contains("declares no ontology or class"));
    }
}
