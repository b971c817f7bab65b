//! Request and reply payloads exchanged over the transport.
//!
//! Every type here is serialized as camelCase JSON. Description types accept
//! `null` for list fields so that structural checks can report a precise
//! message instead of failing at decode time.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Serialization formats accepted for schema and instance graphs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RdfFormat {
    Turtle,
    #[serde(rename = "NTriples", alias = "N-Triples")]
    NTriples,
    #[serde(rename = "RDFXML", alias = "RDF/XML")]
    RdfXml,
    N3,
    NQuads,
    TriG,
}

impl RdfFormat {
    pub fn to_oxigraph(self) -> oxigraph::io::RdfFormat {
        use oxigraph::io::RdfFormat as Ox;
        match self {
            RdfFormat::Turtle => Ox::Turtle,
            RdfFormat::NTriples => Ox::NTriples,
            RdfFormat::RdfXml => Ox::RdfXml,
            RdfFormat::N3 => Ox::N3,
            RdfFormat::NQuads => Ox::NQuads,
            RdfFormat::TriG => Ox::TriG,
        }
    }

    /// Guess a format from a file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ttl" => Some(RdfFormat::Turtle),
            "nt" => Some(RdfFormat::NTriples),
            "rdf" | "owl" | "xml" => Some(RdfFormat::RdfXml),
            "n3" => Some(RdfFormat::N3),
            "nq" => Some(RdfFormat::NQuads),
            "trig" => Some(RdfFormat::TriG),
            _ => None,
        }
    }
}

impl std::str::FromStr for RdfFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "turtle" | "ttl" => Ok(RdfFormat::Turtle),
            "ntriples" | "n-triples" | "nt" => Ok(RdfFormat::NTriples),
            "rdfxml" | "rdf/xml" | "xml" => Ok(RdfFormat::RdfXml),
            "n3" => Ok(RdfFormat::N3),
            "nquads" | "n-quads" | "nq" => Ok(RdfFormat::NQuads),
            "trig" => Ok(RdfFormat::TriG),
            other => Err(format!("Unsupported RDF format: {}", other)),
        }
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A registered schema (platform or meta) model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaModel {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub owner: String,
    pub uri: String,
    pub rdf: String,
    pub rdf_format: RdfFormat,
}

/// Identifies a schema model to delete. Full model payloads decode too.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelIdRequest {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterworkingService {
    #[serde(rename = "modelId", alias = "informationModelId")]
    pub information_model_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformInstanceDescription {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interworking_services: Vec<InterworkingService>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rdf_format: Option<RdfFormat>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Location {
    #[serde(rename = "WGS84Location")]
    Wgs84 {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        latitude: f64,
        longitude: f64,
        altitude: f64,
    },
    #[serde(rename = "WKTLocation")]
    Wkt {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        value: String,
    },
    #[serde(rename = "SymbolicLocation")]
    Symbolic {
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        value: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureOfInterest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_property: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeRestriction {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputParameter {
    pub name: String,
    pub mandatory: bool,
    #[serde(default)]
    pub is_array: bool,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restriction: Option<RangeRestriction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputParameter {
    #[serde(default)]
    pub is_array: bool,
    pub datatype: String,
}

/// Fields carried by both stationary and mobile sensors.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub located_at: Option<Location>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_of_interest: Option<FeatureOfInterest>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub observes_property: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceFields {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub input_parameters: Vec<InputParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_parameter: Option<OutputParameter>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatingServiceFields {
    #[serde(flatten)]
    pub service: ServiceFields,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acts_on: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub affects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuatorFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub located_at: Option<Location>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub capabilities: Vec<String>,
}

/// The closed set of resource kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ResourceKind {
    StationarySensor(SensorFields),
    MobileSensor(SensorFields),
    Service(ServiceFields),
    ActuatingService(ActuatingServiceFields),
    Actuator(ActuatorFields),
}

impl ResourceKind {
    /// The location of the resource, if its kind has one.
    pub fn location(&self) -> Option<&Location> {
        match self {
            ResourceKind::StationarySensor(s) | ResourceKind::MobileSensor(s) => s.located_at.as_ref(),
            ResourceKind::Actuator(a) => a.located_at.as_ref(),
            ResourceKind::Service(_) | ResourceKind::ActuatingService(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescription {
    #[serde(default)]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub comments: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub interworking_service_url: String,
    #[serde(flatten)]
    pub kind: ResourceKind,
}

/// Validate resources supplied as a serialized graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceValidationRequest {
    #[serde(default)]
    pub platform_id: String,
    #[serde(default)]
    pub information_model_id: Option<String>,
    pub rdf: String,
    pub rdf_format: RdfFormat,
}

/// Translate resources supplied as typed descriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceTranslationRequest {
    #[serde(default)]
    pub platform_id: String,
    #[serde(default)]
    pub information_model_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<ResourceDescription>,
}

/// Like [`ResourceTranslationRequest`], with resources keyed by a caller-side id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedResourceTranslationRequest {
    #[serde(default)]
    pub platform_id: String,
    #[serde(default)]
    pub information_model_id: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: BTreeMap<String, ResourceDescription>,
}

/// Outcome of one validation or translation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult<T> {
    pub success: bool,
    pub message: String,
    pub model_validated: Option<String>,
    pub model_validated_against: Option<String>,
    pub object_description: Option<T>,
}

impl<T> ValidationResult<T> {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            model_validated: None,
            model_validated_against: None,
            object_description: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            model_validated: None,
            model_validated_against: None,
            object_description: None,
        }
    }

    pub fn with_model(mut self, graph: impl Into<String>) -> Self {
        self.model_validated = Some(graph.into());
        self
    }

    pub fn against(mut self, model_id: impl Into<String>) -> Self {
        self.model_validated_against = Some(model_id.into());
        self
    }

    pub fn with_object(mut self, object: T) -> Self {
        self.object_description = Some(object);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_kind_is_read_from_tag() {
        let json = r#"{
            "kind": "Service",
            "id": "svc-1",
            "labels": ["Light switch"],
            "interworkingServiceUrl": "http://platform/iw",
            "name": "switch",
            "inputParameters": [{"name": "on", "mandatory": true, "datatype": "xsd:boolean"}]
        }"#;
        let resource: ResourceDescription = serde_json::from_str(json).unwrap();
        match &resource.kind {
            ResourceKind::Service(s) => {
                assert_eq!(s.name, "switch");
                assert_eq!(s.input_parameters.len(), 1);
                assert!(!s.input_parameters[0].is_array);
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(resource.comments.is_empty());
    }

    #[test]
    fn null_labels_decode_as_empty() {
        let json = r#"{"kind": "MobileSensor", "labels": null, "interworkingServiceUrl": null}"#;
        let resource: ResourceDescription = serde_json::from_str(json).unwrap();
        assert!(resource.labels.is_empty());
        assert!(resource.interworking_service_url.is_empty());
    }

    #[test]
    fn platform_services_accept_model_id() {
        let json = r#"{"id": "p1", "labels": ["A"], "interworkingServices": [{"modelId": "BIM", "url": "http://x/y"}]}"#;
        let platform: PlatformInstanceDescription = serde_json::from_str(json).unwrap();
        assert_eq!(platform.interworking_services[0].information_model_id, "BIM");
        assert_eq!(platform.rdf, None);
    }

    #[test]
    fn results_decode_for_descriptions_without_default() {
        let json = r#"{"success": true, "message": "ok", "objectDescription": {"id": "BIM", "uri": "http://example.org/bim", "rdf": "", "rdfFormat": "Turtle"}}"#;
        let result: ValidationResult<SchemaModel> = serde_json::from_str(json).unwrap();
        assert_eq!(result.object_description.unwrap().id, "BIM");
        assert_eq!(result.model_validated, None);

        let failed: ValidationResult<PlatformInstanceDescription> =
            serde_json::from_str(r#"{"success": false, "message": "no"}"#).unwrap();
        assert!(failed.object_description.is_none());
        assert!(failed.model_validated_against.is_none());
    }

    #[test]
    fn format_names_round_trip_through_json() {
        let format: RdfFormat = serde_json::from_str("\"RDFXML\"").unwrap();
        assert_eq!(format, RdfFormat::RdfXml);
        assert_eq!("ttl".parse::<RdfFormat>().unwrap(), RdfFormat::Turtle);
        assert!("jsonld".parse::<RdfFormat>().is_err());
    }
}
