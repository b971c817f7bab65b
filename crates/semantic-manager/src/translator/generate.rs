use super::{child, verify_platform, verify_resource, DescriptionTranslator, LocationBindings};
use crate::error::TranslationError;
use crate::graph::Graph;
use crate::model::{
    ActuatingServiceFields, ActuatorFields, FeatureOfInterest, InputParameter, Location,
    OutputParameter, PlatformInstanceDescription, ResourceDescription, ResourceKind, SensorFields,
    ServiceFields,
};
use crate::vocab::{core, mim};
use oxigraph::model::vocab::{rdf, rdfs};
use oxigraph::model::{Literal, NamedNode, NamedNodeRef, Term, Triple};

/// Accumulates the triples of one description.
#[derive(Default)]
struct Triples(Vec<Triple>);

impl Triples {
    fn add(&mut self, subject: &NamedNode, predicate: NamedNodeRef<'_>, object: impl Into<Term>) {
        self.0.push(Triple::new(subject.clone(), predicate, object));
    }

    fn typed(&mut self, subject: &NamedNode, class: NamedNodeRef<'_>) {
        self.add(subject, rdf::TYPE, class.into_owned());
    }

    fn text(&mut self, subject: &NamedNode, predicate: NamedNodeRef<'_>, value: &str) {
        self.add(subject, predicate, Literal::new_simple_literal(value));
    }

    /// One plain triple per value, plus a positioned entry node per value
    /// so that order and repeats survive the round trip through a graph.
    fn texts(&mut self, subject: &NamedNode, predicate: NamedNodeRef<'_>, field: &str, values: &[String]) {
        for (position, value) in values.iter().enumerate() {
            self.text(subject, predicate, value);

            let entry = child(subject, &format!("{}/{}", field, position));
            self.add(subject, core::ENTRY, entry.clone());
            self.add(&entry, core::ENTRY_OF, predicate.into_owned());
            self.add(&entry, core::POSITION, Literal::from(position as i64));
            self.text(&entry, core::VALUE, value);
        }
    }
}

impl DescriptionTranslator {
    /// Triples describing one platform.
    pub fn platform_triples(
        &self,
        platform: &PlatformInstanceDescription,
    ) -> Result<Vec<Triple>, TranslationError> {
        verify_platform(platform)?;
        let node = self.platform_iri(&platform.id)?;
        let mut out = Triples::default();

        out.typed(&node, mim::PLATFORM);
        out.text(&node, core::ID, &platform.id);
        out.texts(&node, rdfs::LABEL, "labels", &platform.labels);
        out.texts(&node, rdfs::COMMENT, "comments", &platform.comments);

        for (position, service) in platform.interworking_services.iter().enumerate() {
            let service_node = child(&node, &format!("services/{}", position));
            out.add(&node, mim::HAS_SERVICE, service_node.clone());
            out.typed(&service_node, mim::INTERWORKING_SERVICE);
            out.text(&service_node, mim::URL, &service.url);
            out.text(&service_node, mim::INFORMATION_MODEL_ID, &service.information_model_id);
            out.add(&service_node, core::POSITION, Literal::from(position as i64));
        }

        Ok(out.0)
    }

    pub fn generate_platform(
        &self,
        platform: &PlatformInstanceDescription,
    ) -> Result<Graph, TranslationError> {
        Ok(Graph::from_triples(self.platform_triples(platform)?)?)
    }

    /// Triples describing one resource.
    pub fn resource_triples(
        &self,
        resource: &ResourceDescription,
        locations: &LocationBindings,
    ) -> Result<Vec<Triple>, TranslationError> {
        verify_resource(resource)?;
        let node = self.resource_iri(&resource.id)?;
        let mut out = Triples::default();

        out.typed(&node, variant_class(&resource.kind));
        out.text(&node, core::ID, &resource.id);
        out.texts(&node, rdfs::LABEL, "labels", &resource.labels);
        out.texts(&node, rdfs::COMMENT, "comments", &resource.comments);
        out.text(&node, core::INTERWORKING_SERVICE_URL, &resource.interworking_service_url);

        let location_node = || {
            locations
                .get(&resource.id)
                .cloned()
                .unwrap_or_else(|| child(&node, "location"))
        };

        match &resource.kind {
            ResourceKind::StationarySensor(sensor) | ResourceKind::MobileSensor(sensor) => {
                sensor_triples(&mut out, &node, sensor, location_node)
            }
            ResourceKind::Service(service) => service_triples(&mut out, &node, service),
            ResourceKind::ActuatingService(actuating) => {
                actuating_service_triples(&mut out, &node, actuating)
            }
            ResourceKind::Actuator(actuator) => {
                actuator_triples(&mut out, &node, actuator, location_node)
            }
        }

        Ok(out.0)
    }

    /// Graph of every resource. All resources are checked before any triple
    /// is produced, so a rejected batch yields no graph at all.
    pub fn generate_resources<'a>(
        &self,
        resources: impl IntoIterator<Item = &'a ResourceDescription> + Clone,
        locations: &LocationBindings,
    ) -> Result<Graph, TranslationError> {
        for resource in resources.clone() {
            verify_resource(resource)?;
        }

        let graph = Graph::new()?;
        for resource in resources {
            graph.extend(self.resource_triples(resource, locations)?)?;
        }
        Ok(graph)
    }
}

fn variant_class(kind: &ResourceKind) -> NamedNodeRef<'static> {
    match kind {
        ResourceKind::StationarySensor(_) => core::STATIONARY_SENSOR,
        ResourceKind::MobileSensor(_) => core::MOBILE_SENSOR,
        ResourceKind::Service(_) => core::SERVICE,
        ResourceKind::ActuatingService(_) => core::ACTUATING_SERVICE,
        ResourceKind::Actuator(_) => core::ACTUATOR,
    }
}

fn sensor_triples(
    out: &mut Triples,
    node: &NamedNode,
    sensor: &SensorFields,
    location_node: impl FnOnce() -> NamedNode,
) {
    if let Some(location) = &sensor.located_at {
        location_triples(out, node, location, location_node());
    }
    if let Some(feature) = &sensor.feature_of_interest {
        feature_triples(out, node, feature);
    }
    out.texts(node, core::OBSERVES_PROPERTY, "observesProperty", &sensor.observes_property);
}

fn service_triples(out: &mut Triples, node: &NamedNode, service: &ServiceFields) {
    out.text(node, core::NAME, &service.name);
    for (position, parameter) in service.input_parameters.iter().enumerate() {
        input_triples(out, node, position, parameter);
    }
    if let Some(output) = &service.output_parameter {
        output_triples(out, node, output);
    }
}

fn actuating_service_triples(out: &mut Triples, node: &NamedNode, actuating: &ActuatingServiceFields) {
    service_triples(out, node, &actuating.service);
    if let Some(acts_on) = &actuating.acts_on {
        out.text(node, core::ACTS_ON, acts_on);
    }
    out.texts(node, core::AFFECTS, "affects", &actuating.affects);
}

fn actuator_triples(
    out: &mut Triples,
    node: &NamedNode,
    actuator: &ActuatorFields,
    location_node: impl FnOnce() -> NamedNode,
) {
    if let Some(location) = &actuator.located_at {
        location_triples(out, node, location, location_node());
    }
    out.texts(node, core::HAS_CAPABILITY, "capabilities", &actuator.capabilities);
}

fn location_triples(out: &mut Triples, owner: &NamedNode, location: &Location, node: NamedNode) {
    out.add(owner, core::LOCATED_AT, node.clone());
    let (class, name, description) = match location {
        Location::Wgs84 {
            name,
            description,
            latitude,
            longitude,
            altitude,
        } => {
            out.add(&node, core::LATITUDE, Literal::from(*latitude));
            out.add(&node, core::LONGITUDE, Literal::from(*longitude));
            out.add(&node, core::ALTITUDE, Literal::from(*altitude));
            (core::WGS84_LOCATION, name, description)
        }
        Location::Wkt {
            name,
            description,
            value,
        } => {
            out.text(&node, core::VALUE, value);
            (core::WKT_LOCATION, name, description)
        }
        Location::Symbolic {
            name,
            description,
            value,
        } => {
            out.text(&node, core::VALUE, value);
            (core::SYMBOLIC_LOCATION, name, description)
        }
    };
    out.typed(&node, class);
    out.text(&node, rdfs::LABEL, name);
    if let Some(description) = description {
        out.text(&node, rdfs::COMMENT, description);
    }
}

fn feature_triples(out: &mut Triples, owner: &NamedNode, feature: &FeatureOfInterest) {
    let node = child(owner, "featureOfInterest");
    out.add(owner, core::HAS_FEATURE_OF_INTEREST, node.clone());
    out.typed(&node, core::FEATURE_OF_INTEREST);
    out.text(&node, rdfs::LABEL, &feature.name);
    if let Some(description) = &feature.description {
        out.text(&node, rdfs::COMMENT, description);
    }
    out.texts(&node, core::HAS_PROPERTY, "hasProperty", &feature.has_property);
}

fn input_triples(out: &mut Triples, owner: &NamedNode, position: usize, parameter: &InputParameter) {
    let node = child(owner, &format!("inputs/{}", position));
    out.add(owner, core::HAS_INPUT_PARAMETER, node.clone());
    out.typed(&node, core::INPUT_PARAMETER);
    out.text(&node, core::NAME, &parameter.name);
    out.add(&node, core::MANDATORY, Literal::from(parameter.mandatory));
    out.add(&node, core::IS_ARRAY, Literal::from(parameter.is_array));
    out.text(&node, core::DATATYPE, &parameter.datatype);
    out.add(&node, core::POSITION, Literal::from(position as i64));
    if let Some(restriction) = &parameter.restriction {
        out.add(&node, core::MIN_VALUE, Literal::from(restriction.min));
        out.add(&node, core::MAX_VALUE, Literal::from(restriction.max));
    }
}

fn output_triples(out: &mut Triples, owner: &NamedNode, output: &OutputParameter) {
    let node = child(owner, "output");
    out.add(owner, core::HAS_OUTPUT_PARAMETER, node.clone());
    out.typed(&node, core::OUTPUT_PARAMETER);
    out.add(&node, core::IS_ARRAY, Literal::from(output.is_array));
    out.text(&node, core::DATATYPE, &output.datatype);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InterworkingService;

    fn translator() -> DescriptionTranslator {
        DescriptionTranslator::new("http://example.org/")
    }

    #[test]
    fn platform_emits_labels_comments_and_services() {
        let platform = PlatformInstanceDescription {
            id: "p1".to_string(),
            labels: vec!["PlatformA".to_string()],
            comments: vec!["demo".to_string()],
            interworking_services: vec![InterworkingService {
                information_model_id: "BIM".to_string(),
                url: "http://x/y".to_string(),
            }],
            rdf: None,
            rdf_format: None,
        };
        let triples = translator().platform_triples(&platform).unwrap();
        let count = |p: NamedNodeRef<'_>| triples.iter().filter(|t| t.predicate == p).count();
        assert_eq!(count(rdfs::LABEL), 1);
        assert_eq!(count(rdfs::COMMENT), 1);
        assert_eq!(count(mim::HAS_SERVICE), 1);
        assert_eq!(count(mim::INFORMATION_MODEL_ID), 1);
    }

    #[test]
    fn one_invalid_resource_blocks_the_whole_batch() {
        let good = ResourceDescription {
            id: "a".to_string(),
            labels: vec!["A".to_string()],
            comments: vec![],
            interworking_service_url: "http://x/y".to_string(),
            kind: ResourceKind::MobileSensor(SensorFields::default()),
        };
        let mut bad = good.clone();
        bad.id = "b".to_string();
        bad.labels.clear();

        let result = translator().generate_resources([&good, &bad], &LocationBindings::new());
        assert!(matches!(result, Err(TranslationError::InvalidArgument(_))));
    }

    #[test]
    fn bound_location_node_is_reused() {
        let resource = ResourceDescription {
            id: "a".to_string(),
            labels: vec!["A".to_string()],
            comments: vec![],
            interworking_service_url: "http://x/y".to_string(),
            kind: ResourceKind::Actuator(ActuatorFields {
                located_at: Some(Location::Symbolic {
                    name: "Lab".to_string(),
                    description: None,
                    value: "room 4".to_string(),
                }),
                capabilities: vec![],
            }),
        };
        let shared = NamedNode::new_unchecked("http://example.org/locations/shared");
        let mut bindings = LocationBindings::new();
        bindings.insert("a".to_string(), shared.clone());

        let triples = translator().resource_triples(&resource, &bindings).unwrap();
        assert!(triples
            .iter()
            .any(|t| t.predicate == core::LOCATED_AT && t.object == Term::from(shared.clone())));
    }
}
