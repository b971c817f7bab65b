use super::DescriptionTranslator;
use crate::error::TranslationError;
use crate::graph::Graph;
use crate::model::{
    ActuatingServiceFields, ActuatorFields, FeatureOfInterest, InputParameter,
    InterworkingService, Location, OutputParameter, PlatformInstanceDescription,
    RangeRestriction, ResourceDescription, ResourceKind, SensorFields, ServiceFields,
};
use crate::vocab::{core, mim};
use oxigraph::model::vocab::rdfs;
use oxigraph::model::{NamedNode, NamedNodeRef, Term};

/// Read access to the properties of one subject.
struct Node<'g> {
    graph: &'g Graph,
    iri: NamedNode,
}

impl<'g> Node<'g> {
    fn new(graph: &'g Graph, iri: NamedNode) -> Self {
        Self { graph, iri }
    }

    fn missing(&self, field: &str) -> TranslationError {
        TranslationError::IncompleteDescription {
            field: field.to_string(),
            subject: self.iri.as_str().to_string(),
        }
    }

    /// Lexical values of every literal of `predicate`, unordered.
    fn literals(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<String>, TranslationError> {
        Ok(self
            .graph
            .objects(self.iri.as_ref(), predicate)?
            .into_iter()
            .filter_map(|term| match term {
                Term::Literal(literal) => Some(literal.value().to_string()),
                _ => None,
            })
            .collect())
    }

    /// Values of `predicate` in entry order when the subject carries
    /// positioned entries for it. Graphs without entries give the plain
    /// values, sorted.
    fn texts(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<String>, TranslationError> {
        let mut entries = Vec::new();
        for entry in self.links(core::ENTRY)? {
            let of = self.graph.objects(entry.iri.as_ref(), core::ENTRY_OF)?;
            if !of
                .iter()
                .any(|term| matches!(term, Term::NamedNode(node) if node.as_ref() == predicate))
            {
                continue;
            }
            if let Some(value) = entry.literals(core::VALUE)?.into_iter().next() {
                entries.push((entry.position()?, value));
            }
        }
        if !entries.is_empty() {
            entries.sort_by_key(|(position, _)| *position);
            return Ok(entries.into_iter().map(|(_, value)| value).collect());
        }

        let mut values = self.literals(predicate)?;
        values.sort();
        Ok(values)
    }

    fn text(&self, predicate: NamedNodeRef<'_>) -> Result<Option<String>, TranslationError> {
        Ok(self.texts(predicate)?.into_iter().next())
    }

    fn required_text(&self, predicate: NamedNodeRef<'_>, field: &str) -> Result<String, TranslationError> {
        self.text(predicate)?.ok_or_else(|| self.missing(field))
    }

    fn required_texts(&self, predicate: NamedNodeRef<'_>, field: &str) -> Result<Vec<String>, TranslationError> {
        let values = self.texts(predicate)?;
        if values.is_empty() {
            return Err(self.missing(field));
        }
        Ok(values)
    }

    fn flag(&self, predicate: NamedNodeRef<'_>) -> Result<bool, TranslationError> {
        Ok(matches!(self.text(predicate)?.as_deref(), Some("true") | Some("1")))
    }

    fn number(&self, predicate: NamedNodeRef<'_>, field: &str) -> Result<Option<f64>, TranslationError> {
        match self.text(predicate)? {
            Some(value) => value.parse().map(Some).map_err(|_| self.missing(field)),
            None => Ok(None),
        }
    }

    fn required_number(&self, predicate: NamedNodeRef<'_>, field: &str) -> Result<f64, TranslationError> {
        self.number(predicate, field)?.ok_or_else(|| self.missing(field))
    }

    fn position(&self) -> Result<i64, TranslationError> {
        Ok(self
            .literals(core::POSITION)?
            .into_iter()
            .find_map(|p| p.parse().ok())
            .unwrap_or(i64::MAX))
    }

    /// Named nodes linked through `predicate`, sorted by IRI.
    fn links(&self, predicate: NamedNodeRef<'_>) -> Result<Vec<Node<'g>>, TranslationError> {
        let mut iris: Vec<NamedNode> = self
            .graph
            .objects(self.iri.as_ref(), predicate)?
            .into_iter()
            .filter_map(|term| match term {
                Term::NamedNode(node) => Some(node),
                _ => None,
            })
            .collect();
        iris.sort();
        iris.dedup();
        Ok(iris.into_iter().map(|iri| Node::new(self.graph, iri)).collect())
    }

    fn link(&self, predicate: NamedNodeRef<'_>) -> Result<Option<Node<'g>>, TranslationError> {
        Ok(self.links(predicate)?.into_iter().next())
    }

    fn is_a(&self, class: NamedNodeRef<'_>) -> Result<bool, TranslationError> {
        Ok(self.graph.has_type(self.iri.as_ref(), class)?)
    }
}

/// Resource classes, most specific first. Subjects typed only with one of
/// the abstract classes have no description variant.
const CONCRETE_CLASSES: [NamedNodeRef<'static>; 5] = [
    core::ACTUATING_SERVICE,
    core::SERVICE,
    core::STATIONARY_SENSOR,
    core::MOBILE_SENSOR,
    core::ACTUATOR,
];
const ABSTRACT_CLASSES: [NamedNodeRef<'static>; 2] = [core::RESOURCE, core::SENSOR];

impl DescriptionTranslator {
    /// Platforms described in `graph`, optionally only the one with id `root`.
    pub fn extract_platforms(
        &self,
        graph: &Graph,
        root: Option<&str>,
    ) -> Result<Vec<PlatformInstanceDescription>, TranslationError> {
        let mut platforms = Vec::new();
        for iri in graph.subjects_of_type(mim::PLATFORM)? {
            let node = Node::new(graph, iri);
            let id = node.required_text(core::ID, "id")?;
            if root.is_some_and(|root| root != id) {
                continue;
            }
            platforms.push(read_platform(&node, id)?);
        }
        Ok(platforms)
    }

    /// Every resource described in `graph`, sorted by IRI.
    pub fn extract_resources(&self, graph: &Graph) -> Result<Vec<ResourceDescription>, TranslationError> {
        let mut roots = Vec::new();
        for class in CONCRETE_CLASSES.iter().chain(ABSTRACT_CLASSES.iter()) {
            roots.extend(graph.subjects_of_type(*class)?);
        }
        roots.sort();
        roots.dedup();

        roots
            .into_iter()
            .map(|iri| read_resource(&Node::new(graph, iri)))
            .collect()
    }
}

fn read_platform(node: &Node<'_>, id: String) -> Result<PlatformInstanceDescription, TranslationError> {
    let mut services = Vec::new();
    for service in node.links(mim::HAS_SERVICE)? {
        services.push((
            service.position()?,
            InterworkingService {
                information_model_id: service
                    .required_text(mim::INFORMATION_MODEL_ID, "informationModelId")?,
                url: service.required_text(mim::URL, "url")?,
            },
        ));
    }
    services.sort_by_key(|(position, _)| *position);

    Ok(PlatformInstanceDescription {
        id,
        labels: node.required_texts(rdfs::LABEL, "labels")?,
        comments: node.texts(rdfs::COMMENT)?,
        interworking_services: services.into_iter().map(|(_, s)| s).collect(),
        rdf: None,
        rdf_format: None,
    })
}

fn read_resource(node: &Node<'_>) -> Result<ResourceDescription, TranslationError> {
    let mut variant = None;
    for class in CONCRETE_CLASSES {
        if node.is_a(class)? {
            variant = Some(class);
            break;
        }
    }
    let Some(class) = variant else {
        return Err(TranslationError::UnsupportedVariant(format!(
            "{} has no concrete resource type",
            node.iri.as_str()
        )));
    };

    let kind = if class == core::ACTUATING_SERVICE {
        ResourceKind::ActuatingService(ActuatingServiceFields {
            service: read_service(node)?,
            acts_on: node.text(core::ACTS_ON)?,
            affects: node.texts(core::AFFECTS)?,
        })
    } else if class == core::SERVICE {
        ResourceKind::Service(read_service(node)?)
    } else if class == core::STATIONARY_SENSOR {
        ResourceKind::StationarySensor(read_sensor(node)?)
    } else if class == core::MOBILE_SENSOR {
        ResourceKind::MobileSensor(read_sensor(node)?)
    } else {
        ResourceKind::Actuator(ActuatorFields {
            located_at: read_location(node)?,
            capabilities: node.texts(core::HAS_CAPABILITY)?,
        })
    };

    Ok(ResourceDescription {
        id: node.required_text(core::ID, "id")?,
        labels: node.required_texts(rdfs::LABEL, "labels")?,
        comments: node.texts(rdfs::COMMENT)?,
        interworking_service_url: node
            .required_text(core::INTERWORKING_SERVICE_URL, "interworkingServiceUrl")?,
        kind,
    })
}

fn read_sensor(node: &Node<'_>) -> Result<SensorFields, TranslationError> {
    let feature_of_interest = match node.link(core::HAS_FEATURE_OF_INTEREST)? {
        Some(feature) => Some(FeatureOfInterest {
            name: feature.required_text(rdfs::LABEL, "featureOfInterest.name")?,
            description: feature.text(rdfs::COMMENT)?,
            has_property: feature.texts(core::HAS_PROPERTY)?,
        }),
        None => None,
    };

    Ok(SensorFields {
        located_at: read_location(node)?,
        feature_of_interest,
        observes_property: node.texts(core::OBSERVES_PROPERTY)?,
    })
}

fn read_location(node: &Node<'_>) -> Result<Option<Location>, TranslationError> {
    let Some(location) = node.link(core::LOCATED_AT)? else {
        return Ok(None);
    };
    let name = location.required_text(rdfs::LABEL, "location.name")?;
    let description = location.text(rdfs::COMMENT)?;

    if location.is_a(core::WGS84_LOCATION)? {
        Ok(Some(Location::Wgs84 {
            name,
            description,
            latitude: location.required_number(core::LATITUDE, "location.latitude")?,
            longitude: location.required_number(core::LONGITUDE, "location.longitude")?,
            altitude: location.required_number(core::ALTITUDE, "location.altitude")?,
        }))
    } else if location.is_a(core::WKT_LOCATION)? {
        Ok(Some(Location::Wkt {
            name,
            description,
            value: location.required_text(core::VALUE, "location.value")?,
        }))
    } else if location.is_a(core::SYMBOLIC_LOCATION)? {
        Ok(Some(Location::Symbolic {
            name,
            description,
            value: location.required_text(core::VALUE, "location.value")?,
        }))
    } else {
        Err(TranslationError::UnsupportedVariant(format!(
            "location {} has no known location type",
            location.iri.as_str()
        )))
    }
}

fn read_service(node: &Node<'_>) -> Result<ServiceFields, TranslationError> {
    let mut inputs = Vec::new();
    for input in node.links(core::HAS_INPUT_PARAMETER)? {
        let min = input.number(core::MIN_VALUE, "inputParameter.restriction.min")?;
        let max = input.number(core::MAX_VALUE, "inputParameter.restriction.max")?;
        let parameter = InputParameter {
            name: input.required_text(core::NAME, "inputParameter.name")?,
            mandatory: input.flag(core::MANDATORY)?,
            is_array: input.flag(core::IS_ARRAY)?,
            datatype: input.required_text(core::DATATYPE, "inputParameter.datatype")?,
            restriction: match (min, max) {
                (Some(min), Some(max)) => Some(RangeRestriction { min, max }),
                (Some(_), None) => return Err(input.missing("inputParameter.restriction.max")),
                (None, Some(_)) => return Err(input.missing("inputParameter.restriction.min")),
                (None, None) => None,
            },
        };
        inputs.push((input.position()?, parameter));
    }
    inputs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

    let output_parameter = match node.link(core::HAS_OUTPUT_PARAMETER)? {
        Some(output) => Some(OutputParameter {
            is_array: output.flag(core::IS_ARRAY)?,
            datatype: output.required_text(core::DATATYPE, "outputParameter.datatype")?,
        }),
        None => None,
    };

    Ok(ServiceFields {
        name: node.required_text(core::NAME, "name")?,
        input_parameters: inputs.into_iter().map(|(_, p)| p).collect(),
        output_parameter,
    })
}
