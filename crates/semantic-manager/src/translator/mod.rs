//! Conversion between typed descriptions and canonical graphs.
//!
//! Generation maps platform and resource descriptions to triples of the core
//! ontology and the platform meta model; extraction reads them back. Both
//! directions use the same IRI layout under a configurable base:
//!
//! | node | IRI |
//! |---|---|
//! | platform | `{base}platforms/{id}` |
//! | interworking service | `{platform}/services/{position}` |
//! | resource | `{base}resources/{id}` |
//! | location (unless shared) | `{resource}/location` |
//! | feature of interest | `{resource}/featureOfInterest` |
//! | input parameter | `{resource}/inputs/{position}` |
//! | output parameter | `{resource}/output` |

mod extract;
mod generate;
mod verify;

pub use verify::{verify_platform, verify_resource};

use crate::error::TranslationError;
use oxigraph::model::NamedNode;
use std::collections::HashMap;

/// Location node IRIs to reuse, keyed by resource id.
pub type LocationBindings = HashMap<String, NamedNode>;

#[derive(Debug, Clone)]
pub struct DescriptionTranslator {
    base_iri: String,
}

impl DescriptionTranslator {
    pub fn new(base_iri: impl Into<String>) -> Self {
        let mut base_iri = base_iri.into();
        if !base_iri.ends_with('/') && !base_iri.ends_with('#') {
            base_iri.push('/');
        }
        Self { base_iri }
    }

    pub fn platform_iri(&self, id: &str) -> Result<NamedNode, TranslationError> {
        self.node(&format!("{}platforms/{}", self.base_iri, id), id)
    }

    pub fn resource_iri(&self, id: &str) -> Result<NamedNode, TranslationError> {
        self.node(&format!("{}resources/{}", self.base_iri, id), id)
    }

    /// A fresh IRI for a location node not yet known to the location cache.
    pub fn mint_location_iri(&self) -> NamedNode {
        NamedNode::new_unchecked(format!(
            "{}locations/{}",
            self.base_iri,
            uuid::Uuid::new_v4().simple()
        ))
    }

    fn node(&self, iri: &str, id: &str) -> Result<NamedNode, TranslationError> {
        NamedNode::new(iri).map_err(|e| {
            TranslationError::InvalidArgument(format!(
                "Identifier '{}' cannot be used in an IRI: {}",
                id, e
            ))
        })
    }
}

/// `{parent}/{suffix}` as a named node.
fn child(parent: &NamedNode, suffix: &str) -> NamedNode {
    NamedNode::new_unchecked(format!("{}/{}", parent.as_str(), suffix))
}
