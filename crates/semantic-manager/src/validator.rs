//! Cardinality checking of instance graphs against schema graphs.
//!
//! Schemas declare qualified cardinality restrictions the OWL way:
//!
//! ```text
//! ex:Class rdfs:subClassOf [
//!     a owl:Restriction ;
//!     owl:onProperty ex:prop ;
//!     owl:qualifiedCardinality "1"^^xsd:nonNegativeInteger ;
//!     owl:onClass ex:Type          # or owl:onDataRange xsd:string
//! ] .
//! ```
//!
//! Each combination of restriction kind and value kind is checked by its own
//! pattern query over the schema merged with the instance graph. Every row a
//! query yields is one violation.

use crate::error::GraphError;
use crate::graph::{term_text, Graph, QueryRow};
use std::fmt;
use tracing::debug;

const PREFIXES: &str = r#"
PREFIX rdf: <http://www.w3.org/1999/02/22-rdf-syntax-ns#>
PREFIX rdfs: <http://www.w3.org/2000/01/rdf-schema#>
PREFIX owl: <http://www.w3.org/2002/07/owl#>
PREFIX xsd: <http://www.w3.org/2001/XMLSchema#>
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestrictionKind {
    Exact,
    Minimum,
    Maximum,
}

impl RestrictionKind {
    pub const ALL: [RestrictionKind; 3] = [
        RestrictionKind::Exact,
        RestrictionKind::Minimum,
        RestrictionKind::Maximum,
    ];

    fn predicate(self) -> &'static str {
        match self {
            RestrictionKind::Exact => "owl:qualifiedCardinality",
            RestrictionKind::Minimum => "owl:minQualifiedCardinality",
            RestrictionKind::Maximum => "owl:maxQualifiedCardinality",
        }
    }

    /// HAVING condition that holds when the observed count breaks the restriction.
    fn violated_when(self) -> &'static str {
        match self {
            RestrictionKind::Exact => "COUNT(DISTINCT ?value) != xsd:integer(STR(?cardinality))",
            RestrictionKind::Minimum => "xsd:integer(STR(?cardinality)) > COUNT(DISTINCT ?value)",
            RestrictionKind::Maximum => "xsd:integer(STR(?cardinality)) < COUNT(DISTINCT ?value)",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RestrictionKind::Exact => "exact",
            RestrictionKind::Minimum => "minimum",
            RestrictionKind::Maximum => "maximum",
        }
    }
}

/// Whether restricted values are nodes of a class or typed literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Reference,
    Literal,
}

impl ValueKind {
    pub const ALL: [ValueKind; 2] = [ValueKind::Reference, ValueKind::Literal];

    fn type_predicate(self) -> &'static str {
        match self {
            ValueKind::Reference => "owl:onClass",
            ValueKind::Literal => "owl:onDataRange",
        }
    }

    fn value_pattern(self) -> &'static str {
        match self {
            ValueKind::Reference => {
                "?instance ?property ?value . ?value rdf:type/rdfs:subClassOf* ?type ."
            }
            ValueKind::Literal => {
                "?instance ?property ?value . FILTER(isLiteral(?value) && datatype(?value) = ?type)"
            }
        }
    }

    fn label(self) -> &'static str {
        match self {
            ValueKind::Reference => "object",
            ValueKind::Literal => "datatype",
        }
    }
}

/// The pattern query finding violations of one restriction/value combination.
pub fn restriction_query(restriction: RestrictionKind, value: ValueKind) -> String {
    format!(
        r#"{prefixes}
SELECT ?instance ?class ?property ?cardinality ?type (COUNT(DISTINCT ?value) AS ?observed)
WHERE {{
    ?class rdfs:subClassOf ?restriction .
    ?restriction a owl:Restriction ;
        owl:onProperty ?property ;
        {cardinality} ?cardinality ;
        {type_predicate} ?type .
    ?instance rdf:type/rdfs:subClassOf* ?class .
    OPTIONAL {{ {value_pattern} }}
}}
GROUP BY ?instance ?class ?property ?cardinality ?type
HAVING ({violated})
ORDER BY ?instance ?class ?property"#,
        prefixes = PREFIXES,
        cardinality = restriction.predicate(),
        type_predicate = value.type_predicate(),
        value_pattern = value.value_pattern(),
        violated = restriction.violated_when(),
    )
}

/// One broken cardinality restriction on one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub restriction: RestrictionKind,
    pub value_kind: ValueKind,
    pub instance: String,
    pub class: String,
    pub property: String,
    pub cardinality: String,
    pub value_type: String,
    pub observed: String,
}

impl ConstraintViolation {
    fn from_row(restriction: RestrictionKind, value_kind: ValueKind, row: &QueryRow) -> Self {
        let text = |name: &str| row.get(name).map(term_text).unwrap_or_default();
        Self {
            restriction,
            value_kind,
            instance: text("instance"),
            class: text("class"),
            property: text("property"),
            cardinality: text("cardinality"),
            value_type: text("type"),
            observed: text("observed"),
        }
    }
}

impl fmt::Display for ConstraintViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} cardinality for {} property violated: class: {}, property: {}, cardinality: {}, type: {}, observed: {}, instance: {}",
            self.restriction.label(),
            self.value_kind.label(),
            self.class,
            self.property,
            self.cardinality,
            self.value_type,
            self.observed,
            self.instance,
        )
    }
}

/// Checks instance graphs against the cardinality restrictions of a schema.
#[derive(Debug, Clone, Default)]
pub struct ConstraintValidator;

impl ConstraintValidator {
    pub fn new() -> Self {
        Self
    }

    /// Collect every violation of `schema`'s restrictions by `instance`.
    ///
    /// An empty list is the only success signal. All six queries run even
    /// when earlier ones report violations; the temporary merge is released
    /// on every path.
    pub fn validate(
        &self,
        schema: &Graph,
        instance: &Graph,
    ) -> Result<Vec<ConstraintViolation>, GraphError> {
        let merged = schema.merge_temporary(instance)?;
        let mut violations = Vec::new();

        for restriction in RestrictionKind::ALL {
            for value_kind in ValueKind::ALL {
                let rows = match merged.query(&restriction_query(restriction, value_kind)) {
                    Ok(rows) => rows,
                    Err(e) => {
                        merged.release();
                        return Err(e);
                    }
                };
                violations.extend(
                    rows.iter()
                        .map(|row| ConstraintViolation::from_row(restriction, value_kind, row)),
                );
            }
        }

        merged.release();
        debug!(violations = violations.len(), "Cardinality validation finished");
        Ok(violations)
    }

    /// Structural checks on a schema graph on its own.
    ///
    /// Returns human-readable problems; an empty list means the schema is
    /// usable for validation.
    pub fn check_schema(&self, schema: &Graph) -> Result<Vec<String>, GraphError> {
        let mut problems = Vec::new();

        if schema.is_empty()? {
            problems.push("Schema graph is empty".to_string());
            return Ok(problems);
        }

        let declarations = schema.query(&format!(
            "{PREFIXES} SELECT ?decl WHERE {{ {{ ?decl a owl:Ontology }} UNION {{ ?decl a owl:Class }} UNION {{ ?decl a rdfs:Class }} }} LIMIT 1"
        ))?;
        if declarations.is_empty() {
            problems.push("Schema graph declares no ontology or class".to_string());
        }

        let dangling = schema.query(&format!(
            "{PREFIXES} SELECT ?restriction ?class WHERE {{ ?class rdfs:subClassOf ?restriction . ?restriction a owl:Restriction . FILTER NOT EXISTS {{ ?restriction owl:onProperty ?p }} }}"
        ))?;
        for row in dangling {
            problems.push(format!(
                "Restriction on class {} has no owl:onProperty",
                row.get("class").map(term_text).unwrap_or_default()
            ));
        }

        Ok(problems)
    }
}
