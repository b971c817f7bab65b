use crate::error::GraphError;
use crate::model::RdfFormat;
use oxigraph::io::RdfParser;
use oxigraph::model::*;
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use std::collections::BTreeMap;
use tracing::debug;

/// One row of variable bindings produced by a pattern query.
pub type QueryRow = BTreeMap<String, Term>;

/// An in-memory triple graph.
///
/// All triples live in the default graph of a private oxigraph [`Store`].
/// Graphs are never shared between requests unless wrapped in an `Arc` by
/// the catalog, which only ever reads them.
pub struct Graph {
    store: Store,
}

impl Graph {
    pub fn new() -> Result<Self, GraphError> {
        Ok(Self {
            store: Store::new()?,
        })
    }

    /// Parse a serialized graph. Named graphs in quad formats are flattened
    /// into the default graph.
    pub fn parse(serialized: &str, format: RdfFormat) -> Result<Self, GraphError> {
        let graph = Self::new()?;
        let parser = RdfParser::from_format(format.to_oxigraph());

        for quad_result in parser.for_reader(serialized.as_bytes()) {
            let quad = quad_result.map_err(parse_error)?;
            graph.store.insert(&Quad::new(
                quad.subject,
                quad.predicate,
                quad.object,
                GraphName::DefaultGraph,
            ))?;
        }

        debug!(triples = graph.len()?, format = ?format, "Parsed graph");
        Ok(graph)
    }

    pub fn from_triples(triples: impl IntoIterator<Item = Triple>) -> Result<Self, GraphError> {
        let graph = Self::new()?;
        graph.extend(triples)?;
        Ok(graph)
    }

    pub fn extend(&self, triples: impl IntoIterator<Item = Triple>) -> Result<(), GraphError> {
        for triple in triples {
            self.store.insert(&triple.in_graph(GraphName::DefaultGraph))?;
        }
        Ok(())
    }

    pub fn len(&self) -> Result<usize, GraphError> {
        Ok(self.store.len()?)
    }

    pub fn is_empty(&self) -> Result<bool, GraphError> {
        Ok(self.store.is_empty()?)
    }

    /// Copy every triple of `self` and `other` into a fresh graph.
    pub fn union(&self, other: &Graph) -> Result<Graph, GraphError> {
        let merged = Graph::new()?;
        for source in [self, other] {
            for quad in source.store.iter() {
                merged.store.insert(&quad?)?;
            }
        }
        Ok(merged)
    }

    /// Create a composite view of `self` with `overlay` merged in.
    ///
    /// Neither input is mutated: the view owns a copy of both, so concurrent
    /// validations against the same base graph never observe each other's
    /// overlays. The view must be handed back through
    /// [`TemporaryMerge::release`]; dropping it releases it too.
    pub fn merge_temporary(&self, overlay: &Graph) -> Result<TemporaryMerge, GraphError> {
        let merged = self.union(overlay)?;
        debug!(triples = merged.len()?, "Created temporary merge");
        Ok(TemporaryMerge {
            graph: Some(merged),
        })
    }

    /// Run a SELECT query and collect its solutions.
    pub fn query(&self, sparql: &str) -> Result<Vec<QueryRow>, GraphError> {
        let results = self
            .store
            .query(sparql)
            .map_err(|e| GraphError::QueryExecution(e.to_string()))?;

        match results {
            QueryResults::Solutions(solutions) => {
                let mut rows = Vec::new();
                for solution in solutions {
                    let sol = solution.map_err(|e| GraphError::QueryExecution(e.to_string()))?;
                    let mut row = QueryRow::new();
                    for (variable, value) in sol.iter() {
                        row.insert(variable.as_str().to_string(), value.clone());
                    }
                    rows.push(row);
                }
                Ok(rows)
            }
            _ => Err(GraphError::QueryExecution(
                "Expected a SELECT query".to_string(),
            )),
        }
    }

    /// Values of `predicate` on `subject`.
    pub fn objects(
        &self,
        subject: NamedNodeRef<'_>,
        predicate: NamedNodeRef<'_>,
    ) -> Result<Vec<Term>, GraphError> {
        let mut objects = Vec::new();
        for quad in self.store.quads_for_pattern(
            Some(subject.into()),
            Some(predicate),
            None,
            Some(GraphNameRef::DefaultGraph),
        ) {
            objects.push(quad?.object);
        }
        Ok(objects)
    }

    /// Named subjects declared with `rdf:type class`, sorted by IRI.
    pub fn subjects_of_type(&self, class: NamedNodeRef<'_>) -> Result<Vec<NamedNode>, GraphError> {
        let mut subjects = Vec::new();
        for quad in self.store.quads_for_pattern(
            None,
            Some(vocab::rdf::TYPE),
            Some(class.into()),
            Some(GraphNameRef::DefaultGraph),
        ) {
            if let Subject::NamedNode(node) = quad?.subject {
                subjects.push(node);
            }
        }
        subjects.sort();
        subjects.dedup();
        Ok(subjects)
    }

    pub fn has_type(&self, subject: NamedNodeRef<'_>, class: NamedNodeRef<'_>) -> Result<bool, GraphError> {
        Ok(self.store.contains(QuadRef::new(
            subject,
            vocab::rdf::TYPE,
            class,
            GraphNameRef::DefaultGraph,
        ))?)
    }

    pub fn serialize(&self, format: RdfFormat) -> Result<String, GraphError> {
        let bytes = self
            .store
            .dump_graph_to_writer(GraphNameRef::DefaultGraph, format.to_oxigraph(), Vec::new())
            .map_err(|e| GraphError::Serialization(e.to_string()))?;
        String::from_utf8(bytes).map_err(|e| GraphError::Serialization(e.to_string()))
    }
}

/// A merged view created by [`Graph::merge_temporary`].
pub struct TemporaryMerge {
    graph: Option<Graph>,
}

impl TemporaryMerge {
    pub fn query(&self, sparql: &str) -> Result<Vec<QueryRow>, GraphError> {
        match &self.graph {
            Some(graph) => graph.query(sparql),
            None => Err(GraphError::QueryExecution(
                "Temporary merge already released".to_string(),
            )),
        }
    }

    pub fn release(mut self) {
        self.clear();
    }

    fn clear(&mut self) {
        if let Some(graph) = self.graph.take() {
            if let Err(e) = graph.store.clear() {
                debug!(error = %e, "Failed to clear temporary merge");
            }
            debug!("Released temporary merge");
        }
    }
}

impl Drop for TemporaryMerge {
    fn drop(&mut self) {
        self.clear();
    }
}

fn parse_error(e: oxigraph::io::RdfParseError) -> GraphError {
    match &e {
        oxigraph::io::RdfParseError::Syntax(syntax) => match syntax.location() {
            Some(location) => GraphError::ParseAt {
                line: location.start.line + 1,
                column: location.start.column + 1,
                message: syntax.to_string(),
            },
            None => GraphError::Parse(e.to_string()),
        },
        _ => GraphError::Parse(e.to_string()),
    }
}

/// Readable text of a term: the IRI of a named node, the lexical value of a
/// literal, the N-Triples form of anything else.
pub fn term_text(term: &Term) -> String {
    match term {
        Term::NamedNode(node) => node.as_str().to_string(),
        Term::Literal(literal) => literal.value().to_string(),
        other => other.to_string(),
    }
}
