//! Shared location nodes.
//!
//! Resources of one platform placed at the same named and described WGS84
//! coordinates share a single location node. The [`LocationResolver`] asks the location
//! cache for the node over RPC and records newly minted nodes with a
//! fire-and-forget upsert. [`LocationCache`] is an in-process implementation of the cache
//! side of that protocol.

use crate::model::Location;
use crate::rpc::RpcGateway;
use dashmap::DashMap;
use oxigraph::model::NamedNode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationQuery {
    pub scope: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl LocationQuery {
    /// The lookup for `location` within `scope`, if it has coordinates.
    pub fn for_location(scope: &str, location: &Location) -> Option<Self> {
        match location {
            Location::Wgs84 {
                name,
                description,
                latitude,
                longitude,
                altitude,
            } => Some(Self {
                scope: scope.to_string(),
                name: name.clone(),
                description: description.clone(),
                latitude: *latitude,
                longitude: *longitude,
                altitude: *altitude,
            }),
            Location::Wkt { .. } | Location::Symbolic { .. } => None,
        }
    }

    /// Identity of the named coordinates within their scope. A location
    /// node carries one description, so differing descriptions never share.
    pub fn key(&self) -> String {
        format!(
            "{}|{}|{}|{:x}|{:x}|{:x}",
            self.scope,
            self.name,
            serde_json::to_string(&self.description).unwrap_or_default(),
            self.latitude.to_bits(),
            self.longitude.to_bits(),
            self.altitude.to_bits()
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationLookupReply {
    #[serde(default)]
    pub location_iri: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationUpsert {
    #[serde(flatten)]
    pub query: LocationQuery,
    pub location_iri: String,
}

/// Client side of the location cache.
pub struct LocationResolver {
    rpc: Arc<RpcGateway>,
    lookup_key: String,
    upsert_key: String,
}

impl LocationResolver {
    pub fn new(rpc: Arc<RpcGateway>, lookup_key: impl Into<String>, upsert_key: impl Into<String>) -> Self {
        Self {
            rpc,
            lookup_key: lookup_key.into(),
            upsert_key: upsert_key.into(),
        }
    }

    /// The cached node for `query`. Timeouts, transport failures and
    /// malformed replies all count as a miss.
    pub async fn lookup(&self, query: &LocationQuery) -> Option<NamedNode> {
        let reply: LocationLookupReply = match self.rpc.call_json(&self.lookup_key, query).await {
            Ok(Some(reply)) => reply,
            Ok(None) => {
                debug!(scope = %query.scope, "Location lookup timed out");
                return None;
            }
            Err(e) => {
                warn!(scope = %query.scope, error = %e, "Location lookup failed");
                return None;
            }
        };

        let iri = reply.location_iri?;
        match NamedNode::new(iri.as_str()) {
            Ok(node) => Some(node),
            Err(e) => {
                warn!(iri = %iri, error = %e, "Location cache returned an invalid IRI");
                None
            }
        }
    }

    pub async fn upsert(&self, query: &LocationQuery, node: &NamedNode) {
        let upsert = LocationUpsert {
            query: query.clone(),
            location_iri: node.as_str().to_string(),
        };
        if let Err(e) = self.rpc.notify(&self.upsert_key, &upsert).await {
            warn!(scope = %query.scope, error = %e, "Failed to publish location upsert");
        }
    }
}

/// In-process location cache keyed by scope, name, description and coordinates.
#[derive(Default)]
pub struct LocationCache {
    entries: DashMap<String, String>,
}

impl LocationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lookup(&self, query: &LocationQuery) -> LocationLookupReply {
        LocationLookupReply {
            location_iri: self.entries.get(&query.key()).map(|e| e.value().clone()),
        }
    }

    pub fn upsert(&self, upsert: LocationUpsert) {
        debug!(scope = %upsert.query.scope, iri = %upsert.location_iri, "Location cached");
        self.entries.insert(upsert.query.key(), upsert.location_iri);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(scope: &str) -> LocationQuery {
        LocationQuery {
            scope: scope.to_string(),
            name: "Roof".to_string(),
            description: None,
            latitude: 45.8,
            longitude: 15.97,
            altitude: 120.0,
        }
    }

    #[test]
    fn cache_is_scoped() {
        let cache = LocationCache::new();
        cache.upsert(LocationUpsert {
            query: query("p1"),
            location_iri: "http://example.org/locations/a".to_string(),
        });

        assert_eq!(
            cache.lookup(&query("p1")).location_iri.as_deref(),
            Some("http://example.org/locations/a")
        );
        assert_eq!(cache.lookup(&query("p2")).location_iri, None);
    }

    #[test]
    fn description_is_part_of_the_key() {
        let mut described = query("p1");
        described.description = Some("north corner".to_string());
        assert_ne!(described.key(), query("p1").key());

        // a name containing the separator cannot pose as a description
        let mut tricky = query("p1");
        tricky.name = "Roof|null".to_string();
        assert_ne!(tricky.key(), query("p1").key());
    }

    #[test]
    fn only_wgs84_locations_are_looked_up() {
        let symbolic = Location::Symbolic {
            name: "Lab".to_string(),
            description: None,
            value: "room 4".to_string(),
        };
        assert!(LocationQuery::for_location("p1", &symbolic).is_none());

        let wgs84 = Location::Wgs84 {
            name: "Roof".to_string(),
            description: None,
            latitude: 1.0,
            longitude: 2.0,
            altitude: 3.0,
        };
        assert_eq!(LocationQuery::for_location("p1", &wgs84).unwrap().latitude, 1.0);
    }

    #[test]
    fn upsert_payload_is_flat() {
        let upsert = LocationUpsert {
            query: query("p1"),
            location_iri: "http://example.org/locations/a".to_string(),
        };
        let json = serde_json::to_value(&upsert).unwrap();
        assert_eq!(json["scope"], "p1");
        assert_eq!(json["locationIri"], "http://example.org/locations/a");
    }
}
