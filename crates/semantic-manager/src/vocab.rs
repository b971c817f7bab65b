//! IRIs of the core resource ontology and the platform meta model.

use oxrdf::NamedNodeRef;

macro_rules! iri {
    ($name:ident, $iri:expr) => {
        pub const $name: NamedNodeRef<'static> = NamedNodeRef::new_unchecked($iri);
    };
}

pub mod core {
    use super::*;

    iri!(RESOURCE, "http://www.symbiote-h2020.eu/ontology/core#Resource");
    iri!(SENSOR, "http://www.symbiote-h2020.eu/ontology/core#Sensor");
    iri!(STATIONARY_SENSOR, "http://www.symbiote-h2020.eu/ontology/core#StationarySensor");
    iri!(MOBILE_SENSOR, "http://www.symbiote-h2020.eu/ontology/core#MobileSensor");
    iri!(SERVICE, "http://www.symbiote-h2020.eu/ontology/core#Service");
    iri!(ACTUATING_SERVICE, "http://www.symbiote-h2020.eu/ontology/core#ActuatingService");
    iri!(ACTUATOR, "http://www.symbiote-h2020.eu/ontology/core#Actuator");

    iri!(WGS84_LOCATION, "http://www.symbiote-h2020.eu/ontology/core#WGS84Location");
    iri!(WKT_LOCATION, "http://www.symbiote-h2020.eu/ontology/core#WKTLocation");
    iri!(SYMBOLIC_LOCATION, "http://www.symbiote-h2020.eu/ontology/core#SymbolicLocation");
    iri!(FEATURE_OF_INTEREST, "http://www.symbiote-h2020.eu/ontology/core#FeatureOfInterest");
    iri!(INPUT_PARAMETER, "http://www.symbiote-h2020.eu/ontology/core#InputParameter");
    iri!(OUTPUT_PARAMETER, "http://www.symbiote-h2020.eu/ontology/core#OutputParameter");

    iri!(ID, "http://www.symbiote-h2020.eu/ontology/core#id");
    iri!(INTERWORKING_SERVICE_URL, "http://www.symbiote-h2020.eu/ontology/core#interworkingServiceURL");
    iri!(LOCATED_AT, "http://www.symbiote-h2020.eu/ontology/core#locatedAt");
    iri!(HAS_FEATURE_OF_INTEREST, "http://www.symbiote-h2020.eu/ontology/core#hasFeatureOfInterest");
    iri!(OBSERVES_PROPERTY, "http://www.symbiote-h2020.eu/ontology/core#observesProperty");
    iri!(HAS_PROPERTY, "http://www.symbiote-h2020.eu/ontology/core#hasProperty");
    iri!(NAME, "http://www.symbiote-h2020.eu/ontology/core#name");
    iri!(HAS_INPUT_PARAMETER, "http://www.symbiote-h2020.eu/ontology/core#hasInputParameter");
    iri!(HAS_OUTPUT_PARAMETER, "http://www.symbiote-h2020.eu/ontology/core#hasOutputParameter");
    iri!(MANDATORY, "http://www.symbiote-h2020.eu/ontology/core#mandatory");
    iri!(IS_ARRAY, "http://www.symbiote-h2020.eu/ontology/core#isArray");
    iri!(DATATYPE, "http://www.symbiote-h2020.eu/ontology/core#datatype");
    iri!(MIN_VALUE, "http://www.symbiote-h2020.eu/ontology/core#minValue");
    iri!(MAX_VALUE, "http://www.symbiote-h2020.eu/ontology/core#maxValue");
    iri!(POSITION, "http://www.symbiote-h2020.eu/ontology/core#position");
    iri!(ENTRY, "http://www.symbiote-h2020.eu/ontology/core#entry");
    iri!(ENTRY_OF, "http://www.symbiote-h2020.eu/ontology/core#entryOf");
    iri!(ACTS_ON, "http://www.symbiote-h2020.eu/ontology/core#actsOn");
    iri!(AFFECTS, "http://www.symbiote-h2020.eu/ontology/core#affects");
    iri!(HAS_CAPABILITY, "http://www.symbiote-h2020.eu/ontology/core#hasCapability");
    iri!(LATITUDE, "http://www.symbiote-h2020.eu/ontology/core#latitude");
    iri!(LONGITUDE, "http://www.symbiote-h2020.eu/ontology/core#longitude");
    iri!(ALTITUDE, "http://www.symbiote-h2020.eu/ontology/core#altitude");
    iri!(VALUE, "http://www.symbiote-h2020.eu/ontology/core#value");
}

pub mod mim {
    use super::*;

    iri!(PLATFORM, "http://www.symbiote-h2020.eu/ontology/meta#Platform");
    iri!(INTERWORKING_SERVICE, "http://www.symbiote-h2020.eu/ontology/meta#InterworkingService");
    iri!(HAS_SERVICE, "http://www.symbiote-h2020.eu/ontology/meta#hasService");
    iri!(URL, "http://www.symbiote-h2020.eu/ontology/meta#url");
    iri!(INFORMATION_MODEL_ID, "http://www.symbiote-h2020.eu/ontology/meta#informationModelId");
}

/// Turtle source of the built-in core resource ontology.
pub const CORE_ONTOLOGY: &str = include_str!("../ontology/core.ttl");

/// Turtle source of the built-in platform meta model.
pub const META_ONTOLOGY: &str = include_str!("../ontology/mim.ttl");
