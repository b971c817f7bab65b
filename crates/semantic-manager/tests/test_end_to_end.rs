use semantic_manager::app::{build_catalog, App};
use semantic_manager::model::{
    PlatformInstanceDescription, RdfFormat, ResourceDescription, SchemaModel, ValidationResult,
};
use semantic_manager::rpc::RpcGateway;
use semantic_manager::transport::InMemoryBroker;
use semantic_manager::{Config, Graph};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    app: App,
    client: RpcGateway,
    broker: Arc<InMemoryBroker>,
    config: Config,
}

impl Harness {
    async fn start(config: Config) -> Self {
        let broker = Arc::new(InMemoryBroker::new());
        let catalog = Arc::new(build_catalog(&config));
        let app = App::start(&config, broker.clone(), catalog).await.unwrap();
        let client =
            RpcGateway::connect(broker.clone(), config.exchange.clone(), Duration::from_secs(5))
                .await
                .unwrap();
        Self {
            app,
            client,
            broker,
            config,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        routing_key: &str,
        payload: serde_json::Value,
    ) -> ValidationResult<T> {
        self.client
            .call_json(routing_key, &payload)
            .await
            .unwrap()
            .expect("request timed out")
    }

    async fn stop(self) {
        self.app.shutdown().await;
        self.broker.close().await;
    }
}

fn bim() -> serde_json::Value {
    json!({
        "id": "BIM",
        "name": "Base information model",
        "owner": "admin",
        "uri": "http://example.org/bim",
        "rdf": "<http://example.org/bim> a <http://www.w3.org/2002/07/owl#Ontology> .",
        "rdfFormat": "Turtle"
    })
}

fn roof_sensor(id: &str) -> serde_json::Value {
    json!({
        "kind": "StationarySensor",
        "id": id,
        "labels": [format!("Thermometer {id}")],
        "interworkingServiceUrl": "http://x/y",
        "locatedAt": {
            "kind": "WGS84Location",
            "name": "Roof",
            "latitude": 45.8,
            "longitude": 15.97,
            "altitude": 120.0
        },
        "observesProperty": ["temperature"]
    })
}

#[tokio::test]
async fn register_then_validate_platform() {
    let harness = Harness::start(Config::default()).await;
    let keys = harness.config.routing_keys.clone();

    let registered: ValidationResult<SchemaModel> = harness.call(&keys.register_model, bim()).await;
    assert!(registered.success, "{}", registered.message);

    let platform = json!({
        "id": "p1",
        "labels": ["PlatformA"],
        "comments": ["demo"],
        "interworkingServices": [{"modelId": "BIM", "url": "http://x/y"}]
    });
    let result: ValidationResult<PlatformInstanceDescription> =
        harness.call(&keys.validate_platform, platform).await;

    assert!(result.success, "{}", result.message);
    assert_eq!(result.model_validated_against.as_deref(), Some("MIM"));
    assert_eq!(result.object_description.unwrap().labels, vec!["PlatformA"]);

    harness.stop().await;
}

#[tokio::test]
async fn sensor_without_labels_is_rejected() {
    let harness = Harness::start(Config::default()).await;
    let keys = harness.config.routing_keys.clone();

    let request = json!({
        "platformId": "p1",
        "resources": [{
            "kind": "StationarySensor",
            "id": "s1",
            "interworkingServiceUrl": "http://x/y"
        }]
    });
    let result: ValidationResult<Vec<ResourceDescription>> =
        harness.call(&keys.translate_resources, request).await;

    assert!(!result.success);
    assert!(result.message.contains("Label"), "{}", result.message);
    assert!(result.model_validated.is_none());

    harness.stop().await;
}

#[tokio::test]
async fn location_nodes_are_shared_across_requests() {
    let harness = Harness::start(Config::default()).await;
    let keys = harness.config.routing_keys.clone();
    let location_of = |result: &ValidationResult<Vec<ResourceDescription>>| {
        let graph =
            Graph::parse(result.model_validated.as_deref().unwrap(), RdfFormat::Turtle).unwrap();
        let rows = graph
            .query("SELECT ?l WHERE { ?r <http://www.symbiote-h2020.eu/ontology/core#locatedAt> ?l }")
            .unwrap();
        assert_eq!(rows.len(), 1);
        rows[0]["l"].to_string()
    };

    let first: ValidationResult<Vec<ResourceDescription>> = harness
        .call(
            &keys.translate_resources,
            json!({"platformId": "p1", "resources": [roof_sensor("a")]}),
        )
        .await;
    assert!(first.success, "{}", first.message);

    // the upsert is fire-and-forget
    let cache = harness.app.location_cache.clone().unwrap();
    for _ in 0..100 {
        if !cache.is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(cache.len(), 1);

    let second: ValidationResult<Vec<ResourceDescription>> = harness
        .call(
            &keys.translate_resources,
            json!({"platformId": "p1", "resources": [roof_sensor("b")]}),
        )
        .await;
    assert!(second.success, "{}", second.message);
    assert_eq!(location_of(&first), location_of(&second));

    let other_platform: ValidationResult<Vec<ResourceDescription>> = harness
        .call(
            &keys.translate_resources,
            json!({"platformId": "p2", "resources": [roof_sensor("c")]}),
        )
        .await;
    assert_ne!(location_of(&first), location_of(&other_platform));

    harness.stop().await;
}

#[tokio::test]
async fn translated_resources_validate_as_graph() {
    let harness = Harness::start(Config::default()).await;
    let keys = harness.config.routing_keys.clone();

    let translated: ValidationResult<Vec<ResourceDescription>> = harness
        .call(
            &keys.translate_resources,
            json!({"platformId": "p1", "resources": [roof_sensor("a")]}),
        )
        .await;
    assert!(translated.success, "{}", translated.message);

    let validated: ValidationResult<Vec<ResourceDescription>> = harness
        .call(
            &keys.validate_resources,
            json!({
                "platformId": "p1",
                "rdf": translated.model_validated.unwrap(),
                "rdfFormat": "Turtle"
            }),
        )
        .await;
    assert!(validated.success, "{}", validated.message);
    assert_eq!(validated.object_description, translated.object_description);

    harness.stop().await;
}

#[tokio::test]
async fn malformed_payload_gets_failed_result() {
    let harness = Harness::start(Config::default()).await;
    let keys = harness.config.routing_keys.clone();

    let result: ValidationResult<serde_json::Value> = harness
        .call(&keys.validate_platform, json!({"labels": "not a list"}))
        .await;
    assert!(!result.success);

    let registered: ValidationResult<SchemaModel> = harness.call(&keys.register_model, bim()).await;
    assert!(registered.success, "worker should survive a bad payload");

    harness.stop().await;
}

#[tokio::test]
async fn registered_models_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        catalog_snapshot: Some(dir.path().join("catalog.bin")),
        ..Config::default()
    };

    let harness = Harness::start(config.clone()).await;
    let registered: ValidationResult<SchemaModel> = harness
        .call(&config.routing_keys.register_model, bim())
        .await;
    assert!(registered.success, "{}", registered.message);
    harness.stop().await;

    let restarted = Harness::start(config.clone()).await;
    let ids = restarted.app.service.catalog().model_ids().await.unwrap();
    assert_eq!(ids, vec!["BIM", "CORE", "MIM"]);
    restarted.stop().await;
}
