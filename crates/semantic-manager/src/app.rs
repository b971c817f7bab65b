//! Wiring of one running engine: catalog, RPC gateway, service and workers.

use crate::catalog::snapshot::SnapshotFile;
use crate::catalog::sources::{BuiltinModels, ModelSource, OntologyDirectory};
use crate::catalog::SchemaCatalog;
use crate::config::Config;
use crate::dispatcher::{json_handler, json_sink, Binding, Dispatcher, DispatcherHandle};
use crate::location::{LocationCache, LocationQuery, LocationResolver, LocationUpsert};
use crate::model::{
    ModelIdRequest, PlatformInstanceDescription, ResourceTranslationRequest,
    ResourceValidationRequest, SchemaModel, ScopedResourceTranslationRequest,
};
use crate::rpc::RpcGateway;
use crate::service::SemanticService;
use crate::transport::Transport;
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// The catalog described by `config`: built-in models, then the ontology
/// directory, then the snapshot, each overriding earlier ids.
pub fn build_catalog(config: &Config) -> SchemaCatalog {
    let mut sources: Vec<Arc<dyn ModelSource>> = vec![Arc::new(BuiltinModels::new(
        config.core_model_id.clone(),
        config.platform_model_id.clone(),
    ))];
    if let Some(dir) = &config.ontology_dir {
        sources.push(Arc::new(OntologyDirectory::new(dir)));
    }
    if let Some(path) = &config.catalog_snapshot {
        sources.push(Arc::new(SnapshotFile::new(path)));
    }

    let catalog = SchemaCatalog::new(sources);
    match &config.catalog_snapshot {
        Some(path) => catalog.with_snapshot(SnapshotFile::new(path)),
        None => catalog,
    }
}

pub struct App {
    pub service: Arc<SemanticService>,
    pub rpc: Arc<RpcGateway>,
    pub location_cache: Option<Arc<LocationCache>>,
    dispatcher: DispatcherHandle,
}

impl App {
    /// Initialize `catalog` and start serving every request kind on `transport`.
    ///
    /// Catalog and transport failures are returned; nothing else is fatal.
    pub async fn start(
        config: &Config,
        transport: Arc<dyn Transport>,
        catalog: Arc<SchemaCatalog>,
    ) -> Result<Self> {
        catalog
            .initialize()
            .await
            .context("Schema catalog initialization failed")?;

        let rpc = Arc::new(
            RpcGateway::connect(Arc::clone(&transport), config.exchange.clone(), config.rpc_timeout())
                .await
                .context("Failed to connect RPC gateway")?,
        );
        let keys = &config.routing_keys;
        let resolver = LocationResolver::new(
            Arc::clone(&rpc),
            keys.location_lookup.clone(),
            keys.location_upsert.clone(),
        );
        let service = Arc::new(SemanticService::new(catalog, config).with_locations(resolver));

        let mut dispatcher = Dispatcher::new(transport, config.exchange.clone());
        for binding in request_bindings(config, &service) {
            dispatcher = dispatcher.bind(binding);
        }

        let location_cache = if config.serve_location_cache {
            let cache = Arc::new(LocationCache::new());
            for binding in location_bindings(config, &cache) {
                dispatcher = dispatcher.bind(binding);
            }
            Some(cache)
        } else {
            None
        };

        let dispatcher = dispatcher
            .spawn()
            .await
            .context("Failed to start dispatcher")?;
        info!(
            exchange = %config.exchange,
            workers = dispatcher.worker_count(),
            "Semantic manager started"
        );

        Ok(Self {
            service,
            rpc,
            location_cache,
            dispatcher,
        })
    }

    pub async fn shutdown(self) {
        self.dispatcher.shutdown().await;
    }
}

macro_rules! service_handler {
    ($service:expr, $method:ident, $request:ty) => {{
        let service = Arc::clone($service);
        json_handler(move |request: $request| {
            let service = Arc::clone(&service);
            async move { service.$method(request).await }
        })
    }};
}

fn request_bindings(config: &Config, service: &Arc<SemanticService>) -> Vec<Binding> {
    let keys = &config.routing_keys;
    let bind = |key: &str, handler| Binding::new(config.queue_name(key), key, handler);

    vec![
        bind(&keys.register_model, service_handler!(service, register_model, SchemaModel)),
        bind(&keys.modify_model, service_handler!(service, modify_model, SchemaModel)),
        bind(&keys.delete_model, service_handler!(service, delete_model, ModelIdRequest)),
        bind(&keys.validate_model, service_handler!(service, validate_model, SchemaModel)),
        bind(
            &keys.validate_platform,
            service_handler!(service, validate_platform, PlatformInstanceDescription),
        ),
        bind(
            &keys.translate_platform,
            service_handler!(service, translate_platform, PlatformInstanceDescription),
        ),
        bind(
            &keys.validate_resources,
            service_handler!(service, validate_resources, ResourceValidationRequest),
        ),
        bind(
            &keys.translate_resources,
            service_handler!(service, translate_resources, ResourceTranslationRequest),
        ),
        bind(
            &keys.translate_scoped_resources,
            service_handler!(
                service,
                translate_scoped_resources,
                ScopedResourceTranslationRequest
            ),
        ),
    ]
}

fn location_bindings(config: &Config, cache: &Arc<LocationCache>) -> Vec<Binding> {
    let keys = &config.routing_keys;
    let lookup = {
        let cache = Arc::clone(cache);
        json_handler(move |query: LocationQuery| {
            let reply = cache.lookup(&query);
            async move { reply }
        })
    };
    let upsert = {
        let cache = Arc::clone(cache);
        json_sink(move |upsert: LocationUpsert| {
            cache.upsert(upsert);
            async {}
        })
    };

    vec![
        Binding::new(config.queue_name(&keys.location_lookup), keys.location_lookup.clone(), lookup),
        Binding::new(config.queue_name(&keys.location_upsert), keys.location_upsert.clone(), upsert),
    ]
}
