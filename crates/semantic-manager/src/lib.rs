//! Message-driven validation and translation of IoT platform and resource
//! descriptions against RDF schema models.

pub mod app;
pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod graph;
pub mod location;
pub mod model;
pub mod rpc;
pub mod service;
pub mod stdio;
pub mod translator;
pub mod transport;
pub mod validator;
pub mod vocab;

pub use app::App;
pub use catalog::SchemaCatalog;
pub use config::Config;
pub use graph::Graph;
pub use service::SemanticService;
pub use translator::DescriptionTranslator;
pub use validator::ConstraintValidator;
