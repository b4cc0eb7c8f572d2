//! Infrastructure layer: processor registry, application context, named
//! resources and storage adapters for the filter tree.

pub mod context;
pub mod data_source;
pub mod error;
pub mod processor;
pub mod query;
pub mod registry;
pub mod views;

mod integration_tests;

pub use context::{ApplicationContext, ContextListener, ContextRef, ProcessorSet};
pub use data_source::DataSource;
pub use error::ContextError;
pub use processor::{Process, Processor, ProcessorDeclaration, ProcessorHandle, Scope};
pub use registry::NamedRegistry;
pub use views::{View, ViewError, ViewFactory};
