//! `sparks-core`: model building blocks shared by commands, processors and adapters.
//!
//! This crate contains **pure model** primitives (no infrastructure concerns): the
//! entity abstraction, the storage-independent filter tree used by CRUD commands,
//! sorting descriptors and the `Properties` configuration map.

pub mod entity;
pub mod error;
pub mod filter;
pub mod properties;
pub mod sorter;

pub use entity::Entity;
pub use error::{EntityError, EntityResult, FilterError};
pub use filter::{Connector, EntityFilter, FilterGroup, FilterOperator, FilterValue, PropertyFilter};
pub use properties::{Properties, PropertiesError};
pub use sorter::{EntitySorter, SortDirection};
