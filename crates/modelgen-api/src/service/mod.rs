//! Task and catalog services.

mod catalog_service;
mod creation_service;
mod status_service;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog_service::{artifact_type, CatalogService, GeneratorList, ModelList};
pub use creation_service::{CreateModelRequest, CreationService, CreationSettings};
pub use status_service::{parse_creation_timestamp, StatusService};
