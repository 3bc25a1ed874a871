pub mod download;
pub mod inventory;
pub mod marker;
pub mod registry;

pub use download::ModelDownloader;
pub use inventory::InventoryReconciler;
pub use marker::{MarkerStore, ModelMetadata};
pub use registry::{CatalogEntry, ModelDescriptor, CATALOG};
