pub mod bounds;
pub mod cache;
pub mod catalog;
pub mod composite;
pub mod config;
pub mod error;
pub mod export;
pub mod icons;
pub mod pipeline;
pub mod render;
pub mod worldmap;

pub use bounds::{CoordinateBounds, CoordinateData, compute_bounds};
pub use cache::{CacheSource, KeyTable, MemoryStore, open_store};
pub use catalog::RegionCatalog;
pub use config::{CompositeOptions, ExportConfig, RenderOptions, StageSettings};
pub use error::{ExportError, Result};
pub use pipeline::{ExportPipeline, ExportSummary};
