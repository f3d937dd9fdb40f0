//! Cached access to a cubic-chunk world held by an external data server.

pub mod cache;
pub mod column;
pub mod config;
pub mod connection;
pub mod cube;
pub mod materials;
pub mod metadata;
pub mod save;
pub mod source;
pub mod supervisor;
pub mod voxel;
pub mod world;

#[cfg(test)]
pub(crate) mod testing;

pub use cache::WorldCache;
pub use column::Column;
pub use config::WorldConfig;
pub use connection::{Connection, ConnectionState};
pub use cube::Cube;
pub use materials::{Material, MaterialTable};
pub use metadata::{LevelMetadata, MetadataStore};
pub use save::{SaveStep, SaveSteps};
pub use source::ChunkSource;
pub use supervisor::ServerProcess;
pub use world::WorldHandle;
