use crate::cache::WorldCache;
use crate::column::Column;
use crate::config::WorldConfig;
use crate::connection::{Connection, ConnectionState};
use crate::cube::Cube;
use crate::materials::MaterialTable;
use crate::metadata::{LevelMetadata, MetadataStore};
use crate::save::SaveSteps;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tallworld_common::{ColumnCoord, CubeCoord, Result};
use tallworld_logger::{log, LogSeverity::*};

/// An open world: its cached chunks, the data server behind them and the level
/// metadata stored next to the database.
///
/// Nothing talks to the server until the first chunk access. After a fatal error
/// every chunk access returns `WorldClosed`; the handle should then be closed.
pub struct WorldHandle {
    world_dir: PathBuf,
    cache: WorldCache,
    connection: Connection,
    metadata: Option<Box<dyn MetadataStore>>,
}

impl WorldHandle {
    /// Opens the world in `world_dir`, loading `level.dat` when there is one.
    pub fn open<P: AsRef<Path>>(world_dir: P, config: WorldConfig) -> Result<Self> {
        config.validate()?;
        let world_dir = world_dir.as_ref().to_path_buf();
        let metadata: Option<Box<dyn MetadataStore>> = if LevelMetadata::exists_in(&world_dir) {
            Some(Box::new(LevelMetadata::load(&world_dir)?))
        } else {
            log(
                format!("No level.dat in {}, saving chunks only", world_dir.display()),
                Info,
            );
            None
        };
        Ok(Self::with_parts(world_dir, config, MaterialTable::builtin(), metadata))
    }

    /// Builds a handle from explicit parts, e.g. a custom material table or metadata store.
    pub fn with_parts(
        world_dir: PathBuf,
        config: WorldConfig,
        materials: MaterialTable,
        metadata: Option<Box<dyn MetadataStore>>,
    ) -> Self {
        let database = world_dir.join(&config.database);
        Self {
            world_dir,
            cache: WorldCache::new(materials),
            connection: Connection::new(config, database),
            metadata,
        }
    }

    pub fn world_dir(&self) -> &Path {
        &self.world_dir
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn materials(&self) -> &MaterialTable {
        self.cache.materials()
    }

    /// The column at (cx, cz), or None if the server has nothing there.
    pub fn get_column(&mut self, cx: i32, cz: i32) -> Result<Option<&mut Column>> {
        self.connection.ensure_usable()?;
        let column = self.cache.column(&mut self.connection, ColumnCoord::new(cx, cz))?;
        Ok(if column.exists() { Some(column) } else { None })
    }

    /// The cube at (cx, cy, cz). Positions the server never generated give an
    /// empty cube; see [`Cube::is_generated`].
    pub fn get_cube(&mut self, cx: i32, cy: i32, cz: i32) -> Result<&mut Cube> {
        self.connection.ensure_usable()?;
        self.cache.cube(&mut self.connection, CubeCoord::new(cx, cy, cz))
    }

    pub fn contains_cube(&mut self, coord: CubeCoord) -> Result<bool> {
        self.connection.ensure_usable()?;
        self.cache.contains_cube(&mut self.connection, coord)
    }

    pub fn contains_column(&mut self, coord: ColumnCoord) -> Result<bool> {
        self.connection.ensure_usable()?;
        self.cache.contains_column(&mut self.connection, coord)
    }

    pub fn cube_coordinates(&mut self) -> Result<&HashSet<CubeCoord>> {
        self.connection.ensure_usable()?;
        self.cache.cube_coordinates(&mut self.connection)
    }

    pub fn column_coordinates(&mut self) -> Result<&HashSet<ColumnCoord>> {
        self.connection.ensure_usable()?;
        self.cache.column_coordinates(&mut self.connection)
    }

    pub fn loaded_cube_count(&self) -> usize {
        self.cache.loaded_cube_count()
    }

    /// Number of dirty cubes and columns waiting for the next save.
    pub fn pending_saves(&self) -> usize {
        self.cache.dirty_cubes().len() + self.cache.dirty_columns().len()
    }

    /// Starts a save pass over everything dirty right now. Nothing is written
    /// until the returned iterator is advanced.
    pub fn save_in_place(&mut self) -> SaveSteps<'_> {
        let metadata = self
            .metadata
            .as_deref_mut()
            .map(|store| store as &mut dyn MetadataStore);
        SaveSteps::new(&mut self.cache, &mut self.connection, metadata)
    }

    /// Disconnects and stops the server. Unsaved changes are dropped.
    pub fn close(mut self) -> Result<()> {
        let pending = self.pending_saves();
        if pending > 0 {
            log(format!("Closing world with {} unsaved chunks", pending), Warning);
        }
        self.connection.close()
    }
}
