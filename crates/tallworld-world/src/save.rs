use crate::cache::WorldCache;
use crate::cube::encode;
use crate::metadata::MetadataStore;
use crate::source::ChunkSource;
use std::collections::VecDeque;
use std::fmt;
use tallworld_common::{ColumnCoord, CubeCoord, Result};
use tallworld_logger::{log, LogSeverity::*};

/// One unit of work completed by [`SaveSteps`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStep {
    Cube(CubeCoord),
    Column(ColumnCoord),
    Metadata,
}

impl fmt::Display for SaveStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SaveStep::Cube(coord) => write!(f, "cube {}", coord),
            SaveStep::Column(coord) => write!(f, "column {}", coord),
            SaveStep::Metadata => write!(f, "level metadata"),
        }
    }
}

/// Writes dirty chunks back one at a time. Each call to `next` performs exactly
/// one write and returns what it wrote, so callers can report progress between
/// steps. The first error ends the sequence; chunks already written stay clean.
pub struct SaveSteps<'a> {
    cache: &'a mut WorldCache,
    source: &'a mut dyn ChunkSource,
    metadata: Option<&'a mut dyn MetadataStore>,
    plan: VecDeque<SaveStep>,
    lock_checked: bool,
    done: bool,
}

impl<'a> SaveSteps<'a> {
    /// Plans the pass from the dirty flags as they are now: dirty cubes, then dirty
    /// columns, then the metadata if there is any.
    pub fn new(
        cache: &'a mut WorldCache,
        source: &'a mut dyn ChunkSource,
        metadata: Option<&'a mut dyn MetadataStore>,
    ) -> Self {
        let mut plan: VecDeque<SaveStep> = cache.dirty_cubes().into_iter().map(SaveStep::Cube).collect();
        plan.extend(cache.dirty_columns().into_iter().map(SaveStep::Column));
        if metadata.is_some() {
            plan.push_back(SaveStep::Metadata);
        }
        Self {
            cache,
            source,
            metadata,
            plan,
            lock_checked: false,
            done: false,
        }
    }

    /// Steps not yet run.
    pub fn remaining(&self) -> usize {
        if self.done {
            0
        } else {
            self.plan.len()
        }
    }

    /// Runs every remaining step and returns how many completed.
    pub fn run(self) -> Result<usize> {
        let mut completed = 0;
        for step in self {
            step?;
            completed += 1;
        }
        Ok(completed)
    }

    fn check_lock(&mut self) -> Result<()> {
        if !self.lock_checked {
            if let Some(metadata) = self.metadata.as_deref() {
                metadata.check_session_lock()?;
            }
            self.lock_checked = true;
        }
        Ok(())
    }

    fn save_cube(&mut self, coord: CubeCoord) -> Result<()> {
        // Steps planned for chunks that were cleaned in between are skipped.
        let Some(cube) = self.cache.loaded_cube_mut(coord) else {
            return Ok(());
        };
        if !cube.is_dirty() {
            return Ok(());
        }
        let tag = cube.to_tag()?;
        let bytes = encode(tag.clone())?;
        self.source.store_cube(coord, &bytes)?;
        cube.mark_saved(tag);
        self.cache.record_saved_cube(coord);
        log(format!("Saved cube {} ({} bytes)", coord, bytes.len()), Debug);
        Ok(())
    }

    fn save_column(&mut self, coord: ColumnCoord) -> Result<()> {
        let Some(column) = self.cache.loaded_column_mut(coord) else {
            return Ok(());
        };
        if !column.is_dirty() {
            return Ok(());
        }
        let bytes = column.to_bytes()?;
        self.source.store_column(coord, &bytes)?;
        column.mark_clean();
        self.cache.record_saved_column(coord);
        log(format!("Saved column {} ({} bytes)", coord, bytes.len()), Debug);
        Ok(())
    }

    fn run_step(&mut self, step: SaveStep) -> Result<()> {
        self.check_lock()?;
        match step {
            SaveStep::Cube(coord) => self.save_cube(coord),
            SaveStep::Column(coord) => self.save_column(coord),
            SaveStep::Metadata => match self.metadata.as_deref_mut() {
                Some(metadata) => metadata.save_metadata(),
                None => Ok(()),
            },
        }
    }
}

impl Iterator for SaveSteps<'_> {
    type Item = Result<SaveStep>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let Some(step) = self.plan.pop_front() else {
            self.done = true;
            return None;
        };
        match self.run_step(step) {
            Ok(()) => Some(Ok(step)),
            Err(err) => {
                log(
                    format!("Save aborted at {} with {} steps left: {}", step, self.plan.len(), err),
                    Error,
                );
                self.done = true;
                Some(Err(err))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining()))
    }
}

impl std::iter::FusedIterator for SaveSteps<'_> {}
