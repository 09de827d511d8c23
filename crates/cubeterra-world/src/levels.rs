//! Terrain band table mapping normalized noise values to block types.

use cubeterra_core::types::BlockType;
use cubeterra_core::{Error, Result};

/// Ordered bands partitioning `[0, 1]` into block types.
///
/// Each registered level is the exclusive upper bound of its band: with
/// levels `(0.375, Stone), (0.5, Sand), (1.0, Dirt)` the bands are
/// `[0, 0.375)` Stone, `[0.375, 0.5)` Sand and `[0.5, 1.0]` Dirt. Values at or
/// above the highest level fall into the highest band.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TerrainLevels {
    levels: Vec<(f32, BlockType)>,
}

impl TerrainLevels {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stone, then sand, then dirt.
    pub fn standard() -> Self {
        Self {
            levels: vec![
                (0.375, BlockType::Stone),
                (0.5, BlockType::Sand),
                (1.0, BlockType::Dirt),
            ],
        }
    }

    /// Register a band whose upper bound is `level`.
    ///
    /// Fails if the level is outside `[0, 1]`, or if the level or the block
    /// type is already registered.
    pub fn insert(&mut self, level: f32, block: BlockType) -> Result<()> {
        if !(0.0..=1.0).contains(&level) {
            return Err(Error::InvalidConfig(format!(
                "terrain level {level} outside [0, 1]"
            )));
        }
        if self.levels.iter().any(|&(_, b)| b == block) {
            return Err(Error::Duplicate(format!("terrain band for {block}")));
        }

        let index = self.levels.partition_point(|&(l, _)| l < level);
        if self.levels.get(index).is_some_and(|&(l, _)| l == level) {
            return Err(Error::Duplicate(format!("terrain level {level}")));
        }
        self.levels.insert(index, (level, block));
        Ok(())
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, level: f32, block: BlockType) -> Result<Self> {
        self.insert(level, block)?;
        Ok(self)
    }

    /// Block type of the band containing `value`, `None` if the table is empty.
    pub fn type_for_level(&self, value: f32) -> Option<BlockType> {
        self.levels
            .iter()
            .find(|&&(level, _)| value < level)
            .or_else(|| self.levels.last())
            .map(|&(_, block)| block)
    }

    /// Iterate `(lower, upper, block)` for each band, lowest first.
    pub fn bands(&self) -> impl Iterator<Item = (f32, f32, BlockType)> + '_ {
        let lowers = std::iter::once(0.0).chain(self.levels.iter().map(|&(l, _)| l));
        lowers
            .zip(self.levels.iter())
            .map(|(lower, &(upper, block))| (lower, upper, block))
    }

    /// Number of registered bands.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// True when no band is registered.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}
