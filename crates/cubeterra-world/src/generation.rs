//! Procedural terrain generation.

use cubeterra_core::coords::WorldPos;
use cubeterra_core::types::BlockType;
use cubeterra_core::{Error, Result};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::levels::TerrainLevels;
use crate::WorldSeed;

/// Source of block types for world positions.
///
/// Implementations must be deterministic: neighbouring chunks evaluate their
/// shared boundary independently and must agree.
pub trait TerrainGenerator: Send + Sync {
    /// Block type of the voxel at `pos`.
    fn block_at(&self, pos: WorldPos) -> BlockType;
}

impl<F> TerrainGenerator for F
where
    F: Fn(WorldPos) -> BlockType + Send + Sync,
{
    fn block_at(&self, pos: WorldPos) -> BlockType {
        self(pos)
    }
}

/// Terrain generator configuration.
#[derive(Debug, Clone)]
pub struct TerrainConfig {
    /// Seed for noise generation.
    pub seed: WorldSeed,
    /// Height in voxels that maps to a relative height of 1.0.
    pub world_height: u32,
    /// Relative height at or below which open space fills with water.
    pub water_level: f32,
    /// Horizontal scale of terrain features.
    pub horizontal_scale: f64,
    /// Vertical scale of terrain features.
    pub vertical_scale: f64,
    /// Number of noise octaves for detail.
    pub octaves: usize,
    /// Frequency multiplier between octaves.
    pub lacunarity: f64,
    /// Amplitude multiplier between octaves.
    pub persistence: f64,
    /// Turn exposed dirt into grass.
    pub grass_cap: bool,
    /// Bands used to classify solid voxels.
    pub levels: TerrainLevels,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            world_height: 96,
            water_level: 0.3,
            horizontal_scale: 64.0,
            vertical_scale: 48.0,
            octaves: 4,
            lacunarity: 2.0,
            persistence: 0.5,
            grass_cap: true,
            levels: TerrainLevels::standard(),
        }
    }
}

impl TerrainConfig {
    /// Check that every value is usable.
    pub fn validate(&self) -> Result<()> {
        if self.world_height == 0 {
            return Err(Error::InvalidConfig("world_height must be positive".into()));
        }
        if !(0.0..=1.0).contains(&self.water_level) {
            return Err(Error::InvalidConfig(format!(
                "water_level {} outside [0, 1]",
                self.water_level
            )));
        }
        for (name, scale) in [
            ("horizontal_scale", self.horizontal_scale),
            ("vertical_scale", self.vertical_scale),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{name} must be positive, got {scale}"
                )));
            }
        }
        if !(1..=Fbm::<Perlin>::MAX_OCTAVES).contains(&self.octaves) {
            return Err(Error::InvalidConfig(format!(
                "octaves must be in 1..={}, got {}",
                Fbm::<Perlin>::MAX_OCTAVES,
                self.octaves
            )));
        }
        if self.levels.is_empty() {
            return Err(Error::InvalidConfig("no terrain levels registered".into()));
        }
        Ok(())
    }
}

/// Terrain generator thresholding 3D fractal noise against relative height.
///
/// A voxel is solid where the normalized noise exceeds its relative height,
/// so terrain thins out towards `world_height`. The floor at `y == 0` is
/// always bedrock and nothing exists below it.
#[derive(Clone)]
pub struct NoiseTerrainGenerator {
    config: TerrainConfig,
    noise: Fbm<Perlin>,
}

impl NoiseTerrainGenerator {
    /// Create a new terrain generator with the given configuration.
    pub fn new(config: TerrainConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    /// Create a terrain generator with default configuration.
    pub fn with_seed(seed: WorldSeed) -> Self {
        Self::from_valid(TerrainConfig {
            seed,
            ..Default::default()
        })
    }

    fn from_valid(config: TerrainConfig) -> Self {
        let noise = Fbm::<Perlin>::new(config.seed as u32)
            .set_octaves(config.octaves)
            .set_lacunarity(config.lacunarity)
            .set_persistence(config.persistence);
        Self { config, noise }
    }

    /// Get the terrain configuration.
    pub fn config(&self) -> &TerrainConfig {
        &self.config
    }

    /// Noise value at `pos`, normalized into `[0, 1]`.
    pub fn sample(&self, pos: WorldPos) -> f32 {
        let point = [
            pos.x as f64 / self.config.horizontal_scale,
            pos.y as f64 / self.config.vertical_scale,
            pos.z as f64 / self.config.horizontal_scale,
        ];
        // Noise returns roughly [-1, 1]
        (((self.noise.get(point) + 1.0) * 0.5) as f32).clamp(0.0, 1.0)
    }

    /// Height of `world_y` relative to `world_height`.
    #[inline]
    pub fn relative_height(&self, world_y: i64) -> f32 {
        world_y as f32 / self.config.world_height as f32
    }

    /// Classify a normalized noise value at the given world height.
    pub fn classify(&self, value: f32, world_y: i64) -> BlockType {
        if world_y < 0 {
            return BlockType::Air;
        }
        if world_y == 0 {
            return BlockType::Bedrock;
        }

        let relative = self.relative_height(world_y);
        if value > relative {
            if let Some(block) = self.config.levels.type_for_level(value) {
                return block;
            }
        }
        if relative <= self.config.water_level {
            BlockType::Water
        } else {
            BlockType::Air
        }
    }

    fn base_block(&self, pos: WorldPos) -> BlockType {
        if pos.y <= 0 {
            return self.classify(0.0, pos.y);
        }
        self.classify(self.sample(pos), pos.y)
    }
}

impl TerrainGenerator for NoiseTerrainGenerator {
    fn block_at(&self, pos: WorldPos) -> BlockType {
        let block = self.base_block(pos);
        if self.config.grass_cap
            && block == BlockType::Dirt
            && !self.base_block(pos.offset(0, 1, 0)).is_solid()
        {
            return BlockType::Grass;
        }
        block
    }
}

impl std::fmt::Debug for NoiseTerrainGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseTerrainGenerator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario_generator() -> NoiseTerrainGenerator {
        NoiseTerrainGenerator::new(TerrainConfig {
            world_height: 64,
            water_level: 0.45,
            levels: TerrainLevels::standard(),
            ..Default::default()
        })
        .expect("valid config")
    }

    #[test]
    fn generator_deterministic() {
        let gen1 = NoiseTerrainGenerator::with_seed(12345);
        let gen2 = NoiseTerrainGenerator::with_seed(12345);

        for x in -20..20 {
            for y in 0..40 {
                let pos = WorldPos::new(x * 3, y, 7 - x);
                assert_eq!(gen1.block_at(pos), gen2.block_at(pos));
                assert_eq!(gen1.block_at(pos), gen1.block_at(pos));
            }
        }
    }

    #[test]
    fn different_seeds_different_terrain() {
        let gen1 = NoiseTerrainGenerator::with_seed(12345);
        let gen2 = NoiseTerrainGenerator::with_seed(54321);

        let mut differences = 0;
        for x in 0..10 {
            for z in 0..10 {
                let pos = WorldPos::new(x * 7, 20, z * 7);
                if (gen1.sample(pos) - gen2.sample(pos)).abs() > f32::EPSILON {
                    differences += 1;
                }
            }
        }
        assert!(differences > 50, "Seeds should produce different terrain");
    }

    #[test]
    fn floor_is_bedrock_regardless_of_noise() {
        let gen = scenario_generator();
        for value in [0.0, 0.3, 0.99, 1.0] {
            assert_eq!(gen.classify(value, 0), BlockType::Bedrock);
        }
        for x in -5..5 {
            assert_eq!(gen.block_at(WorldPos::new(x * 11, 0, x)), BlockType::Bedrock);
        }
    }

    #[test]
    fn nothing_below_the_floor() {
        let gen = scenario_generator();
        assert_eq!(gen.block_at(WorldPos::new(3, -1, 3)), BlockType::Air);
        assert_eq!(gen.block_at(WorldPos::new(3, -100, 3)), BlockType::Air);
    }

    #[test]
    fn low_value_above_floor_is_stone() {
        let gen = scenario_generator();
        assert_eq!(gen.classify(0.30, 5), BlockType::Stone);
    }

    #[test]
    fn open_space_below_water_level_is_water() {
        let gen = scenario_generator();
        // y = 28 is relative height 0.4375, under the 0.45 water level
        assert_eq!(gen.classify(0.42, 28), BlockType::Water);
        // y = 40 is relative height 0.625, above it
        assert_eq!(gen.classify(0.42, 40), BlockType::Air);
    }

    #[test]
    fn solid_bands_follow_levels() {
        let gen = scenario_generator();
        assert_eq!(gen.classify(0.45, 1), BlockType::Sand);
        assert_eq!(gen.classify(0.75, 1), BlockType::Dirt);
    }

    #[test]
    fn terrain_thins_out_above_world_height() {
        let gen = NoiseTerrainGenerator::with_seed(7);
        let height = i64::from(gen.config().world_height);
        for x in 0..16 {
            for z in 0..16 {
                assert_eq!(gen.block_at(WorldPos::new(x, height + 1, z)), BlockType::Air);
            }
        }
    }

    #[test]
    fn grass_only_caps_exposed_dirt() {
        let gen = NoiseTerrainGenerator::with_seed(99);
        for x in 0..24 {
            for z in 0..24 {
                for y in 1..90 {
                    let pos = WorldPos::new(x, y, z);
                    if gen.block_at(pos) == BlockType::Grass {
                        assert!(!gen.block_at(pos.offset(0, 1, 0)).is_solid());
                    }
                }
            }
        }
    }

    #[test]
    fn invalid_config_rejected() {
        let config = TerrainConfig {
            water_level: 2.0,
            ..Default::default()
        };
        assert!(matches!(
            NoiseTerrainGenerator::new(config),
            Err(Error::InvalidConfig(_))
        ));

        let config = TerrainConfig {
            levels: TerrainLevels::new(),
            ..Default::default()
        };
        assert!(NoiseTerrainGenerator::new(config).is_err());
    }

    #[test]
    fn closures_are_generators() {
        let flat = |pos: WorldPos| {
            if pos.y < 4 {
                BlockType::Stone
            } else {
                BlockType::Air
            }
        };
        assert_eq!(flat.block_at(WorldPos::new(0, 3, 0)), BlockType::Stone);
        assert_eq!(flat.block_at(WorldPos::new(0, 4, 0)), BlockType::Air);
    }
}
