//! Core voxel types.

use bytemuck::NoUninit;
use serde::{Deserialize, Serialize};

/// Block type stored in each voxel.
///
/// The discriminant is the on-grid byte value; `Air` is zero so a zeroed grid
/// is an empty grid.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, NoUninit, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum BlockType {
    /// Empty space
    #[default]
    Air = 0,
    /// Indestructible world floor
    Bedrock = 1,
    Stone = 2,
    Dirt = 3,
    Grass = 4,
    Sand = 5,
    /// Fluid fill below the water level; not solid for collision
    Water = 6,
    Snow = 7,
}

impl BlockType {
    /// Every block type, in discriminant order.
    pub const ALL: [Self; 8] = [
        Self::Air,
        Self::Bedrock,
        Self::Stone,
        Self::Dirt,
        Self::Grass,
        Self::Sand,
        Self::Water,
        Self::Snow,
    ];

    /// Returns true if this block is air (empty)
    #[inline]
    pub const fn is_air(self) -> bool {
        matches!(self, Self::Air)
    }

    /// Returns true if this block is a fluid
    #[inline]
    pub const fn is_fluid(self) -> bool {
        matches!(self, Self::Water)
    }

    /// Returns true if this block blocks movement
    #[inline]
    pub const fn is_solid(self) -> bool {
        !self.is_air() && !self.is_fluid()
    }

    /// Byte value of this block type
    #[inline]
    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Block type for a byte value, if it names one
    pub const fn from_id(id: u8) -> Option<Self> {
        if (id as usize) < Self::ALL.len() {
            Some(Self::ALL[id as usize])
        } else {
            None
        }
    }

    /// Lowercase display name
    pub const fn name(self) -> &'static str {
        match self {
            Self::Air => "air",
            Self::Bedrock => "bedrock",
            Self::Stone => "stone",
            Self::Dirt => "dirt",
            Self::Grass => "grass",
            Self::Sand => "sand",
            Self::Water => "water",
            Self::Snow => "snow",
        }
    }
}

impl std::fmt::Display for BlockType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_type_air() {
        assert_eq!(BlockType::default(), BlockType::Air);
        assert!(BlockType::Air.is_air());
        assert!(!BlockType::Air.is_solid());
    }

    #[test]
    fn block_type_solid() {
        assert!(!BlockType::Stone.is_air());
        assert!(BlockType::Stone.is_solid());
        assert!(BlockType::Bedrock.is_solid());
    }

    #[test]
    fn water_is_not_solid() {
        assert!(BlockType::Water.is_fluid());
        assert!(!BlockType::Water.is_solid());
        assert!(!BlockType::Water.is_air());
    }

    #[test]
    fn id_roundtrip() {
        for block in BlockType::ALL {
            assert_eq!(BlockType::from_id(block.id()), Some(block));
        }
        assert_eq!(BlockType::from_id(200), None);
    }
}
