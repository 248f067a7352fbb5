use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A single cell of the world grid. The discriminants are the canonical wire and save ids.
#[repr(u8)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub(crate) enum TileType {
    #[default]
    Air = 0,
    Dirt = 1,
    Stone = 2,
    Sand = 3,
    Grass = 4,
    Coal = 5,
    Iron = 6,
    Gold = 7,
    Diamond = 8,
    Ore = 9,
    Bedrock = 10,
    Wood = 11,
    Leaves = 12,
    Bush = 13,
    Flower = 14,
    TallGrass = 15,
    Cactus = 16,
    Snow = 17,
    Mushroom = 18,
    Water = 19,
    Cloud = 20,
}

impl TileType {
    pub(crate) const ALL: [TileType; 21] = [
        TileType::Air,
        TileType::Dirt,
        TileType::Stone,
        TileType::Sand,
        TileType::Grass,
        TileType::Coal,
        TileType::Iron,
        TileType::Gold,
        TileType::Diamond,
        TileType::Ore,
        TileType::Bedrock,
        TileType::Wood,
        TileType::Leaves,
        TileType::Bush,
        TileType::Flower,
        TileType::TallGrass,
        TileType::Cactus,
        TileType::Snow,
        TileType::Mushroom,
        TileType::Water,
        TileType::Cloud,
    ];

    pub(crate) fn id(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_id(id: u8) -> Option<TileType> {
        TileType::ALL.get(id as usize).copied()
    }

    pub(crate) fn is_air(self) -> bool {
        self == TileType::Air
    }

    /// Tiles an entity can stand on. Decorations, water and clouds are passable.
    pub(crate) fn is_solid(self) -> bool {
        !matches!(
            self,
            TileType::Air
                | TileType::Bush
                | TileType::Flower
                | TileType::TallGrass
                | TileType::Mushroom
                | TileType::Water
                | TileType::Cloud
                | TileType::Leaves
        )
    }

    pub(crate) fn is_ore(self) -> bool {
        matches!(
            self,
            TileType::Coal | TileType::Iron | TileType::Gold | TileType::Diamond | TileType::Ore
        )
    }

    pub(crate) fn name(self) -> &'static str {
        match self {
            TileType::Air => "air",
            TileType::Dirt => "dirt",
            TileType::Stone => "stone",
            TileType::Sand => "sand",
            TileType::Grass => "grass",
            TileType::Coal => "coal",
            TileType::Iron => "iron",
            TileType::Gold => "gold",
            TileType::Diamond => "diamond",
            TileType::Ore => "ore",
            TileType::Bedrock => "bedrock",
            TileType::Wood => "wood",
            TileType::Leaves => "leaves",
            TileType::Bush => "bush",
            TileType::Flower => "flower",
            TileType::TallGrass => "tall_grass",
            TileType::Cactus => "cactus",
            TileType::Snow => "snow",
            TileType::Mushroom => "mushroom",
            TileType::Water => "water",
            TileType::Cloud => "cloud",
        }
    }
}

impl Display for TileType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
