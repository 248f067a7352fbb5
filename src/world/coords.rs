use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::world::CHUNK_SIZE;

/// A tile position in world coordinates. `y` grows downwards.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) struct TilePos {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl TilePos {
    pub(crate) fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub(crate) fn chunk(&self) -> ChunkPos {
        ChunkPos::new(
            self.x.div_euclid(CHUNK_SIZE as i32),
            self.y.div_euclid(CHUNK_SIZE as i32),
        )
    }

    /// Position of the tile inside its chunk, both components in `0..CHUNK_SIZE`.
    pub(crate) fn local(&self) -> (usize, usize) {
        (
            self.x.rem_euclid(CHUNK_SIZE as i32) as usize,
            self.y.rem_euclid(CHUNK_SIZE as i32) as usize,
        )
    }
}

/// Chunk coordinates. The `Display`/`FromStr` form `"x,y"` is the canonical chunk key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct ChunkPos {
    pub(crate) x: i32,
    pub(crate) y: i32,
}

impl ChunkPos {
    pub(crate) fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Saturates for chunks whose tiles lie beyond `i32`; such chunks are never inside a world.
    pub(crate) fn origin(&self) -> TilePos {
        let size = CHUNK_SIZE as i32;
        TilePos::new(self.x.saturating_mul(size), self.y.saturating_mul(size))
    }

    pub(crate) fn world_pos(&self, local_x: usize, local_y: usize) -> TilePos {
        let origin = self.origin();
        TilePos::new(
            origin.x.saturating_add(local_x as i32),
            origin.y.saturating_add(local_y as i32),
        )
    }

    /// Number of chunks needed to cover `tiles` tiles along one axis.
    pub(crate) fn span(tiles: i32) -> i32 {
        tiles.max(0).div_euclid(CHUNK_SIZE as i32) + i32::from(tiles.rem_euclid(CHUNK_SIZE as i32) != 0)
    }

    /// Chebyshev distance in chunks.
    pub(crate) fn distance(&self, other: &ChunkPos) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub(crate) fn key(&self) -> String {
        self.to_string()
    }
}

impl Display for ChunkPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

impl FromStr for ChunkPos {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| format!("Chunk key {s:?} is missing a comma"))?;
        let x = x
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("Chunk key {s:?}: bad x: {e}"))?;
        let y = y
            .trim()
            .parse::<i32>()
            .map_err(|e| format!("Chunk key {s:?}: bad y: {e}"))?;
        Ok(Self { x, y })
    }
}
