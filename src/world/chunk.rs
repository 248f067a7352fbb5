use crate::world::tile::TileType;
use crate::world::{CHUNK_AREA, CHUNK_SIZE};

fn tile_index(x: usize, y: usize) -> usize {
    y * CHUNK_SIZE + x
}

/// A square grid of tiles, row-major with `y` growing downwards.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Chunk {
    tiles: [TileType; CHUNK_AREA],
    modified: bool,
}

impl Chunk {
    pub(crate) fn filled(tile: TileType) -> Self {
        Self {
            tiles: [tile; CHUNK_AREA],
            modified: false,
        }
    }

    pub(crate) fn get(&self, x: usize, y: usize) -> TileType {
        if x >= CHUNK_SIZE || y >= CHUNK_SIZE {
            return TileType::Air;
        }
        self.tiles[tile_index(x, y)]
    }

    /// Writes without touching the modified flag. Used while generating.
    pub(crate) fn put(&mut self, x: usize, y: usize, tile: TileType) {
        if x < CHUNK_SIZE && y < CHUNK_SIZE {
            self.tiles[tile_index(x, y)] = tile;
        }
    }

    /// Writes a tile as a world edit. Returns whether the value changed; only changes mark the
    /// chunk modified.
    pub(crate) fn set(&mut self, x: usize, y: usize, tile: TileType) -> bool {
        if x >= CHUNK_SIZE || y >= CHUNK_SIZE || self.get(x, y) == tile {
            return false;
        }
        self.tiles[tile_index(x, y)] = tile;
        self.modified = true;
        true
    }

    pub(crate) fn is_modified(&self) -> bool {
        self.modified
    }

    pub(crate) fn mark_modified(&mut self) {
        self.modified = true;
    }

    pub(crate) fn clear_modified(&mut self) {
        self.modified = false;
    }

    pub(crate) fn same_tiles(&self, other: &Chunk) -> bool {
        self.tiles == other.tiles
    }

    /// Flat row-major tile ids, the wire representation.
    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        self.tiles.iter().map(|t| t.id()).collect()
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        if bytes.len() != CHUNK_AREA {
            return Err(format!(
                "Chunk data has {} tiles, expected {CHUNK_AREA}",
                bytes.len()
            ));
        }
        let mut chunk = Chunk::filled(TileType::Air);
        for (i, &id) in bytes.iter().enumerate() {
            chunk.tiles[i] = TileType::from_id(id).ok_or_else(|| format!("Unknown tile id {id}"))?;
        }
        Ok(chunk)
    }

    /// Nested rows of tile ids, the save-file representation.
    pub(crate) fn to_rows(&self) -> Vec<Vec<u8>> {
        self.tiles
            .chunks(CHUNK_SIZE)
            .map(|row| row.iter().map(|t| t.id()).collect())
            .collect()
    }

    pub(crate) fn from_rows(rows: &[Vec<u8>]) -> Result<Self, String> {
        if rows.len() != CHUNK_SIZE || rows.iter().any(|r| r.len() != CHUNK_SIZE) {
            return Err(format!("Chunk grid must be {CHUNK_SIZE}x{CHUNK_SIZE}"));
        }
        Self::from_bytes(&rows.concat())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn no_op_writes_do_not_mark_modified() {
        let mut chunk = Chunk::filled(TileType::Stone);
        assert!(!chunk.set(3, 4, TileType::Stone));
        assert!(!chunk.is_modified());
        assert!(chunk.set(3, 4, TileType::Air));
        assert!(chunk.is_modified());
        assert_eq!(chunk.get(3, 4), TileType::Air);
    }

    #[test]
    fn put_does_not_mark_modified() {
        let mut chunk = Chunk::filled(TileType::Air);
        chunk.put(0, 0, TileType::Wood);
        assert_eq!(chunk.get(0, 0), TileType::Wood);
        assert!(!chunk.is_modified());
    }

    #[test]
    fn out_of_range_access_is_harmless() {
        let mut chunk = Chunk::filled(TileType::Dirt);
        assert_eq!(chunk.get(CHUNK_SIZE, 0), TileType::Air);
        assert!(!chunk.set(0, CHUNK_SIZE, TileType::Stone));
    }

    #[test]
    fn rows_are_indexed_by_y_then_x() {
        let mut chunk = Chunk::filled(TileType::Air);
        chunk.put(2, 5, TileType::Gold);
        let rows = chunk.to_rows();
        assert_eq!(rows.len(), CHUNK_SIZE);
        assert_eq!(rows[5][2], TileType::Gold.id());
        assert_eq!(Chunk::from_rows(&rows).unwrap(), chunk);
        assert_eq!(chunk.to_bytes()[5 * CHUNK_SIZE + 2], TileType::Gold.id());
    }

    #[test]
    fn rejects_bad_payloads() {
        assert!(Chunk::from_bytes(&[0; 10]).is_err());
        assert!(Chunk::from_bytes(&[200; CHUNK_AREA]).is_err());
        assert!(Chunk::from_rows(&vec![vec![0; CHUNK_SIZE]; 3]).is_err());
    }
}
