use std::collections::hash_map::Entry;
use std::collections::HashMap;

use log::debug;

use crate::world::cache::ChunkCache;
use crate::world::chunk::Chunk;
use crate::world::coords::{ChunkPos, TilePos};
use crate::world::generator::WorldGen;
use crate::world::tile::TileType;

/// Owns every chunk of one world.
///
/// Chunks live in one of three places:
/// * `active`: loaded, readable and writable.
/// * `edits`: modified chunks that left the active set. They are the persisted state and are
///   never dropped.
/// * `cache`: unmodified chunks that left the active set, bounded. Losing one only costs a
///   regeneration.
pub(crate) struct ChunkStore {
    gen: WorldGen,
    active: HashMap<ChunkPos, Chunk>,
    edits: HashMap<ChunkPos, Chunk>,
    cache: ChunkCache,
    center: Option<ChunkPos>,
    radius: i32,
}

impl ChunkStore {
    pub(crate) fn new(gen: WorldGen, cache_capacity: usize, radius: i32) -> Self {
        Self {
            gen,
            active: HashMap::new(),
            edits: HashMap::new(),
            cache: ChunkCache::new(cache_capacity),
            center: None,
            radius: radius.max(0),
        }
    }

    pub(crate) fn gen(&self) -> &WorldGen {
        &self.gen
    }

    pub(crate) fn radius(&self) -> i32 {
        self.radius
    }

    /// Tiles outside the world resolve to sentinels without touching storage.
    fn sentinel(&self, x: i32, y: i32) -> Option<TileType> {
        let rules = self.gen.rules();
        if y < rules.sky_threshold {
            Some(TileType::Air)
        } else if !rules.in_world_x(x) || y >= rules.world_height {
            Some(TileType::Bedrock)
        } else {
            None
        }
    }

    fn chunk_mut(&mut self, pos: ChunkPos) -> &mut Chunk {
        match self.active.entry(pos) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let chunk = match self.edits.remove(&pos) {
                    Some(chunk) => chunk,
                    None => match self.cache.take(&pos) {
                        Some(chunk) => chunk,
                        None => self.gen.generate_chunk(pos),
                    },
                };
                entry.insert(chunk)
            }
        }
    }

    pub(crate) fn get_tile(&mut self, x: i32, y: i32) -> TileType {
        if let Some(tile) = self.sentinel(x, y) {
            return tile;
        }
        let pos = TilePos::new(x, y);
        let (lx, ly) = pos.local();
        self.chunk_mut(pos.chunk()).get(lx, ly)
    }

    /// Returns whether the tile actually changed. Writes outside the world are ignored.
    pub(crate) fn set_tile(&mut self, x: i32, y: i32, tile: TileType) -> bool {
        let rules = self.gen.rules();
        if !rules.in_world_x(x) || !(0..rules.world_height).contains(&y) {
            return false;
        }
        let pos = TilePos::new(x, y);
        let (lx, ly) = pos.local();
        self.chunk_mut(pos.chunk()).set(lx, ly, tile)
    }

    fn evict(&mut self, pos: ChunkPos) {
        let Some(mut chunk) = self.active.remove(&pos) else {
            return;
        };
        if chunk.is_modified() {
            if chunk.same_tiles(&self.gen.generate_chunk(pos)) {
                chunk.clear_modified();
            } else {
                self.edits.insert(pos, chunk);
                return;
            }
        }
        self.cache.put(pos, chunk);
    }

    /// Moves the active window. Returns false when the center chunk did not change.
    pub(crate) fn update_active_center(&mut self, world_x: i32, world_y: i32) -> bool {
        let center = TilePos::new(world_x, world_y).chunk();
        if self.center == Some(center) {
            return false;
        }
        self.center = Some(center);

        let keep = self.radius + 1;
        let stale: Vec<ChunkPos> = self
            .active
            .keys()
            .filter(|pos| pos.distance(&center) > keep)
            .copied()
            .collect();
        for pos in &stale {
            self.evict(*pos);
        }

        let mut generated = 0;
        for y in center.y - self.radius..=center.y + self.radius {
            for x in center.x - self.radius..=center.x + self.radius {
                let pos = ChunkPos::new(x, y);
                if self.gen.chunk_in_world(pos) && !self.active.contains_key(&pos) {
                    self.chunk_mut(pos);
                    generated += 1;
                }
            }
        }
        debug!(
            "Active center moved to {center}: evicted {}, loaded {generated}",
            stale.len()
        );
        true
    }

    /// Evicts active chunks farther than `radius` from all of `centers`. Returns how many went.
    pub(crate) fn retain_near(&mut self, centers: &[ChunkPos], radius: i32) -> usize {
        let stale: Vec<ChunkPos> = self
            .active
            .keys()
            .filter(|pos| centers.iter().all(|c| pos.distance(c) > radius))
            .copied()
            .collect();
        for pos in &stale {
            self.evict(*pos);
        }
        stale.len()
    }

    /// The chunk as served to clients. Chunks outside the world are generated as sentinels and
    /// not stored.
    pub(crate) fn chunk_for_request(&mut self, pos: ChunkPos) -> Chunk {
        if !self.gen.chunk_in_world(pos) {
            return self.gen.generate_chunk(pos);
        }
        self.chunk_mut(pos).clone()
    }

    /// Replaces a whole chunk with client-provided contents.
    pub(crate) fn replace_chunk(&mut self, pos: ChunkPos, mut chunk: Chunk) -> bool {
        if !self.gen.chunk_in_world(pos) {
            return false;
        }
        chunk.mark_modified();
        self.cache.take(&pos);
        self.edits.remove(&pos);
        self.active.insert(pos, chunk);
        true
    }

    /// Installs a chunk restored from a save. It goes to the edit overlay until it is touched.
    pub(crate) fn restore_edit(&mut self, pos: ChunkPos, mut chunk: Chunk) {
        chunk.mark_modified();
        self.active.remove(&pos);
        self.cache.take(&pos);
        self.edits.insert(pos, chunk);
    }

    /// Every chunk whose contents differ from fresh generation, sorted by position.
    pub(crate) fn modified_chunks(&self) -> Vec<(ChunkPos, &Chunk)> {
        let mut chunks: Vec<(ChunkPos, &Chunk)> = self
            .edits
            .iter()
            .chain(self.active.iter().filter(|(_, c)| c.is_modified()))
            .filter(|(pos, chunk)| !chunk.same_tiles(&self.gen.generate_chunk(**pos)))
            .map(|(pos, chunk)| (*pos, chunk))
            .collect();
        chunks.sort_by_key(|(pos, _)| *pos);
        chunks
    }

    pub(crate) fn active_len(&self) -> usize {
        self.active.len()
    }

    pub(crate) fn cached_len(&self) -> usize {
        self.cache.len()
    }

    pub(crate) fn edited_len(&self) -> usize {
        self.edits.len()
    }

    #[cfg(test)]
    fn is_cached(&self, pos: &ChunkPos) -> bool {
        self.cache.contains(pos)
    }
}

#[cfg(test)]
mod test {
    use test_case::test_case;

    use super::*;
    use crate::world::biome::{BiomeMap, BiomeTable};
    use crate::world::rules::Ruleset;
    use crate::world::terrain::HeightField;
    use crate::world::CHUNK_SIZE;

    fn store(capacity: usize) -> ChunkStore {
        ChunkStore::new(WorldGen::new(42, Ruleset::server()), capacity, 2)
    }

    /// First solid, non-bedrock tile at column `x`, searching down from the surface.
    fn solid_below_surface(store: &mut ChunkStore, x: i32) -> (i32, TileType) {
        let surface = store.gen().heights().get(x).unwrap();
        (surface + 4..)
            .map(|y| (y, store.get_tile(x, y)))
            .find(|(_, t)| t.is_solid() && *t != TileType::Bedrock)
            .unwrap()
    }

    /// Flat ground at row 50 and no caves, so everything below is solid.
    fn solid_store() -> ChunkStore {
        let rules = Ruleset {
            clouds: None,
            cave_threshold: 10.0,
            tunnels: false,
            chambers: false,
            ..Ruleset::server()
        };
        let gen = WorldGen::with_inputs(
            42,
            rules,
            BiomeTable::standard(),
            BiomeMap::uniform(1, 2000),
            HeightField::flat(50, 2000),
        );
        ChunkStore::new(gen, 4, 2)
    }

    #[test]
    fn modified_tile_survives_moving_away_and_back() {
        let mut store = solid_store();
        store.update_active_center(100, 100);
        store.set_tile(100, 100, TileType::Stone);
        assert_eq!(store.get_tile(100, 100), TileType::Stone);
        assert!(store.set_tile(100, 100, TileType::Air));
        assert_eq!(store.get_tile(100, 100), TileType::Air);

        store.update_active_center(100 + 40 * CHUNK_SIZE as i32, 100);
        let pos = TilePos::new(100, 100).chunk();
        assert!(!store.is_cached(&pos));
        assert_eq!(store.edited_len(), 1);

        store.update_active_center(100, 100);
        assert_eq!(store.get_tile(100, 100), TileType::Air);
        assert_eq!(store.edited_len(), 0);
    }

    #[test]
    fn no_op_writes_stay_unmodified() {
        let mut store = store(4);
        let (y, tile) = solid_below_surface(&mut store, 300);
        assert!(!store.set_tile(300, y, tile));
        assert!(store.modified_chunks().is_empty());

        store.update_active_center(300 + 40 * CHUNK_SIZE as i32, y);
        let pos = TilePos::new(300, y).chunk();
        assert!(store.is_cached(&pos));
        assert_eq!(store.edited_len(), 0);
    }

    #[test]
    fn edits_reverted_by_hand_are_cached_again() {
        let mut store = store(8);
        let (y, tile) = solid_below_surface(&mut store, 500);
        assert!(store.set_tile(500, y, TileType::Air));
        assert!(store.set_tile(500, y, tile));
        assert!(store.modified_chunks().is_empty());

        let pos = TilePos::new(500, y).chunk();
        store.retain_near(&[], 0);
        assert!(store.is_cached(&pos));
        assert_eq!(store.edited_len(), 0);
    }

    #[test]
    fn cache_stays_bounded() {
        let mut store = store(3);
        for step in 0..20 {
            store.update_active_center(step * 6 * CHUNK_SIZE as i32, 200);
            assert!(store.cached_len() <= 3);
        }
    }

    #[test]
    fn same_center_is_a_no_op() {
        let mut store = store(3);
        assert!(store.update_active_center(320, 200));
        let loaded = store.active_len();
        assert!(!store.update_active_center(322, 201));
        assert_eq!(store.active_len(), loaded);
        assert_eq!(loaded, 25);
    }

    #[test_case(i32::MIN, 0)]
    #[test_case(0, i32::MIN)]
    #[test_case(-1, 300)]
    #[test_case(2000, 300)]
    #[test_case(5, i32::MAX)]
    #[test_case(i32::MAX, i32::MAX)]
    #[test_case(17, 511)]
    fn any_coordinate_is_a_valid_tile(x: i32, y: i32) {
        let mut store = store(2);
        let tile = store.get_tile(x, y);
        assert!(TileType::from_id(tile.id()).is_some());
        assert!(!store.set_tile(x, y, TileType::Air) || (0..2000).contains(&x));
    }

    #[test]
    fn sky_fast_path_does_not_load_chunks() {
        let mut store = store(2);
        assert_eq!(store.get_tile(50, 3), TileType::Air);
        assert_eq!(store.get_tile(-50, 3), TileType::Air);
        assert_eq!(store.get_tile(-50, 300), TileType::Bedrock);
        assert_eq!(store.active_len(), 0);
    }

    #[test]
    fn requested_chunks_are_stable() {
        let mut store = store(2);
        let pos = ChunkPos::new(3, 12);
        let first = store.chunk_for_request(pos).to_bytes();
        assert_eq!(first, store.chunk_for_request(pos).to_bytes());

        let outside = ChunkPos::new(-4, 12);
        assert_eq!(
            store.chunk_for_request(outside),
            Chunk::filled(TileType::Bedrock)
        );
        assert_eq!(store.active_len(), 1);
    }

    #[test]
    fn replaced_chunks_are_reported_modified() {
        let mut store = store(2);
        let pos = ChunkPos::new(4, 12);
        assert!(store.replace_chunk(pos, Chunk::filled(TileType::Gold)));
        let modified = store.modified_chunks();
        assert_eq!(modified.len(), 1);
        assert_eq!(modified[0].0, pos);
        assert!(!store.replace_chunk(ChunkPos::new(-1, 0), Chunk::filled(TileType::Gold)));
    }
}
