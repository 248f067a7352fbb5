use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::world::chunk::Chunk;
use crate::world::coords::{ChunkPos, TilePos};
use crate::world::generator::WorldGen;
use crate::world::noise::WorldSeed;
use crate::world::rules::Ruleset;
use crate::world::store::ChunkStore;
use crate::world::tile::TileType;

pub(crate) mod biome;
pub(crate) mod cache;
pub(crate) mod chunk;
pub(crate) mod coords;
pub(crate) mod generator;
pub(crate) mod local;
pub(crate) mod noise;
pub(crate) mod persistence;
pub(crate) mod rules;
pub(crate) mod store;
pub(crate) mod terrain;
pub(crate) mod tile;

pub(crate) const CHUNK_SIZE: usize = 16;
pub(crate) const CHUNK_AREA: usize = CHUNK_SIZE * CHUNK_SIZE;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WorldMetadata {
    pub(crate) created_at: DateTime<Utc>,
    #[serde(default)]
    pub(crate) last_saved: Option<DateTime<Utc>>,
    #[serde(default)]
    pub(crate) block_updates: u64,
    /// Fields written by other tools are carried through untouched.
    #[serde(flatten)]
    pub(crate) extra: BTreeMap<String, serde_json::Value>,
}

impl WorldMetadata {
    pub(crate) fn new() -> Self {
        Self {
            created_at: Utc::now(),
            last_saved: None,
            block_updates: 0,
            extra: BTreeMap::new(),
        }
    }
}

pub(crate) struct Player {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) direction: u8,
    pub(crate) inventory: BTreeMap<TileType, u32>,
    pub(crate) score: u32,
    pub(crate) joined_at: DateTime<Utc>,
}

impl Player {
    pub(crate) fn new(id: Uuid, name: String, x: f32, y: f32) -> Self {
        Self {
            id,
            name,
            x,
            y,
            direction: 0,
            inventory: BTreeMap::new(),
            score: 0,
            joined_at: Utc::now(),
        }
    }

    pub(crate) fn chunk(&self) -> ChunkPos {
        TilePos::new(self.x.floor() as i32, self.y.floor() as i32).chunk()
    }

    pub(crate) fn collect(&mut self, tile: TileType) {
        *self.inventory.entry(tile).or_insert(0) += 1;
        self.score += 1;
    }
}

/// The explicit world context: generation inputs, chunk storage, metadata and the roster.
/// One instance per world; the server keeps it behind a lock in its shared assets.
pub(crate) struct World {
    store: ChunkStore,
    metadata: WorldMetadata,
    players: HashMap<Uuid, Player>,
    dirty: bool,
    cache_capacity: usize,
}

impl World {
    pub(crate) fn new(seed: WorldSeed, rules: Ruleset, cache_capacity: usize, radius: i32) -> Self {
        Self::from_parts(
            WorldGen::new(seed, rules),
            WorldMetadata::new(),
            cache_capacity,
            radius,
        )
    }

    pub(crate) fn from_parts(
        gen: WorldGen,
        metadata: WorldMetadata,
        cache_capacity: usize,
        radius: i32,
    ) -> Self {
        Self {
            store: ChunkStore::new(gen, cache_capacity, radius),
            metadata,
            players: HashMap::new(),
            dirty: false,
            cache_capacity,
        }
    }

    pub(crate) fn seed(&self) -> WorldSeed {
        self.store.gen().seed()
    }

    pub(crate) fn gen(&self) -> &WorldGen {
        self.store.gen()
    }

    pub(crate) fn rules(&self) -> &Ruleset {
        self.store.gen().rules()
    }

    pub(crate) fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub(crate) fn metadata(&self) -> &WorldMetadata {
        &self.metadata
    }

    pub(crate) fn get_tile(&mut self, x: i32, y: i32) -> TileType {
        self.store.get_tile(x, y)
    }

    pub(crate) fn set_tile(&mut self, x: i32, y: i32, tile: TileType) -> bool {
        let changed = self.store.set_tile(x, y, tile);
        self.dirty |= changed;
        changed
    }

    pub(crate) fn update_active_center(&mut self, x: i32, y: i32) -> bool {
        self.store.update_active_center(x, y)
    }

    pub(crate) fn chunk_for_request(&mut self, pos: ChunkPos) -> Chunk {
        self.store.chunk_for_request(pos)
    }

    pub(crate) fn replace_chunk(&mut self, pos: ChunkPos, chunk: Chunk) -> bool {
        let replaced = self.store.replace_chunk(pos, chunk);
        self.dirty |= replaced;
        replaced
    }

    pub(crate) fn restore_edit(&mut self, pos: ChunkPos, chunk: Chunk) {
        self.store.restore_edit(pos, chunk);
    }

    pub(crate) fn record_block_update(&mut self) -> u64 {
        self.metadata.block_updates += 1;
        self.metadata.block_updates
    }

    /// Throws away every chunk and regenerates the inputs from `seed`. Players stay connected.
    pub(crate) fn reset(&mut self, seed: WorldSeed) {
        let rules = self.rules().clone();
        let radius = self.store.radius();
        info!("Resetting world with seed {seed} ({} ruleset)", rules.name);
        self.store = ChunkStore::new(WorldGen::new(seed, rules), self.cache_capacity, radius);
        self.metadata = WorldMetadata {
            last_saved: self.metadata.last_saved,
            extra: std::mem::take(&mut self.metadata.extra),
            ..WorldMetadata::new()
        };
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_saved(&mut self, at: DateTime<Utc>) {
        self.metadata.last_saved = Some(at);
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Evicts server-side chunks that are farther than `radius` from every player.
    pub(crate) fn trim(&mut self, radius: i32) -> usize {
        let centers: Vec<ChunkPos> = self.players.values().map(Player::chunk).collect();
        self.store.retain_near(&centers, radius)
    }

    /// A spawn point above the surface in the middle of the world.
    pub(crate) fn spawn_point(&self) -> (f32, f32) {
        let x = self.rules().world_width / 2;
        let surface = self
            .gen()
            .heights()
            .get(x)
            .unwrap_or(self.rules().sky_threshold);
        (x as f32, (surface - 2) as f32)
    }

    pub(crate) fn add_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub(crate) fn remove_player(&mut self, id: &Uuid) -> Option<Player> {
        self.players.remove(id)
    }

    pub(crate) fn player(&self, id: &Uuid) -> Option<&Player> {
        self.players.get(id)
    }

    pub(crate) fn player_mut(&mut self, id: &Uuid) -> Option<&mut Player> {
        self.players.get_mut(id)
    }

    /// Players in join order.
    pub(crate) fn players(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| (p.joined_at, p.id));
        players
    }
}
