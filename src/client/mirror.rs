use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use log::warn;

use crate::cooldown::EditCooldown;
use crate::packets::client::{BlockUpdate, ChunkData, ClientPackets, Initialize, WorldReset};
use crate::packets::server;
use crate::world::chunk::Chunk;
use crate::world::coords::{ChunkPos, TilePos};
use crate::world::noise::WorldSeed;
use crate::world::tile::TileType;

pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
pub(crate) const CLIENT_COOLDOWN: Duration = Duration::from_millis(500);

/// A client's partial copy of the server world. It never generates chunks itself: the server's
/// copy may carry edits and chambers that fresh generation would not reproduce.
pub(crate) struct ChunkMirror {
    seed: WorldSeed,
    heights: Vec<i32>,
    biomes: Vec<u8>,
    chunks: HashMap<ChunkPos, Chunk>,
    /// Requested or received. A chunk in here is never requested again.
    loaded: HashSet<ChunkPos>,
    pending: HashMap<ChunkPos, Instant>,
    timeout: Duration,
    cooldown: EditCooldown,
}

impl ChunkMirror {
    pub(crate) fn new(init: &Initialize) -> Self {
        Self::with_timeout(init, REQUEST_TIMEOUT)
    }

    pub(crate) fn with_timeout(init: &Initialize, timeout: Duration) -> Self {
        Self {
            seed: init.world_seed,
            heights: init.terrain_heights.vec.clone(),
            biomes: init.biome_map.vec.clone(),
            chunks: HashMap::new(),
            loaded: HashSet::new(),
            pending: HashMap::new(),
            timeout,
            cooldown: EditCooldown::new(CLIENT_COOLDOWN),
        }
    }

    pub(crate) fn seed(&self) -> WorldSeed {
        self.seed
    }

    pub(crate) fn width(&self) -> i32 {
        self.heights.len() as i32
    }

    pub(crate) fn surface(&self, x: i32) -> Option<i32> {
        usize::try_from(x).ok().and_then(|x| self.heights.get(x)).copied()
    }

    pub(crate) fn biome(&self, x: i32) -> Option<u8> {
        usize::try_from(x).ok().and_then(|x| self.biomes.get(x)).copied()
    }

    pub(crate) fn loaded_len(&self) -> usize {
        self.loaded.len()
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Applies a server packet. Returns whether the mirror changed.
    pub(crate) fn apply(&mut self, packet: &ClientPackets) -> bool {
        match packet {
            ClientPackets::ChunkData(data) => self.apply_chunk(data),
            ClientPackets::BlockUpdate(update) => self.apply_block_update(update),
            ClientPackets::WorldReset(reset) => {
                self.apply_reset(reset);
                true
            }
            _ => false,
        }
    }

    /// Marks `pos` as requested. False when it was requested or received before.
    pub(crate) fn request(&mut self, pos: ChunkPos, now: Instant) -> bool {
        if !self.loaded.insert(pos) {
            return false;
        }
        self.pending.insert(pos, now);
        true
    }

    pub(crate) fn apply_chunk(&mut self, data: &ChunkData) -> bool {
        let pos = ChunkPos::new(data.chunk_x, data.chunk_y);
        self.pending.remove(&pos);
        match Chunk::from_bytes(&data.data.vec) {
            Ok(chunk) => {
                self.chunks.insert(pos, chunk);
                self.loaded.insert(pos);
                true
            }
            Err(e) => {
                warn!("Discarding chunk {pos}: {e}");
                // let it be requested again
                self.loaded.remove(&pos);
                false
            }
        }
    }

    /// Edits to chunks this client has not received are ignored; the chunk arrives with the
    /// edit already applied.
    pub(crate) fn apply_block_update(&mut self, update: &BlockUpdate) -> bool {
        let Some(tile) = TileType::from_id(update.tile_type) else {
            warn!("Block update with unknown tile {}", update.tile_type);
            return false;
        };
        let pos = TilePos::new(update.x, update.y);
        let (lx, ly) = pos.local();
        match self.chunks.get_mut(&pos.chunk()) {
            Some(chunk) => chunk.set(lx, ly, tile),
            None => false,
        }
    }

    pub(crate) fn apply_reset(&mut self, reset: &WorldReset) {
        self.seed = reset.world_seed;
        self.heights = reset.terrain_heights.vec.clone();
        self.biomes = reset.biome_map.vec.clone();
        self.chunks.clear();
        self.loaded.clear();
        self.pending.clear();
        self.cooldown.clear();
    }

    /// Gives up on requests older than the timeout so they can be sent again.
    pub(crate) fn expire_pending(&mut self, now: Instant) -> Vec<ChunkPos> {
        let timeout = self.timeout;
        let expired: Vec<ChunkPos> = self
            .pending
            .iter()
            .filter(|(_, sent)| now.saturating_duration_since(**sent) >= timeout)
            .map(|(pos, _)| *pos)
            .collect();
        for pos in &expired {
            self.pending.remove(pos);
            self.loaded.remove(pos);
        }
        self.cooldown.expire(now);
        expired
    }

    /// `None` until the chunk has arrived.
    pub(crate) fn tile(&self, x: i32, y: i32) -> Option<TileType> {
        let pos = TilePos::new(x, y);
        let (lx, ly) = pos.local();
        self.chunks.get(&pos.chunk()).map(|chunk| chunk.get(lx, ly))
    }

    /// Builds the dig request for an edit, or nothing when the chunk is missing, the tile
    /// already has that type, or the position is still cooling down.
    pub(crate) fn try_dig(
        &mut self,
        x: i32,
        y: i32,
        tile: TileType,
        item_collected: bool,
        now: Instant,
    ) -> Option<server::BlockDig> {
        let original = self.tile(x, y)?;
        if original == tile || !self.cooldown.try_acquire(TilePos::new(x, y), now) {
            return None;
        }
        Some(server::BlockDig::new(
            x,
            y,
            tile.id(),
            item_collected,
            original.id(),
        ))
    }
}
