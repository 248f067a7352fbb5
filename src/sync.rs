use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use chrono::Utc;
use log::{debug, error, info, warn};
use uuid::Uuid;

use crate::cooldown::EditCooldown;
use crate::err::{ProtError, WorldError};
use crate::packets::client::{self, ClientPackets};
use crate::packets::server;
use crate::packets::Outbound;
use crate::protocol_types::compound::{InventoryEntry, PlayerSummary};
use crate::protocol_types::primitives::SizedVec;
use crate::world::chunk::Chunk;
use crate::world::coords::{ChunkPos, TilePos};
use crate::world::persistence::{self, SaveFile};
use crate::world::tile::TileType;
use crate::world::{Player, World};
use crate::Assets;

// A panic while holding a lock leaves the data as the last completed operation left it;
// the world stays usable, so poisoning is ignored.
pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(PoisonError::into_inner)
}

fn heights(world: &World) -> SizedVec<i32> {
    world.gen().heights().heights().to_vec().into()
}

fn biome_ids(world: &World) -> SizedVec<u8> {
    world.gen().biomes().ids().to_vec().into()
}

pub(crate) fn initialize(world: &World, id: Uuid) -> client::Initialize {
    client::Initialize::new(
        id,
        world
            .players()
            .into_iter()
            .map(PlayerSummary::from)
            .collect::<Vec<_>>()
            .into(),
        world.seed(),
        heights(world),
        biome_ids(world),
    )
}

pub(crate) fn world_reset(world: &World) -> client::WorldReset {
    client::WorldReset::new(world.seed(), heights(world), biome_ids(world))
}

/// Registers the player and tells everybody else about them.
pub(crate) fn join(world: &mut World, id: Uuid, name: &str) -> Vec<Outbound> {
    let (x, y) = world.spawn_point();
    world.add_player(Player::new(id, name.to_string(), x, y));
    let summary = world
        .player(&id)
        .map(PlayerSummary::from)
        .unwrap_or_else(|| PlayerSummary {
            id,
            name: name.to_string(),
            x,
            y,
            direction: 0,
            score: 0,
        });
    vec![
        Outbound::Reply(ClientPackets::Initialize(initialize(world, id))),
        Outbound::BroadcastOthers(ClientPackets::PlayerJoined(client::PlayerJoined::new(
            summary,
        ))),
    ]
}

pub(crate) fn leave(world: &mut World, id: &Uuid) -> Option<ClientPackets> {
    world
        .remove_player(id)
        .map(|player| ClientPackets::PlayerLeft(client::PlayerLeft::new(player.id)))
}

pub(crate) fn chunk_data(world: &mut World, chunk_x: i32, chunk_y: i32) -> client::ChunkData {
    let chunk = world.chunk_for_request(ChunkPos::new(chunk_x, chunk_y));
    client::ChunkData::new(chunk_x, chunk_y, chunk.to_bytes().into(), true)
}

fn inventory(player: &Player) -> client::InventoryUpdate {
    let items: Vec<InventoryEntry> = player
        .inventory
        .iter()
        .map(|(tile, count)| InventoryEntry {
            tile: tile.id(),
            count: *count as i32,
        })
        .collect();
    client::InventoryUpdate::new(items.into(), player.score as i32)
}

/// Applies one tile edit. Suppressed and no-op edits produce nothing.
pub(crate) fn dig(
    world: &mut World,
    cooldown: &mut EditCooldown,
    player_id: Uuid,
    packet: &server::BlockDig,
    now: Instant,
) -> Result<Vec<Outbound>, ProtError> {
    let tile = TileType::from_id(packet.tile_type)
        .ok_or_else(|| ProtError::Malformed(format!("Unknown tile id {}", packet.tile_type)))?;
    if !cooldown.try_acquire(TilePos::new(packet.x, packet.y), now) {
        debug!("Edit at {},{} suppressed by cooldown", packet.x, packet.y);
        return Ok(vec![]);
    }

    let original = world.get_tile(packet.x, packet.y);
    if !world.set_tile(packet.x, packet.y, tile) {
        return Ok(vec![]);
    }
    world.record_block_update();
    if original.id() != packet.original_tile_type {
        debug!(
            "Client expected {} at {},{} but it was {original}",
            packet.original_tile_type, packet.x, packet.y
        );
    }

    let mut out = vec![Outbound::Broadcast(ClientPackets::BlockUpdate(
        client::BlockUpdate::new(packet.x, packet.y, tile.id(), player_id, original.id()),
    ))];
    if packet.item_collected && !original.is_air() {
        if let Some(player) = world.player_mut(&player_id) {
            player.collect(original);
            out.push(Outbound::Reply(ClientPackets::InventoryUpdate(inventory(
                player,
            ))));
        }
    }
    Ok(out)
}

pub(crate) fn save_chunk(world: &mut World, packet: &server::SaveChunk) -> Result<Vec<Outbound>, ProtError> {
    let chunk = Chunk::from_bytes(&packet.data.vec).map_err(ProtError::Malformed)?;
    let pos = ChunkPos::new(packet.chunk_x, packet.chunk_y);
    if !world.replace_chunk(pos, chunk) {
        return Err(ProtError::Malformed(format!("Chunk {pos} is outside the world")));
    }
    Ok(vec![Outbound::BroadcastOthers(ClientPackets::ChunkData(
        client::ChunkData::new(packet.chunk_x, packet.chunk_y, packet.data.clone(), false),
    ))])
}

pub(crate) fn move_player(world: &mut World, id: Uuid, packet: &server::PlayerMove) -> Vec<Outbound> {
    let Some(player) = world.player_mut(&id) else {
        return vec![];
    };
    if !packet.x.is_finite() || !packet.y.is_finite() {
        warn!("Ignoring non-finite position from {id}");
        return vec![];
    }
    player.x = packet.x;
    player.y = packet.y;
    player.direction = packet.direction;
    vec![Outbound::BroadcastOthers(ClientPackets::PlayerMoved(
        client::PlayerMoved::new(id, packet.x, packet.y, packet.direction),
    ))]
}

/// Saves the world. Returns false when `only_if_dirty` is set and nothing changed.
pub(crate) async fn save_world(assets: &Assets, only_if_dirty: bool) -> Result<bool, WorldError> {
    let save = {
        let mut world = write(&assets.world);
        if only_if_dirty && !world.is_dirty() {
            return Ok(false);
        }
        world.mark_saved(Utc::now());
        SaveFile::capture(&world)
    };
    if let Err(e) = persistence::save(&save, &assets.config.save_path).await {
        error!("Saving the world failed: {e}");
        write(&assets.world).mark_dirty();
        return Err(e);
    }
    Ok(true)
}

/// Replaces the world with a fresh one, persists it and tells every client. Clients are told
/// even when persisting fails, since the in-memory world has already changed.
pub(crate) async fn reset_world(assets: &Assets, seed: Option<i64>) -> Result<(), WorldError> {
    let seed = seed.unwrap_or_else(rand::random);
    let (packet, save) = {
        let mut world = write(&assets.world);
        world.reset(seed);
        world.mark_saved(Utc::now());
        (world_reset(&world), SaveFile::capture(&world))
    };
    lock(&assets.cooldown).clear();

    let saved = persistence::save(&save, &assets.config.save_path).await;
    if let Err(ref e) = saved {
        error!("Persisting the reset world failed: {e}");
        write(&assets.world).mark_dirty();
    }
    info!("World reset to seed {seed}");
    assets
        .hub
        .broadcast(ClientPackets::WorldReset(packet), None)
        .await;
    saved
}

/// Periodic housekeeping: cooldown expiry, then moving far chunks out of the active set.
pub(crate) fn cleanup(assets: &Assets, now: Instant) -> (usize, usize) {
    let expired = lock(&assets.cooldown).expire(now);
    let trimmed = write(&assets.world).trim(assets.config.active_radius + 1);
    (expired, trimmed)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use test_case::test_case;

    use super::*;
    use crate::world::rules::Ruleset;

    fn world() -> World {
        World::new(21, Ruleset::server(), 16, 2)
    }

    fn replies(out: &[Outbound]) -> Vec<&ClientPackets> {
        out.iter()
            .filter_map(|o| match o {
                Outbound::Reply(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn block_updates(out: &[Outbound]) -> usize {
        out.iter()
            .filter(|o| matches!(o, Outbound::Broadcast(ClientPackets::BlockUpdate(_))))
            .count()
    }

    fn dig_packet(world: &mut World, x: i32, y: i32, collect: bool) -> server::BlockDig {
        let original = world.get_tile(x, y);
        let target = if original.is_air() {
            TileType::Dirt
        } else {
            TileType::Air
        };
        server::BlockDig::new(x, y, target.id(), collect, original.id())
    }

    #[test]
    fn repeated_dig_inside_cooldown_broadcasts_once() {
        let mut world = world();
        let mut cooldown = EditCooldown::new(Duration::from_secs(1));
        let id = Uuid::new_v4();
        let start = Instant::now();

        let first = dig_packet(&mut world, 300, 300, false);
        assert_eq!(block_updates(&dig(&mut world, &mut cooldown, id, &first, start).unwrap()), 1);

        let second = dig_packet(&mut world, 300, 300, false);
        let out = dig(&mut world, &mut cooldown, id, &second, start + Duration::from_millis(200));
        assert_eq!(block_updates(&out.unwrap()), 0);

        let third = dig_packet(&mut world, 300, 300, false);
        let out = dig(&mut world, &mut cooldown, id, &third, start + Duration::from_secs(2));
        assert_eq!(block_updates(&out.unwrap()), 1);
        assert_eq!(world.metadata().block_updates, 2);
    }

    #[test]
    fn block_update_reports_the_true_original() {
        let mut world = world();
        let mut cooldown = EditCooldown::new(Duration::from_secs(1));
        let mut packet = dig_packet(&mut world, 400, 320, false);
        let truth = packet.original_tile_type;
        packet.original_tile_type = TileType::Diamond.id();
        let out = dig(&mut world, &mut cooldown, Uuid::nil(), &packet, Instant::now()).unwrap();
        match &out[0] {
            Outbound::Broadcast(ClientPackets::BlockUpdate(update)) => {
                assert_eq!(update.original_tile_type, truth);
                assert_eq!(update.tile_type, packet.tile_type);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_op_dig_changes_nothing() {
        let mut world = world();
        let mut cooldown = EditCooldown::new(Duration::from_secs(1));
        let tile = world.get_tile(500, 300);
        let packet = server::BlockDig::new(500, 300, tile.id(), false, tile.id());
        let out = dig(&mut world, &mut cooldown, Uuid::nil(), &packet, Instant::now()).unwrap();
        assert!(out.is_empty());
        assert!(!world.is_dirty());
        assert_eq!(world.metadata().block_updates, 0);
    }

    #[test]
    fn collecting_credits_the_digger() {
        let mut world = world();
        let mut cooldown = EditCooldown::new(Duration::from_secs(1));
        let id = Uuid::new_v4();
        join(&mut world, id, "worker");
        let (y, original) = (250..)
            .map(|y| (y, world.get_tile(600, y)))
            .find(|(_, t)| t.is_solid())
            .unwrap();
        let packet = server::BlockDig::new(600, y, TileType::Air.id(), true, original.id());
        let out = dig(&mut world, &mut cooldown, id, &packet, Instant::now()).unwrap();
        match replies(&out).as_slice() {
            [ClientPackets::InventoryUpdate(update)] => {
                assert_eq!(update.score, 1);
                assert_eq!(update.items.vec[0].tile, original.id());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unknown_tile_is_malformed() {
        let mut world = world();
        let mut cooldown = EditCooldown::new(Duration::from_secs(1));
        let packet = server::BlockDig::new(5, 300, 250, false, 0);
        let out = dig(&mut world, &mut cooldown, Uuid::nil(), &packet, Instant::now());
        assert!(matches!(out, Err(ProtError::Malformed(_))));
    }

    #[test]
    fn same_chunk_twice_is_identical() {
        let mut world = world();
        let first = chunk_data(&mut world, 12, 14);
        let second = chunk_data(&mut world, 12, 14);
        assert_eq!(first.data, second.data);
        assert!(first.server_generated);
        assert_eq!(first.data.vec.len(), 256);
    }

    #[test]
    fn join_replies_and_announces() {
        let mut world = world();
        let first = Uuid::new_v4();
        join(&mut world, first, "one");
        let second = Uuid::new_v4();
        let out = join(&mut world, second, "two");
        match &out[..] {
            [Outbound::Reply(ClientPackets::Initialize(init)), Outbound::BroadcastOthers(ClientPackets::PlayerJoined(joined))] =>
            {
                assert_eq!(init.id, second);
                assert_eq!(init.players.vec.len(), 2);
                assert_eq!(init.world_seed, 21);
                assert_eq!(init.terrain_heights.vec.len(), 2000);
                assert_eq!(joined.player.name, "two");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(leave(&mut world, &second).is_some());
        assert!(leave(&mut world, &second).is_none());
    }

    #[test]
    fn saved_chunks_go_to_others() {
        let mut world = world();
        let packet = server::SaveChunk::new(3, 20, vec![TileType::Gold.id(); 256].into());
        let out = save_chunk(&mut world, &packet).unwrap();
        assert!(matches!(&out[..], [Outbound::BroadcastOthers(ClientPackets::ChunkData(_))]));
        assert_eq!(world.get_tile(3 * 16, 20 * 16), TileType::Gold);
        assert!(world.is_dirty());

        let short = server::SaveChunk::new(3, 20, vec![0; 10].into());
        assert!(save_chunk(&mut world, &short).is_err());
        let outside = server::SaveChunk::new(-9, 20, vec![0; 256].into());
        assert!(save_chunk(&mut world, &outside).is_err());
    }

    #[test_case(i32::MAX / 16, 3)]
    #[test_case((1 << 28) + 3, 20)]
    #[test_case(3, i32::MIN)]
    #[test_case(i32::MIN, i32::MAX)]
    fn chunks_far_outside_the_world_are_never_stored(chunk_x: i32, chunk_y: i32) {
        let mut world = world();
        let data = chunk_data(&mut world, chunk_x, chunk_y);
        assert_eq!(data.data.vec.len(), 256);
        assert!(data
            .data
            .vec
            .iter()
            .all(|&id| id == TileType::Bedrock.id() || id == TileType::Air.id()));

        let packet = server::SaveChunk::new(chunk_x, chunk_y, vec![TileType::Gold.id(); 256].into());
        assert!(matches!(save_chunk(&mut world, &packet), Err(ProtError::Malformed(_))));
        assert!(!world.is_dirty());
        assert!(world.store().modified_chunks().is_empty());
    }

    #[test]
    fn moves_are_relayed() {
        let mut world = world();
        let id = Uuid::new_v4();
        join(&mut world, id, "mover");
        let out = move_player(&mut world, id, &server::PlayerMove::new(12.5, 80.0, 1));
        assert_eq!(out.len(), 1);
        assert_eq!(world.player(&id).map(|p| p.x), Some(12.5));
        assert!(move_player(&mut world, id, &server::PlayerMove::new(f32::NAN, 0.0, 0)).is_empty());
        assert!(move_player(&mut world, Uuid::nil(), &server::PlayerMove::new(1.0, 1.0, 0)).is_empty());
    }
}
