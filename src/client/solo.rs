use std::path::PathBuf;

use log::info;

use crate::config::ServerConfig;
use crate::err::WorldError;
use crate::world::coords::TilePos;
use crate::world::local::LocalStore;
use crate::world::noise::WorldSeed;
use crate::world::rules::Ruleset;
use crate::world::tile::TileType;
use crate::world::World;

/// Single-player mode: the local process owns the only world, generates its own chunks and
/// keeps its edits in a [`LocalStore`].
pub(crate) struct SoloGame {
    world: World,
    store: LocalStore,
}

impl SoloGame {
    pub(crate) async fn open(
        seed: WorldSeed,
        rules: Ruleset,
        path: impl Into<PathBuf>,
        cache_capacity: usize,
        radius: i32,
    ) -> Result<Self, WorldError> {
        let mut world = World::new(seed, rules, cache_capacity, radius);
        let store = LocalStore::new(path);
        let restored = store.restore(&mut world).await?;
        info!("Opened single-player world {seed} with {restored} saved chunks");
        Ok(Self { world, store })
    }

    pub(crate) fn world(&self) -> &World {
        &self.world
    }

    /// Follows the player. Cheap when the player stays inside the same chunk.
    pub(crate) fn move_to(&mut self, x: f32, y: f32) -> bool {
        self.world
            .update_active_center(x.floor() as i32, y.floor() as i32)
    }

    pub(crate) fn tile(&mut self, x: i32, y: i32) -> TileType {
        self.world.get_tile(x, y)
    }

    /// Removes a solid tile and returns what was there.
    pub(crate) fn dig(&mut self, x: i32, y: i32) -> Option<TileType> {
        let original = self.world.get_tile(x, y);
        if original.is_air() || original == TileType::Bedrock {
            return None;
        }
        self.world.set_tile(x, y, TileType::Air);
        Some(original)
    }

    pub(crate) async fn save(&self) -> Result<usize, WorldError> {
        self.store.save(&self.world).await
    }

    /// Throws the current world away, saved edits included.
    pub(crate) async fn new_world(&mut self, seed: WorldSeed) -> Result<(), WorldError> {
        self.world.reset(seed);
        self.store.clear().await
    }
}

/// Walks `columns` columns east from the middle of the world and digs the highest diggable tile
/// of each. Earlier runs are restored first, so every run digs the trench one tile deeper.
pub(crate) async fn dig_trench(
    config: &ServerConfig,
    seed: Option<WorldSeed>,
    columns: i32,
) -> Result<Vec<(TilePos, TileType)>, WorldError> {
    let stored = LocalStore::new(config.solo_path.clone()).seed().await?;
    let mut game = SoloGame::open(
        stored.or(seed).unwrap_or_else(rand::random),
        config.ruleset.clone(),
        config.solo_path.clone(),
        config.cache_capacity,
        config.active_radius,
    )
    .await?;
    // asking for another seed starts over
    if let Some(seed) = seed.filter(|&seed| seed != game.world().seed()) {
        game.new_world(seed).await?;
    }

    let start = game.world().rules().world_width / 2;
    let floor = game.world().rules().floor_start();
    let mut dug = vec![];
    for x in start..start + columns {
        let Some(surface) = game.world().gen().heights().get(x) else {
            break;
        };
        game.move_to(x as f32, surface as f32);
        let Some(y) = (surface..floor).find(|&y| game.tile(x, y).is_solid()) else {
            continue;
        };
        if let Some(tile) = game.dig(x, y) {
            dug.push((TilePos::new(x, y), tile));
        }
    }
    let saved = game.save().await?;
    info!("Dug {} tiles, {saved} chunks saved", dug.len());
    Ok(dug)
}

#[cfg(test)]
mod test {
    use std::env;

    use uuid::Uuid;

    use super::*;

    fn temp_path() -> PathBuf {
        env::temp_dir().join(format!("antcraft-solo-{}.json", Uuid::new_v4()))
    }

    fn solid_below(game: &mut SoloGame, x: i32) -> i32 {
        (0..game.world().rules().world_height)
            .find(|&y| game.tile(x, y).is_solid() && game.tile(x, y) != TileType::Bedrock)
            .unwrap()
    }

    #[tokio::test]
    async fn edits_survive_reopening() {
        let path = temp_path();
        let mut game = SoloGame::open(12, Ruleset::terraria(), path.clone(), 16, 1).await.unwrap();
        let y = solid_below(&mut game, 700);
        let dug = game.dig(700, y).unwrap();
        assert!(dug.is_solid());

        // walk far away so the edited chunk leaves the active window
        game.move_to(700.0, y as f32);
        assert!(game.move_to(1500.0, 100.0));
        assert!(!game.move_to(1501.0, 101.0));
        assert_eq!(game.save().await.unwrap(), 1);

        let mut reopened = SoloGame::open(12, Ruleset::terraria(), path.clone(), 16, 1).await.unwrap();
        assert_eq!(reopened.tile(700, y), TileType::Air);

        reopened.new_world(13).await.unwrap();
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn trench_deepens_on_every_run() {
        let config = ServerConfig {
            solo_path: temp_path(),
            ruleset: Ruleset::terraria(),
            cache_capacity: 8,
            active_radius: 1,
            ..ServerConfig::default()
        };
        let first = dig_trench(&config, Some(5), 40).await.unwrap();
        assert!(!first.is_empty());
        // the seed now comes from the save
        let second = dig_trench(&config, None, 40).await.unwrap();
        for (before, after) in first.iter().zip(&second) {
            assert_eq!(before.0.x, after.0.x);
            assert!(after.0.y > before.0.y);
        }

        let mut game = SoloGame::open(5, Ruleset::terraria(), config.solo_path.clone(), 8, 1)
            .await
            .unwrap();
        for (pos, _) in first.iter().chain(&second) {
            assert_eq!(game.tile(pos.x, pos.y), TileType::Air);
        }

        // another seed throws the trench away
        let fresh = dig_trench(&config, Some(6), 40).await.unwrap();
        let local = LocalStore::new(config.solo_path.clone());
        assert_eq!(local.seed().await.unwrap(), Some(6));
        assert!(fresh.iter().zip(&first).any(|(a, b)| a != b));
        local.clear().await.unwrap();
    }

    #[tokio::test]
    async fn sky_and_bedrock_cannot_be_dug() {
        let mut game = SoloGame::open(12, Ruleset::terraria(), temp_path(), 16, 1).await.unwrap();
        assert_eq!(game.dig(10, 0), None);
        let bottom = game.world().rules().world_height - 1;
        assert_eq!(game.dig(10, bottom), None);
    }
}
