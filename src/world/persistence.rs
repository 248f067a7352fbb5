use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::err::WorldError;
use crate::world::biome::{BiomeMap, BiomeTable};
use crate::world::chunk::Chunk;
use crate::world::coords::ChunkPos;
use crate::world::generator::WorldGen;
use crate::world::noise::WorldSeed;
use crate::world::rules::Ruleset;
use crate::world::terrain::HeightField;
use crate::world::{World, WorldMetadata};

fn default_ruleset() -> String {
    Ruleset::server().name.to_string()
}

/// The authoritative save file, one JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveFile {
    pub(crate) world_seed: WorldSeed,
    #[serde(default = "default_ruleset")]
    pub(crate) ruleset: String,
    pub(crate) terrain_heights: Vec<i32>,
    pub(crate) biome_map: Vec<String>,
    /// Only chunks that differ from what the seed generates.
    pub(crate) chunks: BTreeMap<String, Vec<Vec<u8>>>,
    pub(crate) world_metadata: WorldMetadata,
}

impl SaveFile {
    pub(crate) fn capture(world: &World) -> Self {
        let gen = world.gen();
        let table = gen.table();
        Self {
            world_seed: gen.seed(),
            ruleset: gen.rules().name.to_string(),
            terrain_heights: gen.heights().heights().to_vec(),
            biome_map: gen
                .biomes()
                .ids()
                .iter()
                .map(|&id| table.get(id).name.to_string())
                .collect(),
            chunks: world
                .store()
                .modified_chunks()
                .into_iter()
                .map(|(pos, chunk)| (pos.key(), chunk.to_rows()))
                .collect(),
            world_metadata: world.metadata().clone(),
        }
    }

    /// Validates everything before building the world, so a bad file never half-loads.
    pub(crate) fn into_world(self, cache_capacity: usize, radius: i32) -> Result<World, WorldError> {
        let rules = Ruleset::by_name(&self.ruleset)
            .ok_or_else(|| format!("Unknown ruleset {:?}", self.ruleset))?;
        let width = rules.world_width as usize;
        if self.terrain_heights.len() != width || self.biome_map.len() != width {
            return Err(WorldError::Invalid(format!(
                "Expected {width} columns, got {} heights and {} biomes",
                self.terrain_heights.len(),
                self.biome_map.len()
            )));
        }
        if let Some(h) = self
            .terrain_heights
            .iter()
            .find(|&&h| !(0..rules.floor_start()).contains(&h))
        {
            return Err(WorldError::Invalid(format!("Surface height {h} is outside the world")));
        }

        let table = BiomeTable::standard();
        let ids = self
            .biome_map
            .iter()
            .map(|name| {
                table
                    .id_of(name)
                    .ok_or_else(|| format!("Unknown biome {name:?}"))
            })
            .collect::<Result<Vec<_>, String>>()?;

        let mut chunks = Vec::with_capacity(self.chunks.len());
        for (key, rows) in &self.chunks {
            let pos: ChunkPos = key.parse()?;
            let chunk = Chunk::from_rows(rows).map_err(|e| format!("Chunk {key}: {e}"))?;
            chunks.push((pos, chunk));
        }

        let gen = WorldGen::with_inputs(
            self.world_seed,
            rules,
            table,
            BiomeMap::from_ids(ids),
            HeightField::from_heights(self.terrain_heights),
        );
        let mut world = World::from_parts(gen, self.world_metadata, cache_capacity, radius);
        for (pos, chunk) in chunks {
            world.restore_edit(pos, chunk);
        }
        Ok(world)
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Writes next to the target and renames over it, so a failed write leaves the old file intact.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WorldError> {
    let tmp = sibling(path, ".tmp");
    if let Err(e) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}

pub(crate) async fn save(save: &SaveFile, path: &Path) -> Result<(), WorldError> {
    write_atomic(path, &serde_json::to_vec(save)?).await?;
    info!(
        "Saved world {} with {} modified chunks to {}",
        save.world_seed,
        save.chunks.len(),
        path.display()
    );
    Ok(())
}

/// `Ok(None)` when there is no save yet.
pub(crate) async fn load(path: &Path) -> Result<Option<SaveFile>, WorldError> {
    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_slice(&bytes)?))
}

/// Moves an unreadable save aside so the next save does not overwrite it.
pub(crate) async fn back_up(path: &Path) -> Result<PathBuf, WorldError> {
    let backup = sibling(path, ".bak");
    fs::rename(path, &backup).await?;
    warn!("Moved unreadable save {} to {}", path.display(), backup.display());
    Ok(backup)
}
