use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;

use log::{info, warn};
use tokio::fs;

use crate::err::WorldError;
use crate::world::chunk::Chunk;
use crate::world::coords::ChunkPos;
use crate::world::noise::WorldSeed;
use crate::world::persistence;
use crate::world::World;

const SEED_KEY: &str = "seed";
const CHUNKS_KEY: &str = "chunks";

type ChunkBlob = BTreeMap<String, Vec<Vec<u8>>>;

/// Single-player persistence: a flat string key-value file where `chunks` holds a JSON blob of
/// the chunks that differ from fresh generation.
pub(crate) struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn entries(&self) -> Result<BTreeMap<String, String>, WorldError> {
        match fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Returns how many chunks were written.
    pub(crate) async fn save(&self, world: &World) -> Result<usize, WorldError> {
        let blob: ChunkBlob = world
            .store()
            .modified_chunks()
            .into_iter()
            .map(|(pos, chunk)| (pos.key(), chunk.to_rows()))
            .collect();
        let count = blob.len();

        let mut entries = self.entries().await?;
        entries.insert(SEED_KEY.to_string(), world.seed().to_string());
        entries.insert(CHUNKS_KEY.to_string(), serde_json::to_string(&blob)?);
        persistence::write_atomic(&self.path, &serde_json::to_vec(&entries)?).await?;
        Ok(count)
    }

    /// The seed of the saved world, if there is one.
    pub(crate) async fn seed(&self) -> Result<Option<WorldSeed>, WorldError> {
        Ok(self
            .entries()
            .await?
            .get(SEED_KEY)
            .and_then(|seed| seed.parse().ok()))
    }

    /// Installs the stored chunks into `world`. A blob written for another seed is discarded.
    pub(crate) async fn restore(&self, world: &mut World) -> Result<usize, WorldError> {
        let entries = self.entries().await?;
        let Some(seed) = entries.get(SEED_KEY) else {
            return Ok(0);
        };
        if seed.parse::<WorldSeed>().ok() != Some(world.seed()) {
            warn!("Local save belongs to seed {seed}, discarding it");
            return Ok(0);
        }
        let Some(blob) = entries.get(CHUNKS_KEY) else {
            return Ok(0);
        };
        let blob: ChunkBlob = serde_json::from_str(blob)?;
        let mut restored = 0;
        for (key, rows) in &blob {
            let pos: ChunkPos = key.parse()?;
            match Chunk::from_rows(rows) {
                Ok(chunk) => {
                    world.restore_edit(pos, chunk);
                    restored += 1;
                }
                Err(e) => warn!("Skipping local chunk {key}: {e}"),
            }
        }
        info!("Restored {restored} local chunks");
        Ok(restored)
    }

    pub(crate) async fn clear(&self) -> Result<(), WorldError> {
        match fs::remove_file(&self.path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}
