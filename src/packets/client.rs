use core::fmt::Display;

use async_trait::async_trait;
use log::debug;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use antcraft_derive::{SizedProt, WriteProt};

use crate::protocol_types::compound::{InventoryEntry, PlayerSummary};
use crate::protocol_types::primitives::{SizedVec, VarInt};
use crate::protocol_types::traits::{ClientPacket, ReadProt, SizedProt, WriteProt};
use crate::{packet, packet_base};

packet!(
    Initialize 0x00 {
        id: Uuid,
        players: SizedVec<PlayerSummary>,
        world_seed: i64,
        terrain_heights: SizedVec<i32>,
        biome_map: SizedVec<u8>,
    }
);

packet!(
    ChunkData 0x01 {
        chunk_x: i32,
        chunk_y: i32,
        data: SizedVec<u8>,
        server_generated: bool,
    }
);

packet!(
    BlockUpdate 0x02 {
        x: i32,
        y: i32,
        tile_type: u8,
        player_id: Uuid,
        original_tile_type: u8,
    }
);

packet!(
    WorldReset 0x03 {
        world_seed: i64,
        terrain_heights: SizedVec<i32>,
        biome_map: SizedVec<u8>,
    }
);

packet!(
    PlayerMoved 0x04 {
        id: Uuid,
        x: f32,
        y: f32,
        direction: u8,
    }
);

packet!(
    PlayerJoined 0x05 {
        player: PlayerSummary,
    }
);

packet!(
    PlayerLeft 0x06 {
        id: Uuid,
    }
);

packet!(
    InventoryUpdate 0x07 {
        items: SizedVec<InventoryEntry>,
        score: i32,
    }
);

packet!(
    KeepAlive 0x08 {
        id: i64,
    }
);

#[derive(Debug, Clone, PartialEq, SizedProt, WriteProt)]
pub(crate) enum ClientPackets {
    Initialize(Initialize),
    ChunkData(ChunkData),
    BlockUpdate(BlockUpdate),
    WorldReset(WorldReset),
    PlayerMoved(PlayerMoved),
    PlayerJoined(PlayerJoined),
    PlayerLeft(PlayerLeft),
    InventoryUpdate(InventoryUpdate),
    KeepAlive(KeepAlive),
}

impl ClientPackets {
    /// Encodes one frame into a fresh buffer, ready for a single socket write.
    pub(crate) async fn to_frame(&self) -> Result<Vec<u8>, String> {
        let mut buf = Vec::with_capacity(self.prot_size() + 5);
        self.write(&mut buf).await?;
        Ok(buf)
    }
}
