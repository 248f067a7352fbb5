use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use log::{debug, info};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::client::mirror::ChunkMirror;
use crate::err::ProtError;
use crate::packets::client::ClientPackets;
use crate::packets::parse::parse_client_packet;
use crate::packets::server;
use crate::protocol_types::compound::PlayerSummary;
use crate::protocol_types::traits::WriteProt;
use crate::world::coords::ChunkPos;
use crate::world::tile::TileType;

/// A TCP client: joins with `hello`, keeps a [`ChunkMirror`] in step with the server and answers
/// heartbeats on its own.
pub(crate) struct ClientSession {
    read: OwnedReadHalf,
    write: OwnedWriteHalf,
    pub(crate) id: Uuid,
    pub(crate) mirror: ChunkMirror,
    players: HashMap<Uuid, PlayerSummary>,
}

impl ClientSession {
    pub(crate) async fn connect(addr: SocketAddr, name: &str) -> Result<Self, ProtError> {
        let stream = TcpStream::connect(addr).await?;
        let (mut read, mut write) = stream.into_split();
        server::Hello::new(name.to_string()).write(&mut write).await?;
        let init = loop {
            match parse_client_packet(&mut read).await? {
                ClientPackets::Initialize(init) => break init,
                other => debug!("Ignoring {other:?} before initialize"),
            }
        };
        info!("Joined {addr} as {} (seed {})", init.id, init.world_seed);
        Ok(Self {
            read,
            write,
            id: init.id,
            mirror: ChunkMirror::new(&init),
            players: init.players.vec.iter().map(|p| (p.id, p.clone())).collect(),
        })
    }

    pub(crate) fn players(&self) -> Vec<&PlayerSummary> {
        self.players.values().collect()
    }

    /// False when the chunk is already loaded or on its way.
    pub(crate) async fn request_chunk(&mut self, pos: ChunkPos) -> Result<bool, ProtError> {
        if !self.mirror.request(pos, Instant::now()) {
            return Ok(false);
        }
        server::RequestChunk::new(pos.x, pos.y)
            .write(&mut self.write)
            .await?;
        Ok(true)
    }

    /// Re-sends requests that timed out.
    pub(crate) async fn retry_requests(&mut self) -> Result<usize, ProtError> {
        let now = Instant::now();
        let expired = self.mirror.expire_pending(now);
        for pos in &expired {
            self.request_chunk(*pos).await?;
        }
        Ok(expired.len())
    }

    /// Sends an edit. The mirror changes only once the server's block update comes back.
    pub(crate) async fn dig(
        &mut self,
        x: i32,
        y: i32,
        tile: TileType,
        item_collected: bool,
    ) -> Result<bool, ProtError> {
        match self
            .mirror
            .try_dig(x, y, tile, item_collected, Instant::now())
        {
            Some(packet) => {
                packet.write(&mut self.write).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub(crate) async fn move_to(&mut self, x: f32, y: f32, direction: u8) -> Result<(), ProtError> {
        server::PlayerMove::new(x, y, direction)
            .write(&mut self.write)
            .await?;
        Ok(())
    }

    pub(crate) async fn reset_world(&mut self, seed: Option<i64>) -> Result<(), ProtError> {
        server::ResetWorldSeed::new(seed)
            .write(&mut self.write)
            .await?;
        Ok(())
    }

    /// Waits for the next server packet and applies it before handing it out.
    pub(crate) async fn next_event(&mut self) -> Result<ClientPackets, ProtError> {
        let packet = parse_client_packet(&mut self.read).await?;
        match &packet {
            ClientPackets::KeepAlive(beat) => {
                server::KeepAlive::echo(beat).write(&mut self.write).await?;
            }
            ClientPackets::PlayerJoined(joined) => {
                self.players.insert(joined.player.id, joined.player.clone());
            }
            ClientPackets::PlayerLeft(left) => {
                self.players.remove(&left.id);
            }
            ClientPackets::PlayerMoved(moved) => {
                if let Some(player) = self.players.get_mut(&moved.id) {
                    player.x = moved.x;
                    player.y = moved.y;
                    player.direction = moved.direction;
                }
            }
            other => {
                self.mirror.apply(other);
            }
        }
        Ok(packet)
    }
}
