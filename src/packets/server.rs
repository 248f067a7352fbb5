use core::fmt::Display;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::{ConnectionInfo, ConnectionState};
use crate::err::ProtError;
use crate::err::ProtError::KeepAliveIdMismatch;
use crate::packets::client::{self, ClientPackets};
use crate::packets::Outbound;
use crate::protocol_types::primitives::{SizedVec, VarInt};
use crate::protocol_types::traits::{ReadProt, ServerPacket, SizedProt, WriteProt};
use crate::sync::{self, lock, read, write};
use crate::Assets;
use crate::{packet, packet_base};

const MAX_NAME: usize = 24;

packet!(
    Hello 0x00 {
        name: String,
    },
    handler |this, connection, assets| {
        let name: String = this.name.trim().chars().take(MAX_NAME).collect();
        let name = if name.is_empty() { "ant".to_string() } else { name };
        let id = {
            let mut con = write(&connection);
            if con.joined() {
                warn!("{} sent hello twice", con.id);
                return Ok(vec![]);
            }
            con.name = name.clone();
            con.set_state(ConnectionState::Play);
            con.id
        };
        info!("{name} joined as {id}");
        Ok(sync::join(&mut write(&assets.world), id, &name))
    }
);

packet!(
    RequestChunk 0x01 {
        chunk_x: i32,
        chunk_y: i32,
    },
    handler |this, _connection, assets| {
        let data = sync::chunk_data(&mut write(&assets.world), this.chunk_x, this.chunk_y);
        Ok(vec![Outbound::Reply(ClientPackets::ChunkData(data))])
    }
);

packet!(
    BlockDig 0x02 {
        x: i32,
        y: i32,
        tile_type: u8,
        item_collected: bool,
        original_tile_type: u8,
    },
    handler |this, connection, assets| {
        let player = read(&connection).id;
        let mut world = write(&assets.world);
        let mut cooldown = lock(&assets.cooldown);
        sync::dig(&mut world, &mut cooldown, player, this, Instant::now())
    }
);

packet!(
    SaveChunk 0x03 {
        chunk_x: i32,
        chunk_y: i32,
        data: SizedVec<u8>,
    },
    handler |this, _connection, assets| {
        sync::save_chunk(&mut write(&assets.world), this)
    }
);

packet!(
    ResetWorldSeed 0x04 {
        seed: Option<i64>,
    },
    handler |this, connection, assets| {
        info!("{} asked for a world reset", read(&connection).name);
        // the reset is already broadcast when persisting fails, so the error only gets logged
        if let Err(e) = sync::reset_world(&assets, this.seed).await {
            warn!("Reset was not persisted: {e}");
        }
        Ok(vec![])
    }
);

packet!(
    PlayerMove 0x05 {
        x: f32,
        y: f32,
        direction: u8,
    },
    handler |this, connection, assets| {
        let id = read(&connection).id;
        Ok(sync::move_player(&mut write(&assets.world), id, this))
    }
);

packet!(
    KeepAlive 0x06 {
        id: i64,
    },
    handler |this, connection, _assets| {
        let mut con = write(&connection);
        match con.keep_alive_id.take() {
            Some(expected) if expected == this.id => Ok(vec![]),
            Some(expected) => Err(KeepAliveIdMismatch(expected, this.id)),
            None => {
                debug!("Unsolicited keep alive {} from {}", this.id, con.id);
                Ok(vec![])
            }
        }
    }
);

impl KeepAlive {
    /// The echo a client sends for a server heartbeat.
    pub(crate) fn echo(heartbeat: &client::KeepAlive) -> Self {
        Self::new(heartbeat.id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn dig_frame_layout() -> Result<(), String> {
        let packet = BlockDig::new(-1, 2, 3, true, 1);
        let mut buf: Vec<u8> = vec![];
        packet.write(&mut buf).await?;
        assert_eq!(
            buf,
            vec![12, 0x02, 0xff, 0xff, 0xff, 0xff, 0, 0, 0, 2, 3, 1, 1]
        );
        Ok(())
    }

    #[tokio::test]
    async fn reset_without_seed_is_one_flag_byte() -> Result<(), String> {
        let mut buf: Vec<u8> = vec![];
        ResetWorldSeed::new(None).write(&mut buf).await?;
        assert_eq!(buf, vec![2, 0x04, 0]);
        Ok(())
    }

    #[test]
    fn echo_keeps_the_id() {
        assert_eq!(KeepAlive::echo(&client::KeepAlive::new(77)).id, 77);
    }
}
