use std::io::Cursor;
use std::sync::{Arc, RwLock};

use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::connection::{ConnectionInfo, ConnectionState};
use crate::err::ProtError;
use crate::packets::client::{self, ClientPackets};
use crate::packets::server;
use crate::protocol_types::primitives::VarInt;
use crate::protocol_types::traits::{ReadProt, ServerPacket};
use crate::protocol_util::show;
use crate::sync::read;

/// Largest accepted frame (id + payload).
pub(crate) const MAX_FRAME: usize = 4 * 1024 * 1024;

/// Reads one whole frame. Everything after the id is left in the returned cursor, so a
/// rejected packet never desynchronises the stream.
pub(crate) async fn read_frame(
    stream: &mut (impl AsyncRead + Unpin + Send),
) -> Result<(i32, Cursor<Vec<u8>>), ProtError> {
    let length = VarInt::read(stream).await.map_err(ProtError::Io)?;
    let Ok(length) = usize::try_from(length.value) else {
        return Err(ProtError::FrameTooLarge(0));
    };
    if length > MAX_FRAME {
        return Err(ProtError::FrameTooLarge(length));
    }
    let mut frame = vec![0u8; length];
    stream.read_exact(&mut frame).await?;
    let mut cursor = Cursor::new(frame);
    let id = VarInt::read(&mut cursor)
        .await
        .map_err(|e| ProtError::Malformed(format!("Frame without id: {e}")))?;
    Ok((id.value, cursor))
}

/// Reads a packet body and insists that it fills the frame exactly.
async fn read_body<T: ReadProt>(mut cursor: Cursor<Vec<u8>>) -> Result<T, ProtError> {
    let packet = T::read(&mut cursor).await.map_err(ProtError::Malformed)?;
    let consumed = cursor.position() as usize;
    let total = cursor.get_ref().len();
    if consumed != total {
        return Err(ProtError::Malformed(format!(
            "{} trailing bytes",
            total - consumed
        )));
    }
    Ok(packet)
}

fn dropped(id: i32, cursor: &Cursor<Vec<u8>>) {
    debug!("Dropping frame 0x{id:02x}: {}", show(cursor.get_ref()));
}

pub(crate) async fn parse_packet(
    stream: &mut (impl AsyncRead + Unpin + Send),
    connection: Arc<RwLock<ConnectionInfo>>,
) -> Result<Box<dyn ServerPacket>, ProtError> {
    let (id, cursor) = read_frame(stream).await?;
    let state = read(&connection).state();
    let packet: Box<dyn ServerPacket> = match (id, state) {
        (server::Hello::ID, _) => Box::new(read_body::<server::Hello>(cursor).await?),
        (0x01..=0x06, ConnectionState::Joining) => {
            dropped(id, &cursor);
            return Err(ProtError::NotJoined(id));
        }
        (server::RequestChunk::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::RequestChunk>(cursor).await?)
        }
        (server::BlockDig::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::BlockDig>(cursor).await?)
        }
        (server::SaveChunk::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::SaveChunk>(cursor).await?)
        }
        (server::ResetWorldSeed::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::ResetWorldSeed>(cursor).await?)
        }
        (server::PlayerMove::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::PlayerMove>(cursor).await?)
        }
        (server::KeepAlive::ID, ConnectionState::Play) => {
            Box::new(read_body::<server::KeepAlive>(cursor).await?)
        }
        _ => {
            dropped(id, &cursor);
            return Err(ProtError::UnknownPacket(id));
        }
    };
    Ok(packet)
}

/// The client side of the dispatch table.
pub(crate) async fn parse_client_packet(
    stream: &mut (impl AsyncRead + Unpin + Send),
) -> Result<ClientPackets, ProtError> {
    let (id, cursor) = read_frame(stream).await?;
    Ok(match id {
        client::Initialize::ID => ClientPackets::Initialize(read_body(cursor).await?),
        client::ChunkData::ID => ClientPackets::ChunkData(read_body(cursor).await?),
        client::BlockUpdate::ID => ClientPackets::BlockUpdate(read_body(cursor).await?),
        client::WorldReset::ID => ClientPackets::WorldReset(read_body(cursor).await?),
        client::PlayerMoved::ID => ClientPackets::PlayerMoved(read_body(cursor).await?),
        client::PlayerJoined::ID => ClientPackets::PlayerJoined(read_body(cursor).await?),
        client::PlayerLeft::ID => ClientPackets::PlayerLeft(read_body(cursor).await?),
        client::InventoryUpdate::ID => ClientPackets::InventoryUpdate(read_body(cursor).await?),
        client::KeepAlive::ID => ClientPackets::KeepAlive(read_body(cursor).await?),
        _ => {
            dropped(id, &cursor);
            return Err(ProtError::UnknownPacket(id));
        }
    })
}

#[cfg(test)]
mod test {
    use uuid::Uuid;

    use super::*;
    use crate::protocol_types::traits::WriteProt;

    fn connection(state: ConnectionState) -> Arc<RwLock<ConnectionInfo>> {
        let mut info = ConnectionInfo::new(Uuid::new_v4());
        info.set_state(state);
        Arc::new(RwLock::new(info))
    }

    #[tokio::test]
    async fn gameplay_before_hello_is_rejected_but_stream_stays_in_sync() -> Result<(), String> {
        let mut buf: Vec<u8> = vec![];
        server::RequestChunk::new(1, 2).write(&mut buf).await?;
        server::Hello::new("queen".into()).write(&mut buf).await?;
        let mut stream = Cursor::new(buf);
        let con = connection(ConnectionState::Joining);

        let first = parse_packet(&mut stream, con.clone()).await;
        assert!(matches!(first, Err(ProtError::NotJoined(0x01))));
        let second = parse_packet(&mut stream, con).await.map_err(|e| e.to_string())?;
        assert_eq!(second.to_string(), "Hello");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_ids_are_not_fatal() {
        let mut stream = Cursor::new(vec![3u8, 0x7e, 1, 2]);
        let res = parse_packet(&mut stream, connection(ConnectionState::Play)).await;
        match res {
            Err(e) => {
                assert!(matches!(e, ProtError::UnknownPacket(0x7e)));
                assert!(!e.is_fatal());
            }
            Ok(p) => panic!("parsed {p}"),
        }
    }

    #[tokio::test]
    async fn trailing_bytes_are_malformed() {
        // requestChunk with one extra byte
        let mut stream = Cursor::new(vec![10u8, 0x01, 0, 0, 0, 1, 0, 0, 0, 2, 9]);
        let res = parse_packet(&mut stream, connection(ConnectionState::Play)).await;
        assert!(matches!(res, Err(ProtError::Malformed(_))));
    }

    #[tokio::test]
    async fn oversize_frames_are_fatal() {
        let mut buf: Vec<u8> = vec![];
        VarInt::from(MAX_FRAME + 1).write(&mut buf).await.unwrap();
        let res = read_frame(&mut Cursor::new(buf)).await;
        match res {
            Err(e) => assert!(e.is_fatal()),
            Ok(_) => panic!("accepted oversize frame"),
        }
    }

    #[tokio::test]
    async fn truncated_stream_is_an_io_error() {
        let res = read_frame(&mut Cursor::new(vec![5u8, 0x01])).await;
        assert!(matches!(res, Err(ProtError::Io(_))));
    }

    #[tokio::test]
    async fn client_packets_parse_back() -> Result<(), String> {
        let sent = ClientPackets::BlockUpdate(client::BlockUpdate::new(4, -8, 0, Uuid::nil(), 3));
        let mut stream = Cursor::new(sent.to_frame().await?);
        let got = parse_client_packet(&mut stream)
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(got, sent);
        Ok(())
    }
}
