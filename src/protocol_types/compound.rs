use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use uuid::Uuid;

use antcraft_derive::{ReadProt, SizedProt, WriteProt};

use crate::protocol_types::traits::{ReadProt, SizedProt, WriteProt};
use crate::world::Player;

#[async_trait]
impl ReadProt for Uuid {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String> {
        let high = u64::read(stream).await? as u128;
        let low = u64::read(stream).await? as u128;
        Ok(Uuid::from_u128(high << 64 | low))
    }
}

#[async_trait]
impl WriteProt for Uuid {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String> {
        let value = self.as_u128();
        ((value >> 64) as u64).write(stream).await?;
        (value as u64).write(stream).await
    }
}

impl SizedProt for Uuid {
    fn prot_size(&self) -> usize {
        16
    }
}

/// What other clients need to know about a player.
#[derive(Clone, Debug, PartialEq, SizedProt, ReadProt, WriteProt)]
pub(crate) struct PlayerSummary {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) x: f32,
    pub(crate) y: f32,
    pub(crate) direction: u8,
    pub(crate) score: i32,
}

impl From<&Player> for PlayerSummary {
    fn from(player: &Player) -> Self {
        Self {
            id: player.id,
            name: player.name.clone(),
            x: player.x,
            y: player.y,
            direction: player.direction,
            score: player.score as i32,
        }
    }
}

#[derive(Clone, Debug, PartialEq, SizedProt, ReadProt, WriteProt)]
pub(crate) struct InventoryEntry {
    pub(crate) tile: u8,
    pub(crate) count: i32,
}

#[cfg(test)]
mod test {
    use std::io::Cursor;

    use super::*;

    #[tokio::test]
    async fn uuid_is_sixteen_big_endian_bytes() -> Result<(), String> {
        let id = Uuid::from_u128(0x0011_2233_4455_6677_8899_aabb_ccdd_eeff);
        let mut buf: Vec<u8> = vec![];
        id.write(&mut buf).await?;
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[0], 0x00);
        assert_eq!(buf[15], 0xff);
        assert_eq!(Uuid::read(&mut Cursor::new(buf)).await?, id);
        Ok(())
    }

    #[tokio::test]
    async fn derived_compounds_write_fields_in_order() -> Result<(), String> {
        let summary = PlayerSummary {
            id: Uuid::nil(),
            name: "ant".into(),
            x: 1.5,
            y: -2.0,
            direction: 1,
            score: 9,
        };
        let mut buf: Vec<u8> = vec![];
        summary.write(&mut buf).await?;
        assert_eq!(buf.len(), summary.prot_size());
        assert_eq!(buf.len(), 16 + 4 + 4 + 4 + 1 + 4);
        assert_eq!(&buf[16..20], &[3, b'a', b'n', b't']);
        assert_eq!(PlayerSummary::read(&mut Cursor::new(buf)).await?, summary);
        Ok(())
    }
}
