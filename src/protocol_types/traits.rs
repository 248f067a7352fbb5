use std::fmt::{Debug, Display};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::connection::ConnectionInfo;
use crate::err::ProtError;
use crate::packets::Outbound;
use crate::Assets;

/// A packet the server receives. Handling never writes to the socket directly; it returns
/// what should be sent and to whom.
#[async_trait]
pub(crate) trait ServerPacket: SizedProt + Debug + Display + Sync + Send {
    async fn handle(
        &self,
        connection: Arc<RwLock<ConnectionInfo>>,
        assets: Arc<Assets>,
    ) -> Result<Vec<Outbound>, ProtError>;
}

/// A packet the server sends. Its `WriteProt` impl writes a whole frame.
pub(crate) trait ClientPacket: SizedProt + WriteProt + Debug + Display {}

#[async_trait]
pub(crate) trait ReadProt {
    async fn read(stream: &mut (impl AsyncRead + Unpin + Send)) -> Result<Self, String>
    where
        Self: Sized;
}

#[async_trait]
pub(crate) trait WriteProt {
    async fn write(&self, stream: &mut (impl AsyncWrite + Unpin + Send)) -> Result<(), String>;
}

pub(crate) trait SizedProt {
    fn prot_size(&self) -> usize;
}
