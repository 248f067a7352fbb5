use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use log::{debug, info};

use crate::client::session::ClientSession;
use crate::err::ProtError;
use crate::packets::client::{ChunkData, ClientPackets};
use crate::world::coords::{ChunkPos, TilePos};
use crate::world::tile::TileType;

pub(crate) mod mirror;
pub(crate) mod session;
pub(crate) mod solo;

/// Long enough for a few heartbeats, each of which gives a timed-out request its retry.
const VISIT_TIMEOUT: Duration = Duration::from_secs(30);

/// What `antcraft visit` does once it has looked at the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum VisitAction {
    Look,
    /// Digs out the surface tile of the center column.
    Dig,
    Reset(Option<i64>),
}

impl VisitAction {
    pub(crate) fn from_args(mut args: impl Iterator<Item = String>) -> Option<Self> {
        match args.next().as_deref() {
            None => Some(Self::Look),
            Some("dig") => Some(Self::Dig),
            Some("reset") => match args.next() {
                None => Some(Self::Reset(None)),
                Some(seed) => seed.parse().ok().map(|seed| Self::Reset(Some(seed))),
            },
            Some(_) => None,
        }
    }
}

async fn next_matching(
    session: &mut ClientSession,
    wanted: impl Fn(&ClientPackets) -> bool,
) -> Result<ClientPackets, ProtError> {
    let waiting = async {
        loop {
            let packet = session.next_event().await?;
            if wanted(&packet) {
                return Ok::<_, ProtError>(packet);
            }
            debug!("Visit ignoring {packet:?}");
            // heartbeats wake this loop often enough to resend lost requests
            let retried = session.retry_requests().await?;
            if retried > 0 {
                info!("Requested {retried} chunks again");
            }
        }
    };
    tokio::time::timeout(VISIT_TIMEOUT, waiting)
        .await
        .map_err(|_| ProtError::Any("No answer from the server".into()))?
}

async fn fetch_chunk(session: &mut ClientSession, pos: ChunkPos) -> Result<ChunkData, ProtError> {
    session.request_chunk(pos).await?;
    match next_matching(session, |p| {
        matches!(p, ClientPackets::ChunkData(d) if d.chunk_x == pos.x && d.chunk_y == pos.y)
    })
    .await?
    {
        ClientPackets::ChunkData(data) => Ok(data),
        other => Err(ProtError::Any(format!("Expected chunk {pos}, got {other:?}"))),
    }
}

/// Joins a server, fetches the chunk under the world's center column and prints what it saw.
pub(crate) async fn visit(addr: SocketAddr, action: VisitAction) -> Result<(), ProtError> {
    let mut session = ClientSession::connect(addr, "visit").await?;
    let center = session.mirror.width() / 2;
    let surface = session.mirror.surface(center).unwrap_or(0);
    println!(
        "seed {}, {} columns, {} players online",
        session.mirror.seed(),
        session.mirror.width(),
        session.players().len()
    );
    session
        .move_to(center as f32, (surface - 1) as f32, 0)
        .await?;

    let pos = TilePos::new(center, surface).chunk();
    let data = fetch_chunk(&mut session, pos).await?;
    let mut counts: BTreeMap<TileType, usize> = BTreeMap::new();
    for tile in data.data.vec.iter().filter_map(|&id| TileType::from_id(id)) {
        *counts.entry(tile).or_insert(0) += 1;
    }
    let biome = session.mirror.biome(center).unwrap_or_default();
    println!("chunk {pos} at the surface (biome {biome}):");
    for (tile, count) in &counts {
        let marker = if tile.is_ore() { " (ore)" } else { "" };
        println!("  {tile}: {count}{marker}");
    }

    match action {
        VisitAction::Look => {}
        VisitAction::Dig => {
            if !session.dig(center, surface, TileType::Air, true).await? {
                println!("nothing to dig at {center},{surface}");
                return Ok(());
            }
            if let ClientPackets::BlockUpdate(update) =
                next_matching(&mut session, |p| matches!(p, ClientPackets::BlockUpdate(_))).await?
            {
                println!(
                    "dug {} at {},{}",
                    update.original_tile_type, update.x, update.y
                );
            }
        }
        VisitAction::Reset(seed) => {
            session.reset_world(seed).await?;
            next_matching(&mut session, |p| matches!(p, ClientPackets::WorldReset(_))).await?;
            println!("world reset to seed {}", session.mirror.seed());
        }
    }
    println!(
        "{} chunks loaded, {} requests pending",
        session.mirror.loaded_len(),
        session.mirror.pending_len()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn args(list: &[&str]) -> impl Iterator<Item = String> {
        list.iter().map(|s| s.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn actions_from_arguments() {
        assert_eq!(VisitAction::from_args(args(&[])), Some(VisitAction::Look));
        assert_eq!(VisitAction::from_args(args(&["dig"])), Some(VisitAction::Dig));
        assert_eq!(VisitAction::from_args(args(&["reset"])), Some(VisitAction::Reset(None)));
        assert_eq!(
            VisitAction::from_args(args(&["reset", "-4"])),
            Some(VisitAction::Reset(Some(-4)))
        );
        assert_eq!(VisitAction::from_args(args(&["reset", "x"])), None);
        assert_eq!(VisitAction::from_args(args(&["fly"])), None);
    }
}
