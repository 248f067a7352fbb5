use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::{mpsc, oneshot, watch};
use uuid::Uuid;

use antcraft_lib::web::dto;

use crate::config::ServerConfig;
use crate::connection::ConnectionInfo;
use crate::err::{ProtError, WorldError};
use crate::packets::client::{self, ClientPackets};
use crate::packets::{parse, Outbound};
use crate::protocol_util::log_packets;
use crate::serve::ConnectionActorMessage::{Broadcast, Close, PlayerInfo, SendPacket};
use crate::world::persistence;
use crate::world::{Player, World};
use crate::{sync, web, Assets};

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);
const IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const CHANNEL_SIZE: usize = 64;

async fn accept_packet(
    stream: &mut OwnedReadHalf,
    connection: Arc<RwLock<ConnectionInfo>>,
    assets: Arc<Assets>,
    sender: &Sender<ConnectionActorMessage>,
) -> Result<(), ProtError> {
    let packet = parse::parse_packet(stream, connection.clone()).await;
    if !matches!(packet, Err(ProtError::Io(_))) {
        sync::write(&connection).touch();
    }
    let packet = match packet {
        Ok(p) => p,
        Err(e) => {
            if !e.is_fatal() {
                warn!("Dropping packet: {e}");
            }
            return Err(e);
        }
    };
    let id = sync::read(&connection).id;
    if log_packets() {
        debug!("{id} Inbound packet: {packet:?}");
    }

    let outbound = match packet.handle(connection.clone(), assets.clone()).await {
        Ok(outbound) => outbound,
        Err(e) => {
            error!("Couldn't handle packet {packet}: {e}");
            return Err(e);
        }
    };
    for out in outbound {
        match out {
            Outbound::Reply(packet) => sender
                .send(SendPacket(packet))
                .await
                .map_err(|_| ProtError::Io("connection actor is gone".into()))?,
            Outbound::Broadcast(packet) => assets.hub.broadcast(packet, None).await,
            Outbound::BroadcastOthers(packet) => assets.hub.broadcast(packet, Some(id)).await,
        }
    }
    Ok(())
}

/**
 * The connection actor owns one client connection. It has three tasks:
 * - The message handler, which exclusively manages the write half of the TcpStream and sends
 *   whatever arrives over the internal channel.
 * - The packet handler, which reads frames, parses and handles them and routes the results.
 * - The heartbeat, which sends keep alives and closes idle connections.
 */
struct ConnectionActor {
    receiver: Receiver<ConnectionActorMessage>,
    connection: Arc<RwLock<ConnectionInfo>>,
    assets: Arc<Assets>,
    stop: Arc<watch::Sender<bool>>,
}

impl ConnectionActor {
    fn new(receiver: Receiver<ConnectionActorMessage>, id: Uuid, assets: Arc<Assets>) -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            receiver,
            connection: Arc::new(RwLock::new(ConnectionInfo::new(id))),
            assets,
            stop: Arc::new(stop),
        }
    }

    async fn run(&mut self, read: OwnedReadHalf, write: OwnedWriteHalf, sender: Sender<ConnectionActorMessage>) {
        let connection = self.connection.clone();
        let assets = self.assets.clone();
        let sender_clone = sender.clone();
        let stop = self.stop.subscribe();
        tokio::spawn(async move {
            run_packet_handler(connection, read, sender_clone, assets, stop).await
        });
        let connection = self.connection.clone();
        let stop = self.stop.clone();
        tokio::spawn(async move { run_heartbeat(connection, sender, stop).await });
        self.run_msg_handler(write).await;
    }

    /**
     * Runs the internal channel message handler. Most messages are packets to write; the admin
     * API also asks for player information here.
     */
    async fn run_msg_handler(&mut self, mut write: OwnedWriteHalf) {
        while let Some(msg) = self.receiver.recv().await {
            match self.handle(msg, &mut write).await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    error!("Couldn't send to {}: {e}", sync::read(&self.connection).id);
                    if e.is_fatal() {
                        sync::write(&self.connection).close();
                        self.stop.send_replace(true);
                        break;
                    }
                }
            }
        }
        if let Err(e) = write.shutdown().await {
            debug!("Shutdown of write half failed: {e}");
        }
    }

    /// Returns false once the actor should stop.
    async fn handle(&mut self, msg: ConnectionActorMessage, write: &mut OwnedWriteHalf) -> Result<bool, ProtError> {
        match msg {
            SendPacket(packet) => send_packet(&packet, write).await?,
            Broadcast(packet) => {
                // connections that have not said hello yet only get their own replies
                if sync::read(&self.connection).joined() {
                    send_packet(&packet, write).await?;
                }
            }
            PlayerInfo(sender) => {
                let id = sync::read(&self.connection).id;
                let player = sync::read(&self.assets.world).player(&id).map(player_info);
                if sender.send(player).is_err() {
                    debug!("Player info for {id} was no longer wanted");
                }
            }
            Close => return Ok(false),
        }
        Ok(true)
    }
}

async fn send_packet(packet: &ClientPackets, write: &mut OwnedWriteHalf) -> Result<(), ProtError> {
    let frame = packet.to_frame().await?;
    write.write_all(&frame).await?;
    Ok(())
}

pub(crate) fn player_info(player: &Player) -> dto::Player {
    dto::Player {
        name: player.name.clone(),
        uuid: player.id.to_string(),
        position: dto::Position {
            x: player.x,
            y: player.y,
            direction: player.direction,
        },
        score: player.score,
        inventory: player
            .inventory
            .iter()
            .map(|(tile, count)| dto::InventoryItem {
                tile: tile.name().to_string(),
                count: *count,
            })
            .collect(),
    }
}

/**
 * Runs the packet handler. Results are routed through the message channel (replies) or the
 * hub (broadcasts). Leaving the loop disconnects the player.
 */
async fn run_packet_handler(
    connection: Arc<RwLock<ConnectionInfo>>,
    mut read: OwnedReadHalf,
    sender: Sender<ConnectionActorMessage>,
    assets: Arc<Assets>,
    mut stop: watch::Receiver<bool>,
) {
    let address = read
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "{unknown}".into());
    loop {
        if sync::read(&connection).closed() {
            break;
        }
        tokio::select! {
            _ = stop.changed() => break,
            result = accept_packet(&mut read, connection.clone(), assets.clone(), &sender) => {
                if let Err(e) = result {
                    if e.is_fatal() {
                        info!("Connection {address} closed: {e}");
                        break;
                    }
                }
            }
        }
    }
    sync::write(&connection).close();
    disconnect(&connection, &assets).await;
    if sender.send(Close).await.is_err() {
        debug!("Message handler for {address} already stopped");
    }
}

async fn disconnect(connection: &RwLock<ConnectionInfo>, assets: &Assets) {
    let (id, joined, name) = {
        let con = sync::read(connection);
        (con.id, con.joined(), con.name.clone())
    };
    assets.hub.unregister(&id).await;
    if !joined {
        return;
    }
    let left = sync::leave(&mut sync::write(&assets.world), &id);
    info!("{name} ({id}) left");
    if let Some(packet) = left {
        assets.hub.broadcast(packet, None).await;
    }
}

enum Beat {
    Skip,
    Send(i64),
    TimedOut(Uuid),
}

/**
 * Runs the heartbeat. Joined connections get a keep alive every interval; any connection that
 * has been silent for too long is closed.
 */
async fn run_heartbeat(
    connection: Arc<RwLock<ConnectionInfo>>,
    sender: Sender<ConnectionActorMessage>,
    stop: Arc<watch::Sender<bool>>,
) {
    let mut interval = tokio::time::interval(HEARTBEAT_INTERVAL);
    interval.tick().await;
    loop {
        interval.tick().await;
        let beat = {
            let mut con = sync::write(&connection);
            if con.closed() {
                break;
            }
            if con.last_active.elapsed() >= IDLE_TIMEOUT {
                con.close();
                Beat::TimedOut(con.id)
            } else if con.joined() {
                let keep_alive_id = rand::random::<i64>();
                con.keep_alive_id = Some(keep_alive_id);
                Beat::Send(keep_alive_id)
            } else {
                Beat::Skip
            }
        };
        match beat {
            Beat::Skip => {}
            Beat::Send(id) => {
                let packet = ClientPackets::KeepAlive(client::KeepAlive::new(id));
                if sender.send(SendPacket(packet)).await.is_err() {
                    break;
                }
            }
            Beat::TimedOut(id) => {
                info!("{id} timed out");
                stop.send_replace(true);
                break;
            }
        }
    }
}

#[derive(Clone)]
pub(crate) struct ConnectionActorHandle {
    id: Uuid,
    sender: Sender<ConnectionActorMessage>,
}

impl ConnectionActorHandle {
    /// Registers a new connection with the hub, then starts its actor.
    pub(crate) async fn spawn(stream: TcpStream, assets: Arc<Assets>) -> Self {
        let id = Uuid::new_v4();
        let (sender, receiver) = mpsc::channel(CHANNEL_SIZE);
        let handle = Self {
            id,
            sender: sender.clone(),
        };
        assets.hub.register(handle.clone()).await;

        let (read, write) = stream.into_split();
        let mut actor = ConnectionActor::new(receiver, id, assets);
        tokio::spawn(async move {
            actor.run(read, write, sender).await;
        });
        handle
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) async fn send(&self, msg: ConnectionActorMessage) {
        if self.sender.send(msg).await.is_err() {
            debug!("Connection {} is closed, message dropped", self.id);
        }
    }
}

pub(crate) enum ConnectionActorMessage {
    SendPacket(ClientPackets),
    /// Written only once the connection has joined.
    Broadcast(ClientPackets),
    PlayerInfo(oneshot::Sender<Option<dto::Player>>),
    Close,
}

/// Every live connection, for broadcasts and the admin API.
#[derive(Default)]
pub(crate) struct Hub {
    // async lock: handles are used across awaits
    connections: tokio::sync::RwLock<HashMap<Uuid, ConnectionActorHandle>>,
}

impl Hub {
    pub(crate) async fn register(&self, handle: ConnectionActorHandle) {
        self.connections.write().await.insert(handle.id(), handle);
    }

    pub(crate) async fn unregister(&self, id: &Uuid) {
        self.connections.write().await.remove(id);
    }

    pub(crate) async fn handles(&self) -> Vec<ConnectionActorHandle> {
        self.connections.read().await.values().cloned().collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Sends to every joined connection except `except`.
    pub(crate) async fn broadcast(&self, packet: ClientPackets, except: Option<Uuid>) {
        let targets: Vec<ConnectionActorHandle> = self
            .connections
            .read()
            .await
            .values()
            .filter(|h| Some(h.id()) != except)
            .cloned()
            .collect();
        for handle in targets {
            handle.send(Broadcast(packet.clone())).await;
        }
    }
}

/// Loads the saved world. A save that cannot be read is kept aside as `.bak` and a fresh world
/// takes its place. The flag tells whether the world is fresh.
async fn load_world(config: &ServerConfig) -> (World, bool) {
    let loaded = match persistence::load(&config.save_path).await {
        Ok(Some(save)) => save
            .into_world(config.cache_capacity, config.active_radius)
            .map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    };
    match loaded {
        Ok(Some(world)) => {
            info!(
                "Loaded world with seed {} from {}",
                world.seed(),
                config.save_path.display()
            );
            return (world, false);
        }
        Ok(None) => info!("No save at {}", config.save_path.display()),
        Err(e) => {
            error!("Could not load {}: {e}", config.save_path.display());
            match persistence::back_up(&config.save_path).await {
                Ok(path) => warn!("Kept the unreadable save as {}", path.display()),
                Err(e) => error!("Could not back up the unreadable save: {e}"),
            }
        }
    }
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("Generating a new {} world with seed {seed}", config.ruleset.name);
    let world = World::new(
        seed,
        config.ruleset.clone(),
        config.cache_capacity,
        config.active_radius,
    );
    (world, true)
}

fn spawn_timers(assets: Arc<Assets>) {
    let autosave = assets.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(autosave.config.autosave);
        interval.tick().await;
        loop {
            interval.tick().await;
            match sync::save_world(&autosave, true).await {
                Ok(true) => info!("Autosaved world"),
                Ok(false) => debug!("Autosave skipped, nothing changed"),
                Err(e) => error!("Autosave failed: {e}"),
            }
        }
    });
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(assets.config.cleanup);
        interval.tick().await;
        loop {
            interval.tick().await;
            let (expired, trimmed) = sync::cleanup(&assets, Instant::now());
            debug!("Cleanup expired {expired} cooldowns and parked {trimmed} chunks");
        }
    });
}

async fn accept_loop(listener: TcpListener, assets: Arc<Assets>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                ConnectionActorHandle::spawn(stream, assets.clone()).await;
                info!("New connection: {addr} ({} open)", assets.hub.len().await);
            }
            Err(e) => {
                error!("Accepting a connection failed: {e}");
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
        }
    }
}

pub(crate) async fn start_server(config: ServerConfig) -> Result<(), WorldError> {
    let (world, fresh) = load_world(&config).await;
    let assets = Arc::new(Assets::new(config, world));
    if fresh {
        if let Err(e) = sync::save_world(&assets, false).await {
            error!("Could not write the new world: {e}");
        }
    }

    let address = SocketAddr::new(assets.config.bind, assets.config.port);
    let listener = TcpListener::bind(address).await?;
    info!("Listening on {address}");

    let web_assets = assets.clone();
    tokio::spawn(async move {
        web::serve::init(web_assets).await;
    });
    spawn_timers(assets.clone());

    tokio::select! {
        _ = accept_loop(listener, assets.clone()) => {}
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!("Waiting for Ctrl-C failed: {e}");
            }
            info!("Shutting down");
        }
    }
    sync::save_world(&assets, true).await?;
    Ok(())
}
