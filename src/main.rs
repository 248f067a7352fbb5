use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::{Mutex, RwLock};

use dotenv::dotenv;
use log::error;

use crate::client::VisitAction;
use crate::config::ServerConfig;
use crate::cooldown::EditCooldown;
use crate::serve::Hub;
use crate::world::World;

const SOLO_COLUMNS: i32 = 32;

mod client;
mod config;
mod connection;
mod cooldown;
mod err;
mod packets;
mod protocol_types;
mod protocol_util;
mod serve;
mod sync;
mod web;
mod world;

/// Everything the connection actors, timers and the admin API share.
pub(crate) struct Assets {
    pub(crate) config: ServerConfig,
    pub(crate) world: RwLock<World>,
    pub(crate) cooldown: Mutex<EditCooldown>,
    pub(crate) hub: Hub,
}

impl Assets {
    pub(crate) fn new(config: ServerConfig, world: World) -> Self {
        let cooldown = EditCooldown::new(config.dig_cooldown);
        Self {
            config,
            world: RwLock::new(world),
            cooldown: Mutex::new(cooldown),
            hub: Hub::default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    env_logger::init();

    let mut args = env::args().skip(1);
    let result = match args.next().as_deref() {
        // `antcraft visit <host:port> [dig | reset [seed]]` joins a running server as a client
        Some("visit") => {
            let addr = args.next().and_then(|a| a.parse::<SocketAddr>().ok());
            let (Some(addr), Some(action)) = (addr, VisitAction::from_args(args)) else {
                error!("usage: antcraft visit <host:port> [dig | reset [seed]]");
                return ExitCode::FAILURE;
            };
            client::visit(addr, action).await.map_err(|e| e.to_string())
        }
        // `antcraft solo [seed] [columns]` plays a headless single-player session
        Some("solo") => {
            let seed = match args.next().map(|s| s.parse::<i64>()) {
                None => None,
                Some(Ok(seed)) => Some(seed),
                Some(Err(_)) => {
                    error!("usage: antcraft solo [seed] [columns]");
                    return ExitCode::FAILURE;
                }
            };
            let columns = args.next().and_then(|c| c.parse().ok()).unwrap_or(SOLO_COLUMNS);
            client::solo::dig_trench(&ServerConfig::from_env(), seed, columns)
                .await
                .map(|dug| {
                    for (pos, tile) in dug {
                        println!("dug {tile} at {},{}", pos.x, pos.y);
                    }
                })
                .map_err(|e| e.to_string())
        }
        _ => serve::start_server(ServerConfig::from_env())
            .await
            .map_err(|e| e.to_string()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
