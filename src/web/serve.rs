use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{error, info};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::cors::{Any, CorsLayer};

use antcraft_lib::web::dto::{Player, WorldInfo};

use crate::serve::ConnectionActorMessage;
use crate::{sync, Assets};

fn router(assets: Arc<Assets>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_origin(Any);

    Router::new()
        .route("/players", get(players))
        .route("/world", get(world))
        .route("/world/save", post(save))
        .route("/world/reset", post(reset))
        .with_state(assets)
        .layer(cors)
}

pub(crate) async fn init(assets: Arc<Assets>) {
    let address = SocketAddr::new(assets.config.bind, assets.config.web_port);
    info!("Starting up web server on {address}...");
    let listener = match TcpListener::bind(address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Web server could not bind {address}: {e}");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, router(assets).into_make_service()).await {
        error!("Web server stopped: {e}");
    }
}

async fn players(State(assets): State<Arc<Assets>>) -> impl IntoResponse {
    let mut players: Vec<Player> = vec![];
    for connection in assets.hub.handles().await {
        let (sender, receiver) = oneshot::channel();
        connection
            .send(ConnectionActorMessage::PlayerInfo(sender))
            .await;
        // connections that closed meanwhile or never joined have nothing to report
        if let Ok(Some(player)) = receiver.await {
            players.push(player);
        }
    }
    (StatusCode::OK, Json(players))
}

fn world_info(assets: &Assets) -> WorldInfo {
    let world = sync::read(&assets.world);
    let rules = world.rules();
    let store = world.store();
    let metadata = world.metadata();
    WorldInfo {
        seed: world.seed(),
        ruleset: rules.name.to_string(),
        width: rules.world_width,
        height: rules.world_height,
        created_at: metadata.created_at.to_rfc3339(),
        last_saved: metadata.last_saved.map(|t| t.to_rfc3339()),
        block_updates: metadata.block_updates,
        loaded_chunks: store.active_len(),
        cached_chunks: store.cached_len(),
        edited_chunks: store.edited_len(),
        players: world.players().len(),
    }
}

async fn world(State(assets): State<Arc<Assets>>) -> Json<WorldInfo> {
    Json(world_info(&assets))
}

async fn save(State(assets): State<Arc<Assets>>) -> Response {
    match sync::save_world(&assets, false).await {
        Ok(_) => (StatusCode::OK, Json(world_info(&assets))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[derive(Deserialize)]
struct ResetQuery {
    seed: Option<i64>,
}

async fn reset(State(assets): State<Arc<Assets>>, Query(query): Query<ResetQuery>) -> Response {
    match sync::reset_world(&assets, query.seed).await {
        Ok(()) => (StatusCode::OK, Json(world_info(&assets))).into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod test {
    use std::env;
    use std::path::PathBuf;

    use uuid::Uuid;

    use super::*;
    use crate::config::ServerConfig;
    use crate::world::rules::Ruleset;
    use crate::world::World;

    fn assets(save_path: PathBuf) -> Arc<Assets> {
        let config = ServerConfig {
            save_path,
            ..ServerConfig::default()
        };
        Arc::new(Assets::new(config, World::new(31, Ruleset::terraria(), 8, 1)))
    }

    fn temp_save() -> PathBuf {
        env::temp_dir().join(format!("antcraft-web-{}.json", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn world_reports_counts() {
        let assets = assets(temp_save());
        sync::write(&assets.world).get_tile(10, 300);
        let Json(info) = world(State(assets)).await;
        assert_eq!(info.seed, 31);
        assert_eq!(info.ruleset, "terraria");
        assert_eq!(info.loaded_chunks, 1);
        assert!(info.last_saved.is_none());
    }

    #[tokio::test]
    async fn reset_with_seed_persists() {
        let path = temp_save();
        let assets = assets(path.clone());
        let response = reset(State(assets.clone()), Query(ResetQuery { seed: Some(4) })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(sync::read(&assets.world).seed(), 4);
        assert!(!sync::read(&assets.world).is_dirty());
        assert!(path.exists());
        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn save_failure_is_a_server_error() {
        let dir = env::temp_dir().join(format!("antcraft-missing-{}", Uuid::new_v4()));
        let assets = assets(dir.join("world.json"));
        let response = save(State(assets.clone())).await;
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(sync::read(&assets.world).is_dirty());
    }

    #[tokio::test]
    async fn no_connections_no_players() {
        let response = players(State(assets(temp_save()))).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
