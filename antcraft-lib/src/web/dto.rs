use serde::{Deserialize, Serialize};

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct Player {
    pub name: String,
    pub uuid: String,
    pub position: Position,
    pub score: u32,
    pub inventory: Vec<InventoryItem>,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub direction: u8,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
pub struct InventoryItem {
    pub tile: String,
    pub count: u32,
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Debug)]
#[serde(rename_all = "camelCase")]
pub struct WorldInfo {
    pub seed: i64,
    pub ruleset: String,
    pub width: i32,
    pub height: i32,
    pub created_at: String,
    pub last_saved: Option<String>,
    pub block_updates: u64,
    pub loaded_chunks: usize,
    pub cached_chunks: usize,
    pub edited_chunks: usize,
    pub players: usize,
}
