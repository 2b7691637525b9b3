//! World snapshot, terrain, level flow and skill payloads.

use serde::{Deserialize, Serialize};

use super::{EntityId, Vec3};

/// One player's entry in a [`WorldUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerSnapshot {
    pub player_id: EntityId,
    #[serde(default)]
    pub player_name: String,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default)]
    pub health: i32,
    #[serde(default)]
    pub max_health: i32,
}

/// One enemy's entry in a [`WorldUpdate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnemySnapshot {
    pub enemy_id: EntityId,
    #[serde(default)]
    pub enemy_type: String,
    pub position: Vec3,
    #[serde(default)]
    pub health: i32,
}

/// Multi-entity snapshot. Always a single frame regardless of entity count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WorldUpdate {
    #[serde(default)]
    pub players: Vec<PlayerSnapshot>,
    #[serde(default)]
    pub enemies: Vec<EnemySnapshot>,
    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TerrainChangeKind {
    #[default]
    Crater,
    Raise,
    Flatten,
    /// A value added by a newer server.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TerrainChange {
    pub position: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub depth: f32,
    #[serde(default)]
    pub change_type: TerrainChangeKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LevelComplete {
    pub level_number: u32,
    #[serde(default)]
    pub next_level: Option<u32>,
    #[serde(default)]
    pub completion_time: f32,
    #[serde(default)]
    pub enemies_killed: u32,
}

/// Client → server: ready to move on to the next level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LevelContinue {
    pub player_id: EntityId,
    pub level_number: u32,
}

/// Server-forced teleport (level change, anti-cheat correction, respawn).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerReposition {
    pub player_id: EntityId,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SkillAllocationRequest {
    pub skill_name: String,
    pub points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SkillAllocationResponse {
    pub success: bool,
    pub skill_name: String,
    #[serde(default)]
    pub new_value: u32,
    #[serde(default)]
    pub remaining_points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl_message! {
    WorldUpdate => WorldUpdate,
    TerrainChange => TerrainChange,
    LevelComplete => LevelComplete,
    LevelContinue => LevelContinue,
    PlayerReposition => PlayerReposition,
    SkillAllocationRequest => SkillAllocationRequest,
    SkillAllocationResponse => SkillAllocationResponse,
}
