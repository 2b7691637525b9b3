//! Enemy lifecycle payloads (server → client only).

use serde::{Deserialize, Serialize};

use super::{EntityId, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnemySpawn {
    pub enemy_id: EntityId,
    pub enemy_type: String,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    pub health: i32,
    pub max_health: i32,
    #[serde(default)]
    pub level: u32,
}

/// Periodic enemy state. `State` is the server's AI state name (`"Idle"`, `"Chasing"`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnemyUpdate {
    pub enemy_id: EntityId,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnemyDamage {
    pub enemy_id: EntityId,
    pub damage: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attacker_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_health: Option<i32>,
    #[serde(default)]
    pub is_critical: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnemyDeath {
    pub enemy_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub killer_id: Option<EntityId>,
    #[serde(default)]
    pub experience_reward: u64,
}

impl_message! {
    EnemySpawn => EnemySpawn,
    EnemyUpdate => EnemyUpdate,
    EnemyDamage => EnemyDamage,
    EnemyDeath => EnemyDeath,
}
