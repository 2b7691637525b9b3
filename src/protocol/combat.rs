//! Melee, projectile and grenade payloads.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{EntityId, Vec3};

/// A melee/ability action performed by a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CombatAction {
    pub player_id: EntityId,
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub direction: Vec3,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectileLaunch {
    pub projectile_id: EntityId,
    pub shooter_id: EntityId,
    pub weapon_type: String,
    pub position: Vec3,
    pub direction: Vec3,
    #[serde(default)]
    pub speed: f32,
    #[serde(default)]
    pub timestamp: f64,
}

/// What a projectile or explosion hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetKind {
    Player,
    Enemy,
    #[default]
    Terrain,
    /// A value added by a newer server.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ProjectileHit {
    pub projectile_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default)]
    pub target_type: TargetKind,
    pub position: Vec3,
    #[serde(default)]
    pub damage: i32,
}

/// Server confirmation of damage the client predicted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DamageConfirmation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub projectile_id: Option<EntityId>,
    pub target_id: EntityId,
    #[serde(default)]
    pub target_type: TargetKind,
    pub damage: i32,
    #[serde(default)]
    pub is_critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remaining_health: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeThrow {
    pub grenade_type: String,
    pub position: Vec3,
    pub direction: Vec3,
    #[serde(default)]
    pub throw_force: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeSpawn {
    pub grenade_id: EntityId,
    pub thrower_id: EntityId,
    pub grenade_type: String,
    pub position: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default)]
    pub fuse_time: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeWarning {
    pub grenade_id: EntityId,
    pub position: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub time_to_explode: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExplosionHit {
    pub target_id: EntityId,
    #[serde(default)]
    pub target_type: TargetKind,
    pub damage: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeExplosion {
    pub grenade_id: EntityId,
    pub position: Vec3,
    pub radius: f32,
    #[serde(default)]
    pub damage: i32,
    #[serde(default)]
    pub hits: Vec<ExplosionHit>,
}

/// Rejected throw (no grenades left, cooldown, invalid type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grenade_type: Option<String>,
}

/// Remaining grenades per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrenadeCountUpdate {
    pub player_id: EntityId,
    #[serde(default)]
    pub counts: BTreeMap<String, u32>,
}

impl_message! {
    CombatAction => CombatAction,
    ProjectileLaunch => ProjectileLaunch,
    ProjectileHit => ProjectileHit,
    DamageConfirmation => DamageConfirmation,
    GrenadeThrow => GrenadeThrow,
    GrenadeSpawn => GrenadeSpawn,
    GrenadeWarning => GrenadeWarning,
    GrenadeExplosion => GrenadeExplosion,
    GrenadeError => GrenadeError,
    GrenadeCountUpdate => GrenadeCountUpdate,
}
