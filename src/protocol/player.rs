//! Player state, movement, progression and chat payloads.

use serde::{Deserialize, Serialize};

use super::{EntityId, Vec3};

/// Position/orientation update for one player. Sent by the client for the
/// local player and relayed by the server for everyone else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerMovement {
    pub player_id: EntityId,
    pub position: Vec3,
    #[serde(default)]
    pub rotation: Vec3,
    #[serde(default)]
    pub velocity: Vec3,
    #[serde(default)]
    pub is_grounded: bool,
    #[serde(default)]
    pub timestamp: f64,
}

/// Another player entered the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerJoined {
    pub player_id: EntityId,
    #[serde(default)]
    pub player_name: String,
    #[serde(default)]
    pub position: Vec3,
}

/// Another player left the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerLeft {
    pub player_id: EntityId,
}

/// Full stat block for a player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlayerStatsUpdate {
    pub player_id: EntityId,
    pub level: u32,
    pub experience: u64,
    #[serde(default)]
    pub experience_to_next_level: u64,
    pub health: i32,
    pub max_health: i32,
    #[serde(default)]
    pub strength: u32,
    #[serde(default)]
    pub agility: u32,
    #[serde(default)]
    pub endurance: u32,
    #[serde(default)]
    pub unspent_skill_points: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LevelUp {
    pub player_id: EntityId,
    pub new_level: u32,
    #[serde(default)]
    pub skill_points_gained: u32,
}

/// Health changed for a player. `Delta` is negative for damage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthChange {
    pub player_id: EntityId,
    pub current_health: i32,
    pub max_health: i32,
    #[serde(default)]
    pub delta: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExperienceGain {
    pub player_id: EntityId,
    pub amount: u64,
    #[serde(default)]
    pub total_experience: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RespawnRequest {
    pub player_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RespawnResponse {
    pub success: bool,
    #[serde(default)]
    pub position: Vec3,
    #[serde(default)]
    pub health: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Chat channel a message was posted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ChannelType {
    #[default]
    Global,
    Party,
    Whisper,
    System,
    /// A value added by a newer server.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatMessage {
    pub sender_id: EntityId,
    #[serde(default)]
    pub sender_name: String,
    pub message: String,
    #[serde(default)]
    pub channel_type: ChannelType,
    /// Recipient for whispers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_id: Option<EntityId>,
    #[serde(default)]
    pub timestamp: f64,
}

/// Severity of a [`SystemNotification`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
    Error,
    /// A value added by a newer server.
    #[serde(other)]
    Unknown,
}

/// Server-wide announcement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemNotification {
    pub message: String,
    #[serde(default)]
    pub level: NotificationLevel,
}

impl_message! {
    PlayerMovement => PlayerMovement,
    PlayerJoined => PlayerJoined,
    PlayerLeft => PlayerLeft,
    PlayerStatsUpdate => PlayerStatsUpdate,
    LevelUp => LevelUp,
    HealthChange => HealthChange,
    ExperienceGain => ExperienceGain,
    RespawnRequest => RespawnRequest,
    RespawnResponse => RespawnResponse,
    ChatMessage => ChatMessage,
    SystemNotification => SystemNotification,
}
