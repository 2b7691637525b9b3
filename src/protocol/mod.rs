//! Wire-compatible message types for the game server protocol.
//!
//! Every frame on the wire is an envelope `{ "Type": "<tag>", "Data": { ... } }`
//! (see [`crate::envelope`]). The tag uniquely determines the payload schema;
//! this module defines one payload struct per tag and ties the two together
//! through the [`Message`] trait.
//!
//! Field names are PascalCase on the wire. Unknown fields sent by a newer
//! server are ignored; optional fields and collections default when absent.
//! String enums decode a value they do not know as their `Unknown` variant.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Declares [`MessageType`] from the list of wire tags.
macro_rules! message_types {
    ($($(#[$meta:meta])* $variant:ident),+ $(,)?) => {
        /// Stable string tag identifying an envelope's payload schema.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum MessageType {
            $($(#[$meta])* $variant,)+
        }

        impl MessageType {
            /// Every tag known to this client, in declaration order.
            pub const ALL: &'static [MessageType] = &[$(MessageType::$variant,)+];

            /// The tag exactly as it appears in the envelope's `Type` field.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(MessageType::$variant => stringify!($variant),)+
                }
            }

            /// Look up a tag by its wire string. Matching is case-sensitive.
            pub fn from_tag(tag: &str) -> Option<Self> {
                match tag {
                    $(stringify!($variant) => Some(MessageType::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

message_types! {
    // Session
    ConnectionConfirmed,
    Login,
    LoginResponse,
    SessionValidation,
    Heartbeat,
    // Player
    PlayerMovement,
    PlayerJoined,
    PlayerLeft,
    PlayerStatsUpdate,
    LevelUp,
    HealthChange,
    ExperienceGain,
    RespawnRequest,
    RespawnResponse,
    ChatMessage,
    SystemNotification,
    // Enemies
    EnemySpawn,
    EnemyUpdate,
    EnemyDamage,
    EnemyDeath,
    // Items
    InventoryRequest,
    InventoryResponse,
    InventoryUpdate,
    ItemUseRequest,
    ItemUseResponse,
    ItemSellRequest,
    ItemSellResponse,
    ItemEquipRequest,
    ItemEquipResponse,
    ItemUnequipRequest,
    ItemUnequipResponse,
    EquipmentRequest,
    EquipmentResponse,
    EquipmentUpdate,
    WeaponTiming,
    LootDrop,
    LootPickupRequest,
    LootPickupResponse,
    // Combat
    CombatAction,
    ProjectileLaunch,
    ProjectileHit,
    DamageConfirmation,
    GrenadeThrow,
    GrenadeSpawn,
    GrenadeWarning,
    GrenadeExplosion,
    GrenadeError,
    GrenadeCountUpdate,
    // World
    WorldUpdate,
    TerrainChange,
    LevelComplete,
    LevelContinue,
    PlayerReposition,
    SkillAllocationRequest,
    SkillAllocationResponse,
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payload type bound to exactly one wire tag.
pub trait Message: Serialize + DeserializeOwned + Send + 'static {
    /// The envelope tag this payload travels under.
    const TYPE: MessageType;
}

/// Implements [`Message`] for payload structs.
macro_rules! impl_message {
    ($($ty:ty => $tag:ident),+ $(,)?) => {
        $(
            impl $crate::protocol::Message for $ty {
                const TYPE: $crate::protocol::MessageType = $crate::protocol::MessageType::$tag;
            }
        )+
    };
}

pub mod combat;
pub mod enemy;
pub mod items;
pub mod player;
pub mod session;
pub mod world;

pub use combat::*;
pub use enemy::*;
pub use items::*;
pub use player::*;
pub use session::*;
pub use world::*;

/// Identifier assigned by the server to players, enemies, items and other entities.
pub type EntityId = String;

/// A plain 3-component vector.
///
/// Engine vector types never appear in the payload model. Convert at the
/// boundary with [`Vec3::from_array`] / [`Vec3::to_array`] (or the matching
/// `From` impls); the wire form is `{ "X": .., "Y": .., "Z": .. }`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    /// The origin.
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Build from an `[x, y, z]` triple.
    pub const fn from_array([x, y, z]: [f32; 3]) -> Self {
        Self { x, y, z }
    }

    /// Convert to an `[x, y, z]` triple.
    pub const fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(value: [f32; 3]) -> Self {
        Self::from_array(value)
    }
}

impl From<Vec3> for [f32; 3] {
    fn from(value: Vec3) -> Self {
        value.to_array()
    }
}
