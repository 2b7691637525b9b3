//! Inventory, equipment and loot payloads.
//!
//! Requests and responses are correlated only by tag and, where present, an
//! embedded identifier (`ItemId`, `LootId`). The client keeps no request ids.

use serde::{Deserialize, Serialize};

use super::{EntityId, Vec3};

/// Equipment slot names used by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EquipmentSlot {
    Head,
    Chest,
    Legs,
    Feet,
    Hands,
    MainHand,
    OffHand,
    Accessory,
    /// A value added by a newer server.
    #[serde(other)]
    Unknown,
}

/// One stack of items as the server describes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Item {
    pub item_id: EntityId,
    pub name: String,
    #[serde(default)]
    pub item_type: String,
    #[serde(default)]
    pub rarity: String,
    #[serde(default = "one")]
    pub quantity: u32,
    #[serde(default)]
    pub value: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<EquipmentSlot>,
}

fn one() -> u32 {
    1
}

/// An item in a specific inventory slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventorySlot {
    pub slot_index: u32,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquippedItem {
    pub slot: EquipmentSlot,
    pub item: Item,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryRequest {
    pub player_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryResponse {
    pub success: bool,
    #[serde(default)]
    pub items: Vec<InventorySlot>,
    #[serde(default)]
    pub gold: u64,
    #[serde(default)]
    pub max_slots: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Unsolicited inventory change (pickup, consumption, trade).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InventoryUpdate {
    pub player_id: EntityId,
    #[serde(default)]
    pub items: Vec<InventorySlot>,
    #[serde(default)]
    pub gold: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUseRequest {
    pub item_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot_index: Option<u32>,
}

/// Shared shape of the use/equip/unequip responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemActionResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemUseResponse(pub ItemActionResponse);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemSellRequest {
    pub item_id: EntityId,
    #[serde(default = "one")]
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemSellResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<EntityId>,
    #[serde(default)]
    pub gold_earned: u64,
    #[serde(default)]
    pub total_gold: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemEquipRequest {
    pub item_id: EntityId,
    pub slot: EquipmentSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemEquipResponse(pub ItemActionResponse);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemUnequipRequest {
    pub slot: EquipmentSlot,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemUnequipResponse(pub ItemActionResponse);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquipmentRequest {
    pub player_id: EntityId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquipmentResponse {
    pub success: bool,
    #[serde(default)]
    pub equipment: Vec<EquippedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Equipment changed for a player (self or other; drives visible gear).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EquipmentUpdate {
    pub player_id: EntityId,
    #[serde(default)]
    pub equipment: Vec<EquippedItem>,
}

/// Server-authoritative attack cadence for the equipped weapon, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct WeaponTiming {
    pub player_id: EntityId,
    pub weapon_type: String,
    pub attack_speed: f32,
    #[serde(default)]
    pub cooldown: f32,
    #[serde(default)]
    pub wind_up: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LootDrop {
    pub loot_id: EntityId,
    pub item: Item,
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_enemy_id: Option<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LootPickupRequest {
    pub loot_id: EntityId,
}

/// Carries the same `LootId` as the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LootPickupResponse {
    pub loot_id: EntityId,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Item>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl_message! {
    InventoryRequest => InventoryRequest,
    InventoryResponse => InventoryResponse,
    InventoryUpdate => InventoryUpdate,
    ItemUseRequest => ItemUseRequest,
    ItemUseResponse => ItemUseResponse,
    ItemSellRequest => ItemSellRequest,
    ItemSellResponse => ItemSellResponse,
    ItemEquipRequest => ItemEquipRequest,
    ItemEquipResponse => ItemEquipResponse,
    ItemUnequipRequest => ItemUnequipRequest,
    ItemUnequipResponse => ItemUnequipResponse,
    EquipmentRequest => EquipmentRequest,
    EquipmentResponse => EquipmentResponse,
    EquipmentUpdate => EquipmentUpdate,
    WeaponTiming => WeaponTiming,
    LootDrop => LootDrop,
    LootPickupRequest => LootPickupRequest,
    LootPickupResponse => LootPickupResponse,
}
