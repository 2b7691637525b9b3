//! Typed outbound API.
//!
//! [`Outbound`] is a cheap, cloneable, `Send` handle. Each method builds the
//! typed payload, wraps it in an envelope and hands the frame to the I/O task.
//! Sends made while the connection is not open are dropped with a warning and
//! nothing reaches the transport.
//!
//! Every method returns a [`SendReceipt`]. Await it (or poll it with
//! [`SendReceipt::try_result`] from a game loop) to learn whether the frame
//! was written; call [`SendReceipt::detach`] to fire and forget.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};

use tokio::sync::{mpsc, oneshot};
use tracing::{trace, warn};

use crate::envelope::encode_envelope;
use crate::error::{GameLinkError, Result};
use crate::protocol::{
    ChatMessage, CombatAction, EntityId, EquipmentRequest, EquipmentSlot, GrenadeThrow, Heartbeat,
    InventoryRequest, ItemEquipRequest, ItemSellRequest, ItemUnequipRequest, ItemUseRequest,
    LevelContinue, LoginRequest, LootPickupRequest, Message, MessageType, PlayerMovement,
    ProjectileHit, ProjectileLaunch, RespawnRequest, SessionValidation, SkillAllocationRequest,
    Vec3,
};
use crate::transport::{ConnectionCell, ConnectionState};

/// One encoded frame on its way to the I/O task.
#[derive(Debug)]
pub(crate) struct OutboundFrame {
    pub(crate) message_type: MessageType,
    pub(crate) text: String,
    pub(crate) ack: oneshot::Sender<Result<()>>,
}

/// State shared by the client, every [`Outbound`] clone and the I/O task.
///
/// The sender is replaced on every connection attempt, so a clone of
/// [`Outbound`] taken before a reconnect keeps working afterwards.
#[derive(Debug, Default)]
pub(crate) struct Link {
    pub(crate) state: ConnectionCell,
    sender: Mutex<Option<mpsc::UnboundedSender<OutboundFrame>>>,
}

impl Link {
    pub(crate) fn install_sender(&self, sender: mpsc::UnboundedSender<OutboundFrame>) {
        *self.sender.lock().unwrap_or_else(PoisonError::into_inner) = Some(sender);
    }

    pub(crate) fn clear_sender(&self) {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).take();
    }

    fn sender(&self) -> Option<mpsc::UnboundedSender<OutboundFrame>> {
        self.sender.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub(crate) fn connection_state(&self) -> ConnectionState {
        self.state.get()
    }
}

/// Handle for sending typed messages to the server.
#[derive(Debug, Clone)]
pub struct Outbound {
    link: Arc<Link>,
}

impl Outbound {
    pub(crate) fn new(link: Arc<Link>) -> Self {
        Self { link }
    }

    /// `true` if a send made now would reach the transport.
    pub fn is_connected(&self) -> bool {
        self.link.state.is_open()
    }

    /// Encode `payload` under its own tag and queue it for the transport.
    pub fn send<M: Message>(&self, payload: &M) -> SendReceipt {
        if !self.link.state.is_open() {
            warn!(
                message_type = %M::TYPE,
                state = ?self.link.connection_state(),
                "not connected, dropping outbound message"
            );
            return SendReceipt::ready(Err(GameLinkError::NotConnected));
        }

        let text = match encode_envelope(payload) {
            Ok(text) => text,
            Err(e) => {
                warn!(message_type = %M::TYPE, error = %e, "failed to encode outbound message");
                return SendReceipt::ready(Err(e));
            }
        };

        let Some(sender) = self.link.sender() else {
            warn!(message_type = %M::TYPE, "no active connection task, dropping outbound message");
            return SendReceipt::ready(Err(GameLinkError::NotConnected));
        };

        let (ack, receipt) = oneshot::channel();
        let frame = OutboundFrame {
            message_type: M::TYPE,
            text,
            ack,
        };
        match sender.send(frame) {
            Ok(()) => {
                trace!(message_type = %M::TYPE, "queued outbound message");
                SendReceipt::pending(receipt)
            }
            Err(_) => {
                warn!(message_type = %M::TYPE, "connection task has stopped, dropping outbound message");
                SendReceipt::ready(Err(GameLinkError::NotConnected))
            }
        }
    }

    // ── Session ─────────────────────────────────────────────────────

    /// Send a `Login` with a username and password.
    pub fn login(&self, username: impl Into<String>, password: impl Into<String>) -> SendReceipt {
        self.send(&LoginRequest {
            username: username.into(),
            password: password.into(),
        })
    }

    /// Ask the server to resume a session from a persisted token.
    pub fn validate_session(&self, session_token: impl Into<String>) -> SendReceipt {
        self.send(&SessionValidation {
            session_token: session_token.into(),
        })
    }

    /// Send a `Heartbeat` (empty payload).
    pub fn heartbeat(&self) -> SendReceipt {
        self.send(&Heartbeat {})
    }

    // ── Player ──────────────────────────────────────────────────────

    /// Report the local player's position, rotation and velocity.
    pub fn send_movement(&self, movement: &PlayerMovement) -> SendReceipt {
        self.send(movement)
    }

    /// Post a chat message.
    pub fn send_chat(&self, chat: &ChatMessage) -> SendReceipt {
        self.send(chat)
    }

    /// Ask to respawn `player_id` after death.
    pub fn request_respawn(&self, player_id: impl Into<EntityId>) -> SendReceipt {
        self.send(&RespawnRequest {
            player_id: player_id.into(),
        })
    }

    /// Move on to `level_number` after a `LevelComplete`.
    pub fn continue_level(&self, player_id: impl Into<EntityId>, level_number: u32) -> SendReceipt {
        self.send(&LevelContinue {
            player_id: player_id.into(),
            level_number,
        })
    }

    /// Spend `points` unspent skill points on `skill_name`.
    pub fn allocate_skill(&self, skill_name: impl Into<String>, points: u32) -> SendReceipt {
        self.send(&SkillAllocationRequest {
            skill_name: skill_name.into(),
            points,
        })
    }

    // ── Inventory & equipment ───────────────────────────────────────

    /// Request the full inventory; answered with `InventoryResponse`.
    pub fn request_inventory(&self, player_id: impl Into<EntityId>) -> SendReceipt {
        self.send(&InventoryRequest {
            player_id: player_id.into(),
        })
    }

    /// Use (consume or activate) an inventory item.
    pub fn use_item(&self, item_id: impl Into<EntityId>, slot_index: Option<u32>) -> SendReceipt {
        self.send(&ItemUseRequest {
            item_id: item_id.into(),
            slot_index,
        })
    }

    /// Sell `quantity` of an item.
    pub fn sell_item(&self, item_id: impl Into<EntityId>, quantity: u32) -> SendReceipt {
        self.send(&ItemSellRequest {
            item_id: item_id.into(),
            quantity,
        })
    }

    /// Equip an item into `slot`.
    pub fn equip_item(&self, item_id: impl Into<EntityId>, slot: EquipmentSlot) -> SendReceipt {
        self.send(&ItemEquipRequest {
            item_id: item_id.into(),
            slot,
        })
    }

    /// Empty an equipment slot.
    pub fn unequip_item(&self, slot: EquipmentSlot) -> SendReceipt {
        self.send(&ItemUnequipRequest { slot })
    }

    /// Request what is currently equipped; answered with `EquipmentResponse`.
    pub fn request_equipment(&self, player_id: impl Into<EntityId>) -> SendReceipt {
        self.send(&EquipmentRequest {
            player_id: player_id.into(),
        })
    }

    /// Try to pick up a loot drop.
    pub fn pickup_loot(&self, loot_id: impl Into<EntityId>) -> SendReceipt {
        self.send(&LootPickupRequest {
            loot_id: loot_id.into(),
        })
    }

    // ── Combat ──────────────────────────────────────────────────────

    /// Report a melee attack, block or similar action.
    pub fn send_combat_action(&self, action: &CombatAction) -> SendReceipt {
        self.send(action)
    }

    /// Report a fired projectile.
    pub fn launch_projectile(&self, launch: &ProjectileLaunch) -> SendReceipt {
        self.send(launch)
    }

    /// Report where a projectile landed and what it hit.
    pub fn report_projectile_hit(&self, hit: &ProjectileHit) -> SendReceipt {
        self.send(hit)
    }

    /// Throw a grenade of `grenade_type` from `position` along `direction`.
    pub fn throw_grenade(
        &self,
        grenade_type: impl Into<String>,
        position: Vec3,
        direction: Vec3,
        throw_force: f32,
    ) -> SendReceipt {
        self.send(&GrenadeThrow {
            grenade_type: grenade_type.into(),
            position,
            direction,
            throw_force,
        })
    }
}

// ── Receipt ─────────────────────────────────────────────────────────

/// Completion of one send. Resolves to `Ok(())` once the transport accepted
/// the frame, or to the reason it never will.
#[must_use = "await the receipt, poll `try_result`, or call `detach()`"]
#[derive(Debug)]
pub struct SendReceipt {
    inner: ReceiptInner,
}

#[derive(Debug)]
enum ReceiptInner {
    Ready(Option<Result<()>>),
    Pending(oneshot::Receiver<Result<()>>),
}

impl SendReceipt {
    fn ready(result: Result<()>) -> Self {
        Self {
            inner: ReceiptInner::Ready(Some(result)),
        }
    }

    fn pending(receiver: oneshot::Receiver<Result<()>>) -> Self {
        Self {
            inner: ReceiptInner::Pending(receiver),
        }
    }

    /// `true` if the message was handed to the connection task. `false`
    /// means it was dropped before reaching the transport.
    pub fn was_queued(&self) -> bool {
        matches!(self.inner, ReceiptInner::Pending(_))
    }

    /// Non-blocking check for game loops. Returns `None` while the frame is
    /// still in flight; after the outcome has been returned once, further
    /// calls return `None`.
    pub fn try_result(&mut self) -> Option<Result<()>> {
        match &mut self.inner {
            ReceiptInner::Ready(result) => result.take(),
            ReceiptInner::Pending(receiver) => match receiver.try_recv() {
                Ok(result) => {
                    self.inner = ReceiptInner::Ready(None);
                    Some(result)
                }
                Err(oneshot::error::TryRecvError::Empty) => None,
                Err(oneshot::error::TryRecvError::Closed) => {
                    self.inner = ReceiptInner::Ready(None);
                    Some(Err(GameLinkError::TransportClosed))
                }
            },
        }
    }

    /// Discard the outcome.
    pub fn detach(self) {}
}

impl Future for SendReceipt {
    type Output = Result<()>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            ReceiptInner::Ready(result) => {
                Poll::Ready(result.take().unwrap_or(Err(GameLinkError::TransportClosed)))
            }
            ReceiptInner::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|outcome| outcome.unwrap_or(Err(GameLinkError::TransportClosed))),
        }
    }
}
