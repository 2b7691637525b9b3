//! Tag → decode → closure table.
//!
//! The router runs on the I/O side. For every complete frame it decodes the
//! envelope, looks the tag up, decodes the payload into its typed struct and
//! enqueues a closure that publishes it on the consumer thread. Frames that
//! fail any of those steps are logged once and dropped; nothing is enqueued
//! for them.
//!
//! Client → server request tags (`Login`, `ItemSellRequest`, ...) have no
//! inbound route and are dropped like unknown tags.

use std::collections::HashMap;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::envelope::{decode_payload, Envelope};
use crate::error::{GameLinkError, Result};
use crate::event::ConnectionEvent;
use crate::event_bus::EventBus;
use crate::heartbeat::Liveness;
use crate::outbound::Outbound;
use crate::protocol::*;
use crate::scheduler::{PendingAction, SchedulerHandle};
use crate::session::SessionMachine;

/// Decodes one payload and packages its delivery.
pub type Route = fn(Value) -> Result<PendingAction<Dispatch>>;

/// Consumer-thread state handed to every queued action.
///
/// Owned by the client and only touched inside a drain cycle, which is what
/// keeps subscribers, the session machine and the timers single-threaded.
#[derive(Debug)]
pub struct Dispatch {
    pub(crate) bus: EventBus,
    pub(crate) session: SessionMachine,
    pub(crate) outbound: Outbound,
    pub(crate) liveness: Liveness,
    pub(crate) now: Instant,
    /// Connection attempt whose lifecycle drives the session and timers.
    pub(crate) epoch: u64,
}

impl Dispatch {
    pub(crate) fn new(outbound: Outbound, liveness: Liveness) -> Self {
        Self {
            bus: EventBus::new(),
            session: SessionMachine::new(),
            outbound,
            liveness,
            now: Instant::now(),
            epoch: 0,
        }
    }

    /// Subscribers of every inbound payload and lifecycle event.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Mutable event bus.
    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    /// Authentication state machine.
    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    /// Send handle for replies issued from a queued action.
    pub fn outbound(&self) -> &Outbound {
        &self.outbound
    }

    /// Heartbeat and reconnect timers.
    pub fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Time of the tick currently draining.
    pub fn now(&self) -> Instant {
        self.now
    }

    /// Start a new connection attempt. Lifecycle events from earlier
    /// attempts that are still queued are then only published.
    pub(crate) fn begin_attempt(&mut self) -> u64 {
        self.epoch = self.epoch.wrapping_add(1);
        self.liveness.heartbeat.stop();
        self.session.begin_connect();
        self.epoch
    }

    pub(crate) fn on_connected(&mut self, epoch: u64, url: String) -> Result<()> {
        if epoch == self.epoch {
            self.liveness.heartbeat.start(self.now);
            self.liveness.reconnect.on_connected();
        } else {
            debug!(epoch, current = self.epoch, "connected event from a superseded attempt");
        }
        self.bus.publish(&ConnectionEvent::Connected { url }).map(drop)
    }

    pub(crate) fn on_disconnected(&mut self, epoch: u64, reason: Option<String>) -> Result<()> {
        if epoch == self.epoch {
            self.liveness.heartbeat.stop();
            self.session.reset();
            self.liveness.reconnect.on_disconnected(self.now);
        } else {
            debug!(epoch, current = self.epoch, "disconnected event from a superseded attempt");
        }
        self.bus.publish(&ConnectionEvent::Disconnected { reason }).map(drop)
    }
}

/// Fixed table of inbound routes keyed by wire tag.
#[derive(Debug, Clone)]
pub struct Router {
    routes: HashMap<&'static str, Route>,
}

impl Router {
    /// A router with a route for every tag a server sends.
    pub fn new() -> Self {
        let routes = MessageType::ALL
            .iter()
            .filter_map(|&kind| inbound_route(kind).map(|route| (kind.as_str(), route)))
            .collect();
        Self { routes }
    }

    /// `true` if frames tagged `kind` are delivered to subscribers.
    pub fn routes(&self, kind: MessageType) -> bool {
        self.routes.contains_key(kind.as_str())
    }

    /// Decode `text` and enqueue its delivery. Returns `false` if the frame
    /// was dropped; the reason has been logged.
    pub fn dispatch(&self, text: &str, scheduler: &SchedulerHandle<Dispatch>) -> bool {
        match self.decode(text) {
            Ok(action) => {
                scheduler.enqueue(action);
                true
            }
            Err(e) => {
                warn!(error = %e, frame_len = text.len(), "dropping inbound frame");
                false
            }
        }
    }

    /// Both decode phases without enqueueing.
    ///
    /// # Errors
    ///
    /// [`GameLinkError::MalformedEnvelope`], [`GameLinkError::UnknownMessageType`]
    /// or [`GameLinkError::PayloadDecode`].
    pub fn decode(&self, text: &str) -> Result<PendingAction<Dispatch>> {
        let (tag, data) = Envelope::decode(text)?.into_parts();
        let route = self
            .routes
            .get(tag.as_str())
            .ok_or_else(|| GameLinkError::UnknownMessageType(tag.clone()))?;
        trace!(message_type = %tag, "routing inbound frame");
        route(data)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

fn inbound_route(kind: MessageType) -> Option<Route> {
    use MessageType as T;

    let route: Route = match kind {
        T::ConnectionConfirmed => confirm_connection,
        T::LoginResponse => login_response,
        T::Heartbeat => publish::<Heartbeat>,

        T::PlayerMovement => publish::<PlayerMovement>,
        T::PlayerJoined => publish::<PlayerJoined>,
        T::PlayerLeft => publish::<PlayerLeft>,
        T::PlayerStatsUpdate => publish::<PlayerStatsUpdate>,
        T::LevelUp => publish::<LevelUp>,
        T::HealthChange => publish::<HealthChange>,
        T::ExperienceGain => publish::<ExperienceGain>,
        T::RespawnResponse => publish::<RespawnResponse>,
        T::ChatMessage => publish::<ChatMessage>,
        T::SystemNotification => publish::<SystemNotification>,

        T::EnemySpawn => publish::<EnemySpawn>,
        T::EnemyUpdate => publish::<EnemyUpdate>,
        T::EnemyDamage => publish::<EnemyDamage>,
        T::EnemyDeath => publish::<EnemyDeath>,

        T::InventoryResponse => publish::<InventoryResponse>,
        T::InventoryUpdate => publish::<InventoryUpdate>,
        T::ItemUseResponse => publish::<ItemUseResponse>,
        T::ItemSellResponse => publish::<ItemSellResponse>,
        T::ItemEquipResponse => publish::<ItemEquipResponse>,
        T::ItemUnequipResponse => publish::<ItemUnequipResponse>,
        T::EquipmentResponse => publish::<EquipmentResponse>,
        T::EquipmentUpdate => publish::<EquipmentUpdate>,
        T::WeaponTiming => publish::<WeaponTiming>,
        T::LootDrop => publish::<LootDrop>,
        T::LootPickupResponse => publish::<LootPickupResponse>,

        T::CombatAction => publish::<CombatAction>,
        T::ProjectileLaunch => publish::<ProjectileLaunch>,
        T::ProjectileHit => publish::<ProjectileHit>,
        T::DamageConfirmation => publish::<DamageConfirmation>,
        T::GrenadeSpawn => publish::<GrenadeSpawn>,
        T::GrenadeWarning => publish::<GrenadeWarning>,
        T::GrenadeExplosion => publish::<GrenadeExplosion>,
        T::GrenadeError => publish::<GrenadeError>,
        T::GrenadeCountUpdate => publish::<GrenadeCountUpdate>,

        T::WorldUpdate => publish::<WorldUpdate>,
        T::TerrainChange => publish::<TerrainChange>,
        T::LevelComplete => publish::<LevelComplete>,
        T::PlayerReposition => publish::<PlayerReposition>,
        T::SkillAllocationResponse => publish::<SkillAllocationResponse>,

        T::Login
        | T::SessionValidation
        | T::RespawnRequest
        | T::InventoryRequest
        | T::ItemUseRequest
        | T::ItemSellRequest
        | T::ItemEquipRequest
        | T::ItemUnequipRequest
        | T::EquipmentRequest
        | T::LootPickupRequest
        | T::GrenadeThrow
        | T::LevelContinue
        | T::SkillAllocationRequest => return None,
    };
    Some(route)
}

fn publish<M: Message>(data: Value) -> Result<PendingAction<Dispatch>> {
    let payload: M = decode_payload(M::TYPE.as_str(), data)?;
    Ok(Box::new(move |ctx: &mut Dispatch| ctx.bus.publish(&payload).map(drop)))
}

fn confirm_connection(data: Value) -> Result<PendingAction<Dispatch>> {
    let msg: ConnectionConfirmed = decode_payload(MessageType::ConnectionConfirmed.as_str(), data)?;
    Ok(Box::new(move |ctx: &mut Dispatch| {
        let published = ctx.bus.publish(&msg).map(drop);
        let handshake = ctx
            .session
            .on_connection_confirmed(&msg, &ctx.outbound, &mut ctx.bus);
        published.and(handshake)
    }))
}

fn login_response(data: Value) -> Result<PendingAction<Dispatch>> {
    let msg: LoginResponse = decode_payload(MessageType::LoginResponse.as_str(), data)?;
    Ok(Box::new(move |ctx: &mut Dispatch| {
        let published = ctx.bus.publish(&msg).map(drop);
        let handshake = ctx.session.on_login_response(&msg, &mut ctx.bus);
        published.and(handshake)
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::event::AuthEvent;
    use crate::heartbeat::ReconnectPolicy;
    use crate::outbound::tests::open_outbound;
    use crate::scheduler::Scheduler;
    use crate::session::AuthState;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    fn dispatch_ctx() -> (Dispatch, tokio::sync::mpsc::UnboundedReceiver<crate::outbound::OutboundFrame>) {
        let (outbound, frames) = open_outbound();
        let liveness = Liveness::new(Duration::from_secs(5), ReconnectPolicy::Disabled, Duration::from_secs(1));
        (Dispatch::new(outbound, liveness), frames)
    }

    #[test]
    fn every_server_tag_has_a_route() {
        let router = Router::new();
        for kind in [
            MessageType::ConnectionConfirmed,
            MessageType::LoginResponse,
            MessageType::ChatMessage,
            MessageType::WorldUpdate,
            MessageType::LootPickupResponse,
            MessageType::GrenadeCountUpdate,
        ] {
            assert!(router.routes(kind), "{kind} should be routed");
        }
        assert!(!router.routes(MessageType::Login));
        assert!(!router.routes(MessageType::ItemSellRequest));
    }

    #[test]
    fn chat_is_published_once_after_drain() {
        let router = Router::new();
        let scheduler = Scheduler::new();
        let (mut ctx, _frames) = dispatch_ctx();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        ctx.bus.subscribe(move |chat: &ChatMessage| {
            sink.borrow_mut().push(chat.sender_id.clone());
            Ok(())
        });

        let frame = r#"{"Type":"ChatMessage","Data":{"SenderId":"p1","SenderName":"Alice","Message":"hi"}}"#;
        assert!(router.dispatch(frame, &scheduler.handle()));
        assert!(seen.borrow().is_empty());

        scheduler.drain(&mut ctx);
        assert_eq!(*seen.borrow(), vec!["p1".to_owned()]);
    }

    #[test]
    fn arrival_order_is_preserved() {
        let router = Router::new();
        let scheduler = Scheduler::new();
        let (mut ctx, _frames) = dispatch_ctx();
        let order = Rc::new(RefCell::new(Vec::new()));

        let log = Rc::clone(&order);
        ctx.bus.subscribe(move |_: &EnemyDamage| {
            log.borrow_mut().push("damage");
            Ok(())
        });
        let log = Rc::clone(&order);
        ctx.bus.subscribe(move |_: &EnemyDeath| {
            log.borrow_mut().push("death");
            Ok(())
        });

        let handle = scheduler.handle();
        router.dispatch(r#"{"Type":"EnemyDamage","Data":{"EnemyId":"e1","Damage":30}}"#, &handle);
        router.dispatch(r#"{"Type":"EnemyDeath","Data":{"EnemyId":"e1"}}"#, &handle);
        scheduler.drain(&mut ctx);

        assert_eq!(*order.borrow(), vec!["damage", "death"]);
    }

    #[test]
    fn bad_frames_enqueue_nothing() {
        let router = Router::new();
        let scheduler: Scheduler<Dispatch> = Scheduler::new();
        let handle = scheduler.handle();

        assert!(!router.dispatch("not json", &handle));
        assert!(!router.dispatch(r#"{"Type":"Teleport","Data":{}}"#, &handle));
        assert!(!router.dispatch(r#"{"Type":"Login","Data":{"Username":"a","Password":"b"}}"#, &handle));
        assert!(!router.dispatch(r#"{"Type":"EnemyDeath","Data":{"ExperienceReward":5}}"#, &handle));
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn decode_errors_are_classified() {
        let router = Router::new();
        assert!(matches!(
            router.decode(r#"{"Type":"Teleport","Data":{}}"#),
            Err(GameLinkError::UnknownMessageType(tag)) if tag == "Teleport"
        ));
        assert!(matches!(
            router.decode(r#"{"Type":"EnemyDeath","Data":{}}"#),
            Err(GameLinkError::PayloadDecode { tag, .. }) if tag == "EnemyDeath"
        ));
        assert!(matches!(router.decode("[1,2]"), Err(GameLinkError::MalformedEnvelope(_))));
    }

    #[test]
    fn connection_confirmed_drives_the_handshake() {
        let router = Router::new();
        let scheduler = Scheduler::new();
        let (mut ctx, mut frames) = dispatch_ctx();
        let prompts = Rc::new(RefCell::new(0));
        let counter = Rc::clone(&prompts);
        ctx.bus.subscribe(move |event: &AuthEvent| {
            if *event == AuthEvent::LoginRequired {
                *counter.borrow_mut() += 1;
            }
            Ok(())
        });
        ctx.session.begin_connect();

        router.dispatch(
            r#"{"Type":"ConnectionConfirmed","Data":{"ConnectionId":"c-7"}}"#,
            &scheduler.handle(),
        );
        scheduler.drain(&mut ctx);

        assert_eq!(ctx.session.state(), AuthState::AwaitingCredentials);
        assert_eq!(ctx.session.connection_id(), Some("c-7"));
        assert_eq!(*prompts.borrow(), 1);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn login_response_completes_the_handshake() {
        let router = Router::new();
        let scheduler = Scheduler::new();
        let (mut ctx, mut frames) = dispatch_ctx();
        ctx.session.set_cached_token(Some("tok".into()));
        ctx.session.begin_connect();

        let handle = scheduler.handle();
        router.dispatch(r#"{"Type":"ConnectionConfirmed","Data":{"ConnectionId":"c-1"}}"#, &handle);
        scheduler.drain(&mut ctx);
        assert_eq!(frames.try_recv().unwrap().message_type, MessageType::SessionValidation);

        router.dispatch(
            r#"{"Type":"LoginResponse","Data":{"Success":true,"PlayerId":"p1","SessionToken":"tok2"}}"#,
            &handle,
        );
        scheduler.drain(&mut ctx);

        let session = ctx.session.session().unwrap();
        assert_eq!(session.player_id, "p1");
        assert_eq!(session.session_token.as_deref(), Some("tok2"));
    }

    #[test]
    fn lifecycle_events_drive_liveness() {
        let (mut ctx, _frames) = dispatch_ctx();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        ctx.bus.subscribe(move |e: &ConnectionEvent| {
            sink.borrow_mut().push(e.clone());
            Ok(())
        });

        let epoch = ctx.begin_attempt();
        ctx.on_connected(epoch, "ws://server".into()).unwrap();
        assert!(ctx.liveness.heartbeat.is_running());

        ctx.on_disconnected(epoch, Some("bye".into())).unwrap();
        assert!(!ctx.liveness.heartbeat.is_running());
        assert_eq!(ctx.session.state(), AuthState::Anonymous);
        assert_eq!(
            *events.borrow(),
            vec![
                ConnectionEvent::Connected {
                    url: "ws://server".into()
                },
                ConnectionEvent::Disconnected {
                    reason: Some("bye".into())
                },
            ]
        );
    }

    #[test]
    fn superseded_attempt_only_publishes() {
        let (outbound, _frames) = open_outbound();
        let liveness = Liveness::new(
            Duration::from_secs(5),
            ReconnectPolicy::Bounded { max_attempts: 3 },
            Duration::from_secs(1),
        );
        let mut ctx = Dispatch::new(outbound, liveness);
        let disconnects = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&disconnects);
        ctx.bus.subscribe(move |e: &ConnectionEvent| {
            if matches!(e, ConnectionEvent::Disconnected { .. }) {
                *sink.borrow_mut() += 1;
            }
            Ok(())
        });

        let first = ctx.begin_attempt();
        ctx.on_connected(first, "ws://server".into()).unwrap();
        let second = ctx.begin_attempt();
        assert_eq!(ctx.session.state(), AuthState::Connecting);

        ctx.on_disconnected(first, None).unwrap();
        assert_eq!(*disconnects.borrow(), 1);
        assert_eq!(ctx.session.state(), AuthState::Connecting);
        assert!(!ctx.liveness.reconnect.is_pending());

        ctx.on_connected(second, "ws://server".into()).unwrap();
        assert!(ctx.liveness.heartbeat.is_running());

        ctx.on_disconnected(second, None).unwrap();
        assert_eq!(*disconnects.borrow(), 2);
        assert_eq!(ctx.session.state(), AuthState::Anonymous);
        assert!(!ctx.liveness.heartbeat.is_running());
        assert!(ctx.liveness.reconnect.is_pending());
    }
}
