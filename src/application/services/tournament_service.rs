//! Tournament service - the authoritative orchestrator for every room
//!
//! Owns the room registry and turns client intents and timer firings into
//! domain calls. Each room sits behind its own mutex, so two intents on the
//! same room never interleave while different rooms progress independently.
//! Handlers never touch sockets or spawn tasks: each batch of [`Effects`] is
//! handed to the [`EffectSink`] before the room is unlocked, and returned to
//! the caller as well.
//!
//! Every handler that changes a room ends its effects with a
//! `roomStateUpdate` snapshot taken after the change.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{Mutex, RwLock};

use crate::application::dto::{
    pairs_of, ClientId, Effects, PlayerView, RoomSnapshot, RoomSummary, ServerMessage, TimerKey,
};
use crate::application::ports::outbound::{ClockPort, EffectSink};
use crate::domain::aggregates::{
    GameStart, Resolution, Room, RoomPhase, RoundEnd, SpinOutcome, TurnEnd,
};
use crate::domain::entities::{Ability, CharacterKind};
use crate::domain::errors::GameError;
use crate::domain::value_objects::{PlayerId, ReconnectToken, RoomCode, StatKind};

type SharedRoom = Arc<Mutex<Room>>;

/// Timing and capacity knobs for every room
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    /// `None` means rooms never fill up
    pub max_players: Option<usize>,
    pub break_duration: Duration,
    pub pre_battle_delay: Duration,
    pub reconnect_grace: Duration,
    pub bot_tick: Duration,
    /// Fixed seed for reproducible room codes and spins
    pub rng_seed: Option<u64>,
}

impl Default for TournamentConfig {
    fn default() -> Self {
        Self {
            max_players: Some(8),
            break_duration: Duration::from_secs(20),
            pre_battle_delay: Duration::from_millis(10_000),
            reconnect_grace: Duration::from_secs(10),
            bot_tick: Duration::from_millis(1_500),
            rng_seed: None,
        }
    }
}

impl TournamentConfig {
    fn pre_battle_window(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.pre_battle_delay.as_millis() as i64)
    }
}

pub struct TournamentService {
    rooms: RwLock<HashMap<RoomCode, SharedRoom>>,
    /// Hands out room codes and per-room RNG seeds
    seeds: Mutex<StdRng>,
    clock: Arc<dyn ClockPort>,
    sink: Arc<dyn EffectSink>,
    config: TournamentConfig,
}

impl TournamentService {
    pub fn new(
        config: TournamentConfig,
        clock: Arc<dyn ClockPort>,
        sink: Arc<dyn EffectSink>,
    ) -> Self {
        let seeds = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rooms: RwLock::new(HashMap::new()),
            seeds: Mutex::new(seeds),
            clock,
            sink,
            config,
        }
    }

    async fn room(&self, code: &RoomCode) -> Result<SharedRoom, GameError> {
        self.rooms
            .read()
            .await
            .get(code)
            .cloned()
            .ok_or_else(|| GameError::RoomNotFound(code.clone()))
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn snapshot(&self, code: &RoomCode) -> Result<RoomSnapshot, GameError> {
        let shared = self.room(code).await?;
        let room = shared.lock().await;
        Ok(RoomSnapshot::of(&room))
    }

    /// Open rooms, oldest first
    pub async fn list_rooms(&self) -> Vec<RoomSummary> {
        // Clone the handles so the registry lock is released before any room lock
        let rooms: Vec<SharedRoom> = self.rooms.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(rooms.len());
        for shared in rooms {
            let room = shared.lock().await;
            summaries.push(RoomSummary::of(&room));
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    // ========================================================================
    // Membership intents
    // ========================================================================

    pub async fn create_room(
        &self,
        client: ClientId,
        nickname: &str,
        no_bots: bool,
    ) -> (RoomCode, PlayerId, Effects) {
        let now = self.clock.now();
        let mut rooms = self.rooms.write().await;
        let (code, rng) = {
            let mut seeds = self.seeds.lock().await;
            let code = loop {
                let candidate = RoomCode::generate(&mut *seeds);
                if !rooms.contains_key(&candidate) {
                    break candidate;
                }
            };
            let rng = StdRng::seed_from_u64(seeds.gen());
            (code, rng)
        };

        let (room, host) = Room::new(
            code.clone(),
            nickname,
            no_bots,
            self.config.max_players,
            rng,
            now,
        );
        let reconnect_token = room
            .player(host)
            .map(|p| p.reconnect_token)
            .unwrap_or_default();
        let mut effects = Effects::new();
        effects.attach(client, code.clone(), host);
        effects.send_to(
            host,
            ServerMessage::RoomCreated {
                room_id: code.clone(),
                player_id: host,
                reconnect_token,
                room: RoomSnapshot::of(&room),
            },
        );
        rooms.insert(code.clone(), Arc::new(Mutex::new(room)));
        self.sink.apply(&effects);

        tracing::info!("Created room {} (host {}, bots enabled: {})", code, host, !no_bots);
        (code, host, effects)
    }

    pub async fn join_room(
        &self,
        client: ClientId,
        code: &RoomCode,
        nickname: &str,
    ) -> Result<(PlayerId, Effects), GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let player_id = room.add_player(nickname, self.clock.now())?;
        let reconnect_token = room
            .player(player_id)
            .map(|p| p.reconnect_token)
            .unwrap_or_default();

        let mut effects = Effects::new();
        effects.attach(client, code.clone(), player_id);
        effects.send_to(
            player_id,
            ServerMessage::RoomJoined {
                room_id: code.clone(),
                player_id,
                reconnect_token,
                room: RoomSnapshot::of(&room),
            },
        );
        if let Some(player) = room.player(player_id) {
            let view = PlayerView::from_player(player, room.host());
            effects.broadcast_except(&room, player_id, ServerMessage::PlayerJoined { player: view });
        }
        Self::push_state(&room, &mut effects);

        tracing::info!("Player {} joined room {} (round {})", player_id, code, room.round());
        Ok((player_id, self.publish(effects)))
    }

    /// Reclaim a retained seat after a dropped connection. Only the holder of
    /// the seat's reconnect token may take it, and only while it is unattended.
    pub async fn rejoin_room(
        &self,
        client: ClientId,
        code: &RoomCode,
        player_id: PlayerId,
        reconnect_token: ReconnectToken,
    ) -> Result<Effects, GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let new_host = room.mark_reconnected(player_id, reconnect_token)?;

        let mut effects = Effects::new();
        effects.attach(client, code.clone(), player_id);
        effects.cancel(TimerKey::ReconnectGrace {
            room: code.clone(),
            player: player_id,
        });
        effects.send_to(
            player_id,
            ServerMessage::RoomJoined {
                room_id: code.clone(),
                player_id,
                reconnect_token,
                room: RoomSnapshot::of(&room),
            },
        );
        if let Some(host) = new_host {
            effects.send_to(host, ServerMessage::BecameHost { player_id: host });
        }
        Self::push_state(&room, &mut effects);

        tracing::info!("Player {} reconnected to room {}", player_id, code);
        Ok(self.publish(effects))
    }

    pub async fn leave_room(&self, code: &RoomCode, player_id: PlayerId) -> Result<Effects, GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        if room.player(player_id).is_none() {
            return Err(GameError::NotInRoom);
        }

        let mut effects = Effects::new();
        self.remove_member(&mut room, player_id, &mut effects);
        Self::push_state(&room, &mut effects);
        self.collect_if_deserted(&room, &mut effects).await;
        Ok(self.publish(effects))
    }

    /// Socket closed. Before the first round the seat is freed; afterwards it
    /// is held for the reconnect grace window.
    pub async fn disconnect(&self, code: &RoomCode, player_id: PlayerId) -> Effects {
        let mut effects = Effects::new();
        let Ok(shared) = self.room(code).await else {
            return effects;
        };
        let mut room = shared.lock().await;
        if room.player(player_id).is_none() {
            return effects;
        }

        if !room.tournament_started() || room.phase() == RoomPhase::Finished {
            self.remove_member(&mut room, player_id, &mut effects);
        } else {
            match room.mark_disconnected(player_id, self.clock.now()) {
                Ok(new_host) => {
                    if let Some(host) = new_host {
                        effects.send_to(host, ServerMessage::BecameHost { player_id: host });
                    }
                    effects.schedule(
                        TimerKey::ReconnectGrace {
                            room: code.clone(),
                            player: player_id,
                        },
                        self.config.reconnect_grace,
                    );
                    tracing::info!(
                        "Player {} disconnected from room {}, holding seat for {:?}",
                        player_id,
                        code,
                        self.config.reconnect_grace
                    );
                }
                Err(e) => {
                    tracing::warn!("Failed to mark {} disconnected: {}", player_id, e);
                    return effects;
                }
            }
        }

        Self::push_state(&room, &mut effects);
        self.collect_if_deserted(&room, &mut effects).await;
        self.publish(effects)
    }

    // ========================================================================
    // Setup intents
    // ========================================================================

    pub async fn select_character(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        character_id: &str,
    ) -> Result<Effects, GameError> {
        let character = CharacterKind::parse(character_id)
            .ok_or_else(|| GameError::InvalidCharacter(character_id.to_string()))?;
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let opened_break = room.select_character(player_id, character)?;

        let mut effects = Effects::new();
        if opened_break {
            self.open_break(&room, &mut effects);
        }
        Self::push_state(&room, &mut effects);

        tracing::debug!("Player {} picked {} in room {}", player_id, character.id(), code);
        Ok(self.publish(effects))
    }

    pub async fn start_game(&self, code: &RoomCode, player_id: PlayerId) -> Result<Effects, GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let start = room.start_game(player_id, self.clock.now())?;

        let mut effects = Effects::new();
        match start {
            GameStart::CharacterSelect { bots } => {
                Self::announce_joins(&room, &bots, &mut effects);
                tracing::info!("Room {} opened character select", code);
            }
            GameStart::RoundReady { bots } => {
                Self::announce_joins(&room, &bots, &mut effects);
                effects.cancel(TimerKey::BreakEnd {
                    room: code.clone(),
                    round: room.round(),
                });
                self.begin_round(&mut room, &mut effects)?;
            }
        }
        Self::push_state(&room, &mut effects);
        Ok(self.publish(effects))
    }

    pub async fn buy_upgrade(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        stat_id: &str,
    ) -> Result<Effects, GameError> {
        let stat = StatKind::parse(stat_id)
            .ok_or_else(|| GameError::InvalidUpgrade(stat_id.to_string()))?;
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        room.buy_upgrade(player_id, stat)?;

        let mut effects = Effects::new();
        Self::push_state(&room, &mut effects);
        Ok(self.publish(effects))
    }

    // ========================================================================
    // Duel intents
    // ========================================================================

    pub async fn spin(&self, code: &RoomCode, player_id: PlayerId) -> Result<Effects, GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let outcome = room.spin(player_id, self.clock.now(), self.config.pre_battle_window())?;

        let mut effects = Effects::new();
        self.announce_spin(&mut room, &outcome, &mut effects);
        Self::push_state(&room, &mut effects);
        Ok(self.publish(effects))
    }

    pub async fn end_turn(&self, code: &RoomCode, player_id: PlayerId) -> Result<Effects, GameError> {
        let shared = self.room(code).await?;
        let mut room = shared.lock().await;
        let turn = room.end_turn(player_id)?;

        let mut effects = Effects::new();
        self.announce_turn_end(&mut room, player_id, &turn, &mut effects);
        Self::push_state(&room, &mut effects);
        Ok(self.publish(effects))
    }

    // ========================================================================
    // Timers
    // ========================================================================

    /// A scheduled timer fired. Stale timers (wrong round, player already
    /// back) produce no effects.
    pub async fn on_timer(&self, key: TimerKey) -> Effects {
        let mut effects = Effects::new();
        let Ok(shared) = self.room(key.room()).await else {
            return effects;
        };
        let mut room = shared.lock().await;
        let now = self.clock.now();

        match key {
            TimerKey::BreakEnd { round, .. } => {
                if room.phase() != RoomPhase::Break || room.round() != round {
                    return effects;
                }
                if let Err(e) = self.begin_round(&mut room, &mut effects) {
                    tracing::warn!("Room {} could not start round {}: {}", room.code(), round + 1, e);
                    return effects;
                }
            }
            TimerKey::PreBattle { round, .. } => {
                if room.round() != round
                    || !room.activate_due_duels(now, self.config.pre_battle_window())
                {
                    return effects;
                }
            }
            TimerKey::ReconnectGrace { player, .. } => {
                let Some(forfeit) = room.abandon(player) else {
                    return effects;
                };
                tracing::info!("Player {} abandoned room {}", player, room.code());
                if let Some(resolution) = forfeit {
                    Self::log_resolution(&room, &resolution);
                    self.close_round_if_done(&mut room, &mut effects);
                }
            }
            TimerKey::BotTick { .. } => {
                if !self.run_bots(&mut room, &mut effects) {
                    return self.publish(effects);
                }
            }
        }

        Self::push_state(&room, &mut effects);
        self.collect_if_deserted(&room, &mut effects).await;
        self.publish(effects)
    }

    /// Let every bot that is able to act take one action. Reschedules itself
    /// while bots are still fighting. Returns true if any bot acted.
    fn run_bots(&self, room: &mut Room, effects: &mut Effects) -> bool {
        let now = self.clock.now();
        let window = self.config.pre_battle_window();
        let bots: Vec<PlayerId> = room
            .players()
            .iter()
            .filter(|p| p.is_bot && p.is_in_duel && !p.has_ended_turn)
            .map(|p| p.id)
            .collect();

        let mut acted = false;
        for bot in bots {
            let recharging = room
                .player(bot)
                .and_then(|p| p.recharge_until)
                .is_some_and(|until| until > now);
            let preparing = room
                .active_duel(bot)
                .map_or(true, |d| d.preparing_remaining(now, window).is_some());
            if recharging || preparing {
                continue;
            }

            match room.spin(bot, now, window) {
                Ok(outcome) => {
                    acted = true;
                    self.announce_spin(room, &outcome, effects);
                }
                Err(GameError::InsufficientGold { .. }) => {
                    if let Ok(turn) = room.end_turn(bot) {
                        acted = true;
                        self.announce_turn_end(room, bot, &turn, effects);
                    }
                }
                Err(e) => tracing::debug!("Bot {} skipped its tick: {}", bot, e),
            }
        }

        if room.phase() == RoomPhase::RoundActive
            && room.players().iter().any(|p| p.is_bot && p.is_in_duel)
        {
            effects.schedule(
                TimerKey::BotTick {
                    room: room.code().clone(),
                },
                self.config.bot_tick,
            );
        }
        acted
    }

    // ========================================================================
    // Round flow
    // ========================================================================

    fn begin_round(&self, room: &mut Room, effects: &mut Effects) -> Result<(), GameError> {
        let start = room.start_round(self.clock.now())?;
        let code = room.code().clone();
        tracing::info!(
            "Room {} started round {} with {} duels",
            code,
            start.round,
            room.bracket().len()
        );

        effects.broadcast(
            room,
            ServerMessage::RoundStarted {
                round: start.round,
                pairs: pairs_of(room),
            },
        );
        for fired in &start.abilities {
            if matches!(fired.ability, Ability::Heal(_)) && fired.amount > 0 {
                effects.broadcast(
                    room,
                    ServerMessage::Heal {
                        player_id: fired.player,
                        heal_amount: fired.amount,
                    },
                );
            }
        }
        effects.schedule(
            TimerKey::PreBattle {
                room: code.clone(),
                round: start.round,
            },
            self.config.pre_battle_delay,
        );
        if room.players().iter().any(|p| p.is_bot && p.is_in_duel) {
            effects.schedule(TimerKey::BotTick { room: code }, self.config.bot_tick);
        }

        for resolution in start.byes.iter().chain(&start.forfeits) {
            Self::log_resolution(room, resolution);
        }
        self.close_round_if_done(room, effects);
        Ok(())
    }

    /// Hand a batch to the sink. Callers still hold the room lock.
    fn publish(&self, effects: Effects) -> Effects {
        if !effects.is_empty() {
            self.sink.apply(&effects);
        }
        effects
    }

    fn open_break(&self, room: &Room, effects: &mut Effects) {
        effects.broadcast(
            room,
            ServerMessage::BreakStarted {
                duration: self.config.break_duration.as_secs(),
            },
        );
        effects.schedule(
            TimerKey::BreakEnd {
                room: room.code().clone(),
                round: room.round(),
            },
            self.config.break_duration,
        );
    }

    fn close_round_if_done(&self, room: &mut Room, effects: &mut Effects) {
        match room.complete_round_if_done() {
            Some(RoundEnd::Break) => {
                tracing::info!("Room {} finished round {}", room.code(), room.round());
                self.open_break(room, effects);
            }
            Some(RoundEnd::Finished { winner }) => {
                let winner = winner
                    .and_then(|id| room.player(id))
                    .map(|p| PlayerView::from_player(p, room.host()));
                tracing::info!(
                    "Room {} tournament finished, winner: {}",
                    room.code(),
                    winner.as_ref().map_or("none", |w| w.nickname.as_str())
                );
                effects.broadcast(room, ServerMessage::GameEnded { winner });
                effects.cancel_room(room.code().clone());
            }
            None => {}
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    fn remove_member(&self, room: &mut Room, player_id: PlayerId, effects: &mut Effects) {
        if let Some(resolution) = room.forfeit(player_id) {
            Self::log_resolution(room, &resolution);
        }
        let Some(removed) = room.remove_player(player_id) else {
            return;
        };
        tracing::info!("Player {} left room {}", player_id, room.code());

        effects.detach(player_id);
        effects.cancel(TimerKey::ReconnectGrace {
            room: room.code().clone(),
            player: player_id,
        });
        effects.broadcast(
            room,
            ServerMessage::PlayerLeft {
                player_id,
                nickname: removed.player.nickname,
            },
        );
        if let Some(host) = removed.new_host {
            effects.send_to(host, ServerMessage::BecameHost { player_id: host });
        }
        if room.advance_if_selection_complete() {
            self.open_break(room, effects);
        }
        self.close_round_if_done(room, effects);
    }

    /// Drop the room from the registry once no human can come back to it
    async fn collect_if_deserted(&self, room: &Room, effects: &mut Effects) {
        if !room.is_deserted() {
            return;
        }
        self.rooms.write().await.remove(room.code());
        effects.cancel_room(room.code().clone());
        tracing::info!("Removed deserted room {}", room.code());
    }

    fn announce_spin(&self, room: &mut Room, outcome: &SpinOutcome, effects: &mut Effects) {
        effects.send(
            vec![outcome.attacker, outcome.target],
            ServerMessage::Attack {
                from_player_id: outcome.attacker,
                target_player_id: outcome.target,
                damage: outcome.damage_taken,
                dodged: outcome.attack.dodged,
                crit: outcome.attack.crit,
                combo_info: outcome.attack.combo.clone(),
            },
        );
        if let Some(resolution) = &outcome.resolution {
            Self::log_resolution(room, resolution);
            self.close_round_if_done(room, effects);
        }
    }

    fn announce_turn_end(
        &self,
        room: &mut Room,
        player_id: PlayerId,
        turn: &TurnEnd,
        effects: &mut Effects,
    ) {
        if !turn.already_ended {
            let mut recipients = vec![player_id];
            if let Some(opponent) = room.player(player_id).and_then(|p| p.duel_opponent_id) {
                recipients.push(opponent);
            }
            effects.send(recipients, ServerMessage::TurnEnded { player_id });
        }
        if let Some(resolution) = &turn.resolution {
            Self::log_resolution(room, resolution);
            self.close_round_if_done(room, effects);
        }
    }

    fn announce_joins(room: &Room, joined: &[PlayerId], effects: &mut Effects) {
        for &id in joined {
            if let Some(player) = room.player(id) {
                let view = PlayerView::from_player(player, room.host());
                effects.broadcast_except(room, id, ServerMessage::PlayerJoined { player: view });
            }
        }
    }

    fn push_state(room: &Room, effects: &mut Effects) {
        if room.players().is_empty() {
            return;
        }
        effects.broadcast(
            room,
            ServerMessage::RoomStateUpdate {
                room: RoomSnapshot::of(room),
            },
        );
    }

    fn log_resolution(room: &Room, resolution: &Resolution) {
        if resolution.result.is_draw() {
            tracing::info!(
                "Room {} duel {} ended in a draw",
                room.code(),
                resolution.duel_id
            );
            return;
        }
        tracing::info!(
            "Room {} duel {} resolved ({:?}): winner {:?}, loser {:?}",
            room.code(),
            resolution.duel_id,
            resolution.result.reason,
            resolution.result.winner,
            resolution.result.loser
        );
        if let Some(eliminated) = resolution.eliminated {
            tracing::info!("Player {} eliminated from room {}", eliminated, room.code());
        }
    }
}
