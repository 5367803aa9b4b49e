//! Room Aggregate - The root aggregate for one tournament
//!
//! A Room owns every Player and Duel that belongs to it. All state changes go
//! through this aggregate so the bracket, the phase and the player records
//! never disagree.
//!
//! Phase transitions:
//! `Lobby -> CharacterSelect -> Break <-> RoundActive -> Finished`.
//! `Finished` is terminal.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::domain::entities::{
    Ability, CharacterKind, Duel, DuelResult, DuelStanding, Player, ResolutionReason, Trigger,
};
use crate::domain::errors::GameError;
use crate::domain::services::economy::{
    self, enforce_recharge, recharge_deadline, ROUND_END_GOLD, ROUND_TEMP_GOLD, SPIN_COST,
    UPGRADE_COST,
};
use crate::domain::services::{apply_ability, draw_grid, resolve_attack, resolve_effect, AttackOutcome};
use crate::domain::value_objects::{DuelId, PlayerId, ReconnectToken, RoomCode, StatKind};

const MAX_NICKNAME_CHARS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoomPhase {
    Lobby,
    CharacterSelect,
    Break,
    RoundActive,
    Finished,
}

impl RoomPhase {
    pub fn label(self) -> &'static str {
        match self {
            RoomPhase::Lobby => "lobby",
            RoomPhase::CharacterSelect => "character select",
            RoomPhase::Break => "break",
            RoomPhase::RoundActive => "an active round",
            RoomPhase::Finished => "finished",
        }
    }
}

/// An ability that fired and how much of it took hold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbilityFired {
    pub player: PlayerId,
    pub ability: Ability,
    pub amount: u32,
}

/// Everything that changed when a duel resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub duel_id: DuelId,
    pub result: DuelResult,
    /// Round-end gold credited to each combatant
    pub rewards: Vec<(PlayerId, u32)>,
    pub total_hp_lost: Option<(PlayerId, u32)>,
    pub eliminated: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundEnd {
    Break,
    Finished { winner: Option<PlayerId> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundStart {
    pub round: u32,
    pub abilities: Vec<AbilityFired>,
    pub byes: Vec<Resolution>,
    /// Duels lost on the spot by abandoned players
    pub forfeits: Vec<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    pub attacker: PlayerId,
    pub target: PlayerId,
    pub attack: AttackOutcome,
    /// Damage that got past the target's shield
    pub damage_taken: u32,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnEnd {
    pub already_ended: bool,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameStart {
    /// Waiting for players to pick characters
    CharacterSelect { bots: Vec<PlayerId> },
    /// The caller should start the next round now
    RoundReady { bots: Vec<PlayerId> },
}

#[derive(Debug, Clone)]
pub struct RemovedPlayer {
    pub player: Player,
    pub new_host: Option<PlayerId>,
}

/// The Room Aggregate Root
#[derive(Debug)]
pub struct Room {
    code: RoomCode,
    /// Join order; drives pairing and host failover
    players: Vec<Player>,
    round: u32,
    bracket: Vec<Duel>,
    phase: RoomPhase,
    host: Option<PlayerId>,
    no_bots: bool,
    max_players: Option<usize>,
    created_at: DateTime<Utc>,
    rng: StdRng,
}

impl Room {
    /// Create a room in `Lobby` with its creator as first player and host
    pub fn new(
        code: RoomCode,
        host_nickname: &str,
        no_bots: bool,
        max_players: Option<usize>,
        rng: StdRng,
        now: DateTime<Utc>,
    ) -> (Self, PlayerId) {
        let host = Player::new(clean_nickname(host_nickname, 1), false, now);
        let host_id = host.id;
        let room = Self {
            code,
            players: vec![host],
            round: 0,
            bracket: Vec::new(),
            phase: RoomPhase::Lobby,
            host: Some(host_id),
            no_bots,
            max_players,
            created_at: now,
            rng,
        };
        (room, host_id)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn bracket(&self) -> &[Duel] {
        &self.bracket
    }

    pub fn host(&self) -> Option<PlayerId> {
        self.host
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Once the first round starts, disconnected players are retained
    pub fn tournament_started(&self) -> bool {
        self.round > 0
    }

    /// No human is connected or still inside a reconnect grace window
    pub fn is_deserted(&self) -> bool {
        !self.players.iter().any(|p| !p.is_bot && !p.is_abandoned)
    }

    pub fn member_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    // ========================================================================
    // Finders
    // ========================================================================

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    fn require_player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.player_mut(id).ok_or(GameError::NotInRoom)
    }

    /// Index of the unresolved duel this player is fighting in
    fn active_duel_index(&self, id: PlayerId) -> Option<usize> {
        self.bracket
            .iter()
            .position(|d| !d.is_resolved() && !d.is_bye() && d.contains(id))
    }

    pub fn active_duel(&self, id: PlayerId) -> Option<&Duel> {
        self.active_duel_index(id).map(|i| &self.bracket[i])
    }

    fn survivors(&self) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|p| p.is_survivor())
            .map(|p| p.id)
            .collect()
    }

    // ========================================================================
    // Membership
    // ========================================================================

    pub fn add_player(&mut self, nickname: &str, now: DateTime<Utc>) -> Result<PlayerId, GameError> {
        self.push_player(nickname, false, now)
    }

    fn push_player(
        &mut self,
        nickname: &str,
        is_bot: bool,
        now: DateTime<Utc>,
    ) -> Result<PlayerId, GameError> {
        if self.phase == RoomPhase::Finished {
            return Err(GameError::TournamentFinished);
        }
        if let Some(max) = self.max_players {
            if self.players.len() >= max {
                return Err(GameError::RoomFull(max));
            }
        }
        let player = Player::new(clean_nickname(nickname, self.players.len() + 1), is_bot, now);
        let id = player.id;
        self.players.push(player);
        if self.host.is_none() && !is_bot {
            self.host = Some(id);
        }
        Ok(id)
    }

    /// Delete a player. Callers forfeit any unresolved duel first.
    pub fn remove_player(&mut self, id: PlayerId) -> Option<RemovedPlayer> {
        let index = self.players.iter().position(|p| p.id == id)?;
        let player = self.players.remove(index);
        let new_host = self.elect_host();
        Some(RemovedPlayer { player, new_host })
    }

    /// Re-elect the earliest-joined connected human as host.
    /// Returns the new host when it changed.
    pub fn elect_host(&mut self) -> Option<PlayerId> {
        let candidate = self
            .players
            .iter()
            .find(|p| p.is_connected && !p.is_bot)
            .map(|p| p.id);
        if candidate != self.host {
            self.host = candidate;
            candidate
        } else {
            None
        }
    }

    pub fn mark_disconnected(
        &mut self,
        id: PlayerId,
        now: DateTime<Utc>,
    ) -> Result<Option<PlayerId>, GameError> {
        let player = self.require_player_mut(id)?;
        player.is_connected = false;
        player.disconnected_at = Some(now);
        Ok(self.elect_host())
    }

    /// Hand a retained seat back to its owner. The token must match, and the
    /// seat must not be held by a live connection.
    pub fn mark_reconnected(
        &mut self,
        id: PlayerId,
        token: ReconnectToken,
    ) -> Result<Option<PlayerId>, GameError> {
        let player = self
            .player_mut(id)
            .filter(|p| !p.is_bot && p.reconnect_token == token)
            .ok_or(GameError::UnknownPlayer)?;
        if player.is_connected {
            return Err(GameError::SeatOccupied);
        }
        player.is_connected = true;
        player.disconnected_at = None;
        player.is_abandoned = false;
        Ok(self.elect_host())
    }

    /// Called when a disconnect grace window lapses. No-op if the player came
    /// back in time. Otherwise they forfeit any unresolved duel, and every
    /// later duel at round start, until they reconnect or run out of total HP.
    pub fn abandon(&mut self, id: PlayerId) -> Option<Option<Resolution>> {
        let player = self.player_mut(id)?;
        if player.is_connected {
            return None;
        }
        player.is_abandoned = true;
        Some(self.forfeit(id))
    }

    // ========================================================================
    // Lobby and character select
    // ========================================================================

    pub fn select_character(
        &mut self,
        id: PlayerId,
        character: CharacterKind,
    ) -> Result<bool, GameError> {
        if self.phase == RoomPhase::Finished {
            return Err(GameError::TournamentFinished);
        }
        let player = self.require_player_mut(id)?;
        if player.character.is_some() {
            return Err(GameError::AlreadySelected);
        }
        player.character = Some(character);
        Ok(self.advance_if_selection_complete())
    }

    /// `CharacterSelect -> Break` once every live player holds a character
    pub fn advance_if_selection_complete(&mut self) -> bool {
        if self.phase != RoomPhase::CharacterSelect {
            return false;
        }
        let live: Vec<&Player> = self
            .players
            .iter()
            .filter(|p| p.is_connected && !p.is_abandoned)
            .collect();
        if !live.is_empty() && live.iter().all(|p| p.character.is_some()) {
            self.phase = RoomPhase::Break;
            true
        } else {
            false
        }
    }

    /// Host intent to get the tournament moving.
    ///
    /// From `Lobby` this fills with a bot (unless disabled) and opens
    /// character select, or goes straight to a round when everyone already
    /// picked. From `CharacterSelect` or `Break` it cuts the wait short.
    pub fn start_game(&mut self, requester: PlayerId, now: DateTime<Utc>) -> Result<GameStart, GameError> {
        if self.player(requester).is_none() {
            return Err(GameError::NotInRoom);
        }
        if self.host != Some(requester) {
            return Err(GameError::NotHost);
        }
        match self.phase {
            RoomPhase::Lobby => {
                let bots = self.add_bots(now);
                let everyone_ready = self
                    .players
                    .iter()
                    .filter(|p| p.is_connected)
                    .all(|p| p.character.is_some());
                if everyone_ready {
                    Ok(GameStart::RoundReady { bots })
                } else {
                    self.phase = RoomPhase::CharacterSelect;
                    Ok(GameStart::CharacterSelect { bots })
                }
            }
            RoomPhase::CharacterSelect | RoomPhase::Break => {
                if self.survivors().is_empty() {
                    return Err(GameError::NoEligiblePlayers);
                }
                self.phase = RoomPhase::Break;
                Ok(GameStart::RoundReady { bots: Vec::new() })
            }
            RoomPhase::RoundActive => Err(GameError::RoundInProgress),
            RoomPhase::Finished => Err(GameError::TournamentFinished),
        }
    }

    /// Add one bot when the head count is odd, so nobody starts on a bye
    fn add_bots(&mut self, now: DateTime<Utc>) -> Vec<PlayerId> {
        if self.no_bots || self.players.len() % 2 == 0 {
            return Vec::new();
        }
        let name = format!("Bot {}", self.players.iter().filter(|p| p.is_bot).count() + 1);
        let character = CharacterKind::ROSTER.choose(&mut self.rng).copied();
        match self.push_player(&name, true, now) {
            Ok(id) => {
                if let Some(bot) = self.player_mut(id) {
                    bot.character = character;
                }
                vec![id]
            }
            Err(e) => {
                tracing::debug!("Room {} could not seat {}: {}", self.code, name, e);
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Rounds
    // ========================================================================

    /// Pair survivors in join order and open a new round. An odd survivor
    /// gets a bye, which is resolved as a win on the spot.
    pub fn start_round(&mut self, now: DateTime<Utc>) -> Result<RoundStart, GameError> {
        match self.phase {
            RoomPhase::Lobby | RoomPhase::Break => {}
            RoomPhase::Finished => return Err(GameError::TournamentFinished),
            other => return Err(GameError::InvalidPhase(other.label())),
        }
        let survivors = self.survivors();
        if survivors.is_empty() {
            return Err(GameError::NoEligiblePlayers);
        }

        self.round += 1;
        self.phase = RoomPhase::RoundActive;
        let round = self.round;
        self.bracket = survivors
            .chunks(2)
            .map(|pair| Duel::form(round, pair[0], pair.get(1).copied(), now))
            .collect();

        let mut abilities = Vec::new();
        for &id in &survivors {
            let opponent = self
                .bracket
                .iter()
                .find(|d| d.contains(id))
                .and_then(|d| d.opponent_of(id));
            let Some(player) = self.player_mut(id) else {
                continue;
            };
            player.temporary_gold = ROUND_TEMP_GOLD;
            player.enter_duel(opponent, now);

            let mut triggers = vec![Trigger::RoundStart];
            if opponent.is_some() {
                triggers.push(Trigger::DuelStart);
            }
            for trigger in triggers {
                if let Some(effect) = apply_ability(player, trigger) {
                    let amount = resolve_effect(player, effect);
                    abilities.push(AbilityFired {
                        player: id,
                        ability: effect,
                        amount,
                    });
                }
            }
        }

        let byes: Vec<(usize, PlayerId)> = self
            .bracket
            .iter()
            .enumerate()
            .filter(|(_, d)| d.is_bye())
            .map(|(i, d)| (i, d.first))
            .collect();
        let byes = byes
            .into_iter()
            .filter_map(|(i, id)| self.resolve_duel(i, DuelResult::bye(id)))
            .collect();

        // In join order, so a duel between two absentees goes to the later one
        let absent: Vec<PlayerId> = self
            .players
            .iter()
            .filter(|p| p.is_abandoned && p.is_in_duel)
            .map(|p| p.id)
            .collect();
        let forfeits = absent
            .into_iter()
            .filter_map(|id| self.forfeit(id))
            .collect();

        Ok(RoundStart {
            round,
            abilities,
            byes,
            forfeits,
        })
    }

    /// Move duels whose pre-battle delay elapsed into `Active`.
    /// Returns true if any duel changed.
    pub fn activate_due_duels(&mut self, now: DateTime<Utc>, delay: Duration) -> bool {
        self.bracket
            .iter_mut()
            .fold(false, |changed, duel| duel.activate_if_due(now, delay) || changed)
    }

    /// Close the round once every duel is resolved.
    pub fn complete_round_if_done(&mut self) -> Option<RoundEnd> {
        if self.phase != RoomPhase::RoundActive || self.bracket.iter().any(|d| !d.is_resolved()) {
            return None;
        }
        for player in &mut self.players {
            player.temporary_gold = 0;
            player.is_in_duel = false;
            player.duel_opponent_id = None;
        }
        self.bracket.clear();

        let survivors = self.survivors();
        if survivors.len() <= 1 {
            self.phase = RoomPhase::Finished;
            Some(RoundEnd::Finished {
                winner: survivors.first().copied(),
            })
        } else {
            self.phase = RoomPhase::Break;
            Some(RoundEnd::Break)
        }
    }

    // ========================================================================
    // Duel intents
    // ========================================================================

    pub fn spin(
        &mut self,
        id: PlayerId,
        now: DateTime<Utc>,
        pre_battle_delay: Duration,
    ) -> Result<SpinOutcome, GameError> {
        let attacker = self.player(id).ok_or(GameError::NotInRoom)?;
        if !attacker.is_in_duel {
            return Err(GameError::NoActiveDuel);
        }
        let index = self.active_duel_index(id).ok_or(GameError::NoActiveDuel)?;
        if attacker.has_ended_turn {
            return Err(GameError::TurnAlreadyEnded);
        }
        let target_id = self.bracket[index]
            .opponent_of(id)
            .ok_or(GameError::NoActiveDuel)?;
        let target = self.player(target_id).ok_or(GameError::OpponentDefeated)?;
        if target.round_hp == 0 || target.is_eliminated {
            return Err(GameError::OpponentDefeated);
        }
        let defender_stats = target.combat_stats();

        let duel = &mut self.bracket[index];
        duel.activate_if_due(now, pre_battle_delay);
        if let Some(remaining) = duel.preparing_remaining(now, pre_battle_delay) {
            let remaining_ms = remaining.num_milliseconds().max(0) as u64;
            return Err(GameError::BattleNotStarted {
                remaining_secs: remaining_ms.div_ceil(1000),
                remaining_ms,
            });
        }

        let attacker = self.require_player_mut(id)?;
        if attacker.total_gold() < SPIN_COST {
            return Err(GameError::InsufficientGold {
                needed: SPIN_COST,
                available: attacker.total_gold(),
            });
        }
        enforce_recharge(&mut attacker.recharge_until, now)?;
        attacker.spend(SPIN_COST)?;
        attacker.recharge_until = Some(recharge_deadline(now));
        let attacker_stats = attacker.combat_stats();
        let rage = attacker.rage;

        let grid = draw_grid(&mut self.rng);
        let attack = resolve_attack(&grid, &attacker_stats, rage, &defender_stats, &mut self.rng);

        let target = self.require_player_mut(target_id)?;
        let damage_taken = target.take_hit(attack.damage);
        let knocked_out = target.round_hp == 0;

        let resolution = if knocked_out {
            self.resolve_duel(
                index,
                DuelResult::decisive(id, target_id, ResolutionReason::Knockout),
            )
        } else {
            None
        };

        Ok(SpinOutcome {
            attacker: id,
            target: target_id,
            attack,
            damage_taken,
            resolution,
        })
    }

    pub fn end_turn(&mut self, id: PlayerId) -> Result<TurnEnd, GameError> {
        let player = self.player(id).ok_or(GameError::NotInRoom)?;
        if !player.is_in_duel {
            return Err(GameError::NotInDuel);
        }
        let index = self.active_duel_index(id).ok_or(GameError::NotInDuel)?;
        let already_ended = player.has_ended_turn;
        self.require_player_mut(id)?.has_ended_turn = true;

        let Some(opponent_id) = self.bracket[index].opponent_of(id) else {
            return Ok(TurnEnd {
                already_ended,
                resolution: None,
            });
        };
        let (Some(me), Some(opponent)) = (self.player(id), self.player(opponent_id)) else {
            return Ok(TurnEnd {
                already_ended,
                resolution: None,
            });
        };
        if !opponent.has_ended_turn {
            return Ok(TurnEnd {
                already_ended,
                resolution: None,
            });
        }

        let result = match me.round_hp.cmp(&opponent.round_hp) {
            std::cmp::Ordering::Greater => {
                DuelResult::decisive(id, opponent_id, ResolutionReason::TurnsEnded)
            }
            std::cmp::Ordering::Less => {
                DuelResult::decisive(opponent_id, id, ResolutionReason::TurnsEnded)
            }
            std::cmp::Ordering::Equal => DuelResult::draw(),
        };
        Ok(TurnEnd {
            already_ended,
            resolution: self.resolve_duel(index, result),
        })
    }

    /// Resolve this player's unresolved duel as a loss
    pub fn forfeit(&mut self, id: PlayerId) -> Option<Resolution> {
        let index = self.active_duel_index(id)?;
        let winner = self.bracket[index].opponent_of(id)?;
        self.resolve_duel(
            index,
            DuelResult::decisive(winner, id, ResolutionReason::Forfeit),
        )
    }

    /// Settle a duel: records, streaks, gold and total HP. Runs at most once
    /// per duel.
    fn resolve_duel(&mut self, index: usize, result: DuelResult) -> Option<Resolution> {
        let duel = self.bracket.get_mut(index)?;
        let result = duel.resolve(result)?;
        let duel_id = duel.id;
        let combatants: Vec<PlayerId> = duel.players().collect();

        let mut resolution = Resolution {
            duel_id,
            result,
            rewards: Vec::new(),
            total_hp_lost: None,
            eliminated: None,
        };

        match (result.winner, result.loser) {
            (Some(winner_id), loser_id) => {
                let winner_round_hp = self.player(winner_id).map(|p| p.round_hp).unwrap_or(0);
                if let Some(winner) = self.player_mut(winner_id) {
                    winner.record_win();
                    let gold = economy::round_end_gold(true, winner.win_streak, winner.lose_streak);
                    winner.permanent_gold += gold;
                    winner.leave_duel(Some(DuelStanding::Winner));
                    resolution.rewards.push((winner_id, gold));
                }
                let loser = match loser_id {
                    Some(id) => self.player_mut(id),
                    None => None,
                };
                if let Some(loser) = loser {
                    loser.record_loss();
                    let lost = economy::total_hp_loss(winner_round_hp).min(loser.total_hp);
                    loser.total_hp -= lost;
                    let gold = economy::round_end_gold(false, loser.win_streak, loser.lose_streak);
                    loser.permanent_gold += gold;
                    loser.leave_duel(Some(DuelStanding::Loser));
                    resolution.rewards.push((loser.id, gold));
                    resolution.total_hp_lost = Some((loser.id, lost));
                    if loser.total_hp == 0 {
                        loser.is_eliminated = true;
                        resolution.eliminated = Some(loser.id);
                    }
                }
            }
            (None, _) => {
                for id in combatants {
                    if let Some(player) = self.player_mut(id) {
                        player.permanent_gold += ROUND_END_GOLD;
                        player.leave_duel(None);
                        resolution.rewards.push((id, ROUND_END_GOLD));
                    }
                }
            }
        }

        Some(resolution)
    }

    // ========================================================================
    // Shop
    // ========================================================================

    pub fn buy_upgrade(&mut self, id: PlayerId, stat: StatKind) -> Result<(), GameError> {
        if self.phase != RoomPhase::Break {
            return Err(GameError::InvalidPhase(self.phase.label()));
        }
        let player = self.require_player_mut(id)?;
        player.spend(UPGRADE_COST)?;
        player.add_style_point(stat);
        Ok(())
    }
}

fn clean_nickname(raw: &str, seat: usize) -> String {
    let trimmed: String = raw.trim().chars().take(MAX_NICKNAME_CHARS).collect();
    if trimmed.is_empty() {
        format!("Player {}", seat)
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::entities::DuelStatus;
    use rand::SeedableRng;

    const DELAY_MS: i64 = 10_000;

    fn delay() -> Duration {
        Duration::milliseconds(DELAY_MS)
    }

    fn room(no_bots: bool) -> (Room, PlayerId, DateTime<Utc>) {
        let now = Utc::now();
        let (room, host) = Room::new(
            RoomCode::parse("ABCDEF"),
            "Host",
            no_bots,
            Some(8),
            StdRng::seed_from_u64(17),
            now,
        );
        (room, host, now)
    }

    /// Room with `n` humans who all picked characters, sitting in Break
    fn room_in_break(n: usize) -> (Room, Vec<PlayerId>, DateTime<Utc>) {
        let (mut room, host, now) = room(true);
        let mut ids = vec![host];
        for i in 1..n {
            ids.push(room.add_player(&format!("P{}", i), now).unwrap());
        }
        room.start_game(host, now).unwrap();
        for id in &ids {
            room.select_character(*id, CharacterKind::Merchant).unwrap();
        }
        assert_eq!(room.phase(), RoomPhase::Break);
        (room, ids, now)
    }

    #[test]
    fn test_new_room_has_host_in_lobby() {
        let (room, host, _) = room(false);
        assert_eq!(room.phase(), RoomPhase::Lobby);
        assert_eq!(room.host(), Some(host));
        assert_eq!(room.round(), 0);
        assert!(room.bracket().is_empty());
    }

    #[test]
    fn test_room_full() {
        let now = Utc::now();
        let (mut room, _) = Room::new(
            RoomCode::parse("FULL22"),
            "Host",
            true,
            Some(2),
            StdRng::seed_from_u64(1),
            now,
        );
        room.add_player("Second", now).unwrap();
        assert_eq!(room.add_player("Third", now), Err(GameError::RoomFull(2)));
    }

    #[test]
    fn test_blank_nickname_gets_seat_name() {
        let (mut room, _, now) = room(true);
        let id = room.add_player("   ", now).unwrap();
        assert_eq!(room.player(id).unwrap().nickname, "Player 2");
    }

    #[test]
    fn test_start_game_requires_host() {
        let (mut room, _, now) = room(true);
        let guest = room.add_player("Guest", now).unwrap();
        assert_eq!(room.start_game(guest, now), Err(GameError::NotHost));
    }

    #[test]
    fn test_start_game_adds_bot_for_odd_count() {
        let (mut room, host, now) = room(false);
        let start = room.start_game(host, now).unwrap();
        let GameStart::CharacterSelect { bots } = start else {
            panic!("expected character select");
        };
        assert_eq!(bots.len(), 1);
        let bot = room.player(bots[0]).unwrap();
        assert!(bot.is_bot);
        assert!(bot.character.is_some());
        assert_eq!(room.phase(), RoomPhase::CharacterSelect);
    }

    #[test]
    fn test_start_game_with_everyone_picked_skips_selection() {
        let (mut room, host, now) = room(true);
        let guest = room.add_player("Guest", now).unwrap();
        room.select_character(host, CharacterKind::Healer).unwrap();
        room.select_character(guest, CharacterKind::Guardian).unwrap();
        assert_eq!(room.phase(), RoomPhase::Lobby);

        assert_eq!(
            room.start_game(host, now),
            Ok(GameStart::RoundReady { bots: Vec::new() })
        );
        assert_eq!(room.phase(), RoomPhase::Lobby);

        let start = room.start_round(now).unwrap();
        assert_eq!(start.round, 1);
        assert_eq!(room.phase(), RoomPhase::RoundActive);
        assert!(room.active_duel(host).is_some_and(|d| d.contains(guest)));
    }

    #[test]
    fn test_no_bots_flag() {
        let (mut room, host, now) = room(true);
        room.start_game(host, now).unwrap();
        assert_eq!(room.players().len(), 1);
    }

    #[test]
    fn test_selection_moves_to_break_when_everyone_picked() {
        let (mut room, host, now) = room(true);
        let guest = room.add_player("Guest", now).unwrap();
        room.start_game(host, now).unwrap();

        assert!(!room.select_character(host, CharacterKind::Healer).unwrap());
        assert_eq!(room.phase(), RoomPhase::CharacterSelect);
        assert!(room.select_character(guest, CharacterKind::Guardian).unwrap());
        assert_eq!(room.phase(), RoomPhase::Break);
    }

    #[test]
    fn test_select_twice_is_rejected() {
        let (mut room, host, _) = room(true);
        room.select_character(host, CharacterKind::Healer).unwrap();
        assert_eq!(
            room.select_character(host, CharacterKind::Berserker),
            Err(GameError::AlreadySelected)
        );
        assert_eq!(room.player(host).unwrap().character, Some(CharacterKind::Healer));
    }

    #[test]
    fn test_bracket_covers_every_survivor_once() {
        for n in 1..=7 {
            let (mut room, ids, now) = room_in_break(n);
            room.start_round(now).unwrap();

            // byes resolve immediately; a lone player finishes the tournament
            if n == 1 {
                assert_eq!(room.phase(), RoomPhase::RoundActive);
                continue;
            }
            assert_eq!(room.bracket().len(), n.div_ceil(2));
            for id in &ids {
                let appearances = room.bracket().iter().filter(|d| d.contains(*id)).count();
                assert_eq!(appearances, 1, "player appears once with n={}", n);
            }
        }
    }

    #[test]
    fn test_pairs_follow_join_order() {
        let (mut room, ids, now) = room_in_break(5);
        room.start_round(now).unwrap();
        let bracket = room.bracket();
        assert_eq!((bracket[0].first, bracket[0].second), (ids[0], Some(ids[1])));
        assert_eq!((bracket[1].first, bracket[1].second), (ids[2], Some(ids[3])));
        assert_eq!((bracket[2].first, bracket[2].second), (ids[4], None));
    }

    #[test]
    fn test_bye_is_a_win_without_combat() {
        let (mut room, ids, now) = room_in_break(3);
        let start = room.start_round(now).unwrap();
        assert_eq!(start.byes.len(), 1);
        assert_eq!(start.byes[0].result.winner, Some(ids[2]));
        let lucky = room.player(ids[2]).unwrap();
        assert_eq!(lucky.wins, 1);
        assert_eq!(lucky.total_hp, 100);
        assert!(!lucky.is_in_duel);
    }

    #[test]
    fn test_round_start_grants_temporary_gold_and_abilities() {
        let (mut room, ids, now) = room_in_break(2);
        let start = room.start_round(now).unwrap();
        // Both merchants: 30 base temporary gold + 10 ability
        for id in &ids {
            assert_eq!(room.player(*id).unwrap().temporary_gold, 40);
        }
        assert_eq!(start.abilities.len(), 2);
        assert_eq!(start.round, 1);
    }

    #[test]
    fn test_spin_rejected_during_pre_battle_window() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        let before = room.player(ids[0]).unwrap().total_gold();

        let err = room
            .spin(ids[0], now + Duration::milliseconds(2_500), delay())
            .unwrap_err();

        assert_eq!(
            err,
            GameError::BattleNotStarted {
                remaining_secs: 8,
                remaining_ms: 7_500
            }
        );
        assert_eq!(room.player(ids[0]).unwrap().total_gold(), before);
    }

    #[test]
    fn test_spin_debits_cost_and_starts_recharge() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        let later = now + delay();
        let before = room.player(ids[0]).unwrap().total_gold();

        let outcome = room.spin(ids[0], later, delay()).unwrap();

        let attacker = room.player(ids[0]).unwrap();
        assert_eq!(attacker.total_gold(), before - SPIN_COST);
        assert_eq!(attacker.recharge_until, Some(recharge_deadline(later)));
        assert_eq!(outcome.target, ids[1]);
        assert_eq!(room.bracket()[0].status(), DuelStatus::Active);
    }

    #[test]
    fn test_spin_while_recharging_adds_penalty_and_keeps_gold() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        let t0 = now + delay();
        room.spin(ids[0], t0, delay()).unwrap();
        let gold = room.player(ids[0]).unwrap().total_gold();

        let t1 = t0 + Duration::milliseconds(1_000);
        let err = room.spin(ids[0], t1, delay()).unwrap_err();

        // 2000ms left + 2000ms penalty
        assert_eq!(err, GameError::Recharging { remaining_ms: 4_000 });
        assert_eq!(room.player(ids[0]).unwrap().total_gold(), gold);
    }

    #[test]
    fn test_spin_without_gold() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        {
            let p = room.player_mut(ids[0]).unwrap();
            p.temporary_gold = 0;
            p.permanent_gold = 4;
        }
        let err = room.spin(ids[0], now + delay(), delay()).unwrap_err();
        assert_eq!(
            err,
            GameError::InsufficientGold {
                needed: 5,
                available: 4
            }
        );
    }

    #[test]
    fn test_spin_outside_duel() {
        let (mut room, ids, now) = room_in_break(2);
        let gold = room.player(ids[0]).unwrap().total_gold();
        assert_eq!(room.spin(ids[0], now, delay()), Err(GameError::NoActiveDuel));
        assert_eq!(room.player(ids[0]).unwrap().total_gold(), gold);
    }

    #[test]
    fn test_spin_after_turn_ended() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.end_turn(ids[0]).unwrap();
        let gold = room.player(ids[0]).unwrap().total_gold();
        assert_eq!(
            room.spin(ids[0], now + delay(), delay()),
            Err(GameError::TurnAlreadyEnded)
        );
        let attacker = room.player(ids[0]).unwrap();
        assert_eq!(attacker.total_gold(), gold);
        assert_eq!(attacker.recharge_until, None);
    }

    #[test]
    fn test_spin_at_knocked_out_opponent() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.player_mut(ids[1]).unwrap().round_hp = 0;
        let gold = room.player(ids[0]).unwrap().total_gold();

        assert_eq!(
            room.spin(ids[0], now + delay(), delay()),
            Err(GameError::OpponentDefeated)
        );
        let attacker = room.player(ids[0]).unwrap();
        assert_eq!(attacker.total_gold(), gold);
        assert_eq!(attacker.recharge_until, None);
        assert!(!room.bracket()[0].is_resolved());
    }

    #[test]
    fn test_knockout_resolves_duel_and_round() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.player_mut(ids[1]).unwrap().round_hp = 1;
        room.player_mut(ids[0]).unwrap().permanent_gold = 1_000;

        // Keep spinning past the recharge until something lands
        let mut t = now + delay();
        let mut resolution = None;
        for _ in 0..200 {
            let outcome = room.spin(ids[0], t, delay()).unwrap();
            if outcome.resolution.is_some() {
                resolution = outcome.resolution;
                break;
            }
            t += Duration::milliseconds(3_000);
        }
        let resolution = resolution.expect("a hit within 200 spins");

        assert_eq!(resolution.result.winner, Some(ids[0]));
        assert_eq!(resolution.result.reason, ResolutionReason::Knockout);
        let winner = room.player(ids[0]).unwrap();
        let loser = room.player(ids[1]).unwrap();
        assert_eq!((winner.wins, winner.win_streak), (1, 1));
        assert_eq!((loser.losses, loser.lose_streak), (1, 1));
        assert_eq!(loser.duel_status, Some(DuelStanding::Loser));
        assert!(loser.total_hp < 100);

        assert_eq!(room.complete_round_if_done(), Some(RoundEnd::Break));
        assert_eq!(room.phase(), RoomPhase::Break);
        assert!(room.bracket().is_empty());
        assert_eq!(room.player(ids[0]).unwrap().temporary_gold, 0);
    }

    #[test]
    fn test_both_turns_ended_higher_hp_wins() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.player_mut(ids[0]).unwrap().round_hp = 40;

        let first = room.end_turn(ids[0]).unwrap();
        assert!(first.resolution.is_none());
        let second = room.end_turn(ids[1]).unwrap();
        let resolution = second.resolution.unwrap();

        assert_eq!(resolution.result.winner, Some(ids[1]));
        assert_eq!(resolution.result.reason, ResolutionReason::TurnsEnded);
    }

    #[test]
    fn test_both_turns_ended_equal_hp_is_draw() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();

        room.end_turn(ids[0]).unwrap();
        let resolution = room.end_turn(ids[1]).unwrap().resolution.unwrap();

        assert!(resolution.result.is_draw());
        for id in &ids {
            let p = room.player(*id).unwrap();
            assert_eq!((p.wins, p.losses, p.win_streak, p.lose_streak), (0, 0, 0, 0));
            assert_eq!(p.total_hp, 100);
        }
    }

    #[test]
    fn test_end_turn_is_idempotent() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        assert!(!room.end_turn(ids[0]).unwrap().already_ended);
        assert!(room.end_turn(ids[0]).unwrap().already_ended);
        assert!(!room.bracket()[0].is_resolved());
    }

    #[test]
    fn test_end_turn_outside_duel() {
        let (mut room, ids, _) = room_in_break(2);
        assert_eq!(room.end_turn(ids[0]), Err(GameError::NotInDuel));
    }

    #[test]
    fn test_duplicate_terminal_signals_credit_once() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();

        let first = room.forfeit(ids[1]);
        let second = room.forfeit(ids[1]);
        let third = room.forfeit(ids[0]);

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(third.is_none());
        let winner = room.player(ids[0]).unwrap();
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.permanent_gold, 15);
    }

    #[test]
    fn test_total_hp_zero_eliminates_and_finishes() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.player_mut(ids[1]).unwrap().total_hp = 10;

        let resolution = room.forfeit(ids[1]).unwrap();

        assert_eq!(resolution.eliminated, Some(ids[1]));
        assert!(room.player(ids[1]).unwrap().is_eliminated);
        assert_eq!(
            room.complete_round_if_done(),
            Some(RoundEnd::Finished {
                winner: Some(ids[0])
            })
        );
        assert_eq!(room.phase(), RoomPhase::Finished);
        assert_eq!(room.start_round(now), Err(GameError::TournamentFinished));
        assert_eq!(room.add_player("Late", now), Err(GameError::TournamentFinished));
    }

    #[test]
    fn test_eliminated_players_sit_out_next_round() {
        let (mut room, ids, now) = room_in_break(4);
        room.start_round(now).unwrap();
        room.player_mut(ids[1]).unwrap().total_hp = 1;
        room.forfeit(ids[1]);
        room.forfeit(ids[3]);
        assert_eq!(room.complete_round_if_done(), Some(RoundEnd::Break));

        room.start_round(now).unwrap();
        assert_eq!(room.round(), 2);
        assert!(room.bracket().iter().all(|d| !d.contains(ids[1])));
        assert_eq!(room.bracket().len(), 2);
    }

    #[test]
    fn test_late_joiner_waits_for_next_round() {
        let (mut room, _, now) = room_in_break(2);
        room.start_round(now).unwrap();
        let late = room.add_player("Late", now).unwrap();
        room.select_character(late, CharacterKind::Berserker).unwrap();

        assert!(room.bracket().iter().all(|d| !d.contains(late)));
        assert!(!room.player(late).unwrap().is_in_duel);
    }

    #[test]
    fn test_host_failover_on_disconnect() {
        let (mut room, ids, now) = room_in_break(3);
        let new_host = room.mark_disconnected(ids[0], now).unwrap();
        assert_eq!(new_host, Some(ids[1]));
        assert_eq!(room.host(), Some(ids[1]));

        // Original host back: earliest connected wins again
        let token = room.player(ids[0]).unwrap().reconnect_token;
        let restored = room.mark_reconnected(ids[0], token).unwrap();
        assert_eq!(restored, Some(ids[0]));
    }

    #[test]
    fn test_reconnect_needs_matching_token_and_empty_seat() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        let token = room.player(ids[0]).unwrap().reconnect_token;

        assert_eq!(room.mark_reconnected(ids[0], token), Err(GameError::SeatOccupied));
        assert_eq!(room.host(), Some(ids[0]));

        room.mark_disconnected(ids[0], now).unwrap();
        let wrong = room.player(ids[1]).unwrap().reconnect_token;
        assert_eq!(room.mark_reconnected(ids[0], wrong), Err(GameError::UnknownPlayer));
        assert_eq!(
            room.mark_reconnected(PlayerId::new(), token),
            Err(GameError::UnknownPlayer)
        );
        assert!(!room.player(ids[0]).unwrap().is_connected);
        assert_eq!(room.host(), Some(ids[1]));

        room.mark_reconnected(ids[0], token).unwrap();
        assert!(room.player(ids[0]).unwrap().is_connected);
    }

    #[test]
    fn test_bots_cannot_be_reclaimed() {
        let (mut room, host, now) = room(false);
        let GameStart::CharacterSelect { bots } = room.start_game(host, now).unwrap() else {
            panic!("expected character select");
        };
        let token = room.player(bots[0]).unwrap().reconnect_token;
        assert_eq!(room.mark_reconnected(bots[0], token), Err(GameError::UnknownPlayer));
    }

    #[test]
    fn test_abandon_skips_reconnected_player() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.mark_disconnected(ids[1], now).unwrap();
        let token = room.player(ids[1]).unwrap().reconnect_token;
        room.mark_reconnected(ids[1], token).unwrap();
        assert!(room.abandon(ids[1]).is_none());
        assert!(!room.bracket()[0].is_resolved());
    }

    #[test]
    fn test_abandon_forfeits_active_duel() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.mark_disconnected(ids[1], now).unwrap();

        let resolution = room.abandon(ids[1]).flatten().unwrap();

        assert_eq!(resolution.result.winner, Some(ids[0]));
        assert_eq!(resolution.result.reason, ResolutionReason::Forfeit);
        let gone = room.player(ids[1]).unwrap();
        assert!(gone.is_abandoned);
        assert!(!gone.is_eliminated);
    }

    #[test]
    fn test_abandonment_does_not_end_tournament() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.mark_disconnected(ids[1], now).unwrap();
        room.abandon(ids[1]);

        assert_eq!(room.complete_round_if_done(), Some(RoundEnd::Break));
        assert_eq!(room.phase(), RoomPhase::Break);
    }

    #[test]
    fn test_abandoned_player_forfeits_at_round_start() {
        let (mut room, ids, now) = room_in_break(4);
        room.start_round(now).unwrap();
        room.mark_disconnected(ids[3], now).unwrap();
        room.abandon(ids[3]);
        room.forfeit(ids[0]);
        assert_eq!(room.complete_round_if_done(), Some(RoundEnd::Break));
        let hp = room.player(ids[3]).unwrap().total_hp;

        // Still paired, settled before anyone can spin
        let start = room.start_round(now).unwrap();
        assert_eq!(room.bracket().len(), 2);
        assert_eq!(start.forfeits.len(), 1);
        let forfeit = &start.forfeits[0];
        assert_eq!(forfeit.result.loser, Some(ids[3]));
        assert_eq!(forfeit.result.reason, ResolutionReason::Forfeit);
        assert!(room.player(ids[3]).unwrap().total_hp < hp);
        assert_eq!(room.player(ids[3]).unwrap().losses, 2);
        assert_eq!(room.active_duel(ids[0]).map(|d| d.contains(ids[1])), Some(true));
    }

    #[test]
    fn test_two_absentees_settle_in_join_order() {
        let (mut room, ids, now) = room_in_break(2);
        for id in &ids {
            room.mark_disconnected(*id, now).unwrap();
            room.abandon(*id);
        }
        let start = room.start_round(now).unwrap();
        assert_eq!(start.forfeits.len(), 1);
        assert_eq!(start.forfeits[0].result.winner, Some(ids[1]));
        assert_eq!(room.complete_round_if_done(), Some(RoundEnd::Break));
    }

    #[test]
    fn test_abandoned_player_can_come_back() {
        let (mut room, ids, now) = room_in_break(2);
        room.start_round(now).unwrap();
        room.mark_disconnected(ids[1], now).unwrap();
        room.abandon(ids[1]);
        room.complete_round_if_done();

        let token = room.player(ids[1]).unwrap().reconnect_token;
        room.mark_reconnected(ids[1], token).unwrap();
        let start = room.start_round(now).unwrap();
        assert!(start.forfeits.is_empty());
        assert!(room.active_duel(ids[1]).is_some());
    }

    #[test]
    fn test_deserted_once_every_human_is_gone() {
        let (mut room, ids, now) = room_in_break(2);
        room.mark_disconnected(ids[0], now).unwrap();
        room.mark_disconnected(ids[1], now).unwrap();
        assert!(!room.is_deserted());

        room.abandon(ids[0]);
        room.abandon(ids[1]);
        assert!(room.is_deserted());
    }

    #[test]
    fn test_buy_upgrade_only_in_break() {
        let (mut room, ids, now) = room_in_break(2);
        room.player_mut(ids[0]).unwrap().permanent_gold = 25;
        room.buy_upgrade(ids[0], StatKind::Armor).unwrap();
        let p = room.player(ids[0]).unwrap();
        assert_eq!(p.style.armor, 1);
        assert_eq!(p.permanent_gold, 15);

        room.start_round(now).unwrap();
        assert_eq!(
            room.buy_upgrade(ids[0], StatKind::Armor),
            Err(GameError::InvalidPhase("an active round"))
        );
    }
}
