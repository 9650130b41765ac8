//! Strategy: a grid real-time strategy game
//!
//! Each side starts with a base and two workers in opposite corners of a
//! 24x24 map. Workers gather resources passively, buildings produce units,
//! combat units follow the side's standing order toward a zone, and anyone
//! with an enemy in range attacks automatically.
//!
//! Tick order: economy, actions, movement, combat, mid control, production
//! cooldowns, terminal check.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::env::{legalize, Environment, Step, StepInfo};
use crate::error::{ConfigError, EnvError};
use crate::events::{Event, EventKind};
use crate::geometry::Cell;
use crate::types::{GameId, Outcome, PerSide, Scores, Side};

// ============================================================================
// UNITS AND ZONES
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Worker,
    Soldier,
    Ranged,
    Base,
    Barracks,
}

/// Static stats per unit kind
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UnitStats {
    pub hp: i32,
    pub attack: i32,
    pub range: i32,
    pub cost: u32,
    pub build_time: u32,
}

impl UnitKind {
    /// Kinds a building can train
    pub const TRAINABLE: [UnitKind; 3] = [UnitKind::Worker, UnitKind::Soldier, UnitKind::Ranged];

    pub fn stats(self) -> UnitStats {
        let (hp, attack, range, cost, build_time) = match self {
            UnitKind::Worker => (50, 5, 1, 50, 3),
            UnitKind::Soldier => (100, 15, 1, 100, 5),
            UnitKind::Ranged => (60, 20, 3, 150, 7),
            UnitKind::Base => (500, 0, 0, 0, 0),
            UnitKind::Barracks => (200, 0, 0, 200, 10),
        };
        UnitStats {
            hp,
            attack,
            range,
            cost,
            build_time,
        }
    }

    pub fn is_building(self) -> bool {
        matches!(self, UnitKind::Base | UnitKind::Barracks)
    }

    /// Combat units follow standing orders
    pub fn is_army(self) -> bool {
        matches!(self, UnitKind::Soldier | UnitKind::Ranged)
    }

    /// Building that trains this kind
    pub fn producer(self) -> Option<UnitKind> {
        match self {
            UnitKind::Worker => Some(UnitKind::Base),
            UnitKind::Soldier | UnitKind::Ranged => Some(UnitKind::Barracks),
            UnitKind::Base | UnitKind::Barracks => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UnitKind::Worker => "worker",
            UnitKind::Soldier => "soldier",
            UnitKind::Ranged => "ranged",
            UnitKind::Base => "base",
            UnitKind::Barracks => "barracks",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneId {
    BaseA,
    BaseB,
    Mid,
}

impl ZoneId {
    pub const ALL: [ZoneId; 3] = [ZoneId::BaseA, ZoneId::BaseB, ZoneId::Mid];

    pub fn as_str(self) -> &'static str {
        match self {
            ZoneId::BaseA => "base_a",
            ZoneId::BaseB => "base_b",
            ZoneId::Mid => "mid",
        }
    }

    /// Home zone of a side
    pub fn home(side: Side) -> ZoneId {
        match side {
            Side::Player1 => ZoneId::BaseA,
            Side::Player2 => ZoneId::BaseB,
        }
    }
}

/// Observable zone state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: ZoneId,
    pub min: Cell,
    pub max: Cell,
    pub controller: Option<Side>,
    /// Positive toward `player_1`, negative toward `player_2`
    pub control_points: i32,
}

impl Zone {
    pub fn contains(&self, cell: Cell) -> bool {
        (self.min.x..=self.max.x).contains(&cell.x) && (self.min.y..=self.max.y).contains(&cell.y)
    }

    pub fn center(&self) -> Cell {
        Cell::new((self.min.x + self.max.x) / 2, (self.min.y + self.max.y) / 2)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: u32,
    pub kind: UnitKind,
    pub owner: Side,
    pub pos: Cell,
    pub hp: i32,
    pub cooldown: u32,
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Upper bound on per-tick income settings
pub const MAX_INCOME: u32 = 10_000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub map_size: i32,
    pub max_ticks: u32,
    /// Live units plus buildings a side may own at once
    pub unit_cap: usize,
    pub starting_resources: u32,
    pub resource_per_worker: u32,
    pub mid_bonus: u32,
    pub vision_range: i32,
    /// Control points gained per tick by the side with more units in mid
    pub capture_rate: i32,
    pub capture_threshold: i32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            map_size: 24,
            max_ticks: 600,
            unit_cap: 30,
            starting_resources: 300,
            resource_per_worker: 2,
            mid_bonus: 5,
            vision_range: 5,
            capture_rate: 5,
            capture_threshold: 50,
        }
    }
}

impl StrategyConfig {
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_unit_cap(mut self, unit_cap: usize) -> Self {
        self.unit_cap = unit_cap;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size < 16 {
            return Err(ConfigError::invalid("map_size", "must be at least 16"));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::invalid("max_ticks", "must be at least 1"));
        }
        if self.unit_cap < 3 {
            return Err(ConfigError::invalid(
                "unit_cap",
                "must fit the starting base and two workers",
            ));
        }
        if self.resource_per_worker > MAX_INCOME || self.mid_bonus > MAX_INCOME {
            return Err(ConfigError::invalid(
                "resource_per_worker",
                format!("worker income and mid bonus must be at most {}", MAX_INCOME),
            ));
        }
        if self.capture_rate <= 0 || self.capture_threshold <= 0 {
            return Err(ConfigError::invalid(
                "capture_rate",
                "capture rate and threshold must be positive",
            ));
        }
        Ok(())
    }
}

// ============================================================================
// ACTIONS AND OBSERVATIONS
// ============================================================================

/// Macro-level command issued once per tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyAction {
    Noop,
    Train(UnitKind),
    BuildBarracks,
    /// Send the army to a zone. Persists until replaced.
    Attack(ZoneId),
    /// Hold the army inside a zone. Persists until replaced.
    Defend(ZoneId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    Attack,
    Defend,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandingOrder {
    pub kind: OrderKind,
    pub zone: ZoneId,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StrategyObservation {
    pub tick: u32,
    pub max_ticks: u32,
    pub side: Side,
    pub resources: u32,
    pub unit_cap: usize,
    /// Own units and buildings
    pub own_units: Vec<Unit>,
    /// Enemy units within vision of any own unit
    pub visible_enemies: Vec<Unit>,
    pub zones: Vec<Zone>,
    pub order: Option<StandingOrder>,
    pub valid_actions: Vec<StrategyAction>,
}

impl StrategyObservation {
    pub fn count(&self, kind: UnitKind) -> usize {
        self.own_units.iter().filter(|u| u.kind == kind).count()
    }
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Strategy environment
#[derive(Clone, Debug)]
pub struct StrategyEnv {
    config: StrategyConfig,
    rng: ChaCha8Rng,
    tick: u32,
    done: bool,
    outcome: Option<Outcome>,
    units: BTreeMap<u32, Unit>,
    next_id: u32,
    resources: PerSide<u32>,
    zones: [Zone; 3],
    orders: PerSide<Option<StandingOrder>>,
}

impl StrategyEnv {
    pub fn new(config: StrategyConfig) -> Self {
        let zones = build_zones(config.map_size);
        let mut env = Self {
            rng: ChaCha8Rng::seed_from_u64(0),
            tick: 0,
            done: false,
            outcome: None,
            units: BTreeMap::new(),
            next_id: 0,
            resources: PerSide::new(config.starting_resources, config.starting_resources),
            zones,
            orders: PerSide::default(),
            config,
        };
        env.spawn_start();
        env
    }

    pub fn config(&self) -> &StrategyConfig {
        &self.config
    }

    /// Living units and buildings owned by `side`
    pub fn unit_count(&self, side: Side) -> usize {
        self.units.values().filter(|u| u.owner == side).count()
    }

    pub fn resources(&self, side: Side) -> u32 {
        self.resources[side]
    }

    pub fn zone(&self, id: ZoneId) -> &Zone {
        &self.zones[zone_index(id)]
    }

    fn spawn_start(&mut self) {
        let far = self.config.map_size - 3;
        self.spawn(UnitKind::Base, Side::Player1, Cell::new(2, 2));
        self.spawn(UnitKind::Worker, Side::Player1, Cell::new(3, 2));
        self.spawn(UnitKind::Worker, Side::Player1, Cell::new(2, 3));
        self.spawn(UnitKind::Base, Side::Player2, Cell::new(far, far));
        self.spawn(UnitKind::Worker, Side::Player2, Cell::new(far - 1, far));
        self.spawn(UnitKind::Worker, Side::Player2, Cell::new(far, far - 1));
    }

    fn spawn(&mut self, kind: UnitKind, owner: Side, pos: Cell) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        self.units.insert(
            id,
            Unit {
                id,
                kind,
                owner,
                pos,
                hp: kind.stats().hp,
                cooldown: 0,
            },
        );
        id
    }

    fn under_cap(&self, side: Side) -> bool {
        self.unit_count(side) < self.config.unit_cap
    }

    fn ready_producer(&self, side: Side, kind: UnitKind) -> Option<u32> {
        let producer = kind.producer()?;
        self.units
            .values()
            .find(|u| u.owner == side && u.kind == producer && u.cooldown == 0)
            .map(|u| u.id)
    }

    fn first_worker(&self, side: Side) -> Option<u32> {
        self.units
            .values()
            .find(|u| u.owner == side && u.kind == UnitKind::Worker)
            .map(|u| u.id)
    }

    fn can_train(&self, side: Side, kind: UnitKind) -> bool {
        self.under_cap(side)
            && self.resources[side] >= kind.stats().cost
            && self.ready_producer(side, kind).is_some()
    }

    fn can_build(&self, side: Side) -> bool {
        self.under_cap(side)
            && self.resources[side] >= UnitKind::Barracks.stats().cost
            && self.first_worker(side).is_some()
    }

    fn run_economy(&mut self) {
        let mid = self.zone(ZoneId::Mid).controller;
        for side in Side::BOTH {
            let workers = self
                .units
                .values()
                .filter(|u| u.owner == side && u.kind == UnitKind::Worker)
                .count() as u32;
            let mut income = workers.saturating_mul(self.config.resource_per_worker);
            if mid == Some(side) {
                income = income.saturating_add(self.config.mid_bonus);
            }
            self.resources[side] = self.resources[side].saturating_add(income);
        }
    }

    fn apply_action(&mut self, side: Side, action: StrategyAction) {
        match action {
            StrategyAction::Noop => {}
            StrategyAction::Train(kind) => {
                let Some(producer_id) = self.ready_producer(side, kind) else {
                    return;
                };
                let stats = kind.stats();
                self.resources[side] -= stats.cost;
                let origin = match self.units.get_mut(&producer_id) {
                    Some(producer) => {
                        producer.cooldown = stats.build_time;
                        producer.pos
                    }
                    None => return,
                };
                let dx = self.rng.gen_range(-1..=1);
                let dy = self.rng.gen_range(-1..=1);
                let pos = origin.offset(dx, dy).clamped(self.config.map_size);
                self.spawn(kind, side, pos);
            }
            StrategyAction::BuildBarracks => {
                let Some(worker_id) = self.first_worker(side) else {
                    return;
                };
                let Some(worker) = self.units.remove(&worker_id) else {
                    return;
                };
                let stats = UnitKind::Barracks.stats();
                self.resources[side] -= stats.cost;
                let id = self.spawn(UnitKind::Barracks, side, worker.pos);
                if let Some(barracks) = self.units.get_mut(&id) {
                    barracks.cooldown = stats.build_time;
                }
            }
            StrategyAction::Attack(zone) => {
                self.orders[side] = Some(StandingOrder {
                    kind: OrderKind::Attack,
                    zone,
                });
            }
            StrategyAction::Defend(zone) => {
                self.orders[side] = Some(StandingOrder {
                    kind: OrderKind::Defend,
                    zone,
                });
            }
        }
    }

    fn move_armies(&mut self) {
        let size = self.config.map_size;
        for side in Side::BOTH {
            let Some(order) = self.orders[side] else {
                continue;
            };
            let zone = self.zones[zone_index(order.zone)];
            let target = zone.center();
            for unit in self.units.values_mut() {
                if unit.owner != side || !unit.kind.is_army() {
                    continue;
                }
                let holding = order.kind == OrderKind::Defend && zone.contains(unit.pos);
                if !holding && unit.pos != target {
                    unit.pos = unit.pos.step_toward(target).clamped(size);
                }
            }
        }
    }

    /// Each armed unit strikes the first enemy in range, by ascending id.
    /// Units killed this phase still strike; corpses are removed at the end.
    fn run_combat(&mut self, events: &mut Vec<Event>) {
        let ids: Vec<u32> = self.units.keys().copied().collect();
        let mut dead: Vec<u32> = Vec::new();

        for attacker_id in &ids {
            let Some(attacker) = self.units.get(attacker_id) else {
                continue;
            };
            let stats = attacker.kind.stats();
            if stats.attack <= 0 {
                continue;
            }
            let (owner, pos) = (attacker.owner, attacker.pos);

            let target_id = ids.iter().copied().find(|id| {
                !dead.contains(id)
                    && self
                        .units
                        .get(id)
                        .map_or(false, |t| t.owner != owner && t.pos.manhattan(pos) <= stats.range)
            });
            let Some(target_id) = target_id else {
                continue;
            };
            if let Some(target) = self.units.get_mut(&target_id) {
                target.hp -= stats.attack;
                if target.hp <= 0 {
                    dead.push(target_id);
                    let kind = if target.kind.is_building() {
                        EventKind::BuildingDestroyed {
                            killer: owner,
                            victim_type: target.kind,
                        }
                    } else {
                        EventKind::UnitKilled {
                            killer: owner,
                            victim_type: target.kind,
                        }
                    };
                    events.push(Event::new(self.tick, kind));
                }
            }
        }

        for id in dead {
            self.units.remove(&id);
        }
    }

    fn update_mid_control(&mut self, events: &mut Vec<Event>) {
        let idx = zone_index(ZoneId::Mid);
        let zone = self.zones[idx];
        let present = PerSide::from_fn(|side| {
            self.units
                .values()
                .filter(|u| u.owner == side && zone.contains(u.pos))
                .count()
        });

        let rate = self.config.capture_rate;
        let threshold = self.config.capture_threshold;
        let cap = threshold * 2;
        let previous = zone.controller;
        let mid = &mut self.zones[idx];

        if present.player_1 > present.player_2 {
            mid.control_points = (mid.control_points + rate).min(cap);
            if mid.control_points >= threshold {
                mid.controller = Some(Side::Player1);
            }
        } else if present.player_2 > present.player_1 {
            mid.control_points = (mid.control_points - rate).max(-cap);
            if mid.control_points <= -threshold {
                mid.controller = Some(Side::Player2);
            }
        } else {
            mid.control_points -= mid.control_points.signum();
            if mid.control_points.abs() < threshold {
                mid.controller = None;
            }
        }

        if mid.controller != previous {
            if let Some(by) = mid.controller {
                events.push(Event::new(
                    self.tick,
                    EventKind::ZoneCaptured {
                        zone: ZoneId::Mid.as_str().to_string(),
                        by,
                    },
                ));
            }
        }
    }

    fn check_terminal(&mut self) {
        let alive = PerSide::from_fn(|side| self.unit_count(side) > 0);
        let outcome = match (alive.player_1, alive.player_2) {
            (true, true) if self.tick >= self.config.max_ticks => Some(self.scores().outcome()),
            (true, true) => None,
            (true, false) => Some(Outcome::Win(Side::Player1)),
            (false, true) => Some(Outcome::Win(Side::Player2)),
            (false, false) => Some(Outcome::Draw),
        };
        if outcome.is_some() {
            self.done = true;
            self.outcome = outcome;
        }
    }
}

fn zone_index(id: ZoneId) -> usize {
    match id {
        ZoneId::BaseA => 0,
        ZoneId::BaseB => 1,
        ZoneId::Mid => 2,
    }
}

fn build_zones(size: i32) -> [Zone; 3] {
    let mid = size / 2;
    [
        Zone {
            id: ZoneId::BaseA,
            min: Cell::new(0, 0),
            max: Cell::new(6, 6),
            controller: Some(Side::Player1),
            control_points: 0,
        },
        Zone {
            id: ZoneId::BaseB,
            min: Cell::new(size - 7, size - 7),
            max: Cell::new(size - 1, size - 1),
            controller: Some(Side::Player2),
            control_points: 0,
        },
        Zone {
            id: ZoneId::Mid,
            min: Cell::new(mid - 3, mid - 3),
            max: Cell::new(mid + 3, mid + 3),
            controller: None,
            control_points: 0,
        },
    ]
}

impl Environment for StrategyEnv {
    type Action = StrategyAction;
    type Observation = StrategyObservation;

    fn game_id(&self) -> GameId {
        GameId::Strategy
    }

    fn reset(&mut self, seed: u64) -> PerSide<StrategyObservation> {
        *self = StrategyEnv::new(self.config.clone());
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        PerSide::from_fn(|side| self.observe(side))
    }

    fn step(
        &mut self,
        actions: &PerSide<StrategyAction>,
    ) -> Result<Step<StrategyObservation>, EnvError> {
        if self.done {
            return Err(EnvError::AlreadyDone { tick: self.tick });
        }
        let actions = legalize(self, actions);
        self.tick += 1;
        let mut events = Vec::new();

        self.run_economy();
        for side in Side::BOTH {
            // legality depends on the state after the other side's action
            if self.is_valid_action(side, &actions[side]) {
                self.apply_action(side, actions[side]);
            }
        }
        self.move_armies();
        self.run_combat(&mut events);
        self.update_mid_control(&mut events);
        for unit in self.units.values_mut() {
            unit.cooldown = unit.cooldown.saturating_sub(1);
        }
        self.check_terminal();

        Ok(Step {
            observations: PerSide::from_fn(|side| self.observe(side)),
            rewards: PerSide::new(0.0, 0.0),
            done: self.done,
            info: StepInfo {
                tick: self.tick,
                scores: self.scores(),
                events,
            },
        })
    }

    fn valid_actions(&self, side: Side) -> Vec<StrategyAction> {
        let mut actions = vec![StrategyAction::Noop];
        for kind in UnitKind::TRAINABLE {
            if self.can_train(side, kind) {
                actions.push(StrategyAction::Train(kind));
            }
        }
        if self.can_build(side) {
            actions.push(StrategyAction::BuildBarracks);
        }
        actions.extend(ZoneId::ALL.iter().map(|&z| StrategyAction::Attack(z)));
        actions.extend(ZoneId::ALL.iter().map(|&z| StrategyAction::Defend(z)));
        actions
    }

    fn noop(&self, _side: Side) -> StrategyAction {
        StrategyAction::Noop
    }

    fn observe(&self, side: Side) -> StrategyObservation {
        let own_units: Vec<Unit> = self
            .units
            .values()
            .filter(|u| u.owner == side)
            .cloned()
            .collect();
        let range = self.config.vision_range;
        let visible_enemies = self
            .units
            .values()
            .filter(|u| u.owner != side)
            .filter(|enemy| own_units.iter().any(|mine| mine.pos.manhattan(enemy.pos) <= range))
            .cloned()
            .collect();

        StrategyObservation {
            tick: self.tick,
            max_ticks: self.config.max_ticks,
            side,
            resources: self.resources[side],
            unit_cap: self.config.unit_cap,
            own_units,
            visible_enemies,
            zones: self.zones.to_vec(),
            order: self.orders[side],
            valid_actions: self.valid_actions(side),
        }
    }

    fn winner(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Total hit points owned plus 100 for holding mid
    fn scores(&self) -> Scores {
        let mid = self.zone(ZoneId::Mid).controller;
        PerSide::from_fn(|side| {
            let hp: i32 = self
                .units
                .values()
                .filter(|u| u.owner == side)
                .map(|u| u.hp.max(0))
                .sum();
            hp as u32 + if mid == Some(side) { 100 } else { 0 }
        })
    }

    fn tick(&self) -> u32 {
        self.tick
    }

    fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh(seed: u64) -> StrategyEnv {
        let mut env = StrategyEnv::new(StrategyConfig::default());
        env.reset(seed);
        env
    }

    fn both(action: StrategyAction) -> PerSide<StrategyAction> {
        PerSide::new(action, action)
    }

    #[test]
    fn test_starting_position() {
        let env = fresh(1);
        assert_eq!(env.unit_count(Side::Player1), 3);
        assert_eq!(env.unit_count(Side::Player2), 3);
        assert_eq!(env.resources(Side::Player1), 300);
        assert_eq!(env.scores(), Scores::new(600, 600));

        let obs = env.observe(Side::Player1);
        assert!(obs.visible_enemies.is_empty());
        assert!(obs.valid_actions.contains(&StrategyAction::Train(UnitKind::Worker)));
        assert!(!obs.valid_actions.contains(&StrategyAction::Train(UnitKind::Soldier)));
    }

    #[test]
    fn test_economy_income() {
        let mut env = fresh(1);
        env.step(&both(StrategyAction::Noop)).unwrap();
        assert_eq!(env.resources(Side::Player1), 304);
    }

    #[test]
    fn test_income_is_bounded_and_saturates() {
        let mut greedy = StrategyConfig::default();
        greedy.resource_per_worker = u32::MAX / 2;
        assert!(greedy.validate().is_err());

        let mut rich = StrategyConfig::default();
        rich.resource_per_worker = MAX_INCOME;
        rich.mid_bonus = MAX_INCOME;
        assert!(rich.validate().is_ok());

        let mut env = StrategyEnv::new(rich);
        env.reset(4);
        env.resources = PerSide::new(u32::MAX - 1, 0);
        env.step(&both(StrategyAction::Noop)).unwrap();
        assert_eq!(env.resources(Side::Player1), u32::MAX);
        assert_eq!(env.resources(Side::Player2), 300 + 2 * MAX_INCOME);
    }

    #[test]
    fn test_unit_cap_never_exceeded() {
        let mut env = StrategyEnv::new(StrategyConfig::default().with_unit_cap(5));
        env.reset(11);
        env.resources = PerSide::new(100_000, 100_000);
        let spam = both(StrategyAction::Train(UnitKind::Worker));
        for _ in 0..200 {
            env.step(&spam).unwrap();
            assert!(env.unit_count(Side::Player1) <= 5);
            assert!(env.unit_count(Side::Player2) <= 5);
        }
        assert_eq!(env.unit_count(Side::Player1), 5);
        assert!(!env.is_valid_action(Side::Player1, &StrategyAction::Train(UnitKind::Worker)));
        assert!(!env.is_valid_action(Side::Player1, &StrategyAction::BuildBarracks));
    }

    #[test]
    fn test_build_barracks_consumes_worker() {
        let mut env = fresh(2);
        env.step(&PerSide::new(StrategyAction::BuildBarracks, StrategyAction::Noop))
            .unwrap();
        let obs = env.observe(Side::Player1);
        assert_eq!(obs.count(UnitKind::Worker), 1);
        assert_eq!(obs.count(UnitKind::Barracks), 1);
        assert_eq!(env.resources(Side::Player1), 300 + 4 - 200);
    }

    #[test]
    fn test_unaffordable_train_is_ignored() {
        let mut env = fresh(3);
        env.resources = PerSide::new(0, 0);
        let before = env.unit_count(Side::Player1);
        env.step(&both(StrategyAction::Train(UnitKind::Worker))).unwrap();
        // income lands before actions but 4 is still short of 50
        assert_eq!(env.unit_count(Side::Player1), before);
    }

    #[test]
    fn test_attack_order_persists() {
        let mut env = fresh(4);
        let soldier = env.spawn(UnitKind::Soldier, Side::Player1, Cell::new(4, 4));
        env.step(&PerSide::new(StrategyAction::Attack(ZoneId::Mid), StrategyAction::Noop))
            .unwrap();
        assert_eq!(env.units[&soldier].pos, Cell::new(5, 5));
        env.step(&both(StrategyAction::Noop)).unwrap();
        assert_eq!(env.units[&soldier].pos, Cell::new(6, 6));
    }

    #[test]
    fn test_mid_capture_event() {
        let mut env = fresh(5);
        env.spawn(UnitKind::Soldier, Side::Player1, Cell::new(12, 12));
        let mut captured_at = None;
        for _ in 0..12 {
            let step = env.step(&both(StrategyAction::Noop)).unwrap();
            if let Some(e) = step.info.events.iter().find(|e| e.type_name() == "zone_captured") {
                captured_at = Some(e.tick);
            }
        }
        assert_eq!(captured_at, Some(10));
        assert_eq!(env.zone(ZoneId::Mid).controller, Some(Side::Player1));
    }

    #[test]
    fn test_combat_kills_and_logs() {
        let mut env = fresh(6);
        env.spawn(UnitKind::Ranged, Side::Player1, Cell::new(10, 10));
        let victim = env.spawn(UnitKind::Worker, Side::Player2, Cell::new(10, 12));
        let mut kills = 0;
        for _ in 0..3 {
            let step = env.step(&both(StrategyAction::Noop)).unwrap();
            kills += step
                .info
                .events
                .iter()
                .filter(|e| e.type_name() == "unit_killed")
                .count();
        }
        assert!(!env.units.contains_key(&victim));
        assert_eq!(kills, 1);
    }

    #[test]
    fn test_elimination_ends_match_early() {
        let mut env = fresh(7);
        for _ in 0..299 {
            env.step(&both(StrategyAction::Noop)).unwrap();
        }
        assert!(!env.is_done());
        env.units.retain(|_, u| u.owner != Side::Player2);

        let step = env.step(&both(StrategyAction::Noop)).unwrap();
        assert!(step.done);
        assert_eq!(step.info.tick, 300);
        assert_eq!(env.winner(), Some(Outcome::Win(Side::Player1)));
    }

    #[test]
    fn test_time_limit_uses_scores() {
        let mut env = StrategyEnv::new(StrategyConfig::default().with_max_ticks(5));
        env.reset(8);
        for _ in 0..5 {
            env.step(&both(StrategyAction::Noop)).unwrap();
        }
        assert_eq!(env.winner(), Some(Outcome::Draw));
    }

    #[test]
    fn test_action_json_shape() {
        let json = serde_json::to_string(&StrategyAction::Attack(ZoneId::BaseB)).unwrap();
        assert_eq!(json, r#"{"attack":"base_b"}"#);
        let json = serde_json::to_string(&StrategyAction::Noop).unwrap();
        assert_eq!(json, r#""noop""#);
    }
}
