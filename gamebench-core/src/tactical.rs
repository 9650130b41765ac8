//! Tactical: a round-based team shooter on a small grid
//!
//! Two teams (`T` on `player_1`, `CT` on `player_2`) fight over a single
//! bomb site. One agent commands a whole team, issuing one [`MemberOrder`]
//! per member every tick.
//!
//! Round flow: `prep` (aim only) -> `live` (round timer running) ->
//! `bomb_planted` (round timer suspended, fuse counting) -> `round_end`
//! (nothing moves) -> next round's `prep`. The first team to win
//! `rounds_to_win` rounds takes the match.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::env::{legalize, Environment, Step, StepInfo};
use crate::error::{ConfigError, EnvError};
use crate::events::{Event, EventKind};
use crate::geometry::Cell;
use crate::types::{GameId, Outcome, PerSide, Scores, Side};

// ============================================================================
// TEAMS, DIRECTIONS, ORDERS
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Team {
    T,
    CT,
}

impl Team {
    pub fn side(self) -> Side {
        match self {
            Team::T => Side::Player1,
            Team::CT => Side::Player2,
        }
    }

    pub fn of(side: Side) -> Team {
        match side {
            Side::Player1 => Team::T,
            Side::Player2 => Team::CT,
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            Team::T => "t",
            Team::CT => "ct",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundEndReason {
    Elimination,
    BombExploded,
    BombDefused,
    TimeExpired,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Move {
    N,
    S,
    E,
    W,
    #[default]
    Stay,
}

impl Move {
    pub const ALL: [Move; 5] = [Move::N, Move::S, Move::E, Move::W, Move::Stay];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Move::N => (0, -1),
            Move::S => (0, 1),
            Move::E => (1, 0),
            Move::W => (-1, 0),
            Move::Stay => (0, 0),
        }
    }
}

/// Aim and throw directions
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dir8 {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

impl Dir8 {
    pub const ALL: [Dir8; 8] = [
        Dir8::N,
        Dir8::NE,
        Dir8::E,
        Dir8::SE,
        Dir8::S,
        Dir8::SW,
        Dir8::W,
        Dir8::NW,
    ];

    pub fn delta(self) -> (i32, i32) {
        match self {
            Dir8::N => (0, -1),
            Dir8::NE => (1, -1),
            Dir8::E => (1, 0),
            Dir8::SE => (1, 1),
            Dir8::S => (0, 1),
            Dir8::SW => (-1, 1),
            Dir8::W => (-1, 0),
            Dir8::NW => (-1, -1),
        }
    }

    /// Closest of the eight directions toward an offset, `None` for zero
    pub fn toward(dx: i32, dy: i32) -> Option<Dir8> {
        if dx == 0 && dy == 0 {
            return None;
        }
        let (sx, sy) = (dx.signum(), dy.signum());
        let (ax, ay) = (dx.abs(), dy.abs());
        // snap to an axis when one component dominates
        let (sx, sy) = if ax > 2 * ay {
            (sx, 0)
        } else if ay > 2 * ax {
            (0, sy)
        } else {
            (sx, sy)
        };
        Dir8::ALL.iter().copied().find(|d| d.delta() == (sx, sy))
    }
}

/// Plant, defuse, or a grenade thrown along the member's aim
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Special {
    Plant,
    Defuse,
    Smoke,
    Flash,
}

/// Orders for one team member for one tick. The default holds position.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MemberOrder {
    pub movement: Move,
    /// New aim, `None` keeps the current one
    pub aim: Option<Dir8>,
    pub shoot: bool,
    pub special: Option<Special>,
}

impl MemberOrder {
    pub fn hold() -> Self {
        Self::default()
    }
}

/// One order per member slot, in member order
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TacticalAction {
    pub orders: Vec<MemberOrder>,
}

impl TacticalAction {
    pub fn new(orders: Vec<MemberOrder>) -> Self {
        Self { orders }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Largest team whose full joint action set `valid_actions` can list.
/// The set is the product of per-member order lists, a few hundred each.
pub const MAX_TEAM_SIZE: usize = 2;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TacticalConfig {
    pub map_size: i32,
    pub team_size: usize,
    pub rounds_to_win: u32,
    pub prep_ticks: u32,
    pub round_ticks: u32,
    pub fuse_ticks: u32,
    pub round_end_ticks: u32,
    pub plant_ticks: u32,
    pub defuse_ticks: u32,
    /// Manhattan sight radius, shared by the whole team
    pub vision_range: i32,
    pub max_hp: i32,
    pub damage: i32,
    pub ammo: u32,
    pub flash_ticks: u32,
    pub flash_radius: i32,
    pub smoke_ticks: u32,
    pub smoke_radius: i32,
    /// Grenades land this many cells along the aim
    pub throw_distance: i32,
}

impl Default for TacticalConfig {
    fn default() -> Self {
        Self {
            map_size: 15,
            team_size: 2,
            rounds_to_win: 3,
            prep_ticks: 3,
            round_ticks: 90,
            fuse_ticks: 40,
            round_end_ticks: 2,
            plant_ticks: 3,
            defuse_ticks: 10,
            vision_range: 7,
            max_hp: 100,
            damage: 25,
            ammo: 30,
            flash_ticks: 8,
            flash_radius: 4,
            smoke_ticks: 20,
            smoke_radius: 2,
            throw_distance: 3,
        }
    }
}

impl TacticalConfig {
    pub fn with_rounds_to_win(mut self, rounds: u32) -> Self {
        self.rounds_to_win = rounds;
        self
    }

    pub fn with_fuse_ticks(mut self, fuse: u32) -> Self {
        self.fuse_ticks = fuse;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_size < 11 {
            return Err(ConfigError::invalid("map_size", "must be at least 11"));
        }
        if !(1..=MAX_TEAM_SIZE).contains(&self.team_size) {
            return Err(ConfigError::invalid(
                "team_size",
                format!("must be between 1 and {}", MAX_TEAM_SIZE),
            ));
        }
        if self.rounds_to_win == 0 {
            return Err(ConfigError::invalid("rounds_to_win", "must be at least 1"));
        }
        for (field, value) in [
            ("round_ticks", self.round_ticks),
            ("fuse_ticks", self.fuse_ticks),
            ("plant_ticks", self.plant_ticks),
            ("defuse_ticks", self.defuse_ticks),
        ] {
            if value == 0 {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }
        if self.max_hp <= 0 || self.damage <= 0 {
            return Err(ConfigError::invalid("damage", "hp and damage must be positive"));
        }
        Ok(())
    }
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Prep,
    Live,
    BombPlanted,
    RoundEnd,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BombState {
    Carried {
        carrier: usize,
    },
    Dropped {
        at: Cell,
    },
    Planted {
        at: Cell,
        planted_at: u32,
        defuse_progress: u32,
    },
    Defused,
    Exploded,
}

#[derive(Clone, Debug, PartialEq)]
struct Member {
    name: String,
    pos: Cell,
    hp: i32,
    alive: bool,
    ammo: u32,
    aim: Dir8,
    has_smoke: bool,
    has_flash: bool,
    blind: u32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Smoke {
    center: Cell,
    ticks_left: u32,
}

// ============================================================================
// OBSERVATIONS
// ============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MemberView {
    pub name: String,
    pub pos: Cell,
    pub hp: i32,
    pub alive: bool,
    pub ammo: u32,
    pub aim: Dir8,
    pub has_bomb: bool,
    pub has_smoke: bool,
    pub has_flash: bool,
    pub blind_ticks: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnemyView {
    pub name: String,
    pub pos: Cell,
}

/// What a team knows about the bomb
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BombView {
    pub planted: bool,
    /// Known to `T` always, to `CT` only while the cell is in sight
    pub position: Option<Cell>,
    /// Member slot carrying the bomb; reported to `T` only
    pub carrier: Option<usize>,
    pub fuse_left: Option<u32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TacticalObservation {
    pub tick: u32,
    pub round: u32,
    pub phase: Phase,
    pub team: Team,
    pub rounds_won: u32,
    pub rounds_lost: u32,
    pub round_time_left: u32,
    pub map_size: i32,
    pub walls: Vec<Cell>,
    pub plant_cells: Vec<Cell>,
    pub members: Vec<MemberView>,
    /// Living enemies in team sight
    pub enemies: Vec<EnemyView>,
    pub bomb: BombView,
    pub smokes: Vec<Cell>,
    /// Legal orders per member slot; any combination is a legal action
    pub legal_orders: Vec<Vec<MemberOrder>>,
}

// ============================================================================
// ENVIRONMENT
// ============================================================================

/// Tactical environment
#[derive(Clone, Debug)]
pub struct TacticalEnv {
    config: TacticalConfig,
    rng: ChaCha8Rng,
    walls: Vec<bool>,
    plant_cells: Vec<Cell>,
    tick: u32,
    done: bool,
    outcome: Option<Outcome>,
    round: u32,
    phase: Phase,
    phase_left: u32,
    round_left: u32,
    members: PerSide<Vec<Member>>,
    bomb: BombState,
    plant_progress: u32,
    smokes: Vec<Smoke>,
    rounds_won: Scores,
}

impl TacticalEnv {
    pub fn new(config: TacticalConfig) -> Self {
        let (walls, plant_cells) = build_map(config.map_size);
        let mut env = Self {
            rng: ChaCha8Rng::seed_from_u64(0),
            walls,
            plant_cells,
            tick: 0,
            done: false,
            outcome: None,
            round: 0,
            phase: Phase::Prep,
            phase_left: 0,
            round_left: 0,
            members: PerSide::new(Vec::new(), Vec::new()),
            bomb: BombState::Carried { carrier: 0 },
            plant_progress: 0,
            smokes: Vec::new(),
            rounds_won: Scores::default(),
            config,
        };
        env.start_round();
        env
    }

    pub fn config(&self) -> &TacticalConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn bomb(&self) -> BombState {
        self.bomb
    }

    pub fn plant_cells(&self) -> &[Cell] {
        &self.plant_cells
    }

    pub fn is_wall(&self, cell: Cell) -> bool {
        cell.in_bounds(self.config.map_size)
            && self.walls[(cell.y * self.config.map_size + cell.x) as usize]
    }

    fn is_open(&self, cell: Cell) -> bool {
        cell.in_bounds(self.config.map_size) && !self.is_wall(cell)
    }

    fn in_smoke(&self, cell: Cell) -> bool {
        let radius = self.config.smoke_radius;
        self.smokes.iter().any(|s| s.center.manhattan(cell) <= radius)
    }

    /// Walls and smoke on the cells strictly between `from` and `to` block sight
    fn has_los(&self, from: Cell, to: Cell) -> bool {
        let dx = to.x - from.x;
        let dy = to.y - from.y;
        let steps = dx.abs().max(dy.abs());
        (1..steps).all(|i| {
            let cell = Cell::new(from.x + dx * i / steps, from.y + dy * i / steps);
            !self.is_wall(cell) && !self.in_smoke(cell)
        })
    }

    fn visible_cells(&self, side: Side) -> FxHashSet<Cell> {
        let range = self.config.vision_range;
        let mut seen = FxHashSet::default();
        for m in self.members[side].iter().filter(|m| m.alive && m.blind == 0) {
            for dx in -range..=range {
                for dy in -range..=range {
                    let cell = m.pos.offset(dx, dy);
                    if dx.abs() + dy.abs() > range || !cell.in_bounds(self.config.map_size) {
                        continue;
                    }
                    if self.has_los(m.pos, cell) {
                        seen.insert(cell);
                    }
                }
            }
        }
        seen
    }

    fn start_round(&mut self) {
        self.round += 1;
        let c = &self.config;
        let size = c.map_size;
        let spawn = |team: Team, i: usize| -> (Cell, Dir8) {
            let i = i as i32;
            match team {
                Team::T => (Cell::new(1, 1 + i), Dir8::E),
                Team::CT => (Cell::new(size - 2, size - 2 - i), Dir8::W),
            }
        };
        self.members = PerSide::from_fn(|side| {
            let team = Team::of(side);
            (0..c.team_size)
                .map(|i| {
                    let (pos, aim) = spawn(team, i);
                    Member {
                        name: format!("{}{}", team.prefix(), i + 1),
                        pos,
                        hp: c.max_hp,
                        alive: true,
                        ammo: c.ammo,
                        aim,
                        has_smoke: true,
                        has_flash: true,
                        blind: 0,
                    }
                })
                .collect()
        });
        let carrier = self.rng.gen_range(0..self.config.team_size);
        self.bomb = BombState::Carried { carrier };
        self.plant_progress = 0;
        self.smokes.clear();
        self.round_left = self.config.round_ticks;
        if self.config.prep_ticks > 0 {
            self.phase = Phase::Prep;
            self.phase_left = self.config.prep_ticks;
        } else {
            self.phase = Phase::Live;
        }
    }

    fn can_plant(&self, idx: usize) -> bool {
        self.phase == Phase::Live
            && self.bomb == BombState::Carried { carrier: idx }
            && self.plant_cells.contains(&self.members[Side::Player1][idx].pos)
    }

    fn can_defuse(&self, idx: usize) -> bool {
        match self.bomb {
            BombState::Planted { at, .. } => self.members[Side::Player2][idx].pos.chebyshev(at) <= 1,
            _ => false,
        }
    }

    /// Whether `member` can act at all this tick
    fn can_act(&self, side: Side, idx: usize) -> bool {
        let m = &self.members[side][idx];
        self.phase != Phase::RoundEnd && m.alive && m.blind == 0
    }

    fn legal_special(&self, side: Side, idx: usize, special: Special) -> bool {
        let m = &self.members[side][idx];
        match special {
            Special::Plant => side == Side::Player1 && self.can_plant(idx),
            Special::Defuse => side == Side::Player2 && self.can_defuse(idx),
            Special::Smoke => m.has_smoke,
            Special::Flash => m.has_flash,
        }
    }

    /// Every legal order for one member slot
    pub fn legal_orders(&self, side: Side, idx: usize) -> Vec<MemberOrder> {
        let hold = MemberOrder::hold();
        if idx >= self.members[side].len() || !self.can_act(side, idx) {
            return vec![hold];
        }
        let aims: Vec<Option<Dir8>> = std::iter::once(None)
            .chain(Dir8::ALL.iter().copied().map(Some))
            .collect();
        if self.phase == Phase::Prep {
            return aims.into_iter().map(|aim| MemberOrder { aim, ..hold }).collect();
        }

        let m = &self.members[side][idx];
        let moves: Vec<Move> = Move::ALL
            .iter()
            .copied()
            .filter(|mv| {
                let (dx, dy) = mv.delta();
                *mv == Move::Stay || self.is_open(m.pos.offset(dx, dy))
            })
            .collect();
        let shoots: &[bool] = if m.ammo > 0 { &[false, true] } else { &[false] };
        let specials: Vec<Option<Special>> = std::iter::once(None)
            .chain(
                [Special::Plant, Special::Defuse, Special::Smoke, Special::Flash]
                    .into_iter()
                    .filter(|&s| self.legal_special(side, idx, s))
                    .map(Some),
            )
            .collect();

        let mut orders = Vec::new();
        for &movement in &moves {
            for &aim in &aims {
                for &shoot in shoots {
                    for &special in &specials {
                        let stationary_only =
                            matches!(special, Some(Special::Plant) | Some(Special::Defuse));
                        if stationary_only && movement != Move::Stay {
                            continue;
                        }
                        orders.push(MemberOrder {
                            movement,
                            aim,
                            shoot,
                            special,
                        });
                    }
                }
            }
        }
        orders
    }

    /// Membership test against [`TacticalEnv::legal_orders`] without enumerating
    fn order_is_legal(&self, side: Side, idx: usize, order: &MemberOrder) -> bool {
        if *order == MemberOrder::hold() {
            return true;
        }
        if !self.can_act(side, idx) {
            return false;
        }
        if self.phase == Phase::Prep {
            return order.movement == Move::Stay && !order.shoot && order.special.is_none();
        }
        let m = &self.members[side][idx];
        let (dx, dy) = order.movement.delta();
        let move_ok = order.movement == Move::Stay || self.is_open(m.pos.offset(dx, dy));
        let shoot_ok = !order.shoot || m.ammo > 0;
        let special_ok = match order.special {
            None => true,
            Some(s @ (Special::Plant | Special::Defuse)) => {
                order.movement == Move::Stay && self.legal_special(side, idx, s)
            }
            Some(s) => self.legal_special(side, idx, s),
        };
        move_ok && shoot_ok && special_ok
    }

    fn apply_aims(&mut self, actions: &PerSide<TacticalAction>) {
        for side in Side::BOTH {
            for (m, order) in self.members[side].iter_mut().zip(&actions[side].orders) {
                if let Some(aim) = order.aim {
                    m.aim = aim;
                }
            }
        }
    }

    fn throw_target(&self, m: &Member) -> Cell {
        let (dx, dy) = m.aim.delta();
        let d = self.config.throw_distance;
        m.pos.offset(dx * d, dy * d).clamped(self.config.map_size)
    }

    /// One tick of live play. Returns the round result if the round ended.
    fn play_tick(
        &mut self,
        actions: &PerSide<TacticalAction>,
        events: &mut Vec<Event>,
    ) -> Option<(Team, RoundEndReason)> {
        let tick = self.tick;
        let c = self.config.clone();

        for side in Side::BOTH {
            for m in &mut self.members[side] {
                m.blind = m.blind.saturating_sub(1);
            }
        }
        for smoke in &mut self.smokes {
            smoke.ticks_left = smoke.ticks_left.saturating_sub(1);
        }
        self.smokes.retain(|s| s.ticks_left > 0);

        // movement
        for side in Side::BOTH {
            for (idx, order) in actions[side].orders.iter().enumerate() {
                let m = &self.members[side][idx];
                if !m.alive {
                    continue;
                }
                let (dx, dy) = order.movement.delta();
                let next = m.pos.offset(dx, dy);
                if self.is_open(next) {
                    self.members[side][idx].pos = next;
                }
            }
        }
        self.apply_aims(actions);

        if let BombState::Dropped { at } = self.bomb {
            if let Some(idx) = self.members[Side::Player1]
                .iter()
                .position(|m| m.alive && m.pos == at)
            {
                self.bomb = BombState::Carried { carrier: idx };
            }
        }

        // grenades
        for side in Side::BOTH {
            for (idx, order) in actions[side].orders.iter().enumerate() {
                match order.special {
                    Some(Special::Smoke) => {
                        let center = self.throw_target(&self.members[side][idx]);
                        self.smokes.push(Smoke {
                            center,
                            ticks_left: c.smoke_ticks,
                        });
                        self.members[side][idx].has_smoke = false;
                    }
                    Some(Special::Flash) => {
                        let burst = self.throw_target(&self.members[side][idx]);
                        self.members[side][idx].has_flash = false;
                        for victim_side in Side::BOTH {
                            for v in 0..self.members[victim_side].len() {
                                let target = &self.members[victim_side][v];
                                if target.alive
                                    && target.pos.manhattan(burst) <= c.flash_radius
                                    && self.has_los(burst, target.pos)
                                {
                                    self.members[victim_side][v].blind = c.flash_ticks;
                                }
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        // shots: traced against positions before any damage lands
        let mut hits: Vec<(Side, usize, usize)> = Vec::new();
        for side in Side::BOTH {
            for (idx, order) in actions[side].orders.iter().enumerate() {
                if !order.shoot || !self.members[side][idx].alive || self.members[side][idx].ammo == 0 {
                    continue;
                }
                self.members[side][idx].ammo -= 1;
                if let Some(victim) = self.trace_shot(side, idx) {
                    hits.push((side, idx, victim));
                }
            }
        }
        for (side, shooter, victim) in hits {
            let enemy = side.opponent();
            let target = &mut self.members[enemy][victim];
            if !target.alive {
                continue;
            }
            target.hp -= c.damage;
            if target.hp <= 0 {
                target.alive = false;
                let victim_name = target.name.clone();
                events.push(Event::new(
                    tick,
                    EventKind::Kill {
                        killer: self.members[side][shooter].name.clone(),
                        victim: victim_name,
                        killer_team: Team::of(side),
                        victim_team: Team::of(enemy),
                    },
                ));
            }
        }
        if let BombState::Carried { carrier } = self.bomb {
            let m = &self.members[Side::Player1][carrier];
            if !m.alive {
                self.bomb = BombState::Dropped { at: m.pos };
            }
        }

        // plant
        if self.phase == Phase::Live {
            let planting = match self.bomb {
                BombState::Carried { carrier } => {
                    let order = actions[Side::Player1].orders.get(carrier);
                    let m = &self.members[Side::Player1][carrier];
                    let wants = order.map_or(false, |o| {
                        o.special == Some(Special::Plant) && o.movement == Move::Stay
                    });
                    (wants && m.alive && self.plant_cells.contains(&m.pos)).then_some(carrier)
                }
                _ => None,
            };
            match planting {
                Some(carrier) => {
                    self.plant_progress += 1;
                    if self.plant_progress >= c.plant_ticks {
                        let m = &self.members[Side::Player1][carrier];
                        self.bomb = BombState::Planted {
                            at: m.pos,
                            planted_at: tick,
                            defuse_progress: 0,
                        };
                        events.push(Event::new(
                            tick,
                            EventKind::BombPlant {
                                planter: m.name.clone(),
                            },
                        ));
                        self.phase = Phase::BombPlanted;
                        self.plant_progress = 0;
                    }
                }
                None => self.plant_progress = 0,
            }
        }

        if let BombState::Planted {
            at,
            planted_at,
            defuse_progress,
        } = self.bomb
        {
            let defuser = actions[Side::Player2]
                .orders
                .iter()
                .enumerate()
                .find(|(idx, o)| {
                    let m = &self.members[Side::Player2][*idx];
                    o.special == Some(Special::Defuse)
                        && o.movement == Move::Stay
                        && m.alive
                        && m.pos.chebyshev(at) <= 1
                })
                .map(|(idx, _)| idx);
            let progress = if defuser.is_some() { defuse_progress + 1 } else { 0 };

            if let Some(idx) = defuser.filter(|_| progress >= c.defuse_ticks) {
                self.bomb = BombState::Defused;
                events.push(Event::new(
                    tick,
                    EventKind::BombDefuse {
                        defuser: self.members[Side::Player2][idx].name.clone(),
                    },
                ));
                return Some((Team::CT, RoundEndReason::BombDefused));
            }
            if tick - planted_at >= c.fuse_ticks {
                self.bomb = BombState::Exploded;
                events.push(Event::new(tick, EventKind::BombExplode));
                return Some((Team::T, RoundEndReason::BombExploded));
            }
            self.bomb = BombState::Planted {
                at,
                planted_at,
                defuse_progress: progress,
            };
        }

        let planted = matches!(self.bomb, BombState::Planted { .. });
        let t_alive = self.members[Side::Player1].iter().any(|m| m.alive);
        let ct_alive = self.members[Side::Player2].iter().any(|m| m.alive);
        if !t_alive && !planted {
            return Some((Team::CT, RoundEndReason::Elimination));
        }
        if !ct_alive {
            return Some((Team::T, RoundEndReason::Elimination));
        }

        if self.phase == Phase::Live {
            self.round_left = self.round_left.saturating_sub(1);
            if self.round_left == 0 {
                return Some((Team::CT, RoundEndReason::TimeExpired));
            }
        }
        None
    }

    /// First living enemy on the shooter's aim ray, if any
    fn trace_shot(&self, side: Side, idx: usize) -> Option<usize> {
        let shooter = &self.members[side][idx];
        let (dx, dy) = shooter.aim.delta();
        let mut cell = shooter.pos;
        for _ in 0..self.config.vision_range {
            cell = cell.offset(dx, dy);
            if !self.is_open(cell) || self.in_smoke(cell) {
                return None;
            }
            if let Some(victim) = self.members[side.opponent()]
                .iter()
                .position(|m| m.alive && m.pos == cell)
            {
                return Some(victim);
            }
        }
        None
    }

    fn finish_round(
        &mut self,
        winner: Team,
        reason: RoundEndReason,
        events: &mut Vec<Event>,
        rewards: &mut PerSide<f64>,
    ) {
        let side = winner.side();
        self.rounds_won[side] += 1;
        rewards[side] = 1.0;
        rewards[side.opponent()] = -1.0;
        events.push(Event::new(
            self.tick,
            EventKind::RoundEnd {
                round: self.round,
                winner,
                reason,
            },
        ));

        self.phase = Phase::RoundEnd;
        self.phase_left = self.config.round_end_ticks;
        if self.rounds_won[side] >= self.config.rounds_to_win {
            self.done = true;
            self.outcome = Some(Outcome::Win(side));
        } else if self.phase_left == 0 {
            self.start_round();
        }
    }

    fn bomb_view(&self, side: Side, visible: &FxHashSet<Cell>) -> BombView {
        let team = Team::of(side);
        let (position, carrier, fuse_left, planted) = match self.bomb {
            BombState::Carried { carrier } => {
                let pos = self.members[Side::Player1][carrier].pos;
                match team {
                    Team::T => (Some(pos), Some(carrier), None, false),
                    Team::CT => (None, None, None, false),
                }
            }
            BombState::Dropped { at } => {
                let known = team == Team::T || visible.contains(&at);
                (known.then_some(at), None, None, false)
            }
            BombState::Planted { at, planted_at, .. } => {
                let known = team == Team::T || visible.contains(&at);
                let left = self.config.fuse_ticks.saturating_sub(self.tick - planted_at);
                (known.then_some(at), None, known.then_some(left), true)
            }
            BombState::Defused | BombState::Exploded => (None, None, None, false),
        };
        BombView {
            planted,
            position,
            carrier,
            fuse_left,
        }
    }
}

/// Interior walls and the bomb site for a square map
fn build_map(size: i32) -> (Vec<bool>, Vec<Cell>) {
    let mut walls = vec![false; (size * size) as usize];
    let mut set = |x: i32, y: i32| walls[(y * size + x) as usize] = true;
    let mid = size / 2;

    for x in 3..size - 3 {
        if !(mid - 1..=mid + 1).contains(&x) {
            set(x, mid);
        }
    }
    for y in (3..7).chain(size - 7..size - 3) {
        set(3, y);
        set(size - 4, y);
    }

    let site = Cell::new(size - 4, mid);
    let mut plant_cells = Vec::new();
    for dy in -1..=1 {
        for dx in -1..=1 {
            let cell = site.offset(dx, dy);
            if cell.in_bounds(size) && !walls[(cell.y * size + cell.x) as usize] {
                plant_cells.push(cell);
            }
        }
    }
    (walls, plant_cells)
}

impl Environment for TacticalEnv {
    type Action = TacticalAction;
    type Observation = TacticalObservation;

    fn game_id(&self) -> GameId {
        GameId::Tactical
    }

    fn reset(&mut self, seed: u64) -> PerSide<TacticalObservation> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.tick = 0;
        self.done = false;
        self.outcome = None;
        self.round = 0;
        self.rounds_won = Scores::default();
        self.start_round();
        PerSide::from_fn(|side| self.observe(side))
    }

    fn step(
        &mut self,
        actions: &PerSide<TacticalAction>,
    ) -> Result<Step<TacticalObservation>, EnvError> {
        if self.done {
            return Err(EnvError::AlreadyDone { tick: self.tick });
        }
        let actions = legalize(self, actions);
        self.tick += 1;
        let mut events = Vec::new();
        let mut rewards = PerSide::new(0.0, 0.0);

        match self.phase {
            Phase::RoundEnd => {
                self.phase_left = self.phase_left.saturating_sub(1);
                if self.phase_left == 0 {
                    self.start_round();
                }
            }
            Phase::Prep => {
                self.apply_aims(&actions);
                self.phase_left = self.phase_left.saturating_sub(1);
                if self.phase_left == 0 {
                    self.phase = Phase::Live;
                }
            }
            Phase::Live | Phase::BombPlanted => {
                if let Some((winner, reason)) = self.play_tick(&actions, &mut events) {
                    self.finish_round(winner, reason, &mut events, &mut rewards);
                }
            }
        }

        Ok(Step {
            observations: PerSide::from_fn(|side| self.observe(side)),
            rewards,
            done: self.done,
            info: StepInfo {
                tick: self.tick,
                scores: self.rounds_won,
                events,
            },
        })
    }

    /// Full product of the per-member legal orders, bounded by
    /// [`MAX_TEAM_SIZE`]. Agents should use `legal_orders` from the observation.
    fn valid_actions(&self, side: Side) -> Vec<TacticalAction> {
        let mut combos: Vec<Vec<MemberOrder>> = vec![Vec::new()];
        for idx in 0..self.config.team_size {
            let options = self.legal_orders(side, idx);
            combos = combos
                .into_iter()
                .flat_map(|prefix| {
                    options.iter().map(move |order| {
                        let mut next = prefix.clone();
                        next.push(*order);
                        next
                    })
                })
                .collect();
        }
        combos.into_iter().map(TacticalAction::new).collect()
    }

    fn is_valid_action(&self, side: Side, action: &TacticalAction) -> bool {
        action.orders.len() == self.config.team_size
            && action
                .orders
                .iter()
                .enumerate()
                .all(|(idx, order)| self.order_is_legal(side, idx, order))
    }

    fn noop(&self, _side: Side) -> TacticalAction {
        TacticalAction::new(vec![MemberOrder::hold(); self.config.team_size])
    }

    fn observe(&self, side: Side) -> TacticalObservation {
        let visible = self.visible_cells(side);
        let bomb = self.bomb_view(side, &visible);
        let members = self.members[side]
            .iter()
            .enumerate()
            .map(|(idx, m)| MemberView {
                name: m.name.clone(),
                pos: m.pos,
                hp: m.hp.max(0),
                alive: m.alive,
                ammo: m.ammo,
                aim: m.aim,
                has_bomb: side == Side::Player1 && self.bomb == BombState::Carried { carrier: idx },
                has_smoke: m.has_smoke,
                has_flash: m.has_flash,
                blind_ticks: m.blind,
            })
            .collect();
        let enemies = self.members[side.opponent()]
            .iter()
            .filter(|m| m.alive && visible.contains(&m.pos))
            .map(|m| EnemyView {
                name: m.name.clone(),
                pos: m.pos,
            })
            .collect();
        let size = self.config.map_size;
        let walls = (0..size)
            .flat_map(|y| (0..size).map(move |x| Cell::new(x, y)))
            .filter(|&cell| self.is_wall(cell))
            .collect();

        TacticalObservation {
            tick: self.tick,
            round: self.round,
            phase: self.phase,
            team: Team::of(side),
            rounds_won: self.rounds_won[side],
            rounds_lost: self.rounds_won[side.opponent()],
            round_time_left: self.round_left,
            map_size: size,
            walls,
            plant_cells: self.plant_cells.clone(),
            members,
            enemies,
            bomb,
            smokes: self.smokes.iter().map(|s| s.center).collect(),
            legal_orders: (0..self.config.team_size)
                .map(|idx| self.legal_orders(side, idx))
                .collect(),
        }
    }

    fn winner(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Rounds won
    fn scores(&self) -> Scores {
        self.rounds_won
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

    fn hold_all() -> PerSide<TacticalAction> {
        PerSide::new(
            TacticalAction::new(vec![MemberOrder::hold(); 2]),
            TacticalAction::new(vec![MemberOrder::hold(); 2]),
        )
    }

    /// Fresh env stepped through the prep phase
    fn live_env(seed: u64) -> TacticalEnv {
        let mut env = TacticalEnv::new(TacticalConfig::default());
        env.reset(seed);
        for _ in 0..3 {
            env.step(&hold_all()).unwrap();
        }
        assert_eq!(env.phase(), Phase::Live);
        env
    }

    fn carrier(env: &TacticalEnv) -> usize {
        match env.bomb() {
            BombState::Carried { carrier } => carrier,
            other => panic!("bomb not carried: {other:?}"),
        }
    }

    fn plant(env: &mut TacticalEnv) -> u32 {
        let idx = carrier(env);
        env.members[Side::Player1][idx].pos = env.plant_cells[0];
        let mut orders = vec![MemberOrder::hold(); 2];
        orders[idx].special = Some(Special::Plant);
        let actions = PerSide::new(
            TacticalAction::new(orders),
            TacticalAction::new(vec![MemberOrder::hold(); 2]),
        );
        for _ in 0..3 {
            let step = env.step(&actions).unwrap();
            if let Some(e) = step.info.events.iter().find(|e| e.type_name() == "bomb_plant") {
                return e.tick;
            }
        }
        panic!("plant did not complete");
    }

    #[test]
    fn test_map_layout() {
        let env = TacticalEnv::new(TacticalConfig::default());
        assert_eq!(env.plant_cells().len(), 5);
        assert!(env.is_wall(Cell::new(3, 4)));
        assert!(env.is_wall(Cell::new(4, 7)));
        assert!(!env.is_wall(Cell::new(7, 7)));
        assert!(env.plant_cells().iter().all(|&c| !env.is_wall(c)));
    }

    #[test]
    fn test_prep_allows_only_aiming() {
        let mut env = TacticalEnv::new(TacticalConfig::default());
        let obs = env.reset(2);
        assert_eq!(obs.player_1.phase, Phase::Prep);
        assert_eq!(obs.player_1.legal_orders[0].len(), 9);

        let walk = MemberOrder {
            movement: Move::S,
            ..MemberOrder::hold()
        };
        let action = TacticalAction::new(vec![walk, MemberOrder::hold()]);
        assert!(!env.is_valid_action(Side::Player1, &action));
    }

    #[test]
    fn test_per_member_check_matches_product() {
        let env = live_env(4);
        let all = env.valid_actions(Side::Player2);
        let per_member: usize = (0..2).map(|i| env.legal_orders(Side::Player2, i).len()).product();
        assert_eq!(all.len(), per_member);
        assert!(all.iter().all(|a| env.is_valid_action(Side::Player2, a)));
        assert!(!env.is_valid_action(Side::Player2, &TacticalAction::new(vec![MemberOrder::hold()])));
    }

    #[test]
    fn test_largest_team_lists_every_joint_action() {
        let mut too_big = TacticalConfig::default();
        too_big.team_size = MAX_TEAM_SIZE + 1;
        assert!(too_big.validate().is_err());

        let mut config = TacticalConfig::default();
        config.team_size = MAX_TEAM_SIZE;
        assert!(config.validate().is_ok());
        let mut env = TacticalEnv::new(config);
        env.reset(9);
        let noop = env.noop(Side::Player1);
        for _ in 0..3 {
            env.step(&PerSide::new(noop.clone(), noop.clone())).unwrap();
        }
        assert_eq!(env.phase(), Phase::Live);

        for side in Side::BOTH {
            let all = env.valid_actions(side);
            let per_member: usize = (0..MAX_TEAM_SIZE)
                .map(|i| env.legal_orders(side, i).len())
                .product();
            assert_eq!(all.len(), per_member);
            assert!(all.len() < 200_000);
        }
    }

    #[test]
    fn test_bomb_explodes_after_fuse() {
        let mut env = live_env(7);
        let planted_at = plant(&mut env);
        assert_eq!(env.phase(), Phase::BombPlanted);

        let mut exploded_at = None;
        let mut round_end = None;
        for _ in 0..60 {
            let step = env.step(&hold_all()).unwrap();
            for e in &step.info.events {
                match &e.kind {
                    EventKind::BombExplode => exploded_at = Some(e.tick),
                    EventKind::RoundEnd { winner, reason, .. } => round_end = Some((*winner, *reason)),
                    _ => {}
                }
            }
            if exploded_at.is_some() {
                break;
            }
        }
        assert_eq!(exploded_at, Some(planted_at + 40));
        assert_eq!(round_end, Some((Team::T, RoundEndReason::BombExploded)));
        assert_eq!(env.scores(), Scores::new(1, 0));
    }

    #[test]
    fn test_defuse_wins_round_for_ct() {
        let mut env = live_env(8);
        plant(&mut env);
        let site = match env.bomb() {
            BombState::Planted { at, .. } => at,
            other => panic!("not planted: {other:?}"),
        };
        env.members[Side::Player2][0].pos = site;
        let defuse = MemberOrder {
            special: Some(Special::Defuse),
            ..MemberOrder::hold()
        };
        let actions = PerSide::new(
            TacticalAction::new(vec![MemberOrder::hold(); 2]),
            TacticalAction::new(vec![defuse, MemberOrder::hold()]),
        );
        let mut reason = None;
        for _ in 0..10 {
            let step = env.step(&actions).unwrap();
            if let Some(e) = step.info.events.iter().find(|e| e.type_name() == "round_end") {
                if let EventKind::RoundEnd { reason: r, .. } = e.kind {
                    reason = Some(r);
                }
            }
        }
        assert_eq!(reason, Some(RoundEndReason::BombDefused));
        assert_eq!(env.scores(), Scores::new(0, 1));
    }

    #[test]
    fn test_shots_resolve_simultaneously() {
        let mut env = live_env(9);
        env.members[Side::Player1][0].pos = Cell::new(1, 1);
        env.members[Side::Player1][0].aim = Dir8::E;
        env.members[Side::Player2][0].pos = Cell::new(4, 1);
        env.members[Side::Player2][0].aim = Dir8::W;
        let fire = MemberOrder {
            shoot: true,
            ..MemberOrder::hold()
        };
        let actions = PerSide::new(
            TacticalAction::new(vec![fire, MemberOrder::hold()]),
            TacticalAction::new(vec![fire, MemberOrder::hold()]),
        );

        let mut kills = Vec::new();
        for _ in 0..4 {
            let step = env.step(&actions).unwrap();
            kills.extend(step.info.events.into_iter().filter(|e| e.type_name() == "kill"));
        }
        assert_eq!(kills.len(), 2);
        assert_eq!(kills[0].tick, kills[1].tick);
        assert_eq!(env.members[Side::Player1][0].ammo, 26);
    }

    #[test]
    fn test_flash_blinds_and_restricts_orders() {
        let mut env = live_env(10);
        env.members[Side::Player1][0].pos = Cell::new(1, 1);
        env.members[Side::Player2][0].pos = Cell::new(5, 1);
        let flash = MemberOrder {
            aim: Some(Dir8::E),
            special: Some(Special::Flash),
            ..MemberOrder::hold()
        };
        let actions = PerSide::new(
            TacticalAction::new(vec![flash, MemberOrder::hold()]),
            TacticalAction::new(vec![MemberOrder::hold(); 2]),
        );
        env.step(&actions).unwrap();

        assert_eq!(env.members[Side::Player2][0].blind, 8);
        assert_eq!(env.legal_orders(Side::Player2, 0), vec![MemberOrder::hold()]);
        assert!(!env.members[Side::Player1][0].has_flash);
    }

    #[test]
    fn test_time_expiry_goes_to_ct() {
        let mut env = live_env(11);
        let mut last = None;
        for _ in 0..90 {
            let step = env.step(&hold_all()).unwrap();
            if let Some(e) = step.info.events.last() {
                last = Some(e.kind.clone());
            }
        }
        assert_eq!(
            last,
            Some(EventKind::RoundEnd {
                round: 1,
                winner: Team::CT,
                reason: RoundEndReason::TimeExpired,
            })
        );
    }

    #[test]
    fn test_match_ends_at_rounds_to_win() {
        let mut env = TacticalEnv::new(TacticalConfig::default().with_rounds_to_win(1));
        env.reset(12);
        let mut ticks = 0;
        while !env.is_done() {
            env.step(&hold_all()).unwrap();
            ticks += 1;
        }
        assert_eq!(ticks, 3 + 90);
        assert_eq!(env.winner(), Some(Outcome::Win(Side::Player2)));
    }

    #[test]
    fn test_ct_cannot_see_bomb_out_of_sight() {
        let mut env = live_env(13);
        plant(&mut env);
        let ct = env.observe(Side::Player2);
        let t = env.observe(Side::Player1);
        assert!(ct.bomb.planted);
        assert!(t.bomb.position.is_some());
        assert_eq!(t.bomb.fuse_left, Some(40));
        // the site is more than seven cells from both CT spawns
        assert_eq!(ct.bomb.position, None);
        assert_eq!(ct.bomb.fuse_left, None);
    }
}
