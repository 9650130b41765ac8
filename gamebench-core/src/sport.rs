//! Sport: a 2D car-ball game
//!
//! Two cars push a ball around a 100x60 arena with a goal mouth centered on
//! each short wall. `player_1` kicks off on the left and attacks the right
//! goal. Physics is deliberately simple: Euler integration, velocity clamps,
//! friction and a restitution impulse between the ball and the cars.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::env::{legalize, Environment, Step, StepInfo};
use crate::error::{ConfigError, EnvError};
use crate::events::{Event, EventKind};
use crate::geometry::{wrap_angle, Vec2};
use crate::types::{GameId, Outcome, PerSide, Scores, Side};

/// Velocity used to normalize observations into [-1, 1]
const MAX_VEL: f64 = 30.0;

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Arena and car tuning
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SportConfig {
    pub arena_width: f64,
    pub arena_height: f64,
    pub goal_width: f64,
    pub max_ticks: u32,
    /// First side to reach this many goals wins. `None` plays the full clock.
    pub max_goals: Option<u32>,
    pub ticks_per_second: u32,
    pub restitution: f64,
    pub max_speed: f64,
    pub boost_speed: f64,
    pub acceleration: f64,
    pub turn_speed: f64,
    pub friction: f64,
    pub car_radius: f64,
    pub ball_radius: f64,
    pub dash_power: f64,
    pub dash_cooldown: u32,
    pub boost_max: f64,
    pub boost_consumption: f64,
    pub boost_regen: f64,
    /// Half-width of the seeded vertical velocity given to the ball at kickoff
    pub kickoff_jitter: f64,
}

impl Default for SportConfig {
    fn default() -> Self {
        Self {
            arena_width: 100.0,
            arena_height: 60.0,
            goal_width: 20.0,
            max_ticks: 2700,
            max_goals: Some(7),
            ticks_per_second: 30,
            restitution: 0.8,
            max_speed: 15.0,
            boost_speed: 25.0,
            acceleration: 20.0,
            turn_speed: 3.0,
            friction: 0.99,
            car_radius: 1.2,
            ball_radius: 1.0,
            dash_power: 30.0,
            dash_cooldown: 60,
            boost_max: 100.0,
            boost_consumption: 2.0,
            boost_regen: 0.5,
            kickoff_jitter: 1.5,
        }
    }
}

impl SportConfig {
    pub fn with_max_ticks(mut self, max_ticks: u32) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    pub fn with_max_goals(mut self, max_goals: Option<u32>) -> Self {
        self.max_goals = max_goals;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.arena_width > 0.0 && self.arena_height > 0.0) {
            return Err(ConfigError::invalid("arena", "dimensions must be positive"));
        }
        if !(self.goal_width > 0.0 && self.goal_width < self.arena_height) {
            return Err(ConfigError::invalid(
                "goal_width",
                format!("must be in (0, {})", self.arena_height),
            ));
        }
        if self.max_ticks == 0 {
            return Err(ConfigError::invalid("max_ticks", "must be at least 1"));
        }
        if self.max_goals == Some(0) {
            return Err(ConfigError::invalid("max_goals", "must be at least 1"));
        }
        if self.ticks_per_second == 0 {
            return Err(ConfigError::invalid("ticks_per_second", "must be at least 1"));
        }
        if !(0.0..=1.0).contains(&self.restitution) || !(0.0..=1.0).contains(&self.friction) {
            return Err(ConfigError::invalid(
                "restitution",
                "restitution and friction must be in [0, 1]",
            ));
        }
        if self.kickoff_jitter < 0.0 || self.kickoff_jitter.is_nan() {
            return Err(ConfigError::invalid("kickoff_jitter", "must be non-negative"));
        }
        Ok(())
    }

    fn dt(&self) -> f64 {
        1.0 / f64::from(self.ticks_per_second)
    }

    fn goal_span(&self) -> (f64, f64) {
        (
            (self.arena_height - self.goal_width) / 2.0,
            (self.arena_height + self.goal_width) / 2.0,
        )
    }
}

// ============================================================================
// ACTIONS AND OBSERVATIONS
// ============================================================================

/// Discrete car controls
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SportAction {
    /// -1 reverse, 0 coast, 1 forward
    pub throttle: i8,
    /// -1 clockwise, 0 straight, 1 counter-clockwise
    pub steer: i8,
    pub boost: bool,
    pub dash: bool,
}

impl SportAction {
    pub fn new(throttle: i8, steer: i8, boost: bool, dash: bool) -> Self {
        Self {
            throttle,
            steer,
            boost,
            dash,
        }
    }
}

/// Normalized car state. Positions in [-1, 1], heading in [-1, 1] (times pi).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CarView {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub angle: f64,
    /// Remaining boost in [0, 1]
    pub boost: f64,
    pub dash_ready: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BallView {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SportObservation {
    pub tick: u32,
    /// Fraction of the clock remaining, in [0, 1]
    pub time_left: f64,
    pub score_self: u32,
    pub score_opp: u32,
    /// +1 when attacking the right goal, -1 when attacking the left
    pub attack_direction: f64,
    pub car_self: CarView,
    pub car_opp: CarView,
    pub ball: BallView,
    pub valid_actions: Vec<SportAction>,
}

// ============================================================================
// STATE
// ============================================================================

#[derive(Clone, Debug, PartialEq)]
struct Car {
    pos: Vec2,
    vel: Vec2,
    angle: f64,
    boost: f64,
    dash_cooldown: u32,
}

#[derive(Clone, Debug, PartialEq)]
struct Ball {
    pos: Vec2,
    vel: Vec2,
}

/// Sport environment
#[derive(Clone, Debug)]
pub struct SportEnv {
    config: SportConfig,
    rng: ChaCha8Rng,
    tick: u32,
    done: bool,
    outcome: Option<Outcome>,
    scores: Scores,
    cars: PerSide<Car>,
    ball: Ball,
}

impl SportEnv {
    pub fn new(config: SportConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(0);
        let (cars, ball) = kickoff(&config, 0.0);
        Self {
            config,
            rng,
            tick: 0,
            done: false,
            outcome: None,
            scores: Scores::default(),
            cars,
            ball,
        }
    }

    pub fn config(&self) -> &SportConfig {
        &self.config
    }

    /// Raw ball position in arena units
    pub fn ball_position(&self) -> Vec2 {
        self.ball.pos
    }

    fn place_kickoff(&mut self) {
        let jitter = self.config.kickoff_jitter;
        let vy = if jitter > 0.0 {
            self.rng.gen_range(-jitter..=jitter)
        } else {
            0.0
        };
        let (cars, ball) = kickoff(&self.config, vy);
        self.cars = cars;
        self.ball = ball;
    }

    fn update_car(&mut self, side: Side, action: &SportAction) {
        let c = &self.config;
        let dt = c.dt();
        let car = &mut self.cars[side];

        car.angle += f64::from(action.steer) * c.turn_speed * dt;
        let forward = Vec2::from_angle(car.angle, 1.0);
        let mut limit = c.max_speed;
        let mut boosting = false;

        if action.dash && car.dash_cooldown == 0 {
            car.vel = car.vel + forward * c.dash_power;
            car.dash_cooldown = c.dash_cooldown;
            limit = c.boost_speed;
        } else if action.boost && car.boost > 0.0 && action.throttle > 0 {
            car.vel = car.vel + forward * (c.acceleration * 1.5 * dt);
            car.boost = (car.boost - c.boost_consumption).max(0.0);
            limit = c.boost_speed;
            boosting = true;
        } else if action.throttle != 0 {
            car.vel = car.vel + forward * (f64::from(action.throttle) * c.acceleration * dt);
        }

        if !boosting {
            car.boost = (car.boost + c.boost_regen).min(c.boost_max);
        }

        if car.vel.magnitude() > limit {
            car.vel = car.vel.normalized() * limit;
        }
        car.vel = car.vel * c.friction;
        car.pos = car.pos + car.vel * dt;

        car.dash_cooldown = car.dash_cooldown.saturating_sub(1);

        let r = c.car_radius;
        if car.pos.x - r < 0.0 {
            car.pos.x = r;
            car.vel.x *= -0.5;
        } else if car.pos.x + r > c.arena_width {
            car.pos.x = c.arena_width - r;
            car.vel.x *= -0.5;
        }
        if car.pos.y - r < 0.0 {
            car.pos.y = r;
            car.vel.y *= -0.5;
        } else if car.pos.y + r > c.arena_height {
            car.pos.y = c.arena_height - r;
            car.vel.y *= -0.5;
        }
    }

    fn collide_ball(&mut self, side: Side) {
        let c = &self.config;
        let car = &self.cars[side];
        let diff = self.ball.pos - car.pos;
        let dist = diff.magnitude();
        let min_dist = c.ball_radius + c.car_radius;
        if dist >= min_dist || dist == 0.0 {
            return;
        }

        let normal = diff.normalized();
        self.ball.pos = self.ball.pos + normal * (min_dist - dist);
        let along = (self.ball.vel - car.vel).dot(normal);
        if along < 0.0 {
            self.ball.vel = self.ball.vel + normal * (-(1.0 + c.restitution) * along);
        }
        if self.ball.vel.magnitude() > MAX_VEL {
            self.ball.vel = self.ball.vel.normalized() * MAX_VEL;
        }
    }

    fn bounce_ball(&mut self) {
        let c = &self.config;
        let r = c.ball_radius;
        let (goal_min, goal_max) = c.goal_span();
        let in_mouth = goal_min < self.ball.pos.y && self.ball.pos.y < goal_max;
        let ball = &mut self.ball;

        if !in_mouth {
            if ball.pos.x - r < 0.0 {
                ball.pos.x = r;
                ball.vel.x *= -c.restitution;
            } else if ball.pos.x + r > c.arena_width {
                ball.pos.x = c.arena_width - r;
                ball.vel.x *= -c.restitution;
            }
        }
        if ball.pos.y - r < 0.0 {
            ball.pos.y = r;
            ball.vel.y *= -c.restitution;
        } else if ball.pos.y + r > c.arena_height {
            ball.pos.y = c.arena_height - r;
            ball.vel.y *= -c.restitution;
        }
    }

    /// Side that scored this tick, if the ball fully crossed a goal line
    fn check_goal(&self) -> Option<Side> {
        let c = &self.config;
        let r = c.ball_radius;
        let (goal_min, goal_max) = c.goal_span();
        let pos = self.ball.pos;
        if !(goal_min < pos.y && pos.y < goal_max) {
            return None;
        }
        if pos.x + r < 0.0 {
            Some(Side::Player2)
        } else if pos.x - r > c.arena_width {
            Some(Side::Player1)
        } else {
            None
        }
    }

    fn car_view(&self, car: &Car) -> CarView {
        CarView {
            x: self.normalize_x(car.pos.x),
            y: self.normalize_y(car.pos.y),
            vx: normalize_vel(car.vel.x),
            vy: normalize_vel(car.vel.y),
            angle: wrap_angle(car.angle) / PI,
            boost: car.boost / self.config.boost_max,
            dash_ready: car.dash_cooldown == 0,
        }
    }

    fn normalize_x(&self, x: f64) -> f64 {
        (x / self.config.arena_width) * 2.0 - 1.0
    }

    fn normalize_y(&self, y: f64) -> f64 {
        (y / self.config.arena_height) * 2.0 - 1.0
    }
}

fn normalize_vel(v: f64) -> f64 {
    (v / MAX_VEL).clamp(-1.0, 1.0)
}

/// Cars facing each other on the halfway line, ball at the center
fn kickoff(config: &SportConfig, ball_vy: f64) -> (PerSide<Car>, Ball) {
    let mid_y = config.arena_height / 2.0;
    let car = |x: f64, angle: f64| Car {
        pos: Vec2::new(x, mid_y),
        vel: Vec2::ZERO,
        angle,
        boost: config.boost_max,
        dash_cooldown: 0,
    };
    let cars = PerSide::new(
        car(config.arena_width * 0.25, 0.0),
        car(config.arena_width * 0.75, PI),
    );
    let ball = Ball {
        pos: Vec2::new(config.arena_width / 2.0, mid_y),
        vel: Vec2::new(0.0, ball_vy),
    };
    (cars, ball)
}

impl Environment for SportEnv {
    type Action = SportAction;
    type Observation = SportObservation;

    fn game_id(&self) -> GameId {
        GameId::Sport
    }

    fn reset(&mut self, seed: u64) -> PerSide<SportObservation> {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self.tick = 0;
        self.done = false;
        self.outcome = None;
        self.scores = Scores::default();
        self.place_kickoff();
        PerSide::from_fn(|side| self.observe(side))
    }

    fn step(&mut self, actions: &PerSide<SportAction>) -> Result<Step<SportObservation>, EnvError> {
        if self.done {
            return Err(EnvError::AlreadyDone { tick: self.tick });
        }
        let actions = legalize(self, actions);
        self.tick += 1;

        for side in Side::BOTH {
            self.update_car(side, &actions[side]);
        }
        let dt = self.config.dt();
        self.ball.vel = self.ball.vel * self.config.friction;
        self.ball.pos = self.ball.pos + self.ball.vel * dt;
        for side in Side::BOTH {
            self.collide_ball(side);
        }
        self.bounce_ball();

        let mut rewards = PerSide::new(0.0, 0.0);
        let mut events = Vec::new();
        if let Some(scorer) = self.check_goal() {
            self.scores[scorer] += 1;
            rewards[scorer] = 1.0;
            rewards[scorer.opponent()] = -1.0;
            events.push(Event::new(
                self.tick,
                EventKind::Goal {
                    scorer,
                    score: self.scores,
                },
            ));
            self.place_kickoff();
        }

        let goal_limit_hit = self
            .config
            .max_goals
            .map_or(false, |limit| Side::BOTH.iter().any(|&s| self.scores[s] >= limit));
        if goal_limit_hit || self.tick >= self.config.max_ticks {
            self.done = true;
            self.outcome = Some(self.scores.outcome());
        }

        Ok(Step {
            observations: PerSide::from_fn(|side| self.observe(side)),
            rewards,
            done: self.done,
            info: StepInfo {
                tick: self.tick,
                scores: self.scores,
                events,
            },
        })
    }

    fn valid_actions(&self, side: Side) -> Vec<SportAction> {
        let car = &self.cars[side];
        let boosts: &[bool] = if car.boost > 0.0 { &[false, true] } else { &[false] };
        let dashes: &[bool] = if car.dash_cooldown == 0 { &[false, true] } else { &[false] };

        let mut actions = Vec::with_capacity(36);
        for throttle in [-1, 0, 1] {
            for steer in [-1, 0, 1] {
                for &boost in boosts {
                    for &dash in dashes {
                        actions.push(SportAction::new(throttle, steer, boost, dash));
                    }
                }
            }
        }
        actions
    }

    fn is_valid_action(&self, side: Side, action: &SportAction) -> bool {
        let car = &self.cars[side];
        (-1..=1).contains(&action.throttle)
            && (-1..=1).contains(&action.steer)
            && (!action.boost || car.boost > 0.0)
            && (!action.dash || car.dash_cooldown == 0)
    }

    fn noop(&self, _side: Side) -> SportAction {
        SportAction::default()
    }

    fn observe(&self, side: Side) -> SportObservation {
        let remaining = self.config.max_ticks.saturating_sub(self.tick);
        SportObservation {
            tick: self.tick,
            time_left: f64::from(remaining) / f64::from(self.config.max_ticks),
            score_self: self.scores[side],
            score_opp: self.scores[side.opponent()],
            attack_direction: match side {
                Side::Player1 => 1.0,
                Side::Player2 => -1.0,
            },
            car_self: self.car_view(&self.cars[side]),
            car_opp: self.car_view(&self.cars[side.opponent()]),
            ball: BallView {
                x: self.normalize_x(self.ball.pos.x),
                y: self.normalize_y(self.ball.pos.y),
                vx: normalize_vel(self.ball.vel.x),
                vy: normalize_vel(self.ball.vel.y),
            },
            valid_actions: self.valid_actions(side),
        }
    }

    fn winner(&self) -> Option<Outcome> {
        self.outcome
    }

    fn scores(&self) -> Scores {
        self.scores
    }

    fn tick(&self) -> u32 {
        self.tick
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
