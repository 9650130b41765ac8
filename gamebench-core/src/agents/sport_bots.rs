//! Scripted Sport bots
//!
//! All three steer in the normalized observation frame: positions in
//! [-1, 1], heading as a fraction of pi. `attack_direction` tells each bot
//! which goal is theirs.

use std::f64::consts::PI;

use super::{legal_sport, Agent};
use crate::env::{Action, Observation};
use crate::geometry::wrap_angle;
use crate::sport::{SportAction, SportObservation};

/// Heading error below which the bot drives straight
const STEER_DEADBAND: f64 = 0.1;

/// Signed heading error from the car to `(tx, ty)`, plus the distance
fn aim_at(obs: &SportObservation, tx: f64, ty: f64) -> (f64, f64) {
    let car = &obs.car_self;
    let (dx, dy) = (tx - car.x, ty - car.y);
    let diff = wrap_angle(dy.atan2(dx) - car.angle * PI);
    (diff, (dx * dx + dy * dy).sqrt())
}

fn steer_for(diff: f64) -> i8 {
    if diff > STEER_DEADBAND {
        1
    } else if diff < -STEER_DEADBAND {
        -1
    } else {
        0
    }
}

fn sport_obs(observation: &Observation) -> Option<&SportObservation> {
    match observation {
        Observation::Sport(o) => Some(o),
        _ => None,
    }
}

// ============================================================================
// BALL CHASER
// ============================================================================

/// Drives at the ball, boosting when lined up and dashing when close
#[derive(Default)]
pub struct BallChaser;

impl BallChaser {
    pub fn new() -> Self {
        Self
    }

    fn decide(&self, obs: &SportObservation) -> SportAction {
        let (diff, distance) = aim_at(obs, obs.ball.x, obs.ball.y);
        let want = SportAction {
            throttle: 1,
            steer: steer_for(diff),
            boost: diff.abs() < 0.3 && distance > 0.3 && obs.car_self.boost > 0.2,
            dash: distance < 0.15 && diff.abs() < 0.5,
        };
        legal_sport(&obs.valid_actions, want)
    }
}

impl Agent for BallChaser {
    fn name(&self) -> &str {
        "ballchaser"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        Action::Sport(sport_obs(observation).map_or_else(SportAction::default, |o| self.decide(o)))
    }
}

// ============================================================================
// GOALIE
// ============================================================================

/// Guards its own goal and only commits when the ball gets dangerous
#[derive(Default)]
pub struct Goalie;

impl Goalie {
    pub fn new() -> Self {
        Self
    }

    fn decide(&self, obs: &SportObservation) -> SportAction {
        let own_goal_x = -obs.attack_direction;
        let guard_x = own_goal_x * 0.7;
        let ball = &obs.ball;

        let in_my_half = ball.x * own_goal_x > 0.0;
        let danger = (ball.x - own_goal_x).abs() < 0.4;
        let (tx, ty) = if danger {
            (ball.x, ball.y)
        } else if in_my_half {
            (guard_x, ball.y)
        } else {
            (guard_x, 0.0)
        };

        let (diff, distance) = aim_at(obs, tx, ty);
        let want = SportAction {
            throttle: if distance > 0.05 { 1 } else { 0 },
            steer: steer_for(diff),
            boost: danger && diff.abs() < 0.3 && obs.car_self.boost > 0.3,
            dash: danger && distance < 0.2,
        };
        legal_sport(&obs.valid_actions, want)
    }
}

impl Agent for Goalie {
    fn name(&self) -> &str {
        "goalie"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        Action::Sport(sport_obs(observation).map_or_else(SportAction::default, |o| self.decide(o)))
    }
}

// ============================================================================
// STRIKER
// ============================================================================

/// Lines up behind the ball and drives it at the opposing goal
#[derive(Default)]
pub struct Striker;

impl Striker {
    /// How far behind the ball to line up
    const OFFSET: f64 = 0.15;

    pub fn new() -> Self {
        Self
    }

    fn decide(&self, obs: &SportObservation) -> SportAction {
        let car = &obs.car_self;
        let ball = &obs.ball;
        let goal_x = obs.attack_direction;

        let target = (ball.x - goal_x * Self::OFFSET, ball.y);
        let (to_target, dist_target) = aim_at(obs, target.0, target.1);
        let (_, dist_ball) = aim_at(obs, ball.x, ball.y);
        let behind = (ball.x - car.x) * goal_x > 0.0;
        let lined_up = behind && (car.y - ball.y).abs() < 0.1;
        let (to_goal, _) = aim_at(obs, goal_x, 0.0);

        let (diff, boost, dash) = if lined_up && dist_ball < 0.2 {
            (to_goal, true, dist_ball < 0.1)
        } else if dist_target < 0.05 {
            (to_goal, false, false)
        } else {
            (to_target, dist_target > 0.3 && car.boost > 0.3, false)
        };

        let want = SportAction {
            throttle: 1,
            steer: steer_for(diff),
            boost: boost && diff.abs() < 0.3,
            dash,
        };
        legal_sport(&obs.valid_actions, want)
    }
}

impl Agent for Striker {
    fn name(&self) -> &str {
        "striker"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        Action::Sport(sport_obs(observation).map_or_else(SportAction::default, |o| self.decide(o)))
    }
}
