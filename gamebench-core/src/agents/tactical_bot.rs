//! Scripted Tactical bot
//!
//! T members escort the bomb carrier to the nearest plant cell and guard the
//! bomb once it is down. CT members hold the site and go for the defuse as
//! soon as they know where the bomb is. Everyone aims at the closest visible
//! enemy and fires when it sits on the aim ray.

use super::{first_legal, Agent};
use crate::env::{Action, Observation};
use crate::geometry::Cell;
use crate::tactical::{
    Dir8, MemberOrder, MemberView, Move, Special, TacticalAction, TacticalObservation, Team,
};

/// Greedy moves toward `target`, larger axis first
fn moves_toward(from: Cell, target: Cell) -> Vec<Move> {
    let (dx, dy) = (target.x - from.x, target.y - from.y);
    let horizontal = match dx.signum() {
        1 => Some(Move::E),
        -1 => Some(Move::W),
        _ => None,
    };
    let vertical = match dy.signum() {
        1 => Some(Move::S),
        -1 => Some(Move::N),
        _ => None,
    };
    let ordered = if dx.abs() > dy.abs() {
        [horizontal, vertical]
    } else {
        [vertical, horizontal]
    };
    ordered.into_iter().flatten().collect()
}

fn nearest(from: Cell, cells: &[Cell]) -> Option<Cell> {
    cells.iter().copied().min_by_key(|c| (c.manhattan(from), c.y, c.x))
}

/// Aim and trigger against the closest visible enemy
fn engage(me: &MemberView, obs: &TacticalObservation) -> (Option<Dir8>, bool) {
    let Some(enemy) = obs.enemies.iter().min_by_key(|e| e.pos.manhattan(me.pos)) else {
        return (None, false);
    };
    let (dx, dy) = (enemy.pos.x - me.pos.x, enemy.pos.y - me.pos.y);
    let Some(dir) = Dir8::toward(dx, dy) else {
        return (None, false);
    };
    let on_ray = dx == 0 || dy == 0 || dx.abs() == dy.abs();
    let shoot = on_ray && dir.delta() == (dx.signum(), dy.signum()) && me.ammo > 0;
    (Some(dir), shoot)
}

/// Squad-level scripted play for either team
#[derive(Default)]
pub struct SquadBot;

impl SquadBot {
    pub fn new() -> Self {
        Self
    }

    fn member_order(&self, idx: usize, me: &MemberView, obs: &TacticalObservation) -> MemberOrder {
        let legal = obs.legal_orders.get(idx).map(Vec::as_slice).unwrap_or(&[]);
        if !me.alive || me.blind_ticks > 0 {
            return MemberOrder::hold();
        }
        let (aim, shoot) = engage(me, obs);

        let (target, special) = match obs.team {
            Team::T => self.t_goal(idx, me, obs),
            Team::CT => self.ct_goal(me, obs),
        };

        let mut candidates = Vec::new();
        if let Some(special) = special {
            candidates.push(MemberOrder {
                movement: Move::Stay,
                aim,
                shoot,
                special: Some(special),
            });
        }
        let moves = target.map(|t| moves_toward(me.pos, t)).unwrap_or_default();
        for &movement in moves.iter().chain(std::iter::once(&Move::Stay)) {
            candidates.push(MemberOrder {
                movement,
                aim,
                shoot,
                special: None,
            });
        }
        candidates.push(MemberOrder {
            aim,
            ..MemberOrder::hold()
        });
        first_legal(legal, candidates, MemberOrder::hold())
    }

    /// Where a T member heads, and whether it should plant
    fn t_goal(
        &self,
        idx: usize,
        me: &MemberView,
        obs: &TacticalObservation,
    ) -> (Option<Cell>, Option<Special>) {
        if obs.bomb.planted {
            return (obs.bomb.position, None);
        }
        if me.has_bomb {
            if obs.plant_cells.contains(&me.pos) {
                return (None, Some(Special::Plant));
            }
            return (nearest(me.pos, &obs.plant_cells), None);
        }
        match (obs.bomb.carrier, obs.bomb.position) {
            // escort the carrier
            (Some(carrier), Some(pos)) if carrier != idx => (Some(pos), None),
            // loose bomb: go pick it up
            (None, Some(pos)) => (Some(pos), None),
            _ => (nearest(me.pos, &obs.plant_cells), None),
        }
    }

    fn ct_goal(&self, me: &MemberView, obs: &TacticalObservation) -> (Option<Cell>, Option<Special>) {
        match (obs.bomb.planted, obs.bomb.position) {
            (true, Some(bomb)) if bomb.chebyshev(me.pos) <= 1 => (None, Some(Special::Defuse)),
            (true, Some(bomb)) => (Some(bomb), None),
            _ => (nearest(me.pos, &obs.plant_cells), None),
        }
    }

    fn decide(&self, obs: &TacticalObservation) -> TacticalAction {
        TacticalAction::new(
            obs.members
                .iter()
                .enumerate()
                .map(|(idx, me)| self.member_order(idx, me, obs))
                .collect(),
        )
    }
}

impl Agent for SquadBot {
    fn name(&self) -> &str {
        "squad"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Tactical(o) => Action::Tactical(self.decide(o)),
            _ => Action::Tactical(TacticalAction::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::{Environment, GameConfig};
    use crate::types::{GameId, PerSide, Side};

    #[test]
    fn test_moves_toward_prefers_long_axis() {
        assert_eq!(
            moves_toward(Cell::new(0, 0), Cell::new(5, -2)),
            vec![Move::E, Move::N]
        );
        assert_eq!(moves_toward(Cell::new(3, 3), Cell::new(3, 3)), Vec::<Move>::new());
    }

    #[test]
    fn test_squad_plays_full_match_legally() {
        let mut env = GameConfig::default_for(GameId::Tactical).build().unwrap();
        let mut obs = env.reset(21);
        let mut t = SquadBot::new();
        let mut ct = SquadBot::new();
        let mut rounds = 0;
        for _ in 0..2_000 {
            let actions = PerSide::new(t.act(&obs.player_1), ct.act(&obs.player_2));
            assert!(env.is_valid_action(Side::Player1, &actions.player_1));
            assert!(env.is_valid_action(Side::Player2, &actions.player_2));
            let step = env.step(&actions).unwrap();
            rounds += step.info.events.iter().filter(|e| e.type_name() == "round_end").count();
            if step.done {
                break;
            }
            obs = step.observations;
        }
        assert!(env.is_done());
        assert!(rounds >= 3);
    }
}
