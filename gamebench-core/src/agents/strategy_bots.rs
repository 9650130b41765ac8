//! Scripted Strategy bots
//!
//! Both run the same three-phase plan (economy, military, attack) with
//! different thresholds. Desired actions that are not legal this tick fall
//! back to the standing order or a no-op.

use super::{first_legal, Agent};
use crate::env::{Action, Observation};
use crate::strategy::{StrategyAction, StrategyObservation, UnitKind, ZoneId};
use crate::types::Side;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Plan {
    Economy,
    Military,
    Attack,
}

struct Counts {
    total: usize,
    workers: usize,
    soldiers: usize,
    ranged: usize,
    barracks: usize,
}

impl Counts {
    fn of(obs: &StrategyObservation) -> Self {
        Self {
            total: obs.own_units.len(),
            workers: obs.count(UnitKind::Worker),
            soldiers: obs.count(UnitKind::Soldier),
            ranged: obs.count(UnitKind::Ranged),
            barracks: obs.count(UnitKind::Barracks),
        }
    }

    fn army(&self) -> usize {
        self.soldiers + self.ranged
    }
}

fn legal(obs: &StrategyObservation, want: StrategyAction) -> StrategyAction {
    first_legal(&obs.valid_actions, [want], StrategyAction::Noop)
}

const TRAIN_WORKER: StrategyAction = StrategyAction::Train(UnitKind::Worker);
const TRAIN_SOLDIER: StrategyAction = StrategyAction::Train(UnitKind::Soldier);
const TRAIN_RANGED: StrategyAction = StrategyAction::Train(UnitKind::Ranged);

// ============================================================================
// RUSH
// ============================================================================

/// Minimal economy, a small army, then straight at the enemy base
pub struct RushBot {
    side: Side,
    plan: Plan,
}

impl RushBot {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            plan: Plan::Economy,
        }
    }

    fn decide(&mut self, obs: &StrategyObservation) -> StrategyAction {
        let n = Counts::of(obs);
        let cash = obs.resources;

        if self.plan == Plan::Economy {
            if n.workers < 4 && cash >= 50 {
                return legal(obs, TRAIN_WORKER);
            } else if n.workers >= 4 && n.barracks == 0 && cash >= 200 {
                return legal(obs, StrategyAction::BuildBarracks);
            } else if n.barracks > 0 {
                self.plan = Plan::Military;
            }
        }

        if self.plan == Plan::Military {
            if cash >= 100 && n.soldiers < 3 {
                return legal(obs, TRAIN_SOLDIER);
            } else if cash >= 150 && n.ranged < 2 {
                return legal(obs, TRAIN_RANGED);
            } else if n.army() >= 5 {
                self.plan = Plan::Attack;
            }
        }

        if self.plan == Plan::Attack {
            if cash >= 100 && n.army() < 10 {
                let kind = if n.ranged < n.soldiers { TRAIN_RANGED } else { TRAIN_SOLDIER };
                if obs.valid_actions.contains(&kind) {
                    return kind;
                }
            }
            let target = ZoneId::home(self.side.opponent());
            return legal(obs, StrategyAction::Attack(target));
        }

        StrategyAction::Noop
    }
}

impl Agent for RushBot {
    fn name(&self) -> &str {
        "rush"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Strategy(o) => Action::Strategy(self.decide(o)),
            _ => Action::Strategy(StrategyAction::Noop),
        }
    }

    fn reset(&mut self) {
        self.plan = Plan::Economy;
    }
}

// ============================================================================
// ECONOMY
// ============================================================================

/// Fills up to 40% of the unit cap with workers, then builds an army
/// with the rest and contests mid
pub struct EconomyBot {
    side: Side,
    plan: Plan,
}

impl EconomyBot {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            plan: Plan::Economy,
        }
    }

    fn decide(&mut self, obs: &StrategyObservation) -> StrategyAction {
        let n = Counts::of(obs);
        let cash = obs.resources;
        let cap = obs.unit_cap;
        let max_workers = cap * 4 / 10;

        if self.plan == Plan::Economy {
            if n.workers < max_workers && cash >= 50 && n.total < cap {
                return legal(obs, TRAIN_WORKER);
            } else if n.workers >= max_workers / 2 && n.barracks == 0 && cash >= 200 {
                return legal(obs, StrategyAction::BuildBarracks);
            } else if n.barracks > 0 && n.workers >= max_workers / 2 {
                self.plan = Plan::Military;
            }
        }

        if self.plan == Plan::Military {
            if n.workers < max_workers && cash >= 50 && n.total < cap {
                return legal(obs, TRAIN_WORKER);
            }
            if n.total < cap {
                if cash >= 100 && n.soldiers < n.ranged + 2 {
                    return legal(obs, TRAIN_SOLDIER);
                } else if cash >= 150 {
                    return legal(obs, TRAIN_RANGED);
                }
            }
            if n.army() >= 5 {
                self.plan = Plan::Attack;
            } else {
                return legal(obs, StrategyAction::Defend(ZoneId::home(self.side)));
            }
        }

        if self.plan == Plan::Attack {
            if n.total < cap {
                let want = if n.workers < max_workers && cash >= 50 {
                    Some(TRAIN_WORKER)
                } else if cash >= 100 {
                    Some(if n.ranged < n.soldiers { TRAIN_RANGED } else { TRAIN_SOLDIER })
                } else {
                    None
                };
                if let Some(want) = want.filter(|w| obs.valid_actions.contains(w)) {
                    return want;
                }
            }
            return legal(obs, StrategyAction::Attack(ZoneId::Mid));
        }

        StrategyAction::Noop
    }
}

impl Agent for EconomyBot {
    fn name(&self) -> &str {
        "economy"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Strategy(o) => Action::Strategy(self.decide(o)),
            _ => Action::Strategy(StrategyAction::Noop),
        }
    }

    fn reset(&mut self) {
        self.plan = Plan::Economy;
    }
}
