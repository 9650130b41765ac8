//! Match runner - plays a single match between two agents
//!
//! Level 2 - Phase-level implementation

use gamebench_core::{
    Action, Agent, Environment, Event, EventKind, GameEnv, GameId, Outcome, PerSide, Scores, Side,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::anticheat::{ActionValidator, AntiCheatReport, Clock, SystemClock};
use crate::config::MatchConfig;
use crate::error::ArenaError;

/// Actions actually applied on one tick
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    pub tick: u32,
    pub actions: PerSide<Action>,
}

/// Result of a single match
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub game: GameId,
    pub seed: u64,
    /// Agent seated as player_1
    pub agent_a: String,
    /// Agent seated as player_2
    pub agent_b: String,
    pub sides: PerSide<String>,
    /// `None` for a draw
    pub winner: Option<Side>,
    pub ticks: u32,
    pub final_scores: Scores,
    /// Summed step rewards minus per-tick violation penalties
    pub rewards: PerSide<f64>,
    pub events: Vec<Event>,
    pub goal_events: Vec<Event>,
    pub anticheat: AntiCheatReport,
    /// Stopped by the tick ceiling rather than by the game
    pub truncated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub replay: Vec<ReplayFrame>,
}

impl MatchResult {
    pub fn outcome(&self) -> Outcome {
        match self.winner {
            Some(side) => Outcome::Win(side),
            None => Outcome::Draw,
        }
    }

    pub fn is_draw(&self) -> bool {
        self.winner.is_none()
    }

    /// Name of the agent seated at `side`
    pub fn agent_on(&self, side: Side) -> &str {
        &self.sides[side]
    }

    /// Winner by agent name rather than seat
    pub fn winner_name(&self) -> Option<&str> {
        self.winner.map(|side| self.agent_on(side))
    }

    /// Whether any agent was disqualified
    pub fn had_disqualification(&self) -> bool {
        !self.anticheat.disqualified.is_empty()
    }
}

/// Runs matches under one configuration
///
/// Holds a built, never-reset environment that each run clones, so a runner
/// can be shared across worker threads.
pub struct MatchRunner {
    config: MatchConfig,
    template: GameEnv,
    clock: Arc<dyn Clock>,
}

impl MatchRunner {
    /// Validate `config` and prepare the environment template
    pub fn new(config: MatchConfig) -> Result<Self, ArenaError> {
        config.validate()?;
        let template = config.game.build()?;
        Ok(Self {
            config,
            template,
            clock: Arc::new(SystemClock::new()),
        })
    }

    /// Replace the decision clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &MatchConfig {
        &self.config
    }

    pub fn game_id(&self) -> GameId {
        self.template.game_id()
    }

    /// Play `agent_a` (player_1) against `agent_b` (player_2), naming each
    /// after [`Agent::name`]
    pub fn run(
        &self,
        agent_a: &mut dyn Agent,
        agent_b: &mut dyn Agent,
        seed: u64,
    ) -> Result<MatchResult, ArenaError> {
        let names = PerSide::new(agent_a.name().to_string(), agent_b.name().to_string());
        self.run_named(names, agent_a, agent_b, seed)
    }

    /// Play a match recording the agents under the given names
    pub fn run_named(
        &self,
        names: PerSide<String>,
        agent_a: &mut dyn Agent,
        agent_b: &mut dyn Agent,
        seed: u64,
    ) -> Result<MatchResult, ArenaError> {
        agent_a.reset();
        agent_b.reset();

        let labels = report_labels(&names);
        let mut validator =
            ActionValidator::new(self.config.anticheat.clone(), self.clock.clone(), labels.clone());
        let mut env = self.template.clone();
        let mut observations = env.reset(seed);
        let mut events = Vec::new();
        let mut rewards = PerSide::new(0.0, 0.0);
        let mut replay = Vec::new();
        let mut forced = None;
        let mut truncated = false;

        while !env.is_done() {
            if env.tick() >= self.config.max_ticks {
                warn!(
                    "{} match (seed={}) hit the tick ceiling at {}",
                    env.game_id(),
                    seed,
                    env.tick()
                );
                truncated = true;
                break;
            }

            let actions = PerSide::new(
                validator.decide(&env, Side::Player1, agent_a, &observations.player_1),
                validator.decide(&env, Side::Player2, agent_b, &observations.player_2),
            );

            if let Some(outcome) = disqualification(&validator) {
                for side in Side::BOTH.into_iter().filter(|&s| validator.is_disqualified(s)) {
                    events.push(Event::new(
                        env.tick(),
                        EventKind::Disqualified {
                            side,
                            agent: labels[side].clone(),
                        },
                    ));
                }
                forced = Some(outcome);
                break;
            }

            let step = env.step(&actions)?;
            let penalty = self.config.anticheat.penalty_per_violation;
            for side in Side::BOTH {
                rewards[side] +=
                    step.rewards[side] - f64::from(validator.violation_count(side)) * penalty;
            }
            if self.config.record_replay {
                replay.push(ReplayFrame {
                    tick: step.info.tick,
                    actions,
                });
            }
            events.extend(step.info.events);
            observations = step.observations;
        }

        let outcome = forced
            .or_else(|| env.winner())
            .unwrap_or_else(|| env.score_outcome());
        let goal_events = events.iter().filter(|e| e.is_goal()).cloned().collect();

        let result = MatchResult {
            game: env.game_id(),
            seed,
            agent_a: names.player_1.clone(),
            agent_b: names.player_2.clone(),
            sides: names,
            winner: outcome.winner(),
            ticks: env.tick(),
            final_scores: env.scores(),
            rewards,
            events,
            goal_events,
            anticheat: validator.into_report(),
            truncated,
            replay,
        };

        debug!(
            "{} match (seed={}): {} vs {} -> {} in {} ticks",
            result.game,
            seed,
            result.agent_a,
            result.agent_b,
            result.winner_name().unwrap_or("draw"),
            result.ticks
        );
        Ok(result)
    }
}

/// Outcome forced by disqualification, if any. Both at once is a draw.
fn disqualification(validator: &ActionValidator) -> Option<Outcome> {
    match (
        validator.is_disqualified(Side::Player1),
        validator.is_disqualified(Side::Player2),
    ) {
        (true, true) => Some(Outcome::Draw),
        (true, false) => Some(Outcome::Win(Side::Player2)),
        (false, true) => Some(Outcome::Win(Side::Player1)),
        (false, false) => None,
    }
}

/// Anti-cheat keys: agent names, seat-qualified when both seats share one
fn report_labels(names: &PerSide<String>) -> PerSide<String> {
    if names.player_1 == names.player_2 {
        PerSide::from_fn(|side| format!("{}@{}", names[side], side))
    } else {
        names.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anticheat::ManualClock;
    use crate::config::AntiCheatConfig;
    use gamebench_core::{AgentKind, Observation, RandomAgent, SportAction};

    struct ForeignAgent;

    impl Agent for ForeignAgent {
        fn name(&self) -> &str {
            "foreign"
        }

        fn act(&mut self, _observation: &Observation) -> Action {
            Action::Sport(SportAction::default())
        }
    }

    fn runner(config: MatchConfig) -> MatchRunner {
        MatchRunner::new(config)
            .unwrap()
            .with_clock(Arc::new(ManualClock::new()))
    }

    #[test]
    fn test_sport_match_reproducible() {
        let runner = runner(MatchConfig::for_game(GameId::Sport).with_max_ticks(600));
        let play = || {
            let mut a = AgentKind::BallChaser.create_agent(Side::Player1, 0);
            let mut b = AgentKind::BallChaser.create_agent(Side::Player2, 0);
            runner.run(a.as_mut(), b.as_mut(), 42).unwrap()
        };
        let first = play();
        let second = play();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert!(first.ticks <= 600);
        assert!(first.truncated || first.ticks < 600);
        assert!(first.anticheat.is_clean());
    }

    #[test]
    fn test_agents_are_reset_between_matches() {
        let runner = runner(MatchConfig::for_game(GameId::Strategy).with_max_ticks(50));
        let mut a = RandomAgent::new(1);
        let mut b = RandomAgent::new(2);
        let first = runner.run(&mut a, &mut b, 8).unwrap();
        let second = runner.run(&mut a, &mut b, 8).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_tick_ceiling_resolves_by_score() {
        let runner = runner(MatchConfig::for_game(GameId::Sport).with_max_ticks(5));
        let mut a = RandomAgent::new(1);
        let mut b = RandomAgent::new(2);
        let result = runner.run(&mut a, &mut b, 3).unwrap();
        assert!(result.truncated);
        assert_eq!(result.ticks, 5);
        assert_eq!(result.final_scores, Scores::new(0, 0));
        assert_eq!(result.winner, None);
    }

    #[test]
    fn test_disqualification_ends_match() {
        let runner = runner(MatchConfig::for_game(GameId::Strategy));
        let mut cheat = ForeignAgent;
        let mut honest = RandomAgent::new(5);
        let result = runner.run(&mut cheat, &mut honest, 11).unwrap();

        // ten decisions on ticks 0..=9, disqualified on the tenth
        assert_eq!(result.ticks, 9);
        assert_eq!(result.winner, Some(Side::Player2));
        assert_eq!(result.winner_name(), Some("random"));
        assert!(!result.truncated);
        assert_eq!(result.anticheat.disqualified, vec!["foreign".to_string()]);
        assert_eq!(result.anticheat.violations_for("foreign"), 10);

        let last = result.events.last().unwrap();
        assert_eq!(last.tick, 9);
        assert_eq!(
            last.kind,
            EventKind::Disqualified {
                side: Side::Player1,
                agent: "foreign".to_string()
            }
        );
    }

    #[test]
    fn test_violations_reduce_rewards() {
        let play = |penalty: f64| {
            let config = MatchConfig::for_game(GameId::Strategy).with_anticheat(
                AntiCheatConfig::default().with_penalty_per_violation(penalty),
            );
            let mut honest = RandomAgent::new(5);
            runner(config).run(&mut ForeignAgent, &mut honest, 11).unwrap()
        };
        let free = play(0.0);
        let taxed = play(0.01);

        // nine steps played with 1..=9 violations on record
        let deducted = free.rewards.player_1 - taxed.rewards.player_1;
        assert!((deducted - 0.45).abs() < 1e-9, "deducted {deducted}");
        assert_eq!(free.rewards.player_2, taxed.rewards.player_2);
    }

    #[test]
    fn test_double_disqualification_is_draw() {
        let config = MatchConfig::for_game(GameId::Tactical)
            .with_anticheat(AntiCheatConfig::default().strict());
        let result = runner(config).run(&mut ForeignAgent, &mut ForeignAgent, 1).unwrap();
        assert_eq!(result.winner, None);
        assert_eq!(result.ticks, 0);
        assert_eq!(
            result.anticheat.disqualified,
            vec!["foreign@player_1".to_string(), "foreign@player_2".to_string()]
        );
        let dq = result
            .events
            .iter()
            .filter(|e| e.type_name() == "disqualified")
            .count();
        assert_eq!(dq, 2);
    }

    #[test]
    fn test_replay_records_every_tick() {
        let config = MatchConfig::for_game(GameId::Strategy)
            .with_max_ticks(20)
            .with_replay();
        let mut a = RandomAgent::new(3);
        let mut b = RandomAgent::new(4);
        let result = runner(config).run(&mut a, &mut b, 2).unwrap();
        assert_eq!(result.replay.len(), 20);
        assert_eq!(result.replay[0].tick, 1);
    }

    #[test]
    fn test_result_json_shape() {
        let runner = runner(MatchConfig::for_game(GameId::Sport).with_max_ticks(3));
        let mut a = RandomAgent::new(1);
        let mut b = AgentKind::Goalie.create_agent(Side::Player2, 0);
        let result = runner.run(&mut a, b.as_mut(), 7).unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["game"], "sport");
        assert_eq!(value["sides"]["player_1"], "random");
        assert_eq!(value["sides"]["player_2"], "goalie");
        assert!(value["winner"].is_null());
        assert_eq!(value["final_scores"]["player_1"], 0);
        assert!(value["rewards"]["player_2"].is_number());
        assert!(value.get("replay").is_none());
    }

    #[test]
    fn test_invalid_config_rejected_up_front() {
        let config = MatchConfig::for_game(GameId::Sport).with_max_ticks(0);
        assert!(matches!(MatchRunner::new(config), Err(ArenaError::Config(_))));
    }
}
