//! Anti-cheat: timing and validation of agent decisions
//!
//! Level 3 - Steps
//!
//! One [`ActionValidator`] lives for exactly one match. It calls the agent,
//! times the call against the configured budget, and replaces anything late,
//! illegal or panicking with the side's no-op. Every replacement is recorded
//! as a violation; enough of them disqualify the agent. The validator only
//! reads the environment, never steps it.

use gamebench_core::{Action, Agent, Environment, Observation, PerSide, Side};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::AntiCheatConfig;

// ============================================================================
// CLOCKS
// ============================================================================

/// Monotonic time source. The validator is the only reader.
pub trait Clock: Send + Sync {
    /// Time since an arbitrary fixed origin
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Shared with test agents through an
/// `Arc` so they can simulate slow decisions.
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        let nanos = u64::try_from(by.as_nanos()).unwrap_or(u64::MAX);
        self.nanos.fetch_add(nanos, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.nanos.load(Ordering::SeqCst))
    }
}

// ============================================================================
// REPORT
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Timeout,
    InvalidAction,
    AgentPanic,
}

/// One neutralized decision
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    pub side: Side,
    pub agent: String,
    pub tick: u32,
    pub kind: ViolationKind,
}

/// Per-match record of rejected decisions
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AntiCheatReport {
    /// Agents disqualified, in the order it happened
    pub disqualified: Vec<String>,
    /// Timeout violations per agent
    pub timeouts: BTreeMap<String, u32>,
    /// Violations of any kind per agent
    pub violation_counts: BTreeMap<String, u32>,
    pub violations: Vec<Violation>,
}

impl AntiCheatReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn timeouts_for(&self, agent: &str) -> u32 {
        self.timeouts.get(agent).copied().unwrap_or(0)
    }

    pub fn violations_for(&self, agent: &str) -> u32 {
        self.violation_counts.get(agent).copied().unwrap_or(0)
    }

    pub fn is_disqualified(&self, agent: &str) -> bool {
        self.disqualified.iter().any(|a| a == agent)
    }
}

// ============================================================================
// VALIDATOR
// ============================================================================

pub struct ActionValidator {
    config: AntiCheatConfig,
    clock: Arc<dyn Clock>,
    /// Report keys for each seat
    labels: PerSide<String>,
    counts: PerSide<u32>,
    disqualified: PerSide<bool>,
    report: AntiCheatReport,
}

impl ActionValidator {
    pub fn new(config: AntiCheatConfig, clock: Arc<dyn Clock>, labels: PerSide<String>) -> Self {
        Self {
            config,
            clock,
            labels,
            counts: PerSide::default(),
            disqualified: PerSide::default(),
            report: AntiCheatReport::default(),
        }
    }

    /// Ask `agent` for its action and return what the environment should
    /// actually receive for `side` this tick
    ///
    /// A disqualified agent is not consulted again.
    pub fn decide<E>(
        &mut self,
        env: &E,
        side: Side,
        agent: &mut dyn Agent,
        observation: &Observation,
    ) -> Action
    where
        E: Environment<Action = Action, Observation = Observation>,
    {
        if self.disqualified[side] {
            return env.noop(side);
        }

        let started = self.clock.now();
        let outcome = catch_unwind(AssertUnwindSafe(|| agent.act(observation)));
        let elapsed = self.clock.now().saturating_sub(started);

        let verdict = match outcome {
            Err(_) => Err(ViolationKind::AgentPanic),
            Ok(_) if self.config.time_budget.exceeded_by(elapsed) => Err(ViolationKind::Timeout),
            Ok(action) if env.is_valid_action(side, &action) => Ok(action),
            Ok(_) => Err(ViolationKind::InvalidAction),
        };

        match verdict {
            Ok(action) => action,
            Err(kind) => {
                self.record(side, env.tick(), kind);
                env.noop(side)
            }
        }
    }

    fn record(&mut self, side: Side, tick: u32, kind: ViolationKind) {
        let agent = self.labels[side].clone();
        debug!("Violation at tick {}: {} ({}) {:?}", tick, agent, side, kind);

        self.counts[side] += 1;
        *self.report.violation_counts.entry(agent.clone()).or_insert(0) += 1;
        if kind == ViolationKind::Timeout {
            *self.report.timeouts.entry(agent.clone()).or_insert(0) += 1;
        }
        self.report.violations.push(Violation {
            side,
            agent: agent.clone(),
            tick,
            kind,
        });

        let count = self.counts[side];
        let limit_hit = count >= self.config.max_violations || (self.config.strict && count > 0);
        if limit_hit && !self.disqualified[side] {
            warn!(
                "Disqualified {} ({}) at tick {} after {} violations",
                agent, side, tick, count
            );
            self.disqualified[side] = true;
            self.report.disqualified.push(agent);
        }
    }

    pub fn is_disqualified(&self, side: Side) -> bool {
        self.disqualified[side]
    }

    pub fn violation_count(&self, side: Side) -> u32 {
        self.counts[side]
    }

    pub fn report(&self) -> &AntiCheatReport {
        &self.report
    }

    /// Freeze the report at match end
    pub fn into_report(self) -> AntiCheatReport {
        self.report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TimeBudget;
    use gamebench_core::{
        GameConfig, GameEnv, GameId, RandomAgent, SportAction, StrategyAction,
    };

    /// Always answers with an action from the wrong game
    struct ForeignAgent;

    impl Agent for ForeignAgent {
        fn name(&self) -> &str {
            "foreign"
        }

        fn act(&mut self, _observation: &Observation) -> Action {
            Action::Sport(SportAction::default())
        }
    }

    struct PanicAgent;

    impl Agent for PanicAgent {
        fn name(&self) -> &str {
            "panic"
        }

        fn act(&mut self, _observation: &Observation) -> Action {
            panic!("agent blew up");
        }
    }

    /// Legal but slow: burns `delay` of manual-clock time per decision
    struct SlowAgent {
        clock: Arc<ManualClock>,
        delay: Duration,
    }

    impl Agent for SlowAgent {
        fn name(&self) -> &str {
            "slow"
        }

        fn act(&mut self, _observation: &Observation) -> Action {
            self.clock.advance(self.delay);
            Action::Strategy(StrategyAction::Noop)
        }
    }

    fn strategy_env() -> (GameEnv, PerSide<Observation>) {
        let mut env = GameConfig::default_for(GameId::Strategy).build().unwrap();
        let obs = env.reset(4);
        (env, obs)
    }

    fn validator(config: AntiCheatConfig, clock: Arc<dyn Clock>) -> ActionValidator {
        let labels = PerSide::new("alpha".to_string(), "beta".to_string());
        ActionValidator::new(config, clock, labels)
    }

    #[test]
    fn test_legal_action_passes_through() {
        let (env, obs) = strategy_env();
        let mut v = validator(AntiCheatConfig::default(), Arc::new(ManualClock::new()));
        let mut agent = RandomAgent::new(1);
        let action = v.decide(&env, Side::Player1, &mut agent, &obs.player_1);
        assert!(env.is_valid_action(Side::Player1, &action));
        assert!(v.report().is_clean());
    }

    #[test]
    fn test_invalid_action_becomes_noop() {
        let (env, obs) = strategy_env();
        let mut v = validator(AntiCheatConfig::default(), Arc::new(ManualClock::new()));
        let action = v.decide(&env, Side::Player2, &mut ForeignAgent, &obs.player_2);
        assert_eq!(action, env.noop(Side::Player2));
        assert_eq!(env.tick(), 0);

        let report = v.report();
        assert_eq!(report.violations.len(), 1);
        assert_eq!(report.violations[0].kind, ViolationKind::InvalidAction);
        assert_eq!(report.violations[0].agent, "beta");
        assert_eq!(report.violations_for("beta"), 1);
        assert_eq!(report.timeouts_for("beta"), 0);
    }

    #[test]
    fn test_timeout_with_manual_clock() {
        let (env, obs) = strategy_env();
        let clock = Arc::new(ManualClock::new());
        let mut v = validator(AntiCheatConfig::default(), clock.clone());

        let mut fast = SlowAgent {
            clock: clock.clone(),
            delay: Duration::from_millis(30),
        };
        v.decide(&env, Side::Player1, &mut fast, &obs.player_1);
        assert!(v.report().is_clean());

        let mut slow = SlowAgent {
            clock,
            delay: Duration::from_millis(31),
        };
        let action = v.decide(&env, Side::Player1, &mut slow, &obs.player_1);
        assert_eq!(action, env.noop(Side::Player1));
        assert_eq!(v.report().timeouts_for("alpha"), 1);
        assert_eq!(v.report().violations[0].kind, ViolationKind::Timeout);
    }

    #[test]
    fn test_unlimited_budget_never_times_out() {
        let (env, obs) = strategy_env();
        let clock = Arc::new(ManualClock::new());
        let config = AntiCheatConfig::default().with_time_budget(TimeBudget::Unlimited);
        let mut v = validator(config, clock.clone());
        let mut slow = SlowAgent {
            clock,
            delay: Duration::from_secs(60),
        };
        v.decide(&env, Side::Player1, &mut slow, &obs.player_1);
        assert!(v.report().is_clean());
    }

    #[test]
    fn test_panic_is_contained() {
        let (env, obs) = strategy_env();
        let mut v = validator(AntiCheatConfig::default(), Arc::new(ManualClock::new()));
        let action = v.decide(&env, Side::Player1, &mut PanicAgent, &obs.player_1);
        assert_eq!(action, env.noop(Side::Player1));
        assert_eq!(v.report().violations[0].kind, ViolationKind::AgentPanic);
    }

    #[test]
    fn test_repeated_violations_disqualify() {
        let (env, obs) = strategy_env();
        let config = AntiCheatConfig::default().with_max_violations(3);
        let mut v = validator(config, Arc::new(ManualClock::new()));

        let mut last = 0;
        for _ in 0..3 {
            assert!(!v.is_disqualified(Side::Player1));
            v.decide(&env, Side::Player1, &mut ForeignAgent, &obs.player_1);
            assert!(v.violation_count(Side::Player1) > last);
            last = v.violation_count(Side::Player1);
        }
        assert!(v.is_disqualified(Side::Player1));
        assert!(!v.is_disqualified(Side::Player2));

        // no longer consulted, so no further violations
        v.decide(&env, Side::Player1, &mut ForeignAgent, &obs.player_1);
        assert_eq!(v.violation_count(Side::Player1), 3);
        assert_eq!(v.into_report().disqualified, vec!["alpha".to_string()]);
    }

    #[test]
    fn test_strict_mode_disqualifies_immediately() {
        let (env, obs) = strategy_env();
        let mut v = validator(AntiCheatConfig::default().strict(), Arc::new(ManualClock::new()));
        v.decide(&env, Side::Player2, &mut ForeignAgent, &obs.player_2);
        assert!(v.is_disqualified(Side::Player2));
    }

    #[test]
    fn test_report_json_shape() {
        let (env, obs) = strategy_env();
        let mut v = validator(AntiCheatConfig::default(), Arc::new(ManualClock::new()));
        v.decide(&env, Side::Player1, &mut ForeignAgent, &obs.player_1);
        let value = serde_json::to_value(v.report()).unwrap();
        assert_eq!(value["violations"][0]["kind"], "invalid_action");
        assert_eq!(value["violations"][0]["side"], "player_1");
        assert_eq!(value["violation_counts"]["alpha"], 1);
        assert!(value["timeouts"].as_object().unwrap().is_empty());
    }
}
