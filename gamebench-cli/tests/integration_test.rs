//! Integration tests for the GameBench harness
//!
//! Tests the full stack: environments, agents, anti-cheat, match runner,
//! ELO and tournaments

use gamebench_arena::{
    run_tournament, AntiCheatConfig, EloTable, Entrant, MatchConfig, MatchResult, MatchRunner,
    TimeBudget, TournamentConfig, ViolationKind,
};
use gamebench_core::events::EventKind;
use gamebench_core::tactical::{RoundEndReason, Team};
use gamebench_core::{
    Action, Agent, AgentKind, Environment, GameConfig, GameId, MemberOrder, Observation,
    PerSide, Side, SportAction, StrategyAction, TacticalAction,
};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

// ============================================================================
// TEST FIXTURES
// ============================================================================

/// Always answers with an action from another game
struct Cheater;

impl Agent for Cheater {
    fn name(&self) -> &str {
        "cheater"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Sport(_) => Action::Strategy(StrategyAction::Noop),
            _ => Action::Sport(SportAction::default()),
        }
    }
}

/// Does nothing, legally
struct Idle;

impl Agent for Idle {
    fn name(&self) -> &str {
        "idle"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        match observation {
            Observation::Sport(_) => Action::Sport(SportAction::default()),
            Observation::Strategy(_) => Action::Strategy(StrategyAction::Noop),
            Observation::Tactical(o) => {
                Action::Tactical(TacticalAction::new(vec![MemberOrder::hold(); o.members.len()]))
            }
        }
    }
}

struct Crasher;

impl Agent for Crasher {
    fn name(&self) -> &str {
        "crasher"
    }

    fn act(&mut self, observation: &Observation) -> Action {
        if observation.tick() >= 3 {
            panic!("crasher gives up");
        }
        Idle.act(observation)
    }
}

/// Deterministic timing for every test
fn untimed(config: MatchConfig) -> MatchConfig {
    config.with_anticheat(AntiCheatConfig::default().with_time_budget(TimeBudget::Unlimited))
}

fn play(config: MatchConfig, a: &mut dyn Agent, b: &mut dyn Agent, seed: u64) -> MatchResult {
    MatchRunner::new(untimed(config)).unwrap().run(a, b, seed).unwrap()
}

fn builtin(kind: AgentKind, side: Side) -> Box<dyn Agent> {
    kind.create_agent(side, side.index() as u64 + 1)
}

// ============================================================================
// DETERMINISM
// ============================================================================

#[test]
fn test_sport_seed_42_reproducible() {
    let run = || {
        let mut a = builtin(AgentKind::Striker, Side::Player1);
        let mut b = builtin(AgentKind::Striker, Side::Player2);
        let config = MatchConfig::for_game(GameId::Sport).with_max_ticks(600);
        play(config, a.as_mut(), b.as_mut(), 42)
    };
    let first = run();
    let second = run();
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert!(first.ticks <= 600);
}

#[test]
fn test_replayed_actions_reproduce_trajectory() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    for game in GameId::ALL {
        let seed: u64 = rng.gen();
        let config = MatchConfig::for_game(game).with_max_ticks(200).with_replay();
        let mut a = builtin(AgentKind::Random, Side::Player1);
        let mut b = builtin(AgentKind::Random, Side::Player2);
        let recorded = play(config, a.as_mut(), b.as_mut(), seed);

        // drive a fresh environment with the recorded actions
        let mut env = GameConfig::default_for(game).build().unwrap();
        env.reset(seed);
        let mut events = Vec::new();
        for frame in &recorded.replay {
            let step = env.step(&frame.actions).unwrap();
            assert_eq!(step.info.tick, frame.tick);
            events.extend(step.info.events);
        }
        assert_eq!(events, recorded.events, "{game}");
        assert_eq!(env.scores(), recorded.final_scores, "{game}");
    }
}

#[test]
fn test_every_game_finishes_with_baselines() {
    for game in GameId::ALL {
        let kind = AgentKind::baseline(game);
        let mut a = builtin(kind, Side::Player1);
        let mut b = builtin(kind, Side::Player2);
        let result = play(MatchConfig::for_game(game), a.as_mut(), b.as_mut(), 7);
        assert!(!result.truncated, "{game} hit the ceiling");
        assert!(result.anticheat.is_clean(), "{game}: {:?}", result.anticheat);
    }
}

// ============================================================================
// GAME SCENARIOS
// ============================================================================

#[test]
fn test_tactical_fuse_resolution() {
    let mut a = builtin(AgentKind::Squad, Side::Player1);
    let mut b = builtin(AgentKind::Squad, Side::Player2);
    let result = play(MatchConfig::for_game(GameId::Tactical), a.as_mut(), b.as_mut(), 13);

    for (i, plant) in result.events.iter().enumerate() {
        if plant.type_name() != "bomb_plant" {
            continue;
        }
        let round_end = result.events[i..]
            .iter()
            .find(|e| e.type_name() == "round_end")
            .unwrap();
        if let EventKind::RoundEnd {
            winner,
            reason: RoundEndReason::BombExploded,
            ..
        } = &round_end.kind
        {
            assert_eq!(round_end.tick, plant.tick + 40);
            assert_eq!(*winner, Team::T);
            assert!(result
                .events
                .iter()
                .any(|e| e.type_name() == "bomb_explode" && e.tick == plant.tick + 40));
        }
    }
}

#[test]
fn test_rush_beats_idle_from_either_seat() {
    for seat in Side::BOTH {
        let mut rush = builtin(AgentKind::Rush, seat);
        let mut idle = Idle;
        let config = MatchConfig::for_game(GameId::Strategy);
        let result = match seat {
            Side::Player1 => play(config, rush.as_mut(), &mut idle, 300),
            Side::Player2 => play(config, &mut idle, rush.as_mut(), 300),
        };
        assert_eq!(result.winner_name(), Some("rush"));
        assert!(result.ticks <= 600);
    }
}

#[test]
fn test_goal_events_mirror_log() {
    let mut a = builtin(AgentKind::Striker, Side::Player1);
    let mut b = builtin(AgentKind::Goalie, Side::Player2);
    let result = play(MatchConfig::for_game(GameId::Sport), a.as_mut(), b.as_mut(), 5);
    let goals: Vec<_> = result.events.iter().filter(|e| e.is_goal()).cloned().collect();
    assert_eq!(goals, result.goal_events);
    assert_eq!(
        goals.len() as u32,
        result.final_scores.player_1 + result.final_scores.player_2
    );
}

// ============================================================================
// ANTI-CHEAT
// ============================================================================

#[test]
fn test_cheater_is_disqualified_in_every_game() {
    for game in GameId::ALL {
        let mut honest = builtin(AgentKind::Random, Side::Player2);
        let result = play(MatchConfig::for_game(game), &mut Cheater, honest.as_mut(), 1);

        assert_eq!(result.winner, Some(Side::Player2), "{game}");
        assert!(result.anticheat.is_disqualified("cheater"));
        assert_eq!(result.anticheat.violations_for("cheater"), 10);

        // violations accrue one per tick
        let ticks: Vec<u32> = result.anticheat.violations.iter().map(|v| v.tick).collect();
        assert!(ticks.windows(2).all(|w| w[0] < w[1]));
        assert!(result
            .anticheat
            .violations
            .iter()
            .all(|v| v.kind == ViolationKind::InvalidAction && v.side == Side::Player1));
        assert_eq!(result.events.last().unwrap().type_name(), "disqualified");
    }
}

#[test]
fn test_panicking_agent_cannot_crash_match() {
    let mut honest = builtin(AgentKind::Rush, Side::Player1);
    let config = MatchConfig::for_game(GameId::Strategy)
        .with_anticheat(AntiCheatConfig::default().with_max_violations(2));
    let result = play(config, honest.as_mut(), &mut Crasher, 4);
    assert_eq!(result.winner_name(), Some("rush"));
    assert_eq!(result.ticks, 4);
    assert!(result
        .anticheat
        .violations
        .iter()
        .all(|v| v.kind == ViolationKind::AgentPanic));
}

// ============================================================================
// ELO
// ============================================================================

#[test]
fn test_elo_moves_after_decisive_match() {
    let mut honest = builtin(AgentKind::Random, Side::Player1);
    let result = play(MatchConfig::for_game(GameId::Strategy), honest.as_mut(), &mut Cheater, 2);
    assert_eq!(result.winner_name(), Some("random"));

    let mut table = EloTable::new();
    table.ensure("random").rating = 1500.0;
    table.ensure("cheater").rating = 1100.0;
    table.update(
        result.agent_on(Side::Player1),
        result.agent_on(Side::Player2),
        result.outcome().score_for(Side::Player1),
    );
    assert!(table.rating("random") > 1500.0);
    assert!(table.rating("cheater") < 1100.0);
}

// ============================================================================
// TOURNAMENTS
// ============================================================================

fn sport_tournament(matches: usize) -> TournamentConfig {
    let game = untimed(MatchConfig::for_game(GameId::Sport).with_max_ticks(300));
    TournamentConfig::new(game)
        .with_matches_per_pair(matches)
        .with_seed(42)
}

fn sport_entrants() -> Vec<Entrant> {
    vec![
        Entrant::builtin(AgentKind::Striker),
        Entrant::builtin(AgentKind::Goalie),
        Entrant::builtin(AgentKind::BallChaser),
    ]
}

#[test]
fn test_side_swap_fairness() {
    let (result, _) = run_tournament(&sport_tournament(4), &sport_entrants(), EloTable::new()).unwrap();
    assert_eq!(result.total_matches, 12);

    for record in &result.matchups {
        let games: Vec<&MatchResult> = result
            .matches
            .iter()
            .filter(|m| {
                let pair = [m.agent_a.as_str(), m.agent_b.as_str()];
                pair.contains(&record.agent_a.as_str()) && pair.contains(&record.agent_b.as_str())
            })
            .collect();
        assert_eq!(games.len(), 4);
        let a_first = games.iter().filter(|m| m.agent_a == record.agent_a).count();
        assert_eq!(a_first, 2);
    }
}

#[test]
fn test_tournament_reproducible_across_modes() {
    let entrants = sport_entrants();
    let config = sport_tournament(2);
    let (par, par_table) =
        run_tournament(&config.clone().with_parallel(true), &entrants, EloTable::new()).unwrap();
    let (seq, seq_table) =
        run_tournament(&config.with_parallel(false), &entrants, EloTable::new()).unwrap();
    assert_eq!(
        serde_json::to_value(&par).unwrap(),
        serde_json::to_value(&seq).unwrap()
    );
    assert_eq!(par_table, seq_table);
}

#[test]
fn test_ratings_carry_across_tournaments() {
    let entrants = sport_entrants();
    let config = sport_tournament(2);
    let (_, table) = run_tournament(&config, &entrants, EloTable::new()).unwrap();
    let (second, table) = run_tournament(&config.with_seed(43), &entrants, table).unwrap();

    let games: u32 = table.ratings.values().map(|r| r.games_played()).sum();
    assert_eq!(games, 24);
    assert_eq!(second.leaderboard, table.leaderboard());
}

#[test]
fn test_tournament_json_shape() {
    let entrants = vec![
        Entrant::builtin(AgentKind::Rush),
        Entrant::builtin(AgentKind::Economy),
    ];
    let game = untimed(MatchConfig::for_game(GameId::Strategy).with_max_ticks(100));
    let config = TournamentConfig::new(game).with_matches_per_pair(2);
    let (result, _) = run_tournament(&config, &entrants, EloTable::new()).unwrap();

    let value = serde_json::to_value(&result).unwrap();
    assert_eq!(value["total_matches"], 2);
    assert_eq!(value["side_swap"], true);
    assert_eq!(value["aborted"], false);
    assert_eq!(value["matches"].as_array().unwrap().len(), 2);
    assert!(value["leaderboard"][0][0].is_string());
    assert!(value["leaderboard"][0][1]["rating"].is_number());
    assert!(value["side_balance"]["player_1_wins"].is_number());
    assert!(value["event_totals"].is_object());
}

#[test]
fn test_closure_entrant_plays_any_game() {
    for game in GameId::ALL {
        let entrants = vec![
            Entrant::new("idle", |_side: Side, _seed: u64| -> Box<dyn Agent> { Box::new(Idle) }),
            Entrant::builtin(AgentKind::Random),
        ];
        let match_config = untimed(MatchConfig::for_game(game).with_max_ticks(50));
        let config = TournamentConfig::new(match_config).with_matches_per_pair(2);
        let (result, _) = run_tournament(&config, &entrants, EloTable::new()).unwrap();
        assert_eq!(result.total_matches, 2);
        assert!(result.matches.iter().all(|m| m.anticheat.is_clean()));
    }
}

#[test]
fn test_per_side_observations_share_tick() {
    let mut env = GameConfig::default_for(GameId::Tactical).build().unwrap();
    let obs = env.reset(3);
    let ticks = PerSide::from_fn(|side| obs[side].tick());
    assert_eq!(ticks, PerSide::new(0, 0));
}
