//! ELO rating table
//!
//! Level 4 - Utilities

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Starting rating for agents seen for the first time
pub const DEFAULT_RATING: f64 = 1200.0;

/// K-factor for rating updates
pub const K_FACTOR: f64 = 32.0;

/// Rating and record of one agent
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EloRating {
    pub rating: f64,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
}

impl EloRating {
    pub fn new(rating: f64) -> Self {
        Self {
            rating,
            wins: 0,
            losses: 0,
            draws: 0,
        }
    }

    pub fn games_played(&self) -> u32 {
        self.wins + self.losses + self.draws
    }

    pub fn win_rate(&self) -> f64 {
        match self.games_played() {
            0 => 0.0,
            n => self.wins as f64 / n as f64,
        }
    }

    fn record(&mut self, score: f64) {
        if score > 0.5 {
            self.wins += 1;
        } else if score < 0.5 {
            self.losses += 1;
        } else {
            self.draws += 1;
        }
    }
}

/// Expected score of a player rated `rating_a` against `rating_b`
pub fn expected_score(rating_a: f64, rating_b: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((rating_b - rating_a) / 400.0))
}

/// Agent name to rating. Entries are created on first appearance and never
/// removed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EloTable {
    pub k_factor: f64,
    pub initial_rating: f64,
    pub ratings: BTreeMap<String, EloRating>,
}

impl Default for EloTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EloTable {
    pub fn new() -> Self {
        Self {
            k_factor: K_FACTOR,
            initial_rating: DEFAULT_RATING,
            ratings: BTreeMap::new(),
        }
    }

    pub fn with_k_factor(mut self, k_factor: f64) -> Self {
        self.k_factor = k_factor;
        self
    }

    pub fn with_initial_rating(mut self, initial_rating: f64) -> Self {
        self.initial_rating = initial_rating;
        self
    }

    pub fn get(&self, name: &str) -> Option<&EloRating> {
        self.ratings.get(name)
    }

    /// Current rating, or the initial rating for an unknown agent
    pub fn rating(&self, name: &str) -> f64 {
        self.get(name).map_or(self.initial_rating, |r| r.rating)
    }

    /// Register an agent if it is not already rated
    pub fn ensure(&mut self, name: &str) -> &mut EloRating {
        let initial = self.initial_rating;
        self.ratings
            .entry(name.to_string())
            .or_insert_with(|| EloRating::new(initial))
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    /// Apply one match result. `score_a` is 1.0, 0.5 or 0.0 from
    /// `player_a`'s point of view. Returns the new ratings.
    pub fn update(&mut self, player_a: &str, player_b: &str, score_a: f64) -> (f64, f64) {
        let ra = self.ensure(player_a).rating;
        let rb = self.ensure(player_b).rating;
        let ea = expected_score(ra, rb);
        let eb = 1.0 - ea;
        let score_b = 1.0 - score_a;

        let new_a = ra + self.k_factor * (score_a - ea);
        let new_b = rb + self.k_factor * (score_b - eb);

        let a = self.ensure(player_a);
        a.rating = new_a;
        a.record(score_a);
        let b = self.ensure(player_b);
        b.rating = new_b;
        b.record(score_b);

        (new_a, new_b)
    }

    /// Sorted by rating, then wins, then name
    pub fn leaderboard(&self) -> Vec<(String, EloRating)> {
        let mut entries: Vec<(String, EloRating)> = self
            .ratings
            .iter()
            .map(|(name, rating)| (name.clone(), *rating))
            .collect();
        entries.sort_by(|(name_a, a), (name_b, b)| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.wins.cmp(&a.wins))
                .then_with(|| name_a.cmp(name_b))
        });
        entries
    }
}
