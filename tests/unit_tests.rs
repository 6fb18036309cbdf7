// Unit tests for the pure parts of the engine

use matchup::core::{
    expected_score, match_deltas, rating_delta, MatchSessionStore, Outcome, PairingSelector,
    SessionToken, MAX_FAIRNESS_WINDOW,
};
use matchup::models::{CandidateRecord, MutationKind};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::time::Duration;

fn record(id: i64, rating: i32) -> CandidateRecord {
    CandidateRecord {
        id,
        name: format!("Candidate {}", id),
        external_id: None,
        rating,
        wins: 0,
        losses: 0,
        rank: None,
        picture: None,
        picture_author: None,
        picture_license: None,
        known_for: None,
        desc_url: None,
    }
}

#[test]
fn test_expected_scores_sum_to_one() {
    for (a, b) in [(1000, 1000), (1000, 1400), (2100, 900)] {
        let sum = expected_score(a, b) + expected_score(b, a);
        assert!((sum - 1.0).abs() < 1e-9);
    }
}

#[test]
fn test_underdog_win_gains_more() {
    let underdog = rating_delta(1000, 1400, Outcome::FirstWins);
    let favourite = rating_delta(1400, 1000, Outcome::FirstWins);
    assert!(underdog > favourite);
    assert_eq!(underdog, 29);
    assert_eq!(favourite, 3);
}

#[test]
fn test_any_unknown_outcome_is_a_skip() {
    for wire in [-1, 2, 7, i64::MIN, i64::MAX] {
        let outcome = Outcome::from_wire(wire);
        assert_eq!(outcome, Outcome::Skipped);
        let deltas = match_deltas(1200, 1000, outcome);
        assert_eq!((deltas.first, deltas.second), (0, 0));
    }

    assert_eq!(Outcome::parse(""), Outcome::Skipped);
    assert_eq!(Outcome::parse("yes"), Outcome::Skipped);
    assert_eq!(Outcome::parse(" 1 "), Outcome::FirstWins);
}

#[test]
fn test_deltas_are_mirrored_for_second_seat() {
    let deltas = match_deltas(1000, 1200, Outcome::SecondWins);
    assert!(deltas.first < 0);
    assert!(deltas.second > 0);
    assert!((deltas.first + deltas.second).abs() <= 1);
}

#[test]
fn test_selector_regime_boundary() {
    let selector = PairingSelector::new(20);
    assert!(!selector.is_biased(39));
    assert!(selector.is_biased(40));
    assert_eq!(PairingSelector::new(0).window(), 1);
}

#[test]
fn test_selector_caps_huge_window() {
    let selector = PairingSelector::new(u64::MAX);
    assert_eq!(selector.window(), MAX_FAIRNESS_WINDOW);
    assert!(selector.is_biased(u64::MAX));

    let size = 2 * MAX_FAIRNESS_WINDOW;
    assert!(selector.is_biased(size));
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..500 {
        let (a, b) = selector.select_pair(&mut rng, size);
        assert_ne!(a, b);
        assert!((1..=size).contains(&a) && (1..=size).contains(&b));
    }
}

#[test]
fn test_selector_biased_stays_in_window() {
    let selector = PairingSelector::default();
    let mut rng = StdRng::seed_from_u64(3);

    for size in [40u64, 41, 100, 1000] {
        for _ in 0..2000 {
            let (a, b) = selector.select_pair(&mut rng, size);
            assert_ne!(a, b);
            assert!((1..=size).contains(&a));
            assert!((1..=size).contains(&b));
            assert!(a.abs_diff(b) <= 39);
        }
    }
}

#[test]
fn test_session_round_trip() {
    let store = MatchSessionStore::new(Duration::from_secs(60));
    let token = store.create_session(&record(1, 1000), &record(2, 1100), Some("v".to_string()));

    assert!(store.has_session(&token));
    let session = store.resolve_session(&token).unwrap();
    assert_eq!(session.candidates, [1, 2]);
    assert_eq!(session.ratings, [1000, 1100]);
    assert_eq!(session.voter.as_deref(), Some("v"));

    assert!(store.resolve_session(&token).is_none());
    assert!(store.is_empty());
}

#[test]
fn test_unknown_token_is_absent_twice() {
    let store = MatchSessionStore::new(Duration::from_secs(60));
    let token: SessionToken = "0f8fad5b-d9cb-469f-a165-70867728950e".parse().unwrap();

    assert!(store.resolve_session(&token).is_none());
    assert!(store.resolve_session(&token).is_none());
}

#[test]
fn test_tokens_are_unique() {
    let store = MatchSessionStore::new(Duration::from_secs(60));
    let a = store.create_session(&record(1, 1000), &record(2, 1000), None);
    let b = store.create_session(&record(1, 1000), &record(2, 1000), None);

    assert_ne!(a, b);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_mutation_kind_strings() {
    assert_eq!("add".parse::<MutationKind>().unwrap(), MutationKind::Add);
    assert_eq!(MutationKind::Remove.as_str(), "remove");
    assert!("move".parse::<MutationKind>().is_err());
}

#[test]
fn test_outcome_serializes_by_name() {
    let json = serde_json::to_string(&Outcome::FirstWins).unwrap();
    assert_eq!(json, "\"FIRST_WINS\"");
}
