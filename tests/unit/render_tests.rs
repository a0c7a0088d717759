use std::collections::HashMap;

use lineup::models::vote::VoterInfo;
use lineup::orchestrator::render::{
    format_queue_text, format_results_text, queue_buttons, shuffle, QUEUE_JOIN_ACTION,
    QUEUE_LEAVE_ACTION,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn voter(id: &str, username: &str) -> VoterInfo {
    VoterInfo {
        user_id: id.to_owned(),
        username: username.to_owned(),
        name: String::new(),
    }
}

#[test]
fn results_list_every_voter_in_order() {
    let text = format_results_text("Standup", &[voter("A", "ann"), voter("B", "bob")]);
    assert_eq!(text, "*Results for: Standup*\n\n1. @ann\n2. @bob");
}

#[test]
fn queue_text_follows_given_order() {
    let users = HashMap::from([
        ("A".to_owned(), voter("A", "ann")),
        ("B".to_owned(), voter("B", "bob")),
    ]);
    let text = format_queue_text("Lab", &["B".to_owned(), "A".to_owned()], &users);
    assert_eq!(text, "*Results for: Lab*\n\n1. @bob\n2. @ann");
}

#[test]
fn buttons_carry_poll_id() {
    let buttons = queue_buttons("P1");
    assert_eq!(buttons[0].action_id, QUEUE_JOIN_ACTION);
    assert_eq!(buttons[1].action_id, QUEUE_LEAVE_ACTION);
    assert!(buttons.iter().all(|b| b.value == "P1"));
}

#[test]
fn shuffle_is_a_permutation() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut items: Vec<u32> = (0..50).collect();
    shuffle(&mut items, &mut rng);
    let mut sorted = items.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, (0..50).collect::<Vec<_>>());

    let mut empty: Vec<u32> = Vec::new();
    shuffle(&mut empty, &mut rng);
    let mut single = vec![1];
    shuffle(&mut single, &mut rng);
    assert_eq!(single, vec![1]);
}

#[test]
fn every_permutation_is_roughly_equally_likely() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut counts: HashMap<Vec<u8>, u32> = HashMap::new();
    let rounds = 60_000;
    for _ in 0..rounds {
        let mut items = vec![0_u8, 1, 2];
        shuffle(&mut items, &mut rng);
        *counts.entry(items).or_default() += 1;
    }

    assert_eq!(counts.len(), 6);
    let expected = f64::from(rounds) / 6.0;
    for (permutation, count) in counts {
        let deviation = (f64::from(count) - expected).abs() / expected;
        assert!(deviation < 0.05, "{permutation:?} seen {count} times");
    }
}
