//! Random term sets and seeks compared against a `BTreeSet`.

mod common;

use std::collections::BTreeSet;
use std::ops::Bound;

use blocktree::automaton::CompiledAutomaton;
use blocktree::blocktree::{BlockTreeConfig, SeekStatus, SeekTermsEnum, Terms, TermsEnum};
use blocktree::error::Result;
use blocktree::storage::MemoryStorage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use common::*;

/// Short terms over a small alphabet, so prefixes are heavily shared.
fn random_term(rng: &mut StdRng) -> Vec<u8> {
    let len = rng.random_range(1..=8);
    (0..len).map(|_| b"abcde\xff"[rng.random_range(0..6)]).collect()
}

fn random_config(rng: &mut StdRng) -> BlockTreeConfig {
    let min = rng.random_range(2..=10);
    let max = rng.random_range((2 * (min - 1)).max(min + 1)..=3 * min);
    BlockTreeConfig::with_block_sizes(min, max)
}

#[test]
fn test_random_seeks() -> Result<()> {
    init_logger();
    let mut rng = StdRng::seed_from_u64(0x5eed_b10c);

    for _ in 0..20 {
        let count = rng.random_range(1..2000);
        let set: BTreeSet<Vec<u8>> = (0..count).map(|_| random_term(&mut rng)).collect();
        let terms: Vec<Vec<u8>> = set.iter().cloned().collect();
        let config = random_config(&mut rng);

        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config.clone(), &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();
        assert_eq!(body.size(), terms.len() as u64);

        let mut cursor = body.iterator();
        for _ in 0..500 {
            let target = random_term(&mut rng);
            let ceil = set.range(target.clone()..).next();

            if rng.random_bool(0.5) {
                let found = cursor.seek_exact(&target)?;
                assert_eq!(found, set.contains(&target), "config {config:?}");
                if !found {
                    let next = set.range((Bound::Excluded(target.clone()), Bound::Unbounded)).next();
                    assert_eq!(cursor.next()?.map(<[u8]>::to_vec).as_ref(), next);
                }
            } else {
                match (cursor.seek_ceil(&target)?, ceil) {
                    (SeekStatus::End, None) => {}
                    (SeekStatus::Found, Some(term)) => assert_eq!(term, &target),
                    (SeekStatus::NotFound, Some(term)) => {
                        assert_ne!(term, &target);
                        assert_eq!(cursor.term(), term.as_slice());
                    }
                    (status, expected) => panic!("seek_ceil gave {status:?}, expected {expected:?}"),
                }
            }
        }
    }
    Ok(())
}

#[test]
fn test_random_intersections() -> Result<()> {
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..10 {
        let count = rng.random_range(1..1500);
        let terms = sorted((0..count).map(|_| random_term(&mut rng)));
        let config = random_config(&mut rng);

        let storage = MemoryStorage::new();
        let infos = write_body(&storage, config, &terms)?;
        let reader = open(&storage, &infos)?;
        let body = reader.field("body").unwrap();

        for _ in 0..10 {
            let prefix = random_term(&mut rng);
            let prefix = &prefix[..prefix.len().min(3)];
            let picks: Vec<Vec<u8>> = (0..5).map(|_| terms[rng.random_range(0..terms.len())].clone()).collect();

            for automaton in [CompiledAutomaton::prefix(prefix), CompiledAutomaton::term_set(&picks)] {
                let start = rng.random_bool(0.3).then(|| random_term(&mut rng));
                let expected: Vec<Vec<u8>> = terms
                    .iter()
                    .filter(|t| start.as_ref().is_none_or(|s| *t > s))
                    .filter(|t| automaton.accepts(t))
                    .cloned()
                    .collect();

                let mut cursor = body.intersect(&automaton, start.as_deref())?;
                let mut found = Vec::new();
                while let Some(term) = cursor.next()? {
                    found.push(term.to_vec());
                }
                assert_eq!(found, expected);
            }
        }
    }
    Ok(())
}
