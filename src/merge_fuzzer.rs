use rand::prelude::*;
use crate::*;
use crate::fuzzer_tools::{choose_2, make_random_change};

fn merge_fuzz(seed: u64, n: usize, verbose: bool) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut docs: Vec<Document> = (1..=3u8)
        .map(|i| Document::with_actor(ActorId::from_bytes([i; 16])))
        .collect();

    for _i in 0..n {
        if verbose { println!("\n\ni {}", _i); }

        // Generate some operations
        for _j in 0..2 {
            let idx = rng.gen_range(0..docs.len());
            make_random_change(&mut docs[idx], &mut rng);
        }

        let (_a_idx, a, _b_idx, b) = choose_2(&mut docs, &mut rng);

        if rng.gen_bool(0.2) {
            // Go through the wire format sometimes.
            let bytes = b.save_since(&a.heads());
            a.load_incremental(&bytes).unwrap();
        } else {
            a.merge(b).unwrap();
        }
        b.merge(a).unwrap();

        assert_eq!(a.heads(), b.heads());
        assert_eq!(a.hydrate(), b.hydrate());
        assert_eq!(a.num_pending(), 0);
        a.dbg_check(true);
        b.dbg_check(false);
    }

    for doc in &docs {
        doc.dbg_check(true);
        let loaded = Document::load(&doc.save()).unwrap();
        assert_eq!(loaded.hydrate(), doc.hydrate());
        assert_eq!(loaded.heads(), doc.heads());
    }
}

/// Deliver every change to a fresh replica in a random order. It has to end up in the same state.
fn shuffled_delivery_fuzz(seed: u64, n: usize) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut docs: Vec<Document> = (1..=3u8)
        .map(|i| Document::with_actor(ActorId::from_bytes([i; 16])))
        .collect();

    for _i in 0..n {
        let idx = rng.gen_range(0..docs.len());
        make_random_change(&mut docs[idx], &mut rng);
        if rng.gen_bool(0.3) {
            let (_, a, _, b) = choose_2(&mut docs, &mut rng);
            a.merge(b).unwrap();
        }
    }

    let mut all = Document::with_actor(ActorId::from_bytes([9; 16]));
    let mut changes: Vec<Change> = Vec::new();
    for doc in &docs {
        all.merge(doc).unwrap();
        changes.extend(doc.get_changes(&[]).into_iter().cloned());
    }
    changes.shuffle(&mut rng);

    let mut target = Document::with_actor(ActorId::from_bytes([10; 16]));
    for chunk in changes.chunks(5) {
        target.apply_changes(chunk.iter().cloned()).unwrap();
        target.dbg_check(false);
    }
    assert_eq!(target.num_pending(), 0);
    assert_eq!(target.heads(), all.heads());
    assert_eq!(target.hydrate(), all.hydrate());
    target.dbg_check(true);
}

/// An impostor reuses replica 0's actor and writes a change with a sequence number replica 0 has
/// already used. That change is mixed into ordinary sync traffic. Every replica must reject it and
/// keep converging on everything else.
fn conflicting_actor_fuzz(seed: u64, n: usize) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut docs: Vec<Document> = (1..=3u8)
        .map(|i| Document::with_actor(ActorId::from_bytes([i; 16])))
        .collect();

    for _i in 0..n / 2 {
        let idx = rng.gen_range(0..docs.len());
        make_random_change(&mut docs[idx], &mut rng);
        let (_, a, _, b) = choose_2(&mut docs, &mut rng);
        a.merge(b).unwrap();
    }

    let mut impostor = docs[0].clone();
    docs[0].change(|tx| tx.put(&ROOT, "owner", "real")).unwrap();
    impostor.change(|tx| tx.put(&ROOT, "owner", "fake")).unwrap();
    let bad = impostor.changes().last().unwrap().clone();

    // The genuine change reaches everyone first.
    let real = docs[0].clone();
    for doc in &mut docs[1..] {
        doc.merge(&real).unwrap();
    }

    for _i in 0..n {
        let idx = rng.gen_range(0..docs.len());
        make_random_change(&mut docs[idx], &mut rng);

        let (_, a, _, b) = choose_2(&mut docs, &mut rng);
        let mut batch: Vec<Change> = b.get_changes(&a.heads()).into_iter().cloned().collect();
        let inject = rng.gen_bool(0.5);
        if inject {
            let pos = rng.gen_range(0..=batch.len());
            batch.insert(pos, bad.clone());
        }

        let pending_before = a.num_pending();
        let r = a.apply_changes(batch).unwrap();
        if inject {
            assert_eq!(r.rejected.len(), 1);
            assert_eq!(r.rejected[0].0, bad.hash());
            assert!(matches!(r.rejected[0].1, Error::ConflictingChange { .. }));
        } else {
            assert!(r.rejected.is_empty());
        }
        assert_eq!(r.pending, pending_before);
        assert_eq!(r.pending, 0);

        b.merge(a).unwrap();
        assert_eq!(a.heads(), b.heads());
        assert_eq!(a.hydrate(), b.hydrate());
        assert_eq!(a.get(&ROOT, "owner").unwrap().unwrap().0, Value::from("real"));
        assert!(a.get_change(&bad.hash()).is_none());
        a.dbg_check(false);
    }

    for doc in &docs {
        doc.dbg_check(true);
    }
}

#[test]
fn merge_fuzz_once() {
    merge_fuzz(1000139, 100, false);
}

#[test]
fn shuffled_delivery_fuzz_once() {
    for seed in 0..10 {
        shuffled_delivery_fuzz(seed, 40);
    }
}

#[test]
fn conflicting_actor_fuzz_once() {
    for seed in 0..10 {
        conflicting_actor_fuzz(seed, 30);
    }
}

#[test]
#[ignore]
fn merge_fuzz_forever() {
    for seed in 0.. {
        if seed % 10 == 0 { println!("seed {seed}"); }
        merge_fuzz(seed, 100, false);
        shuffled_delivery_fuzz(seed, 100);
        conflicting_actor_fuzz(seed, 100);
    }
}
