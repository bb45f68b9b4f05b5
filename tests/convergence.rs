use replidoc::*;

fn doc(n: u8) -> Document {
    Document::with_actor(ActorId::from_bytes([n; 16]))
}

fn strs(values: Vec<Value>) -> Vec<String> {
    values.iter().map(|v| v.to_str().unwrap_or("?").to_string()).collect()
}

#[test]
fn cards_scenario() {
    // A's actor id sorts above B's, so A's ops win ties.
    let mut a = doc(2);
    let mut b = doc(1);

    let cards = a.change(|tx| tx.put_object(&ROOT, "cards", ObjType::List)).unwrap();
    b.merge(&a).unwrap();
    assert_eq!(b.length(&cards).unwrap(), 0);

    a.change(|tx| tx.push(&cards, "card1")).unwrap();
    b.change(|tx| tx.push(&cards, "card2")).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    assert_eq!(strs(a.values(&cards).unwrap()), vec!["card1", "card2"]);
    assert_eq!(strs(b.values(&cards).unwrap()), vec!["card1", "card2"]);
    assert_eq!(a.heads(), b.heads());
    a.dbg_check(true);
    b.dbg_check(true);
}

#[test]
fn concurrent_sets_keep_both_values() {
    let mut a = doc(1);
    let mut b = doc(2);
    a.change(|tx| tx.put(&ROOT, "color", "red")).unwrap();
    b.change(|tx| tx.put(&ROOT, "color", "blue")).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();

    // Same counter, so the larger actor (b) wins.
    for d in [&a, &b] {
        let (value, id) = d.get(&ROOT, "color").unwrap().unwrap();
        assert_eq!(value, Value::from("blue"));
        assert_eq!(id, OpId::new(1, b.actor()));

        let conflicts = d.get_conflicts(&ROOT, "color").unwrap();
        assert_eq!(conflicts.len(), 2);
        assert_eq!(conflicts[0].0, Value::from("red"));
        assert_eq!(conflicts[1].0, Value::from("blue"));
    }

    // A write which has seen both resolves the conflict.
    a.change(|tx| tx.put(&ROOT, "color", "green")).unwrap();
    b.merge(&a).unwrap();
    assert_eq!(b.get_conflicts(&ROOT, "color").unwrap().len(), 1);
    assert_eq!(b.get(&ROOT, "color").unwrap().unwrap().0, Value::from("green"));
}

#[test]
fn merge_commutes_and_associates() {
    let mut docs = [doc(1), doc(2), doc(3)];
    for (i, d) in docs.iter_mut().enumerate() {
        d.change(|tx| {
            tx.put(&ROOT, "shared", i as i64)?;
            tx.put(&ROOT, format!("own{}", i), true)?;
            let l = tx.put_object(&ROOT, "list", ObjType::List)?;
            tx.push(&l, i as i64)
        }).unwrap();
    }
    let [x, y, z] = docs;

    // (x + y) + z
    let mut left = x.clone();
    left.merge(&y).unwrap();
    left.merge(&z).unwrap();

    // x + (z + y)
    let mut inner = z.clone();
    inner.merge(&y).unwrap();
    let mut right = x.clone();
    right.merge(&inner).unwrap();

    // z + x + y
    let mut other = z.clone();
    other.merge(&x).unwrap();
    other.merge(&y).unwrap();

    assert_eq!(left.hydrate(), right.hydrate());
    assert_eq!(left.hydrate(), other.hydrate());
    assert_eq!(left.heads(), other.heads());
    assert_eq!(left.heads().len(), 3);

    // Merging again changes nothing.
    let before = left.hydrate();
    let r = left.merge(&right).unwrap();
    assert!(r.applied.is_empty());
    assert_eq!(left.hydrate(), before);
}

#[test]
fn tombstones_anchor_concurrent_inserts() {
    let mut a = doc(1);
    let list = a.change(|tx| {
        let l = tx.put_object(&ROOT, "l", ObjType::List)?;
        for v in ["x", "y", "z"] { tx.push(&l, v)?; }
        Ok(l)
    }).unwrap();
    let mut b = a.fork();

    a.change(|tx| tx.delete(&list, 1)).unwrap();
    b.change(|tx| tx.insert(&list, 2, "w")).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();
    assert_eq!(strs(a.values(&list).unwrap()), vec!["x", "w", "z"]);
    assert_eq!(a.hydrate(), b.hydrate());
}

#[test]
fn concurrent_text_edits() {
    let mut a = doc(1);
    let text = a.change(|tx| {
        let t = tx.put_object(&ROOT, "t", ObjType::Text)?;
        tx.insert_text(&t, 0, "hello world")?;
        Ok(t)
    }).unwrap();
    let mut b = a.fork();

    a.change(|tx| tx.splice_text(&text, 0, 5, "HELLO")).unwrap();
    b.change(|tx| tx.insert_text(&text, 11, "!")).unwrap();

    a.merge(&b).unwrap();
    b.merge(&a).unwrap();
    assert_eq!(a.text(&text).unwrap(), "HELLO world!");
    assert_eq!(b.text(&text).unwrap(), "HELLO world!");
}

#[test]
fn counters_add_up() {
    let mut a = doc(1);
    a.change(|tx| tx.put(&ROOT, "visits", 0)).unwrap();
    let mut b = a.fork();
    let mut c = a.fork();

    a.change(|tx| tx.increment(&ROOT, "visits", 2)).unwrap();
    b.change(|tx| tx.increment(&ROOT, "visits", 3)).unwrap();
    c.change(|tx| tx.increment(&ROOT, "visits", -1)).unwrap();

    a.merge(&b).unwrap();
    a.merge(&c).unwrap();
    assert_eq!(a.get(&ROOT, "visits").unwrap().unwrap().0, Value::from(4));
}

#[test]
fn delete_wins_only_over_what_it_saw() {
    let mut a = doc(1);
    a.change(|tx| tx.put(&ROOT, "k", 1)).unwrap();
    let mut b = a.fork();

    a.change(|tx| tx.delete(&ROOT, "k")).unwrap();
    b.change(|tx| tx.put(&ROOT, "k", 2)).unwrap();

    a.merge(&b).unwrap();
    assert_eq!(a.get(&ROOT, "k").unwrap().unwrap().0, Value::from(2));
}

#[test]
fn concurrent_objects_at_one_key() {
    let mut a = doc(1);
    let mut b = doc(2);
    let ma = a.change(|tx| tx.put_object(&ROOT, "obj", ObjType::Map)).unwrap();
    let lb = b.change(|tx| tx.put_object(&ROOT, "obj", ObjType::List)).unwrap();
    a.change(|tx| tx.put(&ma, "inside", 1)).unwrap();

    a.merge(&b).unwrap();
    let conflicts = a.get_conflicts(&ROOT, "obj").unwrap();
    let ids: Vec<ObjId> = conflicts.iter().filter_map(|(v, _)| v.obj_id()).collect();
    assert_eq!(ids, vec![ma, lb]);

    // The losing object is still there, and still editable.
    assert_eq!(a.get(&ma, "inside").unwrap().unwrap().0, Value::from(1));
    assert_eq!(a.object_type(&lb), Some(ObjType::List));
}

#[test]
fn children_wait_for_parents() {
    let mut a = doc(1);
    a.change(|tx| tx.put(&ROOT, "x", 1)).unwrap();
    let obj = a.change(|tx| tx.put_object(&ROOT, "m", ObjType::Map)).unwrap();
    a.change(|tx| tx.put(&obj, "y", 2)).unwrap();

    let mut changes: Vec<Change> = a.get_changes(&[]).into_iter().cloned().collect();
    changes.reverse();

    let mut b = doc(2);
    for (i, change) in changes.into_iter().enumerate() {
        let r = b.apply_changes([change]).unwrap();
        if i < 2 {
            assert!(r.applied.is_empty());
            assert_eq!(r.pending, i + 1);
        } else {
            assert_eq!(r.applied.len(), 3);
        }
        b.dbg_check(true);
    }
    assert_eq!(b.hydrate(), a.hydrate());
}

#[test]
fn sync_by_heads() {
    let mut a = doc(1);
    let mut b = doc(2);
    a.change(|tx| tx.put(&ROOT, "from_a", 1)).unwrap();
    b.change(|tx| tx.put(&ROOT, "from_b", 2)).unwrap();

    // Each side sends what the other is missing.
    let to_b: Vec<Change> = a.get_changes(&b.heads()).into_iter().cloned().collect();
    let to_a: Vec<Change> = b.get_changes(&a.heads()).into_iter().cloned().collect();
    b.apply_changes(to_b).unwrap();
    a.apply_changes(to_a).unwrap();

    assert_eq!(a.hydrate(), b.hydrate());
    assert!(a.get_missing_deps().is_empty());
}

#[test]
fn rejected_change_mixed_with_valid_ones() {
    let mut a = doc(1);
    a.change(|tx| tx.put(&ROOT, "x", 1)).unwrap();
    let mut b = doc(2);
    b.merge(&a).unwrap();

    // Reuses actor 1, seq 1.
    let mut evil = doc(1);
    evil.change(|tx| tx.put(&ROOT, "x", 666)).unwrap();
    let bad = evil.changes()[0].clone();

    let mut c = doc(3);
    c.change(|tx| tx.put(&ROOT, "c", 1)).unwrap();
    c.change(|tx| tx.put(&ROOT, "c", 2)).unwrap();
    let (c1, c2) = (c.changes()[0].clone(), c.changes()[1].clone());
    let mut d = doc(4);
    d.change(|tx| tx.put(&ROOT, "d", 1)).unwrap();
    let d1 = d.changes()[0].clone();

    let r = b.apply_changes([c2.clone(), bad.clone(), d1.clone()]).unwrap();
    assert_eq!(r.applied, vec![d1.hash()]);
    assert_eq!(r.rejected.len(), 1);
    assert_eq!(r.rejected[0].0, bad.hash());
    assert_eq!(r.pending, 1);
    assert_eq!(r.missing_deps, vec![c1.hash()]);
    assert_eq!(b.num_pending(), 1);
    b.dbg_check(true);

    let r = b.apply_changes([bad.clone(), c1.clone(), d1]).unwrap();
    assert_eq!(r.applied, vec![c1.hash(), c2.hash()]);
    assert_eq!(r.duplicates, 1);
    assert_eq!(r.rejected.len(), 1);
    assert_eq!(r.pending, 0);
    assert!(r.missing_deps.is_empty());

    assert_eq!(b.get(&ROOT, "x").unwrap().unwrap().0, Value::from(1));
    assert_eq!(b.get(&ROOT, "c").unwrap().unwrap().0, Value::from(2));
    assert_eq!(b.get(&ROOT, "d").unwrap().unwrap().0, Value::from(1));
    assert!(b.get_change(&bad.hash()).is_none());
    b.dbg_check(true);
}
