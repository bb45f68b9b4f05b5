use replidoc::*;

fn sample() -> Document {
    let mut a = Document::with_actor(ActorId::from_bytes([1; 16]));
    a.change(|tx| tx.put(&ROOT, "prop", "val")).unwrap();
    let mut b = a.fork();
    a.change(|tx| {
        let l = tx.put_object(&ROOT, "list", ObjType::List)?;
        tx.push(&l, 1.5)?;
        tx.push(&l, vec![1u8, 2, 3])?;
        tx.push(&l, ())
    }).unwrap();
    b.change(|tx| {
        let t = tx.put_object(&ROOT, "text", ObjType::Text)?;
        tx.insert_text(&t, 0, "héllo")?;
        tx.put(&ROOT, "count", 1)?;
        tx.increment(&ROOT, "count", 41)
    }).unwrap();
    a.merge(&b).unwrap();
    a.change(|tx| tx.delete(&ROOT, "prop")).unwrap();
    a
}

#[test]
fn init_change_save_load() {
    let mut d = Document::new();
    d.change(|tx| tx.put(&ROOT, "prop", "val")).unwrap();
    let loaded = Document::load(&d.save()).unwrap();

    let mut expected = DocValue::map();
    if let DocValue::Map(m) = &mut expected {
        m.insert("prop".into(), "val".into());
    }
    assert_eq!(loaded.hydrate(), expected);
}

#[test]
fn roundtrip_preserves_everything() {
    let d = sample();
    let loaded = Document::load(&d.save()).unwrap();
    assert_eq!(loaded.hydrate(), d.hydrate());
    assert_eq!(loaded.heads(), d.heads());
    assert_eq!(loaded.num_changes(), d.num_changes());
    assert_eq!(loaded.num_ops(), d.num_ops());
    for change in d.changes() {
        assert_eq!(loaded.get_change(&change.hash()), Some(change));
    }
    loaded.dbg_check(true);

    // Saving is deterministic for the same set of changes, regardless of application order.
    let mut other = Document::with_actor(d.actor());
    let mut changes: Vec<Change> = d.changes().to_vec();
    changes.reverse();
    other.apply_changes(changes).unwrap();
    assert_eq!(other.save(), d.save());
}

#[test]
fn empty_document_roundtrip() {
    let d = Document::new();
    let loaded = Document::load(&d.save()).unwrap();
    assert_eq!(loaded.hydrate(), DocValue::map());
    assert!(loaded.heads().is_empty());
}

#[test]
fn flipped_byte_fails_checksum() {
    let bytes = sample().save();
    for i in 8..bytes.len() - 4 {
        let mut corrupt = bytes.clone();
        corrupt[i] ^= 0x01;
        assert!(matches!(Document::load(&corrupt), Err(Error::CorruptDocument(_))), "byte {i}");
    }

    let mut corrupt = bytes.clone();
    let mid = bytes.len() / 2;
    corrupt[mid] = corrupt[mid].wrapping_add(1);
    assert_eq!(Document::load(&corrupt).unwrap_err(), Error::CorruptDocument(ParseError::ChecksumFailed));
}

#[test]
fn truncated_buffers_are_rejected() {
    let bytes = sample().save();
    for len in 0..bytes.len() {
        assert!(Document::load(&bytes[..len]).is_err(), "prefix of length {len} loaded");
    }
}

#[test]
fn bad_magic_and_version() {
    let mut bytes = sample().save();
    bytes[0] = b'X';
    assert_eq!(Document::load(&bytes).unwrap_err(), Error::CorruptDocument(ParseError::InvalidMagic));
    assert!(Document::load(b"not a document at all").is_err());

    let mut bytes = sample().save();
    bytes[8] = 9;
    let opts = LoadOptions::default().verify_checksum(false);
    assert_eq!(Document::load_with(&bytes, opts).unwrap_err(),
        Error::CorruptDocument(ParseError::UnsupportedProtocolVersion));
}

#[test]
fn incremental_sync() {
    let base = sample();
    let mut a = base.fork();
    let mut b = base.fork();
    let known = base.heads();

    a.change(|tx| tx.put(&ROOT, "a", 1)).unwrap();
    a.change(|tx| tx.put(&ROOT, "a", 2)).unwrap();
    b.change(|tx| tx.put(&ROOT, "b", 1)).unwrap();

    let from_a = a.save_since(&known);
    let from_b = b.save_since(&known);
    assert!(from_a.len() < a.save().len());

    let r = b.load_incremental(&from_a).unwrap();
    assert_eq!(r.applied.len(), 2);
    a.load_incremental(&from_b).unwrap();
    assert_eq!(a.hydrate(), b.hydrate());
    assert_eq!(a.heads(), b.heads());

    // Loading the same bundle twice is harmless.
    let r = b.load_incremental(&from_a).unwrap();
    assert_eq!(r.duplicates, 2);
    assert!(r.applied.is_empty());
}

#[test]
fn single_change_transport() {
    let mut a = Document::with_actor(ActorId::from_bytes([1; 16]));
    let mut b = Document::with_actor(ActorId::from_bytes([2; 16]));
    a.change(|tx| tx.put(&ROOT, "x", 1)).unwrap();
    a.change(|tx| tx.put(&ROOT, "y", 2)).unwrap();

    // Send the newest change first. It waits for its parent.
    for change in a.get_changes(&[]).into_iter().rev() {
        let bytes = change.encode();
        let decoded = Change::decode(&bytes).unwrap();
        assert_eq!(decoded.hash(), change.hash());
        b.apply_changes([decoded]).unwrap();
    }
    assert_eq!(b.hydrate(), a.hydrate());
    assert_eq!(b.num_pending(), 0);
}
