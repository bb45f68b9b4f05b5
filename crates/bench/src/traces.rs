//! Synthetic editing traces. These stand in for recorded editing sessions: a typist working through
//! a text document, and a few replicas editing a shared list of cards.

use rand::prelude::*;
use replidoc::{ActorId, Document, ObjId, ObjType, ReadDoc, ROOT};

/// One keystroke-ish edit to a text object.
#[derive(Debug, Clone)]
pub enum TextEdit {
    Ins(usize, String),
    Del(usize, usize),
}

/// Mostly sequential typing, with the occasional jump and backspace.
pub fn typing_trace(seed: u64, len: usize) -> Vec<TextEdit> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut doc_len = 0usize;
    let mut cursor = 0usize;
    let mut edits = Vec::with_capacity(len);

    for _ in 0..len {
        if rng.gen_bool(0.05) {
            cursor = rng.gen_range(0..=doc_len);
        }

        if cursor > 0 && rng.gen_bool(0.15) {
            let del = rng.gen_range(1..=cursor.min(3));
            cursor -= del;
            doc_len -= del;
            edits.push(TextEdit::Del(cursor, del));
        } else {
            let c = if rng.gen_bool(0.2) { ' ' } else { rng.gen_range(b'a'..=b'z') as char };
            edits.push(TextEdit::Ins(cursor, c.to_string()));
            cursor += 1;
            doc_len += 1;
        }
    }
    edits
}

/// Apply a typing trace, one change per edit.
pub fn apply_typing(doc: &mut Document, text: &ObjId, edits: &[TextEdit]) {
    for edit in edits {
        doc.change(|tx| match edit {
            TextEdit::Ins(pos, s) => tx.insert_text(text, *pos, s),
            TextEdit::Del(pos, len) => tx.delete_text(text, *pos, *len),
        }).unwrap();
    }
}

pub fn new_text_doc(actor: u8) -> (Document, ObjId) {
    let mut doc = Document::with_actor(ActorId::from_bytes([actor; 16]));
    let text = doc.change(|tx| tx.put_object(&ROOT, "text", ObjType::Text)).unwrap();
    (doc, text)
}

/// A few replicas concurrently editing a list of cards, syncing every so often. Returns the
/// replicas, unmerged.
pub fn concurrent_cards(seed: u64, replicas: u8, rounds: usize) -> Vec<Document> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let mut base = Document::with_actor(ActorId::from_bytes([0; 16]));
    let cards = base.change(|tx| tx.put_object(&ROOT, "cards", ObjType::List)).unwrap();

    let mut docs: Vec<Document> = (1..=replicas).map(|i| {
        let mut d = base.clone();
        d.set_actor(ActorId::from_bytes([i; 16]));
        d
    }).collect();

    for round in 0..rounds {
        for doc in docs.iter_mut() {
            let len = doc.length(&cards).unwrap();
            doc.change(|tx| {
                if len > 0 && rng.gen_bool(0.2) {
                    tx.delete(&cards, rng.gen_range(0..len))
                } else {
                    let card = tx.insert_object(&cards, rng.gen_range(0..=len), ObjType::Map)?;
                    tx.put(&card, "title", format!("card {round}"))?;
                    tx.put(&card, "done", false)
                }
            }).unwrap();
        }

        // Sync a random pair every few rounds.
        if round % 4 == 3 {
            let a = rng.gen_range(0..docs.len());
            let b = rng.gen_range(0..docs.len());
            if a != b {
                let other = docs[b].clone();
                docs[a].merge(&other).unwrap();
            }
        }
    }
    docs
}
