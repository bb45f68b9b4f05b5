use rand::prelude::*;
use crate::*;

const UCHARS: [char; 15] = [
    'a', 'b', 'c', '1', '2', '3', ' ', '\n', // ASCII
    '©', '¥', '½', // The Latin-1 suppliment (U+80 - U+ff)
    'Ύ', 'Δ', // Greek (U+0370 - U+03FF)
    '←', '𐆐', // Arrows and something outside the BMP
];

const KEYS: [&str; 4] = ["a", "b", "c", "d"];

pub(crate) fn random_str(len: usize, rng: &mut SmallRng) -> String {
    (0..len).map(|_| UCHARS[rng.gen_range(0..UCHARS.len())]).collect()
}

fn random_scalar(rng: &mut SmallRng) -> ScalarValue {
    match rng.gen_range(0..5) {
        0 => ScalarValue::Null,
        1 => rng.gen_bool(0.5).into(),
        2 => rng.gen_range(-100i64..100).into(),
        3 => (rng.gen_range(0..1000) as f64 / 8.0).into(),
        _ => random_str(rng.gen_range(1..4), rng).into(),
    }
}

/// Find the object at a root key, creating it if it isn't there (or isn't the right type).
fn get_or_make(tx: &mut Transaction, key: &str, kind: ObjType) -> Result<ObjId, Error> {
    match tx.get(&ROOT, key)? {
        Some((Value::Object(k, id), _)) if k == kind => Ok(id),
        _ => tx.put_object(&ROOT, key, kind),
    }
}

fn random_list_edit(tx: &mut Transaction, rng: &mut SmallRng) -> Result<(), Error> {
    let list = get_or_make(tx, "list", ObjType::List)?;
    let len = tx.length(&list)?;
    match rng.gen_range(0..4) {
        0 if len > 0 => tx.delete(&list, rng.gen_range(0..len)),
        1 if len > 0 => tx.put(&list, rng.gen_range(0..len), random_scalar(rng)),
        2 if len > 0 && rng.gen_bool(0.2) => {
            let inner = tx.insert_object(&list, rng.gen_range(0..=len), ObjType::Map)?;
            tx.put(&inner, KEYS[rng.gen_range(0..KEYS.len())], random_scalar(rng))
        }
        _ => tx.insert(&list, rng.gen_range(0..=len), random_scalar(rng)),
    }
}

fn random_text_edit(tx: &mut Transaction, rng: &mut SmallRng) -> Result<(), Error> {
    let text = get_or_make(tx, "text", ObjType::Text)?;
    let len = tx.length(&text)?;
    let pos = rng.gen_range(0..=len);
    let del = if pos < len && rng.gen_bool(0.4) {
        rng.gen_range(1..=usize::min(5, len - pos))
    } else { 0 };
    let ins = if del == 0 || rng.gen_bool(0.5) {
        random_str(rng.gen_range(1..4), rng)
    } else { String::new() };
    tx.splice_text(&text, pos, del, &ins)
}

fn random_map_edit(tx: &mut Transaction, rng: &mut SmallRng) -> Result<(), Error> {
    let key = KEYS[rng.gen_range(0..KEYS.len())];
    match rng.gen_range(0..5) {
        0 => tx.delete(&ROOT, key),
        1 => {
            match tx.get(&ROOT, "n")? {
                Some((Value::Scalar(ScalarValue::Int(_)), _)) => tx.increment(&ROOT, "n", rng.gen_range(-5..10)),
                _ => tx.put(&ROOT, "n", 0),
            }
        }
        2 => {
            let m = get_or_make(tx, "map", ObjType::Map)?;
            tx.put(&m, key, random_scalar(rng))
        }
        _ => tx.put(&ROOT, key, random_scalar(rng)),
    }
}

/// Make one random change to the document, made up of a handful of random edits.
pub(crate) fn make_random_change(doc: &mut Document, rng: &mut SmallRng) -> Option<ChangeHash> {
    let mut tx = doc.transaction();
    for _ in 0..rng.gen_range(1..4) {
        let result = match rng.gen_range(0..3) {
            0 => random_list_edit(&mut tx, rng),
            1 => random_text_edit(&mut tx, rng),
            _ => random_map_edit(&mut tx, rng),
        };
        result.unwrap();
    }
    tx.commit().unwrap()
}

pub(crate) fn choose_2<'a, T>(arr: &'a mut [T], rng: &mut SmallRng) -> (usize, &'a mut T, usize, &'a mut T) {
    loop {
        let a_idx = rng.gen_range(0..arr.len());
        let b_idx = rng.gen_range(0..arr.len());

        if a_idx != b_idx {
            let (a_idx, b_idx) = if a_idx < b_idx { (a_idx, b_idx) } else { (b_idx, a_idx) };
            let (start, end) = arr[..].split_at_mut(b_idx);
            return (a_idx, &mut start[a_idx], b_idx, &mut end[0]);
        }
    }
}
