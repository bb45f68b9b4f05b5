mod traces;

use criterion::{black_box, BenchmarkId, Criterion, Throughput};
use replidoc::{ActorId, Change, Document, ReadDoc, ROOT};
use replidoc::encoding::EncodeOptions;
use crate::traces::*;

const TRACE_LENGTHS: &[usize] = &[1000, 10000];

fn local_benchmarks(c: &mut Criterion) {
    for &len in TRACE_LENGTHS {
        let mut group = c.benchmark_group("replidoc");
        let edits = typing_trace(123, len);
        group.throughput(Throughput::Elements(edits.len() as u64));

        group.bench_function(BenchmarkId::new("local_typing", len), |b| {
            b.iter(|| {
                let (mut doc, text) = new_text_doc(1);
                apply_typing(&mut doc, &text, &edits);
                black_box(doc.length(&text).unwrap());
            })
        });

        // Reading text back after every edit exercises the materialized view cache.
        group.bench_function(BenchmarkId::new("local_typing_read", len), |b| {
            b.iter(|| {
                let (mut doc, text) = new_text_doc(1);
                for edit in edits.chunks(10) {
                    apply_typing(&mut doc, &text, edit);
                    black_box(doc.text(&text).unwrap());
                }
            })
        });

        group.finish();
    }

    // One key written over and over, read back after every write.
    let mut group = c.benchmark_group("replidoc");
    for &len in TRACE_LENGTHS {
        group.throughput(Throughput::Elements(len as u64));
        group.bench_function(BenchmarkId::new("overwrite_one_key", len), |b| {
            b.iter(|| {
                let mut doc = Document::with_actor(ActorId::from_bytes([1; 16]));
                for i in 0..len as i64 {
                    doc.change(|tx| tx.put(&ROOT, "k", i)).unwrap();
                    black_box(doc.get(&ROOT, "k").unwrap());
                }
            })
        });
    }
    group.finish();
}

fn merge_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("replidoc");

    // Replaying one replica's history into a fresh document.
    let (mut doc, text) = new_text_doc(1);
    apply_typing(&mut doc, &text, &typing_trace(321, 5000));
    let changes: Vec<Change> = doc.changes().to_vec();
    group.throughput(Throughput::Elements(changes.len() as u64));

    group.bench_function(BenchmarkId::new("apply_remote", "typing"), |b| {
        b.iter(|| {
            let mut fresh = Document::with_actor(ActorId::from_bytes([9; 16]));
            fresh.apply_changes(changes.iter().cloned()).unwrap();
            black_box(fresh.text(&text).unwrap());
        })
    });

    // Out of order delivery goes through the pending buffer.
    let reversed: Vec<Change> = changes.iter().rev().cloned().collect();
    group.bench_function(BenchmarkId::new("apply_remote_reversed", "typing"), |b| {
        b.iter(|| {
            let mut fresh = Document::with_actor(ActorId::from_bytes([9; 16]));
            fresh.apply_changes(reversed.iter().cloned()).unwrap();
            black_box(fresh.num_changes());
        })
    });

    let replicas = concurrent_cards(7, 4, 200);
    group.bench_function(BenchmarkId::new("merge", "cards"), |b| {
        b.iter(|| {
            let mut doc = replicas[0].clone();
            for other in &replicas[1..] {
                doc.merge(other).unwrap();
            }
            black_box(doc.hydrate());
        })
    });

    group.finish();
}

fn encoding_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("replidoc");

    let mut doc = concurrent_cards(11, 3, 300).into_iter().reduce(|mut a, b| {
        a.merge(&b).unwrap();
        a
    }).unwrap();
    let (typed, text) = new_text_doc(5);
    doc.merge(&typed).unwrap();
    let mut typed = doc.fork();
    apply_typing(&mut typed, &text, &typing_trace(99, 5000));
    doc.merge(&typed).unwrap();

    let bytes = doc.save();
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function(BenchmarkId::new("encode", "mixed"), |b| {
        b.iter(|| {
            black_box(doc.save());
        });
    });

    let uncompressed = EncodeOptions::default().compress_content(false);
    group.bench_function(BenchmarkId::new("encode_uncompressed", "mixed"), |b| {
        b.iter(|| {
            black_box(doc.save_with(&uncompressed));
        });
    });

    group.bench_function(BenchmarkId::new("decode", "mixed"), |b| {
        b.iter(|| {
            let doc = Document::load(&bytes).unwrap();
            black_box(doc.num_ops());
        });
    });

    group.finish();
}

fn main() {
    let mut c = Criterion::default()
        .configure_from_args();

    local_benchmarks(&mut c);
    merge_benchmarks(&mut c);
    encoding_benchmarks(&mut c);
    c.final_summary();
}
