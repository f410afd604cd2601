//! Benchmarks for chapter parsing and tree edits
//!
//! Tests simple chapter parsing, timeframe selection and normalization on
//! chapter lists of growing size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mediasplice_chapters::{
    parse_chapters, ChapterAtom, ChapterDefaults, Chapters, Edition, ParseOptions, UniqueIds,
};

const SECOND: u64 = 1_000_000_000;

/// Simple chapter file with one chapter per minute
fn simple_chapter_text(count: usize) -> String {
    let mut text = String::new();
    for i in 0..count {
        let minutes = i % 60;
        let hours = i / 60;
        text.push_str(&format!(
            "CHAPTER{:02}={:02}:{:02}:00.000\nCHAPTER{:02}NAME=Chapter {}\n",
            i + 1,
            hours,
            minutes,
            i + 1,
            i + 1
        ));
    }
    text
}

/// Two level chapter tree with `count` top level atoms and duplicate UIDs
fn nested_chapters(count: usize) -> Chapters {
    let mut edition = Edition::with_uid(1);
    for i in 0..count as u64 {
        let start = i * 60 * SECOND;
        let atom = ChapterAtom::new(start, Some(start + 60 * SECOND))
            .with_uid(100 + i / 2)
            .with_child(ChapterAtom::new(start, Some(start + 30 * SECOND)).with_uid(10_000 + i))
            .with_child(
                ChapterAtom::new(start + 30 * SECOND, Some(start + 60 * SECOND))
                    .with_uid(20_000 + i),
            );
        edition.atoms.push(atom);
    }
    Chapters {
        editions: vec![edition],
    }
}

fn bench_simple_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("simple_parsing");

    for count in [10usize, 99] {
        let text = simple_chapter_text(count);
        group.throughput(Throughput::Bytes(text.len() as u64));
        group.bench_with_input(BenchmarkId::new("parse", count), &text, |b, text| {
            b.iter(|| {
                let mut uids = UniqueIds::with_seed(1);
                parse_chapters(
                    black_box(text),
                    &ParseOptions::default(),
                    &ChapterDefaults::default(),
                    &mut uids,
                )
                .unwrap()
            });
        });
    }

    group.finish();
}

fn bench_tree_edits(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_edits");

    for count in [50usize, 500] {
        let chapters = nested_chapters(count);

        group.bench_with_input(BenchmarkId::new("select", count), &chapters, |b, chapters| {
            b.iter(|| {
                black_box(chapters.clone()).select_in_timeframe(
                    10 * 60 * SECOND,
                    Some(40 * 60 * SECOND),
                    10 * 60 * SECOND,
                )
            });
        });

        group.bench_with_input(BenchmarkId::new("merge", count), &chapters, |b, chapters| {
            b.iter(|| {
                let mut chapters = black_box(chapters.clone());
                chapters.merge_entries();
                chapters
            });
        });

        group.bench_with_input(BenchmarkId::new("fix", count), &chapters, |b, chapters| {
            b.iter(|| {
                let mut chapters = black_box(chapters.clone());
                let mut uids = UniqueIds::with_seed(1);
                chapters.register_uids(&mut uids);
                chapters.fix_mandatory_elements(&mut uids);
                chapters
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_simple_parsing, bench_tree_edits);
criterion_main!(benches);
