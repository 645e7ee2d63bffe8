use criterion::{criterion_group, criterion_main, Criterion};
use edictor_feature::matrix::DistanceMatrix;
use edictor_feature::msa::multi_align;
use edictor_feature::phonetic::tokens;
use edictor_feature::{ClassPenalties, FeatureAligner, FeatureTable, Row};

const FORMS: &[&[&str]] = &[
    &["h", "a", "n", "t"],
    &["h", "æ", "n", "d"],
    &["m", "a", "n", "u", "s"],
    &["v", "a", "s", "ɐ"],
    &["w", "ɔ", "t", "ə"],
    &["ʋ", "a", "t", "ə", "r"],
    &["a", "k", "w", "a"],
    &["tʃ", "eː", "r", "o"],
];

fn synthetic_wordlist(taxa: usize, concepts: usize) -> Vec<Row> {
    let mut rows = Vec::with_capacity(taxa * concepts);
    for t in 0..taxa {
        for c in 0..concepts {
            let form = FORMS[(t * 3 + c) % FORMS.len()];
            let index = (t * concepts + c).to_string();
            rows.push(Row::new(&index, &format!("L{t}"), &format!("C{c}"), form));
        }
    }
    rows
}

fn bench_alignment(c: &mut Criterion) {
    let table = FeatureTable::builtin().expect("builtin table");
    let aligner = FeatureAligner::new(&table, ClassPenalties::default());
    let a = tokens(&["ʋ", "a", "t", "ə", "r"]);
    let b = tokens(&["a", "k", "w", "a"]);
    let sequences: Vec<Vec<String>> = FORMS.iter().map(|f| tokens(f)).collect();

    let mut group = c.benchmark_group("alignment");
    group.bench_function("sequence_distance", |bench| {
        bench.iter(|| criterion::black_box(aligner.sequence_distance(&a, &b)));
    });
    group.bench_function("multi_align_8", |bench| {
        bench.iter(|| criterion::black_box(multi_align(&aligner, &sequences)));
    });
    group.finish();
}

fn bench_distance_matrix(c: &mut Criterion) {
    let table = FeatureTable::builtin().expect("builtin table");
    let aligner = FeatureAligner::new(&table, ClassPenalties::default());
    let rows = synthetic_wordlist(24, 40);

    let mut group = c.benchmark_group("distance_matrix");
    group.sample_size(20);
    group.bench_function("serial_24x40", |bench| {
        bench.iter(|| criterion::black_box(DistanceMatrix::from_rows(&aligner, &rows, false)));
    });
    group.bench_function("parallel_24x40", |bench| {
        bench.iter(|| criterion::black_box(DistanceMatrix::from_rows(&aligner, &rows, true)));
    });
    group.finish();
}

criterion_group!(benches, bench_alignment, bench_distance_matrix);
criterion_main!(benches);
