//! Performance benchmarks for the provenance pipeline.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;

use audit_provenance::crypto::{digest, digest_serializable, IdentityCipher, RecordCipher};
use audit_provenance::domain::{
    Digest, Identity, LedgerEntry, ProvenanceBundle, RecordId, StorageLink, StoredEnvelope,
};
use audit_provenance::store::normalize_fetched;

const CREATOR: &str = "0x1111111111111111111111111111111111111111";

/// Audit report with `findings` entries
fn create_report(findings: usize) -> serde_json::Value {
    let findings: Vec<_> = (0..findings)
        .map(|i| {
            json!({
                "id": format!("F-{i}"),
                "severity": if i % 3 == 0 { "high" } else { "low" },
                "summary": format!("Finding number {i}"),
                "amount": i as f64 * 12.5,
            })
        })
        .collect();
    json!({
        "title": "Annual controls review",
        "auditor": "Example Assurance LLP",
        "findings": findings,
        "signedOff": true,
    })
}

/// Benchmark canonical hashing of reports
fn bench_record_digest(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_digest");

    for count in [1, 10, 100, 1000].iter() {
        let report = create_report(*count);
        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("findings", count), &report, |b, report| {
            b.iter(|| black_box(digest(report).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark the anchored bundle digest
fn bench_bundle_digest(c: &mut Criterion) {
    let cipher = IdentityCipher::with_iterations(1_000).unwrap();
    let id = RecordId::new("aud-1");
    let ciphertext = cipher
        .encrypt(&create_report(10), &Identity::new(CREATOR), &id)
        .unwrap();
    let entry = LedgerEntry {
        record_id: id,
        creator_identity: Identity::new(CREATOR),
        timestamp_seconds: 1_700_000_000,
        digest: Digest([0; 32]),
        storage_link: StorageLink::new("ipfs://bafybench"),
    };

    c.bench_function("bundle_digest", |b| {
        b.iter(|| black_box(digest_serializable(&ProvenanceBundle::for_entry(&ciphertext, &entry)).unwrap()));
    });
}

/// Benchmark encryption at different key-derivation costs
fn bench_cipher(c: &mut Criterion) {
    let mut group = c.benchmark_group("cipher");
    group.sample_size(10);

    let report = create_report(10);
    let creator = Identity::new(CREATOR);
    let id = RecordId::new("aud-1");

    for iterations in [1_000u32, 100_000].iter() {
        let cipher = IdentityCipher::with_iterations(*iterations).unwrap();
        let ciphertext = cipher.encrypt(&report, &creator, &id).unwrap();

        group.bench_with_input(BenchmarkId::new("encrypt", iterations), &cipher, |b, cipher| {
            b.iter(|| black_box(cipher.encrypt(&report, &creator, &id).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decrypt", iterations), &cipher, |b, cipher| {
            b.iter(|| black_box(cipher.decrypt(&ciphertext, &creator, &id).unwrap()));
        });
    }

    group.finish();
}

/// Benchmark unwrapping fetched blobs
fn bench_normalize_fetched(c: &mut Criterion) {
    let cipher = IdentityCipher::with_iterations(1_000).unwrap();
    let ciphertext = cipher
        .encrypt(&create_report(100), &Identity::new(CREATOR), &RecordId::new("aud-1"))
        .unwrap();
    let envelope = StoredEnvelope::new(ciphertext.clone()).to_bytes().unwrap();
    let nested = serde_json::to_vec(&json!({
        "result": [{"pinataContent": {"encryptedData": ciphertext}}]
    }))
    .unwrap();

    let mut group = c.benchmark_group("normalize_fetched");
    group.bench_function("raw", |b| {
        b.iter(|| black_box(normalize_fetched(ciphertext.as_str().as_bytes()).unwrap()));
    });
    group.bench_function("envelope", |b| {
        b.iter(|| black_box(normalize_fetched(&envelope).unwrap()));
    });
    group.bench_function("nested", |b| {
        b.iter(|| black_box(normalize_fetched(&nested).unwrap()));
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_record_digest,
    bench_bundle_digest,
    bench_cipher,
    bench_normalize_fetched,
);
criterion_main!(benches);
