use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use lockmark_core::crypto::{aead_open, aead_seal, hkdf_sha256, kdf_argon2id, KeyMaterial};
use std::hint::black_box;
use std::time::Duration;

fn bench_key_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("key_derivation");
    group.measurement_time(Duration::from_secs(30)); // Argon2id is slow by design

    let salt = vec![0u8; 32];
    let passwords = ["short", "medium_length_password", "correct horse battery staple"];

    // Mirrors the three cost tiers a real deployment would offer: a fast
    // tier for CI/dev, the interactive default, and a high-security tier.
    let kdf_configs = [
        ("interactive", 19_456u32, 2u32, 1u32),
        ("default", 65_536, 3, 1),
        ("high_security", 131_072, 4, 2),
    ];

    for (name, m_cost_kib, t_cost, p_cost) in kdf_configs {
        for password in passwords {
            group.bench_with_input(
                BenchmarkId::new(name, password.len()),
                &password,
                |b, password| {
                    b.iter(|| {
                        black_box(kdf_argon2id(password.as_bytes(), &salt, m_cost_kib, t_cost, p_cost).unwrap())
                    });
                },
            );
        }
    }

    group.finish();
}

fn bench_hkdf(c: &mut Criterion) {
    let mut group = c.benchmark_group("hkdf");
    let ikm = KeyMaterial::random().unwrap();
    let salt = [0u8; 16];

    group.bench_function("derive_sub_key", |b| {
        b.iter(|| black_box(hkdf_sha256(ikm.as_bytes(), &salt, b"VAULT/MAK v1").unwrap()));
    });

    group.finish();
}

fn bench_aead_operations(c: &mut Criterion) {
    let mut group = c.benchmark_group("aead_operations");
    let key = KeyMaterial::random().unwrap();
    let aad = b"u_1|v_1|manifest_v1";

    // Manifests are small (bookmark indexes), so this sweeps realistic sizes
    // rather than the large-blob range a generic AEAD benchmark might use.
    let sizes = [64, 1024, 16 * 1024, 256 * 1024];

    for size in sizes {
        let plaintext = vec![0u8; size];

        group.bench_with_input(BenchmarkId::new("seal", size), &plaintext, |b, plaintext| {
            b.iter(|| black_box(aead_seal(&key, aad, plaintext).unwrap()));
        });

        let (nonce, ciphertext) = aead_seal(&key, aad, &plaintext).unwrap();
        group.bench_with_input(BenchmarkId::new("open", size), &(&nonce, &ciphertext), |b, (nonce, ciphertext)| {
            b.iter(|| black_box(aead_open(&key, nonce, aad, ciphertext).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_key_derivation, bench_hkdf, bench_aead_operations);
criterion_main!(benches);
