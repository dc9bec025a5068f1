use ciot_common::digest::sha256;
use ciot_common::ec::mul_generator;
use ciot_common::ecdsa::{sign, sign_with, verify, NonceStrategy, PrivateKey};
use ciot_common::U256;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

const KEY: [u8; 32] = [0x5a; 32];

fn bench_scalar_mul(c: &mut Criterion) {
    let k = U256::from_be_bytes(&KEY);

    c.bench_function("p256_mul_generator", |b| {
        b.iter(|| black_box(mul_generator(black_box(&k)).to_affine()));
    });
}

fn bench_sign_deterministic(c: &mut Criterion) {
    let key = PrivateKey::from_bytes(&KEY).unwrap();
    let digest = sha256(b"eyJhbGciOiJFUzI1NiIsInR5cCI6IkpXVCJ9.eyJpYXQiOjB9");

    c.bench_function("ecdsa_sign_rfc6979", |b| {
        b.iter(|| black_box(sign(black_box(&digest), &key)));
    });
}

fn bench_sign_random(c: &mut Criterion) {
    let key = PrivateKey::from_bytes(&KEY).unwrap();
    let digest = sha256(b"eyJhbGciOiJFUzI1NiIsInR5cCI6IkpXVCJ9.eyJpYXQiOjB9");

    c.bench_function("ecdsa_sign_random", |b| {
        b.iter(|| black_box(sign_with(black_box(&digest), &key, NonceStrategy::Random)));
    });
}

fn bench_verify(c: &mut Criterion) {
    let key = PrivateKey::from_bytes(&KEY).unwrap();
    let public = key.public_key();
    let digest = sha256(b"payload");
    let sig = sign(&digest, &key);

    c.bench_function("ecdsa_verify", |b| {
        b.iter(|| black_box(verify(&public, black_box(&digest), &sig)));
    });
}

criterion_group!(
    benches,
    bench_scalar_mul,
    bench_sign_deterministic,
    bench_sign_random,
    bench_verify,
);
criterion_main!(benches);
