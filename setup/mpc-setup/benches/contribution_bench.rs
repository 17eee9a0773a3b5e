use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use mpc_setup::phase1::{Phase1, Phase1Secrets};
use mpc_setup::utils::{RandomGenerator, RandomStrategy};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;

fn seeded_generator() -> RandomGenerator {
    let mut seed = [0u8; 32];
    ChaCha20Rng::seed_from_u64(7).fill_bytes(&mut seed);
    RandomGenerator::new(RandomStrategy::UserInput, seed)
}

fn bench_phase1_contribute(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase1_contribute");
    group.sample_size(10);
    for log_n in [6usize, 8, 10] {
        let n = 1 << log_n;
        let genesis = Phase1::new(n).unwrap();
        let mut rng = seeded_generator();
        group.bench_with_input(BenchmarkId::from_parameter(n), &genesis, |b, g| {
            b.iter(|| {
                let secrets = Phase1Secrets::generate(&mut rng);
                black_box(g.clone().contribute(&secrets).unwrap())
            })
        });
    }
    group.finish();
}

fn bench_phase1_verify(c: &mut Criterion) {
    let mut group = c.benchmark_group("phase1_verify");
    group.sample_size(10);
    for log_n in [6usize, 8, 10] {
        let n = 1 << log_n;
        let genesis = Phase1::new(n).unwrap();
        let mut rng = seeded_generator();
        let (next, proof) = genesis
            .clone()
            .contribute(&Phase1Secrets::generate(&mut rng))
            .unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(n), &next, |b, next| {
            b.iter(|| genesis.verify(black_box(next), &proof).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_phase1_contribute, bench_phase1_verify);
criterion_main!(benches);
