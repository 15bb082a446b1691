use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use glam::DVec3;
use shoal_core::{ShoalConfig, ShoalWorld};
use shoal_index::UniformGridIndex;
use std::time::Duration;

fn bench_world_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("world_step");
    let samples: usize = std::env::var("SHOAL_BENCH_SAMPLES")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(30);
    let measure: u64 = std::env::var("SHOAL_BENCH_MEASURE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .unwrap_or(5);
    group.sample_size(samples);
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(measure));
    // Steps per bench iteration (can override via SHOAL_BENCH_STEPS)
    let steps: usize = std::env::var("SHOAL_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64);
    let capacities: Vec<usize> = std::env::var("SHOAL_BENCH_CAPACITY")
        .ok()
        .map(|s| {
            s.split(',')
                .filter_map(|t| t.trim().parse::<usize>().ok())
                .collect::<Vec<_>>()
        })
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| vec![50_usize, 500, 2000]);
    for &capacity in &capacities {
        group.bench_function(format!("steps{steps}_capacity{capacity}"), |b| {
            b.iter_batched(
                || {
                    let mut config = ShoalConfig::default();
                    config.pool.capacity = capacity;
                    config.rng_seed = Some(0xBEEF);
                    config.history_capacity = 0;
                    // Dense grid so large capacities are not capped.
                    config.layout.min_height_separation = 0.02;
                    config.layout.min_radius_separation = 0.02;
                    config.layout.min_angle_separation = 5.0;
                    let index = UniformGridIndex::new(0.5).expect("grid");
                    let mut world =
                        ShoalWorld::with_threats(config, Box::new(index)).expect("world");
                    world.spawn_all();
                    let hands: Vec<DVec3> = (0..4)
                        .map(|i| {
                            let angle = f64::from(i) * std::f64::consts::FRAC_PI_2;
                            DVec3::new(angle.cos() * 1.5, 1.2, angle.sin() * 1.5)
                        })
                        .collect();
                    world.set_threats(&hands).expect("threats");
                    world
                },
                |mut world| {
                    for _ in 0..steps {
                        world.step(1.0 / 60.0);
                    }
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_world_steps);
criterion_main!(benches);
