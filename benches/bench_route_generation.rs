// benches/bench_route_generation.rs

use city_traffic::simulation_engine::grid::CityGrid;
use city_traffic::simulation_engine::route_generation::{
    generate_route_with_retry, RouteBounds,
};
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration,
};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::time::Duration;

// Generates a full set of routes, one per car, on the built-in city.
fn bench_route_generation(c: &mut Criterion) {
    let grid = match CityGrid::default_city() {
        Ok(grid) => grid,
        Err(err) => panic!("built-in city failed to parse: {}", err),
    };
    let bounds = RouteBounds {
        min_len: 25,
        max_len: 50,
    };

    let mut group = c.benchmark_group("route_generation");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    for &cars in [1usize, 10, 30].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(cars), &cars, |b, &cars| {
            let mut rng = SmallRng::seed_from_u64(7);
            b.iter(|| {
                let mut used = HashSet::new();
                for _ in 0..cars {
                    black_box(
                        generate_route_with_retry(&grid, &mut rng, bounds, &mut used, 100).ok(),
                    );
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_route_generation);
criterion_main!(benches);
