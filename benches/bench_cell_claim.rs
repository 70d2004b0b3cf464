// benches/bench_cell_claim.rs

use city_traffic::simulation_engine::grid::Cell;
use city_traffic::simulation_engine::occupancy::OccupancyState;
use criterion::{
    black_box, criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion,
    PlotConfiguration,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const WIDTH: usize = 28;

// Each car drives laps around its own row, claiming one cell per step.
fn drive_laps(occupancy: &OccupancyState, car: u32, row: i32, steps: usize) {
    let mut at = Cell::new(0, row);
    occupancy.place(car, at);
    for step in 1..=steps {
        let next = Cell::new((step % WIDTH) as i32, row);
        black_box(occupancy.claim(car, at, next, false));
        at = next;
    }
    occupancy.release(car, at);
}

fn bench_cell_claim(c: &mut Criterion) {
    let mut group = c.benchmark_group("cell_claim");
    group.sample_size(50);
    group.measurement_time(Duration::from_secs(5));
    group.warm_up_time(Duration::from_secs(2));
    group.plot_config(PlotConfiguration::default().summary_scale(AxisScale::Linear));

    // Threads contending for the single occupancy lock.
    for &cars in [1u32, 4, 16].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(cars), &cars, |b, &cars| {
            let occupancy = Arc::new(OccupancyState::with_size(WIDTH, WIDTH));
            b.iter(|| {
                let handles: Vec<_> = (0..cars)
                    .map(|car| {
                        let occupancy = Arc::clone(&occupancy);
                        thread::spawn(move || drive_laps(&occupancy, car + 1, car as i32, 1_000))
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_cell_claim);
criterion_main!(benches);
