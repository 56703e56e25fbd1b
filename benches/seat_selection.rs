use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use uuid::Uuid;

use screening_booking::models::TimeWindow;
use screening_booking::services::allocator::select_seats;

fn bench_select_seats(c: &mut Criterion) {
    let mut group = c.benchmark_group("select_seats");
    for size in [50usize, 500, 5_000] {
        let vacant: Vec<Uuid> = (0..size).map(|_| Uuid::new_v4()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(size), &vacant, |b, vacant| {
            b.iter(|| select_seats(black_box(vacant), black_box((size / 2) as i32)))
        });
    }
    group.finish();
}

fn bench_overlap(c: &mut Criterion) {
    let day = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
    let windows: Vec<TimeWindow> = (0..48)
        .map(|slot| TimeWindow::new(day.and_hms_opt(0, 0, 0).unwrap() + chrono::Duration::minutes(30 * slot), 1800).unwrap())
        .collect();
    let candidate = TimeWindow::new(day.and_hms_opt(12, 15, 0).unwrap(), 3600).unwrap();

    c.bench_function("overlap_scan_day", |b| {
        b.iter(|| windows.iter().filter(|w| w.overlaps(black_box(&candidate))).count())
    });
}

criterion_group!(benches, bench_select_seats, bench_overlap);
criterion_main!(benches);
