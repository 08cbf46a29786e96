use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use chrono::{Days, NaiveDate};
use ulid::Ulid;

use clubres::calendar::{Day, DayRange};
use clubres::config::Config;
use clubres::engine::{BookingRequest, ConflictProbe, Engine, HoldSyncRequest};
use clubres::model::{Category, PaymentStatus, PricingType, Rates, TimeSlot};

const RATES: Rates = Rates {
    member: 5_000,
    guest: 8_000,
};

fn day(offset: u64) -> Day {
    let base = NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid base date");
    Day::from(base + Days::new(offset))
}

fn stay(offset: u64, nights: u64) -> DayRange {
    DayRange {
        start: day(offset),
        end: day(offset + nights),
    }
}

fn request(resource_id: Ulid, range: DayRange, time_slot: Option<TimeSlot>) -> BookingRequest {
    BookingRequest {
        id: Ulid::new(),
        resource_id,
        range,
        time_slot,
        pricing_type: PricingType::Member,
        status: PaymentStatus::Unpaid,
        paid_amount: 0,
        paid_by: None,
        guest: None,
    }
}

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: no samples");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

async fn create(engine: &Engine, category: Category) -> Ulid {
    let id = Ulid::new();
    engine
        .create_resource(id, category, None, RATES, true)
        .await
        .expect("create resource");
    id
}

async fn phase1_sequential(engine: &Engine) {
    let rid = create(engine, Category::Room).await;
    // Back-to-back two-night stays; each one starts on the previous check-out day.
    let n = 300;
    let mut latencies = Vec::with_capacity(n);
    let start = Instant::now();

    for i in 0..n as u64 {
        let t = Instant::now();
        engine
            .create_booking(request(rid, stay(i * 2, 2), None))
            .await
            .expect("sequential booking");
        latencies.push(t.elapsed());
    }

    let elapsed = start.elapsed();
    let ops = n as f64 / elapsed.as_secs_f64();
    println!("  {n} bookings in {:.2}s = {ops:.0} ops/sec", elapsed.as_secs_f64());
    print_latency("write latency", &mut latencies);
}

async fn phase2_concurrent(engine: &Arc<Engine>) {
    let n_tasks = 10;
    let n_per_task = 150;

    let start = Instant::now();
    let mut handles = Vec::new();

    for _ in 0..n_tasks {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            // Each task owns its room so every write commits.
            let rid = create(&engine, Category::Room).await;
            for j in 0..n_per_task as u64 {
                engine
                    .create_booking(request(rid, stay(j, 1), None))
                    .await
                    .expect("concurrent booking");
            }
        }));
    }

    for h in handles {
        h.await.expect("task panicked");
    }

    let elapsed = start.elapsed();
    let total = n_tasks * n_per_task;
    let ops = total as f64 / elapsed.as_secs_f64();
    println!(
        "  {n_tasks} tasks x {n_per_task} bookings = {total} total in {:.2}s = {ops:.0} ops/sec",
        elapsed.as_secs_f64()
    );
}

async fn phase3_read_under_load(engine: &Arc<Engine>) {
    let rid = create(engine, Category::Room).await;
    for i in 0..150u64 {
        engine
            .create_booking(request(rid, stay(i * 2, 1), None))
            .await
            .expect("prefill booking");
    }

    let stop = Arc::new(AtomicBool::new(false));
    let mut writer_handles = Vec::new();
    for _ in 0..5 {
        let engine = engine.clone();
        let stop = stop.clone();
        writer_handles.push(tokio::spawn(async move {
            let wrid = create(&engine, Category::Room).await;
            let mut i = 0u64;
            while !stop.load(Ordering::Relaxed) && i < 300 {
                let _ = engine.create_booking(request(wrid, stay(i, 1), None)).await;
                i += 1;
            }
        }));
    }

    let n_readers = 10;
    let reads_per_reader = 500;
    let window = DayRange {
        start: day(0),
        end: day(364),
    };
    let mut reader_handles = Vec::new();

    for r in 0..n_readers {
        let engine = engine.clone();
        reader_handles.push(tokio::spawn(async move {
            let mut latencies = Vec::with_capacity(reads_per_reader * 2);
            for k in 0..reads_per_reader as u64 {
                let t = Instant::now();
                engine.timeline(rid, window).await.expect("timeline");
                latencies.push(t.elapsed());

                let t = Instant::now();
                let probe = ConflictProbe::booking(stay((r as u64 + k) % 300, 2), None);
                engine.check_conflict(rid, probe).await.expect("conflict check");
                latencies.push(t.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for h in reader_handles {
        all_latencies.extend(h.await.expect("reader panicked"));
    }

    stop.store(true, Ordering::Relaxed);
    for h in writer_handles {
        let _ = h.await;
    }

    print_latency("timeline + conflict check", &mut all_latencies);
}

async fn phase4_hold_storm(engine: &Arc<Engine>) {
    let n_halls = 50;
    let mut halls = Vec::with_capacity(n_halls);
    for _ in 0..n_halls {
        halls.push(create(engine, Category::Hall).await);
    }

    // Every task toggles the same batch; the per-resource locks serialize them.
    let n_tasks = 20;
    let applied = Arc::new(AtomicUsize::new(0));
    let start = Instant::now();
    let mut handles = Vec::new();
    for t in 0..n_tasks {
        let engine = engine.clone();
        let halls = halls.clone();
        let applied = applied.clone();
        handles.push(tokio::spawn(async move {
            let req = HoldSyncRequest {
                resource_ids: halls,
                range: DayRange::single(day(200)),
                time_slot: Some(TimeSlot::Evening),
                reserved: t % 2 == 0,
                created_by: "bench".into(),
                remarks: None,
            };
            if let Ok(plan) = engine.sync_holds(req).await
                && !plan.is_empty()
            {
                applied.fetch_add(1, Ordering::Relaxed);
            }
        }));
    }
    for h in handles {
        let _ = h.await;
    }

    let elapsed = start.elapsed();
    let applied = applied.load(Ordering::Relaxed);
    println!(
        "  {n_tasks} syncs over {n_halls} halls: {applied} changed state in {:.2}s",
        elapsed.as_secs_f64()
    );
}

#[tokio::main]
async fn main() {
    let config = Config {
        data_dir: std::env::var("CLUBRES_DATA_DIR")
            .map(Into::into)
            .unwrap_or_else(|_| std::env::temp_dir().join(format!("clubres_bench_{}", Ulid::new()))),
        ..Config::default()
    };

    println!("=== clubres stress benchmark ===");
    println!("journal: {}\n", config.journal_path().display());

    let engine = Engine::open(&config).expect("open engine");

    println!("[phase 1] sequential write throughput");
    phase1_sequential(&engine).await;

    println!("\n[phase 2] concurrent write throughput");
    phase2_concurrent(&engine).await;

    println!("\n[phase 3] read latency under write load");
    phase3_read_under_load(&engine).await;

    println!("\n[phase 4] bulk hold storm");
    phase4_hold_storm(&engine).await;

    println!("\n=== benchmark complete ===");
}
