//! Concurrency stress driver: many clerks hammering the same small hotel.
//!
//! Run with `cargo bench`. Prints latency percentiles per operation and
//! verifies the no-overlap invariant at the end.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use rust_decimal_macros::dec;

use frontdesk::engine::{Engine, EngineError};
use frontdesk::model::Access;

const WORKERS: usize = 16;
const ATTEMPTS_PER_WORKER: usize = 250;
const ROOMS: usize = 10;
const WINDOW_DAYS: u64 = 90;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.2}ms, p50={:.2}ms, p95={:.2}ms, p99={:.2}ms, max={:.2}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies.last().unwrap().as_secs_f64() * 1000.0,
    );
}

struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

fn bench_wal() -> PathBuf {
    let dir = std::env::temp_dir().join("frontdesk_bench");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("stress.wal");
    let _ = std::fs::remove_file(&path);
    path
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let engine = Arc::new(Engine::new(bench_wal()).expect("engine"));

    let type_id = engine
        .create_room_type("Standard", dec!(100.00), 2)
        .await
        .unwrap();
    let mut rooms = Vec::with_capacity(ROOMS);
    for i in 0..ROOMS {
        rooms.push(engine.create_room(type_id, &format!("{}", 100 + i)).await.unwrap());
    }
    let client_id = engine
        .create_client("Stress Clerk", "ZZ0000", dec!(100.00))
        .await
        .unwrap();
    println!("  created {ROOMS} rooms");

    let base = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let started = Instant::now();

    let mut handles = Vec::new();
    for w in 0..WORKERS {
        let engine = engine.clone();
        let rooms = rooms.clone();
        let mut rng = XorShift(0x9E3779B97F4A7C15 ^ (w as u64 + 1));
        handles.push(tokio::spawn(async move {
            let mut create_lat = Vec::with_capacity(ATTEMPTS_PER_WORKER);
            let mut query_lat = Vec::new();
            let mut created = Vec::new();
            let mut conflicts = 0usize;

            for i in 0..ATTEMPTS_PER_WORKER {
                let room = rooms[(rng.next() % rooms.len() as u64) as usize];
                let offset = rng.next() % WINDOW_DAYS;
                let len = 1 + rng.next() % 5;
                let start = base + chrono::Days::new(offset);
                let end = start + chrono::Days::new(len);

                let t = Instant::now();
                match engine
                    .create_booking(room, start, end, None, &[client_id])
                    .await
                {
                    Ok(id) => created.push(id),
                    Err(EngineError::RoomUnavailable(_)) => conflicts += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
                create_lat.push(t.elapsed());

                // Sprinkle availability queries and the odd cancellation.
                if i % 10 == 0 {
                    let t = Instant::now();
                    engine
                        .free_rooms(start, end, Access::Full)
                        .await
                        .unwrap();
                    query_lat.push(t.elapsed());
                }
                if i % 25 == 0
                    && let Some(id) = created.pop() {
                        engine.delete_booking(id).await.unwrap();
                    }
            }

            (create_lat, query_lat, created.len(), conflicts)
        }));
    }

    let mut create_lat = Vec::new();
    let mut query_lat = Vec::new();
    let mut held = 0usize;
    let mut conflicts = 0usize;
    for h in handles {
        let (c, q, kept, rejected) = h.await.unwrap();
        create_lat.extend(c);
        query_lat.extend(q);
        held += kept;
        conflicts += rejected;
    }

    let elapsed = started.elapsed();
    let attempts = WORKERS * ATTEMPTS_PER_WORKER;
    println!(
        "  {attempts} attempts in {:.2}s ({:.0}/s), {held} held, {conflicts} conflicts",
        elapsed.as_secs_f64(),
        attempts as f64 / elapsed.as_secs_f64(),
    );
    print_latency("create_booking", &mut create_lat);
    print_latency("free_rooms", &mut query_lat);

    // Invariant check: no room carries overlapping stays.
    let bookings = engine.list_bookings().await.unwrap();
    for (i, a) in bookings.iter().enumerate() {
        for b in &bookings[i + 1..] {
            if a.room_id == b.room_id {
                assert!(
                    !a.stay.overlaps(&b.stay),
                    "overlap between bookings {} and {}",
                    a.booking_id,
                    b.booking_id
                );
            }
        }
    }
    println!("  invariant ok: {} bookings, no overlaps", bookings.len());
}
