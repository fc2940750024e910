//! Simulation, benchmark, and stress-test runners for the chip factory.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::chip_stack::ChipStack;
use crate::log_dev;
use crate::types::{Chip, ConfigError};
use crate::workers::{self, EmptyPolicy};

// Demo sizing (small for quick CLI feedback).
const DEMO_WORKERS: usize = 2;
const DEMO_CHIPS: usize = 5;
const DEMO_INTERVAL_MS: u64 = 150;
const DEMO_COST_UNIT_MS: u64 = 100;
// Backoff used by polling workers when the poll flag is set.
const POLL_BACKOFF_MS: u64 = 1;

const CSV_HEADER: &str = "workers,chips,interval_ms,cost_unit_ms,produced,soldered,\
elapsed_ms,throughput_chips_per_s,cpu_user_s,cpu_sys_s,max_depth,leftover,duplicate_chips";

/// Best-effort CPU user/system time snapshot on Unix platforms.
struct CpuTimes {
    user_s: f64,
    sys_s: f64,
}

#[cfg(unix)]
fn cpu_times() -> Option<CpuTimes> {
    use libc::{RUSAGE_SELF, getrusage, rusage, timeval};

    fn seconds(tv: timeval) -> f64 {
        tv.tv_sec as f64 + tv.tv_usec as f64 / 1_000_000.0
    }

    let mut usage: rusage = unsafe { std::mem::zeroed() };
    let rc = unsafe { getrusage(RUSAGE_SELF, &mut usage) };
    if rc != 0 {
        return None;
    }
    Some(CpuTimes {
        user_s: seconds(usage.ru_utime),
        sys_s: seconds(usage.ru_stime),
    })
}

/// Stub on non-Unix platforms.
#[cfg(not(unix))]
fn cpu_times() -> Option<CpuTimes> {
    None
}

/// Startup parameters for one factory run.
pub struct FactoryConfig {
    pub workers: usize,
    pub chips: usize,
    pub interval: Duration,
    pub cost_unit: Duration,
    pub policy: EmptyPolicy,
}

impl FactoryConfig {
    /// Fail fast before any thread is spawned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::NoWorkers);
        }
        Ok(())
    }
}

fn policy_for(poll: bool) -> EmptyPolicy {
    if poll {
        EmptyPolicy::Poll {
            backoff: Duration::from_millis(POLL_BACKOFF_MS),
        }
    } else {
        EmptyPolicy::Block
    }
}

/// Raw measurements from one producer/worker run.
struct RunStats {
    produced: usize,
    per_worker: Vec<usize>,
    duplicate_chips: bool,
    leftover: usize,
    max_depth: usize,
    elapsed: Duration,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
}

/// Spawn the producer and workers on named threads, join them, and collect
/// the run's measurements. `config` must already be validated.
fn run_once(config: &FactoryConfig, validate: bool) -> RunStats {
    let stack = Arc::new(ChipStack::new());
    let seen = if validate {
        Some(Arc::new(Mutex::new(HashSet::new())))
    } else {
        None
    };
    let duplicate = Arc::new(AtomicBool::new(false));

    let cpu_before = cpu_times();
    let start = Instant::now();

    let producer = {
        let stack = Arc::clone(&stack);
        let (quota, interval) = (config.chips, config.interval);
        thread::Builder::new()
            .name("producer".to_string())
            .spawn(move || workers::producer_loop(&stack, quota, interval, Chip::random))
            .expect("failed to spawn producer")
    };

    let mut handles = Vec::new();
    for worker_id in 0..config.workers {
        let stack = Arc::clone(&stack);
        let seen = seen.as_ref().map(Arc::clone);
        let duplicate = Arc::clone(&duplicate);
        let (policy, cost_unit) = (config.policy, config.cost_unit);
        let handle = thread::Builder::new()
            .name(format!("worker-{worker_id}"))
            .spawn(move || {
                workers::consumer_loop(&stack, policy, cost_unit, |chip| {
                    if let Some(seen) = seen.as_ref() {
                        let mut guard = seen.lock().expect("seen mutex poisoned");
                        if !guard.insert(chip.id) {
                            duplicate.store(true, Ordering::SeqCst);
                        }
                    }
                })
            })
            .expect("failed to spawn worker");
        handles.push(handle);
    }

    let produced = producer.join().expect("producer thread panicked");
    debug_assert!(stack.is_producer_done(), "producer exited without closing");
    let per_worker: Vec<usize> = handles
        .into_iter()
        .map(|handle| handle.join().expect("worker thread panicked"))
        .collect();
    log_dev!("[STACK] depth after shutdown = {}", stack.len());

    // Workers only exit once the stack is drained; anything left is a bug.
    let mut leftover = 0usize;
    while stack.try_pop().is_some() {
        leftover += 1;
    }

    let elapsed = start.elapsed();
    let (cpu_user_s, cpu_sys_s) = match (cpu_before, cpu_times()) {
        (Some(before), Some(after)) => (
            Some(after.user_s - before.user_s),
            Some(after.sys_s - before.sys_s),
        ),
        _ => (None, None),
    };

    RunStats {
        produced,
        per_worker,
        duplicate_chips: duplicate.load(Ordering::SeqCst),
        leftover,
        max_depth: stack.max_depth(),
        elapsed,
        cpu_user_s,
        cpu_sys_s,
    }
}

/// Aggregated metrics from a single benchmark run.
struct BenchResult {
    workers: usize,
    chips: usize,
    interval_ms: u64,
    cost_unit_ms: u64,
    produced: usize,
    soldered: usize,
    elapsed_ms: f64,
    throughput: f64,
    cpu_user_s: Option<f64>,
    cpu_sys_s: Option<f64>,
    max_depth: usize,
    leftover: usize,
    duplicate_chips: bool,
}

fn benchmark_once(config: &FactoryConfig, validate: bool) -> BenchResult {
    let stats = run_once(config, validate);
    let soldered: usize = stats.per_worker.iter().sum();
    let elapsed_ms = stats.elapsed.as_millis() as f64;
    let throughput = if elapsed_ms > 0.0 {
        (soldered as f64) / (elapsed_ms / 1000.0)
    } else {
        0.0
    };
    BenchResult {
        workers: config.workers,
        chips: config.chips,
        interval_ms: config.interval.as_millis() as u64,
        cost_unit_ms: config.cost_unit.as_millis() as u64,
        produced: stats.produced,
        soldered,
        elapsed_ms,
        throughput,
        cpu_user_s: stats.cpu_user_s,
        cpu_sys_s: stats.cpu_sys_s,
        max_depth: stats.max_depth,
        leftover: stats.leftover,
        duplicate_chips: stats.duplicate_chips,
    }
}

fn print_bench_result(result: &BenchResult, validate: bool) {
    let cpu_user = result
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = result
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    println!(
        "{},{},{},{},{},{},{:.2},{:.2},{},{},{},{},{}",
        result.workers,
        result.chips,
        result.interval_ms,
        result.cost_unit_ms,
        result.produced,
        result.soldered,
        result.elapsed_ms,
        result.throughput,
        cpu_user,
        cpu_sys,
        result.max_depth,
        result.leftover,
        result.duplicate_chips
    );
    if result.leftover > 0 {
        eprintln!("# warning,leftover_chips,{}", result.leftover);
    }
    if validate {
        if result.duplicate_chips {
            eprintln!("# violation,duplicate_chips");
        }
        if result.produced != result.soldered + result.leftover {
            eprintln!("# violation,chip_accounting");
        }
    }
}

/// Run the default demo showing production, soldering, and shutdown.
pub fn run_demo() {
    log_dev!("[DEMO] start");

    let config = FactoryConfig {
        workers: DEMO_WORKERS,
        chips: DEMO_CHIPS,
        interval: Duration::from_millis(DEMO_INTERVAL_MS),
        cost_unit: Duration::from_millis(DEMO_COST_UNIT_MS),
        policy: EmptyPolicy::Block,
    };
    if let Err(err) = config.validate() {
        eprintln!("demo error: {err}");
        return;
    }

    let stats = run_once(&config, true);
    log_dev!(
        "[DEMO] finished in {}ms (dev logs suppressed in release mode)",
        stats.elapsed.as_millis()
    );

    let soldered: usize = stats.per_worker.iter().sum();
    println!("DEMO SUMMARY");
    println!(
        "workers={} chips_planned={}",
        config.workers, config.chips
    );
    println!("chips_produced={}", stats.produced);
    println!("chips_soldered={soldered}");
    println!("chips_per_worker_done={:?}", stats.per_worker);
    println!("max_depth_observed={}", stats.max_depth);
    println!("leftover={}", stats.leftover);
    println!("duplicate_chips={}", stats.duplicate_chips);
}

/// Run a single benchmark with optional parameter overrides.
pub fn run_benchmark(
    workers: Option<usize>,
    chips: Option<usize>,
    interval_ms: Option<u64>,
    cost_unit_ms: Option<u64>,
    validate: bool,
    poll: bool,
) {
    let config = FactoryConfig {
        workers: workers.unwrap_or(4),
        chips: chips.unwrap_or(200),
        interval: Duration::from_millis(interval_ms.unwrap_or(0)),
        cost_unit: Duration::from_millis(cost_unit_ms.unwrap_or(1)),
        policy: policy_for(poll),
    };
    if let Err(err) = config.validate() {
        eprintln!("benchmark error: {err}");
        return;
    }

    let result = benchmark_once(&config, validate);
    println!("{CSV_HEADER}");
    print_bench_result(&result, validate);
}

/// Sweep multiple factory configurations and print CSV output.
pub fn run_stress(
    worker_sets: Option<Vec<usize>>,
    chip_sets: Option<Vec<usize>>,
    interval_sets: Option<Vec<u64>>,
    cost_unit_ms: Option<u64>,
    validate: bool,
    poll: bool,
) {
    let default_worker_sets = [1usize, 2, 4, 8];
    let default_chip_sets = [10usize, 50, 100];
    let default_interval_sets = [0u64, 1, 5];
    let cost_unit_ms = cost_unit_ms.unwrap_or(1);

    let worker_sets = worker_sets.unwrap_or_else(|| default_worker_sets.to_vec());
    let chip_sets = chip_sets.unwrap_or_else(|| default_chip_sets.to_vec());
    let interval_sets = interval_sets.unwrap_or_else(|| default_interval_sets.to_vec());
    if worker_sets.iter().any(|&workers| workers == 0) {
        eprintln!("stress error: {}", ConfigError::NoWorkers);
        return;
    }

    println!("{CSV_HEADER}");
    for workers in worker_sets {
        for chips in chip_sets.iter().copied() {
            for interval_ms in interval_sets.iter().copied() {
                let config = FactoryConfig {
                    workers,
                    chips,
                    interval: Duration::from_millis(interval_ms),
                    cost_unit: Duration::from_millis(cost_unit_ms),
                    policy: policy_for(poll),
                };
                let result = benchmark_once(&config, validate);
                print_bench_result(&result, validate);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_workers_is_rejected_before_spawning() {
        let config = FactoryConfig {
            workers: 0,
            chips: 10,
            interval: Duration::ZERO,
            cost_unit: Duration::ZERO,
            policy: EmptyPolicy::Block,
        };
        assert_eq!(config.validate(), Err(ConfigError::NoWorkers));
    }

    #[test]
    fn run_once_accounts_for_every_chip() {
        let config = FactoryConfig {
            workers: 3,
            chips: 60,
            interval: Duration::ZERO,
            cost_unit: Duration::ZERO,
            policy: EmptyPolicy::Block,
        };
        config.validate().expect("config should be valid");
        let stats = run_once(&config, true);
        let soldered: usize = stats.per_worker.iter().sum();
        assert_eq!(stats.produced, 60);
        assert_eq!(soldered, 60);
        assert_eq!(stats.leftover, 0);
        assert!(!stats.duplicate_chips);
        assert!(stats.max_depth >= 1);
    }
}
