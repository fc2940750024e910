//! Producer and worker loop bodies, run on plain threads owned by the
//! simulation runners.

use std::thread;
use std::time::Duration;

use crate::chip_stack::{ChipStack, PopAttempt};
use crate::log_dev;
use crate::types::{Chip, ChipId};

/// What a worker does when the stack is momentarily empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EmptyPolicy {
    /// Park on the stack's condvar until a push or shutdown arrives.
    Block,
    /// Re-poll after sleeping for the backoff; yields when the backoff is
    /// zero so the producer is never starved of the lock.
    Poll { backoff: Duration },
}

/// Produce `quota` chips, pausing `interval` between pushes, then mark the
/// stack done. Returns the number of chips actually pushed.
///
/// `make_chip` receives the push sequence number as the chip id; the
/// simulation passes [`Chip::random`], tests may force costs.
pub fn producer_loop<F>(
    stack: &ChipStack,
    quota: usize,
    interval: Duration,
    mut make_chip: F,
) -> usize
where
    F: FnMut(ChipId) -> Chip,
{
    let mut produced = 0usize;
    for seq in 0..quota {
        let chip = make_chip(seq as ChipId);
        let (id, cost, grade) = (chip.id, chip.cost, chip.grade());
        log_dev!("[CHIP] created {grade} chip {id} (cost {cost})");
        match stack.push(chip) {
            Ok(depth) => {
                produced += 1;
                log_dev!("[STACK] pushed {grade} chip {id} depth={depth}");
            }
            Err(returned) => {
                // The stack was closed early; stop producing.
                log_dev!("[STACK] closed, dropping chip {}", returned.id);
                break;
            }
        }
        if seq + 1 < quota && !interval.is_zero() {
            thread::sleep(interval);
        }
    }
    stack.mark_producer_done();
    log_dev!("[PRODUCER] finished after {produced} chips");
    produced
}

/// Drain chips from the stack until it is drained for good, soldering each
/// one for `cost × cost_unit`. Returns the number of chips soldered.
///
/// `on_pop` runs before soldering and is the hook the runners use for
/// validation bookkeeping. Soldering happens strictly after the chip left
/// the stack; no lock is held while sleeping.
pub fn consumer_loop<F>(
    stack: &ChipStack,
    policy: EmptyPolicy,
    cost_unit: Duration,
    mut on_pop: F,
) -> usize
where
    F: FnMut(&Chip),
{
    let mut soldered = 0usize;
    loop {
        let attempt = match policy {
            EmptyPolicy::Block => match stack.pop_blocking_or_drained() {
                Some((chip, depth)) => PopAttempt::Popped { chip, depth },
                None => PopAttempt::Drained,
            },
            EmptyPolicy::Poll { .. } => stack.try_pop_or_drained(),
        };
        match attempt {
            PopAttempt::Popped { chip, depth } => {
                log_dev!(
                    "[STACK] popped {} chip {} (cost {}) depth={depth}",
                    chip.grade(),
                    chip.id,
                    chip.cost
                );
                on_pop(&chip);
                solder(&chip, cost_unit);
                soldered += 1;
            }
            PopAttempt::Empty => match policy {
                EmptyPolicy::Poll { backoff } if !backoff.is_zero() => {
                    thread::sleep(backoff);
                }
                _ => thread::yield_now(),
            },
            PopAttempt::Drained => break,
        }
    }
    log_dev!("[WORKER] finished after {soldered} chips");
    soldered
}

fn solder(chip: &Chip, cost_unit: Duration) {
    if cost_unit.is_zero() {
        return;
    }
    thread::sleep(chip.soldering_time(cost_unit));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::time::Instant;

    fn drain_with_one_worker(quota: usize, policy: EmptyPolicy) {
        let stack = Arc::new(ChipStack::new());
        let (done_tx, done_rx) = mpsc::channel();

        let worker = {
            let stack = Arc::clone(&stack);
            thread::spawn(move || {
                let soldered = consumer_loop(&stack, policy, Duration::ZERO, |_| {});
                done_tx.send(soldered).expect("send soldered count");
            })
        };

        let produced = producer_loop(&stack, quota, Duration::ZERO, Chip::random);
        assert_eq!(produced, quota);

        // The worker must reach its terminal state on its own.
        let soldered = done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("worker did not terminate");
        assert_eq!(soldered, quota);
        worker.join().expect("worker thread panicked");
        assert_eq!(stack.len(), 0);
        assert!(stack.is_producer_done());
    }

    #[test]
    fn terminates_for_zero_one_and_many_chips_blocking() {
        for quota in [0, 1, 100] {
            drain_with_one_worker(quota, EmptyPolicy::Block);
        }
    }

    #[test]
    fn terminates_for_zero_one_and_many_chips_polling() {
        for quota in [0, 1, 100] {
            drain_with_one_worker(
                quota,
                EmptyPolicy::Poll {
                    backoff: Duration::from_micros(50),
                },
            );
        }
    }

    #[test]
    fn forced_costs_come_back_in_lifo_order() {
        let stack = ChipStack::new();
        let costs = [1u32, 2, 3];
        // Push the whole batch before the worker runs so the pop order is
        // exactly the reverse of the push order.
        let produced = producer_loop(&stack, costs.len(), Duration::ZERO, |id| {
            Chip::new(id, costs[id as usize])
        });
        assert_eq!(produced, 3);

        let cost_unit = Duration::from_millis(1);
        let mut popped = Vec::new();
        let start = Instant::now();
        let soldered = consumer_loop(
            &stack,
            EmptyPolicy::Poll {
                backoff: Duration::ZERO,
            },
            cost_unit,
            |chip| popped.push(chip.cost),
        );
        let elapsed = start.elapsed();

        assert_eq!(soldered, 3);
        assert_eq!(popped, [3, 2, 1]);
        // Soldering 1+2+3 cost points takes at least six cost units.
        assert!(elapsed >= cost_unit * 6, "soldered too fast: {elapsed:?}");
        assert!(stack.is_producer_done());
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn early_shutdown_rejects_all_pushes() {
        let stack = ChipStack::new();
        stack.mark_producer_done();
        let produced = producer_loop(&stack, 5, Duration::ZERO, Chip::random);
        assert_eq!(produced, 0);
        assert_eq!(stack.len(), 0);
    }

    #[test]
    fn workers_split_the_batch_without_duplication() {
        let stack = Arc::new(ChipStack::new());
        let quota = 50;
        let workers = 3;

        let mut handles = Vec::new();
        for _ in 0..workers {
            let stack = Arc::clone(&stack);
            handles.push(thread::spawn(move || {
                consumer_loop(&stack, EmptyPolicy::Block, Duration::ZERO, |_| {})
            }));
        }

        let produced = producer_loop(&stack, quota, Duration::ZERO, Chip::random);
        assert_eq!(produced, quota);

        let soldered: usize = handles
            .into_iter()
            .map(|handle| handle.join().expect("worker thread panicked"))
            .sum();
        assert_eq!(soldered, quota);
        assert_eq!(stack.len(), 0);
    }
}
