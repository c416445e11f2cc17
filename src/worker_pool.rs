//! Fixed-size worker pool for independent per-bin jobs
//!
//! Jobs are numbered `0..jobs`. Workers pull job numbers from a shared
//! crossbeam channel and send `(job, result)` pairs back; the collector
//! stores each result in the slot of its job number, so the returned vector
//! is in job order no matter which worker finished first.
//!
//! ```text
//!   job queue (0..jobs) ──► worker 1 ─┐
//!                      ├──► worker 2 ─┼──► (job, result) ──► slots[job]
//!                      └──► worker N ─┘
//! ```

use crossbeam::channel;

/// Run `work(job)` for every job on at most `workers` scoped threads
///
/// Results come back in job order. A panicking job is re-raised on the
/// calling thread once the pool has shut down.
pub fn run_jobs<T, F>(jobs: usize, workers: usize, work: F) -> Vec<T>
where
    T: Send,
    F: Fn(usize) -> T + Sync,
{
    if jobs == 0 {
        return Vec::new();
    }

    let workers = workers.clamp(1, jobs);
    if workers == 1 {
        return (0..jobs).map(&work).collect();
    }

    let (job_tx, job_rx) = channel::unbounded::<usize>();
    let (result_tx, result_rx) = channel::unbounded::<(usize, T)>();

    for job in 0..jobs {
        // Receiver is alive until the scope below ends.
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let work = &work;
    let outcome = crossbeam::scope(|scope| {
        for _ in 0..workers {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move |_| {
                for job in job_rx.iter() {
                    if result_tx.send((job, work(job))).is_err() {
                        break;
                    }
                }
            });
        }
    });
    drop(result_tx);

    if let Err(panic) = outcome {
        std::panic::resume_unwind(panic);
    }

    let mut slots: Vec<Option<T>> = (0..jobs).map(|_| None).collect();
    for (job, result) in result_rx.iter() {
        slots[job] = Some(result);
    }
    slots.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_results_in_job_order() {
        let results = run_jobs(50, 4, |job| {
            // Uneven job durations shuffle completion order.
            std::thread::sleep(std::time::Duration::from_micros(((50 - job) * 20) as u64));
            job * job
        });
        let expected: Vec<usize> = (0..50).map(|j| j * j).collect();
        assert_eq!(results, expected);
    }

    #[test]
    fn test_every_job_runs_once() {
        let calls = AtomicUsize::new(0);
        let results = run_jobs(17, 3, |job| {
            calls.fetch_add(1, Ordering::SeqCst);
            job
        });
        assert_eq!(results.len(), 17);
        assert_eq!(calls.load(Ordering::SeqCst), 17);
    }

    #[test]
    fn test_zero_jobs() {
        let results: Vec<usize> = run_jobs(0, 4, |job| job);
        assert!(results.is_empty());
    }

    #[test]
    fn test_more_workers_than_jobs() {
        assert_eq!(run_jobs(2, 16, |job| job + 1), vec![1, 2]);
    }

    #[test]
    fn test_zero_workers_runs_inline() {
        assert_eq!(run_jobs(3, 0, |job| job), vec![0, 1, 2]);
    }

    #[test]
    #[should_panic(expected = "job 3 failed")]
    fn test_job_panic_propagates() {
        run_jobs(8, 2, |job| {
            if job == 3 {
                panic!("job 3 failed");
            }
            job
        });
    }
}
