use log::info;
use rayon::prelude::*;

use super::git::Repo;
use super::{process, report_failures, Batch};

// Thread hint handed to `codeql database analyze` by each worker
const WORKER_ANALYZE_THREADS: usize = 2;

// =============================================================================
// Parallel Runner
// =============================================================================

/// Process every repository on a fixed-size worker pool. Each worker owns
/// one repository's full clone/build/analyze pipeline; outcomes are printed
/// in completion order and failures reported once the pool drains.
pub fn run_all(batch: &Batch, repos: &[Repo], workers: usize) {
    println!("[+] Starting analysis with {} workers", workers);

    // Create the runner thread pool
    info!("Creating runner thread pool");
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("run-{}", i))
        .build()
        .expect("Failed to create runner thread pool");

    let (tx, rx) = crossbeam::channel::unbounded();

    // Run every pipeline to completion
    pool.install(|| {
        repos.par_iter().for_each(|repo| {
            let tx = tx.clone();
            let result = process(batch, repo, WORKER_ANALYZE_THREADS);

            match &result {
                Ok(_) => println!("[✓] {}", repo.name),
                Err(_) => println!("[✗] {}", repo.name),
            }

            tx.send((repo.name.clone(), result)).unwrap();
            drop(tx);
        });
    });
    drop(tx);

    // Gather the failures
    let failures: Vec<_> = rx.iter()
        .filter_map(|(name, result)| result.err().map(|e| (name, e)))
        .collect();

    info!("Finished batch: {} repos, {} failures", repos.len(), failures.len());
    report_failures(&failures);
}
