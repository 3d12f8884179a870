//! Randomized trial scheduling.
//!
//! Every trial runs each registered variant exactly once, in a fresh random
//! order, on freshly built queues. Drift in cache, frequency or scheduler
//! state is spread over all variants instead of favouring whichever runs
//! first.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{ debug, info };

use crate::bench::{ Benchmark, BenchmarkKey };
use crate::constants::MIN_ITERATIONS;
use crate::error::Result;
use crate::stats::{ BenchmarkSummary, StatsAggregator };

/// Builds a fresh variant instance for one trial
pub type BenchmarkFactory = Box<dyn Fn() -> Result<Box<dyn Benchmark>>>;

pub struct TrialScheduler {
    iteration_num: usize,
    factories: Vec<BenchmarkFactory>,
    rng: StdRng,
}

impl TrialScheduler {
    /// Fails when `iteration_num` is below `MIN_ITERATIONS`.
    pub fn new(iteration_num: usize) -> Result<Self> {
        if iteration_num < MIN_ITERATIONS {
            return Err(
                crate::config_error!(
                    "iteration_num {} is below {}, percentiles would be unreliable",
                    iteration_num,
                    MIN_ITERATIONS
                )
            );
        }
        Ok(Self {
            iteration_num,
            factories: Vec::new(),
            rng: StdRng::from_entropy(),
        })
    }

    /// Reproducible variant ordering
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn iteration_num(&self) -> usize {
        self.iteration_num
    }

    /// Number of registered variants
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Register a variant. The factory runs once here so configuration
    /// errors surface before any trial starts. Returns the variant's key.
    pub fn register<F, B>(&mut self, factory: F) -> Result<BenchmarkKey>
        where F: Fn() -> Result<B> + 'static, B: Benchmark + 'static
    {
        let key = factory()?.key();
        self.factories.push(
            Box::new(move || -> Result<Box<dyn Benchmark>> { Ok(Box::new(factory()?)) })
        );
        debug!(benchmark = %key, "registered benchmark");
        Ok(key)
    }

    /// Run every trial and summarize. Any failing trial aborts the suite.
    pub fn run(&mut self, workload: usize) -> Result<Vec<BenchmarkSummary>> {
        if self.factories.is_empty() {
            return Ok(Vec::new());
        }
        info!(
            variants = self.factories.len(),
            iterations = self.iteration_num,
            workload,
            "running benchmark suite"
        );

        let mut stats = StatsAggregator::new();
        let mut order: Vec<usize> = (0..self.factories.len()).collect();
        for trial in 0..self.iteration_num {
            order.shuffle(&mut self.rng);
            for &idx in &order {
                let mut bench = (self.factories[idx])()?;
                let result = bench.run(workload)?;
                debug!(trial, benchmark = %result.key, metric = result.metric, "trial finished");
                stats.record(result);
            }
        }

        let summaries = stats.summarize()?;
        info!(keys = summaries.len(), "benchmark suite finished");
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::BenchmarkResult;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records the order variants ran in.
    struct Recording {
        key: BenchmarkKey,
        log: Rc<RefCell<Vec<String>>>,
    }

    impl Benchmark for Recording {
        fn key(&self) -> BenchmarkKey {
            self.key.clone()
        }

        fn run(&mut self, workload: usize) -> Result<BenchmarkResult> {
            self.log.borrow_mut().push(self.key.name.clone());
            Ok(BenchmarkResult {
                key: self.key.clone(),
                metric: workload as f64,
                total_msg_num: workload,
            })
        }
    }

    fn register(scheduler: &mut TrialScheduler, name: &'static str, log: &Rc<RefCell<Vec<String>>>) {
        let log = Rc::clone(log);
        scheduler
            .register(move || {
                Ok(Recording {
                    key: BenchmarkKey::new(name, "fake", 8, "u32", 1, 1),
                    log: Rc::clone(&log),
                })
            })
            .unwrap();
    }

    #[test]
    fn test_rejects_small_iteration_counts() {
        let err = TrialScheduler::new(50).err().unwrap();
        assert!(err.is_config_error());
        assert!(TrialScheduler::new(100).is_ok());
    }

    #[test]
    fn test_empty_suite() {
        let mut scheduler = TrialScheduler::new(100).unwrap();
        assert!(scheduler.run(10).unwrap().is_empty());
    }

    #[test]
    fn test_every_variant_runs_once_per_trial() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut scheduler = TrialScheduler::new(100).unwrap().with_seed(7);
        register(&mut scheduler, "a", &log);
        register(&mut scheduler, "b", &log);
        register(&mut scheduler, "c", &log);

        let summaries = scheduler.run(10).unwrap();
        assert_eq!(summaries.len(), 3);
        assert!(summaries.iter().all(|s| s.iteration_num == 100));

        let log = log.borrow();
        assert_eq!(log.len(), 300);
        for trial in log.chunks(3) {
            let mut names = trial.to_vec();
            names.sort();
            assert_eq!(names, ["a", "b", "c"]);
        }
        // 100 shuffles of 3 variants do not all start with the same one
        assert!(log.chunks(3).any(|t| t[0] != log[0]));
    }

    #[test]
    fn test_seed_makes_order_reproducible() {
        let orders: Vec<Vec<String>> = (0..2)
            .map(|_| {
                let log = Rc::new(RefCell::new(Vec::new()));
                let mut scheduler = TrialScheduler::new(100).unwrap().with_seed(42);
                register(&mut scheduler, "x", &log);
                register(&mut scheduler, "y", &log);
                scheduler.run(1).unwrap();
                let order = log.borrow().clone();
                order
            })
            .collect();
        assert_eq!(orders[0], orders[1]);
    }

    #[test]
    fn test_factory_errors_surface_at_registration() {
        let mut scheduler = TrialScheduler::new(100).unwrap();
        let err = scheduler
            .register(|| -> Result<Recording> { Err(crate::config_error!("bad ring")) })
            .unwrap_err();
        assert!(err.is_config_error());
        assert!(scheduler.is_empty());
    }
}
