use std::fmt;
use std::time::Instant;

use rayon::prelude::*;
use shared::info;

use crate::core::{
    Configuration,
    ConfiguratorCatalog,
    Outcome,
    Status,
};
use crate::error::{Error, Result};


/// Four-phase computation run over a resolved configuration.
///
/// `run_step` only reads the job, so steps may run concurrently on worker threads.
/// `initialize`, `combine` and `finalize` take `&mut self` and run on the coordinating
/// thread only.
pub trait Job: Sync {
    type Partial: Send;

    fn number_of_steps(&self) -> usize;

    /// Allocate the output variables and compute the job-wide quantities.
    fn initialize(&mut self) -> Result<()>;

    fn run_step(&self, index: usize) -> Result<(usize, Self::Partial)>;

    /// Merge the partial result of step `index` into the outputs.
    fn combine(&mut self, index: usize, partial: Self::Partial) -> Result<()>;

    /// Normalize, derive the secondary quantities and write the output files.
    fn finalize(&mut self) -> Result<()>;
}


/// Static metadata of a job type: its name and its configurator catalog.
pub trait JobDefinition: Job + Sized {
    const NAME: &'static str;
    const LABEL: &'static str;

    fn catalog() -> ConfiguratorCatalog;

    fn from_configuration(cfg: Configuration) -> Result<Self>;
}


#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunningMode {
    Serial,
    /// `nthreads == 0` uses every logical core.
    Parallel { nthreads: usize },
}


impl Default for RunningMode {
    fn default() -> Self {
        Self::Parallel { nthreads: 0 }
    }
}


impl fmt::Display for RunningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "serial"),
            Self::Parallel { nthreads: 0 } => write!(f, "parallel (all cores)"),
            Self::Parallel { nthreads } => write!(f, "parallel ({} threads)", nthreads),
        }
    }
}


/// Drives a [`Job`] through its phases.
///
/// Steps are combined in ascending index order whatever the running mode, so serial
/// and parallel runs accumulate identically. A stop requested through the status skips
/// `finalize`, so a cancelled run writes nothing.
pub struct JobRunner {
    mode: RunningMode,
    status: Status,
    chunk_size: usize,
}


impl JobRunner {
    pub fn new(mode: RunningMode) -> Self {
        Self {
            mode,
            status: Status::new(),
            chunk_size: 64,
        }
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.status = status;
        self
    }

    /// Number of steps evaluated in parallel before their results are combined.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn get_status(&self) -> &Status {
        &self.status
    }


    pub fn run<J: Job>(&self, job: &mut J) -> Result<Outcome<()>> {
        let now = Instant::now();

        info!("Initializing job ...");
        job.initialize()?;

        let nsteps = job.number_of_steps();
        info!("Running {} steps in {} mode ...", nsteps, self.mode);
        self.status.start(nsteps);

        let outcome = match self.mode {
            RunningMode::Serial => self.run_serial(job)?,
            RunningMode::Parallel { nthreads } => self.run_parallel(job, nthreads)?,
        };

        if outcome.is_cancelled() || self.status.is_stopped() {
            info!("Job cancelled after {:?}, no output written.", now.elapsed());
            return Ok(Outcome::Cancelled);
        }

        info!("Finalizing job ...");
        job.finalize()?;
        self.status.finish();
        info!("Job finished in {:?}.", now.elapsed());

        Ok(Outcome::Completed(()))
    }


    fn run_serial<J: Job>(&self, job: &mut J) -> Result<Outcome<()>> {
        for i in 0 .. job.number_of_steps() {
            if self.status.is_stopped() {
                return Ok(Outcome::Cancelled);
            }
            let (index, partial) = job.run_step(i)?;
            job.combine(index, partial)?;
            self.status.update();
        }
        Ok(Outcome::Completed(()))
    }


    fn run_parallel<J: Job>(&self, job: &mut J, nthreads: usize) -> Result<Outcome<()>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(nthreads)
            .build()
            .map_err(|e| Error::computation("run_step", e))?;

        let nsteps = job.number_of_steps();
        let mut beg = 0;
        while beg < nsteps {
            if self.status.is_stopped() {
                return Ok(Outcome::Cancelled);
            }

            let end = (beg + self.chunk_size).min(nsteps);
            let shared_job: &J = job;
            let status = &self.status;
            let results = pool.install(|| {
                (beg .. end).into_par_iter()
                    .map(|i| {
                        status.check()?;
                        shared_job.run_step(i)
                    })
                    .collect::<Vec<_>>()
            });

            for r in results {
                match r {
                    Ok((index, partial)) => {
                        job.combine(index, partial)?;
                        self.status.update();
                    },
                    Err(Error::Cancelled) => return Ok(Outcome::Cancelled),
                    Err(e) => return Err(e),
                }
            }
            beg = end;
        }
        Ok(Outcome::Completed(()))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Sums `i^2` per parity class, records the order `combine` sees.
    struct SquareSum {
        n: usize,
        sums: [f64; 2],
        combined: Vec<usize>,
        finalized: bool,
        fail_at: Option<usize>,
        stop_at: Option<(usize, Status)>,
        calls: AtomicUsize,
    }

    impl SquareSum {
        fn new(n: usize) -> Self {
            Self { n, sums: [0.0; 2], combined: vec![], finalized: false, fail_at: None, stop_at: None, calls: AtomicUsize::new(0) }
        }
    }

    impl Job for SquareSum {
        type Partial = f64;
        fn number_of_steps(&self) -> usize { self.n }
        fn initialize(&mut self) -> Result<()> { Ok(()) }
        fn run_step(&self, index: usize) -> Result<(usize, f64)> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_at == Some(index) {
                return Err(Error::computation("run_step", "boom"));
            }
            if let Some((at, status)) = &self.stop_at {
                if *at == index {
                    status.stop();
                }
            }
            Ok((index, (index * index) as f64))
        }
        fn combine(&mut self, index: usize, partial: f64) -> Result<()> {
            self.sums[index % 2] += partial;
            self.combined.push(index);
            Ok(())
        }
        fn finalize(&mut self) -> Result<()> {
            self.finalized = true;
            Ok(())
        }
    }

    #[test]
    fn test_serial_and_parallel_agree() {
        let mut serial = SquareSum::new(100);
        let mut parallel = SquareSum::new(100);

        let ret = JobRunner::new(RunningMode::Serial).run(&mut serial).unwrap();
        assert_eq!(ret, Outcome::Completed(()));
        let ret = JobRunner::new(RunningMode::Parallel { nthreads: 4 }).with_chunk_size(7).run(&mut parallel).unwrap();
        assert_eq!(ret, Outcome::Completed(()));

        assert_eq!(serial.sums, parallel.sums);
        assert_eq!(parallel.combined, (0 .. 100).collect::<Vec<_>>());
        assert!(serial.finalized && parallel.finalized);
    }

    #[test]
    fn test_error_aborts() {
        let mut job = SquareSum::new(20);
        job.fail_at = Some(3);
        let ret = JobRunner::new(RunningMode::Parallel { nthreads: 2 }).run(&mut job);
        assert!(matches!(ret, Err(Error::Computation { phase: "run_step", .. })));
        assert!(!job.finalized);
    }

    #[test]
    fn test_cancel_skips_finalize() {
        for mode in [RunningMode::Serial, RunningMode::Parallel { nthreads: 2 }] {
            let status = Status::new();
            let mut job = SquareSum::new(1000);
            job.stop_at = Some((5, status.clone()));

            let ret = JobRunner::new(mode).with_status(status).with_chunk_size(4).run(&mut job).unwrap();
            assert_eq!(ret, Outcome::Cancelled);
            assert!(!job.finalized);
            assert!(job.calls.load(Ordering::SeqCst) < 1000);
        }
    }
}
