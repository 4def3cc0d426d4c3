use std::{
    fmt::{self, Display},
    sync::atomic::{AtomicBool, Ordering},
};

use rustc_apfloat::{
    StatusAnd,
    ieee::{Double, Half, Single},
};

use crate::{
    config::{AdderConfig, Format, ZeroSign, format_config},
    fpu::{RoundingMode, SoftAdder, apfloat},
    fuzz::{Lcg128, boundary_cases},
};

const PROGRESS_INTERVAL: u64 = 1 << 24;

/// Reference adder the emulation is checked against.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Oracle {
    /// Host `f32`/`f64` addition. The host always rounds to nearest, ties to even.
    Native,
    /// `rustc_apfloat`, any rounding mode, half/single/double.
    ApFloat,
}

/// Result of the reference adder for one pair.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Expected {
    pub bits: u64,
    /// The exact sum lies beyond the finite range. Under directed rounding the
    /// reference may then return the largest finite value where the emulation
    /// saturates to infinity.
    pub overflow: bool,
}

type ReferenceFn = fn(u64, u64, RoundingMode) -> Expected;

fn native_single(x: u64, y: u64, _round: RoundingMode) -> Expected {
    let (a, b) = (f32::from_bits(x as u32), f32::from_bits(y as u32));
    let sum = a + b;
    Expected {
        bits: sum.to_bits() as u64,
        overflow: sum.is_infinite() && a.is_finite() && b.is_finite(),
    }
}

fn native_double(x: u64, y: u64, _round: RoundingMode) -> Expected {
    let (a, b) = (f64::from_bits(x), f64::from_bits(y));
    let sum = a + b;
    Expected {
        bits: sum.to_bits(),
        overflow: sum.is_infinite() && a.is_finite() && b.is_finite(),
    }
}

fn apfloat_reference<F: rustc_apfloat::Float>(x: u64, y: u64, round: RoundingMode) -> Expected {
    let StatusAnd { value, .. } = apfloat::add_as::<F>(x, y, round);
    Expected {
        bits: value,
        overflow: apfloat::exceeds_range::<F>(x, y),
    }
}

impl Oracle {
    /// Native addition when it can serve, `rustc_apfloat` otherwise.
    pub fn auto(config: &AdderConfig) -> Result<Self, HarnessError> {
        [Oracle::Native, Oracle::ApFloat]
            .into_iter()
            .find(|oracle| oracle.resolve(config).is_some())
            .ok_or(HarnessError::NoOracle {
                oracle: None,
                format: config.format,
                rounding: config.rounding,
            })
    }

    pub fn supports(self, config: &AdderConfig) -> bool {
        self.resolve(config).is_some()
    }

    fn resolve(self, config: &AdderConfig) -> Option<ReferenceFn> {
        let format = config.format;
        let reference: ReferenceFn = match self {
            Oracle::Native if config.rounding != RoundingMode::NearestTiesToEven => return None,
            Oracle::Native if format == format_config::SINGLE => native_single,
            Oracle::Native if format == format_config::DOUBLE => native_double,
            Oracle::ApFloat if format == format_config::HALF => apfloat_reference::<Half>,
            Oracle::ApFloat if format == format_config::SINGLE => apfloat_reference::<Single>,
            Oracle::ApFloat if format == format_config::DOUBLE => apfloat_reference::<Double>,
            _ => return None,
        };
        Some(reference)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Verdict {
    Agree,
    /// Known divergence from the reference (overflow under directed rounding).
    Skipped,
    Disagree,
}

/// A pair on which the emulation and the reference differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub config: AdderConfig,
    pub oracle: Oracle,
    pub x: u64,
    pub y: u64,
    pub got: u64,
    pub expected: u64,
}

impl Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let format = self.config.format;
        let render = |bits: u64| {
            apfloat::display(format, bits)
                .map(|value| format!(" ({value})"))
                .unwrap_or_default()
        };
        writeln!(
            f,
            "{} disagrees with the emulation for {format}, {:?}:",
            match self.oracle {
                Oracle::Native => "native addition",
                Oracle::ApFloat => "rustc_apfloat",
            },
            self.config.rounding,
        )?;
        writeln!(f, "  x        = {:#x}{} [{}]", self.x, render(self.x), format.unpack(self.x))?;
        writeln!(f, "  y        = {:#x}{} [{}]", self.y, render(self.y), format.unpack(self.y))?;
        writeln!(
            f,
            "  got      = {:#x}{} [{}]",
            self.got,
            render(self.got),
            format.unpack(self.got)
        )?;
        write!(
            f,
            "  expected = {:#x}{} [{}]",
            self.expected,
            render(self.expected),
            format.unpack(self.expected)
        )
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("no {} oracle for {format} rounding {rounding:?}", .oracle.map_or("usable".into(), |o| format!("{o:?}")))]
    NoOracle {
        oracle: Option<Oracle>,
        format: Format,
        rounding: RoundingMode,
    },
    #[error("at least one worker thread is required")]
    NoWorkers,
    #[error("a fuzz worker panicked")]
    WorkerPanicked,
    #[error("{0}")]
    Mismatch(Box<Mismatch>),
}

/// Tally of checked pairs.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct FuzzReport {
    pub checked: u64,
    pub agreed: u64,
    pub skipped: u64,
}

impl FuzzReport {
    fn record(&mut self, verdict: Verdict) {
        self.checked += 1;
        match verdict {
            Verdict::Agree => self.agreed += 1,
            Verdict::Skipped => self.skipped += 1,
            Verdict::Disagree => {}
        }
    }

    fn merge(&mut self, other: FuzzReport) {
        self.checked += other.checked;
        self.agreed += other.agreed;
        self.skipped += other.skipped;
    }
}

/// Drives a [`SoftAdder`] with boundary and pseudo-random operands and
/// compares every result with an [`Oracle`].
pub struct FuzzHarness {
    adder: SoftAdder,
    oracle: Oracle,
    reference: ReferenceFn,
    iterations: u64,
    seed: u128,
    threads: usize,
}

impl FuzzHarness {
    pub fn new(config: AdderConfig) -> Result<Self, HarnessError> {
        let oracle = Oracle::auto(&config)?;
        Self::with_oracle(config, oracle)
    }

    pub fn with_oracle(config: AdderConfig, oracle: Oracle) -> Result<Self, HarnessError> {
        let reference = oracle.resolve(&config).ok_or(HarnessError::NoOracle {
            oracle: Some(oracle),
            format: config.format,
            rounding: config.rounding,
        })?;
        Ok(Self {
            adder: SoftAdder::new(config),
            oracle,
            reference,
            iterations: 0,
            seed: 0,
            threads: 1,
        })
    }

    pub fn iterations(mut self, iterations: u64) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn seed(mut self, seed: u128) -> Self {
        self.seed = seed;
        self
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads;
        self
    }

    pub fn oracle(&self) -> Oracle {
        self.oracle
    }

    pub fn adder(&self) -> &SoftAdder {
        &self.adder
    }

    fn judge(&self, got: u64, expected: Expected) -> Verdict {
        let config = self.adder.config();
        let format = config.format;

        if got == expected.bits || (self.adder.is_nan(got) && self.adder.is_nan(expected.bits)) {
            return Verdict::Agree;
        }

        let is_zero = |bits: u64| bits & format.value_mask() & !(1 << format.sign_shift()) == 0;
        if config.zero_sign == ZeroSign::AlwaysPositive && is_zero(got) && is_zero(expected.bits)
        {
            return Verdict::Agree;
        }

        if expected.overflow && config.rounding != RoundingMode::NearestTiesToEven {
            log::warn!("overflow under {:?} skipped, emulation saturates", config.rounding);
            return Verdict::Skipped;
        }

        Verdict::Disagree
    }

    /// Adds one pair both ways and compares.
    pub fn check_pair(&self, x: u64, y: u64) -> Result<Verdict, Box<Mismatch>> {
        let rounding = self.adder.config().rounding;
        let got = self.adder.add(x, y);
        let expected = (self.reference)(x, y, rounding);

        match self.judge(got, expected) {
            Verdict::Disagree => {
                let mismatch = Mismatch {
                    config: self.adder.config(),
                    oracle: self.oracle,
                    x,
                    y,
                    got,
                    expected: expected.bits,
                };
                log::error!("{mismatch}");
                Err(Box::new(mismatch))
            }
            verdict => Ok(verdict),
        }
    }

    pub fn run_boundary(&self) -> Result<FuzzReport, HarnessError> {
        let mut report = FuzzReport::default();
        for case in boundary_cases(self.adder.format()) {
            log::debug!("boundary case: {}", case.name);
            report.record(self.check_pair(case.x, case.y).map_err(HarnessError::Mismatch)?);
            report.record(self.check_pair(case.y, case.x).map_err(HarnessError::Mismatch)?);
        }
        Ok(report)
    }

    fn run_worker(
        &self,
        worker: usize,
        iterations: u64,
        stop: &AtomicBool,
    ) -> Result<FuzzReport, Box<Mismatch>> {
        let format = self.adder.format();
        let mut lcg = Lcg128::new(self.seed ^ ((worker as u128) << 64));
        let mut report = FuzzReport::default();
        log::debug!("worker {worker}: {iterations} iterations");

        for done in 0..iterations {
            if done % PROGRESS_INTERVAL == 0 && done != 0 {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                log::info!("worker {worker}: {done}/{iterations} pairs checked");
            }

            let x = lcg.next_pattern(format);
            let y = lcg.next_pattern(format);
            match self.check_pair(x, y) {
                Ok(verdict) => report.record(verdict),
                Err(mismatch) => {
                    stop.store(true, Ordering::Relaxed);
                    return Err(mismatch);
                }
            }
        }

        Ok(report)
    }

    /// Boundary cases, then `iterations` random pairs split across the worker threads.
    pub fn run(&self) -> Result<FuzzReport, HarnessError> {
        if self.threads == 0 {
            return Err(HarnessError::NoWorkers);
        }

        let mut report = self.run_boundary()?;
        let threads = self.threads as u64;
        let stop = AtomicBool::new(false);

        let results = crossbeam::thread::scope(|scope| {
            let handles: Vec<_> = (0..self.threads)
                .map(|worker| {
                    let share = self.iterations / threads
                        + u64::from((worker as u64) < self.iterations % threads);
                    let stop = &stop;
                    scope.spawn(move |_| self.run_worker(worker, share, stop))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join())
                .collect::<Vec<_>>()
        })
        .map_err(|_| HarnessError::WorkerPanicked)?;

        for result in results {
            let worker_report = result
                .map_err(|_| HarnessError::WorkerPanicked)?
                .map_err(HarnessError::Mismatch)?;
            report.merge(worker_report);
        }

        log::info!(
            "{} pairs checked against {:?}: {} agreed, {} skipped",
            report.checked,
            self.oracle,
            report.agreed,
            report.skipped
        );
        Ok(report)
    }
}
