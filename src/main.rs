mod logging;

use std::{process::ExitCode, time::Instant};

use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use lazy_static::lazy_static;
use softadd::{
    AdderConfig, Format, RoundingMode, SoftAdder, ZeroSign,
    fpu::apfloat,
    fuzz::{FuzzHarness, HarnessError, Oracle},
};

use crate::logging::LogLevel;

lazy_static! {
    static ref cli_args: Args = Args::parse();
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, clap::ValueEnum)]
enum OracleChoice {
    Auto,
    Native,
    Apfloat,
}

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Preset name (half, bfloat16, single, double) or `E,P`.
    #[arg(short, long, global = true, default_value = "single", value_parser = parse_format)]
    format: Format,

    /// Rounding policy.
    #[arg(value_enum, short, long, global = true, default_value_t = RoundingMode::NearestTiesToEven)]
    rounding: RoundingMode,

    /// Sign of a sum that cancels to zero.
    #[arg(value_enum, long, global = true, default_value_t = ZeroSign::AlwaysPositive)]
    zero_sign: ZeroSign,

    /// Switch log level.
    #[arg(value_enum, long = "loglevel", global = true, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add two values given as `0x` bit patterns or decimal literals.
    Add { x: String, y: String },

    /// Decompose and classify one value.
    Classify { x: String },

    /// Compare the adder with a reference on boundary and random operands.
    Fuzz {
        #[arg(short = 'n', long, default_value_t = 1_000_000)]
        iterations: u64,

        #[arg(short, long, default_value_t = 0)]
        seed: u128,

        #[arg(short = 'j', long, default_value_t = 1)]
        threads: usize,

        #[arg(value_enum, long, default_value_t = OracleChoice::Auto)]
        oracle: OracleChoice,

        /// Check only the hand-picked edge cases.
        #[arg(long, default_value_t = false)]
        boundary_only: bool,
    },
}

fn parse_format(arg: &str) -> Result<Format, String> {
    if let Some(format) = Format::from_name(arg) {
        return Ok(format);
    }
    let (exponent, significand) = arg
        .split_once(',')
        .ok_or_else(|| format!("unknown format `{arg}`"))?;
    let parse = |s: &str| s.trim().parse::<u32>().map_err(|e| e.to_string());
    Format::new(parse(exponent)?, parse(significand)?).map_err(|e| e.to_string())
}

fn parse_operand(format: Format, arg: &str) -> Result<u64, String> {
    if let Some(hex) = arg.strip_prefix("0x").or_else(|| arg.strip_prefix("0X")) {
        let bits = u64::from_str_radix(&hex.replace('_', ""), 16).map_err(|e| e.to_string())?;
        if bits & !format.value_mask() != 0 {
            return Err(format!("{arg} does not fit in {} bits", format.width()));
        }
        return Ok(bits);
    }
    match apfloat::parse_decimal(format, arg) {
        Some(parsed) => parsed.map_err(|e| format!("invalid literal `{arg}`: {e:?}")),
        None => Err(format!("decimal literals are not supported for {format}, use 0x bits")),
    }
}

fn describe(format: Format, bits: u64) -> String {
    let width = format.width().div_ceil(4) as usize;
    match apfloat::display(format, bits) {
        Some(value) => format!("{bits:#0w$x} = {value}", w = width + 2),
        None => format!("{bits:#0w$x}", w = width + 2),
    }
}

fn run_fuzz(
    config: AdderConfig,
    iterations: u64,
    seed: u128,
    threads: usize,
    oracle: OracleChoice,
    boundary_only: bool,
) -> Result<(), HarnessError> {
    let harness = match oracle {
        OracleChoice::Auto => FuzzHarness::new(config)?,
        OracleChoice::Native => FuzzHarness::with_oracle(config, Oracle::Native)?,
        OracleChoice::Apfloat => FuzzHarness::with_oracle(config, Oracle::ApFloat)?,
    }
    .iterations(iterations)
    .seed(seed)
    .threads(threads);

    println!(
        "fuzzing {} with {:?}, {:?} zero sign, oracle {:?}",
        config.format,
        config.rounding,
        config.zero_sign,
        harness.oracle()
    );

    let now = Instant::now();
    let report = if boundary_only {
        harness.run_boundary()?
    } else {
        harness.run()?
    };
    let elapsed = now.elapsed().as_secs_f64();

    println!(
        "{} {} pairs, {} agreed, {} skipped in {:.2}s ({:.1} M pairs/s)",
        "PASS".green().bold(),
        report.checked,
        report.agreed,
        report.skipped,
        elapsed,
        report.checked as f64 / elapsed.max(f64::EPSILON) / 1e6
    );
    Ok(())
}

fn main() -> ExitCode {
    let _logger_handle = match logging::init(cli_args.log_level) {
        Ok(handle) => Some(handle),
        Err(e) => {
            eprintln!("{} logger unavailable: {e}", "warning:".yellow());
            None
        }
    };

    let config = AdderConfig::new(cli_args.format, cli_args.rounding)
        .with_zero_sign(cli_args.zero_sign);
    let format = config.format;

    match &cli_args.command {
        Command::Add { x, y } => {
            let operands = parse_operand(format, x).and_then(|x| Ok((x, parse_operand(format, y)?)));
            let (x, y) = match operands {
                Ok(operands) => operands,
                Err(e) => {
                    eprintln!("{} {e}", "error:".red().bold());
                    return ExitCode::from(2);
                }
            };
            let sum = SoftAdder::new(config).add(x, y);
            println!("  {}", describe(format, x));
            println!("+ {}", describe(format, y));
            println!("= {}", describe(format, sum).bold());
            println!("  [{}] {:?}", format.unpack(sum), format.classify(sum));
            ExitCode::SUCCESS
        }
        Command::Classify { x } => match parse_operand(format, x) {
            Ok(bits) => {
                let class = format.classify(bits);
                println!("{}", describe(format, bits));
                println!("[{}] {:?} (mask {:#05x})", format.unpack(bits), class, class.bits());
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                ExitCode::from(2)
            }
        },
        Command::Fuzz {
            iterations,
            seed,
            threads,
            oracle,
            boundary_only,
        } => match run_fuzz(config, *iterations, *seed, *threads, *oracle, *boundary_only) {
            Ok(()) => ExitCode::SUCCESS,
            Err(HarnessError::Mismatch(mismatch)) => {
                println!("{}\n{mismatch}", "FAIL".red().bold());
                ExitCode::FAILURE
            }
            Err(e) => {
                eprintln!("{} {e}", "error:".red().bold());
                ExitCode::from(2)
            }
        },
    }
}
