//! Bit-exact software emulation of IEEE-754 binary addition for configurable
//! formats, plus a differential fuzzer checking it against reference adders.

mod utils;

pub mod config;
pub mod fpu;
pub mod fuzz;

pub use config::{AdderConfig, Format, FormatError, ZeroSign, format_config};
pub use fpu::{AddError, Classification, Fields, RoundingMode, SoftAdder};
pub use utils::{InBits, NativeFloat};
