//! Global tunables read from environment variables.
//!
//! These expose internal knobs that are not worth a command-line flag but
//! are occasionally useful to adjust when profiling a solve. A parameter is
//! read once on first access; later changes to the environment are ignored.

use once_cell::sync::OnceCell;
use std::str::FromStr;

pub struct Tunable<T> {
    cell: OnceCell<T>,
    var: &'static str,
    default: &'static str,
}

impl<T> Tunable<T> {
    pub const fn new(var: &'static str, default: &'static str) -> Tunable<T> {
        Tunable {
            cell: OnceCell::new(),
            var,
            default,
        }
    }
}

impl<T: FromStr + Copy> Tunable<T> {
    /// The parameter value: the environment variable if set and parsable on
    /// first access, the built-in default otherwise.
    ///
    /// # Panics
    /// If the built-in default cannot be parsed, which is a bug.
    pub fn get(&self) -> T {
        *self.cell.get_or_init(|| {
            if let Ok(raw) = std::env::var(self.var) {
                if let Ok(value) = raw.parse() {
                    return value;
                }
                tracing::warn!(
                    "could not parse {}=\"{}\", using default \"{}\"",
                    self.var,
                    raw,
                    self.default
                );
            }
            self.default
                .parse()
                .unwrap_or_else(|_| panic!("{}: invalid default \"{}\"", self.var, self.default))
        })
    }
}
