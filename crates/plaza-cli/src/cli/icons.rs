//! Status markers for console output.

use console::{style, StyledObject};

pub fn success() -> StyledObject<&'static str> {
    style("✓").green()
}

pub fn info() -> StyledObject<&'static str> {
    style("→").cyan()
}

pub fn warn() -> StyledObject<&'static str> {
    style("!").yellow()
}

pub fn error() -> StyledObject<&'static str> {
    style("✗").red()
}

/// Marker for a run result: failed, partially failed, or clean.
pub fn outcome(succeeded: bool, partial: bool) -> StyledObject<&'static str> {
    match (succeeded, partial) {
        (false, _) => error(),
        (true, true) => warn(),
        (true, false) => success(),
    }
}
