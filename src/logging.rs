//! Tracing subscriber setup for the binary. The library only emits events.
//!
//! | Flag(s)   | Level |
//! |-----------|-------|
//! | (none)    | WARN  |
//! | `-v`      | INFO  |
//! | `-vv`     | DEBUG |
//! | `-vvv`    | TRACE |
//! | `--quiet` | ERROR |
//!
//! `RUST_LOG` overrides all of the above if set.

use std::io::IsTerminal as _;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::GlobalArgs;

pub fn init_logging(args: &GlobalArgs) {
    let level = derive_level(args);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("archetype={level},archetype_flow={level}")));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);

    // Already initialised is not an error worth failing the command for.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}

fn derive_level(args: &GlobalArgs) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, false, "warn")]
    #[case(1, false, "info")]
    #[case(2, false, "debug")]
    #[case(3, false, "trace")]
    #[case(10, false, "trace")]
    #[case(0, true, "error")]
    #[case(3, true, "error")]
    fn verbosity_maps_to_level(#[case] verbose: u8, #[case] quiet: bool, #[case] expected: &str) {
        assert_eq!(derive_level(&GlobalArgs { verbose, quiet }), expected);
    }
}
