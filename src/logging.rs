//! tracing subscriber setup for the kdk binary.

use std::env;

use once_cell::sync::OnceCell;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

static INIT: OnceCell<()> = OnceCell::new();

/// Filter directive: KDK_LOG, then RUST_LOG, then info/debug.
pub fn filter_directive(debug: bool) -> String {
    for key in ["KDK_LOG", "RUST_LOG"] {
        if let Ok(v) = env::var(key) {
            let v = v.trim();
            if !v.is_empty() {
                return v.to_string();
            }
        }
    }
    if debug { "debug" } else { "info" }.to_string()
}

/// Install the stderr fmt subscriber. Safe to call more than once.
pub fn init(debug: bool) {
    if INIT.get().is_some() {
        return;
    }
    let env_filter = EnvFilter::try_new(filter_directive(debug))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(debug)
        .with_ansi(crate::color_enabled_stderr());
    if tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
        .is_err()
    {
        eprintln!("kdk: logging init skipped (global subscriber already set)");
    }
    let _ = INIT.set(());
}
