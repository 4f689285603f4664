pub mod batch;
pub mod calibration;
pub mod cli;
pub mod config;
pub mod distributor;
pub mod elo;
pub mod error;
pub mod historical_dataset;
pub mod league_params;
pub mod match_data;
pub mod profile;
pub mod rng;
pub mod settlement;
pub mod signal_selector;
pub mod simulator;
pub mod team_form;
pub mod trading;
pub mod win_prob;

/// Installs the `tracing` subscriber used by the binaries. `RUST_LOG`
/// overrides the default filter.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,matchday_signals=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}
