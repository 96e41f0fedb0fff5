use crate::{Scheduler, SchedulerConfig};

/// Opt-in log output for test runs, e.g. `RUST_LOG=scheduler=trace`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn scheduler(workers: usize) -> Scheduler {
    init_tracing();
    Scheduler::new(SchedulerConfig {
        workers,
        ..SchedulerConfig::default()
    })
}
