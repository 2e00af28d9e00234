use std::path::Path;

use rand::{rngs::StdRng, Rng, SeedableRng};

static mut GUARD: Option<tracing_chrome::FlushGuard> = None;

/// Install the test subscriber.
///
/// Honors `RUST_LOG`. When the crate is built with `DEBUG` set, a chrome
/// trace is also written to `./log`.
pub fn setup_test_log() {
    color_backtrace::install();
    use tracing_chrome::ChromeLayerBuilder;
    use tracing_subscriber::{prelude::*, registry::Registry, EnvFilter};
    let fmt_layer = tracing_subscriber::fmt::Layer::default()
        .with_test_writer()
        .with_line_number(true)
        .with_file(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    if option_env!("DEBUG").is_some() {
        let time_suffix = chrono::Local::now().format("%Y-%m-%d-%H-%M-%S").to_string();
        std::fs::create_dir_all("./log").unwrap();
        let (chrome_layer, guard) = ChromeLayerBuilder::new()
            .include_args(true)
            .include_locations(true)
            .file(Path::new(
                format!("./log/trace-{}.json", time_suffix).as_str(),
            ))
            .build();
        // SAFETY: Test
        unsafe { GUARD = Some(guard) };
        let _ = tracing::subscriber::set_global_default(
            Registry::default()
                .with(filter)
                .with(fmt_layer)
                .with(chrome_layer),
        );
    } else {
        let _ = tracing::subscriber::set_global_default(Registry::default().with(filter).with(fmt_layer));
    }
}

/// `count` random keys of `len` bytes, reproducible from `seed`.
pub fn random_keys(seed: u64, count: usize, len: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|_| (0..len).map(|_| rng.gen()).collect())
        .collect()
}
