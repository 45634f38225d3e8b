use crate::error::{CliError, Result};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{Layer, Registry, filter::LevelFilter, fmt, prelude::*};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

fn level_filter(verbosity: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::ERROR;
    }
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Plain-text layer for `--log-file`, with thread ids so rayon workers can be told apart.
fn file_layer(path: &Path) -> Result<BoxedLayer> {
    let file = File::create(path).map_err(CliError::Io)?;
    Ok(fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_thread_ids(true)
        .with_target(true)
        .boxed())
}

pub fn setup_logging(verbosity: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let mut layers: Vec<BoxedLayer> = vec![
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .compact()
            .boxed(),
    ];
    if let Some(path) = log_file {
        layers.push(file_layer(path)?);
    }

    tracing_subscriber::registry()
        .with(layers)
        .with(level_filter(verbosity, quiet))
        .init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::path::PathBuf;
    use std::sync::Once;
    use tracing::{debug, info, trace, warn};

    static INIT: Once = Once::new();

    #[test]
    fn verbosity_maps_to_levels() {
        assert_eq!(level_filter(0, false), LevelFilter::WARN);
        assert_eq!(level_filter(1, false), LevelFilter::INFO);
        assert_eq!(level_filter(2, false), LevelFilter::DEBUG);
        assert_eq!(level_filter(7, false), LevelFilter::TRACE);
        assert_eq!(level_filter(3, true), LevelFilter::ERROR);
    }

    #[test]
    #[serial]
    fn global_logger_accepts_every_level() {
        INIT.call_once(|| {
            setup_logging(3, false, None).expect("Failed to set up global logger for tests");
        });
        warn!(molecule = "ethanol", "implicit hydrogens");
        info!("prepared");
        trace!("serial 4");
    }

    #[test]
    #[serial]
    fn file_layer_writes_plain_text_with_thread_ids() {
        let dir = tempfile::tempdir().unwrap();
        let log_path = dir.path().join("prepare.log");

        let subscriber = tracing_subscriber::registry().with(file_layer(&log_path).unwrap());
        tracing::subscriber::with_default(subscriber, || {
            debug!("Prepared 3 of 3 molecules.");
        });

        let content = std::fs::read_to_string(log_path).unwrap();
        assert!(content.contains("Prepared 3 of 3 molecules."));
        assert!(content.contains("DEBUG"));
        assert!(content.contains("ThreadId"));
        assert!(!content.contains('\u{1b}'));
    }

    #[test]
    fn unwritable_log_path_is_an_io_error() {
        let dir = PathBuf::from("/");
        if cfg!(unix) && dir.is_dir() {
            assert!(matches!(file_layer(&dir), Err(CliError::Io(_))));
        }
    }
}
