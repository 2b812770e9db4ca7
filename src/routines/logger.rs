use crate::routines::output::OutputFile;
use crate::routines::settings::Settings;
use eyre::Result;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::fmt::{self};
use tracing_subscriber::prelude::__tracing_subscriber_SubscriberExt;
use tracing_subscriber::registry::Registry;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Setup logging for the library
///
/// This function sets up logging for the library. It uses the `tracing` crate, and the `tracing-subscriber` crate for formatting.
///
/// The log level is defined in the settings, and defaults to `INFO`. Log messages are written to stdout, and to the
/// log file named in the settings if output is enabled.
///
/// If `log.write` is `false`, no global subscriber is installed. Installing a subscriber when one is already set
/// is not an error; the existing subscriber is kept. The log file is appended to, so repeated runs into the same
/// folder never truncate a log that is still being written.
pub fn setup_log(settings: &Settings) -> Result<()> {
    if !settings.log.write {
        return Ok(());
    }

    // Use the log level defined in the settings
    let log_level = settings.log.level.as_str();
    let env_filter = EnvFilter::new(log_level);

    // Define a registry with that level as an environment filter
    let subscriber = Registry::default().with(env_filter);

    // Define layer for file
    let file_layer = if settings.output.write {
        let outputfile = OutputFile::append(&settings.output.path, &settings.log.file)?;
        let layer = fmt::layer()
            .with_writer(outputfile.file_owned())
            .with_ansi(false)
            .with_timer(CompactTimestamp);
        Some(layer)
    } else {
        None
    };

    // Define layer for stdout
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false)
        .with_timer(CompactTimestamp);

    // Combine layers with subscriber
    if subscriber
        .with(file_layer)
        .with(stdout_layer)
        .try_init()
        .is_err()
    {
        tracing::debug!("A global subscriber is already set, keeping it");
    }
    tracing::debug!("Logging is configured with level: {}", log_level);

    Ok(())
}

#[derive(Clone)]
struct CompactTimestamp;

impl FormatTime for CompactTimestamp {
    fn format_time(
        &self,
        w: &mut tracing_subscriber::fmt::format::Writer<'_>,
    ) -> Result<(), std::fmt::Error> {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S"))
    }
}
