use error_stack::{Report, ResultExt};
use log::LevelFilter;

use crate::error::HtdsaError;

/// Initialize logging to stderr. Should be called once at the start of main().
///
/// # Errors
///
/// Returns an error if a global logger has already been installed.
pub fn init_logging(level: LevelFilter) -> Result<(), Report<HtdsaError>> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}  {} {} {}",
                chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
                record.level(),
                record.target(),
                message
            ));
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .change_context(HtdsaError::Configuration {
            message: "Failed to initialize logger".into(),
        })
}
