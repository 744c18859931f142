use log::LevelFilter;
use simplelog::{Config, SimpleLogger};

/// level of the console logger for a `pt` verbosity
pub fn level_for_verbosity(verbosity: usize) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 | 2 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    }
}

/// Installs a console logger. A logger that is already installed is kept.
pub fn init_logger(verbosity: usize) -> bool {
    SimpleLogger::init(level_for_verbosity(verbosity), Config::default()).is_ok()
}
