//! Unified logging and progress UI.
//!
//! [`Notifier`] puts `env_logger` (text logs) and `indicatif` (a progress bar) under a single
//! verbosity switch:
//! - [`VerbosityLevel::Quiet`] → warnings only; shows a progress bar while images are inspected.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → standard logs,
//!   with periodic textual progress instead of a bar.
//!
//! Log lines emitted while the bar is visible are printed above it, so the two never tear.

use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Progress bar, warnings only
    Info = 1,  // Text logs at info level
    Debug = 2, // Text logs at debug level
    Trace = 3, // Text logs at trace level
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    progress_bar: RefCell<Option<ProgressBar>>,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        Self {
            verbosity: VerbosityLevel::from(verbosity_level),
            progress_bar: RefCell::new(None),
        }
    }

    /// Installs the global logger at this notifier's level; `RUST_LOG` still applies on top.
    /// A logger installed earlier (e.g. by a test harness) is left in place.
    pub fn init_logger(&self) {
        let _ = env_logger::Builder::from_env(Env::default())
            .filter_level(self.verbosity.to_log_level())
            .try_init();
    }

    /// Runs `emit` above the progress bar when one is showing
    fn emit(&self, emit: impl FnOnce()) {
        match self.progress_bar.borrow().as_ref() {
            Some(bar) => bar.suspend(emit),
            None => emit(),
        }
    }

    pub fn info(&self, message: &str) {
        match self.verbosity {
            VerbosityLevel::Quiet => {
                if let Some(bar) = self.progress_bar.borrow().as_ref() {
                    bar.set_message(message.to_string());
                }
            }
            _ => log::info!("{}", message),
        }
    }

    pub fn debug(&self, message: &str) {
        log::debug!("{}", message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(|| log::warn!("{}", message));
    }

    pub fn trace(&self, message: &str) {
        log::trace!("{}", message);
    }

    /// Shows a progress bar of `length` steps (Quiet mode only)
    pub fn start_progress(&self, length: u64, message: &str) {
        if !self.use_beautiful_progress() {
            return;
        }

        let bar = ProgressBar::new(length);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        *self.progress_bar.borrow_mut() = Some(bar);
    }

    pub fn progress(&self, current: u64, total: u64, message: &str) {
        match self.progress_bar.borrow().as_ref() {
            Some(bar) => bar.set_position(current),
            None => {
                if self.verbosity != VerbosityLevel::Quiet && (current % 100 == 0 || current == total)
                {
                    log::info!("{}: {}/{}", message, current, total);
                }
            }
        }
    }

    pub fn finish_progress(&self) {
        if let Some(bar) = self.progress_bar.borrow_mut().take() {
            bar.finish_and_clear();
        }
    }

    pub fn use_beautiful_progress(&self) -> bool {
        self.verbosity == VerbosityLevel::Quiet
    }

    pub fn verbosity_level(&self) -> VerbosityLevel {
        self.verbosity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_from_flag_count() {
        assert_eq!(VerbosityLevel::from(0), VerbosityLevel::Quiet);
        assert_eq!(VerbosityLevel::from(2), VerbosityLevel::Debug);
        assert_eq!(VerbosityLevel::from(7), VerbosityLevel::Trace);
        assert_eq!(VerbosityLevel::Quiet.to_log_level(), LevelFilter::Warn);
    }

    #[test]
    fn test_progress_bar_only_in_quiet_mode() {
        let verbose = Notifier::new(1);
        verbose.start_progress(10, "Inspecting");
        assert!(verbose.progress_bar.borrow().is_none());

        let quiet = Notifier::new(0);
        quiet.start_progress(10, "Inspecting");
        quiet.progress(3, 10, "Inspecting");
        assert_eq!(
            quiet.progress_bar.borrow().as_ref().map(|bar| bar.position()),
            Some(3)
        );
        quiet.finish_progress();
        assert!(quiet.progress_bar.borrow().is_none());
    }
}
