//! Terminal status output for the relay binary.
//!
//! Pretty mode draws `indicatif` spinners on stderr; plain mode prints
//! `==>` lines. Headless runs use `Ui::headless()` and print nothing beyond logs.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
    Off,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn headless() -> Self {
        Self::new(UiMode::Off, false)
    }

    pub fn from_args(ui_flag: Option<&str>, headless: bool, is_tty: bool) -> Self {
        if headless {
            return Self::headless();
        }
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty && matches!(self.mode, UiMode::Pretty | UiMode::Auto)
    }

    fn spinner(template: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        match self.mode {
            UiMode::Off => StageGuard::new(name.to_string(), None, false),
            _ if self.use_pretty() => {
                let spinner = Self::spinner("{spinner} {msg}");
                spinner.set_message(format!("{name}…"));
                StageGuard::new(name.to_string(), Some(spinner), true)
            }
            _ => {
                eprintln!("==> {}", name);
                StageGuard::new(name.to_string(), None, true)
            }
        }
    }

    /// Live frame counter for the relay loop.
    pub fn status(&self, label: &str) -> StatusLine {
        let spinner = match self.mode {
            UiMode::Off => None,
            _ if self.use_pretty() => Some(Self::spinner("{spinner} {prefix} {msg}")),
            _ => None,
        };
        if let Some(spinner) = &spinner {
            spinner.set_prefix(label.to_string());
        }
        StatusLine {
            label: label.to_string(),
            spinner,
            plain: matches!(self.mode, UiMode::Plain | UiMode::Auto) && !self.use_pretty(),
            started: Instant::now(),
            last_plain: None,
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    spinner: Option<ProgressBar>,
    visible: bool,
}

impl StageGuard {
    fn new(name: String, spinner: Option<ProgressBar>, visible: bool) -> Self {
        Self {
            name,
            start: Instant::now(),
            spinner,
            visible,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        if !self.visible {
            return;
        }
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else {
            eprintln!("{message}");
        }
    }
}

const PLAIN_INTERVAL: Duration = Duration::from_secs(5);

pub struct StatusLine {
    label: String,
    spinner: Option<ProgressBar>,
    plain: bool,
    started: Instant,
    last_plain: Option<Instant>,
}

impl StatusLine {
    /// Redraw with the latest counters. Plain mode prints at most every few seconds.
    pub fn update(&mut self, frames: u64, buffered: usize) {
        let message = status_message(frames, buffered, self.started.elapsed());
        if let Some(spinner) = &self.spinner {
            spinner.set_message(message);
            return;
        }
        if self.plain
            && self
                .last_plain
                .is_none_or(|last| last.elapsed() >= PLAIN_INTERVAL)
        {
            eprintln!("==> {} {}", self.label, message);
            self.last_plain = Some(Instant::now());
        }
    }

    pub fn finish(self, frames: u64) {
        let message = format!(
            "✔ {} {} frame(s) in {}",
            self.label,
            frames,
            format_duration(self.started.elapsed())
        );
        if let Some(spinner) = &self.spinner {
            spinner.finish_with_message(message);
        } else if self.plain {
            eprintln!("{message}");
        }
    }
}

fn status_message(frames: u64, buffered: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    let rate = if secs > 0.0 { frames as f64 / secs } else { 0.0 };
    format!("{frames} frame(s), {rate:.1} fps, {buffered} buffered")
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}
