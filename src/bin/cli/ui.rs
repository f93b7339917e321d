use agenda_migrate::migrate::{CommitEvent, Phase, ProgressObserver};
use clap::ValueEnum;
use indicatif::{ProgressBar, ProgressStyle};
use nu_ansi_term::{Color, Style};
use std::fmt::Display;
use std::io::IsTerminal;
use std::thread;
use std::time::{Duration, Instant};

/// Colour handling for text output.
#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum Theme {
    /// Colour when stdout is a terminal.
    Auto,
    /// Never colour.
    Plain,
}

pub struct Ui {
    palette: Option<Palette>,
    quiet: bool,
    spinner_style: ProgressStyle,
}

impl Ui {
    pub fn new(theme: Theme, quiet: bool) -> Self {
        let colour = theme == Theme::Auto && !quiet && std::io::stdout().is_terminal();

        #[cfg(windows)]
        if colour {
            let _ = nu_ansi_term::enable_ansi_support();
        }

        let spinner_style = ProgressStyle::with_template("{prefix} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

        Self {
            palette: colour.then(Palette::default),
            quiet,
            spinner_style,
        }
    }

    pub fn spacer(&self) {
        if !self.quiet {
            println!();
        }
    }

    /// Titled block of right-aligned `key: value` rows.
    pub fn section<'a, I, V>(&self, title: &str, rows: I)
    where
        I: IntoIterator<Item = (&'a str, V)>,
        V: Display,
    {
        let rows: Vec<(&str, String)> = rows
            .into_iter()
            .map(|(key, value)| (key, value.to_string()))
            .collect();
        let Some(width) = rows.iter().map(|(key, _)| key.len()).max() else {
            return;
        };
        self.heading(title);
        for (key, value) in rows {
            let label = format!("{key:>width$}:");
            match &self.palette {
                Some(p) => println!("  {} {}", p.key.paint(label), p.value.paint(value)),
                None => println!("  {label} {value}"),
            }
        }
    }

    /// Titled bullet list; prints nothing when `entries` is empty.
    pub fn list<I>(&self, title: &str, entries: I)
    where
        I: IntoIterator<Item = String>,
    {
        let mut entries = entries.into_iter().peekable();
        if entries.peek().is_none() {
            return;
        }
        self.heading(title);
        let bullet = match &self.palette {
            Some(p) => p.accent.paint("•").to_string(),
            None => "-".to_string(),
        };
        for entry in entries {
            println!("  {bullet} {entry}");
        }
    }

    pub fn info(&self, message: &str) {
        println!("{}", self.decorate(INFO_ICON, |p| p.accent, message));
    }

    pub fn success(&self, message: &str) {
        println!("{}", self.decorate(SUCCESS_ICON, |p| p.success, message));
    }

    pub fn warn(&self, message: &str) {
        eprintln!("{}", self.decorate(WARNING_ICON, |p| p.warn, message));
    }

    pub fn task(&self, label: impl Into<String>) -> TaskGuard<'_> {
        let label = label.into();
        let pb = (!self.quiet).then(|| {
            let pb = ProgressBar::new_spinner();
            pb.set_style(self.spinner_style.clone());
            pb.set_prefix(match &self.palette {
                Some(p) => p.accent.paint(PROGRESS_ICON).to_string(),
                None => PROGRESS_ICON.to_string(),
            });
            pb.set_message(label.clone());
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        });
        TaskGuard {
            ui: self,
            label,
            start: Instant::now(),
            finished: false,
            pb,
        }
    }

    /// Blocks for `secs` seconds, ticking a visible countdown. Ctrl+C aborts
    /// the process before anything destructive starts.
    pub fn countdown(&self, what: &str, secs: u64) {
        if secs == 0 {
            return;
        }
        let task = self.task(what);
        for remaining in (1..=secs).rev() {
            task.set_message(format!("{what} in {remaining}s (Ctrl+C to abort)"));
            thread::sleep(Duration::from_secs(1));
        }
        task.finish();
    }

    fn decorate(&self, icon: &str, style: fn(&Palette) -> Style, message: &str) -> String {
        if self.quiet {
            return message.to_string();
        }
        match &self.palette {
            Some(p) => format!("{} {message}", style(p).paint(icon)),
            None => format!("{icon} {message}"),
        }
    }

    fn heading(&self, title: &str) {
        match (&self.palette, self.quiet) {
            (_, true) => println!("{title}"),
            (Some(p), false) => println!("{}", p.heading.paint(format!("{HEADING_ICON} {title}"))),
            (None, false) => println!("{HEADING_ICON} {title}"),
        }
    }
}

/// Spinner tied to one long-running pass. Doubles as the pass's progress
/// observer so batch commits show up live.
pub struct TaskGuard<'a> {
    ui: &'a Ui,
    label: String,
    start: Instant,
    finished: bool,
    pb: Option<ProgressBar>,
}

impl TaskGuard<'_> {
    pub fn set_message(&self, message: String) {
        if let Some(pb) = &self.pb {
            pb.set_message(message);
        }
    }

    pub fn finish(mut self) -> Duration {
        self.finished = true;
        if let Some(pb) = self.pb.take() {
            pb.finish_and_clear();
        }
        self.start.elapsed()
    }
}

impl ProgressObserver for TaskGuard<'_> {
    fn on_phase(&self, phase: Phase) {
        self.set_message(format!("{}: {phase}", self.label));
    }

    fn on_bucket(&self, key: &str, records: usize) {
        self.set_message(format!("{}: bucket {key} ({records} records)", self.label));
    }

    fn on_commit(&self, event: &CommitEvent) {
        self.set_message(format!(
            "{}: {} batch #{} committed ({} ops so far)",
            self.label, event.scope, event.batch_seq, event.committed_ops
        ));
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let message = format!(
            "{} interrupted after {}",
            self.label,
            format_duration(self.start.elapsed())
        );
        match self.pb.take() {
            Some(pb) => pb.abandon_with_message(message),
            None => self.ui.warn(&message),
        }
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs >= 1.0 {
        format!("{secs:.2}s")
    } else {
        format!("{:.0}ms", secs * 1_000.0)
    }
}

struct Palette {
    heading: Style,
    key: Style,
    value: Style,
    accent: Style,
    success: Style,
    warn: Style,
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            heading: Style::new().fg(Color::Purple).bold(),
            key: Style::new().fg(Color::LightBlue).bold(),
            value: Style::new().fg(Color::White),
            accent: Style::new().fg(Color::LightCyan),
            success: Style::new().fg(Color::LightGreen).bold(),
            warn: Style::new().fg(Color::Yellow).bold(),
        }
    }
}

const HEADING_ICON: &str = "▸";
const SUCCESS_ICON: &str = "✔";
const WARNING_ICON: &str = "⚠";
const INFO_ICON: &str = "ℹ";
const PROGRESS_ICON: &str = "▶";
