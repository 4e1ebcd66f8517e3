use super::{theme, Icons};
use indicatif::{HumanDuration, ProgressBar};
use owo_colors::OwoColorize;
use std::thread;
use std::time::Duration;

/// What analysis workers report back while they run.
#[derive(Clone, Debug)]
pub enum UnitEvent {
    Started(String),
    Finished { unit: String, failed: bool },
}

/// One bar over all input units, driven from a channel so workers never
/// touch the terminal themselves.
pub struct UnitProgress {
    bar: ProgressBar,
    handle: thread::JoinHandle<()>,
}

impl UnitProgress {
    pub fn new(total: usize) -> (Self, crossbeam::channel::Sender<UnitEvent>) {
        let (tx, rx) = crossbeam::channel::unbounded::<UnitEvent>();

        let bar = if console::Term::stdout().is_term() {
            ProgressBar::new(total as u64).with_message("Analyzing")
        } else {
            ProgressBar::hidden()
        };

        let bar_clone = bar.clone();
        let handle = thread::spawn(move || {
            for event in rx {
                match event {
                    UnitEvent::Started(unit) => bar_clone.set_message(format!("Analyzing: {}", unit)),
                    UnitEvent::Finished { unit, failed: true } => {
                        bar_clone.println(format!("{} {}", Icons::CROSS, unit));
                        bar_clone.inc(1);
                    }
                    UnitEvent::Finished { .. } => bar_clone.inc(1),
                }
            }
        });

        (Self { bar, handle }, tx)
    }

    /// Wait for every sender to be dropped, then clear the bar.
    pub fn finish(self) {
        if self.handle.join().is_err() {
            tracing::warn!("progress thread panicked");
        }
        self.bar.finish_and_clear();
    }
}

/// Closing line of a multi-unit run.
pub fn summary(elapsed: Duration, units: usize, failures: usize) {
    let style = if failures == 0 {
        theme().success.clone()
    } else {
        theme().warn.clone()
    };
    println!(
        "{} {}  {} {} ok, {} failed",
        Icons::CHECK.style(style.clone()),
        format!("Complete in {}", HumanDuration(elapsed)).style(style),
        Icons::FILE.style(theme().info.clone()),
        units.saturating_sub(failures),
        failures
    );
}
