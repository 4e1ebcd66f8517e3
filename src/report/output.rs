use super::{theme, Icons};
use crate::analysis::Analysis;
use crate::binding::BindingId;
use owo_colors::{OwoColorize, Style};

/// One status line: icon, then the styled text.
fn status_line(icon: &str, text: &str, style: &Style) -> String {
    format!("{} {}", icon, text.style(style.clone()))
}

pub fn header(text: &str) {
    println!("{}", status_line(Icons::ROCKET, text, &theme().header));
}

pub fn success(label: &str) {
    println!("{}", status_line(Icons::CHECK, label, &theme().success));
}

/// Errors and warnings go to stderr so JSON output stays parseable.
pub fn error(label: &str) {
    eprintln!("{}", status_line(Icons::CROSS, label, &theme().error));
}

pub fn warn(label: &str) {
    eprintln!("{}", status_line(Icons::WARN, label, &theme().warn));
}

pub fn info(label: &str, value: &str) {
    let icon = Icons::INFO.style(theme().info.clone()).to_string();
    println!("{}: {}", status_line(&icon, label, &theme().dim), value);
}

pub fn section(title: &str) {
    println!();
    println!("━{}━", title.style(theme().header.clone()));
}

pub fn summary_row(label: &str, value: &str) {
    println!("  {} {}", label.style(theme().dim.clone()), value);
}

/// Upstream and downstream closure of `id`, one binding per line.
pub fn lineage(analysis: &Analysis, id: BindingId) {
    header(&analysis.path_of(id));
    listing(analysis, Icons::UP, "Upstream", &analysis.upstream(id));
    listing(analysis, Icons::DOWN, "Downstream", &analysis.downstream(id));
}

fn listing(analysis: &Analysis, icon: &str, title: &str, ids: &[BindingId]) {
    section(&format!("{} {} ({})", icon, title, ids.len()));
    if ids.is_empty() {
        println!("  {}", "none".style(theme().dim.clone()));
    }
    for &id in ids {
        println!(
            "  {} {}",
            analysis.binding(id).kind.as_str().style(theme().kind.clone()),
            analysis.path_of(id)
        );
    }
}
