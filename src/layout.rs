use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::clock::human_duration;
use crate::event::{Failure, LogEntry};
use crate::registry::{Row, TaskView};

pub const MIN_BAR_WIDTH: usize = 10;
const FILLED: char = '█';
const EMPTY: char = '-';
const INDETERMINATE: char = '~';
const EMPTY_SLOT: &str = "---";
const MESSAGE_TIMESTAMP_FORMAT: &str = "%d %B %Y %H:%M:%S";

/// Point-in-time copy of everything a frame shows.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub rows: Vec<Row>,
    /// Oldest first.
    pub messages: Vec<LogEntry>,
    /// Oldest first, rendered newest first.
    pub failures: Vec<Failure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u16,
    pub height: u16,
}

/// Builds the frame top to bottom: task rows, then messages, then failures. The frame keeps
/// one terminal row free, and when it doesn't fit the oldest messages go first.
pub fn layout(snapshot: &Snapshot, decimal_places: u8, size: FrameSize) -> Vec<String> {
    let width = usize::from(size.width.saturating_sub(1));
    let budget = usize::from(size.height.saturating_sub(1));

    let mut tasks = task_lines(&snapshot.rows, decimal_places, width);
    tasks.truncate(budget);

    let mut failures: Vec<String> = snapshot
        .failures
        .iter()
        .rev()
        .flat_map(failure_lines)
        .map(|line| truncate_to_width(&line, width))
        .collect();
    failures.truncate(budget - tasks.len());

    let room = budget - tasks.len() - failures.len();
    let skip = snapshot.messages.len().saturating_sub(room);
    let messages = snapshot.messages[skip..]
        .iter()
        .map(|entry| truncate_to_width(&message_line(entry), width));

    tasks.extend(messages);
    tasks.extend(failures);
    tasks
}

pub fn task_lines(rows: &[Row], decimal_places: u8, width: usize) -> Vec<String> {
    let views = || {
        rows.iter().filter_map(|row| match row {
            Row::Slot(view) => view.as_ref(),
            Row::Task(view) => Some(view),
        })
    };
    let prefix_width = views().map(|view| view.prefix.width()).max().unwrap_or(0);
    let tail_width = views().map(|view| tail(view).width()).max().unwrap_or(0);
    let percent_width = percent_width(decimal_places);
    let lead = if prefix_width > 0 { prefix_width + 1 } else { 0 };
    // "|bar| " and "%" around the percentage.
    let fixed = lead + 3 + percent_width + 1 + tail_width;
    let bar_width = width.saturating_sub(fixed).max(MIN_BAR_WIDTH);

    rows.iter()
        .map(|row| {
            let line = match row {
                Row::Slot(None) => format!("{:lead$}{EMPTY_SLOT}", ""),
                Row::Slot(Some(view)) | Row::Task(view) => {
                    task_line(view, prefix_width, bar_width, decimal_places)
                }
            };
            truncate_to_width(&line, width)
        })
        .collect()
}

/// `prefix |bar| percent% suffix (elapsed)`, prefix padded to `prefix_width`.
pub fn task_line(view: &TaskView, prefix_width: usize, bar_width: usize, decimal_places: u8) -> String {
    let mut line = String::new();
    if prefix_width > 0 {
        line.push_str(&view.prefix);
        let padding = prefix_width.saturating_sub(view.prefix.width());
        line.extend(std::iter::repeat(' ').take(padding + 1));
    }

    let percent_width = percent_width(decimal_places);
    let places = usize::from(decimal_places);
    match view.total {
        Some(total) if total > 0 => {
            let ratio = view.current.min(total) as f64 / total as f64;
            let filled = ((bar_width as f64) * ratio).round() as usize;
            line.push('|');
            line.extend(std::iter::repeat(FILLED).take(filled));
            line.extend(std::iter::repeat(EMPTY).take(bar_width - filled));
            line.push_str(&format!("| {:>percent_width$.places$}%", ratio * 100.0));
        }
        _ => {
            line.push('|');
            line.extend(std::iter::repeat(INDETERMINATE).take(bar_width));
            line.push_str(&format!("| {:>percent_width$}%", "?"));
        }
    }
    line.push_str(&tail(view));
    line
}

fn tail(view: &TaskView) -> String {
    let mut tail = String::new();
    if !view.suffix.is_empty() {
        tail.push(' ');
        tail.push_str(&view.suffix);
    }
    if let Some(elapsed) = view.elapsed {
        let elapsed = human_duration(elapsed);
        if view.finished {
            tail.push_str(&format!(" [{elapsed}]"));
        } else {
            tail.push_str(&format!(" ({elapsed})"));
        }
    }
    tail
}

fn percent_width(decimal_places: u8) -> usize {
    match decimal_places {
        0 => 3,
        places => 4 + usize::from(places),
    }
}

pub fn message_line(entry: &LogEntry) -> String {
    let timestamp = entry
        .timestamp
        .format(MESSAGE_TIMESTAMP_FORMAT)
        .to_string()
        .to_lowercase();
    format!("{timestamp} [{}] {}", entry.level, entry.text)
}

fn failure_lines(failure: &Failure) -> Vec<String> {
    let timestamp = failure
        .timestamp
        .format(MESSAGE_TIMESTAMP_FORMAT)
        .to_string()
        .to_lowercase();
    let mut lines = vec![format!("{timestamp} [EXCEPTION] [{}]:", failure.origin)];
    lines.extend(failure.lines.iter().cloned());
    lines
}

pub fn truncate_to_width(text: &str, width: usize) -> String {
    let mut used = 0;
    let mut truncated = String::new();
    for c in text.chars() {
        used += c.width().unwrap_or(0);
        if used > width {
            break;
        }
        truncated.push(c);
    }
    truncated
}
