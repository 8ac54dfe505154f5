//! Parsers for the instance console's line-oriented output.
//!
//! Pure functions: text in, typed records out. Malformed lines are skipped
//! rather than failing the whole scan, because the console interleaves
//! warnings with its tables.

use serde::Serialize;

/// One row of the console's `list2` enumeration.
///
/// Column layout: `index,name,top_hwnd,bind_hwnd,android_started,pid,vbox_pid[,width,height,dpi]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConsoleEntry {
    pub index: u32,
    pub name: String,
    /// The guest OS reported itself started (boot-complete signal).
    pub android_started: bool,
    /// Host process id, `None` when the console reports `-1` or `0`.
    pub pid: Option<u32>,
}

impl ConsoleEntry {
    /// Whether the console has a live process for this instance.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.pid.is_some() || self.android_started
    }
}

/// Parse `list2` output. The first occurrence of a name wins.
#[must_use]
pub fn parse_list2(output: &str) -> Vec<ConsoleEntry> {
    let mut entries: Vec<ConsoleEntry> = Vec::new();
    for line in output.lines() {
        let Some(entry) = parse_list2_line(line) else {
            continue;
        };
        if entries.iter().any(|e| e.name == entry.name) {
            continue;
        }
        entries.push(entry);
    }
    entries
}

fn parse_list2_line(line: &str) -> Option<ConsoleEntry> {
    let mut fields = line.trim().split(',').map(str::trim);
    let index = fields.next()?.parse::<u32>().ok()?;
    let name = fields.next().filter(|n| !n.is_empty())?.to_string();
    let _top_hwnd = fields.next();
    let _bind_hwnd = fields.next();
    let android_started = fields.next().is_some_and(|v| v == "1");
    let pid = fields
        .next()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|pid| *pid > 0)
        .and_then(|pid| u32::try_from(pid).ok());
    Some(ConsoleEntry {
        index,
        name,
        android_started,
        pid,
    })
}

/// Parse one-name-per-line output (`list`, `runninglist`).
#[must_use]
pub fn parse_names(output: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in output.lines() {
        let name = line.trim();
        if name.is_empty() || names.iter().any(|n| n == name) {
            continue;
        }
        names.push(name.to_string());
    }
    names
}
