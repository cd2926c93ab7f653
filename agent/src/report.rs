use chrono::{DateTime, Local};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^#{1,6}\s+(.*?)\s*$").unwrap());

static ENTRY_START: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*+])\s+").unwrap());

static LINK_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\((https?://[^)\s]+)\)").unwrap());

static BARE_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"https?://[^\s)>\]]+").unwrap());

const REFERENCE_TITLES: &[&str] = &["references", "refs", "sources", "bibliography", "参考文献"];

const MAX_PASSES: usize = 16;

/// A finished research report.
#[derive(Clone, Debug)]
pub struct Report {
    pub topic: String,
    pub generated_at: DateTime<Local>,
    pub iterations: usize,
    pub model: String,
    pub body: String,
}

impl std::fmt::Display for Report {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "# {} - Research Report\n- Date: {}\n- Searches: {}\n- Model: {}\n\n{}\n",
            self.topic,
            self.generated_at.format("%Y-%m-%d %H:%M"),
            self.iterations,
            self.model,
            self.body
        )
    }
}

/// Removes the repetition language models tend to produce in long answers:
/// repeated lines, repeated headings and several copies of the references
/// section. Applying it twice gives the same text as applying it once.
pub fn clean(report: &str) -> String {
    let mut current = report.to_string();
    for _ in 0..MAX_PASSES {
        let next = merge_references(&collapse_headings(&drop_repeated_lines(&current)));
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn heading_text(line: &str) -> Option<&str> {
    HEADING
        .captures(line)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

fn is_reference_heading(line: &str) -> bool {
    heading_text(line).is_some_and(|title| {
        let title = title.to_lowercase();
        REFERENCE_TITLES.iter().any(|r| title.starts_with(r))
    })
}

fn drop_repeated_lines(text: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    for line in text.split('\n') {
        if lines.last() != Some(&line) {
            lines.push(line);
        }
    }
    lines.join("\n")
}

/// `### A`, blank lines, `### A` becomes a single `### A`.
fn collapse_headings(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut kept = Vec::with_capacity(lines.len());

    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        kept.push(line);
        i += 1;

        if heading_text(line).is_none() {
            continue;
        }
        loop {
            let mut j = i;
            while j < lines.len() && lines[j].trim().is_empty() {
                j += 1;
            }
            if j < lines.len() && lines[j] == line {
                i = j + 1;
            } else {
                break;
            }
        }
    }

    kept.join("\n")
}

struct Section<'a> {
    heading: Option<&'a str>,
    body: Vec<&'a str>,
}

impl<'a> Section<'a> {
    fn is_references(&self) -> bool {
        self.heading.is_some_and(is_reference_heading)
    }

    fn lines(&self) -> impl Iterator<Item = &'a str> + '_ {
        self.heading.into_iter().chain(self.body.iter().copied())
    }
}

fn split_sections(text: &str) -> Vec<Section<'_>> {
    let mut sections = vec![Section {
        heading: None,
        body: Vec::new(),
    }];

    for line in text.split('\n') {
        if heading_text(line).is_some() {
            sections.push(Section {
                heading: Some(line),
                body: Vec::new(),
            });
        } else if let Some(last) = sections.last_mut() {
            last.body.push(line);
        }
    }
    sections
}

fn entry_url(entry: &[&str]) -> Option<String> {
    let text = entry.join("\n");
    LINK_URL
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .or_else(|| BARE_URL.find(&text))
        .map(|m| m.as_str().to_string())
}

/// Splits a references body into its leading text and its list entries.
/// Continuation lines stay with their entry; blank lines are dropped.
fn split_entries<'a>(body: &[&'a str]) -> (Vec<&'a str>, Vec<Vec<&'a str>>) {
    let mut preface = Vec::new();
    let mut entries: Vec<Vec<&'a str>> = Vec::new();

    for &line in body {
        if line.trim().is_empty() {
            continue;
        }
        if ENTRY_START.is_match(line) {
            entries.push(vec![line]);
        } else if let Some(entry) = entries.last_mut() {
            entry.push(line);
        } else {
            preface.push(line);
        }
    }
    (preface, entries)
}

/// Keeps the first references heading, gathers the entries of every
/// references section under it without repeating a URL, and moves the
/// other sections that followed it behind the merged list.
fn merge_references(text: &str) -> String {
    let sections = split_sections(text);
    if sections.iter().filter(|s| s.is_references()).count() < 2 {
        return text.to_string();
    }
    let Some(first_ref) = sections.iter().position(Section::is_references) else {
        return text.to_string();
    };

    let mut seen_urls = HashSet::new();
    let mut merged: Vec<&str> = Vec::new();
    let mut trailing: Vec<&Section> = Vec::new();

    for section in &sections[first_ref..] {
        if !section.is_references() {
            trailing.push(section);
            continue;
        }

        let (preface, entries) = split_entries(&section.body);
        if merged.is_empty() {
            merged.extend(section.heading);
            merged.extend(preface);
        }

        for entry in entries {
            let fresh = match entry_url(&entry) {
                Some(url) => seen_urls.insert(url),
                None => true,
            };
            if fresh {
                merged.extend(entry);
            }
        }
    }

    let mut lines: Vec<&str> = sections[..first_ref]
        .iter()
        .flat_map(Section::lines)
        .collect();
    lines.extend(merged);
    if !trailing.is_empty() {
        lines.push("");
        lines.extend(trailing.into_iter().flat_map(Section::lines));
    } else if text.ends_with('\n') {
        lines.push("");
    }

    lines.join("\n")
}
