//! Bracket-annotated line grammar.
//!
//! ```text
//! [<key>(,<value>)(,<frequency>)(,<offset>)](<modifiers>) <title> #tag (: <notes>)
//! <note line>
//! ```
//!
//! # Invariants
//! - A rule's notes block is every plain line after it up to the next
//!   bracketed line, blank line or comment (`#`, `<!--`, `%%`).
//! - A rule's `SourcePosition::Lines` covers its bracket line plus its notes.
//! - Lines that belong to no rule (prose, comments, malformed entries and
//!   their notes) are never touched by `rewrite`.
//! - Parsing normalizes an absent period to 1, so re-serialized periodic
//!   rules parse back field-for-field.
//! - A note line that would read as an entry, a comment or an escape
//!   (`[`, `#`, `<!--`, `%%`, `\`) is written with a leading `\`, which
//!   parsing strips again.
//! - `encode_rule` refuses titles and tags that would not read back as
//!   themselves.

use crate::model::rule::{
    notes_separator, parse_weekday_token, weekday_token, Rule, RuleKey, RuleValidationError,
    Schedule, SourcePosition,
};
use crate::store::{
    ParsedStore, StoreCodec, StoreEntryError, StoreError, StoreResult, StoreWarning,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static ENTRY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\[([^\[\]]*)\]([A-Za-z]*)(?:\s+(.*))?$").expect("valid entry regex")
});
static LEGACY_PERIOD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z]+)%(\d+)(?:\+(-?\d+))?$").expect("valid legacy period regex")
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#[\w-]+$").expect("valid tag regex"));

/// Codec for the bracket grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownCodec;

impl StoreCodec for MarkdownCodec {
    fn parse(&self, source: &str) -> StoreResult<ParsedStore> {
        Ok(parse_markdown(source))
    }

    fn serialize(&self, rules: &[Rule]) -> StoreResult<String> {
        let mut out = String::new();
        for rule in rules {
            out.push_str(&encode_rule(rule)?);
            out.push('\n');
        }
        Ok(out)
    }

    fn rewrite(&self, source: &str, removed: &[Rule]) -> StoreResult<String> {
        let ranges: Vec<(usize, usize)> = removed
            .iter()
            .filter_map(|rule| match rule.source {
                Some(SourcePosition::Lines { start, end }) => Some((start, end)),
                _ => None,
            })
            .collect();

        let mut out = String::with_capacity(source.len());
        for (index, line) in source.split_inclusive('\n').enumerate() {
            if !ranges
                .iter()
                .any(|(start, end)| (*start..*end).contains(&index))
            {
                out.push_str(line);
            }
        }
        Ok(out)
    }

    fn append(&self, source: &str, rule: &Rule) -> StoreResult<String> {
        let encoded = encode_rule(rule)?;
        let mut out = String::with_capacity(source.len() + encoded.len() + 2);
        out.push_str(source);
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(&encoded);
        out.push('\n');
        Ok(out)
    }
}

enum Block {
    /// Plain lines here belong to nothing.
    Detached,
    /// Plain lines here are notes of `rules[index]`.
    Rule(usize),
    /// Plain lines here follow a skipped entry and stay untouched.
    Skipped,
}

/// Parses a whole bracket-grammar store; never fails as a whole.
pub fn parse_markdown(source: &str) -> ParsedStore {
    let mut store = ParsedStore::default();
    let mut block = Block::Detached;

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_comment(trimmed) {
            block = Block::Detached;
            continue;
        }

        if trimmed.starts_with('[') {
            let position = SourcePosition::Lines {
                start: index,
                end: index + 1,
            };
            match parse_entry(trimmed) {
                Ok(mut rule) => {
                    rule.source = Some(position);
                    store.rules.push(rule);
                    block = Block::Rule(store.rules.len() - 1);
                }
                Err(error) => {
                    store.warnings.push(StoreWarning {
                        position,
                        text: line.to_string(),
                        error,
                    });
                    block = Block::Skipped;
                }
            }
            continue;
        }

        if let Block::Rule(rule_index) = block {
            let rule = &mut store.rules[rule_index];
            rule.push_note(trimmed.strip_prefix(NOTE_ESCAPE).unwrap_or(trimmed));
            if let Some(SourcePosition::Lines { end, .. }) = rule.source.as_mut() {
                *end = index + 1;
            }
        }
    }

    store
}

fn is_comment(trimmed: &str) -> bool {
    trimmed.starts_with('#') || trimmed.starts_with("<!--") || trimmed.starts_with("%%")
}

const NOTE_ESCAPE: char = '\\';

fn needs_escape(note: &str) -> bool {
    note.starts_with('[') || note.starts_with(NOTE_ESCAPE) || is_comment(note)
}

/// Parses one bracketed line (without its notes block).
pub fn parse_entry(line: &str) -> Result<Rule, StoreEntryError> {
    let captures = ENTRY_RE
        .captures(line.trim())
        .ok_or_else(|| StoreEntryError::parse("expected `[key] title`"))?;
    let spec = captures.get(1).map_or("", |m| m.as_str()).trim();
    let modifiers = captures.get(2).map_or("", |m| m.as_str());
    let text = captures.get(3).map_or("", |m| m.as_str()).trim();

    let mut rule = parse_key(spec)?;
    for modifier in modifiers.chars() {
        match modifier.to_ascii_lowercase() {
            'd' => rule.delete_after_send = true,
            'c' => rule.command = Some(String::new()),
            other => {
                return Err(StoreEntryError::parse(format!(
                    "unknown modifier `{other}` (expected d or c)"
                )))
            }
        }
    }

    let is_command = rule.command.is_some();
    let (title, notes, tags) = split_text(text, is_command);
    if title.is_empty() {
        return Err(StoreEntryError::parse("missing title"));
    }
    if is_command {
        rule.command = Some(title.clone());
    }
    rule.title = title;
    rule.notes = notes;
    rule.tags = tags;

    rule.validate()?;
    Ok(rule)
}

fn parse_key(spec: &str) -> Result<Rule, StoreEntryError> {
    if let Some(captures) = LEGACY_PERIOD_RE.captures(spec) {
        let unit = &captures[1];
        let mut rule = periodic_shell(unit)
            .ok_or_else(|| StoreEntryError::parse(format!("unknown period unit `{unit}`")))?;
        rule.frequency = Some(parse_frequency(rule.key, Some(&captures[2]))?);
        rule.offset = parse_offset(rule.key, captures.get(3).map(|m| m.as_str()))?;
        return Ok(rule);
    }

    let fields: Vec<&str> = spec.split(',').map(str::trim).collect();
    let head = fields[0].to_ascii_lowercase();
    let rest = &fields[1..];

    match head.as_str() {
        "" => Err(StoreEntryError::parse("empty key")),
        "dom" => {
            if rest.len() > 1 {
                return Err(StoreEntryError::parse("too many fields for dom"));
            }
            let mut rule = Rule::new(RuleKey::DayOfMonth, "");
            rule.value = rest.first().map(|value| value.to_string());
            Ok(rule)
        }
        "date" => {
            let mut rule = Rule::new(RuleKey::Date, "");
            rule.value = rest.first().map(|value| value.to_string());
            Ok(rule)
        }
        "later" => Ok(Rule::new(RuleKey::Later, "")),
        "now" => Err(StoreEntryError::parse("now rules are never stored")),
        _ => {
            if let Some(mut rule) = periodic_shell(&head) {
                if rest.len() > 2 {
                    return Err(StoreEntryError::parse(format!(
                        "too many fields for `{}`",
                        fields[0]
                    )));
                }
                rule.frequency = Some(parse_frequency(rule.key, rest.first().copied())?);
                rule.offset = parse_offset(rule.key, rest.get(1).copied())?;
                return Ok(rule);
            }
            if head.starts_with(|c: char| c.is_ascii_digit()) {
                // Looks like a date; validation reports a bad one.
                let mut rule = Rule::new(RuleKey::Date, "");
                rule.value = Some(fields[0].to_string());
                return Ok(rule);
            }
            Err(StoreEntryError::parse(format!("unknown key `{}`", fields[0])))
        }
    }
}

/// Rule shell for a unit token (`d`, `w`, `m`) or weekday name.
fn periodic_shell(unit: &str) -> Option<Rule> {
    let key = match unit.to_ascii_lowercase().as_str() {
        "d" => RuleKey::Day,
        "w" => RuleKey::Week,
        "m" => RuleKey::Month,
        other => {
            let weekday = parse_weekday_token(other)?;
            let mut rule = Rule::new(RuleKey::DayOfWeek, "");
            rule.value = Some(weekday_token(weekday).to_string());
            return Some(rule);
        }
    };
    Some(Rule::new(key, ""))
}

fn parse_frequency(key: RuleKey, raw: Option<&str>) -> Result<u32, StoreEntryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(1),
        Some(raw) => raw.parse::<u32>().map_err(|_| {
            StoreEntryError::Validation(RuleValidationError::InvalidFrequency {
                key,
                value: raw.to_string(),
            })
        }),
    }
}

fn parse_offset(key: RuleKey, raw: Option<&str>) -> Result<i64, StoreEntryError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(0),
        Some(raw) => raw.parse::<i64>().map_err(|_| {
            StoreEntryError::Validation(RuleValidationError::InvalidOffset {
                key,
                value: raw.to_string(),
            })
        }),
    }
}

/// Splits `title #tags: notes`. Command text keeps its colons.
fn split_text(text: &str, is_command: bool) -> (String, String, BTreeSet<String>) {
    let (head, notes) = if is_command {
        (text, "")
    } else {
        match notes_separator(text) {
            Some(index) => (&text[..index], text[index + 1..].trim()),
            None => (text, ""),
        }
    };

    let mut title = head.trim();
    let mut tags = BTreeSet::new();
    while let Some((rest, last)) = title.rsplit_once(char::is_whitespace) {
        if !TAG_RE.is_match(last) || rest.trim().is_empty() {
            break;
        }
        tags.insert(last.trim_start_matches('#').to_lowercase());
        title = rest.trim_end();
    }

    (title.to_string(), notes.to_string(), tags)
}

/// Why `text` would parse back as something else, if it would.
fn unreadable_text(text: &str, is_command: bool) -> Option<&'static str> {
    if text.contains(['\n', '\r']) {
        return Some("it spans several lines");
    }
    if !is_command && notes_separator(text).is_some() {
        return Some("a `:` followed by a space starts notes");
    }
    match text.rsplit_once(char::is_whitespace) {
        Some((rest, last)) if TAG_RE.is_match(last) && !rest.trim().is_empty() => {
            Some("a trailing `#word` reads as a tag")
        }
        _ => None,
    }
}

/// Canonical bracket form of `rule`, including its notes lines.
///
/// # Errors
/// - `InvalidRule` when the rule does not validate.
/// - `NotPersistable` for `Now` rules.
/// - `InvalidDocument` for a title or tag that would not parse back.
pub fn encode_rule(rule: &Rule) -> StoreResult<String> {
    let head = match rule.schedule()? {
        Schedule::Date(_) => rule.value.as_deref().unwrap_or_default().trim().to_string(),
        Schedule::Day(_) => periodic_head("d", rule),
        Schedule::Week(_) => periodic_head("w", rule),
        Schedule::Month(_) => periodic_head("m", rule),
        Schedule::DayOfWeek { weekday, .. } => periodic_head(weekday_token(weekday), rule),
        Schedule::DayOfMonth(_) => format!(
            "dom,{}",
            rule.value.as_deref().unwrap_or_default().trim()
        ),
        Schedule::Later => "later".to_string(),
        Schedule::Now => return Err(StoreError::NotPersistable(RuleKey::Now)),
    };

    let text = rule.command.as_deref().unwrap_or(&rule.title).trim();
    if text.is_empty() {
        return Err(StoreError::InvalidDocument(
            "rule title must not be empty".to_string(),
        ));
    }
    if let Some(reason) = unreadable_text(text, rule.command.is_some()) {
        return Err(StoreError::InvalidDocument(format!(
            "title `{text}` cannot be stored in bracket form: {reason}"
        )));
    }
    if let Some(tag) = rule.tags.iter().find(|tag| !TAG_RE.is_match(&format!("#{tag}"))) {
        return Err(StoreError::InvalidDocument(format!(
            "tag `{tag}` cannot be stored in bracket form"
        )));
    }

    let mut line = format!("[{head}]");
    if rule.command.is_some() {
        line.push('c');
    }
    if rule.delete_after_send {
        line.push('d');
    }
    line.push(' ');
    line.push_str(text);
    for tag in &rule.tags {
        line.push_str(" #");
        line.push_str(tag);
    }
    for note in rule.notes.lines().map(str::trim).filter(|note| !note.is_empty()) {
        line.push('\n');
        if needs_escape(note) {
            line.push(NOTE_ESCAPE);
        }
        line.push_str(note);
    }
    Ok(line)
}

fn periodic_head(token: &str, rule: &Rule) -> String {
    match (rule.period(), rule.offset) {
        (1, 0) => token.to_string(),
        (frequency, 0) => format!("{token},{frequency}"),
        (frequency, offset) => format!("{token},{frequency},{offset}"),
    }
}
