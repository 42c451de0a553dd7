//! YAML list-of-records grammar.
//!
//! ```yaml
//! reminders:
//!   - name: take out the trash
//!     day: mon,thu
//!     every: 2
//!     offset: 1
//!     tags: [home]
//! ```
//!
//! # Invariants
//! - Exactly one schedule field is honoured, by precedence
//!   `later` > `date` > `dom` > `day` > `every`.
//! - A `day` list produces one rule per weekday, all with the same
//!   `SourcePosition::Record`. `rewrite` drops only the removed weekdays and
//!   deletes the record once none are left.
//! - Records that are not removed are re-emitted as the values that were read.

use crate::model::rule::{
    normalize_tags, parse_weekday_token, weekday_token, Rule, RuleKey, RuleValidationError,
    Schedule, SourcePosition,
};
use crate::store::{
    ParsedStore, StoreCodec, StoreEntryError, StoreError, StoreResult, StoreWarning,
};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

const REMINDERS_KEY: &str = "reminders";

/// Codec for the YAML records grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordsCodec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Record {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    later: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    date: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dom: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    every: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    offset: Option<Value>,
    #[serde(default)]
    delete: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tags: Option<Tags>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum Tags {
    List(Vec<String>),
    Csv(String),
}

impl StoreCodec for RecordsCodec {
    fn parse(&self, source: &str) -> StoreResult<ParsedStore> {
        let document = load_document(source)?;
        let mut store = ParsedStore::default();

        for (index, item) in reminders(&document)?.iter().enumerate() {
            let position = SourcePosition::Record(index);
            for outcome in record_rules(item) {
                match outcome {
                    Ok(mut rule) => {
                        rule.source = Some(position);
                        store.rules.push(rule);
                    }
                    Err(error) => store.warnings.push(StoreWarning {
                        position,
                        text: record_text(item),
                        error,
                    }),
                }
            }
        }

        Ok(store)
    }

    fn serialize(&self, rules: &[Rule]) -> StoreResult<String> {
        let items = rules
            .iter()
            .map(record_value)
            .collect::<StoreResult<Vec<_>>>()?;
        let mut document = Mapping::new();
        document.insert(Value::from(REMINDERS_KEY), Value::Sequence(items));
        Ok(serde_yaml::to_string(&Value::Mapping(document))?)
    }

    fn rewrite(&self, source: &str, removed: &[Rule]) -> StoreResult<String> {
        let mut removed_by_record: BTreeMap<usize, Vec<&Rule>> = BTreeMap::new();
        for rule in removed {
            if let Some(SourcePosition::Record(index)) = rule.source {
                removed_by_record.entry(index).or_default().push(rule);
            }
        }

        let mut document = load_document(source)?;
        if let Some(items) = reminders_mut(&mut document)? {
            let kept = std::mem::take(items)
                .into_iter()
                .enumerate()
                .filter_map(|(index, item)| match removed_by_record.get(&index) {
                    None => Some(item),
                    Some(rules) => shrink_record(item, rules),
                })
                .collect();
            *items = kept;
        }
        Ok(serde_yaml::to_string(&document)?)
    }

    fn append(&self, source: &str, rule: &Rule) -> StoreResult<String> {
        let item = record_value(rule)?;
        let mut document = load_document(source)?;
        if reminders_mut(&mut document)?.is_none() {
            if let Value::Mapping(map) = &mut document {
                map.insert(Value::from(REMINDERS_KEY), Value::Sequence(Vec::new()));
            }
        }
        if let Some(items) = reminders_mut(&mut document)? {
            items.push(item);
        }
        Ok(serde_yaml::to_string(&document)?)
    }
}

/// Parses the top-level mapping; blank or null documents are empty stores.
fn load_document(source: &str) -> StoreResult<Value> {
    if source.trim().is_empty() {
        return Ok(Value::Mapping(Mapping::new()));
    }
    match serde_yaml::from_str::<Value>(source)? {
        Value::Null => Ok(Value::Mapping(Mapping::new())),
        document @ Value::Mapping(_) => Ok(document),
        _ => Err(StoreError::InvalidDocument(
            "top level must be a mapping with a `reminders` list".to_string(),
        )),
    }
}

fn reminders(document: &Value) -> StoreResult<&[Value]> {
    match document.get(REMINDERS_KEY) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Sequence(items)) => Ok(items),
        Some(_) => Err(StoreError::InvalidDocument(
            "`reminders` must be a list".to_string(),
        )),
    }
}

fn reminders_mut(document: &mut Value) -> StoreResult<Option<&mut Vec<Value>>> {
    match document.get_mut(REMINDERS_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Sequence(items)) => Ok(Some(items)),
        Some(_) => Err(StoreError::InvalidDocument(
            "`reminders` must be a list".to_string(),
        )),
    }
}

/// Every rule a record produces; several for a multi-day `day` field.
fn record_rules(item: &Value) -> Vec<Result<Rule, StoreEntryError>> {
    let record: Record = match serde_yaml::from_value(item.clone()) {
        Ok(record) => record,
        Err(err) => return vec![Err(StoreEntryError::parse(err.to_string()))],
    };
    let Some(name) = record
        .name
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty())
    else {
        return vec![Err(StoreEntryError::parse("record has no `name`"))];
    };

    let shells: Vec<Result<Rule, StoreEntryError>> = if item.get("later").is_some() {
        vec![Ok(Rule::new(RuleKey::Later, name))]
    } else if let Some(date) = &record.date {
        let mut rule = Rule::new(RuleKey::Date, name);
        rule.value = scalar_text(date);
        vec![Ok(rule)]
    } else if let Some(dom) = &record.dom {
        let mut rule = Rule::new(RuleKey::DayOfMonth, name);
        rule.value = scalar_text(dom);
        vec![Ok(rule)]
    } else if let Some(days) = &record.day {
        days.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                let mut rule = Rule::new(RuleKey::DayOfWeek, name);
                rule.value = Some(normalize_day_token(token));
                apply_period(&mut rule, &record)?;
                Ok(rule)
            })
            .collect()
    } else if record.every.is_some() {
        let key = match record.unit.as_deref().map(str::trim) {
            None | Some("" | "d" | "day" | "days") => Ok(RuleKey::Day),
            Some("w" | "week" | "weeks") => Ok(RuleKey::Week),
            Some("m" | "month" | "months") => Ok(RuleKey::Month),
            Some(other) => Err(StoreEntryError::parse(format!(
                "unknown unit `{other}` (expected days|weeks|months)"
            ))),
        };
        vec![key.and_then(|key| {
            let mut rule = Rule::new(key, name);
            apply_period(&mut rule, &record)?;
            Ok(rule)
        })]
    } else {
        vec![Err(StoreEntryError::parse(
            "record has no schedule field (later, date, dom, day or every)",
        ))]
    };

    if shells.is_empty() {
        return vec![Err(StoreEntryError::parse("`day` lists no weekdays"))];
    }

    shells
        .into_iter()
        .map(|shell| {
            let mut rule = shell?;
            rule.delete_after_send = record.delete;
            rule.command = record
                .command
                .as_deref()
                .map(str::trim)
                .filter(|command| !command.is_empty())
                .map(str::to_string);
            rule.notes = record.notes.clone().unwrap_or_default();
            rule.tags = match &record.tags {
                None => Default::default(),
                Some(Tags::List(tags)) => normalize_tags(tags),
                Some(Tags::Csv(tags)) => normalize_tags(tags.split(',')),
            };
            rule.validate()?;
            Ok(rule)
        })
        .collect()
}

fn apply_period(rule: &mut Rule, record: &Record) -> Result<(), StoreEntryError> {
    rule.frequency = Some(match &record.every {
        None => 1,
        Some(value) => value_as_u32(value).ok_or_else(|| {
            RuleValidationError::InvalidFrequency {
                key: rule.key,
                value: scalar_text(value).unwrap_or_default(),
            }
        })?,
    });
    rule.offset = match &record.offset {
        None => 0,
        Some(value) => value_as_i64(value).ok_or_else(|| RuleValidationError::InvalidOffset {
            key: rule.key,
            value: scalar_text(value).unwrap_or_default(),
        })?,
    };
    Ok(())
}

fn normalize_day_token(token: &str) -> String {
    parse_weekday_token(token)
        .map(|weekday| weekday_token(weekday).to_string())
        .unwrap_or_else(|| token.to_string())
}

/// Drops the removed weekdays from a multi-day record; `None` deletes it.
fn shrink_record(mut item: Value, removed: &[&Rule]) -> Option<Value> {
    let days = item.get("day").and_then(Value::as_str)?.to_string();
    let remaining: Vec<&str> = days
        .split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter(|token| {
            let token = normalize_day_token(token);
            !removed
                .iter()
                .any(|rule| rule.value.as_deref() == Some(token.as_str()))
        })
        .collect();
    if remaining.is_empty() {
        return None;
    }
    if let Value::Mapping(map) = &mut item {
        map.insert(Value::from("day"), Value::from(remaining.join(",")));
    }
    Some(item)
}

fn record_value(rule: &Rule) -> StoreResult<Value> {
    Ok(serde_yaml::to_value(record_for(rule)?)?)
}

fn record_for(rule: &Rule) -> StoreResult<Record> {
    let schedule = rule.schedule()?;
    if rule.title.trim().is_empty() {
        return Err(StoreError::InvalidDocument(
            "rule title must not be empty".to_string(),
        ));
    }

    let mut record = Record {
        name: Some(rule.title.clone()),
        delete: rule.delete_after_send,
        command: rule.command.clone(),
        notes: (!rule.notes.is_empty()).then(|| rule.notes.clone()),
        tags: (!rule.tags.is_empty()).then(|| Tags::List(rule.tags.iter().cloned().collect())),
        ..Record::default()
    };

    let period = match schedule {
        Schedule::Later => {
            record.later = Some(Value::Bool(true));
            None
        }
        Schedule::Date(_) => {
            record.date = rule.value.as_deref().map(|value| Value::from(value.trim()));
            None
        }
        Schedule::DayOfMonth(day) => {
            record.dom = Some(Value::from(day));
            None
        }
        Schedule::DayOfWeek { weekday, period } => {
            record.day = Some(weekday_token(weekday).to_string());
            if period.frequency != 1 {
                record.every = Some(Value::from(period.frequency));
            }
            Some(period)
        }
        Schedule::Day(period) => {
            record.every = Some(Value::from(period.frequency));
            Some(period)
        }
        Schedule::Week(period) => {
            record.every = Some(Value::from(period.frequency));
            record.unit = Some("weeks".to_string());
            Some(period)
        }
        Schedule::Month(period) => {
            record.every = Some(Value::from(period.frequency));
            record.unit = Some("months".to_string());
            Some(period)
        }
        Schedule::Now => return Err(StoreError::NotPersistable(RuleKey::Now)),
    };

    if let Some(period) = period.filter(|period| period.offset != 0) {
        record.offset = Some(Value::from(period.offset));
    }
    Ok(record)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn value_as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn record_text(item: &Value) -> String {
    serde_yaml::to_string(item)
        .map(|text| text.trim().replace('\n', "; "))
        .unwrap_or_else(|_| format!("{item:?}"))
}

#[cfg(test)]
mod tests {
    use super::RecordsCodec;
    use crate::model::rule::{Rule, RuleKey, RuleValidationError, SourcePosition};
    use crate::store::{StoreCodec, StoreEntryError, StoreError};

    const STORE: &str = "\
reminders:
  - name: trash
    day: mon,thu
    every: 2
    offset: 1
    tags: [Home]
  - name: rent
    dom: 1
    notes: transfer to landlord
  - name: dentist
    date: 2026-10-20
    delete: true
  - name: stretch
    every: 3
  - name: backup
    every: 1
    unit: weeks
    command: ./backup.sh
  - name: banjo
    later: true
";

    #[test]
    fn parses_every_record_shape() {
        let store = RecordsCodec.parse(STORE).unwrap();
        assert!(store.warnings.is_empty(), "{:?}", store.warnings);
        assert_eq!(store.rules.len(), 7);

        let (mon, thu) = (&store.rules[0], &store.rules[1]);
        assert_eq!(mon.value.as_deref(), Some("mon"));
        assert_eq!(thu.value.as_deref(), Some("thu"));
        assert_eq!((thu.frequency, thu.offset), (Some(2), 1));
        assert_eq!(mon.source, Some(SourcePosition::Record(0)));
        assert_eq!(thu.source, Some(SourcePosition::Record(0)));
        assert!(mon.tags.contains("home"));

        assert_eq!(store.rules[2].key, RuleKey::DayOfMonth);
        assert_eq!(store.rules[2].value.as_deref(), Some("1"));
        assert_eq!(store.rules[2].notes, "transfer to landlord");
        assert_eq!(store.rules[3].key, RuleKey::Date);
        assert!(store.rules[3].delete_after_send);
        assert_eq!(store.rules[4].key, RuleKey::Day);
        assert_eq!(store.rules[4].frequency, Some(3));
        assert_eq!(store.rules[5].key, RuleKey::Week);
        assert_eq!(store.rules[5].command.as_deref(), Some("./backup.sh"));
        assert_eq!(store.rules[6].key, RuleKey::Later);
    }

    #[test]
    fn bad_records_become_warnings() {
        let source = "\
reminders:
  - name: ok
    every: 2
  - day: mon
  - name: zero
    every: 0
  - name: bad day
    dom: 45
  - name: nothing
";
        let store = RecordsCodec.parse(source).unwrap();
        assert_eq!(store.rules.len(), 1);
        assert_eq!(store.warnings.len(), 4);
        assert!(matches!(
            store.warnings[0].error,
            StoreEntryError::Parse { .. }
        ));
        assert_eq!(
            store.warnings[1].error,
            StoreEntryError::Validation(RuleValidationError::ZeroFrequency {
                key: RuleKey::Day
            })
        );
        assert_eq!(store.warnings[2].position, SourcePosition::Record(3));
    }

    #[test]
    fn multi_day_record_survives_until_every_day_is_removed() {
        let store = RecordsCodec.parse(STORE).unwrap();
        let once = RecordsCodec.rewrite(STORE, &store.rules[0..1]).unwrap();
        let reparsed = RecordsCodec.parse(&once).unwrap();
        assert_eq!(reparsed.rules.len(), 6);
        assert_eq!(reparsed.rules[0].value.as_deref(), Some("thu"));

        let both = RecordsCodec.rewrite(STORE, &store.rules[0..2]).unwrap();
        let reparsed = RecordsCodec.parse(&both).unwrap();
        assert_eq!(reparsed.rules.len(), 5);
        assert_eq!(reparsed.rules[0].title, "rent");
    }

    #[test]
    fn rewrite_keeps_other_records_and_order() {
        let store = RecordsCodec.parse(STORE).unwrap();
        let out = RecordsCodec.rewrite(STORE, &store.rules[3..4]).unwrap();
        let titles: Vec<String> = RecordsCodec
            .parse(&out)
            .unwrap()
            .rules
            .into_iter()
            .map(|rule| rule.title)
            .collect();
        assert_eq!(
            titles,
            vec!["trash", "trash", "rent", "stretch", "backup", "banjo"]
        );
    }

    #[test]
    fn append_creates_the_list() {
        let rule = Rule::periodic(RuleKey::Month, 2, 1, "filter");
        let out = RecordsCodec.append("", &rule).unwrap();
        let store = RecordsCodec.parse(&out).unwrap();
        assert_eq!(store.rules.len(), 1);
        assert_eq!(store.rules[0].key, RuleKey::Month);
        assert_eq!(
            (store.rules[0].frequency, store.rules[0].offset),
            (Some(2), 1)
        );
    }

    #[test]
    fn invalid_documents_abort() {
        assert!(matches!(
            RecordsCodec.parse("reminders: 3"),
            Err(StoreError::InvalidDocument(_))
        ));
        assert!(matches!(
            RecordsCodec.parse("reminders: [unclosed"),
            Err(StoreError::Yaml(_))
        ));
        assert!(matches!(
            RecordsCodec.append("", &Rule::new(RuleKey::Now, "ping")),
            Err(StoreError::NotPersistable(RuleKey::Now))
        ));
    }
}
