use chrono::{NaiveDate, Weekday};
use remindmail_core::store::{MarkdownCodec, RecordsCodec, StoreCodec};
use remindmail_core::{interpret, Rule, RuleKey, SourcePosition};

fn sample_rules() -> Vec<Rule> {
    let mut backup = Rule::periodic(RuleKey::Week, 1, 0, "./backup.sh");
    backup.command = Some("./backup.sh".to_string());

    vec![
        Rule::periodic(RuleKey::Day, 3, 1, "stretch").with_notes("hamstrings\ncalves"),
        Rule::on_weekday(Weekday::Mon, 2, 1, "take out recycling").with_tags(["home"]),
        Rule::on_day_of_month(15, "pay rent").with_notes("transfer to landlord"),
        Rule::on_date(NaiveDate::from_ymd_opt(2026, 10, 20).unwrap(), "dentist"),
        Rule::periodic(RuleKey::Month, 2, 1, "replace filter"),
        Rule::new(RuleKey::Later, "learn the banjo").with_tags(["music", "hobby"]),
        backup,
    ]
}

fn without_source(rules: Vec<Rule>) -> Vec<Rule> {
    rules
        .into_iter()
        .map(|mut rule| {
            rule.source = None;
            rule
        })
        .collect()
}

#[test]
fn markdown_serialization_parses_back_to_the_same_rules() {
    let rules = sample_rules();
    let text = MarkdownCodec.serialize(&rules).unwrap();
    let parsed = MarkdownCodec.parse(&text).unwrap();
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    assert_eq!(without_source(parsed.rules), rules);
}

#[test]
fn records_serialization_parses_back_to_the_same_rules() {
    let rules = sample_rules();
    let text = RecordsCodec.serialize(&rules).unwrap();
    let parsed = RecordsCodec.parse(&text).unwrap();
    assert!(parsed.warnings.is_empty(), "{:?}", parsed.warnings);
    assert_eq!(without_source(parsed.rules), rules);
}

#[test]
fn both_grammars_describe_the_same_model() {
    let markdown = "\
[d,3,1] stretch
hamstrings
[mon,2,1] take out recycling #home
[later] learn the banjo
";
    let from_markdown = MarkdownCodec.parse(markdown).unwrap().rules;
    let yaml = RecordsCodec.serialize(&from_markdown).unwrap();
    let from_yaml = RecordsCodec.parse(&yaml).unwrap().rules;
    assert_eq!(without_source(from_yaml), without_source(from_markdown));
}

#[test]
fn markdown_rewrite_preserves_every_untouched_line() {
    let source = "\
# Reminders

Some prose the user keeps here.
[d] one
[2026-10-19]d two
bring a card
[d%0] broken entry
[w,x] another broken one
[m] three
<!-- end -->";
    let parsed = MarkdownCodec.parse(source).unwrap();
    let titles: Vec<&str> = parsed.rules.iter().map(|rule| rule.title.as_str()).collect();
    assert_eq!(titles, vec!["one", "two", "three"]);
    assert_eq!(parsed.warnings.len(), 2);
    assert_eq!(parsed.warnings[0].text, "[d%0] broken entry");
    assert_eq!(
        parsed.warnings[1].to_string(),
        "line 8: validation error: week rule has invalid period `x` (expected an integer N >= 1) (`[w,x] another broken one`)"
    );

    let rewritten = MarkdownCodec.rewrite(source, &parsed.rules[1..2]).unwrap();
    assert_eq!(
        rewritten,
        "\
# Reminders

Some prose the user keeps here.
[d] one
[d%0] broken entry
[w,x] another broken one
[m] three
<!-- end -->"
    );
}

#[test]
fn rewrite_with_nothing_removed_is_identity() {
    let markdown = "[d] one\n\n# notes\n[d%0] broken\n";
    assert_eq!(MarkdownCodec.rewrite(markdown, &[]).unwrap(), markdown);

    let yaml = "reminders:\n- name: one\n  every: 1\n";
    let rewritten = RecordsCodec.rewrite(yaml, &[]).unwrap();
    assert_eq!(
        RecordsCodec.parse(&rewritten).unwrap(),
        RecordsCodec.parse(yaml).unwrap()
    );
}

#[test]
fn records_keep_their_index_as_position() {
    let yaml = "\
reminders:
  - name: one
    every: 1
  - name: broken
  - name: three
    later: true
";
    let parsed = RecordsCodec.parse(yaml).unwrap();
    assert_eq!(parsed.rules.len(), 2);
    assert_eq!(parsed.rules[1].source, Some(SourcePosition::Record(2)));
    assert_eq!(parsed.warnings[0].position, SourcePosition::Record(1));

    let rewritten = RecordsCodec.rewrite(yaml, &parsed.rules[1..]).unwrap();
    let reparsed = RecordsCodec.parse(&rewritten).unwrap();
    assert_eq!(reparsed.rules.len(), 1);
    assert_eq!(reparsed.warnings.len(), 1);
    assert!(reparsed.warnings[0].text.contains("broken"));
}

#[test]
fn interpreted_notes_cannot_smuggle_in_entries() {
    let now = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap();
    let rule = interpret("call mom tomorrow: [d] check oven", now).unwrap();
    assert_eq!(rule.notes, "[d] check oven");

    let mut stored = MarkdownCodec.append("# mine\n", &rule).unwrap();
    stored = MarkdownCodec
        .append(&stored, &Rule::new(RuleKey::Later, "read").with_notes("#1 priority"))
        .unwrap();
    let parsed = MarkdownCodec.parse(&stored).unwrap();
    let shapes: Vec<(RuleKey, &str, &str)> = parsed
        .rules
        .iter()
        .map(|rule| (rule.key, rule.title.as_str(), rule.notes.as_str()))
        .collect();
    assert_eq!(
        shapes,
        vec![
            (RuleKey::Date, "call mom", "[d] check oven"),
            (RuleKey::Later, "read", "#1 priority"),
        ]
    );

    let rewritten = MarkdownCodec.rewrite(&stored, &parsed.rules).unwrap();
    assert_eq!(rewritten, "# mine\n");
}
