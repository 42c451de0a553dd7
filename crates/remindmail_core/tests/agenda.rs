use chrono::NaiveDate;
use remindmail_core::{
    AgendaDay, CommandError, CommandRunner, Deliver, DeliveryError, FileRuleStore, ReminderService,
};
use std::cell::RefCell;
use std::fs;
use std::rc::Rc;
use tempfile::TempDir;

type Sent = Rc<RefCell<Vec<(String, String)>>>;

#[derive(Default)]
struct Outbox {
    sent: Sent,
}

impl Deliver for Outbox {
    fn deliver(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        self.sent
            .borrow_mut()
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}

struct NoCommands;

impl CommandRunner for NoCommands {
    fn run(&self, command: &str) -> Result<String, CommandError> {
        panic!("agenda queries must not run `{command}`");
    }
}

const STORE: &str = "\
[d,2] stretch
[mon] team sync #work
[2026-10-21]d dentist
[2026-10-16]d missed call
[dom,25] pay card
[later] learn banjo
chords first
[later] read dune #books
[d%0] broken
";

fn service(store: &str) -> (TempDir, Sent, ReminderService<FileRuleStore, Outbox, NoCommands>) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("remind.md");
    fs::write(&path, store).unwrap();
    let outbox = Outbox::default();
    let sent = Rc::clone(&outbox.sent);
    (
        dir,
        sent,
        ReminderService::new(FileRuleStore::from_path(path), outbox, NoCommands),
    )
}

fn titles(day: &AgendaDay) -> Vec<&str> {
    day.rules.iter().map(|rule| rule.title.as_str()).collect()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn upcoming_lists_each_day_in_order() {
    let (_dir, _, service) = service(STORE);
    let agenda = service.upcoming(date(2026, 10, 19), 7, &[]).unwrap();

    assert_eq!(agenda.days.len(), 7);
    assert_eq!(agenda.skipped.len(), 1);
    let day = |index: usize| titles(&agenda.days[index]);
    // 2026-10-19 is a Monday on an odd epoch day.
    assert_eq!(day(0), vec!["team sync", "missed call"]);
    assert_eq!(day(1), vec!["stretch"]);
    assert_eq!(day(2), vec!["dentist"]);
    assert_eq!(day(6), vec!["pay card"]);
    assert_eq!(agenda.days[6].date, date(2026, 10, 25));
}

#[test]
fn upcoming_respects_tags() {
    let (_dir, _, service) = service(STORE);
    let agenda = service
        .upcoming(date(2026, 10, 19), 14, &["work".to_string()])
        .unwrap();
    let firing: Vec<NaiveDate> = agenda
        .days
        .iter()
        .filter(|day| !day.rules.is_empty())
        .map(|day| day.date)
        .collect();
    assert_eq!(firing, vec![date(2026, 10, 19), date(2026, 10, 26)]);
}

#[test]
fn upcoming_never_writes_or_sends() {
    let (dir, sent, service) = service(STORE);
    service.upcoming(date(2026, 10, 19), 30, &[]).unwrap();
    assert!(sent.borrow().is_empty());
    assert_eq!(
        fs::read_to_string(dir.path().join("remind.md")).unwrap(),
        STORE
    );
}

#[test]
fn later_digest_is_one_delivery() {
    let (_dir, sent, service) = service(STORE);
    let later: Vec<String> = service
        .later()
        .unwrap()
        .into_iter()
        .map(|rule| rule.title)
        .collect();
    assert_eq!(later, vec!["learn banjo", "read dune"]);

    assert_eq!(service.send_later(date(2026, 10, 19)).unwrap(), 2);
    assert_eq!(
        *sent.borrow(),
        vec![(
            "Reminders for later, 2026-10-19".to_string(),
            "Here are your reminders for later:\n\u{2022} learn banjo\n  - chords first\n\u{2022} read dune\n"
                .to_string()
        )]
    );
}

#[test]
fn empty_later_bucket_sends_nothing() {
    let (_dir, sent, service) = service("[d] stretch\n");
    assert_eq!(service.send_later(date(2026, 10, 19)).unwrap(), 0);
    assert!(sent.borrow().is_empty());
}

#[test]
fn find_matches_text_weekday_and_date() {
    let (_dir, _, service) = service(STORE);
    let today = date(2026, 10, 19);
    let find = |text: &str| -> Vec<String> {
        service
            .find(text, today)
            .unwrap()
            .into_iter()
            .map(|rule| rule.title)
            .collect()
    };

    assert_eq!(find("BANJO"), vec!["learn banjo"]);
    assert_eq!(find("monday"), vec!["team sync"]);
    assert_eq!(find("2026-10-20"), vec!["stretch"]);
    assert_eq!(find("2026-10-21"), vec!["dentist"]);
    assert_eq!(find("10-25"), vec!["pay card"]);
    assert!(find("").is_empty());
}
