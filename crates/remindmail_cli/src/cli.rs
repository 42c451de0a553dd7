use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use remindmail_core::EpochUnit;
use std::path::PathBuf;

/// Plain-text reminder scheduler.
///
/// Reminders live in one store file; `remind generate` (run daily, e.g. from
/// cron) sends whatever is due and removes delivered one-shot reminders.
#[derive(Parser, Debug)]
#[command(name = "remind", version, about = "Plain-text reminder scheduler")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (default: <config_dir>/remindmail/config.toml)
    #[arg(long, global = true, env = "REMINDMAIL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Store file override
    #[arg(long, global = true, env = "REMINDMAIL_STORE")]
    pub store: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send everything due today and drop delivered one-shot reminders
    Generate {
        /// Report what would be sent without sending or rewriting the store
        #[arg(long)]
        dry_run: bool,
        /// Evaluate as of this date (YYYY-MM-DD) instead of today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Only reminders carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Add a reminder from a sentence, e.g. `remind add call mom tomorrow`
    Add {
        /// Sentence holding the title and, optionally, when
        text: Vec<String>,
        /// Title, when the time is given separately with --when
        #[arg(long, conflicts_with = "text")]
        title: Option<String>,
        /// Time phrase for --title, e.g. "every 2 weeks" or "next friday"
        #[arg(long, requires = "title")]
        when: Option<String>,
        /// Notes to include in the body
        #[arg(long)]
        notes: Option<String>,
        /// Tag to attach (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Save without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Show what fires over the coming days
    Week {
        /// Number of days, starting today
        #[arg(long, default_value_t = 7)]
        days: u32,
        /// Only reminders carrying this tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Show what fires tomorrow
    Tomorrow,

    /// List reminders saved for later
    Later,

    /// Send one digest of every reminder saved for later
    SendLater,

    /// List every reminder in the store
    List,

    /// Find reminders by title, value, weekday or date
    Find {
        #[arg(required = true)]
        text: Vec<String>,
    },

    /// Offset that makes an every-n rule fire on a date
    ///
    /// `remind offset week 2026-10-25 2` prints the offset for a rule
    /// firing every 2 weeks, including the week of 2026-10-25.
    Offset {
        /// day, week or month
        unit: EpochUnit,
        /// `[date] <n>`; the date defaults to today
        #[arg(num_args = 1..=2, required = true)]
        args: Vec<String>,
    },

    /// Open the store file in $EDITOR
    Edit,
}

#[cfg(test)]
mod tests {
    use super::{CliArgs, Command};
    use clap::{CommandFactory, Parser};

    #[test]
    fn command_definition_is_consistent() {
        CliArgs::command().debug_assert();
    }

    #[test]
    fn add_collects_free_text_and_tags() {
        let args = CliArgs::parse_from([
            "remind", "add", "call", "mom", "tomorrow", "--tag", "family", "-y",
        ]);
        match args.command {
            Command::Add {
                text, tags, yes, ..
            } => {
                assert_eq!(text, ["call", "mom", "tomorrow"]);
                assert_eq!(tags, ["family"]);
                assert!(yes);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn generate_parses_date_and_dry_run() {
        let args = CliArgs::parse_from(["remind", "generate", "--dry-run", "--date", "2026-10-19"]);
        match args.command {
            Command::Generate { dry_run, date, .. } => {
                assert!(dry_run);
                assert_eq!(date, chrono::NaiveDate::from_ymd_opt(2026, 10, 19));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn offset_takes_optional_date() {
        let args = CliArgs::parse_from(["remind", "offset", "week", "2026-10-25", "2"]);
        assert!(matches!(args.command, Command::Offset { ref args, .. } if args.len() == 2));
        assert!(CliArgs::try_parse_from(["remind", "offset", "fortnight", "2"]).is_err());
    }
}
