use remindmail_core::{CommandDelivery, Deliver, DeliveryError};
use std::io::Write;

/// Delivery chosen by configuration.
#[derive(Debug, Clone)]
pub enum Delivery {
    /// Print reminders to stdout.
    Console,
    /// Pipe reminders into `delivery.command`.
    Command(CommandDelivery),
}

impl Delivery {
    pub fn from_command(command: Option<&str>) -> Self {
        match command {
            Some(command) => Self::Command(CommandDelivery::new(command)),
            None => Self::Console,
        }
    }
}

impl Deliver for Delivery {
    fn deliver(&self, title: &str, body: &str) -> Result<(), DeliveryError> {
        match self {
            Self::Console => print_reminder(&mut std::io::stdout().lock(), title, body)
                .map_err(|err| DeliveryError::new(format!("could not write to stdout: {err}"))),
            Self::Command(command) => command.deliver(title, body),
        }
    }
}

fn print_reminder(out: &mut impl Write, title: &str, body: &str) -> std::io::Result<()> {
    writeln!(out, "Reminder: {title}")?;
    if !body.trim().is_empty() {
        writeln!(out, "{}", body.trim_end())?;
    }
    writeln!(out)
}
