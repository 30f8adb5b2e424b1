//! User-facing notification channel.
//!
//! The idea store and the CLI report validation failures, decode failures,
//! device failures and success confirmations through a `Notifier`.
use std::{cell::RefCell, rc::Rc};

use log::{error, info};

/// Visual weight of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Variant {
    #[default]
    Default,
    Destructive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub title: String,
    pub description: String,
    pub variant: Variant,
}

impl Notification {
    pub fn success(description: impl Into<String>) -> Self {
        Notification {
            title: "Success".to_string(),
            description: description.into(),
            variant: Variant::Default,
        }
    }

    pub fn error(description: impl Into<String>) -> Self {
        Notification {
            title: "Error".to_string(),
            description: description.into(),
            variant: Variant::Destructive,
        }
    }
}

/// Surface that presents notifications to the user.
pub trait Notifier {
    fn notify(&self, notification: Notification);
}

/// Prints notifications to the terminal.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            Variant::Default => println!(
                "{} {}",
                console::style(format!("{}:", notification.title)).green().bold(),
                notification.description
            ),
            Variant::Destructive => eprintln!(
                "{} {}",
                console::style(format!("{}:", notification.title)).red().bold(),
                notification.description
            ),
        }
    }
}

/// Routes notifications to the log only.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: Notification) {
        match notification.variant {
            Variant::Default => info!("{}: {}", notification.title, notification.description),
            Variant::Destructive => {
                error!("{}: {}", notification.title, notification.description)
            }
        }
    }
}

/// Keeps every notification it receives; clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct CollectingNotifier {
    received: Rc<RefCell<Vec<Notification>>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.received.borrow().clone()
    }

    pub fn last(&self) -> Option<Notification> {
        self.received.borrow().last().cloned()
    }

    pub fn clear(&self) {
        self.received.borrow_mut().clear();
    }
}

impl Notifier for CollectingNotifier {
    fn notify(&self, notification: Notification) {
        self.received.borrow_mut().push(notification);
    }
}
