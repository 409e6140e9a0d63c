use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDate;
use tracing::trace;

use crate::datetime::Calendar;
use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tab {
    #[default]
    Today,
    Overdue,
}

impl Tab {
    pub const ALL: [Tab; 2] = [Tab::Today, Tab::Overdue];

    pub fn status(self) -> TaskStatus {
        match self {
            Tab::Today => TaskStatus::Today,
            Tab::Overdue => TaskStatus::Overdue,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Tab::Today => "Today",
            Tab::Overdue => "Overdue",
        }
    }
}

impl FromStr for Tab {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(Tab::Today),
            "overdue" => Ok(Tab::Overdue),
            other => Err(anyhow!("unknown tab: {other} (expected today or overdue)")),
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tab::Today => f.write_str("today"),
            Tab::Overdue => f.write_str("overdue"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewCounts {
    pub today: usize,
    pub overdue: usize,
    pub completed: usize,
}

impl ViewCounts {
    pub fn for_tab(&self, tab: Tab) -> usize {
        match tab {
            Tab::Today => self.today,
            Tab::Overdue => self.overdue,
        }
    }
}

/// Tasks shown under `tab`, in store order.
pub fn visible<'a>(
    tasks: &'a [Task],
    tab: Tab,
    today: NaiveDate,
    calendar: &Calendar,
) -> Vec<&'a Task> {
    let wanted = tab.status();
    let out: Vec<&Task> = tasks
        .iter()
        .filter(|task| task.status(today, calendar) == wanted)
        .collect();
    trace!(%tab, shown = out.len(), total = tasks.len(), "filtered tab");
    out
}

/// Contents of the completed panel, independent of the active tab.
pub fn completed(tasks: &[Task]) -> Vec<&Task> {
    tasks
        .iter()
        .filter(|task| task.is_visible() && task.completed)
        .collect()
}

pub fn counts(tasks: &[Task], today: NaiveDate, calendar: &Calendar) -> ViewCounts {
    tasks
        .iter()
        .fold(ViewCounts::default(), |mut acc, task| {
            match task.status(today, calendar) {
                TaskStatus::Today => acc.today += 1,
                TaskStatus::Overdue => acc.overdue += 1,
                TaskStatus::Completed => acc.completed += 1,
                TaskStatus::Deleted => {}
            }
            acc
        })
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Duration, TimeZone, Utc};

    use super::{Tab, completed, counts, visible};
    use crate::datetime::Calendar;
    use crate::task::Task;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 4, 10, 15, 0, 0)
            .single()
            .expect("valid now")
    }

    fn fixture() -> Vec<Task> {
        let now = now();
        let mut done = Task::new(3, "done".to_string(), now);
        done.completed = true;
        let mut gone = Task::new(4, "gone".to_string(), now);
        gone.deleted = true;
        let mut old_done = Task::new(5, "old done".to_string(), now - Duration::days(3));
        old_done.completed = true;
        vec![
            Task::new(1, "fresh".to_string(), now),
            Task::new(2, "stale".to_string(), now - Duration::days(2)),
            done,
            gone,
            old_done,
            Task::new(6, "also fresh".to_string(), now - Duration::hours(2)),
        ]
    }

    fn ids(tasks: Vec<&Task>) -> Vec<u64> {
        tasks.into_iter().map(|t| t.id).collect()
    }

    #[test]
    fn tabs_partition_open_tasks() {
        let calendar = Calendar::utc();
        let tasks = fixture();
        let today = calendar.day_of(now());

        assert_eq!(ids(visible(&tasks, Tab::Today, today, &calendar)), vec![1, 6]);
        assert_eq!(ids(visible(&tasks, Tab::Overdue, today, &calendar)), vec![2]);
        assert_eq!(ids(completed(&tasks)), vec![3, 5]);
    }

    #[test]
    fn yesterday_task_becomes_overdue_after_midnight() {
        let calendar = Calendar::utc();
        let tasks = vec![Task::new(1, "late night".to_string(), now())];
        let tomorrow = calendar.day_of(now() + Duration::days(1));

        assert!(visible(&tasks, Tab::Today, tomorrow, &calendar).is_empty());
        assert_eq!(ids(visible(&tasks, Tab::Overdue, tomorrow, &calendar)), vec![1]);
    }

    #[test]
    fn counts_skip_deleted() {
        let calendar = Calendar::utc();
        let summary = counts(&fixture(), calendar.day_of(now()), &calendar);
        assert_eq!(summary.today, 2);
        assert_eq!(summary.overdue, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.for_tab(Tab::Overdue), 1);
    }

    #[test]
    fn tab_names_parse() {
        assert_eq!("Overdue".parse::<Tab>().expect("parse"), Tab::Overdue);
        assert_eq!(" today ".parse::<Tab>().expect("parse"), Tab::Today);
        assert!("someday".parse::<Tab>().is_err());
    }
}
