use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::datetime::Calendar;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Today,
    Overdue,
    Completed,
    Deleted,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: u64,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub deleted: bool,

    /// Fields this crate does not interpret (e.g. a leftover `reminder`).
    /// Kept so that a rewrite does not drop them.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Task {
    /// Sub-second precision is dropped so that a stored task reloads identically.
    pub fn new(id: u64, text: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text,
            completed: false,
            created_at: now.trunc_subsecs(0),
            deleted: false,
            extra: BTreeMap::new(),
        }
    }

    pub fn created_day(&self, calendar: &Calendar) -> NaiveDate {
        calendar.day_of(self.created_at)
    }

    /// Overdue means created on a different day than `today` and still open.
    pub fn status(&self, today: NaiveDate, calendar: &Calendar) -> TaskStatus {
        if self.deleted {
            TaskStatus::Deleted
        } else if self.completed {
            TaskStatus::Completed
        } else if self.created_day(calendar) != today {
            TaskStatus::Overdue
        } else {
            TaskStatus::Today
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.deleted
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{Task, TaskStatus};
    use crate::datetime::Calendar;

    #[test]
    fn status_follows_creation_day() {
        let calendar = Calendar::utc();
        let now = Utc
            .with_ymd_and_hms(2026, 3, 4, 9, 30, 0)
            .single()
            .expect("valid now");
        let today = calendar.day_of(now);

        let mut fresh = Task::new(1, "Buy milk".to_string(), now);
        assert_eq!(fresh.status(today, &calendar), TaskStatus::Today);

        let stale = Task::new(2, "File taxes".to_string(), now - Duration::days(2));
        assert_eq!(stale.status(today, &calendar), TaskStatus::Overdue);

        fresh.completed = true;
        assert_eq!(fresh.status(today, &calendar), TaskStatus::Completed);

        fresh.deleted = true;
        assert_eq!(fresh.status(today, &calendar), TaskStatus::Deleted);
    }

    #[test]
    fn tolerates_missing_deleted_and_keeps_unknown_fields() {
        let raw = r#"{"id":7,"text":"Call mom","completed":false,"createdAt":"2026-03-04T09:30:00Z","reminder":null}"#;
        let task: Task = serde_json::from_str(raw).expect("parse task");
        assert!(!task.deleted);
        assert!(task.extra.contains_key("reminder"));

        let back = serde_json::to_string(&task).expect("serialize task");
        assert!(back.contains("\"createdAt\":\"2026-03-04T09:30:00Z\""));
        assert!(back.contains("\"reminder\":null"));
    }

    #[test]
    fn new_task_drops_subsecond_precision() {
        let now = Utc
            .with_ymd_and_hms(2026, 3, 4, 9, 30, 0)
            .single()
            .expect("valid now")
            + Duration::milliseconds(750);
        let task = Task::new(1, "x".to_string(), now);
        assert_eq!(task.created_at, now - Duration::milliseconds(750));
        assert!(!task.completed);
    }
}
