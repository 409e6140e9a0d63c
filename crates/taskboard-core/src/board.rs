use tracing::{debug, info};

use crate::datetime::{Calendar, Clock};
use crate::filter::{self, Tab, ViewCounts};
use crate::storage::TaskStorage;
use crate::store::TaskStore;
use crate::task::Task;

/// At most one task is being edited at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditState {
    #[default]
    Idle,
    Editing { id: u64, draft: String },
}

impl EditState {
    pub fn editing_id(&self) -> Option<u64> {
        match self {
            EditState::Idle => None,
            EditState::Editing { id, .. } => Some(*id),
        }
    }
}

/// What a renderer needs to draw the board at one instant.
#[derive(Debug, Clone)]
pub struct BoardView {
    pub tab: Tab,
    pub rows: Vec<Task>,
    pub completed: Option<Vec<Task>>,
    pub counts: ViewCounts,
    pub edit: EditState,
    pub input: String,
}

/// The whole to-do component: the task store plus transient UI state.
pub struct TaskBoard<S, C> {
    store: TaskStore<S, C>,
    calendar: Calendar,
    tab: Tab,
    completed_open: bool,
    input: String,
    edit: EditState,
}

impl<S: TaskStorage, C: Clock> TaskBoard<S, C> {
    pub fn new(store: TaskStore<S, C>, calendar: Calendar, tab: Tab) -> Self {
        Self {
            store,
            calendar,
            tab,
            completed_open: false,
            input: String::new(),
            edit: EditState::Idle,
        }
    }

    pub fn store(&self) -> &TaskStore<S, C> {
        &self.store
    }

    pub fn calendar(&self) -> &Calendar {
        &self.calendar
    }

    pub fn tab(&self) -> Tab {
        self.tab
    }

    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    pub fn completed_panel_open(&self) -> bool {
        self.completed_open
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Adds the pending input as a task. The input is cleared either way.
    pub fn submit_input(&mut self) -> anyhow::Result<Option<u64>> {
        let text = std::mem::take(&mut self.input);
        self.add(&text)
    }

    pub fn add(&mut self, text: &str) -> anyhow::Result<Option<u64>> {
        self.store.add(text)
    }

    /// Starts editing `id` with its current text as the draft. Any other draft
    /// in progress is dropped.
    #[tracing::instrument(skip(self))]
    pub fn begin_edit(&mut self, id: u64) -> bool {
        let Some(task) = self.store.get(id).filter(|task| task.is_visible()) else {
            debug!("begin_edit: unknown id");
            return false;
        };

        if let Some(previous) = self.edit.editing_id()
            && previous != id
        {
            debug!(previous, "abandoning previous draft");
        }

        self.edit = EditState::Editing {
            id,
            draft: task.text.clone(),
        };
        true
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> bool {
        match &mut self.edit {
            EditState::Editing { draft, .. } => {
                *draft = text.into();
                true
            }
            EditState::Idle => false,
        }
    }

    /// Commits `text` for `id`, but only while `id` is the task being edited.
    /// Blank text keeps the editor open and changes nothing.
    #[tracing::instrument(skip(self, text))]
    pub fn edit(&mut self, id: u64, text: &str) -> anyhow::Result<bool> {
        if self.edit.editing_id() != Some(id) {
            debug!("edit ignored: task is not being edited");
            return Ok(false);
        }
        if text.trim().is_empty() {
            debug!("edit ignored: blank text");
            return Ok(false);
        }

        let changed = self.store.rename(id, text)?;
        self.edit = EditState::Idle;
        info!(changed, "edit saved");
        Ok(changed)
    }

    /// Commits the current draft.
    pub fn save_edit(&mut self) -> anyhow::Result<bool> {
        let EditState::Editing { id, draft } = self.edit.clone() else {
            return Ok(false);
        };
        self.edit(id, &draft)
    }

    pub fn cancel_edit(&mut self) {
        self.edit = EditState::Idle;
    }

    pub fn toggle_completed(&mut self, id: u64) -> anyhow::Result<bool> {
        self.store.toggle_completed(id)
    }

    pub fn remove(&mut self, id: u64) -> anyhow::Result<bool> {
        let removed = self.store.remove(id)?;
        if removed && self.edit.editing_id() == Some(id) {
            self.edit = EditState::Idle;
        }
        Ok(removed)
    }

    pub fn clear_completed(&mut self) -> anyhow::Result<usize> {
        let cleared = self.store.clear_completed()?;
        if let Some(id) = self.edit.editing_id()
            && !self.store.get(id).is_some_and(|task| task.is_visible())
        {
            self.edit = EditState::Idle;
        }
        Ok(cleared)
    }

    pub fn purge_deleted(&mut self) -> anyhow::Result<usize> {
        self.store.purge_deleted()
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.tab = tab;
    }

    pub fn toggle_completed_panel(&mut self) -> bool {
        self.completed_open = !self.completed_open;
        self.completed_open
    }

    pub fn set_completed_panel(&mut self, open: bool) {
        self.completed_open = open;
    }

    /// Recomputed on every call from the store and the clock.
    pub fn view(&self) -> BoardView {
        let tasks = self.store.snapshot();
        let today = self.calendar.today(self.store.clock());

        let rows = filter::visible(&tasks, self.tab, today, &self.calendar)
            .into_iter()
            .cloned()
            .collect();
        let completed = self
            .completed_open
            .then(|| filter::completed(&tasks).into_iter().cloned().collect());

        BoardView {
            tab: self.tab,
            rows,
            completed,
            counts: filter::counts(&tasks, today, &self.calendar),
            edit: self.edit.clone(),
            input: self.input.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::{EditState, TaskBoard};
    use crate::datetime::{Calendar, FixedClock};
    use crate::filter::Tab;
    use crate::storage::MemoryStorage;
    use crate::store::{DeletePolicy, TaskStore};

    fn board() -> (TaskBoard<MemoryStorage, FixedClock>, FixedClock) {
        let clock = FixedClock::new(
            Utc.with_ymd_and_hms(2026, 7, 20, 9, 0, 0)
                .single()
                .expect("valid now"),
        );
        let store = TaskStore::load(MemoryStorage::new(), clock.clone(), DeletePolicy::Hard);
        (TaskBoard::new(store, Calendar::utc(), Tab::Today), clock)
    }

    #[test]
    fn submit_input_adds_and_clears() {
        let (mut board, _) = board();
        board.set_input("Buy milk");
        let id = board.submit_input().expect("submit").expect("id");
        assert_eq!(board.input(), "");

        let view = board.view();
        assert_eq!(view.counts.today, 1);
        assert_eq!(view.rows[0].id, id);
        assert!(!view.rows[0].completed);

        board.set_input("   ");
        assert_eq!(board.submit_input().expect("submit"), None);
        assert_eq!(board.view().counts.today, 1);
    }

    #[test]
    fn edit_requires_matching_session() {
        let (mut board, _) = board();
        let a = board.add("first").expect("add").expect("id");
        let b = board.add("second").expect("add").expect("id");

        assert!(!board.edit(a, "nope").expect("edit while idle"));

        assert!(board.begin_edit(a));
        assert_eq!(
            board.edit_state(),
            &EditState::Editing {
                id: a,
                draft: "first".to_string()
            }
        );
        assert!(!board.edit(b, "wrong task").expect("edit other id"));

        assert!(board.update_draft("first, revised"));
        assert!(board.save_edit().expect("save"));
        assert_eq!(board.edit_state(), &EditState::Idle);
        assert_eq!(
            board.store().get(a).expect("task").text,
            "first, revised"
        );
    }

    #[test]
    fn starting_another_edit_abandons_draft() {
        let (mut board, _) = board();
        let a = board.add("alpha").expect("add").expect("id");
        let b = board.add("beta").expect("add").expect("id");

        board.begin_edit(a);
        board.update_draft("alpha draft");
        board.begin_edit(b);
        assert_eq!(board.edit_state().editing_id(), Some(b));

        board.save_edit().expect("save");
        assert_eq!(board.store().get(a).expect("task").text, "alpha");
        assert_eq!(board.store().get(b).expect("task").text, "beta");
    }

    #[test]
    fn blank_draft_keeps_editor_open() {
        let (mut board, _) = board();
        let a = board.add("alpha").expect("add").expect("id");
        board.begin_edit(a);
        board.update_draft("  ");
        assert!(!board.save_edit().expect("save"));
        assert_eq!(board.edit_state().editing_id(), Some(a));
        board.cancel_edit();
        assert_eq!(board.edit_state(), &EditState::Idle);
        assert!(!board.update_draft("ignored"));
    }

    #[test]
    fn removing_edited_task_resets_editor() {
        let (mut board, _) = board();
        let a = board.add("alpha").expect("add").expect("id");
        board.begin_edit(a);
        assert!(board.remove(a).expect("remove"));
        assert_eq!(board.edit_state(), &EditState::Idle);
        assert!(!board.begin_edit(a));
    }

    #[test]
    fn clearing_edited_task_resets_editor() {
        let (mut board, _) = board();
        let a = board.add("alpha").expect("add").expect("id");
        let b = board.add("beta").expect("add").expect("id");
        board.toggle_completed(a).expect("toggle");

        board.begin_edit(b);
        assert_eq!(board.clear_completed().expect("clear"), 1);
        assert_eq!(board.edit_state().editing_id(), Some(b));

        board.toggle_completed(b).expect("toggle");
        board.begin_edit(b);
        board.update_draft("beta draft");
        assert_eq!(board.clear_completed().expect("clear"), 1);
        assert_eq!(board.edit_state(), &EditState::Idle);
        assert!(board.store().get(b).is_none());
    }

    #[test]
    fn completed_panel_is_independent_of_tab() {
        let (mut board, clock) = board();
        let a = board.add("Buy milk").expect("add").expect("id");
        board.toggle_completed(a).expect("toggle");

        assert!(board.view().completed.is_none());
        assert!(board.toggle_completed_panel());

        let view = board.view();
        assert!(view.rows.is_empty());
        assert_eq!(view.completed.as_ref().map(Vec::len), Some(1));

        board.select_tab(Tab::Overdue);
        clock.advance(Duration::days(2));
        let view = board.view();
        assert_eq!(view.tab, Tab::Overdue);
        assert!(view.rows.is_empty());
        assert_eq!(view.completed.map(|rows| rows.len()), Some(1));
    }

    #[test]
    fn tasks_move_to_overdue_as_days_pass() {
        let (mut board, clock) = board();
        board.add("Pay rent").expect("add");
        clock.advance(Duration::days(1));

        let view = board.view();
        assert_eq!(view.counts.today, 0);
        assert_eq!(view.counts.overdue, 1);

        board.select_tab(Tab::Overdue);
        assert_eq!(board.view().rows.len(), 1);
    }
}
