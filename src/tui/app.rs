use ratatui::widgets::TableState;

use crate::error::Result;
use crate::generation::{generate_all, GenerationSettings};
use crate::models::{OwnerId, RecurringTemplate, Task, TaskFilter, TaskUpdate};
use crate::storage::JsonStore;
use crate::tasks::{archive_task, complete_task, delete_task, list_tasks, snooze_task, update_task};
use crate::templates::{delete_template, list_templates, pause_template, resume_template};
use crate::urgency::sort_by_urgency;

#[derive(PartialEq)]
pub enum InputMode {
    Normal,
    Renaming,
}

#[derive(PartialEq, Clone, Copy)]
pub enum ViewMode {
    Tasks,
    Templates,
}

pub struct App {
    pub store: JsonStore,
    pub owner: OwnerId,
    pub settings: GenerationSettings,
    pub tasks: Vec<Task>,
    pub templates: Vec<RecurringTemplate>,
    pub state: TableState,
    pub template_state: TableState,
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub show_completed: bool,
    /// Outcome of the last action, shown above the help line.
    pub status: Option<String>,
}

impl App {
    /// Creates the app and loads the owner's tasks and templates.
    pub fn new(store: JsonStore, owner: OwnerId, settings: GenerationSettings) -> Result<App> {
        let mut app = App {
            store,
            owner,
            settings,
            tasks: Vec::new(),
            templates: Vec::new(),
            state: TableState::default(),
            template_state: TableState::default(),
            view_mode: ViewMode::Tasks,
            input_mode: InputMode::Normal,
            input_buffer: String::new(),
            show_completed: false,
            status: None,
        };
        app.load()?;
        Ok(app)
    }

    fn load(&mut self) -> Result<()> {
        let filter = TaskFilter {
            include_completed: self.show_completed,
            include_archived: self.show_completed,
            ..TaskFilter::default()
        };
        let mut tasks = list_tasks(&self.store, self.owner, &filter)?;
        sort_by_urgency(&mut tasks);
        self.tasks = tasks;
        self.templates = list_templates(&self.store, self.owner, true)?;
        clamp_selection(&mut self.state, self.tasks.len());
        clamp_selection(&mut self.template_state, self.templates.len());
        Ok(())
    }

    /// Reloads from storage, reporting a failure in the status line.
    pub fn reload(&mut self) {
        if let Err(e) = self.load() {
            self.status = Some(format!("Reload failed: {e}"));
        }
    }

    fn len(&self) -> usize {
        match self.view_mode {
            ViewMode::Tasks => self.tasks.len(),
            ViewMode::Templates => self.templates.len(),
        }
    }

    fn table_state(&mut self) -> &mut TableState {
        match self.view_mode {
            ViewMode::Tasks => &mut self.state,
            ViewMode::Templates => &mut self.template_state,
        }
    }

    /// Selects the next item in the current list.
    pub fn next(&mut self) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let state = self.table_state();
        let i = match state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        state.select(Some(i));
    }

    /// Selects the previous item in the current list.
    pub fn previous(&mut self) {
        let len = self.len();
        if len == 0 {
            return;
        }
        let state = self.table_state();
        let i = match state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        state.select(Some(i));
    }

    fn selected_task(&self) -> Option<&Task> {
        if self.view_mode != ViewMode::Tasks {
            return None;
        }
        self.state.selected().and_then(|i| self.tasks.get(i))
    }

    fn selected_template(&self) -> Option<&RecurringTemplate> {
        if self.view_mode != ViewMode::Templates {
            return None;
        }
        self.template_state.selected().and_then(|i| self.templates.get(i))
    }

    /// Stores the outcome of an action and reloads the lists.
    fn finish<T>(&mut self, result: Result<T>, describe: impl FnOnce(T) -> String) {
        self.status = Some(match result {
            Ok(value) => describe(value),
            Err(e) => format!("Error: {e}"),
        });
        self.reload();
    }

    /// Marks the selected task complete, chaining its next occurrence.
    pub fn complete_selected(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id) else { return };
        let result = complete_task(&self.store, self.owner, id);
        self.finish(result, |outcome| match outcome.successor {
            Some(next) => format!("Task {id} done, next occurrence is task {}", next.id),
            None => format!("Task {id} done"),
        });
    }

    pub fn snooze_selected(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id) else { return };
        let result = snooze_task(&self.store, self.owner, id);
        self.finish(result, |task| {
            let due = task
                .due_datetime
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_default();
            format!("Task {id} snoozed to {due}")
        });
    }

    pub fn archive_selected(&mut self) {
        let Some(id) = self.selected_task().map(|t| t.id) else { return };
        let result = archive_task(&self.store, self.owner, id);
        self.finish(result, |_| format!("Task {id} archived"));
    }

    /// Deletes the selected task or template.
    pub fn delete_selected(&mut self) {
        match self.view_mode {
            ViewMode::Tasks => {
                let Some(id) = self.selected_task().map(|t| t.id) else { return };
                let result = delete_task(&self.store, self.owner, id);
                self.finish(result, |_| format!("Task {id} deleted"));
            }
            ViewMode::Templates => {
                let Some(id) = self.selected_template().map(|t| t.id) else { return };
                let result = delete_template(&self.store, self.owner, id);
                self.finish(result, |_| format!("Template {id} deleted"));
            }
        }
    }

    /// Pauses an active template or resumes a paused one.
    pub fn toggle_selected_template(&mut self) {
        let Some((id, active)) = self.selected_template().map(|t| (t.id, t.is_active)) else {
            return;
        };
        if active {
            let result = pause_template(&self.store, self.owner, id);
            self.finish(result, |t| format!("Template '{}' paused", t.title));
        } else {
            let result = resume_template(&self.store, self.owner, id);
            self.finish(result, |t| format!("Template '{}' resumed", t.title));
        }
    }

    /// Runs the generation job for today.
    pub fn generate_today(&mut self) {
        let result = generate_all(&self.store, None, &self.settings);
        self.finish(result, |report| {
            format!("Generated {} task(s) for {}", report.generated, report.target_date)
        });
    }

    pub fn start_rename(&mut self) {
        let Some(title) = self.selected_task().map(|t| t.title.clone()) else { return };
        self.input_buffer = title;
        self.input_mode = InputMode::Renaming;
    }

    pub fn cancel_input(&mut self) {
        self.input_mode = InputMode::Normal;
        self.input_buffer.clear();
    }

    /// Saves the edited title onto the selected task.
    pub fn submit_rename(&mut self) {
        self.input_mode = InputMode::Normal;
        let title = std::mem::take(&mut self.input_buffer);
        let Some(id) = self.selected_task().map(|t| t.id) else { return };
        let changes = TaskUpdate {
            title: Some(title),
            ..TaskUpdate::default()
        };
        let result = update_task(&self.store, self.owner, id, changes);
        self.finish(result, |outcome| format!("Task {id} renamed to '{}'", outcome.task.title));
    }

    /// Shows or hides completed and archived tasks.
    pub fn toggle_completed(&mut self) {
        self.show_completed = !self.show_completed;
        self.reload();
    }

    pub fn toggle_view(&mut self) {
        self.view_mode = match self.view_mode {
            ViewMode::Tasks => ViewMode::Templates,
            ViewMode::Templates => ViewMode::Tasks,
        };
    }
}

fn clamp_selection(state: &mut TableState, len: usize) {
    match (state.selected(), len) {
        (_, 0) => state.select(None),
        (None, _) => state.select(Some(0)),
        (Some(i), len) if i >= len => state.select(Some(len - 1)),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTask;
    use crate::tasks::create_task;

    fn app_with_tasks(titles: &[&str]) -> (tempfile::TempDir, App) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::in_dir(dir.path()).unwrap();
        for title in titles {
            let fields = NewTask {
                title: title.to_string(),
                project_id: 1,
                section_id: 1,
                ..NewTask::default()
            };
            create_task(&store, 1, fields).unwrap();
        }
        let app = App::new(store, 1, GenerationSettings::default()).unwrap();
        (dir, app)
    }

    #[test]
    fn test_selection_wraps() {
        let (_dir, mut app) = app_with_tasks(&["a", "b"]);
        assert_eq!(app.state.selected(), Some(0));
        app.next();
        app.next();
        assert_eq!(app.state.selected(), Some(0));
        app.previous();
        assert_eq!(app.state.selected(), Some(1));
    }

    #[test]
    fn test_complete_hides_task() {
        let (_dir, mut app) = app_with_tasks(&["only"]);
        app.complete_selected();
        assert!(app.tasks.is_empty());
        assert_eq!(app.state.selected(), None);
        app.toggle_completed();
        assert_eq!(app.tasks.len(), 1);
        assert!(app.tasks[0].completed);
    }

    #[test]
    fn test_snooze_without_due_reports_error() {
        let (_dir, mut app) = app_with_tasks(&["undated"]);
        app.snooze_selected();
        assert!(app.status.as_deref().unwrap_or_default().starts_with("Error"));
    }

    #[test]
    fn test_rename() {
        let (_dir, mut app) = app_with_tasks(&["old"]);
        app.start_rename();
        assert_eq!(app.input_buffer, "old");
        app.input_buffer = "new".into();
        app.submit_rename();
        assert_eq!(app.tasks[0].title, "new");
        assert!(app.input_mode == InputMode::Normal);
    }
}
