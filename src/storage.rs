use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{OwnerId, RecurringTemplate, Task, TaskId, TemplateId};

/// Longest title a row may carry.
pub const MAX_TITLE_LEN: usize = 500;

/// Default file name of the store inside its data directory.
pub const STORE_FILE: &str = "store.json";

/// Everything persisted in the store file.
#[derive(Serialize, Deserialize, Debug, Default, Clone)]
pub struct Database {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub templates: Vec<RecurringTemplate>,
    /// Highest task id ever handed out. Ids are not reused after a delete.
    #[serde(default)]
    pub last_task_id: TaskId,
    /// Highest template id ever handed out.
    #[serde(default)]
    pub last_template_id: TemplateId,
}

/// JSON-file backed store for tasks and templates.
///
/// Reads see the last committed file. Writes go through a [`Transaction`],
/// which holds a private copy of the database and replaces the file in one
/// rename on [`Transaction::commit`]. Dropping a transaction discards it.
#[derive(Debug, Clone)]
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Opens the store at `path`, creating its parent directory if needed.
    /// The file itself is created on first commit.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Opens `<dir>/store.json`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir.as_ref().join(STORE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the committed database. A missing file is an empty database.
    pub fn load(&self) -> Result<Database> {
        if !self.path.exists() {
            return Ok(Database::default());
        }
        let mut f = OpenOptions::new().read(true).open(&self.path)?;
        let mut s = String::new();
        f.read_to_string(&mut s)?;
        if s.trim().is_empty() {
            return Ok(Database::default());
        }
        Ok(serde_json::from_str(&s)?)
    }

    /// Starts a transaction on a snapshot of the committed database.
    pub fn begin(&self) -> Result<Transaction<'_>> {
        Ok(Transaction {
            store: self,
            db: self.load()?,
        })
    }

    /// Deletes the store file.
    pub fn delete_all(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn save(&self, db: &Database) -> Result<()> {
        let s = serde_json::to_string_pretty(db)?;
        let tmp = self.tmp_path();
        let mut f = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        f.write_all(s.as_bytes())?;
        f.sync_all()?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

/// Outcome of [`Transaction::insert_tasks_with_fallback`], indexed by the
/// position of each row in the input.
#[derive(Debug, Default)]
pub struct InsertReport {
    /// `(row index, assigned id)` for every row written.
    pub inserted: Vec<(usize, TaskId)>,
    /// `(row index, reason)` for every row rejected.
    pub failed: Vec<(usize, Error)>,
    /// Whether the single bulk insert was rejected and rows went one by one.
    pub used_fallback: bool,
}

/// A staged set of changes against one snapshot of the store.
pub struct Transaction<'a> {
    store: &'a JsonStore,
    db: Database,
}

impl<'a> Transaction<'a> {
    pub fn tasks(&self) -> &[Task] {
        &self.db.tasks
    }

    pub fn templates(&self) -> &[RecurringTemplate] {
        &self.db.templates
    }

    #[cfg(test)]
    pub(crate) fn templates_mut(&mut self) -> &mut Vec<RecurringTemplate> {
        &mut self.db.templates
    }

    /// Looks up a task owned by `owner`.
    pub fn task(&self, owner: OwnerId, id: TaskId) -> Result<&Task> {
        self.db
            .tasks
            .iter()
            .find(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::task_not_found(id))
    }

    pub fn task_mut(&mut self, owner: OwnerId, id: TaskId) -> Result<&mut Task> {
        self.db
            .tasks
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::task_not_found(id))
    }

    /// Looks up a template owned by `owner`.
    pub fn template(&self, owner: OwnerId, id: TemplateId) -> Result<&RecurringTemplate> {
        self.db
            .templates
            .iter()
            .find(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::template_not_found(id))
    }

    pub fn template_mut(&mut self, owner: OwnerId, id: TemplateId) -> Result<&mut RecurringTemplate> {
        self.db
            .templates
            .iter_mut()
            .find(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::template_not_found(id))
    }

    /// Claims the next task id. Files written before the counter existed
    /// start from the highest id present.
    fn next_task_id(&mut self) -> TaskId {
        let seen = self.db.tasks.iter().map(|t| t.id).max().unwrap_or(0);
        self.db.last_task_id = self.db.last_task_id.max(seen) + 1;
        self.db.last_task_id
    }

    fn next_template_id(&mut self) -> TemplateId {
        let seen = self.db.templates.iter().map(|t| t.id).max().unwrap_or(0);
        self.db.last_template_id = self.db.last_template_id.max(seen) + 1;
        self.db.last_template_id
    }

    /// Next free ordering position among the owner's unarchived tasks in a section.
    pub fn next_position(&self, owner: OwnerId, section_id: u64) -> u32 {
        self.db
            .tasks
            .iter()
            .filter(|t| t.owner_id == owner && t.section_id == section_id && !t.archived)
            .map(|t| t.position)
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Whether some task of `owner` generated from `template_id` is still open.
    pub fn has_unfinished_instance(&self, owner: OwnerId, template_id: TemplateId) -> bool {
        self.db.tasks.iter().any(|t| {
            t.owner_id == owner && t.recurring_task_id == Some(template_id) && t.is_open()
        })
    }

    /// Row constraints every inserted task must satisfy.
    fn check_row(&self, row: &Task) -> Result<()> {
        let title = row.title.trim();
        if title.is_empty() {
            return Err(Error::Storage("task title must not be empty".into()));
        }
        if title.chars().count() > MAX_TITLE_LEN {
            return Err(Error::Storage(format!(
                "task title longer than {MAX_TITLE_LEN} characters"
            )));
        }
        if let Some(template_id) = row.recurring_task_id {
            let exists = self
                .db
                .templates
                .iter()
                .any(|t| t.id == template_id && t.owner_id == row.owner_id);
            if !exists {
                return Err(Error::Storage(format!(
                    "task references missing template {template_id}"
                )));
            }
        }
        Ok(())
    }

    /// Inserts one task, assigning its id.
    pub fn insert_task(&mut self, mut row: Task) -> Result<TaskId> {
        self.check_row(&row)?;
        row.id = self.next_task_id();
        let id = row.id;
        self.db.tasks.push(row);
        Ok(id)
    }

    /// Inserts all rows or none of them.
    pub fn insert_tasks(&mut self, rows: &[Task]) -> Result<Vec<TaskId>> {
        for (i, row) in rows.iter().enumerate() {
            self.check_row(row)
                .map_err(|e| Error::Storage(format!("bulk insert rejected at row {i}: {e}")))?;
        }
        let mut ids = Vec::with_capacity(rows.len());
        for row in rows {
            let mut row = row.clone();
            row.id = self.next_task_id();
            ids.push(row.id);
            self.db.tasks.push(row);
        }
        Ok(ids)
    }

    /// Tries one bulk insert; if it is rejected, inserts the rows one at a
    /// time and reports which ones failed.
    pub fn insert_tasks_with_fallback(&mut self, rows: &[Task]) -> InsertReport {
        let mut report = InsertReport::default();
        match self.insert_tasks(rows) {
            Ok(ids) => {
                report.inserted = ids.into_iter().enumerate().collect();
                return report;
            }
            Err(e) => {
                warn!("bulk insert of {} tasks failed, inserting one by one: {e}", rows.len());
                report.used_fallback = true;
            }
        }

        for (i, row) in rows.iter().enumerate() {
            match self.insert_task(row.clone()) {
                Ok(id) => report.inserted.push((i, id)),
                Err(e) => {
                    warn!("skipping task '{}' (row {i}): {e}", row.title);
                    report.failed.push((i, e));
                }
            }
        }
        report
    }

    /// Sets `last_generated_date` on every listed template in one pass.
    /// Returns how many templates were updated.
    pub fn mark_generated(&mut self, ids: &[TemplateId], date: NaiveDate) -> usize {
        let ids: HashSet<TemplateId> = ids.iter().copied().collect();
        let now = chrono::Utc::now();
        let mut updated = 0;
        for tmpl in self.db.templates.iter_mut().filter(|t| ids.contains(&t.id)) {
            tmpl.last_generated_date = Some(date);
            tmpl.updated_at = now;
            updated += 1;
        }
        updated
    }

    /// Inserts a template, assigning its id.
    pub fn insert_template(&mut self, mut row: RecurringTemplate) -> TemplateId {
        row.id = self.next_template_id();
        let id = row.id;
        self.db.templates.push(row);
        id
    }

    pub fn remove_template(&mut self, owner: OwnerId, id: TemplateId) -> Result<RecurringTemplate> {
        let idx = self
            .db
            .templates
            .iter()
            .position(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::template_not_found(id))?;
        Ok(self.db.templates.remove(idx))
    }

    pub fn remove_task(&mut self, owner: OwnerId, id: TaskId) -> Result<Task> {
        let idx = self
            .db
            .tasks
            .iter()
            .position(|t| t.id == id && t.owner_id == owner)
            .ok_or_else(|| Error::task_not_found(id))?;
        Ok(self.db.tasks.remove(idx))
    }

    /// Writes the staged database. On failure the committed file is untouched.
    pub fn commit(self) -> Result<()> {
        self.store.save(&self.db)?;
        debug!(
            "committed {} tasks and {} templates to {}",
            self.db.tasks.len(),
            self.db.templates.len(),
            self.store.path.display()
        );
        Ok(())
    }
}
