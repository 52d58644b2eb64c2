//! # taskcadence
//!
//! A task backend built around recurring work. Templates describe what
//! should repeat and when; a daily job turns them into tasks. Tasks can also
//! carry their own repeat rule, which chains the next occurrence when the
//! current one is completed.
//!
//! ## Features
//!
//! *   **Recurring templates**: `daily`, `weekly` (on chosen weekdays) or
//!     `alternate_days`, inside an optional start/end window. Templates can
//!     be paused and resumed.
//! *   **Daily generation**: one task per due template per day, never more
//!     than one open occurrence per template, safe to re-run.
//! *   **Inline recurrence**: every N days/weeks/months/years, optionally on
//!     chosen weekdays. Month ends and Feb 29 are clamped, never rolled over.
//! *   **Snooze**: pushes a task by one day, or by one step of its own rule.
//! *   **Dual Interface**: scriptable CLI and an interactive TUI.
//!
//! ## Usage
//!
//! ```bash
//! # A weekly template, Mondays and Fridays at 09:00
//! taskcadence template add "Plan week" --pattern weekly --days 0,4 --at 09:00 --project 1 --section 1
//!
//! # Run the generation job for today (or --date YYYY-MM-DD)
//! taskcadence generate
//!
//! # Keep running and generate every day at the configured time
//! taskcadence schedule
//!
//! # A task repeating every 2 weeks, completed and snoozed
//! taskcadence add "Water plants" --due "2025-01-13 18:00" --every 2 --unit weeks
//! taskcadence complete 3
//! taskcadence snooze 4
//! ```
//!
//! ## Data Storage
//!
//! Tasks and templates live in one JSON file in your local data directory
//! (`~/.local/share/taskcadence/store.json` on Linux). Override it with the
//! `TASKCADENCE_DB` environment variable. Settings are read from
//! `~/.config/taskcadence/config.toml` when present.

pub mod commands;
pub mod config;
pub mod error;
pub mod generation;
pub mod models;
pub mod recurrence;
pub mod scheduler;
pub mod storage;
pub mod tasks;
pub mod templates;
pub mod tui;
pub mod urgency;

pub use error::{Error, Result};
