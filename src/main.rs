use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveTime};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use taskcadence::commands::*;
use taskcadence::config::Config;
use taskcadence::models::{
    NewTask, NewTemplate, RecurrencePattern, RecurrenceUnit, TaskUpdate, TemplateUpdate,
};
use taskcadence::scheduler::{run_daily, wait_for_shutdown, DailyTrigger};
use taskcadence::tui::run_tui;

#[derive(Parser)]
#[command(name = "taskcadence")]
#[command(about = "Recurring task manager", long_about = None)]
struct Cli {
    /// Owner whose tasks and templates to use (defaults to the configured owner)
    #[arg(short, long, global = true)]
    owner: Option<u64>,
    /// Path to a config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new task
    Add {
        /// Task title (quoted if it has spaces)
        title: String,
        /// Project id
        #[arg(short, long, default_value_t = 1)]
        project: u64,
        /// Section id
        #[arg(short, long, default_value_t = 1)]
        section: u64,
        /// Due date, YYYY-MM-DD [HH:MM] or RFC 3339
        #[arg(short, long, value_parser = parse_due)]
        due: Option<DateTime<FixedOffset>>,
        /// Repeat every N units
        #[arg(short, long)]
        every: Option<u32>,
        /// Repeat unit (days, weeks, months, years)
        #[arg(short, long)]
        unit: Option<RecurrenceUnit>,
        /// Weekdays for weekly repeats, e.g. mon,thu or 0,3
        #[arg(long, value_parser = parse_days)]
        on: Option<::std::vec::Vec<u8>>,
        /// Priority id
        #[arg(long)]
        priority: Option<u64>,
        /// Label ids
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<u64>,
        /// Reminder, minutes before due
        #[arg(long)]
        reminder: Option<u32>,
        /// Expected duration in minutes
        #[arg(long)]
        duration: Option<u32>,
        /// Longer description
        #[arg(long)]
        description: Option<String>,
    },
    /// List tasks sorted by urgency
    List {
        /// Show completed and archived tasks
        #[arg(short, long)]
        all: bool,
    },
    /// Mark a task as complete
    Complete {
        id: u64,
    },
    /// Push a task's due date forward
    Snooze {
        id: u64,
    },
    /// Archive a task without completing it
    Archive {
        id: u64,
    },
    /// Remove a task
    Remove {
        id: u64,
    },
    /// Edit a task
    Edit {
        id: u64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New project id
        #[arg(short, long)]
        project: Option<u64>,
        /// New section id
        #[arg(short, long)]
        section: Option<u64>,
        /// New due date
        #[arg(short, long, value_parser = parse_due)]
        due: Option<DateTime<FixedOffset>>,
        /// Repeat every N units
        #[arg(short, long)]
        every: Option<u32>,
        /// Repeat unit
        #[arg(short, long)]
        unit: Option<RecurrenceUnit>,
        /// Weekdays for weekly repeats
        #[arg(long, value_parser = parse_days)]
        on: Option<::std::vec::Vec<u8>>,
        /// Stop repeating
        #[arg(long, conflicts_with_all = ["every", "unit", "on"])]
        no_repeat: bool,
    },
    /// Manage recurring templates
    Template {
        #[command(subcommand)]
        command: TemplateCommands,
    },
    /// Generate today's tasks from templates
    Generate {
        /// Generate for this date instead of today (YYYY-MM-DD)
        #[arg(short, long, value_parser = parse_date)]
        date: Option<NaiveDate>,
    },
    /// Run in the foreground and generate tasks every day at the configured time
    Schedule,
    /// Reset the database (delete all tasks and templates)
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for (bash, zsh, fish, powershell, elvish)
        shell: String,
    },
    /// Open interactive TUI
    Ui,
}

#[derive(Subcommand)]
enum TemplateCommands {
    /// Add a new template
    Add {
        /// Title of generated tasks
        title: String,
        /// daily, weekly or alternate_days
        #[arg(short = 'P', long, default_value = "daily")]
        pattern: RecurrencePattern,
        /// Weekdays for weekly templates, e.g. mon,fri or 0,4
        #[arg(short, long, value_parser = parse_days)]
        days: Option<::std::vec::Vec<u8>>,
        /// Time of day for generated tasks (HH:MM)
        #[arg(short, long, value_parser = parse_time, default_value = "09:00")]
        at: NaiveTime,
        /// UTC offset of the time of day, e.g. +02:00 (defaults to local)
        #[arg(long, value_parser = parse_offset, allow_hyphen_values = true)]
        offset: Option<i32>,
        /// First date to generate on (defaults to today)
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// Last date to generate on
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Project id
        #[arg(short, long, default_value_t = 1)]
        project: u64,
        /// Section id
        #[arg(short, long, default_value_t = 1)]
        section: u64,
        /// Priority id
        #[arg(long)]
        priority: Option<u64>,
        /// Label ids
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<u64>,
        /// Description copied onto generated tasks
        #[arg(long)]
        description: Option<String>,
    },
    /// List templates
    List {
        /// Include paused templates
        #[arg(short, long)]
        all: bool,
    },
    /// Show a template
    Show {
        id: u64,
    },
    /// Edit a template
    Edit {
        id: u64,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// New pattern
        #[arg(short = 'P', long)]
        pattern: Option<RecurrencePattern>,
        /// New weekdays
        #[arg(short, long, value_parser = parse_days)]
        days: Option<::std::vec::Vec<u8>>,
        /// New time of day
        #[arg(short, long, value_parser = parse_time)]
        at: Option<NaiveTime>,
        /// New start date
        #[arg(long, value_parser = parse_date)]
        start: Option<NaiveDate>,
        /// New end date
        #[arg(long, value_parser = parse_date)]
        end: Option<NaiveDate>,
        /// Remove the end date
        #[arg(long, conflicts_with = "end")]
        no_end: bool,
        /// New project id
        #[arg(short, long)]
        project: Option<u64>,
        /// New section id
        #[arg(short, long)]
        section: Option<u64>,
    },
    /// Stop generating tasks from a template
    Pause {
        id: u64,
    },
    /// Resume a paused template
    Resume {
        id: u64,
    },
    /// Remove a template
    Remove {
        id: u64,
    },
    /// Show the next dates a template fires on
    Preview {
        id: u64,
        /// How many dates to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // The daemon reports each run; interactive commands only surface problems.
    let default_filter = match cli.command {
        Some(Commands::Schedule) => "taskcadence=info",
        _ => "taskcadence=warn",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(io::stderr)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> taskcadence::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let owner = cli.owner.unwrap_or(config.default_owner);
    let store = config.open_store()?;

    match cli.command {
        Some(Commands::Add {
            title,
            project,
            section,
            due,
            every,
            unit,
            on,
            priority,
            labels,
            reminder,
            duration,
            description,
        }) => {
            let fields = NewTask {
                title,
                description,
                project_id: project,
                section_id: section,
                priority_id: priority,
                label_ids: labels,
                due_datetime: due,
                recurrence: inline_rule(every, unit, on),
                reminder_minutes: reminder,
                duration_minutes: duration,
                recurring_task_id: None,
            };
            cmd_add(&store, owner, fields)
        }
        Some(Commands::List { all }) => cmd_list(&store, owner, all),
        Some(Commands::Complete { id }) => cmd_complete(&store, owner, id),
        Some(Commands::Snooze { id }) => cmd_snooze(&store, owner, id),
        Some(Commands::Archive { id }) => cmd_archive(&store, owner, id),
        Some(Commands::Remove { id }) => cmd_remove(&store, owner, id),
        Some(Commands::Edit { id, title, project, section, due, every, unit, on, no_repeat }) => {
            let recurrence = if no_repeat {
                Some(None)
            } else {
                inline_rule(every, unit, on).map(Some)
            };
            let changes = TaskUpdate {
                title,
                project_id: project,
                section_id: section,
                due_datetime: due.map(Some),
                recurrence,
                ..TaskUpdate::default()
            };
            cmd_edit(&store, owner, id, changes)
        }
        Some(Commands::Template { command }) => match command {
            TemplateCommands::Add {
                title,
                pattern,
                days,
                at,
                offset,
                start,
                end,
                project,
                section,
                priority,
                labels,
                description,
            } => {
                let fields = NewTemplate {
                    title,
                    description,
                    project_id: project,
                    section_id: section,
                    priority_id: priority,
                    label_ids: labels,
                    pattern,
                    days_of_week: days,
                    time_of_day: at,
                    utc_offset_secs: offset.unwrap_or_else(local_offset_secs),
                    start_date: start.unwrap_or_else(|| Local::now().date_naive()),
                    end_date: end,
                };
                cmd_template_add(&store, owner, fields)
            }
            TemplateCommands::List { all } => cmd_template_list(&store, owner, all),
            TemplateCommands::Show { id } => cmd_template_show(&store, owner, id),
            TemplateCommands::Edit {
                id,
                title,
                pattern,
                days,
                at,
                start,
                end,
                no_end,
                project,
                section,
            } => {
                // Switching away from weekly drops the weekday set unless new days were given.
                let days_of_week = match (days, pattern) {
                    (Some(days), _) => Some(Some(days)),
                    (None, Some(p)) if p != RecurrencePattern::Weekly => Some(None),
                    (None, _) => None,
                };
                let changes = TemplateUpdate {
                    title,
                    project_id: project,
                    section_id: section,
                    pattern,
                    days_of_week,
                    time_of_day: at,
                    start_date: start,
                    end_date: if no_end { Some(None) } else { end.map(Some) },
                    ..TemplateUpdate::default()
                };
                cmd_template_edit(&store, owner, id, changes)
            }
            TemplateCommands::Pause { id } => cmd_template_pause(&store, owner, id),
            TemplateCommands::Resume { id } => cmd_template_resume(&store, owner, id),
            TemplateCommands::Remove { id } => cmd_template_remove(&store, owner, id),
            TemplateCommands::Preview { id, count } => cmd_template_preview(&store, owner, id, count),
        },
        Some(Commands::Generate { date }) => cmd_generate(&store, date, &config.generation_settings()),
        Some(Commands::Schedule) => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_daily(
                store,
                DailyTrigger::from(&config.schedule),
                config.generation_settings(),
                wait_for_shutdown(tokio::signal::ctrl_c()),
            ))
        }
        Some(Commands::Reset { force }) => cmd_reset(&store, force),
        Some(Commands::Completions { shell }) => {
            let shell_enum = match shell.as_str() {
                "bash" => Shell::Bash,
                "zsh" => Shell::Zsh,
                "fish" => Shell::Fish,
                "powershell" => Shell::PowerShell,
                "elvish" => Shell::Elvish,
                _ => {
                    eprintln!("Unsupported shell: {}", shell);
                    return Ok(());
                }
            };
            let mut cmd = Cli::command();
            generate(shell_enum, &mut cmd, "taskcadence", &mut io::stdout());
            Ok(())
        }
        Some(Commands::Ui) | None => run_tui(store, owner, config.generation_settings()),
    }
}
