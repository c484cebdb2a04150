//! pvi - procrastination tracker
//!
//! Records intended tasks and the avoidance logged against them, and reports
//! the PVI score and root-cause diagnosis kept current after every log change.

mod output;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use pvi_core::{
    ActivityCategory, Config, LogFilter, LogUpdate, NewLog, NewTask, TaskStatus, TaskUpdate,
    Tracker,
};
use serde_json::json;

use crate::output::Printer;

#[derive(Parser)]
#[command(name = "pvi")]
#[command(about = "Track avoidance against intended tasks and diagnose why it happens")]
#[command(version)]
struct Args {
    /// User ID to act as (from `pvi user add`)
    #[arg(short, long, global = true)]
    user: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Text, global = true)]
    format: Format,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Manage users
    #[command(subcommand)]
    User(UserCommand),

    /// Manage intended tasks
    #[command(subcommand)]
    Task(TaskCommand),

    /// Record and inspect avoidance logs
    #[command(subcommand)]
    Log(LogCommand),

    /// Show the current score, diagnosis and history totals
    Summary,

    /// Show activity breakdown, time of day and daily trend
    Charts,

    /// Recompute the score now (e.g. after old logs left the window)
    Recompute,
}

#[derive(Subcommand)]
enum UserCommand {
    /// Create a user and print its ID
    Add {
        /// Display name
        name: String,
    },
    /// Show the current user
    Show,
}

#[derive(Subcommand)]
enum TaskCommand {
    /// Create an intended task
    Add {
        /// What you meant to do
        title: String,
        /// Difficulty from 1 (trivial) to 5 (daunting)
        #[arg(short, long)]
        difficulty: u8,
    },
    /// List tasks, newest first
    List {
        /// Only tasks with this status (active, completed, archived)
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },
    /// Change a task
    Update {
        id: i64,
        #[arg(short, long)]
        title: Option<String>,
        #[arg(short, long)]
        difficulty: Option<u8>,
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },
    /// Delete a task; its logs are kept but no longer scored
    Rm { id: i64 },
}

#[derive(Subcommand)]
enum LogCommand {
    /// Record time spent avoiding a task
    Add {
        /// Task that was avoided
        #[arg(short, long)]
        task: i64,
        /// Minutes spent
        #[arg(short, long)]
        minutes: u32,
        /// social, video, gaming, browsing, messaging or other
        #[arg(short, long)]
        category: ActivityCategory,
        /// Free-text note
        #[arg(long)]
        detail: Option<String>,
        /// When it happened (RFC 3339); defaults to now
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// Change a log entry
    Edit {
        id: i64,
        #[arg(short, long)]
        task: Option<i64>,
        #[arg(short, long)]
        minutes: Option<u32>,
        #[arg(short, long)]
        category: Option<ActivityCategory>,
        #[arg(long, conflicts_with = "clear_detail")]
        detail: Option<String>,
        /// Remove the note
        #[arg(long)]
        clear_detail: bool,
    },
    /// Delete a log entry
    Rm { id: i64 },
    /// List log entries, newest first
    List {
        /// Only entries at or after this time (RFC 3339)
        #[arg(long)]
        from: Option<DateTime<Utc>>,
        /// Only entries at or before this time (RFC 3339)
        #[arg(long)]
        to: Option<DateTime<Utc>>,
        #[arg(short, long)]
        category: Option<ActivityCategory>,
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        pvi_core::logging::init(&config.logging).context("failed to initialize logging")?;

    tracing::debug!(version = env!("CARGO_PKG_VERSION"), "pvi starting");

    let tracker = Tracker::open(&config).context("failed to open database")?;
    let printer = Printer::new(args.format);

    run(&tracker, &printer, args.user.as_deref(), args.command)
}

fn run(tracker: &Tracker, out: &Printer, user: Option<&str>, command: Command) -> Result<()> {
    let require_user = || user.context("--user <ID> is required for this command");

    match command {
        Command::User(UserCommand::Add { name }) => {
            let user = tracker.create_user(&name).context("failed to create user")?;
            out.user(&user)
        }
        Command::User(UserCommand::Show) => {
            let user = tracker.get_user(require_user()?)?;
            out.user(&user)
        }

        Command::Task(cmd) => {
            let user_id = require_user()?;
            match cmd {
                TaskCommand::Add { title, difficulty } => {
                    let task = tracker
                        .create_task(user_id, NewTask { title, difficulty })
                        .context("failed to create task")?;
                    out.task(&task)
                }
                TaskCommand::List { status } => {
                    let tasks = tracker.list_tasks(user_id, status)?;
                    out.tasks(&tasks)
                }
                TaskCommand::Update {
                    id,
                    title,
                    difficulty,
                    status,
                } => {
                    let task = tracker
                        .update_task(
                            user_id,
                            id,
                            TaskUpdate {
                                title,
                                difficulty,
                                status,
                            },
                        )
                        .with_context(|| format!("failed to update task {id}"))?;
                    out.task(&task)
                }
                TaskCommand::Rm { id } => {
                    tracker
                        .delete_task(user_id, id)
                        .with_context(|| format!("failed to delete task {id}"))?;
                    out.deleted("task", id)
                }
            }
        }

        Command::Log(cmd) => {
            let user_id = require_user()?;
            match cmd {
                LogCommand::Add {
                    task,
                    minutes,
                    category,
                    detail,
                    at,
                } => {
                    let (log, analytics) = tracker
                        .create_log(
                            user_id,
                            NewLog {
                                task_id: task,
                                duration_minutes: minutes,
                                category,
                                detail,
                                logged_at: at,
                            },
                        )
                        .context("failed to record log")?;
                    out.logged(&log, &analytics)
                }
                LogCommand::Edit {
                    id,
                    task,
                    minutes,
                    category,
                    detail,
                    clear_detail,
                } => {
                    let detail = if clear_detail { Some(None) } else { detail.map(Some) };
                    let (log, analytics) = tracker
                        .update_log(
                            user_id,
                            id,
                            LogUpdate {
                                task_id: task,
                                duration_minutes: minutes,
                                category,
                                detail,
                            },
                        )
                        .with_context(|| format!("failed to update log {id}"))?;
                    out.logged(&log, &analytics)
                }
                LogCommand::Rm { id } => {
                    let analytics = tracker
                        .delete_log(user_id, id)
                        .with_context(|| format!("failed to delete log {id}"))?;
                    if out.is_json() {
                        return out.json(&json!({ "deleted": id, "analytics": analytics }));
                    }
                    out.deleted("log", id)?;
                    out.snapshot(Some(&analytics))
                }
                LogCommand::List {
                    from,
                    to,
                    category,
                    limit,
                } => {
                    let logs = tracker.list_logs(
                        user_id,
                        &LogFilter {
                            from,
                            to,
                            category,
                            limit,
                        },
                    )?;
                    out.logs(&logs)
                }
            }
        }

        Command::Summary => {
            let summary = tracker.summary(require_user()?)?;
            out.summary(&summary)
        }
        Command::Charts => {
            let charts = tracker.charts(require_user()?)?;
            out.charts(&charts)
        }
        Command::Recompute => {
            let analytics = tracker
                .recompute(require_user()?)
                .context("failed to recompute analytics")?;
            out.snapshot(Some(&analytics))
        }
    }
}
