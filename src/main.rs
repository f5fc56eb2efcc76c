use clap::{parser::ValueSource, value_parser, Arg, ArgMatches, Command};
use color_eyre::Result;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use taskboard::adapters::{
    api::{ApiClient, HttpTaskApi},
    config::FileConfigStore,
    tui::{run_tui, App},
};
use taskboard::application::{ListParams, StoreSnapshot, TaskListStore};
use taskboard::domain::{StatusFilter, TaskId, TaskStatus, TaskUpdate};
use taskboard::ports::ConfigStore;

fn cli() -> Command {
    Command::new("taskboard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("A terminal task board backed by a REST API")
        .long_about("Browse, filter and update tasks from a task REST API.\n\nRun without a subcommand to open the interactive board.")
        .arg(
            Arg::new("api_url")
                .long("api-url")
                .value_name("URL")
                .env("TASKBOARD_API_URL")
                .help("Base URL of the task API, e.g. http://localhost:5000/api")
                .global(true)
        )
        .arg(
            Arg::new("limit")
                .long("limit")
                .value_name("N")
                .value_parser(value_parser!(u32).range(1..))
                .help("Tasks per page")
                .global(true)
        )
        .subcommand(
            Command::new("tasks")
                .about("Task operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("list")
                        .about("List one page of tasks as JSON")
                        .arg(status_arg())
                        .arg(
                            Arg::new("page")
                                .long("page")
                                .short('p')
                                .value_name("N")
                                .value_parser(value_parser!(u32).range(1..))
                                .help("Page to fetch")
                        )
                )
                .subcommand(
                    Command::new("add")
                        .about("Create a task")
                        .arg(
                            Arg::new("title")
                                .help("Task title")
                                .required(true)
                                .index(1)
                        )
                        .arg(
                            Arg::new("description")
                                .long("description")
                                .short('d')
                                .value_name("TEXT")
                                .help("Task description")
                        )
                )
                .subcommand(
                    Command::new("edit")
                        .about("Change a task's title or description")
                        .arg(task_id_arg())
                        .arg(
                            Arg::new("title")
                                .long("title")
                                .short('t')
                                .value_name("TEXT")
                                .help("New title")
                        )
                        .arg(
                            Arg::new("description")
                                .long("description")
                                .short('d')
                                .value_name("TEXT")
                                .help("New description")
                        )
                )
                .subcommand(
                    Command::new("status")
                        .about("Move a task to another status")
                        .arg(task_id_arg())
                        .arg(
                            Arg::new("status")
                                .help("not_started, in_progress or completed")
                                .required(true)
                                .index(2)
                        )
                )
                .subcommand(
                    Command::new("delete")
                        .about("Delete a task")
                        .arg(task_id_arg())
                )
        )
        .subcommand(
            Command::new("stats")
                .about("Print progress statistics as JSON")
                .arg(status_arg())
        )
}

fn status_arg() -> Arg {
    Arg::new("status")
        .long("status")
        .short('s')
        .value_name("STATUS")
        .help("Only tasks with this status (all, not_started, in_progress, completed)")
}

fn task_id_arg() -> Arg {
    Arg::new("task_id")
        .help("Task ID")
        .required(true)
        .index(1)
}

fn fail(context: &str, error: impl Display) -> ! {
    eprintln!("❌ {context}: {error}");
    std::process::exit(1);
}

fn parse_filter(matches: &ArgMatches) -> Option<StatusFilter> {
    matches
        .get_one::<String>("status")
        .map(|s| s.parse().unwrap_or_else(|e| fail("Invalid status filter", e)))
}

fn page_json(snapshot: &StoreSnapshot) -> serde_json::Value {
    serde_json::json!({
        "tasks": snapshot.tasks,
        "filter": snapshot.filter.to_string(),
        "pagination": snapshot.pagination,
        "stats": snapshot.stats,
    })
}

/// Print the snapshot, or exit when the fetch behind it failed.
fn print_page(snapshot: &StoreSnapshot) -> Result<()> {
    if let Some(error) = &snapshot.error {
        fail("Failed to list tasks", error);
    }

    println!("{}", serde_json::to_string_pretty(&page_json(snapshot))?);
    Ok(())
}

/// Output of a successful create: the reloaded page, or only the created title
/// plus a warning when the reload afterwards failed.
fn created_output(title: &str, snapshot: &StoreSnapshot) -> (serde_json::Value, Option<String>) {
    match &snapshot.error {
        None => (page_json(snapshot), None),
        Some(error) => (
            serde_json::json!({ "created": title.trim() }),
            Some(format!("Task created, but reloading the list failed: {error}")),
        ),
    }
}

async fn run_tasks_command(store: &TaskListStore, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("list", list_matches)) => {
            store
                .fetch(ListParams {
                    status: parse_filter(list_matches),
                    page: list_matches.get_one::<u32>("page").copied(),
                    limit: None,
                })
                .await;
            print_page(&store.snapshot().await)?;
        }
        Some(("add", add_matches)) => {
            let title = add_matches
                .get_one::<String>("title")
                .map(String::as_str)
                .unwrap_or_default();
            let description = add_matches
                .get_one::<String>("description")
                .map(String::as_str)
                .unwrap_or_default();

            if let Err(e) = store.add_task(title, description).await {
                fail("Failed to create task", e);
            }

            let (json, warning) = created_output(title, &store.snapshot().await);
            if let Some(warning) = warning {
                eprintln!("⚠️ {warning}");
            }
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
        Some(("edit", edit_matches)) => {
            let id = task_id(edit_matches);
            let update = TaskUpdate {
                title: edit_matches.get_one::<String>("title").cloned(),
                description: edit_matches.get_one::<String>("description").cloned(),
            };

            if let Err(e) = store.update_task(&id, update).await {
                fail("Failed to update task", e);
            }
            match store.snapshot().await.task(&id) {
                Some(task) => println!("{}", serde_json::to_string_pretty(task)?),
                None => println!("{}", serde_json::json!({ "updated": id.to_string() })),
            }
        }
        Some(("status", status_matches)) => {
            let id = task_id(status_matches);
            let status: TaskStatus = status_matches
                .get_one::<String>("status")
                .map(String::as_str)
                .unwrap_or_default()
                .parse()
                .unwrap_or_else(|e| fail("Invalid status", e));

            match store.update_status(&id, status).await {
                Ok(task) => println!("{}", serde_json::to_string_pretty(&task)?),
                Err(e) => fail("Failed to update task status", e),
            }
        }
        Some(("delete", delete_matches)) => {
            let id = task_id(delete_matches);
            if let Err(e) = store.delete_task(&id).await {
                fail("Failed to delete task", e);
            }
            println!("{}", serde_json::json!({ "deleted": id.to_string() }));
        }
        _ => fail("Unknown tasks subcommand", "see --help"),
    }

    Ok(())
}

fn task_id(matches: &ArgMatches) -> TaskId {
    matches
        .get_one::<String>("task_id")
        .map(|id| TaskId::from(id.as_str()))
        .unwrap_or_else(|| fail("Missing task ID", "see --help"))
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Log to a file so the TUI owns the terminal
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open("taskboard.log")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let matches = cli().get_matches();

    // Load configuration
    let config_store = FileConfigStore::new()?;
    let mut config = match config_store.load_config().await {
        Ok(config) => config,
        Err(e) => fail(
            &format!("Cannot read {}", config_store.path().display()),
            e,
        ),
    };

    // Flag and environment override the file; only an explicit flag is persisted
    let mut changed = false;
    if let Some(url) = matches.get_one::<String>("api_url") {
        changed |= matches.value_source("api_url") == Some(ValueSource::CommandLine)
            && *url != config.api_base_url;
        config.api_base_url = url.clone();
    }
    if let Some(limit) = matches.get_one::<u32>("limit") {
        changed |= *limit != config.page_size;
        config.page_size = *limit;
    }

    if changed {
        config_store.save_config(&config).await?;
        tracing::info!("Saved configuration to {}", config_store.path().display());
    }

    tracing::info!("Using task API at {}", config.api_base_url);

    // Create dependencies
    let client = ApiClient::new(
        &config.api_base_url,
        Duration::from_secs(config.request_timeout_seconds),
    )?;
    let api = Arc::new(HttpTaskApi::new(client));
    let store = Arc::new(TaskListStore::new(api, config.page_size));

    match matches.subcommand() {
        Some(("tasks", tasks_matches)) => run_tasks_command(&store, tasks_matches).await?,
        Some(("stats", stats_matches)) => {
            store
                .fetch(ListParams {
                    status: parse_filter(stats_matches),
                    page: Some(1),
                    limit: None,
                })
                .await;

            let snapshot = store.snapshot().await;
            if let Some(error) = &snapshot.error {
                fail("Failed to load stats", error);
            }
            println!("{}", serde_json::to_string_pretty(&snapshot.stats)?);
        }
        None => {
            // Default behavior - run TUI
            let app = App::new(store);

            if let Err(e) = run_tui(app).await {
                fail("Application error", e);
            }
        }
        _ => fail("Unknown command", "see --help"),
    }

    Ok(())
}
