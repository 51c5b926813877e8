mod ai;
mod assistant;
mod config;
mod db;
mod error;
mod models;
mod pagination;
mod resume;
mod reveal;
mod session;
mod store;
mod tui;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::{debug, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use assistant::Assistant;
use config::Config;
use db::{KeyValueStore, MemoryStore, SqliteStore};
use models::{InsightKind, Job, JobBoard, SearchFilters};
use pagination::PageCursor;
use resume::{ResumeInput, ResumeMediaType};
use reveal::RevealController;
use session::{SearchPhase, SearchSession};
use store::JobListStore;

#[derive(Parser)]
#[command(name = "scout")]
#[command(about = "AI job search assistant - search, save, and analyze job listings")]
struct Cli {
    /// Model to use (e.g. claude-sonnet, api-haiku, gpt-4o)
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for jobs and print one page of results
    Search {
        #[command(flatten)]
        filters: FilterArgs,

        /// Page of results to show
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// List saved jobs
    Saved {
        /// Page to show
        #[arg(short, long, default_value = "1")]
        page: usize,
    },

    /// Remove a job from the saved list
    Unsave {
        /// Job ID (or a unique prefix of it)
        id: String,
    },

    /// Turn a pasted job posting into a listing
    Add {
        /// Text of the job posting
        content: Option<String>,

        /// Read the posting from a file instead
        #[arg(short, long, conflicts_with = "content")]
        file: Option<PathBuf>,

        /// Save the parsed job
        #[arg(long)]
        save: bool,
    },

    /// Generate a summary, key skills, or cover letter for a saved job
    Insight {
        /// Job ID (or a unique prefix of it)
        id: String,

        #[arg(short, long, value_enum, default_value = "summary")]
        kind: InsightKind,
    },

    /// Compare a resume against a saved job
    Match {
        /// Job ID (or a unique prefix of it)
        id: String,

        /// Resume file (PDF, DOC or DOCX)
        #[arg(short, long, conflicts_with = "text")]
        resume: Option<PathBuf>,

        /// Media type of the resume file, when its extension does not say
        #[arg(long, requires = "resume")]
        media_type: Option<String>,

        /// Resume as plain text
        #[arg(short, long)]
        text: Option<String>,
    },

    /// Interactive browser: search, reveal, save, and insights
    Browse {
        #[command(flatten)]
        filters: FilterArgs,
    },
}

#[derive(Args, Default)]
struct FilterArgs {
    /// Job title or keywords
    #[arg(short, long)]
    query: Option<String>,

    /// City, region, or "Remote"
    #[arg(short, long)]
    location: Option<String>,

    /// Employment type (Full-time, Part-time, Contract, Internship)
    #[arg(short = 't', long = "type")]
    employment_kind: Option<String>,

    /// Salary expectation, free-form
    #[arg(long)]
    salary: Option<String>,

    /// Work mode (Remote, Hybrid, On-site)
    #[arg(long)]
    work_mode: Option<String>,

    #[arg(long)]
    industry: Option<String>,
}

impl FilterArgs {
    fn is_empty(&self) -> bool {
        [
            &self.query,
            &self.location,
            &self.employment_kind,
            &self.salary,
            &self.work_mode,
            &self.industry,
        ]
        .iter()
        .all(|value| value.is_none())
    }

    /// With no flags at all the default search is used.
    fn into_filters(self) -> SearchFilters {
        if self.is_empty() {
            return SearchFilters::initial();
        }
        SearchFilters {
            query: self.query.unwrap_or_default(),
            location: self.location.unwrap_or_default(),
            employment_kind: self.employment_kind.unwrap_or_default(),
            salary: self.salary.unwrap_or_default(),
            work_mode: self.work_mode.unwrap_or_default(),
            industry: self.industry.unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;
    let browsing = matches!(cli.command, Commands::Browse { .. });
    init_tracing(&config, browsing)?;

    let model = cli.model.unwrap_or_else(|| config.model.clone());
    let mut store = open_store(&config);

    match cli.command {
        Commands::Search { filters, page } => {
            let assistant = build_assistant(&model)?;
            let mut session = SearchSession::new(assistant, reveal_controller(&config));
            let filters = filters.into_filters();
            println!("Searching for {}...", filters.describe());
            session.submit(filters, &mut store);

            let mut reported = 0;
            let phase = session
                .run_until(&mut store, |session, store| {
                    let completed = session.status().completed();
                    for board in &completed[reported..] {
                        println!("  {:<14} done ({} so far)", board.name(), store.search_results().len());
                    }
                    reported = completed.len();
                })
                .await;

            if phase == SearchPhase::Failed {
                let reason = session
                    .error()
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "unknown error".to_string());
                return Err(anyhow!("Failed to fetch jobs: {}", reason));
            }
            println!();
            print_page(store.search_results(), page, &store);
        }

        Commands::Saved { page } => {
            print_page(store.saved_jobs(), page, &store);
        }

        Commands::Unsave { id } => {
            let job = find_saved(&store, &id)?.clone();
            if store.unsave(&job.id) {
                println!("Removed: {}", job.summary_line());
            }
        }

        Commands::Add { content, file, save } => {
            let raw = match (content, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                (None, None) => bail!("Provide the posting text or --file"),
            };
            let assistant = build_assistant(&model)?;
            println!("Parsing job posting with {}...", assistant.model_name());
            let job = assistant.parse_job_posting(&raw).await?;
            print_job(&job);

            if save {
                store.save(job.clone());
                println!("\nSaved as {}", job.id);
            }
        }

        Commands::Insight { id, kind } => {
            let job = find_saved(&store, &id)?.clone();
            let assistant = build_assistant(&model)?;
            println!("{} for {}\n", kind.label(), job.summary_line());
            let text = assistant.generate_insight(&job, kind).await?;
            println!("{}", text.trim());
        }

        Commands::Match { id, resume, media_type, text } => {
            let job = find_saved(&store, &id)?.clone();
            let input = match (resume, media_type) {
                (Some(path), Some(mime)) => {
                    ResumeInput::from_file(&path, ResumeMediaType::from_mime(&mime)?)?
                }
                (Some(path), None) => ResumeInput::from_path(&path)?,
                (None, _) => ResumeInput::Text(text.unwrap_or_default()),
            };
            input.validate()?;
            let assistant = build_assistant(&model)?;
            println!("Comparing resume against {}...\n", job.summary_line());
            let analysis = assistant.analyze_resume(&input, &job).await?;
            println!("{}", analysis.trim());
        }

        Commands::Browse { filters } => {
            let assistant = build_assistant(&model)?;
            let mut session = SearchSession::new(assistant.clone(), reveal_controller(&config));
            tui::run_browse(&mut session, &mut store, assistant, filters.into_filters()).await?;
        }
    }

    Ok(())
}

fn init_tracing(config: &Config, to_file: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{}={}", env!("CARGO_PKG_NAME"), config.rust_log).into());

    if to_file {
        // The terminal belongs to the TUI; send logs to a file instead.
        std::fs::create_dir_all(&config.data_dir)
            .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(config.log_path())
            .with_context(|| format!("Failed to open {}", config.log_path().display()))?;
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_ansi(false).with_writer(std::sync::Mutex::new(file)))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
    Ok(())
}

fn open_store(config: &Config) -> JobListStore {
    let storage: Box<dyn KeyValueStore> = match SqliteStore::open(&config.data_dir) {
        Ok(store) => {
            debug!("Using {}", store.path().display());
            Box::new(store)
        }
        Err(e) => {
            warn!("Saved jobs will not outlive this run: {}", e);
            Box::new(MemoryStore::new())
        }
    };
    JobListStore::load(storage)
}

fn build_assistant(model: &str) -> Result<Assistant> {
    let spec = ai::resolve_model(model)?;
    let provider = ai::create_provider(&spec)?;
    Ok(Assistant::new(provider))
}

fn reveal_controller(config: &Config) -> RevealController {
    RevealController::new(JobBoard::ALL.to_vec(), config.reveal_delay)
}

/// Looks a saved job up by full ID or by a prefix that matches exactly one job.
fn find_saved<'a>(store: &'a JobListStore, id: &str) -> Result<&'a Job> {
    if let Some(job) = store.saved_job(id) {
        return Ok(job);
    }
    let matches: Vec<&Job> = store
        .saved_jobs()
        .iter()
        .filter(|job| job.id.starts_with(id))
        .collect();
    match matches.as_slice() {
        [job] => Ok(job),
        [] => bail!("No saved job with ID {}", id),
        _ => bail!("ID prefix {} matches {} saved jobs", id, matches.len()),
    }
}

fn print_page(jobs: &[Job], page: usize, store: &JobListStore) {
    if jobs.is_empty() {
        println!("No jobs found.");
        return;
    }

    let mut cursor = PageCursor::default();
    cursor.go_to(page, jobs.len());

    println!(
        "{:<10} {:<36} {:<22} {:<16} {:<10} {}",
        "ID", "TITLE", "COMPANY", "LOCATION", "TYPE", ""
    );
    println!("{}", "-".repeat(100));
    for job in cursor.slice(jobs) {
        println!(
            "{:<10} {:<36} {:<22} {:<16} {:<10} {}",
            truncate(&job.id, 8),
            truncate(&job.title, 34),
            truncate(&job.company, 20),
            truncate(&job.location, 14),
            job.kind,
            if store.is_saved(&job.id) { "*" } else { "" }
        );
    }
    println!(
        "\nPage {} of {} ({} jobs)",
        cursor.page(),
        cursor.total_pages(jobs.len()),
        jobs.len()
    );
}

fn print_job(job: &Job) {
    println!("ID:       {}", job.id);
    println!("Title:    {}", job.title);
    println!("Company:  {}", job.company);
    println!("Location: {}", job.location);
    println!("Type:     {}", job.kind);
    if let Some(salary) = &job.salary {
        println!("Salary:   {}", salary);
    }
    if !job.skills.is_empty() {
        let skills: Vec<&str> = job.skills.iter().map(String::as_str).collect();
        println!("Skills:   {}", skills.join(", "));
    }
    println!("\n{}", textwrap::fill(&job.description, 80));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
