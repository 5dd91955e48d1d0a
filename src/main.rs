//! Biblio Desk - library front desk on the command line
//!
//! Every command runs the stale-session check first, then talks to the backend
//! configured in `config/` (or `BIBLIO_API_URL`).

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use biblio_desk::{
    config::AppConfig,
    error::AppResult,
    models::{Book, BookIssueDetails, Credentials, IssueStatus, NewUser, SearchCriteria, SignUp},
    repository::SessionEvent,
    services::{
        issue::IssueState,
        ledger::LedgerOutcome,
        notifications::Level,
        returns::{OpenOutcome, ReturnOutcome},
        session::StartupCheck,
        Services,
    },
    AppState,
};

#[derive(Parser, Debug)]
#[command(name = "biblio-desk", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Sign in as a librarian
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
    },
    /// Create a librarian account and sign in
    Signup {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        password: String,
        #[arg(long)]
        confirm: String,
    },
    /// Sign out and forget the local session
    Logout,
    /// Show whether a librarian session is active
    Status {
        /// Keep running and report sign-ins and sign-outs from other terminals
        #[arg(long)]
        follow: bool,
    },
    /// Search by title, author and/or publisher
    Search {
        #[command(flatten)]
        criteria: CriteriaArgs,
        /// Also list books with no copies left
        #[arg(long)]
        all: bool,
    },
    /// Free-text search, optionally within one category
    Find {
        text: String,
        #[arg(long)]
        category: Option<i32>,
    },
    /// List the catalog, or show one book
    Books {
        #[arg(long)]
        id: Option<i32>,
        /// List categories instead
        #[arg(long)]
        categories: bool,
    },
    /// Issue a book to a patron
    Issue(IssueArgs),
    /// List a patron's issued books
    Loans { username: String },
    /// Take back an issued book
    Return { username: String, issue_id: i32 },
    /// List every issue record
    Issues {
        #[arg(long)]
        status: Option<StatusArg>,
    },
    /// Approve a pending issue
    Approve { issue_id: i32 },
    /// Remove a returned issue record
    Remove { issue_id: i32 },
    /// List patrons (librarian only)
    Users {
        /// List librarians instead
        #[arg(long)]
        librarians: bool,
    },
}

#[derive(Args, Debug)]
struct CriteriaArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    author: Option<String>,
    #[arg(long)]
    publisher: Option<String>,
}

impl From<CriteriaArgs> for SearchCriteria {
    fn from(args: CriteriaArgs) -> Self {
        SearchCriteria {
            title: args.title,
            author: args.author,
            publisher: args.publisher,
        }
    }
}

#[derive(Args, Debug)]
struct IssueArgs {
    #[command(flatten)]
    criteria: CriteriaArgs,
    /// Id of the book to issue, among the search results
    #[arg(long)]
    book: i32,
    /// Patron username
    #[arg(long)]
    user: String,
    /// Register the patron with this email if unknown
    #[arg(long)]
    email: Option<String>,
    /// Password for a newly registered patron
    #[arg(long)]
    user_password: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum StatusArg {
    Pending,
    Issued,
    Returned,
}

impl From<StatusArg> for IssueStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => IssueStatus::Pending,
            StatusArg::Issued => IssueStatus::Issued,
            StatusArg::Returned => IssueStatus::Returned,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(&config);

    let state = AppState::from_config(config).context("Failed to set up backend client")?;

    match state.services.session.startup().await? {
        StartupCheck::StaleCleared => tracing::info!("Expired session removed"),
        check => tracing::debug!("Startup session check: {:?}", check),
    }

    let outcome = run(&state, cli.command).await;

    let notifications = state.services.notifications.drain();
    for notification in &notifications {
        match notification.level {
            Level::Success => eprintln!("✓ {}", notification.message),
            Level::Info => eprintln!("· {}", notification.message),
            Level::Error => eprintln!("✗ {}", notification.message),
        }
    }

    if let Err(e) = outcome {
        if notifications.iter().all(|n| n.level != Level::Error) {
            eprintln!("✗ {}", e.user_message());
        }
        tracing::debug!("Command failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("biblio_desk={}", config.logging.level).into());
    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(state: &AppState, command: Commands) -> AppResult<()> {
    let services = &state.services;

    match command {
        Commands::Login { username, password } => {
            services.session.sign_in(Credentials { username, password }).await?;
        }
        Commands::Signup {
            username,
            password,
            confirm,
        } => {
            services
                .session
                .sign_up(SignUp {
                    username,
                    password,
                    confirm_password: confirm,
                })
                .await?;
        }
        Commands::Logout => services.session.logout().await?,
        Commands::Status { follow } => {
            let events = services.session.subscribe();
            print_status(services).await?;
            if follow {
                follow_session(services, events).await?;
            }
        }
        Commands::Search { criteria, all } => {
            let form = services.catalog.search_form();
            form.fetch(&criteria.into()).await?;
            print_books(&if all { form.results() } else { form.issuable() });
        }
        Commands::Find { text, category } => {
            let books = match category {
                Some(category) => services.catalog.by_category(category, Some(&text)).await?,
                None => services.catalog.find(&text).await?,
            };
            print_books(&books);
        }
        Commands::Books { id, categories } => {
            if categories {
                for category in services.catalog.categories().await? {
                    println!("{:>4}  {}", category.id, category.name);
                }
            } else if let Some(id) = id {
                print_books(&[services.catalog.book(id).await?]);
            } else {
                print_books(&services.catalog.all_books().await?);
            }
        }
        Commands::Issue(args) => issue(state, args).await?,
        Commands::Loans { username } => {
            let mut returns = services.return_workflow();
            if let OpenOutcome::Loaded(_) = returns.open(&username).await? {
                print_issues(returns.outstanding().into_iter());
            }
        }
        Commands::Return { username, issue_id } => {
            let mut returns = services.return_workflow();
            if let OpenOutcome::Loaded(_) = returns.open(&username).await? {
                match returns.return_book(issue_id).await? {
                    ReturnOutcome::Returned(_) => print_issues(returns.outstanding().into_iter()),
                    ReturnOutcome::Ignored(status) => println!("Issue {} is {}, nothing to return", issue_id, status),
                }
            }
        }
        Commands::Issues { status } => {
            services.ledger.refresh().await?;
            let records = match status {
                Some(status) => services.ledger.with_status(status.into()),
                None => services.ledger.records(),
            };
            print_issues(records.iter());
        }
        Commands::Approve { issue_id } => {
            services.ledger.refresh().await?;
            print_ledger_outcome(issue_id, services.ledger.approve(issue_id).await?);
        }
        Commands::Remove { issue_id } => {
            services.ledger.refresh().await?;
            print_ledger_outcome(issue_id, services.ledger.remove_returned(issue_id).await?);
        }
        Commands::Users { librarians } => {
            if librarians {
                for librarian in services.users.librarians().await? {
                    let id = librarian.librarian_id.map(|id| id.to_string()).unwrap_or_default();
                    println!("{:>4}  {:<24} {}", id, librarian.librarian_name, librarian.active);
                }
            } else {
                for user in services.users.list().await? {
                    println!("{:>4}  {:<24} {:<32} {}", user.id, user.username, user.email, user.has_issued);
                }
            }
        }
    }
    Ok(())
}

async fn print_status(services: &Services) -> AppResult<()> {
    let Some(token) = services.session.token().filter(|_| services.session.is_valid()) else {
        println!("Not signed in");
        return Ok(());
    };
    let librarian = services.session.current_librarian().await?;
    match token.expiry() {
        Some(expiry) => println!("Signed in as {} until {}", librarian.librarian_name, expiry),
        None => println!("Signed in as {}", librarian.librarian_name),
    }
    Ok(())
}

/// Report session changes until interrupted
async fn follow_session(services: &Services, mut events: broadcast::Receiver<SessionEvent>) -> AppResult<()> {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => return Ok(()),
            event = events.recv() => match event {
                Ok(SessionEvent::SignedIn) => print_status(services).await?,
                Ok(SessionEvent::Cleared) => println!("Signed out"),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    tracing::debug!("Missed {} session events", missed);
                    print_status(services).await?;
                }
                Err(broadcast::error::RecvError::Closed) => return Ok(()),
            },
        }
    }
}

async fn issue(state: &AppState, args: IssueArgs) -> AppResult<()> {
    let mut workflow = state.services.issue_workflow();
    workflow.search(args.criteria.into()).await?;
    workflow.select(args.book)?;
    workflow.identify(&args.user)?;

    if let IssueState::RegistrationRequired { username, .. } = workflow.issue().await? {
        let (Some(email), Some(password)) = (args.email, args.user_password) else {
            println!("User {} is not registered; pass --email and --user-password to register", username);
            return Ok(());
        };
        let user = NewUser {
            username: username.clone(),
            email,
            password,
            has_issued: false,
        };
        workflow.register(user).await?;
    }

    if let IssueState::Done { record } = workflow.state() {
        println!(
            "Issue {}: book {} to user {} ({})",
            record.id, record.book_id, record.user_id, record.issue_status
        );
    }
    Ok(())
}

fn print_books(books: &[Book]) {
    if books.is_empty() {
        println!("No books found");
        return;
    }
    for book in books {
        println!(
            "{:>4}  {:<32} {:<24} {:<20} {:<14} {:>3}",
            book.id, book.title, book.author, book.publisher, book.category, book.copies
        );
    }
}

fn print_issues<'a>(records: impl Iterator<Item = &'a BookIssueDetails>) {
    let mut empty = true;
    for record in records {
        empty = false;
        let time = record
            .issue_time
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        println!(
            "{:>4}  {:<32} {:<20} {:<9} {}",
            record.id, record.bookname, record.username, record.issue_status, time
        );
    }
    if empty {
        println!("No issue records");
    }
}

fn print_ledger_outcome(issue_id: i32, outcome: LedgerOutcome) {
    match outcome {
        LedgerOutcome::Updated(records) => print_issues(records.iter()),
        LedgerOutcome::Ignored(status) => println!("Issue {} is {}, nothing to do", issue_id, status),
    }
}
