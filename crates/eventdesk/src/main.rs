mod config;
mod render;
mod storage;
mod tui;

use anyhow::{anyhow, bail, Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use config::{Config, Context};
use std::io::{self, BufRead, Write};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use eventdesk_core::config::EnvSettings;
use eventdesk_core::models::{EventDraft, NewUser};
use eventdesk_core::result_ext::{EventLookupExt, ResultExt};
use eventdesk_core::{
    ApiConfig, AuthMachine, AuthState, Credential, Dashboard, Error, EventApi, FileStorage, Role, RsvpBoard,
    Router, TokenStore, View,
};

#[derive(Parser)]
#[command(name = "eventdesk")]
#[command(version, about = "EventDesk - manage events from the terminal", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API root URL (overrides context and EVENTDESK_API_URL)
    #[arg(long, global = true)]
    server_url: Option<String>,

    /// Emit JSON instead of tables
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and keep the credential for this terminal session
    /// Examples:
    ///     eventdesk login -u mo
    ///     eventdesk login -u mo -p secret
    #[command(verbatim_doc_comment)]
    Login {
        /// Username (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Show the dashboard for your role
    Dashboard {
        /// Interactive mode (TUI)
        #[arg(short, long)]
        interactive: bool,
    },
    /// Manage events
    Events {
        #[command(subcommand)]
        command: EventCommand,
    },
    /// Manage users (admin)
    Users {
        #[command(subcommand)]
        command: UserCommand,
    },
    /// Manage API contexts
    Context {
        #[command(subcommand)]
        command: ContextCommand,
    },
}

#[derive(Subcommand)]
enum EventCommand {
    /// List events visible to you
    List,
    /// Create an event
    /// Example:
    ///     eventdesk events create --title Standup --start 2024-01-01T09:00 --end 2024-01-01T09:30
    #[command(verbatim_doc_comment)]
    Create {
        #[arg(long)]
        title: String,
        /// Start time, e.g. 2024-01-01T09:00 (UTC unless an offset is given)
        #[arg(long)]
        start: String,
        /// End time
        #[arg(long)]
        end: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        location: String,
        /// Create the event as private
        #[arg(long)]
        private: bool,
    },
    /// Update fields of an event
    Update {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        start: Option<String>,
        #[arg(long)]
        end: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        location: Option<String>,
        /// Set visibility: true for public, false for private
        #[arg(long)]
        public: Option<bool>,
    },
    /// Delete an event
    Delete { id: i64 },
    /// Flip an event between public and private
    Toggle { id: i64 },
    /// RSVP to an event
    Rsvp { id: i64 },
    /// Withdraw an RSVP
    CancelRsvp { id: i64 },
}

#[derive(Subcommand)]
enum UserCommand {
    /// List users
    List,
    /// Create a user
    Create {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Role: user, manager or admin
        #[arg(long, default_value = "user")]
        role: String,
    },
    /// Delete a user
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum ContextCommand {
    /// Add a new context
    /// Examples:
    ///     eventdesk context add local --url=http://127.0.0.1:8000/api
    ///     eventdesk context add prod --url=https://events.example.com/api --set-current
    #[command(verbatim_doc_comment)]
    Add {
        /// Context name
        name: String,
        /// API root URL
        #[arg(long)]
        url: String,
        /// Request timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Set as current context
        #[arg(long)]
        set_current: bool,
    },
    /// List all configured contexts
    List,
    /// Switch to a different context
    Use { name: String },
    /// Show current active context
    Current,
    /// Delete a context
    Delete { name: String },
}

type Auth = AuthMachine<FileStorage>;

const DEFAULT_LOG_FILTER: &str = "warn,eventdesk=info,eventdesk_core=info";

fn log_filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into())
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so a RUST_LOG set there reaches the filter
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(log_filter())
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = Config::load()?;

    if let Commands::Context { command } = cli.command {
        return handle_context_command(&mut config, command);
    }

    let api_config = config.api_config(cli.server_url.as_deref(), &EnvSettings::read())?;
    tracing::debug!(base_url = %api_config.base_url, "Resolved API");

    let mut auth = AuthMachine::with_system_clock(TokenStore::new(storage::session_storage()?));
    auth.restore();

    let api = EventApi::new(&api_config);
    let json = cli.json;
    let needs_session = matches!(
        cli.command,
        Commands::Dashboard { .. } | Commands::Events { .. } | Commands::Users { .. }
    );

    let result = match cli.command {
        Commands::Login { username, password } => login(&mut auth, &api, username, password).await,
        Commands::Logout => {
            auth.logout()?;
            println!("Logged out.");
            Ok(())
        }
        Commands::Whoami => match auth.state() {
            AuthState::Authenticated(session) => render::print_session(&session, json),
            _ => {
                println!("Not logged in.");
                Ok(())
            }
        },
        Commands::Register {
            username,
            email,
            password,
        } => {
            let user = NewUser {
                username,
                email,
                password: password_or_prompt(password)?,
                role: Role::User,
            };
            api.register(&user).await?;
            println!("Registration successful! You can now login.");
            Ok(())
        }
        Commands::Dashboard { interactive } => dashboard(&auth, &api, interactive, json).await,
        Commands::Events { command } => {
            let api = authorized(&auth, api)?;
            handle_event_command(&api, command, json).await
        }
        Commands::Users { command } => {
            let api = authorized(&auth, api)?;
            handle_user_command(&api, command, json).await
        }
        Commands::Context { command } => handle_context_command(&mut config, command),
    };

    // The server decides whether the session is still good; point at login
    if let (true, Err(e)) = (needs_session, &result) {
        if let Some(Error::Network { status: Some(401), .. }) = e.downcast_ref::<Error>() {
            bail!("{}\nYour session may have expired. Run 'eventdesk login' to sign in again.", e);
        }
    }
    result
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn password_or_prompt(password: Option<String>) -> Result<String> {
    match password {
        Some(p) => Ok(p),
        None => rpassword::read_password_from_tty(Some("Password: ")).context("Failed to read password"),
    }
}

async fn login(auth: &mut Auth, api: &EventApi, username: Option<String>, password: Option<String>) -> Result<()> {
    let username = match username {
        Some(u) => u,
        None => prompt("Username: ")?,
    };
    let password = password_or_prompt(password)?;

    let pair = api.obtain_token(&username, &password).await?;
    let session = auth.login(Credential::new(pair.access))?;
    println!("Logged in as {} ({}).", session.username, session.role);
    Ok(())
}

/// Client carrying the stored credential, or an error when signed out.
fn authorized(auth: &Auth, api: EventApi) -> Result<EventApi> {
    match auth.credential()? {
        Some(credential) => Ok(api.with_credential(Some(credential))),
        None => Err(anyhow!("Not logged in. Run 'eventdesk login' first.")),
    }
}

async fn dashboard(auth: &Auth, api: &EventApi, interactive: bool, json: bool) -> Result<()> {
    let (kind, session) = match Router::resolve("/dashboard", &auth.state()) {
        View::Dashboard { kind, session } => (kind, session),
        _ => bail!("Not logged in. Run 'eventdesk login' first."),
    };
    let api = authorized(auth, api.clone())?;
    let dashboard = Dashboard::load(kind, &api).await.log("loading dashboard")?;

    if interactive {
        return tui::run_tui(api, session, dashboard).await;
    }

    if json {
        return render::print_json(&serde_json::json!({
            "kind": kind.title(),
            "events": dashboard.events,
            "users": dashboard.users,
        }));
    }

    println!("{}", kind.title());
    println!("Welcome, {}!", session.username);
    println!();
    render::print_events(&dashboard.events, false)?;
    if kind.can_manage_users() {
        println!();
        render::print_users(&dashboard.users, false)?;
    }
    Ok(())
}

async fn handle_event_command(api: &EventApi, command: EventCommand, json: bool) -> Result<()> {
    match command {
        EventCommand::List => {
            let events = api.list_events().await?;
            render::print_events(&events, json)?;
        }
        EventCommand::Create {
            title,
            start,
            end,
            description,
            location,
            private,
        } => {
            let draft = EventDraft {
                title,
                description,
                location,
                is_public: !private,
                ..Default::default()
            }
            .with_start(&start)?
            .with_end(&end)?;
            let event = api.create_event(&draft).await?;
            if json {
                render::print_json(&event)?;
            } else {
                println!("Event created successfully! (id {})", event.id);
            }
        }
        EventCommand::Update {
            id,
            title,
            start,
            end,
            description,
            location,
            public,
        } => {
            let events = api.list_events().await?;
            let current = events
                .iter()
                .find(|e| e.id == id)
                .or_unknown_event(id)?;

            let mut draft = EventDraft::from_event(current);
            if let Some(title) = title {
                draft.title = title;
            }
            if let Some(description) = description {
                draft.description = description;
            }
            if let Some(location) = location {
                draft.location = location;
            }
            if let Some(public) = public {
                draft.is_public = public;
            }
            if let Some(start) = start {
                draft = draft.with_start(&start)?;
            }
            if let Some(end) = end {
                draft = draft.with_end(&end)?;
            }

            let event = api.update_event(id, &draft).await?;
            if json {
                render::print_json(&event)?;
            } else {
                println!("Event {} updated.", event.id);
            }
        }
        EventCommand::Delete { id } => {
            api.delete_event(id).await?;
            println!("Event {} deleted.", id);
        }
        EventCommand::Toggle { id } => {
            let is_public = api.toggle_public(id).await?;
            println!("Event {} is now {}.", id, if is_public { "public" } else { "private" });
        }
        EventCommand::Rsvp { id } => rsvp(api, id, true).await?,
        EventCommand::CancelRsvp { id } => rsvp(api, id, false).await?,
    }
    Ok(())
}

/// One-shot RSVP through the optimistic board.
async fn rsvp(api: &EventApi, id: i64, attend: bool) -> Result<()> {
    let mut board = RsvpBoard::new();
    board.track(id, !attend);
    let notice = board.toggle(id, api).await?;
    if notice.is_error() {
        bail!("{}", notice);
    }
    println!("{}", notice);
    Ok(())
}

async fn handle_user_command(api: &EventApi, command: UserCommand, json: bool) -> Result<()> {
    match command {
        UserCommand::List => {
            let users = api.list_users().await?;
            render::print_users(&users, json)?;
        }
        UserCommand::Create {
            username,
            email,
            password,
            role,
        } => {
            let user = NewUser {
                username,
                email,
                password: password_or_prompt(password)?,
                role: Role::parse(&role),
            };
            let created = api.create_user(&user).await?;
            if json {
                render::print_json(&created)?;
            } else {
                println!("User '{}' created (id {}).", created.username, created.id);
            }
        }
        UserCommand::Delete { id } => {
            api.delete_user(id).await?;
            println!("User {} deleted.", id);
        }
    }
    Ok(())
}

fn handle_context_command(config: &mut Config, command: ContextCommand) -> Result<()> {
    match command {
        ContextCommand::Add {
            name,
            url,
            timeout_secs,
            set_current,
        } => {
            // reject unusable URLs before they are saved
            ApiConfig {
                base_url: url.clone(),
                timeout_secs: timeout_secs.unwrap_or(eventdesk_core::config::DEFAULT_TIMEOUT_SECS),
            }
            .validated()?;

            config
                .contexts
                .insert(name.clone(), Context::new(url).with_timeout(timeout_secs));
            if set_current || config.current_context.is_none() {
                config.current_context = Some(name.clone());
            }
            config.save()?;
            println!("Context '{}' added.", name);
            if config.current_context.as_ref() == Some(&name) {
                println!("Context '{}' is now the current context.", name);
            }
        }
        ContextCommand::List => {
            println!("  {:<15} {:<40} {:<8}", "NAME", "SERVER URL", "TIMEOUT");
            for (name, ctx) in &config.contexts {
                let current_mark = if config.current_context.as_ref() == Some(name) {
                    "*"
                } else {
                    " "
                };
                let timeout = ctx
                    .timeout_secs
                    .map(|t| format!("{}s", t))
                    .unwrap_or_else(|| "-".to_string());
                println!("{} {:<15} {:<40} {:<8}", current_mark, name, ctx.server_url, timeout);
            }
        }
        ContextCommand::Use { name } => {
            if !config.contexts.contains_key(&name) {
                bail!("Context '{}' not found.", name);
            }
            config.current_context = Some(name.clone());
            config.save()?;
            println!("Switched to context '{}'.", name);
        }
        ContextCommand::Current => match config.get_current_context() {
            Some((name, ctx)) => println!("{} ({})", name, ctx.server_url),
            None => println!("No current context set."),
        },
        ContextCommand::Delete { name } => {
            if config.contexts.remove(&name).is_none() {
                bail!("Context '{}' not found.", name);
            }
            if config.current_context.as_ref() == Some(&name) {
                config.current_context = None;
            }
            config.save()?;
            println!("Context '{}' deleted.", name);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_event_create() {
        let cli = Cli::try_parse_from([
            "eventdesk",
            "--json",
            "events",
            "create",
            "--title",
            "Standup",
            "--start",
            "2024-01-01T09:00",
            "--end",
            "2024-01-01T09:30",
            "--private",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Commands::Events {
                command: EventCommand::Create { title, private, .. },
            } => {
                assert_eq!(title, "Standup");
                assert!(private);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_log_filter_reads_dotenv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        std::fs::write(&path, "RUST_LOG=eventdesk=trace\n").unwrap();

        std::env::remove_var("RUST_LOG");
        assert!(log_filter().to_string().contains("eventdesk_core=info"));

        dotenvy::from_path(&path).unwrap();
        let filter = log_filter().to_string();
        assert!(filter.contains("eventdesk=trace"));
        assert!(!filter.contains("eventdesk_core=info"));
        std::env::remove_var("RUST_LOG");
    }

    #[test]
    fn test_cli_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["eventdesk", "dashboard", "-i", "--server-url", "http://localhost:8000/api"])
            .unwrap();
        assert_eq!(cli.server_url.as_deref(), Some("http://localhost:8000/api"));
        assert!(matches!(cli.command, Commands::Dashboard { interactive: true }));
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["eventdesk"]).is_err());
        assert!(Cli::try_parse_from(["eventdesk", "events", "rsvp", "abc"]).is_err());
    }

    #[test]
    fn test_cli_context_add() {
        let cli = Cli::try_parse_from(["eventdesk", "context", "add", "local", "--url", "http://127.0.0.1:8000/api"])
            .unwrap();
        match cli.command {
            Commands::Context {
                command: ContextCommand::Add { name, url, set_current, .. },
            } => {
                assert_eq!(name, "local");
                assert_eq!(url, "http://127.0.0.1:8000/api");
                assert!(!set_current);
            }
            _ => panic!("unexpected command"),
        }
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
