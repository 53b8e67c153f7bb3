// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Relatorio command-line client
//!
//! Logs in to the RelatórioIA API, generates reports from spreadsheets and
//! administers user accounts.

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use dialoguer::{Confirm, Input, Password};
use relatorio::{
    config::Config,
    error::ClientError,
    forms::{ChangePasswordForm, LoginForm, UserForm},
    models::{User, UserUpdate},
    routes::{self, SessionState},
    services::users::empty_notice,
    storage::FileStore,
    AppState,
};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "relatorio")]
#[command(about = "RelatórioIA reports and user administration", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// API root (overrides RELATORIO_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    /// Verbosity level (can be repeated)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session
    Login {
        #[arg(long, env = "RELATORIO_EMAIL")]
        email: Option<String>,
        #[arg(long, env = "RELATORIO_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Create an account and log in
    Register {
        #[command(flatten)]
        account: AccountArgs,
    },

    /// End the session
    Logout,

    /// Show the stored session
    Status,

    /// Show where a page route leads for the current session
    Route {
        #[arg(value_name = "PATH")]
        path: String,
    },

    /// Your own profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Administer user accounts
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },

    /// Generate reports from spreadsheets
    Report {
        #[command(subcommand)]
        command: ReportCommand,
    },
}

#[derive(clap::Args)]
struct AccountArgs {
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long, env = "RELATORIO_NEW_PASSWORD", hide_env_values = true)]
    password: Option<String>,
    #[arg(long, env = "RELATORIO_NEW_PASSWORD_CONFIRM", hide_env_values = true)]
    password_confirm: Option<String>,
}

#[derive(Subcommand)]
enum ProfileCommand {
    /// Fetch the profile from the server
    Show,
    /// Change profile fields
    Update {
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },
    /// Change your password
    ChangePassword {
        #[arg(long, env = "RELATORIO_PASSWORD", hide_env_values = true)]
        old_password: Option<String>,
        #[arg(long, env = "RELATORIO_NEW_PASSWORD", hide_env_values = true)]
        new_password: Option<String>,
        #[arg(long, env = "RELATORIO_NEW_PASSWORD_CONFIRM", hide_env_values = true)]
        new_password_confirm: Option<String>,
    },
}

#[derive(Subcommand)]
enum UsersCommand {
    /// List active users
    List {
        /// Only users whose name, email or username contains this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one user
    Show { id: u64 },
    /// Create a user
    Create {
        #[command(flatten)]
        account: AccountArgs,
    },
    /// Edit a user; omitted fields keep their value
    Update {
        id: u64,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        /// New password (requires --password-confirm)
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        password_confirm: Option<String>,
    },
    /// Delete (deactivate) a user
    Delete {
        id: u64,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Download the user spreadsheet
    Report {
        /// File or directory to write to
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ReportCommand {
    /// Upload a CSV/XLSX/XLS spreadsheet and save the generated report
    Generate {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.log_json, cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", "✗".red().bold(), describe(&err));
            if err
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_session_error)
            {
                eprintln!("  Run `relatorio login` to start a new session.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(url) = cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }
    tracing::debug!(api = %config.api_base_url, session = %config.session_file.display(), "Configuration loaded");

    let store = FileStore::open(&config.session_file)?;
    let state = AppState::new(config, Arc::new(store))?;

    match cli.command {
        Commands::Login { email, password } => {
            let form = LoginForm {
                email: value_or_prompt(email, "Email")?,
                password: secret_or_prompt(password, "Password")?,
            };
            let user = state.auth.login(form).await.context("Login failed")?;
            success("Login successful!", Some(&format!("Hello, {}", user.display_name())));
        }

        Commands::Register { account } => {
            let form = account.into_form()?;
            let user = state
                .auth
                .register(form)
                .await
                .context("Could not create the account")?;
            success(
                "Account created successfully!",
                Some(&format!("Logged in as {}", user.email)),
            );
        }

        Commands::Logout => {
            state.auth.logout().await;
            success("Logged out", None);
        }

        Commands::Status => print_status(&state),

        Commands::Route { path } => {
            let outcome = routes::resolve(&path, state.auth.session_state());
            println!("{} → {}", path, outcome);
        }

        Commands::Profile { command } => run_profile(&state, command).await?,
        Commands::Users { command } => run_users(&state, command).await?,

        Commands::Report {
            command: ReportCommand::Generate { file, output_dir },
        } => {
            let candidate = state.reports.select(&file).await.context("Invalid file")?;
            success(
                "File loaded!",
                Some(&format!("{} ({})", candidate.filename, candidate.size_kb())),
            );
            println!("Generating report...");
            let saved = state
                .reports
                .generate(&candidate, &output_dir)
                .await
                .context("Error generating report")?;
            success("Report generated!", Some(&saved.display().to_string()));
        }
    }

    Ok(())
}

async fn run_profile(state: &AppState, command: ProfileCommand) -> anyhow::Result<()> {
    match command {
        ProfileCommand::Show => {
            let user = state.auth.load_profile().await.context("Error loading profile")?;
            print_user(&user);
        }
        ProfileCommand::Update {
            email,
            username,
            first_name,
            last_name,
        } => {
            let update = UserUpdate {
                email,
                username,
                first_name,
                last_name,
                ..Default::default()
            };
            let user = state
                .auth
                .update_profile(update)
                .await
                .context("Error updating profile")?;
            success("Profile updated successfully!", None);
            print_user(&user);
        }
        ProfileCommand::ChangePassword {
            old_password,
            new_password,
            new_password_confirm,
        } => {
            let form = ChangePasswordForm {
                old_password: secret_or_prompt(old_password, "Current password")?,
                new_password: secret_or_prompt(new_password, "New password")?,
                new_password_confirm: secret_or_prompt(
                    new_password_confirm,
                    "Confirm new password",
                )?,
            };
            let message = state
                .auth
                .change_password(form)
                .await
                .context("Error changing password")?;
            success(&message, None);
        }
    }
    Ok(())
}

async fn run_users(state: &AppState, command: UsersCommand) -> anyhow::Result<()> {
    match command {
        UsersCommand::List { search } => {
            let term = search.unwrap_or_default();
            let users = state
                .users
                .search(&term)
                .await
                .context("Error loading users")?;
            if users.is_empty() {
                println!("{}", empty_notice(&term).dimmed());
            }
            for user in &users {
                print_user_row(user);
            }
        }

        UsersCommand::Show { id } => {
            let user = state.users.get(id).await.context("Error loading user")?;
            print_user(&user);
        }

        UsersCommand::Create { account } => {
            let form = account.into_form()?;
            let user = state.users.submit(form, None).await.context("Error")?;
            success("User created successfully!", None);
            print_user_row(&user);
        }

        UsersCommand::Update {
            id,
            email,
            username,
            first_name,
            last_name,
            password,
            password_confirm,
        } => {
            let mut form = state.users.edit_form(id).await.context("Error loading user")?;
            let overrides = [
                (&mut form.email, email),
                (&mut form.username, username),
                (&mut form.first_name, first_name),
                (&mut form.last_name, last_name),
                (&mut form.password, password),
                (&mut form.password_confirm, password_confirm),
            ];
            for (field, value) in overrides {
                if let Some(value) = value {
                    *field = value;
                }
            }

            let user = state.users.submit(form, Some(id)).await.context("Error")?;
            success("User updated successfully!", None);
            print_user_row(&user);
        }

        UsersCommand::Delete { id, yes } => {
            if !yes && !confirm("Are you sure you want to delete this user?")? {
                println!("Cancelled");
                return Ok(());
            }
            state
                .users
                .delete(id)
                .await
                .context("Error deleting user")?;
            success("User deleted successfully!", None);
        }

        UsersCommand::Report { output } => {
            let saved = state
                .users
                .download_report(output.as_deref())
                .await
                .context("Error downloading report")?;
            success(
                "User report downloaded successfully!",
                Some(&saved.display().to_string()),
            );
        }
    }
    Ok(())
}

impl AccountArgs {
    fn into_form(self) -> anyhow::Result<UserForm> {
        Ok(UserForm {
            first_name: value_or_prompt(self.first_name, "First name")?,
            last_name: value_or_prompt(self.last_name, "Last name")?,
            username: value_or_prompt(self.username, "Username")?,
            email: value_or_prompt(self.email, "Email")?,
            password: secret_or_prompt(self.password, "Password")?,
            password_confirm: secret_or_prompt(self.password_confirm, "Confirm password")?,
        })
    }
}

fn print_status(state: &AppState) {
    let info = state.auth.session_info();
    let label = match info.state {
        SessionState::Authenticated => "logged in".green(),
        SessionState::Anonymous => "not logged in".yellow(),
        SessionState::Loading => "loading".normal(),
    };
    println!("API:      {}", state.config.api_base_url);
    println!("Session:  {}", label);

    if let Some(user) = &info.user {
        println!("User:     {} <{}>", user.display_name(), user.email);
    }

    let now = chrono::Utc::now();
    for (name, claims) in [("Access", &info.access), ("Refresh", &info.refresh)] {
        if let Some(expires) = claims.as_ref().and_then(|c| c.expires_at()) {
            let note = if expires <= now {
                "expired".red()
            } else {
                "valid".green()
            };
            println!("{:<9} expires {} ({})", format!("{}:", name), expires.to_rfc3339(), note);
        }
    }
}

fn print_user(user: &User) {
    println!("ID:        {}", user.id);
    println!("Name:      {}", user.display_name());
    println!("Username:  {}", user.username);
    println!("Email:     {}", user.email);
    println!("Joined:    {}", user.date_joined.format("%d/%m/%Y %H:%M"));
    println!("Status:    {}", active_label(user));
}

fn print_user_row(user: &User) {
    println!(
        "{:>5}  {:<2}  {:<28} {:<32} {}",
        user.id,
        user.initials().bold(),
        user.display_name(),
        user.email,
        active_label(user)
    );
}

fn active_label(user: &User) -> colored::ColoredString {
    if user.is_active {
        "Active".green()
    } else {
        "Inactive".dimmed()
    }
}

fn success(title: &str, description: Option<&str>) {
    println!("{} {}", "✓".green().bold(), title);
    if let Some(description) = description {
        println!("  {}", description.dimmed());
    }
}

fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        // Context wrappers display only their own text.
        Some(client) if err.to_string() != client.to_string() => {
            format!("{}: {}", err, client.user_message())
        }
        Some(client) => client.user_message(),
        None => format!("{:#}", err),
    }
}

fn value_or_prompt(value: Option<String>, label: &str) -> anyhow::Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Input::<String>::new().with_prompt(label).interact_text()?),
    }
}

/// Like [`value_or_prompt`], without echoing what is typed.
fn secret_or_prompt(value: Option<String>, label: &str) -> anyhow::Result<String> {
    match value {
        Some(v) => Ok(v),
        None => Ok(Password::new().with_prompt(label).interact()?),
    }
}

fn confirm(question: &str) -> anyhow::Result<bool> {
    Ok(Confirm::new()
        .with_prompt(question)
        .default(false)
        .interact()?)
}

/// Initialize logging on stderr; JSON when requested.
fn init_logging(json: bool, verbose: u8) {
    let default_level = match verbose {
        0 => "relatorio=warn",
        1 => "relatorio=info",
        _ => "relatorio=debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true)
            .with_writer(io::stderr)
    });
    let text_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(io::stderr)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}
