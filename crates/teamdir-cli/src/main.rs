//! teamdir - command line client for the team member directory.
//!
//! Sign in once, then list, add, edit and delete team members. The session
//! survives restarts; expired access tokens are refreshed automatically.

mod output;

use std::io::{self, Write};

use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use teamdir_core::{Action, ApiError, Config, MemberRole, NewTeamMember, Session, ValidationErrors};

#[derive(Parser)]
#[command(name = "teamdir", version, about = "Manage your team member directory")]
struct Cli {
    /// Directory service base URL (overrides the config file)
    #[arg(long, global = true, env = "TEAMDIR_API_URL")]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Check the stored session with the server
    Status,
    /// Show the signed-in user without contacting the server
    Whoami,
    /// List team members
    List,
    /// Show one team member
    Show { id: i64 },
    /// Add a team member
    Add(MemberArgs),
    /// Edit a team member; omitted fields keep their value
    Edit {
        id: i64,
        #[command(flatten)]
        changes: MemberChanges,
    },
    /// Delete a team member
    Delete { id: i64 },
}

#[derive(Args)]
struct MemberArgs {
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    phone: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "regular")]
    role: MemberRole,
}

#[derive(Args)]
struct MemberChanges {
    #[arg(long)]
    first_name: Option<String>,
    #[arg(long)]
    last_name: Option<String>,
    #[arg(long)]
    phone: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    role: Option<MemberRole>,
}

impl From<MemberArgs> for NewTeamMember {
    fn from(args: MemberArgs) -> Self {
        NewTeamMember {
            first_name: args.first_name,
            last_name: args.last_name,
            phone_number: args.phone,
            email: args.email,
            role: args.role,
        }
    }
}

impl MemberChanges {
    fn apply(self, member: &mut NewTeamMember) {
        if let Some(v) = self.first_name {
            member.first_name = v;
        }
        if let Some(v) = self.last_name {
            member.last_name = v;
        }
        if let Some(v) = self.phone {
            member.phone_number = v;
        }
        if let Some(v) = self.email {
            member.email = v;
        }
        if let Some(v) = self.role {
            member.role = v;
        }
    }
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr, and additionally to a daily rolling file when
/// `log_dir` is configured. The returned guard must live until exit.
fn init_tracing(config: &Config) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match config.log_dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, "teamdir.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Warning: {:#}, using defaults", e);
            Config::default()
        }
    };
    if let Some(url) = cli.api_url.clone() {
        config.api_url = Some(url);
    }

    let _guard = init_tracing(&config);

    if let Err(e) = run(cli.command, config).await {
        report(&e);
        std::process::exit(1);
    }
}

/// Print an error the way a user needs to see it
fn report(err: &anyhow::Error) {
    eprintln!("{}", user_message(err));
}

fn user_message(err: &anyhow::Error) -> String {
    if let Some(validation) = err.downcast_ref::<ValidationErrors>() {
        let mut message = String::from("Please fix the following:");
        for field in &validation.errors {
            message.push_str(&format!("\n  {}: {}", field.field, field.message));
        }
        message
    } else if ApiError::is_invalid_credentials(err) {
        "Invalid username or password".to_string()
    } else if ApiError::is_unauthorized(err) {
        "Your session has expired. Run `teamdir login` to sign in again.".to_string()
    } else if ApiError::is_network(err) {
        "Unable to connect to server. Check your internet connection.".to_string()
    } else {
        format!("Error: {:#}", err)
    }
}

async fn run(command: Command, mut config: Config) -> Result<()> {
    let mut session = config.session()?;
    session.restore();

    match command {
        Command::Login { username } => {
            let username = match username {
                Some(u) => u,
                None => prompt_username(config.last_username.as_deref())?,
            };
            let password = rpassword::prompt_password("Password: ")?;

            let user = session.sign_in(&username, &password).await?;
            println!("Signed in as {} ({})", user.display_name(), user.effective_role().display_name());

            config.last_username = Some(username);
            if let Err(e) = config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
        Command::Logout => {
            session.sign_out()?;
            println!("Signed out");
        }
        Command::Status => {
            if session.check_status().await {
                if let Some(user) = session.user() {
                    println!("Signed in as {} ({})", user.username, user.effective_role());
                }
            } else {
                println!("Not signed in");
            }
        }
        Command::Whoami => match session.user() {
            Some(user) => println!("{}", output::user_summary(user)),
            None => println!("Not signed in"),
        },
        Command::List => {
            require(&session, Action::ViewMembers)?;
            let members = session.team_members().await?;
            print!("{}", output::member_table(&members));
        }
        Command::Show { id } => {
            require(&session, Action::ViewMembers)?;
            let member = session.team_member(id).await?;
            println!("{}", output::member_detail(&member));
        }
        Command::Add(args) => {
            require(&session, Action::AddMember)?;
            let draft = NewTeamMember::from(args);
            if draft.role == MemberRole::Admin {
                require(&session, Action::ChangeRole)?;
            }
            let member = session.add_team_member(&draft).await?;
            info!(id = member.id, "Team member added");
            println!("Added {} (#{})", member.full_name(), member.id);
        }
        Command::Edit { id, changes } => {
            require(&session, Action::EditMember)?;
            let current = session.team_member(id).await?;
            let mut draft = current.to_draft();
            changes.apply(&mut draft);
            if draft.role != current.role {
                require(&session, Action::ChangeRole)?;
            }
            let member = session.update_team_member(id, &draft).await?;
            println!("Updated {} (#{})", member.full_name(), member.id);
        }
        Command::Delete { id } => {
            require(&session, Action::DeleteMember)?;
            session.delete_team_member(id).await?;
            println!("Deleted team member #{}", id);
        }
    }

    Ok(())
}

/// Fail unless the signed-in user may perform `action`
fn require(session: &Session, action: Action) -> Result<()> {
    if session.user().is_none() {
        bail!("Not signed in. Run `teamdir login` first.");
    }
    if !session.can(action) {
        bail!("Your role does not allow this action");
    }
    Ok(())
}

fn prompt_username(last: Option<&str>) -> Result<String> {
    match last {
        Some(last) => print!("Username [{}]: ", last),
        None => print!("Username: "),
    }
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();

    Ok(match (input.is_empty(), last) {
        (true, Some(last)) => last.to_string(),
        _ => input.to_string(),
    })
}
