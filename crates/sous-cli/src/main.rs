//! sous - terminal client for the cooking assistant

mod catalog;
mod commands;
mod config;
mod credentials;
mod render;

use clap::{Parser, Subcommand};
use sous_ai::{ApiClient, Credential, CredentialSource, CredentialStore, RecipeQuery};
use sous_chat::{ChatEvent, HttpTransport, Message, MessageStatus, SessionController};
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::sync::broadcast;

const GREETING: &str = "你好！我是你的AI烹饪助手，有什么想做的菜吗？";

/// sous - ask the cooking assistant from your terminal
#[derive(Parser, Debug)]
#[command(name = "sous")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend URL (overrides server_url from the config file)
    #[arg(long, global = true)]
    server: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Chat interactively (default)
    Chat,
    /// Ask a single question and print the answer
    Ask {
        /// The question
        #[arg(required = true)]
        question: Vec<String>,
        /// Wait for the whole answer instead of streaming it
        #[arg(long)]
        no_stream: bool,
    },
    /// Log in and store the credential
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Forget the stored credential
    Logout,
    /// Show backend counters
    Stats,
    /// List recipes
    Recipes {
        #[arg(short, long)]
        category: Option<String>,
        #[arg(short, long)]
        search: Option<String>,
        /// Only favorites
        #[arg(short, long)]
        favorites: bool,
    },
    /// Show one recipe
    Recipe { id: String },
    /// Mark a recipe as favorite
    Favorite {
        id: String,
        /// Remove the mark instead
        #[arg(long)]
        off: bool,
    },
    /// Initialize config file
    InitConfig,
}

/// Everything a command needs to talk to the backend
struct Context {
    config: config::Config,
    client: ApiClient,
    credentials: CredentialStore,
}

impl Context {
    fn new(config: config::Config) -> anyhow::Result<Self> {
        let client = ApiClient::new(config.server_url.clone())?;
        let credentials =
            CredentialStore::new(credentials::load().map(|stored| stored.access_token));
        Ok(Self {
            config,
            client,
            credentials,
        })
    }

    fn credential(&self) -> Option<Credential> {
        self.credentials.current()
    }

    fn session(&self) -> SessionController {
        let transport = HttpTransport::new(self.client.clone())
            .with_credentials(Arc::new(self.credentials.clone()));
        SessionController::new(Arc::new(transport), self.config.session_config())
    }

    /// Drop the credential after the backend rejected it
    fn forget_credential(&self) {
        self.credentials.invalidate();
        if let Err(e) = credentials::remove() {
            tracing::warn!("Failed to remove stored credential: {}", e);
        }
        eprintln!("Your login has expired. Run `sous login` to log in again.");
    }

    /// Map an unauthorized backend error to a logout
    fn check<T>(&self, result: sous_ai::Result<T>) -> anyhow::Result<T> {
        if matches!(&result, Err(e) if e.is_unauthorized()) {
            self.forget_credential();
        }
        Ok(result?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Setup tracing; stderr keeps logs out of the streamed answer
    if args.verbose || std::env::var_os("RUST_LOG").is_some() {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new("sous=debug,sous_ai=debug,sous_chat=debug")
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }

    let command = args.command.unwrap_or(Command::Chat);

    // Initialize config and exit
    if let Command::InitConfig = command {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut config = config::Config::load();
    if let Some(server) = args.server {
        config.server_url = server;
    }
    let ctx = Context::new(config)?;

    match command {
        Command::Chat => run_interactive(&ctx).await,
        Command::Ask {
            question,
            no_stream,
        } => run_ask(&ctx, &question.join(" "), no_stream).await,
        Command::Login { username } => handle_login(&ctx, username).await,
        Command::Logout => handle_logout(),
        Command::Stats => {
            let stats = ctx.check(ctx.client.stats(ctx.credential().as_ref()).await)?;
            println!("{}", catalog::format_stats(&stats));
            Ok(())
        }
        Command::Recipes {
            category,
            search,
            favorites,
        } => {
            let query = RecipeQuery {
                category,
                search,
                favorites_only: favorites,
            };
            let recipes = ctx.check(ctx.client.recipes(&query, ctx.credential().as_ref()).await)?;
            println!("{}", catalog::format_recipes(&recipes));
            Ok(())
        }
        Command::Recipe { id } => {
            let recipe = ctx.check(ctx.client.recipe(&id, ctx.credential().as_ref()).await)?;
            println!("{}", catalog::format_recipe(&recipe));
            Ok(())
        }
        Command::Favorite { id, off } => {
            ctx.check(
                ctx.client
                    .set_favorite(&id, !off, ctx.credential().as_ref())
                    .await,
            )?;
            if off {
                println!("Removed recipe {} from favorites.", id);
            } else {
                println!("Added recipe {} to favorites.", id);
            }
            Ok(())
        }
        Command::InitConfig => Ok(()),
    }
}

/// Submit one question and print the answer as it is revealed
async fn exchange(ctx: &Context, session: &SessionController, input: &str) -> anyhow::Result<()> {
    let mut snapshots = session.subscribe();
    let mut events = session.events();

    let id = session.submit(input)?;
    let Some(message) = render::stream_answer(&mut snapshots, id).await? else {
        return Ok(());
    };

    if let Some(analysis) = message.analysis() {
        println!("{}", render::analysis_summary(analysis));
    }
    if message.status() == MessageStatus::Failed && saw_unauthorized(&mut events) {
        ctx.forget_credential();
    }
    Ok(())
}

fn saw_unauthorized(events: &mut broadcast::Receiver<ChatEvent>) -> bool {
    let mut unauthorized = false;
    loop {
        match events.try_recv() {
            Ok(ChatEvent::Unauthorized) => unauthorized = true,
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => {}
            Err(_) => return unauthorized,
        }
    }
}

async fn run_ask(ctx: &Context, question: &str, no_stream: bool) -> anyhow::Result<()> {
    if no_stream {
        let answer = ctx.check(ctx.client.ask(question, ctx.credential().as_ref()).await)?;
        println!("{}", answer.answer);
        if let Some(analysis) = answer.analysis() {
            println!("{}", render::analysis_summary(&analysis));
        }
        return Ok(());
    }

    let session = ctx.session();
    exchange(ctx, &session, question).await
}

async fn run_interactive(ctx: &Context) -> anyhow::Result<()> {
    let session = ctx.session();
    session.restore(vec![Message::assistant(GREETING)])?;

    // Show minimal startup info (only if TTY)
    if io::stderr().is_terminal() {
        eprintln!("sous ({})", ctx.client.base_url());
        if !ctx.credentials.is_set() {
            eprintln!("Not logged in; run `sous login` if the server requires it.");
        }
        eprintln!();
    }
    println!("{}\n", GREETING);

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(result) = commands::execute_command(input, &session.snapshot()) {
            match result {
                commands::CommandResult::Clear => {
                    session.reset();
                    session.restore(vec![Message::assistant(GREETING)])?;
                    println!("Cleared conversation.");
                }
                commands::CommandResult::Exit => break,
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
            }
            println!();
            continue;
        }

        println!();
        if let Err(e) = exchange(ctx, &session, input).await {
            eprintln!("Error: {}", e);
        }
        println!();
    }

    session.shutdown();
    Ok(())
}

async fn handle_login(ctx: &Context, username: Option<String>) -> anyhow::Result<()> {
    let username = match username {
        Some(username) => username,
        None => prompt("Username: ")?,
    };
    let password = read_password(PasswordInput::detect(io::stdin().is_terminal()))?;

    match ctx.client.login(&username, &password).await {
        Ok(credential) => {
            let stored = credentials::StoredCredential::new(credential, Some(username.clone()));
            credentials::save(&stored)?;
            println!("Logged in as {}.", username);
            println!(
                "Credential saved to {}",
                credentials::credentials_file().display()
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Login failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn handle_logout() -> anyhow::Result<()> {
    if credentials::remove()? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

/// How the login password is collected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PasswordInput {
    /// Typed at a terminal without echo
    Hidden,
    /// Piped in on stdin
    Piped,
}

impl PasswordInput {
    fn detect(stdin_is_terminal: bool) -> Self {
        if stdin_is_terminal {
            Self::Hidden
        } else {
            Self::Piped
        }
    }
}

fn read_password(input: PasswordInput) -> anyhow::Result<String> {
    match input {
        PasswordInput::Hidden => Ok(dialoguer::Password::new()
            .with_prompt("Password")
            .interact()?),
        PasswordInput::Piped => Ok(prompt("Password: ")?),
    }
}

fn prompt(label: &str) -> io::Result<String> {
    eprint!("{}", label);
    io::stderr().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}
