//! Command-line surface for the tasksync client.
//!
//! Wires the headless client core together the way a UI shell would: a file
//! backed credential store, the authenticated transport, the session manager,
//! the task store subscribed to the invalidation channel, and the chat
//! orchestrator emitting on it.

mod config;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tasksync_chat::{ChatOrchestrator, mentions_task_mutation};
use tasksync_core::events::InvalidationChannel;
use tasksync_core::{InMemoryNavigator, Role, Route, Task};
use tasksync_credentials::FileCredentialStore;
use tasksync_session::SessionManager;
use tasksync_store::{TaskStore, TaskUpdate};
use tasksync_transport::ApiClient;

use crate::config::Config;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Server URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with an email address
    Login { email: String },
    /// Create an account and log in
    Signup {
        email: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
    },
    /// Sign out and clear stored credentials
    Logout,
    /// Show the current session
    Whoami,
    /// Manage the task list
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Send one message to the assistant
    Chat {
        /// Message text
        message: Vec<String>,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// Fetch and print the task list
    List,
    /// Create a task
    Add {
        title: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Mark a task complete
    Done { id: i64 },
    /// Mark a task incomplete
    Undone { id: i64 },
    /// Update a task's title or description
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a task
    Rm { id: i64 },
}

struct App {
    session: Arc<SessionManager>,
    store: Arc<TaskStore>,
    chat: ChatOrchestrator,
}

impl App {
    fn build(server_url: &str) -> Result<Self> {
        let credentials = Arc::new(FileCredentialStore::new(Config::credentials_dir()?));
        let navigator = Arc::new(InMemoryNavigator::new(Route::Landing));
        let api = Arc::new(
            ApiClient::new(server_url, credentials.clone(), navigator.clone())
                .context("Invalid server URL")?,
        );
        let session = Arc::new(SessionManager::new(api.clone(), credentials, navigator));
        let channel = Arc::new(InvalidationChannel::new());

        let store = Arc::new(TaskStore::new(api.clone(), session.clone()));
        store.subscribe_invalidations(&channel);

        let chat = ChatOrchestrator::new(api, session.clone(), channel);

        Ok(Self {
            session,
            store,
            chat,
        })
    }

    async fn require_auth(&self) -> Result<()> {
        if !self.session.is_authenticated().await {
            bail!("Not logged in. Run `tasksync login <email>` first.");
        }
        Ok(())
    }

    async fn print_tasks(&self) -> Result<()> {
        if self.store.refresh().await.is_err() {
            let reason = self
                .store
                .last_error()
                .await
                .unwrap_or_else(|| "unknown error".to_string());
            bail!("Failed to fetch tasks: {reason}");
        }
        let tasks = self.store.tasks().await;
        if tasks.is_empty() {
            println!("No tasks yet.");
        }
        for task in tasks {
            print_task(&task);
        }
        Ok(())
    }
}

fn print_task(task: &Task) {
    let marker = if task.completed { "x" } else { " " };
    match &task.description {
        Some(description) => println!("[{marker}] {:>4}  {}  — {}", task.id, task.title, description),
        None => println!("[{marker}] {:>4}  {}", task.id, task.title),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let server_url = cli.server.unwrap_or(config.server_url);

    let app = App::build(&server_url)?;
    app.session.initialize().await;

    match cli.command {
        Commands::Login { email } => {
            let password =
                rpassword::prompt_password("Password: ").context("Failed to read password")?;
            match app.session.login(&email, &password).await {
                Ok(user) => {
                    println!("✓ Logged in as {}", user.email);
                    app.print_tasks().await?;
                }
                Err(err) => bail!("Login failed: {err}"),
            }
        }
        Commands::Signup { email, name } => {
            let password =
                rpassword::prompt_password("Password: ").context("Failed to read password")?;
            let confirm = rpassword::prompt_password("Confirm password: ")
                .context("Failed to read password confirmation")?;
            if password != confirm {
                bail!("Passwords do not match");
            }
            match app.session.signup(&email, &password, name.as_deref()).await {
                Ok(user) => {
                    println!("✓ Account created, logged in as {}", user.email);
                    app.print_tasks().await?;
                }
                Err(err) => bail!("Signup failed: {err}"),
            }
        }
        Commands::Logout => {
            app.session.logout().await;
            println!("✓ Logged out");
        }
        Commands::Whoami => match app.session.current_user().await {
            Some(user) => {
                let name = user.name.as_deref().unwrap_or("—");
                println!("{} ({})", user.email, name);
            }
            None => println!("Not logged in."),
        },
        Commands::Tasks { command } => {
            app.require_auth().await?;
            match command {
                TaskCommands::List => app.print_tasks().await?,
                TaskCommands::Add { title, description } => {
                    match app.store.create(&title, description.as_deref()).await {
                        Ok(task) => {
                            println!("✓ Created:");
                            print_task(&task);
                        }
                        Err(err) => bail!("Failed to create task: {err}"),
                    }
                }
                TaskCommands::Done { id } => {
                    if let Err(err) = app.store.toggle_complete(id, true).await {
                        bail!("Failed to complete task {id}: {err}");
                    }
                    println!("✓ Task {id} completed");
                }
                TaskCommands::Undone { id } => {
                    if let Err(err) = app.store.toggle_complete(id, false).await {
                        bail!("Failed to reopen task {id}: {err}");
                    }
                    println!("✓ Task {id} reopened");
                }
                TaskCommands::Edit {
                    id,
                    title,
                    description,
                } => {
                    if title.is_none() && description.is_none() {
                        bail!("Nothing to update: pass --title and/or --description");
                    }
                    let fields = TaskUpdate {
                        title,
                        description,
                        ..Default::default()
                    };
                    match app.store.update(id, fields).await {
                        Ok(task) => {
                            println!("✓ Updated:");
                            print_task(&task);
                        }
                        Err(err) => bail!("Failed to update task {id}: {err}"),
                    }
                }
                TaskCommands::Rm { id } => {
                    if let Err(err) = app.store.delete(id).await {
                        bail!("Failed to delete task {id}: {err}");
                    }
                    println!("✓ Task {id} deleted");
                }
            }
        }
        Commands::Chat { message } => {
            let text = message.join(" ");
            app.chat.send_message(&text).await;

            let messages = app.chat.messages().await;
            let Some(reply) = messages.iter().rev().find(|m| m.role == Role::Assistant) else {
                bail!("Empty message, nothing sent");
            };
            println!("assistant: {}", reply.content);

            if mentions_task_mutation(&reply.content) {
                // Give the invalidation-triggered refresh a moment to land.
                tokio::time::sleep(std::time::Duration::from_millis(250)).await;
                println!();
                app.print_tasks().await?;
            }
        }
    }

    Ok(())
}
