// agent-memory/crates/agent-memory/src/main.rs

#[cfg(feature = "cli")]
mod cli {
    use agent_memory::context_engine::context_builder::format_line;
    use agent_memory::{config::MemoryConfig, telemetry, LongTermMemory, MemoryParams, Role};
    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand, ValueEnum};
    use std::path::PathBuf;

    #[derive(Parser)]
    #[command(name = "agent-memory", version, about = "Long-term conversational memory for agents")]
    struct Cli {
        /// SQLite file to use instead of the configured storage location
        #[arg(long, global = true)]
        db: Option<PathBuf>,

        #[command(subcommand)]
        command: Command,
    }

    #[derive(Clone, Copy, ValueEnum)]
    enum RoleArg {
        User,
        Assistant,
    }

    impl From<RoleArg> for Role {
        fn from(role: RoleArg) -> Self {
            match role {
                RoleArg::User => Role::User,
                RoleArg::Assistant => Role::Assistant,
            }
        }
    }

    #[derive(Subcommand)]
    enum Command {
        /// Store one conversational turn and print its id
        Add {
            #[arg(long, value_enum)]
            role: RoleArg,
            #[arg(long)]
            agent: String,
            #[arg(long)]
            session: String,
            /// JSON object attached to the entry
            #[arg(long)]
            metadata: Option<String>,
            #[arg(long, default_value_t = 0.5)]
            importance: f32,
            content: String,
        },
        /// Print the most recent turns, oldest first
        Recent {
            #[arg(long)]
            agent: String,
            #[arg(long)]
            session: Option<String>,
            #[arg(long)]
            limit: Option<usize>,
        },
        /// Print the prompt context window for a session
        Context {
            #[arg(long)]
            agent: String,
            #[arg(long)]
            session: String,
            /// Leave out turns from other sessions
            #[arg(long)]
            no_past: bool,
        },
        /// Print per-agent statistics as JSON
        Stats {
            #[arg(long)]
            agent: String,
        },
        /// Write a short demo conversation and read it back
        Demo {
            #[arg(long, default_value = "demo_agent")]
            agent: String,
        },
    }

    pub fn run() -> Result<()> {
        telemetry::init_tracing();
        let cli = Cli::parse();

        let mut config = MemoryConfig::from_env()?;
        if let Some(db) = cli.db {
            config = config.with_storage_location(db);
        }
        config.print_config();

        let memory = LongTermMemory::open(&config).with_context(|| {
            format!(
                "Failed to open memory store at {}",
                config.storage_location.display()
            )
        })?;

        match cli.command {
            Command::Add {
                role,
                agent,
                session,
                metadata,
                importance,
                content,
            } => {
                let mut params = MemoryParams::new(role.into(), &content, &agent, &session)
                    .with_importance_score(importance);
                if let Some(raw) = metadata {
                    let value = serde_json::from_str(&raw).context("--metadata is not valid JSON")?;
                    params = params.with_metadata(value);
                }
                let id = memory.add_memory(params)?;
                println!("{}", id);
            }
            Command::Recent {
                agent,
                session,
                limit,
            } => {
                for entry in memory.get_recent_memories(&agent, session.as_deref(), limit)? {
                    println!("{}", format_line(&entry));
                }
            }
            Command::Context {
                agent,
                session,
                no_past,
            } => {
                println!("{}", memory.build_context_window(&agent, &session, !no_past)?);
            }
            Command::Stats { agent } => {
                let stats = memory.get_statistics(&agent)?;
                println!("{}", serde_json::to_string_pretty(&stats)?);
            }
            Command::Demo { agent } => {
                let session = format!("session-{}", uuid::Uuid::new_v4());
                memory.add_memory(MemoryParams::new(
                    Role::User,
                    "Hello, robot!",
                    &agent,
                    &session,
                ))?;
                memory.add_memory(MemoryParams::new(
                    Role::Assistant,
                    "Hi! How can I help?",
                    &agent,
                    &session,
                ))?;

                let memories = memory.get_recent_memories(&agent, Some(&session), None)?;
                println!("Stored {} memories in {}", memories.len(), session);
                for entry in &memories {
                    println!("  {}: {}", entry.role, entry.content);
                }
                let stats = memory.get_statistics(&agent)?;
                println!("Statistics: {}", serde_json::to_string(&stats)?);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::run()
}

#[cfg(not(feature = "cli"))]
fn main() {
    println!("CLI feature not enabled. Enable with --features cli");
}
