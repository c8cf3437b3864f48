use clap::{Parser, Subcommand};

mod cli;

#[derive(Parser)]
#[command(name = "avatar-memory")]
#[command(version)]
#[command(about = "Personality memory for conversational avatars")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a .avatar-memory directory
    Init {
        /// Directory to initialize the store in
        #[arg(short, long, default_value = ".")]
        path: String,
    },

    /// Remember a fact for an avatar
    Remember {
        /// Avatar the memory belongs to
        avatar: String,

        /// Content to remember
        text: String,

        /// Channel the memory came through
        #[arg(short, long, default_value = "user_saved",
              value_parser = ["user_saved", "trainer_added", "voice_input", "conversation_extract"])]
        source: String,

        /// Trust class (defaults from the source)
        #[arg(short, long, value_parser = ["owner", "trainer", "derived"])]
        trust: Option<String>,

        /// Free-form category
        #[arg(short, long)]
        category: Option<String>,
    },

    /// Recall memories weighted by trust and recency
    Recall {
        avatar: String,

        /// Search query
        query: String,

        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Print the ranked results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recall only memories that clear a similarity threshold
    Ask {
        avatar: String,

        /// Question to find memories for
        query: String,

        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Minimum similarity
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },

    /// Update a memory's text or category
    Update {
        /// Memory ID
        id: i64,

        /// New text (re-embedded)
        #[arg(long)]
        text: Option<String>,

        /// New category
        #[arg(short, long, conflicts_with = "clear_category")]
        category: Option<String>,

        /// Remove the category
        #[arg(long)]
        clear_category: bool,
    },

    /// Archive a memory so it is no longer retrieved
    Archive {
        /// Memory ID to archive
        id: i64,

        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// List recent memories of an avatar
    List {
        avatar: String,

        /// Maximum results
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// List avatars with memories
    Avatars,

    /// Show statistics for an avatar
    Stats { avatar: String },

    /// Export an avatar's memories to stdout
    Export {
        avatar: String,

        /// Output format
        #[arg(short, long, default_value = "json", value_parser = ["json", "md"])]
        format: String,
    },

    /// Print prompt-ready memories relevant to a message
    Context {
        avatar: String,

        /// The incoming message
        prompt: String,

        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Minimum similarity
        #[arg(short, long)]
        threshold: Option<f64>,
    },

    /// Manage a trainer's knowledge base
    #[command(subcommand)]
    Trainer(TrainerCommands),

    /// View or set configuration
    Config {
        /// Config key
        key: Option<String>,

        /// Config value
        value: Option<String>,
    },
}

#[derive(Subcommand)]
enum TrainerCommands {
    /// Add a context snippet
    Teach { trainer: String, text: String },

    /// Set the display text of a context
    Label {
        trainer: String,
        index: usize,
        text: String,
    },

    /// Remove the display text of a context
    Unlabel { trainer: String, index: usize },

    /// Rank contexts against a query
    Recall {
        trainer: String,
        query: String,

        /// Maximum results
        #[arg(short = 'n', long)]
        limit: Option<usize>,

        /// Minimum similarity
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print the ranking as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    if let Err(e) = avatar_memory::logger::init_tracing() {
        eprintln!("Warning: {}", e);
    }

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { path } => cli::memory::run_init(&path),
        Commands::Remember {
            avatar,
            text,
            source,
            trust,
            category,
        } => cli::memory::run_remember(&avatar, &text, &source, trust.as_deref(), category.as_deref()),
        Commands::Recall {
            avatar,
            query,
            limit,
            json,
        } => cli::memory::run_recall(&avatar, &query, limit, json),
        Commands::Ask {
            avatar,
            query,
            limit,
            threshold,
            json,
        } => cli::memory::run_ask(&avatar, &query, limit, threshold, json),
        Commands::Update {
            id,
            text,
            category,
            clear_category,
        } => cli::memory::run_update(id, text.as_deref(), category.as_deref(), clear_category),
        Commands::Archive { id, force } => cli::memory::run_archive(id, force),
        Commands::List { avatar, limit } => cli::memory::run_list(&avatar, limit),
        Commands::Avatars => cli::memory::run_avatars(),
        Commands::Stats { avatar } => cli::memory::run_stats(&avatar),
        Commands::Export { avatar, format } => cli::memory::run_export(&avatar, &format),
        Commands::Context {
            avatar,
            prompt,
            limit,
            threshold,
        } => cli::context::run_context(&avatar, &prompt, limit, threshold),
        Commands::Trainer(cmd) => match cmd {
            TrainerCommands::Teach { trainer, text } => cli::trainer::run_teach(&trainer, &text),
            TrainerCommands::Label { trainer, index, text } => {
                cli::trainer::run_label(&trainer, index, &text)
            }
            TrainerCommands::Unlabel { trainer, index } => cli::trainer::run_unlabel(&trainer, index),
            TrainerCommands::Recall {
                trainer,
                query,
                limit,
                threshold,
                json,
            } => cli::trainer::run_recall(&trainer, &query, limit, threshold, json),
        },
        Commands::Config { key, value } => cli::config::run_config(key.as_deref(), value.as_deref()),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
