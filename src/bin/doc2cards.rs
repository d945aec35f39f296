//! CLI binary for edgequake-flashcards.
//!
//! A thin shim over the library crate: maps CLI flags to `PipelineConfig`,
//! drives `DocumentPipeline` and manages decks in a JSON file store.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use edgequake_flashcards::convert::write_atomic;
use edgequake_flashcards::pipeline::input::load_input;
use edgequake_flashcards::{
    import_document, DeckStore, DeckUpdate, DocumentPipeline, JsonFileDeckStore, NewDeck,
    PdfMode, PipelineConfig, PipelineProgressCallback, ProgressCallback, Stage,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar reused across stages: spinner while parsing and filtering, a
/// counted bar while blocks are chunked and cards generated. Block and chunk
/// events arrive in completion order, so the bar only counts.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(spinner_style());
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn counted(&self, prefix: &'static str, unit: &str, total: usize) {
        let style = ProgressStyle::with_template(&format!(
            "{{spinner:.cyan}} {{prefix:.bold}}  \
             [{{bar:42.green/238}}] {{pos:>3}}/{{len}} {unit}  \
             ⏱ {{elapsed_precise}}  ETA {{eta_precise}}"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_style(style);
        self.bar.set_prefix(prefix);
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.reset_eta();
    }
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(TICKS)
}

impl PipelineProgressCallback for CliProgressCallback {
    fn on_pipeline_start(&self, total_pages: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Parsed {total_pages} pages"))
        ));
    }

    fn on_stage_start(&self, stage: Stage) {
        match stage {
            Stage::Parse | Stage::Batch | Stage::Filter => {
                self.bar.set_style(spinner_style());
                self.bar.set_prefix("Working");
                self.bar.set_message(format!("{stage}…"));
            }
            // Lengths are set by the first counted event of the stage.
            Stage::Chunk | Stage::Generate => {
                self.bar.set_message(format!("{stage}…"));
            }
        }
    }

    fn on_block_chunked(&self, block: usize, total_blocks: usize, chunk_count: usize) {
        if self.bar.prefix() != "Chunking" {
            self.counted("Chunking", "blocks", total_blocks);
        }
        self.bar.println(format!(
            "  {} Block {:>3}/{:<3}  {}",
            green("✓"),
            block + 1,
            total_blocks,
            dim(&format!("{chunk_count} chunks")),
        ));
        self.bar.inc(1);
    }

    fn on_flashcard_generated(&self, _chunk: usize, total: usize) {
        if self.bar.prefix() != "Generating" {
            self.counted("Generating", "cards", total);
        }
        self.bar.inc(1);
    }

    fn on_pipeline_complete(&self, flashcards: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} {} flashcards generated",
            green("✔"),
            bold(&flashcards.to_string())
        );
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Flashcards from a PDF (text layer), printed to stdout
  doc2cards generate lecture.pdf

  # Scanned PDF: transcribe pages with a vision model first
  doc2cards generate --pdf-mode vision scan.pdf

  # Full JSON output (flashcards, flagged chunks, stats) to a file
  doc2cards generate notes.md --json -o cards.json

  # Manage decks and import a document into one
  doc2cards deck create --store decks.json --user alice "Biology 101"
  doc2cards import lecture.pdf --store decks.json --user alice --deck <DECK_ID>
  doc2cards deck cards --store decks.json --user alice <DECK_ID>

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (PDF input only)
  RUST_LOG                Log filter, overrides --verbose / --quiet
"#;

/// Generate study flashcards from documents using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "doc2cards",
    version,
    about = "Generate study flashcards from PDF and Markdown documents using LLMs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "DOC2CARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "DOC2CARDS_QUIET")]
    quiet: bool,

    /// Disable progress bar.
    #[arg(long, global = true, env = "DOC2CARDS_NO_PROGRESS")]
    no_progress: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate flashcards from a document and print or save them.
    Generate {
        /// Local file path or HTTP/HTTPS URL (PDF, Markdown or plain text).
        input: String,

        /// Write output to this file instead of stdout.
        #[arg(short, long, env = "DOC2CARDS_OUTPUT")]
        output: Option<PathBuf>,

        /// Output structured JSON (flashcards, flagged chunks, stats).
        #[arg(long, env = "DOC2CARDS_JSON")]
        json: bool,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Generate flashcards from a document and store them in a deck.
    Import {
        /// Local file path or HTTP/HTTPS URL.
        input: String,

        #[command(flatten)]
        store: StoreArgs,

        /// Target deck id.
        #[arg(long)]
        deck: Uuid,

        #[command(flatten)]
        pipeline: PipelineArgs,
    },

    /// Manage decks.
    Deck {
        #[command(subcommand)]
        action: DeckCommand,
    },
}

#[derive(Subcommand, Debug)]
enum DeckCommand {
    /// Create a deck and print its id.
    Create {
        #[command(flatten)]
        store: StoreArgs,
        name: String,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// List the user's decks.
    List {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Change a deck's name, category or description.
    Update {
        #[command(flatten)]
        store: StoreArgs,
        deck: Uuid,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a deck and its flashcards.
    Delete {
        #[command(flatten)]
        store: StoreArgs,
        deck: Uuid,
    },
    /// Print the flashcards of a deck.
    Cards {
        #[command(flatten)]
        store: StoreArgs,
        deck: Uuid,
        /// Output JSON instead of text.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct StoreArgs {
    /// Deck store file (created on first write).
    #[arg(long, env = "DOC2CARDS_STORE", default_value = "decks.json")]
    store: PathBuf,

    /// Owner of the decks.
    #[arg(long, env = "DOC2CARDS_USER")]
    user: String,
}

#[derive(Args, Debug)]
struct PipelineArgs {
    /// LLM model ID (e.g. gpt-4o, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Number of concurrent LLM calls per stage.
    #[arg(short, long, env = "DOC2CARDS_CONCURRENCY", default_value_t = 10)]
    concurrency: usize,

    /// Token budget for one block sent to the chunking call.
    #[arg(long, env = "DOC2CARDS_MAX_BLOCK_TOKENS", default_value_t = 1000)]
    max_block_tokens: usize,

    /// Model family whose tokenizer measures blocks.
    #[arg(long, env = "DOC2CARDS_TOKENIZER_MODEL", default_value = "gpt-3.5-turbo")]
    tokenizer_model: String,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOC2CARDS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "DOC2CARDS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Retries per call on transport failure (0–10).
    #[arg(long, env = "DOC2CARDS_MAX_RETRIES", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "DOC2CARDS_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOC2CARDS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// How PDFs are read: text (text layer) or vision (page images via VLM).
    #[arg(long, env = "DOC2CARDS_PDF_MODE", value_enum, default_value = "text")]
    pdf_mode: PdfModeArg,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOC2CARDS_PASSWORD")]
    password: Option<String>,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PdfModeArg {
    Text,
    Vision,
}

impl From<PdfModeArg> for PdfMode {
    fn from(v: PdfModeArg) -> Self {
        match v {
            PdfModeArg::Text => PdfMode::Text,
            PdfModeArg::Vision => PdfMode::Vision,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs; --verbose always wins.
    let json_output = matches!(cli.command, Command::Generate { json: true, .. });
    let runs_pipeline = matches!(cli.command, Command::Generate { .. } | Command::Import { .. });
    let show_progress = runs_pipeline && !cli.quiet && !cli.no_progress && !json_output;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let progress: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn PipelineProgressCallback>)
    } else {
        None
    };

    match cli.command {
        Command::Generate {
            input,
            output,
            json,
            pipeline,
        } => {
            let config = build_config(&pipeline, progress)?;
            let pipeline_impl =
                DocumentPipeline::from_config(&config).context("Failed to set up pipeline")?;
            let bytes = load_input(&input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;
            let result = pipeline_impl
                .run(&bytes)
                .await
                .context("Flashcard generation failed")?;

            let rendered = if json {
                serde_json::to_string_pretty(&result).context("Failed to serialise output")?
            } else {
                render_cards(
                    result
                        .flashcards
                        .iter()
                        .map(|c| (c.question.as_str(), c.answer.as_str())),
                )
            };

            if let Some(path) = output {
                write_atomic(&path, rendered.as_bytes())
                    .await
                    .context("Failed to write output")?;
                if !cli.quiet {
                    eprintln!(
                        "{}  {} cards  →  {}",
                        green("✔"),
                        result.flashcards.len(),
                        bold(&path.display().to_string())
                    );
                }
            } else {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(rendered.as_bytes())
                    .context("Failed to write to stdout")?;
                if !rendered.ends_with('\n') {
                    handle.write_all(b"\n").ok();
                }
            }

            if !cli.quiet && !json {
                let s = &result.stats;
                eprintln!(
                    "   {} pages → {} blocks → {} chunks ({} flagged)  {}ms",
                    s.pages, s.blocks, s.chunks, s.flagged_chunks, s.total_duration_ms
                );
                eprintln!(
                    "   {} tokens in  /  {} tokens out",
                    dim(&s.total_prompt_tokens.to_string()),
                    dim(&s.total_completion_tokens.to_string()),
                );
            }
        }

        Command::Import {
            input,
            store,
            deck,
            pipeline,
        } => {
            let config = build_config(&pipeline, progress)?;
            let pipeline_impl =
                DocumentPipeline::from_config(&config).context("Failed to set up pipeline")?;
            let deck_store = JsonFileDeckStore::new(&store.store);
            let bytes = load_input(&input, config.download_timeout_secs)
                .await
                .with_context(|| format!("Failed to load '{input}'"))?;

            let stored = import_document(&deck_store, &pipeline_impl, &store.user, deck, &bytes)
                .await
                .context("Import failed")?;
            if !cli.quiet {
                eprintln!(
                    "{}  {} cards added to deck {}",
                    green("✔"),
                    bold(&stored.len().to_string()),
                    deck
                );
            }
        }

        Command::Deck { action } => run_deck_command(action).await?,
    }

    Ok(())
}

async fn run_deck_command(action: DeckCommand) -> Result<()> {
    match action {
        DeckCommand::Create {
            store,
            name,
            category,
            description,
        } => {
            let deck = JsonFileDeckStore::new(&store.store)
                .create_deck(
                    &store.user,
                    NewDeck {
                        name,
                        category,
                        description,
                    },
                )
                .await
                .context("Failed to create deck")?;
            println!("{}", deck.id);
        }
        DeckCommand::List { store } => {
            let decks = JsonFileDeckStore::new(&store.store)
                .list_decks(&store.user)
                .await
                .context("Failed to list decks")?;
            for deck in decks {
                println!(
                    "{}  {}{}",
                    deck.id,
                    bold(&deck.name),
                    deck.category
                        .map(|c| dim(&format!("  [{c}]")))
                        .unwrap_or_default()
                );
            }
        }
        DeckCommand::Update {
            store,
            deck,
            name,
            category,
            description,
        } => {
            let update = DeckUpdate {
                name,
                category,
                description,
            };
            if update.is_empty() {
                bail!("Nothing to update: pass --name, --category or --description");
            }
            let deck = JsonFileDeckStore::new(&store.store)
                .update_deck(&store.user, deck, update)
                .await
                .context("Failed to update deck")?;
            println!("{}  {}", deck.id, bold(&deck.name));
        }
        DeckCommand::Delete { store, deck } => {
            JsonFileDeckStore::new(&store.store)
                .delete_deck(&store.user, deck)
                .await
                .context("Failed to delete deck")?;
            eprintln!("{} deleted deck {}", green("✔"), deck);
        }
        DeckCommand::Cards { store, deck, json } => {
            let cards = JsonFileDeckStore::new(&store.store)
                .list_flashcards(&store.user, deck)
                .await
                .context("Failed to list flashcards")?;
            if json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&cards).context("Failed to serialise cards")?
                );
            } else {
                print!(
                    "{}",
                    render_cards(cards.iter().map(|c| (c.question.as_str(), c.answer.as_str())))
                );
            }
        }
    }
    Ok(())
}

fn render_cards<'a>(cards: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut out = String::new();
    for (i, (question, answer)) in cards.enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("Q: {question}\nA: {answer}\n"));
    }
    out
}

/// Map CLI args to `PipelineConfig`.
fn build_config(args: &PipelineArgs, progress: Option<ProgressCallback>) -> Result<PipelineConfig> {
    let mut builder = PipelineConfig::builder()
        .concurrency(args.concurrency)
        .max_block_tokens(args.max_block_tokens)
        .tokenizer_model(args.tokenizer_model.clone())
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .max_retries(args.max_retries)
        .api_timeout_secs(args.api_timeout)
        .download_timeout_secs(args.download_timeout)
        .pdf_mode(args.pdf_mode.into());

    if let Some(ref model) = args.model {
        builder = builder.model(model.clone());
    }
    if let Some(ref provider) = args.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref password) = args.password {
        builder = builder.password(password.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
