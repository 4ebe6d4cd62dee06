//! marcador - inspect and check reading locations in chapter XHTML

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use marcador::location::{text_content, Validation};
use marcador::tree::xhtml::load_chapter;
use marcador::{
    parse, ChapterTree, Config, DocumentTree, FileStore, Generator, NodeKind, PositionStore,
    Validator,
};

#[derive(Parser)]
#[command(name = "marcador")]
#[command(version, about = "Reflow-stable reading locations", long_about = None)]
#[command(after_help = "EXAMPLES:
    marcador outline ch01.xhtml                   List block locations
    marcador locate ch01.xhtml --char 120         Location of the 120th character
    marcador resolve ch01.xhtml 'doc:/ch01.xhtml/3!/0:12'
    marcador validate ch01.xhtml 'doc:/ch01.xhtml/3' --strict")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every block element with its location
    Outline {
        /// Chapter XHTML file
        file: PathBuf,
        /// Chapter id (defaults to the file name)
        #[arg(short, long)]
        chapter: Option<String>,
    },

    /// Print the location of a character in the chapter text
    Locate {
        file: PathBuf,
        #[arg(short, long)]
        chapter: Option<String>,
        /// Character index into the chapter's text
        #[arg(long = "char", value_name = "N")]
        char_index: usize,
    },

    /// Resolve a location and print the text around it
    Resolve {
        file: PathBuf,
        location: String,
        /// Characters of context on each side (defaults to the configured length)
        #[arg(long)]
        context: Option<usize>,
    },

    /// Check a location against the chapter, including content drift
    Validate {
        file: PathBuf,
        location: String,
        /// Treat content drift as invalid
        #[arg(long)]
        strict: bool,
    },

    /// Show the saved position for a book
    Saved {
        book_id: String,
        /// Store directory (defaults to MARCADOR_STORE_DIR)
        #[arg(long)]
        dir: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "marcador=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = Config::from_env().context("Invalid MARCADOR_* configuration")?;

    match cli.command {
        Command::Outline { file, chapter } => {
            let chapter = chapter_id(&file, chapter);
            outline(&load(&chapter, &file)?, &config)?;
        }
        Command::Locate {
            file,
            chapter,
            char_index,
        } => {
            let chapter = chapter_id(&file, chapter);
            locate(&load(&chapter, &file)?, &config, char_index)?;
        }
        Command::Resolve {
            file,
            location,
            context,
        } => {
            let location = parse(&location).context("Invalid location")?;
            let tree = load(&location.chapter_id, &file)?;
            let context = context.unwrap_or(config.generator.context_length);

            let Some(snippet) = text_content(&location, &tree, context) else {
                println!("{location}: does not resolve");
                return Ok(ExitCode::FAILURE);
            };
            println!("{location}");
            println!("  before: {:?}", snippet.before);
            println!("  after:  {:?}", snippet.after);
        }
        Command::Validate {
            file,
            location,
            strict,
        } => {
            let location = parse(&location).context("Invalid location")?;
            let tree = load(&location.chapter_id, &file)?;
            let validator = if strict {
                Validator::strict()
            } else {
                Validator::new(config.tracker.drift_policy)
            };

            match validator.check(&location, &tree) {
                Validation::Valid => println!("{location}: valid"),
                Validation::Drifted { expected, actual } => {
                    println!("{location}: drifted (expected {expected}, found {actual})")
                }
                Validation::Unresolvable => println!("{location}: does not resolve"),
            }
            if !validator.validate(&location, &tree) {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Saved { book_id, dir } => {
            let store = FileStore::open(dir.unwrap_or(config.store.dir))?;
            match store.get(&book_id)? {
                Some(position) => println!("{}", serde_json::to_string_pretty(&position)?),
                None => {
                    println!("No saved position for {book_id}");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn chapter_id(file: &Path, chapter: Option<String>) -> String {
    chapter.unwrap_or_else(|| {
        file.file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "chapter".to_string())
    })
}

fn load(chapter: &str, file: &Path) -> Result<ChapterTree> {
    load_chapter(chapter, file).with_context(|| format!("Failed to load {}", file.display()))
}

fn outline(tree: &ChapterTree, config: &Config) -> Result<()> {
    let generator = Generator::with_options(tree, config.generator.clone());

    for node in tree.descendants(tree.root()) {
        if !tree.is_block(node) {
            continue;
        }
        let location = generator.from_node(node, tree.chapter_id())?;
        let text = tree.text_of(node);
        let preview: String = text.split_whitespace().collect::<Vec<_>>().join(" ");
        let preview: String = preview.chars().take(60).collect();
        println!(
            "{:<32} {:<8} {}",
            location.to_string(),
            tree.tag_name(node).unwrap_or("?"),
            preview
        );
    }
    Ok(())
}

fn locate(tree: &ChapterTree, config: &Config, char_index: usize) -> Result<()> {
    let generator = Generator::with_options(tree, config.generator.clone());

    let mut remaining = char_index;
    for node in tree.descendants(tree.root()) {
        if tree.kind(node) != NodeKind::Text {
            continue;
        }
        let length = tree.text_of(node).chars().count();
        if remaining < length {
            let location = generator.from_text_position(node, remaining, tree.chapter_id())?;
            println!("{location}");
            return Ok(());
        }
        remaining -= length;
    }

    anyhow::bail!("Character index {char_index} is past the end of the chapter")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locate_past_end_of_chapter() {
        let mut tree = ChapterTree::new("chapter-1");
        let root = tree.root();
        let p = tree.append_element(root, "p");
        tree.append_text(p, "Hello");

        let err = locate(&tree, &Config::default(), usize::MAX).unwrap_err();
        assert!(err.to_string().contains("past the end of the chapter"));
        assert!(locate(&tree, &Config::default(), 5).is_err());
        assert!(locate(&tree, &Config::default(), 4).is_ok());
    }
}
