//! Tokenscope CLI — tokenizer decision analysis.
//!
//! Usage:
//!   tokenscope analyze <text> [--model name] [--compare name ...]
//!   tokenscope compare <text> --model name --model name ...

use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokenscope::{AnalysisMiddleware, AnalysisOptions, HeuristicProvider};

#[derive(Parser)]
#[command(
    name = "tokenscope",
    version,
    about = "Tokenizer decision analysis middleware"
)]
struct Cli {
    /// Log pipeline progress to stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis pipeline on one text
    Analyze {
        /// Text to analyze
        text: String,
        /// Tokenizer model to load
        #[arg(long, default_value = "default")]
        model: String,
        /// Additional models to compare against
        #[arg(long = "compare")]
        compare: Vec<String>,
    },
    /// Compare tokenization across models
    Compare {
        /// Text to tokenize
        text: String,
        /// Models to compare (at least two)
        #[arg(long = "model", required = true, num_args = 1..)]
        models: Vec<String>,
    },
}

async fn cmd_analyze(text: &str, model: &str, compare: Vec<String>) -> i32 {
    let mut middleware = AnalysisMiddleware::new(Arc::new(HeuristicProvider::new()));
    if let Err(e) = middleware.init(model).await {
        eprintln!("Error: {}", e);
        return 1;
    }
    let options = AnalysisOptions::new().with_compare_models(compare);
    match middleware.analyze(text, options).await {
        Ok(trace) => match serde_json::to_string_pretty(&trace) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

async fn cmd_compare(text: &str, models: Vec<String>) -> i32 {
    if models.len() < 2 {
        eprintln!("error: compare needs at least two --model arguments");
        return 1;
    }
    let middleware = AnalysisMiddleware::new(Arc::new(HeuristicProvider::new()));
    match middleware.compare_models(text, &models).await {
        Ok(result) => match serde_json::to_string_pretty(&result) {
            Ok(json) => {
                println!("{}", json);
                0
            }
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let code = match cli.command {
        Commands::Analyze {
            text,
            model,
            compare,
        } => cmd_analyze(&text, &model, compare).await,
        Commands::Compare { text, models } => cmd_compare(&text, models).await,
    };
    std::process::exit(code);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_compare_with_repeated_models() {
        let cli = Cli::try_parse_from([
            "tokenscope", "compare", "hello", "--model", "a", "--model", "b",
        ])
        .unwrap();
        match cli.command {
            Commands::Compare { text, models } => {
                assert_eq!(text, "hello");
                assert_eq!(models, vec!["a".to_string(), "b".to_string()]);
            }
            _ => panic!("expected compare subcommand"),
        }
    }

    #[tokio::test]
    async fn compare_rejects_single_model() {
        let code = cmd_compare("hello", vec!["only".to_string()]).await;
        assert_eq!(code, 1);
    }

    #[tokio::test]
    async fn compare_succeeds_with_two_models() {
        let code = cmd_compare("hello world", vec!["a".to_string(), "b".to_string()]).await;
        assert_eq!(code, 0);
    }
}
