//! Command-line argument parsing
//!
//! Clap-based CLI with one subcommand per role: server, terminal client,
//! Ollama benchmark, diagnostics, and configuration display.

use clap::{Parser, Subcommand};

/// AssistGen - customer-support chat backend and terminal client
#[derive(Parser, Debug)]
#[command(name = "assistgen")]
#[command(version)]
#[command(about = "Chat backend relaying streamed LLM output", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP server
    Serve,

    /// Interactive terminal chat client
    Chat {
        /// Server base URL (overrides the client config file)
        #[arg(long)]
        server: Option<String>,
    },

    /// Load-test a local Ollama server
    Bench {
        /// Ollama base URL
        #[arg(long, default_value = "http://127.0.0.1:11434")]
        url: String,

        /// Model to benchmark
        #[arg(long, default_value = "deepseek-r1:1.5b")]
        model: String,

        /// Sequential baseline requests before the sweep
        #[arg(long, default_value_t = 3)]
        baseline_requests: usize,

        /// Highest concurrency level to try (defaults to CPU count, capped at 8)
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Requests per concurrency level
        #[arg(long, default_value_t = 10)]
        requests_per_level: usize,
    },

    /// Run deployment diagnostics
    Doctor,

    /// Display the effective configuration
    Config,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_parses() {
        let args = Args::try_parse_from(["assistgen", "serve"]).unwrap();
        assert!(matches!(args.command, Commands::Serve));
    }

    #[test]
    fn test_chat_with_server_override() {
        let args =
            Args::try_parse_from(["assistgen", "chat", "--server", "http://10.0.0.2:8000"])
                .unwrap();
        match args.command {
            Commands::Chat { server } => {
                assert_eq!(server.as_deref(), Some("http://10.0.0.2:8000"))
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_bench_defaults() {
        let args = Args::try_parse_from(["assistgen", "bench"]).unwrap();
        match args.command {
            Commands::Bench {
                url,
                model,
                baseline_requests,
                max_concurrency,
                requests_per_level,
            } => {
                assert_eq!(url, "http://127.0.0.1:11434");
                assert_eq!(model, "deepseek-r1:1.5b");
                assert_eq!(baseline_requests, 3);
                assert!(max_concurrency.is_none());
                assert_eq!(requests_per_level, 10);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Args::try_parse_from(["assistgen"]).is_err());
    }
}
