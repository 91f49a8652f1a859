//! AssistGen CLI entry point

use anyhow::Result;
use assistgen::bench::{BenchConfig, Benchmark};
use assistgen::cli::{Args, Commands};
use assistgen::config::Settings;
use assistgen::doctor::Doctor;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("assistgen=info,tower_http=info")),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Commands::Serve => {
            let settings = Settings::from_env()?;
            assistgen::server::run(settings).await?;
        }
        Commands::Chat { server } => {
            assistgen::client::run_repl(server).await?;
        }
        Commands::Bench {
            url,
            model,
            baseline_requests,
            max_concurrency,
            requests_per_level,
        } => {
            let mut config = BenchConfig {
                url,
                model,
                single_requests: baseline_requests,
                requests_per_level,
                ..Default::default()
            };
            if let Some(max) = max_concurrency {
                config.max_concurrency = max;
            }
            Benchmark::new(config)?.run().await?;
        }
        Commands::Doctor => {
            let settings = Settings::from_env()?;
            let checks = Doctor::new(settings).run_diagnostics().await;
            Doctor::display_results(&checks);
            std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
        }
        Commands::Config => {
            let settings = Settings::from_env()?;
            show_config(&settings);
        }
    }

    Ok(())
}

fn show_config(settings: &Settings) {
    println!("\nAssistGen configuration\n");
    println!("Services:");
    println!("  Chat:    {:?}", settings.chat_service);
    println!("  Reason:  {:?}", settings.reason_service);
    println!();
    println!("DeepSeek:");
    println!("  Base URL: {}", settings.deepseek.base_url);
    println!("  Model:    {}", settings.deepseek.model);
    println!(
        "  API key:  {}",
        if settings.deepseek.api_key.is_empty() {
            "(not set)"
        } else {
            "****"
        }
    );
    println!();
    println!("Ollama:");
    println!("  Base URL:     {}", settings.ollama.base_url);
    println!("  Chat model:   {}", settings.ollama.chat_model);
    println!("  Reason model: {}", settings.ollama.reason_model);
    println!();
    println!("Server:");
    println!("  Bind:         {}:{}", settings.server_host, settings.server_port);
    println!(
        "  Database:     {}",
        if settings.database_url.is_some() {
            "configured"
        } else {
            "(not set)"
        }
    );
    println!(
        "  Static dir:   {}",
        settings
            .static_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!(
        "  Idle timeout: {}s",
        settings.stream_idle_timeout.as_secs()
    );
    println!();
}
