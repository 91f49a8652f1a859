//! Ollama load benchmark
//!
//! Measures what a local Ollama host sustains before answering degrades:
//! a single-request baseline first, then a concurrency sweep that stops at
//! the configured success-rate/latency thresholds or when host CPU/memory
//! cross their guardrails. Results land in a JSON report.

use crate::errors::{AppError, Result};
use crate::providers::json_stream::JsonObjectStream;
use chrono::Local;
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use sysinfo::System;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Prompt pool; one is drawn at random per request
const QUESTIONS: &[&str] = &[
    "Why is the sky blue?",
    "Why is seawater salty?",
    "Why do leaves change color in autumn?",
    "Explain what a closure is in programming.",
    "What is object-oriented programming?",
    "Explain what a recursive function is.",
    "What is a Fourier transform?",
    "What is linear algebra used for?",
    "What is a neural network?",
    "Explain the difference between supervised and unsupervised learning.",
    "What is reinforcement learning?",
    "What is consciousness?",
    "What is free will?",
    "Explain what entropy means in information theory.",
    "What makes a good unit test?",
];

/// Sweep and guardrail parameters
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub url: String,
    pub model: String,
    pub single_requests: usize,
    pub start_concurrency: usize,
    pub max_concurrency: usize,
    pub requests_per_level: usize,
    pub success_rate_threshold: f64,
    pub latency_threshold_secs: f64,
    /// Token cap per request, keeps generation lengths comparable
    pub num_predict: u32,
    pub report_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:11434".to_string(),
            model: "deepseek-r1:1.5b".to_string(),
            single_requests: 3,
            start_concurrency: 2,
            max_concurrency: num_cpus::get().min(8),
            requests_per_level: 10,
            success_rate_threshold: 0.95,
            latency_threshold_secs: 5.0,
            num_predict: 300,
            report_dir: PathBuf::from("logs"),
        }
    }
}

/// Metrics of one completed generate call
#[derive(Debug, Clone, Serialize)]
pub struct RequestSample {
    pub eval_count: u64,
    pub eval_duration_secs: f64,
    pub total_duration_secs: f64,
    pub tokens_per_second: f64,
}

/// Averages over the sequential baseline runs
#[derive(Debug, Serialize)]
pub struct SingleReport {
    pub avg_tokens: f64,
    pub avg_generation_secs: f64,
    pub avg_total_secs: f64,
    pub avg_tokens_per_second: f64,
    pub samples: Vec<RequestSample>,
}

/// One concurrency level of the sweep
#[derive(Debug, Clone, Serialize)]
pub struct ConcurrencyReport {
    pub concurrency: usize,
    pub total_requests: usize,
    pub success_rate: f64,
    pub total_tokens: u64,
    pub avg_generation_secs: f64,
    pub avg_total_secs: f64,
    pub avg_tokens_per_second: f64,
    pub wall_clock_secs: f64,
    pub system_throughput: f64,
}

/// Sweep summary
#[derive(Debug, Serialize)]
pub struct SweepReport {
    pub optimal_concurrency: usize,
    pub max_throughput: f64,
    pub levels: Vec<ConcurrencyReport>,
}

/// Host load snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HostMetrics {
    pub cpu_percent: f32,
    pub memory_percent: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    eval_count: u64,
    /// Nanoseconds
    #[serde(default)]
    eval_duration: u64,
    #[serde(default)]
    total_duration: u64,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TaggedModel>,
}

#[derive(Debug, Deserialize)]
struct TaggedModel {
    name: String,
}

#[derive(Debug, Deserialize)]
struct PullProgress {
    #[serde(default)]
    status: String,
    #[serde(default)]
    total: u64,
    #[serde(default)]
    completed: u64,
}

/// Ollama load benchmark runner
pub struct Benchmark {
    client: Client,
    config: BenchConfig,
}

impl Benchmark {
    pub fn new(config: BenchConfig) -> Result<Self> {
        // Generous timeout: a saturated host can take a while per request.
        let client = Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self { client, config })
    }

    /// Run the whole suite and write the JSON report
    pub async fn run(&self) -> Result<PathBuf> {
        if !self.ensure_model().await? {
            return Err(AppError::Config(format!(
                "model '{}' is not available and could not be pulled",
                self.config.model
            )));
        }

        let (healthy, metrics) = host_health();
        info!(
            cpu = metrics.cpu_percent,
            memory = metrics.memory_percent,
            "host health before benchmark"
        );
        if !healthy {
            return Err(AppError::Config(
                "host is already under load, refusing to benchmark".to_string(),
            ));
        }

        println!("=== Single-request baseline ===");
        let single = self.run_single(self.config.single_requests).await?;
        println!(
            "avg {:.1} tokens in {:.2}s  ({:.2} tok/s)",
            single.avg_tokens, single.avg_generation_secs, single.avg_tokens_per_second
        );

        println!("\n=== Concurrency sweep ===");
        let sweep = self.find_max_concurrency().await?;
        println!(
            "optimal concurrency {} at {:.2} tok/s system throughput",
            sweep.optimal_concurrency, sweep.max_throughput
        );

        let report = json!({
            "test_info": {
                "timestamp": Local::now().to_rfc3339(),
                "model": self.config.model,
                "server": self.config.url,
            },
            "single_request_performance": single,
            "concurrency_test": sweep,
        });

        std::fs::create_dir_all(&self.config.report_dir)?;
        let path = self.config.report_dir.join(format!(
            "benchmark_{}.json",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        std::fs::write(&path, serde_json::to_string_pretty(&report)?)?;
        println!("\nreport written to {}", path.display());

        self.unload_model().await;
        Ok(path)
    }

    /// Sequential baseline: n requests with a cool-down between them
    pub async fn run_single(&self, n: usize) -> Result<SingleReport> {
        let bar = progress_bar(n as u64, "baseline");
        let mut samples = Vec::new();

        for _ in 0..n {
            match generate_once(
                self.client.clone(),
                self.config.url.clone(),
                self.config.model.clone(),
                self.config.num_predict,
            )
            .await
            {
                Ok(sample) => samples.push(sample),
                Err(err) => warn!(error = %err, "baseline request failed"),
            }
            bar.inc(1);
            // Cool-down; back-to-back requests skew the baseline.
            tokio::time::sleep(Duration::from_secs(2)).await;
        }
        bar.finish_and_clear();

        if samples.is_empty() {
            return Err(AppError::UpstreamUnavailable(
                "every baseline request failed".to_string(),
            ));
        }

        let count = samples.len() as f64;
        Ok(SingleReport {
            avg_tokens: samples.iter().map(|s| s.eval_count as f64).sum::<f64>() / count,
            avg_generation_secs: samples.iter().map(|s| s.eval_duration_secs).sum::<f64>() / count,
            avg_total_secs: samples.iter().map(|s| s.total_duration_secs).sum::<f64>() / count,
            avg_tokens_per_second: samples.iter().map(|s| s.tokens_per_second).sum::<f64>()
                / count,
            samples,
        })
    }

    /// One sweep level: `total` requests bounded by a semaphore
    pub async fn run_level(
        &self,
        concurrency: usize,
        total: usize,
    ) -> Result<Option<ConcurrencyReport>> {
        let semaphore = std::sync::Arc::new(Semaphore::new(concurrency));
        let bar = progress_bar(total as u64, &format!("concurrency {concurrency}"));
        let started = Instant::now();

        let mut tasks = JoinSet::new();
        for _ in 0..total {
            let semaphore = semaphore.clone();
            let client = self.client.clone();
            let url = self.config.url.clone();
            let model = self.config.model.clone();
            let num_predict = self.config.num_predict;
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let result = generate_once(client, url, model, num_predict).await;
                // Small gap between releases keeps the server from thrashing.
                tokio::time::sleep(Duration::from_millis(500)).await;
                result
            });
        }

        let mut successes = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(sample)) => successes.push(sample),
                Ok(Err(err)) => warn!(error = %err, "benchmark request failed"),
                Err(err) => warn!(error = %err, "benchmark task panicked"),
            }
            bar.inc(1);
        }
        bar.finish_and_clear();

        if successes.is_empty() {
            return Ok(None);
        }

        let wall_clock = started.elapsed().as_secs_f64();
        let count = successes.len() as f64;
        let total_tokens: u64 = successes.iter().map(|s| s.eval_count).sum();
        Ok(Some(ConcurrencyReport {
            concurrency,
            total_requests: total,
            success_rate: successes.len() as f64 / total as f64,
            total_tokens,
            avg_generation_secs: successes.iter().map(|s| s.eval_duration_secs).sum::<f64>()
                / count,
            avg_total_secs: successes.iter().map(|s| s.total_duration_secs).sum::<f64>() / count,
            avg_tokens_per_second: successes.iter().map(|s| s.tokens_per_second).sum::<f64>()
                / count,
            wall_clock_secs: wall_clock,
            system_throughput: total_tokens as f64 / wall_clock,
        }))
    }

    /// Raise concurrency until a threshold or a host guardrail trips
    pub async fn find_max_concurrency(&self) -> Result<SweepReport> {
        let mut levels = Vec::new();
        let mut optimal_concurrency = 0;
        let mut max_throughput = 0.0f64;
        let mut consecutive_failures = 0;

        for concurrency in self.config.start_concurrency..=self.config.max_concurrency {
            let (healthy, metrics) = host_health();
            if !healthy {
                warn!(
                    cpu = metrics.cpu_percent,
                    memory = metrics.memory_percent,
                    "host over guardrails, stopping sweep"
                );
                break;
            }

            info!(concurrency, "sweep level starting");
            let Some(report) = self
                .run_level(concurrency, self.config.requests_per_level)
                .await?
            else {
                consecutive_failures += 1;
                if consecutive_failures >= 2 {
                    warn!("two empty levels in a row, stopping sweep");
                    break;
                }
                continue;
            };
            consecutive_failures = 0;

            println!(
                "concurrency {:>2}: success {:>5.1}%, latency {:.2}s, throughput {:.2} tok/s",
                report.concurrency,
                report.success_rate * 100.0,
                report.avg_generation_secs,
                report.system_throughput
            );

            let meets_thresholds = report.success_rate >= self.config.success_rate_threshold
                && report.avg_generation_secs <= self.config.latency_threshold_secs;
            if meets_thresholds && report.system_throughput > max_throughput {
                optimal_concurrency = report.concurrency;
                max_throughput = report.system_throughput;
            }

            let stop = !meets_thresholds;
            levels.push(report);
            if stop {
                info!("threshold crossed, sweep complete");
                break;
            }

            tokio::time::sleep(Duration::from_secs(5)).await;
        }

        Ok(SweepReport {
            optimal_concurrency,
            max_throughput,
            levels,
        })
    }

    /// Make sure the model is installed, pulling it when missing
    async fn ensure_model(&self) -> Result<bool> {
        let tags: TagsResponse = self
            .client
            .get(format!("{}/api/tags", self.config.url))
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?
            .json()
            .await?;

        if tags.models.iter().any(|m| m.name == self.config.model) {
            return Ok(true);
        }

        info!(model = %self.config.model, "model missing, pulling");
        self.pull_model().await
    }

    async fn pull_model(&self) -> Result<bool> {
        let response = self
            .client
            .post(format!("{}/api/pull", self.config.url))
            .json(&json!({ "name": self.config.model, "stream": true }))
            .send()
            .await
            .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Ok(false);
        }

        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:40.cyan/blue}] {bytes}/{total_bytes}")
                .unwrap()
                .progress_chars("=>-"),
        );
        bar.set_message(self.config.model.clone());

        let mut objects = JsonObjectStream::new();
        let mut bytes = response.bytes_stream();
        while let Some(chunk) = bytes.next().await {
            let chunk = chunk.map_err(|err| AppError::StreamRead(err.to_string()))?;
            for object in objects.push(&chunk)? {
                let Ok(progress) = serde_json::from_str::<PullProgress>(&object) else {
                    continue;
                };
                if progress.total > 0 {
                    bar.set_length(progress.total);
                    bar.set_position(progress.completed);
                }
                if progress.status == "success" {
                    bar.finish_and_clear();
                    return Ok(true);
                }
            }
        }
        bar.finish_and_clear();
        Ok(false)
    }

    /// Ask the server to drop the model from memory
    async fn unload_model(&self) {
        let result = self
            .client
            .post(format!("{}/api/generate", self.config.url))
            .json(&json!({
                "model": self.config.model,
                "prompt": "",
                "stream": false,
                "keep_alive": 0,
            }))
            .send()
            .await;
        if let Err(err) = result {
            warn!(error = %err, "model unload failed");
        }
    }
}

/// One non-streaming generate call with its timing metrics
async fn generate_once(
    client: Client,
    url: String,
    model: String,
    num_predict: u32,
) -> Result<RequestSample> {
    let prompt = *QUESTIONS
        .choose(&mut rand::thread_rng())
        .expect("question pool is non-empty");

    let response = client
        .post(format!("{url}/api/generate"))
        .json(&json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "keep_alive": "5m",
            "options": { "temperature": 0.7, "num_predict": num_predict },
        }))
        .send()
        .await
        .map_err(|err| AppError::UpstreamUnavailable(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UpstreamHttp {
            status: status.as_u16(),
        });
    }

    let body: GenerateResponse = response.json().await?;
    let tokens_per_second = if body.eval_duration > 0 {
        body.eval_count as f64 / body.eval_duration as f64 * 1e9
    } else {
        0.0
    };
    Ok(RequestSample {
        eval_count: body.eval_count,
        eval_duration_secs: body.eval_duration as f64 / 1e9,
        total_duration_secs: body.total_duration as f64 / 1e9,
        tokens_per_second,
    })
}

/// Sample host CPU and memory, flagging loads past the 90% guardrail
pub fn host_health() -> (bool, HostMetrics) {
    let mut sys = System::new_all();
    sys.refresh_cpu();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu();
    sys.refresh_memory();

    let cpu_percent = sys.global_cpu_info().cpu_usage();
    let memory_percent = if sys.total_memory() > 0 {
        (sys.used_memory() as f32 / sys.total_memory() as f32) * 100.0
    } else {
        0.0
    };

    let metrics = HostMetrics {
        cpu_percent,
        memory_percent,
    };
    (cpu_percent < 90.0 && memory_percent < 90.0, metrics)
}

fn progress_bar(total: u64, label: &str) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap()
            .progress_chars("=>-"),
    );
    bar.set_message(label.to_string());
    bar
}
