use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde_json::{json, Value};
use tokio::time::{sleep, Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::client::ConcentrateClient;
use crate::prompts::PromptLibrary;
use crate::schemas::{
    ChatMessage, CompletionRequest, ExperimentRecord, Metrics, PhaseTally, RecordContext,
    ResultsAggregate,
};
use crate::settings::Settings;

const PERFORMANCE_REQUESTS: usize = 5;
const PERFORMANCE_PROMPT: &str = "Count from 1 to 10.";
const PERFORMANCE_PACING: Duration = Duration::from_millis(300);
const STORY_PROMPT: &str = "Write a creative short story about a robot learning to paint.";
const INVALID_MODEL: &str = "invalid/model-name";

const INTERRUPTED_FILENAME: &str = "experiment_results_interrupted.json";
const ERROR_FILENAME: &str = "experiment_results_error.json";

fn context<const N: usize>(fields: [(&str, Value); N]) -> RecordContext {
    fields
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

/// Drives the experiment phases against a shared client and owns the
/// append-only record sequence for the run. Records are only ever appended,
/// and only by the driving task; concurrent calls hand their outcomes back
/// before anything is recorded.
pub struct ExperimentRunner {
    client: ConcentrateClient,
    openai_models: Vec<String>,
    anthropic_models: Vec<String>,
    /// Model used by single-model phases: first OpenAI model, else the
    /// configured fallback.
    primary_model: String,
    pacing: Duration,
    output_dir: PathBuf,
    run_id: Uuid,
    results: Vec<ExperimentRecord>,
}

impl ExperimentRunner {
    pub fn new(client: ConcentrateClient, settings: &Settings) -> Self {
        Self {
            client,
            openai_models: settings.openai_models.clone(),
            anthropic_models: settings.anthropic_models.clone(),
            primary_model: settings.probe_model().to_string(),
            pacing: Duration::from_millis(settings.pacing_ms),
            output_dir: settings.output_dir.clone(),
            run_id: Uuid::new_v4(),
            results: Vec::new(),
        }
    }

    pub fn records(&self) -> &[ExperimentRecord] {
        &self.results
    }

    /// Runs every phase in order. Call failures never abort a phase; the
    /// only error that can surface here is a panicked concurrent task.
    pub async fn run_all(&mut self) -> Result<(), tokio::task::JoinError> {
        self.run_multi_provider_comparison().await;
        self.run_parameter_exploration().await;
        self.run_reasoning_comparison().await;
        self.run_edge_cases().await;
        self.run_performance_testing().await
    }

    /// Experiment 1: identical prompts across OpenAI and Anthropic models.
    pub async fn run_multi_provider_comparison(&mut self) {
        info!("experiment 1: multi-provider comparison");

        let providers = [
            ("openai", first_two(&self.openai_models)),
            ("anthropic", first_two(&self.anthropic_models)),
        ];

        for prompt in PromptLibrary::simple_qa() {
            info!("testing prompt: {}", prompt.name);
            for (provider, models) in &providers {
                for model in models {
                    let request = CompletionRequest::new(
                        model.clone(),
                        vec![ChatMessage::user(prompt.content)],
                    )
                    .temperature(0.7)
                    .max_tokens(256);

                    let ctx = context([
                        ("prompt_name", json!(prompt.name)),
                        ("provider", json!(provider)),
                        ("model", json!(model)),
                        ("prompt", json!(prompt.content)),
                    ]);
                    self.call_and_record("multi_provider_comparison", ctx, &request)
                        .await;
                    sleep(self.pacing).await;
                }
            }
        }
    }

    /// Experiment 2: temperature and max_tokens sweeps on one model.
    pub async fn run_parameter_exploration(&mut self) {
        info!("experiment 2: parameter exploration");

        let model = self.primary_model.clone();

        info!("testing temperature variations");
        for temperature in [0.0, 0.5, 1.0, 1.5] {
            let request =
                CompletionRequest::new(model.clone(), vec![ChatMessage::user(STORY_PROMPT)])
                    .temperature(temperature)
                    .max_tokens(200);

            let ctx = context([
                ("parameter", json!("temperature")),
                ("value", json!(temperature)),
                ("model", json!(model)),
                ("prompt", json!(STORY_PROMPT)),
            ]);
            self.call_and_record("parameter_exploration", ctx, &request)
                .await;
            sleep(self.pacing).await;
        }

        info!("testing max_tokens variations");
        for max_tokens in [50u32, 150, 300] {
            let request = CompletionRequest::new(
                model.clone(),
                vec![ChatMessage::user("Explain machine learning in detail.")],
            )
            .temperature(0.7)
            .max_tokens(max_tokens);

            let ctx = context([
                ("parameter", json!("max_tokens")),
                ("value", json!(max_tokens)),
                ("model", json!(model)),
            ]);
            self.call_and_record("parameter_exploration", ctx, &request)
                .await;
            sleep(self.pacing).await;
        }
    }

    /// Experiment 3: reasoning prompts across both providers' models.
    pub async fn run_reasoning_comparison(&mut self) {
        info!("experiment 3: reasoning comparison");

        let mut models = first_two(&self.openai_models);
        models.extend(first_two(&self.anthropic_models));

        for prompt in PromptLibrary::reasoning() {
            info!("testing: {}", prompt.name);
            for model in &models {
                let request =
                    CompletionRequest::new(model.clone(), vec![ChatMessage::user(prompt.content)])
                        .temperature(0.3)
                        .max_tokens(512);

                let ctx = context([
                    ("prompt_name", json!(prompt.name)),
                    ("model", json!(model)),
                    ("prompt", json!(prompt.content)),
                ]);
                self.call_and_record("reasoning_comparison", ctx, &request)
                    .await;
                sleep(self.pacing).await;
            }
        }
    }

    /// Experiment 4: edge-case prompts plus the negative-path check that an
    /// invalid model identifier is rejected by the client.
    pub async fn run_edge_cases(&mut self) {
        info!("experiment 4: edge cases and error handling");

        let model = self.primary_model.clone();

        for prompt in PromptLibrary::edge_cases() {
            info!("testing edge case: {}", prompt.name);
            let request =
                CompletionRequest::new(model.clone(), vec![ChatMessage::user(prompt.content)])
                    .temperature(0.7)
                    .max_tokens(256);

            let ctx = context([
                ("case_name", json!(prompt.name)),
                ("model", json!(model)),
                ("input", json!(truncate(prompt.content, 100))),
            ]);
            self.call_and_record("edge_cases", ctx, &request).await;
            sleep(self.pacing).await;
        }

        info!("testing invalid model name");
        let request =
            CompletionRequest::new(INVALID_MODEL, vec![ChatMessage::user("Test")]);
        match self.client.execute(&request).await {
            Err(e) => {
                info!("correctly rejected invalid model: {}", e);
                self.results.push(ExperimentRecord::failure(
                    "edge_cases",
                    context([
                        ("case_name", json!("invalid_model")),
                        ("handled", json!(true)),
                    ]),
                    e.to_string(),
                ));
            }
            Ok(_) => {
                error!("invalid model {} was accepted by the gateway", INVALID_MODEL);
                self.results.push(ExperimentRecord::failure(
                    "edge_cases",
                    context([
                        ("case_name", json!("invalid_model")),
                        ("handled", json!(false)),
                    ]),
                    format!("invalid model {INVALID_MODEL} was accepted"),
                ));
            }
        }
    }

    /// Experiment 5: sequential latency sweep, then the same batch issued
    /// concurrently and timed around the whole batch. Individual call
    /// failures never cancel sibling tasks.
    pub async fn run_performance_testing(&mut self) -> Result<(), tokio::task::JoinError> {
        info!("experiment 5: performance testing");

        let model = self.primary_model.clone();
        let request = |_: usize| {
            CompletionRequest::new(model.clone(), vec![ChatMessage::user(PERFORMANCE_PROMPT)])
                .max_tokens(50)
        };

        info!("sequential requests ({})", PERFORMANCE_REQUESTS);
        let mut sequential_latencies = Vec::new();
        for index in 0..PERFORMANCE_REQUESTS {
            let ctx = context([
                ("test_type", json!("sequential")),
                ("index", json!(index)),
                ("model", json!(model)),
            ]);
            if let Some(metrics) = self
                .call_and_record("performance_testing", ctx, &request(index))
                .await
            {
                sequential_latencies.push(metrics.latency_ms);
            }
            sleep(PERFORMANCE_PACING).await;
        }

        if !sequential_latencies.is_empty() {
            let avg = sequential_latencies.iter().sum::<f64>() / sequential_latencies.len() as f64;
            info!("average sequential latency: {:.2}ms", avg);
            self.results.push(ExperimentRecord::summary(
                "performance_testing",
                context([
                    ("test_type", json!("sequential_summary")),
                    ("num_requests", json!(PERFORMANCE_REQUESTS)),
                    ("avg_latency_ms", json!(avg)),
                    ("latencies", json!(sequential_latencies)),
                ]),
            ));
        }

        info!("concurrent requests ({})", PERFORMANCE_REQUESTS);
        let batch_started = Instant::now();
        let mut handles = Vec::with_capacity(PERFORMANCE_REQUESTS);
        for index in 0..PERFORMANCE_REQUESTS {
            let client = self.client.clone();
            let call = request(index);
            handles.push(tokio::spawn(
                async move { (index, client.execute(&call).await) },
            ));
        }

        let mut concurrent_latencies = Vec::new();
        for handle in handles {
            let (index, outcome) = handle.await?;
            let ctx = context([
                ("test_type", json!("concurrent")),
                ("index", json!(index)),
                ("model", json!(model)),
            ]);
            match outcome {
                Ok(result) => {
                    concurrent_latencies.push(result.metrics.latency_ms);
                    self.results.push(ExperimentRecord::success(
                        "performance_testing",
                        ctx,
                        result.content,
                        result.metrics,
                    ));
                }
                Err(e) => {
                    warn!("concurrent request {} failed: {}", index + 1, e);
                    self.results.push(ExperimentRecord::failure(
                        "performance_testing",
                        ctx,
                        e.to_string(),
                    ));
                }
            }
        }
        let total_time_ms = batch_started.elapsed().as_secs_f64() * 1000.0;

        if !concurrent_latencies.is_empty() {
            let avg = concurrent_latencies.iter().sum::<f64>() / concurrent_latencies.len() as f64;
            info!("concurrent batch total: {:.2}ms, average latency: {:.2}ms", total_time_ms, avg);
            self.results.push(ExperimentRecord::summary(
                "performance_testing",
                context([
                    ("test_type", json!("concurrent_summary")),
                    ("num_requests", json!(PERFORMANCE_REQUESTS)),
                    ("total_time_ms", json!(total_time_ms)),
                    ("avg_latency_ms", json!(avg)),
                    ("latencies", json!(concurrent_latencies)),
                ]),
            ));
        }

        Ok(())
    }

    /// Per-phase success/failure tally. A tally, not a statistical rollup.
    pub fn summarize(&self) -> BTreeMap<String, PhaseTally> {
        let mut tallies: BTreeMap<String, PhaseTally> = BTreeMap::new();
        for record in &self.results {
            let tally = tallies.entry(record.experiment().to_string()).or_default();
            tally.total += 1;
            if record.is_failure() {
                tally.failed += 1;
            } else {
                tally.success += 1;
            }
        }
        tallies
    }

    pub fn log_summary(&self) {
        info!("experiment summary:");
        for (experiment, tally) in self.summarize() {
            info!(
                "  {}: {} total, {} successful, {} failed",
                experiment, tally.total, tally.success, tally.failed
            );
        }
    }

    /// Persists whatever records have accumulated so far. Used for normal
    /// completion and for interrupted or errored early exits alike.
    pub fn save_results(
        &self,
        filename: Option<&str>,
    ) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        fs::create_dir_all(&self.output_dir)?;

        let filename = filename.map(String::from).unwrap_or_else(|| {
            format!("experiment_results_{}.json", Utc::now().format("%Y%m%d_%H%M%S"))
        });
        let path = self.output_dir.join(filename);

        let aggregate = ResultsAggregate {
            run_id: self.run_id,
            timestamp: Utc::now(),
            total_experiments: self.results.len(),
            results: &self.results,
        };
        fs::write(&path, serde_json::to_string_pretty(&aggregate)?)?;

        info!("results saved to: {}", path.display());
        Ok(path)
    }

    pub fn save_interrupted(&self) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        self.save_results(Some(INTERRUPTED_FILENAME))
    }

    pub fn save_errored(&self) -> Result<PathBuf, Box<dyn std::error::Error + Send + Sync>> {
        self.save_results(Some(ERROR_FILENAME))
    }

    /// Issues one call and appends exactly one record for it. Failures are
    /// downgraded to records so the surrounding phase always continues.
    async fn call_and_record(
        &mut self,
        experiment: &str,
        ctx: RecordContext,
        request: &CompletionRequest,
    ) -> Option<Metrics> {
        match self.client.execute(request).await {
            Ok(result) => {
                info!(
                    "  ok {}: {}ms, {} tokens",
                    request.model, result.metrics.latency_ms, result.metrics.total_tokens
                );
                let metrics = result.metrics.clone();
                self.results.push(ExperimentRecord::success(
                    experiment,
                    ctx,
                    result.content,
                    result.metrics,
                ));
                Some(metrics)
            }
            Err(e) => {
                warn!("  failed {}: {}", request.model, e);
                self.results
                    .push(ExperimentRecord::failure(experiment, ctx, e.to_string()));
                None
            }
        }
    }
}

fn first_two(models: &[String]) -> Vec<String> {
    models.iter().take(2).cloned().collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        text.to_string()
    }
}
