use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use rmcp::{ServiceExt, transport::stdio};

use promode::compare::Comparison;
use promode::config::Config;
use promode::pro_mode::ProMode;
use promode::response::ProModeResult;
use promode::server::ProModeServer;

#[derive(Debug, Parser)]
#[command(
    name = "promode",
    version,
    about = "Generate several candidate answers with a local model and synthesize the best one"
)]
struct Cli {
    #[command(flatten)]
    endpoint: EndpointArgs,

    #[command(subcommand)]
    command: Command,
}

/// Overrides applied on top of the config file and `PROMODE_*` env vars.
#[derive(Debug, Args)]
struct EndpointArgs {
    /// Model id loaded in the inference server
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(short = 'u', long = "url", global = true)]
    base_url: Option<String>,

    /// Max tokens per candidate and for synthesis
    #[arg(long, global = true)]
    max_tokens: Option<u32>,

    /// Max candidate requests in flight
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run pro mode once and print the synthesized answer
    Run {
        /// The prompt to process
        prompt: String,

        /// Number of candidate generations
        #[arg(short = 'n', long = "num-candidates", default_value_t = 5)]
        num_candidates: usize,

        /// System prompt applied to every candidate
        #[arg(long)]
        system: Option<String>,

        /// Also print every successful candidate
        #[arg(long)]
        show_candidates: bool,

        /// Print the full result as JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Time one plain completion against a pro-mode run on the same prompt
    Compare {
        prompt: String,

        /// Number of candidate generations on the pro-mode side
        #[arg(short = 'n', long = "num-candidates", default_value_t = 5)]
        num_candidates: usize,

        /// System prompt for the baseline and every candidate
        #[arg(long)]
        system: Option<String>,

        #[arg(long)]
        json: bool,
    },
    /// Serve the `pro_mode` tool over MCP stdio
    Serve,
}

impl EndpointArgs {
    fn apply(self, config: &mut Config) {
        if let Some(v) = self.model {
            config.model = v;
        }
        if let Some(v) = self.base_url {
            config.base_url = v;
        }
        if let Some(v) = self.max_tokens {
            config.max_tokens = v;
        }
        if let Some(v) = self.workers {
            config.max_workers = v;
        }
        if let Some(v) = self.timeout_secs {
            config.request_timeout_secs = v;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stderr only: stdout carries the answer (run) or the MCP stream (serve).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::load();
    cli.endpoint.apply(&mut config);

    let pro_mode = ProMode::from_config(config).context("invalid configuration")?;

    match cli.command {
        Command::Run {
            prompt,
            num_candidates,
            system,
            show_candidates,
            json,
        } => {
            let mut params = pro_mode.config().generation_params();
            params.system_prompt = system;

            let result = pro_mode
                .run(&prompt, num_candidates, &params)
                .await
                .context("pro mode failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_result(&result, show_candidates);
            }
        }
        Command::Compare {
            prompt,
            num_candidates,
            system,
            json,
        } => {
            let mut params = pro_mode.config().generation_params();
            params.system_prompt = system;

            let comparison = pro_mode
                .compare(&prompt, num_candidates, &params)
                .await
                .context("comparison failed")?;

            if json {
                println!("{}", serde_json::to_string_pretty(&comparison)?);
            } else {
                print_comparison(&comparison);
            }
        }
        Command::Serve => {
            tracing::info!("promode MCP server starting");
            let server = ProModeServer::new(Arc::new(pro_mode));
            let service = server
                .serve(stdio())
                .await
                .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;
            service.waiting().await?;
            tracing::info!("promode MCP server shutting down");
        }
    }

    Ok(())
}

fn print_result(result: &ProModeResult, show_candidates: bool) {
    let rule = "=".repeat(50);
    println!("{rule}\nFINAL SYNTHESIZED ANSWER:\n{rule}");
    println!("{}", result.final_text);

    if show_candidates {
        println!("\n{rule}\nCANDIDATE RESPONSES:\n{rule}");
        for (i, candidate) in result.candidates.iter().enumerate() {
            println!("\n--- Candidate {} ---\n{candidate}", i + 1);
        }
    }

    let stats = &result.stats;
    eprintln!(
        "\n{} candidates ({} failed), synthesis {:.1} tok/s, TTFT {:.3}s, total {:.2}s, {} completion tokens",
        result.candidates.len(),
        result.failed.len(),
        stats.synthesis.tokens_per_second,
        stats.synthesis.time_to_first_token,
        stats.total_duration.as_secs_f64(),
        stats.total_completion_tokens()
    );
}

fn print_comparison(comparison: &Comparison) {
    let rule = "-".repeat(40);
    let baseline = &comparison.baseline;
    println!("1. STANDARD SINGLE RESPONSE\n{rule}");
    println!(
        "Response time: {:.2}s | {:.1} tok/s | TTFT {:.3}s",
        comparison.baseline_duration.as_secs_f64(),
        baseline.tokens_per_second,
        baseline.time_to_first_token
    );
    println!("\n{}\n", baseline.text);

    println!("2. PRO-MODE SYNTHESIZED RESPONSE\n{rule}");
    println!(
        "Total time: {:.2}s | {} candidates ({} failed)",
        comparison.pro_mode_duration.as_secs_f64(),
        comparison.pro_mode.candidates.len(),
        comparison.pro_mode.failed.len()
    );
    println!("\n{}\n", comparison.pro_mode.final_text);

    println!(
        "Pro mode took {:.1}x as long as a single response.",
        comparison.time_ratio
    );
}
