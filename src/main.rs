use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;

use agentflow_rs::adk::context::ExecutionContext;
use agentflow_rs::adk::model::openai::OpenAIModel;
use agentflow_rs::adk::model::LanguageModel;
use agentflow_rs::agentflow::workflow::compiler::WorkflowCompiler;
use agentflow_rs::agentflow::workflow::config::EngineConfig;
use agentflow_rs::agentflow::workflow::graph::GraphExecutor;
use agentflow_rs::agentflow::workflow::loader::DefinitionLoader;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a workflow definition and print its final output
    Run {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,

        /// JSON object merged over the definition's initial state
        #[arg(short, long)]
        state: Option<String>,

        /// Maximum node executions for this run
        #[arg(long)]
        step_limit: Option<usize>,
    },
    /// Build a workflow definition and print its record
    Validate {
        /// Path to the workflow file (YAML or JSON)
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Send a single prompt to the language model
    Prompt {
        /// The prompt to send
        #[arg(short, long)]
        prompt: String,

        /// The model to use (defaults to MODEL_NAME or gpt-4o-mini)
        #[arg(short, long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let config = EngineConfig::from_env()?;

    match args.command {
        Commands::Run {
            file,
            state,
            step_limit,
        } => {
            let def = DefinitionLoader::new()
                .load_workflow(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            let mut compiled = WorkflowCompiler::new(config.clone()).compile(&def)?;

            if let Some(raw) = state {
                let overrides: serde_json::Value =
                    serde_json::from_str(&raw).context("parsing --state")?;
                let serde_json::Value::Object(overrides) = overrides else {
                    anyhow::bail!("--state must be a JSON object");
                };
                for (key, value) in overrides {
                    compiled.initial_state.set(key, value);
                }
            }

            let mut ctx = ExecutionContext::from_config(&config);
            match OpenAIModel::from_env(config.model_timeout()) {
                Ok(model) => ctx = ctx.with_model(Arc::new(model)),
                Err(e) => log::warn!("Language model unavailable: {}", e),
            }

            let limit = step_limit.unwrap_or(compiled.step_limit);
            println!("Running workflow: {}", compiled.graph.name());

            let mut executor = GraphExecutor::new(&compiled.graph);
            let final_state = executor
                .execute(compiled.initial_state.clone(), limit, &ctx)
                .await?;

            log::info!("Visited: {}", executor.visited().join(" -> "));
            match final_state.final_output()? {
                serde_json::Value::String(text) => println!("{}", text),
                other => println!("{}", serde_json::to_string_pretty(other)?),
            }
        }
        Commands::Validate { file } => {
            let def = DefinitionLoader::new()
                .load_workflow(&file)
                .with_context(|| format!("loading {}", file.display()))?;
            let compiled = WorkflowCompiler::new(config).compile(&def)?;

            println!("{}", serde_json::to_string_pretty(&compiled.graph.record())?);
        }
        Commands::Prompt { prompt, model } => {
            let model_name = model.unwrap_or_else(|| config.default_model.clone());
            let service = OpenAIModel::from_env(config.model_timeout())?;

            log::info!("Using model: {}", model_name);
            println!("Sending prompt: {}", prompt);
            let response = service
                .complete(&prompt, &model_name, config.max_tokens)
                .await?;
            println!("Response: {}", response);
        }
    }

    Ok(())
}
