use std::path::PathBuf;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::info;

use easyrag::config::{BackendKind, BackendSection, EasyRagConfig};
use easyrag::{
    BackendAdapter, Core, CoreEvent, FunctionTool, Model, QueryOptions, ToolParameter,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Backend {
    Ollama,
    Openai,
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file; overrides the backend flags below
    #[arg(long)]
    config: Option<PathBuf>,

    /// Backend to talk to
    #[arg(long, value_enum, default_value = "ollama")]
    backend: Backend,

    /// Base URL for the API endpoint (defaults to the backend's own)
    #[arg(long)]
    base_url: Option<String>,

    /// Environment variable holding the API key
    #[arg(long, default_value = "OPENAI_API_KEY")]
    api_key_env: String,

    /// Model to use for chat
    #[arg(long, default_value = "llama3.1")]
    model: String,

    /// The user message
    #[arg(long, default_value = "What do I need to do today?")]
    message: String,
}

fn config_from_args(args: &Args) -> Result<EasyRagConfig> {
    if let Some(path) = &args.config {
        return Ok(EasyRagConfig::load(path)?);
    }

    let (kind, api_key_env) = match args.backend {
        Backend::Ollama => (BackendKind::Ollama, None),
        Backend::Openai => (BackendKind::OpenAI, Some(args.api_key_env.clone())),
    };

    let config = EasyRagConfig {
        backend: BackendSection {
            kind,
            base_url: args.base_url.clone(),
            api_key_env,
            timeout_seconds: Some(120),
            http_max_retries: None,
        },
        models: vec![Model::chat(&args.model)],
        conversation: easyrag::config::ConversationSection::default(),
        settings: easyrag::config::Settings::default(),
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config = config_from_args(&args)?;
    let mut core = Core::from_config(&config)?.with_event_callback(|event| async move {
        match event {
            CoreEvent::RequestSent { backend, attempt } => {
                info!("-> {backend} (attempt {attempt})");
            }
            CoreEvent::Retrying { attempt, max_retries } => {
                info!("Inconclusive reply, retry {attempt}/{max_retries}");
            }
            CoreEvent::ToolResult { name, result, success } => {
                info!("Tool {name} ({}): {result}", if success { "ok" } else { "failed" });
            }
            CoreEvent::Final(answer) => info!("Final answer: {answer}"),
        }
    });

    core.register_tool(FunctionTool::new(
        "schedule",
        "Returns the user's schedule for today",
        vec![],
        |_args, _ctx| async { Ok("Paint the garage".to_string()) },
    ));
    core.register_tool(FunctionTool::new(
        "weather",
        "Returns the current weather for a US zip code",
        vec![ToolParameter::string("zipCode", "A five digit US zip code").required()],
        |args, _ctx| async move {
            let zip = args["zipCode"].as_str().unwrap_or_default().to_string();
            Ok(format!("It is 72F and sunny in {zip}"))
        },
    ));

    info!("Schedule Demo");
    info!("=============");
    info!("Backend: {}", core.adapter.name());
    info!("Tools: {}", core.tools.tool_names().join(", "));
    info!("Message: {}", args.message);

    let start_time = Instant::now();
    let answer = core.query(&args.message, QueryOptions::default()).await?;

    println!("Assistant: {answer}");
    info!("Total request time: {:.2?}", start_time.elapsed());
    info!(
        "Conversation now holds {} messages",
        core.conversation.messages().len()
    );

    Ok(())
}
