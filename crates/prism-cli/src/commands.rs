use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context as _, Result};
use clap::Subcommand;
use prism_core::{FileBackend, ProjectSnapshot, SpecStore};
use prism_suggest::{Assistant, ConversationSession, DocumentGenerator, HttpAssistant, LlmAssistant};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::live::LiveReply;

/// Shared by all commands.
pub struct Context {
    endpoint: Option<String>,
}

impl Context {
    pub fn new(endpoint: Option<String>) -> Self {
        Self { endpoint }
    }

    fn store(&self) -> SpecStore<FileBackend> {
        SpecStore::open(FileBackend::default_location())
    }

    /// The HTTP endpoints when an endpoint is given, otherwise the hosted
    /// model with local settings.
    fn assistant(&self) -> Result<Box<dyn Assistant>> {
        match &self.endpoint {
            Some(url) => {
                tracing::debug!(endpoint = %url, "using remote endpoints");
                Ok(Box::new(HttpAssistant::new(url.clone())))
            }
            None => {
                let assistant = LlmAssistant::new(prism_core::read_settings())
                    .context("cannot reach the model (try `prism config set` or --endpoint)")?;
                Ok(Box::new(assistant))
            }
        }
    }
}

pub async fn chat(ctx: &Context) -> Result<()> {
    let assistant = ctx.assistant()?;
    let mut store = ctx.store();
    let mut session = ConversationSession::new();

    for (_, text) in session.transcript() {
        println!("prism> {text}\n");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "/quit" | "/exit") {
            break;
        }

        print!("prism> ");
        let mut live = LiveReply::new();
        let result = session
            .submit(assistant.as_ref(), &mut store, line, |chunk| {
                print!("{}", live.push(chunk));
                let _ = std::io::stdout().flush();
            })
            .await;
        println!("{}\n", live.finish());

        match result {
            Ok(outcome) if outcome.extracted > 0 => {
                println!(
                    "  [{} constraint(s) recorded, {} total]\n",
                    outcome.extracted,
                    store.constraints().len()
                );
            }
            Ok(_) => {}
            // The exchange stays in the history; the user decides whether to resend
            Err(e) => eprintln!("error: {e}\n"),
        }
    }
    Ok(())
}

pub async fn generate(ctx: &Context, prompt: Option<&str>) -> Result<()> {
    let assistant = ctx.assistant()?;
    let mut store = ctx.store();
    if store.constraints().is_empty() {
        eprintln!("note: no constraints recorded yet; the draft will be generic");
    }

    let generator = DocumentGenerator::new();
    let result = generator
        .generate(assistant.as_ref(), &mut store, prompt, |chunk| {
            print!("{chunk}");
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();

    match result {
        Ok(_) => Ok(()),
        Err(e) => Err(e).context("document generation stopped; the partial draft was kept"),
    }
}

pub fn constraints(ctx: &Context, json: bool) -> Result<()> {
    let store = ctx.store();
    if json {
        println!("{}", serde_json::to_string_pretty(store.constraints())?);
        return Ok(());
    }
    if store.constraints().is_empty() {
        println!("No constraints recorded.");
        return Ok(());
    }
    for (category, members) in prism_core::group_by_category(store.constraints()) {
        println!("{category}");
        for c in members {
            println!("  - {}", c.content);
        }
    }
    Ok(())
}

pub fn document(ctx: &Context) -> Result<()> {
    println!("{}", ctx.store().markdown());
    Ok(())
}

pub fn set_document(ctx: &Context, file: &Path) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("could not read {}", file.display()))?;
    ctx.store().set_markdown(text);
    Ok(())
}

pub fn clear_constraints(ctx: &Context) -> Result<()> {
    ctx.store().clear_constraints();
    println!("Constraints cleared.");
    Ok(())
}

pub fn reset(ctx: &Context) -> Result<()> {
    ctx.store().reset();
    println!("Project reset.");
    Ok(())
}

pub fn export(ctx: &Context, dir: &Path) -> Result<()> {
    let store = ctx.store();
    let path = prism_core::snapshot::export_to_dir(store.state(), dir, chrono::Utc::now())?;
    println!("Exported to {}", path.display());
    Ok(())
}

pub fn import(ctx: &Context, file: &Path) -> Result<()> {
    let mut store = ctx.store();
    let count = store.import_file(file)?;
    println!("Imported {count} constraint(s) and the document.");
    Ok(())
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the current settings (the API key is never printed)
    Show,

    /// Change settings; omitted values are kept
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// An empty value keeps the stored key
        #[arg(long)]
        api_key: Option<String>,
    },
}

pub fn config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let settings = prism_core::read_settings();
            let summary = serde_json::json!({
                "provider": settings.provider,
                "model": settings.model,
                "hasKey": prism_core::resolve_api_key(&settings).is_some(),
                "configured": prism_core::ai_configured(&settings),
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        ConfigAction::Set {
            provider,
            model,
            api_key,
        } => {
            let mut settings = prism_core::read_settings();
            if let Some(provider) = provider {
                if provider.is_empty() {
                    bail!("provider must not be empty");
                }
                settings.provider = provider;
            }
            if let Some(model) = model {
                if model.is_empty() {
                    bail!("model must not be empty");
                }
                settings.model = model;
            }
            if let Some(key) = api_key.filter(|k| !k.is_empty()) {
                settings.api_key = key;
            }
            prism_core::write_settings(&settings)?;
            println!("Settings saved.");
        }
    }
    Ok(())
}

pub fn schema() -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&ProjectSnapshot::json_schema())?);
    Ok(())
}
