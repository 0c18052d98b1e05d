// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Mermaide CLI entrypoint.
//!
//! `mermaide chat` runs an interactive session, `ask` and `outline` run a single turn, and
//! `mcp` serves the assistant over stdio or, with `--http-port`, over streamable HTTP at
//! `http://127.0.0.1:<port>/mcp`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mermaide::app::App;
use mermaide::config::{self, CliOverrides, ResolvedConfig};
use mermaide::controller::TurnOutcome;
use mermaide::error::AppError;
use mermaide::mcp::MermaideMcp;
use mermaide::model::{Diagram, ValidationResult};
use mermaide::outline::{OutlineError, OutlineOutcome};
use mermaide::prompt::{ChatCommand, ChatTurnRequest, HistoryTurn, Reference};
use mermaide::{logging, translate};

#[derive(Debug, Parser)]
#[command(name = "mermaide", version, about = "Draft, validate and repair Mermaid diagrams with a language model")]
struct Cli {
    /// Config file (default: $MERMAIDE_CONFIG, then ~/.config/mermaide/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Model name, overriding config and $MERMAIDE_MODEL.
    #[arg(long, global = true)]
    model: Option<String>,
    /// OpenAI-compatible endpoint, overriding config and $MERMAIDE_ENDPOINT.
    #[arg(long, global = true)]
    endpoint: Option<String>,
    /// Maximum candidate diagrams per turn.
    #[arg(long, global = true)]
    retries: Option<usize>,
    /// Accept every non-empty diagram without rendering it.
    #[arg(long, global = true)]
    no_validate: bool,
    /// Root for references, symbol lookups and the output directory.
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Interactive chat; `/help` lists the commands.
    Chat,
    /// Answer one request and exit.
    Ask {
        prompt: String,
        /// help, uml, flow or iterate.
        #[arg(long)]
        command: Option<String>,
        /// Attach a workspace file: `path`, `path:12` or `path:12-40`.
        #[arg(long = "ref")]
        references: Vec<String>,
        /// Document the request is about.
        #[arg(long)]
        focus: Option<PathBuf>,
    },
    /// Outline a source file as a diagram.
    Outline { file: PathBuf },
    /// Check a Mermaid file (raw or fenced markdown) and explain the first error.
    Validate { file: PathBuf },
    /// Render a Mermaid file to SVG with `mmdc`.
    Render {
        file: PathBuf,
        /// Defaults to the input path with an `.svg` extension.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Serve the assistant over MCP.
    Mcp {
        /// Serve streamable HTTP on this port instead of stdio (0 = ephemeral).
        #[arg(long)]
        http_port: Option<u16>,
    },
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            retries: self.retries,
            no_validate: self.no_validate,
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<ResolvedConfig, AppError> {
    let file = config::load_config_with_precedence(cli.config.clone())?;
    let resolved = config::apply_env_overrides(config::merge_config(file));
    Ok(config::apply_cli_overrides(resolved, &cli.overrides()))
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("mermaide: {err}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), AppError> {
    let config = resolve_config(&cli)?;
    if let Err(err) = logging::init(&config.log_file_path) {
        eprintln!("mermaide: logging disabled: {err}");
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async move {
        let app = App::build(config, cli.workspace)?;
        match cli.command {
            Command::Chat => repl(&app).await,
            Command::Ask {
                prompt,
                command,
                references,
                focus,
            } => ask(&app, prompt, command.as_deref(), &references, focus).await,
            Command::Outline { file } => outline(&app, &file).await,
            Command::Validate { file } => validate(&app, &file).await,
            Command::Render { file, output } => render(&app, &file, output).await,
            Command::Mcp { http_port } => serve_mcp(&app, http_port).await,
        }
    })
}

/// Runs `on_interrupt` on the first Ctrl-C until dropped.
struct Interrupt {
    task: JoinHandle<()>,
}

impl Interrupt {
    fn watch(on_interrupt: impl FnOnce() + Send + 'static) -> Self {
        let task = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                on_interrupt();
            }
        });
        Self { task }
    }

    fn cancelling(token: &CancellationToken) -> Self {
        let token = token.clone();
        Self::watch(move || token.cancel())
    }
}

impl Drop for Interrupt {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn ask(
    app: &App,
    prompt: String,
    command: Option<&str>,
    references: &[String],
    focus: Option<PathBuf>,
) -> Result<(), AppError> {
    let command = command.map(str::parse::<ChatCommand>).transpose()?;
    let mut request = ChatTurnRequest::new(prompt).with_command(command);
    request.references = references.iter().map(|raw| Reference::parse(raw)).collect();
    request.focus = focus;

    let name = app.config().output.document_name.clone();
    let mut sink = app.terminal_sink(&name);
    let mut view = app.document_view(&name);
    let cancel = CancellationToken::new();
    let _interrupt = Interrupt::cancelling(&cancel);

    let report = app
        .assistant()
        .respond(&request, &mut sink, &mut view, &cancel)
        .await?;
    println!();
    match report.outcome {
        TurnOutcome::Exhausted { retry, .. } => Err(AppError::InvalidDiagram(
            retry.errors().last().cloned().unwrap_or_default(),
        )),
        TurnOutcome::Success { .. } | TurnOutcome::Answered | TurnOutcome::Cancelled => Ok(()),
    }
}

async fn outline(app: &App, file: &Path) -> Result<(), AppError> {
    let service = Arc::new(app.outline());
    let name = outline_document_name(app);
    let mut sink = app.terminal_sink(&name);
    let mut view = app.document_view(&name);

    let outcome = {
        let interrupt_target = Arc::clone(&service);
        let _interrupt = Interrupt::watch(move || interrupt_target.cancel());
        service
            .refresh(Some(&app.workspace().join(file)), &mut sink, &mut view)
            .await?
    };
    println!();
    match outcome {
        OutlineOutcome::Failed { errors } => Err(AppError::InvalidDiagram(
            errors.last().cloned().unwrap_or_default(),
        )),
        OutlineOutcome::Generated(_) | OutlineOutcome::Cancelled | OutlineOutcome::NoDocument => {
            Ok(())
        }
    }
}

fn outline_document_name(app: &App) -> String {
    format!("{}-outline", app.config().output.document_name)
}

async fn read_diagram(path: &Path) -> Result<Diagram, AppError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| AppError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(Diagram::from_response(&raw))
}

fn explain(result: &ValidationResult) -> String {
    result
        .friendly_error()
        .or_else(|| result.error())
        .unwrap_or_default()
        .to_owned()
}

async fn validate(app: &App, file: &Path) -> Result<(), AppError> {
    let diagram = read_diagram(file).await?;
    let result = app
        .controller()
        .validator()
        .validate(&diagram, &CancellationToken::new())
        .await?
        .with_friendly_error(|raw| translate::friendly_error(raw, Some(diagram.content())));

    if result.is_success() {
        println!("valid {} diagram", diagram.kind().label());
        return Ok(());
    }
    if let Some(raw) = result.error() {
        info!(file = %file.display(), error = raw, "validation failed");
    }
    Err(AppError::InvalidDiagram(explain(&result)))
}

async fn render(app: &App, file: &Path, output: Option<PathBuf>) -> Result<(), AppError> {
    let diagram = read_diagram(file).await?;
    let output = output.unwrap_or_else(|| file.with_extension("svg"));
    let cancel = CancellationToken::new();
    let _interrupt = Interrupt::cancelling(&cancel);

    let result = app
        .mermaid_cli()
        .render_svg(&diagram, &output, &cancel)
        .await?
        .with_friendly_error(|raw| translate::friendly_error(raw, Some(diagram.content())));
    if result.is_success() {
        println!("{}", output.display());
        Ok(())
    } else {
        Err(AppError::InvalidDiagram(explain(&result)))
    }
}

async fn serve_mcp(app: &App, http_port: Option<u16>) -> Result<(), AppError> {
    let mcp = MermaideMcp::new(app.assistant());
    let Some(port) = http_port else {
        info!("serving MCP over stdio");
        return mcp
            .serve_stdio()
            .await
            .map_err(|err| AppError::Mcp(err.to_string()));
    };

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    let address = listener.local_addr()?;

    let config = StreamableHttpServerConfig {
        stateful_mode: true,
        ..StreamableHttpServerConfig::default()
    };
    let shutdown_token = config.cancellation_token.clone();
    let session_manager = Arc::new(LocalSessionManager::default());
    let mcp_service = {
        let mcp = mcp.clone();
        StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config)
    };
    let router = Router::new().nest_service("/mcp", mcp_service);

    info!(%address, "serving MCP over streamable HTTP");
    eprintln!("mermaide: MCP at http://{address}/mcp (Ctrl-C to stop)");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                warn!(error = %err, "ctrl-c handler failed");
            }
            shutdown_token.cancel();
        })
        .await?;
    Ok(())
}

/// One line typed at the chat prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReplInput {
    Empty,
    Quit,
    Follow(bool),
    Focus(PathBuf),
    Outline(Option<PathBuf>),
    Turn(ChatTurnRequest),
    Invalid(String),
}

fn parse_repl_line(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }

    if let Some(directive) = line.strip_prefix(':') {
        let (name, argument) = split_word(directive);
        return match (name, argument) {
            ("quit" | "q" | "exit", _) => ReplInput::Quit,
            ("follow", "on") => ReplInput::Follow(true),
            ("follow", "off") => ReplInput::Follow(false),
            ("follow", _) => ReplInput::Invalid("usage: :follow on|off".to_owned()),
            ("focus", "") => ReplInput::Invalid("usage: :focus <file>".to_owned()),
            ("focus", file) => ReplInput::Focus(PathBuf::from(file)),
            _ => ReplInput::Invalid(format!("unknown directive `:{name}`")),
        };
    }

    let (command, text) = match line.strip_prefix('/') {
        Some(rest) => {
            let (name, text) = split_word(rest);
            if name == "outline" {
                return ReplInput::Outline((!text.is_empty()).then(|| PathBuf::from(text)));
            }
            match name.parse::<ChatCommand>() {
                Ok(command) => (Some(command), text),
                Err(err) => return ReplInput::Invalid(err.to_string()),
            }
        }
        None => (None, line),
    };

    let (prompt, references) = split_references(text);
    let mut request = ChatTurnRequest::new(prompt).with_command(command);
    request.references = references;
    ReplInput::Turn(request)
}

fn split_word(text: &str) -> (&str, &str) {
    match text.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (text, ""),
    }
}

/// `@path`, `@path:12` and `@path:12-40` words become references.
fn split_references(text: &str) -> (String, Vec<Reference>) {
    let mut words = Vec::new();
    let mut references = Vec::new();
    for word in text.split_whitespace() {
        match word.strip_prefix('@').filter(|rest| !rest.is_empty()) {
            Some(reference) => references.push(Reference::parse(reference)),
            None => words.push(word),
        }
    }
    (words.join(" "), references)
}

fn prompt_marker() {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "> ").and_then(|()| stderr.flush());
}

async fn repl(app: &App) -> Result<(), AppError> {
    let assistant = app.assistant();
    let outline = Arc::new(app.outline());
    let chat_name = app.config().output.document_name.clone();
    let outline_name = outline_document_name(app);
    let mut history: Vec<HistoryTurn> = Vec::new();

    eprintln!("mermaide chat: /help for commands, :quit to leave");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt_marker();
    while let Some(line) = lines.next_line().await? {
        match parse_repl_line(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => break,
            ReplInput::Invalid(message) => eprintln!("{message}"),
            ReplInput::Turn(mut request) => {
                request.history = history.clone();
                request.focus = app.session().last_focused();
                let mut sink = app.terminal_sink(&chat_name);
                let mut view = app.document_view(&chat_name);
                let cancel = CancellationToken::new();
                let _interrupt = Interrupt::cancelling(&cancel);
                match assistant
                    .respond(&request, &mut sink, &mut view, &cancel)
                    .await
                {
                    Ok(report) => {
                        println!();
                        if report.outcome != TurnOutcome::Answered {
                            history.push(HistoryTurn::Request {
                                prompt: request.prompt,
                                references: request.references,
                            });
                            history.push(HistoryTurn::Response(report.transcript));
                        }
                    }
                    Err(err) => eprintln!("mermaide: {err}"),
                }
            }
            input @ (ReplInput::Follow(_) | ReplInput::Focus(_) | ReplInput::Outline(_)) => {
                let mut sink = app.terminal_sink(&outline_name);
                let mut view = app.document_view(&outline_name);
                let interrupt_target = Arc::clone(&outline);
                let _interrupt = Interrupt::watch(move || interrupt_target.cancel());
                let result = match input {
                    ReplInput::Follow(follow) => {
                        eprintln!("follow mode {}", if follow { "on" } else { "off" });
                        outline.set_follow(follow, &mut sink, &mut view).await
                    }
                    ReplInput::Focus(file) => {
                        outline
                            .active_document_changed(&app.workspace().join(file), &mut sink, &mut view)
                            .await
                    }
                    ReplInput::Outline(file) => {
                        let file = file.map(|file| app.workspace().join(file));
                        outline.refresh(file.as_deref(), &mut sink, &mut view).await.map(Some)
                    }
                    _ => Ok(None),
                };
                report_outline(result);
            }
        }
        prompt_marker();
    }
    outline.cancel();
    Ok(())
}

fn report_outline(result: Result<Option<OutlineOutcome>, OutlineError>) {
    match result {
        Ok(Some(OutlineOutcome::Generated(_))) => println!(),
        Ok(Some(OutlineOutcome::Failed { errors })) => {
            println!();
            eprintln!("outline failed after {} attempts", errors.len());
        }
        Ok(Some(OutlineOutcome::NoDocument)) => {
            eprintln!("no document to outline; use `:focus <file>` or `/outline <file>`");
        }
        Ok(Some(OutlineOutcome::Cancelled)) => eprintln!("outline cancelled"),
        Ok(None) => {}
        Err(err) => eprintln!("mermaide: {err}"),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use clap::{CommandFactory, Parser};
    use mermaide::config::ValidatorKind;
    use mermaide::prompt::{ChatCommand, Reference};

    use super::{parse_repl_line, Cli, Command, ReplInput};

    #[test]
    fn clap_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_become_overrides() {
        let cli = Cli::try_parse_from([
            "mermaide",
            "ask",
            "draw the login flow",
            "--ref",
            "src/login.rs:10-40",
            "--model",
            "gpt-4o-mini",
            "--retries",
            "2",
            "--no-validate",
        ])
        .expect("parse");

        let overrides = cli.overrides();
        assert_eq!(overrides.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(overrides.retries, Some(2));
        assert!(overrides.no_validate);
        let Command::Ask { references, .. } = cli.command else {
            panic!("expected ask");
        };
        assert_eq!(references, vec!["src/login.rs:10-40".to_owned()]);

        let resolved = mermaide::config::apply_cli_overrides(Default::default(), &overrides);
        assert_eq!(resolved.validator.kind, ValidatorKind::None);
        assert_eq!(resolved.retry.ceiling, 2);
    }

    #[test]
    fn mcp_http_port_is_optional() {
        let cli = Cli::try_parse_from(["mermaide", "mcp"]).expect("parse");
        assert!(matches!(cli.command, Command::Mcp { http_port: None }));
        let cli = Cli::try_parse_from(["mermaide", "mcp", "--http-port", "0"]).expect("parse");
        assert!(matches!(cli.command, Command::Mcp { http_port: Some(0) }));
    }

    #[test]
    fn directives() {
        assert_eq!(parse_repl_line("   "), ReplInput::Empty);
        assert_eq!(parse_repl_line(":quit"), ReplInput::Quit);
        assert_eq!(parse_repl_line(":follow on"), ReplInput::Follow(true));
        assert_eq!(parse_repl_line(":follow off"), ReplInput::Follow(false));
        assert!(matches!(parse_repl_line(":follow maybe"), ReplInput::Invalid(_)));
        assert_eq!(
            parse_repl_line(":focus src/lib.rs"),
            ReplInput::Focus(PathBuf::from("src/lib.rs"))
        );
        assert!(matches!(parse_repl_line(":focus"), ReplInput::Invalid(_)));
        assert_eq!(parse_repl_line("/outline"), ReplInput::Outline(None));
        assert_eq!(
            parse_repl_line("/outline src/main.rs"),
            ReplInput::Outline(Some(PathBuf::from("src/main.rs")))
        );
    }

    #[test]
    fn slash_commands_and_references() {
        let ReplInput::Turn(request) = parse_repl_line("/uml classes in @src/model.rs:1-30 please")
        else {
            panic!("expected a turn");
        };
        assert_eq!(request.command, Some(ChatCommand::Uml));
        assert_eq!(request.prompt, "classes in please");
        assert_eq!(
            request.references,
            vec![Reference::Range {
                path: PathBuf::from("src/model.rs"),
                start_line: 1,
                end_line: 30,
            }]
        );

        let ReplInput::Turn(request) = parse_repl_line("a sequence of the login") else {
            panic!("expected a turn");
        };
        assert_eq!(request.command, None);
        assert!(request.references.is_empty());

        assert!(matches!(parse_repl_line("/draw a cat"), ReplInput::Invalid(_)));
    }
}
