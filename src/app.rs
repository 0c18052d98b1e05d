// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Wires a resolved configuration into the services a front end drives.

use std::io::{Stderr, Stdout};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::assistant::ChatAssistant;
use crate::config::{ProviderConfig, ResolvedConfig, ValidatorConfig, ValidatorKind};
use crate::controller::RetryController;
use crate::llm::{LanguageModel, OpenAiChatModel};
use crate::outline::OutlineService;
use crate::session::Session;
use crate::store::DiagramDocument;
use crate::terminal::{DocumentView, TerminalSink};
use crate::tools::{SymbolDefinitionTool, ToolRegistry};
use crate::validate::{
    AcceptAll, ChannelValidator, MermaidCli, Validator, ValidatorError, WorkerValidator,
};

pub struct App {
    config: ResolvedConfig,
    workspace: PathBuf,
    session: Arc<Session>,
    controller: RetryController,
    /// Page side of the worker validator; it also takes rendered diagrams.
    page: Option<ChannelValidator>,
}

impl App {
    /// Builds every service from `config`. A `worker` validator spawns its process here, so
    /// this must run inside a tokio runtime.
    pub fn build(config: ResolvedConfig, workspace: impl Into<PathBuf>) -> Result<Self, ValidatorError> {
        let workspace = workspace.into();
        let (validator, page) = build_validator(&config.validator)?;

        let tools = ToolRegistry::new().with_tool(SymbolDefinitionTool::new(&workspace));
        let primary: Arc<dyn LanguageModel> = Arc::new(provider_model(&config.model));
        let fallback = config
            .fallback
            .as_ref()
            .map(|provider| Arc::new(provider_model(provider)) as Arc<dyn LanguageModel>);

        let controller = RetryController::new(primary, Arc::new(tools), validator)
            .with_policy(config.retry.clone())
            .with_fallback(fallback)
            .with_log_path(Some(config.log_file_path.clone()));

        info!(
            model = %config.model.model,
            fallback = config.fallback.is_some(),
            validator = ?config.validator.kind,
            workspace = %workspace.display(),
            "mermaide ready"
        );
        Ok(Self {
            config,
            workspace,
            session: Arc::new(Session::new()),
            controller,
            page,
        })
    }

    pub fn config(&self) -> &ResolvedConfig {
        &self.config
    }

    pub fn workspace(&self) -> &Path {
        &self.workspace
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn controller(&self) -> &RetryController {
        &self.controller
    }

    pub fn assistant(&self) -> ChatAssistant {
        ChatAssistant::new(
            self.controller.clone(),
            Arc::clone(&self.session),
            &self.workspace,
        )
    }

    pub fn outline(&self) -> OutlineService {
        OutlineService::new(self.controller.clone(), Arc::clone(&self.session))
    }

    /// Output directory, relative paths resolved against the workspace.
    pub fn documents(&self) -> DiagramDocument {
        DiagramDocument::new(self.workspace.join(&self.config.output.dir))
    }

    /// A view that stores accepted diagrams as `<name>.md`, plus `<name>.svg` when `mmdc`
    /// is the validator.
    pub fn document_view(&self, name: &str) -> DocumentView {
        DocumentView::new(self.documents(), name)
            .with_renderer(self.renderer())
            .with_page(self.page.clone())
    }

    /// Terminal sink whose "open source" action points at the document `name` is saved to.
    pub fn terminal_sink(&self, name: &str) -> TerminalSink<Stdout, Stderr> {
        let mut sink = TerminalSink::new(std::io::stdout(), std::io::stderr());
        sink.set_source(self.documents().path_for(name).ok());
        sink
    }

    pub fn renderer(&self) -> Option<MermaidCli> {
        (self.config.validator.kind == ValidatorKind::Cli).then(|| self.mermaid_cli())
    }

    pub fn mermaid_cli(&self) -> MermaidCli {
        MermaidCli::new(&self.config.validator.mmdc).with_timeout(self.config.validator.timeout)
    }
}

fn provider_model(provider: &ProviderConfig) -> OpenAiChatModel {
    OpenAiChatModel::new(&provider.endpoint, &provider.model)
        .with_api_key_env(&provider.api_key_env)
        .with_temperature(provider.temperature)
        .with_max_tokens(provider.max_tokens)
}

fn build_validator(
    config: &ValidatorConfig,
) -> Result<(Arc<dyn Validator>, Option<ChannelValidator>), ValidatorError> {
    match config.kind {
        ValidatorKind::Cli => {
            let cli = MermaidCli::new(&config.mmdc).with_timeout(config.timeout);
            Ok((Arc::new(cli) as Arc<dyn Validator>, None))
        }
        ValidatorKind::Worker => {
            let worker = WorkerValidator::spawn(&config.worker_command, config.timeout)?;
            let page = worker.channel().clone();
            Ok((Arc::new(worker) as Arc<dyn Validator>, Some(page)))
        }
        ValidatorKind::None => Ok((Arc::new(AcceptAll) as Arc<dyn Validator>, None)),
    }
}

#[cfg(test)]
mod tests {
    use super::App;
    use crate::config::{ResolvedConfig, ValidatorKind};
    use crate::validate::ValidatorError;

    fn accept_all_config() -> ResolvedConfig {
        let mut config = ResolvedConfig::default();
        config.validator.kind = ValidatorKind::None;
        config
    }

    #[test]
    fn output_paths_resolve_against_the_workspace() {
        let workspace = tempfile::tempdir().expect("tempdir");
        let app = App::build(accept_all_config(), workspace.path()).expect("build");

        assert_eq!(
            app.documents().dir(),
            workspace.path().join(".mermaide").as_path()
        );
        assert!(app.renderer().is_none());
        assert_eq!(app.assistant().workspace_root(), workspace.path());
    }

    #[test]
    fn retry_policy_follows_config() {
        let mut config = accept_all_config();
        config.retry.ceiling = 2;
        let app = App::build(config, ".").expect("build");
        assert_eq!(app.controller().policy().ceiling, 2);
    }

    #[test]
    fn empty_worker_command_is_rejected() {
        let mut config = ResolvedConfig::default();
        config.validator.kind = ValidatorKind::Worker;
        config.validator.worker_command.clear();
        let err = App::build(config, ".").err().expect("empty command");
        assert!(matches!(err, ValidatorError::RendererUnavailable { .. }));
    }

    #[test]
    fn cli_validator_doubles_as_renderer() {
        let app = App::build(ResolvedConfig::default(), ".").expect("build");
        assert!(app.renderer().is_some());
    }
}
