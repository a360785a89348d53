use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tabled::{Table, Tabled};
use tracing_subscriber::EnvFilter;

use nbrt::reconciler::TemplateReconciler;
use nbrt::state::{self, DEFAULT_STATE_FILE};
use nbrt::validation::has_blocking;
use nbrt::{
    Plan, TemplateConfig, TemplateField, TemplateState, ValidationPolicy, validate_with,
};
use nbrt_client::{
    ClientConfig, CredentialProvider, DEFAULT_LOCATION, EnvToken, GcloudToken, NotebookClient,
    ProviderChain, StaticToken,
};

#[derive(Parser)]
#[command(name = "nbrt")]
#[command(about = "Manage Vertex AI notebook runtime templates", long_about = None)]
struct Cli {
    /// GCP project
    #[arg(long, global = true, env = "CLOUDSDK_CORE_PROJECT")]
    project: Option<String>,

    /// GCP region
    #[arg(long, global = true, env = "CLOUDSDK_COMPUTE_REGION", default_value = DEFAULT_LOCATION)]
    location: String,

    /// API base URL including version (defaults to the regional endpoint)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Bearer token (otherwise $GOOGLE_OAUTH_ACCESS_TOKEN, then gcloud)
    #[arg(long, global = true)]
    access_token: Option<String>,

    /// State file tracking the managed template
    #[arg(long, global = true, default_value = DEFAULT_STATE_FILE)]
    state: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a configuration file without contacting the API
    Validate {
        file: PathBuf,

        /// Treat every violation as an error
        #[arg(long)]
        strict: bool,
    },

    /// List all templates in the project and location
    List,

    /// Show one template by resource name or ID
    Get { name: String },

    /// Show what apply would do
    Plan { file: PathBuf },

    /// Create or update the managed template
    Apply {
        file: PathBuf,

        /// Delete and recreate when an immutable field changed
        #[arg(long)]
        replace: bool,

        /// Treat every violation as an error
        #[arg(long)]
        strict: bool,
    },

    /// Re-read the managed template into the state file
    Refresh,

    /// Delete the managed template
    Destroy,
}

#[derive(Tabled)]
struct TemplateRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "DISPLAY NAME")]
    display_name: String,
    #[tabled(rename = "MACHINE")]
    machine: String,
    #[tabled(rename = "INTERNET")]
    internet: bool,
    #[tabled(rename = "KMS KEY")]
    kms_key: String,
    #[tabled(rename = "CREATED")]
    created: String,
}

impl From<&TemplateState> for TemplateRow {
    fn from(state: &TemplateState) -> Self {
        let machine = match &state.machine_spec.accelerator_type {
            Some(accelerator) => format!(
                "{} + {}x{}",
                state.machine_spec.machine_type,
                state.machine_spec.accelerator_count.unwrap_or(1),
                accelerator
            ),
            None => state.machine_spec.machine_type.clone(),
        };
        Self {
            id: state.id().to_string(),
            display_name: state.display_name.clone(),
            machine,
            internet: state.network_spec.enable_internet_access,
            kms_key: state.kms_key_name.clone().unwrap_or_else(|| "-".to_string()),
            created: state
                .create_time
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string()),
        }
    }
}

fn join_fields(fields: &[TemplateField]) -> String {
    fields
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn describe(plan: &Plan) -> String {
    match plan {
        Plan::Create => "create".to_string(),
        Plan::NoOp => "no changes".to_string(),
        Plan::Update { fields } => format!("update in place: {}", join_fields(fields)),
        Plan::Replace { fields } => format!("replace (immutable): {}", join_fields(fields)),
    }
}

fn policy(strict: bool) -> ValidationPolicy {
    if strict {
        ValidationPolicy::Strict
    } else {
        ValidationPolicy::Advisory
    }
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let project = self
            .project
            .clone()
            .context("--project or CLOUDSDK_CORE_PROJECT is required")?;
        let mut config = ClientConfig::new(project, self.location.clone());
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint.clone());
        }
        Ok(config)
    }

    fn credentials(&self) -> Result<Box<dyn CredentialProvider>> {
        if let Some(token) = &self.access_token {
            return Ok(Box::new(StaticToken::new(token.clone())?));
        }
        Ok(Box::new(
            ProviderChain::new()
                .with(EnvToken::default())
                .with(GcloudToken::default()),
        ))
    }

    async fn reconciler(&self, policy: ValidationPolicy) -> Result<TemplateReconciler> {
        let credentials = self.credentials()?;
        let client = NotebookClient::new(self.client_config()?, credentials.as_ref()).await?;
        Ok(TemplateReconciler::new(Arc::new(client)).with_policy(policy))
    }

    fn resource_name(&self, name: &str) -> Result<String> {
        if name.contains('/') {
            return Ok(name.to_string());
        }
        let config = self.client_config()?;
        Ok(format!(
            "projects/{}/locations/{}/notebookRuntimeTemplates/{}",
            config.project, config.location, name
        ))
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn load_config(path: &Path) -> Result<TemplateConfig> {
    Ok(TemplateConfig::load(path).await?)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("nbrt=info".parse()?))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Validate { file, strict } => {
            let config = load_config(file).await?;
            let violations = validate_with(&config, policy(*strict));
            for violation in &violations {
                println!("{violation}");
                println!("    {}", violation.detail);
            }
            if has_blocking(&violations) {
                bail!("{} has blocking violations", file.display());
            }
            println!("{} is valid", file.display());
        }

        Commands::List => {
            let reconciler = cli.reconciler(ValidationPolicy::default()).await?;
            let templates = reconciler.list().await?;
            if templates.is_empty() {
                println!("No templates found");
            } else {
                let rows: Vec<TemplateRow> = templates.iter().map(TemplateRow::from).collect();
                println!("{}", Table::new(rows));
            }
        }

        Commands::Get { name } => {
            let name = cli.resource_name(name)?;
            let reconciler = cli.reconciler(ValidationPolicy::default()).await?;
            match reconciler.read(&name).await? {
                Some(template) => print_json(&template)?,
                None => bail!("template {name} not found"),
            }
        }

        Commands::Plan { file } => {
            let config = load_config(file).await?;
            let reconciler = cli.reconciler(ValidationPolicy::default()).await?;
            reconciler.validate(&config)?;
            let mut managed = state::load(&cli.state).await?;
            reconciler.refresh(&mut managed).await?;
            let plan = reconciler.plan(managed.state.as_ref(), &config);
            println!("{}", describe(&plan));
        }

        Commands::Apply {
            file,
            replace,
            strict,
        } => {
            let config = load_config(file).await?;
            let reconciler = cli.reconciler(policy(*strict)).await?;
            let mut managed = state::load(&cli.state).await?;

            // State is saved even when apply fails part way.
            let result = reconciler.apply(&mut managed, &config, *replace).await;
            state::save(&cli.state, &managed).await?;
            let plan = result?;

            println!("{}: {}", describe(&plan), managed.name.as_deref().unwrap_or("-"));
        }

        Commands::Refresh => {
            let reconciler = cli.reconciler(ValidationPolicy::default()).await?;
            let mut managed = state::load(&cli.state).await?;
            let result = reconciler.refresh(&mut managed).await;
            state::save(&cli.state, &managed).await?;
            result?;
            print_json(&managed)?;
        }

        Commands::Destroy => {
            let reconciler = cli.reconciler(ValidationPolicy::default()).await?;
            let mut managed = state::load(&cli.state).await?;
            let result = reconciler.destroy(&mut managed).await;
            state::save(&cli.state, &managed).await?;
            result?;
            println!("Destroyed");
        }
    }

    Ok(())
}
