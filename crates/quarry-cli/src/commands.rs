//! Command line interface

use crate::config::AppConfig;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueHint};
use quarry_runtime::{
    ChartArgs, ChartType, FetchArgs, Filter, QueryParams, SourceRegistry, Toolbox, TransformSpec,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "quarry", author, version, about = "Query data sources and render charts")]
pub struct Cli {
    /// Sources file; overrides `sources_path` from the configuration
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub sources: Option<PathBuf>,

    /// Application config file (default: config/quarry.*)
    #[arg(long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List registered data sources
    Sources,

    /// Print the schema of a data source as JSON
    Schema {
        /// Source name
        name: String,
    },

    /// Fetch rows from a data source and print them as JSON
    Fetch(FetchCommand),

    /// Render a chart from a data source
    Chart(ChartCommand),
}

/// Filtering, ordering and transform options shared by `fetch` and `chart`
#[derive(Args, Debug, Default)]
pub struct QueryOptions {
    /// Filter expression such as `amount>=10`, `region=east` or `region:in=east,west`
    #[arg(long = "filter", value_parser = parse_filter)]
    pub filters: Vec<Filter>,

    /// Maximum number of rows
    #[arg(long)]
    pub limit: Option<usize>,

    /// Column to sort by; prefix with `-` for descending
    #[arg(long, allow_hyphen_values = true)]
    pub order_by: Option<String>,

    /// YAML file holding a list of `{op, params}` transform steps
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub transform: Option<PathBuf>,
}

impl QueryOptions {
    fn query(&self, columns: &[String]) -> QueryParams {
        QueryParams {
            columns: (!columns.is_empty()).then(|| columns.to_vec()),
            filters: self.filters.clone(),
            limit: self.limit,
            order_by: self.order_by.clone(),
        }
    }

    async fn transform(&self) -> Result<Option<TransformSpec>> {
        match &self.transform {
            Some(path) => load_transform(path).await.map(Some),
            None => Ok(None),
        }
    }
}

#[derive(Args, Debug)]
pub struct FetchCommand {
    /// Source name
    pub name: String,

    /// Columns to return, comma separated
    #[arg(long, value_delimiter = ',')]
    pub columns: Vec<String>,

    #[command(flatten)]
    pub options: QueryOptions,
}

#[derive(Args, Debug)]
pub struct ChartCommand {
    /// Source name
    pub name: String,

    /// Chart type (line, bar, scatter, area)
    #[arg(long = "type", default_value = "line")]
    pub chart_type: ChartType,

    /// Column for the x axis
    #[arg(long = "x")]
    pub x_column: String,

    /// Column(s) for the y axis
    #[arg(long = "y", required = true, num_args = 1.., value_delimiter = ',')]
    pub y_columns: Vec<String>,

    /// Chart title
    #[arg(long)]
    pub title: Option<String>,

    /// Output file (default: <chart_output_dir>/<source>_<type>.json)
    #[arg(long, value_hint = ValueHint::FilePath)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub options: QueryOptions,
}

fn parse_filter(expr: &str) -> std::result::Result<Filter, String> {
    Filter::parse(expr).ok_or_else(|| {
        format!(
            "invalid filter '{}'; expected <column><op><value> with op one of =, !=, >, >=, <, <=, ~=, :in=",
            expr
        )
    })
}

/// Read a transform spec from a YAML file
pub async fn load_transform(path: &Path) -> Result<TransformSpec> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read transform file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse transform file {}", path.display()))
}

/// Build the registry from the sources file; a missing file yields an empty registry
pub async fn load_registry(path: &Path) -> Result<SourceRegistry> {
    if !path.exists() {
        warn!(
            "Sources file {} not found, starting with no data sources",
            path.display()
        );
        return Ok(SourceRegistry::new());
    }

    let registry = SourceRegistry::from_file(path).await?;
    info!(
        "Loaded {} data sources from {}",
        registry.len().await,
        path.display()
    );
    Ok(registry)
}

/// Default chart location for a source and chart type
pub fn default_chart_path(dir: &Path, source: &str, chart_type: ChartType) -> PathBuf {
    dir.join(format!("{}_{}.json", source, chart_type))
}

impl Cli {
    /// Run the command; returns the text to print on stdout
    pub async fn run(self, config: &AppConfig) -> Result<String> {
        let sources_path = self
            .sources
            .clone()
            .unwrap_or_else(|| config.sources_path.clone());
        let registry = load_registry(&sources_path).await?;
        let toolbox = Toolbox::with_vega_lite(Arc::new(registry));

        self.command.execute(&toolbox, config).await
    }
}

impl Command {
    pub async fn execute(self, toolbox: &Toolbox, config: &AppConfig) -> Result<String> {
        match self {
            Command::Sources => {
                let sources = toolbox.registry().list().await;
                if sources.is_empty() {
                    return Ok("No data sources registered".to_string());
                }
                let lines: Vec<String> = sources
                    .iter()
                    .map(|s| match &s.description {
                        Some(description) => {
                            format!("{}\t{}\t{}", s.name, s.source_type, description)
                        }
                        None => format!("{}\t{}", s.name, s.source_type),
                    })
                    .collect();
                Ok(lines.join("\n"))
            }

            Command::Schema { name } => {
                let schema = toolbox.registry().get_schema(&name).await?;
                Ok(serde_json::to_string_pretty(&schema)?)
            }

            Command::Fetch(cmd) => {
                let mut args = FetchArgs::new(&cmd.name)
                    .with_query(cmd.options.query(&cmd.columns));
                args.transform = cmd.options.transform().await?;

                let result = toolbox.fetch(&args).await?;
                Ok(serde_json::to_string_pretty(&result)?)
            }

            Command::Chart(cmd) => {
                let mut args =
                    ChartArgs::new(&cmd.name, cmd.chart_type, &cmd.x_column, cmd.y_columns.clone());
                args.title = cmd.title.clone();
                args.query = cmd.options.query(&[]);
                args.transform = cmd.options.transform().await?;

                let artifact = toolbox.chart(&args).await?;

                let output = cmd.output.clone().unwrap_or_else(|| {
                    default_chart_path(&config.chart_output_dir, &cmd.name, cmd.chart_type)
                });
                if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await.with_context(|| {
                        format!("Failed to create output directory {}", parent.display())
                    })?;
                }
                tokio::fs::write(&output, serde_json::to_vec_pretty(&artifact.spec)?)
                    .await
                    .with_context(|| format!("Failed to write chart to {}", output.display()))?;

                info!("Wrote {} chart to {}", artifact.chart_type, output.display());
                Ok(format!(
                    "Saved {} chart '{}' ({} points) to {}",
                    artifact.chart_type,
                    artifact.title,
                    artifact.data_points,
                    output.display()
                ))
            }
        }
    }
}
