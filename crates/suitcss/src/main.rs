/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * suitcss command-line interface.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use suitcss_core::{Configuration, Preprocessor, TracingObserver};

#[derive(Parser)]
#[command(name = "suitcss")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Preprocess SUIT CSS components", long_about = None)]
struct Cli {
    /// Input file (reads stdin when omitted)
    input: Option<PathBuf>,

    /// Output file (writes stdout when omitted)
    output: Option<PathBuf>,

    /// Configuration file (JSON, or YAML for .yml/.yaml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Root directory for resolving imports
    #[arg(short = 'i', long)]
    import_root: Option<PathBuf>,

    /// Minify the output
    #[arg(short, long)]
    minify: bool,

    /// Encapsulate component root rules
    #[arg(short, long)]
    encapsulate: bool,

    /// Disable linting
    #[arg(short = 'L', long)]
    no_lint: bool,

    /// Log progress to stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Call-site options built from the flags. Flags that are not given
    /// leave the configuration file's values in place.
    fn call_options(&self) -> Configuration {
        let mut options = Configuration::new();
        if self.minify {
            options = options.with_minify(true);
        }
        if self.encapsulate {
            options = options.with_encapsulate(true);
        }
        if self.no_lint {
            options = options.with_lint(false);
        }
        if let Some(root) = &self.import_root {
            options = options.with_root(root.clone());
        }
        options
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(err) = run(cli).await {
        eprintln!("{:#}", err);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "suitcss=info" } else { "suitcss=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_env("SUITCSS_LOG")
        .or_else(|_| tracing_subscriber::EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| default.into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let mut builder = Preprocessor::builder().observer(Arc::new(TracingObserver));
    if let Some(path) = &cli.config {
        builder = builder.file_config(read_config(path).await?);
    }
    let preprocessor = builder.build();

    let css = match &cli.input {
        Some(path) => read_input(path).await?,
        None => {
            let mut css = String::new();
            tokio::io::stdin()
                .read_to_string(&mut css)
                .await
                .context("failed to read stdin")?;
            css
        }
    };

    let options = cli.call_options();
    let output = preprocessor
        .process(css, Some(&options), cli.input.as_deref())
        .await?;

    match &cli.output {
        Some(path) => {
            if cli.verbose {
                tracing::info!("write {}", path.display());
            }
            tokio::fs::write(path, output)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        None => {
            let mut stdout = tokio::io::stdout();
            stdout.write_all(output.as_bytes()).await?;
            stdout.flush().await?;
        }
    }
    Ok(())
}

async fn read_input(path: &Path) -> Result<String> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        bail!("input file {} not found", path.display());
    }
    tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))
}

async fn read_config(path: &Path) -> Result<Configuration> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    );
    let config = if is_yaml {
        Configuration::from_yaml_str(&text)
    } else {
        Configuration::from_json_str(&text)
    };
    config.with_context(|| format!("invalid config {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_options_from_flags() {
        let cli = Cli::parse_from(["suitcss", "-m", "-L", "-i", "styles", "in.css"]);
        let options = cli.call_options();
        assert_eq!(options.minify, Some(true));
        assert_eq!(options.lint, Some(false));
        assert_eq!(options.encapsulate, None);
        assert_eq!(options.root, Some(PathBuf::from("styles")));
        assert_eq!(cli.input, Some(PathBuf::from("in.css")));
        assert!(cli.output.is_none());
    }

    #[test]
    fn test_unset_flags_leave_options_empty() {
        let cli = Cli::parse_from(["suitcss"]);
        let options = cli.call_options();
        assert!(options.minify.is_none());
        assert!(options.lint.is_none());
        assert!(options.root.is_none());
    }
}
