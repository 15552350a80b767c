//! orgiam - compile an organization's IAM configuration into CloudFormation templates

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use orgiam_core::{CompileOptions, Compiler, Config, OutputFormat, write_templates};

/// Build one CloudFormation template per account from a YAML organization description
#[derive(Parser, Debug)]
#[command(name = "orgiam", version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short = 'f', long, env = "ORGIAM_CONFIG")]
    filename: PathBuf,

    /// Directory holding the policy files referenced by `policy_file`
    #[arg(long, default_value = "policy")]
    policy_dir: PathBuf,

    /// Where the templates are written
    #[arg(long, default_value = "output_templates")]
    output_dir: PathBuf,

    #[arg(long, value_enum, default_value_t = OutputFormat::Yaml)]
    format: OutputFormat,

    /// Log at info level
    #[arg(short, long)]
    verbose: bool,

    /// Log at debug level
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn default_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.verbose {
            "info"
        } else {
            "warn"
        }
    }

    /// The configuration file name without its extension, used in output file names.
    fn config_name(&self) -> String {
        self.filename
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "config".to_string())
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.default_level()));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = Config::from_path(&cli.filename)
        .with_context(|| format!("loading {}", cli.filename.display()))?;

    let compiler = Compiler::with_policy_dir(&cli.policy_dir, CompileOptions::now());
    let compilation = compiler.compile(&config).context("compiling configuration")?;

    let written = write_templates(
        &compilation.templates,
        &compilation.registry,
        &cli.output_dir,
        &cli.config_name(),
        cli.format,
    )
    .with_context(|| format!("writing templates to {}", cli.output_dir.display()))?;

    info!(event = "Run", phase = "Finish", templates = written.len());
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}
