use crate::engine::Console;
use crate::generator::generate;
use crate::options::{Options, DEFAULT_ENV_OUTPUT, DEFAULT_OUTPUT};
use crate::watch::watch;
use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LONG_ABOUT: &str = "Template based configuration generator.

You can specify multiple environments, input directories and values files.
Frequently used options have a positional shortcut:
  @environment   add an environment
  +file          add a values file
  name=value     set a value
  directory      add a template directory";

/// Value files looked for when none is given, first match wins.
pub const DEFAULT_VALUE_FILES: [&str; 4] = ["values.yaml", "values.yml", "values.toml", "values.json"];

/// Command-line interface for configen
#[derive(Debug, Parser)]
#[command(name = "configen", version)]
#[command(about = "Template based configuration generator", long_about = LONG_ABOUT)]
pub struct Cli {
    /// Input directory [arg: directory] (default: templates)
    #[arg(short = 't', long = "template", value_name = "DIRECTORY", env = "CONFIGEN_TEMPLATES", value_delimiter = ',')]
    pub templates: Vec<String>,

    /// Output directory (default: dist, or dist/{{ Env }} with environments)
    #[arg(short, long, value_name = "DIRECTORY", env = "CONFIGEN_OUTPUT")]
    pub output: Option<String>,

    /// Schema directory (default: schemas, if present)
    #[arg(short = 's', long = "schema", value_name = "DIRECTORY", env = "CONFIGEN_SCHEMAS", value_delimiter = ',')]
    pub schemas: Vec<String>,

    /// Data values file [arg: +file] (default: values.yaml)
    #[arg(short = 'f', long = "values", value_name = "FILE", env = "CONFIGEN_VALUES", value_delimiter = ',')]
    pub values: Vec<String>,

    /// Set value [arg: name=value]
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_define)]
    pub define: Vec<(String, String)>,

    /// Disable schema validation
    #[arg(long, env = "CONFIGEN_LOOSE")]
    pub loose: bool,

    /// Skip writing output files
    #[arg(long = "dry-run", env = "CONFIGEN_DRY_RUN")]
    pub dry_run: bool,

    /// Dump intermediate files
    #[arg(long, env = "CONFIGEN_DUMP")]
    pub dump: bool,

    /// Suppress console output
    #[arg(short, long, env = "CONFIGEN_QUIET")]
    pub quiet: bool,

    /// Package descriptor (default: package.json, if present)
    #[arg(short, long, value_name = "FILE", env = "CONFIGEN_PACKAGE")]
    pub package: Option<String>,

    /// Staging environment name [arg: @environment]
    #[arg(short, long = "env", value_name = "ENVIRONMENT", env = "CONFIGEN_ENV", value_delimiter = ',')]
    pub envs: Vec<String>,

    /// Set working directory
    #[arg(long, value_name = "DIRECTORY")]
    pub dir: Option<PathBuf>,

    /// Watch inputs, regenerate on change and serve the output
    #[arg(short, long, env = "CONFIGEN_WATCH")]
    pub watch: bool,

    /// Preview server port (0 picks a free one)
    #[arg(long, default_value_t = 0, env = "CONFIGEN_PORT")]
    pub port: u16,

    /// Positional shortcuts: @environment, +file, name=value or directory
    #[arg(value_name = "ARGS")]
    pub args: Vec<String>,
}

fn parse_define(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
        _ => Err(format!("expected name=value, got {s:?}")),
    }
}

/// A fully resolved command line.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub options: Options,
    pub envs: Vec<String>,
    pub watch: bool,
    pub port: u16,
}

impl Cli {
    /// Apply positional shortcuts, then fill empty settings with defaults
    /// found in `cwd`.
    pub fn into_invocation(self, cwd: &Path) -> Invocation {
        let mut options = Options {
            templates: self.templates,
            output: self.output.unwrap_or_default(),
            schemas: self.schemas,
            values: self.values,
            define: self
                .define
                .into_iter()
                .map(|(name, value)| (name, Value::String(value)))
                .collect(),
            loose: self.loose,
            dry: self.dry_run,
            dump: self.dump,
            quiet: self.quiet,
            package: self.package,
        };
        let mut envs = self.envs;

        for arg in self.args {
            apply_tag(&mut options, &mut envs, arg);
        }
        apply_defaults(&mut options, &envs, cwd);

        Invocation {
            options,
            envs,
            watch: self.watch,
            port: self.port,
        }
    }
}

fn apply_tag(options: &mut Options, envs: &mut Vec<String>, arg: String) {
    if let Some(env) = arg.strip_prefix('@') {
        envs.push(env.to_string());
    } else if let Some(file) = arg.strip_prefix('+') {
        options.values.push(file.to_string());
    } else if let Some((name, value)) = arg.split_once('=') {
        options
            .define
            .insert(name.to_string(), Value::String(value.to_string()));
    } else {
        options.templates.push(arg);
    }
}

fn apply_defaults(options: &mut Options, envs: &[String], cwd: &Path) {
    if options.templates.is_empty() {
        options.templates.push("templates".to_string());
    }
    if options.schemas.is_empty() && cwd.join("schemas").is_dir() {
        options.schemas.push("schemas".to_string());
    }
    if options.package.is_none() && cwd.join("package.json").is_file() {
        options.package = Some("package.json".to_string());
    }
    if options.output.is_empty() {
        options.output = if envs.is_empty() {
            DEFAULT_OUTPUT
        } else {
            DEFAULT_ENV_OUTPUT
        }
        .to_string();
    }
    if options.values.is_empty() {
        if let Some(found) = DEFAULT_VALUE_FILES
            .iter()
            .find(|name| cwd.join(name).is_file())
        {
            options.values.push(found.to_string());
        }
    }
}

/// Parse the command line, generate once, then watch if asked to.
pub fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if let Some(dir) = &cli.dir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("cannot change working directory to {}", dir.display()))?;
    }
    let cwd = std::env::current_dir().context("cannot determine working directory")?;
    let run = cli.into_invocation(&cwd);
    debug!(options = ?run.options, envs = ?run.envs, "options resolved");

    let files = generate(&run.options, &run.envs, &Console::Stdout)?;
    info!(files = files.len(), dry_run = run.options.dry, "generation done");

    if run.watch {
        watch(run.options, run.envs, run.port, Console::Stdout)?;
    }
    Ok(())
}
