use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use plexus_compiler::Compiler;
use plexus_config::OfficeDef;
use plexus_node::TracingIssues;
use plexus_type_loader::FsTypeLoader;

/// Plexus - compile offices of managed functions
#[derive(Parser)]
#[command(name = "plexus")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Directory of type manifests (default: ~/.plexus/types)
  #[arg(long, global = true)]
  types_dir: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Compile an office and report its issues
  Check {
    /// Path to the office file (JSON), or "-" for stdin
    office_file: PathBuf,
  },

  /// Compile an office and print the compiled metadata
  Inspect {
    /// Path to the office file (JSON), or "-" for stdin
    office_file: PathBuf,

    /// Only print the function an entry point or qualified name reaches
    #[arg(long)]
    function: Option<String>,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(io::stderr)
    .init();

  let cli = Cli::parse();

  let types_dir = match cli.types_dir {
    Some(dir) => dir,
    None => dirs::home_dir()
      .context("could not determine home directory")?
      .join(".plexus")
      .join("types"),
  };

  match cli.command {
    Some(Commands::Check { office_file }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(check(office_file, types_dir))?;
    }
    Some(Commands::Inspect {
      office_file,
      function,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(inspect(office_file, types_dir, function))?;
    }
    None => {
      println!("plexus - use --help to see available commands");
    }
  }

  Ok(())
}

async fn check(office_file: PathBuf, types_dir: PathBuf) -> Result<()> {
  let office = read_office(&office_file).await?;
  let compiler = compiler(types_dir);

  let mut issues = TracingIssues::new();
  let meta = compiler.compile(&office, &mut issues).await;
  if issues.count() > 0 {
    bail!("office '{}' has {} issue(s)", office.name, issues.count());
  }

  eprintln!(
    "Office {} compiled: {} function(s), {} resource(s), {} team(s)",
    meta.name,
    meta.functions.len(),
    meta.resources.len(),
    meta.teams.len()
  );
  Ok(())
}

async fn inspect(office_file: PathBuf, types_dir: PathBuf, function: Option<String>) -> Result<()> {
  let office = read_office(&office_file).await?;
  let compiler = compiler(types_dir);

  let meta = match compiler.compile_checked(&office).await {
    Ok(meta) => meta,
    Err(e) => {
      for issue in e.issues() {
        eprintln!("{}", issue);
      }
      return Err(e).context("failed to compile office");
    }
  };

  let output = match function {
    Some(name) => {
      let function = meta
        .entry(&name)
        .with_context(|| format!("function '{}' not found in office", name))?;
      serde_json::to_string_pretty(function)?
    }
    None => serde_json::to_string_pretty(&meta)?,
  };
  println!("{}", output);

  Ok(())
}

fn compiler(types_dir: PathBuf) -> Compiler {
  let loader = FsTypeLoader::new(types_dir);
  debug!(types_dir = %loader.root().display(), "type_loader_ready");
  Compiler::new(loader)
}

async fn read_office(office_file: &Path) -> Result<OfficeDef> {
  let content = if office_file == Path::new("-") {
    read_stdin()?
  } else {
    tokio::fs::read_to_string(office_file)
      .await
      .with_context(|| format!("failed to read office file: {}", office_file.display()))?
  };

  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse office file: {}", office_file.display()))
}

fn read_stdin() -> Result<String> {
  let mut input = String::new();
  io::stdin()
    .read_to_string(&mut input)
    .context("failed to read office from stdin")?;
  Ok(input)
}
