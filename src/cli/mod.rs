//! NB-009: CLI subcommands — init, validate, preview, graph, completions.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use serde::Serialize;

use crate::graph::GraphDoc;
use crate::stack::{self, BuiltStack, StackConfig};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "nube",
    version,
    about = "Declarative cloud topology planning — typed resource graphs, BLAKE3 plan fingerprints"
)]
pub struct Cli {
    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a starter stack file
    Init {
        /// Target path for the stack file
        #[arg(default_value = "nube.yaml")]
        path: PathBuf,
    },

    /// Validate a stack file without printing the plan
    Validate {
        /// Path to the stack file
        #[arg(short, long, default_value = "nube.yaml")]
        file: PathBuf,
    },

    /// Plan the stack and show what would be created
    Preview {
        /// Path to the stack file
        #[arg(short, long, default_value = "nube.yaml")]
        file: PathBuf,
    },

    /// Emit the planned graph as JSON
    Graph {
        /// Path to the stack file
        #[arg(short, long, default_value = "nube.yaml")]
        file: PathBuf,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Dispatch a CLI command.
pub fn dispatch(cmd: Commands) -> Result<(), String> {
    match cmd {
        Commands::Init { path } => cmd_init(&path),
        Commands::Validate { file } => cmd_validate(&file),
        Commands::Preview { file } => cmd_preview(&file),
        Commands::Graph { file } => cmd_graph(&file),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "nube", &mut io::stdout());
            Ok(())
        }
    }
}

fn cmd_init(path: &Path) -> Result<(), String> {
    if path.exists() {
        return Err(format!("{} already exists", path.display()));
    }
    fs::write(path, stack::STACK_TEMPLATE)
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    println!("Created {}", path.display());
    Ok(())
}

/// Parse, run structural checks, then plan so configuration errors surface
/// too.
fn load_and_plan(file: &Path) -> Result<(StackConfig, BuiltStack), String> {
    let config = StackConfig::from_file(file)?;
    let errors = stack::validate_stack(&config);
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("ERROR: {error}");
        }
        return Err(format!(
            "{} validation error(s) in {}",
            errors.len(),
            file.display()
        ));
    }
    let built = stack::build_stack(&config)?;
    Ok((config, built))
}

fn cmd_validate(file: &Path) -> Result<(), String> {
    let (config, built) = load_and_plan(file)?;
    println!(
        "OK: {} ({} nodes, {} lookups)",
        config.name,
        built.scope.len(),
        built.scope.invocations().len()
    );
    Ok(())
}

fn cmd_preview(file: &Path) -> Result<(), String> {
    let (config, built) = load_and_plan(file)?;
    print_preview(&config, &built)
}

fn print_preview(config: &StackConfig, built: &BuiltStack) -> Result<(), String> {
    let graph = built.scope.to_graph();
    println!("Previewing stack: {}", config.name);
    println!();

    let name_width = graph.nodes.iter().map(|n| n.name.len()).max().unwrap_or(0);
    for node in &graph.nodes {
        let mut line = format!("  + {:<name_width$}  {}", node.name, node.ty);
        if !node.depends_on.is_empty() {
            line.push_str(&format!("  (depends on: {})", node.depends_on.join(", ")));
        }
        println!("{line}");
    }

    if !graph.invocations.is_empty() {
        println!();
        println!("Lookups:");
        for invoke in &graph.invocations {
            println!("  {}  ({})", invoke.name, invoke.function);
        }
    }

    for instance in &built.instances {
        println!();
        println!("Outputs ({}):", instance.name());
        for (key, value) in instance.outputs().named() {
            println!("  {key} = {value}");
        }
    }

    let fingerprint = built
        .scope
        .fingerprint()
        .map_err(|e| format!("fingerprint: {e}"))?;
    println!();
    println!(
        "Plan: {} node(s) to create, {} lookup(s). Fingerprint: {fingerprint}",
        built.scope.len(),
        built.scope.invocations().len()
    );
    Ok(())
}

#[derive(Serialize)]
struct GraphReport<'a> {
    stack: &'a str,
    fingerprint: String,
    #[serde(flatten)]
    graph: GraphDoc,
}

fn cmd_graph(file: &Path) -> Result<(), String> {
    let (config, built) = load_and_plan(file)?;
    let report = GraphReport {
        stack: &config.name,
        fingerprint: built
            .scope
            .fingerprint()
            .map_err(|e| format!("fingerprint: {e}"))?,
        graph: built.scope.to_graph(),
    };
    let json =
        serde_json::to_string_pretty(&report).map_err(|e| format!("JSON encode error: {e}"))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
version: "1.0"
name: demo
instances:
  web:
    security_group_ids: [sg-1]
    public_ip: true
    associate_elastic_ip: true
  db:
    subnet_id: subnet-9
    volumes:
      - device_name: /dev/xvdb
        size_gb: 20
"#;

    fn write_stack(dir: &tempfile::TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("nube.yaml");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_cmd_init_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nube.yaml");
        cmd_init(&path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("version: \"1.0\""));
    }

    #[test]
    fn test_cmd_init_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, VALID);
        let err = cmd_init(&path).unwrap_err();
        assert!(err.contains("already exists"));
        // untouched
        assert_eq!(fs::read_to_string(&path).unwrap(), VALID);
    }

    #[test]
    fn test_init_template_is_previewable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nube.yaml");
        cmd_init(&path).unwrap();
        assert!(cmd_preview(&path).is_ok());
    }

    #[test]
    fn test_cmd_validate_accepts_valid_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, VALID);
        assert!(cmd_validate(&path).is_ok());
    }

    #[test]
    fn test_cmd_validate_rejects_missing_file() {
        let err = cmd_validate(Path::new("/nonexistent/nube.yaml")).unwrap_err();
        assert!(err.contains("cannot read"));
    }

    #[test]
    fn test_cmd_validate_reports_structural_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, "version: \"9.9\"\nname: demo\n");
        let err = cmd_validate(&path).unwrap_err();
        assert!(err.contains("1 validation error(s)"));
    }

    #[test]
    fn test_cmd_validate_reports_configuration_errors() {
        let yaml = r#"
version: "1.0"
name: demo
instances:
  web:
    associate_elastic_ip: true
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, yaml);
        let err = cmd_validate(&path).unwrap_err();
        assert!(err.contains("associate_elastic_ip requires public_ip"));
    }

    #[test]
    fn test_cmd_preview_runs_on_valid_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, VALID);
        assert!(cmd_preview(&path).is_ok());
    }

    #[test]
    fn test_cmd_graph_runs_on_valid_stack() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_stack(&dir, VALID);
        assert!(cmd_graph(&path).is_ok());
    }

    #[test]
    fn test_graph_report_shape() {
        let config = StackConfig::from_yaml(VALID).unwrap();
        let built = stack::build_stack(&config).unwrap();
        let report = GraphReport {
            stack: &config.name,
            fingerprint: built.scope.fingerprint().unwrap(),
            graph: built.scope.to_graph(),
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"stack\":\"demo\""));
        assert!(json.contains("\"fingerprint\":\"blake3:"));
        assert!(json.contains("\"nodes\":"));
        assert!(json.contains("\"invocations\":"));
        // absent optional properties never serialize as null
        assert!(!json.contains("null"));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["nube", "-vv", "validate", "--file", "custom.yaml"]).unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Validate { file } => assert_eq!(file, PathBuf::from("custom.yaml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_defaults_stack_path() {
        let cli = Cli::try_parse_from(["nube", "preview"]).unwrap();
        match cli.command {
            Commands::Preview { file } => assert_eq!(file, PathBuf::from("nube.yaml")),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_completions_generate() {
        let result = dispatch(Commands::Completions { shell: Shell::Bash });
        assert!(result.is_ok());
    }
}
