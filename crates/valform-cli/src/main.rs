use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;
use valform_document::{SchemaDocument, ValuesDocument};
use valform_model::{DeploymentEvent, EditKind, KeyPath, ScalarEdit};
use valform_reconcile::{
    filter_parameters, validate_values, Applier, EditableParameter, Extractor, ReconcileConfig,
    Sources,
};

/// Printed output and whether the command succeeded
#[derive(Debug)]
struct Outcome {
    output: String,
    success: bool,
}

impl Outcome {
    fn ok(output: String) -> Self {
        Self {
            output,
            success: true,
        }
    }
}

fn build_cli() -> Command {
    let schema = Arg::new("schema")
        .long("schema")
        .value_parser(value_parser!(PathBuf))
        .help("JSON Schema file");
    let values = Arg::new("values")
        .long("values")
        .value_parser(value_parser!(PathBuf))
        .help("Values YAML file");

    Command::new("valform")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Reconcile YAML values with a JSON Schema form")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::Count)
                .help("More logging (-v debug, -vv trace); RUST_LOG overrides"),
        )
        .subcommand(
            Command::new("params")
                .about("Print editable parameters as JSON")
                .arg(schema.clone().required(true))
                .arg(values.clone().help("Current values YAML file"))
                .arg(
                    Arg::new("defaults")
                        .long("defaults")
                        .value_parser(value_parser!(PathBuf))
                        .help("Package default values YAML file"),
                )
                .arg(
                    Arg::new("deployed")
                        .long("deployed")
                        .value_parser(value_parser!(PathBuf))
                        .help("Deployed release values YAML file"),
                )
                .arg(
                    Arg::new("upgrade")
                        .long("upgrade")
                        .action(ArgAction::SetTrue)
                        .help("Extract for an upgrade, reading deployed values"),
                )
                .arg(
                    Arg::new("search")
                        .long("search")
                        .help("Keep parameters matching this text"),
                )
                .arg(
                    Arg::new("modified")
                        .long("modified")
                        .action(ArgAction::SetTrue)
                        .help("Keep only parameters that differ from their baseline"),
                ),
        )
        .subcommand(
            Command::new("set")
                .about("Write key=value edits into a values file")
                .arg(values.clone().required(true))
                .arg(schema.clone().help("JSON Schema file used to pick each edit's kind"))
                .arg(
                    Arg::new("kind")
                        .long("kind")
                        .value_parser(["bool", "number", "string", "array", "object"])
                        .help("Edit kind for every assignment"),
                )
                .arg(
                    Arg::new("in-place")
                        .long("in-place")
                        .action(ArgAction::SetTrue)
                        .help("Write the result back to the values file"),
                )
                .arg(
                    Arg::new("assignments")
                        .value_name("KEY=VALUE")
                        .num_args(1..)
                        .required(true),
                ),
        )
        .subcommand(
            Command::new("validate")
                .about("Check values against the schema")
                .arg(values.required(true))
                .arg(schema.required(true)),
        )
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))
}

fn load_config(matches: &ArgMatches) -> Result<ReconcileConfig> {
    match matches.get_one::<PathBuf>("config") {
        Some(path) => ReconcileConfig::from_file(path)
            .with_context(|| format!("cannot load configuration {}", path.display())),
        None => Ok(ReconcileConfig::default()),
    }
}

fn load_schema(args: &ArgMatches) -> Result<Option<SchemaDocument>> {
    args.get_one::<PathBuf>("schema")
        .map(|path| {
            let text = read(path)?;
            SchemaDocument::from_json_str(&text)
                .with_context(|| format!("cannot parse schema {}", path.display()))
        })
        .transpose()
}

fn load_values(args: &ArgMatches, id: &str, applier: Applier) -> Result<Option<ValuesDocument>> {
    args.get_one::<PathBuf>(id)
        .map(|path| {
            let text = read(path)?;
            let doc = ValuesDocument::parse(text)
                .with_context(|| format!("cannot parse values {}", path.display()))?;
            Ok(applier.prepare(doc))
        })
        .transpose()
}

fn run(matches: &ArgMatches) -> Result<Outcome> {
    let config = load_config(matches)?;
    match matches.subcommand() {
        Some(("params", args)) => params(args, config),
        Some(("set", args)) => set(args, &config),
        Some(("validate", args)) => validate(args, &config),
        _ => anyhow::bail!("no subcommand given"),
    }
}

fn params(args: &ArgMatches, config: ReconcileConfig) -> Result<Outcome> {
    let applier = Applier::new(config.indent_step);
    let schema = load_schema(args)?.unwrap_or_default();
    let current = load_values(args, "values", applier)?;
    let defaults = load_values(args, "defaults", applier)?;
    let deployed = load_values(args, "deployed", applier)?;
    let event = if args.get_flag("upgrade") {
        DeploymentEvent::Upgrade
    } else {
        DeploymentEvent::Install
    };

    let sources = Sources {
        current: current.as_ref(),
        defaults: defaults.as_ref(),
        deployed: deployed.as_ref(),
        event,
    };
    let params = Extractor::new(config).extract(&schema, &sources);
    let mut selected: Vec<&EditableParameter> = match args.get_one::<String>("search") {
        Some(query) => filter_parameters(&params, query),
        None => params.iter().collect(),
    };
    if args.get_flag("modified") {
        selected.retain(|p| p.is_modified());
    }

    let mut output = serde_json::to_string_pretty(&selected)?;
    output.push('\n');
    Ok(Outcome::ok(output))
}

fn set(args: &ArgMatches, config: &ReconcileConfig) -> Result<Outcome> {
    let path = args
        .get_one::<PathBuf>("values")
        .context("--values is required")?;
    let text = read(path)?;
    let kind = args
        .get_one::<String>("kind")
        .map(|kind| kind.parse::<EditKind>())
        .transpose()?;
    let known = match load_schema(args)? {
        Some(schema) => Extractor::new(config.clone()).extract(&schema, &Sources::default()),
        None => Vec::new(),
    };

    let edits = args
        .get_many::<String>("assignments")
        .into_iter()
        .flatten()
        .map(|assignment| {
            let edit = ScalarEdit::parse_assignment(assignment, EditKind::String)?;
            let kind = kind.unwrap_or_else(|| kind_for(&known, &edit.key));
            Ok(ScalarEdit { kind, ..edit })
        })
        .collect::<Result<Vec<_>>>()?;

    let patched = Applier::new(config.indent_step)
        .apply_to_text(&text, &edits)
        .with_context(|| format!("cannot apply edits to {}", path.display()))?;

    if args.get_flag("in-place") {
        fs::write(path, &patched).with_context(|| format!("cannot write {}", path.display()))?;
        info!(path = %path.display(), edits = edits.len(), "wrote values");
        return Ok(Outcome::ok(String::new()));
    }
    Ok(Outcome::ok(patched))
}

/// Edit kind of the schema property at `key`, string when unknown
fn kind_for(params: &[EditableParameter], key: &KeyPath) -> EditKind {
    params
        .iter()
        .find(|p| &p.key == key)
        .map_or(EditKind::String, |p| p.kind.edit_kind())
}

fn validate(args: &ArgMatches, config: &ReconcileConfig) -> Result<Outcome> {
    let applier = Applier::new(config.indent_step);
    let schema = load_schema(args)?.context("--schema is required")?;
    let values = load_values(args, "values", applier)?.context("--values is required")?;

    let issues = validate_values(&schema, &values).context("cannot compile schema")?;
    let output = issues.iter().map(|issue| format!("{issue}\n")).collect();
    Ok(Outcome {
        output,
        success: issues.is_empty(),
    })
}

fn main() -> ExitCode {
    let matches = build_cli().get_matches();
    init_tracing(matches.get_count("verbose"));

    match run(&matches) {
        Ok(outcome) => {
            print!("{}", outcome.output);
            if outcome.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(1)
            }
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use valform_reconcile::ReconcileError;
    use valform_test_utils::{sample_schema_value, DEFAULT_VALUES, DEPLOYED_VALUES};

    fn file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn schema_file() -> NamedTempFile {
        file(&sample_schema_value().to_string())
    }

    fn run_args(args: &[&str]) -> Result<Outcome> {
        let argv = std::iter::once("valform").chain(args.iter().copied());
        let matches = build_cli().try_get_matches_from(argv)?;
        run(&matches)
    }

    fn path(file: &NamedTempFile) -> &str {
        file.path().to_str().unwrap()
    }

    #[test]
    fn cli_definition_is_consistent() {
        build_cli().debug_assert();
    }

    #[test]
    fn params_prints_json_rows() {
        let schema = schema_file();
        let values = file(DEFAULT_VALUES);
        let outcome =
            run_args(&["params", "--schema", path(&schema), "--values", path(&values)]).unwrap();
        let rows: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        assert_eq!(rows[0]["key"], "replicaCount");
        assert_eq!(rows[0]["currentValue"], 1);
        assert!(outcome.success);
    }

    #[test]
    fn params_search_and_upgrade() {
        let schema = schema_file();
        let values = file(DEFAULT_VALUES);
        let deployed = file(DEPLOYED_VALUES);
        let outcome = run_args(&[
            "params",
            "--schema",
            path(&schema),
            "--values",
            path(&values),
            "--deployed",
            path(&deployed),
            "--upgrade",
            "--search",
            "port",
        ])
        .unwrap();
        let rows: serde_json::Value = serde_json::from_str(&outcome.output).unwrap();
        let keys: Vec<&str> = rows
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["key"].as_str().unwrap())
            .collect();
        assert_eq!(keys, ["service", "service.port"]);
        assert_eq!(rows[1]["deployedValue"], 8080);
    }

    #[test]
    fn set_infers_kind_from_schema() {
        let schema = schema_file();
        let values = file(DEFAULT_VALUES);
        let outcome = run_args(&[
            "set",
            "--values",
            path(&values),
            "--schema",
            path(&schema),
            "replicaCount=3",
            "image.tag=1.26",
        ])
        .unwrap();
        assert!(outcome.output.contains("replicaCount: 3\n"));
        assert!(outcome.output.contains("  tag: \"1.26\"\n"));
        assert!(outcome.output.contains("## Default values for web.\n"));
    }

    #[test]
    fn set_in_place_rewrites_file() {
        let values = file("a: 1 # keep\n");
        let args = ["set", "--values", path(&values), "--kind", "bool", "--in-place", "b=true"];
        let outcome = run_args(&args).unwrap();
        assert!(outcome.output.is_empty());
        assert_eq!(fs::read_to_string(values.path()).unwrap(), "a: 1 # keep\nb: true\n");
    }

    #[test]
    fn set_reports_malformed_values() {
        let values = file("a: [unterminated\n");
        let err = run_args(&["set", "--values", path(&values), "a=1"]).unwrap_err();
        let cause = err.downcast_ref::<ReconcileError>().unwrap();
        assert!(matches!(cause, ReconcileError::Parse(_)));
        assert!(format!("{err:#}").contains("unable to parse values"));
    }

    #[test]
    fn validate_reports_issues() {
        let schema = schema_file();
        let values = file("service:\n  port: 0\n");
        let args = ["validate", "--values", path(&values), "--schema", path(&schema)];
        let outcome = run_args(&args).unwrap();
        assert!(!outcome.success);
        assert!(outcome.output.starts_with("service.port: "));
    }

    #[test]
    fn unreadable_values_are_an_error() {
        let err = run_args(&[
            "validate",
            "--values",
            "/nonexistent/values.yaml",
            "--schema",
            "/nonexistent/schema.json",
        ])
        .unwrap_err();
        assert!(err.to_string().starts_with("cannot read"));
    }
}
