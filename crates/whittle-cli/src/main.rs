//! whittle: reduce an HTML document while keeping its rendering pixel-exact
//!
//! Reads an HTML file, runs the configured reduction phases against a set of
//! emulated devices, and writes the reduced document to stdout (or to a file
//! with `--out` / back over the input with `--overwrite`). All diagnostics go
//! to stderr so stdout stays clean for the document.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use tracing_subscriber::EnvFilter;

use whittle_core::{PhaseName, ReduceConfig, Reducer, DEFAULT_DEVICES};

fn cli() -> Command {
    Command::new("whittle")
        .version(whittle_core::VERSION)
        .about("Reduce an HTML/CSS document, keeping it pixel-identical across emulated devices")
        .arg(
            Arg::new("input")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("HTML file to reduce"),
        )
        .arg(
            Arg::new("device")
                .long("device")
                .action(ArgAction::Append)
                .help("Device to validate against (repeatable; first is the primary)"),
        )
        .arg(
            Arg::new("phase")
                .long("phase")
                .action(ArgAction::Append)
                .help("Reduction phase to enable: node, attr, class, css, html (repeatable)"),
        )
        .arg(
            Arg::new("out")
                .long("out")
                .short('o')
                .value_parser(value_parser!(PathBuf))
                .conflicts_with("overwrite")
                .help("Write the reduced document to this file instead of stdout"),
        )
        .arg(
            Arg::new("overwrite")
                .long("overwrite")
                .action(ArgAction::SetTrue)
                .help("Write the reduced document back over the input file"),
        )
        .arg(
            Arg::new("show")
                .long("show")
                .action(ArgAction::SetTrue)
                .help("Run the browser headed so the reduction can be watched"),
        )
        .arg(
            Arg::new("dump-diffs")
                .long("dump-diffs")
                .value_parser(value_parser!(PathBuf))
                .help("Dump a diff PNG into this directory for every failed pixel check"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Log per-mutation detail"),
        )
}

/// Parse `--phase` values, warning on (and skipping) unknown names
fn parse_phases(matches: &ArgMatches) -> Vec<PhaseName> {
    let Some(values) = matches.get_many::<String>("phase") else {
        return whittle_core::DEFAULT_PHASES.to_vec();
    };
    let mut phases = Vec::new();
    for value in values {
        match PhaseName::from_str(value) {
            Ok(phase) => phases.push(phase),
            Err(err) => tracing::warn!("{err}, skipping"),
        }
    }
    phases
}

fn parse_devices(matches: &ArgMatches) -> Vec<String> {
    match matches.get_many::<String>("device") {
        Some(values) => values.cloned().collect(),
        None => DEFAULT_DEVICES.iter().map(|s| s.to_string()).collect(),
    }
}

/// Resolve where the reduced document goes; `None` means stdout
fn output_path(matches: &ArgMatches, input: &Path) -> Option<PathBuf> {
    if matches.get_flag("overwrite") {
        Some(input.to_path_buf())
    } else {
        matches.get_one::<PathBuf>("out").cloned()
    }
}

fn emit(document: &str, out: Option<&Path>) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            std::fs::write(path, document)
                .with_context(|| format!("writing {}", path.display()))?;
            tracing::info!(out = %path.display(), "reduced document written");
        }
        None => println!("{document}"),
    }
    Ok(())
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let input: &PathBuf = matches
        .get_one("input")
        .context("input path is required")?;
    let source = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;

    let phases = parse_phases(matches);
    if phases.is_empty() {
        anyhow::bail!(
            "no valid phases selected; known phases are node, attr, class, css, html"
        );
    }

    let config = ReduceConfig {
        devices: parse_devices(matches),
        phases,
        headless: !matches.get_flag("show"),
        dump_dir: matches.get_one::<PathBuf>("dump-diffs").cloned(),
    };

    tracing::info!(
        input = %input.display(),
        devices = ?config.devices,
        "starting reduction"
    );

    let reducer = Reducer::new(config);
    let reduction = reducer.reduce(&source).await?;

    if !reduction.pristine {
        tracing::warn!("final document did not revalidate as pixel-identical");
    }

    emit(&reduction.document, output_path(matches, input).as_deref())
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let default_filter = if matches.get_flag("verbose") {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(&matches).await {
        tracing::error!("{err:#}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches_for(args: &[&str]) -> ArgMatches {
        cli().try_get_matches_from(args).unwrap()
    }

    #[test]
    fn defaults_apply_without_flags() {
        let matches = matches_for(&["whittle", "page.html"]);
        assert_eq!(
            parse_devices(&matches),
            vec!["Desktop", "Galaxy Note 3", "iPad Pro landscape"]
        );
        assert_eq!(
            parse_phases(&matches),
            vec![PhaseName::Node, PhaseName::Attr]
        );
        assert!(!matches.get_flag("show"));
        assert!(!matches.get_flag("overwrite"));
    }

    #[test]
    fn repeated_flags_accumulate() {
        let matches = matches_for(&[
            "whittle",
            "page.html",
            "--device",
            "Desktop",
            "--device",
            "iPhone X",
            "--phase",
            "node",
            "--phase",
            "css",
        ]);
        assert_eq!(parse_devices(&matches), vec!["Desktop", "iPhone X"]);
        assert_eq!(
            parse_phases(&matches),
            vec![PhaseName::Node, PhaseName::Css]
        );
    }

    #[test]
    fn unknown_phase_names_are_skipped_not_fatal() {
        let matches = matches_for(&["whittle", "page.html", "--phase", "node", "--phase", "bogus"]);
        assert_eq!(parse_phases(&matches), vec![PhaseName::Node]);
    }

    #[test]
    fn out_flag_writes_the_document_to_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("smaller.html");
        let matches = matches_for(&["whittle", "page.html", "--out", out.to_str().unwrap()]);

        let resolved = output_path(&matches, Path::new("page.html"));
        assert_eq!(resolved.as_deref(), Some(out.as_path()));

        emit("<html></html>", resolved.as_deref()).unwrap();
        assert_eq!(std::fs::read_to_string(&out).unwrap(), "<html></html>");
    }

    #[test]
    fn overwrite_writes_back_over_the_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("page.html");
        std::fs::write(&input, "<html><body>before</body></html>").unwrap();
        let matches = matches_for(&["whittle", input.to_str().unwrap(), "--overwrite"]);

        let resolved = output_path(&matches, &input);
        assert_eq!(resolved.as_deref(), Some(input.as_path()));

        emit("<html></html>", resolved.as_deref()).unwrap();
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "<html></html>");
    }

    #[test]
    fn out_and_overwrite_conflict() {
        let result = cli().try_get_matches_from([
            "whittle",
            "page.html",
            "--out",
            "smaller.html",
            "--overwrite",
        ]);
        assert!(result.is_err());
    }
}
