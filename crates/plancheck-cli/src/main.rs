mod display;
mod form;
mod render;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use plancheck_ai::{ChecklistBuilder, FieldEdit, HttpAdvisor, enhance_checklist};
use plancheck_core::{Checklist, ReviewConfig, normalize_term};
use plancheck_store::{DefinitionsStore, LearningStore, Table, group_names, load_extracted_file};
use tracing::{info, warn};

use render::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "plancheck", about = "Insurance plan checklist review", version)]
struct Cli {
    /// TOML config file
    #[arg(long, global = true, env = "PLANCHECK_CONFIG")]
    config: Option<PathBuf>,

    /// Learned synonyms/corrections file (overrides the config)
    #[arg(long, global = true, env = "PLANCHECK_LEARNING")]
    learning: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a checklist for one group and write the artifacts
    Generate {
        /// Field definitions table (CSV/XLSX)
        #[arg(long)]
        definitions: PathBuf,
        /// Extracted data table (CSV/XLSX)
        #[arg(long)]
        extracted: PathBuf,
        /// Group name; selects rows in a combined file
        #[arg(long)]
        group: String,
        #[arg(long, value_enum, value_delimiter = ',', default_values = ["html", "json"])]
        format: Vec<OutputFormat>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Ask the configured advisor about fields that are not found
        #[arg(long)]
        advise: bool,
    },
    /// List the group names in a combined extracted file
    Groups {
        #[arg(long)]
        extracted: PathBuf,
    },
    /// Apply edits posted from the HTML form to a saved checklist
    Resubmit {
        #[arg(long)]
        definitions: PathBuf,
        /// Checklist JSON written by `generate`
        #[arg(long)]
        checklist: PathBuf,
        /// URL-encoded form body
        #[arg(long)]
        form: PathBuf,
        #[arg(long, value_enum, value_delimiter = ',', default_values = ["html", "json"])]
        format: Vec<OutputFormat>,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// Record changed values as learned corrections
        #[arg(long)]
        learn: bool,
        #[arg(long)]
        actor: Option<String>,
    },
    /// Teach a synonym or correction
    Teach {
        #[command(subcommand)]
        lesson: Lesson,
    },
    /// Show recent learning history
    History {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Print the field definitions
    Definitions {
        #[arg(long)]
        definitions: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum Lesson {
    /// TERM is also known as SYNONYM
    Synonym {
        term: String,
        synonym: String,
        #[arg(long)]
        actor: Option<String>,
    },
    /// INCORRECT should be read as CORRECT
    Correction {
        incorrect: String,
        correct: String,
        #[arg(long)]
        actor: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = ReviewConfig::load(cli.config.as_deref()).context("loading config")?;
    let learning_path = learning_path(cli.learning.as_deref(), &config);

    match cli.command {
        Command::Generate {
            definitions,
            extracted,
            group,
            format,
            out_dir,
            advise,
        } => {
            let definitions = DefinitionsStore::load(&definitions)?;
            let learning = open_learning(&learning_path);
            let records = load_extracted_file(&extracted, Some(&group), &config.not_found_markers)?;
            if records.is_empty() {
                warn!(group = %group, "no extracted records for group");
            }

            let builder = ChecklistBuilder::new(&definitions, &learning, &config);
            let mut checklist = builder.build(&group, &records);
            if advise {
                run_advisor(&mut checklist, &definitions, &config).await;
            }

            display::print_checklist(&checklist);
            write_and_list(&checklist, &format, &out_dir)?;
        }
        Command::Groups { extracted } => {
            let table = Table::read(&extracted)?;
            let names = group_names(&table);
            if names.is_empty() {
                println!("No group column in {}", extracted.display());
            }
            for name in names {
                println!("{name}");
            }
        }
        Command::Resubmit {
            definitions,
            checklist,
            form,
            format,
            out_dir,
            learn,
            actor,
        } => {
            let definitions = DefinitionsStore::load(&definitions)?;
            let mut learning = open_learning(&learning_path);
            let mut saved = load_checklist(&checklist)?;
            let body = std::fs::read_to_string(&form)
                .with_context(|| format!("reading form body {}", form.display()))?;
            let edits = form::parse_edits(&body);
            if edits.is_empty() {
                bail!("no field inputs in {}", form.display());
            }

            let changed = ChecklistBuilder::new(&definitions, &learning, &config)
                .apply_edits(&mut saved, edits);
            println!("{} field(s) changed", changed.len());

            if learn {
                let actor = actor.as_deref().unwrap_or(&config.default_actor);
                for (incorrect, correct) in learnable(&changed) {
                    learning
                        .add_correction(incorrect, correct, actor)
                        .with_context(|| format!("learning correction '{incorrect}' -> '{correct}'"))?;
                    println!("learned: '{incorrect}' -> '{correct}'");
                }
            }

            display::print_checklist(&saved);
            write_and_list(&saved, &format, &out_dir)?;
        }
        Command::Teach { lesson } => {
            let mut learning = open_learning(&learning_path);
            match lesson {
                Lesson::Synonym {
                    term,
                    synonym,
                    actor,
                } => {
                    let actor = actor.as_deref().unwrap_or(&config.default_actor);
                    if learning.add_synonym(&term, &synonym, actor)? {
                        println!("'{synonym}' is now a synonym of '{term}'");
                    } else {
                        println!("'{synonym}' was already a synonym of '{term}'");
                    }
                }
                Lesson::Correction {
                    incorrect,
                    correct,
                    actor,
                } => {
                    let actor = actor.as_deref().unwrap_or(&config.default_actor);
                    learning.add_correction(&incorrect, &correct, actor)?;
                    println!("'{incorrect}' will be read as '{correct}'");
                }
            }
        }
        Command::History { limit } => {
            let learning = open_learning(&learning_path);
            println!(
                "{} synonym group(s), {} correction(s) in {}\n",
                learning.synonym_count(),
                learning.correction_count(),
                learning.path().display()
            );
            display::print_history(learning.recent_history(limit));
        }
        Command::Definitions { definitions } => {
            let definitions = DefinitionsStore::load(&definitions)?;
            display::print_definitions(&definitions);
        }
    }

    Ok(())
}

/// `--learning` wins over the config file.
fn learning_path(flag: Option<&Path>, config: &ReviewConfig) -> PathBuf {
    flag.map(Path::to_path_buf)
        .unwrap_or_else(|| config.learning_path.clone())
}

/// Open the learning store; a corrupt file is set aside and replaced by an
/// empty store.
fn open_learning(path: &Path) -> LearningStore {
    let (store, problem) = LearningStore::load_or_rebuild(path);
    if let Some(err) = problem {
        eprintln!("warning: {err}; starting with empty learned mappings");
    }
    store
}

fn load_checklist(path: &Path) -> anyhow::Result<Checklist> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading checklist {}", path.display()))?;
    let checklist: Checklist = serde_json::from_str(&text)
        .with_context(|| format!("parsing checklist {}", path.display()))?;
    info!(group = %checklist.group_name, fields = checklist.fields.len(), "loaded checklist");
    Ok(checklist)
}

/// Advise on unresolved fields. A missing or broken advisor setup is reported
/// and the checklist is left as validated.
async fn run_advisor(checklist: &mut Checklist, definitions: &DefinitionsStore, config: &ReviewConfig) {
    let advisor = match HttpAdvisor::from_config(&config.advisor) {
        Ok(Some(advisor)) => advisor,
        Ok(None) => {
            eprintln!("warning: --advise given but no advisor endpoint is configured");
            return;
        }
        Err(e) => {
            eprintln!("warning: advisor unavailable: {e}");
            return;
        }
    };
    let report = enhance_checklist(checklist, definitions, &advisor, config.advisor.timeout()).await;
    println!("advisor: {} field(s) advised, {} failed", report.advised, report.failed);
}

fn write_and_list(checklist: &Checklist, formats: &[OutputFormat], out_dir: &Path) -> anyhow::Result<()> {
    for path in render::write_artifacts(checklist, formats, out_dir)? {
        println!("wrote {}", path.display());
    }
    Ok(())
}

/// Value changes a reviewer made that read as corrections of the extracted
/// text: both sides present and different after normalization.
fn learnable(changed: &[FieldEdit]) -> Vec<(&str, &str)> {
    changed
        .iter()
        .filter_map(|edit| {
            let before = edit.before.as_found()?;
            let after = edit.after.as_found()?;
            (normalize_term(before) != normalize_term(after)).then_some((before, after))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;
    use plancheck_core::ExtractedValue;

    use super::*;

    fn edit(before: ExtractedValue, after: ExtractedValue) -> FieldEdit {
        FieldEdit {
            field: "TPA".into(),
            before,
            after,
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn learning_flag_overrides_config() {
        let config = ReviewConfig::default();
        assert_eq!(learning_path(None, &config), PathBuf::from("learned_mappings.json"));
        assert_eq!(
            learning_path(Some(Path::new("/tmp/l.json")), &config),
            PathBuf::from("/tmp/l.json")
        );
    }

    #[test]
    fn generate_defaults() {
        let cli = Cli::try_parse_from([
            "plancheck",
            "generate",
            "--definitions",
            "defs.csv",
            "--extracted",
            "data.csv",
            "--group",
            "Helios",
        ])
        .unwrap();
        let Command::Generate {
            format,
            out_dir,
            advise,
            ..
        } = cli.command
        else {
            panic!("expected generate");
        };
        assert_eq!(format, vec![OutputFormat::Html, OutputFormat::Json]);
        assert_eq!(out_dir, PathBuf::from("."));
        assert!(!advise);
    }

    #[test]
    fn format_list_is_comma_separated() {
        let cli = Cli::try_parse_from([
            "plancheck",
            "--learning",
            "l.json",
            "generate",
            "--definitions",
            "d.csv",
            "--extracted",
            "e.csv",
            "--group",
            "G",
            "--format",
            "xlsx,pdf",
        ])
        .unwrap();
        assert_eq!(cli.learning, Some(PathBuf::from("l.json")));
        let Command::Generate { format, .. } = cli.command else {
            panic!("expected generate");
        };
        assert_eq!(format, vec![OutputFormat::Xlsx, OutputFormat::Pdf]);
    }

    #[test]
    fn teach_subcommands() {
        let cli = Cli::try_parse_from([
            "plancheck",
            "teach",
            "correction",
            "Adminstrator",
            "Administrator",
            "--actor",
            "alice",
        ])
        .unwrap();
        match cli.command {
            Command::Teach {
                lesson:
                    Lesson::Correction {
                        incorrect,
                        correct,
                        actor,
                    },
            } => {
                assert_eq!(incorrect, "Adminstrator");
                assert_eq!(correct, "Administrator");
                assert_eq!(actor.as_deref(), Some("alice"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn learnable_edits() {
        let found = |s: &str| ExtractedValue::Found(s.into());
        let changed = vec![
            edit(found("Adminstrator"), found("Administrator")),
            edit(found("Cigna"), found("  CIGNA ")),
            edit(ExtractedValue::NotFound, found("18 months")),
            edit(found("Aetna"), ExtractedValue::NotFound),
        ];
        assert_eq!(learnable(&changed), vec![("Adminstrator", "Administrator")]);
    }

    #[test]
    fn open_learning_sets_aside_corrupt_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("learned.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = open_learning(&path);
        assert_eq!(store.synonym_count(), 0);
        assert!(tmp.path().join("learned.json.corrupt").exists());
    }

    #[test]
    fn load_checklist_round_trips_json_artifact() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cl = render::fixtures::checklist();
        let path = tmp.path().join("c.json");
        std::fs::write(&path, render::render_json(&cl).unwrap()).unwrap();
        assert_eq!(load_checklist(&path).unwrap(), cl);
    }
}
