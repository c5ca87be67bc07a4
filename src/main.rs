#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # ccx
//!
//! Command line front end for custom course overrides and grading.
//!
//! Course outlines and student state are read from JSON files. Overrides and
//! deadline extensions live in the SQLite file named by `CCX_DB_PATH`.

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use bpaf::*;
use ccx::{
    Settings,
    fields::{Field, FieldValue},
    grading::{StudentInfo, compute_grade},
    overrides::{
        ActiveContext, IndividualDueDateProvider, OverrideContext, OverrideStore, ProviderChain,
        ResolutionPass, SqliteOverrideStore, clear_override, set_override,
    },
    student::{ModuleTreeReset, StudentStateStore, attempt_stats, student_status},
    tree::{CourseFile, TreeStore},
    types::{CcxId, Location, StudentId},
};
use chrono::Utc;
use colored::Colorize;
use dotenvy::dotenv;
use tracing::metadata::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Override subcommands.
#[derive(Debug, Clone)]
enum OverrideCmd {
    /// Set an override
    Set {
        /// Course file
        course:   PathBuf,
        /// Custom course
        ccx:      String,
        /// Block location
        location: String,
        /// Field name
        field:    String,
        /// New value
        value:    String,
    },
    /// Remove an override
    Clear {
        /// Course file
        course:   PathBuf,
        /// Custom course
        ccx:      String,
        /// Block location
        location: String,
        /// Field name
        field:    String,
    },
    /// Print a resolved field
    Show {
        /// Course file
        course:   PathBuf,
        /// Custom course, if any
        ccx:      Option<String>,
        /// Student, if any
        student:  Option<String>,
        /// Block location
        location: String,
        /// Field name
        field:    String,
    },
    /// List the overrides of a custom course
    List {
        /// Custom course
        ccx: String,
    },
}

/// Deadline extension subcommands.
#[derive(Debug, Clone)]
enum ExtensionCmd {
    /// Grant an extension
    Set {
        /// Student
        student:  String,
        /// Block location
        location: String,
        /// New due date
        due:      String,
    },
    /// Withdraw an extension
    Clear {
        /// Student
        student:  String,
        /// Block location
        location: String,
    },
}

/// Top-level CLI commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Compute a student's grade
    Grade {
        /// Course file
        course:  PathBuf,
        /// Student state file
        states:  PathBuf,
        /// Student
        student: String,
        /// Custom course, if any
        ccx:     Option<String>,
        /// Print JSON instead of a table
        json:    bool,
    },
    /// Override operations
    Override(OverrideCmd),
    /// Deadline extension operations
    Extension(ExtensionCmd),
    /// Reset a student's problem state under a block
    Reset {
        /// Course file
        course:   PathBuf,
        /// Student state file
        states:   PathBuf,
        /// Student
        student:  String,
        /// Root of the reset
        location: String,
        /// Only print what would be reset
        dry_run:  bool,
    },
    /// Attempt statistics for randomized assessments
    AttemptStats {
        /// Course file
        course: PathBuf,
        /// Student state file
        states: PathBuf,
        /// Root block, defaults to the course
        root:   Option<String>,
        /// Custom course, if any
        ccx:    Option<String>,
        /// Print JSON instead of tables
        json:   bool,
    },
    /// A student's standing on released proctored assessments
    Status {
        /// Course file
        course:       PathBuf,
        /// Student state file
        states:       PathBuf,
        /// Student
        student:      String,
        /// Custom course, if any
        ccx:          Option<String>,
        /// Reset assessments attempted without full marks
        reset_failed: bool,
        /// Print JSON instead of a table
        json:         bool,
    },
}

/// Parse the command line arguments and return a `Cmd` enum
fn options() -> Cmd {
    /// parses the course file path
    fn course() -> impl Parser<PathBuf> {
        long("course")
            .short('c')
            .help("Path to the course JSON file")
            .argument::<PathBuf>("PATH")
    }

    /// parses the student state file path
    fn states() -> impl Parser<PathBuf> {
        long("states")
            .short('s')
            .help("Path to the student state JSON file")
            .argument::<PathBuf>("PATH")
    }

    /// parses a custom course id
    fn ccx() -> impl Parser<String> {
        long("ccx").help("Custom course id").argument::<String>("CCX")
    }

    /// parses a student id
    fn student() -> impl Parser<String> {
        long("student").help("Student id").argument::<String>("STUDENT")
    }

    /// parses a block location
    fn location() -> impl Parser<String> {
        positional("LOCATION").help("Block location")
    }

    /// parses a field name
    fn field() -> impl Parser<String> {
        positional("FIELD").help("Field name, e.g. due or visible_to_staff_only")
    }

    /// parses the JSON output switch
    fn json() -> impl Parser<bool> {
        long("json").help("Print JSON").switch()
    }

    let grade = {
        let course = course();
        let states = states();
        let student = student();
        let ccx = ccx().optional();
        let json = json();
        construct!(Cmd::Grade {
            course,
            states,
            student,
            ccx,
            json
        })
    }
    .to_options()
    .command("grade")
    .help("Compute a student's grade");

    let override_set = {
        let course = course();
        let ccx = ccx();
        let location = location();
        let field = field();
        let value = positional::<String>("VALUE").help("New value");
        construct!(OverrideCmd::Set {
            course,
            ccx,
            location,
            field,
            value
        })
    }
    .to_options()
    .command("set")
    .help("Override a field for a custom course");

    let override_clear = {
        let course = course();
        let ccx = ccx();
        let location = location();
        let field = field();
        construct!(OverrideCmd::Clear {
            course,
            ccx,
            location,
            field
        })
    }
    .to_options()
    .command("clear")
    .help("Remove an override");

    let override_show = {
        let course = course();
        let ccx = ccx().optional();
        let student = student().optional();
        let location = location();
        let field = field();
        construct!(OverrideCmd::Show {
            course,
            ccx,
            student,
            location,
            field
        })
    }
    .to_options()
    .command("show")
    .help("Print the resolved value of a field");

    let override_list = {
        let ccx = ccx();
        construct!(OverrideCmd::List { ccx })
    }
    .to_options()
    .command("list")
    .help("List the overrides of a custom course");

    let overrides = construct!([override_set, override_clear, override_show, override_list])
        .to_options()
        .command("override")
        .help("Custom course override commands")
        .map(Cmd::Override);

    let extension_set = {
        let student = student();
        let location = location();
        let due = positional::<String>("DUE").help("New due date, RFC 3339 or YYYY-MM-DD");
        construct!(ExtensionCmd::Set {
            student,
            location,
            due
        })
    }
    .to_options()
    .command("set")
    .help("Grant a deadline extension");

    let extension_clear = {
        let student = student();
        let location = location();
        construct!(ExtensionCmd::Clear { student, location })
    }
    .to_options()
    .command("clear")
    .help("Withdraw a deadline extension");

    let extension = construct!([extension_set, extension_clear])
        .to_options()
        .command("extension")
        .help("Per-student deadline extensions")
        .map(Cmd::Extension);

    let reset = {
        let course = course();
        let states = states();
        let student = student();
        let location = location();
        let dry_run = long("dry-run")
            .help("Only print what would be reset")
            .switch();
        construct!(Cmd::Reset {
            course,
            states,
            student,
            location,
            dry_run
        })
    }
    .to_options()
    .command("reset")
    .help("Reset a student's problem and randomization state under a block");

    let stats = {
        let course = course();
        let states = states();
        let root = long("root")
            .help("Root block, defaults to the course")
            .argument::<String>("LOCATION")
            .optional();
        let ccx = ccx().optional();
        let json = json();
        construct!(Cmd::AttemptStats {
            course,
            states,
            root,
            ccx,
            json
        })
    }
    .to_options()
    .command("attempt-stats")
    .help("Attempt statistics for randomized assessments");

    let status = {
        let course = course();
        let states = states();
        let student = student();
        let ccx = ccx().optional();
        let reset_failed = long("reset-failed")
            .help("Reset assessments attempted without full marks")
            .switch();
        let json = json();
        construct!(Cmd::Status {
            course,
            states,
            student,
            ccx,
            reset_failed,
            json
        })
    }
    .to_options()
    .command("status")
    .help("A student's standing on released proctored assessments");

    let cmd = construct!([grade, overrides, extension, reset, stats, status]);

    cmd.to_options()
        .descr("Field overrides and grading for custom courses")
        .run()
}

/// Opens the configured override store.
fn open_store(settings: &Settings) -> Result<Arc<SqliteOverrideStore>> {
    let store = SqliteOverrideStore::open(settings.db_path()).with_context(|| {
        format!(
            "Could not open override store {}",
            settings.db_path().display()
        )
    })?;
    Ok(Arc::new(store))
}

/// Builds the configured chain for commands that only read overrides. A
/// missing store reads as one with no overrides and is not created.
fn read_chain(settings: &Settings) -> Result<ProviderChain> {
    let existing = SqliteOverrideStore::open_existing(settings.db_path()).with_context(|| {
        format!(
            "Could not open override store {}",
            settings.db_path().display()
        )
    })?;
    Ok(match existing {
        Some(store) => ProviderChain::from_settings(settings, Arc::new(store)),
        None => ProviderChain::new(Vec::new(), settings.inheritance()),
    })
}

/// Builds the active context from optional CLI values.
fn active_context(ccx: Option<String>, student: Option<String>) -> ActiveContext {
    ActiveContext {
        ccx:     ccx.map(CcxId::from),
        student: student.map(StudentId::from),
    }
}

fn main() -> Result<()> {
    dotenv().ok();
    let settings = Settings::from_env()?;

    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false);
    let filter_layer = LevelFilter::from_level(settings.log_level());
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let cmd = options();

    match cmd {
        Cmd::Grade {
            course,
            states,
            student,
            ccx,
            json,
        } => {
            let (tree, policy) = CourseFile::load(&course)?.into_parts()?;
            let states = StudentStateStore::load(&states)?;
            let chain = read_chain(&settings)?;
            let info = StudentInfo {
                is_staff: states.is_staff(&StudentId::from(student.as_str())),
                id:       StudentId::from(student.as_str()),
            };
            let pass = ResolutionPass::new(&tree, &chain, active_context(ccx, Some(student)));
            let summary = compute_grade(&pass, &info, &policy, &states, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("{}", summary.to_table());
                if let Some(threshold) = policy.passing_threshold() {
                    let verdict = if summary.total_percent >= threshold {
                        "PASS".green().bold()
                    } else {
                        "FAIL".red().bold()
                    };
                    println!("{verdict}");
                }
            }
        }
        Cmd::Override(override_cmd) => match override_cmd {
            OverrideCmd::Set {
                course,
                ccx,
                location,
                field,
                value,
            } => {
                let (tree, _) = CourseFile::load(&course)?.into_parts()?;
                let chain = ProviderChain::from_settings(&settings, open_store(&settings)?);
                let parsed = FieldValue::parse(field.parse::<Field>()?, &value)?;
                let outcome = set_override(
                    &tree,
                    &chain,
                    &CcxId::from(ccx),
                    &Location::from(location),
                    &field,
                    &parsed,
                )?;
                println!("{outcome:?}");
            }
            OverrideCmd::Clear {
                course,
                ccx,
                location,
                field,
            } => {
                let (tree, _) = CourseFile::load(&course)?.into_parts()?;
                let chain = ProviderChain::from_settings(&settings, open_store(&settings)?);
                let outcome = clear_override(
                    &tree,
                    &chain,
                    &CcxId::from(ccx),
                    &Location::from(location),
                    &field,
                )?;
                println!("{outcome:?}");
            }
            OverrideCmd::Show {
                course,
                ccx,
                student,
                location,
                field,
            } => {
                let (tree, _) = CourseFile::load(&course)?.into_parts()?;
                let chain = read_chain(&settings)?;
                let pass = ResolutionPass::new(&tree, &chain, active_context(ccx, student));
                match pass.read_location(&Location::from(location), &field)? {
                    Some(value) => println!("{value}"),
                    None => println!("{}", "(unset)".dimmed()),
                }
            }
            OverrideCmd::List { ccx } => {
                let Some(store) = SqliteOverrideStore::open_existing(settings.db_path())? else {
                    return Ok(());
                };
                let records = store.list(&OverrideContext::Ccx(CcxId::from(ccx)))?;
                for record in records {
                    println!("{} {} = {}", record.location, record.field, record.value);
                }
            }
        },
        Cmd::Extension(extension_cmd) => {
            let provider = IndividualDueDateProvider::new(open_store(&settings)?);
            match extension_cmd {
                ExtensionCmd::Set {
                    student,
                    location,
                    due,
                } => {
                    let due = FieldValue::parse(Field::Due, &due)?
                        .as_date()
                        .context("Due date did not parse as a date")?;
                    provider.set_due_extension(
                        &StudentId::from(student),
                        &Location::from(location),
                        due,
                    )?;
                }
                ExtensionCmd::Clear { student, location } => {
                    if !provider
                        .clear_due_extension(&StudentId::from(student), &Location::from(location))?
                    {
                        eprintln!("{}", "No extension to clear".yellow());
                    }
                }
            }
        }
        Cmd::Reset {
            course,
            states: states_path,
            student,
            location,
            dry_run,
        } => {
            let (tree, _) = CourseFile::load(&course)?.into_parts()?;
            let mut states = StudentStateStore::load(&states_path)?;
            let student = StudentId::from(student);
            let reset =
                ModuleTreeReset::collect(&tree, &states, &student, &Location::from(location))?;

            for entry in reset.targets() {
                println!("{entry}");
            }
            if !dry_run {
                println!("{}", reset.reset(&mut states));
                states.save(&states_path)?;
            }
        }
        Cmd::AttemptStats {
            course,
            states,
            root,
            ccx,
            json,
        } => {
            let (tree, _) = CourseFile::load(&course)?.into_parts()?;
            let states = StudentStateStore::load(&states)?;
            let root = match root {
                Some(root) => Location::from(root),
                None => tree.get_node(tree.root())?.location().clone(),
            };
            let chain = read_chain(&settings)?;
            let pass = ResolutionPass::new(&tree, &chain, active_context(ccx, None));
            let stats = attempt_stats(&pass, &root, &states, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", stats.problems_table());
                println!("{}", stats.students_table());
            }
        }
        Cmd::Status {
            course,
            states: states_path,
            student,
            ccx,
            reset_failed,
            json,
        } => {
            let (tree, policy) = CourseFile::load(&course)?.into_parts()?;
            let mut states = StudentStateStore::load(&states_path)?;
            let chain = read_chain(&settings)?;
            let student = StudentId::from(student);
            let active = ActiveContext {
                ccx:     ccx.map(CcxId::from),
                student: Some(student.clone()),
            };
            let pass = ResolutionPass::new(&tree, &chain, active);
            let status = student_status(&pass, &policy, &states, &student, Utc::now())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("{}", status.to_table());
                for failed in status.failed() {
                    println!(
                        "{} attempted {} but failed ({})",
                        status.student,
                        failed.name.yellow(),
                        failed.score.map(|s| s.to_string()).unwrap_or_default()
                    );
                }
            }
            if reset_failed {
                for report in status.reset_failed(&tree, &mut states)? {
                    println!("{report}");
                }
                states.save(&states_path)?;
            }
        }
    };

    Ok(())
}
