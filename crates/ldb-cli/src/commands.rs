use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use clap::ArgMatches;
use colored::Colorize;
use ldb_core::{
    AddOptions, DiffKind, FilterSpec, IndexFormat, Instance, InstanceConfig, Predicate,
    RegisterOptions, StorageChange,
};
use ldb_query::FieldScorer;
use serde_json::Value;

use crate::cli::*;

/// Locations every command needs, resolved from global flags.
struct Session {
    config: InstanceConfig,
    workspace: PathBuf,
}

impl Session {
    /// Open an existing instance. Only `stage` may create one.
    fn open(&self) -> anyhow::Result<Instance> {
        Ok(Instance::open(&self.config)?)
    }

    /// Open the instance with the similarity scorer requested by `filters`.
    fn open_for(&self, filters: &FilterArgs) -> anyhow::Result<Instance> {
        let instance = self.open()?;
        Ok(match &filters.sim_field {
            Some(path) => instance.with_scorer(Box::new(FieldScorer::new(path)?)),
            None => instance,
        })
    }
}

pub fn run_command(cli: Cli, matches: &ArgMatches) -> anyhow::Result<()> {
    let sub = matches.subcommand().map(|(_, m)| m);
    let session = Session {
        config: InstanceConfig::resolve(cli.ldb_dir.as_deref().map(Path::new))?,
        workspace: PathBuf::from(cli.workspace),
    };
    match cli.command {
        Command::Init(args) => cmd_init(&session, args),
        Command::AddStorage(args) => cmd_add_storage(&session, args),
        Command::Storage(args) => cmd_storage(&session, args),
        Command::Index(args) => cmd_index(&session, args),
        Command::Stage(args) => cmd_stage(&session, args),
        Command::Add(args) => cmd_add(&session, args, sub),
        Command::Del(args) => cmd_del(&session, args, sub),
        Command::List(args) => cmd_list(&session, args, sub),
        Command::Tag(args) => cmd_tag(&session, args, sub),
        Command::Pull(args) => cmd_pull(&session, args, sub),
        Command::Commit(args) => cmd_commit(&session, args),
        Command::Instantiate(args) => cmd_instantiate(&session, args),
        Command::Status(_) => cmd_status(&session),
        Command::Diff(args) => cmd_diff(&session, args),
        Command::Ds(args) => cmd_ds(&session, args),
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Build filter specs in the order their flags appear on the command line.
///
/// Without matches (e.g. when called programmatically) the order is the
/// declaration order of [`FilterArgs`].
fn filter_specs(args: &FilterArgs, matches: Option<&ArgMatches>) -> anyhow::Result<Vec<FilterSpec>> {
    let mut ordered: Vec<(usize, FilterSpec)> = Vec::new();
    let mut push = |id: &str, specs: Vec<FilterSpec>| {
        let indices: Vec<usize> = matches
            .and_then(|m| m.indices_of(id))
            .map(|i| i.collect())
            .unwrap_or_default();
        for (n, spec) in specs.into_iter().enumerate() {
            let index = indices.get(n).copied().unwrap_or(usize::MAX);
            ordered.push((index, spec));
        }
    };

    push(
        "file",
        args.file
            .iter()
            .map(|s| -> anyhow::Result<FilterSpec> { Ok(FilterSpec::File(Predicate::parse(s)?)) })
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    push(
        "query",
        args.query
            .iter()
            .map(|s| -> anyhow::Result<FilterSpec> { Ok(FilterSpec::Query(Predicate::parse(s)?)) })
            .collect::<anyhow::Result<Vec<_>>>()?,
    );
    push("tag", args.tag.iter().map(|s| FilterSpec::Tag(split_tags(s))).collect());
    push(
        "sim",
        args.sim
            .iter()
            .map(|t| FilterSpec::Similarity { threshold: *t })
            .collect(),
    );
    push("limit", args.limit.iter().map(|n| FilterSpec::Limit(*n)).collect());
    push(
        "sample",
        args.sample
            .iter()
            .map(|n| FilterSpec::Sample { n: *n, seed: args.seed })
            .collect(),
    );
    push("version", args.version.iter().map(|v| FilterSpec::Version(*v)).collect());
    push(
        "user_version",
        args.user_version
            .iter()
            .map(|s| FilterSpec::UserVersion(parse_json_value(s)))
            .collect(),
    );

    // Stable sort keeps declaration order for unindexed specs.
    ordered.sort_by_key(|(index, _)| *index);
    Ok(ordered.into_iter().map(|(_, spec)| spec).collect())
}

fn split_tags(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// JSON when it parses, otherwise the raw text as a string.
fn parse_json_value(s: &str) -> Value {
    serde_json::from_str(s).unwrap_or_else(|_| Value::String(s.to_string()))
}

// ---------------------------------------------------------------------------
// Instance and storage
// ---------------------------------------------------------------------------

fn cmd_init(session: &Session, args: InitArgs) -> anyhow::Result<()> {
    let config = match &args.path {
        Some(path) => InstanceConfig::at(path),
        None => session.config.clone(),
    };
    let instance = Instance::init(&config, args.force)?;
    println!(
        "{} Initialized LDB instance at {}",
        "✓".green().bold(),
        instance.config().ldb_dir.display().to_string().bold()
    );
    Ok(())
}

fn cmd_add_storage(session: &Session, args: AddStorageArgs) -> anyhow::Result<()> {
    let mut ldb = session.open()?;
    let opts = RegisterOptions {
        read_add: args.read_add,
        force: args.force,
        ..Default::default()
    };
    let change = ldb.add_storage(&args.uri, &opts)?;
    let verb = match change {
        StorageChange::Added(_) => "Added storage location",
        StorageChange::Updated(_) => "Updated storage location",
    };
    let location = change.location();
    let mode = if location.read_and_add { " (read-add)" } else { "" };
    println!("{} {} {}{}", "✓".green().bold(), verb, location.path.bold(), mode.cyan());
    Ok(())
}

fn cmd_storage(session: &Session, args: StorageArgs) -> anyhow::Result<()> {
    let mut ldb = session.open()?;
    match args.action {
        Some(StorageAction::Update { uri, read_add }) => {
            let location = ldb.update_storage(&uri, read_add)?;
            let state = if location.read_and_add { "read-add" } else { "read-only" };
            println!("Updated {} → {}", location.path.bold(), state.cyan());
        }
        Some(StorageAction::Remove { uri }) => {
            let location = ldb.remove_storage(&uri)?;
            println!("Removed storage location {}", location.path.bold());
        }
        None => {
            let locations = ldb.storage_locations();
            if locations.is_empty() {
                println!("No storage locations registered.");
            }
            for location in locations {
                let mode = if location.read_and_add { "read-add" } else { "read-only" };
                println!("  {:<10} {}", mode.cyan(), location.path);
            }
        }
    }
    Ok(())
}

fn cmd_index(session: &Session, args: IndexArgs) -> anyhow::Result<()> {
    let ldb = session.open()?;
    let format: IndexFormat = args.format.parse()?;
    let tags: BTreeSet<String> = args.tag.iter().flat_map(|t| split_tags(t)).collect();
    let result = ldb.index(&args.paths, format, tags)?;
    println!("{result}");
    for failure in &result.failures {
        println!("  {} {}", "failed:".red(), failure);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Workspace
// ---------------------------------------------------------------------------

fn cmd_stage(session: &Session, args: StageArgs) -> anyhow::Result<()> {
    let ldb = Instance::open_or_quickstart(&session.config)?;
    let dir = args.dir.map(PathBuf::from).unwrap_or_else(|| session.workspace.clone());
    let outcome = ldb.stage(&args.dataset, &dir, args.force)?;
    println!("{} {}", "✓".green().bold(), outcome);
    Ok(())
}

fn cmd_add(session: &Session, args: AddArgs, matches: Option<&ArgMatches>) -> anyhow::Result<()> {
    let ldb = session.open_for(&args.filters)?;
    let opts = AddOptions::default()
        .with_filters(filter_specs(&args.filters, matches)?)
        .with_format(args.format.parse()?);
    let outcome = ldb.add(&session.workspace, &args.identifiers, &opts)?;
    if let Some(indexing) = &outcome.indexing {
        println!("{indexing}");
        for failure in &indexing.failures {
            println!("  {} {}", "failed:".red(), failure);
        }
    }
    println!("{} {}", "✓".green().bold(), outcome);
    Ok(())
}

fn cmd_del(session: &Session, args: DelArgs, matches: Option<&ArgMatches>) -> anyhow::Result<()> {
    let ldb = session.open_for(&args.filters)?;
    let filters = filter_specs(&args.filters, matches)?;
    let removed = ldb.delete(&session.workspace, &args.identifiers, &filters)?;
    println!("{} Deleted {} data object(s)", "✓".green().bold(), removed.to_string().bold());
    Ok(())
}

fn cmd_list(session: &Session, args: ListArgs, matches: Option<&ArgMatches>) -> anyhow::Result<()> {
    let ldb = session.open_for(&args.filters)?;
    let filters = filter_specs(&args.filters, matches)?;
    let entries = ldb.list(Some(session.workspace.as_path()), &args.identifiers, &filters)?;
    if args.summary {
        println!("{} data object(s)", entries.len().to_string().bold());
        return Ok(());
    }
    println!("{:<34} {:>5}  {}", "Data Object Hash".bold(), "Annot".bold(), "Data Object Path".bold());
    for entry in &entries {
        let version = entry
            .annotation_version
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".into());
        println!("0x{} {:>5}  {}", entry.hash.to_hex().yellow(), version, entry.path);
    }
    Ok(())
}

fn cmd_tag(session: &Session, args: TagArgs, matches: Option<&ArgMatches>) -> anyhow::Result<()> {
    if args.add.is_empty() && args.remove.is_empty() {
        anyhow::bail!("nothing to do: pass --add or --remove");
    }
    let ldb = session.open_for(&args.filters)?;
    let filters = filter_specs(&args.filters, matches)?;
    let changed = ldb.tag_objects(
        Some(session.workspace.as_path()),
        &args.identifiers,
        &filters,
        &args.add,
        &args.remove,
    )?;
    println!("{} Tagged {} data object(s)", "✓".green().bold(), changed.to_string().bold());
    Ok(())
}

fn cmd_pull(session: &Session, args: PullArgs, matches: Option<&ArgMatches>) -> anyhow::Result<()> {
    let ldb = session.open_for(&args.filters)?;
    let filters = filter_specs(&args.filters, matches)?;
    let outcome = ldb.pull(&session.workspace, &args.identifiers, &filters)?;
    let status = ldb.status(&session.workspace)?;
    println!("{}", format!("ds:{}", status.dataset_name).bold());
    for line in outcome.to_string().lines() {
        println!("  {line}");
    }
    Ok(())
}

fn cmd_commit(session: &Session, args: CommitArgs) -> anyhow::Result<()> {
    let ldb = session.open()?;
    let message = args.message.unwrap_or_default();
    let outcome = ldb.commit(&session.workspace, &message)?;
    println!("{} {}", "✓".green().bold(), outcome);
    println!("  Data objects: {}", outcome.num_objects);
    println!("  Version id:   {}", outcome.id.short_hex().dimmed());
    Ok(())
}

fn cmd_instantiate(session: &Session, args: InstantiateArgs) -> anyhow::Result<()> {
    let ldb = session.open()?;
    let target = args.target.map(PathBuf::from).unwrap_or_else(|| session.workspace.clone());
    let result = ldb.instantiate(&session.workspace, &target, args.force)?;
    println!("{result}");
    result.ensure_complete()?;
    Ok(())
}

fn cmd_status(session: &Session) -> anyhow::Result<()> {
    let ldb = session.open()?;
    let status = ldb.status(&session.workspace)?;
    println!("{status}");
    Ok(())
}

fn cmd_diff(session: &Session, args: DiffArgs) -> anyhow::Result<()> {
    let ldb = session.open()?;
    let diff = ldb.diff(&session.workspace, args.a.as_deref(), args.b.as_deref())?;
    if !args.summary {
        for entry in &diff.entries {
            let marker = match entry.kind {
                DiffKind::Addition => "+".green(),
                DiffKind::Deletion => "-".red(),
                DiffKind::Modification => "m".yellow(),
            };
            println!("{marker} 0x{}", entry.hash.to_hex());
        }
    }
    let summary = diff.summary();
    if summary.is_empty() {
        println!("No changes.");
    } else {
        println!(
            "Additions (+): {}  Deletions (-): {}  Modifications (m): {}",
            summary.additions, summary.deletions, summary.modifications
        );
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Datasets
// ---------------------------------------------------------------------------

fn cmd_ds(session: &Session, args: DsArgs) -> anyhow::Result<()> {
    let ldb = session.open()?;
    match args.action.unwrap_or(DsAction::List) {
        DsAction::List => {
            let datasets = ldb.list_datasets()?;
            if datasets.is_empty() {
                println!("No datasets committed.");
            }
            for ds in &datasets {
                println!(
                    "ds:{}.v{}  {} objects, {} annotations  {}",
                    ds.name.bold(),
                    ds.latest,
                    ds.num_objects,
                    ds.num_annotations,
                    ds.updated.dimmed()
                );
            }
        }
        DsAction::Log { name } => {
            for v in ldb.dataset_history(&name)? {
                let info = &v.version.commit_info;
                println!(
                    "{} {}  {}  {}",
                    format!("v{}", v.number).yellow().bold(),
                    v.id.short_hex().dimmed(),
                    info.commit_time,
                    info.created_by
                );
                if !info.commit_message.is_empty() {
                    println!("  {}", info.commit_message);
                }
            }
        }
        DsAction::Tag { add, remove } => {
            let tags = ldb.tag_workspace(&session.workspace, &add, &remove)?;
            let list: Vec<&str> = tags.iter().map(String::as_str).collect();
            println!("Dataset tags: {}", list.join(", ").cyan());
        }
        DsAction::Del { name } => {
            ldb.delete_dataset(&name)?;
            println!("Deleted dataset {}", format!("ds:{name}").bold());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::{CommandFactory, FromArgMatches};
    use ldb_core::{ErrorKind, GlobalConfig, LdbError};
    use ldb_query::FilterKind;
    use tempfile::TempDir;

    fn parse(argv: &[&str]) -> (Cli, ArgMatches) {
        let matches = Cli::command().try_get_matches_from(argv).unwrap();
        let cli = Cli::from_arg_matches(&matches).unwrap();
        (cli, matches)
    }

    fn kinds(specs: &[FilterSpec]) -> Vec<FilterKind> {
        specs.iter().map(|s| s.kind()).collect()
    }

    #[test]
    fn filters_follow_command_line_order() {
        let (cli, matches) = parse(&["ldb", "list", "ds:root", "--limit", "5", "--query", "class == \"i\""]);
        let Command::List(args) = cli.command else { panic!("wrong command") };
        let specs = filter_specs(&args.filters, matches.subcommand().map(|(_, m)| m)).unwrap();
        assert_eq!(kinds(&specs), vec![FilterKind::Limit, FilterKind::Query]);

        let (cli, matches) = parse(&["ldb", "list", "ds:root", "--query", "class == \"i\"", "--limit", "5"]);
        let Command::List(args) = cli.command else { panic!("wrong command") };
        let specs = filter_specs(&args.filters, matches.subcommand().map(|(_, m)| m)).unwrap();
        assert_eq!(kinds(&specs), vec![FilterKind::Query, FilterKind::Limit]);
    }

    #[test]
    fn repeated_filter_is_kept_for_the_pipeline_to_reject() {
        let (cli, matches) = parse(&["ldb", "del", "ds:root", "--limit", "1", "--limit", "2"]);
        let Command::Del(args) = cli.command else { panic!("wrong command") };
        let specs = filter_specs(&args.filters, matches.subcommand().map(|(_, m)| m)).unwrap();
        assert_eq!(specs, vec![FilterSpec::Limit(1), FilterSpec::Limit(2)]);
    }

    #[test]
    fn tag_filter_splits_commas() {
        let args = FilterArgs {
            tag: vec!["a, b,,c".into()],
            ..Default::default()
        };
        let specs = filter_specs(&args, None).unwrap();
        assert_eq!(specs, vec![FilterSpec::Tag(vec!["a".into(), "b".into(), "c".into()])]);
    }

    #[test]
    fn sample_carries_seed() {
        let args = FilterArgs {
            sample: vec![3],
            seed: Some(7),
            ..Default::default()
        };
        let specs = filter_specs(&args, None).unwrap();
        assert_eq!(specs, vec![FilterSpec::Sample { n: 3, seed: Some(7) }]);
    }

    #[test]
    fn user_version_accepts_json_or_text() {
        assert_eq!(parse_json_value("2"), Value::from(2));
        assert_eq!(parse_json_value("beta"), Value::String("beta".into()));
    }

    fn default_session(home: &Path) -> Session {
        let config =
            InstanceConfig::resolve_with(None, None, &GlobalConfig::default(), Some(home)).unwrap();
        Session {
            config,
            workspace: home.join("ws"),
        }
    }

    fn configuration_error(err: anyhow::Error) -> bool {
        err.downcast_ref::<LdbError>()
            .is_some_and(|e| e.kind() == ErrorKind::Configuration)
    }

    #[test]
    fn only_stage_creates_the_default_instance() {
        let home = TempDir::new().unwrap();
        let session = default_session(home.path());
        let ldb_dir = session.config.ldb_dir.clone();

        assert!(configuration_error(cmd_status(&session).unwrap_err()));
        assert!(configuration_error(cmd_storage(&session, StorageArgs { action: None }).unwrap_err()));
        let args = ListArgs {
            identifiers: Vec::new(),
            filters: FilterArgs::default(),
            summary: true,
        };
        assert!(configuration_error(cmd_list(&session, args, None).unwrap_err()));
        assert!(!ldb_dir.exists());

        let stage = StageArgs {
            dataset: "ds:first".into(),
            dir: None,
            force: false,
        };
        cmd_stage(&session, stage).unwrap();
        assert!(ldb_dir.exists());
        cmd_status(&session).unwrap();
    }

    #[test]
    fn explicit_missing_instance_is_never_created() {
        let root = TempDir::new().unwrap();
        let session = Session {
            config: InstanceConfig::at(root.path().join("instance")),
            workspace: root.path().join("ws"),
        };
        let stage = StageArgs {
            dataset: "ds:first".into(),
            dir: None,
            force: false,
        };
        assert!(configuration_error(cmd_stage(&session, stage).unwrap_err()));
        assert!(!root.path().join("instance").exists());
    }

    #[test]
    fn bad_predicate_is_an_error() {
        let args = FilterArgs {
            query: vec!["class ==".into()],
            ..Default::default()
        };
        assert!(filter_specs(&args, None).is_err());
    }
}
