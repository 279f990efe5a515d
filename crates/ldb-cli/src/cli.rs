use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "ldb",
    about = "LDB: stage, index and version datasets of data objects",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Instance directory, overriding LDB_DIR and ~/.ldb/config
    #[arg(long, global = true)]
    pub ldb_dir: Option<String>,

    /// Workspace directory the command operates on
    #[arg(short = 'w', long, global = true, default_value = ".")]
    pub workspace: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a new LDB instance
    Init(InitArgs),
    /// Register a storage location
    AddStorage(AddStorageArgs),
    /// List, update or remove storage locations
    Storage(StorageArgs),
    /// Index data objects and annotations under storage paths
    Index(IndexArgs),
    /// Stage a dataset into a workspace directory
    Stage(StageArgs),
    /// Add data objects to the workspace
    Add(AddArgs),
    /// Remove data objects from the workspace
    Del(DelArgs),
    /// List data objects
    #[command(visible_alias = "ls")]
    List(ListArgs),
    /// Add or remove tags on data objects
    Tag(TagArgs),
    /// Pin workspace members to their newest annotation
    Pull(PullArgs),
    /// Save the workspace as a new dataset version
    Commit(CommitArgs),
    /// Copy workspace data objects and annotations into a directory
    Instantiate(InstantiateArgs),
    /// Show workspace status
    Status(StatusArgs),
    /// Show changes between collections
    Diff(DiffArgs),
    /// List, inspect, tag or delete datasets
    Ds(DsArgs),
}

#[derive(Args)]
pub struct InitArgs {
    pub path: Option<String>,
    /// Recreate an existing instance
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct AddStorageArgs {
    pub uri: String,
    /// Copy unregistered files added to workspaces into this location
    #[arg(short = 'a', long)]
    pub read_add: bool,
    /// Replace registered locations nested below this one
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct StorageArgs {
    #[command(subcommand)]
    pub action: Option<StorageAction>,
}

#[derive(Subcommand)]
pub enum StorageAction {
    /// Set or clear the read-add flag of a location
    Update {
        uri: String,
        #[arg(short = 'a', long)]
        read_add: bool,
    },
    Remove { uri: String },
}

#[derive(Args)]
pub struct IndexArgs {
    #[arg(required = true)]
    pub paths: Vec<String>,
    #[arg(long, default_value = "auto")]
    pub format: String,
    /// Tag every indexed data object
    #[arg(long)]
    pub tag: Vec<String>,
}

#[derive(Args)]
pub struct StageArgs {
    /// ds:<name>[.v<N>]
    pub dataset: String,
    pub dir: Option<String>,
    /// Discard uncommitted changes or stage into a non-empty directory
    #[arg(short, long)]
    pub force: bool,
}

/// Filters shared by `add`, `del`, `list`, `tag` and `pull`, applied in the order
/// given on the command line.
#[derive(Args, Default)]
pub struct FilterArgs {
    /// Predicate over data object metadata
    #[arg(long, value_name = "EXPR")]
    pub file: Vec<String>,
    /// Predicate over annotation content
    #[arg(long, value_name = "EXPR")]
    pub query: Vec<String>,
    /// Keep objects carrying any of these comma-separated tags
    #[arg(long, value_name = "TAGS")]
    pub tag: Vec<String>,
    /// Keep objects scoring at least THRESHOLD
    #[arg(long, value_name = "THRESHOLD")]
    pub sim: Vec<f64>,
    /// Annotation field used as the similarity score
    #[arg(long, value_name = "PATH")]
    pub sim_field: Option<String>,
    #[arg(long, value_name = "N")]
    pub limit: Vec<usize>,
    /// Uniform random subset of N objects
    #[arg(long, value_name = "N")]
    pub sample: Vec<usize>,
    #[arg(long)]
    pub seed: Option<u64>,
    /// Annotation version number
    #[arg(long, value_name = "N")]
    pub version: Vec<u32>,
    /// Value of ldb.user_version in the annotation (JSON)
    #[arg(long, value_name = "VALUE")]
    pub user_version: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    #[arg(required = true)]
    pub identifiers: Vec<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Format used when a path has to be indexed
    #[arg(long, default_value = "auto")]
    pub format: String,
}

#[derive(Args)]
pub struct DelArgs {
    #[arg(required = true)]
    pub identifiers: Vec<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Args)]
pub struct ListArgs {
    pub identifiers: Vec<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
    /// Print only the number of matches
    #[arg(short, long)]
    pub summary: bool,
}

#[derive(Args)]
pub struct TagArgs {
    pub identifiers: Vec<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
    #[arg(short, long, value_name = "TAG")]
    pub add: Vec<String>,
    #[arg(short, long, value_name = "TAG")]
    pub remove: Vec<String>,
}

#[derive(Args)]
pub struct PullArgs {
    /// Defaults to every workspace member
    pub identifiers: Vec<String>,
    #[command(flatten)]
    pub filters: FilterArgs,
}

#[derive(Args)]
pub struct CommitArgs {
    #[arg(short, long)]
    pub message: Option<String>,
}

#[derive(Args)]
pub struct InstantiateArgs {
    /// Defaults to the workspace directory
    #[arg(short, long)]
    pub target: Option<String>,
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Args)]
pub struct StatusArgs {}

#[derive(Args)]
pub struct DiffArgs {
    pub a: Option<String>,
    pub b: Option<String>,
    /// Print only the summary counts
    #[arg(short, long)]
    pub summary: bool,
}

#[derive(Args)]
pub struct DsArgs {
    #[command(subcommand)]
    pub action: Option<DsAction>,
}

#[derive(Subcommand)]
pub enum DsAction {
    List,
    /// Show every version of a dataset
    Log { name: String },
    /// Tag the dataset staged in the workspace
    Tag {
        #[arg(short, long, value_name = "TAG")]
        add: Vec<String>,
        #[arg(short, long, value_name = "TAG")]
        remove: Vec<String>,
    },
    Del { name: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::try_parse_from(["ldb", "init", "/tmp/inst", "--force"]).unwrap();
        if let Command::Init(args) = cli.command {
            assert!(args.force);
            assert_eq!(args.path, Some("/tmp/inst".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_add_storage() {
        let cli = Cli::try_parse_from(["ldb", "add-storage", "-a", "gs://bucket/a"]).unwrap();
        if let Command::AddStorage(args) = cli.command {
            assert!(args.read_add);
            assert!(!args.force);
            assert_eq!(args.uri, "gs://bucket/a");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_storage_update() {
        let cli = Cli::try_parse_from(["ldb", "storage", "update", "/data"]).unwrap();
        if let Command::Storage(StorageArgs { action: Some(StorageAction::Update { uri, read_add }) }) = cli.command {
            assert_eq!(uri, "/data");
            assert!(!read_add);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_index_requires_path() {
        assert!(Cli::try_parse_from(["ldb", "index"]).is_err());
        let cli = Cli::try_parse_from(["ldb", "index", "--format", "bare", "a", "b"]).unwrap();
        if let Command::Index(args) = cli.command {
            assert_eq!(args.paths, vec!["a", "b"]);
            assert_eq!(args.format, "bare");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_stage() {
        let cli = Cli::try_parse_from(["ldb", "stage", "ds:numerals.v1", "ws", "-f"]).unwrap();
        if let Command::Stage(args) = cli.command {
            assert_eq!(args.dataset, "ds:numerals.v1");
            assert_eq!(args.dir, Some("ws".into()));
            assert!(args.force);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_add_with_filters() {
        let cli = Cli::try_parse_from([
            "ldb", "add", "ds:root", "--query", "class == \"i\"", "--limit", "5",
        ])
        .unwrap();
        if let Command::Add(args) = cli.command {
            assert_eq!(args.identifiers, vec!["ds:root"]);
            assert_eq!(args.filters.query, vec!["class == \"i\""]);
            assert_eq!(args.filters.limit, vec![5]);
            assert_eq!(args.format, "auto");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ls_alias() {
        let cli = Cli::try_parse_from(["ldb", "ls", "-s"]).unwrap();
        if let Command::List(args) = cli.command {
            assert!(args.identifiers.is_empty());
            assert!(args.summary);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_tag_add_and_filter() {
        let cli = Cli::try_parse_from(["ldb", "tag", "ds:root", "--tag", "raw", "-a", "clean"]).unwrap();
        if let Command::Tag(args) = cli.command {
            assert_eq!(args.filters.tag, vec!["raw"]);
            assert_eq!(args.add, vec!["clean"]);
            assert!(args.remove.is_empty());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_pull() {
        let cli = Cli::try_parse_from(["ldb", "pull"]).unwrap();
        if let Command::Pull(args) = cli.command {
            assert!(args.identifiers.is_empty());
        } else { panic!("wrong command"); }

        let cli = Cli::try_parse_from(["ldb", "pull", "0xabc", "--query", "class == \"i\""]).unwrap();
        if let Command::Pull(args) = cli.command {
            assert_eq!(args.identifiers, vec!["0xabc"]);
            assert_eq!(args.filters.query, vec!["class == \"i\""]);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_commit() {
        let cli = Cli::try_parse_from(["ldb", "commit", "-m", "first"]).unwrap();
        if let Command::Commit(args) = cli.command {
            assert_eq!(args.message, Some("first".into()));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["ldb", "status", "--ldb-dir", "/inst", "-w", "ws", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.ldb_dir, Some("/inst".into()));
        assert_eq!(cli.workspace, "ws");
    }

    #[test]
    fn parse_ds_log() {
        let cli = Cli::try_parse_from(["ldb", "ds", "log", "numerals"]).unwrap();
        if let Command::Ds(DsArgs { action: Some(DsAction::Log { name }) }) = cli.command {
            assert_eq!(name, "numerals");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn del_requires_identifier() {
        assert!(Cli::try_parse_from(["ldb", "del"]).is_err());
    }
}
