use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "dbhub", version, about = "Browse and share SQLite databases", disable_help_subcommand = true)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, value_name = "PATH", env = "DBHUB_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show the rows of a table as JSON.
    Table(TableArgs),
    /// Fetch two columns of a table, optionally filtered, as compact JSON.
    Vis(VisArgs),
    /// Export every row of a table as CSV.
    Csv(CsvArgs),
    /// Download the stored database file.
    Download(DownloadArgs),
    /// Store a database file as the next version of a database.
    Publish(PublishArgs),
}

#[derive(Args, Debug)]
pub struct Actor {
    /// Act as this user instead of anonymously.
    #[arg(long = "as", value_name = "USER")]
    pub user: Option<String>,
}

#[derive(Args, Debug)]
pub struct TableArgs {
    /// `<owner>/<database>`
    pub database: String,
    /// Table to show; the first table if omitted.
    #[arg(long, default_value = "")]
    pub table: String,
    #[command(flatten)]
    pub actor: Actor,
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VisArgs {
    /// `<owner>/<database>`
    pub database: String,
    #[arg(long, default_value = "")]
    pub table: String,
    #[arg(long, value_name = "COL")]
    pub x: Option<String>,
    #[arg(long, value_name = "COL")]
    pub y: Option<String>,
    #[arg(long, value_name = "COL")]
    pub where_col: Option<String>,
    /// One of `=`, `!=`, `<`, `<=`, `>`, `>=` or `LIKE`.
    #[arg(long, value_name = "OP")]
    pub where_op: Option<String>,
    #[arg(long, value_name = "VALUE")]
    pub where_val: Option<String>,
    #[command(flatten)]
    pub actor: Actor,
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct CsvArgs {
    /// `<owner>/<database>`
    pub database: String,
    #[arg(long)]
    pub table: String,
    /// Export this version instead of the latest visible one.
    #[arg(long)]
    pub version: Option<u32>,
    #[command(flatten)]
    pub actor: Actor,
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// `<owner>/<database>`
    pub database: String,
    #[arg(long)]
    pub version: Option<u32>,
    #[command(flatten)]
    pub actor: Actor,
    #[arg(short, long, value_name = "FILE")]
    pub output: PathBuf,
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// `<owner>/<database>`
    pub database: String,
    /// SQLite file to upload.
    pub file: PathBuf,
    /// Make this version visible to everyone.
    #[arg(long)]
    pub public: bool,
    /// Store the file in this bucket instead of the owner's default.
    #[arg(long)]
    pub bucket: Option<String>,
}
