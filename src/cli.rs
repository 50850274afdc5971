use crate::error::AplcheckError;
use crate::evaluate::{self, TimeWindow};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "aplcheck", about = "Execute and grade model-translated APL queries")]
pub struct Cli {
    /// Path to config file
    #[arg(short = 'c', long, global = true, env = "APLCHECK_CONFIG")]
    pub config: Option<PathBuf>,

    /// Emit diagnostics to stderr
    #[arg(short = 'v', long, global = true, env = "APLCHECK_VERBOSE")]
    pub verbose: bool,

    /// Disable credential masking in diagnostics
    #[arg(long, global = true, env = "APLCHECK_SHOW_SECRETS")]
    pub show_secrets: bool,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ConnectionArgs {
    /// Axiom API base URL
    #[arg(long, global = true, env = "AXIOM_PLAY_URL")]
    pub url: Option<String>,

    /// Axiom API token
    #[arg(long, global = true, env = "AXIOM_PLAY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Axiom organization ID
    #[arg(long, global = true, env = "AXIOM_PLAY_ORG_ID")]
    pub org_id: Option<String>,

    /// Config file profile name
    #[arg(short = 'P', long, global = true, env = "APLCHECK_PROFILE")]
    pub profile: Option<String>,

    /// Overall deadline per command in seconds (default: 60)
    #[arg(short = 't', long, global = true, env = "APLCHECK_TIMEOUT")]
    pub timeout: Option<u64>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute a single APL query and print its result table
    Exec(ExecArgs),

    /// Print the field names and types of a dataset
    Schema(SchemaArgs),

    /// Grade a candidate query against a reference query
    Compare(CompareArgs),

    /// Print a query with its time filters removed
    Strip(RewriteArgs),

    /// Print a query with a canonical time filter injected
    Inject(InjectArgs),
}

/// How both queries of a run are scoped in time.
#[derive(Args, Debug, Default, Clone)]
pub struct WindowArgs {
    /// Window start (RFC 3339)
    #[arg(long, conflicts_with_all = ["last", "inline_range"])]
    pub start: Option<String>,

    /// Window end (RFC 3339)
    #[arg(long, conflicts_with_all = ["last", "inline_range"])]
    pub end: Option<String>,

    /// Relative window ending now, e.g. 30m, 1h, 7d
    #[arg(long, conflicts_with = "inline_range")]
    pub last: Option<String>,

    /// Rewrite the query text with this APL range instead of sending bounds
    #[arg(long)]
    pub inline_range: Option<String>,

    /// Send queries without any time bound
    #[arg(long, conflicts_with_all = ["start", "end", "last", "inline_range"])]
    pub no_time_range: bool,
}

impl WindowArgs {
    /// The window selected by these flags. Without any flag, `default_range`
    /// is injected inline.
    pub fn time_window(&self, default_range: &str) -> Result<TimeWindow, AplcheckError> {
        if self.no_time_range {
            return Ok(TimeWindow::Unbounded);
        }
        if let Some(ref range) = self.inline_range {
            return Ok(TimeWindow::Inline(range.clone()));
        }
        if let Some(ref last) = self.last {
            return Ok(TimeWindow::Last(evaluate::parse_span(last)?));
        }
        if self.start.is_some() || self.end.is_some() {
            return Ok(TimeWindow::Explicit {
                start: self.start.as_deref().map(evaluate::parse_timestamp).transpose()?,
                end: self.end.as_deref().map(evaluate::parse_timestamp).transpose()?,
            });
        }
        Ok(TimeWindow::Inline(default_range.to_string()))
    }
}

#[derive(Args, Debug)]
pub struct ExecArgs {
    /// APL query text
    pub apl: Option<String>,

    /// Read the query from file
    #[arg(short = 'f', long = "file", conflicts_with = "apl")]
    pub apl_file: Option<PathBuf>,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args, Debug)]
pub struct SchemaArgs {
    /// Dataset name
    pub dataset: String,
}

#[derive(Args, Debug)]
pub struct CompareArgs {
    /// Reference APL query
    #[arg(short = 'e', long)]
    pub expected: String,

    /// Raw candidate output (fenced or bare)
    #[arg(short = 'a', long, conflicts_with = "actual_file", required_unless_present = "actual_file")]
    pub actual: Option<String>,

    /// Read the raw candidate output from file
    #[arg(long)]
    pub actual_file: Option<PathBuf>,

    #[command(flatten)]
    pub window: WindowArgs,
}

#[derive(Args, Debug)]
pub struct RewriteArgs {
    /// APL query text
    pub apl: String,
}

#[derive(Args, Debug)]
pub struct InjectArgs {
    /// APL query text
    pub apl: String,

    /// APL range expression to inject
    #[arg(short = 'r', long)]
    pub range: Option<String>,
}
