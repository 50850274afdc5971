use aplcheck::backend::axiom::AxiomBackend;
use aplcheck::backend::{Backend, QueryResult};
use aplcheck::cli::{self, Cli, Command};
use aplcheck::config::{self, AppConfig};
use aplcheck::error::AplcheckError;
use aplcheck::evaluate::{self, Evaluator};
use aplcheck::schema::SchemaCache;
use aplcheck::time_filter::{inject_time_range, strip_time_filter};
use aplcheck::{format, masking, normalize, output, verbose};
use clap::Parser;
use std::process;
use std::time::Duration;
use tracing::debug;

#[tokio::main]
async fn main() {
    // Load .env file (optional, ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Strip(ref args) => {
            verbose::init(cli.verbose);
            output::print_result(&strip_time_filter(&args.apl));
            Ok(())
        }
        Command::Inject(ref args) => inject(&cli, args),
        Command::Exec(ref args) => exec(&cli, args).await,
        Command::Schema(ref args) => schema(&cli, args).await,
        Command::Compare(ref args) => compare(&cli, args).await,
    };

    if let Err(err) = result {
        output::print_error(&err);
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig, AplcheckError> {
    let app_config = config::load(
        &cli.connection,
        cli.verbose,
        cli.show_secrets,
        cli.config.as_ref(),
    )?;
    verbose::init(app_config.verbose);
    debug!(
        connection = %masking::describe_connection(app_config.axiom.as_ref(), app_config.show_secrets),
        timeout_secs = app_config.timeout_secs,
        "configuration resolved"
    );
    Ok(app_config)
}

fn inject(cli: &Cli, args: &cli::InjectArgs) -> Result<(), AplcheckError> {
    let app_config = load_config(cli)?;
    let range = args.range.as_deref().unwrap_or(&app_config.time_range);
    output::print_result(&inject_time_range(&args.apl, range));
    Ok(())
}

async fn exec(cli: &Cli, args: &cli::ExecArgs) -> Result<(), AplcheckError> {
    let app_config = load_config(cli)?;
    let apl = resolve_apl(args)?;
    let window = args.window.time_window(&app_config.time_range)?;
    let opts = window.resolve(chrono::Utc::now());
    let deadline = Duration::from_secs(app_config.timeout_secs);

    let backend = AxiomBackend::new(app_config.axiom);
    let result = evaluate::with_deadline(backend.execute(&apl, &opts), deadline).await;
    print_query_result(&result)
}

async fn schema(cli: &Cli, args: &cli::SchemaArgs) -> Result<(), AplcheckError> {
    let app_config = load_config(cli)?;
    let deadline = Duration::from_secs(app_config.timeout_secs);
    let cache = SchemaCache::new(AxiomBackend::new(app_config.axiom));

    let schema = tokio::time::timeout(deadline, cache.get_schema(&args.dataset))
        .await
        .map_err(|_| AplcheckError::Timeout {
            millis: deadline.as_millis(),
        })?
        .ok_or_else(|| AplcheckError::Response {
            message: format!("no schema available for dataset '{}'", args.dataset),
        })?;

    output::print_result(&schema.describe());
    Ok(())
}

async fn compare(cli: &Cli, args: &cli::CompareArgs) -> Result<(), AplcheckError> {
    let app_config = load_config(cli)?;
    let raw_output = match (&args.actual, &args.actual_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| AplcheckError::Config {
            message: format!("cannot read candidate file {}: {}", path.display(), e),
        })?,
        (None, None) => {
            return Err(AplcheckError::Config {
                message: "no candidate provided; use --actual or --actual-file".to_string(),
            });
        }
    };

    let evaluator = Evaluator::new(AxiomBackend::new(app_config.axiom))
        .with_window(args.window.time_window(&app_config.time_range)?)
        .with_deadline(Duration::from_secs(app_config.timeout_secs));

    let evaluation = evaluator.evaluate(&args.expected, &raw_output).await;
    output::print_result(&format::evaluation_to_toon(&evaluation)?);
    Ok(())
}

// --- Helpers ---

fn resolve_apl(args: &cli::ExecArgs) -> Result<String, AplcheckError> {
    if let Some(ref apl) = args.apl {
        return Ok(normalize::extract_query(apl));
    }
    if let Some(ref path) = args.apl_file {
        let content = std::fs::read_to_string(path).map_err(|e| AplcheckError::Config {
            message: format!("cannot read query file {}: {}", path.display(), e),
        })?;
        return Ok(normalize::extract_query(&content));
    }
    Err(AplcheckError::Config {
        message: "no query provided; use positional argument or --file".to_string(),
    })
}

fn print_query_result(result: &QueryResult) -> Result<(), AplcheckError> {
    output::print_result(&format::to_toon(result)?);
    Ok(())
}
