use clap::{Parser, Subcommand, ValueEnum};
use docset::config::Config;
use docset::filter::{compile_expr, compile_match, parse_filter_json};
use docset::set::{QueryContext, SortDirection, SortSpec};
use docset::{DbError, logger, pipeline};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "docset", version, about = "Compile JSON filter trees into match documents and pipelines")]
struct Cli {
    /// Config file; takes precedence over DOCSET_CONFIG and ./docset.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render the `$match` form
    Match { filter: String },
    /// Render the aggregation-expression form
    Expr { filter: String },
    /// Assemble the retrieval pipeline and the count filter
    Pipeline {
        filter: String,
        #[arg(long)]
        sort: Option<String>,
        #[arg(long, value_enum, default_value_t = Order::Asc)]
        order: Order,
        #[arg(long)]
        skip: Option<u64>,
        #[arg(long)]
        limit: Option<u64>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Asc,
    Desc,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref());
    if cfg.log_dir.is_some() {
        let _ = logger::configure_from_config(&cfg);
    }
    match run(cli.command) {
        Ok(out) => {
            println!("{out}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cmd: Commands) -> Result<String, DbError> {
    match cmd {
        Commands::Match { filter } => render(&compile_match(&parse_filter_json(&filter)?)?),
        Commands::Expr { filter } => render(&compile_expr(&parse_filter_json(&filter)?)?),
        Commands::Pipeline { filter, sort, order, skip, limit } => {
            let direction = match order {
                Order::Asc => SortDirection::Ascending,
                Order::Desc => SortDirection::Descending,
            };
            let ctx = QueryContext {
                filter: Some(parse_filter_json(&filter)?),
                sort: sort.map(|field| SortSpec { field, direction }),
                skip,
                limit,
                ..QueryContext::default()
            };
            let stages = pipeline::build_pipeline(&ctx)?;
            let plan = pipeline::count_plan(&ctx)?;
            let out = serde_json::json!({
                "pipeline": stages.into_iter().map(|s| bson::Bson::Document(s).into_relaxed_extjson()).collect::<Vec<_>>(),
                "count": bson::Bson::Document(plan.filter).into_relaxed_extjson(),
            });
            Ok(serde_json::to_string_pretty(&out)?)
        }
    }
}

fn render(doc: &bson::Document) -> Result<String, DbError> {
    let value = bson::Bson::Document(doc.clone()).into_relaxed_extjson();
    Ok(serde_json::to_string_pretty(&value)?)
}
