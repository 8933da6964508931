//! crud-filter: compile query-string filters from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Compile a URL-encoded query string
//! crud-filter 'name[%]=jo%25&age[>-]=18::int'
//!
//! # Pairs one by one, MySQL flavour
//! crud-filter -p 'status=[open,closed]' -p '[|]owner=null' --dialect mysql
//!
//! # Wildcard over columns read from the database
//! crud-filter '*[~*]=^jo' --table users --database-url postgres://localhost/app
//!
//! # Per-term breakdown
//! crud-filter explain 'created_at[:]=[2024-08-01|2024-08-31]::date'
//! ```

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use crud_filter::dialect::Binds;
use crud_filter::prelude::*;
use crud_filter::schema;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "crud-filter")]
#[command(version)]
#[command(about = "Compile query-string filters into parameterized SQL predicates", long_about = None)]
#[command(after_help = "EXAMPLES:
    crud-filter 'id=5::int&name[array]=[success,warning]'
    crud-filter -p 'age[:]=[18|65]::int' --placeholder dollar
    crud-filter '*=%jo%' --columns id,name,email --filter '{\"limit\":10}'")]
struct Cli {
    /// URL-encoded query string (`a=1&b[>]=2`)
    query: Option<String>,

    /// A single `key=value` pair, not URL-decoded (repeatable)
    #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Request identifier, compared with the configured id field
    #[arg(long)]
    id: Option<String>,

    /// JSON filter document, used as the request body
    #[arg(long)]
    filter: Option<String>,

    /// Known columns for wildcard expansion
    #[arg(long, value_delimiter = ',')]
    columns: Vec<String>,

    /// Table for wildcard column lookup
    #[arg(long)]
    table: Option<String>,

    /// Database used for wildcard column lookup
    #[arg(long, env = "CRUD_FILTER_DATABASE_URL")]
    database_url: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Args)]
struct GlobalArgs {
    /// SQL dialect (postgres, mysql)
    #[arg(short, long, global = true)]
    dialect: Option<DialectKind>,

    /// Placeholder style
    #[arg(long, value_enum, global = true)]
    placeholder: Option<PlaceholderArg>,

    /// Config file (default: ./crud-filter.toml, then the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlaceholderArg {
    Question,
    Dollar,
}

impl From<PlaceholderArg> for Placeholder {
    fn from(arg: PlaceholderArg) -> Self {
        match arg {
            PlaceholderArg::Question => Placeholder::Question,
            PlaceholderArg::Dollar => Placeholder::Dollar,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Show how each term of a query is parsed and rendered
    Explain {
        /// URL-encoded query string
        query: Option<String>,

        /// A single `key=value` pair (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,
    },
    /// Show the operator reference
    Operators,
}

#[derive(Serialize)]
struct Report<'a> {
    #[serde(flatten)]
    predicate: &'a Predicate,
    order_by: Option<String>,
    pagination: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.global.verbose);

    let result = match &cli.command {
        Some(Commands::Explain { query, params }) => explain(&cli, query.as_deref(), params),
        Some(Commands::Operators) => {
            show_operators();
            Ok(())
        }
        None => compile(&cli).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let client = e
            .downcast_ref::<FilterError>()
            .is_some_and(FilterError::is_client_error);
        std::process::exit(if client { 2 } else { 1 });
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "crud_filter=debug" } else { "crud_filter=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<CompilerConfig> {
    let mut config = CompilerConfig::load(cli.global.config.as_deref())
        .context("Failed to load configuration")?;
    if let Some(dialect) = cli.global.dialect {
        config.dialect = dialect;
    }
    if let Some(placeholder) = cli.global.placeholder {
        config.placeholder = placeholder.into();
    }
    if let Some(url) = &cli.database_url {
        config.database.url = Some(url.clone());
    }
    if let Some(table) = &cli.table {
        config.table = Some(table.clone());
    }
    Ok(config)
}

/// Decoded query-string pairs followed by the explicit `--param` pairs.
fn collect_pairs(query: Option<&str>, params: &[String]) -> Result<Vec<(String, String)>> {
    let mut pairs: Vec<(String, String)> = query
        .map(|q| {
            url::form_urlencoded::parse(q.trim_start_matches('?').as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();
    for param in params {
        let Some((key, value)) = param.split_once('=') else {
            bail!("Invalid --param '{}': expected KEY=VALUE", param);
        };
        pairs.push((key.to_string(), value.to_string()));
    }
    Ok(pairs)
}

async fn compile(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let compiler = Compiler::from_config(&config)?;
    let pairs = collect_pairs(cli.query.as_deref(), &cli.params)?;

    if pairs.is_empty() && cli.id.is_none() {
        println!("{}", "crud-filter: query-string filter compiler".cyan().bold());
        println!();
        println!("Usage: crud-filter <QUERY> [OPTIONS]");
        println!();
        println!("Try: crud-filter --help");
        return Ok(());
    }

    if cli.global.verbose {
        println!("{} {}", "Dialect:".dimmed(), compiler.dialect().name().yellow());
        for (key, value) in &pairs {
            println!("{} {} = {}", "Input:".dimmed(), key.yellow(), value.yellow());
        }
    }

    let params = compiler.collect(
        pairs,
        cli.id.as_deref(),
        cli.filter.as_deref().map(str::as_bytes),
    )?;
    let table = config.table.clone().unwrap_or_default();

    let columns = if !cli.columns.is_empty() || !params.needs_columns(compiler.dialect().reserved()) {
        cli.columns.clone()
    } else {
        lookup_columns(&config, &table).await?
    };

    let predicate = compiler.assemble(&params, &columns, &table)?;
    let (order_by, pagination) = match &predicate.filter {
        Some(filter) => (
            filter.order_by(compiler.dialect())?,
            filter.limit_offset(compiler.dialect()),
        ),
        None => (None, String::new()),
    };

    match cli.format {
        OutputFormat::Json => {
            let report = Report {
                predicate: &predicate,
                order_by,
                pagination,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => print_predicate(&predicate, order_by.as_deref(), &pagination),
    }
    Ok(())
}

async fn lookup_columns(config: &CompilerConfig, table: &str) -> Result<Vec<String>> {
    match (&config.database.url, table) {
        (Some(url), table) if !table.is_empty() => {
            tracing::debug!(table, "fetching columns");
            let pool = schema::connect(url).await?;
            Ok(schema::fetch_columns(&pool, table).await?)
        }
        _ => {
            eprintln!(
                "{}",
                "⚠ Wildcard without columns. Use --columns, or --table with --database-url"
                    .yellow()
            );
            Ok(Vec::new())
        }
    }
}

fn print_predicate(predicate: &Predicate, order_by: Option<&str>, pagination: &str) {
    println!("{}", "Predicate:".green().bold());
    if predicate.is_empty() {
        println!("  {}", "(empty)".dimmed());
    } else {
        println!("  {}", predicate.text.white());
    }

    if !predicate.values.is_empty() {
        println!();
        println!("{}", "Bindings:".cyan());
        for (i, value) in predicate.values.iter().enumerate() {
            println!("  {:>3} = {}", (i + 1).to_string().dimmed(), value.to_string().yellow());
        }
    }

    if order_by.is_some() || !pagination.is_empty() {
        println!();
        println!("{}", "Suffix:".cyan());
        if let Some(order_by) = order_by {
            println!("  {}", order_by.white());
        }
        if !pagination.is_empty() {
            println!("  {}", pagination.trim().white());
        }
    }
}

fn explain(cli: &Cli, query: Option<&str>, params: &[String]) -> Result<()> {
    let config = load_config(cli)?;
    let compiler = Compiler::from_config(&config)?;
    let dialect = compiler.dialect();
    let pairs = collect_pairs(query, params)?;

    println!("{}", "Filter Explanation".cyan().bold());
    println!("{} {}", "Dialect:".dimmed(), dialect.name().yellow());
    println!();

    for (key, value) in &pairs {
        println!("{} {} = {}", "Pair:".dimmed(), key.white(), value.yellow());
        if key.trim() == dialect.reserved().filter {
            println!("  {}", "filter document".cyan());
            continue;
        }
        if key.trim() == dialect.reserved().extra {
            println!("  {}", "extra metadata, not part of the predicate".cyan());
            continue;
        }
        match compiler.parse(key, value) {
            Ok(term) => explain_term(dialect, &term),
            Err(e) => println!("  {} {}", "Error:".red().bold(), e),
        }
        println!();
    }
    Ok(())
}

fn explain_term(dialect: &dyn Dialect, term: &FilterTerm) {
    let joined = if term.is_or { "OR" } else { "AND" };
    let data_type = term.data_type.map_or("(inferred)".to_string(), |t| t.to_string());
    println!("  {} {}", "Column:".dimmed(), term.key.white());
    println!("  {} {}", "Operator:".dimmed(), term.operator.to_string().cyan());
    println!("  {} {}", "Shape:".dimmed(), term.shape().to_string().cyan());
    println!("  {} {}", "Type:".dimmed(), data_type.cyan());
    println!("  {} {}", "Value:".dimmed(), term.value.to_string().yellow());
    println!("  {} {}", "Joined:".dimmed(), joined.cyan());
    if let Some(path) = &term.path {
        println!(
            "  {} {} {} {}",
            "Path:".dimmed(),
            path.key.white(),
            path.operator.to_string().cyan(),
            path.value.to_string().yellow()
        );
    }

    let mut binds = Binds::new();
    let sql = dialect.render(term, &mut binds);
    println!("  {} {}", "SQL:".dimmed(), sql.green());
    for (i, value) in binds.into_values().iter().enumerate() {
        println!("    {} = {}", (i + 1).to_string().dimmed(), value.to_string().yellow());
    }
}

fn show_operators() {
    println!("{}", "Operator Reference".cyan().bold());
    println!();

    let operators = [
        ("(none)", "name=john", "\"name\" = ?"),
        ("!  <>", "name[!]=john", "\"name\" != ?"),
        (">  <", "age[>]=18::int", "\"age\" > ?"),
        (">-  <-", "age[>-]=18::int", "\"age\" >= ?"),
        (":", "age[:]=[18|65]::int", "\"age\" BETWEEN ? AND ?"),
        ("%  !%", "name[%]=jo%", "\"name\"::text LIKE ?"),
        ("+  !+", "code[+]=%(a|b)%", "\"code\"::text SIMILAR TO ?"),
        ("~  ~*  !~  !~*", "name[~*]=^jo", "\"name\"::text ~* ?"),
        ("array  &&", "tags[&&]=[a,b]", "\"tags\" && ARRAY[?]"),
        ("!array  !&&", "tags[!&&]=[a,b]", "NOT \"tags\" && ARRAY[?]"),
        ("any  some  all", "tags[any]=red", "? = ANY(\"tags\")"),
        ("!any  !some  !all", "tags[!all]=red", "? != ALL(\"tags\")"),
        ("->  ->>", "meta[->>]=kind=invoice", "\"meta\" ->> ? = ?"),
    ];

    println!(
        "{:20} {:28} {}",
        "Suffix".white().bold(),
        "Example".white().bold(),
        "SQL (postgres)".white().bold()
    );
    println!("{}", "─".repeat(80).dimmed());
    for (suffix, example, sql) in operators {
        println!("{:20} {:28} {}", suffix.cyan().bold(), example.yellow(), sql.dimmed());
    }

    println!();
    println!("{}", "Values".white().bold());
    println!("  {}   {}", "[a,b,c]".cyan(), "array, becomes IN / NOT IN".dimmed());
    println!("  {}   {}", "[a|b]".cyan(), "range for [:] (postgres also accepts [a:b])".dimmed());
    println!("  {}      {}", "null".cyan(), "IS NULL / IS NOT NULL".dimmed());
    println!("  {}   {}", "v::type".cyan(), "string int int64 float float64 uint uint64 date time datetime".dimmed());
    println!("  {}  {}", "[|]key".cyan(), "join with OR".dimmed());
    println!("  {}         {}", "*".cyan(), "every column without its own term".dimmed());
}
