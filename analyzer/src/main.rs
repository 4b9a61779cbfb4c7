//! Score Analysis CLI - knowledge-point breakdown of exam scores
//!
//! # Main Commands
//!
//! ```bash
//! score-analysis                          # analyze ./score.xls with ./point.xlsx
//! score-analysis analyze --json out.json  # also dump the analysis as JSON
//! score-analysis template                 # generate ./point.xlsx from ./score.xls
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! score-analysis parse score.xls          # dump the normalized score table
//! score-analysis parse point.xlsx --point # dump the normalized point map
//! ```

use clap::{Args, Parser, Subcommand};
use score_analysis::logs::{log_error, log_success, log_warning, LOG_BROADCASTER};
use score_analysis::{
    build_template, load_point_map, load_score_table, run_analysis, AnalysisConfig, AnalysisPaths,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "score-analysis")]
#[command(about = "Break exam scores down by knowledge point and class", long_about = None)]
struct Cli {
    /// Only print errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Full analysis: score table + point map → analysis workbook
    Analyze(AnalyzeArgs),

    /// Generate the initial point map from the score table
    Template {
        /// Score export (default: ./score.xls)
        #[arg(short, long)]
        score: Option<PathBuf>,

        /// Output workbook (default: ./point.xlsx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Rows above the sparse header row of the score export
        #[arg(long)]
        title_rows: Option<usize>,
    },

    /// Parse an input table and output JSON
    Parse {
        /// Input workbook or CSV file
        input: PathBuf,

        /// Read the input as a point map instead of a score table
        #[arg(long)]
        point: bool,

        /// Rows above the sparse header row of the score export
        #[arg(long)]
        title_rows: Option<usize>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Default)]
struct AnalyzeArgs {
    /// Score export (default: ./score.xls)
    #[arg(short, long)]
    score: Option<PathBuf>,

    /// Point map (default: ./point.xlsx)
    #[arg(short, long)]
    point: Option<PathBuf>,

    /// Analysis workbook (default: ./score_analysis.xlsx)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Also write the whole analysis as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Cells per report row, including the label column
    #[arg(long)]
    row_width: Option<usize>,

    /// Rows per student in the report
    #[arg(long)]
    group_size: Option<usize>,

    /// Rows above the sparse header row of the score export
    #[arg(long)]
    title_rows: Option<usize>,

    /// Class column order of the distribution sheet, comma separated
    #[arg(long, value_delimiter = ',')]
    class_order: Option<Vec<String>>,
}

fn main() {
    let cli = Cli::parse();
    LOG_BROADCASTER.set_quiet(cli.quiet);

    let result = match cli.command.unwrap_or(Commands::Analyze(AnalyzeArgs::default())) {
        Commands::Analyze(args) => cmd_analyze(args),

        Commands::Template {
            score,
            output,
            title_rows,
        } => cmd_template(score, output, title_rows),

        Commands::Parse {
            input,
            point,
            title_rows,
            output,
        } => cmd_parse(&input, point, title_rows, output.as_deref()),
    };

    if let Err(e) = result {
        log_error(format!("Error: {}", e));
        std::process::exit(1);
    }
}

/// Environment configuration with the sheet-layout flags applied on top.
fn load_config(title_rows: Option<usize>) -> Result<AnalysisConfig, Box<dyn std::error::Error>> {
    let mut config = AnalysisConfig::from_env()?;
    if let Some(rows) = title_rows {
        config.score_sheet.title_rows = rows;
    }
    Ok(config)
}

fn cmd_analyze(args: AnalyzeArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(args.title_rows)?;
    if let Some(width) = args.row_width {
        config.layout.row_width = width;
    }
    if let Some(size) = args.group_size {
        config.layout.group_size = size;
    }
    if let Some(order) = args.class_order {
        config.class_order = order
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }

    let defaults = AnalysisPaths::default();
    let paths = AnalysisPaths {
        score: args.score.unwrap_or(defaults.score),
        point: args.point.unwrap_or(defaults.point),
        output: args.output.unwrap_or(defaults.output),
        json: args.json,
    };

    let analysis = run_analysis(&paths, &config)?;

    if !analysis.warnings.is_empty() {
        log_warning(format!("{} data gaps, see the log above", analysis.warnings.len()));
    }
    log_success("✨ Done!");
    Ok(())
}

fn cmd_template(
    score: Option<PathBuf>,
    output: Option<PathBuf>,
    title_rows: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(title_rows)?;
    let defaults = AnalysisPaths::default();
    let score = score.unwrap_or(defaults.score);
    let output = output.unwrap_or(defaults.point);

    build_template(&score, &output, &config)?;
    log_success("✨ Done!");
    Ok(())
}

fn cmd_parse(
    input: &Path,
    point: bool,
    title_rows: Option<usize>,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(title_rows)?;

    let json = if point {
        let map = load_point_map(input, &config)?;
        serde_json::to_string_pretty(&map)?
    } else {
        let sheet = load_score_table(input, &config)?;
        for warning in &sheet.warnings {
            log_warning(warning.to_string());
        }
        serde_json::to_string_pretty(&sheet.table)?
    };

    write_output(&json, output)
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            log_success(format!("💾 Output written to: {}", p.display()));
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
