use anyhow::{bail, Result};
use clap::{Args, Parser, Subcommand};
use combo_etl::{
    init_tracing_with, ComboETL, PseudoComboOptions, DEFAULT_DELIMITER_CANDIDATES, DEFAULT_MAX_LINE_LENGTH,
    DEFAULT_MAX_NUM_LINES,
};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "combo-etl")]
#[command(about = "Detect the line layout of combo-list chunks and parse them into email/poh tables")]
struct Cli {
    #[arg(short, long, global = true, help = "Verbose output")]
    verbose: bool,

    #[arg(long, global = true, help = "Disable progress bars")]
    no_progress: bool,

    #[arg(long, global = true, default_value_t = 256, help = "Read/write buffer size per file, in KiB")]
    io_buffer_kib: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Copy)]
struct RangeArgs {
    #[arg(long, help = "First chunk index to process (inclusive)")]
    start_index: Option<usize>,
    #[arg(long, help = "Chunk index to stop at (exclusive)")]
    end_index: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// gzip `*.txt` chunks into `*.txt.gz`
    Rearchive {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[arg(short, long)]
        output_dirname: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Infer placement and delimiter per chunk
    DetectSchema {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[arg(short, long)]
        log_dirname: PathBuf,
        #[arg(short, long, default_value = DEFAULT_DELIMITER_CANDIDATES)]
        delimiter_candidates: String,
        #[arg(long, default_value_t = DEFAULT_MAX_NUM_LINES)]
        max_num_lines: usize,
        #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
        max_line_length: usize,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Parse chunks with their detected schema
    Parse {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[arg(short, long)]
        output_root_dirname: PathBuf,
        #[arg(short = 'l', long)]
        schema_detection_log_dirname: PathBuf,
        #[arg(long, default_value_t = DEFAULT_MAX_LINE_LENGTH)]
        max_line_length: usize,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Keep only two-column rows of parsed records
    Cleanup {
        #[arg(short, long)]
        input_root_dirname: PathBuf,
        #[arg(short, long)]
        output_root_dirname: PathBuf,
        #[arg(long, default_value_t = 1)]
        file_concurrency: usize,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Recover the raw lines the parser rejected
    CollectParsingErrors {
        #[arg(short = 'a', long)]
        rearchive_dirname: PathBuf,
        #[arg(short = 'p', long)]
        parsing_root_dirname: PathBuf,
        #[arg(short, long)]
        output_dirname: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Recover the rows cleanup rejected
    CollectCleanupErrors {
        #[arg(short = 'p', long)]
        parsing_root_dirname: PathBuf,
        #[arg(short = 'c', long)]
        cleanup_root_dirname: PathBuf,
        #[arg(short, long)]
        output_dirname: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Count email and poh frequencies per chunk
    CountFreqs {
        #[arg(short, long)]
        input_root_dirname: PathBuf,
        #[arg(short, long)]
        output_root_dirname: PathBuf,
        #[arg(long, default_value_t = 1)]
        file_concurrency: usize,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Sum per-chunk frequency tables into one
    MergeFreqs {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[arg(short, long)]
        output_filepath: PathBuf,
    },
    /// Sort and deduplicate the trimmed lines of each `*.txt.gz` chunk
    MakeUnique {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[arg(short, long)]
        output_dirname: PathBuf,
        #[arg(long, default_value_t = 1)]
        file_concurrency: usize,
        #[command(flatten)]
        range: RangeArgs,
    },
    /// Write a synthetic combo list from a word list
    GeneratePseudoCombos {
        #[arg(short, long)]
        word_list_filepath: PathBuf,
        #[arg(long, default_value_t = 0, help = "Load at most this many words (0 = all)")]
        limit_num_words: usize,
        #[arg(long, value_delimiter = ',', default_value = "example.com")]
        email_domains: Vec<String>,
        #[arg(long, default_value_t = 8)]
        email_local_part_length: usize,
        #[arg(short, long, default_value = ":")]
        delimiter: String,
        #[arg(short, long)]
        num_combos: usize,
        #[arg(short, long)]
        output_filepath: PathBuf,
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Decode every chunk to EOF and list the corrupt ones
    CheckIntegrity {
        #[arg(short, long)]
        input_dirname: PathBuf,
        #[command(flatten)]
        range: RangeArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing_with(if cli.verbose { "debug" } else { "info" });

    let buf_bytes = cli.io_buffer_kib.saturating_mul(1024);
    let base = ComboETL::new().progress(!cli.no_progress).io_buffers(buf_bytes, buf_bytes);
    let ranged = |r: RangeArgs| base.clone().index_range(r.start_index, r.end_index);

    match cli.command {
        Command::Rearchive { input_dirname, output_dirname, range } => {
            let written = ranged(range).rearchive(&input_dirname, &output_dirname)?;
            info!("Wrote {} archives", written.len());
        }
        Command::DetectSchema { input_dirname, log_dirname, delimiter_candidates, max_num_lines, max_line_length, range } => {
            let artifacts = ranged(range)
                .delimiter_candidates(delimiter_candidates)
                .max_num_lines(max_num_lines)
                .max_line_length(max_line_length)
                .detect_schema(&input_dirname, &log_dirname)?;
            info!("Detected {} schemas", artifacts.len());
        }
        Command::Parse { input_dirname, output_root_dirname, schema_detection_log_dirname, max_line_length, range } => {
            let stats = ranged(range)
                .max_line_length(max_line_length)
                .parse(&input_dirname, &schema_detection_log_dirname, &output_root_dirname)?;
            info!("Parsed {} chunks", stats.len());
        }
        Command::Cleanup { input_root_dirname, output_root_dirname, file_concurrency, range } => {
            let stats = ranged(range)
                .file_concurrency(file_concurrency)
                .cleanup(&input_root_dirname, &output_root_dirname)?;
            let rejected: usize = stats.iter().map(|s| s.rejected).sum();
            info!("Cleaned {} chunks, {} rows rejected", stats.len(), rejected);
        }
        Command::CollectParsingErrors { rearchive_dirname, parsing_root_dirname, output_dirname, range } => {
            ranged(range).collect_parsing_errors(&rearchive_dirname, &parsing_root_dirname, &output_dirname)?;
        }
        Command::CollectCleanupErrors { parsing_root_dirname, cleanup_root_dirname, output_dirname, range } => {
            ranged(range).collect_cleanup_errors(&parsing_root_dirname, &cleanup_root_dirname, &output_dirname)?;
        }
        Command::CountFreqs { input_root_dirname, output_root_dirname, file_concurrency, range } => {
            ranged(range)
                .file_concurrency(file_concurrency)
                .count_freqs(&input_root_dirname, &output_root_dirname)?;
        }
        Command::MergeFreqs { input_dirname, output_filepath } => {
            let stats = base.merge_freqs(&input_dirname, &output_filepath)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::MakeUnique { input_dirname, output_dirname, file_concurrency, range } => {
            let stats = ranged(range)
                .file_concurrency(file_concurrency)
                .make_unique(&input_dirname, &output_dirname)?;
            info!("Deduplicated {} chunks", stats.len());
        }
        Command::GeneratePseudoCombos {
            word_list_filepath,
            limit_num_words,
            email_domains,
            email_local_part_length,
            delimiter,
            num_combos,
            output_filepath,
            seed,
        } => {
            let opts = PseudoComboOptions {
                word_list: word_list_filepath,
                limit_num_words,
                email_domains,
                email_local_part_length,
                delimiter,
                num_combos,
                seed,
            };
            base.generate_pseudo_combos(&opts, &output_filepath)?;
        }
        Command::CheckIntegrity { input_dirname, range } => {
            let bad = ranged(range).check_chunk_integrity(&input_dirname)?;
            for (path, err) in &bad {
                eprintln!("{}: {}", path.display(), err);
            }
            if !bad.is_empty() {
                bail!("{} chunks failed the integrity check", bad.len());
            }
        }
    }

    Ok(())
}
