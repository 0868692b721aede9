extern crate tarifel;

use clap::Parser;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tarifel::output::write_ranking_csv;
use tarifel::run_comparison;

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct ComparisonArgs {
    /// JSON document holding readings, catalog, calendar and household
    input_file: String,
    /// Where to write the ranking CSV (defaults to <input>_ranking.csv)
    #[arg(long, short)]
    output_file: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = ComparisonArgs::parse();

    let input_file = args.input_file.as_str();
    let input_file_ext = Path::new(input_file).extension().and_then(OsStr::to_str);
    let input_file_stem = match input_file_ext {
        Some(ext) => &input_file[..(input_file.len() - ext.len() - 1)],
        None => input_file,
    };
    let output_file = args
        .output_file
        .unwrap_or_else(|| format!("{input_file_stem}_ranking.csv"));

    let ranking = run_comparison(BufReader::new(File::open(Path::new(input_file))?))?;

    for error in &ranking.skipped {
        eprintln!("skipped: {error}");
    }

    let writer = BufWriter::new(File::create(&output_file)?);
    write_ranking_csv(writer, &ranking)?;
    println!("wrote ranking for {} offers to {output_file}", ranking.entries.len());

    Ok(())
}
