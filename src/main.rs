use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use bwamem2_rs::config::AlignerConfig;
use bwamem2_rs::genomics::io::BamRecordSink;
use bwamem2_rs::genomics::{
    FastaIndexLoader, FastqReadSource, IndexLoader, ReadPair, ReadSequence, ReadSource, RecordSink,
};
use bwamem2_rs::pipeline::{Pipeline, ReadRecord};

#[derive(Parser, Debug)]
#[command(name = "bwamem2-rs", about = "BWA-MEM2-compatible short-read aligner")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align reads against a reference FASTA, writing a BAM file.
    Align {
        /// Reference FASTA.
        #[arg(long)]
        reference: PathBuf,
        /// First (or only) mate's reads, FASTQ.
        #[arg(long)]
        reads1: PathBuf,
        /// Second mate's reads, FASTQ; omit for single-end input.
        #[arg(long)]
        reads2: Option<PathBuf>,
        /// Output BAM path.
        #[arg(long)]
        output: PathBuf,
        /// Optional JSON file overriding scoring/stage parameters.
        #[arg(long)]
        config: Option<PathBuf>,
        /// Reads processed per worker-pool batch; overrides the config file.
        #[arg(long)]
        batch_size: Option<usize>,
        /// Read-group ID stamped into every record's `RG` tag; overrides the
        /// config file.
        #[arg(long)]
        read_group: Option<String>,
    },
    /// Build the FM-index for a reference FASTA and print summary statistics.
    IndexInfo {
        /// Reference FASTA.
        #[arg(long)]
        reference: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Align {
            reference,
            reads1,
            reads2,
            output,
            config,
            batch_size,
            read_group,
        } => run_align(reference, reads1, reads2, output, config, batch_size, read_group),
        Commands::IndexInfo { reference } => run_index_info(reference),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_align(
    reference_path: PathBuf,
    reads1_path: PathBuf,
    reads2_path: Option<PathBuf>,
    output_path: PathBuf,
    config_path: Option<PathBuf>,
    batch_size_override: Option<usize>,
    read_group_override: Option<String>,
) -> Result<()> {
    let mut config = match &config_path {
        Some(path) => AlignerConfig::load(path).context("failed to load aligner config")?,
        None => AlignerConfig::default(),
    };
    if let Some(batch_size) = batch_size_override {
        config.batch_size = batch_size;
    }
    if read_group_override.is_some() {
        config.read_group = read_group_override;
    }

    info!(reference = %reference_path.display(), "loading reference and building FM-index");
    let (index, reference) = FastaIndexLoader::new(&reference_path)
        .load()
        .with_context(|| format!("failed to load reference {}", reference_path.display()))?;
    info!(contigs = reference.contigs().len(), length = reference.forward_length(), "reference loaded");

    let mut sink = BamRecordSink::create(&output_path, &reference, "bwamem2-rs")
        .context("failed to create BAM output")?;
    let batch_size = config.batch_size;
    let pipeline = Pipeline::new(&reference, &index, config);

    let mut aligned = 0usize;
    if let Some(reads2_path) = reads2_path {
        let mates1 = read_fastq(&reads1_path)?;
        let mates2 = read_fastq(&reads2_path)?;
        if mates1.len() != mates2.len() {
            bail!(
                "mate files have different read counts: {} vs {}",
                mates1.len(),
                mates2.len()
            );
        }

        let pairs: Vec<ReadRecord> = mates1
            .into_iter()
            .zip(mates2)
            .map(|(mate1, mate2)| ReadRecord::Pair(ReadPair { mate1, mate2 }))
            .collect();

        for batch in pairs.chunks(batch_size) {
            let results = pipeline.align_batch(batch);
            for records in results {
                aligned += records.len();
                for record in &records {
                    sink.write_record(record).context("failed to write record")?;
                }
            }
        }
    } else {
        let reads: Vec<ReadRecord> = read_fastq(&reads1_path)?.into_iter().map(ReadRecord::Single).collect();
        for batch in reads.chunks(batch_size) {
            let results = pipeline.align_batch(batch);
            for records in results {
                aligned += records.len();
                for record in &records {
                    sink.write_record(record).context("failed to write record")?;
                }
            }
        }
    }

    sink.finish().context("failed to finalize BAM output")?;
    info!(records = aligned, output = %output_path.display(), "alignment complete");
    Ok(())
}

fn run_index_info(reference_path: PathBuf) -> Result<()> {
    let (index, reference) = FastaIndexLoader::new(&reference_path)
        .load()
        .with_context(|| format!("failed to load reference {}", reference_path.display()))?;

    println!("contigs: {}", reference.contigs().len());
    for contig in reference.contigs() {
        println!(
            "  {}\tlength={}\toffset={}\talt={}",
            contig.name, contig.length, contig.offset, contig.is_alt
        );
    }
    println!("forward length: {}", reference.forward_length());
    println!("indexed text length: {}", reference.text_length());
    println!("suffix-array sample stride: {}", index.sample_stride());
    Ok(())
}

/// Drain a FASTQ file into an in-memory [`ReadSequence`] vector via
/// [`FastqReadSource`], the streaming collaborator the pipeline itself can
/// be driven from directly.
fn read_fastq(path: &PathBuf) -> Result<Vec<ReadSequence>> {
    let mut source =
        FastqReadSource::open(path).with_context(|| format!("failed to open reads file {}", path.display()))?;
    let mut reads = Vec::new();
    while let Some(read) = source
        .next_read()
        .with_context(|| format!("failed to read record from {}", path.display()))?
    {
        reads.push(read);
    }
    Ok(reads)
}
