use clap::Parser;
use phagelink::config::{Cli, Command};
use phagelink::merger::{read_sequences, write_json, write_tsv};
use phagelink::{fit, kmer_profiles, plot, Linkage, PlotOptions, RecordMerger};
use std::error::Error;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::process;

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .format_timestamp(None)
        .init();

    if let Err(e) = run(cli.command) {
        log::error!("{}", e);
        process::exit(1);
    }
}

fn run(command: Command) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Merge {
            fasta_file,
            metadata_file,
            output_file,
            json,
        } => {
            log::info!("Merging {} with {}", fasta_file.display(), metadata_file.display());

            let (merged, _) = RecordMerger::new(fasta_file, metadata_file).run()?;

            let writer = BufWriter::new(File::create(&output_file)?);
            if json {
                write_json(&merged, writer)?;
            } else {
                write_tsv(&merged, writer)?;
            }
            log::info!("Wrote {} merged records to {}", merged.len(), output_file.display());
        }

        Command::Cluster {
            fasta_file,
            output_file,
            k,
            n_clusters,
            method,
            linkage,
            plot: plot_file,
            color_threshold,
        } => {
            log::info!("Loading sequences from {}...", fasta_file.display());
            let records = read_sequences(File::open(&fasta_file)?)?;
            log::info!("Loaded {} sequences", records.len());

            let profiles = kmer_profiles(&records, k)?;
            log::info!(
                "Profile matrix shape: {} samples x {} features",
                profiles.nrows(),
                profiles.ncols()
            );

            let model = fit(&profiles, method, n_clusters.min(records.len()))?;
            let table = Linkage::build(&model)?;
            let clusters = table.clusters(n_clusters)?;

            let mut output = BufWriter::new(File::create(&output_file)?);
            writeln!(output, "cluster\tPhage_ID")?;
            for (cluster, members) in clusters.iter().enumerate() {
                for &member in members {
                    writeln!(output, "{}\t{}", cluster, records[member].id)?;
                }
            }
            output.flush()?;
            log::info!("Cluster memberships written to {}", output_file.display());

            if let Some(path) = linkage {
                let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
                if is_json {
                    table.write_json(BufWriter::new(File::create(&path)?))?;
                } else {
                    fs::write(&path, table.to_string())?;
                }
                log::info!("Linkage table saved to {}", path.display());
            }

            if let Some(path) = plot_file {
                let options = PlotOptions {
                    title: format!("Hierarchical Clustering Dendrogram (k={})", k),
                    labels: Some(records.iter().map(|r| r.id.clone()).collect()),
                    color_threshold,
                    ..PlotOptions::default()
                };
                plot(&table, &path, &options)?;
                log::info!("Dendrogram saved to {}", path.display());
            }
        }
    }

    Ok(())
}
