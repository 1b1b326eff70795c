use crate::clustering::LinkageMethod;
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Merge phage sequences with their metadata and cluster them
#[derive(Parser, Debug)]
#[command(name = "phagelink")]
#[command(about = "Merge phage FASTA files with metadata and build clustering dendrograms", long_about = None)]
pub struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Join a FASTA file with a tab-separated metadata table on Phage_ID
    Merge {
        /// Input FASTA file path
        fasta_file: PathBuf,

        /// Metadata TSV path (needs a Phage_ID column)
        metadata_file: PathBuf,

        /// Output file path
        #[arg(short = 'o', long = "output")]
        output_file: PathBuf,

        /// Write JSON records instead of TSV
        #[arg(long)]
        json: bool,
    },

    /// Cluster sequences by canonical k-mer profiles
    Cluster {
        /// Input FASTA file path
        fasta_file: PathBuf,

        /// Output TSV of cluster memberships
        #[arg(short = 'o', long = "output")]
        output_file: PathBuf,

        /// K-mer length
        #[arg(short = 'k', long = "kmer", default_value_t = 4)]
        k: usize,

        /// Number of clusters to extract from the last merges
        #[arg(short = 'n', long = "n-clusters", default_value_t = 2)]
        n_clusters: usize,

        /// Linkage criterion
        #[arg(short = 'm', long = "method", value_enum, default_value_t = LinkageMethod::Ward)]
        method: LinkageMethod,

        /// Also write the linkage table (JSON for .json paths, otherwise TSV)
        #[arg(long)]
        linkage: Option<PathBuf>,

        /// Render the dendrogram (.svg for SVG, otherwise PNG)
        #[arg(long)]
        plot: Option<PathBuf>,

        /// Height above which dendrogram links are drawn in the secondary color
        #[arg(long = "color-threshold")]
        color_threshold: Option<f64>,
    },
}

impl Cli {
    /// Log level used when RUST_LOG is not set
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_cluster_defaults() {
        let cli = Cli::try_parse_from(["phagelink", "cluster", "in.fa", "-o", "out.tsv"]).unwrap();
        assert_eq!(cli.log_level(), "info");
        match cli.command {
            Command::Cluster {
                k,
                n_clusters,
                method,
                plot,
                ..
            } => {
                assert_eq!(k, 4);
                assert_eq!(n_clusters, 2);
                assert_eq!(method, LinkageMethod::Ward);
                assert!(plot.is_none());
            }
            _ => panic!("expected cluster subcommand"),
        }
    }

    #[test]
    fn parse_merge_with_verbosity() {
        let cli = Cli::try_parse_from([
            "phagelink", "-vv", "merge", "seqs.fa", "meta.tsv", "-o", "merged.json", "--json",
        ])
        .unwrap();
        assert_eq!(cli.log_level(), "trace");
        assert!(matches!(cli.command, Command::Merge { json: true, .. }));
    }
}
