//! # phagelink
//!
//! `phagelink` merges phage FASTA files with their tab-separated metadata and turns
//! agglomerative clustering results into SciPy-style linkage tables, from which flat
//! clusters are extracted and dendrograms rendered.
//!
//! Clustering itself is done by `kodama`, FASTA parsing by `bio` and rendering by
//! `plotters`.
pub mod clustering;
pub mod config;
pub mod error;
pub mod linkage;
pub mod merger;
pub mod plotting;
pub mod profile;

pub use clustering::{fit, FittedClustering, FittedModel, LinkageMethod};
pub use error::{Error, Result};
pub use linkage::{Linkage, Merge};
pub use merger::{DuplicateStatus, Loaded, MergedRecord, MetadataTable, RecordMerger, SequenceRecord};
pub use plotting::{plot, DendrogramLayout, PlotOptions};
pub use profile::kmer_profiles;
