//! Joining FASTA sequences with their tab-separated metadata.

use crate::error::{Error, Result};
use bio::io::fasta;
use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

/// Join key shared by the sequence ids and the metadata table
pub const KEY_COLUMN: &str = "Phage_ID";

/// Metadata columns carried into the merged table, key first
pub const METADATA_COLUMNS: [&str; 9] = [
    KEY_COLUMN,
    "Length",
    "GC_content",
    "Taxonomy",
    "Completeness",
    "Host",
    "Lifestyle",
    "Cluster",
    "Subcluster",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceRecord {
    pub id: String,
    pub sequence: String,
}

/// A tab-separated table with a header row. Cells are kept as read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl MetadataTable {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        MetadataTable { headers, rows }
    }

    /// Parse a TSV table. Short rows are padded with empty cells.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines();
        let headers: Vec<String> = match lines.next() {
            Some(header) => header?.split('\t').map(|h| h.trim().to_string()).collect(),
            None => {
                return Err(Error::EmptyInput {
                    what: "metadata table".to_string(),
                })
            }
        };

        let mut rows = Vec::new();
        for (idx, line) in lines.enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let mut row: Vec<String> = line.split('\t').map(str::to_string).collect();
            if row.len() > headers.len() {
                return Err(Error::MalformedRow {
                    line: idx + 2,
                    expected: headers.len(),
                    found: row.len(),
                });
            }
            row.resize(headers.len(), String::new());
            rows.push(row);
        }

        Ok(MetadataTable { headers, rows })
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, column: &str) -> Result<usize> {
        self.headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| Error::MissingColumn {
                column: column.to_string(),
            })
    }

    pub fn has_duplicate_keys(&self) -> Result<bool> {
        let key = self.column_index(KEY_COLUMN)?;
        let mut seen = FxHashSet::default();
        Ok(!self.rows.iter().all(|row| seen.insert(row[key].as_str())))
    }

    /// Drop rows whose key was already seen, returning how many went.
    pub fn dedup_by_key(&mut self) -> Result<usize> {
        let key = self.column_index(KEY_COLUMN)?;
        let before = self.rows.len();
        let mut seen = FxHashSet::default();
        self.rows.retain(|row| seen.insert(row[key].clone()));
        Ok(before - self.rows.len())
    }
}

/// Whether loading had to clean up the metadata keys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicateStatus {
    None,
    Removed(usize),
}

/// Deduplicated inputs, ready for [`RecordMerger::merge`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Loaded {
    pub sequences: Vec<SequenceRecord>,
    pub metadata: MetadataTable,
    pub duplicates: DuplicateStatus,
}

/// One row of the final table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedRecord {
    #[serde(rename = "Phage_ID")]
    pub phage_id: String,
    #[serde(rename = "Sequence")]
    pub sequence: String,
    #[serde(rename = "Length")]
    pub length: String,
    #[serde(rename = "GC_content")]
    pub gc_content: String,
    #[serde(rename = "Taxonomy")]
    pub taxonomy: String,
    #[serde(rename = "Completeness")]
    pub completeness: String,
    #[serde(rename = "Host")]
    pub host: String,
    #[serde(rename = "Lifestyle")]
    pub lifestyle: String,
    #[serde(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "Subcluster")]
    pub subcluster: String,
}

impl MergedRecord {
    fn fields(&self) -> [&str; 10] {
        [
            &self.phage_id,
            &self.sequence,
            &self.length,
            &self.gc_content,
            &self.taxonomy,
            &self.completeness,
            &self.host,
            &self.lifestyle,
            &self.cluster,
            &self.subcluster,
        ]
    }
}

/// Merges a FASTA file with its metadata table
#[derive(Debug, Clone)]
pub struct RecordMerger {
    sequence_path: PathBuf,
    metadata_path: PathBuf,
}

impl RecordMerger {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(sequence_path: P, metadata_path: Q) -> Self {
        RecordMerger {
            sequence_path: sequence_path.into(),
            metadata_path: metadata_path.into(),
        }
    }

    /// Read both inputs and deduplicate them, keeping first occurrences.
    pub fn load(&self) -> Result<Loaded> {
        let sequences = read_sequences(File::open(&self.sequence_path)?)?;
        log::info!(
            "Loaded {} unique sequences from {}",
            sequences.len(),
            self.sequence_path.display()
        );

        let mut metadata = MetadataTable::from_path(&self.metadata_path)?;
        let duplicates = if metadata.has_duplicate_keys()? {
            log::warn!("There are duplicate {} entries in metadata", KEY_COLUMN);
            let removed = metadata.dedup_by_key()?;
            log::info!("Removed {} duplicate {} entries from metadata", removed, KEY_COLUMN);
            DuplicateStatus::Removed(removed)
        } else {
            log::info!("No duplicates in {} within metadata", KEY_COLUMN);
            DuplicateStatus::None
        };

        Ok(Loaded {
            sequences,
            metadata,
            duplicates,
        })
    }

    /// Inner join of sequences and metadata on `id == Phage_ID`, in sequence order.
    ///
    /// Sequences without a metadata row are dropped.
    pub fn merge(sequences: &[SequenceRecord], metadata: &MetadataTable) -> Result<Vec<MergedRecord>> {
        let mut columns = [0usize; 9];
        for (slot, name) in columns.iter_mut().zip(METADATA_COLUMNS) {
            *slot = metadata.column_index(name)?;
        }

        let mut by_key: FxHashMap<&str, Vec<&[String]>> = FxHashMap::default();
        for row in metadata.rows() {
            by_key.entry(row[columns[0]].as_str()).or_default().push(row);
        }

        let mut merged = Vec::new();
        let mut unmatched = 0;
        for record in sequences {
            let Some(rows) = by_key.get(record.id.as_str()) else {
                unmatched += 1;
                continue;
            };
            for row in rows {
                let cell = |i: usize| row[columns[i]].clone();
                merged.push(MergedRecord {
                    phage_id: record.id.clone(),
                    sequence: record.sequence.clone(),
                    length: cell(1),
                    gc_content: cell(2),
                    taxonomy: cell(3),
                    completeness: cell(4),
                    host: cell(5),
                    lifestyle: cell(6),
                    cluster: cell(7),
                    subcluster: cell(8),
                });
            }
        }

        if unmatched > 0 {
            log::debug!("{} sequences had no metadata and were excluded", unmatched);
        }

        Ok(merged)
    }

    /// [`RecordMerger::load`] followed by [`RecordMerger::merge`]
    pub fn run(&self) -> Result<(Vec<MergedRecord>, DuplicateStatus)> {
        let loaded = self.load()?;
        let merged = Self::merge(&loaded.sequences, &loaded.metadata)?;
        Ok((merged, loaded.duplicates))
    }
}

/// Parse FASTA records, keeping the first record of every id
pub fn read_sequences<R: Read>(reader: R) -> Result<Vec<SequenceRecord>> {
    let mut seen = FxHashSet::default();
    let mut sequences = Vec::new();

    for result in fasta::Reader::new(reader).records() {
        let record = result?;
        if !seen.insert(record.id().to_string()) {
            continue;
        }
        sequences.push(SequenceRecord {
            id: record.id().to_string(),
            sequence: String::from_utf8_lossy(record.seq()).into_owned(),
        });
    }

    Ok(sequences)
}

/// Write merged records as TSV with the canonical header
pub fn write_tsv<W: Write>(records: &[MergedRecord], mut writer: W) -> Result<()> {
    writeln!(writer, "{}\tSequence\t{}", KEY_COLUMN, METADATA_COLUMNS[1..].join("\t"))?;
    for record in records {
        writeln!(writer, "{}", record.fields().join("\t"))?;
    }
    writer.flush()?;
    Ok(())
}

/// Write merged records as a pretty-printed JSON array
pub fn write_json<W: Write>(records: &[MergedRecord], mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, records)?;
    writer.flush()?;
    Ok(())
}
