use crate::error::{Error, Result};
use crate::merger::SequenceRecord;
use fxhash::FxHashMap;
use itertools::Itertools;
use ndarray::Array2;
use rayon::prelude::*;

/// 2-bit code of a nucleotide, `None` for anything that is not A, C, G or T
fn encode(base: u8) -> Option<u64> {
    match base {
        b'A' | b'a' => Some(0),
        b'C' | b'c' => Some(1),
        b'G' | b'g' => Some(2),
        b'T' | b't' => Some(3),
        _ => None,
    }
}

/// Pack a k-mer window into a canonical u64 (2 bits per base).
///
/// # Notes
/// Canonicalizes by the smaller of the k-mer and its reverse complement.
/// Returns `None` if the window holds an ambiguous base or is longer than 32.
fn canonical_kmer(window: &[u8]) -> Option<u64> {
    let k = window.len();
    if k == 0 || k > 32 {
        return None;
    }

    let mut forward: u64 = 0;
    let mut reverse: u64 = 0;
    for (i, &base) in window.iter().enumerate() {
        let code = encode(base)?;
        forward = (forward << 2) | code;
        reverse |= (3 - code) << (2 * i);
    }

    Some(forward.min(reverse))
}

/// Count canonical k-mers in one sequence, skipping windows with ambiguous bases
fn count_kmers(seq: &[u8], k: usize) -> FxHashMap<u64, usize> {
    let mut counts = FxHashMap::default();
    for window in seq.windows(k) {
        if let Some(kmer) = canonical_kmer(window) {
            *counts.entry(kmer).or_insert(0) += 1;
        }
    }
    counts
}

/// Build relative canonical k-mer frequency profiles, one row per record.
///
/// Columns are the canonical k-mers seen in any record, in ascending packed order.
/// Sequences are counted in parallel with [`rayon`](https://docs.rs/rayon).
pub fn kmer_profiles(records: &[SequenceRecord], k: usize) -> Result<Array2<f64>> {
    if k == 0 || k > 32 {
        return Err(Error::KmerSize { k });
    }
    if records.is_empty() {
        return Err(Error::EmptyInput {
            what: "sequence records".to_string(),
        });
    }

    let counts: Vec<FxHashMap<u64, usize>> = records
        .par_iter()
        .map(|record| count_kmers(record.sequence.as_bytes(), k))
        .collect();

    let columns: FxHashMap<u64, usize> = counts
        .iter()
        .flat_map(|c| c.keys().copied())
        .unique()
        .sorted_unstable()
        .enumerate()
        .map(|(column, kmer)| (kmer, column))
        .collect();
    log::debug!("Profiling {} records over {} canonical {}-mers", records.len(), columns.len(), k);

    let mut profiles = Array2::zeros((records.len(), columns.len()));
    for (row, sample) in counts.iter().enumerate() {
        let total: usize = sample.values().sum();
        if total == 0 {
            log::warn!("{} has no valid {}-mers", records[row].id, k);
            continue;
        }
        for (kmer, &count) in sample {
            profiles[[row, columns[kmer]]] = count as f64 / total as f64;
        }
    }

    Ok(profiles)
}
