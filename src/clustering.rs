use crate::error::{Error, Result};
use clap::ValueEnum;
use kodama::{linkage, Method};
use ndarray::{Array1, Array2};

/// The arrays a fitted agglomerative model exposes.
///
/// Child ids below `labels().len()` are original samples, larger ids refer to
/// merge row `id - labels().len()`.
pub trait FittedClustering {
    fn children(&self) -> &[[usize; 2]];
    fn labels(&self) -> &[usize];
    fn distances(&self) -> &[f64];
}

/// A fitted hierarchical clustering: merges in construction order, their
/// distances, and flat labels per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedModel {
    children: Vec<[usize; 2]>,
    labels: Vec<usize>,
    distances: Vec<f64>,
}

impl FittedModel {
    pub fn new(children: Vec<[usize; 2]>, labels: Vec<usize>, distances: Vec<f64>) -> Self {
        FittedModel {
            children,
            labels,
            distances,
        }
    }
}

impl FittedClustering for FittedModel {
    fn children(&self) -> &[[usize; 2]] {
        &self.children
    }

    fn labels(&self) -> &[usize] {
        &self.labels
    }

    fn distances(&self) -> &[f64] {
        &self.distances
    }
}

/// Linkage criterion handed to kodama
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LinkageMethod {
    Single,
    Complete,
    Average,
    Weighted,
    Ward,
    Centroid,
    Median,
}

impl From<LinkageMethod> for Method {
    fn from(method: LinkageMethod) -> Self {
        match method {
            LinkageMethod::Single => Method::Single,
            LinkageMethod::Complete => Method::Complete,
            LinkageMethod::Average => Method::Average,
            LinkageMethod::Weighted => Method::Weighted,
            LinkageMethod::Ward => Method::Ward,
            LinkageMethod::Centroid => Method::Centroid,
            LinkageMethod::Median => Method::Median,
        }
    }
}

/// Performs agglomerative clustering of the rows of `data`
///
/// # Arguments
/// * `data` - 2D array where each row is a sample and columns are features
/// * `method` - linkage criterion
/// * `n_clusters` - number of flat clusters used to derive the sample labels
///
/// # Returns
/// * A [`FittedModel`] with merges sorted by increasing distance
pub fn fit(data: &Array2<f64>, method: LinkageMethod, n_clusters: usize) -> Result<FittedModel> {
    let n_samples = data.nrows();
    if n_samples < 2 {
        return Err(Error::TooFewSamples { samples: n_samples });
    }
    if n_clusters == 0 || n_clusters > n_samples {
        return Err(Error::ClusterCount {
            requested: n_clusters,
            max: n_samples,
        });
    }

    let condensed = compute_distance_matrix(data);
    let dendrogram = linkage(&mut condensed.to_vec(), n_samples, method.into());

    let (children, distances): (Vec<[usize; 2]>, Vec<f64>) = dendrogram
        .steps()
        .iter()
        .map(|step| ([step.cluster1, step.cluster2], step.dissimilarity))
        .unzip();

    let labels = cut_labels(&children, n_samples, n_clusters);
    log::debug!(
        "Fitted {} merges over {} samples into {} flat clusters",
        children.len(),
        n_samples,
        n_clusters
    );

    Ok(FittedModel::new(children, labels, distances))
}

/// Compute pairwise Euclidean distances between samples
fn compute_distance_matrix(data: &Array2<f64>) -> Array1<f64> {
    let n = data.nrows();
    let n_distances = (n * (n - 1)) / 2;
    let mut distances = Array1::zeros(n_distances);

    let mut idx = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let row_i = data.row(i);
            let row_j = data.row(j);

            distances[idx] = row_i
                .iter()
                .zip(row_j.iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            idx += 1;
        }
    }

    distances
}

/// Label samples by applying the first `n_samples - n_clusters` merges.
///
/// Labels are numbered in order of first appearance among the samples.
fn cut_labels(children: &[[usize; 2]], n_samples: usize, n_clusters: usize) -> Vec<usize> {
    let mut parent: Vec<usize> = (0..n_samples + children.len()).collect();

    fn find(parent: &mut [usize], mut node: usize) -> usize {
        while parent[node] != node {
            parent[node] = parent[parent[node]];
            node = parent[node];
        }
        node
    }

    for (step, &[left, right]) in children.iter().take(n_samples - n_clusters).enumerate() {
        let merged = n_samples + step;
        let left_root = find(&mut parent, left);
        let right_root = find(&mut parent, right);
        parent[left_root] = merged;
        parent[right_root] = merged;
    }

    let mut roots: Vec<usize> = Vec::new();
    (0..n_samples)
        .map(|sample| {
            let root = find(&mut parent, sample);
            match roots.iter().position(|&r| r == root) {
                Some(label) => label,
                None => {
                    roots.push(root);
                    roots.len() - 1
                }
            }
        })
        .collect()
}
