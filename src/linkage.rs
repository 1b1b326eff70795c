use crate::clustering::FittedClustering;
use crate::error::{Error, Result};
use ndarray::Array2;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// One internal node of the merge tree
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub count: usize,
}

/// Linkage table in SciPy layout: one row per merge, in construction order.
///
/// Node ids below `n_samples` are original samples; id `n_samples + i` is row `i`.
/// Every row only references samples or earlier rows, which [`Linkage::build`]
/// checks, so lookups through the table never dangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Linkage {
    n_samples: usize,
    rows: Vec<Merge>,
}

impl Linkage {
    /// Build the linkage table from a fitted model
    ///
    /// # Arguments
    /// * `model` - children, labels and distances of a fitted clustering
    ///
    /// # Errors
    /// * [`Error::Shape`] if the model does not hold `N - 1` merges with one distance each
    /// * [`Error::DanglingChild`] if a merge references a row that comes after it
    pub fn build<M: FittedClustering + ?Sized>(model: &M) -> Result<Linkage> {
        let children = model.children();
        let distances = model.distances();
        let n_samples = model.labels().len();

        if distances.len() != children.len() || children.len() + 1 != n_samples {
            return Err(Error::Shape {
                children: children.len(),
                distances: distances.len(),
                samples: n_samples,
            });
        }

        let mut rows: Vec<Merge> = Vec::with_capacity(children.len());
        for (row, (&[left, right], &distance)) in children.iter().zip(distances).enumerate() {
            let mut count = 0;
            for child in [left, right] {
                count += if child < n_samples {
                    1
                } else {
                    rows.get(child - n_samples)
                        .map(|merge| merge.count)
                        .ok_or(Error::DanglingChild { row, child })?
                };
            }

            rows.push(Merge {
                left,
                right,
                distance,
                count,
            });
        }

        Ok(Linkage { n_samples, rows })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn rows(&self) -> &[Merge] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Id of the last merge, which spans every sample
    pub fn root(&self) -> usize {
        self.n_samples + self.rows.len() - 1
    }

    /// Original sample indices beneath `node`, left subtree first.
    ///
    /// Walks an explicit stack instead of recursing, so deep trees are fine.
    pub fn leaves(&self, node: usize) -> Result<Vec<usize>> {
        let nodes = self.n_samples + self.rows.len();
        if node >= nodes {
            return Err(Error::UnknownNode { node, nodes });
        }

        let mut leaves = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if id < self.n_samples {
                leaves.push(id);
            } else {
                let merge = &self.rows[id - self.n_samples];
                stack.push(merge.right);
                stack.push(merge.left);
            }
        }

        Ok(leaves)
    }

    /// Sample groups under the last `n_clusters` merges, last merge first.
    ///
    /// Each group is the leaves of one merge row, so groups overlap whenever a
    /// selected merge sits below another selected merge. They only form a
    /// partition when the caller's merges happen to line up that way.
    pub fn clusters(&self, n_clusters: usize) -> Result<Vec<Vec<usize>>> {
        if n_clusters == 0 || n_clusters > self.rows.len() {
            return Err(Error::ClusterCount {
                requested: n_clusters,
                max: self.rows.len(),
            });
        }

        self.rows
            .iter()
            .rev()
            .take(n_clusters)
            .map(|merge| {
                let mut group = self.leaves(merge.left)?;
                group.extend(self.leaves(merge.right)?);
                Ok(group)
            })
            .collect()
    }

    /// Left-to-right leaf order of the dendrogram
    pub fn leaf_order(&self) -> Vec<usize> {
        if self.rows.is_empty() {
            return (0..self.n_samples).collect();
        }
        self.leaves(self.root()).unwrap_or_default()
    }

    /// The table as a float matrix with columns `[left, right, distance, count]`
    pub fn to_array(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.rows.len(), 4), |(i, j)| {
            let merge = &self.rows[i];
            match j {
                0 => merge.left as f64,
                1 => merge.right as f64,
                2 => merge.distance,
                _ => merge.count as f64,
            }
        })
    }

    /// Write `n_samples` and the merge rows as pretty-printed JSON
    pub fn write_json<W: Write>(&self, mut writer: W) -> Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Tab-separated rows, one merge per line
impl fmt::Display for Linkage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "left\tright\tdistance\tcount")?;
        for merge in &self.rows {
            writeln!(
                f,
                "{}\t{}\t{}\t{}",
                merge.left, merge.right, merge.distance, merge.count
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clustering::{fit, FittedModel, LinkageMethod};
    use itertools::Itertools;

    /// Five samples: ((2, (0, 1)), (3, 4))
    fn five_samples() -> FittedModel {
        FittedModel::new(
            vec![[0, 1], [2, 5], [3, 4], [6, 7]],
            vec![0, 0, 0, 1, 1],
            vec![1.0, 2.0, 3.0, 4.0],
        )
    }

    #[test]
    fn build_counts_leaves_per_merge() {
        let linkage = Linkage::build(&five_samples()).unwrap();

        assert_eq!(linkage.len(), 4);
        assert_eq!(linkage.n_samples(), 5);
        let counts: Vec<usize> = linkage.rows().iter().map(|m| m.count).collect();
        assert_eq!(counts, vec![2, 3, 2, 5]);
    }

    #[test]
    fn build_snapshot() {
        let model = FittedModel::new(vec![[0, 1], [2, 3]], vec![0, 0, 1], vec![0.5, 1.5]);
        let linkage = Linkage::build(&model).unwrap();
        insta::assert_snapshot!(format!("{:?}", linkage.rows()), @"[Merge { left: 0, right: 1, distance: 0.5, count: 2 }, Merge { left: 2, right: 3, distance: 1.5, count: 3 }]");
    }

    #[test]
    fn build_rejects_forward_references() {
        let model = FittedModel::new(vec![[0, 4], [1, 2]], vec![0, 0, 0], vec![1.0, 2.0]);
        let err = Linkage::build(&model).unwrap_err();
        assert!(matches!(err, Error::DanglingChild { row: 0, child: 4 }));
    }

    #[test]
    fn build_rejects_mismatched_shapes() {
        let model = FittedModel::new(vec![[0, 1], [2, 3]], vec![0, 0, 1], vec![1.0]);
        assert!(matches!(
            Linkage::build(&model),
            Err(Error::Shape {
                children: 2,
                distances: 1,
                samples: 3
            })
        ));

        let model = FittedModel::new(vec![[0, 1]], vec![0, 0, 1], vec![1.0]);
        assert!(Linkage::build(&model).is_err());
    }

    #[test]
    fn leaves_are_left_then_right() {
        let linkage = Linkage::build(&five_samples()).unwrap();

        assert_eq!(linkage.leaves(3).unwrap(), vec![3]);
        assert_eq!(linkage.leaves(5).unwrap(), vec![0, 1]);
        assert_eq!(linkage.leaves(6).unwrap(), vec![2, 0, 1]);
        assert_eq!(linkage.leaves(8).unwrap(), vec![2, 0, 1, 3, 4]);
        assert_eq!(linkage.leaf_order(), vec![2, 0, 1, 3, 4]);
    }

    #[test]
    fn leaves_match_counts() {
        let linkage = Linkage::build(&five_samples()).unwrap();

        for (i, merge) in linkage.rows().iter().enumerate() {
            let leaves = linkage.leaves(linkage.n_samples() + i).unwrap();
            assert_eq!(leaves.len(), merge.count);
            assert_eq!(leaves.iter().unique().count(), merge.count);
        }
    }

    #[test]
    fn leaves_rejects_unknown_node() {
        let linkage = Linkage::build(&five_samples()).unwrap();
        assert!(matches!(
            linkage.leaves(9),
            Err(Error::UnknownNode { node: 9, nodes: 9 })
        ));
    }

    #[test]
    fn clusters_take_last_merges_and_may_overlap() {
        let linkage = Linkage::build(&five_samples()).unwrap();
        let clusters = linkage.clusters(2).unwrap();

        assert_eq!(clusters, vec![vec![2, 0, 1, 3, 4], vec![3, 4]]);
        assert_eq!(clusters.iter().map(Vec::len).sum::<usize>(), 7);
    }

    #[test]
    fn clusters_validates_count() {
        let linkage = Linkage::build(&five_samples()).unwrap();

        assert!(matches!(
            linkage.clusters(0),
            Err(Error::ClusterCount { requested: 0, max: 4 })
        ));
        assert!(matches!(
            linkage.clusters(5),
            Err(Error::ClusterCount { requested: 5, max: 4 })
        ));
    }

    #[test]
    fn fitted_tree_is_consistent() {
        let points = vec![0.0, 0.2, 0.3, 5.0, 5.5, 9.0, 9.1, 20.0];
        let data = Array2::from_shape_vec((points.len(), 1), points).unwrap();
        let model = fit(&data, LinkageMethod::Average, 3).unwrap();
        let linkage = Linkage::build(&model).unwrap();

        assert_eq!(linkage.len(), 7);
        for merge in linkage.rows() {
            let child_count = |child: usize| {
                if child < linkage.n_samples() {
                    1
                } else {
                    linkage.rows()[child - linkage.n_samples()].count
                }
            };
            assert_eq!(merge.count, child_count(merge.left) + child_count(merge.right));
        }

        let clusters = linkage.clusters(linkage.len()).unwrap();
        assert_eq!(clusters.len(), 7);
        let root: Vec<usize> = clusters[0].iter().copied().sorted().collect();
        assert_eq!(root, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn array_and_tsv_views() {
        let linkage = Linkage::build(&five_samples()).unwrap();

        let array = linkage.to_array();
        assert_eq!(array.dim(), (4, 4));
        assert_eq!(array[[1, 1]], 5.0);
        assert_eq!(array[[3, 3]], 5.0);

        let tsv = linkage.to_string();
        assert_eq!(tsv.lines().count(), 5);
        assert_eq!(tsv.lines().nth(2), Some("2\t5\t2\t3"));
    }

    #[test]
    fn json_view() {
        let linkage = Linkage::build(&five_samples()).unwrap();
        let mut json = Vec::new();
        linkage.write_json(&mut json).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&json).unwrap();
        assert_eq!(value["n_samples"], 5);
        assert_eq!(value["rows"].as_array().map(Vec::len), Some(4));
        assert_eq!(value["rows"][1]["right"], 5);
        assert_eq!(value["rows"][3]["count"], 5);
        assert_eq!(value["rows"][3]["distance"], 4.0);
    }
}
