custom_error::custom_error! { pub Error
    Io{source: std::io::Error} = "I/O error: {source}",
    Json{source: serde_json::Error} = "could not serialize output: {source}",
    Shape{children: usize, distances: usize, samples: usize} = "model shape mismatch: {children} merges and {distances} distances for {samples} samples",
    DanglingChild{row: usize, child: usize} = "merge row {row} references node {child}, which has not been computed yet",
    UnknownNode{node: usize, nodes: usize} = "node {node} is outside the tree ({nodes} nodes)",
    ClusterCount{requested: usize, max: usize} = "cannot extract {requested} clusters, expected between 1 and {max}",
    TooFewSamples{samples: usize} = "hierarchical clustering needs at least two samples, got {samples}",
    KmerSize{k: usize} = "k-mer length needs to be larger than zero and no more than 32, got {k}",
    MissingColumn{column: String} = "required column {column} is missing from the metadata table",
    MalformedRow{line: usize, expected: usize, found: usize} = "metadata line {line} has {found} fields, header has {expected}",
    EmptyInput{what: String} = "no records found in {what}",
    Plot{message: String} = "could not render dendrogram: {message}",
}

pub type Result<T> = std::result::Result<T, Error>;

/// Flatten a plotters backend error into [`Error::Plot`].
pub(crate) fn plot_error<E: std::error::Error>(err: E) -> Error {
    Error::Plot {
        message: err.to_string(),
    }
}
