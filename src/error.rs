/// Result alias for `sharc`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned while configuring or driving the community algorithms.
///
/// Round computation itself never fails: missing weights read as zero and
/// unlabeled nodes self-originate. Everything here surfaces at construction
/// time or from the provided round driver.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Input was empty.
    #[error("empty input provided")]
    EmptyInput,

    /// Invalid parameter value.
    #[error("invalid parameter '{name}': {message}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// Algorithm name did not match any known variant.
    #[error("unknown algorithm '{0}'")]
    UnknownAlgorithm(String),

    /// A change notification referenced a node that is not in the graph.
    #[error("node {0} not found")]
    NodeNotFound(usize),
}
