pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Unknown element: {id}")]
    UnknownElement { id: String },

    #[error("Duplicate element id: {id}")]
    DuplicateElement { id: String },

    #[error("Edge {edge} references missing endpoint {endpoint}")]
    DanglingEndpoint { edge: String, endpoint: String },
}
