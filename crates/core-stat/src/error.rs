use thiserror::Error;

/// Decoding failures for stat and info replies. All are fatal to the run.
#[derive(Debug, Error)]
pub enum ParseError {
    /// A required `show info` key was absent from the reply.
    #[error("missing \"{0}\" in info data")]
    MissingKey(&'static str),
    /// A non-empty integer cell failed to parse.
    #[error("garbage field: {field}=\"{value}\" (expected integer)")]
    GarbageField { field: &'static str, value: String },
}
