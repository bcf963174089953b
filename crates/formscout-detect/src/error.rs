use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectError {
    #[error("invalid pattern for category {category}: {source}")]
    Pattern {
        category: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid jurisdiction rule for {code}: {source}")]
    Rule {
        code: String,
        #[source]
        source: regex::Error,
    },
}
