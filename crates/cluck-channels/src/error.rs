//! Channel propagation errors.

/// A failed write somewhere downstream of a channel.
///
/// When one write fans out to several targets, the first failure is returned
/// and any later ones ride along as `suppressed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ChannelError {
    message: String,
    suppressed: Vec<ChannelError>,
}

impl ChannelError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suppressed: Vec::new(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn suppressed(&self) -> &[ChannelError] {
        &self.suppressed
    }

    pub fn with_suppressed(mut self, other: ChannelError) -> Self {
        self.suppressed.push(other);
        self
    }

    /// Fold the results of a fan-out: first error wins, the rest are attached.
    pub fn collect(results: impl IntoIterator<Item = Result<(), ChannelError>>) -> Result<(), ChannelError> {
        let mut first: Option<ChannelError> = None;
        for result in results {
            if let Err(e) = result {
                first = Some(match first {
                    None => e,
                    Some(head) => head.with_suppressed(e),
                });
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl From<anyhow::Error> for ChannelError {
    fn from(e: anyhow::Error) -> Self {
        Self::new(format!("{e:#}"))
    }
}
