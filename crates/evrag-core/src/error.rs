//! Error taxonomy for indexing and querying.
//!
//! Every failure the core can produce is a [`RagError`]. Callers at the
//! outer boundary (CLI, HTTP) use [`RagError::kind`] to classify it as bad
//! input, an upstream failure, or an internal failure, and
//! [`RagError::user_message`] for the text shown to end users.

use std::fmt;

use thiserror::Error;

/// Stages of the query pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Idle,
    Embedding,
    Retrieving,
    Reducing,
    Composing,
    Resolving,
    Done,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Embedding => "embedding",
            PipelineStage::Retrieving => "retrieving",
            PipelineStage::Reducing => "reducing",
            PipelineStage::Composing => "composing",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum RagError {
    /// Rejected before any upstream call was made.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The embedding or completion service failed.
    #[error("provider error: {0}")]
    Provider(#[source] anyhow::Error),

    /// The vector index could not be read or written.
    #[error("retrieval error: {0}")]
    Retrieval(#[source] anyhow::Error),

    /// Embedding failed part-way through a reindex. The index was not
    /// touched.
    #[error("ingestion failed after {embedded} chunk(s) were embedded: {source}")]
    Ingestion {
        embedded: usize,
        #[source]
        source: anyhow::Error,
    },

    /// The event store could not be read.
    #[error("event store error: {0}")]
    Store(#[source] anyhow::Error),

    /// A query pipeline stage failed.
    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: PipelineStage,
        #[source]
        source: Box<RagError>,
    },
}

/// Coarse classification of a [`RagError`], mirroring HTTP status classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadInput,
    Upstream,
    Internal,
}

impl RagError {
    /// Tag this error with the pipeline stage it occurred in.
    pub fn at(self, stage: PipelineStage) -> RagError {
        match self {
            already @ RagError::Stage { .. } => already,
            other => RagError::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage this error was tagged with, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            RagError::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with any stage tag removed.
    pub fn root(&self) -> &RagError {
        match self {
            RagError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            RagError::InvalidInput(_) => ErrorKind::BadInput,
            RagError::Provider(_) | RagError::Retrieval(_) | RagError::Ingestion { .. } => {
                ErrorKind::Upstream
            }
            RagError::Store(_) | RagError::Stage { .. } => ErrorKind::Internal,
        }
    }

    /// A message safe to return to callers. Bad input is echoed; anything
    /// else is replaced by a fixed sentence so upstream detail stays in the
    /// logs.
    pub fn user_message(&self) -> String {
        match self.root() {
            RagError::InvalidInput(msg) => msg.clone(),
            RagError::Provider(_) => "the language model service is unavailable".to_string(),
            RagError::Retrieval(_) => "the search index is unavailable".to_string(),
            RagError::Ingestion { .. } => "indexing failed; the index was left unchanged".to_string(),
            RagError::Store(_) | RagError::Stage { .. } => "internal server error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_tag_is_applied_once() {
        let err = RagError::Provider(anyhow::anyhow!("429"))
            .at(PipelineStage::Embedding)
            .at(PipelineStage::Composing);
        assert_eq!(err.stage(), Some(PipelineStage::Embedding));
        assert!(matches!(err.root(), RagError::Provider(_)));
    }

    #[test]
    fn test_kind_classification() {
        let bad = RagError::InvalidInput("empty query".into()).at(PipelineStage::Idle);
        assert_eq!(bad.kind(), ErrorKind::BadInput);
        assert_eq!(bad.user_message(), "empty query");

        let upstream = RagError::Retrieval(anyhow::anyhow!("connection refused"));
        assert_eq!(upstream.kind(), ErrorKind::Upstream);
        assert!(!upstream.user_message().contains("refused"));

        let ingestion = RagError::Ingestion {
            embedded: 3,
            source: anyhow::anyhow!("timeout"),
        };
        assert_eq!(ingestion.kind(), ErrorKind::Upstream);
        assert!(ingestion.to_string().contains("after 3 chunk(s)"));

        let internal = RagError::Store(anyhow::anyhow!("disk I/O error"));
        assert_eq!(internal.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_stage_display() {
        let err = RagError::Provider(anyhow::anyhow!("boom")).at(PipelineStage::Composing);
        assert_eq!(err.to_string(), "composing stage failed: provider error: boom");
    }
}
