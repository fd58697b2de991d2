use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Serialize, Deserialize)]
pub enum CubeErrorKind {
    Args,
    Content,
    Decode,
    Io,
    Parse,
    Serialize,
    DataNotFound,
    ContextLoadError,
    ClassifierError,
    SegmentationError,
}

impl CubeErrorKind {
    pub fn with_error<E>(self, source: E) -> CubeError
    where
        anyhow::Error: From<E>,
    {
        CubeError {
            kind: self,
            source: From::from(source),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("CubeError(kind={kind:?}, source={source})")]
pub struct CubeError {
    pub kind: CubeErrorKind,
    #[source]
    source: anyhow::Error,
}

impl CubeError {
    pub fn add_context<C>(self, ctx: C) -> Self
    where
        C: fmt::Display + Send + Sync + 'static,
    {
        CubeError {
            kind: self.kind,
            source: self.source.context(ctx),
        }
    }

    pub fn kind(&self) -> CubeErrorKind {
        self.kind
    }
}
