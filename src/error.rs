use crate::frame::FrameId;
use thiserror::Error;
use uuid::Uuid;

/// Every fallible operation on the graph reports one of these kinds. The
/// variants carry the ids involved so the rendered message is enough to
/// diagnose the failure without a backtrace.
///
/// The policy is propagate, not recover: a failed mutation leaves the graph
/// and all subscribed views in their pre-call state.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("frame {0} doesn't exist")]
    UnknownFrame(FrameId),
    #[error("frame {0} already exists")]
    FrameAlreadyExists(FrameId),
    #[error(
        "frame {0} is still connected to the graph. All edges coming from or \
         leading to this frame need to be removed before removing the frame"
    )]
    FrameStillConnected(FrameId),
    #[error("edge between {origin} and {target} doesn't exist")]
    UnknownEdge { origin: FrameId, target: FrameId },
    #[error("transform between {origin} and {target} doesn't exist")]
    UnknownTransform { origin: FrameId, target: FrameId },
    #[error("edge between {origin} and {target} already exists")]
    EdgeAlreadyExists { origin: FrameId, target: FrameId },
    #[error("the item with uuid '{uuid}' is not part of frame '{frame}'")]
    UnknownItem { frame: FrameId, uuid: Uuid },
    #[error("there are no items of type '{type_name}' in frame '{frame}'")]
    NoItemsOfTypeInFrame { frame: FrameId, type_name: String },
    #[error("path is empty")]
    EmptyPath,
    #[error("invalid path")]
    InvalidPath,
    #[error("encountered a null vertex")]
    NullVertex,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("archive error: {0}")]
    Archive(String),
    #[error("operation not supported: {0}")]
    UnsupportedOperation(&'static str),
}

impl From<bincode::Error> for GraphError {
    fn from(err: bincode::Error) -> Self {
        GraphError::Archive(err.to_string())
    }
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Archive(err.to_string())
    }
}
