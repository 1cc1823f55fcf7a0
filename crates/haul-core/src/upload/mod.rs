//! Resumable multipart upload.
//!
//! A file is split into bounded parts ([`plan`]) that are sent one after the
//! other within a server-tracked session. After a transient failure or a
//! process restart, [`UploadCoordinator::resume_session`] asks the server how
//! many parts it already holds and the upload continues from exactly that
//! ordinal.

mod coordinator;
mod error;
pub mod http;
pub mod plan;
mod session;
mod source;
mod transport;

pub use coordinator::{
    UploadCoordinator, UploadSettings, DEFAULT_LIST_PAGE_SIZE, DEFAULT_MAX_PART_SIZE,
};
pub use error::UploadError;
pub use http::HttpUploadTransport;
pub use plan::{plan_parts, ContentRange, PartRange};
pub use session::{SessionId, SessionStatus, TransferSession};
pub use source::{PartSource, SeekableSource, SequentialSource};
pub use transport::{PartAck, PartPage, SessionGrant, UploadTransport};
