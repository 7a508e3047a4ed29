pub mod reader;
pub mod types;
pub mod writer;

pub use reader::{FieldPostings, Posting, PostingEntry, Snapshot};
pub use types::*;
pub use writer::{Store, Transaction};
