pub mod link;
pub mod profile;

pub use link::{Owner, LinkDescriptor};
pub use profile::{EventHashes, EventKind, ProfileState};
