pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use stub::{StubFaceIdentifier, StubObjectDetector};

#[cfg(feature = "backend-tract")]
pub use tract::{TractObjectConfig, TractObjectDetector};
