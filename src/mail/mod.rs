pub mod address;
pub mod dates;
pub mod ingest;
pub mod record;

pub use address::EmailAddress;
pub use ingest::{DocumentParser, EmlParser, validate_upload};
pub use record::{AttachmentData, EmailRecord};
