pub mod files;
pub mod invitations;
pub mod session;
pub mod vessels;
pub mod weekly;

pub use files::{FileService, UploadPolicy};
pub use invitations::{InvitationService, InvitationSettings};
pub use session::{RetryPolicy, RoleCache, SessionService};
pub use vessels::{VesselCallDraft, VesselService};
pub use weekly::{WeeklyService, WeeklySubmission};
