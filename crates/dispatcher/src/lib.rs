pub mod clock;
pub mod dispatch;
pub mod error;
pub mod notify;
pub mod roster;

// Re-export main types
pub use clock::{Clock, ManualClock, SystemClock};
pub use dispatch::{DispatchCore, DispatchCoreBuilder, DriverReply, Submission};
pub use error::{BuilderError, DispatchError};
pub use notify::{LogSender, NotificationSender, NotifyError, RecordingSender, WebhookSender};
pub use roster::{DriverContact, DriverRoster};
