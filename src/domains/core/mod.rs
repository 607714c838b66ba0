pub mod booking_guard;
pub mod cascade;
pub mod delete_service;
pub mod deletion_log;
pub mod notification;
pub mod privacy;
pub mod repository;
pub mod target;

pub use booking_guard::BookingGuard;
pub use cascade::{Cascade, CascadeRepositories};
pub use delete_service::{CascadeDeleteService, DeleteOutcome, DeletionRequest, DeletionState};
pub use deletion_log::{
    DeletedModel, DeletionLog, DeletionLogRepository, DeletionLogTree, DeletionType, SqliteDeletionLogRepository,
};
pub use notification::{EmailMessage, LogMailer, Mailer, NotificationDispatcher, NotificationStrategy};
pub use privacy::{scrub_personal_data, UserTokenGenerator};
pub use repository::{FindById, SoftDeletable};
pub use target::{DeletionTarget, TargetKind};
