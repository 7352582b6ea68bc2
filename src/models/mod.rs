pub mod appointment;
pub mod event;
pub mod notification;
pub mod patient;
pub mod user;

pub use appointment::{
    Appointment, AppointmentListSummary, AppointmentPatch, AppointmentStatus,
    UpdateAppointmentParams, UpdateKind,
};
pub use event::AdminEvent;
pub use notification::{Notification, NotificationStatus};
pub use patient::{Gender, Patient};
pub use user::User;
