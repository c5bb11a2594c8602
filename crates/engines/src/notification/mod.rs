//! Notification stage: renders and sends one email per verified
//! impacted project.

pub mod mailer;
pub mod runner;
pub mod template;

pub use mailer::Mailer;
pub use runner::NotificationRunner;
pub use template::render_notification;
