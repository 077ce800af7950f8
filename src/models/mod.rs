// Models module - Database entity representations

pub mod activity_log;
pub mod member;
pub mod sanction;
pub mod user;

pub use activity_log::ActivityLog;
pub use member::Member;
pub use sanction::Sanction;
pub use user::User;
