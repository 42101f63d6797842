mod message;
mod notification;
mod tag;
mod task;
mod user;

pub use message::{Attachment, Message};
pub use notification::{Notification, NotificationType};
pub use tag::Tag;
pub use task::{AssignedUser, Location, Priority, Status, Task};
pub use user::UserProfile;
