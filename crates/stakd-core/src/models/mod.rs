//! Canonical entity records and their mutation inputs.

pub mod contact;
pub mod message;
pub mod notification;
pub mod org;
pub mod task;
pub mod transaction;
pub mod user;

pub use contact::{Contact, ContactActivity, ContactStatus, CreateContact, UpdateContact};
pub use message::{
    BodyType, CreateMessage, Message, MessageBody, MessagePlatform, MessageRecipient,
    MessageStats, MessageStatus, RecipientList, SendAt, UpdateMessage,
};
pub use notification::{
    Notification, NotificationFilter, NotificationPreferences, NotificationType, Priority,
    UnreadCount,
};
pub use org::{OrgStatus, Organization};
pub use task::{CreateTask, Task, TaskAssignee, TaskPriority, TaskStatus, UpdateTask};
pub use transaction::{
    CreateTransaction, Transaction, TransactionPlatform, TransactionStatus, TransactionType,
    UpdateTransaction,
};
pub use user::{Permission, User, UserPermissions, UserRole};
