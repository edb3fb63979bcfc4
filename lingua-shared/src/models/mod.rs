/// Database models
///
/// Each model owns the SQL for its table as associated functions taking a
/// pool or, for statements that must share a transaction, a connection.
///
/// # Models
///
/// - `user`: accounts and roles
/// - `profile`: student and teacher profile rows
/// - `course`: courses and scheduled sessions
/// - `enrollment`: seat reservations and their payment status
/// - `conversation`: conversations, participants and messages
/// - `password_reset`: single-use reset tokens
/// - `blog_post`: public blog
/// - `processed_event`: payment events already applied

pub mod blog_post;
pub mod conversation;
pub mod course;
pub mod enrollment;
pub mod password_reset;
pub mod processed_event;
pub mod profile;
pub mod user;
