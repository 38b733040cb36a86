pub mod meeting;
pub mod room;
pub mod user;
pub mod window;
