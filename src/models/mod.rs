pub mod comments;
pub mod timeline;
