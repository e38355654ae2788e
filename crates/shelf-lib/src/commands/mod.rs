pub mod app;
pub mod list;
pub mod publish;
