pub mod github;

pub use github::{ContentsFile, GithubContentStore, GithubError};
