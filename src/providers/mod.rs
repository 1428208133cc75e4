pub mod github;
pub mod gitlab;
