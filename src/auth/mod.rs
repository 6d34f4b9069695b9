pub mod extractor;
pub mod password;
pub mod tokens;
pub mod verification;
