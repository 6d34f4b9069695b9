pub mod books;
pub mod checkouts;
pub mod genres;
pub mod password_reset_tokens;
pub mod tokens;
pub mod users;
