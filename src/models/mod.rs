pub mod book;
pub mod checkout;
pub mod genre;
pub mod password_reset_token;
pub mod token;
pub mod user;

pub use book::{Book, BookWithGenre, InventoryCounts};
pub use checkout::{Checkout, CheckoutRecord, OverdueCheckout};
pub use genre::Genre;
pub use password_reset_token::PasswordResetToken;
pub use token::PersonalAccessToken;
pub use user::User;
