pub mod auth;
pub mod books;
pub mod genres;
pub mod user;

use axum::routing::{delete, get, patch, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes() -> Router<SharedState> {
    Router::new()
        // Auth
        .route("/api/register", post(auth::register))
        .route("/api/login", post(auth::login))
        .route("/api/logout", post(auth::logout))
        .route("/api/forgot_password", post(auth::forgot_password))
        .route("/api/password_reset", get(auth::password_reset))
        .route("/api/verify_email", get(auth::verify_email))
        // User
        .route("/api/user", get(user::get_user))
        .route("/api/user/upload_avatar", post(user::upload_avatar))
        .route("/api/user/remove_avatar", delete(user::remove_avatar))
        .route(
            "/api/user/send_verification_email",
            post(user::send_verification_email),
        )
        .route("/api/user/change_email", post(user::change_email))
        // Genres
        .route("/api/genres", get(genres::list))
        // Books
        .route("/api/books", get(books::index).post(books::store))
        .route(
            "/api/books/{id}",
            get(books::show).put(books::update).delete(books::destroy),
        )
        .route("/api/books/{id}/history", get(books::history))
        .route("/api/books/{id}/checkout", post(books::checkout))
        .route("/api/books/{id}/return", patch(books::return_book))
        .route(
            "/api/books/{id}/update_book_picture",
            post(books::update_book_picture),
        )
        // Reports
        .route("/api/send_book_report", post(books::send_book_report))
}
