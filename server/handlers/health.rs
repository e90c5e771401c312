use crate::routes::{text_response, HttpResponse};

/// `GET /`
pub fn handle() -> HttpResponse {
    text_response(200, "hello")
}
