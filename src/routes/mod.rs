pub mod network;
pub mod stations;
pub mod transit;

use crate::database::{Page, Repository, RepositoryError};
use crate::AppState;

use actix_web::error::BlockingError;
use actix_web::http::StatusCode;
use actix_web::{web, HttpRequest, HttpResponse, Responder, ResponseError};
use log::error;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize)]
pub struct Response<T> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> Response<T> {
    pub fn ok(data: T) -> Response<T> {
        Response {
            success: true,
            data,
        }
    }
}

#[derive(Serialize)]
pub struct Pagination {
    pub page: u64,
    pub pages: u64,
    pub limit: u64,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub success: bool,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    pub data: Vec<T>,
}

impl<T: Serialize> ListResponse<T> {
    pub fn all(data: Vec<T>) -> ListResponse<T> {
        ListResponse {
            success: true,
            count: data.len(),
            total: None,
            pagination: None,
            data,
        }
    }

    pub fn paged(data: Vec<T>, total: u64, page: Page) -> ListResponse<T> {
        ListResponse {
            success: true,
            count: data.len(),
            total: Some(total),
            pagination: Some(Pagination {
                page: page.page,
                pages: page.pages(total),
                limit: page.limit,
            }),
            data,
        }
    }
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthorized(&'static str),
    #[error("{0}")]
    Forbidden(&'static str),
    #[error("{0}")]
    NotFound(&'static str),
    /// The cause is logged, clients only ever see a generic message.
    #[error("Server error")]
    Server(String),
}

impl ApiError {
    pub fn bad_request<S: Into<String>>(message: S) -> ApiError {
        ApiError::BadRequest(message.into())
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> ApiError {
        ApiError::Server(err.to_string())
    }
}

impl From<BlockingError> for ApiError {
    fn from(err: BlockingError) -> ApiError {
        ApiError::Server(err.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Server(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let ApiError::Server(cause) = self {
            error!("[api] {}", cause);
        }

        HttpResponse::build(self.status_code()).json(ErrorResponse {
            success: false,
            error: self.to_string(),
        })
    }
}

/// Runs repository work on the blocking thread pool.
pub async fn blocking<F, T>(state: &web::Data<AppState>, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&dyn Repository) -> Result<T, RepositoryError> + Send + 'static,
    T: Send + 'static,
{
    let repository = state.repository.clone();
    Ok(web::block(move || work(repository.as_ref())).await??)
}

/// `?page=&limit=` as the dashboard sends them; anything unparsable falls back
/// to the defaults.
#[derive(Deserialize, Debug, Default)]
pub struct PageQuery {
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl PageQuery {
    pub fn page(&self, default_limit: u64) -> Page {
        let parse = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|v| *v > 0)
        };
        Page::new(
            parse(&self.page).unwrap_or(1),
            parse(&self.limit).unwrap_or(default_limit),
        )
    }
}

pub fn parse_id(raw: &str, not_found: &'static str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::NotFound(not_found))
}

// malformed bodies get the same envelope as every other failure
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req: &HttpRequest| ApiError::BadRequest(err.to_string()).into())
}

pub async fn index() -> impl Responder {
    "Transit network API is running"
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        .route("/", web::get().to(index))
        .service(
            web::scope("/api/stations")
                .route("", web::get().to(stations::list_stations))
                .route("", web::post().to(stations::create_station))
                .route("/type/{type}", web::get().to(stations::stations_by_type))
                .route("/{id}", web::get().to(stations::get_station))
                .route("/{id}", web::put().to(stations::update_station))
                .route("/{id}", web::delete().to(stations::delete_station)),
        )
        .service(
            web::scope("/api/routes")
                .route("", web::get().to(transit::list_routes))
                .route("", web::post().to(transit::create_route))
                .route("/metro-network", web::get().to(network::public_metro_network))
                .route("/type/{type}", web::get().to(transit::routes_by_type))
                .route("/type/{type}/network", web::get().to(network::network_by_type))
                .route("/{id}", web::get().to(transit::get_route))
                .route("/{id}", web::put().to(transit::update_route))
                .route("/{id}", web::delete().to(transit::delete_route)),
        )
        .route(
            "/api/users/metro-network",
            web::get().to(network::user_metro_network),
        )
        .route(
            "/api/admin/metro-network",
            web::get().to(network::admin_metro_network),
        );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_falls_back_to_defaults() {
        let query = PageQuery {
            page: Some(String::from("abc")),
            limit: Some(String::from("0")),
        };
        assert_eq!(query.page(10), Page::new(1, 10));

        let query = PageQuery {
            page: Some(String::from("3")),
            limit: Some(String::from("25")),
        };
        assert_eq!(query.page(10), Page::new(3, 25));

        assert_eq!(PageQuery::default().page(50), Page::new(1, 50));
    }

    #[test]
    fn server_errors_hide_their_cause() {
        let err = ApiError::from(RepositoryError::Poisoned);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "Server error");
    }
}
