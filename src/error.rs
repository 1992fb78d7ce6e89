use axum::{Json, http::StatusCode, response::IntoResponse};
use oauth2::basic::BasicErrorResponseType;
use oauth2::{HttpClientError, RequestTokenError, StandardErrorResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum RelayError {
    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] SqlxError),

    #[error("Missing or invalid credentials")]
    Unauthorized,

    #[error("No connected account for platform {0}")]
    NotConnected(String),

    #[error("Connected account is inactive")]
    ConnectionInactive,

    #[error("Provider authorization expired; reconnect the account")]
    ReauthorizationRequired,

    #[error("No business location selected")]
    LocationNotSelected,

    #[error("OAuth2 token request error: {0}")]
    Oauth2Token(String),

    #[error("OAuth flow error: {0}")]
    OauthFlow(String),

    #[error("Upstream error with status: {0}")]
    UpstreamStatus(StatusCode),

    #[error("Text generation error: {0}")]
    TextGeneration(String),

    #[error("Blurbs are only generated for non-empty reviews rated 3 or higher")]
    BlurbNotAllowed,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not found")]
    NotFound,
}

impl
    From<
        RequestTokenError<
            HttpClientError<reqwest::Error>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    > for RelayError
{
    fn from(
        e: RequestTokenError<
            HttpClientError<reqwest::Error>,
            StandardErrorResponse<BasicErrorResponseType>,
        >,
    ) -> Self {
        match e {
            RequestTokenError::ServerResponse(resp) => match resp.error() {
                // The stored grant or client registration is no longer usable.
                BasicErrorResponseType::InvalidGrant
                | BasicErrorResponseType::InvalidClient
                | BasicErrorResponseType::UnauthorizedClient => {
                    RelayError::ReauthorizationRequired
                }
                other => RelayError::Oauth2Token(format!("provider error `{other}`")),
            },
            RequestTokenError::Request(req_e) => {
                RelayError::Oauth2Token(format!("request failed: {}", req_e))
            }
            RequestTokenError::Parse(parse_err, _body) => {
                RelayError::Oauth2Token(format!("unreadable token response: {parse_err}"))
            }
            RequestTokenError::Other(s) => RelayError::Oauth2Token(s),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> axum::response::Response {
        let (status, code, message) = match &self {
            RelayError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Authentication error.".to_string(),
            ),
            RelayError::ReauthorizationRequired => (
                StatusCode::UNAUTHORIZED,
                "REAUTHORIZATION_REQUIRED",
                self.to_string(),
            ),
            RelayError::NotConnected(_) => {
                (StatusCode::FORBIDDEN, "NOT_CONNECTED", self.to_string())
            }
            RelayError::ConnectionInactive => {
                (StatusCode::FORBIDDEN, "CONNECTION_INACTIVE", self.to_string())
            }
            RelayError::LocationNotSelected => (
                StatusCode::BAD_REQUEST,
                "LOCATION_NOT_SELECTED",
                self.to_string(),
            ),
            RelayError::OauthFlow(_) => {
                (StatusCode::BAD_REQUEST, "OAUTH_FLOW_ERROR", self.to_string())
            }
            RelayError::InvalidRequest(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_REQUEST", self.to_string())
            }
            RelayError::NotFound => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                "Resource not found.".to_string(),
            ),
            RelayError::BlurbNotAllowed => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "BLURB_NOT_ALLOWED",
                self.to_string(),
            ),
            RelayError::Database(_) | RelayError::Json(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal server error occurred.".to_string(),
            ),
            RelayError::Reqwest(_) | RelayError::UrlParse(_) | RelayError::Oauth2Token(_) => (
                StatusCode::BAD_GATEWAY,
                "BAD_GATEWAY",
                "Upstream service is unavailable.".to_string(),
            ),
            RelayError::TextGeneration(_) => (
                StatusCode::BAD_GATEWAY,
                "TEXT_GENERATION_FAILED",
                "Text generation service failed.".to_string(),
            ),
            RelayError::UpstreamStatus(code) => {
                let msg = match *code {
                    StatusCode::TOO_MANY_REQUESTS => "Upstream rate limit exceeded.",
                    StatusCode::UNAUTHORIZED => "Upstream authentication failed.",
                    StatusCode::FORBIDDEN => "Upstream permission denied.",
                    StatusCode::NOT_FOUND => "Upstream resource not found.",
                    _ => "An upstream error occurred.",
                };
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", msg.to_string())
            }
        };
        let body = ApiErrorResponse {
            error: ApiErrorBody {
                code: code.to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
