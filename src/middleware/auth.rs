//! Authentication middleware
//!
//! Extractors that verify the identity provider's bearer token and narrow
//! the caller by marketplace role.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::{Identity, JwtError, JwtVerifier, UserRole};
use crate::booking::BookingClient;

/// Authenticated user extracted from JWT token
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn identity(&self) -> Identity {
        Identity {
            user_id: self.user_id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

/// Error response for authentication failures
#[derive(Debug, Serialize)]
struct AuthError {
    #[serde(skip)]
    status: StatusCode,
    error: AuthErrorDetails,
}

#[derive(Debug, Serialize)]
struct AuthErrorDetails {
    code: String,
    message: String,
}

impl AuthError {
    fn new(code: &str, message: &str) -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            error: AuthErrorDetails {
                code: code.to_string(),
                message: message.to_string(),
            },
        }
    }

    fn forbidden(message: &str) -> Self {
        Self {
            status: StatusCode::FORBIDDEN,
            ..Self::new("FORBIDDEN", message)
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Extractor for authenticated users
///
/// ```rust,ignore
/// async fn protected_handler(user: AuthenticatedUser) -> impl IntoResponse {
///     format!("Hello, user {}", user.user_id)
/// }
/// ```
#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| {
                    AuthError::new(
                        "MISSING_TOKEN",
                        "Authorization header with Bearer token required",
                    )
                    .into_response()
                })?;

        let verifier = JwtVerifier::from_ref(state);
        let identity = verifier.verify(bearer.token()).map_err(|e| {
            let (code, message) = match e {
                JwtError::TokenExpired => ("TOKEN_EXPIRED", "Token has expired"),
                JwtError::UnknownRole(_) => ("INVALID_TOKEN", "Invalid role in token"),
                JwtError::InvalidToken(_) => ("INVALID_TOKEN", "Invalid token"),
            };
            AuthError::new(code, message).into_response()
        })?;

        Ok(AuthenticatedUser {
            user_id: identity.user_id,
            email: identity.email,
            role: identity.role,
        })
    }
}

async fn require_role<S>(
    parts: &mut Parts,
    state: &S,
    role: UserRole,
) -> Result<AuthenticatedUser, Response>
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    let user = AuthenticatedUser::from_request_parts(parts, state).await?;
    if user.role != role {
        return Err(AuthError::forbidden(&format!("{} access required", role)).into_response());
    }
    Ok(user)
}

/// A caller with the transporter role
pub struct TransporterUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for TransporterUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Transporter)
            .await
            .map(TransporterUser)
    }
}

/// A caller with the client role
pub struct ClientUser(pub AuthenticatedUser);

impl ClientUser {
    pub fn as_booking_client(&self) -> BookingClient {
        BookingClient {
            id: self.0.user_id,
            email: self.0.email.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ClientUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Client)
            .await
            .map(ClientUser)
    }
}

/// A caller with the admin role
pub struct AdminUser(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    JwtVerifier: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        require_role(parts, state, UserRole::Admin)
            .await
            .map(AdminUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Claims;
    use axum::http::Request;
    use jsonwebtoken::{encode, EncodingKey, Header};

    #[derive(Clone)]
    struct TestState {
        verifier: JwtVerifier,
    }

    impl FromRef<TestState> for JwtVerifier {
        fn from_ref(state: &TestState) -> Self {
            state.verifier.clone()
        }
    }

    fn state() -> TestState {
        TestState {
            verifier: JwtVerifier::new("test-secret", None),
        }
    }

    fn token(role: &str) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            email: "someone@example.com".to_string(),
            role: role.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::minutes(5)).timestamp(),
            iss: None,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"test-secret"),
        )
        .unwrap()
    }

    fn parts(auth: Option<String>) -> Parts {
        let mut builder = Request::builder().uri("/api/bookings");
        if let Some(token) = auth {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let rejection = AuthenticatedUser::from_request_parts(&mut parts(None), &state())
            .await
            .unwrap_err();
        assert_eq!(rejection.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_role_extractors_narrow_the_caller() {
        let state = state();

        let client = ClientUser::from_request_parts(&mut parts(Some(token("client"))), &state)
            .await
            .ok()
            .unwrap();
        assert_eq!(client.0.role, UserRole::Client);
        assert_eq!(client.as_booking_client().email, "someone@example.com");

        let rejection =
            TransporterUser::from_request_parts(&mut parts(Some(token("client"))), &state)
                .await
                .err()
                .unwrap();
        assert_eq!(rejection.status(), StatusCode::FORBIDDEN);
    }
}
