//! Authentication middleware
//!
//! Bearer JWT validation. The token fixes the caller's user id and plant; every
//! service call is scoped by that plant, never by anything in the request body.

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::AppState;

/// Permission required to approve containers
pub const CONTAINER_APPROVE: (&str, &str) = ("container", "approve");

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub plant_id: Uuid,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: &str, action: &str) -> bool {
        let permission = format!("{}:{}", resource, action);
        self.permissions.iter().any(|p| *p == permission || *p == "*")
    }

    /// Fail with `InsufficientPermissions` unless the user holds `resource:action`
    pub fn require(&self, (resource, action): (&str, &str)) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions(format!("{}:{}", resource, action)))
        }
    }
}

/// JWT claims structure
#[derive(Debug, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    pub sub: String,
    pub plant_id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let decoded = decode_jwt(token, &state.config.jwt.secret).and_then(auth_user_from_claims);
    let auth_user = match decoded {
        Ok(user) => user,
        Err(msg) => return unauthorized_response(&msg),
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

fn auth_user_from_claims(claims: Claims) -> Result<AuthUser, String> {
    let user_id = Uuid::parse_str(&claims.sub).map_err(|_| "Invalid user ID in token".to_string())?;
    let plant_id =
        Uuid::parse_str(&claims.plant_id).map_err(|_| "Invalid plant ID in token".to_string())?;

    Ok(AuthUser {
        user_id,
        plant_id,
        permissions: claims.permissions,
    })
}

/// Decode and validate JWT token
fn decode_jwt(token: &str, secret: &str) -> Result<Claims, String> {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("Invalid token: {}", e))
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            field: None,
            value: None,
        },
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(plant_id: &str, permissions: Vec<String>, secret: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            plant_id: plant_id.to_string(),
            permissions,
            exp: now + 3600,
            iat: now,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    #[test]
    fn test_decode_round_trip_yields_plant_scope() {
        let plant = Uuid::new_v4();
        let jwt = token(&plant.to_string(), vec!["container:approve".into()], "s3cret");
        let user = decode_jwt(&jwt, "s3cret").and_then(auth_user_from_claims).unwrap();
        assert_eq!(user.plant_id, plant);
        assert!(user.require(CONTAINER_APPROVE).is_ok());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let jwt = token(&Uuid::new_v4().to_string(), vec![], "s3cret");
        assert!(decode_jwt(&jwt, "other").is_err());
    }

    #[test]
    fn test_bad_plant_id_rejected() {
        let jwt = token("not-a-uuid", vec![], "s3cret");
        let err = decode_jwt(&jwt, "s3cret").and_then(auth_user_from_claims).unwrap_err();
        assert_eq!(err, "Invalid plant ID in token");
    }

    #[test]
    fn test_missing_permission() {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            plant_id: Uuid::new_v4(),
            permissions: vec!["container:view".into()],
        };
        assert!(matches!(
            user.require(CONTAINER_APPROVE),
            Err(AppError::InsufficientPermissions(_))
        ));
    }
}
