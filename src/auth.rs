use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header,
    Error, HttpMessage, HttpResponse,
};
use futures_util::future::{ok, Ready as FutureReady};
use jsonwebtoken::{decode, errors::Error as JwtError, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};
use tracing::debug;

pub const ADMIN_ROLE: &str = "admin";
const TOKEN_COOKIE: &str = "token";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,     // User ID
    pub role: String,
    pub exp: i64,        // Expiration time
    pub iat: i64,        // Issued at
}

/// The signed-in user, as described by a verified token.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub role: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == ADMIN_ROLE
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        CurrentUser {
            id: claims.sub,
            role: claims.role,
        }
    }
}

pub fn verify_token(token: &str, key: &DecodingKey) -> Result<Claims, JwtError> {
    let token_data = decode::<Claims>(token, key, &Validation::default())?;
    Ok(token_data.claims)
}

/// Token from `Authorization: Bearer ...`, falling back to the `token` cookie.
fn request_token(req: &ServiceRequest) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        let value = value.to_str().ok()?;
        return value.strip_prefix("Bearer ").map(str::to_owned);
    }
    req.cookie(TOKEN_COOKIE).map(|c| c.value().to_owned())
}

#[cfg(test)]
pub fn issue_token(secret: &str, sub: &str, role: &str, ttl: chrono::Duration) -> Result<String, JwtError> {
    use jsonwebtoken::{encode, EncodingKey, Header};

    let now = chrono::Utc::now();
    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
}

/// Lets admins through and sends everyone else to the login page.
///
/// The verified [`CurrentUser`] is placed in the request extensions so
/// handlers behind the gate can read it with `web::ReqData<CurrentUser>`.
#[derive(Clone)]
pub struct AdminGate {
    key: DecodingKey,
    login_path: String,
}

impl AdminGate {
    pub fn new(secret: &str, login_path: impl Into<String>) -> Self {
        AdminGate {
            key: DecodingKey::from_secret(secret.as_bytes()),
            login_path: login_path.into(),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for AdminGate
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = AdminGateMiddleware<S>;
    type Future = FutureReady<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AdminGateMiddleware {
            service,
            key: self.key.clone(),
            login_path: self.login_path.clone(),
        })
    }
}

pub struct AdminGateMiddleware<S> {
    service: S,
    key: DecodingKey,
    login_path: String,
}

impl<S, B> Service<ServiceRequest> for AdminGateMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let user = request_token(&req)
            .and_then(|token| match verify_token(&token, &self.key) {
                Ok(claims) => Some(CurrentUser::from(claims)),
                Err(e) => {
                    debug!("Rejected token: {}", e);
                    None
                }
            })
            .filter(CurrentUser::is_admin);

        match user {
            Some(user) => {
                debug!("Admin {} accessing {}", user.id, req.path());
                req.extensions_mut().insert(user);
                let fut = self.service.call(req);
                Box::pin(async move {
                    let res = fut.await?;
                    Ok(res.map_into_left_body())
                })
            }
            None => {
                debug!("Redirecting {} to {}", req.path(), self.login_path);
                let response = HttpResponse::Found()
                    .insert_header((header::LOCATION, self.login_path.clone()))
                    .finish();
                let res = req.into_response(response).map_into_right_body();
                Box::pin(async move { Ok(res) })
            }
        }
    }
}
