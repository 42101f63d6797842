use actix_web::{web, HttpMessage, HttpRequest, HttpResponse, Responder};
use bcrypt::{hash, verify, DEFAULT_COST};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::{error, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::models::UserProfile;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupInfo {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Deserialize)]
pub struct LoginInfo {
    pub email: String,
    pub password: String,
}

pub fn create_jwt(user_id: &str, secret: &str) -> String {
    let expiration = Utc::now() + Duration::hours(24);
    let claims = Claims {
        sub: user_id.to_string(),
        exp: expiration.timestamp() as usize,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_ref())).unwrap()
}

pub fn validate_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

/// Identity-only gate for handlers that need a signed-in caller but not the
/// full profile document. The middleware inserts the uid extension only for
/// a valid bearer token, so a missing extension means an anonymous request.
pub fn require_uid(req: &HttpRequest) -> Result<String, HttpResponse> {
    match req.extensions().get::<String>() {
        Some(uid) => Ok(uid.clone()),
        None => {
            warn!("Rejected request without a signed-in user");
            Err(HttpResponse::Unauthorized().body("Unauthorized"))
        }
    }
}

/// Loads the signed-in caller's profile, or the 401 the handler should
/// return. Every operation that stamps ownership or sender identity goes
/// through here; there is no anonymous write path.
pub async fn current_user(
    req: &HttpRequest,
    data: &AppState,
) -> Result<UserProfile, HttpResponse> {
    let uid = match req.extensions().get::<String>() {
        Some(uid) => uid.clone(),
        None => {
            warn!("Rejected request without a signed-in user");
            return Err(HttpResponse::Unauthorized().body("Unauthorized"));
        }
    };
    let users = data.mongodb.db.collection::<UserProfile>("users");
    match users.find_one(doc! { "_id": &uid }).await {
        Ok(Some(profile)) => Ok(profile),
        Ok(None) => {
            warn!("Signed-in user {} has no profile document", uid);
            Err(HttpResponse::Unauthorized().body("Unauthorized"))
        }
        Err(e) => {
            error!("Error loading profile for {}: {}", uid, e);
            Err(HttpResponse::InternalServerError().body("Error loading user profile"))
        }
    }
}

pub async fn signup(
    data: web::Data<AppState>,
    signup_info: web::Json<SignupInfo>,
) -> impl Responder {
    let users = data.mongodb.db.collection::<UserProfile>("users");
    match users.find_one(doc! { "email": &signup_info.email }).await {
        Ok(Some(_)) => return HttpResponse::Conflict().body("Email already registered"),
        Ok(None) => {}
        Err(e) => return HttpResponse::InternalServerError().body(format!("Error: {}", e)),
    }

    let hashed_password = match hash(&signup_info.password, DEFAULT_COST) {
        Ok(h) => h,
        Err(_) => return HttpResponse::InternalServerError().body("Error hashing password"),
    };

    let new_user = UserProfile {
        id: Uuid::new_v4().to_string(),
        email: signup_info.email.clone(),
        display_name: signup_info.display_name.clone(),
        password: hashed_password,
    };

    match users.insert_one(&new_user).await {
        Ok(_) => HttpResponse::Ok().json(serde_json::json!({ "status": "User created" })),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error: {:?}", e)),
    }
}

pub async fn login(data: web::Data<AppState>, login_info: web::Json<LoginInfo>) -> impl Responder {
    let users = data.mongodb.db.collection::<UserProfile>("users");
    let user_doc = users.find_one(doc! { "email": &login_info.email }).await;

    match user_doc {
        Ok(Some(user)) => {
            if verify(&login_info.password, &user.password).unwrap_or(false) {
                let token = create_jwt(&user.id, &data.config.jwt_secret);
                HttpResponse::Ok().json(serde_json::json!({
                    "token": token,
                    "user_id": user.id,
                    "display_name": user.display_name,
                }))
            } else {
                HttpResponse::Unauthorized().body("Invalid credentials")
            }
        }
        Ok(None) => HttpResponse::Unauthorized().body("User not found"),
        Err(_) => HttpResponse::InternalServerError().body("Error logging in"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn anonymous_request_is_rejected() {
        let req = TestRequest::default().to_http_request();
        assert!(require_uid(&req).is_err());
    }

    #[test]
    fn signed_in_request_yields_the_uid() {
        let req = TestRequest::default().to_http_request();
        req.extensions_mut().insert("uid-1".to_string());
        assert_eq!(require_uid(&req).unwrap(), "uid-1");
    }
}
