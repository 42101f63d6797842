// src/user.rs

use actix_web::{web, HttpResponse, Responder};
use futures_util::StreamExt;
use log::error;
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::models::UserProfile;

/// Profile shape returned to clients; the password hash never leaves the
/// server.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub id: String,
    pub email: String,
    pub display_name: String,
}

impl From<UserProfile> for PublicProfile {
    fn from(profile: UserProfile) -> Self {
        PublicProfile {
            id: profile.id,
            email: profile.email,
            display_name: profile.display_name,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FindUserQuery {
    pub query: String,
}

/// GET /users/find_user_email?query=<partial email>
pub async fn find_user_email(
    query: web::Query<FindUserQuery>,
    data: web::Data<AppState>,
) -> impl Responder {
    let users_collection = data.mongodb.db.collection::<UserProfile>("users");
    let filter = doc! { "email": { "$regex": &query.query, "$options": "i" } };

    let mut cursor = match users_collection.find(filter).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching users: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching users");
        }
    };

    let mut users: Vec<PublicProfile> = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(user) => users.push(user.into()),
            Err(e) => {
                error!("Error iterating users: {}", e);
                return HttpResponse::InternalServerError().body("Error iterating users");
            }
        }
    }

    HttpResponse::Ok().json(users)
}

/// GET /users/get/{id}
pub async fn get_user_by_id(path: web::Path<String>, data: web::Data<AppState>) -> impl Responder {
    let users_collection = data.mongodb.db.collection::<UserProfile>("users");
    let id = path.into_inner();
    match users_collection.find_one(doc! { "_id": &id }).await {
        Ok(Some(user)) => HttpResponse::Ok().json(PublicProfile::from(user)),
        Ok(None) => HttpResponse::NotFound().body("User not found"),
        Err(e) => HttpResponse::InternalServerError().body(format!("Error fetching user: {}", e)),
    }
}
