// src/tag.rs

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info, warn};
use mongodb::bson::doc;
use serde::Deserialize;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user, require_uid};
use crate::directory::resolve_tag_assignees;
use crate::live::{self, ChangeOp};
use crate::models::Tag;

/// GET /tags. Returns tags the caller owns plus tags the caller is assigned to,
/// deduplicated by id and sorted by the manual `order` field.
pub async fn list_tags(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };

    let tags_coll = data.mongodb.db.collection::<Tag>("tags");
    let filter = doc! {
        "$or": [
            { "ownerId": &profile.id },
            { "assignedUserIds": &profile.id },
        ]
    };
    let mut cursor = match tags_coll.find(filter).sort(doc! { "order": 1 }).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tags: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tags");
        }
    };

    let mut tags: Vec<Tag> = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(tag) => {
                if !tags.iter().any(|t| t.id == tag.id) {
                    tags.push(tag);
                }
            }
            Err(e) => {
                error!("Error reading tags: {}", e);
                return HttpResponse::InternalServerError().body("Error reading tags");
            }
        }
    }
    HttpResponse::Ok().json(tags)
}

#[derive(Debug, Deserialize)]
pub struct CreateTagRequest {
    pub name: String,
}

/// POST /tags. Rejects a duplicate name for the same owner with 409.
pub async fn create_tag(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTagRequest>,
) -> impl Responder {
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    let name = payload.name.trim().to_string();
    if name.is_empty() {
        return HttpResponse::BadRequest().body("Tag name must not be empty");
    }

    let tags_coll = data.mongodb.db.collection::<Tag>("tags");
    match tags_coll
        .find_one(doc! { "name": &name, "ownerId": &profile.id })
        .await
    {
        Ok(Some(_)) => return HttpResponse::Conflict().body("Tag already exists"),
        Ok(None) => {}
        Err(e) => {
            error!("Error checking for duplicate tag: {}", e);
            return HttpResponse::InternalServerError().body("Error creating tag");
        }
    }

    let order = match tags_coll.count_documents(doc! { "ownerId": &profile.id }).await {
        Ok(count) => count as i32,
        Err(e) => {
            warn!("Error counting tags for order, defaulting to 0: {}", e);
            0
        }
    };

    let new_tag = Tag {
        id: Uuid::new_v4().to_string(),
        name,
        owner_id: Some(profile.id.clone()),
        assigned_user_ids: Vec::new(),
        assigned_users: Vec::new(),
        order,
        created_at: Utc::now(),
    };
    match tags_coll.insert_one(&new_tag).await {
        Ok(_) => {
            info!("Tag created: {} ({})", new_tag.name, new_tag.id);
            live::publish(&data.live, Vec::new(), "tags", ChangeOp::Create, &new_tag.id);
            HttpResponse::Ok().json(&new_tag)
        }
        Err(e) => {
            error!("Error inserting tag: {}", e);
            HttpResponse::InternalServerError().body("Error creating tag")
        }
    }
}

/// Creates a tag for `name` owned by `owner_id` if none exists yet. Used when
/// a task references an unknown tag name; failure is logged and swallowed so
/// the task write always proceeds.
pub async fn ensure_tag(data: &web::Data<AppState>, name: &str, owner_id: &str) {
    let tags_coll = data.mongodb.db.collection::<Tag>("tags");
    match tags_coll.find_one(doc! { "name": name }).await {
        Ok(Some(_)) => return,
        Ok(None) => {}
        Err(e) => {
            warn!("Error looking up tag '{}': {}", name, e);
            return;
        }
    }
    let order = tags_coll
        .count_documents(doc! { "ownerId": owner_id })
        .await
        .unwrap_or(0) as i32;
    let new_tag = Tag {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        owner_id: Some(owner_id.to_string()),
        assigned_user_ids: Vec::new(),
        assigned_users: Vec::new(),
        order,
        created_at: Utc::now(),
    };
    if let Err(e) = tags_coll.insert_one(&new_tag).await {
        warn!("Error auto-creating tag '{}': {}", name, e);
    } else {
        info!("Tag auto-created: {}", name);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub tag_ids: Vec<String>,
}

/// POST /tags/reorder. Each tag's `order` becomes its index in the list.
pub async fn reorder_tags(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<ReorderRequest>,
) -> impl Responder {
    if let Err(resp) = current_user(&req, &data).await {
        return resp;
    }
    let tags_coll = data.mongodb.db.collection::<Tag>("tags");
    for (index, tag_id) in payload.tag_ids.iter().enumerate() {
        if let Err(e) = tags_coll
            .update_one(
                doc! { "_id": tag_id },
                doc! { "$set": { "order": index as i32 } },
            )
            .await
        {
            error!("Error reordering tag {}: {}", tag_id, e);
            return HttpResponse::InternalServerError().body("Error reordering tags");
        }
    }
    live::publish(&data.live, Vec::new(), "tags", ChangeOp::Update, "order");
    HttpResponse::Ok().body("Tags reordered successfully")
}

/// DELETE /tags/{tag_id}
///
/// Removes only the tag document. Tasks and messages still carrying the tag
/// reference are left in place and simply stop resolving.
pub async fn delete_tag(
    req: HttpRequest,
    data: web::Data<AppState>,
    tag_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let tag_id = tag_id.into_inner();
    let tags_coll = data.mongodb.db.collection::<Tag>("tags");
    match tags_coll.delete_one(doc! { "_id": &tag_id }).await {
        Ok(res) if res.deleted_count == 0 => HttpResponse::NotFound().body("Tag not found"),
        Ok(_) => {
            info!("Tag deleted: {}", tag_id);
            live::publish(&data.live, Vec::new(), "tags", ChangeOp::Delete, &tag_id);
            HttpResponse::Ok().body("Tag deleted successfully")
        }
        Err(e) => {
            error!("Error deleting tag: {}", e);
            HttpResponse::InternalServerError().body("Error deleting tag")
        }
    }
}

/// GET /tags/{tag}/assignees. The resolved assignee roster for a tag,
/// addressed by name or id. Unknown tags resolve to an empty list.
pub async fn tag_assignees(
    req: HttpRequest,
    data: web::Data<AppState>,
    tag: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let assignees = resolve_tag_assignees(&*data.mongodb, &tag).await;
    HttpResponse::Ok().json(assignees)
}
