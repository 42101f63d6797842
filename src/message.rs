// src/message.rs
//
// Tag-page comments. Sending a message runs the content through the mention
// resolver against the assignee directory, persists the canonicalized text,
// and fans a mention notification out to each resolved recipient.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures_util::StreamExt;
use log::{error, info, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user, require_uid};
use crate::live::{self, ChangeOp};
use crate::mention::extract_mentions;
use crate::models::{AssignedUser, Attachment, Message, NotificationType};
use crate::notification::{build_notifications, spawn_fan_out};
use crate::store::is_connectivity_error;
use crate::sync::SyncItem;

/// GET /messages/{tag_id}, newest first.
pub async fn list_messages(
    req: HttpRequest,
    data: web::Data<AppState>,
    tag_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = current_user(&req, &data).await {
        return resp;
    }
    let messages_coll = data.mongodb.db.collection::<Message>("messages");
    let mut cursor = match messages_coll
        .find(doc! { "tagId": tag_id.as_str() })
        .sort(doc! { "createdAt": -1 })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching messages: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching messages");
        }
    };

    let mut messages = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(message) => messages.push(message),
            Err(e) => {
                error!("Error reading messages: {}", e);
                return HttpResponse::InternalServerError().body("Error reading messages");
            }
        }
    }
    HttpResponse::Ok().json(messages)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub reply_to: Option<String>,
    pub reply_to_name: Option<String>,
}

/// Projects the resolved mention emails back onto directory records so the
/// fan-out has display names for each recipient.
fn mention_recipients(mentions: &[String], directory: &[AssignedUser]) -> Vec<AssignedUser> {
    mentions
        .iter()
        .map(|email| {
            directory
                .iter()
                .find(|u| u.email.eq_ignore_ascii_case(email))
                .cloned()
                .unwrap_or_else(|| AssignedUser {
                    email: email.clone(),
                    display_name: String::new(),
                })
        })
        .collect()
}

/// POST /messages/{tag_id}
pub async fn send_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    tag_id: web::Path<String>,
    payload: web::Json<SendMessageRequest>,
) -> impl Responder {
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    let payload = payload.into_inner();
    if payload.content.trim().is_empty() && payload.attachments.is_empty() {
        return HttpResponse::BadRequest().body("Message must have content or attachments");
    }

    let directory = data.directory.snapshot().await;
    let resolved = extract_mentions(&payload.content, &directory);

    let tag_id = tag_id.into_inner();
    let new_message = Message {
        id: Uuid::new_v4().to_string(),
        tag_id: tag_id.clone(),
        sender_email: profile.email.clone(),
        sender_name: profile.display_name.clone(),
        content: resolved.formatted_content,
        created_at: Utc::now(),
        updated_at: None,
        is_read: false,
        attachments: payload.attachments,
        reply_to: payload.reply_to,
        reply_to_name: payload.reply_to_name,
        mentions: resolved.mentions,
    };

    let messages_coll = data.mongodb.db.collection::<Message>("messages");
    match messages_coll.insert_one(&new_message).await {
        Ok(_) => {
            info!("Message sent to tag {}: {}", tag_id, new_message.id);
            if !new_message.mentions.is_empty() {
                let recipients = mention_recipients(&new_message.mentions, &directory);
                spawn_fan_out(
                    data.clone(),
                    build_notifications(
                        NotificationType::Mention,
                        &new_message.id,
                        &tag_id,
                        &profile.email,
                        &profile.display_name,
                        &recipients,
                    ),
                );
            }
            live::publish(
                &data.live,
                Vec::new(),
                "messages",
                ChangeOp::Create,
                &new_message.id,
            );
            HttpResponse::Ok().json(&new_message)
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing message: {}", e);
            match serde_json::to_value(&new_message) {
                Ok(value) => {
                    data.sync.enqueue(SyncItem::create("messages", value));
                    HttpResponse::Accepted().json(&new_message)
                }
                Err(e) => {
                    error!("Error serializing message for sync: {}", e);
                    HttpResponse::InternalServerError().body("Error queueing message")
                }
            }
        }
        Err(e) => {
            error!("Error inserting message: {}", e);
            HttpResponse::InternalServerError().body("Error sending message")
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditMessageRequest {
    pub content: String,
}

/// PUT /messages/{message_id}. Edits touch content only; mentions are not re-resolved on
/// edit, matching the send-time-only resolution model.
pub async fn update_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    message_id: web::Path<String>,
    payload: web::Json<EditMessageRequest>,
) -> impl Responder {
    if let Err(resp) = current_user(&req, &data).await {
        return resp;
    }
    let message_id = message_id.into_inner();
    let messages_coll = data.mongodb.db.collection::<Message>("messages");
    let update = doc! {
        "$set": {
            "content": &payload.content,
            "updatedAt": Utc::now().to_rfc3339(),
        }
    };
    match messages_coll
        .update_one(doc! { "_id": &message_id }, update)
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Message not found"),
        Ok(_) => {
            live::publish(&data.live, Vec::new(), "messages", ChangeOp::Update, &message_id);
            HttpResponse::Ok().body("Message updated successfully")
        }
        Err(e) => {
            error!("Error updating message: {}", e);
            HttpResponse::InternalServerError().body("Error updating message")
        }
    }
}

/// POST /messages/{message_id}/read
pub async fn mark_as_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    message_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let message_id = message_id.into_inner();
    let messages_coll = data.mongodb.db.collection::<Message>("messages");
    match messages_coll
        .update_one(doc! { "_id": &message_id }, doc! { "$set": { "isRead": true } })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Message not found"),
        Ok(_) => HttpResponse::Ok().body("Message marked as read"),
        Err(e) => {
            error!("Error marking message as read: {}", e);
            HttpResponse::InternalServerError().body("Error marking message as read")
        }
    }
}

/// DELETE /messages/{message_id}
pub async fn delete_message(
    req: HttpRequest,
    data: web::Data<AppState>,
    message_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = current_user(&req, &data).await {
        return resp;
    }
    let message_id = message_id.into_inner();
    let messages_coll = data.mongodb.db.collection::<Message>("messages");
    match messages_coll.delete_one(doc! { "_id": &message_id }).await {
        Ok(res) if res.deleted_count == 0 => HttpResponse::NotFound().body("Message not found"),
        Ok(_) => {
            live::publish(&data.live, Vec::new(), "messages", ChangeOp::Delete, &message_id);
            HttpResponse::Ok().body("Message deleted successfully")
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing message delete: {}", e);
            data.sync.enqueue(SyncItem::delete("messages", &message_id));
            HttpResponse::Accepted().body("Delete queued for sync")
        }
        Err(e) => {
            error!("Error deleting message: {}", e);
            HttpResponse::InternalServerError().body("Error deleting message")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipients_carry_directory_display_names() {
        let directory = vec![AssignedUser {
            email: "a@x.com".to_string(),
            display_name: "Alice".to_string(),
        }];
        let recipients = mention_recipients(&["A@X.COM".to_string()], &directory);
        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].display_name, "Alice");
        assert_eq!(recipients[0].email, "a@x.com");
    }

    #[test]
    fn unknown_mention_email_falls_back_to_a_bare_record() {
        let recipients = mention_recipients(&["ghost@x.com".to_string()], &[]);
        assert_eq!(recipients[0].email, "ghost@x.com");
        assert!(recipients[0].display_name.is_empty());
    }
}
