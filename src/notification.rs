// src/notification.rs
//
// One notification record per recipient on task assignment and message
// mention, plus a best-effort POST to the external mail sink. The whole
// fan-out runs detached from the originating write: partial failures are
// logged per recipient and never rolled back.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::Utc;
use futures::future::join_all;
use futures_util::StreamExt;
use log::{error, info, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::require_uid;
use crate::live::{self, ChangeOp};
use crate::models::{AssignedUser, Notification, NotificationType};

/// What the external mail function accepts.
#[derive(Debug, Serialize)]
pub struct MailRequest {
    pub to: String,
    pub subject: String,
    pub body: String,
}

pub fn build_notifications(
    kind: NotificationType,
    task_id: &str,
    task_title: &str,
    sender_email: &str,
    sender_name: &str,
    recipients: &[AssignedUser],
) -> Vec<Notification> {
    let mut notifications = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        if recipient.email.is_empty() {
            warn!(
                "Skipping notification for assignee without an email: {:?}",
                recipient.display_name
            );
            continue;
        }
        notifications.push(Notification {
            id: Uuid::new_v4().to_string(),
            task_id: task_id.to_string(),
            task_title: if task_title.is_empty() {
                "無題のタスク".to_string()
            } else {
                task_title.to_string()
            },
            sender_email: sender_email.to_string(),
            sender_name: if sender_name.is_empty() {
                "匿名".to_string()
            } else {
                sender_name.to_string()
            },
            recipient_email: recipient.email.clone(),
            recipient_name: if recipient.display_name.is_empty() {
                "匿名".to_string()
            } else {
                recipient.display_name.clone()
            },
            kind,
            created_at: Utc::now(),
            is_read: false,
        });
    }
    notifications
}

fn mail_for(notification: &Notification) -> MailRequest {
    let (subject, action) = match notification.kind {
        NotificationType::Assignment => ("You have been assigned a task", "assigned you to"),
        NotificationType::Mention => ("You were mentioned", "mentioned you in"),
        NotificationType::Update => ("A task was updated", "updated"),
    };
    MailRequest {
        to: notification.recipient_email.clone(),
        subject: subject.to_string(),
        body: format!(
            "{} {} \"{}\".",
            notification.sender_name, action, notification.task_title
        ),
    }
}

async fn deliver_mail(client: &awc::Client, endpoint: &str, mail: MailRequest) {
    match client.post(endpoint).send_json(&mail).await {
        Ok(resp) if resp.status().is_success() => {}
        Ok(resp) => warn!("Mail sink rejected message to {}: {}", mail.to, resp.status()),
        Err(e) => warn!("Mail sink unreachable for {}: {}", mail.to, e),
    }
}

/// Writes the records concurrently and hands each to the mail sink. Callers
/// spawn this through [`spawn_fan_out`] and never await it.
async fn fan_out(data: web::Data<AppState>, notifications: Vec<Notification>) {
    let collection = data.mongodb.db.collection::<Notification>("notifications");
    let writes = notifications.iter().map(|n| {
        let collection = collection.clone();
        async move { collection.insert_one(n).await }
    });
    for (notification, result) in notifications.iter().zip(join_all(writes).await) {
        match result {
            Ok(_) => {
                live::publish(
                    &data.live,
                    vec![notification.recipient_email.clone()],
                    "notifications",
                    ChangeOp::Create,
                    &notification.id,
                );
                if let Some(endpoint) = &data.config.mail_sink_endpoint {
                    deliver_mail(&data.http_client, endpoint, mail_for(notification)).await;
                }
            }
            Err(e) => error!(
                "Failed to write notification for {}: {}",
                notification.recipient_email, e
            ),
        }
    }
    info!("Notification fan-out finished: {} recipient(s)", notifications.len());
}

/// Fire-and-forget entry point used by the task and message write paths.
pub fn spawn_fan_out(data: web::Data<AppState>, notifications: Vec<Notification>) {
    if notifications.is_empty() {
        return;
    }
    actix_web::rt::spawn(fan_out(data, notifications));
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub recipient: String,
}

/// GET /notifications?recipient=<email>
pub async fn list_notifications(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<NotificationQuery>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let collection = data.mongodb.db.collection::<Notification>("notifications");
    let mut cursor = match collection
        .find(doc! { "recipientEmail": &query.recipient })
        .sort(doc! { "createdAt": -1 })
        .await
    {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching notifications: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching notifications");
        }
    };

    let mut notifications = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(notification) => notifications.push(notification),
            Err(e) => {
                error!("Error reading notifications: {}", e);
                return HttpResponse::InternalServerError().body("Error reading notifications");
            }
        }
    }
    HttpResponse::Ok().json(notifications)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assignee(email: &str, name: &str) -> AssignedUser {
        AssignedUser {
            email: email.to_string(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn one_record_per_assignee() {
        let recipients = vec![assignee("a@x.com", "Alice"), assignee("b@x.com", "Bob")];
        let notifications = build_notifications(
            NotificationType::Assignment,
            "t1",
            "Ship it",
            "boss@x.com",
            "Boss",
            &recipients,
        );
        assert_eq!(notifications.len(), 2);
        assert_eq!(notifications[0].recipient_email, "a@x.com");
        assert_eq!(notifications[1].recipient_email, "b@x.com");
        assert!(notifications.iter().all(|n| !n.is_read));
        assert!(notifications
            .iter()
            .all(|n| n.kind == NotificationType::Assignment));
    }

    #[test]
    fn assignee_without_email_is_skipped() {
        let recipients = vec![assignee("", "Ghost"), assignee("b@x.com", "Bob")];
        let notifications = build_notifications(
            NotificationType::Assignment,
            "t1",
            "Ship it",
            "boss@x.com",
            "Boss",
            &recipients,
        );
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].recipient_email, "b@x.com");
    }

    #[test]
    fn empty_names_fall_back_to_placeholders() {
        let recipients = vec![assignee("a@x.com", "")];
        let notifications =
            build_notifications(NotificationType::Mention, "m1", "", "s@x.com", "", &recipients);
        assert_eq!(notifications[0].task_title, "無題のタスク");
        assert_eq!(notifications[0].sender_name, "匿名");
        assert_eq!(notifications[0].recipient_name, "匿名");
    }
}
