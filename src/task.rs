// src/task.rs
//
// Task CRUD, lifecycle transitions, and the five read projections over the
// shared `tasks` collection. Each projection is a single-order-field server
// query plus a pure in-memory predicate, so the filter logic is testable
// without a store connection.

use actix_web::{web, HttpRequest, HttpResponse, Responder};
use chrono::{DateTime, Duration, Utc};
use futures_util::StreamExt;
use log::{error, info, warn};
use mongodb::bson::{doc, Document};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app_state::AppState;
use crate::auth::{current_user, require_uid};
use crate::live::{self, ChangeOp};
use crate::models::{AssignedUser, Location, NotificationType, Priority, Status, Task};
use crate::notification::{build_notifications, spawn_fan_out};
use crate::store::is_connectivity_error;
use crate::sync::SyncItem;
use crate::tag::ensure_tag;

/// Days a trashed task survives before the sweep hard-deletes it.
const TRASH_RETENTION_DAYS: i64 = 7;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskView {
    Active,
    DueDated,
    Reminders,
    Archived,
    Deleted,
    ByTag(String),
}

impl TaskView {
    /// The narrow server-side query for this view: at most one equality
    /// filter and one order field; everything else is filtered in memory.
    fn query(&self) -> (Document, Document) {
        match self {
            TaskView::Active => (doc! {}, doc! { "createdAt": -1 }),
            TaskView::DueDated => (doc! {}, doc! { "dueDate": 1 }),
            TaskView::Reminders => (doc! {}, doc! { "createdAt": -1 }),
            TaskView::Archived => (doc! {}, doc! { "archivedAt": -1 }),
            TaskView::Deleted => (doc! { "deleted": true }, doc! { "deletedAt": -1 }),
            TaskView::ByTag(_) => (doc! {}, doc! { "createdAt": -1 }),
        }
    }
}

/// The assignment relation is stored redundantly (embedded email records and
/// a legacy uid list), so access checks all three encodings.
fn has_access(task: &Task, uid: &str, email: &str) -> bool {
    let is_owner = task.owner_id == uid;
    let assigned_by_id = task
        .assigned_user_ids
        .as_ref()
        .map_or(false, |ids| ids.iter().any(|id| id == uid));
    let assigned_by_email = task.assigned_users.iter().any(|u| u.email == email);
    is_owner || assigned_by_id || assigned_by_email
}

pub fn matches_view(task: &Task, view: &TaskView, uid: &str, email: &str) -> bool {
    match view {
        TaskView::Active => {
            !task.deleted && !task.archived && has_access(task, uid, email)
        }
        TaskView::DueDated => {
            !task.deleted
                && !task.archived
                && task.due_date.is_some()
                && has_access(task, uid, email)
        }
        TaskView::Reminders => {
            !task.deleted && !task.archived && task.reminder && has_access(task, uid, email)
        }
        TaskView::Archived => {
            // Deleted overrides archived: a trashed task never shows here.
            !task.deleted && task.archived && has_access(task, uid, email)
        }
        TaskView::Deleted => task.deleted && has_access(task, uid, email),
        // Tag pages are shared by every tag member; no per-user predicate.
        TaskView::ByTag(name) => {
            !task.deleted && !task.archived && task.tag.as_deref() == Some(name.as_str())
        }
    }
}

pub fn validate_dates(
    start: Option<DateTime<Utc>>,
    due: Option<DateTime<Utc>>,
) -> Result<(), &'static str> {
    if let (Some(start), Some(due)) = (start, due) {
        if due < start {
            return Err("Due date must not be before start date");
        }
    }
    Ok(())
}

pub fn is_expired(task: &Task, now: DateTime<Utc>) -> bool {
    task.deleted
        && task
            .deleted_at
            .map_or(false, |deleted_at| deleted_at < now - Duration::days(TRASH_RETENTION_DAYS))
}

async fn fetch_view(req: HttpRequest, data: web::Data<AppState>, view: TaskView) -> HttpResponse {
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };

    let (filter, sort) = view.query();
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    let mut cursor = match tasks_coll.find(filter).sort(sort).await {
        Ok(cursor) => cursor,
        Err(e) => {
            error!("Error fetching tasks: {}", e);
            return HttpResponse::InternalServerError().body("Error fetching tasks");
        }
    };

    let mut tasks = Vec::new();
    while let Some(result) = cursor.next().await {
        match result {
            Ok(task) => {
                if matches_view(&task, &view, &profile.id, &profile.email) {
                    tasks.push(task);
                }
            }
            Err(e) => {
                error!("Error reading tasks: {}", e);
                return HttpResponse::InternalServerError().body("Error reading tasks");
            }
        }
    }
    HttpResponse::Ok().json(tasks)
}

pub async fn list_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    fetch_view(req, data, TaskView::Active).await
}

pub async fn list_due_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    fetch_view(req, data, TaskView::DueDated).await
}

pub async fn list_reminder_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    fetch_view(req, data, TaskView::Reminders).await
}

pub async fn list_archived_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    fetch_view(req, data, TaskView::Archived).await
}

pub async fn list_deleted_tasks(req: HttpRequest, data: web::Data<AppState>) -> impl Responder {
    fetch_view(req, data, TaskView::Deleted).await
}

pub async fn list_tasks_by_tag(
    req: HttpRequest,
    data: web::Data<AppState>,
    tag: web::Path<String>,
) -> impl Responder {
    fetch_view(req, data, TaskView::ByTag(tag.into_inner())).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub title: String,
    pub content: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub due_date: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub tag: Option<String>,
    #[serde(default)]
    pub assigned_users: Vec<AssignedUser>,
    pub assigned_user_ids: Option<Vec<String>>,
    pub image_url: Option<String>,
    pub location: Option<Location>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_users: Option<Vec<AssignedUser>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_user_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminder: Option<bool>,
}

fn stakeholders(task: &Task) -> Vec<String> {
    let mut targets = vec![task.owner_id.clone()];
    if let Some(ids) = &task.assigned_user_ids {
        targets.extend(ids.iter().cloned());
    }
    targets.extend(task.assigned_users.iter().map(|u| u.email.clone()));
    targets
}

/// POST /tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateTaskRequest>,
) -> impl Responder {
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    if let Err(reason) = validate_dates(payload.start_date, payload.due_date) {
        return HttpResponse::BadRequest().body(reason);
    }

    let payload = payload.into_inner();
    if let Some(tag_name) = payload.tag.as_deref() {
        if !tag_name.is_empty() {
            // First reference to an unknown tag name creates the tag.
            ensure_tag(&data, tag_name, &profile.id).await;
        }
    }

    let now = Utc::now();
    let new_task = Task {
        id: Uuid::new_v4().to_string(),
        title: payload.title,
        content: payload.content,
        start_date: payload.start_date,
        due_date: payload.due_date,
        priority: payload.priority,
        status: payload.status,
        tag: payload.tag,
        owner_id: profile.id.clone(),
        assigned_users: payload.assigned_users,
        assigned_user_ids: payload.assigned_user_ids,
        archived: false,
        deleted: false,
        reminder: false,
        created_at: now,
        updated_at: Some(now),
        archived_at: None,
        deleted_at: None,
        image_url: payload.image_url,
        location: payload.location,
    };

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    match tasks_coll.insert_one(&new_task).await {
        Ok(_) => {
            info!("Task created: {}", new_task.id);
            if !new_task.assigned_users.is_empty() {
                spawn_fan_out(
                    data.clone(),
                    build_notifications(
                        NotificationType::Assignment,
                        &new_task.id,
                        &new_task.title,
                        &profile.email,
                        &profile.display_name,
                        &new_task.assigned_users,
                    ),
                );
            }
            live::publish(
                &data.live,
                stakeholders(&new_task),
                "tasks",
                ChangeOp::Create,
                &new_task.id,
            );
            HttpResponse::Ok().json(&new_task)
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing task create: {}", e);
            match serde_json::to_value(&new_task) {
                Ok(value) => {
                    data.sync.enqueue(SyncItem::create("tasks", value));
                    HttpResponse::Accepted().json(&new_task)
                }
                Err(e) => {
                    error!("Error serializing task for sync: {}", e);
                    HttpResponse::InternalServerError().body("Error queueing task")
                }
            }
        }
        Err(e) => {
            error!("Error inserting task: {}", e);
            HttpResponse::InternalServerError().body("Error inserting task")
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StampedPatch<'a> {
    #[serde(flatten)]
    patch: &'a UpdateTaskRequest,
    updated_at: DateTime<Utc>,
}

/// PUT /tasks/{task_id}
///
/// A patch carrying a non-empty `assignedUsers` re-fires assignment
/// notifications even when the assignee set did not change; there is no diff
/// against the previous document.
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    payload: web::Json<UpdateTaskRequest>,
) -> impl Responder {
    let task_id = task_id.into_inner();
    let profile = match current_user(&req, &data).await {
        Ok(profile) => profile,
        Err(resp) => return resp,
    };
    if let Err(reason) = validate_dates(payload.start_date, payload.due_date) {
        return HttpResponse::BadRequest().body(reason);
    }

    let payload = payload.into_inner();
    let stamped = StampedPatch {
        patch: &payload,
        updated_at: Utc::now(),
    };
    let update_doc = match mongodb::bson::to_document(&stamped) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Error building task patch: {}", e);
            return HttpResponse::InternalServerError().body("Error building task patch");
        }
    };

    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    match tasks_coll
        .update_one(doc! { "_id": &task_id }, doc! { "$set": update_doc })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Task not found"),
        Ok(_) => {
            info!("Task updated: {}", task_id);
            if let Some(assigned_users) = payload.assigned_users.as_ref() {
                if !assigned_users.is_empty() {
                    let title = payload.title.clone().unwrap_or_default();
                    spawn_fan_out(
                        data.clone(),
                        build_notifications(
                            NotificationType::Assignment,
                            &task_id,
                            &title,
                            &profile.email,
                            &profile.display_name,
                            assigned_users,
                        ),
                    );
                }
            }
            live::publish(&data.live, Vec::new(), "tasks", ChangeOp::Update, &task_id);
            HttpResponse::Ok().body("Task updated successfully")
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing task update: {}", e);
            match serde_json::to_value(&stamped) {
                Ok(value) => {
                    data.sync.enqueue(SyncItem::update("tasks", &task_id, value));
                    HttpResponse::Accepted().body("Update queued for sync")
                }
                Err(e) => {
                    error!("Error serializing patch for sync: {}", e);
                    HttpResponse::InternalServerError().body("Error queueing update")
                }
            }
        }
        Err(e) => {
            error!("Error updating task: {}", e);
            HttpResponse::InternalServerError().body("Error updating task")
        }
    }
}

/// Applies a lifecycle patch to one task, falling back to the sync queue on
/// connectivity loss.
async fn patch_task(
    data: &web::Data<AppState>,
    task_id: &str,
    patch: impl Serialize,
    action: &str,
) -> HttpResponse {
    let update_doc = match mongodb::bson::to_document(&patch) {
        Ok(doc) => doc,
        Err(e) => {
            error!("Error building {} patch: {}", action, e);
            return HttpResponse::InternalServerError().body("Error building patch");
        }
    };
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    match tasks_coll
        .update_one(doc! { "_id": task_id }, doc! { "$set": update_doc })
        .await
    {
        Ok(res) if res.matched_count == 0 => HttpResponse::NotFound().body("Task not found"),
        Ok(_) => {
            info!("Task {}: {}", action, task_id);
            live::publish(&data.live, Vec::new(), "tasks", ChangeOp::Update, task_id);
            HttpResponse::Ok().body(format!("Task {} successfully", action))
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing task {}: {}", action, e);
            match serde_json::to_value(&patch) {
                Ok(value) => {
                    data.sync.enqueue(SyncItem::update("tasks", task_id, value));
                    HttpResponse::Accepted().body("Change queued for sync")
                }
                Err(e) => {
                    error!("Error serializing {} patch for sync: {}", action, e);
                    HttpResponse::InternalServerError().body("Error queueing change")
                }
            }
        }
        Err(e) => {
            error!("Error applying {} to task {}: {}", action, task_id, e);
            HttpResponse::InternalServerError().body("Error updating task")
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ArchivePatch {
    archived: bool,
    archived_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TrashPatch {
    deleted: bool,
    deleted_at: Option<DateTime<Utc>>,
    updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReminderPatch {
    reminder: bool,
    updated_at: DateTime<Utc>,
}

/// POST /tasks/{task_id}/archive
pub async fn archive_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let now = Utc::now();
    patch_task(
        &data,
        &task_id,
        ArchivePatch {
            archived: true,
            archived_at: Some(now),
            updated_at: now,
        },
        "archived",
    )
    .await
}

/// POST /tasks/{task_id}/restore
pub async fn restore_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    patch_task(
        &data,
        &task_id,
        ArchivePatch {
            archived: false,
            archived_at: None,
            updated_at: Utc::now(),
        },
        "restored",
    )
    .await
}

/// POST /tasks/{task_id}/trash
pub async fn move_to_trash(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let now = Utc::now();
    patch_task(
        &data,
        &task_id,
        TrashPatch {
            deleted: true,
            deleted_at: Some(now),
            updated_at: now,
        },
        "trashed",
    )
    .await
}

/// POST /tasks/{task_id}/restore_from_trash
pub async fn restore_from_trash(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    patch_task(
        &data,
        &task_id,
        TrashPatch {
            deleted: false,
            deleted_at: None,
            updated_at: Utc::now(),
        },
        "restored from trash",
    )
    .await
}

#[derive(Debug, Deserialize)]
pub struct ReminderRequest {
    pub reminder: bool,
}

/// POST /tasks/{task_id}/reminder
pub async fn toggle_reminder(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
    payload: web::Json<ReminderRequest>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    patch_task(
        &data,
        &task_id,
        ReminderPatch {
            reminder: payload.reminder,
            updated_at: Utc::now(),
        },
        "reminder toggled",
    )
    .await
}

/// DELETE /tasks/{task_id}. Deletes the document permanently.
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    task_id: web::Path<String>,
) -> impl Responder {
    if let Err(resp) = require_uid(&req) {
        return resp;
    }
    let task_id = task_id.into_inner();
    let tasks_coll = data.mongodb.db.collection::<Task>("tasks");
    match tasks_coll.delete_one(doc! { "_id": &task_id }).await {
        Ok(res) if res.deleted_count == 0 => {
            HttpResponse::NotFound().body("Task not found or already deleted")
        }
        Ok(_) => {
            live::publish(&data.live, Vec::new(), "tasks", ChangeOp::Delete, &task_id);
            HttpResponse::Ok().body("Task deleted successfully")
        }
        Err(e) if is_connectivity_error(&e) => {
            warn!("Store unreachable, queueing task delete: {}", e);
            data.sync.enqueue(SyncItem::delete("tasks", &task_id));
            HttpResponse::Accepted().body("Delete queued for sync")
        }
        Err(e) => {
            error!("Error deleting task: {}", e);
            HttpResponse::InternalServerError().body("Error deleting task")
        }
    }
}

/// Trashed tasks whose `deletedAt` passed the retention window.
pub async fn tasks_to_auto_delete(db: &crate::store::MongoDB) -> Result<Vec<Task>, mongodb::error::Error> {
    let tasks_coll = db.db.collection::<Task>("tasks");
    let mut cursor = tasks_coll.find(doc! { "deleted": true }).await?;
    let now = Utc::now();
    let mut expired = Vec::new();
    while let Some(result) = cursor.next().await {
        let task = result?;
        if is_expired(&task, now) {
            expired.push(task);
        }
    }
    Ok(expired)
}

/// Best-effort sweep: each expired task is hard-deleted independently and a
/// failure does not abort the rest of the batch.
pub async fn auto_delete_old_tasks(db: &crate::store::MongoDB) {
    let expired = match tasks_to_auto_delete(db).await {
        Ok(expired) => expired,
        Err(e) => {
            error!("Auto-delete scan failed: {}", e);
            return;
        }
    };
    if expired.is_empty() {
        return;
    }
    let tasks_coll = db.db.collection::<Task>("tasks");
    let mut removed = 0usize;
    for task in &expired {
        match tasks_coll.delete_one(doc! { "_id": &task.id }).await {
            Ok(_) => removed += 1,
            Err(e) => error!("Auto-delete failed for task {}: {}", task.id, e),
        }
    }
    info!("Auto-deleted {} expired task(s)", removed);
}

/// Runs the sweep once at startup and hourly thereafter.
pub async fn run_auto_delete(db: std::sync::Arc<crate::store::MongoDB>) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60 * 60));
    loop {
        ticker.tick().await;
        auto_delete_old_tasks(&db).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_task() -> Task {
        Task {
            id: "t1".to_string(),
            title: "Write report".to_string(),
            content: None,
            start_date: None,
            due_date: None,
            priority: Some(Priority::Medium),
            status: Some(Status::NotStarted),
            tag: Some("work".to_string()),
            owner_id: "owner-1".to_string(),
            assigned_users: vec![AssignedUser {
                email: "a@x.com".to_string(),
                display_name: "Alice".to_string(),
            }],
            assigned_user_ids: Some(vec!["uid-2".to_string()]),
            archived: false,
            deleted: false,
            reminder: false,
            created_at: Utc::now(),
            updated_at: None,
            archived_at: None,
            deleted_at: None,
            image_url: None,
            location: None,
        }
    }

    #[test]
    fn owner_sees_active_task() {
        let task = sample_task();
        assert!(matches_view(&task, &TaskView::Active, "owner-1", "o@x.com"));
    }

    #[test]
    fn access_by_legacy_id_and_by_email_both_work() {
        let task = sample_task();
        assert!(matches_view(&task, &TaskView::Active, "uid-2", "other@x.com"));
        assert!(matches_view(&task, &TaskView::Active, "uid-9", "a@x.com"));
        assert!(!matches_view(&task, &TaskView::Active, "uid-9", "z@x.com"));
    }

    #[test]
    fn archived_task_leaves_the_active_view() {
        let mut task = sample_task();
        task.archived = true;
        task.archived_at = Some(Utc::now());
        assert!(!matches_view(&task, &TaskView::Active, "owner-1", "o@x.com"));
        assert!(matches_view(&task, &TaskView::Archived, "owner-1", "o@x.com"));
    }

    #[test]
    fn restoring_returns_the_task_to_the_active_view() {
        let mut task = sample_task();
        task.archived = true;
        task.archived_at = Some(Utc::now());
        task.archived = false;
        task.archived_at = None;
        assert!(matches_view(&task, &TaskView::Active, "owner-1", "o@x.com"));
        assert!(!matches_view(&task, &TaskView::Archived, "owner-1", "o@x.com"));
    }

    #[test]
    fn deleted_overrides_archived() {
        let mut task = sample_task();
        task.archived = true;
        task.deleted = true;
        assert!(!matches_view(&task, &TaskView::Archived, "owner-1", "o@x.com"));
        assert!(matches_view(&task, &TaskView::Deleted, "owner-1", "o@x.com"));
    }

    #[test]
    fn due_view_requires_a_due_date() {
        let mut task = sample_task();
        assert!(!matches_view(&task, &TaskView::DueDated, "owner-1", "o@x.com"));
        task.due_date = Some(Utc::now());
        assert!(matches_view(&task, &TaskView::DueDated, "owner-1", "o@x.com"));
    }

    #[test]
    fn reminder_view_requires_the_flag() {
        let mut task = sample_task();
        assert!(!matches_view(&task, &TaskView::Reminders, "owner-1", "o@x.com"));
        task.reminder = true;
        assert!(matches_view(&task, &TaskView::Reminders, "owner-1", "o@x.com"));
    }

    #[test]
    fn tag_view_matches_by_name_without_an_access_check() {
        let task = sample_task();
        let view = TaskView::ByTag("work".to_string());
        assert!(matches_view(&task, &view, "anyone", "anyone@x.com"));
        let other = TaskView::ByTag("home".to_string());
        assert!(!matches_view(&task, &other, "owner-1", "o@x.com"));
    }

    #[test]
    fn expiry_cutoff_is_seven_days() {
        let now = Utc::now();
        let mut task = sample_task();
        task.deleted = true;
        task.deleted_at = Some(now - Duration::days(8));
        assert!(is_expired(&task, now));
        task.deleted_at = Some(now - Duration::days(6));
        assert!(!is_expired(&task, now));
    }

    #[test]
    fn undeleted_task_never_expires() {
        let now = Utc::now();
        let mut task = sample_task();
        task.deleted_at = Some(now - Duration::days(30));
        assert!(!is_expired(&task, now));
        task.deleted = true;
        task.deleted_at = None;
        assert!(!is_expired(&task, now));
    }

    #[test]
    fn due_before_start_is_rejected() {
        let start = Utc::now();
        let due = start - Duration::hours(1);
        assert!(validate_dates(Some(start), Some(due)).is_err());
        assert!(validate_dates(Some(start), Some(start)).is_ok());
        assert!(validate_dates(None, Some(due)).is_ok());
        assert!(validate_dates(Some(start), None).is_ok());
    }
}
