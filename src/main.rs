// src/main.rs

mod app_state;
mod auth;
mod config;
mod directory;
mod live;
mod mention;
mod message;
mod models;
mod notification;
mod store;
mod sync;
mod tag;
mod task;
mod user;

use std::env;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix::Actor;
use actix_cors::Cors;
use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http,
    middleware::Logger,
    web, App, Error, HttpMessage, HttpResponse, HttpServer,
};
use env_logger::Env;
use futures::future::{ok, Ready};
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::app_state::AppState;
use crate::auth::{login, signup, Claims};
use crate::live::{ws_index, LiveHub};
use crate::message::{
    delete_message, list_messages, mark_as_read, send_message, update_message,
};
use crate::notification::list_notifications;
use crate::sync::{run_network_monitor, sync_status, NetworkMonitor, SyncQueue};
use crate::tag::{create_tag, delete_tag, list_tags, reorder_tags, tag_assignees};
use crate::task::{
    archive_task, create_task, delete_task, list_archived_tasks, list_deleted_tasks,
    list_due_tasks, list_reminder_tasks, list_tasks, list_tasks_by_tag, move_to_trash,
    restore_from_trash, restore_task, toggle_reminder, update_task,
};
use crate::user::{find_user_email, get_user_by_id};

#[derive(Debug)]
pub struct Authentication;

impl<S, B> Transform<S, ServiceRequest> for Authentication
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Transform = AuthMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(AuthMiddleware { service })
    }
}

pub struct AuthMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for AuthMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>>>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        // Extract "Bearer <token>" from the Authorization header if present
        if let Some(auth_header) = req.headers().get(http::header::AUTHORIZATION) {
            if let Ok(auth_str) = auth_header.to_str() {
                if auth_str.starts_with("Bearer ") {
                    let token = auth_str.trim_start_matches("Bearer ").trim().to_string();
                    match verify_token(&token) {
                        Ok(user_id) => {
                            // Insert user_id as a string extension
                            req.extensions_mut().insert(user_id);
                        }
                        Err(e) => {
                            let (req_parts, _payload) = req.into_parts();
                            let resp = HttpResponse::Unauthorized()
                                .body(format!("Invalid token: {}", e))
                                .map_into_boxed_body();
                            let srv_resp = ServiceResponse::new(req_parts, resp);
                            return Box::pin(async move { Ok(srv_resp) });
                        }
                    }
                }
            }
        }

        let fut = self.service.call(req);
        Box::pin(async move {
            let res = fut.await?;
            Ok(res.map_into_boxed_body())
        })
    }
}

fn verify_token(token: &str) -> Result<String, String> {
    let secret = env::var("JWT_SECRET").unwrap_or_else(|_| "secret".to_string());
    match decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &Validation::default(),
    ) {
        Ok(token_data) => Ok(token_data.claims.sub),
        Err(e) => Err(format!("Token decode error: {}", e)),
    }
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = config::Config::from_env();
    let mongodb = Arc::new(store::MongoDB::init(&config.mongo_uri, &config.database_name).await);
    let sync_queue = Arc::new(SyncQueue::load(&config.sync_queue_path));
    let network = Arc::new(NetworkMonitor::new());
    let assignee_directory = Arc::new(directory::AssigneeDirectory::new());
    let live_hub = LiveHub::new().start();

    actix_web::rt::spawn(run_network_monitor(
        network.clone(),
        mongodb.clone(),
        sync_queue.clone(),
        config.ping_interval_secs,
    ));
    actix_web::rt::spawn(directory::run_directory_refresher(
        assignee_directory.clone(),
        mongodb.clone(),
        config.directory_refresh_secs,
    ));
    actix_web::rt::spawn(task::run_auto_delete(mongodb.clone()));

    let frontend_origin = env::var("FRONTEND_ORIGIN")
        .unwrap_or_else(|_| "http://localhost:3000".to_string());

    println!("Server running at http://0.0.0.0:8080");
    println!("Allowed CORS Origin: {}", frontend_origin);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&frontend_origin)
            .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                http::header::CONTENT_TYPE,
                http::header::ACCEPT,
                http::header::AUTHORIZATION,
            ])
            .supports_credentials()
            .max_age(3600);

        App::new()
            .wrap(Logger::default())
            .wrap(cors)
            .wrap(Authentication)
            .app_data(web::Data::new(AppState {
                mongodb: mongodb.clone(),
                config: config.clone(),
                sync: sync_queue.clone(),
                network: network.clone(),
                directory: assignee_directory.clone(),
                live: live_hub.clone(),
                // awc clients are per-worker; they are not Send.
                http_client: awc::Client::default(),
            }))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
            )
            // TASKS
            .service(
                web::scope("/tasks")
                    .route("", web::get().to(list_tasks))
                    .route("", web::post().to(create_task))
                    .route("/due", web::get().to(list_due_tasks))
                    .route("/reminders", web::get().to(list_reminder_tasks))
                    .route("/archived", web::get().to(list_archived_tasks))
                    .route("/trash", web::get().to(list_deleted_tasks))
                    .route("/by_tag/{tag}", web::get().to(list_tasks_by_tag))
                    .route("/{task_id}", web::put().to(update_task))
                    .route("/{task_id}", web::delete().to(delete_task))
                    .route("/{task_id}/archive", web::post().to(archive_task))
                    .route("/{task_id}/restore", web::post().to(restore_task))
                    .route("/{task_id}/trash", web::post().to(move_to_trash))
                    .route("/{task_id}/restore_from_trash", web::post().to(restore_from_trash))
                    .route("/{task_id}/reminder", web::post().to(toggle_reminder))
            )
            // TAGS
            .service(
                web::scope("/tags")
                    .route("", web::get().to(list_tags))
                    .route("", web::post().to(create_tag))
                    .route("/reorder", web::post().to(reorder_tags))
                    .route("/{tag_id}", web::delete().to(delete_tag))
                    .route("/{tag}/assignees", web::get().to(tag_assignees))
            )
            // MESSAGES
            .service(
                web::scope("/messages")
                    .route("/{tag_id}", web::get().to(list_messages))
                    .route("/{tag_id}", web::post().to(send_message))
                    .route("/{message_id}", web::put().to(update_message))
                    .route("/{message_id}", web::delete().to(delete_message))
                    .route("/{message_id}/read", web::post().to(mark_as_read))
            )
            // NOTIFICATIONS
            .service(
                web::scope("/notifications")
                    .route("", web::get().to(list_notifications))
            )
            // SYNC
            .service(
                web::scope("/sync")
                    .route("/status", web::get().to(sync_status))
            )
            // USERS
            .service(
                web::scope("/users")
                    .route("/find_user_email", web::get().to(find_user_email))
                    .route("/get/{id}", web::get().to(get_user_by_id))
            )
            // WEBSOCKET route for real-time
            .service(
                web::resource("/ws").route(web::get().to(ws_index))
            )
    })
        .bind("0.0.0.0:8080")?
        .run()
        .await
}
