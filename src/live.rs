// src/live.rs
//
// Store change-notification channel. Successful writes publish a small
// {collection, op, id} event; connected clients re-fetch their projections
// on receipt. Sessions register on start and deregister on stop, so a torn
// down view stops receiving events.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use actix::prelude::*;
use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_web_actors::ws;
use log::{info, warn};
use mongodb::bson::doc;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::auth::validate_jwt;
use crate::models::UserProfile;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

#[derive(Message, Clone, Serialize)]
#[rtype(result = "()")]
pub struct ChangeEvent {
    pub collection: String,
    pub op: ChangeOp,
    pub id: String,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Connect {
    /// Session keys: the uid plus, when known, the profile email, so events
    /// addressed either way reach the same connection.
    pub keys: Vec<String>,
    pub addr: Recipient<ChangeEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub keys: Vec<String>,
    pub addr: Recipient<ChangeEvent>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish {
    /// Empty targets means broadcast to every session.
    pub targets: Vec<String>,
    pub event: ChangeEvent,
}

pub struct LiveHub {
    sessions: HashMap<String, Vec<Recipient<ChangeEvent>>>,
}

impl LiveHub {
    pub fn new() -> Self {
        LiveHub {
            sessions: HashMap::new(),
        }
    }
}

impl Actor for LiveHub {
    type Context = Context<Self>;
}

impl Handler<Connect> for LiveHub {
    type Result = ();

    fn handle(&mut self, msg: Connect, _: &mut Context<Self>) {
        info!("Live session connected for {:?}", msg.keys);
        for key in msg.keys {
            self.sessions
                .entry(key)
                .or_default()
                .push(msg.addr.clone());
        }
    }
}

impl Handler<Disconnect> for LiveHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Context<Self>) {
        info!("Live session disconnected for {:?}", msg.keys);
        for key in &msg.keys {
            if let Some(addrs) = self.sessions.get_mut(key) {
                addrs.retain(|a| a != &msg.addr);
                if addrs.is_empty() {
                    self.sessions.remove(key);
                }
            }
        }
    }
}

impl Handler<Publish> for LiveHub {
    type Result = ();

    fn handle(&mut self, msg: Publish, _: &mut Context<Self>) {
        let mut delivered: Vec<&Recipient<ChangeEvent>> = Vec::new();
        let recipients = if msg.targets.is_empty() {
            self.sessions.values().flatten().collect::<Vec<_>>()
        } else {
            msg.targets
                .iter()
                .filter_map(|key| self.sessions.get(key))
                .flatten()
                .collect::<Vec<_>>()
        };
        for addr in recipients {
            // A session registered under both uid and email gets one copy.
            if delivered.contains(&addr) {
                continue;
            }
            delivered.push(addr);
            addr.do_send(msg.event.clone());
        }
    }
}

/// Convenience wrapper used by the write paths.
pub fn publish(hub: &Addr<LiveHub>, targets: Vec<String>, collection: &str, op: ChangeOp, id: &str) {
    hub.do_send(Publish {
        targets,
        event: ChangeEvent {
            collection: collection.to_string(),
            op,
            id: id.to_string(),
        },
    });
}

const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct WsSession {
    pub keys: Vec<String>,
    pub hb: Instant,
    pub hub: Addr<LiveHub>,
}

impl Actor for WsSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
        self.hub.do_send(Connect {
            keys: self.keys.clone(),
            addr: ctx.address().recipient(),
        });
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        self.hub.do_send(Disconnect {
            keys: self.keys.clone(),
            addr: ctx.address().recipient(),
        });
    }
}

impl WsSession {
    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                warn!("Live session heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            // This channel is push-only; client text is ignored.
            Ok(ws::Message::Text(_)) => {}
            Ok(ws::Message::Close(_)) => {
                ctx.stop();
            }
            Err(e) => {
                warn!("Live session error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}

impl Handler<ChangeEvent> for WsSession {
    type Result = ();

    fn handle(&mut self, msg: ChangeEvent, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.text(serde_json::to_string(&msg).unwrap_or_default());
    }
}

#[derive(Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// GET /ws?token=<jwt>
pub async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
    query: web::Query<WsQuery>,
) -> Result<HttpResponse, Error> {
    let claims = match validate_jwt(&query.token, &data.config.jwt_secret) {
        Ok(claims) => claims,
        Err(_) => return Ok(HttpResponse::Unauthorized().body("Invalid token")),
    };
    let mut keys = vec![claims.sub.clone()];
    let users = data.mongodb.db.collection::<UserProfile>("users");
    if let Ok(Some(profile)) = users.find_one(doc! { "_id": &claims.sub }).await {
        keys.push(profile.email);
    }
    ws::start(
        WsSession {
            keys,
            hb: Instant::now(),
            hub: data.live.clone(),
        },
        &req,
        stream,
    )
}
