use crate::config::Config;
use crate::directory::AssigneeDirectory;
use crate::live::LiveHub;
use crate::store::MongoDB;
use crate::sync::{NetworkMonitor, SyncQueue};
use actix::Addr;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub mongodb: Arc<MongoDB>,
    pub config: Config,
    pub sync: Arc<SyncQueue>,
    pub network: Arc<NetworkMonitor>,
    pub directory: Arc<AssigneeDirectory>,
    pub live: Addr<LiveHub>,
    pub http_client: awc::Client,
}
