use std::sync::Arc;

use crate::config::AppConfig;
use crate::render::Renderer;
use crate::store::ProductStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ProductStore>,
    pub renderer: Arc<dyn Renderer>,
    pub config: Arc<AppConfig>,
}
