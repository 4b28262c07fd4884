use crate::adapters::{FileStore, SystemTimeProvider};
use crate::auth::AuthState;
use crate::config::AppConfig;
use crate::library::Library;

use std::sync::{Arc, Mutex};

pub(crate) type SharedLibrary = Arc<Mutex<Library<FileStore, SystemTimeProvider>>>;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub(crate) auth: AuthState,
    pub(crate) library: SharedLibrary,
}
