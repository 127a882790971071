use std::{fmt, sync::Arc};

use teller_config::Config;
use teller_core::auth::{AuthenticationService, TokenRevocationList};
use teller_core::dashboard::DashboardService;
use teller_core::users::UserService;

#[derive(Clone)]
pub struct AppState {
    pub auth_service: Arc<AuthenticationService>,
    pub user_service: UserService,
    pub dashboard_service: DashboardService,
    pub revocations: TokenRevocationList,
    pub config: Arc<Config>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    pub fn auth(&self) -> &AuthenticationService {
        &self.auth_service
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
