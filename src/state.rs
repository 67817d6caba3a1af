//! Shared application state wiring the subsystems together.

use std::sync::Arc;

use emg_auth::{oauth::OAuthEngine, AuditLog, AuthGate, SessionTokens};
use emg_mcp::{Dispatcher, RegistryError, ToolRegistry};
use erp_client::ErpClient;

use crate::config::{AppConfig, ServiceAccount};

#[derive(Clone)]
pub struct AppState {
    pub gate: Arc<AuthGate>,
    pub oauth: Arc<OAuthEngine>,
    pub sessions: Arc<SessionTokens>,
    pub registry: Arc<ToolRegistry>,
    pub dispatcher: Arc<Dispatcher>,
    pub erp: Arc<dyn ErpClient>,
    pub service_account: Arc<ServiceAccount>,
}

impl AppState {
    /// Builds the state graph around an injected ERP client, so tests can
    /// substitute a fake collaborator.
    pub fn new(config: &AppConfig, erp: Arc<dyn ErpClient>) -> Result<Self, RegistryError> {
        let registry = Arc::new(ToolRegistry::builtin()?);
        let sessions = Arc::new(SessionTokens::new(
            &config.auth.session_secret,
            config.auth.session_ttl,
        ));
        let oauth = Arc::new(OAuthEngine::new(config.oauth.clone()));
        let audit = Arc::new(AuditLog::new());
        let gate = Arc::new(AuthGate::standard(
            config.auth.api_keys.clone(),
            sessions.clone(),
            oauth.clone(),
            audit,
        ));
        let dispatcher = Arc::new(Dispatcher::new(registry.clone(), erp.clone()));

        Ok(Self {
            gate,
            oauth,
            sessions,
            registry,
            dispatcher,
            erp,
            service_account: Arc::new(config.service_account.clone()),
        })
    }
}
