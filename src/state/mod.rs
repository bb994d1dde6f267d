//! Shared application state and the session-scoped domain logic.

pub mod clock;
pub mod orders;
pub mod session;
pub mod state_machine;
pub mod tokens;

use std::sync::Arc;

use tracing::{debug, error};

use crate::{
    config::AppConfig,
    dao::{models::SessionDocument, session_store::SessionStore, storage::LoadError},
    error::ServiceError,
};

use self::{
    clock::{Clock, PhaseClock, SystemClock},
    orders::OrderLedger,
    state_machine::PhaseStateMachine,
    tokens::TokenAuthority,
};

pub type SharedState = Arc<AppState>;

/// Central application state: configuration, the session store and the
/// components operating on loaded documents.
///
/// No session data is cached here; every request loads the document, applies
/// its change and saves it back.
pub struct AppState {
    config: Arc<AppConfig>,
    store: Arc<dyn SessionStore>,
    clock: PhaseClock,
    machine: PhaseStateMachine,
    tokens: TokenAuthority,
    ledger: OrderLedger,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, store: Arc<dyn SessionStore>) -> SharedState {
        Self::with_clock(config, store, Arc::new(SystemClock))
    }

    /// Same as [`AppState::new`] with an explicit time source.
    pub fn with_clock(
        config: AppConfig,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> SharedState {
        let phase_clock = PhaseClock::new(clock.clone());
        Arc::new(Self {
            machine: PhaseStateMachine::new(config.max_round, phase_clock.clone()),
            tokens: TokenAuthority::new(clock),
            ledger: OrderLedger::new(phase_clock.clone()),
            clock: phase_clock,
            config: Arc::new(config),
            store,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn clock(&self) -> &PhaseClock {
        &self.clock
    }

    pub fn machine(&self) -> &PhaseStateMachine {
        &self.machine
    }

    pub fn tokens(&self) -> &TokenAuthority {
        &self.tokens
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Load a session; corrupt documents are reported like missing ones.
    pub async fn load_session(&self, id: &str) -> Result<SessionDocument, ServiceError> {
        match self.store.load(id).await {
            Ok(mut doc) => {
                self.conform(&mut doc);
                Ok(doc)
            }
            Err(LoadError::NotFound(_)) => {
                debug!(session_id = %id, "session not found");
                Err(ServiceError::NotFound(format!("session `{id}`")))
            }
            Err(err @ LoadError::Corrupt { .. }) => {
                error!(session_id = %id, error = %err, "session unreadable; reporting as missing");
                Err(ServiceError::NotFound(format!("session `{id}`")))
            }
        }
    }

    /// Apply the configured round limit and base points to a loaded document.
    pub fn conform(&self, doc: &mut SessionDocument) {
        doc.conform(self.config.max_round, |team| self.config.base_points_for(team));
    }

    /// Bump the revision counter and write the document back.
    pub async fn persist(&self, doc: &mut SessionDocument) -> Result<(), ServiceError> {
        doc.revision += 1;
        self.store.save(&doc.id, doc).await?;
        Ok(())
    }

    /// Load, mutate and save a session in one step.
    ///
    /// Nothing is written when `mutate` fails. Two concurrent updates of the
    /// same session race and the last save wins.
    pub async fn update_session<F, T>(
        &self,
        id: &str,
        mutate: F,
    ) -> Result<(SessionDocument, T), ServiceError>
    where
        F: FnOnce(&mut SessionDocument) -> Result<T, ServiceError>,
    {
        let mut doc = self.load_session(id).await?;
        let value = mutate(&mut doc)?;
        self.persist(&mut doc).await?;
        Ok((doc, value))
    }
}
