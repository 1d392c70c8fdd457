//! Session lifecycle: login, silent restore, timed renewal and teardown.
//!
//! `SessionManager` is a cheap-to-clone handle around one shared session.
//! State sits behind a synchronous mutex that is never held across an
//! await; every async result is checked against the session generation
//! before it is applied, so a logout can never be undone by a response that
//! was already in flight.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use super::session::Session;
use super::timer::RenewalTimer;
use super::{
    AuthBackend, AuthFailure, LoginCredentials, RenewalPolicy, SessionEvent, SessionState,
    SessionStatus, TokenGrant,
};
use crate::api::HttpBackend;
use crate::config::Config;

/// Buffer size for the session event channel.
/// Events are rare (a handful per renewal interval); slow subscribers lag rather than block.
const EVENT_CHANNEL_CAPACITY: usize = 16;

#[derive(Default)]
struct State {
    phase: SessionState,
    session: Option<Session>,
    /// Bumped on every new session and every teardown
    generation: u64,
    timer: Option<RenewalTimer>,
    next_timer_id: u64,
    /// Logins and restores still waiting on the backend
    pending_attempts: u32,
}

#[derive(Debug, Clone, Copy)]
enum Teardown {
    Expired,
    LoggedOut,
    Shutdown,
}

struct Inner {
    backend: Arc<dyn AuthBackend>,
    policy: RenewalPolicy,
    state: Mutex<State>,
    /// Serializes renewals
    renew_gate: AsyncMutex<()>,
    events: broadcast::Sender<SessionEvent>,
}

impl Inner {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        // State stays consistent across a panicking holder; every mutation is a plain assignment
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SessionEvent) {
        // No subscribers is fine
        if self.events.send(event).is_err() {
            debug!("No session event subscribers");
        }
    }

    /// Clear the session and cancel renewal. Only the first teardown of a
    /// session emits an event; later calls just re-clear.
    fn teardown(&self, state: &mut State, reason: Teardown) -> bool {
        if let Some(mut timer) = state.timer.take() {
            timer.cancel();
        }
        state.generation += 1;
        state.phase = SessionState::Unauthenticated;

        let had_session = state.session.take().is_some();
        if had_session {
            match reason {
                Teardown::Expired => {
                    info!(generation = state.generation, "Session expired");
                    self.emit(SessionEvent::Expired);
                }
                Teardown::LoggedOut => {
                    info!(generation = state.generation, "Logged out");
                    self.emit(SessionEvent::LoggedOut);
                }
                Teardown::Shutdown => {
                    debug!(generation = state.generation, "Session released on shutdown");
                }
            }
        }
        had_session
    }

    /// Tear down a session whose token ran out without being renewed.
    /// A renewal in flight gets to decide the outcome instead.
    fn expire_if_stale(&self, state: &mut State) {
        let expired = state.session.as_ref().is_some_and(Session::is_expired);
        if expired && state.phase != SessionState::Renewing {
            warn!("Access token expired before it could be renewed");
            self.teardown(state, Teardown::Expired);
        }
    }

    fn begin_attempt(&self, state: &mut State) -> Attempt<'_> {
        state.pending_attempts += 1;
        if state.session.is_none() {
            state.phase = SessionState::Authenticating;
        }
        Attempt { inner: self }
    }

    /// The last outstanding attempt to finish without a session drops back
    /// to Unauthenticated.
    fn finish_attempt(&self, state: &mut State) {
        state.pending_attempts = state.pending_attempts.saturating_sub(1);
        if state.pending_attempts == 0
            && state.phase == SessionState::Authenticating
            && state.session.is_none()
        {
            state.phase = SessionState::Unauthenticated;
        }
    }
}

/// A login or restore waiting on the backend. Dropping it, including when
/// the caller's future is cancelled, releases the Authenticating phase.
struct Attempt<'a> {
    inner: &'a Inner,
}

impl Drop for Attempt<'_> {
    fn drop(&mut self) {
        let mut state = self.inner.lock_state();
        self.inner.finish_attempt(&mut state);
    }
}

/// Owns the client's single authentication session.
///
/// Construct one per client and hand clones to whatever needs the token.
/// Dropping the last clone (or calling [`SessionManager::shutdown`]) releases
/// the renewal timer.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<Inner>,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn AuthBackend>, policy: RenewalPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                backend,
                policy,
                state: Mutex::new(State::default()),
                renew_gate: AsyncMutex::new(()),
                events,
            }),
        }
    }

    /// Build a manager talking to the HTTP backend described by `config`
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = HttpBackend::new(config)?;
        Ok(Self::new(Arc::new(backend), config.renewal_policy()))
    }

    /// Receive session transitions from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Try to recover a session at startup using the renewal credential.
    ///
    /// Best effort: any failure leaves the session empty and returns `false`.
    pub async fn restore(&self) -> bool {
        let (generation, _attempt) = {
            let mut state = self.inner.lock_state();
            self.inner.expire_if_stale(&mut state);
            if state.session.is_some() {
                return true;
            }
            let attempt = self.inner.begin_attempt(&mut state);
            (state.generation, attempt)
        };

        let outcome = self.inner.backend.refresh().await;

        let mut state = self.inner.lock_state();
        if state.generation != generation {
            debug!("Discarding restore result, session changed while in flight");
            return state.session.is_some();
        }
        match outcome {
            Ok(grant) => {
                self.establish(&mut state, grant);
                info!("Session restored");
                true
            }
            Err(err) => {
                debug!(error = %err, "No session to restore");
                false
            }
        }
    }

    /// Log in with the given credentials and return the new access token.
    ///
    /// Failures are reported to the caller, never retried, and leave any
    /// existing session untouched. A grant that arrives after a logout is
    /// dropped and reported as `SessionExpired`.
    pub async fn login(&self, credentials: &LoginCredentials) -> Result<String, AuthFailure> {
        credentials.validate()?;

        let (generation, _attempt) = {
            let mut state = self.inner.lock_state();
            let attempt = self.inner.begin_attempt(&mut state);
            (state.generation, attempt)
        };
        info!(identifier = %credentials.identifier, "Logging in");

        let outcome = self.inner.backend.login(credentials).await;

        // Declared after `_attempt`, so released before it
        let mut state = self.inner.lock_state();
        match outcome {
            // Torn down while in flight; a newer session is still replaced
            Ok(_) if state.generation != generation && state.session.is_none() => {
                debug!(generation, current = state.generation, "Discarding login result after logout");
                Err(AuthFailure::SessionExpired)
            }
            Ok(grant) => Ok(self.establish(&mut state, grant)),
            Err(err) => {
                let failure = AuthFailure::from_login_error(err);
                warn!(error = %failure, "Login failed");
                Err(failure)
            }
        }
    }

    /// Exchange the renewal credential for a fresh access token.
    ///
    /// Runs from the renewal timer, or manually. A failed renewal ends the
    /// session immediately; there is no retry.
    pub async fn renew(&self) -> Result<(), AuthFailure> {
        let _gate = self.inner.renew_gate.lock().await;

        let generation = {
            let mut state = self.inner.lock_state();
            if state.session.is_none() {
                return Err(AuthFailure::SessionExpired);
            }
            state.phase = SessionState::Renewing;
            state.generation
        };

        let outcome = self.inner.backend.refresh().await;

        let mut state = self.inner.lock_state();
        if state.generation != generation {
            debug!(
                generation,
                current = state.generation,
                "Discarding stale renewal result"
            );
            return match state.session {
                Some(_) => Ok(()),
                None => Err(AuthFailure::SessionExpired),
            };
        }

        match outcome {
            Ok(grant) => {
                let Some(session) = state.session.as_mut() else {
                    return Err(AuthFailure::SessionExpired);
                };
                session.replace_token(grant, self.inner.policy.default_token_lifetime);
                let expires_at = session.expires_at();
                let lifetime = session.lifetime();

                state.phase = SessionState::Authenticated;
                self.schedule_renewal(&mut state, lifetime);
                info!(%expires_at, "Session renewed");
                self.inner.emit(SessionEvent::Renewed { expires_at });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Session renewal failed, logging out");
                self.inner.teardown(&mut state, Teardown::Expired);
                Err(AuthFailure::SessionExpired)
            }
        }
    }

    /// End the session.
    ///
    /// Local state is cleared before anything is awaited; the backend is then
    /// told to drop the renewal credential, and any failure there is ignored.
    pub async fn logout(&self) {
        let token = {
            let mut state = self.inner.lock_state();
            let token = state.session.as_ref().map(|s| s.token().to_string());
            self.inner.teardown(&mut state, Teardown::LoggedOut);
            token
        };

        if let Err(err) = self.inner.backend.logout(token.as_deref()).await {
            warn!(error = %err, "Backend logout failed; local session already cleared");
        }
    }

    /// Tear the session down after an authenticated call was rejected with 401.
    ///
    /// Returns whether a session was actually cleared.
    pub fn expire_session(&self) -> bool {
        let mut state = self.inner.lock_state();
        self.inner.teardown(&mut state, Teardown::Expired)
    }

    /// Like [`SessionManager::expire_session`], but only if `token` is still
    /// the current one. A 401 answering a request sent before a renewal or a
    /// new login says nothing about the session that replaced it.
    pub fn expire_session_for(&self, token: &str) -> bool {
        let mut state = self.inner.lock_state();
        let current = state.session.as_ref().is_some_and(|s| s.token() == token);
        if !current {
            debug!("Ignoring rejection of a token that was already replaced");
            return false;
        }
        self.inner.teardown(&mut state, Teardown::Expired)
    }

    /// Release the renewal timer and forget the session without contacting
    /// the backend. For when the owning context goes away.
    pub fn shutdown(&self) {
        let mut state = self.inner.lock_state();
        self.inner.teardown(&mut state, Teardown::Shutdown);
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn state(&self) -> SessionState {
        let mut state = self.inner.lock_state();
        self.inner.expire_if_stale(&mut state);
        state.phase
    }

    /// True iff a token is held and has not reached its expiry
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// The current bearer token, if it is still valid
    pub fn access_token(&self) -> Option<String> {
        let mut state = self.inner.lock_state();
        self.inner.expire_if_stale(&mut state);
        state
            .session
            .as_ref()
            .filter(|s| !s.is_expired())
            .map(|s| s.token().to_string())
    }

    pub fn status(&self) -> SessionStatus {
        let mut state = self.inner.lock_state();
        self.inner.expire_if_stale(&mut state);
        let session = state.session.as_ref();
        SessionStatus {
            state: state.phase,
            is_authenticated: session.is_some_and(|s| !s.is_expired()),
            expires_at: session.map(Session::expires_at),
            renewal_in: state
                .timer
                .as_ref()
                .filter(|t| t.is_armed())
                .map(|t| t.remaining().as_secs()),
        }
    }

    /// Time until the armed renewal fires
    pub fn scheduled_renewal(&self) -> Option<Duration> {
        let state = self.inner.lock_state();
        state
            .timer
            .as_ref()
            .filter(|t| t.is_armed())
            .map(RenewalTimer::remaining)
    }

    pub fn has_pending_renewal(&self) -> bool {
        self.scheduled_renewal().is_some()
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Install a new session from a grant and arm its renewal. Returns the token.
    fn establish(&self, state: &mut State, grant: TokenGrant) -> String {
        state.generation += 1;
        let session = Session::from_grant(grant, self.inner.policy.default_token_lifetime);
        let token = session.token().to_string();
        let expires_at = session.expires_at();
        let lifetime = session.lifetime();

        state.session = Some(session);
        state.phase = SessionState::Authenticated;
        self.schedule_renewal(state, lifetime);

        info!(%expires_at, generation = state.generation, "Session authenticated");
        self.inner.emit(SessionEvent::Authenticated { expires_at });
        token
    }

    /// Arm the one renewal timer for the current session, replacing any other.
    fn schedule_renewal(&self, state: &mut State, lifetime: Duration) {
        if let Some(mut previous) = state.timer.take() {
            previous.cancel();
        }

        let delay = self.inner.policy.delay_for(lifetime);
        state.next_timer_id += 1;
        let timer_id = state.next_timer_id;
        let generation = state.generation;
        // Weak: the timer lives inside the state it would otherwise keep alive
        let weak = Arc::downgrade(&self.inner);

        let timer = RenewalTimer::arm(timer_id, delay, async move {
            if let Some(inner) = weak.upgrade() {
                SessionManager { inner }
                    .on_timer_fired(generation, timer_id)
                    .await;
            }
        });
        debug!(
            delay_secs = timer.delay().as_secs(),
            timer_id, "Renewal scheduled"
        );
        state.timer = Some(timer);
    }

    async fn on_timer_fired(&self, generation: u64, timer_id: u64) {
        {
            let mut state = self.inner.lock_state();
            let current = state.timer.as_ref().map(RenewalTimer::id);
            if state.generation != generation || current != Some(timer_id) {
                debug!(timer_id, "Ignoring superseded renewal timer");
                return;
            }
            if let Some(timer) = state.timer.take() {
                timer.detach();
            }
        }

        if let Err(failure) = self.renew().await {
            debug!(error = %failure, "Scheduled renewal ended the session");
        }
    }
}
