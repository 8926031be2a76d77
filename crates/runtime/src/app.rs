//! The application context.
//!
//! [`Application`] wires the session, the remote client, the feature slices
//! and the live channel together. It owns the bootstrap gate: until
//! [`Application::bootstrap`] has finished every route renders as
//! [`View::Loading`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use pantry_api::{ApiClient, Kitchen, RegisterRequest, Role, User};
use pantry_config::ClientConfig;
use pantry_live::{Connector, EventSender, LiveChannel, LiveEvent, WebSocketConnector};
use pantry_session::{
    dashboard_for, evaluate, FileStorage, GuardOutcome, History, Navigator, Route, Session,
    SessionManager, SessionResult, SessionState, Storage,
};
use reqwest::Url;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::pantry::{Pantry, PantryResult};

/// What the client shows for a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Bootstrap has not finished.
    Loading,
    Page(Route),
    Redirect(Route),
}

/// Socket endpoint of the broker: the explicit override, or the API origin
/// with a `ws`/`wss` scheme and the configured endpoint path.
pub fn socket_url(config: &ClientConfig) -> Result<String> {
    if let Some(url) = config.live.url.as_deref().filter(|url| !url.trim().is_empty()) {
        return Ok(url.trim().to_string());
    }

    let mut url = Url::parse(&config.api.base_url)
        .with_context(|| format!("invalid api base url {}", config.api.base_url))?;
    let scheme = match url.scheme() {
        "http" => "ws",
        "https" => "wss",
        other => return Err(anyhow!("cannot derive a socket url from scheme {other}")),
    };
    url.set_scheme(scheme)
        .map_err(|_| anyhow!("cannot switch {} to {scheme}", config.api.base_url))?;
    url.set_path(&config.live.endpoint_path);
    url.set_query(None);
    url.set_fragment(None);
    Ok(url.to_string())
}

/// Live channel bookkeeping for the user it was opened for.
#[derive(Default)]
struct Listener {
    user_id: Option<i64>,
    events: Option<EventSender>,
    task: Option<JoinHandle<()>>,
    watcher: Option<JoinHandle<()>>,
}

/// Who is shutting the live channel down. Neither task aborts itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stopper {
    Caller,
    Listener,
    Watcher(i64),
}

struct Inner {
    config: ClientConfig,
    state: Arc<SessionState>,
    sessions: SessionManager,
    api: ApiClient,
    pantry: Pantry,
    live: LiveChannel,
    listener: Mutex<Listener>,
    initialized: watch::Sender<bool>,
    events: broadcast::Sender<LiveEvent>,
}

#[derive(Clone)]
pub struct Application {
    inner: Arc<Inner>,
}

impl Application {
    /// Production wiring: file-backed storage, a recording navigator and a
    /// WebSocket broker connection.
    pub fn initialise(config: &ClientConfig) -> Result<Self> {
        let storage = Arc::new(FileStorage::new(&config.storage.path));
        let url = socket_url(config)?;
        let connector = WebSocketConnector::new(url.clone())
            .with_context(|| format!("invalid socket url {url}"))?;
        Self::assemble(config, storage, Arc::new(History::new()), Arc::new(connector))
    }

    pub fn assemble(
        config: &ClientConfig,
        storage: Arc<dyn Storage>,
        navigator: Arc<dyn Navigator>,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let state = Arc::new(SessionState::new(storage, navigator));
        let api = ApiClient::new(&config.api, &config.session, state.clone())
            .context("failed to build api client")?;
        let sessions = SessionManager::new(state.clone(), Arc::new(api.clone()));
        let pantry = Pantry::new(api.clone(), state.clone());
        let live = LiveChannel::new(
            connector,
            Duration::from_secs(config.live.connect_timeout_seconds),
        );
        let (events, _) = broadcast::channel(64);

        Ok(Self {
            inner: Arc::new(Inner {
                config: config.clone(),
                state,
                sessions,
                api,
                pantry,
                live,
                listener: Mutex::new(Listener::default()),
                initialized: watch::channel(false).0,
                events,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn state(&self) -> &Arc<SessionState> {
        &self.inner.state
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.inner.sessions
    }

    pub fn api(&self) -> &ApiClient {
        &self.inner.api
    }

    pub fn pantry(&self) -> &Pantry {
        &self.inner.pantry
    }

    pub fn live(&self) -> &LiveChannel {
        &self.inner.live
    }

    pub fn snapshot(&self) -> Session {
        self.inner.state.snapshot()
    }

    pub fn is_initialized(&self) -> bool {
        *self.inner.initialized.borrow()
    }

    pub fn watch_initialized(&self) -> watch::Receiver<bool> {
        self.inner.initialized.subscribe()
    }

    /// Live events after the context has acted on them.
    pub fn live_events(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.events.subscribe()
    }

    /// Restore the persisted session, confirm it with the backend when
    /// configured to, and open the render gate. Validation failures never
    /// fail the bootstrap.
    pub async fn bootstrap(&self) -> Session {
        let restored = self.inner.sessions.initialize();
        if restored && self.inner.config.session.validate_on_startup {
            let outcome = self.inner.sessions.validate_against_server().await;
            debug!(?outcome, "startup validation finished");
        }

        self.inner.initialized.send_replace(true);
        let session = self.snapshot();
        info!(
            authenticated = session.is_authenticated,
            user_id = session.user_id(),
            "client initialized"
        );
        session
    }

    pub fn render(&self, route: Route) -> View {
        if !self.is_initialized() {
            return View::Loading;
        }
        match evaluate(route, &self.snapshot()) {
            GuardOutcome::Render => View::Page(route),
            GuardOutcome::Redirect(target) => View::Redirect(target),
        }
    }

    /// Render `route` and navigate to whatever it resolved to.
    pub fn visit(&self, route: Route) -> View {
        let view = self.render(route);
        match view {
            View::Page(target) | View::Redirect(target) => self.inner.state.navigate(target),
            View::Loading => {}
        }
        view
    }

    pub async fn login(&self, email: &str, password: &str) -> SessionResult<User> {
        let user = self.inner.sessions.login(email, password).await?;
        self.signed_in().await;
        Ok(user)
    }

    pub async fn register(&self, request: &RegisterRequest) -> SessionResult<User> {
        let user = self.inner.sessions.register(request).await?;
        self.signed_in().await;
        Ok(user)
    }

    async fn signed_in(&self) {
        self.inner.pantry.reset();
        self.start_live_updates().await;
        self.inner.state.navigate(dashboard_for(&self.snapshot()));
    }

    pub async fn logout(&self) {
        self.stop_live_updates().await;
        self.inner.sessions.logout().await;
        self.inner.pantry.reset();
        self.inner.state.navigate(Route::Login);
    }

    /// Open the live channel for the signed-in user and follow their
    /// kitchen. Returns false when there is nobody to connect for.
    ///
    /// A channel still open for another user is closed first. The channel
    /// closes by itself once this user's session ends.
    pub async fn start_live_updates(&self) -> bool {
        let session = self.snapshot();
        let user_id = match session.user_id() {
            Some(user_id) if session.is_authenticated => user_id,
            _ => {
                debug!("no signed-in user, live updates stay off");
                return false;
            }
        };

        let mut listener = self.inner.listener.lock().await;
        if let Some(owner) = listener.user_id.filter(|owner| *owner != user_id) {
            info!(owner, user_id, "live channel belongs to another user, reopening");
            self.shutdown_locked(&mut listener, Stopper::Caller).await;
        }

        let events = match &listener.events {
            Some(events) => events.clone(),
            None => {
                let (events, receiver) = mpsc::unbounded_channel();
                listener.task = Some(tokio::spawn(self.clone().listen(receiver)));
                listener.events = Some(events.clone());
                events
            }
        };
        if listener.watcher.is_none() {
            listener.watcher = Some(tokio::spawn(self.clone().follow_session(user_id)));
        }
        listener.user_id = Some(user_id);

        self.inner.live.connect(user_id, events.clone()).await;
        if let Some(kitchen_id) = session.kitchen_id() {
            self.inner.live.subscribe_to_kitchen(kitchen_id, events).await;
        }
        true
    }

    pub async fn stop_live_updates(&self) {
        self.shutdown_live(Stopper::Caller).await;
    }

    async fn shutdown_live(&self, stopper: Stopper) {
        let mut listener = self.inner.listener.lock().await;
        if let Stopper::Watcher(user_id) = stopper {
            if listener.user_id != Some(user_id) {
                return;
            }
        }
        self.shutdown_locked(&mut listener, stopper).await;
    }

    /// Disconnect and drop the event listener and the session watcher. The
    /// listener lock is held throughout so a concurrent start cannot
    /// interleave with the disconnect.
    async fn shutdown_locked(&self, listener: &mut Listener, stopper: Stopper) {
        listener.user_id = None;
        listener.events = None;
        let task = listener.task.take();
        let watcher = listener.watcher.take();

        self.inner.live.disconnect().await;
        if let (false, Some(task)) = (stopper == Stopper::Listener, task) {
            task.abort();
        }
        if let (false, Some(watcher)) = (matches!(stopper, Stopper::Watcher(_)), watcher) {
            watcher.abort();
        }
    }

    /// Close the live channel once `user_id` is no longer the signed-in user,
    /// whether by rejection, expiry or a different login.
    async fn follow_session(self, user_id: i64) {
        let mut updates = self.inner.state.subscribe();
        loop {
            let active = {
                let session = updates.borrow_and_update();
                session.is_authenticated && session.user_id() == Some(user_id)
            };
            if !active {
                break;
            }
            if updates.changed().await.is_err() {
                return;
            }
        }
        info!(user_id, "session ended, closing live updates");
        self.shutdown_live(Stopper::Watcher(user_id)).await;
    }

    /// Create a kitchen; the creator becomes its admin.
    pub async fn create_kitchen(&self, name: &str) -> PantryResult<Kitchen> {
        let kitchen = self.inner.api.create_kitchen(name).await?;
        info!(kitchen_id = kitchen.id, "kitchen created");
        self.enter_kitchen(&kitchen, Role::Admin).await?;
        Ok(kitchen)
    }

    /// Join a kitchen by invitation code as a member.
    pub async fn join_kitchen(&self, invitation_code: &str) -> PantryResult<Kitchen> {
        let kitchen = self.inner.api.join_kitchen(invitation_code).await?;
        info!(kitchen_id = kitchen.id, "joined kitchen");
        self.enter_kitchen(&kitchen, Role::Member).await?;
        Ok(kitchen)
    }

    async fn enter_kitchen(&self, kitchen: &Kitchen, role: Role) -> PantryResult<()> {
        let previous = self.snapshot().kitchen_id();
        self.inner.sessions.update_kitchen(Some(kitchen.id))?;
        self.inner.sessions.update_role(role)?;
        self.inner.pantry.reset();

        if let Some(previous) = previous.filter(|previous| *previous != kitchen.id) {
            self.inner.live.unsubscribe_from_kitchen(previous).await;
        }
        let events = self.inner.listener.lock().await.events.clone();
        match events {
            Some(events) => self.inner.live.subscribe_to_kitchen(kitchen.id, events).await,
            None => debug!(kitchen_id = kitchen.id, "live updates off, not subscribing"),
        }

        self.inner.state.navigate(dashboard_for(&self.snapshot()));
        Ok(())
    }

    async fn listen(self, mut events: mpsc::UnboundedReceiver<LiveEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(event).await;
        }
        debug!("live event stream ended");
    }

    async fn handle(&self, event: LiveEvent) {
        let current_kitchen = self.snapshot().kitchen_id();

        match event {
            LiveEvent::AccessRevoked => {
                warn!(kitchen_id = current_kitchen, "kitchen access revoked");
                if let Err(error) = self.inner.state.revoke_kitchen_access() {
                    warn!(%error, "failed to persist revoked access");
                }
                if let Some(kitchen_id) = current_kitchen {
                    self.inner.live.unsubscribe_from_kitchen(kitchen_id).await;
                }
                self.inner.pantry.reset();
                self.inner.state.navigate(Route::KitchenSetup);
            }
            LiveEvent::DatabaseReset | LiveEvent::ForceLogout => {
                warn!(?event, "backend ended every session");
                self.shutdown_live(Stopper::Listener).await;
                self.inner.pantry.reset();
                self.inner.state.wipe();
            }
            LiveEvent::MemberAdded { kitchen_id } | LiveEvent::MemberRemoved { kitchen_id } => {
                if current_kitchen == Some(kitchen_id) {
                    self.inner.pantry.membership_changed().await;
                } else {
                    debug!(kitchen_id, "membership change for another kitchen");
                }
            }
            LiveEvent::UnreadCount { kitchen_id, count } => {
                if current_kitchen == Some(kitchen_id) {
                    self.inner.pantry.publish_unread(count);
                }
            }
        }

        // No receivers is fine.
        let _ = self.inner.events.send(event);
    }
}
