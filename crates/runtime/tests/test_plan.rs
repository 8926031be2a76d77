use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use httpmock::prelude::*;
use jsonwebtoken::{encode, EncodingKey, Header};
use pantry_api::{Role, User};
use pantry_config::ClientConfig;
use pantry_live::{
    ChannelError, Command, Connection, ConnectionState, Connector, Frame, LiveEvent,
};
use pantry_runtime::{Application, PantryError, View};
use pantry_session::{FileStorage, History, MemoryStorage, Route, Storage, TokenStore};
use serde::Serialize;
use serde_json::json;
use tempfile::TempDir;
use tokio::sync::{broadcast, mpsc};
use tokio::time::{sleep, timeout};

#[derive(Serialize)]
struct Claims {
    sub: String,
    exp: i64,
}

fn token_expiring_in(seconds: i64) -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64;
    let claims = Claims {
        sub: "lena@example.com".into(),
        exp: now + seconds,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(b"backend-secret"),
    )
    .expect("token should encode")
}

fn user(role: Option<Role>, kitchen_id: Option<i64>) -> User {
    User {
        id: 21,
        username: "lena".into(),
        name: "Lena".into(),
        email: "lena@example.com".into(),
        role,
        kitchen_id,
    }
}

/// Broker stand-in that records frames and lets the test publish messages.
#[derive(Clone, Default)]
struct FakeBroker {
    received: Arc<Mutex<Vec<Frame>>>,
    subscriptions: Arc<Mutex<HashMap<String, String>>>,
    to_client: Arc<Mutex<Option<mpsc::UnboundedSender<Result<Frame, ChannelError>>>>>,
}

impl FakeBroker {
    fn count(&self, command: Command, destination: Option<&str>) -> usize {
        self.received
            .lock()
            .unwrap()
            .iter()
            .filter(|frame| frame.command == command)
            .filter(|frame| destination.map_or(true, |d| frame.get("destination") == Some(d)))
            .count()
    }

    async fn wait_for_frames(&self, command: Command, destination: Option<&str>, at_least: usize) {
        let waited = timeout(Duration::from_secs(2), async {
            while self.count(command, destination) < at_least {
                sleep(Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(waited.is_ok(), "broker never saw {command} {destination:?}");
    }

    async fn publish(&self, destination: &str, body: &str) {
        self.wait_for_frames(Command::Subscribe, Some(destination), 1)
            .await;
        let id = self
            .subscriptions
            .lock()
            .unwrap()
            .get(destination)
            .cloned()
            .expect("destination should be subscribed");
        let message = Frame::new(Command::Message)
            .header("destination", destination)
            .header("subscription", id)
            .header("message-id", "m-1")
            .body(body);
        if let Some(to_client) = self.to_client.lock().unwrap().as_ref() {
            let _ = to_client.send(Ok(message));
        }
    }
}

#[async_trait]
impl Connector for FakeBroker {
    async fn connect(&self) -> Result<Connection, ChannelError> {
        let (outbound, mut from_client) = mpsc::unbounded_channel::<Frame>();
        let (to_client, inbound) = mpsc::unbounded_channel();
        *self.to_client.lock().unwrap() = Some(to_client);

        let broker = self.clone();
        tokio::spawn(async move {
            while let Some(frame) = from_client.recv().await {
                broker.received.lock().unwrap().push(frame.clone());
                match frame.command {
                    Command::Connect => {
                        let connected = Frame::new(Command::Connected).header("version", "1.2");
                        if let Some(to_client) = broker.to_client.lock().unwrap().as_ref() {
                            let _ = to_client.send(Ok(connected));
                        }
                    }
                    Command::Subscribe => {
                        let id = frame.get("id").unwrap_or_default().to_string();
                        let destination = frame.get("destination").unwrap_or_default().to_string();
                        broker.subscriptions.lock().unwrap().insert(destination, id);
                    }
                    Command::Unsubscribe => {
                        let id = frame.get("id").unwrap_or_default();
                        broker
                            .subscriptions
                            .lock()
                            .unwrap()
                            .retain(|_, existing| existing != id);
                    }
                    Command::Disconnect => break,
                    _ => {}
                }
            }
        });

        Ok(Connection { outbound, inbound })
    }
}

struct Harness {
    app: Application,
    storage: Arc<MemoryStorage>,
    history: Arc<History>,
    broker: FakeBroker,
    server: MockServer,
}

impl Harness {
    async fn new(validate_on_startup: bool) -> Result<Self> {
        let server = MockServer::start_async().await;
        let mut config = ClientConfig::default();
        config.api.base_url = server.url("/api");
        config.api.request_timeout_seconds = 5;
        config.live.connect_timeout_seconds = 2;
        config.session.validate_on_startup = validate_on_startup;

        let storage = Arc::new(MemoryStorage::new());
        let history = Arc::new(History::new());
        let broker = FakeBroker::default();
        let app = Application::assemble(
            &config,
            storage.clone(),
            history.clone(),
            Arc::new(broker.clone()),
        )?;

        Ok(Self {
            app,
            storage,
            history,
            broker,
            server,
        })
    }

    fn persist(&self, token: &str, user: &User) -> Result<()> {
        let tokens = TokenStore::new(self.storage.clone());
        tokens.set(token)?;
        tokens.set_user(user)?;
        Ok(())
    }

    async fn signed_in(&self, role: Role, kitchen_id: Option<i64>) -> Result<String> {
        let token = token_expiring_in(3600);
        self.persist(&token, &user(Some(role), kitchen_id))?;
        let session = self.app.bootstrap().await;
        if !session.is_authenticated {
            return Err(anyhow!("persisted session was not restored"));
        }
        Ok(token)
    }
}

async fn next_event(events: &mut broadcast::Receiver<LiveEvent>) -> Result<LiveEvent> {
    Ok(timeout(Duration::from_secs(2), events.recv()).await??)
}

#[tokio::test(flavor = "multi_thread")]
async fn routes_render_loading_until_bootstrap_finishes() -> Result<()> {
    let harness = Harness::new(true).await?;

    assert_eq!(harness.app.render(Route::Inventory), View::Loading);
    assert_eq!(harness.app.visit(Route::Login), View::Loading);
    assert!(harness.history.entries().is_empty());

    let session = harness.app.bootstrap().await;
    assert!(!session.is_authenticated);
    assert!(harness.app.is_initialized());
    assert_eq!(
        harness.app.visit(Route::Inventory),
        View::Redirect(Route::Login)
    );
    assert_eq!(harness.app.render(Route::Login), View::Page(Route::Login));
    assert_eq!(harness.history.current(), Some(Route::Login));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn expired_persisted_token_is_cleared_without_asking_the_backend() -> Result<()> {
    let harness = Harness::new(true).await?;
    let refresh = harness
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/refresh");
            then.status(200).json_body(json!({"id": 21}));
        })
        .await;
    harness.persist(&token_expiring_in(-60), &user(Some(Role::Admin), Some(3)))?;

    let session = harness.app.bootstrap().await;

    assert!(!session.is_authenticated);
    assert!(harness.storage.is_empty());
    assert_eq!(refresh.hits_async().await, 0);
    assert_eq!(
        harness.app.render(Route::Admin),
        View::Redirect(Route::Login)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn startup_validation_refreshes_the_user() -> Result<()> {
    let harness = Harness::new(true).await?;
    let refresh = harness
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/refresh");
            then.status(200).json_body(json!({
                "id": 21,
                "username": "lena",
                "name": "Lena",
                "email": "lena@example.com",
                "role": "MEMBER",
                "kitchenId": 3
            }));
        })
        .await;

    harness.signed_in(Role::Admin, Some(3)).await?;

    refresh.assert_async().await;
    assert_eq!(harness.app.snapshot().role(), Some(Role::Member));
    assert_eq!(
        harness.app.render(Route::Admin),
        View::Redirect(Route::Unauthorized)
    );
    assert_eq!(
        harness.app.render(Route::Dashboard),
        View::Redirect(Route::Member)
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_backend_keeps_the_restored_session() -> Result<()> {
    let harness = Harness::new(true).await?;
    harness
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/user/refresh");
            then.status(503).body("maintenance");
        })
        .await;

    harness.signed_in(Role::Admin, Some(3)).await?;

    assert!(harness.app.snapshot().is_authenticated);
    assert_eq!(
        harness.app.render(Route::Inventory),
        View::Page(Route::Inventory)
    );
    assert_eq!(harness.history.count(Route::Login), 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn new_user_without_kitchen_is_sent_to_kitchen_setup() -> Result<()> {
    let harness = Harness::new(true).await?;
    let token = token_expiring_in(3600);
    harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/user/login")
                .json_body(json!({"email": "lena@example.com", "password": "hunter22"}));
            then.status(200).json_body(json!({
                "token": token,
                "user": {"id": 21, "username": "lena", "email": "lena@example.com", "role": "USER"}
            }));
        })
        .await;
    harness.app.bootstrap().await;

    let user = harness.app.login("lena@example.com", "hunter22").await?;

    assert_eq!(user.role, Some(Role::Unassigned));
    assert_eq!(harness.history.current(), Some(Route::KitchenSetup));
    assert_eq!(
        harness.app.render(Route::Admin),
        View::Redirect(Route::KitchenSetup)
    );
    assert_eq!(
        harness.app.render(Route::KitchenSetup),
        View::Page(Route::KitchenSetup)
    );
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/user/21"), 1)
        .await;
    assert_eq!(harness.broker.count(Command::Subscribe, Some("/topic/kitchen/3")), 0);

    harness.app.stop_live_updates().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_unauthorized_responses_log_out_once() -> Result<()> {
    let harness = Harness::new(false).await?;
    let inventory = harness
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/inventory");
            then.status(401)
                .delay(Duration::from_millis(100))
                .json_body(json!({"message": "Token expired"}));
        })
        .await;
    harness.signed_in(Role::Admin, Some(3)).await?;

    let mut requests = Vec::new();
    for _ in 0..6 {
        let app = harness.app.clone();
        requests.push(tokio::spawn(async move { app.pantry().load_inventory().await }));
    }
    for request in requests {
        assert!(request.await?.is_err());
    }

    assert!(inventory.hits_async().await >= 1);
    assert_eq!(harness.history.count(Route::Login), 1);
    assert!(!harness.app.snapshot().is_authenticated);
    assert!(harness.storage.is_empty());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn access_revoked_drops_the_kitchen_but_keeps_the_login() -> Result<()> {
    let harness = Harness::new(false).await?;
    let token = harness.signed_in(Role::Admin, Some(3)).await?;
    let mut events = harness.app.live_events();

    assert!(harness.app.start_live_updates().await);
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/kitchen/3/alerts"), 1)
        .await;
    harness
        .broker
        .publish("/topic/user/21", "ACCESS_REVOKED")
        .await;

    assert_eq!(next_event(&mut events).await?, LiveEvent::AccessRevoked);

    let session = harness.app.snapshot();
    assert!(session.is_authenticated);
    assert_eq!(session.role(), Some(Role::Unassigned));
    assert_eq!(session.kitchen_id(), None);
    assert_eq!(session.token.as_deref(), Some(token.as_str()));

    let tokens = harness.app.state().tokens();
    assert_eq!(tokens.get().as_deref(), Some(token.as_str()));
    let persisted = tokens.user().expect("user should stay persisted");
    assert_eq!(persisted.role, Some(Role::Unassigned));
    assert_eq!(persisted.kitchen_id, None);

    assert_eq!(harness.history.current(), Some(Route::KitchenSetup));
    harness
        .broker
        .wait_for_frames(Command::Unsubscribe, None, 2)
        .await;
    assert!(harness.app.live().subscribed_kitchens().await.is_empty());
    assert!(harness.app.live().is_connected());

    harness.app.stop_live_updates().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn force_logout_wipes_storage_and_returns_to_login() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness.signed_in(Role::Member, Some(3)).await?;
    harness.storage.set("theme", "dark")?;
    let mut events = harness.app.live_events();

    harness.app.start_live_updates().await;
    harness
        .broker
        .publish("/topic/logout", "FORCE_LOGOUT")
        .await;

    assert_eq!(next_event(&mut events).await?, LiveEvent::ForceLogout);
    assert!(harness.storage.is_empty());
    assert!(!harness.app.snapshot().is_authenticated);
    assert_eq!(harness.history.current(), Some(Route::Login));
    assert_eq!(harness.app.live().state(), ConnectionState::Disconnected);
    harness
        .broker
        .wait_for_frames(Command::Disconnect, None, 1)
        .await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn database_reset_behaves_like_force_logout() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness.signed_in(Role::Admin, Some(3)).await?;
    let mut events = harness.app.live_events();

    harness.app.start_live_updates().await;
    harness
        .broker
        .publish("/topic/global", "DATABASE_RESET")
        .await;

    assert_eq!(next_event(&mut events).await?, LiveEvent::DatabaseReset);
    assert!(harness.storage.is_empty());
    assert_eq!(harness.history.current(), Some(Route::Login));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn kitchen_events_refresh_members_and_unread_count() -> Result<()> {
    let harness = Harness::new(false).await?;
    let members = harness
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/kitchens/members")
                .query_param("kitchenId", "3");
            then.status(200).json_body(json!([
                {"id": 21, "username": "lena", "role": "ADMIN", "kitchenId": 3},
                {"id": 22, "username": "omar", "role": "MEMBER", "kitchenId": 3}
            ]));
        })
        .await;
    harness.signed_in(Role::Admin, Some(3)).await?;
    harness.app.pantry().load_members().await?;
    let mut events = harness.app.live_events();

    harness.app.start_live_updates().await;
    harness
        .broker
        .publish("/topic/kitchen/3", "MEMBER_ADDED")
        .await;
    assert_eq!(
        next_event(&mut events).await?,
        LiveEvent::MemberAdded { kitchen_id: 3 }
    );
    assert_eq!(members.hits_async().await, 2);
    assert_eq!(harness.app.pantry().members_revision(), 1);
    assert_eq!(harness.app.pantry().members().items.len(), 2);

    harness
        .broker
        .publish("/topic/kitchen/3/alerts", r#"{"unreadCount": 5}"#)
        .await;
    assert_eq!(
        next_event(&mut events).await?,
        LiveEvent::UnreadCount {
            kitchen_id: 3,
            count: 5
        }
    );
    assert_eq!(harness.app.pantry().unread_count(), 5);

    harness.app.stop_live_updates().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn creating_a_kitchen_promotes_to_admin_and_follows_it() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness
        .server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/api/kitchens")
                .json_body(json!({"name": "Home"}));
            then.status(200)
                .json_body(json!({"id": 12, "name": "Home", "invitationCode": "K-12"}));
        })
        .await;
    harness.signed_in(Role::Unassigned, None).await?;
    harness.app.start_live_updates().await;

    let kitchen = harness.app.create_kitchen("  Home ").await?;

    assert_eq!(kitchen.invitation_code.as_deref(), Some("K-12"));
    let session = harness.app.snapshot();
    assert_eq!(session.role(), Some(Role::Admin));
    assert_eq!(session.kitchen_id(), Some(12));
    assert_eq!(harness.history.current(), Some(Route::Admin));
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/kitchen/12"), 1)
        .await;

    harness.app.stop_live_updates().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn consuming_more_than_available_never_reaches_the_backend() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness
        .server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/api/inventory")
                .query_param("kitchenId", "3");
            then.status(200).json_body(json!([
                {
                    "id": 9, "name": "Flour", "quantity": 5,
                    "kitchenId": 3, "expiryDate": "2030-01-01"
                }
            ]));
        })
        .await;
    let update = harness
        .server
        .mock_async(|when, then| {
            when.method(PUT)
                .path("/api/inventory/9")
                .json_body_partial(r#"{"quantity": 3, "name": "Flour"}"#);
            then.status(200).json_body(json!(
                {
                    "id": 9, "name": "Flour", "quantity": 3,
                    "kitchenId": 3, "expiryDate": "2030-01-01"
                }
            ));
        })
        .await;
    harness.signed_in(Role::Member, Some(3)).await?;
    harness.app.pantry().load_inventory().await?;

    let refused = harness.app.pantry().consume_item(9, 7).await;
    assert!(matches!(
        refused,
        Err(PantryError::InsufficientQuantity {
            requested: 7,
            available: 5
        })
    ));
    assert_eq!(update.hits_async().await, 0);
    assert!(harness.app.pantry().inventory().error.is_some());
    assert!(harness.app.snapshot().error.is_none());

    let consumed = harness.app.pantry().consume_item(9, 2).await?;
    update.assert_async().await;
    assert_eq!(consumed.quantity, 3);
    let inventory = harness.app.pantry().inventory();
    assert_eq!(inventory.items[0].quantity, 3);
    assert!(inventory.error.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn feature_calls_need_a_kitchen() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness.signed_in(Role::Unassigned, None).await?;

    let result = harness.app.pantry().load_shopping().await;

    assert!(matches!(result, Err(PantryError::NoKitchen)));
    let shopping = harness.app.pantry().shopping();
    assert!(!shopping.loading);
    assert!(shopping.error.is_some());
    assert!(harness.app.snapshot().is_authenticated);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn logout_stops_live_updates_and_clears_the_session() -> Result<()> {
    let harness = Harness::new(false).await?;
    let logout = harness
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/user/logout");
            then.status(200);
        })
        .await;
    harness.signed_in(Role::Admin, Some(3)).await?;
    harness.app.start_live_updates().await;
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/kitchen/3"), 1)
        .await;

    harness.app.logout().await;
    harness.app.logout().await;

    logout.assert_hits_async(1).await;
    assert_eq!(harness.app.live().state(), ConnectionState::Disconnected);
    assert!(!harness.app.snapshot().is_authenticated);
    assert!(harness.app.state().tokens().get().is_none());
    assert_eq!(harness.history.current(), Some(Route::Login));
    harness
        .broker
        .wait_for_frames(Command::Disconnect, None, 1)
        .await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn file_backed_session_survives_a_restart() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join("session.json");
    let token = token_expiring_in(3600);
    {
        let tokens = TokenStore::new(Arc::new(FileStorage::new(&path)));
        tokens.set(&token)?;
        tokens.set_user(&user(Some(Role::Member), Some(4)))?;
    }

    let mut config = ClientConfig::default();
    config.storage.path = path.to_string_lossy().into_owned();
    config.session.validate_on_startup = false;
    let app = Application::initialise(&config)?;

    let session = app.bootstrap().await;
    assert!(session.is_authenticated);
    assert_eq!(session.kitchen_id(), Some(4));
    assert_eq!(app.render(Route::Member), View::Page(Route::Member));
    Ok(())
}

async fn wait_until_disconnected(app: &Application) -> Result<()> {
    let mut state = app.live().watch_state();
    timeout(
        Duration::from_secs(2),
        state.wait_for(|state| *state == ConnectionState::Disconnected),
    )
    .await??;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn rejected_session_closes_live_updates_before_the_next_login() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness
        .server
        .mock_async(|when, then| {
            when.method(GET).path("/api/inventory");
            then.status(401).json_body(json!({"message": "Token expired"}));
        })
        .await;
    let token = token_expiring_in(3600);
    harness
        .server
        .mock_async(|when, then| {
            when.method(POST).path("/api/user/login");
            then.status(200).json_body(json!({
                "token": token,
                "user": {
                    "id": 99,
                    "username": "omar",
                    "email": "omar@example.com",
                    "role": "MEMBER",
                    "kitchenId": 7
                }
            }));
        })
        .await;
    harness.signed_in(Role::Admin, Some(3)).await?;
    assert!(harness.app.start_live_updates().await);
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/kitchen/3/alerts"), 1)
        .await;

    assert!(harness.app.pantry().load_inventory().await.is_err());
    assert!(!harness.app.snapshot().is_authenticated);
    wait_until_disconnected(&harness.app).await?;
    assert!(harness.app.live().subscribed_kitchens().await.is_empty());

    harness.app.login("omar@example.com", "secret").await?;

    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/user/99"), 1)
        .await;
    harness
        .broker
        .wait_for_frames(Command::Subscribe, Some("/topic/kitchen/7"), 1)
        .await;
    assert_eq!(harness.broker.count(Command::Connect, None), 2);
    assert_eq!(harness.broker.count(Command::Subscribe, Some("/topic/user/21")), 1);
    assert_eq!(harness.app.live().subscribed_kitchens().await, vec![7]);

    harness.app.stop_live_updates().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn token_expiring_while_running_ends_the_session() -> Result<()> {
    let harness = Harness::new(false).await?;
    harness.persist(&token_expiring_in(2), &user(Some(Role::Admin), Some(3)))?;
    assert!(harness.app.bootstrap().await.is_authenticated);
    assert!(harness.app.start_live_updates().await);
    assert_eq!(
        harness.app.render(Route::Inventory),
        View::Page(Route::Inventory)
    );

    sleep(Duration::from_millis(3_100)).await;

    assert_eq!(
        harness.app.render(Route::Inventory),
        View::Redirect(Route::Login)
    );
    let session = harness.app.snapshot();
    assert!(!session.is_authenticated);
    assert!(session.token.is_none());
    assert!(harness.storage.is_empty());
    wait_until_disconnected(&harness.app).await?;
    Ok(())
}
