//! Live update channel.
//!
//! One `LiveChannel` owns at most one broker connection and its subscriptions.
//! Connecting spawns a driver task which performs the STOMP handshake,
//! subscribes the user, global and logout topics, flushes a queued kitchen
//! subscription and then routes incoming messages to event senders.
//!
//! Connection state and the subscription map share one lock, so a kitchen
//! subscription requested while connecting is sent exactly once: either the
//! driver flushes it right after `CONNECTED`, or the caller sees the channel
//! connected and subscribes directly.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, error, info};

use crate::error::ChannelError;
use crate::event::{LiveEvent, Topic};
use crate::frame::{Command, Frame};
use crate::transport::{Connection, Connector, WebSocketConnector};

pub type EventSender = mpsc::UnboundedSender<LiveEvent>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

struct Route {
    topic: Topic,
    events: EventSender,
}

#[derive(Default)]
struct Inner {
    generation: u64,
    outbound: Option<mpsc::UnboundedSender<Frame>>,
    routes: HashMap<String, Route>,
    kitchens: HashMap<i64, [String; 2]>,
    pending_kitchen: Option<(i64, EventSender)>,
    next_subscription: u64,
    driver: Option<JoinHandle<()>>,
}

impl Inner {
    fn subscribe(&mut self, topic: Topic, events: EventSender) -> String {
        let id = format!("sub-{}", self.next_subscription);
        self.next_subscription += 1;

        if let Some(outbound) = &self.outbound {
            if outbound.send(Frame::subscribe(&id, &topic.destination())).is_err() {
                debug!(%id, "subscribe dropped, connection is closing");
            }
        }
        debug!(%id, destination = %topic.destination(), "subscribed");
        self.routes.insert(id.clone(), Route { topic, events });
        id
    }

    fn subscribe_kitchen(&mut self, kitchen_id: i64, events: EventSender) {
        if let Some(ids) = self.kitchens.get(&kitchen_id) {
            for id in ids {
                if let Some(route) = self.routes.get_mut(id) {
                    route.events = events.clone();
                }
            }
            debug!(kitchen_id, "kitchen already subscribed, handler replaced");
            return;
        }

        let updates = self.subscribe(Topic::Kitchen(kitchen_id), events.clone());
        let alerts = self.subscribe(Topic::KitchenAlerts(kitchen_id), events);
        self.kitchens.insert(kitchen_id, [updates, alerts]);
        info!(kitchen_id, "subscribed to kitchen updates");
    }

    fn unsubscribe(&mut self, id: &str) {
        self.routes.remove(id);
        if let Some(outbound) = &self.outbound {
            let _ = outbound.send(Frame::unsubscribe(id));
        }
    }

    /// Drop the connection and its subscriptions. An active kitchen
    /// subscription is queued again unless something else is already queued.
    fn drop_connection(&mut self) {
        self.outbound = None;
        if self.pending_kitchen.is_none() {
            let active = self.kitchens.iter().find_map(|(kitchen_id, ids)| {
                self.routes
                    .get(&ids[0])
                    .map(|route| (*kitchen_id, route.events.clone()))
            });
            self.pending_kitchen = active;
        }
        self.routes.clear();
        self.kitchens.clear();
    }

    fn route(&self, frame: &Frame) -> Option<(&Route, Topic)> {
        if let Some(route) = frame.get("subscription").and_then(|id| self.routes.get(id)) {
            return Some((route, route.topic));
        }
        let topic = frame.get("destination").and_then(Topic::parse)?;
        self.routes
            .values()
            .find(|route| route.topic == topic)
            .map(|route| (route, topic))
    }
}

struct Shared {
    inner: Arc<Mutex<Inner>>,
    state: Arc<watch::Sender<ConnectionState>>,
    connector: Arc<dyn Connector>,
    connect_timeout: Duration,
}

pub struct LiveChannel {
    shared: Arc<Shared>,
}

impl LiveChannel {
    pub fn new(connector: Arc<dyn Connector>, connect_timeout: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            shared: Arc::new(Shared {
                inner: Arc::new(Mutex::new(Inner::default())),
                state: Arc::new(state),
                connector,
                connect_timeout,
            }),
        }
    }

    /// Channel talking to a broker at `url` (`ws://` or `wss://`).
    pub fn websocket(url: &str, connect_timeout: Duration) -> Result<Self, ChannelError> {
        let connector = WebSocketConnector::new(url)?;
        Ok(Self::new(Arc::new(connector), connect_timeout))
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Open the connection for `user_id`. Does nothing unless disconnected.
    pub async fn connect(&self, user_id: i64, events: EventSender) {
        let mut inner = self.shared.inner.lock().await;
        if *self.shared.state.borrow() != ConnectionState::Disconnected {
            debug!(user_id, "live channel already active");
            return;
        }

        inner.generation += 1;
        let generation = inner.generation;
        self.shared.state.send_replace(ConnectionState::Connecting);
        info!(user_id, "connecting live channel");

        let shared = self.shared.clone();
        inner.driver = Some(tokio::spawn(drive(shared, generation, user_id, events)));
    }

    /// Subscribe to a kitchen's member and alert topics, or queue the request
    /// until the connection is acknowledged. Only the latest queued request is
    /// kept.
    pub async fn subscribe_to_kitchen(&self, kitchen_id: i64, events: EventSender) {
        let mut inner = self.shared.inner.lock().await;
        if inner.outbound.is_some() {
            inner.subscribe_kitchen(kitchen_id, events);
        } else {
            debug!(kitchen_id, "live channel not connected, queuing kitchen subscription");
            inner.pending_kitchen = Some((kitchen_id, events));
        }
    }

    pub async fn unsubscribe_from_kitchen(&self, kitchen_id: i64) {
        let mut inner = self.shared.inner.lock().await;
        if matches!(inner.pending_kitchen, Some((pending, _)) if pending == kitchen_id) {
            inner.pending_kitchen = None;
        }
        if let Some(ids) = inner.kitchens.remove(&kitchen_id) {
            for id in &ids {
                inner.unsubscribe(id);
            }
            info!(kitchen_id, "unsubscribed from kitchen updates");
        }
    }

    /// Close the connection and forget every subscription, including a queued
    /// one. Cancels a connection attempt in progress.
    pub async fn disconnect(&self) {
        let mut inner = self.shared.inner.lock().await;
        inner.generation += 1;

        if let Some(outbound) = inner.outbound.take() {
            let _ = outbound.send(Frame::disconnect());
        }
        inner.routes.clear();
        inner.kitchens.clear();
        inner.pending_kitchen = None;
        if let Some(driver) = inner.driver.take() {
            driver.abort();
        }

        if *self.shared.state.borrow() != ConnectionState::Disconnected {
            info!("live channel disconnected");
        }
        self.shared.state.send_replace(ConnectionState::Disconnected);
    }

    /// Kitchens with active subscriptions.
    pub async fn subscribed_kitchens(&self) -> Vec<i64> {
        let mut kitchens: Vec<i64> = self
            .shared
            .inner
            .lock()
            .await
            .kitchens
            .keys()
            .copied()
            .collect();
        kitchens.sort_unstable();
        kitchens
    }

    pub async fn pending_kitchen(&self) -> Option<i64> {
        self.shared
            .inner
            .lock()
            .await
            .pending_kitchen
            .as_ref()
            .map(|(kitchen_id, _)| *kitchen_id)
    }
}

async fn drive(shared: Arc<Shared>, generation: u64, user_id: i64, events: EventSender) {
    let result = run(&shared, generation, user_id, events).await;

    let mut inner = shared.inner.lock().await;
    if inner.generation != generation {
        return;
    }
    match result {
        Ok(()) => info!(user_id, "live channel closed"),
        Err(error) => error!(user_id, %error, "live channel failed"),
    }
    inner.drop_connection();
    inner.driver = None;
    shared.state.send_replace(ConnectionState::Disconnected);
}

async fn run(
    shared: &Shared,
    generation: u64,
    user_id: i64,
    events: EventSender,
) -> Result<(), ChannelError> {
    let Connection {
        outbound,
        mut inbound,
    } = timeout(shared.connect_timeout, shared.connector.connect())
        .await
        .map_err(|_| ChannelError::Timeout)??;

    outbound
        .send(Frame::connect(&shared.connector.host()))
        .map_err(|_| ChannelError::Closed)?;

    let ack = timeout(shared.connect_timeout, inbound.recv())
        .await
        .map_err(|_| ChannelError::Timeout)?;
    match ack {
        Some(Ok(frame)) if frame.command == Command::Connected => {}
        Some(Ok(frame)) if frame.command == Command::Error => {
            return Err(broker_error(&frame));
        }
        Some(Ok(frame)) => return Err(ChannelError::Unexpected(frame.command.to_string())),
        Some(Err(error)) => return Err(error),
        None => return Err(ChannelError::Closed),
    }

    {
        let mut inner = shared.inner.lock().await;
        if inner.generation != generation {
            let _ = outbound.send(Frame::disconnect());
            return Ok(());
        }

        inner.outbound = Some(outbound.clone());
        for topic in [Topic::User(user_id), Topic::Global, Topic::Logout] {
            inner.subscribe(topic, events.clone());
        }
        if let Some((kitchen_id, kitchen_events)) = inner.pending_kitchen.take() {
            inner.subscribe_kitchen(kitchen_id, kitchen_events);
        }
        shared.state.send_replace(ConnectionState::Connected);
    }
    info!(user_id, "live channel connected");

    while let Some(frame) = inbound.recv().await {
        let frame = frame?;
        match frame.command {
            Command::Message => {
                let inner = shared.inner.lock().await;
                if inner.generation != generation {
                    return Ok(());
                }
                match inner.route(&frame) {
                    Some((route, topic)) => {
                        if let Some(event) = LiveEvent::decode(topic, &frame.body) {
                            debug!(?event, "live event");
                            let _ = route.events.send(event);
                        }
                    }
                    None => debug!(
                        destination = frame.get("destination").unwrap_or_default(),
                        "message for unknown subscription"
                    ),
                }
            }
            Command::Error => return Err(broker_error(&frame)),
            other => debug!(command = %other, "ignoring frame"),
        }
    }

    Err(ChannelError::Closed)
}

fn broker_error(frame: &Frame) -> ChannelError {
    let message = frame
        .get("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.trim().to_string());
    ChannelError::Broker(message)
}
