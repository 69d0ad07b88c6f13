use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Packet, QoS, Transport};
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, instrument, trace, warn};

use crate::config::DeviceConfig;
use crate::error::DeviceError;
use crate::method::{MethodResponder, reply};
use crate::model::{MethodRequest, MethodResponse, Twin, TwinCollection, TwinProperties};
use crate::topic::{self, Topic};
use crate::twin::DeviceTwin;
use crate::util::crypto::sas_token;
use crate::util::types::DeviceId;

const API_VERSION: &str = "2021-04-12";

// Twin documents can get up to 32KB per section
const MAX_PACKET_SIZE: usize = 256 * 1024;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const RECONNECT_DELAY: Duration = Duration::from_secs(1);
const REQUEST_CAPACITY: usize = 64;
const EVENT_CAPACITY: usize = 64;

#[derive(Debug)]
struct TwinResponse {
    status: u16,
    body: Vec<u8>,
}

/// Twin requests waiting for the hub to reply, by request id
#[derive(Debug, Default)]
struct Pending(Mutex<HashMap<String, oneshot::Sender<TwinResponse>>>);

impl Pending {
    fn register(&self, request_id: String) -> oneshot::Receiver<TwinResponse> {
        let (tx, rx) = oneshot::channel();
        self.lock().insert(request_id, tx);
        rx
    }

    fn take(&self, request_id: &str) -> Option<oneshot::Sender<TwinResponse>> {
        self.lock().remove(request_id)
    }

    /// Drop every waiter, they will see the connection as lost
    fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, oneshot::Sender<TwinResponse>>> {
        // a panic while holding the lock cannot leave the map inconsistent
        self.0.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Hub-initiated traffic for the device.
///
/// Desired property patches only arrive after
/// [DeviceClient::listen_desired_properties], method calls after
/// [DeviceClient::listen_methods].
#[derive(Debug)]
pub struct DeviceEvents {
    pub desired: mpsc::Receiver<TwinCollection>,
    pub methods: mpsc::Receiver<MethodRequest>,
}

/// Publishes that must not wait on the event loop, as the event loop
/// itself is the caller
trait Publisher: std::fmt::Debug + Send + Sync {
    fn try_publish(&self, topic: String, body: Vec<u8>) -> Result<(), DeviceError>;
}

impl Publisher for AsyncClient {
    fn try_publish(&self, topic: String, body: Vec<u8>) -> Result<(), DeviceError> {
        AsyncClient::try_publish(self, topic, QoS::AtMostOnce, false, body)?;
        Ok(())
    }
}

/// Dispatches incoming publishes from the event loop
#[derive(Debug)]
struct Router {
    pending: Arc<Pending>,
    desired: mpsc::Sender<TwinCollection>,
    methods: mpsc::Sender<MethodRequest>,
    /// Answers method calls no listener can take
    replies: Arc<dyn Publisher>,
}

impl Router {
    fn route(&self, topic: &str, payload: &[u8]) {
        match Topic::parse(topic) {
            Some(Topic::TwinResponse {
                status, request_id, ..
            }) => match self.pending.take(&request_id) {
                Some(waiter) => {
                    let _ = waiter.send(TwinResponse {
                        status,
                        body: payload.to_vec(),
                    });
                }
                None => debug!(request_id, "twin response for unknown request"),
            },
            Some(Topic::DesiredPatch { version }) => {
                match serde_json::from_slice::<TwinCollection>(payload) {
                    Ok(patch) => {
                        trace!(?version, "desired properties patch");
                        if let Err(e) = self.desired.try_send(patch) {
                            warn!("dropping desired properties patch: {e}");
                        }
                    }
                    Err(e) => warn!("invalid desired properties patch: {e}"),
                }
            }
            Some(Topic::MethodRequest { name, request_id }) => {
                let request = MethodRequest {
                    name,
                    request_id,
                    payload: serde_json::from_slice(payload).ok(),
                };
                if let Err(e) = self.methods.try_send(request) {
                    let reason = match &e {
                        TrySendError::Full(_) => "too many pending calls",
                        TrySendError::Closed(_) => "no method listener",
                    };
                    let request = e.into_inner();
                    warn!(method = %request.name, "rejecting direct method request: {reason}");
                    self.reject(&request);
                }
            }
            None => debug!(topic, "ignoring publish on unexpected topic"),
        }
    }

    /// Answer 500 right away so the caller does not wait for its timeout
    fn reject(&self, request: &MethodRequest) {
        let res = reply(request, &MethodResponse::error())
            .and_then(|(topic, body)| self.replies.try_publish(topic, body));
        if let Err(e) = res {
            warn!(method = %request.name, "failed to reject direct method request: {e}");
        }
    }
}

/// The device's connection to the hub, cheap to clone
#[derive(Debug, Clone)]
pub struct DeviceClient {
    mqtt: AsyncClient,
    device_id: DeviceId,
    pending: Arc<Pending>,
    next_request: Arc<AtomicU64>,
    timeout: Duration,
}

/// Connect to the hub as the device named in the connection string.
///
/// The connection is driven by a background task which keeps reconnecting
/// (with fresh credentials) after transport errors, until every
/// [DeviceClient] handle is dropped.
pub async fn connect(config: DeviceConfig) -> Result<(DeviceClient, DeviceEvents), DeviceError> {
    let conn = &config.connection;
    let (username, password) = credentials(&config)?;

    let mut options = MqttOptions::new(conn.device_id.to_string(), &conn.host_name, config.port);
    options
        .set_credentials(username, password)
        .set_keep_alive(KEEP_ALIVE)
        // keep subscriptions across reconnects
        .set_clean_session(false)
        .set_max_packet_size(MAX_PACKET_SIZE, MAX_PACKET_SIZE)
        .set_transport(Transport::tls_with_default_config());

    let (mqtt, eventloop) = AsyncClient::new(options, REQUEST_CAPACITY);
    let client = DeviceClient::new(mqtt, &config);

    client
        .mqtt
        .subscribe(topic::TWIN_RESPONSES, QoS::AtMostOnce)
        .await?;

    let (desired_tx, desired) = mpsc::channel(EVENT_CAPACITY);
    let (methods_tx, methods) = mpsc::channel(EVENT_CAPACITY);
    let router = Router {
        pending: Arc::clone(&client.pending),
        desired: desired_tx,
        methods: methods_tx,
        replies: Arc::new(client.mqtt.clone()),
    };

    tokio::spawn(run_event_loop(eventloop, router, config));

    Ok((client, DeviceEvents { desired, methods }))
}

/// MQTT user name and password for the device
fn credentials(config: &DeviceConfig) -> Result<(String, String), DeviceError> {
    let conn = &config.connection;
    let username = format!(
        "{}/{}/?api-version={API_VERSION}",
        conn.host_name, conn.device_id
    );
    let expiry = Utc::now()
        + chrono::Duration::from_std(config.token_ttl).unwrap_or(chrono::Duration::hours(1));
    let password = sas_token(
        &format!("{}/devices/{}", conn.host_name, conn.device_id),
        &conn.shared_access_key,
        None,
        expiry,
    )?;
    Ok((username, password))
}

#[instrument(name = "device_connection", skip_all, fields(device_id = %config.connection.device_id))]
async fn run_event_loop(mut eventloop: EventLoop, router: Router, config: DeviceConfig) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                router.route(&publish.topic, &publish.payload);
            }
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                debug!(code = ?ack.code, session_present = ack.session_present, "connected to hub");
            }
            Ok(_) => {}
            Err(ConnectionError::RequestsDone) => {
                debug!("device client dropped, closing connection");
                break;
            }
            Err(e) => {
                warn!("device connection error: {e}");
                router.pending.clear();

                // tokens expire, so every reconnect gets a new one
                match credentials(&config) {
                    Ok((username, password)) => {
                        eventloop.mqtt_options.set_credentials(username, password);
                    }
                    Err(e) => warn!("failed to renew device credentials: {e}"),
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

impl DeviceClient {
    fn new(mqtt: AsyncClient, config: &DeviceConfig) -> Self {
        Self {
            mqtt,
            device_id: config.connection.device_id.clone(),
            pending: Arc::new(Pending::default()),
            next_request: Arc::new(AtomicU64::new(1)),
            timeout: config.request_timeout,
        }
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    /// Start receiving desired property patches on [DeviceEvents::desired]
    pub async fn listen_desired_properties(&self) -> Result<(), DeviceError> {
        self.mqtt
            .subscribe(topic::DESIRED_PATCHES, QoS::AtLeastOnce)
            .await?;
        Ok(())
    }

    /// Start receiving direct method calls on [DeviceEvents::methods]
    pub async fn listen_methods(&self) -> Result<(), DeviceError> {
        self.mqtt
            .subscribe(topic::METHOD_REQUESTS, QoS::AtLeastOnce)
            .await?;
        Ok(())
    }

    async fn twin_request<T>(&self, topic: T, body: Vec<u8>) -> Result<TwinResponse, DeviceError>
    where
        T: FnOnce(&str) -> String,
    {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed).to_string();
        let reply = self.pending.register(request_id.clone());

        if let Err(e) = self
            .mqtt
            .publish(topic(&request_id), QoS::AtMostOnce, false, body)
            .await
        {
            self.pending.take(&request_id);
            return Err(e.into());
        }

        let response = match tokio::time::timeout(self.timeout, reply).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err(DeviceError::Disconnected),
            Err(_) => {
                self.pending.take(&request_id);
                return Err(DeviceError::Timeout);
            }
        };

        if !(200..300).contains(&response.status) {
            return Err(DeviceError::Status(response.status));
        }

        Ok(response)
    }
}

#[async_trait]
impl MethodResponder for DeviceClient {
    async fn respond(
        &self,
        request: &MethodRequest,
        response: &MethodResponse,
    ) -> Result<(), DeviceError> {
        let (topic, body) = reply(request, response)?;
        self.mqtt
            .publish(topic, QoS::AtMostOnce, false, body)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DeviceTwin for DeviceClient {
    #[instrument(skip_all, err)]
    async fn get_twin(&self) -> Result<Twin, DeviceError> {
        let response = self.twin_request(topic::twin_get, Vec::new()).await?;
        let properties: TwinProperties = serde_json::from_slice(&response.body)?;
        Ok(Twin {
            device_id: Some(self.device_id.to_string()),
            properties,
            ..Default::default()
        })
    }

    #[instrument(skip_all, err)]
    async fn update_reported_properties(&self, patch: &TwinCollection) -> Result<(), DeviceError> {
        let body = serde_json::to_vec(patch)?;
        self.twin_request(topic::reported_patch, body).await?;
        Ok(())
    }
}
