use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::device::{DeviceClient, DeviceEvents, DeviceTwin, MethodResponder, mirror_desired};
use crate::model::{
    GET_DESIRED_PROPERTIES, GET_REPORTED_PROPERTIES, MethodRequest, MethodResponse,
    TwinCollection,
};
use crate::util::console::{Console, Level};

fn say(console: &Console, message: impl Into<String>) {
    console.write(message, Level::Device);
}

/// Fetch the device's twin and print it
pub async fn show_twin<D>(device: &D, console: &Console)
where
    D: DeviceTwin + ?Sized,
{
    console.blank();
    say(console, "Will get current twin...");

    match device.get_twin().await {
        Ok(twin) => {
            say(console, "Successfully got current twin:");
            say(console, twin.to_json_pretty());
            console.blank();
        }
        Err(e) => console.error(e),
    }
}

/// Acknowledge a desired properties patch by mirroring it into reported
/// properties, then show the resulting twin
#[instrument(skip_all)]
pub async fn on_desired_properties<D>(device: &D, console: &Console, desired: TwinCollection)
where
    D: DeviceTwin + ?Sized,
{
    console.blank();
    say(
        console,
        format!(
            "Received twin update, including {} desired properties:",
            desired.len()
        ),
    );
    say(console, desired.to_json_pretty());

    let reported = mirror_desired(&desired, Utc::now());

    console.blank();
    say(console, "Will change reported properties accordingly...");
    if let Err(e) = device.update_reported_properties(&reported).await {
        console.error(e);
        return;
    }
    say(console, "Successfully changed reported properties");

    show_twin(device, console).await;
}

/// Answer a direct method call with the requested part of the twin
#[instrument(skip_all, fields(method = %request.name))]
pub async fn on_method<D>(device: &D, console: &Console, request: &MethodRequest) -> MethodResponse
where
    D: DeviceTwin + ?Sized,
{
    console.blank();
    say(
        console,
        format!("Received direct method for method '{}'", request.name),
    );

    let name = request.name.as_str();
    if name != GET_DESIRED_PROPERTIES && name != GET_REPORTED_PROPERTIES {
        console.error(format!("no handler for method '{name}'"));
        return MethodResponse::not_implemented();
    }

    let twin = match device.get_twin().await {
        Ok(twin) => twin,
        Err(e) => {
            console.error(e);
            return MethodResponse::error();
        }
    };

    let properties = if name == GET_DESIRED_PROPERTIES {
        twin.properties.desired
    } else {
        twin.properties.reported
    };

    say(console, "Will return method result:");
    say(console, properties.to_json_pretty());

    MethodResponse::ok(properties.into())
}

/// Subscribe to desired property patches and handle them as they come
pub async fn listen_desired_properties(
    client: DeviceClient,
    mut patches: mpsc::Receiver<TwinCollection>,
    console: Console,
) -> Option<JoinHandle<()>> {
    console.blank();
    say(&console, "Will setup listener for desired property updates...");
    if let Err(e) = client.listen_desired_properties().await {
        console.error(e);
        return None;
    }
    say(&console, "Now listening for desired property updates");

    Some(tokio::spawn(async move {
        while let Some(patch) = patches.recv().await {
            on_desired_properties(&client, &console, patch).await;
        }
    }))
}

/// Subscribe to direct method calls and answer them as they come
pub async fn listen_methods(
    client: DeviceClient,
    requests: mpsc::Receiver<MethodRequest>,
    console: Console,
) -> Option<JoinHandle<()>> {
    console.blank();
    say(&console, "Will setup listener for direct methods...");
    if let Err(e) = client.listen_methods().await {
        console.error(e);
        return None;
    }
    say(&console, "Now listening for direct methods");

    Some(tokio::spawn(async move {
        answer_methods(&client, requests, &console).await;
    }))
}

/// Answer every method call received on `requests` until the channel
/// closes
pub async fn answer_methods<D>(
    device: &D,
    mut requests: mpsc::Receiver<MethodRequest>,
    console: &Console,
) where
    D: DeviceTwin + MethodResponder + ?Sized,
{
    while let Some(request) = requests.recv().await {
        let response = on_method(device, console, &request).await;
        if let Err(e) = device.respond(&request, &response).await {
            warn!("failed to answer method '{}': {e}", request.name);
            console.error(e);
        }
    }
}

/// Run the device side: show the twin once, then start both listeners
pub async fn start(
    client: DeviceClient,
    events: DeviceEvents,
    console: Console,
) -> Vec<JoinHandle<()>> {
    let DeviceEvents { desired, methods } = events;

    show_twin(&client, &console).await;

    let desired = listen_desired_properties(client.clone(), desired, console.clone()).await;
    let methods = listen_methods(client, methods, console).await;

    desired.into_iter().chain(methods).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceError, LAST_UPDATE_INFO};
    use crate::model::Twin;
    use crate::util::console::pending_lines;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Mutex;

    /// An in-memory twin
    #[derive(Default)]
    struct FakeTwin {
        twin: Mutex<Twin>,
        offline: bool,
        /// Method answers sent back, as (request id, response)
        answers: Mutex<Vec<(String, MethodResponse)>>,
    }

    impl FakeTwin {
        fn with(twin: serde_json::Value) -> Self {
            Self {
                twin: Mutex::new(serde_json::from_value(twin).unwrap()),
                ..Default::default()
            }
        }

        fn offline() -> Self {
            Self {
                offline: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl DeviceTwin for FakeTwin {
        async fn get_twin(&self) -> Result<Twin, DeviceError> {
            if self.offline {
                return Err(DeviceError::Timeout);
            }
            Ok(self.twin.lock().unwrap().clone())
        }

        async fn update_reported_properties(
            &self,
            patch: &TwinCollection,
        ) -> Result<(), DeviceError> {
            if self.offline {
                return Err(DeviceError::Disconnected);
            }
            let mut twin = self.twin.lock().unwrap();
            for (k, v) in patch.iter() {
                twin.properties.reported.insert(k.clone(), v.clone());
            }
            Ok(())
        }
    }

    #[async_trait]
    impl MethodResponder for FakeTwin {
        async fn respond(
            &self,
            request: &MethodRequest,
            response: &MethodResponse,
        ) -> Result<(), DeviceError> {
            self.answers
                .lock()
                .unwrap()
                .push((request.request_id.clone(), response.clone()));
            Ok(())
        }
    }

    fn twin_with_properties() -> FakeTwin {
        FakeTwin::with(json!({
            "deviceId": "dev1",
            "properties": {
                "desired": { "interval": 30, "$version": 4 },
                "reported": { "interval": 10, "$version": 2 }
            }
        }))
    }

    #[tokio::test]
    async fn test_desired_patch_is_mirrored_to_reported() {
        let (console, mut rx) = Console::channel();
        let device = FakeTwin::default();
        let patch: TwinCollection =
            serde_json::from_value(json!({ "a": 1, "b": "two", "$version": 7 })).unwrap();

        on_desired_properties(&device, &console, patch).await;

        let twin = device.twin.lock().unwrap().clone();
        assert_eq!(twin.properties.reported.get("a"), Some(&json!(1)));
        assert_eq!(twin.properties.reported.get("b"), Some(&json!("two")));
        let info = twin.properties.reported.get(LAST_UPDATE_INFO).unwrap();
        assert!(
            info.as_str()
                .unwrap()
                .ends_with("involved these properties: a, b")
        );

        let lines: Vec<_> = pending_lines(&mut rx).into_iter().map(|l| l.message).collect();
        assert!(lines.contains(&"Received twin update, including 2 desired properties:".to_owned()));
        assert!(lines.contains(&"Successfully changed reported properties".to_owned()));
        assert!(lines.contains(&"Successfully got current twin:".to_owned()));
    }

    #[tokio::test]
    async fn test_failed_reported_update_is_logged() {
        let (console, mut rx) = Console::channel();
        let patch: TwinCollection = serde_json::from_value(json!({ "a": 1 })).unwrap();

        on_desired_properties(&FakeTwin::offline(), &console, patch).await;

        let errors: Vec<_> = pending_lines(&mut rx)
            .into_iter()
            .filter(|l| l.level == Level::Error)
            .collect();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.starts_with("* ERROR * "));
    }

    #[tokio::test]
    async fn test_method_returns_requested_properties() {
        let (console, _rx) = Console::channel();
        let device = twin_with_properties();

        let request = MethodRequest {
            name: GET_DESIRED_PROPERTIES.into(),
            request_id: "1".into(),
            payload: None,
        };
        let response = on_method(&device, &console, &request).await;
        assert_eq!(response.status, 200);
        assert_eq!(
            response.payload,
            Some(json!({ "interval": 30, "$version": 4 }))
        );

        let request = MethodRequest {
            name: GET_REPORTED_PROPERTIES.into(),
            ..request
        };
        let response = on_method(&device, &console, &request).await;
        assert_eq!(response.status, 200);
        assert_eq!(
            response.payload,
            Some(json!({ "interval": 10, "$version": 2 }))
        );
    }

    #[tokio::test]
    async fn test_method_fails_when_twin_is_unavailable() {
        let (console, mut rx) = Console::channel();
        let request = MethodRequest {
            name: GET_REPORTED_PROPERTIES.into(),
            request_id: "1".into(),
            payload: None,
        };

        let response = on_method(&FakeTwin::offline(), &console, &request).await;

        assert_eq!(response, MethodResponse::error());
        assert!(
            pending_lines(&mut rx)
                .iter()
                .any(|l| l.level == Level::Error)
        );
    }

    #[tokio::test]
    async fn test_unknown_method_is_not_implemented() {
        let (console, _rx) = Console::channel();
        let request = MethodRequest {
            name: "Reboot".into(),
            request_id: "1".into(),
            payload: None,
        };

        let response = on_method(&twin_with_properties(), &console, &request).await;

        assert_eq!(response.status, 501);
        assert_eq!(response.payload, None);
    }

    #[tokio::test]
    async fn test_every_method_call_is_answered_in_order() {
        let (console, _rx) = Console::channel();
        let device = twin_with_properties();
        let (tx, requests) = mpsc::channel(4);

        for (name, request_id) in [
            (GET_DESIRED_PROPERTIES, "1"),
            ("Reboot", "2"),
            (GET_REPORTED_PROPERTIES, "3"),
        ] {
            tx.send(MethodRequest {
                name: name.into(),
                request_id: request_id.into(),
                payload: None,
            })
            .await
            .unwrap();
        }
        drop(tx);

        answer_methods(&device, requests, &console).await;

        assert_eq!(
            *device.answers.lock().unwrap(),
            vec![
                (
                    "1".to_owned(),
                    MethodResponse::ok(json!({ "interval": 30, "$version": 4 }))
                ),
                ("2".to_owned(), MethodResponse::not_implemented()),
                (
                    "3".to_owned(),
                    MethodResponse::ok(json!({ "interval": 10, "$version": 2 }))
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_method_call_is_answered_with_error_when_twin_is_unavailable() {
        let (console, _rx) = Console::channel();
        let device = FakeTwin::offline();
        let (tx, requests) = mpsc::channel(1);

        tx.send(MethodRequest {
            name: GET_DESIRED_PROPERTIES.into(),
            request_id: "9".into(),
            payload: None,
        })
        .await
        .unwrap();
        drop(tx);

        answer_methods(&device, requests, &console).await;

        assert_eq!(
            *device.answers.lock().unwrap(),
            vec![("9".to_owned(), MethodResponse::error())]
        );
    }
}
