use async_trait::async_trait;

use crate::error::DeviceError;
use crate::model::{MethodRequest, MethodResponse};
use crate::topic;

/// Sends answers to direct method calls back to the hub
#[async_trait]
pub trait MethodResponder: Send + Sync {
    async fn respond(
        &self,
        request: &MethodRequest,
        response: &MethodResponse,
    ) -> Result<(), DeviceError>;
}

/// Topic and body of the publish answering `request`.
///
/// The body is empty when the response has no payload.
pub(crate) fn reply(
    request: &MethodRequest,
    response: &MethodResponse,
) -> Result<(String, Vec<u8>), DeviceError> {
    let body = match &response.payload {
        Some(payload) => serde_json::to_vec(payload)?,
        None => Vec::new(),
    };
    Ok((
        topic::method_response(response.status, &request.request_id),
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn request(name: &str, request_id: &str) -> MethodRequest {
        MethodRequest {
            name: name.into(),
            request_id: request_id.into(),
            payload: None,
        }
    }

    #[test]
    fn test_reply_carries_status_request_id_and_payload() {
        let (topic, body) = reply(
            &request("GetDesiredProperties", "a1"),
            &MethodResponse::ok(json!({ "interval": 30 })),
        )
        .unwrap();

        assert_eq!(topic, "$iothub/methods/res/200/?$rid=a1");
        assert_eq!(body, br#"{"interval":30}"#.to_vec());
    }

    #[test]
    fn test_failed_replies_have_empty_body() {
        let (topic, body) = reply(&request("GetReportedProperties", "7"), &MethodResponse::error())
            .unwrap();
        assert_eq!(topic, "$iothub/methods/res/500/?$rid=7");
        assert!(body.is_empty());

        let (topic, body) =
            reply(&request("Reboot", "8"), &MethodResponse::not_implemented()).unwrap();
        assert_eq!(topic, "$iothub/methods/res/501/?$rid=8");
        assert!(body.is_empty());
    }
}
