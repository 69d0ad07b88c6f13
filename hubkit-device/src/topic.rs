// Hub MQTT topics for twin and direct method traffic

pub const TWIN_RESPONSES: &str = "$iothub/twin/res/#";
pub const DESIRED_PATCHES: &str = "$iothub/twin/PATCH/properties/desired/#";
pub const METHOD_REQUESTS: &str = "$iothub/methods/POST/#";

const TWIN_RESPONSE_PREFIX: &str = "$iothub/twin/res/";
const DESIRED_PATCH_PREFIX: &str = "$iothub/twin/PATCH/properties/desired/";
const METHOD_REQUEST_PREFIX: &str = "$iothub/methods/POST/";

pub fn twin_get(request_id: &str) -> String {
    format!("$iothub/twin/GET/?$rid={request_id}")
}

pub fn reported_patch(request_id: &str) -> String {
    format!("$iothub/twin/PATCH/properties/reported/?$rid={request_id}")
}

pub fn method_response(status: u16, request_id: &str) -> String {
    format!("$iothub/methods/res/{status}/?$rid={request_id}")
}

/// An incoming topic the device knows how to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    TwinResponse {
        status: u16,
        request_id: String,
        version: Option<u64>,
    },
    DesiredPatch {
        version: Option<u64>,
    },
    MethodRequest {
        name: String,
        request_id: String,
    },
}

impl Topic {
    pub fn parse(topic: &str) -> Option<Topic> {
        if let Some(rest) = topic.strip_prefix(TWIN_RESPONSE_PREFIX) {
            let (status, query) = split_query(rest);
            let status = status.parse().ok()?;
            let request_id = query_value(query, "$rid")?.to_owned();
            let version = query_value(query, "$version").and_then(|v| v.parse().ok());
            return Some(Topic::TwinResponse {
                status,
                request_id,
                version,
            });
        }

        if let Some(rest) = topic.strip_prefix(DESIRED_PATCH_PREFIX) {
            let (_, query) = split_query(rest);
            let version = query_value(query, "$version").and_then(|v| v.parse().ok());
            return Some(Topic::DesiredPatch { version });
        }

        if let Some(rest) = topic.strip_prefix(METHOD_REQUEST_PREFIX) {
            let (name, query) = split_query(rest);
            if name.is_empty() {
                return None;
            }
            let request_id = query_value(query, "$rid")?.to_owned();
            return Some(Topic::MethodRequest {
                name: name.to_owned(),
                request_id,
            });
        }

        None
    }
}

/// Split `segment/?a=1&b=2` into `segment` and `a=1&b=2`
fn split_query(rest: &str) -> (&str, &str) {
    match rest.split_once('?') {
        Some((path, query)) => (path.trim_end_matches('/'), query),
        None => (rest.trim_end_matches('/'), ""),
    }
}

fn query_value<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_twin_response() {
        assert_eq!(
            Topic::parse("$iothub/twin/res/200/?$rid=12"),
            Some(Topic::TwinResponse {
                status: 200,
                request_id: "12".into(),
                version: None
            })
        );
        assert_eq!(
            Topic::parse("$iothub/twin/res/204/?$rid=13&$version=6"),
            Some(Topic::TwinResponse {
                status: 204,
                request_id: "13".into(),
                version: Some(6)
            })
        );
    }

    #[test]
    fn test_twin_response_without_request_id_is_ignored() {
        assert_eq!(Topic::parse("$iothub/twin/res/200/"), None);
        assert_eq!(Topic::parse("$iothub/twin/res/abc/?$rid=1"), None);
    }

    #[test]
    fn test_parse_desired_patch() {
        assert_eq!(
            Topic::parse("$iothub/twin/PATCH/properties/desired/?$version=9"),
            Some(Topic::DesiredPatch { version: Some(9) })
        );
    }

    #[test]
    fn test_parse_method_request() {
        assert_eq!(
            Topic::parse("$iothub/methods/POST/GetDesiredProperties/?$rid=ff"),
            Some(Topic::MethodRequest {
                name: "GetDesiredProperties".into(),
                request_id: "ff".into()
            })
        );
        assert_eq!(Topic::parse("$iothub/methods/POST//?$rid=1"), None);
    }

    #[test]
    fn test_unrelated_topic() {
        assert_eq!(Topic::parse("devices/dev1/messages/devicebound/x"), None);
    }

    #[test]
    fn test_outgoing_topics() {
        assert_eq!(twin_get("1"), "$iothub/twin/GET/?$rid=1");
        assert_eq!(
            reported_patch("2"),
            "$iothub/twin/PATCH/properties/reported/?$rid=2"
        );
        assert_eq!(method_response(500, "x"), "$iothub/methods/res/500/?$rid=x");
    }
}
