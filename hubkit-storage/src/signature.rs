use chrono::{DateTime, SecondsFormat, Utc};

use crate::util::crypto::{SasError, hmac_sha256_base64};
use crate::util::http::encode_segment;

/// Storage service version used for requests and signatures
pub const SAS_VERSION: &str = "2018-11-09";

/// Read, write and delete
pub const CONTAINER_PERMISSIONS: &str = "rwd";

/// Build the query string of a service SAS granting [CONTAINER_PERMISSIONS]
/// on a whole container until `expiry`
pub fn container_sas(
    account: &str,
    key: &str,
    container: &str,
    expiry: DateTime<Utc>,
) -> Result<String, SasError> {
    let expiry = expiry.to_rfc3339_opts(SecondsFormat::Secs, true);
    let resource = format!("/blob/{account}/{container}");

    // permissions, start, expiry, resource, identifier, ip, protocol,
    // version, resource type, snapshot time, then the five response
    // header overrides
    let string_to_sign = [
        CONTAINER_PERMISSIONS,
        "",
        expiry.as_str(),
        resource.as_str(),
        "",
        "",
        "",
        SAS_VERSION,
        "c",
        "",
        "",
        "",
        "",
        "",
        "",
    ]
    .join("\n");
    let signature = hmac_sha256_base64(key, &string_to_sign)?;

    Ok(format!(
        "sv={SAS_VERSION}&sr=c&sig={}&se={}&sp={CONTAINER_PERMISSIONS}",
        encode_segment(&signature),
        encode_segment(&expiry)
    ))
}

/// Sign a body-less container request with the account key.
///
/// `headers` are the `x-ms-*` headers sent with the request and must be
/// sorted by name; `path` is the request path and `query` its
/// `name:value` resource parameters.
pub fn shared_key_signature(
    method: &str,
    account: &str,
    key: &str,
    headers: &[(&str, &str)],
    path: &str,
    query: &[(&str, &str)],
) -> Result<String, SasError> {
    // verb followed by the eleven standard headers, all empty
    let mut string_to_sign = format!("{method}\n{}", "\n".repeat(11));
    for (name, value) in headers {
        string_to_sign.push_str(&format!("{name}:{value}\n"));
    }
    string_to_sign.push_str(&format!("/{account}{path}"));
    for (name, value) in query {
        string_to_sign.push_str(&format!("\n{name}:{value}"));
    }

    let signature = hmac_sha256_base64(key, &string_to_sign)?;
    Ok(format!("SharedKey {account}:{signature}"))
}
