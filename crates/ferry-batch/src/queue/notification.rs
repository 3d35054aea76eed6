//! S3 event notification payloads

use serde::Deserialize;

use crate::error::{BatchError, BatchResult};

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Bucket and key of an announced object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    pub key: String,
}

/// Extract every announced object from a notification body
///
/// S3 form-encodes object keys in notifications, so each key is decoded
/// before it is returned. A body with no records (an `s3:TestEvent`, or
/// anything that is not a bucket notification) is an error.
pub fn parse_notification(body: &str) -> BatchResult<Vec<ObjectLocation>> {
    let notification: S3EventNotification = serde_json::from_str(body)
        .map_err(|e| BatchError::Trigger(format!("malformed notification: {}", e)))?;

    if notification.records.is_empty() {
        return Err(BatchError::Trigger(
            "notification carries no records".to_string(),
        ));
    }

    notification
        .records
        .into_iter()
        .map(|r| {
            Ok(ObjectLocation {
                key: decode_key(&r.s3.object.key)?,
                bucket: r.s3.bucket.name,
            })
        })
        .collect()
}

/// `+` is a space, `%XX` an escaped byte
fn decode_key(raw: &str) -> BatchResult<String> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| BatchError::Trigger(format!("cannot decode object key '{}': {}", raw, e)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PUT_EVENT: &str = r#"{
        "Records": [{
            "eventVersion": "2.1",
            "eventSource": "aws:s3",
            "eventName": "ObjectCreated:Put",
            "s3": {
                "bucket": {"name": "b", "arn": "arn:aws:s3:::b"},
                "object": {"key": "in/people+list.csv", "size": 42}
            }
        }]
    }"#;

    #[test]
    fn test_parse_put_event() {
        let locations = parse_notification(PUT_EVENT).unwrap();
        assert_eq!(
            locations,
            vec![ObjectLocation {
                bucket: "b".to_string(),
                key: "in/people list.csv".to_string(),
            }]
        );
    }

    #[test]
    fn test_keys_are_form_decoded() {
        assert_eq!(decode_key("in/caf%C3%A9+menu.csv").unwrap(), "in/café menu.csv");
        assert_eq!(decode_key("a%2Bb.csv").unwrap(), "a+b.csv");
        assert_eq!(decode_key("plain.csv").unwrap(), "plain.csv");
        assert!(matches!(decode_key("bad%FF.csv"), Err(BatchError::Trigger(_))));
    }

    #[test]
    fn test_parse_rejects_test_event() {
        let body = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"b"}"#;
        assert!(matches!(
            parse_notification(body),
            Err(BatchError::Trigger(_))
        ));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_notification("not json").is_err());
        assert!(parse_notification(r#"{"Records":[{"s3":{}}]}"#).is_err());
    }
}
