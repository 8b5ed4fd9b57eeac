//! Wire codec shared by every backend: flat JSON, UTF-8.

use pipeline::{QueueError, WorkItem};

/// Serialises a work item to its wire form.
pub(crate) fn encode(item: &WorkItem) -> Result<Vec<u8>, QueueError> {
    serde_json::to_vec(item).map_err(|e| QueueError::Publish {
        reason: format!("work item serialisation failed: {e}"),
    })
}

/// Deserialises a wire message back into a work item.
pub(crate) fn decode(payload: &[u8]) -> Result<WorkItem, QueueError> {
    serde_json::from_slice(payload).map_err(|e| QueueError::Decode {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{InstallationId, IssueNumber, RepositoryId};

    fn item(installation: Option<InstallationId>) -> WorkItem {
        WorkItem::new(
            RepositoryId::new("octocat/hello-world").unwrap(),
            IssueNumber::new(12),
            "/agent fix the bug",
            Some("octocat".to_string()),
            installation,
        )
        .unwrap()
    }

    #[test]
    fn round_trip_preserves_every_field() {
        let original = item(Some(InstallationId::new(998877)));
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trip_preserves_absent_installation() {
        let original = item(None);
        let decoded = decode(&encode(&original).unwrap()).unwrap();
        assert_eq!(decoded, original);
        assert!(decoded.installation_id.is_none());
    }

    #[test]
    fn wire_format_is_flat_json() {
        let encoded = encode(&item(None)).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(value["repository"], "octocat/hello-world");
        assert_eq!(value["issue_number"], 12);
        assert_eq!(value["command"], "/agent fix the bug");
        assert_eq!(value["user"], "octocat");
    }

    #[test]
    fn malformed_payload_is_a_decode_error() {
        let error = decode(b"not json at all").unwrap_err();
        assert!(matches!(error, QueueError::Decode { .. }));
    }
}
