fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use printlink_protocol::messages::{
        ChunkEnvelope, CommandMessage, CommandProgress, CommandResult, CommitMessage,
        DeviceReply, DeviceStatusMessage, UploadProgressReport, UploadResult,
    };
    use printlink_protocol::{Correlation, Destination, DeviceCommand, MessageType};
    use printlink_transport::frame::{self, BridgeHeader};

    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    fn load_bytes(name: &str) -> Vec<u8> {
        let path = fixtures_dir().join(name);
        fs::read(&path).unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()))
    }

    fn load_fixture(name: &str) -> serde_json::Value {
        serde_json::from_slice(&load_bytes(name))
            .unwrap_or_else(|e| panic!("failed to parse fixture {name}: {e}"))
    }

    /// Normalizes numbers so that `40` and `40.0` compare equal.
    ///
    /// Controllers written against loosely typed JSON emit integral
    /// percentages without a fraction; `f64` fields re-serialize with one.
    fn normalize_value(v: &serde_json::Value) -> serde_json::Value {
        match v {
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => serde_json::json!(f),
                None => v.clone(),
            },
            serde_json::Value::Object(map) => serde_json::Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), normalize_value(v)))
                    .collect(),
            ),
            serde_json::Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(normalize_value).collect())
            }
            _ => v.clone(),
        }
    }

    /// Decodes a fixture into `T`, encodes it again and compares the JSON
    /// values (order-independent, number-normalized).
    fn roundtrip_test<T>(name: &str) -> T
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));

        assert_eq!(
            normalize_value(&fixture),
            normalize_value(&reserialized),
            "roundtrip mismatch for {name}:\n  wire:  {fixture}\n  local: {reserialized}"
        );
        parsed
    }

    // --- Hub to controller ---

    #[test]
    fn fixture_chunk_first() {
        let chunk: ChunkEnvelope = roundtrip_test("chunk_first.json");
        assert!(chunk.is_first());
        assert_eq!(chunk.destination, Some(Destination::Sdcard));

        let bytes = printlink_transfer::decode_payload(&chunk.payload).unwrap();
        assert_eq!(bytes.len() as u64, chunk.payload_length);
        assert!(bytes.starts_with(b"G28\n"));
    }

    #[test]
    fn fixture_chunk_next() {
        let chunk: ChunkEnvelope = roundtrip_test("chunk_next.json");
        assert!(!chunk.is_first());
        assert!(chunk.filename.is_none());
        assert_eq!(
            printlink_transfer::decode_payload(&chunk.payload).unwrap(),
            b"M84\n"
        );
    }

    #[test]
    fn fixture_commit() {
        let commit: CommitMessage = roundtrip_test("commit.json");
        assert_eq!(commit.msg_type, MessageType::Commit);
        assert_eq!(commit.destination, Destination::Local);
    }

    #[test]
    fn fixture_command_print_matches_builder() {
        let parsed: CommandMessage = roundtrip_test("command_print.json");
        let built = CommandMessage::new(
            "voron-01",
            "3e4b2a6c9d0f41b7a8e5c2d1f0a9b8c7",
            &DeviceCommand::Print {
                filename: "benchy.gcode".into(),
                origin: Destination::Sdcard,
            },
        );
        assert_eq!(parsed, built);
    }

    #[test]
    fn fixture_command_pause_has_no_print_fields() {
        let parsed: CommandMessage = roundtrip_test("command_pause.json");
        let built = CommandMessage::new(
            "voron-01",
            "7a1c0e9b8d2f43a6b5c4d3e2f1a0b9c8",
            &DeviceCommand::Pause,
        );
        assert_eq!(parsed, built);
        assert!(parsed.filename.is_none());
        assert!(parsed.origin.is_none());
    }

    // --- Controller to hub ---

    #[test]
    fn fixture_upload_result() {
        let result: UploadResult = roundtrip_test("upload_result.json");
        assert!(result.success);
        assert_eq!(result.target.as_deref(), Some("sdcard:/benchy.gcode"));

        let reply = DeviceReply::parse(&load_bytes("upload_result.json")).unwrap();
        assert!(reply.is_final());
        assert_eq!(reply.device_id(), Some("voron-01"));
        assert_eq!(
            reply.correlation(),
            Correlation::Transfer("5f0c9a1e-2b7d-4c55-9a43-6f1d2e8b7c10".into())
        );
    }

    #[test]
    fn fixture_upload_result_failed() {
        let result: UploadResult = roundtrip_test("upload_result_failed.json");
        assert!(!result.success);
        assert!(result.device_id.is_none());
        assert!(result.error.unwrap().starts_with("size mismatch"));
    }

    #[test]
    fn fixture_upload_progress() {
        let progress: UploadProgressReport = roundtrip_test("upload_progress.json");
        assert_eq!(progress.received_bytes, Some(65_536));

        let reply = DeviceReply::parse(&load_bytes("upload_progress.json")).unwrap();
        assert!(!reply.is_final());
    }

    #[test]
    fn fixture_command_result() {
        let _: CommandResult = roundtrip_test("command_result.json");
        let reply = DeviceReply::parse(&load_bytes("command_result.json")).unwrap();
        assert!(reply.is_final());
        assert_eq!(
            reply.correlation(),
            Correlation::Job("3e4b2a6c9d0f41b7a8e5c2d1f0a9b8c7".into())
        );
    }

    #[test]
    fn fixture_command_progress_integral_percent() {
        let progress: CommandProgress = roundtrip_test("command_progress.json");
        assert_eq!(progress.percent, Some(40.0));
    }

    #[test]
    fn fixture_device_status() {
        let status: DeviceStatusMessage = roundtrip_test("device_status.json");
        assert!(status.connected);
        assert!(status.printing());
    }

    #[test]
    fn device_status_ignores_unknown_fields() {
        let status = DeviceStatusMessage::parse(&load_bytes("device_status_full.json")).unwrap();
        assert_eq!(status.device_id.as_deref(), Some("voron-01"));
        assert!(status.connected);
        assert!(!status.printing());
    }

    // --- Broker bridge ---

    #[test]
    fn fixture_bridge_publish() {
        let header: BridgeHeader = roundtrip_test("bridge_publish.json");
        let framed = frame::encode_binary(&header, b"{}").unwrap();
        let (decoded, payload) = frame::parse_binary(&framed).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(payload, b"{}");
    }

    #[test]
    fn fixture_bridge_error() {
        let header: BridgeHeader = roundtrip_test("bridge_error.json");
        assert_eq!(header.reply_id(), Some("18"));

        let text = String::from_utf8(load_bytes("bridge_error.json")).unwrap();
        assert_eq!(frame::parse_text(&text).unwrap(), header);
    }
}
