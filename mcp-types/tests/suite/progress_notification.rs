use mcp_types::ClientNotification;
use mcp_types::JSONRPCMessage;
use mcp_types::ProgressParams;
use mcp_types::ProgressToken;
use pretty_assertions::assert_eq;

#[test]
fn deserialize_progress_notification() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/progress",
        "params": {
            "message": "Half way there",
            "progress": 0.5,
            "progressToken": 99,
            "total": 1.0
        }
    }"#;

    let msg: JSONRPCMessage = serde_json::from_str(raw).expect("invalid JSONRPCMessage");

    let JSONRPCMessage::Notification(notif) = msg else {
        unreachable!()
    };

    let client_notif: ClientNotification =
        ClientNotification::try_from(notif).expect("conversion must succeed");

    let ClientNotification::Progress(params) = client_notif else {
        unreachable!()
    };

    let expected_params = ProgressParams {
        message: Some("Half way there".into()),
        progress: 0.5,
        progress_token: ProgressToken::Integer(99),
        total: Some(1.0),
    };

    assert_eq!(params, expected_params);
}

#[test]
fn reject_array_params() {
    let raw = r#"{
        "jsonrpc": "2.0",
        "method": "notifications/progress",
        "params": [1, 2, 3]
    }"#;

    let msg: JSONRPCMessage = serde_json::from_str(raw).expect("invalid JSONRPCMessage");
    let JSONRPCMessage::Notification(notif) = msg else {
        unreachable!()
    };

    let err = ClientNotification::try_from(notif).expect_err("array params must be rejected");
    assert!(err.to_string().contains("must be an object"));
}
