use super::*;

fn pending_with(id: u64) -> (PendingMap, oneshot::Receiver<Result<Value, CdpError>>) {
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (tx, rx) = oneshot::channel();
    pending.lock().insert(id, tx);
    (pending, rx)
}

#[tokio::test]
async fn test_dispatch_resolves_pending_result() {
    let (pending, rx) = pending_with(7);
    let resp: CdpResponse =
        serde_json::from_str(r#"{"id": 7, "result": {"frameId": "main"}}"#).unwrap();

    CdpClient::dispatch(resp, &pending);

    let value = rx.await.unwrap().unwrap();
    assert_eq!(value["frameId"], "main");
    assert!(pending.lock().is_empty());
}

#[tokio::test]
async fn test_dispatch_maps_protocol_error() {
    let (pending, rx) = pending_with(3);
    let resp: CdpResponse = serde_json::from_str(
        r#"{"id": 3, "error": {"code": -32000, "message": "No node with given id"}}"#,
    )
    .unwrap();

    CdpClient::dispatch(resp, &pending);

    match rx.await.unwrap() {
        Err(CdpError::Protocol { code, message }) => {
            assert_eq!(code, -32000);
            assert!(message.contains("No node"));
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_dispatch_ignores_events() {
    let (pending, _rx) = pending_with(1);
    let resp: CdpResponse =
        serde_json::from_str(r#"{"method": "Page.loadEventFired", "params": {}}"#).unwrap();

    CdpClient::dispatch(resp, &pending);

    assert_eq!(pending.lock().len(), 1);
}

#[test]
fn test_dispatch_unknown_id_is_dropped() {
    let (pending, _rx) = pending_with(1);
    let resp: CdpResponse = serde_json::from_str(r#"{"id": 99, "result": {}}"#).unwrap();

    CdpClient::dispatch(resp, &pending);

    assert!(pending.lock().contains_key(&1));
}
