use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use for4_auth::SessionClient;
use for4_core::{ClientSettings, Notification, Notifier};
use for4_realtime::TestTransport;
use for4_state::{repository::Repository, MemoryRepository, SettingItem};
use serde_json::{json, Value};

pub(crate) fn settings() -> ClientSettings {
    ClientSettings {
        envelope_passphrase: "test-passphrase".to_owned(),
        envelope_mac_secret: "test-mac-secret".to_owned(),
        ..Default::default()
    }
}

pub(crate) struct Fixture {
    pub transport: TestTransport,
    pub session: SessionClient,
    pub notifications: Arc<Mutex<Vec<Notification>>>,
}

/// A session logged in as user 1 with token `T`, its connection up.
pub(crate) async fn authenticated() -> Fixture {
    let transport = TestTransport::new();
    let repository: Arc<dyn Repository<SettingItem>> =
        Arc::new(MemoryRepository::<SettingItem>::new());
    let notifications = Arc::new(Mutex::new(Vec::new()));
    let notifier: Arc<dyn Notifier> = {
        let notifications = notifications.clone();
        Arc::new(move |n: Notification| notifications.lock().unwrap().push(n))
    };
    let session = SessionClient::new(
        &settings(),
        Arc::new(transport.clone()),
        repository,
        notifier,
    );

    respond(&transport, "Login", |_| {
        json!({ "success": true, "token": "T", "user": { "id": 1, "name": "A" } })
    });
    session.login("a@for4.com", "secret").await.unwrap();
    session
        .wait_for_connection(Duration::from_secs(5))
        .await
        .unwrap();
    notifications.lock().unwrap().clear();

    Fixture {
        transport,
        session,
        notifications,
    }
}

pub(crate) fn respond(transport: &TestTransport, event: &str, handler: fn(Value) -> Value) {
    transport.respond_with_envelope(event, settings().envelope_codec(), handler);
}

pub(crate) fn sealed(message: Value) -> Value {
    Value::String(settings().envelope_codec().encode(&message).unwrap())
}
