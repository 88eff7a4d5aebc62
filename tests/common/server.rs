use std::{net::SocketAddr, sync::Arc, time::Duration};

use futures_util::{SinkExt, StreamExt};
use pairchat::{
    app,
    auth::{Auth, Clients},
    config::Config,
    objects::FsObjectStore,
    search::SqliteSearch,
    store::Store,
    AppState,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::broadcast,
    time::timeout,
};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{client::IntoClientRequest, http::HeaderValue, Message},
    MaybeTlsStream, WebSocketStream,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use super::StubAuth;

pub type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// The whole app on an ephemeral port, sessions in memory.
pub struct TestServer {
    pub addr: SocketAddr,
    pub store: Store,
    pub http: reqwest::Client,
    _objects: TempDir,
}

impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(Arc::new(StubAuth::default()), Clients::none()).await
    }

    pub async fn start_with(auth: Auth, clients: Clients) -> Self {
        let objects = tempfile::tempdir().unwrap();
        let objects_dir = objects.path().display().to_string();
        let config = Config::from_lookup(|key| match key {
            "FIREBASE_API_KEY" => Some("test-key".to_owned()),
            "OBJECTS_DIR" => Some(objects_dir.clone()),
            _ => None,
        })
        .unwrap();

        let sqlite = super::sqlite().await;
        let search = SqliteSearch::new(sqlite.pool().clone());
        let store: Store = Arc::new(sqlite);
        let (auth_events, _) = broadcast::channel(16);

        let state = AppState {
            store: store.clone(),
            objects: Arc::new(FsObjectStore::new(objects.path(), &config.public_url)),
            search: Arc::new(search),
            auth,
            clients,
            auth_events,
            config: Arc::new(config),
        };
        let router = app(state).layer(SessionManagerLayer::new(MemoryStore::default()).with_secure(false));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        Self { addr, store, http, _objects: objects }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Password sign-in; returns the `Cookie` header value of the new session.
    pub async fn sign_in(&self, email: &str) -> String {
        let response = self
            .http
            .post(self.url("/login"))
            .json(&json!({ "email": email, "password": "hunter22" }))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success(), "sign-in answered {}", response.status());
        session_cookie(&response)
    }

    pub async fn connect(&self, path: &str, cookie: &str) -> Socket {
        let mut request = format!("ws://{}{path}", self.addr).into_client_request().unwrap();
        request
            .headers_mut()
            .insert("cookie", HeaderValue::from_str(cookie).unwrap());
        let (socket, _) = connect_async(request).await.unwrap();
        socket
    }
}

pub fn session_cookie(response: &reqwest::Response) -> String {
    let header = response
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .expect("no session cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap_or(header).to_owned()
}

/// Next JSON text frame, skipping pings.
pub async fn next_frame(socket: &mut Socket) -> Value {
    loop {
        let message = timeout(Duration::from_secs(5), socket.next())
            .await
            .expect("no frame in time")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = message {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

pub async fn send_frame(socket: &mut Socket, frame: Value) {
    socket.send(Message::text(frame.to_string())).await.unwrap();
}
