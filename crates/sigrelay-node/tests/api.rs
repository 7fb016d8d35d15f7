//! End-to-end tests of the HTTP surface, driven through the router without
//! opening sockets.

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderValue, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use sigrelay_core::{PeerId, Relay, RelayConfig};
use sigrelay_node::{build_router, AppState};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tower::ServiceExt;

struct Harness {
    router: Router,
    relay: Arc<Relay>,
    shutdown: watch::Sender<bool>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    fn with_config(config: RelayConfig) -> Self {
        let relay = Arc::new(Relay::new(config));
        let (shutdown, rx) = watch::channel(false);
        let router = build_router(
            AppState::new(Arc::clone(&relay), rx),
            HeaderValue::from_static("PeerConnectionTestServer/0.1g"),
        );
        Self {
            router,
            relay,
            shutdown,
        }
    }

    async fn call(&self, method: &str, uri: &str, body: impl Into<Body>) -> Response {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap();
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str) -> Response {
        self.call("GET", uri, Body::empty()).await
    }

    async fn sign_in(&self, name: &str) -> (PeerId, String) {
        let res = self.get(&format!("/sign_in?{name}")).await;
        assert_eq!(res.status(), StatusCode::OK);
        let id = pragma(&res).parse().unwrap();
        (id, body_text(res).await)
    }
}

fn pragma(res: &Response) -> String {
    res.headers()
        .get(header::PRAGMA)
        .expect("missing Pragma")
        .to_str()
        .unwrap()
        .to_string()
}

async fn body_text(res: Response) -> String {
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn common_headers_on_every_response() {
    let h = Harness::new();
    for res in [
        h.get("/sign_in?alice").await,
        h.get("/sign_out").await,
        h.get("/anything/else").await,
    ] {
        let headers = res.headers();
        let expected = [
            ("cache-control", "no-cache"),
            ("server", "PeerConnectionTestServer/0.1g"),
            ("access-control-allow-origin", "*"),
            ("access-control-allow-credentials", "true"),
            ("access-control-allow-methods", "GET,POST,OPTIONS"),
            (
                "access-control-allow-headers",
                "Content-Type,Content-Length,Cache-Control,Connection",
            ),
            ("access-control-expose-headers", "Content-Length,X-Peer-Id"),
            ("connection", "close"),
        ];
        for (name, value) in expected {
            assert_eq!(headers.get(name).unwrap(), value, "header {name}");
        }
    }
}

#[tokio::test]
async fn sign_in_returns_descriptor_and_id() {
    let h = Harness::new();
    let res = h.get("/sign_in?peername").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(pragma(&res), "1");
    assert_eq!(res.headers().get("x-peer-id").unwrap(), "1");
    assert_eq!(body_text(res).await, "peername,1,1\n");
}

#[tokio::test]
async fn sign_in_picks_first_valueless_param() {
    let h = Harness::new();
    let (_, body) = h.sign_in("notname=foo&name").await;
    assert_eq!(body, "name,1,1\n");
}

#[tokio::test]
async fn sign_in_without_name_is_bad_request() {
    let h = Harness::new();
    assert_eq!(h.get("/sign_in").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        h.get("/sign_in?name=value").await.status(),
        StatusCode::BAD_REQUEST
    );
}

#[tokio::test]
async fn wrong_method_is_bad_request() {
    let h = Harness::new();
    assert_eq!(
        h.call("POST", "/sign_in?alice", Body::empty()).await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        h.get("/message?peer_id=1&to=2").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        h.call("OPTIONS", "/wait?peer_id=1", Body::empty())
            .await
            .status(),
        StatusCode::BAD_REQUEST
    );
    assert!(h.relay.registry().is_empty());
}

#[tokio::test]
async fn rendezvous_scenario() {
    let h = Harness::new();

    let (alice, body) = h.sign_in("alice").await;
    assert_eq!(alice, PeerId(1));
    assert_eq!(body, "alice,1,1\n");

    let (bob, body) = h.sign_in("renderingserver_bob").await;
    assert_eq!(bob, PeerId(2));
    assert_eq!(body, "renderingserver_bob,2,1\nalice,1,1\n");

    let res = h.call("POST", "/message?peer_id=1&to=2", r#"{"x":1}"#).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(pragma(&res), "1");

    let res = h.get("/wait?peer_id=2").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(pragma(&res), "1");
    assert_eq!(res.headers().get(header::CONTENT_LENGTH).unwrap(), "7");
    assert_eq!(body_text(res).await, r#"{"x":1}"#);

    // Alice was told about bob when he signed in.
    let res = h.get("/wait?peer_id=1").await;
    assert_eq!(pragma(&res), "2");
    assert_eq!(body_text(res).await, "renderingserver_bob,2,1\n");
}

#[tokio::test]
async fn message_validation() {
    let h = Harness::new();
    h.sign_in("alice").await;

    for (uri, reason) in [
        ("/message", "Missing Peer or To ID\n"),
        ("/message?peer_id=1", "Missing Peer or To ID\n"),
        ("/message?to=1", "Missing Peer or To ID\n"),
        ("/message?peer_id=1&to=9", "Invalid Peer or To ID\n"),
        ("/message?peer_id=9&to=1", "Invalid Peer or To ID\n"),
        ("/message?peer_id=x&to=1", "Invalid Peer or To ID\n"),
    ] {
        let res = h.call("POST", uri, "hi").await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_text(res).await, reason, "{uri}");
    }
}

#[tokio::test]
async fn large_message_is_relayed_intact() {
    let h = Harness::new();
    h.sign_in("alice").await;
    h.sign_in("bob").await;

    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let res = h
        .call("POST", "/message?peer_id=1&to=2", payload.clone())
        .await;
    assert_eq!(res.status(), StatusCode::OK);

    let res = h.get("/wait?peer_id=2").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(pragma(&res), "1");
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(bytes.len(), payload.len());
    assert_eq!(&bytes[..], &payload[..]);
}

#[tokio::test]
async fn full_mailbox_is_service_unavailable() {
    let h = Harness::with_config(RelayConfig::default().with_mailbox_capacity(2));
    h.sign_in("alice").await;
    h.sign_in("bob").await;

    for _ in 0..2 {
        let res = h.call("POST", "/message?peer_id=1&to=2", "m").await;
        assert_eq!(res.status(), StatusCode::OK);
    }
    let res = h.call("POST", "/message?peer_id=1&to=2", "m").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_text(res).await, "Peer is backed up\n");
}

#[tokio::test]
async fn sign_out_frees_counterpart() {
    let h = Harness::new();
    let (alice, _) = h.sign_in("alice").await;
    let (bob, _) = h.sign_in("renderingserver_bob").await;
    h.call("POST", "/message?peer_id=1&to=2", "offer").await;
    assert_eq!(h.relay.lookup(bob).unwrap().connected_with, Some(alice));

    let res = h.get("/sign_out?peer_id=1").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(pragma(&res), "1");
    assert_eq!(h.relay.lookup(bob).unwrap().connected_with, None);

    // Unknown afterwards.
    assert_eq!(
        h.get("/sign_out?peer_id=1").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        h.get("/wait?peer_id=1").await.status(),
        StatusCode::BAD_REQUEST
    );

    // Bob pairs with the next initiator he talks to.
    let (carol, body) = h.sign_in("carol").await;
    assert_eq!(body, "carol,3,1\nrenderingserver_bob,2,1\n");
    h.call("POST", "/message?peer_id=2&to=3", "answer").await;
    assert_eq!(h.relay.lookup(bob).unwrap().connected_with, Some(carol));
}

#[tokio::test]
async fn wait_blocks_until_message() {
    let h = Harness::new();
    h.sign_in("alice").await;
    h.sign_in("bob").await;

    let pending = tokio::spawn({
        let router = h.router.clone();
        async move {
            let req = Request::get("/wait?peer_id=2").body(Body::empty()).unwrap();
            router.oneshot(req).await.unwrap()
        }
    });
    while !h.relay.lookup(PeerId(2)).unwrap().waiting {
        tokio::task::yield_now().await;
    }

    h.call("POST", "/message?peer_id=1&to=2", vec![0u8, 159, 146, 150])
        .await;
    let res = pending.await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], &[0u8, 159, 146, 150]);
    assert!(!h.relay.lookup(PeerId(2)).unwrap().waiting);
}

#[tokio::test]
async fn abandoned_wait_clears_waiting() {
    let h = Harness::new();
    let (alice, _) = h.sign_in("alice").await;

    let pending = tokio::spawn({
        let router = h.router.clone();
        async move {
            let req = Request::get("/wait?peer_id=1").body(Body::empty()).unwrap();
            router.oneshot(req).await
        }
    });
    while !h.relay.lookup(alice).unwrap().waiting {
        tokio::task::yield_now().await;
    }

    // The client going away drops the handler future.
    pending.abort();
    let _ = pending.await;
    assert!(!h.relay.lookup(alice).unwrap().waiting);
}

#[tokio::test]
async fn shutdown_releases_wait() {
    let h = Harness::new();
    h.sign_in("alice").await;

    let pending = tokio::spawn({
        let router = h.router.clone();
        async move {
            let req = Request::get("/wait?peer_id=1").body(Body::empty()).unwrap();
            router.oneshot(req).await.unwrap()
        }
    });
    while !h.relay.lookup(PeerId(1)).unwrap().waiting {
        tokio::task::yield_now().await;
    }

    h.shutdown.send_replace(true);
    let res = tokio::time::timeout(Duration::from_secs(1), pending)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn concurrent_sign_ins_get_distinct_ids() {
    let h = Harness::new();
    let tasks: Vec<_> = (0..64)
        .map(|i| {
            let router = h.router.clone();
            tokio::spawn(async move {
                let req = Request::get(format!("/sign_in?peer{i}"))
                    .body(Body::empty())
                    .unwrap();
                let res = router.oneshot(req).await.unwrap();
                pragma(&res)
            })
        })
        .collect();

    let mut ids = Vec::new();
    for task in tasks {
        ids.push(task.await.unwrap());
    }
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 64);
}

#[tokio::test]
async fn unrouted_path_is_ok_and_empty() {
    let h = Harness::new();
    let res = h.get("/favicon.ico").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert!(body_text(res).await.is_empty());
}
