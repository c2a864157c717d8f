use oidc_interaction::{
    AccountConfig, AuthorizationParams, InteractionDetails, InteractionProvider, MissingGrants,
    Prompt, hash_password,
};
use oidc_server::{AppComponents, AppConfig, build_components, build_router};
use reqwest::{StatusCode, redirect::Policy};
use serde_json::Value;
use tokio::task::JoinHandle;

const RETURN_TO: &str = "http://localhost:3000/auth/resume";

struct TestServer {
    base: String,
    components: AppComponents,
    client: reqwest::Client,
    shutdown: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestServer {
    async fn stop(self) {
        let _ = self.shutdown.send(());
        let _ = self.handle.await;
    }

    async fn interaction(&self, details: InteractionDetails) -> String {
        self.components
            .provider
            .create_interaction(details, RETURN_TO)
            .await
            .expect("create interaction")
    }
}

fn test_config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.storage.cleanup_interval = None;
    cfg.provider.accounts = vec![AccountConfig {
        id: "alice".into(),
        email: "a@x.com".into(),
        password_hash: hash_password("correct horse").expect("hash"),
    }];
    cfg
}

async fn start_server() -> TestServer {
    let cfg = test_config();
    let components = build_components(&cfg).await.expect("build components");
    let app = build_router(&cfg, &components);

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = rx.await;
            })
            .await;
    });

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    TestServer {
        base: format!("http://{addr}"),
        components,
        client,
        shutdown: tx,
        handle,
    }
}

fn login_details() -> InteractionDetails {
    InteractionDetails::new(
        Prompt::login(),
        AuthorizationParams::default()
            .with("client_id", "foo")
            .with("scope", "openid email profile"),
    )
}

fn consent_details(scopes: &[&str]) -> InteractionDetails {
    InteractionDetails::new(
        Prompt::consent(MissingGrants {
            oidc_scope: scopes.iter().map(|s| s.to_string()).collect(),
            ..MissingGrants::default()
        }),
        AuthorizationParams::default().with("client_id", "foo"),
    )
    .with_session("alice")
}

fn assert_no_cache(resp: &reqwest::Response) {
    assert_eq!(resp.headers()["pragma"], "no-cache");
    assert_eq!(resp.headers()["cache-control"], "no-cache, no-store");
}

#[tokio::test]
async fn healthz_works() {
    let server = start_server().await;

    let resp = server
        .client
        .get(format!("{}/healthz", server.base))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_success());
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "ok");

    server.stop().await;
}

#[tokio::test]
async fn login_flow() {
    let server = start_server().await;
    let uid = server.interaction(login_details()).await;
    let url = format!("{}/interaction/{uid}", server.base);

    // GET renders the login form
    let resp = server.client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_no_cache(&resp);
    let html = resp.text().await.unwrap();
    assert!(html.contains(&format!("/interaction/{uid}/login")));

    // wrong password re-renders with a flash
    let resp = server
        .client
        .post(format!("{url}/login"))
        .form(&[("email", "a@x.com"), ("password", "wrong")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_no_cache(&resp);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Invalid email or password."));
    assert!(html.contains("value=\"a@x.com\""));

    // right password finishes the interaction
    let resp = server
        .client
        .post(format!("{url}/login"))
        .form(&[("email", "a@x.com"), ("password", "correct horse")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_no_cache(&resp);
    assert_eq!(resp.headers()["location"], RETURN_TO);

    let details = server
        .components
        .provider
        .interaction_details(&uid)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        details.result.unwrap().login.unwrap().account_id,
        "alice"
    );

    // resubmitting before the provider resumes redirects again
    let resp = server
        .client
        .post(format!("{url}/login"))
        .form(&[("email", "a@x.com"), ("password", "correct horse")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_eq!(resp.headers()["location"], RETURN_TO);

    // and an abort still wins over the recorded login
    let resp = server
        .client
        .get(format!("{url}/abort"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    let result = server
        .components
        .provider
        .interaction_details(&uid)
        .await
        .unwrap()
        .unwrap()
        .result
        .unwrap();
    assert_eq!(result.error.as_deref(), Some("access_denied"));
    assert!(result.login.is_none());

    server.stop().await;
}

#[tokio::test]
async fn consent_flow_creates_grant() {
    let server = start_server().await;
    let uid = server.interaction(consent_details(&["email", "profile"])).await;
    let url = format!("{}/interaction/{uid}", server.base);

    let resp = server.client.get(&url).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains(&format!("/interaction/{uid}/confirm")));
    assert!(html.contains("<li>profile</li>"));

    let resp = server
        .client
        .post(format!("{url}/confirm"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_no_cache(&resp);
    assert_eq!(resp.headers()["location"], RETURN_TO);

    let result = server
        .components
        .provider
        .interaction_details(&uid)
        .await
        .unwrap()
        .unwrap()
        .result
        .unwrap();
    let grant_id = result.consent.unwrap().grant_id;
    let grant = server
        .components
        .grants
        .find(&grant_id)
        .await
        .unwrap()
        .unwrap();
    assert!(grant.is_for("alice", "foo"));
    assert_eq!(grant.oidc_scope.len(), 2);

    server.stop().await;
}

#[tokio::test]
async fn abort_redirects_with_access_denied() {
    let server = start_server().await;
    let uid = server.interaction(consent_details(&["email"])).await;

    let resp = server
        .client
        .get(format!("{}/interaction/{uid}/abort", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SEE_OTHER);
    assert_no_cache(&resp);

    let result = server
        .components
        .provider
        .interaction_details(&uid)
        .await
        .unwrap()
        .unwrap()
        .result
        .unwrap();
    assert_eq!(result.error.as_deref(), Some("access_denied"));
    assert_eq!(
        result.error_description.as_deref(),
        Some("End-User aborted interaction")
    );

    server.stop().await;
}

#[tokio::test]
async fn sequence_violation_is_server_error() {
    let server = start_server().await;
    let uid = server.interaction(consent_details(&["email"])).await;

    let resp = server
        .client
        .post(format!("{}/interaction/{uid}/login", server.base))
        .form(&[("email", "a@x.com"), ("password", "correct horse")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_no_cache(&resp);

    server.stop().await;
}

#[tokio::test]
async fn unknown_interaction_is_bad_request() {
    let server = start_server().await;

    let resp = server
        .client
        .get(format!("{}/interaction/does-not-exist", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_no_cache(&resp);

    server.stop().await;
}
