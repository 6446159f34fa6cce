//! End-to-end tests of the SPNEGO gate inside a pipeline.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use http::header::{AUTHORIZATION, WWW_AUTHENTICATE};
use http::StatusCode;
use http_body_util::{BodyExt, Full};
use kerbgate::{
    identity, keytab_lookup_fn, FileKeytabLookup, KerberosIdentity, KeytabLookup, NegotiationRequest,
    SpnegoConfig, SpnegoMiddleware, SpnegoNegotiator, TicketDecision,
};
use kerbgate_keytab::{enctype, EncryptionKey, Keytab, KeytabEntry, Principal};
use kerbgate_pipeline::{BoxFuture, Pipeline, Request, RequestContext, Response};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tracing_subscriber::fmt::MakeWriter;

const SERVICE: &str = "HTTP/sso.example.com@EXAMPLE.COM";

/// Treats the token as `user@REALM` and requires a service key in the keytab.
///
/// The key version of the selected key is reported as the `kvno` attribute.
fn validate(keytab: &Keytab, token: &[u8], _request: &NegotiationRequest) -> TicketDecision {
    let service = Principal::parse(SERVICE).unwrap();
    let Some(key) = keytab.find_key(&service, None, enctype::AES256_CTS_HMAC_SHA1_96) else {
        return TicketDecision::Rejected("no service key".to_string());
    };
    // service_keytab() derives the key bytes from the key version
    let kvno = key.contents()[0];

    match std::str::from_utf8(token).ok().map(Principal::parse) {
        Some(Ok(client)) => TicketDecision::Accepted {
            identity: KerberosIdentity::new(client.name(), client.realm())
                .with_attribute("kvno", kvno.to_string()),
            response_token: None,
        },
        _ => TicketDecision::Rejected("unreadable ticket".to_string()),
    }
}

fn service_keytab(kvno: u32) -> Keytab {
    let mut keytab = Keytab::new();
    keytab.add_entry(KeytabEntry::new(
        Principal::parse(SERVICE).unwrap(),
        1_700_000_000,
        kvno,
        EncryptionKey::new(enctype::AES256_CTS_HMAC_SHA1_96, vec![kvno as u8; 32]),
    ));
    keytab
}

fn pipeline_with(lookup: impl KeytabLookup) -> Pipeline {
    let config = SpnegoConfig::new(SpnegoNegotiator::new(validate)).with_keytab_lookup(lookup);
    Pipeline::builder()
        .add_stage(SpnegoMiddleware::new(config).unwrap())
        .build()
}

fn request(client: Option<&str>) -> Request {
    let mut builder = http::Request::builder().uri("/whoami");
    if let Some(client) = client {
        builder = builder.header(AUTHORIZATION, format!("Negotiate {}", STANDARD.encode(client)));
    }
    builder.body(Full::new(Bytes::new())).unwrap()
}

/// Answers with the authenticated principal and the key version used.
fn whoami(ctx: &mut RequestContext, _request: Request) -> BoxFuture<'static, Response> {
    let text = identity(ctx)
        .map(|id| format!("{} kvno={}", id.principal(), id.attribute("kvno").unwrap_or("?")))
        .unwrap_or_default();
    Box::pin(async move {
        http::Response::builder()
            .status(StatusCode::OK)
            .body(Full::new(Bytes::from(text)))
            .unwrap()
    })
}

async fn body_text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

#[tokio::test]
async fn test_keytab_files_authenticate_callers() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("http.keytab");
    service_keytab(3).write_file(&path).unwrap();

    let pipeline = pipeline_with(FileKeytabLookup::new([&path]).unwrap());
    let mut ctx = RequestContext::new();
    let response = pipeline
        .process_with(&mut ctx, request(Some("alice@EXAMPLE.COM")), whoami)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "alice@EXAMPLE.COM kvno=3");

    let first = identity(&ctx).cloned().unwrap();
    let second = identity(&ctx).cloned().unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rotated_keytab_is_used_by_next_request() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("http.keytab");
    service_keytab(1).write_file(&path).unwrap();

    let pipeline = pipeline_with(FileKeytabLookup::new([&path]).unwrap());

    let response = pipeline
        .process(RequestContext::new(), request(Some("alice@EXAMPLE.COM")), whoami)
        .await;
    assert_eq!(body_text(response).await, "alice@EXAMPLE.COM kvno=1");

    service_keytab(2).write_file(&path).unwrap();

    let response = pipeline
        .process(RequestContext::new(), request(Some("alice@EXAMPLE.COM")), whoami)
        .await;
    assert_eq!(body_text(response).await, "alice@EXAMPLE.COM kvno=2");
}

#[tokio::test]
async fn test_missing_token_is_challenged() {
    let pipeline = pipeline_with(keytab_lookup_fn(|| Ok(service_keytab(1))));
    let mut ctx = RequestContext::new();

    let response = pipeline.process_with(&mut ctx, request(None), whoami).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Negotiate");
    assert!(identity(&ctx).is_none());
}

#[tokio::test]
async fn test_malformed_token_is_challenged() {
    let pipeline = pipeline_with(keytab_lookup_fn(|| Ok(service_keytab(1))));

    for value in ["Negotiate !!notbase64!!", "Negotiate"] {
        let req = http::Request::builder()
            .uri("/whoami")
            .header(AUTHORIZATION, value)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut ctx = RequestContext::new();
        let response = pipeline.process_with(&mut ctx, req, whoami).await;

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{value}");
        assert_eq!(response.headers().get(WWW_AUTHENTICATE).unwrap(), "Negotiate", "{value}");
        assert!(identity(&ctx).is_none(), "{value}");
    }
}

#[tokio::test]
async fn test_failing_lookup_never_reaches_handler() {
    let pipeline = pipeline_with(keytab_lookup_fn(|| {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "keytab unreadable").into())
    }));
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();

    let response = pipeline
        .process(RequestContext::new(), request(Some("alice@EXAMPLE.COM")), move |ctx, req| {
            counter.fetch_add(1, Ordering::SeqCst);
            whoami(ctx, req)
        })
        .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_text(response).await, "KeytabLookupFailed: keytab unreadable");
    assert_eq!(handled.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unknown_service_key_is_rejected() {
    let pipeline = pipeline_with(keytab_lookup_fn(|| Ok(Keytab::new())));

    let response = pipeline
        .process(RequestContext::new(), request(Some("alice@EXAMPLE.COM")), whoami)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.headers().get(WWW_AUTHENTICATE).unwrap(),
        "Negotiate oRQwEqADCgECoQsGCSqGSIb3EgECAg=="
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_keep_their_own_identity() {
    let pipeline = Arc::new(pipeline_with(keytab_lookup_fn(|| Ok(service_keytab(1)))));

    let tasks: Vec<_> = (0..32)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let client = format!("user{i}@EXAMPLE.COM");
                let mut ctx = RequestContext::new();
                let response = pipeline
                    .process_with(&mut ctx, request(Some(client.as_str())), whoami)
                    .await;
                let seen = identity(&ctx).map(KerberosIdentity::principal);
                (client, seen, body_text(response).await)
            })
        })
        .collect();

    for task in tasks {
        let (client, seen, body) = task.await.unwrap();
        assert_eq!(seen.as_deref(), Some(client.as_str()));
        assert_eq!(body, format!("{client} kvno=1"));
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[tokio::test]
async fn test_events_go_to_configured_logger() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();

    let config = SpnegoConfig::new(SpnegoNegotiator::new(validate))
        .with_keytab_lookup(keytab_lookup_fn(|| Err("vault sealed".into())))
        .with_logger(subscriber);
    let pipeline = Pipeline::builder()
        .add_stage(SpnegoMiddleware::new(config).unwrap())
        .build();

    let mut ctx = RequestContext::new();
    let response = pipeline
        .process_with(&mut ctx, request(Some("alice@EXAMPLE.COM")), whoami)
        .await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let text = logs.text();
    assert!(text.contains("KeytabLookupFailed: vault sealed"), "{text}");
    assert!(text.contains(&ctx.request_id().to_string()), "{text}");
}
