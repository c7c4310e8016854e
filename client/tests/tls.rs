//! Client TLS settings against a real HTTPS server.
//!
//! # Design
//! Each test mints a throwaway CA and a leaf certificate for 127.0.0.1, then
//! serves a one-route router over rustls. Only a client that trusts the CA
//! gets through.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use httpkit_client::{Client, ClientError, Context, TlsConfig};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use rcgen::{BasicConstraints, CertificateParams, DnType, IsCa, KeyPair};
use tokio::net::TcpListener;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};
use tokio_rustls::rustls::{self, crypto::ring};
use tokio_rustls::TlsAcceptor;

struct TestPki {
    ca_pem: String,
    acceptor: TlsAcceptor,
}

fn test_pki() -> TestPki {
    let mut ca_params = CertificateParams::new(Vec::<String>::new()).unwrap();
    ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    ca_params
        .distinguished_name
        .push(DnType::CommonName, "httpkit test CA");
    let ca_key = KeyPair::generate().unwrap();
    let ca = ca_params.self_signed(&ca_key).unwrap();

    let mut leaf_params = CertificateParams::new(vec!["127.0.0.1".to_string()]).unwrap();
    leaf_params
        .distinguished_name
        .push(DnType::CommonName, "127.0.0.1");
    let leaf_key = KeyPair::generate().unwrap();
    let leaf = leaf_params.signed_by(&leaf_key, &ca, &ca_key).unwrap();

    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(leaf_key.serialize_der()));
    let config = rustls::ServerConfig::builder_with_provider(Arc::new(ring::default_provider()))
        .with_safe_default_protocol_versions()
        .unwrap()
        .with_no_client_auth()
        .with_single_cert(vec![leaf.der().clone()], key)
        .unwrap();

    TestPki {
        ca_pem: ca.pem(),
        acceptor: TlsAcceptor::from(Arc::new(config)),
    }
}

async fn serve_tls(acceptor: TlsAcceptor) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = Router::new().route("/", get(|| async { "Hello over TLS!" }));

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                continue;
            };
            let acceptor = acceptor.clone();
            let app = app.clone();
            tokio::spawn(async move {
                // Handshakes rejected by the client end here.
                let Ok(stream) = acceptor.accept(stream).await else {
                    return;
                };
                let _ = auto::Builder::new(TokioExecutor::new())
                    .serve_connection(TokioIo::new(stream), TowerToHyperService::new(app))
                    .await;
            });
        }
    });
    addr
}

#[tokio::test]
async fn client_trusting_the_ca_gets_the_body() {
    let pki = test_pki();
    let addr = serve_tls(pki.acceptor).await;

    let tls = TlsConfig::new()
        .add_root_certificate_pem(pki.ca_pem.as_bytes())
        .unwrap();
    let client = Client::builder().tls_config(tls).build().unwrap();

    let resp = client
        .get(&Context::background(), &format!("https://{addr}/"), &[])
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "Hello over TLS!");
}

#[tokio::test]
async fn default_client_rejects_unknown_ca() {
    let pki = test_pki();
    let addr = serve_tls(pki.acceptor).await;

    let client = Client::new().unwrap();
    let err = client
        .get(&Context::background(), &format!("https://{addr}/"), &[])
        .await
        .unwrap_err();
    match err {
        ClientError::Transport(err) => assert!(err.is_connect(), "{err:?}"),
        other => panic!("expected a transport error, got {other:?}"),
    }
}
