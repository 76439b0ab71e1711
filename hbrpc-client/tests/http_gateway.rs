//! Client calls against an in-process gateway over HTTP.

mod common;

use bytes::{Bytes, BytesMut};
use common::{dispatch, Call, Handler};
use hbrpc_client::{Client, ClientError, ConnectionConfig, ProtocolKind, RegionInfo};
use hbrpc_protocol::ProtocolError;
use http_body_util::{BodyExt, Full};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Serves Thrift-over-HTTP on a loopback port and returns the gateway URL.
async fn start_http_gateway<H>(protocol: ProtocolKind, handler: H) -> String
where
    H: Fn(Call) -> Option<BytesMut> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handler: Handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let io = TokioIo::new(stream);
                let service = service_fn(move |req| {
                    let handler = handler.clone();
                    async move { handle_request(req, protocol, handler).await }
                });
                let _ = http1::Builder::new().serve_connection(io, service).await;
            });
        }
    });

    format!("http://{}/", addr)
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    protocol: ProtocolKind,
    handler: Handler,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let content_type = req
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    if req.method() != hyper::Method::POST
        || content_type.as_deref() != Some("application/x-thrift")
    {
        return Ok(Response::builder()
            .status(StatusCode::BAD_REQUEST)
            .body(Full::new(Bytes::new()))
            .unwrap());
    }

    let body = req.into_body().collect().await.unwrap().to_bytes();
    let response = match dispatch(protocol, body, handler.as_ref()) {
        Some(reply) => Response::builder()
            .status(StatusCode::OK)
            .header("content-type", "application/x-thrift")
            .body(Full::new(reply.freeze()))
            .unwrap(),
        None => Response::builder()
            .status(StatusCode::SERVICE_UNAVAILABLE)
            .body(Full::new(Bytes::new()))
            .unwrap(),
    };
    Ok(response)
}

#[tokio::test]
async fn test_region_info_over_http() {
    let url = start_http_gateway(ProtocolKind::Binary, |call| {
        assert_eq!(call.method(), "getRegionInfo");
        assert_eq!(call.args.text(1), b"t1,row,99999999999999");
        let region = RegionInfo {
            start_key: Bytes::from_static(b"a"),
            end_key: Bytes::from_static(b"m"),
            id: 42,
            name: Bytes::from_static(b"t1,a,42"),
            version: 1,
            server_name: "rs1.example".to_string(),
            port: 16020,
        };
        Some(call.reply(|a| {
            a.field(0, &region)?;
            Ok(())
        }))
    })
    .await;

    let mut client = Client::new(ConnectionConfig::http(url)).unwrap();
    client.open().await.unwrap();
    let region = client
        .region_info(b"t1,row,99999999999999")
        .await
        .unwrap();
    assert_eq!(region.id, 42);
    assert_eq!(region.server_name, "rs1.example");
    assert_eq!(region.end_key.as_ref(), b"m");

    client.close().await.unwrap();
    assert!(!client.is_open());
}

#[tokio::test]
async fn test_compact_over_http() {
    let url = start_http_gateway(ProtocolKind::Compact, |call| {
        let names = vec![Bytes::from_static(b"events")];
        Some(call.reply(|a| {
            a.list(0, &names)?;
            Ok(())
        }))
    })
    .await;

    let config = ConnectionConfig::http(url).with_protocol(ProtocolKind::Compact);
    let mut client = Client::new(config).unwrap();
    client.open().await.unwrap();
    assert_eq!(client.table_names().await.unwrap(), vec!["events"]);
}

#[tokio::test]
async fn test_http_error_status() {
    let url = start_http_gateway(ProtocolKind::Binary, |_| None).await;

    let mut client = Client::new(ConnectionConfig::http(url)).unwrap();
    client.open().await.unwrap();
    let err = client.enable_table("t1").await.unwrap_err();
    assert!(matches!(
        err.client_error(),
        Some(ClientError::HttpStatus(503))
    ));
    assert_eq!(err.to_string(), "Error:HTTP status 503;");
}

#[tokio::test]
async fn test_oversized_http_reply_rejected() {
    let url = start_http_gateway(ProtocolKind::Binary, |call| {
        let names: Vec<Bytes> = (0..100)
            .map(|i| Bytes::from(format!("table-{:0>64}", i)))
            .collect();
        Some(call.reply(|a| {
            a.list(0, &names)?;
            Ok(())
        }))
    })
    .await;

    let config = ConnectionConfig::http(url.clone()).with_max_message_size(1024);
    let mut client = Client::new(config).unwrap();
    client.open().await.unwrap();
    let err = client.table_names().await.unwrap_err();
    assert!(matches!(
        err.client_error(),
        Some(ClientError::Protocol(ProtocolError::SizeLimit { max: 1024, .. }))
    ));

    // The same reply fits under the default limit.
    let mut client = Client::new(ConnectionConfig::http(url)).unwrap();
    client.open().await.unwrap();
    assert_eq!(client.table_names().await.unwrap().len(), 100);
}
