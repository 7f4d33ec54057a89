use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use hubreq::prelude::{DomainErrorKind, ErrorKind, HubClient, HubError};
use hubreq::{BULK_PARTIAL_FAILURE_CODE, ERROR_CODE_HEADER};

struct OneShotServer {
    base_url: String,
    join: Option<JoinHandle<()>>,
}

impl OneShotServer {
    fn start(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind one-shot server");
        listener
            .set_nonblocking(true)
            .expect("set one-shot listener nonblocking");
        let address = listener
            .local_addr()
            .expect("read one-shot listener address");

        let join = thread::spawn(move || {
            let deadline = std::time::Instant::now() + Duration::from_secs(5);
            while std::time::Instant::now() < deadline {
                match listener.accept() {
                    Ok((mut stream, _)) => {
                        let _ = read_request_headers(&mut stream);

                        let mut response_head = format!(
                            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n",
                            status,
                            status_text(status),
                            body.len()
                        );
                        for (name, value) in &headers {
                            response_head.push_str(name);
                            response_head.push_str(": ");
                            response_head.push_str(value);
                            response_head.push_str("\r\n");
                        }
                        response_head.push_str("\r\n");

                        let _ = stream.write_all(response_head.as_bytes());
                        let _ = stream.write_all(&body);
                        let _ = stream.flush();
                        break;
                    }
                    Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Self {
            base_url: format!("http://{address}"),
            join: Some(join),
        }
    }
}

impl Drop for OneShotServer {
    fn drop(&mut self) {
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        409 => "Conflict",
        412 => "Precondition Failed",
        429 => "Too Many Requests",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        _ => "Unknown",
    }
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(4).position(|window| window == b"\r\n\r\n")
}

fn read_request_headers(stream: &mut std::net::TcpStream) -> std::io::Result<()> {
    stream.set_read_timeout(Some(Duration::from_secs(1)))?;
    let mut raw = Vec::new();
    loop {
        let mut chunk = [0_u8; 1024];
        let read = stream.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..read]);
        if find_header_end(&raw).is_some() {
            break;
        }
    }
    Ok(())
}

fn client_for(server: &OneShotServer) -> HubClient {
    HubClient::builder(server.base_url.clone())
        .static_authorization("SharedAccessSignature sr=contract")
        .operation_timeout(Duration::from_secs(2))
        .build()
}

async fn get_error(status: u16, headers: Vec<(String, String)>, body: &str) -> HubError {
    let server = OneShotServer::start(status, headers, body.as_bytes().to_vec());
    let client = client_for(&server);
    let error = client
        .get("/devices/contract")
        .send()
        .await
        .expect_err("request should return an error for this scenario");
    drop(server);
    error
}

fn assert_domain(error: &HubError, expected: DomainErrorKind, status: u16) {
    assert_eq!(error.kind(), ErrorKind::Domain);
    match error {
        HubError::Domain { kind, .. } => assert_eq!(*kind, expected),
        other => panic!("expected domain error, got {other}"),
    }
    assert_eq!(error.status(), Some(status));
    assert_eq!(error.is_transient(), expected.is_transient());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn mapped_statuses_produce_domain_errors() {
    let cases = [
        (404, DomainErrorKind::DeviceNotFound),
        (409, DomainErrorKind::DeviceAlreadyExists),
        (412, DomainErrorKind::PreconditionFailed),
        (429, DomainErrorKind::Throttled),
        (503, DomainErrorKind::ServerBusy),
    ];
    for (status, expected) in cases {
        let error = get_error(status, Vec::new(), "").await;
        assert_domain(&error, expected, status);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn domain_error_carries_service_code_and_message() {
    let error = get_error(
        404,
        vec![(ERROR_CODE_HEADER.to_owned(), "DeviceNotFound".to_owned())],
        r#"{"Message":"ErrorCode:DeviceNotFound;Device contract not registered"}"#,
    )
    .await;
    assert_domain(&error, DomainErrorKind::DeviceNotFound, 404);
    assert_eq!(error.error_code(), Some("DeviceNotFound"));
    assert!(error.to_string().contains("Device contract not registered"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unmapped_status_yields_transient_service_error() {
    let error = get_error(502, Vec::new(), "upstream unavailable").await;
    assert_eq!(error.kind(), ErrorKind::Service);
    assert!(error.is_transient());
    assert_eq!(error.status(), Some(502));
    assert!(error.to_string().contains("upstream unavailable"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn bulk_partial_failure_is_returned_as_success() {
    let server = OneShotServer::start(
        400,
        vec![(
            ERROR_CODE_HEADER.to_owned(),
            BULK_PARTIAL_FAILURE_CODE.to_owned(),
        )],
        br#"{"isSuccessful":false,"errors":[{"deviceId":"a","errorCode":"DeviceNotFound"}]}"#
            .to_vec(),
    );
    let client = client_for(&server);
    let result: serde_json::Value = client
        .post("/devices")
        .send_json()
        .await
        .expect("bulk partial failure should be processed as success");
    assert_eq!(result["isSuccessful"], false);
    assert_eq!(result["errors"][0]["deviceId"], "a");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn strict_classifier_maps_bulk_partial_failure() {
    let server = OneShotServer::start(
        400,
        vec![(
            ERROR_CODE_HEADER.to_owned(),
            BULK_PARTIAL_FAILURE_CODE.to_owned(),
        )],
        b"{}".to_vec(),
    );
    let client = HubClient::builder(server.base_url.clone())
        .static_authorization("SharedAccessSignature sr=contract")
        .clear_success_exemptions()
        .build();
    let error = client
        .post("/devices")
        .send()
        .await
        .expect_err("strict classifier should reject 400");
    assert_domain(&error, DomainErrorKind::InvalidArgument, 400);
    assert_eq!(error.error_code(), Some(BULK_PARTIAL_FAILURE_CODE));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn oversized_body_is_reported_as_service_error() {
    let server = OneShotServer::start(200, Vec::new(), vec![b'x'; 256]);
    let client = HubClient::builder(server.base_url.clone())
        .static_authorization("SharedAccessSignature sr=contract")
        .max_response_body_bytes(64)
        .build();
    let error = client
        .get("/devices/large")
        .send()
        .await
        .expect_err("body above the limit should fail");
    assert_eq!(error.kind(), ErrorKind::Service);
    assert!(error.to_string().contains("too large"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn refused_connection_is_communication_error() {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind probe listener");
    let address = listener.local_addr().expect("read probe address");
    drop(listener);

    let client = HubClient::builder(format!("http://{address}"))
        .static_authorization("SharedAccessSignature sr=contract")
        .operation_timeout(Duration::from_secs(2))
        .build();
    let error = client
        .get("/devices/unreachable")
        .send()
        .await
        .expect_err("closed port should fail");
    assert_eq!(error.kind(), ErrorKind::Communication);
    assert!(error.is_transient());
}
