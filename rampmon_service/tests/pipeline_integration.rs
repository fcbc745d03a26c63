/// Integration tests for the fetch → normalize → render pipeline
///
/// These tests verify:
/// 1. A Hydromet CSV body becomes a dataset of the same length and order
/// 2. Applying a ramp elevation yields the expected depths
/// 3. Repeated fetches inside the cache TTL hit the network once
/// 4. Transport failures (timeout, HTTP status) surface as FetchError and
///    leave no state behind for the next pass
///
/// Everything runs offline: a counting stub stands in for the endpoint, and
/// the HTTP tests talk to a throwaway server on 127.0.0.1.
///
/// Run with: cargo test --test pipeline_integration

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rampmon_service::analysis::depth::apply_reference;
use rampmon_service::ingest::hydromet::{HttpSource, HydrometSource};
use rampmon_service::levels::LevelFetcher;
use rampmon_service::model::{FetchError, LevelsError, ParseError};
use rampmon_service::render::{AxisLabels, JsonRenderer, Renderer};
use rampmon_service::stations::builtin_stations;
use std::cell::Cell;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::mpsc;
use std::thread;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const SCENARIO_BODY: &str = "DateTime,hpd_fb\n2024-06-01 00:00,4505.2\n2024-06-02 00:00,4504.8\n";

/// Always answers with the same body and counts how often it was asked.
struct CountingSource {
    body: Result<String, FetchError>,
    calls: Cell<usize>,
}

impl CountingSource {
    fn ok(body: &str) -> Self {
        Self {
            body: Ok(body.to_string()),
            calls: Cell::new(0),
        }
    }
}

impl HydrometSource for CountingSource {
    fn get_text(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.set(self.calls.get() + 1);
        self.body.clone()
    }
}

fn fetcher<S: HydrometSource>(source: S, base_url: &str) -> LevelFetcher<S> {
    LevelFetcher::new(source, base_url, builtin_stations().remove(0), Duration::hours(8))
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 2, 18, 0, 0).unwrap()
}

fn end_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 2).unwrap()
}

enum Reply {
    Respond(String),
    Hang(std::time::Duration),
}

/// Serves exactly one connection on an ephemeral port. Returns the base URL
/// and a channel carrying the request line that was received.
fn one_shot_server(reply: Reply) -> (String, mpsc::Receiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind test listener");
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::channel();

    thread::spawn(move || {
        let (mut stream, _) = match listener.accept() {
            Ok(conn) => conn,
            Err(_) => return,
        };

        let mut request = Vec::new();
        let mut buf = [0u8; 1024];
        while !request.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf) {
                Ok(0) | Err(_) => break,
                Ok(n) => request.extend_from_slice(&buf[..n]),
            }
        }
        let text = String::from_utf8_lossy(&request);
        let _ = tx.send(text.lines().next().unwrap_or_default().to_string());

        match reply {
            Reply::Respond(response) => {
                let _ = stream.write_all(response.as_bytes());
            }
            Reply::Hang(d) => thread::sleep(d),
        }
    });

    (format!("http://{}/pn-bin/daily.pl", addr), rx)
}

fn http_response(status: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\nContent-Type: text/plain\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    )
}

// ---------------------------------------------------------------------------
// Pipeline behaviour with a stub source
// ---------------------------------------------------------------------------

#[test]
fn test_reference_scenario_end_to_end() {
    let mut f = fetcher(CountingSource::ok(SCENARIO_BODY), "http://stub/daily.pl");
    let dataset = f.depth_at_ramp_at(end_date(), 30, 4501.0, now()).unwrap();

    let depths = dataset.depth_at_ramp.as_ref().unwrap().values.clone();
    assert_eq!(depths.len(), 2);
    assert!((depths[0] - 4.2).abs() < 1e-9, "got {}", depths[0]);
    assert!((depths[1] - 3.8).abs() < 1e-9, "got {}", depths[1]);
}

#[test]
fn test_two_fetches_within_eight_hours_hit_network_once() {
    let mut f = fetcher(CountingSource::ok(SCENARIO_BODY), "http://stub/daily.pl");
    f.fetch_levels_at(end_date(), 30, now()).unwrap();
    f.fetch_levels_at(end_date(), 30, now() + Duration::minutes(479)).unwrap();
    assert_eq!(f.source().calls.get(), 1);

    f.fetch_levels_at(end_date(), 30, now() + Duration::hours(8) + Duration::minutes(1))
        .unwrap();
    assert_eq!(f.source().calls.get(), 2);
}

#[test]
fn test_missing_forebay_column_fails_with_parse_error() {
    let mut f = fetcher(
        CountingSource::ok("DateTime,hpd_qj\n2024-06-01 00:00,15.0\n"),
        "http://stub/daily.pl",
    );
    let err = f.fetch_levels_at(end_date(), 30, now()).unwrap_err();
    assert!(matches!(err, LevelsError::Parse(ParseError::MissingColumn(ref c)) if c == "hpd_fb"));
}

#[test]
fn test_rendered_json_matches_applied_depths() {
    let mut f = fetcher(CountingSource::ok(SCENARIO_BODY), "http://stub/daily.pl");
    let raw = f.fetch_levels_at(end_date(), 30, now()).unwrap();
    let applied = apply_reference(&raw, 4504.0).unwrap();

    let mut renderer = JsonRenderer::new(Vec::new());
    renderer.render(&applied, &AxisLabels::default()).unwrap();
    let doc: serde_json::Value = serde_json::from_slice(&renderer.into_inner()).unwrap();

    let rows = doc["rows"].as_array().unwrap();
    assert_eq!(rows.len(), raw.len());
    assert!((rows[0]["depth_at_ramp_ft"].as_f64().unwrap() - 1.2).abs() < 1e-9);
}

// ---------------------------------------------------------------------------
// Real HTTP against a local server
// ---------------------------------------------------------------------------

#[test]
fn test_http_source_sends_provider_query_and_parses_body() {
    let (base_url, requests) = one_shot_server(Reply::Respond(http_response("200 OK", SCENARIO_BODY)));
    let source = HttpSource::new(std::time::Duration::from_secs(5)).unwrap();
    let mut f = fetcher(source, &base_url);

    let dataset = f.fetch_levels_at(end_date(), 30, now()).expect("local fetch should succeed");
    assert_eq!(dataset.len(), 2);

    let request_line = requests.recv().unwrap();
    assert_eq!(
        request_line,
        "GET /pn-bin/daily.pl?station=hpd&format=csv&year=2024&month=5&day=3\
         &year=2024&month=6&day=2&pcode=fb&pcode=qj HTTP/1.1"
    );
}

#[test]
fn test_non_success_status_is_fetch_error() {
    let (base_url, _requests) = one_shot_server(Reply::Respond(http_response(
        "503 Service Unavailable",
        "try later",
    )));
    let source = HttpSource::new(std::time::Duration::from_secs(5)).unwrap();
    let mut f = fetcher(source, &base_url);

    let err = f.fetch_levels_at(end_date(), 30, now()).unwrap_err();
    assert_eq!(err, LevelsError::Fetch(FetchError::HttpStatus(503)));
    assert!(f.cache().is_empty());
}

#[test]
fn test_timeout_is_fetch_error_and_next_call_is_independent() {
    let (hung_url, _requests) = one_shot_server(Reply::Hang(std::time::Duration::from_secs(3)));
    let source = HttpSource::new(std::time::Duration::from_millis(300)).unwrap();
    let mut f = fetcher(source, &hung_url);

    let err = f.fetch_levels_at(end_date(), 30, now()).unwrap_err();
    assert!(
        matches!(err, LevelsError::Fetch(FetchError::Timeout(_))),
        "expected timeout, got {:?}",
        err
    );
    assert!(f.cache().is_empty(), "a failed fetch must not be cached");

    // A fresh, independent pass against a healthy endpoint succeeds.
    let (ok_url, _requests) = one_shot_server(Reply::Respond(http_response("200 OK", SCENARIO_BODY)));
    let source = HttpSource::new(std::time::Duration::from_secs(5)).unwrap();
    let mut f = fetcher(source, &ok_url);
    assert_eq!(f.fetch_levels_at(end_date(), 30, now()).unwrap().len(), 2);
}

#[test]
fn test_connection_refused_is_fetch_error() {
    // Bind then drop to get a port nobody is listening on.
    let port = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port();
    let source = HttpSource::new(std::time::Duration::from_secs(2)).unwrap();
    let mut f = fetcher(source, &format!("http://127.0.0.1:{}/daily.pl", port));

    let err = f.fetch_levels_at(end_date(), 30, now()).unwrap_err();
    assert!(matches!(err, LevelsError::Fetch(_)), "got {:?}", err);
}
