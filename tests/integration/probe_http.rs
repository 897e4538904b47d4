//! Integration tests for HTTP probe measurement and classification.

// crates.io
use chrono::Utc;
use uptime_pulse::{
	Target,
	probe::{HttpProber, Prober},
};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{method, path},
};

fn target_for(url: &str) -> Target {
	Target::new("api", url, Utc::now()).expect("target")
}

#[tokio::test]
async fn measures_latency_ttfb_and_payload_on_success() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/"))
		.respond_with(ResponseTemplate::new(200).set_body_string("hello from the origin"))
		.expect(1)
		.mount(&server)
		.await;

	let prober = HttpProber::new().expect("prober");
	let outcome = prober.probe(&target_for(&server.uri())).await;

	assert!(outcome.is_success);
	assert_eq!(outcome.status_code, Some(200));
	assert_eq!(outcome.payload_bytes, Some(21));
	assert_eq!(outcome.error_message, None);
	assert!(outcome.elapsed_s > 0.);

	let ttfb = outcome.ttfb_s.expect("ttfb");

	assert!(ttfb <= outcome.elapsed_s);

	server.verify().await;
}

#[tokio::test]
async fn classifies_server_errors_as_http_failures() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/"))
		.respond_with(ResponseTemplate::new(503))
		.mount(&server)
		.await;

	let prober = HttpProber::new().expect("prober");
	let outcome = prober.probe(&target_for(&server.uri())).await;

	assert!(!outcome.is_success);
	assert_eq!(outcome.status_code, Some(503));
	assert_eq!(outcome.error_message.as_deref(), Some("HTTP 503"));
}

#[tokio::test]
async fn redirect_range_counts_as_success() {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/"))
		.respond_with(ResponseTemplate::new(200).set_body_string("ok"))
		.mount(&server)
		.await;
	Mock::given(method("GET"))
		.and(path("/old"))
		.respond_with(
			ResponseTemplate::new(302).insert_header("location", format!("{}/", server.uri())),
		)
		.mount(&server)
		.await;

	let prober = HttpProber::new().expect("prober");
	let outcome = prober.probe(&target_for(&format!("{}/old", server.uri()))).await;

	// The redirect is followed; the terminal 200 classifies the probe.
	assert!(outcome.is_success);
	assert_eq!(outcome.status_code, Some(200));
}

#[tokio::test]
async fn transport_failures_carry_no_status_code() {
	let _ = tracing_subscriber::fmt::try_init();

	// A server that is immediately dropped leaves a port nothing listens on.
	let unreachable = {
		let server = MockServer::start().await;

		server.uri()
	};
	let prober = HttpProber::new().expect("prober");
	let outcome = prober.probe(&target_for(&unreachable)).await;

	assert!(!outcome.is_success);
	assert_eq!(outcome.status_code, None);
	assert_eq!(outcome.payload_bytes, None);
	assert!(outcome.error_message.is_some());
	assert!(outcome.elapsed_s >= 0.);
}
