use std::net::UdpSocket;
use std::time::Duration;

use jaeger_client::trace::{Config, StartSpanOptions, TagValue};

#[test]
fn tracer_from_env_reports_to_configured_agent() {
    let agent = UdpSocket::bind("127.0.0.1:0").unwrap();
    agent.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
    let port = agent.local_addr().unwrap().port().to_string();

    let env_vars = vec![
        ("JAEGER_SERVICE_NAME", Some("env-service")),
        ("JAEGER_TAGS", Some("zone=a")),
        ("JAEGER_SAMPLER_TYPE", Some("const")),
        ("JAEGER_SAMPLER_PARAM", Some("1")),
        ("JAEGER_AGENT_HOST", Some("127.0.0.1")),
        ("JAEGER_AGENT_PORT", Some(port.as_str())),
        ("JAEGER_DISABLED", None),
        ("JAEGER_ENDPOINT", None),
    ];
    let config = temp_env::with_vars(env_vars, || Config::from_env().unwrap());
    assert_eq!(config.service_name(), "env-service");

    let tracer = config.build_tracer().unwrap();
    assert!(tracer
        .tags()
        .iter()
        .any(|tag| tag.key == "zone" && tag.value == TagValue::from("a")));
    tracer
        .start_span("from-env", StartSpanOptions::default())
        .unwrap()
        .finish();
    tracer.close();

    let mut buf = vec![0u8; 65_535];
    let received = agent.recv(&mut buf).unwrap();
    let batch: serde_json::Value = serde_json::from_slice(&buf[..received]).unwrap();
    assert_eq!(batch["process"]["serviceName"], "env-service");
    assert_eq!(batch["spans"][0]["operationName"], "from-env");
    assert_eq!(batch["spans"][0]["tags"][0]["key"], "sampler.type");
}

#[test]
fn disabled_from_env_reports_nothing() {
    let env_vars = vec![
        ("JAEGER_SERVICE_NAME", Some("off")),
        ("JAEGER_DISABLED", Some("true")),
    ];
    let tracer = temp_env::with_vars(env_vars, || Config::from_env().unwrap())
        .build_tracer()
        .unwrap();

    let span = tracer.start_span("ignored", StartSpanOptions::default()).unwrap();
    assert!(!span.context().is_sampled());
}
