#![allow(dead_code)]

pub mod http_server;

use std::sync::Arc;
use std::time::Duration;

use cirrus_core::transport::{CurlOptions, CurlTransport};
use cirrus_core::{Endpoints, Engine, RetryPolicy};

/// Engine over libcurl against `base`, with short backoffs.
pub fn curl_engine(base: &str) -> Engine {
    let transport = CurlTransport::new(CurlOptions {
        connect_timeout: Duration::from_secs(2),
        default_timeout: Duration::from_secs(10),
        follow_redirects: false,
    });
    let endpoints = Endpoints::parse(base, None).expect("endpoint");
    Engine::new(Arc::new(transport), endpoints).with_policy(
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(20))
            .with_max_delay(Duration::from_millis(200))
            .with_max_attempts(3),
    )
}
