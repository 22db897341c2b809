// Copyright (c) 2026 Bountyy Oy. All rights reserved.

use std::sync::Arc;

use courier::{Cookie, CookieJar, HeaderElement, MockResponse, MockTransport, Request, Session};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use url::Url;

fn cookie_parsing_benchmark(c: &mut Criterion) {
    let headers = vec![
        "sid=abc123; Path=/; HttpOnly",
        "pref = \"a;b=c\" ; Domain=example.com ; Version=1",
        "token=xyz; Expires=Wed, 09 Jun 2021 10:18:14 GMT; Secure",
    ];

    c.bench_function("parse_set_cookie", |b| {
        b.iter(|| {
            for header in &headers {
                black_box(Cookie::parse(header));
            }
        })
    });

    let jar = CookieJar::new();
    let url = Url::parse("http://www.example.com/account").unwrap();
    for i in 0..50 {
        jar.add_from_header(&format!("c{}=v{}; Path=/", i, i), &url);
    }
    c.bench_function("cookie_header_lookup", |b| {
        b.iter(|| black_box(jar.cookie_header(&url)))
    });
}

fn header_parsing_benchmark(c: &mut Criterion) {
    let value = "text/html; charset=ISO-8859-1, application/xhtml+xml; q=0.9, */*; q=0.8";

    c.bench_function("parse_header_elements", |b| {
        b.iter(|| black_box(HeaderElement::parse_all(value)))
    });
}

fn exchange_benchmark(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let transport = MockTransport::with_response(MockResponse::new().body(vec![b'x'; 64 * 1024]));
    let mut session = Session::with_transport(Arc::new(transport));
    let request = Request::post("http://example.com/upload").bytes(vec![b'y'; 64 * 1024]);

    c.bench_function("mock_exchange_64k", |b| {
        b.iter(|| {
            let response = rt.block_on(session.execute(&request)).unwrap();
            black_box(response.body_len())
        })
    });
}

criterion_group!(
    benches,
    cookie_parsing_benchmark,
    header_parsing_benchmark,
    exchange_benchmark
);
criterion_main!(benches);
