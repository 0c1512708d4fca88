use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

use mailexport::export::repair::{parse_or_repair, repair};
use mailexport::mime::HeaderSet;

fn clean_headers() -> String {
    let mut text = String::new();
    text.push_str("From: Alice <alice@example.com>\r\n");
    text.push_str("To: team@example.com, bob@example.com\r\n");
    text.push_str("Subject: Quarterly numbers and the plan for next year\r\n");
    text.push_str("Message-ID: <q3-report@example.com>\r\n");
    for hop in 0..20 {
        text.push_str(&format!(
            "Received: from relay{hop}.example.com (relay{hop}.example.com [10.0.0.{hop}])\r\n\tby mx.example.com with ESMTP id {hop:08x}\r\n"
        ));
    }
    text.push_str("Content-Type: text/plain; charset=windows-1252\r\n");
    text
}

fn dirty_headers() -> String {
    let mut text = clean_headers();
    text.insert_str(0, "X-Mangled\0\u{FFFD}: yes\r\n");
    for i in 0..5 {
        text.push_str(&format!("stray line {i} without a colon\r\n"));
    }
    text
}

fn bench_parse(c: &mut Criterion) {
    let headers = clean_headers();
    c.bench_function("parse_clean_headers", |b| {
        b.iter(|| HeaderSet::parse(black_box(&headers)).unwrap())
    });
}

fn bench_repair(c: &mut Criterion) {
    let headers = dirty_headers();
    let error = HeaderSet::parse(&headers).unwrap_err();
    c.bench_function("repair_dirty_headers", |b| {
        b.iter(|| repair(black_box(&headers), error.clone(), 10).unwrap())
    });
    c.bench_function("parse_or_repair_dirty_headers", |b| {
        b.iter(|| parse_or_repair(black_box(&headers), 10).unwrap())
    });
}

criterion_group!(benches, bench_parse, bench_repair);
criterion_main!(benches);
