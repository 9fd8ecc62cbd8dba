// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates two memoizers sharing one store so a slow report is built only once.
//!
//! Each memoizer stands in for a separate process. Concurrent requests in the same
//! memoizer are coalesced in memory; requests from the other memoizer wait on the
//! distributed lock and then read the stored report.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use recall::{MemoTelemetry, Memoizer, TracingErrorSink, WrapOptions};
use recall_store::MemoryStore;
use tick::Clock;

#[tokio::main]
async fn main() -> Result<(), recall::Error> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::DEBUG).init();

    let clock = Clock::new_tokio();
    let store = MemoryStore::new(clock.clone());
    let builds = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for process in 1..=2 {
        let memoizer = Memoizer::builder(store.clone(), clock.clone())
            .error_sink(TracingErrorSink)
            .telemetry(MemoTelemetry::new().with_logs())
            .build()?;
        let build_report = {
            let builds = Arc::clone(&builds);
            let clock = clock.clone();
            move |region: String| {
                let builds = Arc::clone(&builds);
                let clock = clock.clone();
                async move {
                    let count = builds.fetch_add(1, Ordering::SeqCst) + 1;
                    println!("  building report for {region} (build #{count})");
                    clock.delay(Duration::from_millis(300)).await;
                    Ok::<_, String>(format!("report[{region}]"))
                }
            }
        };
        let report = Arc::new(memoizer.wrap(build_report, WrapOptions::new("report").ttl(Duration::from_secs(60)))?);

        for request in 1..=3 {
            let report = Arc::clone(&report);
            handles.push(tokio::spawn(async move {
                let result = report.call("emea".to_owned()).await;
                println!("  [process {process}, request {request}] got {result:?}");
            }));
        }
        clock.delay(Duration::from_millis(20)).await;
    }

    for handle in handles {
        if let Err(error) = handle.await {
            eprintln!("request task failed: {error}");
        }
    }

    println!("\nReport built {} time(s) for 6 requests.", builds.load(Ordering::SeqCst));
    Ok(())
}
