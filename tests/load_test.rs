//! Concurrency and load testing for the proxy.

use std::time::{Duration, Instant};

use serde_json::Value;

mod common;

use common::{ALICE_TOKEN, BOB_TOKEN};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_requests_are_isolated() {
    let upstream = common::start_echo_backend().await;
    let mut config = common::proxy_config(upstream);
    config.upstream.pool.max_connections = 8;
    let (proxy, shutdown) = common::start_proxy(config).await;

    let concurrency = 20;
    let requests_per_task = 10;
    let total_requests = concurrency * requests_per_task;

    let client = common::client();
    let start = Instant::now();

    let mut tasks = Vec::new();
    for task in 0..concurrency {
        let client = client.clone();
        let url = format!("http://{}/api/generate", proxy);
        let token = if task % 2 == 0 { ALICE_TOKEN } else { BOB_TOKEN };
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for i in 0..requests_per_task {
                let payload = format!("task-{}-request-{}", task, i);
                let req_start = Instant::now();
                let res = client
                    .post(&url)
                    .bearer_auth(token)
                    .body(payload.clone())
                    .send()
                    .await
                    .expect("Proxy unreachable");
                assert!(res.status().is_success());

                let echo: Value = res.json().await.unwrap();
                assert_eq!(echo["body"], payload, "Response belongs to another request");
                assert_eq!(echo["target"], "/generate");
                latencies.push(req_start.elapsed());
            }
            latencies
        }));
    }

    let mut all_latencies = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }

    let duration = start.elapsed();
    assert_eq!(all_latencies.len(), total_requests);

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Total Requests: {}", total_requests);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Requests/sec:   {:.2}", total_requests as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");

    shutdown.trigger();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_retrying_request_does_not_delay_others() {
    let upstream = common::start_split_backend().await;
    let mut config = common::proxy_config(upstream);
    config.retries.delay_ms = 1500;
    let (proxy, shutdown) = common::start_proxy(config).await;

    let client = common::client();
    let stuck = {
        let client = client.clone();
        let url = format!("http://{}/api/fail", proxy);
        tokio::spawn(async move {
            client
                .get(&url)
                .bearer_auth(ALICE_TOKEN)
                .send()
                .await
                .expect("Proxy unreachable")
        })
    };

    // Let the first request reach its retry delay.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let start = Instant::now();
    let res = client
        .post(format!("http://{}/api/generate", proxy))
        .bearer_auth(BOB_TOKEN)
        .body("unrelated")
        .send()
        .await
        .expect("Proxy unreachable");
    assert!(res.status().is_success());
    let echo: Value = res.json().await.unwrap();
    assert_eq!(echo["body"], "unrelated");
    assert!(
        start.elapsed() < Duration::from_millis(500),
        "Unrelated request waited {:?}",
        start.elapsed()
    );
    assert!(!stuck.is_finished(), "Retrying request should still be in its delay");

    let res = stuck.await.unwrap();
    assert_eq!(res.status(), 500);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["retried"], true);
    assert_eq!(body["attempts"], 2);

    shutdown.trigger();
}
