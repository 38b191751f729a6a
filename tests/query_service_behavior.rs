//! End-to-end behaviour of the query facade: partition, concurrent dispatch
//! and order-preserving merge.

mod support;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use curvestore_core::{
    ActualQuery, AuctionQuery, CurveStoreError, ErrorKind, ExtractionQuery, ExtractionRange,
    Granularity, HttpRequest, HttpResponse, Period, QueryBase, QueryService, RelativeInterval,
    ResilienceConfig, RetryConfig, TimeSeriesRow, VersionSelection, VersionedQuery,
};
use tokio_util::sync::CancellationToken;

use support::{client, ids_in, Reply, ScriptedHttpClient, BASE_URL};

fn rows_for(request: &HttpRequest) -> Reply {
    let rows: Vec<TimeSeriesRow> = ids_in(request)
        .into_iter()
        .map(|id| TimeSeriesRow {
            provider: String::from("EEX"),
            curve: format!("curve-{id}"),
            id,
            time: String::from("2024-06-30T00:00:00"),
            value: Some(f64::from(id)),
        })
        .collect();
    let body = serde_json::to_vec(&rows).expect("rows serialize");
    Reply::Respond(HttpResponse::ok_json(body))
}

fn slow_rows_for(request: &HttpRequest) -> Reply {
    match rows_for(request) {
        Reply::Respond(response) => Reply::Slow(Duration::from_millis(20), response),
        other => other,
    }
}

fn service(http: &Arc<ScriptedHttpClient>) -> QueryService {
    let resilience = ResilienceConfig::default().with_retry(RetryConfig::no_retry());
    QueryService::new(Arc::new(client(http, resilience)))
}

fn actual(ids: Vec<i32>) -> ActualQuery {
    ActualQuery::new(
        QueryBase::for_ids(ids, ExtractionRange::period(Period::days(-7))),
        Granularity::Day,
    )
}

#[tokio::test]
async fn thirty_ids_are_fetched_in_two_batches_and_merged_in_order() {
    // Given: a query over ids 1..=30
    let http = ScriptedHttpClient::responding(rows_for);
    let service = service(&http);
    let query = actual((1..=30).collect());

    // When
    let rows = service
        .actual(&query, &CancellationToken::new())
        .await
        .expect("both batches succeed");

    // Then: two calls of 25 and 5 ids
    let requests = http.requests();
    assert_eq!(requests.len(), 2);
    let mut sizes: Vec<usize> = requests.iter().map(|r| ids_in(r).len()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![5, 25]);
    assert!(requests
        .iter()
        .all(|r| r.url.starts_with(&format!("{BASE_URL}/ts/Day/P-7D?"))));

    // And: every id exactly once, in request order
    let ids: Vec<i32> = rows.iter().map(|row| row.id).collect();
    assert_eq!(ids, (1..=30).collect::<Vec<_>>());
    assert_eq!(ids.iter().collect::<HashSet<_>>().len(), 30);
}

#[tokio::test]
async fn a_failing_batch_does_not_hide_the_others() {
    // Given: the server rejects any batch containing id 26
    let http = ScriptedHttpClient::responding(|request| {
        if ids_in(request).contains(&26) {
            Reply::Respond(HttpResponse::new(500, Some("text/plain"), "partition down"))
        } else {
            rows_for(request)
        }
    });
    let service = service(&http);
    let query = actual((1..=30).collect());

    // When
    let outcomes = service
        .extract::<_, TimeSeriesRow>(&query, &CancellationToken::new())
        .await
        .expect("query is valid");

    // Then: outcomes follow partition order; only the second failed
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].ids.as_deref(), Some(&(1..=25).collect::<Vec<_>>()[..]));
    assert_eq!(outcomes[0].result.as_ref().map(Vec::len).ok(), Some(25));
    assert_eq!(outcomes[1].ids.as_deref(), Some(&[26, 27, 28, 29, 30][..]));
    let failure = outcomes[1].result.as_ref().expect_err("second batch failed");
    assert_eq!(failure.kind(), ErrorKind::Remote);

    // And: the merged view fails with that error
    let err = service
        .actual(&query, &CancellationToken::new())
        .await
        .expect_err("merge stops on the failed batch");
    assert!(err.to_string().contains("partition down"));
}

#[tokio::test]
async fn invalid_queries_are_rejected_before_dispatch() {
    let http = ScriptedHttpClient::responding(rows_for);
    let service = service(&http);

    let err = service
        .actual(&actual(Vec::new()), &CancellationToken::new())
        .await
        .expect_err("empty ids");

    assert!(matches!(err, CurveStoreError::InvalidQuery(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn versioned_selection_errors_are_caught_locally() {
    let http = ScriptedHttpClient::responding(rows_for);
    let service = service(&http);
    let query = VersionedQuery::new(
        QueryBase::for_ids(vec![1], ExtractionRange::period(Period::days(1))),
        Granularity::Hour,
        VersionSelection::LastN(0),
    );

    let err = service
        .versioned(&query, &CancellationToken::new())
        .await
        .expect_err("last-0 is invalid");

    assert_eq!(err.kind(), ErrorKind::InvalidQuery);
    assert_eq!(http.calls(), 0);
}

#[tokio::test]
async fn filter_queries_are_sent_as_a_single_call() {
    // Given: a filter-only auction query
    let http = ScriptedHttpClient::responding(|_| Reply::Respond(HttpResponse::ok_json("[]")));
    let service = service(&http);
    let query = AuctionQuery::new(QueryBase::for_filter(
        12,
        ExtractionRange::relative(RelativeInterval::RollingMonth),
    ));

    // When
    let outcomes = service
        .extract::<_, serde_json::Value>(&query, &CancellationToken::new())
        .await
        .expect("valid query");

    // Then
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].ids, None);
    assert_eq!(
        http.requests()[0].url,
        format!("{BASE_URL}{}", query.relative_url())
    );
}

#[tokio::test]
async fn custom_batch_size_changes_the_fan_out() {
    let http = ScriptedHttpClient::responding(rows_for);
    let service = service(&http).with_batch_size(10);

    let rows = service
        .actual(&actual((1..=30).collect()), &CancellationToken::new())
        .await
        .expect("all batches succeed");

    assert_eq!(http.calls(), 3);
    assert_eq!(rows.len(), 30);
    assert!(rows.windows(2).all(|pair| pair[0].id < pair[1].id));
}

#[tokio::test]
async fn more_batches_than_the_bulkhead_holds_are_all_fetched() {
    // Given: 1000 ids (40 batches) against a slow service and default limits
    let http = ScriptedHttpClient::responding(slow_rows_for);
    let service = QueryService::new(Arc::new(client(&http, ResilienceConfig::default())));
    let query = actual((1..=1000).collect());

    // When
    let outcomes = service
        .extract::<_, TimeSeriesRow>(&query, &CancellationToken::new())
        .await
        .expect("query is valid");

    // Then: no batch is turned away by the bulkhead
    assert_eq!(outcomes.len(), 40);
    assert!(outcomes.iter().all(|outcome| outcome.result.is_ok()));
    assert_eq!(http.calls(), 40);

    let ids: Vec<i32> = curvestore_core::merge(outcomes)
        .expect("every batch succeeded")
        .iter()
        .map(|row| row.id)
        .collect();
    assert_eq!(ids, (1..=1000).collect::<Vec<_>>());
}
