use std::time::Duration;

use request_tap::{PageId, RequestTap, ResponseRewrite, RewriteTable, UrlPattern};

#[tokio::test]
async fn independent_pages_do_not_share_streams() {
    let tap = RequestTap::new();
    let (first, second) = (PageId::new(), PageId::new());
    tap.enable(first);
    tap.enable(second);

    let mut sub = tap
        .subscribe(first, UrlPattern::contains("/query"))
        .unwrap();
    tap.record(second, "https://x/query?f=1", "GET");
    tap.record(first, "https://x/query?f=2", "GET");

    let event = tokio::time::timeout(Duration::from_secs(1), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.url, "https://x/query?f=2");
    assert_eq!(tap.snapshot(second).unwrap().requests, 1);
}

#[tokio::test]
async fn rewrite_table_drives_body_mutation() {
    let table = RewriteTable::new();
    table.push(ResponseRewrite::remove_key(
        UrlPattern::parse("**/datasets.json").unwrap(),
        "others",
    ));

    let rule = table.find("https://app/static/datasets.json").unwrap();
    let body = rule
        .apply(br#"{"assets":[],"others":[{"id":1}]}"#)
        .unwrap();
    assert_eq!(body, br#"{"assets":[]}"#.to_vec());
}
