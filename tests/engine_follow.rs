//! End-to-end traversal over mock domains.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use xcorrel::domains::mock::{mock_class, mock_object, mock_objects, MockDomain, MockStore};
use xcorrel::{
    Engine, EngineError, FnRule, Links, ListResult, MultiPath, Reference, Results, RuleError,
};

// alert -> pod -> log over three mock domains. ruleA turns a firing alert
// into a pod query; ruleB turns each pod into a log query by pod name.
fn correlation_engine() -> Engine {
    let mut e = Engine::new();
    e.add_domain(
        MockDomain::new("alert alert"),
        Some(Arc::new(MockStore::new("alert"))),
    );
    e.add_domain(
        MockDomain::new("k8s pod"),
        Some(Arc::new(
            MockStore::new("k8s").with("pods-firing", ["k8s/pod:p1", "k8s/pod:p2"]),
        )),
    );
    e.add_domain(
        MockDomain::new("log log"),
        Some(Arc::new(
            MockStore::new("log")
                .with("logs-p1", ["log/log:l1"])
                .with("logs-p2", ["log/log:l2"]),
        )),
    );
    e
}

fn rule_a() -> xcorrel::RuleRef {
    FnRule::new(
        "AlertToPod",
        mock_class("alert/alert"),
        mock_class("k8s/pod"),
        |obj, _| {
            if obj.as_str().is_some_and(|s| s.ends_with("firing")) {
                Ok(Reference::new("pods-firing", ""))
            } else {
                Ok(Reference::EMPTY)
            }
        },
    )
}

fn rule_b() -> xcorrel::RuleRef {
    FnRule::new(
        "PodToLog",
        mock_class("k8s/pod"),
        mock_class("log/log"),
        |obj, _| {
            let name = obj
                .as_str()
                .and_then(|s| s.rsplit_once(':'))
                .map(|(_, name)| name)
                .ok_or_else(|| RuleError::MissingField("pod name".into()))?;
            Ok(Reference::new(format!("logs-{name}"), ""))
        },
    )
}

#[tokio::test]
async fn test_two_hop_follow() {
    let e = correlation_engine();
    let path = MultiPath::new(vec![Links::from(rule_a()), Links::from(rule_b())]);
    let mut results = Results::new();
    e.follow(
        &CancellationToken::new(),
        &[mock_object("alert/alert:firing")],
        None,
        &path,
        &mut results,
    )
    .await
    .unwrap();

    let pods = results.find(&mock_class("k8s/pod")).unwrap();
    assert_eq!(pods.references.as_slice(), &[Reference::new("pods-firing", "")]);
    assert_eq!(
        pods.objects.list(),
        mock_objects(["k8s/pod:p1", "k8s/pod:p2"]).as_slice()
    );

    // Last hop: references are recorded but not dereferenced.
    let logs = results.find(&mock_class("log/log")).unwrap();
    assert_eq!(
        logs.references.as_slice(),
        &[Reference::new("logs-p1", ""), Reference::new("logs-p2", "")]
    );
    assert!(logs.objects.is_empty());
}

#[tokio::test]
async fn test_declining_rule_is_not_an_error() {
    let e = correlation_engine();
    let path = MultiPath::new(vec![Links::from(rule_a())]);
    let mut results = Results::new();
    // A resolved alert: ruleA declines, no references, no error.
    e.follow(
        &CancellationToken::new(),
        &[mock_object("alert/alert:resolved")],
        None,
        &path,
        &mut results,
    )
    .await
    .unwrap();
    assert!(results.find(&mock_class("k8s/pod")).unwrap().references.is_empty());
}

#[tokio::test]
async fn test_references_are_deduplicated_per_hop() {
    let e = correlation_engine();
    let path = MultiPath::new(vec![Links::from(rule_a())]);
    let mut results = Results::new();
    // Two firing starters produce the same reference once.
    e.follow(
        &CancellationToken::new(),
        &mock_objects(["alert/alert:firing", "alert/alert:also-firing"]),
        None,
        &path,
        &mut results,
    )
    .await
    .unwrap();
    let pods = results.find(&mock_class("k8s/pod")).unwrap();
    assert_eq!(pods.references.len(), 1);
}

#[tokio::test]
async fn test_invalid_paths_fail_fast() {
    let e = correlation_engine();
    let mut results = Results::new();
    let ctx = CancellationToken::new();

    let err = e
        .follow(&ctx, &[], None, &MultiPath::default(), &mut results)
        .await
        .unwrap_err();
    assert!(matches!(
        err.iter().next().unwrap(),
        EngineError::InvalidPath(_)
    ));

    let empty_links = MultiPath::new(vec![Links::default()]);
    let err = e
        .follow(&ctx, &[], None, &empty_links, &mut results)
        .await
        .unwrap_err();
    assert!(matches!(
        err.iter().next().unwrap(),
        EngineError::InvalidPath(_)
    ));
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_error_aggregation_keeps_successful_references() {
    let e = correlation_engine();
    let failing = FnRule::new(
        "Broken",
        mock_class("alert/alert"),
        mock_class("k8s/pod"),
        |_, _| Err(RuleError::Template("undefined value".into())),
    );
    let path = MultiPath::new(vec![Links::new(vec![failing, rule_a()])]);
    let mut results = Results::new();
    let err = e
        .follow(
            &CancellationToken::new(),
            &[mock_object("alert/alert:firing")],
            None,
            &path,
            &mut results,
        )
        .await
        .unwrap_err();

    assert_eq!(err.len(), 1);
    let rule_err = err.iter().next().unwrap();
    assert!(matches!(rule_err, EngineError::Rule { rule, .. } if rule == "Broken"));
    // The successful rule's reference is still recorded.
    let pods = results.find(&mock_class("k8s/pod")).unwrap();
    assert_eq!(pods.references.as_slice(), &[Reference::new("pods-firing", "")]);
}

#[tokio::test]
async fn test_store_failure_keeps_partial_objects() {
    let mut e = Engine::new();
    e.add_domain(
        MockDomain::new("m a"),
        Some(Arc::new(
            MockStore::new("m").with_failure("flaky", ["m/a:1", "m/a:2"], "backend down"),
        )),
    );
    let mut objects = ListResult::new();
    let err = e
        .get_all(
            &CancellationToken::new(),
            &mock_class("m/a"),
            &[Reference::new("flaky", "")],
            &mut objects,
        )
        .await
        .unwrap_err();

    assert_eq!(objects.len(), 2);
    assert_eq!(err.len(), 1);
    assert!(matches!(
        err.iter().next().unwrap(),
        EngineError::Store { .. }
    ));
}

#[tokio::test]
async fn test_get_all_aggregates_per_reference() {
    let mut e = Engine::new();
    e.add_domain(
        MockDomain::new("m a"),
        Some(Arc::new(MockStore::new("m").with("good", ["m/a:1"]))),
    );
    let mut objects = ListResult::new();
    let err = e
        .get_all(
            &CancellationToken::new(),
            &mock_class("m/a"),
            &[
                Reference::new("missing", ""),
                Reference::new("good", ""),
                Reference::new("also-missing", ""),
            ],
            &mut objects,
        )
        .await
        .unwrap_err();
    // Both failures reported, the good reference still fetched.
    assert_eq!(err.len(), 2);
    assert_eq!(objects.len(), 1);
}

#[tokio::test]
async fn test_get_all_without_store_is_not_found() {
    let mut e = Engine::new();
    e.add_domain(MockDomain::new("m a"), None);
    let mut objects = ListResult::new();
    let err = e
        .get_all(
            &CancellationToken::new(),
            &mock_class("m/a"),
            &[Reference::new("x", "")],
            &mut objects,
        )
        .await
        .unwrap_err();
    assert!(matches!(err.iter().next().unwrap(), EngineError::NoStore(_)));
}

#[tokio::test]
async fn test_get_last_dereferences_newest_entry() {
    let e = correlation_engine();
    let path = MultiPath::new(vec![Links::from(rule_a()), Links::from(rule_b())]);
    let mut results = Results::new();
    e.follow(
        &CancellationToken::new(),
        &[mock_object("alert/alert:firing")],
        None,
        &path,
        &mut results,
    )
    .await
    .unwrap();

    // Fill in the objects the last hop left as references.
    e.get_last(&CancellationToken::new(), &mut results)
        .await
        .unwrap();
    let logs = results.find(&mock_class("log/log")).unwrap();
    assert_eq!(
        logs.objects.list(),
        mock_objects(["log/log:l1", "log/log:l2"]).as_slice()
    );
}

#[tokio::test]
async fn test_get_last_on_empty_results_is_noop() {
    let e = correlation_engine();
    let mut results = Results::new();
    e.get_last(&CancellationToken::new(), &mut results)
        .await
        .unwrap();
    assert!(results.is_empty());
}

#[tokio::test]
async fn test_follow_all_concatenates_paths() {
    let e = correlation_engine();
    let one_hop = MultiPath::new(vec![Links::from(rule_a())]);
    let two_hop = MultiPath::new(vec![Links::from(rule_a()), Links::from(rule_b())]);
    let mut results = Results::new();
    e.follow_all(
        &CancellationToken::new(),
        &[mock_object("alert/alert:firing")],
        None,
        &[one_hop, two_hop],
        &mut results,
    )
    .await
    .unwrap();

    // Both paths contribute; the pod reference dedups within each path's
    // hop but objects accumulate per path.
    let pods = results.find(&mock_class("k8s/pod")).unwrap();
    assert_eq!(pods.references.len(), 1);
    assert_eq!(pods.objects.len(), 2); // Only the two-hop path dereferenced.
    assert!(results.find(&mock_class("log/log")).is_some());
}

#[tokio::test]
async fn test_cancellation_between_hops_keeps_partial_results() {
    let e = correlation_engine();
    let ctx = CancellationToken::new();
    // ruleA cancels the context as a side effect, so the walk stops before
    // dereferencing the hop's references.
    let cancelling = {
        let ctx = ctx.clone();
        FnRule::new(
            "CancelAfterApply",
            mock_class("alert/alert"),
            mock_class("k8s/pod"),
            move |_, _| {
                ctx.cancel();
                Ok(Reference::new("pods-firing", ""))
            },
        )
    };
    let path = MultiPath::new(vec![Links::from(cancelling), Links::from(rule_b())]);
    let mut results = Results::new();
    let err = e
        .follow(
            &ctx,
            &[mock_object("alert/alert:firing")],
            None,
            &path,
            &mut results,
        )
        .await
        .unwrap_err();

    assert!(err.iter().any(|e| matches!(e, EngineError::Cancelled)));
    // The hop's references were recorded before cancellation took effect.
    let pods = results.find(&mock_class("k8s/pod")).unwrap();
    assert_eq!(pods.references.len(), 1);
    assert!(pods.objects.is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let e = correlation_engine();
    let ctx = CancellationToken::new();
    ctx.cancel();
    let path = MultiPath::new(vec![Links::from(rule_a())]);
    let mut results = Results::new();
    let err = e
        .follow(
            &ctx,
            &[mock_object("alert/alert:firing")],
            None,
            &path,
            &mut results,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err.iter().next().unwrap(),
        EngineError::Cancelled
    ));
    assert!(results.is_empty());
}
