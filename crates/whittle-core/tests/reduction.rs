//! End-to-end reduction runs over in-process fake documents
//!
//! Each test assembles real [`Session`]s and a real [`Oracle`] over
//! [`FakeControl`] backends, so the whole pipeline short of the browser is
//! exercised: settle calls, screenshots, conjunctive checks, rollback, and
//! the phase order.

use std::sync::Arc;

use pretty_assertions::assert_eq;
use whittle_core::{run_and_close, run_reduction, Oracle, PhaseName, Reduction, ReportSink, Session};
use whittle_driver::DeviceProfile;
use whittle_testkit::{
    constant_render, signature_render, visible_text_render, FakeControl, FakeDom, RenderModel,
};

async fn ready_session(
    device: &str,
    html: &str,
    render: RenderModel,
    sink: Arc<ReportSink>,
) -> Session {
    let profile = DeviceProfile::resolve(device).unwrap();
    let control = FakeControl::new(html, render);
    let mut session = Session::new(profile, Box::new(control), sink);
    session.initialize(html).await.unwrap();
    session.capture_baseline().await.unwrap();
    session
}

async fn reduce(html: &str, phases: &[PhaseName], render: RenderModel) -> Reduction {
    let sink = Arc::new(ReportSink::new(None));
    let primary = ready_session("Desktop", html, render, Arc::clone(&sink)).await;
    let oracle = Oracle::new(primary, Vec::new());
    run_and_close(&oracle, phases, html.len()).await.unwrap()
}

/// Normalized form a document takes after a parse round-trip
fn parsed(html: &str) -> String {
    FakeDom::parse(html).serialize()
}

#[tokio::test]
async fn hidden_span_and_its_class_are_whittled_away() {
    // Only spans carrying class "a" draw anything; everything else draws its
    // text. The second span is invisible, so it and the "unused" class never
    // affect pixels, while class "a" is load-bearing.
    let html = "<html><head></head><body>\
                <div><span class=\"a b\">x</span><span class=\"unused\">y</span></div>\
                </body></html>";
    let render = visible_text_render(|dom, id| {
        dom.tag(id) != Some("span") || dom.classes(id).iter().any(|c| c == "a")
    });

    let reduction = reduce(
        html,
        &[PhaseName::Node, PhaseName::Attr, PhaseName::Class],
        render,
    )
    .await;

    assert!(reduction.pristine);
    // The invisible span goes in the node phase, token "b" in the class
    // phase; token "a" is load-bearing and survives both.
    assert_eq!(
        reduction.document,
        "<html><body><div><span class=\"a\">x</span></div></body></html>"
    );
    assert!(reduction.stats.nodes_removed >= 1);
    assert!(reduction.stats.classes_removed >= 1);
}

#[tokio::test]
async fn rejected_mutations_leave_the_document_untouched() {
    // Every serialization change is a pixel change, so nothing may commit.
    let html = "<html><head><title>t</title></head><body>\
                <p id=\"k\" class=\"x y\">body</p>\
                </body></html>";
    let render = signature_render(|dom: &FakeDom| dom.serialize());

    let reduction = reduce(
        html,
        &[PhaseName::Node, PhaseName::Attr, PhaseName::Class],
        render,
    )
    .await;

    assert!(reduction.pristine);
    assert_eq!(reduction.document, parsed(html));
    assert_eq!(reduction.stats.nodes_removed, 0);
    assert_eq!(reduction.stats.attributes_removed, 0);
    assert_eq!(reduction.stats.classes_removed, 0);
}

#[tokio::test]
async fn surviving_siblings_keep_their_order() {
    // <i> is invisible and goes; <b> and <u> draw text and must stay, in
    // order, even though <b> is detached and rolled back after its earlier
    // sibling was already committed away.
    let html = "<html><head></head><body><i>1</i><b>2</b><u>3</u></body></html>";
    let render = visible_text_render(|dom, id| dom.tag(id) != Some("i"));

    let reduction = reduce(html, &[PhaseName::Node], render).await;

    assert!(reduction.pristine);
    assert_eq!(
        reduction.document,
        "<html><body><b>2</b><u>3</u></body></html>"
    );
}

#[tokio::test]
async fn rollback_restores_position_before_a_removed_earlier_sibling_gap() {
    // Middle child is the only removable one; the last child's rejected
    // detach must reinsert it at the end, not somewhere else.
    let html = "<html><head></head><body><b>2</b><i>1</i><u>3</u></body></html>";
    let render = visible_text_render(|dom, id| dom.tag(id) != Some("i"));

    let reduction = reduce(html, &[PhaseName::Node], render).await;

    assert_eq!(
        reduction.document,
        "<html><body><b>2</b><u>3</u></body></html>"
    );
}

#[tokio::test]
async fn root_is_never_removed_even_when_nothing_renders() {
    // A constant render model accepts every removal, so the node phase strips
    // the document down to the bare root element.
    let html = "<html><head><title>t</title></head><body><div>x</div></body></html>";

    let reduction = reduce(html, &[PhaseName::Node], constant_render()).await;

    assert!(reduction.pristine);
    assert_eq!(reduction.document, "<html></html>");
}

#[tokio::test]
async fn output_never_grows() {
    let html = "<html><head></head><body>\
                <div class=\"a b c\" data-x=\"1\"><span>keep</span><span>me</span></div>\
                </body></html>";
    let render = visible_text_render(|_, _| true);

    let reduction = reduce(
        html,
        &[PhaseName::Node, PhaseName::Attr, PhaseName::Class],
        render,
    )
    .await;

    assert!(reduction.stats.output_size <= reduction.stats.input_size);
}

#[tokio::test]
async fn svg_dimensions_survive_an_accept_everything_run() {
    // Attribute phase only; width/height on svg are never candidates even
    // when the oracle would wave their removal through.
    let html = "<html><head></head><body>\
                <svg width=\"10\" height=\"10\" fill=\"red\"></svg>\
                </body></html>";

    let reduction = reduce(html, &[PhaseName::Attr], constant_render()).await;

    assert!(reduction.document.contains("width=\"10\""));
    assert!(reduction.document.contains("height=\"10\""));
    assert!(!reduction.document.contains("fill"));
}

#[tokio::test]
async fn a_strict_auxiliary_device_vetoes_what_the_primary_allows() {
    let html = "<html><head><title>t</title></head><body>\
                <i>hidden-on-desktop</i><p>text</p></body></html>";
    let sink = Arc::new(ReportSink::new(None));

    // Desktop never sees a difference; the phone images the full markup, so
    // any committed change would diverge from its baseline. The head carries
    // a title so that even its removal is observable after the phone reparses
    // the propagated document.
    let primary = ready_session("Desktop", html, constant_render(), Arc::clone(&sink)).await;
    let auxiliary = ready_session(
        "Galaxy Note 3",
        html,
        signature_render(|dom: &FakeDom| dom.serialize()),
        Arc::clone(&sink),
    )
    .await;

    let oracle = Oracle::new(primary, vec![auxiliary]);
    let reduction = run_reduction(&oracle, &[PhaseName::Node], html.len())
        .await
        .unwrap();
    oracle.close_all().await.unwrap();

    assert!(reduction.pristine);
    assert_eq!(reduction.document, parsed(html));
    assert_eq!(reduction.stats.nodes_removed, 0);
    assert!(sink.failures() > 0);
}

#[tokio::test]
async fn agreeing_devices_let_the_reduction_proceed() {
    let html = "<html><head></head><body><i>gone</i><p>text</p></body></html>";
    let sink = Arc::new(ReportSink::new(None));

    let lenient = || visible_text_render(|dom: &FakeDom, id| dom.tag(id) != Some("i"));
    let primary = ready_session("Desktop", html, lenient(), Arc::clone(&sink)).await;
    let auxiliary = ready_session("Galaxy Note 3", html, lenient(), Arc::clone(&sink)).await;

    let oracle = Oracle::new(primary, vec![auxiliary]);
    let reduction = run_reduction(&oracle, &[PhaseName::Node], html.len())
        .await
        .unwrap();
    oracle.close_all().await.unwrap();

    assert!(reduction.pristine);
    assert_eq!(
        reduction.document,
        "<html><body><p>text</p></body></html>"
    );
}

#[tokio::test]
async fn unused_style_rules_are_dropped_into_one_marked_block() {
    let html = "<html><head><style>.used{color:red}.unused{color:blue}</style></head>\
                <body><div class=\"used\">x</div></body></html>";

    let reduction = reduce(html, &[PhaseName::Css], constant_render()).await;

    assert!(reduction.document.contains("<style injected=\"true\">"));
    assert!(reduction.document.contains(".used{color:red}"));
    assert!(!reduction.document.contains(".unused"));
}

#[tokio::test]
async fn a_fully_used_stylesheet_is_left_in_place() {
    // Nothing is droppable, so swapping in a marked block would only add
    // the wrapper's bytes. The original block must stay put and the phase
    // must not grow the document.
    let html = "<html><head><style>.used{color:red}</style></head>\
                <body><div class=\"used\">x</div></body></html>";

    let reduction = reduce(html, &[PhaseName::Css], constant_render()).await;

    assert!(reduction.pristine);
    assert_eq!(reduction.document, parsed(html));
    assert!(!reduction.document.contains("injected"));
    assert!(reduction.stats.output_size <= reduction.stats.input_size);
}

#[tokio::test]
async fn markup_compaction_collapses_whitespace() {
    let html = "<html><head></head><body><p>spaced   out   text</p></body></html>";

    let reduction = reduce(html, &[PhaseName::Html], constant_render()).await;

    assert!(reduction.pristine);
    assert!(reduction.document.contains("spaced out text"));
    assert!(reduction.stats.output_size < html.len());
}

#[tokio::test]
async fn sessions_are_released_even_when_the_run_errors() {
    let html = "<html><head></head><body><p>x</p></body></html>";
    let sink = Arc::new(ReportSink::new(None));
    let control = FakeControl::new(html, constant_render());
    // One capture pays for the baseline; the first oracle check then fails
    // with a driver error instead of a verdict.
    control.fail_screenshots_after(1);
    let log = control.ops_log();

    let profile = DeviceProfile::resolve("Desktop").unwrap();
    let mut session = Session::new(profile, Box::new(control), sink);
    session.initialize(html).await.unwrap();
    session.capture_baseline().await.unwrap();

    let oracle = Oracle::new(session, Vec::new());
    let result = run_and_close(&oracle, &[PhaseName::Node], html.len()).await;

    assert!(result.is_err());
    assert!(log.lock().unwrap().iter().any(|op| op == "close"));
}

#[tokio::test]
async fn repeated_checks_on_an_untouched_document_stay_pristine() {
    let html = "<html><head></head><body><p>steady</p></body></html>";
    let sink = Arc::new(ReportSink::new(None));
    let primary = ready_session(
        "Desktop",
        html,
        signature_render(|dom: &FakeDom| dom.serialize()),
        Arc::clone(&sink),
    )
    .await;
    let oracle = Oracle::new(primary, Vec::new());

    assert!(oracle.check("first look").await.unwrap());
    assert!(oracle.check("second look").await.unwrap());
    assert_eq!(sink.failures(), 0);
}
