//! Integration tests - markup in, lifecycle callbacks and actions out
//!
//! Covers the documented behavior of the runtime end to end: start/stop
//! pairing, targets, nested scopes, marker removal, value decoding and
//! default events.

mod common;

use common::*;
use fos_bind::{Application, Behavior, BindingError, LifecycleState, Severity, Value, ValueType};
use fos_dom::{Event, NodeId};

// ============================================================================
// START / STOP
// ============================================================================

#[test]
fn test_start_stop_pairs_every_callback() {
    let (mut doc, body) = document(r#"
        <div id="a" data-controller="rec">
            <div id="b" data-controller="rec other"></div>
        </div>
        <section data-controller="other"></section>
        <p data-controller="unregistered"></p>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log)), ("other", recorder(&log))]);
    assert_eq!(app.instance_count(), 4);
    app.stop(&mut doc);

    let entries = take(&log);
    for identifier in ["rec", "other"] {
        let count = |event: &str| entries.iter().filter(|e| **e == format!("{identifier}:{event}")).count();
        assert_eq!(count("initialize"), 2, "{identifier}: {entries:?}");
        assert_eq!(count("connect"), 2);
        assert_eq!(count("disconnect"), 2);
    }
    assert_eq!(app.instance_count(), 0);
}

#[test]
fn test_initialize_runs_before_connect() {
    let (mut doc, body) = document(r#"<div data-controller="rec"></div>"#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log))]);
    app.stop(&mut doc);
    assert_eq!(take(&log), vec!["rec:initialize", "rec:connect", "rec:disconnect"]);
}

#[test]
fn test_initial_scan_in_document_order() {
    let (mut doc, body) = document(r#"
        <div data-controller="one"><div data-controller="two"></div></div>
        <div data-controller="three"></div>
    "#);
    let log = new_log();
    let _app = started(&mut doc, body, &[
        ("three", recorder(&log)),
        ("two", recorder(&log)),
        ("one", recorder(&log)),
    ]);
    let connects: Vec<String> = take(&log).into_iter().filter(|e| e.ends_with(":connect")).collect();
    assert_eq!(connects, vec!["one:connect", "two:connect", "three:connect"]);
}

// ============================================================================
// TARGETS
// ============================================================================

#[test]
fn test_hello_reads_target_value() {
    let (mut doc, body) = document(r#"
        <div data-controller="hello">
            <input data-hello-target="name" value="Ada">
            <button id="greet" data-action="hello#greet">Greet</button>
        </div>
    "#);
    let log = new_log();
    let behavior = recorder(&log).target("name").method("greet");
    let mut app = started(&mut doc, body, &[("hello", behavior)]);
    take(&log);

    let button = by_id(&doc, "greet");
    assert!(app.dispatch_event(&mut doc, button, &mut Event::new("click")));
    assert_eq!(take(&log), vec!["hello:greet Ada"]);
    assert!(app.take_diagnostics().is_empty());
}

#[test]
fn test_nested_same_identifier_scopes() {
    let (mut doc, body) = document(r#"
        <div id="outer" data-controller="c">
            <span data-c-target="u"></span>
            <div id="inner" data-controller="c" data-c-target="t">
                <span id="deep" data-c-target="t"></span>
            </div>
        </div>
    "#);
    let log = new_log();
    let app = started(&mut doc, body, &[("c", recorder(&log).targets(["t", "u"]))]);
    let (outer, inner, deep) = (by_id(&doc, "outer"), by_id(&doc, "inner"), by_id(&doc, "deep"));

    assert!(app.targets(&doc, outer, "c", "t").is_empty());
    assert_eq!(app.targets(&doc, outer, "c", "u").len(), 1);
    assert_eq!(app.targets(&doc, inner, "c", "t"), vec![inner, deep]);
    assert!(app.targets(&doc, inner, "c", "u").is_empty());
}

#[test]
fn test_target_callbacks_follow_mutations() {
    let (mut doc, body) = document(r#"
        <ul id="list" data-controller="list">
            <li id="first" data-list-target="item"></li>
        </ul>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("list", recorder(&log).target("item"))]);
    assert_eq!(take(&log), vec!["list:initialize", "list:+item", "list:connect"]);

    let list = by_id(&doc, "list");
    let second = doc.create_element("li");
    doc.set_attribute(second, "data-list-target", "item").unwrap();
    doc.append_child(list, second).unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["list:+item"]);

    let first = by_id(&doc, "first");
    doc.remove_attribute(first, "data-list-target").unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["list:-item"]);
    assert_eq!(app.targets(&doc, list, "list", "item"), vec![second]);

    // Targets are reported gone when the controller disconnects
    doc.remove(list).unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["list:disconnect", "list:-item"]);
}

#[test]
fn test_missing_required_target_is_reported() {
    let (mut doc, body) = document(r#"
        <div data-controller="hello">
            <button id="greet" data-action="hello#greet"></button>
        </div>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("hello", recorder(&log).target("name").method("greet"))]);
    let button = by_id(&doc, "greet");
    app.dispatch_event(&mut doc, button, &mut Event::new("click"));

    let diagnostics = app.take_diagnostics();
    assert_eq!(diagnostics.len(), 2, "{diagnostics:?}");
    assert!(matches!(&diagnostics[0].error, BindingError::MissingTarget { name, .. } if name == "name"));
    assert!(matches!(&diagnostics[1].error, BindingError::ActionHandler { method, .. } if method == "greet"));
}

// ============================================================================
// MARKER REMOVAL
// ============================================================================

#[test]
fn test_marker_removal_disconnects_and_unbinds() {
    let (mut doc, body) = document(r#"
        <div id="c" data-controller="rec">
            <button id="b" data-action="rec#ping"></button>
        </div>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log).method("ping"))]);
    let (c, b) = (by_id(&doc, "c"), by_id(&doc, "b"));
    take(&log);

    doc.remove_attribute(c, "data-controller").unwrap();
    // Nothing happens until the batch is delivered
    assert_eq!(app.instance_state(c, "rec"), Some(LifecycleState::Connected));
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["rec:disconnect"]);
    assert_eq!(app.instance_state(c, "rec"), None);
    assert_eq!(doc.listener_count(b), 0);

    app.dispatch_event(&mut doc, b, &mut Event::new("click"));
    assert!(take(&log).is_empty());
}

#[test]
fn test_marker_readded_creates_fresh_instance() {
    let (mut doc, body) = document(r#"<div id="c" data-controller="rec"></div>"#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log))]);
    let c = by_id(&doc, "c");

    doc.remove_attribute(c, "data-controller").unwrap();
    app.flush(&mut doc);
    doc.set_attribute(c, "data-controller", "rec").unwrap();
    app.flush(&mut doc);

    assert_eq!(take(&log), vec![
        "rec:initialize", "rec:connect", "rec:disconnect",
        "rec:initialize", "rec:connect",
    ]);
}

#[test]
fn test_controller_removing_own_marker_sees_detach_next_batch() {
    let (mut doc, body) = document(r#"
        <div id="c" data-controller="rec"><button id="b" data-action="rec#unmark"></button></div>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log).method("unmark"))]);
    let (c, b) = (by_id(&doc, "c"), by_id(&doc, "b"));
    take(&log);

    app.dispatch_event(&mut doc, b, &mut Event::new("click"));
    assert_eq!(take(&log), vec!["rec:unmark"]);
    assert_eq!(app.instance_state(c, "rec"), Some(LifecycleState::Connected));

    assert_eq!(app.flush(&mut doc), 1);
    assert_eq!(take(&log), vec!["rec:disconnect"]);
}

// ============================================================================
// VALUES
// ============================================================================

#[test]
fn test_malformed_number_falls_back_once() {
    let (mut doc, body) = document(r#"<div id="c" data-controller="c" data-c-count-value="abc"></div>"#);
    let log = new_log();
    let behavior = recorder(&log).value_with("count", ValueType::Number, 0);
    let mut app = started(&mut doc, body, &[("c", behavior)]);
    let c = by_id(&doc, "c");

    assert_eq!(app.value(&doc, c, "c", "count"), Some(Value::Number(0.0)));
    assert_eq!(app.value(&doc, c, "c", "count"), Some(Value::Number(0.0)));

    let diagnostics = app.take_diagnostics();
    assert_eq!(diagnostics.len(), 1, "{diagnostics:?}");
    assert_eq!(diagnostics[0].severity, Severity::Warning);
    assert_eq!(diagnostics[0].element, Some(c));
    assert!(matches!(&diagnostics[0].error, BindingError::ValueDecode { raw, .. } if raw == "abc"));
}

#[test]
fn test_value_changes_reach_controller() {
    let (mut doc, body) = document(r#"<div id="c" data-controller="c" data-c-count-value="1"></div>"#);
    let log = new_log();
    let behavior = recorder(&log)
        .value("count", ValueType::Number)
        .value_with("open", ValueType::Boolean, false);
    let mut app = started(&mut doc, body, &[("c", behavior)]);
    let c = by_id(&doc, "c");
    assert_eq!(take(&log), vec!["c:initialize", "c:count=1", "c:open=false", "c:connect"]);

    doc.set_attribute(c, "data-c-count-value", "2").unwrap();
    doc.set_attribute(c, "data-c-count-value", "5").unwrap();
    doc.set_attribute(c, "data-c-open-value", "").unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["c:count=5 (was 1)", "c:open=true (was false)"]);

    doc.remove_attribute(c, "data-c-count-value").unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&log), vec!["c:count=0 (was 5)"]);
    assert_eq!(app.value(&doc, c, "c", "count"), Some(Value::Number(0.0)));
}

#[test]
fn test_values_default_after_disconnect() {
    let (mut doc, body) = document(r#"<div id="c" data-controller="c" data-c-label-value="hi"></div>"#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("c", recorder(&log).value_default("label", "none"))]);
    let c = by_id(&doc, "c");
    assert_eq!(app.value(&doc, c, "c", "label"), Some(Value::from("hi")));

    doc.remove(c).unwrap();
    app.flush(&mut doc);
    assert_eq!(app.instance_state(c, "c"), Some(LifecycleState::Disconnected));
    assert_eq!(app.value(&doc, c, "c", "label"), Some(Value::from("none")));
    assert!(app.targets(&doc, c, "c", "anything").is_empty());
    assert_eq!(app.value(&doc, c, "c", "undeclared"), None);
}

// ============================================================================
// DEFAULT EVENTS
// ============================================================================

#[test]
fn test_default_events() {
    let (mut doc, body) = document(r#"
        <div data-controller="rec">
            <button id="button" data-action="rec#go"></button>
            <form id="form" data-action="rec#go"></form>
            <select id="select" data-action="rec#go"></select>
            <input id="submit" type="submit" data-action="rec#go">
            <input id="text" data-action="rec#go">
        </div>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log).method("go"))]);
    take(&log);

    let cases = [
        ("button", "click", "submit"),
        ("form", "submit", "click"),
        ("select", "change", "click"),
        ("submit", "click", "input"),
        ("text", "input", "click"),
    ];
    for (id, bound, other) in cases {
        let node = by_id(&doc, id);
        app.dispatch_event(&mut doc, node, &mut Event::new(other));
        assert!(take(&log).is_empty(), "{id} reacted to {other}");
        app.dispatch_event(&mut doc, node, &mut Event::new(bound));
        assert_eq!(take(&log), vec!["rec:go()"], "{id} ignored {bound}");
    }
}

#[test]
fn test_default_event_unknown_tag_is_rejected() {
    let (mut doc, body) = document(r#"
        <div data-controller="rec">
            <span id="s" data-action="rec#go click->rec#go"></span>
        </div>
    "#);
    let log = new_log();
    let mut app = started(&mut doc, body, &[("rec", recorder(&log).method("go"))]);
    let s = by_id(&doc, "s");

    let diagnostics = app.take_diagnostics();
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(diagnostics[0].error, BindingError::InvalidActionSyntax { .. }));

    // The valid sibling descriptor is still bound
    take(&log);
    app.dispatch_event(&mut doc, s, &mut Event::new("click"));
    assert_eq!(take(&log), vec!["rec:go()"]);
}

// ============================================================================
// REGISTRATION
// ============================================================================

#[test]
fn test_replacement_applies_to_future_instances() {
    let (mut doc, body) = document(r#"<div id="a" data-controller="c"></div>"#);
    let first = new_log();
    let second = new_log();
    let mut app = started(&mut doc, body, &[("c", recorder(&first))]);
    app.register("c", &recorder(&second)).unwrap();
    app.flush(&mut doc);
    assert!(take(&second).is_empty());

    let fresh = doc.create_element("div");
    doc.set_attribute(fresh, "data-controller", "c").unwrap();
    doc.append_child(body, fresh).unwrap();
    app.flush(&mut doc);
    assert_eq!(take(&second), vec!["c:initialize", "c:connect"]);

    app.stop(&mut doc);
    assert_eq!(take(&first), vec!["c:initialize", "c:connect", "c:disconnect"]);
}

#[test]
fn test_invalid_registration() {
    let mut app = Application::new();
    assert!(app.register("", &Behavior::new(|| Recorder::new(new_log()))).is_err());
    assert!(app.registry().is_empty());
}

#[test]
fn test_unstarted_application_is_inert() {
    let (mut doc, _body) = document(r#"<div data-controller="c"></div>"#);
    let mut app = Application::new();
    app.register("c", &recorder(&new_log())).unwrap();
    assert_eq!(app.flush(&mut doc), 0);
    assert_eq!(app.instance_count(), 0);
    assert_eq!(app.instance_state(NodeId::ROOT, "c"), None);
}
