use livebind::{BindError, ComponentOptions, LifecycleEvent, Rendered, Session, Subject};
use std::cell::RefCell;
use std::rc::Rc;

const BADGE: &str = r#"<template id="todo-badge"><span class="label"></span></template>"#;

#[test]
fn engine_inserted_instances_are_upgraded() {
    let session = Session::parse(r#"<html><body><ul id="todos"></ul></body></html>"#).unwrap();
    let labels = Rc::new(RefCell::new(Vec::new()));
    let labels_clone = Rc::clone(&labels);
    session
        .define(
            BADGE,
            ComponentOptions::new().setup(move |scope| {
                let label = scope.query_one(".label")?.ok_or_else(|| BindError::Render("no label".into()))?;
                labels_clone.borrow_mut().push((scope.host(), label));
                Ok(())
            }),
        )
        .unwrap();

    let subject = Subject::new();
    let todos = session.query("#todos").unwrap();
    todos
        .bind(&subject, |item: &String, _, _| {
            Ok(Rendered::Markup(format!("<li><todo-badge title=\"{item}\"></todo-badge></li>")))
        })
        .unwrap();
    subject
        .emit_sequence(vec!["a".to_string(), "b".to_string()])
        .unwrap();

    let doc = session.document();
    let badges = session.query("todo-badge").unwrap();
    assert_eq!(badges.len(), 2);
    for badge in badges.iter() {
        assert!(doc.shadow_root(badge).is_some());
    }
    assert_eq!(labels.borrow().len(), 2);
}

#[test]
fn scalar_content_is_upgraded() {
    let session = Session::parse(r#"<html><body><div id="slot"></div></body></html>"#).unwrap();
    session.define(BADGE, ComponentOptions::new()).unwrap();

    let subject = Subject::new();
    session
        .query("#slot")
        .unwrap()
        .bind(&subject, |value: &String, _, _| Ok(Rendered::Markup(value.clone())))
        .unwrap();
    subject
        .emit_scalar("<p><todo-badge></todo-badge></p>".to_string())
        .unwrap();

    let badge = session.query("todo-badge").unwrap().first().unwrap();
    assert!(session.document().shadow_root(badge).is_some());
}

#[test]
fn setup_can_bind_inside_the_shadow_root() {
    let session = Session::parse(r#"<html><body><todo-list id="app"></todo-list></body></html>"#).unwrap();
    let subject: Subject<String> = Subject::new();
    let source = subject.clone();

    session
        .define(
            r#"<template id="todo-list"><ul class="items"></ul></template>"#,
            ComponentOptions::new().setup(move |scope| {
                scope.query(".items")?.bind(&source, |item: &String, _, _| {
                    Ok(Rendered::Markup(format!("<li>{item}</li>")))
                })?;
                Ok(())
            }),
        )
        .unwrap();

    subject.emit_sequence(vec!["inside".to_string()]).unwrap();

    let doc = session.document();
    let app = doc.get_element_by_id("app").unwrap();
    let root = doc.shadow_root(app).unwrap();
    let list = doc.query_selector(root, ".items").unwrap().unwrap();
    assert_eq!(doc.inner_html(list).unwrap(), r#"<li data-key="0">inside</li>"#);
}

#[test]
fn component_events_are_published() {
    let session = Session::parse(r#"<html><body><todo-badge id="one"></todo-badge></body></html>"#).unwrap();
    let mut events = session.subscribe_events();
    session.define(BADGE, ComponentOptions::new()).unwrap();
    let host = session.document().get_element_by_id("one").unwrap();

    assert_eq!(
        events.try_recv().unwrap(),
        LifecycleEvent::ComponentDefined {
            name: "todo-badge".into()
        }
    );
    assert_eq!(
        events.try_recv().unwrap(),
        LifecycleEvent::ComponentUpgraded {
            name: "todo-badge".into(),
            host
        }
    );
}

#[test]
fn setup_errors_fail_the_definition() {
    let session = Session::parse(r#"<html><body><todo-badge></todo-badge></body></html>"#).unwrap();
    let result = session.define(
        BADGE,
        ComponentOptions::new().setup(|_| Err(BindError::Render("setup failed".into()))),
    );
    assert_eq!(result, Err(BindError::Render("setup failed".into())));
    // The name stays registered
    assert!(session.is_defined("todo-badge"));
}
