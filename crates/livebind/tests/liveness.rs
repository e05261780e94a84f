use livebind::{Rendered, Session, Subject};
use std::cell::Cell;
use std::rc::Rc;

const PAGE: &str = r#"<html><body><div id="card"><ul id="todos"></ul></div><div id="elsewhere"></div></body></html>"#;

fn counting_render(count: &Rc<Cell<usize>>) -> impl Fn(&String, u32, Option<usize>) -> livebind::Result<Rendered> {
    let count = Rc::clone(count);
    move |item: &String, _: u32, _: Option<usize>| {
        count.set(count.get() + 1);
        Ok(Rendered::Markup(format!("<li>{item}</li>")))
    }
}

#[test]
fn removing_the_parent_stops_rendering() {
    let session = Session::parse(PAGE).unwrap();
    let renders = Rc::new(Cell::new(0));
    let subject = Subject::new();
    let bindings = session
        .query("#todos")
        .unwrap()
        .bind(&subject, counting_render(&renders))
        .unwrap();

    subject.emit_sequence(vec!["a".to_string()]).unwrap();
    assert_eq!(renders.get(), 1);

    let doc = session.document();
    let card = doc.get_element_by_id("card").unwrap();
    doc.remove(card).unwrap();

    // Nothing happens until the batch is delivered
    subject.emit_sequence(vec!["a".to_string(), "b".to_string()]).unwrap();
    assert_eq!(renders.get(), 2);

    session.flush();
    assert!(!bindings[0].is_active());
    assert_eq!(subject.observer_count(), 0);

    subject.emit_sequence(vec!["c".to_string()]).unwrap();
    assert_eq!(renders.get(), 2);

    // Cancelling after teardown is a no-op
    assert!(!bindings[0].cancel());
}

#[test]
fn moving_the_bound_element_keeps_it_alive() {
    let session = Session::parse(PAGE).unwrap();
    let renders = Rc::new(Cell::new(0));
    let subject = Subject::new();
    let todos = session.query("#todos").unwrap();
    todos.bind(&subject, counting_render(&renders)).unwrap();

    let doc = session.document();
    let elsewhere = doc.get_element_by_id("elsewhere").unwrap();
    doc.append_child(elsewhere, todos.first().unwrap()).unwrap();
    session.flush();

    subject.emit_sequence(vec!["a".to_string()]).unwrap();
    assert_eq!(renders.get(), 1);
}

#[test]
fn listeners_and_bindings_share_one_registry() {
    let session = Session::parse(PAGE).unwrap();
    let todos = session.query("#todos").unwrap();
    let subject: Subject<String> = Subject::new();
    todos.bind(&subject, counting_render(&Rc::new(Cell::new(0)))).unwrap();
    todos.on("click", |_| {}).unwrap();
    todos.delegate("click", "li", |_| {}).unwrap();
    assert_eq!(session.monitor().watched_count(), 3);

    let doc = session.document();
    let list = todos.first().unwrap();
    let card = doc.get_element_by_id("card").unwrap();
    doc.remove(card).unwrap();
    session.flush();

    assert_eq!(session.monitor().watched_count(), 0);
    assert_eq!(doc.listener_count(list, "click"), 0);
    assert_eq!(subject.observer_count(), 0);
}

#[test]
fn clearing_children_counts_as_removal() {
    let session = Session::parse(PAGE).unwrap();
    let subject: Subject<String> = Subject::new();
    let bindings = session
        .query("#todos")
        .unwrap()
        .bind(&subject, counting_render(&Rc::new(Cell::new(0))))
        .unwrap();

    let doc = session.document();
    let body = doc.body().unwrap();
    doc.set_inner_html(body, "<p>replaced</p>").unwrap();
    session.flush();
    assert!(!bindings[0].is_active());
}
