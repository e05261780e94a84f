//! Binding Engine
//!
//! One state machine per (element, source). Each holds the last sequence it
//! applied as the diff baseline; a sequence emission is diffed against it and
//! the edit script is applied to the element's element-children:
//!
//! ```text
//! emission ─┬─ Sequence(next) → diff(baseline, next) → create / update / delete
//!           └─ Scalar(value)  → render → replace content
//! ```
//!
//! Update and delete indices address the children as they were when the
//! emission arrived, so a run of deletes never skips a slot.

use dom::utils::cap_text_length;
use dom::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

use crate::diff::{diff, DiffEntry};
use crate::error::Result;
use crate::events::LifecycleEvent;
use crate::liveness::WatchId;
use crate::session::{CreatePlacement, Session, WeakSession};
use crate::source::{Emission, Observer, PushSource, Subscription};

/// Markup trimmed to this many chars in trace logs
const TRACE_MARKUP_LEN: usize = 80;

/// What a render callback produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendered {
    /// Markup; for sequence items it must describe exactly one element
    Markup(String),
    /// Nothing to insert; the entry is skipped
    Nothing,
}

impl From<String> for Rendered {
    fn from(markup: String) -> Self {
        Rendered::Markup(markup)
    }
}

impl From<&str> for Rendered {
    fn from(markup: &str) -> Self {
        Rendered::Markup(markup.to_string())
    }
}

type RenderFn<T> = Rc<dyn Fn(&T, NodeId, Option<usize>) -> Result<Rendered>>;

/// A live binding of one element to one source
pub struct Binding {
    element: NodeId,
    subscription: Subscription,
    watch: Option<WatchId>,
    session: WeakSession,
}

impl Binding {
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// Parent whose removal tears this binding down, if any
    pub fn has_teardown(&self) -> bool {
        self.watch.is_some()
    }

    pub fn is_active(&self) -> bool {
        !self.subscription.is_cancelled()
    }

    /// Stop the binding now. Returns false if it was already stopped.
    pub fn cancel(&self) -> bool {
        if !self.subscription.cancel() {
            return false;
        }
        if let Some(session) = self.session.upgrade() {
            if let Some(watch) = self.watch {
                session.monitor().unwatch(watch);
            }
            forget_child_keys(&session, self.element);
            session.publish(LifecycleEvent::Unbound {
                element: self.element,
            });
        }
        true
    }
}

/// Bindings created by one `bind` call, in handle order
pub struct Bindings(Vec<Binding>);

impl Bindings {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Binding> {
        self.0.iter()
    }

    /// Cancel every binding; returns how many were still active
    pub fn cancel_all(&self) -> usize {
        self.0.iter().filter(|binding| binding.cancel()).count()
    }
}

impl std::ops::Index<usize> for Bindings {
    type Output = Binding;

    fn index(&self, index: usize) -> &Binding {
        &self.0[index]
    }
}

pub(crate) fn bind<T, S, F>(
    session: &Session,
    elements: &[NodeId],
    source: &S,
    render: F,
) -> Result<Bindings>
where
    T: PartialEq + Clone + 'static,
    S: PushSource<T> + ?Sized,
    F: Fn(&T, NodeId, Option<usize>) -> Result<Rendered> + 'static,
{
    let render: RenderFn<T> = Rc::new(render);
    let mut bindings = Vec::with_capacity(elements.len());

    for &element in elements {
        match bind_one(session, element, source, Rc::clone(&render)) {
            Ok(binding) => bindings.push(binding),
            Err(err) => {
                // Leave nothing half-bound behind
                for binding in &bindings {
                    binding.cancel();
                }
                return Err(err);
            }
        }
    }

    Ok(Bindings(bindings))
}

fn bind_one<T, S>(session: &Session, element: NodeId, source: &S, render: RenderFn<T>) -> Result<Binding>
where
    T: PartialEq + Clone + 'static,
    S: PushSource<T> + ?Sized,
{
    let document = session.document();
    document.read(|arena| arena.element(element).map(|_| ()))?;
    let parent = document.parent(element)?;

    let state = BindingState {
        session: session.downgrade(),
        element,
        baseline: RefCell::new(Vec::new()),
        render,
    };
    let observer: Observer<T> = Rc::new(move |emission: &Emission<T>| state.on_emission(emission));
    let subscription = source.subscribe(observer)?;

    let watch = match parent {
        Some(parent) => {
            let weak = session.downgrade();
            let teardown = subscription.clone();
            Some(session.monitor().watch(parent, move || {
                if teardown.cancel() {
                    if let Some(session) = weak.upgrade() {
                        forget_child_keys(&session, element);
                        session.publish(LifecycleEvent::Unbound { element });
                    }
                }
            }))
        }
        None => {
            tracing::debug!(
                session = %session.id(),
                element,
                "Bound element has no parent; no automatic teardown"
            );
            None
        }
    };

    tracing::debug!(session = %session.id(), element, ?parent, "Binding created");
    session.publish(LifecycleEvent::Bound { element, parent });

    Ok(Binding {
        element,
        subscription,
        watch,
        session: session.downgrade(),
    })
}

/// Drop the rendering keys of `element`'s current children
fn forget_child_keys(session: &Session, element: NodeId) {
    let Ok(children) = session.document().element_children(element) else {
        return;
    };
    let forgotten = session.inner.keys.remove_all(children);
    if forgotten > 0 {
        tracing::trace!(element, forgotten, "Dropped rendering keys");
    }
}

struct BindingState<T> {
    session: WeakSession,
    element: NodeId,
    baseline: RefCell<Vec<T>>,
    render: RenderFn<T>,
}

impl<T: PartialEq + Clone + 'static> BindingState<T> {
    fn on_emission(&self, emission: &Emission<T>) -> Result<()> {
        let Some(session) = self.session.upgrade() else {
            tracing::trace!(element = self.element, "Session dropped; ignoring emission");
            return Ok(());
        };

        match emission {
            Emission::Scalar(value) => self.replace_content(&session, value),
            Emission::Sequence(next) => self.reconcile(&session, next),
        }
    }

    fn replace_content(&self, session: &Session, value: &T) -> Result<()> {
        let Rendered::Markup(markup) = (self.render)(value, self.element, None)? else {
            return Ok(());
        };
        tracing::trace!(
            element = self.element,
            markup = %cap_text_length(&markup, TRACE_MARKUP_LEN),
            "Replacing content"
        );

        let document = session.document();
        let previous = document.element_children(self.element)?;
        document.set_inner_html(self.element, &markup)?;
        session.inner.keys.remove_all(previous);
        for child in document.element_children(self.element)? {
            session.upgrade(child)?;
        }
        Ok(())
    }

    fn reconcile(&self, session: &Session, next: &[T]) -> Result<()> {
        // The baseline is not borrowed while render callbacks run
        let entries = diff(&self.baseline.borrow(), next);
        if entries.is_empty() {
            return Ok(());
        }

        let document = session.document();
        let slots = document.element_children(self.element)?;
        tracing::trace!(
            element = self.element,
            entries = entries.len(),
            slots = slots.len(),
            "Applying edit script"
        );

        for entry in &entries {
            match entry {
                DiffEntry::Create { item, index } => {
                    let Some(child) = self.render_child(session, item, *index)? else {
                        continue;
                    };
                    let reference = match session.config().create_placement {
                        CreatePlacement::Append => None,
                        CreatePlacement::Indexed => {
                            document.element_children(self.element)?.get(*index).copied()
                        }
                    };
                    document.insert_before(self.element, child, reference)?;
                    session.upgrade(child)?;
                }
                DiffEntry::Update { item, index } => {
                    let Some(old) = self.slot(session, &slots, *index)? else {
                        continue;
                    };
                    let Some(child) = self.render_child(session, item, *index)? else {
                        continue;
                    };
                    document.replace_child(self.element, child, old)?;
                    session.inner.keys.remove(old);
                    session.upgrade(child)?;
                }
                DiffEntry::Delete { index } => {
                    if let Some(old) = self.slot(session, &slots, *index)? {
                        document.remove_child(self.element, old)?;
                        session.inner.keys.remove(old);
                    }
                }
            }
        }

        *self.baseline.borrow_mut() = next.to_vec();
        Ok(())
    }

    /// Child that held slot `index` when the emission arrived, if it is
    /// still attached here
    fn slot(&self, session: &Session, slots: &[NodeId], index: usize) -> Result<Option<NodeId>> {
        let Some(&child) = slots.get(index) else {
            return Ok(None);
        };
        let still_here = session.document().parent(child)? == Some(self.element);
        Ok(still_here.then_some(child))
    }

    /// Render and parse one item, recording its key
    fn render_child(&self, session: &Session, item: &T, index: usize) -> Result<Option<NodeId>> {
        let Rendered::Markup(markup) = (self.render)(item, self.element, Some(index))? else {
            return Ok(None);
        };

        let document = session.document();
        let child = document.parse_element(&markup)?;
        session.inner.keys.set(child, index);
        let config = session.config();
        if config.stamp_key_attribute {
            document.set_attribute(child, &config.key_attribute, &index.to_string())?;
        }
        Ok(Some(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BindError;
    use crate::session::SessionConfig;
    use crate::source::Subject;
    use dom::Document;

    fn list_session(config: SessionConfig) -> (Session, NodeId) {
        let doc = Document::parse(r#"<html><body><div id="wrap"><ul id="list"></ul></div></body></html>"#)
            .unwrap();
        let session = Session::with_config(doc, config);
        let list = session.document().get_element_by_id("list").unwrap();
        (session, list)
    }

    fn li(item: &String, _: NodeId, _: Option<usize>) -> Result<Rendered> {
        Ok(format!("<li>{item}</li>").into())
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_sequence_appends_and_stamps_keys() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session.handle([list]).bind(&subject, li).unwrap();

        subject.emit_sequence(strings(&["a", "b"])).unwrap();
        subject.emit_sequence(strings(&["a", "b", "c"])).unwrap();

        let doc = session.document();
        assert_eq!(
            doc.inner_html(list).unwrap(),
            r#"<li data-key="0">a</li><li data-key="1">b</li><li data-key="2">c</li>"#
        );
        let third = doc.element_children(list).unwrap()[2];
        assert_eq!(session.key_of(third), Some(2));
    }

    #[test]
    fn test_shrink_removes_every_trailing_slot() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session.handle([list]).bind(&subject, li).unwrap();

        subject.emit_sequence(strings(&["a", "b", "c", "d"])).unwrap();
        subject.emit_sequence(strings(&["a"])).unwrap();

        assert_eq!(
            session.document().inner_html(list).unwrap(),
            r#"<li data-key="0">a</li>"#
        );
    }

    #[test]
    fn test_update_replaces_slot_and_key() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session.handle([list]).bind(&subject, li).unwrap();

        subject.emit_sequence(strings(&["x", "y"])).unwrap();
        let old = session.document().element_children(list).unwrap()[0];
        subject.emit_sequence(strings(&["a", "y"])).unwrap();

        let doc = session.document();
        assert_eq!(
            doc.inner_html(list).unwrap(),
            r#"<li data-key="0">a</li><li data-key="1">y</li>"#
        );
        assert_eq!(session.key_of(old), None);
        assert_eq!(doc.parent(old).unwrap(), None);
    }

    #[test]
    fn test_scalar_replaces_content_verbatim() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session
            .handle([list])
            .bind(&subject, |value: &String, _, index| {
                assert_eq!(index, None);
                Ok(Rendered::Markup(value.clone()))
            })
            .unwrap();

        subject.emit_scalar("<li>one</li><li>two &amp; three</li>".to_string()).unwrap();
        assert_eq!(
            session.document().inner_html(list).unwrap(),
            "<li>one</li><li>two &amp; three</li>"
        );
    }

    #[test]
    fn test_nothing_skips_entry() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session
            .handle([list])
            .bind(&subject, |item: &i32, _, _| {
                Ok(if item % 2 == 0 {
                    Rendered::Markup(format!("<li>{item}</li>"))
                } else {
                    Rendered::Nothing
                })
            })
            .unwrap();

        subject.emit_sequence(vec![0, 1, 2]).unwrap();
        assert_eq!(
            session.document().inner_html(list).unwrap(),
            r#"<li data-key="0">0</li><li data-key="2">2</li>"#
        );
    }

    #[test]
    fn test_render_error_keeps_baseline() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session
            .handle([list])
            .bind(&subject, |item: &String, _, _| {
                if item == "bad" {
                    Err(BindError::Render("bad item".into()))
                } else {
                    Ok(format!("<li>{item}</li>").into())
                }
            })
            .unwrap();

        let err = subject.emit_sequence(strings(&["a", "bad"])).unwrap_err();
        assert_eq!(err, BindError::Render("bad item".into()));

        // The failed script is diffed again from the old (empty) baseline
        subject.emit_sequence(strings(&["b"])).unwrap();
        assert_eq!(
            session.document().inner_html(list).unwrap(),
            r#"<li data-key="0">a</li><li data-key="0">b</li>"#
        );
    }

    #[test]
    fn test_non_element_markup_fails() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session
            .handle([list])
            .bind(&subject, |item: &String, _, _| Ok(item.as_str().into()))
            .unwrap();

        let err = subject.emit_sequence(strings(&["just text"])).unwrap_err();
        assert_eq!(err, BindError::Dom(dom::DomError::MissingElementRoot));
    }

    #[test]
    fn test_table_rows_bind_under_tbody() {
        let doc = Document::parse(r#"<html><body><table><tbody id="rows"></tbody></table></body></html>"#)
            .unwrap();
        let session = Session::new(doc);
        let rows = session.document().get_element_by_id("rows").unwrap();
        let subject = Subject::new();
        session
            .handle([rows])
            .bind(&subject, |item: &String, _, index| {
                Ok(match index {
                    Some(_) => format!("<tr><td>{item}</td></tr>").into(),
                    None => item.as_str().into(),
                })
            })
            .unwrap();

        subject.emit_sequence(strings(&["a"])).unwrap();
        let doc = session.document();
        assert_eq!(
            doc.inner_html(rows).unwrap(),
            r#"<tr data-key="0"><td>a</td></tr>"#
        );

        subject.emit_scalar("<tr><td>x</td></tr>".to_string()).unwrap();
        assert_eq!(doc.inner_html(rows).unwrap(), "<tr><td>x</td></tr>");
    }

    #[test]
    fn test_keys_do_not_outlive_children() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        session
            .handle([list])
            .bind(&subject, |item: &String, _, _| Ok(format!("<li>{item}</li>").into()))
            .unwrap();

        for _ in 0..100 {
            subject.emit_sequence(strings(&["a", "b"])).unwrap();
            assert_eq!(session.inner.keys.len(), 2);
            subject.emit_scalar("s".to_string()).unwrap();
            assert_eq!(session.inner.keys.len(), 0);
            subject.emit_sequence(Vec::new()).unwrap();
        }
        assert!(session.inner.keys.is_empty());
    }

    #[test]
    fn test_cancel_and_teardown_forget_keys() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        let bindings = session.handle([list]).bind(&subject, li).unwrap();
        subject.emit_sequence(strings(&["a", "b"])).unwrap();
        bindings[0].cancel();
        assert!(session.inner.keys.is_empty());

        let bindings = session.handle([list]).bind(&subject, li).unwrap();
        subject.emit_sequence(strings(&["c", "d", "e"])).unwrap();
        assert_eq!(session.inner.keys.len(), 3);

        let doc = session.document();
        doc.remove(doc.get_element_by_id("wrap").unwrap()).unwrap();
        session.flush();
        assert!(!bindings[0].is_active());
        assert!(session.inner.keys.is_empty());
    }

    #[test]
    fn test_slot_moved_out_mid_script_is_skipped() {
        let (session, list) = list_session(SessionConfig::default());
        let doc = session.document();
        let wrap = doc.get_element_by_id("wrap").unwrap();
        let subject = Subject::new();
        let document = doc.clone();
        session
            .handle([list])
            .bind(&subject, move |item: &String, element, _| {
                // "x" pulls slot 1 out, "z" pulls slot 2 out
                let moved = match item.as_str() {
                    "x" => Some(1),
                    "z" => Some(2),
                    _ => None,
                };
                if let Some(slot) = moved {
                    let child = document.element_children(element)?[slot];
                    document.append_child(wrap, child)?;
                }
                Ok(format!("<li>{item}</li>").into())
            })
            .unwrap();

        // Update 0 moves slot 1 away, so update 1 is skipped; delete 2 still runs
        subject.emit_sequence(strings(&["a", "b", "c"])).unwrap();
        let b = doc.element_children(list).unwrap()[1];
        subject.emit_sequence(strings(&["x", "y"])).unwrap();
        assert_eq!(doc.inner_html(list).unwrap(), r#"<li data-key="0">x</li>"#);
        assert_eq!(doc.parent(b).unwrap(), Some(wrap));
        assert_eq!(doc.text_content(b).unwrap(), "b");

        // Update 0 moves slot 2 away, so delete 2 is skipped; delete 1 still runs
        doc.remove(b).unwrap();
        subject.emit_sequence(Vec::new()).unwrap();
        subject.emit_sequence(strings(&["a", "b", "c"])).unwrap();
        let children = doc.element_children(list).unwrap();
        assert_eq!(children.len(), 3);
        let c = children[2];
        subject.emit_sequence(strings(&["z"])).unwrap();
        assert_eq!(doc.inner_html(list).unwrap(), r#"<li data-key="0">z</li>"#);
        assert_eq!(doc.parent(c).unwrap(), Some(wrap));
    }

    #[test]
    fn test_indexed_placement() {
        let config = SessionConfig {
            create_placement: CreatePlacement::Indexed,
            stamp_key_attribute: false,
            ..SessionConfig::default()
        };
        let (session, list) = list_session(config);
        let doc = session.document();
        doc.set_inner_html(list, "<li>static</li>").unwrap();

        let subject = Subject::new();
        session.handle([list]).bind(&subject, li).unwrap();
        subject.emit_sequence(strings(&["a"])).unwrap();

        assert_eq!(
            doc.inner_html(list).unwrap(),
            "<li>a</li><li>static</li>"
        );
    }

    #[test]
    fn test_custom_key_attribute() {
        let config = SessionConfig {
            key_attribute: "data-slot".into(),
            ..SessionConfig::default()
        };
        let (session, list) = list_session(config);
        let subject = Subject::new();
        session.handle([list]).bind(&subject, li).unwrap();
        subject.emit_sequence(strings(&["a"])).unwrap();

        assert_eq!(
            session.document().inner_html(list).unwrap(),
            r#"<li data-slot="0">a</li>"#
        );
    }

    #[test]
    fn test_cancel_stops_updates() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::new();
        let bindings = session.handle([list]).bind(&subject, li).unwrap();
        assert!(bindings[0].has_teardown());
        assert_eq!(session.monitor().watched_count(), 1);

        assert!(bindings[0].cancel());
        assert!(!bindings[0].cancel());
        assert_eq!(session.monitor().watched_count(), 0);

        subject.emit_sequence(strings(&["a"])).unwrap();
        assert_eq!(session.document().inner_html(list).unwrap(), "");
    }

    #[test]
    fn test_detached_element_has_no_teardown() {
        let (session, _) = list_session(SessionConfig::default());
        let detached = session.document().create_element("ul");
        let subject: Subject<String> = Subject::new();
        let bindings = session.handle([detached]).bind(&subject, li).unwrap();
        assert!(!bindings[0].has_teardown());
        assert!(bindings[0].is_active());
    }

    #[test]
    fn test_failed_bind_cancels_earlier_elements() {
        let (session, list) = list_session(SessionConfig::default());
        let subject = Subject::with_value(Emission::Scalar("<li>x</li>".to_string()));
        let text = session.document().create_text("not an element");

        let result = session
            .handle([list, text])
            .bind(&subject, |value: &String, _, _| Ok(value.as_str().into()));
        assert!(result.is_err());
        assert_eq!(subject.observer_count(), 0);
    }
}
