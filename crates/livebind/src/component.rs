//! Custom-element registration
//!
//! A component is defined from `<template id="tag-name">` markup. Every
//! instance gets an isolated shadow root holding an optional `<style>` and a
//! deep copy of the template content, then the setup callback runs with
//! queries scoped to that root.

use ahash::AHashMap;
use dom::NodeId;
use std::cell::RefCell;
use std::rc::Rc;

use crate::error::{BindError, Result};
use crate::events::LifecycleEvent;
use crate::handle::ElementHandle;
use crate::session::Session;

/// Nested upgrades deeper than this are skipped (self-including templates)
const MAX_UPGRADE_DEPTH: usize = 32;

/// Names the HTML standard reserves even though they contain a hyphen
const RESERVED_NAMES: &[&str] = &[
    "annotation-xml",
    "color-profile",
    "font-face",
    "font-face-src",
    "font-face-uri",
    "font-face-format",
    "font-face-name",
    "missing-glyph",
];

pub type SetupFn = Rc<dyn Fn(&ScopedQuery) -> Result<()>>;

/// Optional per-component behaviour
#[derive(Clone, Default)]
pub struct ComponentOptions {
    style: Option<String>,
    setup: Option<SetupFn>,
}

impl ComponentOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// CSS injected as the first child of every shadow root
    pub fn style(mut self, css: impl Into<String>) -> Self {
        self.style = Some(css.into());
        self
    }

    /// Runs once per instance, after the template content is in place
    pub fn setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&ScopedQuery) -> Result<()> + 'static,
    {
        self.setup = Some(Rc::new(setup));
        self
    }
}

/// Queries rooted at one instance's shadow root
pub struct ScopedQuery {
    session: Session,
    host: NodeId,
    root: NodeId,
}

impl ScopedQuery {
    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn query(&self, selector: &str) -> Result<ElementHandle> {
        self.session.query_in(self.root, selector)
    }

    pub fn query_one(&self, selector: &str) -> Result<Option<NodeId>> {
        Ok(self.session.document().query_selector(self.root, selector)?)
    }
}

struct ComponentDefinition {
    name: String,
    content: NodeId,
    style: Option<String>,
    setup: Option<SetupFn>,
}

#[derive(Default)]
pub(crate) struct ComponentRegistry {
    definitions: RefCell<AHashMap<String, Rc<ComponentDefinition>>>,
}

impl ComponentRegistry {
    pub(crate) fn is_defined(&self, name: &str) -> bool {
        self.definitions.borrow().contains_key(name)
    }

    fn get(&self, name: &str) -> Option<Rc<ComponentDefinition>> {
        self.definitions.borrow().get(name).cloned()
    }

    pub(crate) fn define(&self, session: &Session, template: &str, options: ComponentOptions) -> Result<String> {
        let document = session.document();
        let node = document.parse_element(template)?;
        let tag = document.tag_name(node)?.unwrap_or_default();
        if tag != "template" {
            return Err(BindError::NotATemplate(tag));
        }

        let name = document
            .attribute(node, "id")?
            .filter(|id| !id.is_empty())
            .ok_or(BindError::MissingTemplateId)?;
        validate_name(&name)?;
        if self.is_defined(&name) {
            return Err(BindError::AlreadyDefined(name));
        }

        let content = document
            .read(|arena| arena.get(node).map(|template| template.template_content_id))?
            .unwrap_or(node);

        self.definitions.borrow_mut().insert(
            name.clone(),
            Rc::new(ComponentDefinition {
                name: name.clone(),
                content,
                style: options.style,
                setup: options.setup,
            }),
        );
        tracing::info!(session = %session.id(), component = %name, "Component defined");
        session.publish(LifecycleEvent::ComponentDefined { name: name.clone() });

        let upgraded = self.upgrade(session, document.root())?;
        tracing::debug!(component = %name, upgraded, "Upgraded existing elements");
        Ok(name)
    }

    pub(crate) fn create(&self, session: &Session, name: &str) -> Result<NodeId> {
        let definition = self
            .get(name)
            .ok_or_else(|| BindError::UnknownComponent(name.to_string()))?;
        let host = session.document().create_element(name);
        self.upgrade_host(session, host, &definition, 0)?;
        Ok(host)
    }

    /// Upgrade defined, not yet upgraded elements at or below `root`
    pub(crate) fn upgrade(&self, session: &Session, root: NodeId) -> Result<usize> {
        self.upgrade_tree(session, root, 0)
    }

    fn upgrade_tree(&self, session: &Session, root: NodeId, depth: usize) -> Result<usize> {
        if self.definitions.borrow().is_empty() {
            return Ok(0);
        }
        if depth > MAX_UPGRADE_DEPTH {
            tracing::warn!(root, depth, "Component nesting too deep; not upgrading");
            return Ok(0);
        }

        let pending: Vec<(NodeId, String)> = session.document().read(|arena| {
            let mut nodes = vec![root];
            nodes.extend(arena.descendants(root).unwrap_or_default());
            nodes
                .into_iter()
                .filter_map(|id| {
                    let node = arena.get(id).ok()?;
                    if !node.is_element() || node.shadow_root_id.is_some() {
                        return None;
                    }
                    Some((id, node.tag_name()?.to_string()))
                })
                .collect()
        });

        let mut upgraded = 0;
        for (host, tag) in pending {
            if let Some(definition) = self.get(&tag) {
                upgraded += self.upgrade_host(session, host, &definition, depth)?;
            }
        }
        Ok(upgraded)
    }

    /// Build one instance. Returns the number of hosts upgraded, nested
    /// instances included.
    fn upgrade_host(
        &self,
        session: &Session,
        host: NodeId,
        definition: &ComponentDefinition,
        depth: usize,
    ) -> Result<usize> {
        let document = session.document();
        if document.shadow_root(host).is_some() {
            return Ok(0);
        }

        let root = document.attach_shadow(host)?;
        if let Some(css) = &definition.style {
            let style = document.create_element("style");
            let text = document.create_text(css);
            document.append_child(style, text)?;
            document.append_child(root, style)?;
        }
        let content = document.clone_node(definition.content, true)?;
        let children = document.children(content)?;
        for child in children {
            document.append_child(root, child)?;
        }

        let nested = self.upgrade_tree(session, root, depth + 1)?;
        tracing::debug!(component = %definition.name, host, nested, "Component upgraded");
        session.publish(LifecycleEvent::ComponentUpgraded {
            name: definition.name.clone(),
            host,
        });

        if let Some(setup) = &definition.setup {
            setup(&ScopedQuery {
                session: session.clone(),
                host,
                root,
            })?;
        }
        Ok(1 + nested)
    }
}

/// Custom element name rules: lowercase ASCII letter first, at least one
/// hyphen, no uppercase, not reserved
fn validate_name(name: &str) -> Result<()> {
    let valid = name.starts_with(|c: char| c.is_ascii_lowercase())
        && name.contains('-')
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | '_'))
        && !RESERVED_NAMES.contains(&name);

    if valid {
        Ok(())
    } else {
        Err(BindError::InvalidComponentName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    const CARD: &str = r#"<template id="todo-card"><h2 class="title">Todo</h2><ul class="items"></ul></template>"#;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("todo-card").is_ok());
        assert!(validate_name("x-1.2_b").is_ok());
        assert!(validate_name("card").is_err());
        assert!(validate_name("Todo-card").is_err());
        assert!(validate_name("1-card").is_err());
        assert!(validate_name("font-face").is_err());
    }

    #[test]
    fn test_define_rejects_bad_templates() {
        let session = Session::parse("<html><body></body></html>").unwrap();
        let options = ComponentOptions::new;

        assert_eq!(
            session.define("<div id=\"x-y\"></div>", options()),
            Err(BindError::NotATemplate("div".into()))
        );
        assert_eq!(
            session.define("<template></template>", options()),
            Err(BindError::MissingTemplateId)
        );
        assert_eq!(
            session.define("<template id=\"card\"></template>", options()),
            Err(BindError::InvalidComponentName("card".into()))
        );

        session.define(CARD, options()).unwrap();
        assert_eq!(
            session.define(CARD, options()),
            Err(BindError::AlreadyDefined("todo-card".into()))
        );
    }

    #[test]
    fn test_define_upgrades_existing_elements() {
        let session =
            Session::parse("<html><body><todo-card id=\"one\"></todo-card></body></html>").unwrap();
        let doc = session.document();
        let host = doc.get_element_by_id("one").unwrap();

        let setups = Rc::new(Cell::new(0));
        let setups_clone = Rc::clone(&setups);
        session
            .define(
                CARD,
                ComponentOptions::new()
                    .style("h2 { color: red; }")
                    .setup(move |scope| {
                        setups_clone.set(setups_clone.get() + 1);
                        assert_eq!(scope.query(".items")?.len(), 1);
                        Ok(())
                    }),
            )
            .unwrap();

        let root = doc.shadow_root(host).unwrap();
        assert_eq!(
            doc.inner_html(root).unwrap(),
            r#"<style>h2 { color: red; }</style><h2 class="title">Todo</h2><ul class="items"></ul>"#
        );
        assert_eq!(setups.get(), 1);
        // Shadow content stays out of light-tree queries
        assert!(session.query(".items").unwrap().is_empty());

        assert_eq!(session.upgrade(host).unwrap(), 0);
        assert_eq!(setups.get(), 1);
    }

    #[test]
    fn test_create_component() {
        let session = Session::parse("<html><body></body></html>").unwrap();
        assert_eq!(
            session.create_component("todo-card"),
            Err(BindError::UnknownComponent("todo-card".into()))
        );

        session.define(CARD, ComponentOptions::new()).unwrap();
        let host = session.create_component("todo-card").unwrap();
        let doc = session.document();
        assert_eq!(doc.tag_name(host).unwrap().as_deref(), Some("todo-card"));
        assert_eq!(doc.parent(host).unwrap(), None);
        let root = doc.shadow_root(host).unwrap();
        assert_eq!(doc.element_children(root).unwrap().len(), 2);
    }

    #[test]
    fn test_nested_components() {
        let session = Session::parse("<html><body><outer-box></outer-box></body></html>").unwrap();
        session
            .define(r#"<template id="inner-tag"><i>inner</i></template>"#, ComponentOptions::new())
            .unwrap();
        session
            .define(
                r#"<template id="outer-box"><inner-tag></inner-tag></template>"#,
                ComponentOptions::new(),
            )
            .unwrap();

        let doc = session.document();
        let outer = session.query("outer-box").unwrap().first().unwrap();
        let outer_root = doc.shadow_root(outer).unwrap();
        let inner = doc.query_selector(outer_root, "inner-tag").unwrap().unwrap();
        let inner_root = doc.shadow_root(inner).unwrap();
        assert_eq!(doc.inner_html(inner_root).unwrap(), "<i>inner</i>");
    }

    #[test]
    fn test_self_including_template_terminates() {
        let session = Session::parse("<html><body></body></html>").unwrap();
        session
            .define(
                r#"<template id="loop-tag"><loop-tag></loop-tag></template>"#,
                ComponentOptions::new(),
            )
            .unwrap();
        let upgraded = session.create_component("loop-tag").unwrap();
        assert!(session.document().shadow_root(upgraded).is_some());
    }
}
