//! In-memory page
//!
//! A small DOM with scripted behaviour: handlers fire on click, typing and
//! Enter (bubbling to ancestors like browser events do), and timed mutations
//! apply once their deadline passes. Commands and the runner are tested
//! against it without a browser.

use async_trait::async_trait;
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::browser::Page;
use crate::error::{E2eError, E2eResult};
use crate::selector::{Selector, TEST_SUBJ_ATTR};

pub type NodeId = usize;

/// Handle to a node of a [`MemoryPage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryElement(pub NodeId);

/// DOM event a handler reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    Click,
    Enter,
    Input,
}

type Handler = Arc<dyn Fn(&mut MemoryDom, NodeId) + Send + Sync>;
type Mutation = Box<dyn FnOnce(&mut MemoryDom) + Send>;
type Route = Arc<dyn Fn(&mut MemoryDom, &str) + Send + Sync>;

#[derive(Debug, Clone)]
struct Node {
    tag: String,
    attrs: BTreeMap<String, String>,
    text: String,
    value: Option<String>,
    styles: BTreeMap<String, String>,
    displayed: bool,
    attached: bool,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Mutable document state behind a [`MemoryPage`]
pub struct MemoryDom {
    nodes: Vec<Node>,
    url: String,
    handlers: Vec<(Selector, Trigger, Handler)>,
    timers: Vec<(Instant, Mutation)>,
    routes: Vec<(String, Route)>,
    errors: Vec<String>,
    uploads: Vec<PathBuf>,
    visits: Vec<String>,
}

impl Default for MemoryDom {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDom {
    pub const ROOT: NodeId = 0;

    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                tag: "body".to_string(),
                attrs: BTreeMap::new(),
                text: String::new(),
                value: None,
                styles: BTreeMap::new(),
                displayed: true,
                attached: true,
                parent: None,
                children: Vec::new(),
            }],
            url: "about:blank".to_string(),
            handlers: Vec::new(),
            timers: Vec::new(),
            routes: Vec::new(),
            errors: Vec::new(),
            uploads: Vec::new(),
            visits: Vec::new(),
        }
    }

    /// Append an element under `parent`
    pub fn add(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)], text: &str) -> NodeId {
        let id = self.nodes.len();
        let is_input = matches!(tag, "input" | "textarea" | "select");
        let mut attr_map: BTreeMap<String, String> = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let value = if is_input {
            Some(attr_map.remove("value").unwrap_or_default())
        } else {
            None
        };
        self.nodes.push(Node {
            tag: tag.to_string(),
            attrs: attr_map,
            text: text.to_string(),
            value,
            styles: BTreeMap::new(),
            displayed: true,
            attached: true,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Append a `div` tagged with a test subject
    pub fn add_subj(&mut self, parent: NodeId, subj: &str, text: &str) -> NodeId {
        self.add(parent, "div", &[(TEST_SUBJ_ATTR, subj)], text)
    }

    /// Append an `input` tagged with a test subject
    pub fn add_input(&mut self, parent: NodeId, subj: &str, value: &str) -> NodeId {
        self.add(parent, "input", &[(TEST_SUBJ_ATTR, subj), ("value", value)], "")
    }

    /// Detach a node and its subtree
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id].parent {
            self.nodes[parent].children.retain(|c| *c != id);
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            self.nodes[n].attached = false;
            stack.extend(self.nodes[n].children.iter().copied());
        }
    }

    /// Detach every attached node tagged with `subj`
    pub fn remove_subj(&mut self, subj: &str) {
        for id in self.find_all(&Selector::test_subj(subj)) {
            self.remove(id);
        }
    }

    pub fn set_text(&mut self, id: NodeId, text: &str) {
        self.nodes[id].text = text.to_string();
    }

    pub fn set_value(&mut self, id: NodeId, value: &str) {
        self.nodes[id].value = Some(value.to_string());
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id].attrs.insert(name.to_string(), value.to_string());
    }

    pub fn set_style(&mut self, id: NodeId, name: &str, value: &str) {
        self.nodes[id].styles.insert(name.to_string(), value.to_string());
    }

    pub fn set_displayed(&mut self, id: NodeId, displayed: bool) {
        self.nodes[id].displayed = displayed;
    }

    pub fn text_of(&self, id: NodeId) -> &str {
        &self.nodes[id].text
    }

    pub fn value_of(&self, id: NodeId) -> Option<&str> {
        self.nodes[id].value.as_deref()
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        self.nodes[id].attached
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// URLs passed to `goto`, oldest first
    pub fn visits(&self) -> &[String] {
        &self.visits
    }

    /// Files attached through `upload`, oldest first
    pub fn uploads(&self) -> &[PathBuf] {
        &self.uploads
    }

    pub fn raise_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    /// First attached node tagged with `subj`
    pub fn find_subj(&self, subj: &str) -> Option<NodeId> {
        self.find_all(&Selector::test_subj(subj)).into_iter().next()
    }

    /// Attached nodes matching `selector` in document order. Unsupported CSS matches nothing.
    pub fn find_all(&self, selector: &Selector) -> Vec<NodeId> {
        let compound = match Compound::for_selector(selector) {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };
        self.descendants(Self::ROOT)
            .into_iter()
            .filter(|id| compound.matches(&self.nodes[*id]))
            .collect()
    }

    /// React to `trigger` on nodes matching `selector` (or their descendants)
    pub fn on<F>(&mut self, selector: Selector, trigger: Trigger, handler: F)
    where
        F: Fn(&mut MemoryDom, NodeId) + Send + Sync + 'static,
    {
        self.handlers.push((selector, trigger, Arc::new(handler)));
    }

    /// Shorthand for a click handler on a test subject
    pub fn on_click<F>(&mut self, subj: &str, handler: F)
    where
        F: Fn(&mut MemoryDom, NodeId) + Send + Sync + 'static,
    {
        self.on(Selector::test_subj(subj), Trigger::Click, handler);
    }

    /// Apply `mutation` once `delay` has passed
    pub fn after<F>(&mut self, delay: Duration, mutation: F)
    where
        F: FnOnce(&mut MemoryDom) + Send + 'static,
    {
        self.timers.push((Instant::now() + delay, Box::new(mutation)));
    }

    /// Run `handler` whenever a visited URL contains `fragment`
    pub fn on_visit<F>(&mut self, fragment: &str, handler: F)
    where
        F: Fn(&mut MemoryDom, &str) + Send + Sync + 'static,
    {
        self.routes.push((fragment.to_string(), Arc::new(handler)));
    }

    fn descendants(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.nodes[from].children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if !self.nodes[id].attached {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id].children.iter().rev().copied());
        }
        out
    }

    fn run_due_timers(&mut self) {
        let now = Instant::now();
        let mut due = Vec::new();
        let mut i = 0;
        while i < self.timers.len() {
            if self.timers[i].0 <= now {
                due.push(self.timers.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|(at, _)| *at);
        for (_, mutation) in due {
            mutation(self);
        }
    }

    fn dispatch(&mut self, target: NodeId, trigger: Trigger) {
        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            path.push(id);
            cursor = self.nodes[id].parent;
        }

        let mut fire = Vec::new();
        for id in path {
            for (selector, t, handler) in &self.handlers {
                if *t != trigger {
                    continue;
                }
                if let Ok(compound) = Compound::for_selector(selector) {
                    if compound.matches(&self.nodes[id]) {
                        fire.push((id, handler.clone()));
                    }
                }
            }
        }
        for (id, handler) in fire {
            handler(self, id);
        }
    }

    fn visible(&self, id: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(n) = cursor {
            if !self.nodes[n].displayed {
                return false;
            }
            cursor = self.nodes[n].parent;
        }
        true
    }

    fn rendered_text(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        if !self.nodes[id].text.is_empty() {
            parts.push(self.nodes[id].text.clone());
        }
        for child in &self.nodes[id].children {
            if self.nodes[*child].attached && self.nodes[*child].displayed {
                let text = self.rendered_text(*child);
                if !text.is_empty() {
                    parts.push(text);
                }
            }
        }
        parts.join("\n")
    }

    fn live(&self, element: &MemoryElement) -> E2eResult<NodeId> {
        let id = element.0;
        match self.nodes.get(id) {
            Some(node) if node.attached => Ok(id),
            Some(_) => Err(E2eError::Driver(format!("stale element reference: node {id}"))),
            None => Err(E2eError::Driver(format!("no such element: node {id}"))),
        }
    }

    fn interactable(&self, element: &MemoryElement) -> E2eResult<NodeId> {
        let id = self.live(element)?;
        if !self.visible(id) {
            return Err(E2eError::Driver(format!("element not interactable: node {id}")));
        }
        Ok(id)
    }
}

/// Page backed by a [`MemoryDom`]
#[derive(Default)]
pub struct MemoryPage {
    dom: Mutex<MemoryDom>,
}

impl MemoryPage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the initial document
    pub fn with<F>(build: F) -> Self
    where
        F: FnOnce(&mut MemoryDom),
    {
        let mut dom = MemoryDom::new();
        build(&mut dom);
        Self { dom: Mutex::new(dom) }
    }

    /// Inspect or mutate the document directly
    pub fn dom(&self) -> MutexGuard<'_, MemoryDom> {
        self.dom.lock()
    }

    fn settle(&self) -> MutexGuard<'_, MemoryDom> {
        let mut dom = self.dom.lock();
        dom.run_due_timers();
        dom
    }
}

#[async_trait]
impl Page for MemoryPage {
    type Element = MemoryElement;

    async fn goto(&self, url: &str) -> E2eResult<()> {
        let mut dom = self.settle();
        dom.url = url.to_string();
        dom.visits.push(url.to_string());
        let routes: Vec<Route> = dom
            .routes
            .iter()
            .filter(|(fragment, _)| url.contains(fragment.as_str()))
            .map(|(_, route)| route.clone())
            .collect();
        for route in routes {
            route(&mut *dom, url);
        }
        Ok(())
    }

    async fn current_url(&self) -> E2eResult<String> {
        Ok(self.settle().url.clone())
    }

    async fn query(&self, scope: Option<&MemoryElement>, selector: &Selector) -> E2eResult<Vec<MemoryElement>> {
        let dom = self.settle();
        let compound = Compound::for_selector(selector)?;
        let from = match scope {
            Some(element) => dom.live(element)?,
            None => MemoryDom::ROOT,
        };
        Ok(dom
            .descendants(from)
            .into_iter()
            .filter(|id| compound.matches(&dom.nodes[*id]))
            .map(MemoryElement)
            .collect())
    }

    async fn closest(&self, element: &MemoryElement, selector: &Selector) -> E2eResult<Option<MemoryElement>> {
        let dom = self.settle();
        let compound = Compound::for_selector(selector)?;
        let mut cursor = Some(dom.live(element)?);
        while let Some(id) = cursor {
            if compound.matches(&dom.nodes[id]) {
                return Ok(Some(MemoryElement(id)));
            }
            cursor = dom.nodes[id].parent;
        }
        Ok(None)
    }

    async fn click(&self, element: &MemoryElement) -> E2eResult<()> {
        let mut dom = self.settle();
        let id = dom.interactable(element)?;
        dom.dispatch(id, Trigger::Click);
        Ok(())
    }

    async fn type_text(&self, element: &MemoryElement, text: &str) -> E2eResult<()> {
        let mut dom = self.settle();
        let id = dom.interactable(element)?;
        let current = dom.nodes[id].value.clone().unwrap_or_default();
        dom.nodes[id].value = Some(current + text);
        dom.dispatch(id, Trigger::Input);
        Ok(())
    }

    async fn press_enter(&self, element: &MemoryElement) -> E2eResult<()> {
        let mut dom = self.settle();
        let id = dom.interactable(element)?;
        dom.dispatch(id, Trigger::Enter);
        Ok(())
    }

    async fn clear(&self, element: &MemoryElement) -> E2eResult<()> {
        let mut dom = self.settle();
        let id = dom.interactable(element)?;
        dom.nodes[id].value = Some(String::new());
        dom.dispatch(id, Trigger::Input);
        Ok(())
    }

    async fn text(&self, element: &MemoryElement) -> E2eResult<String> {
        let dom = self.settle();
        let id = dom.live(element)?;
        Ok(dom.rendered_text(id))
    }

    async fn value(&self, element: &MemoryElement) -> E2eResult<Option<String>> {
        let dom = self.settle();
        let id = dom.live(element)?;
        Ok(dom.nodes[id].value.clone())
    }

    async fn attribute(&self, element: &MemoryElement, name: &str) -> E2eResult<Option<String>> {
        let dom = self.settle();
        let id = dom.live(element)?;
        if name == "value" && dom.nodes[id].value.is_some() {
            return Ok(dom.nodes[id].value.clone());
        }
        Ok(dom.nodes[id].attrs.get(name).cloned())
    }

    async fn css_value(&self, element: &MemoryElement, name: &str) -> E2eResult<String> {
        let dom = self.settle();
        let id = dom.live(element)?;
        Ok(dom.nodes[id].styles.get(name).cloned().unwrap_or_default())
    }

    async fn is_displayed(&self, element: &MemoryElement) -> E2eResult<bool> {
        let dom = self.settle();
        let id = dom.live(element)?;
        Ok(dom.visible(id))
    }

    async fn upload(&self, element: &MemoryElement, path: &Path) -> E2eResult<()> {
        let mut dom = self.settle();
        let id = dom.live(element)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        dom.nodes[id].value = Some(name);
        dom.uploads.push(path.to_path_buf());
        dom.dispatch(id, Trigger::Input);
        Ok(())
    }

    async fn take_uncaught_errors(&self) -> E2eResult<Vec<String>> {
        let mut dom = self.settle();
        Ok(std::mem::take(&mut dom.errors))
    }

    async fn screenshot_png(&self) -> E2eResult<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// One compound CSS selector: `tag#id.class[attr][attr="v"][attr^="v"][attr*="v"]`
#[derive(Debug, Default, PartialEq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrMatch>,
}

#[derive(Debug, PartialEq)]
enum AttrMatch {
    Present(String),
    Equals(String, String),
    Prefix(String, String),
    Contains(String, String),
}

impl Compound {
    fn for_selector(selector: &Selector) -> E2eResult<Self> {
        let subj = |m: AttrMatch| Compound {
            attrs: vec![m],
            ..Default::default()
        };
        Ok(match selector {
            Selector::TestSubj(v) => subj(AttrMatch::Equals(TEST_SUBJ_ATTR.into(), v.clone())),
            Selector::TestSubjPrefix(v) => subj(AttrMatch::Prefix(TEST_SUBJ_ATTR.into(), v.clone())),
            Selector::TestSubjContains(v) => subj(AttrMatch::Contains(TEST_SUBJ_ATTR.into(), v.clone())),
            Selector::Css(css) => Self::parse(css)?,
        })
    }

    fn parse(css: &str) -> E2eResult<Self> {
        let unsupported = || E2eError::Driver(format!("selector not supported by memory page: {css}"));
        let mut out = Compound::default();
        let chars: Vec<char> = css.trim().chars().collect();
        let mut i = 0;

        let ident = |i: &mut usize| {
            let start = *i;
            while *i < chars.len() && (chars[*i].is_alphanumeric() || matches!(chars[*i], '-' | '_')) {
                *i += 1;
            }
            chars[start..*i].iter().collect::<String>()
        };

        let tag = ident(&mut i);
        if !tag.is_empty() {
            out.tag = Some(tag);
        }

        while i < chars.len() {
            match chars[i] {
                '#' => {
                    i += 1;
                    out.id = Some(ident(&mut i));
                }
                '.' => {
                    i += 1;
                    out.classes.push(ident(&mut i));
                }
                '[' => {
                    i += 1;
                    let name = ident(&mut i);
                    if name.is_empty() {
                        return Err(unsupported());
                    }
                    let op = match chars.get(i) {
                        Some(']') => None,
                        Some('=') => Some('='),
                        Some(c @ ('^' | '*')) if chars.get(i + 1) == Some(&'=') => {
                            i += 1;
                            Some(*c)
                        }
                        _ => return Err(unsupported()),
                    };
                    let Some(op) = op else {
                        i += 1;
                        out.attrs.push(AttrMatch::Present(name));
                        continue;
                    };
                    i += 1;
                    let quote = match chars.get(i) {
                        Some(q @ ('"' | '\'')) => {
                            i += 1;
                            Some(*q)
                        }
                        _ => None,
                    };
                    let start = i;
                    while i < chars.len() && Some(chars[i]) != quote && !(quote.is_none() && chars[i] == ']') {
                        i += 1;
                    }
                    let value: String = chars[start..i].iter().collect();
                    if quote.is_some() {
                        i += 1;
                    }
                    if chars.get(i) != Some(&']') {
                        return Err(unsupported());
                    }
                    i += 1;
                    out.attrs.push(match op {
                        '^' => AttrMatch::Prefix(name, value),
                        '*' => AttrMatch::Contains(name, value),
                        _ => AttrMatch::Equals(name, value),
                    });
                }
                _ => return Err(unsupported()),
            }
        }

        Ok(out)
    }

    fn matches(&self, node: &Node) -> bool {
        if let Some(tag) = &self.tag {
            if !node.tag.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &self.id {
            if node.attrs.get("id") != Some(id) {
                return false;
            }
        }
        if !self.classes.is_empty() {
            let classes: Vec<&str> = node
                .attrs
                .get("class")
                .map(|c| c.split_whitespace().collect())
                .unwrap_or_default();
            if !self.classes.iter().all(|c| classes.contains(&c.as_str())) {
                return false;
            }
        }
        self.attrs.iter().all(|m| match m {
            AttrMatch::Present(name) => node.attrs.contains_key(name),
            AttrMatch::Equals(name, v) => node.attrs.get(name) == Some(v),
            AttrMatch::Prefix(name, v) => node.attrs.get(name).map_or(false, |a| a.starts_with(v.as_str())),
            AttrMatch::Contains(name, v) => node.attrs.get(name).map_or(false, |a| a.contains(v.as_str())),
        })
    }
}
