//! Template-driven list rendering.
//!
//! [`ListRenderer::render_list`] turns a template element into one
//! instance per collection item and keeps the instances in sync with a
//! [`Reactive`] collection.
//!
//! # Render pass
//!
//! 1. The template element (id `T`) is swapped for an anchor labelled
//!    `repeat:T:anchor` that remembers the template markup. Later calls
//!    find the anchor instead.
//! 2. Item `i` renders to an element with id `T-i`, replacing an existing
//!    `T-i` in place or inserting after `T-(i-1)` (or the anchor).
//! 3. Instances `T-len`, `T-(len+1)`, … are removed until the first id
//!    that does not exist.
//!
//! Reactive collections re-run the pass on change, at most once per frame.

pub mod document;
pub mod frame;
pub mod template;

use std::sync::{Arc, Mutex, PoisonError};

use serde_json::Value;

use crate::reactive::{Reactive, Subscription};

pub use document::{Document, MemoryDocument, NodeId};
pub use frame::{
    FrameCallback, FrameHandle, FrameScheduler, IntervalFrames, ManualFrames,
    DEFAULT_FRAME_INTERVAL,
};
pub use template::render_template;

/// Collection passed to [`ListRenderer::render_list`].
#[derive(Debug, Clone)]
pub enum ListSource {
    /// Rendered once.
    Plain(Value),
    /// Rendered now and again after every change.
    Reactive(Reactive),
}

impl From<Value> for ListSource {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl From<Reactive> for ListSource {
    fn from(reactive: Reactive) -> Self {
        Self::Reactive(reactive)
    }
}

impl From<&Reactive> for ListSource {
    fn from(reactive: &Reactive) -> Self {
        Self::Reactive(reactive.clone())
    }
}

/// Label of the anchor that stands in for template `template_id`.
#[must_use]
pub fn anchor_label(template_id: &str) -> String {
    format!("repeat:{template_id}:anchor")
}

/// Renders lists into a host [`Document`].
#[derive(Clone)]
pub struct ListRenderer {
    document: Arc<dyn Document>,
    frames: Arc<dyn FrameScheduler>,
}

impl std::fmt::Debug for ListRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListRenderer").finish_non_exhaustive()
    }
}

impl ListRenderer {
    /// Renderer over `document`, scheduling reactive re-renders on `frames`.
    pub fn new(document: Arc<dyn Document>, frames: Arc<dyn FrameScheduler>) -> Self {
        Self { document, frames }
    }

    /// Render `source` through the template with id `template_id`.
    ///
    /// Returns the change subscription for reactive sources. Detach it with
    /// [`Subscription::unsubscribe`] to stop re-rendering. Calling this
    /// again for the same reactive source adds another subscription.
    pub fn render_list(
        &self,
        template_id: &str,
        source: impl Into<ListSource>,
    ) -> Option<Subscription> {
        let source = source.into();
        let value = match &source {
            ListSource::Plain(value) => value.clone(),
            ListSource::Reactive(reactive) => reactive.snapshot(),
        };

        if !matches!(value, Value::Array(_) | Value::Object(_)) {
            log::warn!(
                "[Companion/render] render_list: collection for '{}' is not a list or object",
                template_id
            );
            return None;
        }

        let Some((anchor, markup)) = self.resolve_anchor(template_id) else {
            log::warn!(
                "[Companion/render] render_list: Template '{}' not found and no anchor exists.",
                template_id
            );
            return None;
        };

        render_pass(self.document.as_ref(), template_id, anchor, &markup, &value);

        let ListSource::Reactive(reactive) = source else {
            return None;
        };

        let document = Arc::clone(&self.document);
        let frames = Arc::clone(&self.frames);
        let template_id = template_id.to_string();
        let weak = reactive.downgrade();
        let pending = Arc::new(Mutex::new(None::<FrameHandle>));

        Some(reactive.subscribe(move || {
            let document = Arc::clone(&document);
            let template_id = template_id.clone();
            let markup = markup.clone();
            let weak = weak.clone();

            let mut pending = pending.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(previous) = pending.take() {
                frames.cancel_frame(previous);
            }
            *pending = Some(frames.request_frame(Box::new(move || {
                let Some(reactive) = weak.upgrade() else {
                    return;
                };
                let value = reactive.snapshot();
                log::trace!("[Companion/render] Re-rendering '{}'", template_id);
                render_pass(document.as_ref(), &template_id, anchor, &markup, &value);
            })));
        }))
    }

    fn resolve_anchor(&self, template_id: &str) -> Option<(NodeId, String)> {
        let doc = self.document.as_ref();
        let label = anchor_label(template_id);

        if let Some(template) = doc.element_by_id(template_id) {
            let markup = doc.outer_html(template)?;
            let anchor = doc.replace_with_anchor(template, &label, markup.clone())?;
            log::debug!("[Companion/render] Captured template '{}'", template_id);
            return Some((anchor, markup));
        }

        let anchor = doc.find_anchor(&label)?;
        let markup = doc.anchor_markup(anchor)?;
        Some((anchor, markup))
    }
}

/// Reconcile instances of `template_id` with `collection`.
fn render_pass(
    doc: &dyn Document,
    template_id: &str,
    anchor: NodeId,
    markup: &str,
    collection: &Value,
) {
    let items: Vec<&Value> = match collection {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => return,
    };

    for (index, item) in items.iter().enumerate() {
        let instance_id = format!("{template_id}-{index}");
        let html = render_template(markup, item);

        let Some(node) = doc.parse_fragment(&html) else {
            log::warn!(
                "[Companion/render] Item {} of '{}' rendered no element",
                index,
                template_id
            );
            continue;
        };
        doc.set_id(node, &instance_id);

        if let Some(existing) = doc.element_by_id(&instance_id) {
            doc.replace_node(existing, node);
        } else if index == 0 {
            doc.insert_after(anchor, node);
        } else if let Some(previous) = doc.element_by_id(&format!("{template_id}-{}", index - 1)) {
            doc.insert_after(previous, node);
        } else {
            doc.insert_after(anchor, node);
        }
    }

    let mut stale = items.len();
    while let Some(node) = doc.element_by_id(&format!("{template_id}-{stale}")) {
        doc.remove_node(node);
        stale += 1;
    }
}
