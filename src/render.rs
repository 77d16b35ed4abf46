//! # Structured Log Rendering
//!
//! ## Overview
//!
//! Converts an arbitrary object graph into a single-line diagnostic string of
//! the form `TypeLabel(field=value, field=value)`. Rendering sits on the
//! request path, so it has two hard guarantees:
//!
//! - it never fails outward: absent values, empty collections, unreadable
//!   fields, and panics inside user field code all degrade to omission (plus
//!   a warning), never to an error surfacing to the caller;
//! - it is cycle-safe: an object reachable from itself renders with the
//!   cyclic back-edge omitted instead of recursing forever.
//!
//! Cycle tracking is an explicit visited stack scoped to one `render` call
//! and threaded through the recursion. Entries are pushed before descending
//! into an object and popped on the way out, so sibling subtrees render
//! independently and the stack is drained when the top-level call returns.
//!
//! ## The two traits
//!
//! [`Loggable`] is the object-level contract: a type label plus named fields.
//! [`LogValue`] is the value-level hook: scalars render through `Display`,
//! `Option`/`Vec` recurse, and domain types defer to their [`Loggable`] impl
//! (or return custom text, which is how a type takes full control of its own
//! rendering).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use tracing::warn;

/// A value position inside a rendered object.
///
/// `Absent` and empty `List`s are omitted from the output entirely, as is a
/// `Failed` accessor (after a warning). This is opinionated: absent data is
/// noise in logs, not information.
pub enum FieldValue<'a> {
    /// Nothing to render; the whole `name=value` pair is dropped.
    Absent,
    /// Already-rendered text, used for scalars and custom representations.
    Text(String),
    /// A nested object rendered through its [`Loggable`] impl.
    Nested(&'a dyn Loggable),
    /// A nested object behind shared ownership. Reference cycles in Rust only
    /// arise through `Rc`-like graphs, so the cyclic case enters here.
    Shared(Rc<dyn Loggable + 'a>),
    /// A homogeneous ordered collection, rendered `(a, b, c)`.
    List(Vec<FieldValue<'a>>),
    /// Reading the field failed; rendered as an omission plus a warning.
    Failed(String),
}

impl<'a> FieldValue<'a> {
    /// Renders any `Display` value as text.
    pub fn text(value: impl std::fmt::Display) -> Self {
        FieldValue::Text(value.to_string())
    }

    pub fn nested(value: &'a dyn Loggable) -> Self {
        FieldValue::Nested(value)
    }

    pub fn shared(value: Rc<dyn Loggable + 'a>) -> Self {
        FieldValue::Shared(value)
    }

    pub fn list(items: impl IntoIterator<Item = FieldValue<'a>>) -> Self {
        FieldValue::List(items.into_iter().collect())
    }
}

/// Object-level rendering contract: a label and named fields.
///
/// Implementations list exactly the fields they want in logs; leaving a field
/// out is how sensitive data is excluded.
pub trait Loggable {
    /// Short type name used as the prefix of the rendered form.
    fn type_label(&self) -> &str;

    /// Field name/value pairs in the order they should appear.
    fn log_fields(&self) -> Vec<(&'static str, FieldValue<'_>)>;

    /// Renders this object on its own, outside a pipeline invocation.
    fn to_log_string(&self) -> String
    where
        Self: Sized,
    {
        render(self)
    }
}

/// Value-level rendering hook.
///
/// Provided for the usual scalar suspects, `Option`, `Vec`, and slices.
/// Domain types typically implement it as `FieldValue::Nested(self)` to defer
/// to their [`Loggable`] impl, or return [`FieldValue::Text`] to take full
/// control of their rendered form.
pub trait LogValue {
    fn log_value(&self) -> FieldValue<'_>;
}

macro_rules! log_value_via_display {
    ($($ty:ty),* $(,)?) => {
        $(
            impl LogValue for $ty {
                fn log_value(&self) -> FieldValue<'_> {
                    FieldValue::Text(self.to_string())
                }
            }
        )*
    };
}

log_value_via_display!(
    bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, String,
    uuid::Uuid,
);

impl LogValue for str {
    fn log_value(&self) -> FieldValue<'_> {
        FieldValue::Text(self.to_string())
    }
}

impl<'b, T: LogValue + ?Sized> LogValue for &'b T {
    fn log_value(&self) -> FieldValue<'_> {
        (**self).log_value()
    }
}

impl<T: LogValue> LogValue for Option<T> {
    fn log_value(&self) -> FieldValue<'_> {
        match self {
            Some(value) => value.log_value(),
            None => FieldValue::Absent,
        }
    }
}

impl<T: LogValue> LogValue for Vec<T> {
    fn log_value(&self) -> FieldValue<'_> {
        FieldValue::List(self.iter().map(LogValue::log_value).collect())
    }
}

impl<T: LogValue> LogValue for [T] {
    fn log_value(&self) -> FieldValue<'_> {
        FieldValue::List(self.iter().map(LogValue::log_value).collect())
    }
}

/// Renders an object graph, degrading to `TypeLabel(<unrenderable>)` if user
/// field code panics. Never fails outward.
pub fn render(value: &dyn Loggable) -> String {
    try_render(value).unwrap_or_else(|| format!("{}(<unrenderable>)", value.type_label()))
}

/// Renders an object graph, returning `None` (after a warning) if user field
/// code panics. Used where omission beats a placeholder, e.g. result
/// rendering in success logs.
pub fn try_render(value: &dyn Loggable) -> Option<String> {
    let outcome = catch_unwind(AssertUnwindSafe(|| {
        let mut ctx = RenderContext::default();
        ctx.render_object(value)
    }));
    match outcome {
        Ok(rendered) => rendered,
        Err(_) => {
            warn!("log rendering panicked, value omitted from log output");
            None
        }
    }
}

/// Identity of an in-progress object: data address plus label address. The
/// label disambiguates a struct from its first field, which share an address.
type ObjectId = (usize, usize);

#[derive(Default)]
struct RenderContext {
    in_progress: Vec<ObjectId>,
}

impl RenderContext {
    /// Renders one object, or `None` when the object is already on the
    /// current render path (a cycle: the back-edge is dropped, not an error).
    fn render_object(&mut self, object: &dyn Loggable) -> Option<String> {
        let label = object.type_label();
        let id: ObjectId = (
            object as *const dyn Loggable as *const () as usize,
            label.as_ptr() as usize,
        );
        if self.in_progress.contains(&id) {
            return None;
        }

        self.in_progress.push(id);
        let mut parts: Vec<String> = Vec::new();
        for (name, value) in object.log_fields() {
            if let Some(rendered) = self.render_value(name, &value) {
                parts.push(format!("{name}={rendered}"));
            }
        }
        self.in_progress.pop();

        Some(format!("{label}({})", parts.join(", ")))
    }

    fn render_value(&mut self, field: &str, value: &FieldValue<'_>) -> Option<String> {
        match value {
            FieldValue::Absent => None,
            FieldValue::Text(text) => Some(text.clone()),
            FieldValue::Nested(inner) => self.render_object(*inner),
            FieldValue::Shared(inner) => self.render_object(&**inner),
            FieldValue::List(items) => {
                if items.is_empty() {
                    return None;
                }
                let rendered: Vec<String> = items
                    .iter()
                    .filter_map(|item| self.render_value(field, item))
                    .collect();
                if rendered.is_empty() {
                    None
                } else {
                    Some(format!("({})", rendered.join(", ")))
                }
            }
            FieldValue::Failed(reason) => {
                warn!(
                    field = field,
                    reason = %reason,
                    "failed to read field for log rendering, omitting it"
                );
                None
            }
        }
    }
}

/// Last path segment of a type name, generic arguments kept.
pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    match full.find('<') {
        None => full.rsplit("::").next().unwrap_or(full),
        Some(angle) => {
            let head = &full[..angle];
            let start = head.rfind("::").map(|i| i + 2).unwrap_or(0);
            &full[start..]
        }
    }
}
