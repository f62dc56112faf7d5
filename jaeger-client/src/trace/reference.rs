use super::span_context::SpanContext;

/// Kind of relationship between a span and a referenced context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceType {
    /// The referenced span depends on the result of the new span.
    ChildOf,
    /// The referenced span does not depend on the new span.
    FollowsFrom,
    /// Not a real reference: seeds a new root span with the trace id and span
    /// id of the given context.
    ///
    /// It must be the only reference supplied when starting a span. The
    /// caller is responsible for the uniqueness of the ids it injects this way.
    SelfRef,
}

/// A reference from a span to another span context.
#[derive(Clone, Debug, PartialEq)]
pub struct Reference {
    /// The referenced context.
    pub context: SpanContext,
    /// How the span relates to it.
    pub kind: ReferenceType,
}

impl Reference {
    /// Create a new reference.
    pub fn new(context: SpanContext, kind: ReferenceType) -> Self {
        Reference { context, kind }
    }

    /// A `ChildOf` reference.
    pub fn child_of(context: SpanContext) -> Self {
        Reference::new(context, ReferenceType::ChildOf)
    }

    /// A `FollowsFrom` reference.
    pub fn follows_from(context: SpanContext) -> Self {
        Reference::new(context, ReferenceType::FollowsFrom)
    }

    /// A self reference, see [`ReferenceType::SelfRef`].
    pub fn self_ref(context: SpanContext) -> Self {
        Reference::new(context, ReferenceType::SelfRef)
    }
}
