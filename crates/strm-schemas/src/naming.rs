//! Resource naming conventions derived from a stream name.

/// Stream-managed ingest pipeline holding the stream's processing steps.
pub fn processing_pipeline_name(stream: &str) -> String {
    format!("{stream}@stream.processing")
}

/// Component template carrying a wired stream's field mappings.
pub fn layer_component_template_name(stream: &str) -> String {
    format!("{stream}@stream.layer")
}

/// Default pipeline name assumed for an index template that declares none.
pub fn shared_pipeline_fallback_name(template: &str) -> String {
    format!("{template}-pipeline")
}

/// Parent of a dotted wired stream name; `None` for a root.
pub fn parent_name(stream: &str) -> Option<&str> {
    stream.rfind('.').map(|idx| &stream[..idx])
}

pub fn is_root(stream: &str) -> bool {
    !stream.contains('.')
}

/// `true` when `child` is exactly one segment below `parent`.
pub fn is_direct_child(parent: &str, child: &str) -> bool {
    match child.strip_prefix(parent).and_then(|rest| rest.strip_prefix('.')) {
        Some(segment) => !segment.is_empty() && !segment.contains('.'),
        None => false,
    }
}
