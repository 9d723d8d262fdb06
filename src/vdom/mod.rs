//! Virtual DOM: vnodes, the element factory, component vnode management,
//! and the patch (diff) engine.

pub mod create_component;
pub mod create_element;
pub mod modules;
pub mod patch;
pub mod vnode;

pub use create_component::{create_async_placeholder, create_component};
pub use create_element::{
    data_from_value, h, h_text, normalize_children, NormalizationMode, RawChild, TagInput,
};
pub use modules::{attrs_module, ModuleHooks};
pub use patch::{create_patch_function, PatchOld, Patcher};
pub use vnode::{
    create_comment_vnode, create_empty_vnode, create_text_vnode, same_vnode,
    ComponentVNodeOptions, Key, RemoveHandle, Rendered, VNode, VNodeData, VNodeHooks, VNodeRef,
};

// =============================================================================
// Reserved tags / namespaces
// =============================================================================

const HTML_TAGS: &[&str] = &[
    "html", "body", "base", "head", "link", "meta", "style", "title", "address", "article",
    "aside", "footer", "header", "h1", "h2", "h3", "h4", "h5", "h6", "hgroup", "nav", "section",
    "div", "dd", "dl", "dt", "figcaption", "figure", "picture", "hr", "img", "li", "main", "ol",
    "p", "pre", "ul", "a", "b", "abbr", "bdi", "bdo", "br", "cite", "code", "data", "dfn", "em",
    "i", "kbd", "mark", "q", "rp", "rt", "rtc", "ruby", "s", "samp", "small", "span", "strong",
    "sub", "sup", "time", "u", "var", "wbr", "area", "audio", "map", "track", "video", "embed",
    "object", "param", "source", "canvas", "script", "noscript", "del", "ins", "caption", "col",
    "colgroup", "table", "thead", "tbody", "td", "th", "tr", "button", "datalist", "fieldset",
    "form", "input", "label", "legend", "meter", "optgroup", "option", "output", "progress",
    "select", "textarea", "details", "dialog", "menu", "menuitem", "summary", "content",
    "element", "shadow", "template", "blockquote", "iframe", "tfoot",
];

const SVG_TAGS: &[&str] = &[
    "svg", "animate", "circle", "clippath", "cursor", "defs", "desc", "ellipse", "filter",
    "font-face", "foreignobject", "g", "glyph", "image", "line", "marker", "mask", "missing-glyph",
    "path", "pattern", "polygon", "polyline", "rect", "switch", "symbol", "text", "textpath",
    "tspan", "use", "view",
];

/// Is this a tag the host platform owns (never a component id)?
pub fn is_reserved_tag(tag: &str) -> bool {
    let lower = tag.to_ascii_lowercase();
    HTML_TAGS.contains(&lower.as_str()) || SVG_TAGS.contains(&lower.as_str())
}

/// Namespace for tags that need `createElementNS`.
pub fn get_tag_namespace(tag: &str) -> Option<&'static str> {
    let lower = tag.to_ascii_lowercase();
    if SVG_TAGS.contains(&lower.as_str()) {
        Some("svg")
    } else if lower == "math" {
        Some("math")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_tags() {
        assert!(is_reserved_tag("div"));
        assert!(is_reserved_tag("DIV"));
        assert!(is_reserved_tag("svg"));
        assert!(!is_reserved_tag("my-widget"));
    }

    #[test]
    fn test_namespaces() {
        assert_eq!(get_tag_namespace("svg"), Some("svg"));
        assert_eq!(get_tag_namespace("circle"), Some("svg"));
        assert_eq!(get_tag_namespace("math"), Some("math"));
        assert_eq!(get_tag_namespace("div"), None);
    }
}
