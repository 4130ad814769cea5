//! In-page JavaScript fragments.
//!
//! Everything evaluated inside the page is generated here so quoting is
//! handled in one place. Per the queue-ownership rule, in-page code only
//! marks and notifies; it never holds authoritative state beyond the
//! monotonically growing sequence attribute.

/// Attribute stamped onto discovered post elements, carrying their discovery
/// sequence number.
pub const SEQ_ATTRIBUTE: &str = "data-trawl-seq";

/// Name of the host binding invoked once per discovered post.
pub const DISCOVERY_BINDING: &str = "__trawlDiscovered";

pub const SCROLL_TO_BOTTOM: &str = "window.scrollBy(0, document.body.scrollHeight)";

/// Embed a string as a JS string literal.
fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| String::from("\"\""))
}

/// Observer installation: stamp every current and future post element under
/// the feed container with a sequence attribute and signal the host binding.
/// Evaluates to `true` when the container was found.
pub fn observer_install(container_selector: &str, post_selector: &str) -> String {
    let container = js_string(container_selector);
    let post = js_string(post_selector);
    let seq_attribute = js_string(SEQ_ATTRIBUTE);
    format!(
        r#"(() => {{
    const container = document.querySelector({container});
    if (!container) {{ return false; }}
    let seq = 0;
    const mark = (el) => {{
        if (el.hasAttribute({seq_attribute})) {{ return; }}
        el.setAttribute({seq_attribute}, String(seq));
        window.{DISCOVERY_BINDING}(String(seq));
        seq += 1;
    }};
    container.querySelectorAll({post}).forEach(mark);
    const observer = new MutationObserver((mutations) => {{
        for (const mutation of mutations) {{
            for (const added of mutation.addedNodes) {{
                if (added.nodeType !== Node.ELEMENT_NODE) {{ continue; }}
                const el = added.matches({post}) ? added : added.querySelector({post});
                if (el) {{ mark(el); }}
            }}
        }}
    }});
    observer.observe(container, {{ childList: true }});
    return true;
}})()"#
    )
}

/// Read the text content of the element with the given DOM id.
pub fn text_by_id(dom_id: &str) -> String {
    let id = js_string(dom_id);
    format!(
        r#"(() => {{
    const el = document.getElementById({id});
    return el ? el.innerText : null;
}})()"#
    )
}

/// Function body for reading an attribute off a node's parent element,
/// evaluated with `this` bound to the node.
pub fn parent_attribute_fn(name: &str) -> String {
    let name = js_string(name);
    format!(
        r#"function() {{
    const parent = this.parentElement;
    return parent ? parent.getAttribute({name}) : null;
}}"#
    )
}

/// Function body collecting an attribute across all descendants matching a
/// selector, in document order, evaluated with `this` bound to the node.
pub fn collect_attributes_fn(selector: &str, name: &str) -> String {
    let selector = js_string(selector);
    let name = js_string(name);
    format!(
        r#"function() {{
    return Array.from(this.querySelectorAll({selector}))
        .map((el) => el.getAttribute({name}))
        .filter((value) => value !== null);
}}"#
    )
}
