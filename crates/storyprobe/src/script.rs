//! In-page scripts.
//!
//! Every interaction with the rendered story goes through one of a closed set
//! of script templates. A [`Script`] pairs a template ([`ScriptKind`]) with a
//! JSON request; [`Script::render`] produces a self-contained expression:
//!
//! ```text
//! (() => {
//! /* storyprobe:<kind> v<SCRIPT_VERSION> */
//! const request = <json>;
//! <shared helpers>
//! <template body>
//! })()
//! ```
//!
//! Element scripts answer `{found: false}` when the selector matches nothing,
//! otherwise `{found: true, ...}`. Selectors resolve against the story
//! document, which is the preview iframe's document when the manager UI is
//! loaded and the top document otherwise. Controls-panel scripts query the
//! top document.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::controls::UiInput;

/// Bumped whenever a template changes shape
pub const SCRIPT_VERSION: u32 = 3;

/// Template identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScriptKind {
    /// Read all args of a story from the story store
    StoryArgsRead,
    /// Update args of a story through the story store
    StoryArgsWrite,
    /// Read one input from the controls panel
    ControlRead,
    /// Read every input in the controls panel
    ControlList,
    /// Change one input in the controls panel
    ControlWrite,
    /// Has the story finished rendering
    StoryReady,
    /// Does a selector match
    ElementExists,
    /// One computed style property
    ComputedStyle,
    /// Every computed style property
    AllComputedStyles,
    /// Bounding box plus client/offset/scroll sizes
    ElementMetrics,
    /// Element rect in top-level page coordinates
    ElementClip,
    /// `textContent`
    TextContent,
    /// `innerText`
    InnerText,
    /// Replace `textContent`
    SetText,
    /// Replace `innerHTML`
    SetHtml,
    /// Set an input's value and fire input/change
    SetInputValue,
    /// Walk the story subtree
    CaptureStructure,
    /// Custom properties on `:root`
    RootCssVariables,
}

impl ScriptKind {
    /// Stable name used in logs and the version marker
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::StoryArgsRead => "story-args-read",
            Self::StoryArgsWrite => "story-args-write",
            Self::ControlRead => "control-read",
            Self::ControlList => "control-list",
            Self::ControlWrite => "control-write",
            Self::StoryReady => "story-ready",
            Self::ElementExists => "element-exists",
            Self::ComputedStyle => "computed-style",
            Self::AllComputedStyles => "all-computed-styles",
            Self::ElementMetrics => "element-metrics",
            Self::ElementClip => "element-clip",
            Self::TextContent => "text-content",
            Self::InnerText => "inner-text",
            Self::SetText => "set-text",
            Self::SetHtml => "set-html",
            Self::SetInputValue => "set-input-value",
            Self::CaptureStructure => "capture-structure",
            Self::RootCssVariables => "root-css-variables",
        }
    }

    /// Scripts that change the page
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::StoryArgsWrite
                | Self::ControlWrite
                | Self::SetText
                | Self::SetHtml
                | Self::SetInputValue
        )
    }

    const fn body(self) -> &'static str {
        match self {
            Self::StoryArgsRead => STORY_ARGS_READ,
            Self::StoryArgsWrite => STORY_ARGS_WRITE,
            Self::ControlRead => CONTROL_READ,
            Self::ControlList => CONTROL_LIST,
            Self::ControlWrite => CONTROL_WRITE,
            Self::StoryReady => STORY_READY,
            Self::ElementExists => ELEMENT_EXISTS,
            Self::ComputedStyle => COMPUTED_STYLE,
            Self::AllComputedStyles => ALL_COMPUTED_STYLES,
            Self::ElementMetrics => ELEMENT_METRICS,
            Self::ElementClip => ELEMENT_CLIP,
            Self::TextContent => TEXT_CONTENT,
            Self::InnerText => INNER_TEXT,
            Self::SetText => SET_TEXT,
            Self::SetHtml => SET_HTML,
            Self::SetInputValue => SET_INPUT_VALUE,
            Self::CaptureStructure => CAPTURE_STRUCTURE,
            Self::RootCssVariables => ROOT_CSS_VARIABLES,
        }
    }
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A template plus its request payload
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    /// Template
    pub kind: ScriptKind,
    /// Request object exposed to the template as `request`
    pub payload: Value,
}

impl Script {
    /// Create a script from raw parts
    #[must_use]
    pub const fn new(kind: ScriptKind, payload: Value) -> Self {
        Self { kind, payload }
    }

    /// Read a story's args
    #[must_use]
    pub fn story_args_read(story_id: &str) -> Self {
        Self::new(ScriptKind::StoryArgsRead, json!({ "storyId": story_id }))
    }

    /// Update a story's args; unknown keys make the script answer `found: false`
    #[must_use]
    pub fn story_args_write(story_id: &str, args: Map<String, Value>) -> Self {
        Self::new(
            ScriptKind::StoryArgsWrite,
            json!({ "storyId": story_id, "args": args }),
        )
    }

    /// Read one controls-panel input
    #[must_use]
    pub fn control_read(name: &str) -> Self {
        Self::new(ScriptKind::ControlRead, json!({ "name": name }))
    }

    /// Read all controls-panel inputs
    #[must_use]
    pub fn control_list() -> Self {
        Self::new(ScriptKind::ControlList, json!({}))
    }

    /// Change a controls-panel input
    #[must_use]
    pub fn control_write(name: &str, input: &UiInput) -> Self {
        Self::new(
            ScriptKind::ControlWrite,
            json!({ "name": name, "input": input }),
        )
    }

    /// Readiness probe
    #[must_use]
    pub fn story_ready() -> Self {
        Self::new(ScriptKind::StoryReady, json!({}))
    }

    /// Selector probe
    #[must_use]
    pub fn element_exists(selector: &str) -> Self {
        Self::new(ScriptKind::ElementExists, json!({ "selector": selector }))
    }

    /// One computed style property (CSS name or camelCase)
    #[must_use]
    pub fn computed_style(selector: &str, property: &str) -> Self {
        Self::new(
            ScriptKind::ComputedStyle,
            json!({ "selector": selector, "property": property }),
        )
    }

    /// Every computed style property
    #[must_use]
    pub fn all_computed_styles(selector: &str) -> Self {
        Self::new(ScriptKind::AllComputedStyles, json!({ "selector": selector }))
    }

    /// Element box metrics
    #[must_use]
    pub fn element_metrics(selector: &str) -> Self {
        Self::new(ScriptKind::ElementMetrics, json!({ "selector": selector }))
    }

    /// Element rect for clipping a screenshot
    #[must_use]
    pub fn element_clip(selector: &str) -> Self {
        Self::new(ScriptKind::ElementClip, json!({ "selector": selector }))
    }

    /// `textContent`
    #[must_use]
    pub fn text_content(selector: &str) -> Self {
        Self::new(ScriptKind::TextContent, json!({ "selector": selector }))
    }

    /// `innerText`
    #[must_use]
    pub fn inner_text(selector: &str) -> Self {
        Self::new(ScriptKind::InnerText, json!({ "selector": selector }))
    }

    /// Replace `textContent`
    #[must_use]
    pub fn set_text(selector: &str, text: &str) -> Self {
        Self::new(
            ScriptKind::SetText,
            json!({ "selector": selector, "text": text }),
        )
    }

    /// Replace `innerHTML`
    #[must_use]
    pub fn set_html(selector: &str, html: &str) -> Self {
        Self::new(
            ScriptKind::SetHtml,
            json!({ "selector": selector, "html": html }),
        )
    }

    /// Set an input value
    #[must_use]
    pub fn set_input_value(selector: &str, value: &str) -> Self {
        Self::new(
            ScriptKind::SetInputValue,
            json!({ "selector": selector, "value": value }),
        )
    }

    /// Walk the story subtree from the first matching root selector
    #[must_use]
    pub fn capture_structure(roots: &[String], deep: bool, styles: &[&str]) -> Self {
        Self::new(
            ScriptKind::CaptureStructure,
            json!({ "roots": roots, "deep": deep, "styles": styles }),
        )
    }

    /// Read custom properties from `:root`
    #[must_use]
    pub fn root_css_variables(names: &[String]) -> Self {
        Self::new(ScriptKind::RootCssVariables, json!({ "names": names }))
    }

    /// String field of the payload
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// Self-contained JavaScript expression
    #[must_use]
    pub fn render(&self) -> String {
        format!(
            "(() => {{\n/* storyprobe:{} v{} */\nconst request = {};\n{}\n{}\n}})()",
            self.kind.name(),
            SCRIPT_VERSION,
            self.payload,
            PRELUDE,
            self.kind.body()
        )
    }
}

/// Interpret a `{found, ...}` answer; `None` when not found
#[must_use]
pub fn found(answer: Value) -> Option<Map<String, Value>> {
    match answer {
        Value::Object(map) if map.get("found").and_then(Value::as_bool) == Some(true) => Some(map),
        _ => None,
    }
}

const PRELUDE: &str = r#"const previewFrame = () => document.querySelector('#storybook-preview-iframe');
const storyDocument = () => {
  const frame = previewFrame();
  if (frame) {
    try {
      if (frame.contentDocument) return frame.contentDocument;
    } catch (e) {}
  }
  return document;
};
const storyView = () => storyDocument().defaultView || window;
const query = (sel) => {
  try {
    return storyDocument().querySelector(sel);
  } catch (e) {
    return null;
  }
};
const setNativeValue = (el, value) => {
  const proto = Object.getPrototypeOf(el);
  const desc = proto ? Object.getOwnPropertyDescriptor(proto, 'value') : null;
  if (desc && desc.set) desc.set.call(el, value); else el.value = value;
};
const fire = (el, names) => {
  for (const name of names) el.dispatchEvent(new Event(name, { bubbles: true }));
};
const storyStore = (storyId) => {
  const scopes = [window];
  try {
    if (window.parent && window.parent !== window) scopes.push(window.parent);
  } catch (e) {}
  const frame = previewFrame();
  if (frame && frame.contentWindow) scopes.push(frame.contentWindow);
  for (const scope of scopes) {
    let legacy, preview, channel;
    try {
      legacy = scope.__STORYBOOK_STORY_STORE__;
      preview = scope.__STORYBOOK_PREVIEW__;
      channel = scope.__STORYBOOK_ADDONS_CHANNEL__;
    } catch (e) {
      continue;
    }
    if (legacy && typeof legacy.getState === 'function') {
      const state = legacy.getState();
      const entry = state && state.storiesHash && state.storiesHash[storyId];
      if (entry) {
        return {
          args: () => (legacy.getState().storiesHash[storyId] || {}).args || {},
          update: (args) => legacy.updateStoryArgs(storyId, args),
        };
      }
    }
    const store = (preview && preview.storyStore) || legacy;
    if (store && store.args && typeof store.args.get === 'function') {
      const current = store.args.get(storyId);
      if (current) {
        return {
          args: () => store.args.get(storyId) || {},
          update: (args) => {
            if (channel && typeof channel.emit === 'function') {
              channel.emit('updateStoryArgs', { storyId, updatedArgs: args });
            } else {
              store.args.update(storyId, args);
            }
          },
        };
      }
    }
  }
  return null;
};
const findControl = (name) => {
  const selectors = [
    `[data-testid='control-${name}']`,
    `#control-${name}`,
    `[name='${name}']`,
    `input[name*='${name}']`,
  ];
  for (const sel of selectors) {
    let el = null;
    try {
      el = document.querySelector(sel);
    } catch (e) {}
    if (!el) continue;
    return el.matches('input, select, textarea') ? el : el.querySelector('input, select, textarea');
  }
  return null;
};
const controlKind = (el) => {
  const tag = el.tagName.toLowerCase();
  if (tag === 'select') return 'select';
  if (tag === 'textarea') return el.closest('[data-testid*="json"]') ? 'json' : 'textarea';
  const type = (el.getAttribute('type') || 'text').toLowerCase();
  if (type === 'checkbox' || type === 'number' || type === 'range') return type;
  return 'text';
};
const controlValue = (el) => (controlKind(el) === 'checkbox' ? el.checked : el.value);"#;

const STORY_ARGS_READ: &str = r#"const store = storyStore(request.storyId);
if (!store) return { found: false };
return { found: true, args: store.args() };"#;

const STORY_ARGS_WRITE: &str = r#"const store = storyStore(request.storyId);
if (!store) return { found: false };
const current = store.args();
const missing = Object.keys(request.args).filter((k) => !(k in current));
if (missing.length > 0) return { found: false, missing };
store.update(request.args);
return { found: true, args: store.args() };"#;

const CONTROL_READ: &str = r#"const el = findControl(request.name);
if (!el) return { found: false };
return { found: true, kind: controlKind(el), value: controlValue(el) };"#;

const CONTROL_LIST: &str = r#"const controls = {};
for (const el of document.querySelectorAll("[id^='control-'], [data-testid^='control-']")) {
  const raw = el.getAttribute('data-testid') || el.id;
  const name = raw.replace(/^control-/, '');
  const field = el.matches('input, select, textarea') ? el : el.querySelector('input, select, textarea');
  if (!name || !field || name in controls) continue;
  controls[name] = { kind: controlKind(field), value: controlValue(field) };
}
return { found: Object.keys(controls).length > 0, controls };"#;

const CONTROL_WRITE: &str = r#"const el = findControl(request.name);
if (!el) return { found: false };
const input = request.input;
const kind = controlKind(el);
if (input.mode === 'toggle') {
  if (kind === 'checkbox') {
    if (el.checked !== input.value) el.click();
  } else {
    setNativeValue(el, String(input.value));
    fire(el, ['input', 'change']);
  }
} else if (kind === 'select') {
  el.value = input.value;
  fire(el, ['change']);
} else {
  el.focus();
  setNativeValue(el, input.value);
  fire(el, ['input', 'change', 'blur']);
}
return { found: true, kind };"#;

const STORY_READY: &str = r#"const doc = storyDocument();
const root = doc.querySelector('#storybook-root, #root');
const preparing = doc.body && doc.body.classList.contains('sb-show-preparing-story');
return { ready: doc.readyState === 'complete' && !!root && !preparing };"#;

const ELEMENT_EXISTS: &str = r#"return { found: !!query(request.selector) };"#;

const COMPUTED_STYLE: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
const style = storyView().getComputedStyle(el);
const value = style.getPropertyValue(request.property) || style[request.property] || '';
return { found: true, value: String(value) };"#;

const ALL_COMPUTED_STYLES: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
const style = storyView().getComputedStyle(el);
const styles = {};
for (let i = 0; i < style.length; i++) {
  const name = style[i];
  styles[name] = style.getPropertyValue(name);
}
return { found: true, styles };"#;

const ELEMENT_METRICS: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
const r = el.getBoundingClientRect();
return {
  found: true,
  width: r.width, height: r.height,
  top: r.top, left: r.left, right: r.right, bottom: r.bottom,
  clientWidth: el.clientWidth, clientHeight: el.clientHeight,
  offsetWidth: el.offsetWidth || 0, offsetHeight: el.offsetHeight || 0,
  scrollWidth: el.scrollWidth, scrollHeight: el.scrollHeight,
};"#;

const ELEMENT_CLIP: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
const r = el.getBoundingClientRect();
let x = r.left + window.scrollX;
let y = r.top + window.scrollY;
const frame = previewFrame();
if (frame && storyDocument() !== document) {
  const f = frame.getBoundingClientRect();
  x += f.left;
  y += f.top;
}
return { found: true, x, y, width: r.width, height: r.height };"#;

const TEXT_CONTENT: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
return { found: true, value: el.textContent || '' };"#;

const INNER_TEXT: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
return { found: true, value: el.innerText || '' };"#;

const SET_TEXT: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
el.textContent = request.text;
return { found: true };"#;

const SET_HTML: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
el.innerHTML = request.html;
return { found: true };"#;

const SET_INPUT_VALUE: &str = r#"const el = query(request.selector);
if (!el) return { found: false };
setNativeValue(el, request.value);
fire(el, ['input', 'change']);
return { found: true, value: el.value };"#;

const CAPTURE_STRUCTURE: &str = r#"const doc = storyDocument();
let root = null;
for (const sel of request.roots) {
  try {
    root = doc.querySelector(sel);
  } catch (e) {
    root = null;
  }
  if (root) break;
}
if (!root) return { found: false };
const view = storyView();
const skipped = new Set(['script', 'style', 'noscript']);
const walk = (el, deep) => {
  const node = { tag: el.tagName.toLowerCase(), attributes: {}, text: '', children: [] };
  if (deep) {
    for (const attr of el.attributes) node.attributes[attr.name] = attr.value;
    node.text = Array.from(el.childNodes)
      .filter((n) => n.nodeType === Node.TEXT_NODE)
      .map((n) => n.textContent)
      .join(' ');
    for (const child of el.children) {
      if (!skipped.has(child.tagName.toLowerCase())) node.children.push(walk(child, true));
    }
  } else {
    node.text = el.textContent || '';
  }
  if (request.styles.length > 0) {
    const style = view.getComputedStyle(el);
    node.styles = {};
    for (const name of request.styles) node.styles[name] = style.getPropertyValue(name);
  }
  return node;
};
return { found: true, root: walk(root, request.deep) };"#;

const ROOT_CSS_VARIABLES: &str = r#"const doc = storyDocument();
const style = storyView().getComputedStyle(doc.documentElement);
const values = {};
for (const name of request.names) {
  const value = style.getPropertyValue(name);
  if (value) values[name] = value.trim();
}
return { found: true, values };"#;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    const ALL_KINDS: [ScriptKind; 18] = [
        ScriptKind::StoryArgsRead,
        ScriptKind::StoryArgsWrite,
        ScriptKind::ControlRead,
        ScriptKind::ControlList,
        ScriptKind::ControlWrite,
        ScriptKind::StoryReady,
        ScriptKind::ElementExists,
        ScriptKind::ComputedStyle,
        ScriptKind::AllComputedStyles,
        ScriptKind::ElementMetrics,
        ScriptKind::ElementClip,
        ScriptKind::TextContent,
        ScriptKind::InnerText,
        ScriptKind::SetText,
        ScriptKind::SetHtml,
        ScriptKind::SetInputValue,
        ScriptKind::CaptureStructure,
        ScriptKind::RootCssVariables,
    ];

    fn balanced(src: &str, open: char, close: char) -> bool {
        let mut depth = 0i32;
        for c in src.chars() {
            if c == open {
                depth += 1;
            } else if c == close {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
        }
        depth == 0
    }

    mod render_tests {
        use super::*;

        #[test]
        fn test_render_shape() {
            let src = Script::story_args_read("example-button--primary").render();
            assert!(src.starts_with("(() => {\n/* storyprobe:story-args-read v3 */"));
            assert!(src.contains(r#"const request = {"storyId":"example-button--primary"};"#));
            assert!(src.ends_with("})()"));
        }

        #[test]
        fn test_every_template_is_balanced_and_returns() {
            for kind in ALL_KINDS {
                let src = Script::new(kind, json!({})).render();
                assert!(balanced(&src, '{', '}'), "{kind} braces");
                assert!(balanced(&src, '(', ')'), "{kind} parens");
                assert!(balanced(&src, '[', ']'), "{kind} brackets");
                assert!(kind.body().contains("return {"), "{kind} must return an object");
            }
        }

        #[test]
        fn test_names_are_unique() {
            let mut names: Vec<_> = ALL_KINDS.iter().map(|k| k.name()).collect();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), ALL_KINDS.len());
        }

        #[test]
        fn test_payload_is_escaped_json() {
            let src = Script::set_text("button", "say \"hi\"\n</script>").render();
            assert!(src.contains(r#""text":"say \"hi\"\n</script>""#));
        }
    }

    mod story_store_tests {
        use super::*;

        #[test]
        fn test_store_lookup_covers_both_registries() {
            assert!(PRELUDE.contains("__STORYBOOK_STORY_STORE__"));
            assert!(PRELUDE.contains("__STORYBOOK_PREVIEW__"));
            assert!(PRELUDE.contains("storiesHash[storyId]"));
            assert!(PRELUDE.contains("updateStoryArgs"));
            assert!(PRELUDE.contains("window.parent"));
        }

        #[test]
        fn test_write_rejects_unknown_args() {
            assert!(STORY_ARGS_WRITE.contains("missing.length > 0"));
            let script = Script::story_args_write(
                "a--b",
                json!({"label": "x"}).as_object().cloned().unwrap(),
            );
            assert_eq!(script.payload["args"]["label"], "x");
            assert!(script.kind.is_mutation());
        }

        #[test]
        fn test_control_lookup_order() {
            let testid = PRELUDE.find("data-testid='control-").unwrap();
            let by_id = PRELUDE.find("#control-").unwrap();
            let by_name = PRELUDE.find("[name='").unwrap();
            let partial = PRELUDE.find("input[name*='").unwrap();
            assert!(testid < by_id && by_id < by_name && by_name < partial);
        }
    }

    mod found_tests {
        use super::*;

        #[test]
        fn test_found() {
            assert!(found(json!({"found": true, "value": "1px"})).is_some());
            assert!(found(json!({"found": false})).is_none());
            assert!(found(json!(null)).is_none());
            assert!(found(json!({"value": 1})).is_none());
        }

        #[test]
        fn test_param() {
            let script = Script::computed_style("button", "width");
            assert_eq!(script.param("selector"), Some("button"));
            assert_eq!(script.param("missing"), None);
        }
    }
}
