//! A stateful fake Storybook serving `example-button--primary`.
//!
//! Args live in a story store that every navigation resets to the defaults.
//! The rendered button, its computed styles, the structural capture and the
//! screenshot are all derived from the current args.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::sync::{Arc, Mutex};

use image::RgbaImage;
use serde_json::{json, Map, Value};
use storyprobe::prelude::*;
use storyprobe::script::ScriptKind;
use storyprobe::visual::encode_png;

pub const STORY: &str = "example-button--primary";

pub const SCREENSHOT_WIDTH: u32 = 40;
pub const SCREENSHOT_HEIGHT: u32 = 20;

pub fn story() -> StoryId {
    StoryId::new(STORY).unwrap()
}

pub fn default_args() -> Map<String, Value> {
    json!({"label": "Button", "primary": true, "size": "medium", "backgroundColor": null})
        .as_object()
        .cloned()
        .unwrap()
}

#[derive(Debug)]
struct State {
    args: Map<String, Value>,
    story_store: bool,
}

#[derive(Debug, Clone)]
pub struct FakeStorybook {
    state: Arc<Mutex<State>>,
}

impl FakeStorybook {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                args: default_args(),
                story_store: true,
            })),
        }
    }

    /// Hide the story-store globals so only the controls panel works
    pub fn without_story_store(self) -> Self {
        self.state.lock().unwrap().story_store = false;
        self
    }

    pub fn args(&self) -> Map<String, Value> {
        self.state.lock().unwrap().args.clone()
    }

    fn label(&self) -> String {
        self.state.lock().unwrap().args["label"]
            .as_str()
            .unwrap_or_default()
            .to_string()
    }

    fn primary(&self) -> bool {
        self.state.lock().unwrap().args["primary"] == true
    }

    /// Blue background; the first `2 * label.len()` columns are red
    pub fn screenshot(&self) -> Vec<u8> {
        let red_columns = u32::try_from(self.label().len() * 2).unwrap_or(u32::MAX);
        let img = RgbaImage::from_fn(SCREENSHOT_WIDTH, SCREENSHOT_HEIGHT, |x, _| {
            if x < red_columns {
                image::Rgba([255, 0, 0, 255])
            } else {
                image::Rgba([0, 123, 255, 255])
            }
        });
        encode_png(&img).unwrap()
    }

    fn style(&self, property: &str) -> Option<&'static str> {
        match property {
            "width" => Some("120px"),
            "height" => Some("40px"),
            "display" => Some("inline-block"),
            "color" => Some(if self.primary() { "rgb(255, 255, 255)" } else { "rgb(51, 51, 51)" }),
            "background-color" => Some(if self.primary() {
                "rgb(0, 123, 255)"
            } else {
                "rgba(0, 0, 0, 0)"
            }),
            _ => None,
        }
    }

    fn button_node(&self) -> Value {
        let args = self.args();
        let mode = if self.primary() { "primary" } else { "secondary" };
        json!({
            "tag": "BUTTON",
            "attributes": {
                "type": "button",
                "class": format!("storybook-button storybook-button--{} storybook-button--{mode}",
                                 args["size"].as_str().unwrap_or("medium")),
                "id": ":r0:",
            },
            "text": format!("\n    {}\n  ", self.label()),
            "children": [],
        })
    }

    fn panel_reading(&self, name: &str) -> Option<Value> {
        let value = self.state.lock().unwrap().args.get(name).cloned()?;
        let (kind, raw) = match value {
            Value::Bool(b) => ("checkbox", Value::Bool(b)),
            Value::Null => ("text", Value::String(String::new())),
            Value::String(s) => ("text", Value::String(s)),
            Value::Number(n) => ("number", Value::String(n.to_string())),
            other => ("json", Value::String(other.to_string())),
        };
        Some(json!({"kind": kind, "value": raw}))
    }

    fn store_available(&self) -> bool {
        self.state.lock().unwrap().story_store
    }

    pub fn driver(&self) -> MockDriver {
        let on_nav = self.clone();
        let read = self.clone();
        let write = self.clone();
        let css = self.clone();
        let text = self.clone();
        let inner = self.clone();
        let structure = self.clone();
        let panel_read = self.clone();
        let panel_write = self.clone();
        let panel_list = self.clone();
        let shot = self.clone();

        MockDriver::new()
            .on_navigate(move |_| {
                on_nav.state.lock().unwrap().args = default_args();
                Ok(())
            })
            .on_script(ScriptKind::StoryArgsRead, move |_| {
                if !read.store_available() {
                    return Ok(json!({"found": false}));
                }
                Ok(json!({"found": true, "args": read.args()}))
            })
            .on_script(ScriptKind::StoryArgsWrite, move |req| {
                if !write.store_available() {
                    return Ok(json!({"found": false}));
                }
                let updates = req["args"].as_object().cloned().unwrap_or_default();
                let mut state = write.state.lock().unwrap();
                let missing: Vec<_> = updates
                    .keys()
                    .filter(|k| !state.args.contains_key(*k))
                    .cloned()
                    .collect();
                if !missing.is_empty() {
                    return Ok(json!({"found": false, "missing": missing}));
                }
                state.args.extend(updates);
                Ok(json!({"found": true, "args": state.args.clone()}))
            })
            .on_script(ScriptKind::ComputedStyle, move |req| {
                if req["selector"] != "button" {
                    return Ok(json!({"found": false}));
                }
                let value = css.style(req["property"].as_str().unwrap_or_default());
                Ok(json!({"found": true, "value": value.unwrap_or("")}))
            })
            .on_script(ScriptKind::ElementMetrics, |req| {
                if req["selector"] != "button" {
                    return Ok(json!({"found": false}));
                }
                Ok(json!({"found": true, "width": 120.0, "height": 40.0, "top": 0.0, "left": 0.0,
                          "right": 120.0, "bottom": 40.0}))
            })
            .on_script(ScriptKind::TextContent, move |req| {
                if req["selector"] != "button" {
                    return Ok(json!({"found": false}));
                }
                Ok(json!({"found": true, "value": format!("\n    {}\n  ", text.label())}))
            })
            .on_script(ScriptKind::InnerText, move |req| {
                if req["selector"] != "button" {
                    return Ok(json!({"found": false}));
                }
                Ok(json!({"found": true, "value": inner.label()}))
            })
            .on_script(ScriptKind::CaptureStructure, move |req| {
                let root = if req["deep"] == true {
                    json!({"tag": "DIV", "attributes": {"id": "storybook-root"}, "text": "",
                           "children": [structure.button_node()]})
                } else {
                    json!({"tag": "DIV", "attributes": {}, "text": structure.label(), "children": []})
                };
                Ok(json!({"found": true, "root": root}))
            })
            .on_script(ScriptKind::ControlRead, move |req| {
                let name = req["name"].as_str().unwrap_or_default();
                Ok(match panel_read.panel_reading(name) {
                    Some(mut reading) => {
                        reading["found"] = json!(true);
                        reading
                    }
                    None => json!({"found": false}),
                })
            })
            .on_script(ScriptKind::ControlWrite, move |req| {
                let name = req["name"].as_str().unwrap_or_default().to_string();
                let mut state = panel_write.state.lock().unwrap();
                if !state.args.contains_key(&name) {
                    return Ok(json!({"found": false}));
                }
                let input = &req["input"];
                let value = match input["mode"].as_str() {
                    Some("toggle") => input["value"].clone(),
                    Some("json") => serde_json::from_str(input["value"].as_str().unwrap_or("null"))
                        .unwrap_or(Value::Null),
                    _ => input["value"].clone(),
                };
                state.args.insert(name, value);
                Ok(json!({"found": true, "kind": "text"}))
            })
            .on_script(ScriptKind::ControlList, move |_| {
                let names: Vec<String> = panel_list.args().keys().cloned().collect();
                let controls: Map<String, Value> = names
                    .into_iter()
                    .filter_map(|n| panel_list.panel_reading(&n).map(|r| (n, r)))
                    .collect();
                Ok(json!({"found": true, "controls": controls}))
            })
            .on_screenshot(move |_| Ok(shot.screenshot()))
    }

    pub fn client(&self, baseline_root: &std::path::Path) -> RenderTargetClient {
        let config = ProbeConfig::default()
            .with_timeout_ms(500)
            .with_baseline_root(baseline_root);
        RenderTargetClient::new(self.driver(), config)
    }
}
