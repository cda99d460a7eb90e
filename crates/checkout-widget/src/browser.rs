//! Browser binding
//!
//! `BrowserDocument` mounts the surface as an iframe over a dimmed
//! overlay and listens on `window` for `message` events. `BrowserParent`
//! is the embedded side, posting to `window.parent`.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;
use url::Url;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::js_sys::JSON;
use web_sys::{Document, Event, HtmlElement, MessageEvent, Window};

use checkout_core::{
    CheckoutError, CrossContextMessage, InboundMessage, ParentChannel, Result, TargetOrigin,
};

use crate::controller::Widget;
use crate::host::{DismissTarget, EventSink, HostDocument, HostEvent, ListenerId, SurfaceId};
use crate::options::WidgetOptions;

const OVERLAY_STYLE: &str = "position:fixed;inset:0;z-index:2147483647;\
    background:rgba(0,0,0,0.5);display:flex;align-items:center;justify-content:center";
const FRAME_STYLE: &str = "width:420px;max-width:100%;height:640px;max-height:100%;\
    border:0;border-radius:16px;background:transparent";
const CLOSE_STYLE: &str = "position:absolute;top:16px;right:16px;font-size:24px;\
    background:none;border:0;color:#fff;cursor:pointer";

fn dom_error(context: &str, err: &JsValue) -> CheckoutError {
    CheckoutError::InvalidState(format!("{context}: {err:?}"))
}

struct Mounted {
    overlay: HtmlElement,
    _on_overlay: Closure<dyn FnMut(Event)>,
    _on_close: Closure<dyn FnMut(Event)>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    surfaces: HashMap<SurfaceId, Mounted>,
    listeners: HashMap<ListenerId, Closure<dyn FnMut(MessageEvent)>>,
}

/// The hosting page's DOM
pub struct BrowserDocument {
    window: Window,
    document: Document,
    registry: RefCell<Registry>,
}

impl BrowserDocument {
    pub fn current() -> Result<Self> {
        let window = web_sys::window()
            .ok_or_else(|| CheckoutError::InvalidState("no window".into()))?;
        let document = window
            .document()
            .ok_or_else(|| CheckoutError::InvalidState("no document".into()))?;
        Ok(Self {
            window,
            document,
            registry: RefCell::default(),
        })
    }

    fn element(&self, tag: &str, style: &str) -> Result<HtmlElement> {
        let element = self
            .document
            .create_element(tag)
            .map_err(|e| dom_error("create element", &e))?
            .dyn_into::<HtmlElement>()
            .map_err(|e| dom_error("not an HtmlElement", &e))?;
        element
            .set_attribute("style", style)
            .map_err(|e| dom_error("set style", &e))?;
        Ok(element)
    }

    fn next_id(&self) -> u64 {
        let mut registry = self.registry.borrow_mut();
        registry.next_id += 1;
        registry.next_id
    }
}

impl HostDocument for BrowserDocument {
    fn attach(&self, src: &Url, events: EventSink) -> Result<SurfaceId> {
        let body = self
            .document
            .body()
            .ok_or_else(|| CheckoutError::InvalidState("document has no body".into()))?;

        let overlay = self.element("div", OVERLAY_STYLE)?;
        let frame = self.element("iframe", FRAME_STYLE)?;
        frame
            .set_attribute("src", src.as_str())
            .map_err(|e| dom_error("set src", &e))?;
        frame
            .set_attribute("allow", "payment")
            .map_err(|e| dom_error("set allow", &e))?;
        let close = self.element("button", CLOSE_STYLE)?;
        close.set_inner_text("\u{00d7}");
        close
            .set_attribute("aria-label", "Close checkout")
            .map_err(|e| dom_error("set aria-label", &e))?;

        // Only a click on the backdrop itself counts as a dismissal.
        let overlay_value: JsValue = overlay.clone().into();
        let sink = events.clone();
        let on_overlay = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let target = if event.target().map(JsValue::from) == Some(overlay_value.clone()) {
                DismissTarget::Overlay
            } else {
                DismissTarget::Content
            };
            let _ = sink.send(HostEvent::Dismiss(target));
        });
        let on_close = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            event.stop_propagation();
            let _ = events.send(HostEvent::Dismiss(DismissTarget::CloseButton));
        });

        overlay
            .add_event_listener_with_callback("click", on_overlay.as_ref().unchecked_ref())
            .map_err(|e| dom_error("overlay listener", &e))?;
        close
            .add_event_listener_with_callback("click", on_close.as_ref().unchecked_ref())
            .map_err(|e| dom_error("close listener", &e))?;

        overlay
            .append_child(&frame)
            .and_then(|_| overlay.append_child(&close))
            .and_then(|_| body.append_child(&overlay))
            .map_err(|e| dom_error("mount surface", &e))?;

        let id = SurfaceId(self.next_id());
        self.registry.borrow_mut().surfaces.insert(
            id,
            Mounted {
                overlay,
                _on_overlay: on_overlay,
                _on_close: on_close,
            },
        );
        Ok(id)
    }

    fn detach(&self, surface: SurfaceId) -> Result<()> {
        if let Some(mounted) = self.registry.borrow_mut().surfaces.remove(&surface) {
            mounted.overlay.remove();
        }
        Ok(())
    }

    fn add_message_listener(&self, events: EventSink) -> Result<ListenerId> {
        let listener = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            let data = js_to_json(&event.data());
            let _ = events.send(HostEvent::Message(InboundMessage::new(event.origin(), data)));
        });
        self.window
            .add_event_listener_with_callback("message", listener.as_ref().unchecked_ref())
            .map_err(|e| dom_error("message listener", &e))?;

        let id = ListenerId(self.next_id());
        self.registry.borrow_mut().listeners.insert(id, listener);
        Ok(id)
    }

    fn remove_message_listener(&self, listener: ListenerId) -> Result<()> {
        let Some(closure) = self.registry.borrow_mut().listeners.remove(&listener) else {
            return Ok(());
        };
        self.window
            .remove_event_listener_with_callback("message", closure.as_ref().unchecked_ref())
            .map_err(|e| dom_error("remove message listener", &e))
    }
}

fn js_to_json(value: &JsValue) -> Value {
    if let Some(text) = value.as_string() {
        return Value::String(text);
    }
    JSON::stringify(value)
        .ok()
        .and_then(|s| s.as_string())
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or(Value::Null)
}

/// `window.parent`, seen from inside the embedded surface
#[derive(Clone, Copy, Debug, Default)]
pub struct BrowserParent;

impl ParentChannel for BrowserParent {
    fn post(&self, message: &CrossContextMessage, target: &TargetOrigin) -> Result<()> {
        let window = web_sys::window()
            .ok_or_else(|| CheckoutError::InvalidState("no window".into()))?;
        let parent = window
            .parent()
            .map_err(|e| dom_error("window.parent", &e))?
            .ok_or_else(|| CheckoutError::InvalidState("surface is not embedded".into()))?;

        let payload = JSON::parse(&serde_json::to_string(message)?)
            .map_err(|e| dom_error("encode message", &e))?;
        parent
            .post_message(&payload, &target.to_string())
            .map_err(|e| dom_error("postMessage", &e))
    }
}

/// Open a widget on the current page and route its messages until it
/// closes
pub fn open_in_browser(options: WidgetOptions) -> Result<()> {
    let mut widget = Widget::new(options, BrowserDocument::current()?);
    widget.open()?;
    wasm_bindgen_futures::spawn_local(async move {
        widget.run_until_closed().await;
    });
    Ok(())
}
