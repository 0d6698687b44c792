//! Relay WebSocket client

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use web_sys::{Event, MessageEvent, WebSocket};

use crate::relay::{ClientMessage, ServerMessage};

/// Frames sent before the socket opens are queued and flushed on open
pub struct RelaySocket {
    ws: WebSocket,
    pending: Rc<RefCell<Vec<String>>>,
    _on_open: Closure<dyn FnMut(Event)>,
    _on_message: Closure<dyn FnMut(MessageEvent)>,
    _on_close: Closure<dyn FnMut(Event)>,
}

impl RelaySocket {
    pub fn connect(
        url: &str,
        mut on_message: impl FnMut(ServerMessage) + 'static,
    ) -> Result<Self, JsValue> {
        let ws = WebSocket::new(url)?;
        let pending: Rc<RefCell<Vec<String>>> = Rc::default();

        let on_open = {
            let ws = ws.clone();
            let pending = pending.clone();
            Closure::<dyn FnMut(_)>::new(move |_event: Event| {
                log::info!("Relay connected");
                for frame in pending.borrow_mut().drain(..) {
                    if let Err(e) = ws.send_with_str(&frame) {
                        log::warn!("Relay send failed: {:?}", e);
                    }
                }
            })
        };
        ws.set_onopen(Some(on_open.as_ref().unchecked_ref()));

        let on_message = Closure::<dyn FnMut(_)>::new(move |event: MessageEvent| {
            let Some(text) = event.data().as_string() else {
                log::warn!("Ignoring non-text relay frame");
                return;
            };
            match ServerMessage::from_frame(&text) {
                Ok(message) => on_message(message),
                Err(e) => log::warn!("Bad relay frame: {}", e),
            }
        });
        ws.set_onmessage(Some(on_message.as_ref().unchecked_ref()));

        let on_close = Closure::<dyn FnMut(_)>::new(move |_event: Event| {
            log::warn!("Relay connection closed");
        });
        ws.set_onclose(Some(on_close.as_ref().unchecked_ref()));

        Ok(Self {
            ws,
            pending,
            _on_open: on_open,
            _on_message: on_message,
            _on_close: on_close,
        })
    }

    pub fn is_open(&self) -> bool {
        self.ws.ready_state() == WebSocket::OPEN
    }

    pub fn send(&self, message: &ClientMessage) {
        let frame = match message.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {:?}: {}", message, e);
                return;
            }
        };
        if self.is_open() {
            if let Err(e) = self.ws.send_with_str(&frame) {
                log::warn!("Relay send failed: {:?}", e);
            }
        } else {
            self.pending.borrow_mut().push(frame);
        }
    }
}

impl Drop for RelaySocket {
    fn drop(&mut self) {
        self.ws.set_onopen(None);
        self.ws.set_onmessage(None);
        self.ws.set_onclose(None);
        let _ = self.ws.close();
    }
}
