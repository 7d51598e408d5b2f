use std::cell::RefCell;
use std::collections::HashMap;

use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;

struct ResizeBinding {
    window: web_sys::Window,
    handler: Closure<dyn Fn()>,
}

impl ResizeBinding {
    fn detach(self) {
        let _ = self
            .window
            .remove_event_listener_with_callback("resize", self.handler.as_ref().unchecked_ref());
    }
}

thread_local! {
    static RESIZE_BINDINGS: RefCell<HashMap<String, ResizeBinding>> = RefCell::new(HashMap::new());
}

/// Run `on_resize` on every window resize. Re-registering a key replaces
/// the previous listener.
pub fn watch(key: &str, on_resize: impl Fn() + 'static) {
    let Some(window) = web_sys::window() else {
        return;
    };
    unwatch(key);

    let handler = Closure::<dyn Fn()>::new(on_resize);
    if window
        .add_event_listener_with_callback("resize", handler.as_ref().unchecked_ref())
        .is_ok()
    {
        RESIZE_BINDINGS.with(|slot| {
            slot.borrow_mut()
                .insert(key.to_string(), ResizeBinding { window, handler });
        });
    }
}

pub fn unwatch(key: &str) {
    let old = RESIZE_BINDINGS.with(|slot| slot.borrow_mut().remove(key));
    if let Some(old) = old {
        old.detach();
    }
}
