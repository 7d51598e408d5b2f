use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use js_sys::Reflect;
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;
use web_sys::HtmlImageElement;

const ONLOAD_HANDLE_KEY: &str = "__pricemapTileOnload";
const ONERROR_HANDLE_KEY: &str = "__pricemapTileOnerror";
/// Cached images beyond this are pruned down to the tiles on screen.
const MAX_CACHED_TILES: usize = 384;

#[derive(Clone, Copy, PartialEq, Eq)]
enum TileStatus {
    Loading,
    Ready,
    Failed,
}

struct CachedTile {
    image: HtmlImageElement,
    status: TileStatus,
}

/// Raster tile images keyed by resolved URL.
#[derive(Clone)]
pub struct TileImages {
    cache: Rc<RefCell<HashMap<String, CachedTile>>>,
    on_ready: Rc<dyn Fn()>,
}

impl TileImages {
    /// `on_ready` runs whenever a tile finishes loading so the map can repaint.
    pub fn new(on_ready: impl Fn() + 'static) -> Self {
        Self {
            cache: Rc::new(RefCell::new(HashMap::new())),
            on_ready: Rc::new(on_ready),
        }
    }

    /// The decoded image for `url`, starting a load the first time it is asked for.
    pub fn get(&self, url: &str) -> Option<HtmlImageElement> {
        if let Some(tile) = self.cache.borrow().get(url) {
            return (tile.status == TileStatus::Ready).then(|| tile.image.clone());
        }
        self.start_load(url);
        None
    }

    /// Drop cached images not in `visible` once the cache grows too large.
    pub fn prune(&self, visible: &HashSet<String>) {
        let mut cache = self.cache.borrow_mut();
        if cache.len() <= MAX_CACHED_TILES {
            return;
        }
        cache.retain(|url, tile| visible.contains(url) || tile.status == TileStatus::Loading);
    }

    fn start_load(&self, url: &str) {
        let Ok(img) = HtmlImageElement::new() else {
            return;
        };
        img.set_cross_origin(Some("anonymous"));

        let cache = self.cache.clone();
        let on_ready = self.on_ready.clone();
        let key = url.to_string();
        let img_for_load = img.clone();
        let onload = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_load);
            if let Some(tile) = cache.borrow_mut().get_mut(&key) {
                tile.status = TileStatus::Ready;
            }
            on_ready();
        });

        let cache = self.cache.clone();
        let key = url.to_string();
        let img_for_error = img.clone();
        let onerror = Closure::<dyn FnMut()>::new(move || {
            clear_image_handlers(&img_for_error);
            web_sys::console::warn_1(&format!("tile failed to load: {key}").into());
            if let Some(tile) = cache.borrow_mut().get_mut(&key) {
                tile.status = TileStatus::Failed;
            }
        });

        let onload_js = onload.into_js_value();
        let onerror_js = onerror.into_js_value();
        img.set_onload(Some(onload_js.unchecked_ref()));
        img.set_onerror(Some(onerror_js.unchecked_ref()));
        let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY), &onload_js);
        let _ = Reflect::set(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY), &onerror_js);

        self.cache.borrow_mut().insert(
            url.to_string(),
            CachedTile {
                image: img.clone(),
                status: TileStatus::Loading,
            },
        );
        img.set_src(url);
    }
}

fn clear_image_handlers(img: &HtmlImageElement) {
    img.set_onload(None);
    img.set_onerror(None);
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONLOAD_HANDLE_KEY));
    let _ = Reflect::delete_property(img.as_ref(), &JsValue::from_str(ONERROR_HANDLE_KEY));
}
