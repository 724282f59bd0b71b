//! Browser glue
//!
//! Listeners and observers are owned values: dropping one detaches it, so a
//! run that owns its subscriptions cannot leak input into the next run.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, EventTarget, IntersectionObserver, IntersectionObserverEntry};

use super::OnceTrigger;
use crate::scheduler::Scheduler;

/// An event listener that is removed when dropped
pub struct Listener {
    target: EventTarget,
    event: &'static str,
    closure: Closure<dyn FnMut(web_sys::Event)>,
}

impl Listener {
    pub fn new<F>(target: &EventTarget, event: &'static str, callback: F) -> Result<Self, JsValue>
    where
        F: FnMut(web_sys::Event) + 'static,
    {
        let closure = Closure::<dyn FnMut(web_sys::Event)>::new(callback);
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target: target.clone(),
            event,
            closure,
        })
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = self
            .target
            .remove_event_listener_with_callback(self.event, self.closure.as_ref().unchecked_ref());
    }
}

/// Fires `on_enter` the first time `element` is at least `threshold` visible
pub struct ViewportWatch {
    observer: IntersectionObserver,
    _callback: Closure<dyn FnMut(js_sys::Array, IntersectionObserver)>,
}

impl ViewportWatch {
    pub fn new<F>(element: &Element, threshold: f64, mut on_enter: F) -> Result<Self, JsValue>
    where
        F: FnMut() + 'static,
    {
        let mut trigger = OnceTrigger::new();
        let callback = Closure::<dyn FnMut(js_sys::Array, IntersectionObserver)>::new(
            move |entries: js_sys::Array, observer: IntersectionObserver| {
                for entry in entries.iter() {
                    let Ok(entry) = entry.dyn_into::<IntersectionObserverEntry>() else {
                        continue;
                    };
                    if entry.is_intersecting() && trigger.fire() {
                        observer.unobserve(&entry.target());
                        on_enter();
                    }
                }
            },
        );

        let options = web_sys::IntersectionObserverInit::new();
        options.set_threshold(&JsValue::from_f64(threshold));
        let observer = IntersectionObserver::new_with_options(
            callback.as_ref().unchecked_ref(),
            &options,
        )?;
        observer.observe(element);

        Ok(Self {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for ViewportWatch {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// Drives a shared [`Scheduler`] from `requestAnimationFrame`.
///
/// Frames are only requested while at least one loop is scheduled; call
/// [`FramePump::kick`] after starting a loop.
#[derive(Clone)]
pub struct FramePump {
    scheduler: Rc<RefCell<Scheduler>>,
    pending: Rc<Cell<bool>>,
}

impl FramePump {
    pub fn new(scheduler: Rc<RefCell<Scheduler>>) -> Self {
        Self {
            scheduler,
            pending: Rc::new(Cell::new(false)),
        }
    }

    pub fn scheduler(&self) -> &Rc<RefCell<Scheduler>> {
        &self.scheduler
    }

    /// Make sure a frame is requested
    pub fn kick(&self) {
        if self.pending.replace(true) {
            return;
        }
        self.request();
    }

    fn request(&self) {
        let Some(window) = web_sys::window() else {
            self.pending.set(false);
            return;
        };
        let pump = self.clone();
        let closure = Closure::once(move |time: f64| {
            pump.on_frame(time);
        });
        if window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .is_err()
        {
            log::error!("requestAnimationFrame failed");
            self.pending.set(false);
        }
        closure.forget();
    }

    fn on_frame(&self, time: f64) {
        let idle = {
            let mut scheduler = self.scheduler.borrow_mut();
            scheduler.run_frame(time);
            scheduler.is_idle()
        };
        if idle {
            self.pending.set(false);
        } else {
            self.request();
        }
    }
}

/// Host clock on the same timeline as frame timestamps
pub fn now() -> f64 {
    web_sys::window()
        .and_then(|w| w.performance())
        .map(|p| p.now())
        .unwrap_or_else(js_sys::Date::now)
}
