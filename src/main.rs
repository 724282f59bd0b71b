//! Reaction Drive entry point
//!
//! Handles platform-specific initialization and wires the demos to the page.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_app {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{
        CanvasRenderingContext2d, Document, HtmlCanvasElement, HtmlElement, HtmlInputElement,
        KeyboardEvent,
    };

    use reaction_drive::platform::web::{FramePump, Listener, ViewportWatch, now};
    use reaction_drive::present::{HillSnapshot, Presenter, ReactionSnapshot, TrafficSnapshot};
    use reaction_drive::scheduler::LoopHandle;
    use reaction_drive::sim::{
        HillRun, Orientation, ReactionRun, Rect, RoundPhase, Steer, TrafficConfig, TrafficGame,
    };
    use reaction_drive::{Flow, PresentError, Settings};

    /// Fraction of a section that must be visible before its demo starts
    const VISIBLE_THRESHOLD: f64 = 0.5;

    thread_local! {
        // Page-lifetime subscriptions
        static APP: RefCell<Option<App>> = const { RefCell::new(None) };
    }

    struct App {
        _watches: Vec<ViewportWatch>,
        _listeners: Vec<Listener>,
    }

    fn element<T: JsCast>(document: &Document, id: &str) -> Option<T> {
        document.get_element_by_id(id)?.dyn_into::<T>().ok()
    }

    fn set_style(el: &HtmlElement, property: &str, value: &str) {
        let _ = el.style().set_property(property, value);
    }

    fn js_failure(what: &str) -> impl FnOnce(JsValue) -> PresentError + '_ {
        move |err| PresentError::Failed(format!("{}: {:?}", what, err))
    }

    // ---------------------------------------------------------------------
    // Reaction demo
    // ---------------------------------------------------------------------

    struct ReactionView {
        car: Option<HtmlElement>,
        person: Option<HtmlElement>,
        result: Option<HtmlElement>,
        info: Option<HtmlElement>,
    }

    impl ReactionView {
        fn new(document: &Document) -> Self {
            Self {
                car: element(document, "car"),
                person: element(document, "person"),
                result: element(document, "result"),
                info: element(document, "reactionInfo"),
            }
        }

        fn reset(&self) {
            if let Some(car) = &self.car {
                set_style(car, "left", "10px");
            }
            if let Some(person) = &self.person {
                set_style(person, "transition", "none");
                set_style(person, "transform", "none");
            }
            if let Some(result) = &self.result {
                result.set_text_content(Some(""));
            }
            if let Some(info) = &self.info {
                set_style(info, "opacity", "0");
            }
        }
    }

    impl Presenter<ReactionSnapshot> for ReactionView {
        fn present(&mut self, frame: &ReactionSnapshot) -> Result<(), PresentError> {
            let car = self.car.as_ref().ok_or(PresentError::Unavailable("car"))?;
            set_style(car, "left", &format!("{}px", frame.position));

            if frame.impact_started
                && let Some(person) = &self.person
            {
                set_style(person, "transition", "transform 2s cubic-bezier(0.4, 2, 0.6, 1)");
                set_style(person, "transform", "translateX(200vw) rotate(1080deg)");
            }

            if frame.decided
                && let Some(outcome) = frame.outcome
            {
                let result = self
                    .result
                    .as_ref()
                    .ok_or(PresentError::Unavailable("result"))?;
                result.set_text_content(Some(outcome.message()));
                if let Some(info) = &self.info {
                    set_style(info, "left", &format!("{}px", frame.position));
                    set_style(info, "opacity", "1");
                }
            }
            Ok(())
        }
    }

    struct ReactionDemo {
        run: ReactionRun,
        view: ReactionView,
        /// Click subscription owned by the current run
        click: Option<Listener>,
    }

    fn start_reaction(demo: &Rc<RefCell<ReactionDemo>>, pump: &FramePump, document: &Document) {
        {
            let mut d = demo.borrow_mut();
            d.click = None;
            d.view.reset();
            d.run.start();
        }

        let loop_demo = demo.clone();
        let handle = pump.scheduler().borrow_mut().start(move |timestamp| {
            let mut d = loop_demo.borrow_mut();
            let ReactionDemo { run, view, click } = &mut *d;
            let flow = run.frame(timestamp, view);
            if !run.is_running() {
                click.take();
            }
            flow
        });

        let click_demo = demo.clone();
        let click_pump = pump.clone();
        let listener = Listener::new(document, "click", move |_| {
            let decided = {
                let mut d = click_demo.borrow_mut();
                let ReactionDemo { run, view, .. } = &mut *d;
                run.react(now(), view)
            };
            match decided {
                Ok(Some(_)) => {
                    let mut scheduler = click_pump.scheduler().borrow_mut();
                    scheduler.cancel(handle);
                    // The listener cannot drop itself from inside its own callback
                    let cleanup = click_demo.clone();
                    scheduler.start(move |_| {
                        cleanup.borrow_mut().click.take();
                        Ok(Flow::Stop)
                    });
                    drop(scheduler);
                    click_pump.kick();
                }
                Ok(None) => {}
                Err(e) => log::warn!("Reaction feedback failed: {}", e),
            }
        });

        match listener {
            Ok(listener) => demo.borrow_mut().click = Some(listener),
            Err(e) => log::error!("Failed to attach reaction input: {:?}", e),
        }
        pump.kick();
    }

    // ---------------------------------------------------------------------
    // Hill demo
    // ---------------------------------------------------------------------

    struct HillView {
        car: Option<HtmlElement>,
        label: Option<HtmlElement>,
    }

    impl Presenter<HillSnapshot> for HillView {
        fn present(&mut self, frame: &HillSnapshot) -> Result<(), PresentError> {
            let car = self.car.as_ref().ok_or(PresentError::Unavailable("hillCar"))?;
            set_style(
                car,
                "transform",
                &format!("translate({:.1}px, {:.1}px)", frame.position.x, -frame.position.y),
            );
            if frame.finished
                && let Some(label) = &self.label
            {
                label.set_text_content(Some(&format!(
                    "Reached the top at speed {:.0} in {:.1}s",
                    frame.selected_speed,
                    frame.elapsed_ms / 1000.0
                )));
            }
            Ok(())
        }
    }

    struct HillDemo {
        run: HillRun,
        view: HillView,
        handle: Option<LoopHandle>,
    }

    fn start_hill(demo: &Rc<RefCell<HillDemo>>, pump: &FramePump, speed: f64) {
        let mut d = demo.borrow_mut();
        if let Some(handle) = d.handle.take() {
            pump.scheduler().borrow_mut().cancel(handle);
        }
        if let Err(e) = d.run.start(speed) {
            log::warn!("Hill climb not started: {}", e);
            return;
        }
        if let Some(label) = &d.view.label {
            label.set_text_content(Some(""));
        }

        let loop_demo = demo.clone();
        let handle = pump.scheduler().borrow_mut().start(move |timestamp| {
            let mut d = loop_demo.borrow_mut();
            let HillDemo { run, view, .. } = &mut *d;
            run.frame(timestamp, view)
        });
        d.handle = Some(handle);
        drop(d);
        pump.kick();
    }

    // ---------------------------------------------------------------------
    // Traffic games
    // ---------------------------------------------------------------------

    struct CanvasView {
        ctx: CanvasRenderingContext2d,
        width: f64,
        height: f64,
        orientation: Orientation,
        meter: Option<HtmlElement>,
    }

    impl CanvasView {
        fn new(
            document: &Document,
            canvas_id: &str,
            meter_id: Option<&str>,
            config: &TrafficConfig,
        ) -> Option<(Self, HtmlCanvasElement)> {
            let canvas: HtmlCanvasElement = element(document, canvas_id)?;
            let size = config.screen_size();
            canvas.set_width(size.x as u32);
            canvas.set_height(size.y as u32);
            let ctx = canvas
                .get_context("2d")
                .ok()??
                .dyn_into::<CanvasRenderingContext2d>()
                .ok()?;
            let view = Self {
                ctx,
                width: size.x as f64,
                height: size.y as f64,
                orientation: config.orientation,
                meter: meter_id.and_then(|id| element(document, id)),
            };
            Some((view, canvas))
        }

        fn fill(&self, rect: &Rect) {
            let size = rect.size();
            self.ctx.fill_rect(
                rect.min.x as f64,
                rect.min.y as f64,
                size.x as f64,
                size.y as f64,
            );
        }
    }

    impl Presenter<TrafficSnapshot> for CanvasView {
        fn present(&mut self, frame: &TrafficSnapshot) -> Result<(), PresentError> {
            let ctx = &self.ctx;
            ctx.set_fill_style_str("#222");
            ctx.fill_rect(0.0, 0.0, self.width, self.height);

            ctx.set_stroke_style_str("#fff");
            ctx.set_line_width(4.0);
            let dash = js_sys::Array::of2(&JsValue::from_f64(20.0), &JsValue::from_f64(20.0));
            ctx.set_line_dash(&dash).map_err(js_failure("setLineDash"))?;
            for &offset in &frame.lane_dividers {
                let offset = offset as f64;
                ctx.begin_path();
                match self.orientation {
                    Orientation::Vertical => {
                        ctx.move_to(offset, 0.0);
                        ctx.line_to(offset, self.height);
                    }
                    Orientation::Horizontal => {
                        ctx.move_to(0.0, offset);
                        ctx.line_to(self.width, offset);
                    }
                }
                ctx.stroke();
            }
            ctx.set_line_dash(&js_sys::Array::new())
                .map_err(js_failure("setLineDash"))?;

            ctx.set_fill_style_str("#e00");
            self.fill(&frame.player);
            ctx.set_fill_style_str("#0af");
            for obstacle in &frame.obstacles {
                self.fill(obstacle);
            }

            if frame.phase == RoundPhase::Crashed {
                ctx.set_fill_style_str("#ff0");
                ctx.set_font("40px Arial");
                ctx.set_text_align("center");
                ctx.fill_text("Game Over!", self.width / 2.0, self.height / 2.0)
                    .map_err(js_failure("fillText"))?;
                ctx.set_text_align("start");
            }

            if let Some(meter) = &self.meter {
                meter.set_text_content(Some(&format!("Speed: {:.1}", frame.player_speed)));
            }
            Ok(())
        }
    }

    struct TrafficDemo {
        game: TrafficGame,
        view: CanvasView,
        handle: Option<LoopHandle>,
    }

    fn start_traffic(demo: &Rc<RefCell<TrafficDemo>>, pump: &FramePump) {
        let loop_demo = demo.clone();
        let handle = pump.scheduler().borrow_mut().start(move |timestamp| {
            let mut d = loop_demo.borrow_mut();
            let TrafficDemo { game, view, .. } = &mut *d;
            game.frame(timestamp, view)
        });
        demo.borrow_mut().handle = Some(handle);
        pump.kick();
    }

    fn restart_traffic(demo: &Rc<RefCell<TrafficDemo>>, pump: &FramePump) {
        {
            let mut d = demo.borrow_mut();
            // Only a crashed game restarts
            if d.game.state().phase != RoundPhase::Crashed {
                return;
            }
            if let Some(handle) = d.handle.take() {
                pump.scheduler().borrow_mut().cancel(handle);
            }
            d.game.restart(js_sys::Date::now() as u64);
        }
        start_traffic(demo, pump);
    }

    /// Build a traffic game on `canvas_id`, started when it scrolls into view
    fn mount_traffic(
        document: &Document,
        pump: &FramePump,
        config: TrafficConfig,
        canvas_id: &str,
        meter_id: Option<&str>,
        watches: &mut Vec<ViewportWatch>,
        listeners: &mut Vec<Listener>,
    ) -> Result<Option<Rc<RefCell<TrafficDemo>>>, JsValue> {
        let Some((view, canvas)) = CanvasView::new(document, canvas_id, meter_id, &config) else {
            log::warn!("Canvas #{} not found, skipping game", canvas_id);
            return Ok(None);
        };
        let game = TrafficGame::new(config, js_sys::Date::now() as u64)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        let demo = Rc::new(RefCell::new(TrafficDemo {
            game,
            view,
            handle: None,
        }));

        let watch_demo = demo.clone();
        let watch_pump = pump.clone();
        watches.push(ViewportWatch::new(&canvas, VISIBLE_THRESHOLD, move || {
            start_traffic(&watch_demo, &watch_pump);
        })?);

        let click_demo = demo.clone();
        let click_pump = pump.clone();
        listeners.push(Listener::new(&canvas, "click", move |_| {
            restart_traffic(&click_demo, &click_pump);
        })?);

        Ok(Some(demo))
    }

    pub fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        console_log::init_with_level(log::Level::Info)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        log::info!("Reaction Drive starting...");

        let settings = Settings::load().map_err(|e| {
            log::error!("Invalid settings: {}", e);
            JsValue::from_str(&e.to_string())
        })?;

        let window = web_sys::window().ok_or_else(|| JsValue::from_str("no window"))?;
        let document = window
            .document()
            .ok_or_else(|| JsValue::from_str("no document"))?;

        let pump = FramePump::new(Rc::new(RefCell::new(
            reaction_drive::scheduler::Scheduler::new(),
        )));
        let mut watches = Vec::new();
        let mut listeners = Vec::new();

        // Reaction demo starts once its section is half visible
        let reaction = Rc::new(RefCell::new(ReactionDemo {
            run: ReactionRun::new(settings.reaction)
                .map_err(|e| JsValue::from_str(&e.to_string()))?,
            view: ReactionView::new(&document),
            click: None,
        }));
        if let Some(section) = document.get_element_by_id("carSection") {
            let watch_pump = pump.clone();
            let watch_document = document.clone();
            let watch_demo = reaction.clone();
            watches.push(ViewportWatch::new(&section, VISIBLE_THRESHOLD, move || {
                start_reaction(&watch_demo, &watch_pump, &watch_document);
            })?);
        } else {
            log::warn!("#carSection not found, skipping reaction demo");
        }

        // Hill demo runs on demand
        let hill = Rc::new(RefCell::new(HillDemo {
            run: HillRun::new(settings.hill).map_err(|e| JsValue::from_str(&e.to_string()))?,
            view: HillView {
                car: element(&document, "hillCar"),
                label: element(&document, "hillResult"),
            },
            handle: None,
        }));
        if let Some(button) = document.get_element_by_id("hillStart") {
            let speed_input: Option<HtmlInputElement> = element(&document, "hillSpeed");
            let click_pump = pump.clone();
            let click_demo = hill.clone();
            let fallback = settings.hill.min_speed;
            listeners.push(Listener::new(&button, "click", move |_| {
                let speed = speed_input
                    .as_ref()
                    .and_then(|input| input.value().parse::<f64>().ok())
                    .unwrap_or(fallback);
                start_hill(&click_demo, &click_pump, speed);
            })?);
        }

        let lane_game = mount_traffic(
            &document,
            &pump,
            settings.lane_game,
            "gameCanvas",
            None,
            &mut watches,
            &mut listeners,
        )?;
        let sideways_game = mount_traffic(
            &document,
            &pump,
            settings.sideways_game,
            "sidewaysCanvas",
            Some("speedMeter"),
            &mut watches,
            &mut listeners,
        )?;

        // Keyboard steering for both games
        let games: Vec<_> = lane_game.into_iter().chain(sideways_game).collect();
        listeners.push(Listener::new(&window, "keydown", move |event| {
            let Ok(event) = event.dyn_into::<KeyboardEvent>() else {
                return;
            };
            let key = event.key();
            if matches!(
                key.as_str(),
                "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" | " "
            ) {
                event.prevent_default();
            }
            for demo in &games {
                let mut d = demo.borrow_mut();
                let orientation = d.game.state().config.orientation;
                if let Some(steer) = Steer::from_key(&key, orientation) {
                    d.game.steer(steer);
                }
            }
        })?);

        APP.with(|app| {
            *app.borrow_mut() = Some(App {
                _watches: watches,
                _listeners: listeners,
            });
        });

        log::info!("Reaction Drive ready");
        Ok(())
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn wasm_main() -> Result<(), JsValue> {
    wasm_app::run()
}

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    log::info!("Reaction Drive (native) starting...");
    log::info!("Native mode runs a scripted session - run with `trunk serve` for the web version");

    if let Err(e) = headless::run() {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

/// Scripted session on a synthetic 60 Hz clock
#[cfg(not(target_arch = "wasm32"))]
mod headless {
    use std::cell::RefCell;
    use std::rc::Rc;

    use reaction_drive::consts::TRAFFIC_TICK_MS;
    use reaction_drive::present::{NullPresenter, TrafficSnapshot};
    use reaction_drive::sim::{HillClimb, ReactionRun, RoundPhase, TrafficConfig, TrafficGame};
    use reaction_drive::{ConfigError, PresentError, Scheduler, Settings};

    const SEED: u64 = 42;
    const REACT_AT_MS: f64 = 650.0;
    /// Frames the traffic games run for
    const TRAFFIC_FRAMES: u32 = 60 * 30;

    pub fn run() -> Result<(), ConfigError> {
        let settings = Settings::load()?;
        reaction(&settings)?;
        hill(&settings)?;
        traffic("Lane game", settings.lane_game.clone())?;
        traffic("Sideways game", settings.sideways_game.clone())?;
        Ok(())
    }

    fn reaction(settings: &Settings) -> Result<(), ConfigError> {
        let run = Rc::new(RefCell::new(ReactionRun::new(settings.reaction)?));
        run.borrow_mut().start();

        let mut scheduler = Scheduler::new();
        let loop_run = run.clone();
        let handle =
            scheduler.start(move |timestamp| loop_run.borrow_mut().frame(timestamp, &mut NullPresenter));

        let mut timestamp = 0.0;
        while !scheduler.is_idle() {
            scheduler.run_frame(timestamp);
            if timestamp >= REACT_AT_MS {
                if let Ok(Some(_)) = run.borrow_mut().react(timestamp, &mut NullPresenter) {
                    scheduler.cancel(handle);
                }
            }
            timestamp += TRAFFIC_TICK_MS;
        }

        match run.borrow().outcome() {
            Some(outcome) => println!(
                "Reaction at {:.0} ms: {}",
                outcome.elapsed_ms(),
                outcome.message()
            ),
            None => println!("Reaction run ended without an outcome"),
        }
        Ok(())
    }

    fn hill(settings: &Settings) -> Result<(), ConfigError> {
        let config = settings.hill;
        let mut speed = config.min_speed;
        while speed <= config.max_speed {
            let climb = HillClimb::climb(&config, speed)?;
            let top = climb.position_at(climb.duration_ms());
            println!(
                "Hill at speed {:.0}: {:.0} ms to ({:.0}, {:.0})",
                speed,
                climb.duration_ms(),
                top.x,
                top.y
            );
            speed += 10.0;
        }
        Ok(())
    }

    fn traffic(name: &str, config: TrafficConfig) -> Result<(), ConfigError> {
        let game = Rc::new(RefCell::new(TrafficGame::new(config, SEED)?));
        let rounds = Rc::new(RefCell::new(0u32));

        let mut scheduler = Scheduler::new();
        let loop_game = game.clone();
        let loop_rounds = rounds.clone();
        scheduler.start(move |timestamp| {
            let mut view = |snapshot: &TrafficSnapshot| {
                let mut seen = loop_rounds.borrow_mut();
                if snapshot.round_index > *seen {
                    *seen = snapshot.round_index;
                    log::info!("Round {} at speed {:.1}", snapshot.round_index, snapshot.player_speed);
                }
                Ok::<(), PresentError>(())
            };
            loop_game.borrow_mut().frame(timestamp, &mut view)
        });

        let mut timestamp = 0.0;
        for _ in 0..TRAFFIC_FRAMES {
            if scheduler.is_idle() {
                break;
            }
            scheduler.run_frame(timestamp);
            timestamp += TRAFFIC_TICK_MS;
        }

        let game = game.borrow();
        let state = game.state();
        let phase = match state.phase {
            RoundPhase::Crashed => "crashed",
            _ => "still driving",
        };
        println!(
            "{}: round {}, {} obstacles, {} after {:.1}s",
            name,
            state.round_index,
            state.obstacles.len(),
            phase,
            state.clock_ms / 1000.0
        );
        Ok(())
    }
}
