//! Beat Duel entry point
//!
//! In the browser this wires the page to the simulation and runs the frame
//! loop. Natively it hosts the two-player relay or charts a file offline.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

#[cfg(target_arch = "wasm32")]
mod wasm_game {
    use std::cell::{Cell, RefCell};
    use std::rc::{Rc, Weak};

    use rand_pcg::Pcg32;
    use wasm_bindgen::prelude::*;
    use wasm_bindgen_futures::{JsFuture, spawn_local};
    use web_sys::{
        AddEventListenerOptions, AudioBuffer, AudioBufferSourceNode, AudioContext, Document, File,
        HtmlCanvasElement, HtmlElement, HtmlInputElement, HtmlVideoElement, KeyboardEvent,
        TouchEvent, Url,
    };

    use beat_duel::audio::{UploadKind, classify_upload, decode_in_browser};
    use beat_duel::input::{lane_for_key, lane_for_touch_zone};
    use beat_duel::lobby::{Lobby, LobbyPhase, MatchStart};
    use beat_duel::platform::hud::{Hud, alert};
    use beat_duel::platform::socket::RelaySocket;
    use beat_duel::platform::stage::Stage;
    use beat_duel::platform::{Countdown, CountdownStep, check_can_start};
    use beat_duel::relay::ServerMessage;
    use beat_duel::sim::{self, GameEvent, GameSession, Lane, NoteSchedule, RngState, TickInput};
    use beat_duel::{InputError, Settings};

    /// `<script type="application/json">` holding settings overrides
    const CONFIG_ELEMENT_ID: &str = "beat-duel-config";

    enum Media {
        /// Decoded up front; played through a buffer source
        Audio(AudioBuffer),
        /// Streamed through the element; its own clock drives the chart
        Video(HtmlVideoElement),
    }

    struct Track {
        media: Media,
        filename: String,
        schedule: NoteSchedule,
    }

    /// Game instance holding all client state
    struct Game {
        settings: Settings,
        audio_ctx: AudioContext,
        track: Option<Track>,
        source: Option<AudioBufferSourceNode>,
        session: Option<GameSession>,
        stage: Stage,
        hud: Hud,
        lobby: Lobby,
        socket: Option<RelaySocket>,
        rng: Pcg32,
        counting_down: bool,
        /// Pending animation frame of the running loop
        raf: Option<i32>,
    }

    impl Game {
        /// Current media clock reading
        fn media_now(&self) -> f64 {
            match self.track.as_ref().map(|t| &t.media) {
                Some(Media::Video(element)) => element.current_time(),
                _ => self.audio_ctx.current_time(),
            }
        }

        fn track_ended(&self, now: f64) -> bool {
            let Some(track) = &self.track else {
                return true;
            };
            match &track.media {
                Media::Video(element) => element.ended(),
                Media::Audio(buffer) => {
                    let start = self
                        .session
                        .as_ref()
                        .and_then(|s| s.clock)
                        .map(|c| c.start())
                        .unwrap_or(now);
                    now - start >= buffer.duration()
                }
            }
        }

        fn set_track(&mut self, media: Media, filename: String, schedule: NoteSchedule) {
            log::info!("Loaded {} with {} notes", filename, schedule.len());
            self.track = Some(Track {
                media,
                filename,
                schedule,
            });
            self.offer_song();
        }

        /// Send the loaded chart to the room if it is collecting songs
        fn offer_song(&mut self) {
            let Some(track) = &self.track else {
                return;
            };
            if let Some(message) = self.lobby.upload(&track.filename, track.schedule.clone()) {
                if let Some(socket) = &self.socket {
                    socket.send(&message);
                }
            }
        }

        /// Begin playback and the judgment session
        fn start(&mut self) -> Result<(), JsValue> {
            if let Some(old) = self.source.take() {
                let _ = old.stop();
            }
            if let (Some(window), Some(id)) = (web_sys::window(), self.raf.take()) {
                let _ = window.cancel_animation_frame(id);
            }
            if let Some(old) = self.session.as_mut().filter(|s| s.is_active()) {
                old.finish();
                self.flush_events();
            }
            let Some(track) = &self.track else {
                return Err(JsValue::from_str(&InputError::NoSong.to_string()));
            };
            let mut session = GameSession::new(track.schedule.fresh(), self.settings.judge_windows());

            let now = match &track.media {
                Media::Audio(buffer) => {
                    let source = self.audio_ctx.create_buffer_source()?;
                    source.set_buffer(Some(buffer));
                    source.connect_with_audio_node(&self.audio_ctx.destination())?;
                    source.start()?;
                    self.source = Some(source);
                    self.audio_ctx.current_time()
                }
                Media::Video(element) => {
                    element.set_current_time(0.0);
                    let _ = element.play()?;
                    element.current_time()
                }
            };
            session.start(now);
            self.hud.show_player(&session.player);
            self.session = Some(session);
            Ok(())
        }

        /// One display frame. Returns false once the track has ended.
        fn frame(&mut self) -> bool {
            let now = self.media_now();
            let ended = self.track_ended(now);
            let input = TickInput {
                now,
                scroll_speed: self.settings.scroll_speed,
                view: self.settings.view(self.stage.height()),
            };
            let Some(session) = self.session.as_mut() else {
                return false;
            };

            let sprites = sim::tick(session, &input);
            if ended {
                session.finish();
            }
            self.stage.draw(&sprites, self.settings.receptor_offset);
            self.hud.show_speed(&self.settings.scroll_speed_label());
            self.flush_events();
            !ended
        }

        fn hit(&mut self, lane: Lane) {
            let now = self.media_now();
            if let Some(session) = self.session.as_mut() {
                sim::check_hit(session, lane, now);
            }
            self.flush_events();
        }

        /// Forward session events to the HUD and the relay
        fn flush_events(&mut self) {
            let Some(session) = self.session.as_mut() else {
                return;
            };
            for event in session.drain_events() {
                match event {
                    GameEvent::ScoreChanged(player) => {
                        self.hud.show_player(&player);
                        if let (Some(socket), Some(message)) =
                            (&self.socket, self.lobby.score_update(&player))
                        {
                            socket.send(&message);
                        }
                    }
                    GameEvent::NoteHit { index, lane } => {
                        log::debug!("Hit note {} ({})", index, lane.as_str());
                    }
                    GameEvent::NoteMissed { index, lane } => {
                        log::debug!("Missed note {} ({})", index, lane.as_str());
                    }
                    GameEvent::Finished => log::info!("Song ended"),
                }
            }
        }

        /// Both players agreed: adopt the chart and speed
        fn apply_match(&mut self, start: MatchStart) {
            self.settings.scroll_speed = start.speed;
            if let Some(input) = input_element("noteSpeedInput") {
                input.set_value(&start.speed.to_string());
            }
            self.hud.show_speed(&self.settings.scroll_speed_label());
            match self.track.as_mut() {
                Some(track) => track.schedule = start.schedule,
                None => log::warn!("Match started with no local media loaded"),
            }
        }
    }

    fn document() -> Option<Document> {
        web_sys::window()?.document()
    }

    fn input_element(id: &str) -> Option<HtmlInputElement> {
        document()?.get_element_by_id(id)?.dyn_into().ok()
    }

    fn load_settings(document: &Document) -> Settings {
        let Some(json) = document
            .get_element_by_id(CONFIG_ELEMENT_ID)
            .and_then(|el| el.text_content())
        else {
            return Settings::default();
        };
        match Settings::from_json(&json) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("Ignoring bad settings: {}", e);
                Settings::default()
            }
        }
    }

    fn add_click(id: &str, handler: impl FnMut(web_sys::MouseEvent) + 'static) {
        let Some(el) = document().and_then(|d| d.get_element_by_id(id)) else {
            return;
        };
        let closure = Closure::<dyn FnMut(web_sys::MouseEvent)>::new(handler);
        let _ = el.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    pub async fn run() -> Result<(), JsValue> {
        console_error_panic_hook::set_once();
        let _ = console_log::init_with_level(log::Level::Info);

        log::info!("Beat Duel starting...");

        let window = web_sys::window().ok_or("no window")?;
        let document = window.document().ok_or("no document")?;

        let canvas: HtmlCanvasElement = document
            .get_element_by_id("gameCanvas")
            .ok_or("no canvas")?
            .dyn_into()?;

        let settings = load_settings(&document);
        let seed = js_sys::Date::now() as u64;
        let game = Rc::new(RefCell::new(Game {
            hud: Hud::new(&document),
            stage: Stage::new(canvas)?,
            audio_ctx: AudioContext::new()?,
            track: None,
            source: None,
            session: None,
            lobby: Lobby::new(),
            socket: None,
            rng: RngState::new(seed).to_rng(),
            counting_down: false,
            raf: None,
            settings,
        }));
        {
            let g = game.borrow();
            g.hud.show_speed(&g.settings.scroll_speed_label());
            g.hud.show_vote_panels(false, false);
        }
        log::info!("Game initialized with seed: {}", seed);

        setup_upload(game.clone());
        setup_input_handlers(&document, game.clone());
        setup_speed_input(game.clone());
        {
            let game = game.clone();
            add_click("startButton", move |_| begin_countdown(game.clone()));
        }
        if game.borrow().settings.multiplayer_enabled() {
            setup_multiplayer(game.clone());
        }

        log::info!("Beat Duel running!");
        Ok(())
    }

    fn setup_upload(game: Rc<RefCell<Game>>) {
        let Some(input) = input_element("audioUpload") else {
            log::warn!("No upload input on page");
            return;
        };
        let source = input.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let Some(file) = source.files().and_then(|files| files.get(0)) else {
                return;
            };
            let game = game.clone();
            spawn_local(async move {
                if let Err(message) = load_file(&game, file).await {
                    log::warn!("{}", message);
                    alert(&message);
                }
            });
        });
        let _ = input.add_event_listener_with_callback("change", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    async fn load_file(game: &Rc<RefCell<Game>>, file: File) -> Result<(), String> {
        let filename = file.name();
        let kind = classify_upload(&file.type_(), &filename).map_err(|e| e.to_string())?;

        match kind {
            UploadKind::Audio => {
                let bytes = JsFuture::from(file.array_buffer())
                    .await
                    .map_err(|e| format!("Error decoding audio: {:?}", e))?;
                let ctx = game.borrow().audio_ctx.clone();
                let (buffer, decoded) = decode_in_browser(&ctx, bytes.unchecked_into()).await?;

                let mut g = game.borrow_mut();
                let schedule = sim::detect(&decoded.channel_data, decoded.sample_rate, &mut g.rng);
                g.set_track(Media::Audio(buffer), filename, schedule);
            }
            UploadKind::Video => {
                let element = create_video(&game.borrow().audio_ctx, &file)
                    .map_err(|e| format!("Error loading video: {:?}", e))?;
                let mut g = game.borrow_mut();
                let schedule = sim::synthetic_cadence(&mut g.rng);
                g.set_track(Media::Video(element), filename, schedule);
            }
        }
        refresh_lobby(game);
        Ok(())
    }

    /// Off-DOM video element routed through the audio context
    fn create_video(ctx: &AudioContext, file: &File) -> Result<HtmlVideoElement, JsValue> {
        let element: HtmlVideoElement = document()
            .ok_or("no document")?
            .create_element("video")?
            .dyn_into()?;
        element.set_src(&Url::create_object_url_with_blob(file)?);
        element.set_cross_origin(Some("anonymous"));
        element.load();

        let source = ctx.create_media_element_source(&element)?;
        source.connect_with_audio_node(&ctx.destination())?;
        Ok(element)
    }

    fn begin_countdown(game: Rc<RefCell<Game>>) {
        {
            let mut g = game.borrow_mut();
            if g.counting_down {
                return;
            }
            if let Err(e) = check_can_start(g.track.is_some(), g.session.as_ref()) {
                alert(&e.to_string());
                return;
            }
            g.counting_down = true;
            // Autoplay policy: the context may still be suspended
            let _ = g.audio_ctx.resume();
        }

        let Some(window) = web_sys::window() else {
            return;
        };
        let mut countdown = Countdown::default();
        game.borrow().hud.show_countdown(countdown.current());

        let handle = Rc::new(Cell::new(None::<i32>));
        let closure = {
            let handle = handle.clone();
            Closure::<dyn FnMut()>::new(move || {
                let step = countdown.advance();
                game.borrow().hud.show_countdown(step);
                if step != CountdownStep::Go {
                    return;
                }
                if let (Some(window), Some(id)) = (web_sys::window(), handle.take()) {
                    window.clear_interval_with_handle(id);
                }

                let started = {
                    let mut g = game.borrow_mut();
                    g.counting_down = false;
                    g.start()
                };
                match started {
                    Ok(()) => request_animation_frame(game.clone()),
                    Err(e) => {
                        log::error!("Failed to start playback: {:?}", e);
                        alert("Could not start playback.");
                    }
                }
            })
        };
        match window.set_interval_with_callback_and_timeout_and_arguments_0(
            closure.as_ref().unchecked_ref(),
            1000,
        ) {
            Ok(id) => handle.set(Some(id)),
            Err(e) => log::error!("Countdown timer failed: {:?}", e),
        }
        closure.forget();
    }

    fn request_animation_frame(game: Rc<RefCell<Game>>) {
        let Some(window) = web_sys::window() else {
            return;
        };
        let handle = game.clone();
        let closure = Closure::once(move |_time: f64| {
            game_loop(game);
        });
        handle.borrow_mut().raf = window
            .request_animation_frame(closure.as_ref().unchecked_ref())
            .ok();
        closure.forget();
    }

    fn game_loop(game: Rc<RefCell<Game>>) {
        let running = {
            let mut g = game.borrow_mut();
            g.raf = None;
            g.frame()
        };
        if running {
            request_animation_frame(game);
        } else {
            log::info!("Game stopped after song ended.");
        }
    }

    fn setup_input_handlers(document: &Document, game: Rc<RefCell<Game>>) {
        // Keyboard
        {
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: KeyboardEvent| {
                if let Some(lane) = lane_for_key(&event.key()) {
                    event.prevent_default();
                    game.borrow_mut().hit(lane);
                }
            });
            let _ = document.add_event_listener_with_callback("keydown", closure.as_ref().unchecked_ref());
            closure.forget();
        }

        // Touch zones; non-passive so preventDefault stops scrolling
        let Ok(zones) = document.query_selector_all(".arrow-btn") else {
            return;
        };
        let options = AddEventListenerOptions::new();
        options.set_passive(false);
        for i in 0..zones.length() {
            let Some(zone) = zones.item(i).and_then(|n| n.dyn_into::<HtmlElement>().ok()) else {
                continue;
            };
            let Some(lane) = zone.dataset().get("dir").as_deref().and_then(lane_for_touch_zone) else {
                log::warn!("Touch zone without a valid data-dir");
                continue;
            };
            let game = game.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |event: TouchEvent| {
                event.prevent_default();
                game.borrow_mut().hit(lane);
            });
            let _ = zone.add_event_listener_with_callback_and_add_event_listener_options(
                "touchstart",
                closure.as_ref().unchecked_ref(),
                &options,
            );
            closure.forget();
        }
    }

    fn setup_speed_input(game: Rc<RefCell<Game>>) {
        let Some(input) = input_element("noteSpeedInput") else {
            return;
        };
        input.set_value(&game.borrow().settings.scroll_speed.to_string());
        let source = input.clone();
        let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::Event| {
            let mut g = game.borrow_mut();
            g.settings.set_scroll_speed_text(&source.value());
            g.hud.show_speed(&g.settings.scroll_speed_label());
        });
        let _ = input.add_event_listener_with_callback("input", closure.as_ref().unchecked_ref());
        closure.forget();
    }

    fn setup_multiplayer(game: Rc<RefCell<Game>>) {
        {
            let game = game.clone();
            add_click("joinButton", move |_| {
                let room = input_element("roomInput").map(|i| i.value()).unwrap_or_default();
                let username = input_element("usernameInput")
                    .map(|i| i.value())
                    .unwrap_or_default();
                if room.trim().is_empty() || username.trim().is_empty() {
                    alert("Enter a room and a name first");
                    return;
                }
                if let Err(e) = join_room(&game, &room, &username) {
                    log::error!("Relay connection failed: {:?}", e);
                    alert("Could not reach the relay server.");
                }
            });
        }

        add_click("difficultyButton", move |_| {
            let Some(speed) = input_element("difficultyInput")
                .and_then(|i| beat_duel::settings::parse_scroll_speed(&i.value()))
            else {
                alert("Enter a speed first");
                return;
            };
            {
                let mut g = game.borrow_mut();
                if let Some(message) = g.lobby.vote_difficulty(speed) {
                    if let Some(socket) = &g.socket {
                        socket.send(&message);
                    }
                }
            }
            refresh_lobby(&game);
        });
    }

    fn join_room(game: &Rc<RefCell<Game>>, room: &str, username: &str) -> Result<(), JsValue> {
        let mut g = game.borrow_mut();
        if g.socket.is_none() {
            let weak: Weak<RefCell<Game>> = Rc::downgrade(game);
            let socket = RelaySocket::connect(&g.settings.relay_url, move |message| {
                if let Some(game) = weak.upgrade() {
                    on_server_message(&game, message);
                }
            })?;
            g.socket = Some(socket);
        }
        let message = g.lobby.join(room, username);
        if let Some(socket) = &g.socket {
            socket.send(&message);
        }
        drop(g);
        refresh_lobby(game);
        Ok(())
    }

    fn on_server_message(game: &Rc<RefCell<Game>>, message: ServerMessage) {
        let start = {
            let mut g = game.borrow_mut();
            let start = g.lobby.apply(message);
            if g.lobby.phase() == &LobbyPhase::AwaitingSongs && !g.lobby.has_uploaded() {
                g.offer_song();
            }
            start
        };
        if let Some(start) = start {
            game.borrow_mut().apply_match(start);
            begin_countdown(game.clone());
        }
        refresh_lobby(game);
    }

    /// Redraw the lobby panel for the current phase
    fn refresh_lobby(game: &Rc<RefCell<Game>>) {
        let g = game.borrow();
        g.hud.show_lobby_status(&g.lobby.status_text());
        g.hud.show_opponent(g.lobby.opponent_name(), g.lobby.opponent());

        let phase = g.lobby.phase();
        g.hud.show_vote_panels(
            matches!(phase, LobbyPhase::SongVote(_)),
            matches!(phase, LobbyPhase::DifficultyVote(_)),
        );
        let LobbyPhase::SongVote(choices) = phase else {
            return;
        };
        let (Some(panel), Some(document)) = (g.hud.song_vote_panel(), document()) else {
            return;
        };
        for choice in choices {
            let Ok(button) = document.create_element("button") else {
                continue;
            };
            button.set_text_content(Some(&choice.filename));
            let game = game.clone();
            let song_id = choice.id.clone();
            let closure = Closure::<dyn FnMut(_)>::new(move |_event: web_sys::MouseEvent| {
                {
                    let mut g = game.borrow_mut();
                    if let Some(message) = g.lobby.vote_song(&song_id) {
                        if let Some(socket) = &g.socket {
                            socket.send(&message);
                        }
                    }
                }
                refresh_lobby(&game);
            });
            let _ = button.add_event_listener_with_callback("click", closure.as_ref().unchecked_ref());
            closure.forget();
            let _ = panel.append_child(&button);
        }
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub async fn wasm_main() {
    if let Err(e) = wasm_game::run().await {
        log::error!("Startup failed: {:?}", e);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {
    // WASM entry point is wasm_main, this is just to satisfy the compiler
}

#[cfg(not(target_arch = "wasm32"))]
mod native {
    use std::path::{Path, PathBuf};

    use anyhow::{Context, Result};
    use clap::{Parser, Subcommand};

    use beat_duel::audio::decode_bytes;
    use beat_duel::relay::RelayServer;
    use beat_duel::sim::{self, RngState};

    #[derive(Parser, Debug)]
    #[command(name = "beat-duel", about = "Beat Duel relay server and chart tool")]
    pub struct Args {
        #[command(subcommand)]
        command: Command,
    }

    #[derive(Subcommand, Debug)]
    enum Command {
        /// Run the two-player WebSocket relay
        Serve {
            /// Port to listen on
            #[arg(long, env = "PORT", default_value_t = 3000)]
            port: u16,

            /// Address to bind
            #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
            bind: String,

            /// Fixed seed for song-vote tie breaks
            #[arg(long)]
            seed: Option<u64>,
        },
        /// Decode an audio file and print its chart as JSON
        Chart {
            file: PathBuf,

            /// Lane assignment seed
            #[arg(long, default_value_t = 0)]
            seed: u64,
        },
    }

    pub fn run(args: Args) -> Result<()> {
        match args.command {
            Command::Serve { port, bind, seed } => serve(&bind, port, seed),
            Command::Chart { file, seed } => chart(&file, seed),
        }
    }

    fn serve(bind: &str, port: u16, seed: Option<u64>) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("failed to start tokio runtime")?;
        runtime.block_on(async {
            let mut server = RelayServer::bind((bind, port))
                .await
                .with_context(|| format!("cannot listen on {}:{}", bind, port))?;
            if let Some(seed) = seed {
                server = server.with_seed(seed);
            }
            server.run().await
        })
    }

    fn chart(file: &Path, seed: u64) -> Result<()> {
        let bytes = std::fs::read(file).with_context(|| format!("cannot read {}", file.display()))?;
        let extension = file.extension().and_then(|e| e.to_str());
        let decoded = decode_bytes(bytes, extension)
            .with_context(|| format!("cannot decode {}", file.display()))?;
        log::info!(
            "{}: {:.1}s at {} Hz",
            file.display(),
            decoded.duration_secs(),
            decoded.sample_rate
        );

        let mut rng = RngState::new(seed).to_rng();
        let schedule = sim::detect(&decoded.channel_data, decoded.sample_rate, &mut rng);
        println!("{}", serde_json::to_string_pretty(&schedule)?);
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    use clap::Parser;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    native::run(native::Args::parse())
}
