//! DOM heads-up display
//!
//! Element ids: `score`, `combo`, `healthBar`, `noteSpeedDisplay`,
//! `countdown`, `opponent`, `lobbyStatus`, `songVote`, `difficultyVote`.
//! Missing elements are skipped, so a page without the lobby panel still
//! works in single-player.

use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement};

use crate::platform::CountdownStep;
use crate::sim::PlayerState;

pub struct Hud {
    score: Option<Element>,
    combo: Option<Element>,
    health_bar: Option<HtmlElement>,
    speed: Option<Element>,
    countdown: Option<HtmlElement>,
    opponent: Option<Element>,
    lobby_status: Option<Element>,
    song_vote: Option<HtmlElement>,
    difficulty_vote: Option<HtmlElement>,
}

fn html(document: &Document, id: &str) -> Option<HtmlElement> {
    document.get_element_by_id(id)?.dyn_into().ok()
}

fn set_shown(el: &HtmlElement, shown: bool) {
    let _ = el
        .style()
        .set_property("display", if shown { "block" } else { "none" });
}

impl Hud {
    pub fn new(document: &Document) -> Self {
        Self {
            score: document.get_element_by_id("score"),
            combo: document.get_element_by_id("combo"),
            health_bar: html(document, "healthBar"),
            speed: document.get_element_by_id("noteSpeedDisplay"),
            countdown: html(document, "countdown"),
            opponent: document.get_element_by_id("opponent"),
            lobby_status: document.get_element_by_id("lobbyStatus"),
            song_vote: html(document, "songVote"),
            difficulty_vote: html(document, "difficultyVote"),
        }
    }

    pub fn show_player(&self, player: &PlayerState) {
        if let Some(el) = &self.score {
            el.set_text_content(Some(&format!("Score: {}", player.score)));
        }
        if let Some(el) = &self.combo {
            el.set_text_content(Some(&format!("Combo: {}", player.combo)));
        }
        if let Some(el) = &self.health_bar {
            let width = format!("{}%", player.health_percent());
            let _ = el.style().set_property("width", &width);
        }
    }

    pub fn show_speed(&self, label: &str) {
        if let Some(el) = &self.speed {
            el.set_text_content(Some(label));
        }
    }

    pub fn show_countdown(&self, step: CountdownStep) {
        let Some(el) = &self.countdown else {
            return;
        };
        match step {
            CountdownStep::Show(n) => {
                el.set_text_content(Some(&n.to_string()));
                set_shown(el, true);
            }
            CountdownStep::Go => set_shown(el, false),
        }
    }

    pub fn show_opponent(&self, name: Option<&str>, totals: Option<(i64, u8)>) {
        let Some(el) = &self.opponent else {
            return;
        };
        let text = match (name, totals) {
            (Some(name), Some((score, health))) => {
                format!("{}: {} ({}%)", name, score, health)
            }
            (Some(name), None) => format!("{}: ready", name),
            (None, _) => String::new(),
        };
        el.set_text_content(Some(&text));
    }

    pub fn show_lobby_status(&self, text: &str) {
        if let Some(el) = &self.lobby_status {
            el.set_text_content(Some(text));
        }
    }

    /// Container the song ballot buttons go into, cleared
    pub fn song_vote_panel(&self) -> Option<&HtmlElement> {
        let panel = self.song_vote.as_ref()?;
        panel.set_inner_html("");
        Some(panel)
    }

    /// Toggle the ballot panels for the current lobby phase
    pub fn show_vote_panels(&self, song: bool, difficulty: bool) {
        if let Some(el) = &self.song_vote {
            set_shown(el, song);
        }
        if let Some(el) = &self.difficulty_vote {
            set_shown(el, difficulty);
        }
    }
}

/// Blocking browser alert for user-facing errors
pub fn alert(message: &str) {
    if let Some(window) = web_sys::window() {
        let _ = window.alert_with_message(message);
    }
}
