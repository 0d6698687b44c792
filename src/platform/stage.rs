//! Canvas 2D playfield

use wasm_bindgen::{JsCast, JsValue};
use web_sys::{CanvasRenderingContext2d, HtmlCanvasElement};

use crate::platform::layout::{Rect, lane_color, note_rect, receptor_rect};
use crate::sim::{Lane, NoteSprite};

const RECEPTOR_STROKE: &str = "#ccc";

pub struct Stage {
    canvas: HtmlCanvasElement,
    ctx: CanvasRenderingContext2d,
}

impl Stage {
    pub fn new(canvas: HtmlCanvasElement) -> Result<Self, JsValue> {
        let ctx = canvas
            .get_context("2d")?
            .ok_or_else(|| JsValue::from_str("2d context unavailable"))?
            .dyn_into::<CanvasRenderingContext2d>()?;
        Ok(Self { canvas, ctx })
    }

    pub fn height(&self) -> f64 {
        f64::from(self.canvas.height())
    }

    pub fn clear(&self) {
        self.ctx.clear_rect(
            0.0,
            0.0,
            f64::from(self.canvas.width()),
            f64::from(self.canvas.height()),
        );
    }

    pub fn draw_receptors(&self, receptor_offset: f64) {
        self.ctx.set_stroke_style_str(RECEPTOR_STROKE);
        for lane in Lane::ALL {
            let Rect { x, y, w, h } = receptor_rect(lane, receptor_offset);
            self.ctx.stroke_rect(x, y, w, h);
        }
    }

    pub fn draw_notes(&self, sprites: &[NoteSprite]) {
        for sprite in sprites {
            let Rect { x, y, w, h } = note_rect(sprite);
            self.ctx.set_fill_style_str(lane_color(sprite.lane));
            self.ctx.fill_rect(x, y, w, h);
        }
    }

    /// Full frame: clear, receptors, then notes on top
    pub fn draw(&self, sprites: &[NoteSprite], receptor_offset: f64) {
        self.clear();
        self.draw_receptors(receptor_offset);
        self.draw_notes(sprites);
    }
}
