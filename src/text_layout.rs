//! Text blocks laid out with `parley` and drawn into the vello scene.
//!
//! Every piece of text in the widget (header, bubbles, input, button labels)
//! is a [`TextBlock`] wrapping a `PlainEditor`. Parley resolves the
//! paragraph direction from the content, so Arabic and Latin text both lay
//! out correctly with `Alignment::Start`.
//!
//! The `FontContext` and `LayoutContext` are shared by all blocks and live in
//! [`ParleyCtx`] on the view.

use parley::{
    FontContext, LayoutContext,
    editing::PlainEditor,
    layout::{Alignment, PositionedLayoutItem},
};
use vello::{
    Glyph, Scene,
    kurbo::{Affine, Rect},
    peniko::{Color, Fill},
};

/// `peniko::Color` has no `Default`, which parley's `Brush` bound requires.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorBrush(pub Color);

impl Default for ColorBrush {
    fn default() -> Self {
        ColorBrush(Color::new([0.0_f32, 0.0, 0.0, 1.0]))
    }
}

pub struct ParleyCtx {
    pub font_cx: FontContext,
    pub layout_cx: LayoutContext<ColorBrush>,
}

impl ParleyCtx {
    pub fn new() -> Self {
        Self {
            font_cx: FontContext::new(),
            layout_cx: LayoutContext::new(),
        }
    }
}

impl Default for ParleyCtx {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TextBlock {
    editor: PlainEditor<ColorBrush>,
    /// Last text pushed into the editor; edits are skipped when unchanged.
    text: String,
    /// Wrap limit the current fit was computed for.
    fitted_to: Option<f32>,
}

impl TextBlock {
    /// `width` is the wrap width; `None` lays the text out on one line.
    pub fn new(text: &str, font_size: f32, width: Option<f32>, ctx: &mut ParleyCtx) -> Self {
        let mut editor = PlainEditor::new(font_size);
        editor.set_width(width);
        editor.set_alignment(Alignment::Start);
        let mut block = Self {
            editor,
            text: String::new(),
            fitted_to: None,
        };
        block.set_text(text, ctx);
        block
    }

    pub fn set_text(&mut self, text: &str, ctx: &mut ParleyCtx) {
        if self.text == text {
            return;
        }
        let mut driver = self.editor.driver(&mut ctx.font_cx, &mut ctx.layout_cx);
        driver.select_all();
        driver.insert_or_replace_selection(text);
        driver.move_to_text_end();
        self.text = text.to_string();
    }

    pub fn set_width(&mut self, width: Option<f32>) {
        self.editor.set_width(width);
        self.fitted_to = None;
    }

    /// Show `text` wrapped at `max_width` and shrink the box to the widest
    /// line, so right-to-left lines start at the box edge instead of being
    /// pushed across the full wrap width.
    pub fn fit(&mut self, text: &str, max_width: f32, ctx: &mut ParleyCtx) -> (f64, f64) {
        if self.text != text || self.fitted_to != Some(max_width) {
            self.editor.set_width(Some(max_width));
            self.set_text(text, ctx);
            let (natural, _) = self.size(ctx);
            self.editor.set_width(Some((natural as f32).ceil().max(1.0)));
            self.fitted_to = Some(max_width);
        }
        self.size(ctx)
    }

    /// Laid-out size in logical pixels.
    pub fn size(&mut self, ctx: &mut ParleyCtx) -> (f64, f64) {
        let layout = self.editor.layout(&mut ctx.font_cx, &mut ctx.layout_cx);
        (layout.width() as f64, layout.height() as f64)
    }

    /// Caret rectangle in layout-local coordinates, if the layout is current.
    pub fn caret(&mut self, ctx: &mut ParleyCtx) -> Option<Rect> {
        self.editor.layout(&mut ctx.font_cx, &mut ctx.layout_cx);
        self.editor
            .cursor_geometry(1.5)
            .map(|b| Rect::new(b.x0 as f64, b.y0 as f64, b.x1 as f64, b.y1 as f64))
    }

    /// Draw the glyph runs with their top-left corner at `origin`.
    pub fn draw(&mut self, scene: &mut Scene, origin: (f64, f64), color: Color, ctx: &mut ParleyCtx) {
        self.draw_within(scene, origin, color, None, ctx);
    }

    /// Like [`draw`](Self::draw), but glyphs whose baseline falls outside
    /// `clip` (a `(top, bottom)` window-space band) are skipped.
    pub fn draw_within(
        &mut self,
        scene: &mut Scene,
        origin: (f64, f64),
        color: Color,
        clip: Option<(f64, f64)>,
        ctx: &mut ParleyCtx,
    ) {
        let transform = Affine::translate(origin);
        let visible = |baseline: f32, size: f32| match clip {
            Some((top, bottom)) => {
                let y = origin.1 + baseline as f64;
                y - size as f64 * 0.8 >= top && y <= bottom
            }
            None => true,
        };
        let layout = self.editor.layout(&mut ctx.font_cx, &mut ctx.layout_cx);
        for line in layout.lines() {
            for item in line.items() {
                let PositionedLayoutItem::GlyphRun(glyph_run) = item else {
                    continue;
                };

                let font_data = glyph_run.run().font();
                let font_size = glyph_run.run().font_size();

                let glyphs: Vec<Glyph> = glyph_run
                    .positioned_glyphs()
                    .filter(|g| visible(g.y, font_size))
                    .map(|g| Glyph { id: g.id, x: g.x, y: g.y })
                    .collect();
                if glyphs.is_empty() {
                    continue;
                }

                scene
                    .draw_glyphs(font_data)
                    .font_size(font_size)
                    .transform(transform)
                    .brush(&color)
                    .draw(Fill::NonZero, glyphs.into_iter());
            }
        }
    }
}
