//! Widget rendering using vello.
//!
//! Draws the launcher and, when open, the chat panel: header (brand badge,
//! title, subtitle, close control), the conversation body and the footer
//! (text field and send button). The panel is right-to-left: the visitor's
//! bubbles sit on the left edge, the assistant's on the right.
//!
//! Everything here is read from a [`WidgetSnapshot`]; the view never mutates
//! the session. It only keeps layout caches and the wheel scroll offset.

use std::collections::HashMap;

use vello::Scene;
use vello::kurbo::{Affine, BezPath, Circle, Line, Point, Rect, RoundedRect, Shape, Stroke, Vec2};
use vello::peniko::{Color, Fill};

use mokhatt::config::{HEADER_SUBTITLE, Launcher, Position, WidgetConfig};
use mokhatt::conversation::{EntryId, EntryKind, Message, Role};
use mokhatt::session::WidgetSnapshot;

use crate::text_layout::{ParleyCtx, TextBlock};

// --- Palette ---

pub const PAGE_BG: Color = Color::new([0.933, 0.945, 0.961, 1.0]);
const PANEL_BG: Color = Color::new([1.0, 1.0, 1.0, 1.0]);
const BODY_BG: Color = Color::new([0.965, 0.969, 0.976, 1.0]); // #f6f7f9
const INK: Color = Color::new([0.059, 0.090, 0.165, 1.0]); // #0f172a
const INK_MUTED: Color = Color::new([0.059, 0.090, 0.165, 0.45]);
const STROKE: Color = Color::new([0.059, 0.090, 0.165, 0.10]);
const ON_ACCENT: Color = Color::new([1.0, 1.0, 1.0, 1.0]);
const ON_ACCENT_SOFT: Color = Color::new([1.0, 1.0, 1.0, 0.85]);
const BADGE_ON_ACCENT: Color = Color::new([1.0, 1.0, 1.0, 0.18]);

// --- Layout ---

const EDGE: f64 = 18.0;
const LAUNCHER_SIZE: f64 = 60.0;
const PANEL_WIDTH: f64 = 390.0;
const PANEL_HEIGHT: f64 = 560.0;
const PANEL_BOTTOM: f64 = 90.0;
const PANEL_RADIUS: f64 = 20.0;
const HEADER_HEIGHT: f64 = 58.0;
const FOOTER_HEIGHT: f64 = 62.0;
const CLOSE_SIZE: f64 = 34.0;
const BRAND_SIZE: f64 = 32.0;
const SEND_WIDTH: f64 = 72.0;
const BODY_PAD: f64 = 12.0;
const MESSAGE_GAP: f64 = 10.0;
const BUBBLE_PAD_X: f64 = 12.0;
const BUBBLE_PAD_Y: f64 = 10.0;
const BUBBLE_RADIUS: f64 = 16.0;
const BUBBLE_MAX_FRACTION: f64 = 0.82;
const WELCOME_BADGE: f64 = 36.0;
const DOT_SIZE: f64 = 6.0;
const DOT_GAP: f64 = 4.0;
const WHEEL_LINE: f64 = 40.0;

const TEXT_SIZE: f32 = 14.0;
const TITLE_SIZE: f32 = 13.5;
const SUBTITLE_SIZE: f32 = 11.5;

const INPUT_PLACEHOLDER: &str = "اكتب رسالتك…";
const SEND_LABEL: &str = "إرسال";

/// Typing dots: period and per-dot delay, in seconds.
const DOT_PERIOD: f64 = 1.0;
const DOT_STAGGER: f64 = 0.12;
const DOT_LIFT: f64 = 3.0;

/// Parse `#rgb` or `#rrggbb`.
pub fn parse_hex_color(s: &str) -> Option<Color> {
    let hex = s.trim().strip_prefix('#')?;
    let channel = |i: usize, len: usize| u8::from_str_radix(hex.get(i..i + len)?, 16).ok();
    match hex.len() {
        6 => Some(Color::from_rgb8(channel(0, 2)?, channel(2, 2)?, channel(4, 2)?)),
        3 => {
            let (r, g, b) = (channel(0, 1)?, channel(1, 1)?, channel(2, 1)?);
            Some(Color::from_rgb8(r * 17, g * 17, b * 17))
        }
        _ => None,
    }
}

/// Vertical offset (negative is up) and opacity of typing dot `index`.
///
/// Each dot rises 3 px at 40% of its cycle and rests from 80% on.
pub fn dot_phase(elapsed: f64, index: usize) -> (f64, f32) {
    let t = (elapsed - index as f64 * DOT_STAGGER).rem_euclid(DOT_PERIOD) / DOT_PERIOD;
    let k = if t < 0.4 {
        t / 0.4
    } else if t < 0.8 {
        (0.8 - t) / 0.4
    } else {
        0.0
    };
    (-DOT_LIFT * k, 0.5 + 0.5 * k as f32)
}

/// What a pointer position lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Launcher,
    Close,
    Send,
    Input,
    Panel,
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    pub launcher: Circle,
    pub panel: Rect,
    pub header: Rect,
    pub body: Rect,
    pub footer: Rect,
    pub close: Rect,
    pub input: Rect,
    pub send: Rect,
}

impl Geometry {
    pub fn compute(width: f64, height: f64, position: Position) -> Self {
        let anchor_x = |w: f64| match position {
            Position::Right => width - EDGE - w,
            Position::Left => EDGE,
        };

        let lx = anchor_x(LAUNCHER_SIZE);
        let ly = height - EDGE - LAUNCHER_SIZE;
        let launcher = Circle::new(
            (lx + LAUNCHER_SIZE / 2.0, ly + LAUNCHER_SIZE / 2.0),
            LAUNCHER_SIZE / 2.0,
        );

        let pw = PANEL_WIDTH.min(width - 2.0 * EDGE).max(240.0);
        let ph = PANEL_HEIGHT.min(height - 150.0).max(HEADER_HEIGHT + FOOTER_HEIGHT + 80.0);
        let px = anchor_x(pw);
        let py1 = height - PANEL_BOTTOM;
        let panel = Rect::new(px, py1 - ph, px + pw, py1);

        let header = Rect::new(panel.x0, panel.y0, panel.x1, panel.y0 + HEADER_HEIGHT);
        let footer = Rect::new(panel.x0, panel.y1 - FOOTER_HEIGHT, panel.x1, panel.y1);
        let body = Rect::new(panel.x0, header.y1, panel.x1, footer.y0);

        // Right-to-left: the close control sits at the header's left end.
        let close_y = header.y0 + (HEADER_HEIGHT - CLOSE_SIZE) / 2.0;
        let close = Rect::new(
            header.x0 + 12.0,
            close_y,
            header.x0 + 12.0 + CLOSE_SIZE,
            close_y + CLOSE_SIZE,
        );

        let send = Rect::new(
            footer.x0 + 10.0,
            footer.y0 + 10.0,
            footer.x0 + 10.0 + SEND_WIDTH,
            footer.y1 - 10.0,
        );
        let input = Rect::new(send.x1 + 8.0, footer.y0 + 10.0, footer.x1 - 10.0, footer.y1 - 10.0);

        Self {
            launcher,
            panel,
            header,
            body,
            footer,
            close,
            input,
            send,
        }
    }

    pub fn hit(&self, p: Point, open: bool) -> Hit {
        if self.launcher.center.distance(p) <= self.launcher.radius {
            return Hit::Launcher;
        }
        if !open || !self.panel.contains(p) {
            return Hit::Outside;
        }
        if self.close.contains(p) {
            Hit::Close
        } else if self.send.contains(p) {
            Hit::Send
        } else if self.input.contains(p) {
            Hit::Input
        } else {
            Hit::Panel
        }
    }
}

pub struct WidgetView {
    ctx: ParleyCtx,
    accent: Color,
    position: Position,
    launcher: Launcher,
    title: TextBlock,
    subtitle: TextBlock,
    close_label: TextBlock,
    send_label: TextBlock,
    placeholder: TextBlock,
    input: TextBlock,
    badge_label: TextBlock,
    launcher_label: TextBlock,
    bubbles: HashMap<EntryId, TextBlock>,
    /// Distance scrolled up from the end of the conversation.
    scroll_from_end: f64,
    last_scroll_epoch: u64,
    geometry: Geometry,
}

impl WidgetView {
    pub fn new(config: &WidgetConfig) -> Self {
        let mut ctx = ParleyCtx::new();
        let accent = parse_hex_color(&config.accent_color)
            .unwrap_or(Color::new([0.059, 0.357, 0.243, 1.0]));

        let title = TextBlock::new(&config.title, TITLE_SIZE, None, &mut ctx);
        let subtitle = TextBlock::new(HEADER_SUBTITLE, SUBTITLE_SIZE, None, &mut ctx);
        let close_label = TextBlock::new("✕", 18.0, None, &mut ctx);
        let send_label = TextBlock::new(SEND_LABEL, TEXT_SIZE, None, &mut ctx);
        let placeholder = TextBlock::new(INPUT_PLACEHOLDER, TEXT_SIZE, None, &mut ctx);
        let input = TextBlock::new("", TEXT_SIZE, None, &mut ctx);

        // Images are not rasterized; badges show an initial instead.
        let badge_initial = initial(config.assistant_logo.as_deref().unwrap_or(&config.title));
        let badge_label = TextBlock::new(&badge_initial, 15.0, None, &mut ctx);
        let launcher_text = match &config.launcher {
            Launcher::Image { alt, .. } => initial(alt),
            Launcher::Default => "…".to_string(),
        };
        let launcher_label = TextBlock::new(&launcher_text, 22.0, None, &mut ctx);

        Self {
            ctx,
            accent,
            position: config.position,
            launcher: config.launcher.clone(),
            title,
            subtitle,
            close_label,
            send_label,
            placeholder,
            input,
            badge_label,
            launcher_label,
            bubbles: HashMap::new(),
            scroll_from_end: 0.0,
            last_scroll_epoch: 0,
            geometry: Geometry::compute(800.0, 700.0, config.position),
        }
    }

    pub fn hit(&self, x: f64, y: f64, open: bool) -> Hit {
        self.geometry.hit(Point::new(x, y), open)
    }

    /// Wheel input in lines; positive scrolls toward older messages.
    pub fn scroll_lines(&mut self, lines: f64) {
        self.scroll_from_end = (self.scroll_from_end + lines * WHEEL_LINE).max(0.0);
    }

    pub fn render(
        &mut self,
        scene: &mut Scene,
        width: f64,
        height: f64,
        snapshot: &WidgetSnapshot,
        elapsed: f64,
    ) {
        self.geometry = Geometry::compute(width, height, self.position);
        if snapshot.scroll_epoch != self.last_scroll_epoch {
            self.last_scroll_epoch = snapshot.scroll_epoch;
            self.scroll_from_end = 0.0;
        }

        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            PAGE_BG,
            None,
            &Rect::new(0.0, 0.0, width, height),
        );

        if snapshot.open {
            self.draw_panel_frame(scene);
            self.draw_body(scene, &snapshot.messages, elapsed);
            self.draw_header(scene);
            self.draw_footer(scene, snapshot, elapsed);
        }
        self.draw_launcher(scene);
    }

    fn draw_panel_frame(&mut self, scene: &mut Scene) {
        let g = self.geometry;
        let panel = g.panel.to_rounded_rect(PANEL_RADIUS);
        scene.fill(Fill::NonZero, Affine::IDENTITY, PANEL_BG, None, &panel);
        scene.fill(Fill::NonZero, Affine::IDENTITY, BODY_BG, None, &g.body);
        scene.stroke(&Stroke::new(1.0), Affine::IDENTITY, STROKE, None, &panel);
    }

    fn draw_header(&mut self, scene: &mut Scene) {
        let g = self.geometry;
        let header = RoundedRect::from_rect(g.header, (PANEL_RADIUS, PANEL_RADIUS, 0.0, 0.0));
        scene.fill(Fill::NonZero, Affine::IDENTITY, self.accent, None, &header);

        // Brand badge at the right end, title block to its left.
        let bx1 = g.header.x1 - 12.0;
        let by0 = g.header.y0 + (HEADER_HEIGHT - BRAND_SIZE) / 2.0;
        let brand = Rect::new(bx1 - BRAND_SIZE, by0, bx1, by0 + BRAND_SIZE);
        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            BADGE_ON_ACCENT,
            None,
            &brand.to_rounded_rect(12.0),
        );
        let ctx = &mut self.ctx;
        draw_centered(&mut self.badge_label, scene, brand, ON_ACCENT, ctx);

        let text_right = brand.x0 - 10.0;
        let (tw, th) = self.title.size(ctx);
        let (sw, sh) = self.subtitle.size(ctx);
        let top = g.header.y0 + (HEADER_HEIGHT - th - sh) / 2.0;
        self.title.draw(scene, (text_right - tw, top), ON_ACCENT, ctx);
        self.subtitle
            .draw(scene, (text_right - sw, top + th), ON_ACCENT_SOFT, ctx);

        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            BADGE_ON_ACCENT,
            None,
            &g.close.to_rounded_rect(12.0),
        );
        draw_centered(&mut self.close_label, scene, g.close, ON_ACCENT, ctx);
    }

    fn draw_body(&mut self, scene: &mut Scene, messages: &[Message], elapsed: f64) {
        let g = self.geometry;
        let ctx = &mut self.ctx;
        self.bubbles.retain(|id, _| messages.iter().any(|m| m.id == *id));

        let max_bubble = (g.body.width() - 2.0 * BODY_PAD) * BUBBLE_MAX_FRACTION;
        let max_text = (max_bubble - 2.0 * BUBBLE_PAD_X) as f32;

        // Measure first, so the scroll range is known before drawing.
        let mut sizes = Vec::with_capacity(messages.len());
        for message in messages {
            let size = match message.kind {
                EntryKind::Typing => (3.0 * DOT_SIZE + 2.0 * DOT_GAP, 16.0),
                EntryKind::Text | EntryKind::Welcome => {
                    let wrap = if message.kind == EntryKind::Welcome {
                        max_text - (WELCOME_BADGE + 10.0) as f32
                    } else {
                        max_text
                    };
                    let block = self
                        .bubbles
                        .entry(message.id)
                        .or_insert_with(|| TextBlock::new("", TEXT_SIZE, Some(wrap), ctx));
                    let (w, h) = block.fit(&message.text, wrap.max(40.0), ctx);
                    if message.kind == EntryKind::Welcome {
                        (w + WELCOME_BADGE + 10.0, h.max(WELCOME_BADGE))
                    } else {
                        (w, h)
                    }
                }
            };
            sizes.push(size);
        }

        let content: f64 = sizes
            .iter()
            .map(|(_, h)| h + 2.0 * BUBBLE_PAD_Y + MESSAGE_GAP)
            .sum::<f64>()
            + BODY_PAD;
        let visible = g.body.height() - BODY_PAD;
        let overflow = (content - visible).max(0.0);
        self.scroll_from_end = self.scroll_from_end.min(overflow);

        let clip = (g.body.y0, g.body.y1);
        let mut y = g.body.y0 + BODY_PAD - (overflow - self.scroll_from_end);
        for (message, (w, h)) in messages.iter().zip(sizes) {
            let bubble_w = w + 2.0 * BUBBLE_PAD_X;
            let bubble_h = h + 2.0 * BUBBLE_PAD_Y;
            let x0 = match message.role {
                Role::User => g.body.x0 + BODY_PAD,
                Role::Assistant => g.body.x1 - BODY_PAD - bubble_w,
            };
            let bubble = Rect::new(x0, y, x0 + bubble_w, y + bubble_h);
            y += bubble_h + MESSAGE_GAP;

            let shown = bubble.intersect(g.body);
            if shown.height() <= 0.0 {
                continue;
            }
            let (fill, corners) = match message.role {
                Role::User => (
                    PANEL_BG,
                    (BUBBLE_RADIUS, BUBBLE_RADIUS, BUBBLE_RADIUS, 8.0),
                ),
                Role::Assistant => (
                    self.accent.with_alpha(0.10),
                    (BUBBLE_RADIUS, BUBBLE_RADIUS, 8.0, BUBBLE_RADIUS),
                ),
            };
            let shape = RoundedRect::from_rect(shown, corners);
            scene.fill(Fill::NonZero, Affine::IDENTITY, fill, None, &shape);
            scene.stroke(&Stroke::new(1.0), Affine::IDENTITY, STROKE, None, &shape);

            let inner = (bubble.x0 + BUBBLE_PAD_X, bubble.y0 + BUBBLE_PAD_Y);
            match message.kind {
                EntryKind::Typing => draw_dots(scene, inner, clip, elapsed),
                EntryKind::Text => {
                    if let Some(block) = self.bubbles.get_mut(&message.id) {
                        block.draw_within(scene, inner, INK, Some(clip), ctx);
                    }
                }
                EntryKind::Welcome => {
                    // Badge on the right, text to its left.
                    let badge = Rect::new(
                        bubble.x1 - BUBBLE_PAD_X - WELCOME_BADGE,
                        inner.1,
                        bubble.x1 - BUBBLE_PAD_X,
                        inner.1 + WELCOME_BADGE,
                    );
                    if badge.y0 >= clip.0 && badge.y1 <= clip.1 {
                        scene.fill(
                            Fill::NonZero,
                            Affine::IDENTITY,
                            PANEL_BG,
                            None,
                            &badge.to_rounded_rect(14.0),
                        );
                        scene.stroke(
                            &Stroke::new(1.0),
                            Affine::IDENTITY,
                            STROKE,
                            None,
                            &badge.to_rounded_rect(14.0),
                        );
                        draw_centered(&mut self.badge_label, scene, badge, self.accent, ctx);
                    }
                    if let Some(block) = self.bubbles.get_mut(&message.id) {
                        block.draw_within(scene, inner, INK, Some(clip), ctx);
                    }
                }
            }
        }
    }

    fn draw_footer(&mut self, scene: &mut Scene, snapshot: &WidgetSnapshot, elapsed: f64) {
        let g = self.geometry;
        let ctx = &mut self.ctx;
        let controls = &snapshot.controls;
        let enabled_alpha = if controls.locked { 0.6 } else { 1.0 };

        let footer = RoundedRect::from_rect(g.footer, (0.0, 0.0, PANEL_RADIUS, PANEL_RADIUS));
        scene.fill(Fill::NonZero, Affine::IDENTITY, PANEL_BG, None, &footer);
        scene.stroke(
            &Stroke::new(1.0),
            Affine::IDENTITY,
            STROKE,
            None,
            &Line::new((g.footer.x0, g.footer.y0), (g.footer.x1, g.footer.y0)),
        );

        // Text field
        let field = g.input.to_rounded_rect(14.0);
        scene.fill(Fill::NonZero, Affine::IDENTITY, PANEL_BG, None, &field);
        let border = if controls.focused && !controls.locked {
            self.accent.with_alpha(0.6)
        } else {
            STROKE
        };
        scene.stroke(&Stroke::new(1.0), Affine::IDENTITY, border, None, &field);

        let text_w = (g.input.width() - 24.0).max(20.0) as f32;
        let text_right = g.input.x1 - 12.0;
        if controls.draft.is_empty() {
            let (pw, ph) = self.placeholder.size(ctx);
            let origin = (text_right - pw, g.input.center().y - ph / 2.0);
            self.placeholder
                .draw(scene, origin, INK_MUTED.with_alpha(0.45 * enabled_alpha), ctx);
            if controls.focused && !controls.locked && elapsed.fract() < 0.5 {
                let caret = Rect::new(text_right - 1.0, origin.1, text_right + 0.5, origin.1 + ph);
                scene.fill(Fill::NonZero, Affine::IDENTITY, INK, None, &caret);
            }
        } else {
            let shown = draft_tail(&controls.draft);
            let (iw, ih) = self.input.fit(&shown, text_w, ctx);
            let origin = (text_right - iw, g.input.center().y - ih / 2.0);
            let ink = INK.with_alpha(enabled_alpha);
            self.input.draw(scene, origin, ink, ctx);
            if controls.focused && !controls.locked && elapsed.fract() < 0.5 {
                if let Some(caret) = self.input.caret(ctx) {
                    let caret = caret + Vec2::new(origin.0, origin.1);
                    scene.fill(Fill::NonZero, Affine::IDENTITY, INK, None, &caret);
                }
            }
        }

        // Send button
        let send = g.send.to_rounded_rect(14.0);
        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            self.accent.with_alpha(enabled_alpha),
            None,
            &send,
        );
        draw_centered(&mut self.send_label, scene, g.send, ON_ACCENT, ctx);
    }

    fn draw_launcher(&mut self, scene: &mut Scene) {
        let circle = self.geometry.launcher;
        let ctx = &mut self.ctx;
        let shadow = Circle::new(circle.center + Vec2::new(0.0, 4.0), circle.radius + 2.0);
        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            Color::new([0.008, 0.024, 0.090, 0.18]),
            None,
            &shadow,
        );

        match self.launcher {
            Launcher::Image { .. } => {
                scene.fill(Fill::NonZero, Affine::IDENTITY, self.accent, None, &circle);
                draw_centered(&mut self.launcher_label, scene, circle.bounding_box(), ON_ACCENT, ctx);
            }
            Launcher::Default => {
                scene.fill(Fill::NonZero, Affine::IDENTITY, PANEL_BG, None, &circle);
                // Speech bubble glyph
                let c = circle.center;
                let bubble = Rect::new(c.x - 14.0, c.y - 11.0, c.x + 14.0, c.y + 8.0);
                scene.fill(
                    Fill::NonZero,
                    Affine::IDENTITY,
                    self.accent,
                    None,
                    &bubble.to_rounded_rect(7.0),
                );
                let mut tail = BezPath::new();
                tail.move_to((c.x - 8.0, c.y + 6.0));
                tail.line_to((c.x - 11.0, c.y + 14.0));
                tail.line_to((c.x - 1.0, c.y + 7.0));
                tail.close_path();
                scene.fill(Fill::NonZero, Affine::IDENTITY, self.accent, None, &tail);
                draw_centered(&mut self.launcher_label, scene, bubble, ON_ACCENT, ctx);
            }
        }
        scene.stroke(&Stroke::new(1.0), Affine::IDENTITY, STROKE, None, &circle);
    }
}

fn draw_centered(block: &mut TextBlock, scene: &mut Scene, rect: Rect, color: Color, ctx: &mut ParleyCtx) {
    let (w, h) = block.size(ctx);
    let c = rect.center();
    block.draw(scene, (c.x - w / 2.0, c.y - h / 2.0), color, ctx);
}

fn draw_dots(scene: &mut Scene, origin: (f64, f64), clip: (f64, f64), elapsed: f64) {
    for i in 0..3 {
        let (dy, alpha) = dot_phase(elapsed, i);
        let cx = origin.0 + DOT_SIZE / 2.0 + i as f64 * (DOT_SIZE + DOT_GAP);
        let cy = origin.1 + 8.0 + dy;
        if cy < clip.0 || cy > clip.1 {
            continue;
        }
        scene.fill(
            Fill::NonZero,
            Affine::IDENTITY,
            INK_MUTED.with_alpha(0.45 * alpha),
            None,
            &Circle::new((cx, cy), DOT_SIZE / 2.0),
        );
    }
}

/// Characters of the draft shown in the single-line field.
const DRAFT_VISIBLE_CHARS: usize = 36;

/// The end of a long draft, so the caret stays in view.
fn draft_tail(draft: &str) -> String {
    let count = draft.chars().count();
    if count <= DRAFT_VISIBLE_CHARS {
        return draft.to_string();
    }
    let tail: String = draft.chars().skip(count - DRAFT_VISIBLE_CHARS + 1).collect();
    format!("…{tail}")
}

fn initial(s: &str) -> String {
    s.trim().chars().next().map(String::from).unwrap_or_default()
}
