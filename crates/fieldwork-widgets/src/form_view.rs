//! The form view: schema walk, focus ring, and per-kind input dispatch.
//!
//! `FormView` renders the engine's schema top to bottom: plain fields, then
//! each selector's chooser followed by its active branch's fields (rendered
//! with the same per-kind dispatch), then the submit row. Every field
//! reserves one line under its input for the error message, so resolving an
//! error never reflows the layout.
//!
//! `FormViewState` owns the purely visual state (focus, scroll, cursor,
//! dropdown highlight, geo query text); everything semantic lives in the
//! engine and is mutated only through its operations.

use fieldwork_core::{Buffer, Color, Event, KeyCode, KeyEvent, Rect, Style};
use fieldwork_engine::engine::FormEngine;
use fieldwork_engine::lookup::LocationResolver;
use fieldwork_engine::schema::{FieldDescriptor, FieldKind, SchemaNode};
use fieldwork_engine::value::FieldValue;

use crate::StatefulWidget;
use crate::geo::GeoQueryState;
use crate::line_edit::{LineEdit, width_before};

const SELECT_PLACEHOLDER: &str = "Select an option";
const SUBMIT_LABEL: &str = "[ Submit ]";

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// One focusable row of the rendered form.
#[derive(Debug, Clone)]
enum Row {
    Field(FieldDescriptor),
    Selector { label: String, options: Vec<String> },
    Submit,
}

/// The rows currently visible: schema order, with each selector followed by
/// its chosen branch's fields, and the submit row last.
fn build_rows(engine: &FormEngine) -> Vec<Row> {
    let mut rows = Vec::new();
    for node in engine.schema().nodes() {
        match node {
            SchemaNode::Field(field) => rows.push(Row::Field(field.clone())),
            SchemaNode::Selector(selector) => {
                rows.push(Row::Selector {
                    label: selector.label.clone(),
                    options: selector.options.clone(),
                });
                if let Some(option) = engine.selected_option(&selector.label) {
                    for field in selector.fields_for(option) {
                        rows.push(Row::Field(field.clone()));
                    }
                }
            }
        }
    }
    rows.push(Row::Submit);
    rows
}

fn row_height(row: &Row, engine: &FormEngine) -> usize {
    match row {
        Row::Field(field) => {
            let dropdown = if field.kind == FieldKind::MultiSelect
                && engine.is_dropdown_open(&field.key)
            {
                field.options.len()
            } else {
                0
            };
            // Label, input, reserved error line.
            3 + dropdown
        }
        Row::Selector { .. } => 2,
        Row::Submit => 2,
    }
}

// ---------------------------------------------------------------------------
// FormViewState
// ---------------------------------------------------------------------------

/// Mutable view state for a `FormView`.
#[derive(Debug, Clone, Default)]
pub struct FormViewState {
    focused: usize,
    scroll: usize,
    edit: LineEdit,
    highlight: usize,
    geo: GeoQueryState,
}

impl FormViewState {
    /// Create view state with the given geo query driver.
    #[must_use]
    pub fn new(geo: GeoQueryState) -> Self {
        Self {
            geo,
            ..Self::default()
        }
    }

    /// The focused row index.
    #[must_use]
    pub const fn focused(&self) -> usize {
        self.focused
    }

    /// The geo query driver.
    #[must_use]
    pub fn geo(&self) -> &GeoQueryState {
        &self.geo
    }

    /// The geo query driver, mutably.
    pub fn geo_mut(&mut self) -> &mut GeoQueryState {
        &mut self.geo
    }

    /// Forward applied lookup resolutions so resolved queries clear their
    /// visible text (unless configured to keep it).
    pub fn notify_applied(&mut self, keys: &[String]) {
        self.geo.notify_applied(keys);
    }

    /// Handle an input event. Returns `true` if engine or view state
    /// changed.
    pub fn handle_event(
        &mut self,
        engine: &mut FormEngine,
        resolver: &mut dyn LocationResolver,
        event: &Event,
    ) -> bool {
        #[cfg(feature = "tracing")]
        let _span = tracing::trace_span!("form_view_event").entered();

        match event {
            Event::Tick => self.geo.tick(engine, resolver) > 0,
            Event::Key(key) if key.is_input() => self.handle_key(engine, resolver, key),
            Event::Paste(text) => self.handle_paste(engine, text),
            _ => false,
        }
    }

    fn handle_key(
        &mut self,
        engine: &mut FormEngine,
        resolver: &mut dyn LocationResolver,
        key: &KeyEvent,
    ) -> bool {
        let rows = build_rows(engine);
        if rows.is_empty() {
            return false;
        }
        self.focused = self.focused.min(rows.len() - 1);

        match key.code {
            KeyCode::Tab => return self.focus_move(engine, true),
            KeyCode::BackTab => return self.focus_move(engine, false),
            _ => {}
        }

        match rows[self.focused].clone() {
            Row::Submit => self.handle_submit_key(engine, key),
            Row::Selector { label, options } => {
                self.handle_selector_key(engine, &label, &options, key)
            }
            Row::Field(field) => match field.kind {
                FieldKind::Text | FieldKind::Email | FieldKind::Number | FieldKind::Date => {
                    self.handle_text_key(engine, &field, key)
                }
                FieldKind::Boolean => self.handle_boolean_key(engine, &field, key),
                FieldKind::SingleSelect => self.handle_single_select_key(engine, &field, key),
                FieldKind::MultiSelect => self.handle_multi_select_key(engine, &field, key),
                FieldKind::GeoPoint => self.handle_geo_key(engine, resolver, &field, key),
            },
        }
    }

    // -- Focus ring --

    fn focus_move(&mut self, engine: &mut FormEngine, forward: bool) -> bool {
        self.leave_focus(engine);
        let count = build_rows(engine).len();
        if count == 0 {
            return false;
        }
        self.focused = if forward {
            (self.focused + 1) % count
        } else {
            (self.focused + count - 1) % count
        };
        self.enter_focus(engine);
        true
    }

    /// Leaving a field blurs it, surfacing deferred validation; an open
    /// dropdown closes.
    fn leave_focus(&mut self, engine: &mut FormEngine) {
        let rows = build_rows(engine);
        if let Some(Row::Field(field)) = rows.get(self.focused).cloned() {
            engine.blur(&field.key);
            if field.kind == FieldKind::MultiSelect && engine.is_dropdown_open(&field.key) {
                engine.toggle_dropdown(&field.key);
            }
        }
    }

    fn enter_focus(&mut self, engine: &FormEngine) {
        self.highlight = 0;
        match build_rows(engine).get(self.focused) {
            Some(Row::Field(field)) => {
                let text = self.editable_text(engine, field);
                self.edit.end(&text);
            }
            _ => self.edit.home(),
        }
    }

    fn editable_text(&self, engine: &FormEngine, field: &FieldDescriptor) -> String {
        match field.kind {
            FieldKind::GeoPoint => self.geo.text(&field.key).to_string(),
            _ => engine.value(&field.key).edit_text(),
        }
    }

    // -- Per-row key behavior --

    fn handle_submit_key(&mut self, engine: &mut FormEngine, key: &KeyEvent) -> bool {
        match key.code {
            KeyCode::Enter => {
                engine.submit();
                true
            }
            KeyCode::Down => self.focus_move(engine, true),
            KeyCode::Up => self.focus_move(engine, false),
            _ => false,
        }
    }

    fn handle_selector_key(
        &mut self,
        engine: &mut FormEngine,
        label: &str,
        options: &[String],
        key: &KeyEvent,
    ) -> bool {
        match key.code {
            KeyCode::Down | KeyCode::Right => {
                cycle_selector(engine, label, options, true);
                true
            }
            KeyCode::Up | KeyCode::Left => {
                cycle_selector(engine, label, options, false);
                true
            }
            KeyCode::Enter => self.focus_move(engine, true),
            _ => false,
        }
    }

    fn handle_text_key(
        &mut self,
        engine: &mut FormEngine,
        field: &FieldDescriptor,
        key: &KeyEvent,
    ) -> bool {
        let text = engine.value(&field.key).edit_text();
        match key.code {
            KeyCode::Char('u') if key.ctrl() => {
                engine.clear(&field.key);
                self.edit.home();
                true
            }
            KeyCode::Char(c) if !key.ctrl() => {
                let edited = self.edit.insert(&text, c);
                engine.set_value(&field.key, &edited);
                // The engine may have truncated or rejected the edit.
                self.edit.clamp(&engine.value(&field.key).edit_text());
                true
            }
            KeyCode::Backspace => {
                if let Some(edited) = self.edit.backspace(&text) {
                    engine.set_value(&field.key, &edited);
                    self.edit.clamp(&engine.value(&field.key).edit_text());
                }
                true
            }
            KeyCode::Delete => {
                if let Some(edited) = self.edit.delete(&text) {
                    engine.set_value(&field.key, &edited);
                    self.edit.clamp(&engine.value(&field.key).edit_text());
                }
                true
            }
            KeyCode::Left => self.edit.left(),
            KeyCode::Right => self.edit.right(&text),
            KeyCode::Home => {
                self.edit.home();
                true
            }
            KeyCode::End => {
                self.edit.end(&text);
                true
            }
            KeyCode::Enter | KeyCode::Down => self.focus_move(engine, true),
            KeyCode::Up => self.focus_move(engine, false),
            _ => false,
        }
    }

    fn handle_boolean_key(
        &mut self,
        engine: &mut FormEngine,
        field: &FieldDescriptor,
        key: &KeyEvent,
    ) -> bool {
        match key.code {
            KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
                let next = match engine.value(&field.key) {
                    FieldValue::Bool(true) => "false",
                    _ => "true",
                };
                engine.set_value(&field.key, next)
            }
            KeyCode::Enter | KeyCode::Down => self.focus_move(engine, true),
            KeyCode::Up => self.focus_move(engine, false),
            _ => false,
        }
    }

    fn handle_single_select_key(
        &mut self,
        engine: &mut FormEngine,
        field: &FieldDescriptor,
        key: &KeyEvent,
    ) -> bool {
        let forward = match key.code {
            KeyCode::Down | KeyCode::Right => true,
            KeyCode::Up | KeyCode::Left => false,
            KeyCode::Enter => return self.focus_move(engine, true),
            _ => return false,
        };
        if field.options.is_empty() {
            return false;
        }
        let current = match engine.value(&field.key) {
            FieldValue::Code(code) => field.options.iter().position(|o| &o.code == code),
            _ => None,
        };
        let next = match (current, forward) {
            (None, true) => 0,
            (None, false) => field.options.len() - 1,
            (Some(i), true) => (i + 1) % field.options.len(),
            (Some(i), false) => (i + field.options.len() - 1) % field.options.len(),
        };
        let code = field.options[next].code.clone();
        engine.set_value(&field.key, &code)
    }

    fn handle_multi_select_key(
        &mut self,
        engine: &mut FormEngine,
        field: &FieldDescriptor,
        key: &KeyEvent,
    ) -> bool {
        if engine.is_dropdown_open(&field.key) {
            match key.code {
                KeyCode::Up => {
                    self.highlight = self.highlight.saturating_sub(1);
                    true
                }
                KeyCode::Down => {
                    if self.highlight + 1 < field.options.len() {
                        self.highlight += 1;
                    }
                    true
                }
                KeyCode::Char(' ') => {
                    if let Some(option) = field.options.get(self.highlight) {
                        let code = option.code.clone();
                        engine.set_value(&field.key, &code);
                    }
                    true
                }
                KeyCode::Enter | KeyCode::Escape => {
                    engine.toggle_dropdown(&field.key);
                    true
                }
                _ => false,
            }
        } else {
            match key.code {
                KeyCode::Enter | KeyCode::Char(' ') => {
                    self.highlight = 0;
                    engine.toggle_dropdown(&field.key);
                    true
                }
                KeyCode::Down => self.focus_move(engine, true),
                KeyCode::Up => self.focus_move(engine, false),
                _ => false,
            }
        }
    }

    fn handle_geo_key(
        &mut self,
        engine: &mut FormEngine,
        resolver: &mut dyn LocationResolver,
        field: &FieldDescriptor,
        key: &KeyEvent,
    ) -> bool {
        let text = self.geo.text(&field.key).to_string();
        match key.code {
            KeyCode::Char('u') if key.ctrl() => {
                self.geo.clear(&field.key);
                engine.clear(&field.key);
                self.edit.home();
                true
            }
            KeyCode::Char(c) if !key.ctrl() => {
                let edited = self.edit.insert(&text, c);
                self.geo.set_text(&field.key, edited);
                true
            }
            KeyCode::Backspace => {
                if let Some(edited) = self.edit.backspace(&text) {
                    self.geo.set_text(&field.key, edited);
                }
                true
            }
            KeyCode::Delete => {
                if let Some(edited) = self.edit.delete(&text) {
                    self.geo.set_text(&field.key, edited);
                }
                true
            }
            KeyCode::Left => self.edit.left(),
            KeyCode::Right => self.edit.right(&text),
            KeyCode::Home => {
                self.edit.home();
                true
            }
            KeyCode::End => {
                self.edit.end(&text);
                true
            }
            KeyCode::Enter => {
                self.geo.flush(&field.key, engine, resolver);
                true
            }
            KeyCode::Down => self.focus_move(engine, true),
            KeyCode::Up => self.focus_move(engine, false),
            _ => false,
        }
    }

    fn handle_paste(&mut self, engine: &mut FormEngine, pasted: &str) -> bool {
        let rows = build_rows(engine);
        if rows.is_empty() {
            return false;
        }
        self.focused = self.focused.min(rows.len() - 1);
        let Row::Field(field) = rows[self.focused].clone() else {
            return false;
        };
        match field.kind {
            FieldKind::Text | FieldKind::Email | FieldKind::Number | FieldKind::Date => {
                let text = engine.value(&field.key).edit_text();
                let edited = self.edit.insert_str(&text, pasted);
                engine.set_value(&field.key, &edited);
                self.edit.clamp(&engine.value(&field.key).edit_text());
                true
            }
            FieldKind::GeoPoint => {
                let text = self.geo.text(&field.key).to_string();
                let edited = self.edit.insert_str(&text, pasted);
                self.geo.set_text(&field.key, edited);
                true
            }
            _ => false,
        }
    }
}

fn cycle_selector(engine: &mut FormEngine, label: &str, options: &[String], forward: bool) {
    if options.is_empty() {
        return;
    }
    let current = engine
        .selected_option(label)
        .and_then(|chosen| options.iter().position(|o| o == chosen));
    let next = match (current, forward) {
        (None, true) => 0,
        (None, false) => options.len() - 1,
        (Some(i), true) => (i + 1) % options.len(),
        (Some(i), false) => (i + options.len() - 1) % options.len(),
    };
    engine.select_option(label, &options[next]);
}

// ---------------------------------------------------------------------------
// FormView
// ---------------------------------------------------------------------------

/// The form widget. Holds a borrow of the engine plus render styles;
/// construct one per frame.
pub struct FormView<'a> {
    engine: &'a FormEngine,
    label_style: Style,
    value_style: Style,
    placeholder_style: Style,
    error_style: Style,
    focused_style: Style,
    counter_style: Style,
}

impl<'a> FormView<'a> {
    /// Create a view over the engine with default styles.
    #[must_use]
    pub fn new(engine: &'a FormEngine) -> Self {
        Self {
            engine,
            label_style: Style::new(),
            value_style: Style::new(),
            placeholder_style: Style::new().dim(),
            error_style: Style::new().fg(Color::Red),
            focused_style: Style::new().bold(),
            counter_style: Style::new().dim(),
        }
    }

    /// Set the label style (builder).
    #[must_use]
    pub fn label_style(mut self, style: Style) -> Self {
        self.label_style = style;
        self
    }

    /// Set the value style (builder).
    #[must_use]
    pub fn value_style(mut self, style: Style) -> Self {
        self.value_style = style;
        self
    }

    /// Set the placeholder style (builder).
    #[must_use]
    pub fn placeholder_style(mut self, style: Style) -> Self {
        self.placeholder_style = style;
        self
    }

    /// Set the error message style (builder).
    #[must_use]
    pub fn error_style(mut self, style: Style) -> Self {
        self.error_style = style;
        self
    }

    /// Set the focused row style (builder).
    #[must_use]
    pub fn focused_style(mut self, style: Style) -> Self {
        self.focused_style = style;
        self
    }

    /// Set the character counter style (builder).
    #[must_use]
    pub fn counter_style(mut self, style: Style) -> Self {
        self.counter_style = style;
        self
    }
}

fn line_y(global: usize, scroll: usize, area: Rect) -> Option<u16> {
    if global < scroll {
        return None;
    }
    let rel = global - scroll;
    if rel >= area.height as usize {
        return None;
    }
    Some(area.y.saturating_add(rel as u16))
}

impl StatefulWidget for FormView<'_> {
    type State = FormViewState;

    fn render(&self, area: Rect, buf: &mut Buffer, state: &mut Self::State) {
        if area.is_empty() {
            return;
        }
        let rows = build_rows(self.engine);
        if rows.is_empty() {
            return;
        }
        state.focused = state.focused.min(rows.len() - 1);

        let heights: Vec<usize> = rows.iter().map(|r| row_height(r, self.engine)).collect();
        let mut starts = Vec::with_capacity(rows.len());
        let mut total = 0usize;
        for h in &heights {
            starts.push(total);
            total += h;
        }

        // Keep the focused row fully visible.
        let viewport = area.height as usize;
        let focus_start = starts[state.focused];
        let focus_end = focus_start + heights[state.focused];
        if focus_start < state.scroll {
            state.scroll = focus_start;
        } else if focus_end > state.scroll + viewport {
            state.scroll = focus_end.saturating_sub(viewport);
        }
        state.scroll = state.scroll.min(total.saturating_sub(viewport));

        let scroll = state.scroll;
        for (i, row) in rows.iter().enumerate() {
            self.render_row(row, i == state.focused, starts[i], scroll, area, buf, state);
        }
    }
}

impl FormView<'_> {
    #[allow(clippy::too_many_arguments)]
    fn render_row(
        &self,
        row: &Row,
        focused: bool,
        start: usize,
        scroll: usize,
        area: Rect,
        buf: &mut Buffer,
        state: &FormViewState,
    ) {
        match row {
            Row::Field(field) => self.render_field(field, focused, start, scroll, area, buf, state),
            Row::Selector { label, options: _ } => {
                if let Some(y) = line_y(start, scroll, area) {
                    let style = if focused {
                        self.focused_style
                    } else {
                        self.label_style
                    };
                    buf.set_string(area.x, y, label, style, area.right());
                }
                if let Some(y) = line_y(start + 1, scroll, area) {
                    let chosen = self.engine.selected_option(label);
                    let (text, mut style) = match chosen {
                        Some(option) => (option.to_string(), self.value_style),
                        None => (SELECT_PLACEHOLDER.to_string(), self.placeholder_style),
                    };
                    let display = if focused {
                        format!("< {text} >")
                    } else {
                        format!("  {text}")
                    };
                    if focused {
                        style = style.patch(self.focused_style);
                    }
                    buf.set_string(area.x, y, &display, style, area.right());
                }
            }
            Row::Submit => {
                if let Some(y) = line_y(start + 1, scroll, area) {
                    let mut style = if self.engine.is_submittable() {
                        self.value_style
                    } else {
                        self.placeholder_style
                    };
                    if focused {
                        style = style.patch(Style::new().reverse());
                    }
                    buf.set_string(area.x, y, SUBMIT_LABEL, style, area.right());
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn render_field(
        &self,
        field: &FieldDescriptor,
        focused: bool,
        start: usize,
        scroll: usize,
        area: Rect,
        buf: &mut Buffer,
        state: &FormViewState,
    ) {
        // Label line, with the required marker.
        if let Some(y) = line_y(start, scroll, area) {
            let style = if focused {
                self.focused_style
            } else {
                self.label_style
            };
            let mut label = field.label.clone();
            if field.required {
                label.push_str(" *");
            }
            buf.set_string(area.x, y, &label, style, area.right());
        }

        // Input line.
        if let Some(y) = line_y(start + 1, scroll, area) {
            self.render_input(field, focused, y, area, buf, state);
        }

        // Dropdown option lines (multi-select, expanded).
        let mut dropdown = 0;
        if field.kind == FieldKind::MultiSelect && self.engine.is_dropdown_open(&field.key) {
            dropdown = field.options.len();
            let chosen = self.engine.value(&field.key).codes();
            for (j, option) in field.options.iter().enumerate() {
                if let Some(y) = line_y(start + 2 + j, scroll, area) {
                    let mark = if chosen.iter().any(|c| c == &option.code) {
                        "[x] "
                    } else {
                        "[ ] "
                    };
                    let mut style = self.value_style;
                    if focused && j == state.highlight {
                        style = style.patch(Style::new().reverse());
                    }
                    let text = format!("{mark}{}", option.name);
                    buf.set_string(area.x.saturating_add(2), y, &text, style, area.right());
                }
            }
        }

        // The reserved error line: the message, or nothing (layout space
        // is held either way).
        if let Some(y) = line_y(start + 2 + dropdown, scroll, area)
            && let Some(message) = self.engine.error_message(&field.key)
        {
            buf.set_string(area.x, y, &message, self.error_style, area.right());
        }
    }

    fn render_input(
        &self,
        field: &FieldDescriptor,
        focused: bool,
        y: u16,
        area: Rect,
        buf: &mut Buffer,
        state: &FormViewState,
    ) {
        match field.kind {
            FieldKind::Text | FieldKind::Email | FieldKind::Number | FieldKind::Date => {
                let text = self.engine.value(&field.key).edit_text();
                let limit = self.draw_counter(field, y, area, buf);
                self.draw_text_line(&text, field.placeholder.as_deref(), focused, y, area, buf, state, limit);
            }
            FieldKind::Boolean => {
                let (yes, no) = match self.engine.value(&field.key) {
                    FieldValue::Bool(true) => ("(x)", "( )"),
                    FieldValue::Bool(false) => ("( )", "(x)"),
                    _ => ("( )", "( )"),
                };
                let style = if focused {
                    self.value_style.patch(self.focused_style)
                } else {
                    self.value_style
                };
                let text = format!("{yes} Yes   {no} No");
                buf.set_string(area.x, y, &text, style, area.right());
            }
            FieldKind::SingleSelect => {
                let (name, mut style) = match self.engine.value(&field.key) {
                    FieldValue::Code(code) => (
                        field.option_name(code).unwrap_or(code).to_string(),
                        self.value_style,
                    ),
                    _ => (
                        field
                            .placeholder
                            .clone()
                            .unwrap_or_else(|| SELECT_PLACEHOLDER.to_string()),
                        self.placeholder_style,
                    ),
                };
                let display = if focused {
                    format!("< {name} >")
                } else {
                    format!("  {name}")
                };
                if focused {
                    style = style.patch(self.focused_style);
                }
                buf.set_string(area.x, y, &display, style, area.right());
            }
            FieldKind::MultiSelect => {
                let codes = self.engine.value(&field.key).codes();
                let (summary, style) = if codes.is_empty() {
                    (
                        field
                            .placeholder
                            .clone()
                            .unwrap_or_else(|| SELECT_PLACEHOLDER.to_string()),
                        self.placeholder_style,
                    )
                } else {
                    let names: Vec<&str> = codes
                        .iter()
                        .map(|code| field.option_name(code).unwrap_or(code.as_str()))
                        .collect();
                    (names.join(", "), self.value_style)
                };
                let marker = if self.engine.is_dropdown_open(&field.key) {
                    " ▴"
                } else {
                    " ▾"
                };
                let text = format!("{summary}{marker}");
                let style = if focused {
                    style.patch(self.focused_style)
                } else {
                    style
                };
                buf.set_string(area.x, y, &text, style, area.right());
            }
            FieldKind::GeoPoint => {
                let query = state.geo.text(&field.key);
                if query.is_empty()
                    && let Some(location) = self.engine.value(&field.key).location()
                {
                    buf.set_string(
                        area.x,
                        y,
                        &location.formatted_address,
                        self.value_style,
                        area.right(),
                    );
                    return;
                }
                self.draw_text_line(
                    query,
                    field.placeholder.as_deref(),
                    focused,
                    y,
                    area,
                    buf,
                    state,
                    area.right(),
                );
            }
        }
    }

    /// Draw the `n/max` counter right-aligned, returning the clip column
    /// for the value text.
    fn draw_counter(&self, field: &FieldDescriptor, y: u16, area: Rect, buf: &mut Buffer) -> u16 {
        let Some(max) = field.max_length else {
            return area.right();
        };
        let counter = format!("{}/{}", self.engine.char_count(&field.key), max);
        let width = counter.len() as u16;
        if area.width <= width + 1 {
            return area.right();
        }
        let x = area.right() - width;
        buf.set_string(x, y, &counter, self.counter_style, area.right());
        x - 1
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_text_line(
        &self,
        text: &str,
        placeholder: Option<&str>,
        focused: bool,
        y: u16,
        area: Rect,
        buf: &mut Buffer,
        state: &FormViewState,
        limit: u16,
    ) {
        if text.is_empty() {
            if let Some(ph) = placeholder {
                buf.set_string(area.x, y, ph, self.placeholder_style, limit);
            }
        } else {
            buf.set_string(area.x, y, text, self.value_style, limit);
        }
        if focused {
            let col = width_before(text, state.edit.cursor()) as u16;
            let x = area.x.saturating_add(col);
            if x < limit
                && let Some(cell) = buf.get_mut(x, y)
            {
                cell.style = cell.style.patch(Style::new().reverse());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use fieldwork_engine::lookup::{LookupConfig, LookupReply};
    use fieldwork_engine::schema::{ChoiceOption, Schema, SelectorDescriptor};
    use fieldwork_engine::value::GeoLocation;
    use fieldwork_core::Modifiers;

    fn schema() -> Schema {
        Schema::new(vec![
            SchemaNode::Field(
                FieldDescriptor::text("bio", "Bio")
                    .required()
                    .max_length(5)
                    .placeholder("About you"),
            ),
            SchemaNode::Field(FieldDescriptor::boolean("subscribed", "Subscribed")),
            SchemaNode::Field(FieldDescriptor::single_select(
                "country",
                "Country",
                vec![
                    ChoiceOption::new("Argentina", "ar"),
                    ChoiceOption::new("Uruguay", "uy"),
                ],
            )),
            SchemaNode::Field(FieldDescriptor::multi_select(
                "interests",
                "Interests",
                vec![
                    ChoiceOption::new("Music", "music"),
                    ChoiceOption::new("Tech", "tech"),
                ],
            )),
            SchemaNode::Field(FieldDescriptor::geo_point("home", "Home")),
            SchemaNode::Selector(SelectorDescriptor::new(
                "Has website?",
                vec![
                    (
                        "Yes".to_string(),
                        vec![FieldDescriptor::text("link", "Link").required()],
                    ),
                    ("No".to_string(), vec![]),
                ],
            )),
        ])
        .unwrap()
    }

    #[derive(Default)]
    struct NullResolver {
        queries: Vec<String>,
        replies: Vec<LookupReply>,
    }

    impl LocationResolver for NullResolver {
        fn resolve(&mut self, query: &str, reply: LookupReply) {
            self.queries.push(query.to_string());
            self.replies.push(reply);
        }
    }

    fn location(address: &str) -> GeoLocation {
        GeoLocation {
            latitude: 1.0,
            longitude: 2.0,
            formatted_address: address.to_string(),
            city: None,
            state: None,
            country: None,
            postal_code: None,
            street_and_number: None,
            geohash: "s00".to_string(),
        }
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent::new(code))
    }

    fn ctrl(c: char) -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char(c)).with_modifiers(Modifiers::CTRL))
    }

    fn type_str(
        state: &mut FormViewState,
        engine: &mut FormEngine,
        resolver: &mut NullResolver,
        text: &str,
    ) {
        for c in text.chars() {
            state.handle_event(engine, resolver, &key(KeyCode::Char(c)));
        }
    }

    fn setup() -> (FormEngine, FormViewState, NullResolver) {
        (
            FormEngine::new(schema()),
            FormViewState::default(),
            NullResolver::default(),
        )
    }

    // -- Editing --

    #[test]
    fn typing_feeds_the_engine_with_truncation() {
        let (mut engine, mut state, mut resolver) = setup();
        type_str(&mut state, &mut engine, &mut resolver, "abcdefgh");
        assert_eq!(engine.value("bio"), &FieldValue::Text("abcde".to_string()));
        assert_eq!(engine.char_count("bio"), 5);
    }

    #[test]
    fn ctrl_u_clears_the_focused_field() {
        let (mut engine, mut state, mut resolver) = setup();
        type_str(&mut state, &mut engine, &mut resolver, "abc");
        state.handle_event(&mut engine, &mut resolver, &ctrl('u'));
        assert_eq!(engine.value("bio"), &FieldValue::Empty);
        assert_eq!(engine.char_count("bio"), 0);
    }

    #[test]
    fn backspace_edits_mid_line() {
        let (mut engine, mut state, mut resolver) = setup();
        type_str(&mut state, &mut engine, &mut resolver, "abc");
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Left));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Backspace));
        assert_eq!(engine.value("bio"), &FieldValue::Text("ac".to_string()));
    }

    #[test]
    fn paste_inserts_at_cursor() {
        let (mut engine, mut state, mut resolver) = setup();
        state.handle_event(&mut engine, &mut resolver, &Event::Paste("hello".to_string()));
        // Clipped to the field's max length by the engine.
        assert_eq!(engine.value("bio"), &FieldValue::Text("hello".to_string()));
    }

    // -- Focus and blur --

    #[test]
    fn tab_blurs_and_surfaces_required_error() {
        let (mut engine, mut state, mut resolver) = setup();
        assert!(engine.error("bio").is_none());
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        assert_eq!(state.focused(), 1);
        assert_eq!(
            engine.error_message("bio").as_deref(),
            Some("Bio is required.")
        );
    }

    #[test]
    fn focus_wraps_and_backtab_reverses() {
        let (mut engine, mut state, mut resolver) = setup();
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::BackTab));
        // Rows: five fields, one selector, submit.
        assert_eq!(state.focused(), 6);
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        assert_eq!(state.focused(), 0);
    }

    // -- Boolean and selects --

    #[test]
    fn boolean_space_toggles_both_ways() {
        let (mut engine, mut state, mut resolver) = setup();
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Char(' ')));
        assert_eq!(engine.value("subscribed"), &FieldValue::Bool(true));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Char(' ')));
        assert_eq!(engine.value("subscribed"), &FieldValue::Bool(false));
    }

    #[test]
    fn single_select_cycles_codes() {
        let (mut engine, mut state, mut resolver) = setup();
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Down));
        assert_eq!(engine.value("country"), &FieldValue::Code("ar".to_string()));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Down));
        assert_eq!(engine.value("country"), &FieldValue::Code("uy".to_string()));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Up));
        assert_eq!(engine.value("country"), &FieldValue::Code("ar".to_string()));
    }

    #[test]
    fn multi_select_dropdown_toggle_flow() {
        let (mut engine, mut state, mut resolver) = setup();
        for _ in 0..3 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        // Open, pick the second option, close.
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        assert!(engine.is_dropdown_open("interests"));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Down));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Char(' ')));
        assert_eq!(
            engine.value("interests"),
            &FieldValue::Selection(vec!["tech".to_string()])
        );
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Escape));
        assert!(!engine.is_dropdown_open("interests"));

        // Tabbing away from an open dropdown closes it.
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        assert!(!engine.is_dropdown_open("interests"));
    }

    // -- Selector --

    #[test]
    fn selector_choice_inserts_branch_rows() {
        let (mut engine, mut state, mut resolver) = setup();
        for _ in 0..5 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        // Cycle to "Yes": the branch's link field appears after the
        // selector row.
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Down));
        assert_eq!(engine.selected_option("Has website?"), Some("Yes"));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        type_str(&mut state, &mut engine, &mut resolver, "x");
        assert_eq!(engine.value("link"), &FieldValue::Text("x".to_string()));
    }

    // -- Submit row --

    #[test]
    fn enter_on_submit_row_submits_only_when_valid() {
        let submitted = std::rc::Rc::new(std::cell::RefCell::new(0));
        let count = std::rc::Rc::clone(&submitted);
        let mut engine = FormEngine::new(schema()).with_submit(move |_| {
            *count.borrow_mut() += 1;
        });
        let mut state = FormViewState::default();
        let mut resolver = NullResolver::default();

        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::BackTab));
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        assert_eq!(*submitted.borrow(), 0);

        engine.set_value("bio", "hi");
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        assert_eq!(*submitted.borrow(), 1);
    }

    // -- Geo --

    #[test]
    fn geo_typing_debounces_then_resolves_and_clears_query() {
        let (mut engine, mut state, mut resolver) = setup();
        let sink = state.geo().sink().clone();
        let debounce = LookupConfig::default().debounce_ticks;

        for _ in 0..4 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        type_str(&mut state, &mut engine, &mut resolver, "La Plata");
        assert!(resolver.queries.is_empty());

        for _ in 0..debounce {
            state.handle_event(&mut engine, &mut resolver, &Event::Tick);
        }
        assert_eq!(resolver.queries, vec!["La Plata".to_string()]);

        resolver.replies.pop().unwrap().fulfill(location("La Plata, Argentina"));
        let applied = sink.drain_into(&mut engine);
        state.notify_applied(&applied);

        assert_eq!(
            engine.value("home").location().unwrap().formatted_address,
            "La Plata, Argentina"
        );
        assert_eq!(state.geo().text("home"), "");
    }

    #[test]
    fn geo_stale_reply_is_dropped() {
        let (mut engine, mut state, mut resolver) = setup();
        let sink = state.geo().sink().clone();

        for _ in 0..4 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        type_str(&mut state, &mut engine, &mut resolver, "A");
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        type_str(&mut state, &mut engine, &mut resolver, "B");
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        assert_eq!(resolver.queries, vec!["A".to_string(), "AB".to_string()]);

        // Newest resolves first; the older reply must not overwrite it.
        let stale = resolver.replies.remove(0);
        let fresh = resolver.replies.remove(0);
        fresh.fulfill(location("AB town"));
        stale.fulfill(location("A ville"));
        state.notify_applied(&sink.drain_into(&mut engine));

        assert_eq!(
            engine.value("home").location().unwrap().formatted_address,
            "AB town"
        );
    }

    // -- Rendering --

    #[test]
    fn renders_labels_values_counter_and_reserved_error_line() {
        let (mut engine, mut state, mut resolver) = setup();
        type_str(&mut state, &mut engine, &mut resolver, "hi");

        let mut buf = Buffer::new(40, 30);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);

        assert_eq!(buf.row_text(0), "Bio *");
        assert!(buf.row_text(1).starts_with("hi"));
        assert!(buf.row_text(1).ends_with("2/5"));
        // Reserved error line stays blank while the field has no error.
        assert_eq!(buf.row_text(2), "");
        assert_eq!(buf.row_text(3), "Subscribed");
        assert_eq!(buf.row_text(4), "( ) Yes   ( ) No");
    }

    #[test]
    fn renders_error_message_after_blur() {
        let (mut engine, mut state, mut resolver) = setup();
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));

        let mut buf = Buffer::new(40, 30);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(2), "Bio is required.");
    }

    #[test]
    fn renders_placeholder_when_empty() {
        let (engine, mut state) = (FormEngine::new(schema()), FormViewState::default());
        let mut buf = Buffer::new(40, 30);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert!(buf.row_text(1).starts_with("About you"));
    }

    #[test]
    fn renders_multi_select_summary_and_dropdown() {
        let (mut engine, mut state, mut resolver) = setup();
        engine.set_value("interests", "music");
        engine.set_value("interests", "tech");

        let mut buf = Buffer::new(40, 40);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(10), "Music, Tech ▾");

        // Open the dropdown: option lines appear with selection marks.
        for _ in 0..3 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        let mut buf = Buffer::new(40, 40);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(11), "  [x] Music");
        assert_eq!(buf.row_text(12), "  [x] Tech");
    }

    #[test]
    fn renders_selector_and_submit_row() {
        let (mut engine, mut state, _resolver) = setup();
        let mut buf = Buffer::new(40, 40);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(15), "Has website?");
        assert!(buf.row_text(16).contains(SELECT_PLACEHOLDER));
        assert_eq!(buf.row_text(18), SUBMIT_LABEL);

        // Choosing "Yes" inserts the branch field before the submit row.
        engine.select_option("Has website?", "Yes");
        let mut buf = Buffer::new(40, 40);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(17), "Link *");
    }

    #[test]
    fn scrolls_to_keep_focus_visible() {
        let (mut engine, mut state, mut resolver) = setup();
        // Focus the submit row with a viewport much smaller than the form.
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::BackTab));
        let mut buf = Buffer::new(40, 6);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        let rendered: Vec<String> = (0..6).map(|y| buf.row_text(y)).collect();
        assert!(rendered.iter().any(|line| line == SUBMIT_LABEL));
    }

    #[test]
    fn geo_renders_resolved_address_once_query_clears() {
        let (mut engine, mut state, mut resolver) = setup();
        let sink = state.geo().sink().clone();
        for _ in 0..4 {
            state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Tab));
        }
        type_str(&mut state, &mut engine, &mut resolver, "x");
        state.handle_event(&mut engine, &mut resolver, &key(KeyCode::Enter));
        resolver.replies.pop().unwrap().fulfill(location("Somewhere 123"));
        state.notify_applied(&sink.drain_into(&mut engine));

        let mut buf = Buffer::new(40, 30);
        FormView::new(&engine).render(buf.area(), &mut buf, &mut state);
        assert_eq!(buf.row_text(13), "Somewhere 123");
    }
}
