//! Append-only log view fed from drained relay batches.

use temoa_core::LogEvent;

/// Default number of rows visible at once.
pub const DEFAULT_VIEWPORT_ROWS: usize = 40;

/// Scrollback buffer for the interactive log.
///
/// Lines are only ever appended. While `follow` is set (the default) every
/// append scrolls to the newest line; scrolling up turns it off and
/// returning to the bottom turns it back on.
#[derive(Debug, Clone)]
pub struct LogView {
    lines: Vec<String>,
    viewport_rows: usize,
    top: usize,
    follow: bool,
}

impl LogView {
    pub fn new(viewport_rows: usize) -> Self {
        Self {
            lines: Vec::new(),
            viewport_rows: viewport_rows.max(1),
            top: 0,
            follow: true,
        }
    }

    /// Append a drained batch. Returns the number of lines added.
    pub fn append_events<'a>(&mut self, events: impl IntoIterator<Item = &'a LogEvent>) -> usize {
        let before = self.lines.len();
        for event in events {
            self.push_lines(&event.render());
        }
        self.after_append();
        self.lines.len() - before
    }

    /// Append free text (may contain several lines).
    pub fn append_text(&mut self, text: &str) -> usize {
        let before = self.lines.len();
        self.push_lines(text);
        self.after_append();
        self.lines.len() - before
    }

    fn push_lines(&mut self, text: &str) {
        if text.is_empty() {
            self.lines.push(String::new());
            return;
        }
        self.lines.extend(text.lines().map(str::to_owned));
    }

    fn after_append(&mut self) {
        if self.follow {
            self.scroll_to_bottom();
        }
    }

    pub fn scroll_to_bottom(&mut self) {
        self.top = self.bottom_top();
        self.follow = true;
    }

    pub fn scroll_up(&mut self, rows: usize) {
        self.top = self.top.saturating_sub(rows);
        self.follow = self.top == self.bottom_top();
    }

    pub fn scroll_down(&mut self, rows: usize) {
        self.top = (self.top + rows).min(self.bottom_top());
        self.follow = self.top == self.bottom_top();
    }

    fn bottom_top(&self) -> usize {
        self.lines.len().saturating_sub(self.viewport_rows)
    }

    /// Lines currently in the viewport.
    pub fn visible(&self) -> &[String] {
        let end = (self.top + self.viewport_rows).min(self.lines.len());
        &self.lines[self.top..end]
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn is_following(&self) -> bool {
        self.follow
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for LogView {
    fn default() -> Self {
        Self::new(DEFAULT_VIEWPORT_ROWS)
    }
}

#[cfg(test)]
mod tests {
    use temoa_core::LogLevel;

    use super::*;

    fn numbered(n: usize) -> Vec<LogEvent> {
        (0..n).map(|i| LogEvent::stdout(format!("line {i}"))).collect()
    }

    #[test]
    fn appends_never_overwrite_earlier_lines() {
        let mut view = LogView::new(3);
        view.append_events(&numbered(2));
        let snapshot: Vec<String> = view.lines().to_vec();

        view.append_events(&numbered(4));
        assert_eq!(view.len(), 6);
        assert_eq!(&view.lines()[..2], snapshot.as_slice());
    }

    #[test]
    fn follows_newest_content_after_each_batch() {
        let mut view = LogView::new(3);
        view.append_events(&numbered(10));
        assert_eq!(view.visible(), ["line 7", "line 8", "line 9"]);

        view.append_text("done");
        assert_eq!(view.visible().last().map(String::as_str), Some("done"));
    }

    #[test]
    fn scrolling_up_pauses_follow_until_bottom_is_reached() {
        let mut view = LogView::new(2);
        view.append_events(&numbered(6));
        view.scroll_up(3);
        assert!(!view.is_following());
        assert_eq!(view.visible(), ["line 1", "line 2"]);

        view.append_events(&numbered(1));
        assert_eq!(view.visible(), ["line 1", "line 2"]);

        view.scroll_down(100);
        assert!(view.is_following());
        assert_eq!(view.visible(), ["line 5", "line 0"]);
    }

    #[test]
    fn multi_line_events_expand_into_rows() {
        let mut view = LogView::default();
        let added = view.append_events(&[LogEvent::runner(
            LogLevel::Error,
            "Traceback:\n  frame 1\n  frame 2",
        )]);
        assert_eq!(added, 3);
        assert!(view.lines()[0].ends_with("| ERROR | Traceback:"));
        assert_eq!(view.lines()[2], "  frame 2");
    }
}
