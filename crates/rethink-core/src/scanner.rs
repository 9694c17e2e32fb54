/// Opening delimiter of a reasoning unit
pub const IDEA_OPEN: &str = "<idea>";
/// Closing delimiter of a reasoning unit
pub const IDEA_CLOSE: &str = "</idea>";
/// Prefix that triggers the final-answer guardrail as soon as it appears
pub const FINAL_ANSWER_PREFIX: &str = "<final_answer";
/// Full terminal-output delimiters, used for answer extraction
pub const FINAL_ANSWER_OPEN: &str = "<final_answer>";
pub const FINAL_ANSWER_CLOSE: &str = "</final_answer>";

/// A completed reasoning unit found in the generation buffer.
///
/// Offsets are byte positions into the buffer; `index` is assigned in the
/// order the closing delimiter was discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub body: String,
}

/// Incremental detector for completed units in a growing buffer.
///
/// The buffer only ever grows, so each scan resumes where the previous one
/// stopped instead of re-scanning from the start. A unit is reported exactly
/// once, when its closing delimiter first appears. The terminal marker is
/// tracked separately and is not a unit.
#[derive(Debug, Default)]
pub struct UnitScanner {
    resume_at: usize,
    marker_scan_from: usize,
    next_index: usize,
    final_marker_at: Option<usize>,
}

impl UnitScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scan the buffer for units completed since the last call.
    ///
    /// Units are returned in closing-delimiter order, ready for immediate
    /// dispatch - detection never batches or delays.
    pub fn scan(&mut self, buffer: &str) -> Vec<Unit> {
        let mut found = Vec::new();

        loop {
            let Some(open_rel) = buffer[self.resume_at..].find(IDEA_OPEN) else {
                break;
            };
            let start = self.resume_at + open_rel;
            let body_start = start + IDEA_OPEN.len();

            let Some(close_rel) = buffer[body_start..].find(IDEA_CLOSE) else {
                // Open tag without its close yet; retry from it next scan
                break;
            };
            let body_end = body_start + close_rel;
            let end = body_end + IDEA_CLOSE.len();

            found.push(Unit {
                index: self.next_index,
                start,
                end,
                body: buffer[body_start..body_end].trim().to_string(),
            });
            self.next_index += 1;
            self.resume_at = end;
        }

        if self.final_marker_at.is_none() {
            match buffer[self.marker_scan_from..].find(FINAL_ANSWER_PREFIX) {
                Some(rel) => self.final_marker_at = Some(self.marker_scan_from + rel),
                None => {
                    // A marker may be split across deltas; keep the last
                    // prefix-length minus one bytes rescannable.
                    let mut from = buffer.len().saturating_sub(FINAL_ANSWER_PREFIX.len() - 1);
                    while from > 0 && !buffer.is_char_boundary(from) {
                        from -= 1;
                    }
                    self.marker_scan_from = from.max(self.marker_scan_from);
                }
            }
        }

        found
    }

    /// Byte offset of the first terminal marker, once one has appeared.
    pub fn final_marker(&self) -> Option<usize> {
        self.final_marker_at
    }
}
