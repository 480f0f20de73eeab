use prism_core::directives::CONSTRAINT_BLOCK_TAG;
use prism_suggest::parse::find_constraint_block;

#[derive(Clone, Copy)]
enum Phase {
    /// Echoing text ahead of any block.
    Lead,
    /// Inside a possible block that opened at `start`.
    Block { start: usize },
    /// Past the block, skipping the whitespace that follows it.
    Gap { lead_shown: bool },
    /// Echoing the prose after the block.
    Tail,
}

/// Echoes a streamed reply while hiding the structured constraint block.
///
/// What ends up on screen matches `strip_constraint_block` on the full
/// reply. Text that could still turn into the block opener, and trailing
/// whitespace, is held back until later chunks decide it.
pub struct LiveReply {
    buffer: String,
    printed: usize,
    search_from: usize,
    phase: Phase,
    opener: String,
}

impl Default for LiveReply {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReply {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            printed: 0,
            search_from: 0,
            phase: Phase::Lead,
            opener: format!("```{CONSTRAINT_BLOCK_TAG}"),
        }
    }

    /// Feed one chunk; returns the text that is now safe to print.
    pub fn push(&mut self, chunk: &str) -> String {
        self.buffer.push_str(chunk);
        let mut out = String::new();
        loop {
            match self.phase {
                Phase::Lead => {
                    let found = self.buffer[self.search_from..]
                        .find(&self.opener)
                        .map(|at| self.search_from + at);
                    match found {
                        Some(start) => {
                            self.emit_trimmed(start, &mut out);
                            self.phase = Phase::Block { start };
                        }
                        None => {
                            let safe = self.buffer.len().saturating_sub(self.opener.len() - 1);
                            self.emit_trimmed(safe.max(self.printed), &mut out);
                            return out;
                        }
                    }
                }
                Phase::Block { start } => {
                    let after_tag = start + self.opener.len();
                    let Some(line_len) = self.buffer[after_tag..].find('\n') else {
                        return out;
                    };
                    if !self.buffer[after_tag..after_tag + line_len].trim().is_empty() {
                        // Some other fence that merely starts like ours
                        self.search_from = after_tag;
                        self.phase = Phase::Lead;
                        continue;
                    }
                    let Some(block) = find_constraint_block(&self.buffer[start..]) else {
                        return out;
                    };
                    let lead_shown = !self.buffer[..start].trim_end().is_empty();
                    self.printed = start + block.end;
                    self.phase = Phase::Gap { lead_shown };
                }
                Phase::Gap { lead_shown } => {
                    let rest = &self.buffer[self.printed..];
                    let skipped = rest.len() - rest.trim_start().len();
                    self.printed += skipped;
                    if self.printed == self.buffer.len() {
                        return out;
                    }
                    if lead_shown {
                        out.push_str("\n\n");
                    }
                    self.phase = Phase::Tail;
                }
                Phase::Tail => {
                    self.emit_trimmed(self.buffer.len(), &mut out);
                    return out;
                }
            }
        }
    }

    /// Whatever is still held back once the reply is complete.
    pub fn finish(&mut self) -> String {
        match self.phase {
            // No block, or one that never closed: the reply is shown as is
            Phase::Lead | Phase::Block { .. } => {
                let out = self.buffer[self.printed..].to_string();
                self.printed = self.buffer.len();
                out
            }
            Phase::Gap { .. } | Phase::Tail => String::new(),
        }
    }

    /// Emit `buffer[printed..until]` minus trailing whitespace, which stays
    /// held back.
    fn emit_trimmed(&mut self, until: usize, out: &mut String) {
        let mut until = until.min(self.buffer.len());
        while !self.buffer.is_char_boundary(until) {
            until -= 1;
        }
        if until <= self.printed {
            return;
        }
        let text = self.buffer[self.printed..until].trim_end();
        out.push_str(text);
        self.printed += text.len();
    }
}
