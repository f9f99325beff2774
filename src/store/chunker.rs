//! Deterministic document chunker.
//!
//! Splits a body into overlapping windows, cutting at the best natural
//! boundary found in the last 30% of each window: paragraph break, then
//! sentence end, then line break, then word break, else a hard cut.

/// Default chunk size in characters (~800 tokens).
pub const DEFAULT_CHUNK_SIZE: usize = 3200;
/// Default overlap in characters (15%).
pub const DEFAULT_CHUNK_OVERLAP: usize = 480;

/// One chunk of a document body.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    pub text: String,
    /// Byte offset of the chunk start in the body.
    pub pos: usize,
}

/// Split a body into overlapping chunks. Whitespace-only chunks are elided.
///
/// Zero-valued parameters fall back to the defaults. Chunk starts are
/// strictly increasing and every chunk is an exact substring of the body at
/// its recorded position.
pub fn chunk_document(content: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<Chunk> {
    let chunk_size = if chunk_size == 0 {
        DEFAULT_CHUNK_SIZE
    } else {
        chunk_size
    };
    let chunk_overlap = if chunk_overlap == 0 {
        DEFAULT_CHUNK_OVERLAP
    } else {
        chunk_overlap
    };

    let len = content.len();
    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < len {
        let end = floor_char_boundary(content, (start + chunk_size).min(len));
        let break_pos = find_break_point(content, start, end);

        let text = &content[start..break_pos];
        if !text.trim().is_empty() {
            chunks.push(Chunk {
                text: text.to_string(),
                pos: start,
            });
        }

        if break_pos >= len {
            break;
        }

        // Advance with overlap, but never move backwards or stall
        let mut next = floor_char_boundary(content, break_pos.saturating_sub(chunk_overlap));
        if next <= start {
            next = break_pos;
        }
        start = next;
    }

    chunks
}

/// Find the best cut position in `[start, end)`, searching only the last 30%
/// of the window so every chunk keeps at least 70% of its target size.
fn find_break_point(content: &str, start: usize, end: usize) -> usize {
    if end >= content.len() {
        return content.len();
    }

    let mut search_start = start + (end - start) * 7 / 10;
    if search_start < start {
        search_start = start;
    }
    search_start = ceil_char_boundary(content, search_start);
    let window = &content[search_start..end];

    // 1. Paragraph break — cut after the blank line
    if let Some(idx) = window.rfind("\n\n") {
        return search_start + idx + 2;
    }

    // 2. Sentence end followed by newline or space — cut after the terminator
    let mut best: Option<usize> = None;
    for ending in [".\n", "!\n", "?\n", ". ", "! ", "? "] {
        if let Some(idx) = window.rfind(ending) {
            best = Some(best.map_or(idx, |b: usize| b.max(idx)));
        }
    }
    if let Some(idx) = best {
        return search_start + idx + 1;
    }

    // 3. Line break
    if let Some(idx) = window.rfind('\n') {
        return search_start + idx + 1;
    }

    // 4. Word break
    if let Some(idx) = window.rfind(' ') {
        return search_start + idx + 1;
    }

    // 5. Hard cut
    end
}

fn floor_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

fn ceil_char_boundary(s: &str, mut i: usize) -> usize {
    if i >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(i) {
        i += 1;
    }
    i
}
