//! Line-level structural index of a YAML values document
//!
//! The index records where each block-mapping entry lives in the source
//! text: its key, the byte span of its value, its indentation and any
//! trailing comment on the key line. Edits are planned against these spans
//! so the untouched parts of the text are never re-encoded.
//!
//! Only block mappings are modelled. Sequences, block scalars, flow
//! collections and multi-line plain scalars are recorded as opaque spans.

use std::ops::Range;

/// Classification of one physical line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LineKind {
    Blank,
    Comment,
    /// `---`, `...` or a `%` directive at column zero
    Marker,
    Content,
}

/// One physical line of the source
#[derive(Debug, Clone, Copy)]
pub(crate) struct Line {
    pub(crate) start: usize,
    /// Content end, excluding `\n` and `\r`
    pub(crate) end: usize,
    pub(crate) indent: usize,
    pub(crate) kind: LineKind,
}

/// A block mapping
#[derive(Debug, Clone)]
pub(crate) struct MappingNode {
    pub(crate) indent: usize,
    pub(crate) entries: Vec<Entry>,
}

impl MappingNode {
    /// End offset of the last entry's region
    pub(crate) fn end(&self) -> usize {
        self.entries.last().map_or(0, |e| e.end)
    }

    pub(crate) fn find(&self, key: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.key == key)
    }
}

/// One `key: value` entry of a block mapping
#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) key: String,
    /// Offset right after the `:` separator
    pub(crate) colon_end: usize,
    /// End of the key line content (comment included)
    pub(crate) line_end: usize,
    /// Trailing comment on the key line, `#` included
    pub(crate) comment: Option<Range<usize>>,
    /// End of the last content line belonging to this entry
    pub(crate) end: usize,
    pub(crate) value: ValueNode,
}

/// Shape of an entry's value
#[derive(Debug, Clone)]
pub(crate) enum ValueNode {
    /// Nothing after the colon and no nested lines
    Empty,
    /// Single-line scalar or flow collection on the key line
    Inline { span: Range<usize>, flow: bool },
    /// Nested block mapping
    Mapping(MappingNode),
    /// Anything the index does not model; span runs from the colon to `end`
    Opaque,
}

/// Root of the document
#[derive(Debug, Clone)]
pub(crate) enum Root {
    /// No content lines at all
    Empty,
    Mapping(MappingNode),
    /// Content that is not a block mapping, covering `span`
    Opaque { span: Range<usize> },
}

/// Structural index over a source text
#[derive(Debug, Clone)]
pub(crate) struct DocumentIndex {
    pub(crate) root: Root,
    /// Smallest indentation step seen between nested mappings
    pub(crate) indent_step: Option<usize>,
    /// Line terminator used by the source
    pub(crate) newline: &'static str,
}

impl DocumentIndex {
    /// Build the index for `source`
    pub(crate) fn build(source: &str) -> Self {
        let lines = split_lines(source);
        let newline = if source.contains("\r\n") { "\r\n" } else { "\n" };
        let mut builder = Builder {
            source,
            lines: &lines,
            indent_step: None,
        };

        let content: Vec<usize> = (0..lines.len())
            .filter(|&i| lines[i].kind == LineKind::Content)
            .collect();
        let root = match (content.first(), content.last()) {
            (Some(&first), Some(&last)) => {
                let indent = lines[first].indent;
                match builder.mapping(first..last + 1, indent) {
                    Some(mapping) => Root::Mapping(mapping),
                    None => Root::Opaque {
                        span: lines[first].start + lines[first].indent..lines[last].end,
                    },
                }
            }
            _ => Root::Empty,
        };

        Self {
            root,
            indent_step: builder.indent_step,
            newline,
        }
    }
}

struct Builder<'a> {
    source: &'a str,
    lines: &'a [Line],
    indent_step: Option<usize>,
}

impl Builder<'_> {
    /// Parse lines in `range` as a block mapping at `indent`
    fn mapping(&mut self, range: Range<usize>, indent: usize) -> Option<MappingNode> {
        let mut entries = Vec::new();
        let mut i = range.start;

        while i < range.end {
            let line = self.lines[i];
            if line.kind != LineKind::Content {
                if line.kind == LineKind::Marker && i != range.start && !entries.is_empty() {
                    return None;
                }
                i += 1;
                continue;
            }
            if line.indent != indent {
                return None;
            }

            let text = &self.source[line.start + indent..line.end];
            let header = parse_entry_header(text)?;
            let colon_end = line.start + indent + header.colon_end;
            let after = &self.source[colon_end..line.end];
            let (value_span, comment) = split_value_and_comment(after, colon_end);
            let inline_empty = value_span.is_empty();

            // Claim following lines that belong to this entry.
            let mut j = i + 1;
            let mut last_content = i;
            while j < range.end {
                let next = self.lines[j];
                match next.kind {
                    LineKind::Content => {
                        let nested = next.indent > indent
                            || (next.indent == indent
                                && inline_empty
                                && is_sequence_item(&self.source[next.start + next.indent..next.end]));
                        if !nested {
                            break;
                        }
                        last_content = j;
                    }
                    LineKind::Marker => break,
                    LineKind::Blank | LineKind::Comment => {}
                }
                j += 1;
            }

            let source = self.source;
            let inline = &source[value_span.clone()];
            let value = if last_content == i {
                if inline_empty {
                    ValueNode::Empty
                } else {
                    classify_inline(inline, value_span.clone())
                }
            } else if inline_empty {
                self.nested(i + 1..last_content + 1, indent)
            } else {
                ValueNode::Opaque
            };

            let content_end = self.lines[last_content].end;
            let end = match &value {
                ValueNode::Mapping(child) => child.end().max(content_end),
                _ if keeps_trailing_breaks(inline) => self.trailing_blank_end(last_content),
                _ => content_end,
            };

            entries.push(Entry {
                key: header.key,
                colon_end,
                line_end: line.end,
                comment,
                end,
                value,
            });
            i = last_content + 1;
        }

        if entries.is_empty() {
            None
        } else {
            Some(MappingNode { indent, entries })
        }
    }

    /// End of the blank lines directly after line `last`
    ///
    /// A keep-chomped block scalar owns these lines.
    fn trailing_blank_end(&self, last: usize) -> usize {
        self.lines[last + 1..]
            .iter()
            .take_while(|line| line.kind == LineKind::Blank)
            .last()
            .unwrap_or(&self.lines[last])
            .end
    }

    /// Classify the nested lines under an entry with an empty inline value
    fn nested(&mut self, range: Range<usize>, parent_indent: usize) -> ValueNode {
        let Some(first) = (range.start..range.end).find(|&k| self.lines[k].kind == LineKind::Content)
        else {
            return ValueNode::Opaque;
        };
        let line = self.lines[first];
        if is_sequence_item(&self.source[line.start + line.indent..line.end]) {
            return ValueNode::Opaque;
        }
        match self.mapping(first..range.end, line.indent) {
            Some(mapping) => {
                let step = line.indent - parent_indent;
                self.indent_step = Some(self.indent_step.map_or(step, |s| s.min(step)));
                ValueNode::Mapping(mapping)
            }
            None => ValueNode::Opaque,
        }
    }
}

fn classify_inline(text: &str, span: Range<usize>) -> ValueNode {
    match text.as_bytes().first() {
        Some(b'[' | b'{') => ValueNode::Inline { span, flow: true },
        // Block scalar headers, anchors, tags and aliases are left alone.
        Some(b'|' | b'>' | b'&' | b'!' | b'*') => ValueNode::Opaque,
        _ => ValueNode::Inline { span, flow: false },
    }
}

/// Split leading node properties (`&anchor`, `!tag`) from the rest of a value
pub(crate) fn split_properties(text: &str) -> (&str, &str) {
    let mut end = 0;
    loop {
        let rest = &text[end..];
        let trimmed = rest.trim_start();
        if !trimmed.starts_with(['&', '!']) {
            break;
        }
        let token = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        end += rest.len() - trimmed.len() + token;
    }
    (text[..end].trim_start(), text[end..].trim_start())
}

/// Check for a block scalar header with the `+` chomping indicator
fn keeps_trailing_breaks(value: &str) -> bool {
    let (_, rest) = split_properties(value);
    let header = rest.split_whitespace().next().unwrap_or("");
    header.starts_with(['|', '>']) && header.contains('+')
}

/// Split the text after a colon into the value span and the comment span
///
/// Both spans are absolute offsets; `base` is the offset of `after`.
fn split_value_and_comment(after: &str, base: usize) -> (Range<usize>, Option<Range<usize>>) {
    let comment_at = find_comment_start(after);
    let value_part = &after[..comment_at.unwrap_or(after.len())];
    let leading = value_part.len() - value_part.trim_start().len();
    let trimmed_len = value_part.trim().len();
    let start = base + leading;
    let value_span = start..start + trimmed_len;
    let comment = comment_at.map(|c| {
        let text = after[c..].trim_end();
        base + c..base + c + text.len()
    });
    (value_span, comment)
}

/// Find the byte offset of a `#` comment that is not inside quotes
pub(crate) fn find_comment_start(text: &str) -> Option<usize> {
    #[derive(PartialEq)]
    enum State {
        Plain,
        Double,
        Single,
    }

    let bytes = text.as_bytes();
    let mut state = State::Plain;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match state {
            State::Plain => {
                let token_start = i == 0
                    || matches!(bytes[i - 1], b' ' | b'\t' | b'[' | b'{' | b',' | b':');
                match b {
                    b'#' if i == 0 || matches!(bytes[i - 1], b' ' | b'\t') => return Some(i),
                    b'"' if token_start => state = State::Double,
                    b'\'' if token_start => state = State::Single,
                    _ => {}
                }
            }
            State::Double => match b {
                b'\\' => i += 1,
                b'"' => state = State::Plain,
                _ => {}
            },
            State::Single => {
                if b == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 1;
                    } else {
                        state = State::Plain;
                    }
                }
            }
        }
        i += 1;
    }
    None
}

struct EntryHeader {
    key: String,
    /// Offset right after the colon, relative to the line content
    colon_end: usize,
}

/// Parse `key:` at the start of a content line
fn parse_entry_header(text: &str) -> Option<EntryHeader> {
    let first = *text.as_bytes().first()?;
    if is_sequence_item(text) || text == "?" || text.starts_with("? ") {
        return None;
    }

    let (key, after_key) = match first {
        b'"' | b'\'' => {
            let close = closing_quote(text, first)?;
            let quoted = &text[..=close];
            let key: String = serde_yaml::from_str(quoted).ok()?;
            (key, close + 1)
        }
        b'[' | b'{' | b'#' | b'&' | b'*' | b'!' | b'|' | b'>' | b'%' | b'@' | b'`' => return None,
        _ => {
            let colon = plain_key_colon(text)?;
            let key = text[..colon].trim_end();
            if key.is_empty() || find_comment_start(key).is_some() {
                return None;
            }
            (key.to_string(), colon)
        }
    };

    let rest = &text[after_key..];
    let spaces = rest.len() - rest.trim_start_matches([' ', '\t']).len();
    let rest = &rest[spaces..];
    if !rest.starts_with(':') || !separator_follows(rest, 0) {
        return None;
    }
    Some(EntryHeader {
        key,
        colon_end: after_key + spaces + 1,
    })
}

fn plain_key_colon(text: &str) -> Option<usize> {
    text.char_indices()
        .find(|&(i, c)| c == ':' && separator_follows(text, i))
        .map(|(i, _)| i)
}

fn separator_follows(text: &str, colon: usize) -> bool {
    matches!(text.as_bytes().get(colon + 1), None | Some(b' ' | b'\t'))
}

fn closing_quote(text: &str, quote: u8) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' if quote == b'"' => i += 1,
            b if b == quote => {
                if quote == b'\'' && bytes.get(i + 1) == Some(&b'\'') {
                    i += 1;
                } else {
                    return Some(i);
                }
            }
            _ => {}
        }
        i += 1;
    }
    None
}

fn is_sequence_item(text: &str) -> bool {
    text == "-" || text.starts_with("- ") || text.starts_with("-\t")
}

fn split_lines(source: &str) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut start = if source.starts_with('\u{feff}') {
        '\u{feff}'.len_utf8()
    } else {
        0
    };
    while start < source.len() {
        let newline = source[start..].find('\n').map(|n| start + n);
        let mut end = newline.unwrap_or(source.len());
        if end > start && source.as_bytes()[end - 1] == b'\r' {
            end -= 1;
        }
        lines.push(classify_line(source, start, end));
        start = newline.map_or(source.len(), |n| n + 1);
    }
    lines
}

fn classify_line(source: &str, start: usize, end: usize) -> Line {
    let text = &source[start..end];
    let indent = text.len() - text.trim_start_matches(' ').len();
    let body = text[indent..].trim_end();
    let kind = if body.is_empty() {
        LineKind::Blank
    } else if body.starts_with('#') {
        LineKind::Comment
    } else if indent == 0
        && (body == "---"
            || body.starts_with("--- ")
            || body == "..."
            || body.starts_with('%'))
    {
        LineKind::Marker
    } else {
        LineKind::Content
    };
    Line {
        start,
        end,
        indent,
        kind,
    }
}
