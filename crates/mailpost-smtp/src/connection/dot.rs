//! Dot-stuffing for the DATA phase (RFC 5321 Section 4.5.2).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Begin,
    BeginLine,
    CarriageReturn,
    Data,
}

/// Incremental dot-stuffing encoder.
///
/// Doubles a `.` at the start of every line and turns bare `\n` into
/// `\r\n`. Input may be split at any byte boundary across calls.
#[derive(Debug, Clone)]
pub struct DotStuffer {
    state: State,
}

impl Default for DotStuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl DotStuffer {
    /// Creates an encoder positioned at the start of the message.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: State::Begin,
        }
    }

    /// Encodes `input`, appending the result to `out`.
    pub fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len());
        for &c in input {
            match self.state {
                State::Begin | State::BeginLine => {
                    if c == b'.' {
                        out.push(b'.');
                    }
                    self.data_byte(c, out);
                }
                State::CarriageReturn if c == b'\n' => self.state = State::BeginLine,
                State::CarriageReturn | State::Data => self.data_byte(c, out),
            }
            out.push(c);
        }
    }

    fn data_byte(&mut self, c: u8, out: &mut Vec<u8>) {
        self.state = match c {
            b'\r' => State::CarriageReturn,
            b'\n' => {
                out.push(b'\r');
                State::BeginLine
            }
            _ => State::Data,
        };
    }

    /// Appends the end-of-data marker, completing a partial last line.
    pub fn finish(self, out: &mut Vec<u8>) {
        match self.state {
            State::Begin | State::Data => out.extend_from_slice(b"\r\n.\r\n"),
            State::CarriageReturn => out.extend_from_slice(b"\n.\r\n"),
            State::BeginLine => out.extend_from_slice(b".\r\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stuff(chunks: &[&[u8]]) -> Vec<u8> {
        let mut enc = DotStuffer::new();
        let mut out = Vec::new();
        for chunk in chunks {
            enc.encode(chunk, &mut out);
        }
        enc.finish(&mut out);
        out
    }

    #[test]
    fn test_leading_dots_doubled() {
        assert_eq!(
            stuff(&[b".hidden\r\nline\r\n..two\r\n"]),
            b"..hidden\r\nline\r\n...two\r\n.\r\n"
        );
    }

    #[test]
    fn test_bare_lf_normalized() {
        assert_eq!(stuff(&[b"a\nb\n"]), b"a\r\nb\r\n.\r\n");
        assert_eq!(stuff(&[b"a\n.b"]), b"a\r\n..b\r\n.\r\n");
    }

    #[test]
    fn test_unterminated_last_line() {
        assert_eq!(stuff(&[b"no newline"]), b"no newline\r\n.\r\n");
        assert_eq!(stuff(&[b"ends with cr\r"]), b"ends with cr\r\n.\r\n");
    }

    #[test]
    fn test_empty_body() {
        assert_eq!(stuff(&[]), b"\r\n.\r\n");
    }

    #[test]
    fn test_split_across_writes() {
        assert_eq!(stuff(&[b"line\r", b"\n", b".", b"dot\r\n"]), b"line\r\n..dot\r\n.\r\n");
        assert_eq!(stuff(&[b"x\r\n"]), stuff(&[b"x", b"\r", b"\n"]));
    }

    #[test]
    fn test_dot_mid_line_untouched() {
        assert_eq!(stuff(&[b"a.b\r\n"]), b"a.b\r\n.\r\n");
    }
}
