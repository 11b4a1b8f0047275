//! Stateful parser for framed client-to-server messages.
//!
//! A [`Decoder`] is owned by a single [`crate::engine::session::Session`] —
//! its prepared-statement and portal tables are per session, never shared
//! (the process-global tables in the original implementation were both a
//! correctness bug and a synchronization hazard). Parsing is advisory: a
//! malformed frame stops the current call and is swallowed; it never
//! affects what gets forwarded to the backend.

pub mod frame;
pub mod params;

use ahash::AHashMap;

use frame::{Frame, FrameReader};

const TAG_QUERY: u8 = b'Q';
const TAG_PARSE: u8 = b'P';
const TAG_BIND: u8 = b'B';
const TAG_EXECUTE: u8 = b'E';

/// Per-session decoder state.
#[derive(Default)]
pub struct Decoder {
    reader: FrameReader,
    prepared_statements: AHashMap<String, String>,
    portal_to_statement: AHashMap<String, String>,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes as many complete frames as possible from `data` and returns
    /// the human-readable log lines, in wire order. Any trailing partial
    /// frame is buffered for the next call.
    pub fn parse_client_message(&mut self, data: &[u8]) -> Vec<String> {
        let frames = self.reader.feed(data);
        let mut lines = Vec::new();
        for frame in frames {
            if let Some(line) = self.handle_frame(frame) {
                lines.push(line);
            }
        }
        lines
    }

    fn handle_frame(&mut self, frame: Frame) -> Option<String> {
        match frame.tag {
            TAG_QUERY => self.handle_query(&frame.payload),
            TAG_PARSE => self.handle_parse(&frame.payload),
            TAG_BIND => self.handle_bind(&frame.payload),
            TAG_EXECUTE => self.handle_execute(&frame.payload),
            // Sync / Terminate / Close / Describe / Flush / Function-call and any
            // unrecognized tag: accepted and skipped, no emission.
            _ => None,
        }
    }

    fn handle_query(&mut self, payload: &[u8]) -> Option<String> {
        let (query, _) = read_cstr(payload)?;
        if query.is_empty() {
            return None;
        }
        Some(format!("[QUERY] {query}"))
    }

    fn handle_parse(&mut self, payload: &[u8]) -> Option<String> {
        let (name, name_len) = read_cstr(payload)?;
        let (query, _) = read_cstr(&payload[name_len..])?;
        if query.is_empty() {
            return None;
        }
        self.prepared_statements.insert(name.clone(), query.clone());
        Some(format!("[PREPARE] {name}: {query}"))
    }

    fn handle_bind(&mut self, payload: &[u8]) -> Option<String> {
        let (portal, portal_len) = read_cstr(payload)?;
        let (statement, stmt_len) = read_cstr(&payload[portal_len..])?;
        self.portal_to_statement
            .insert(portal.clone(), statement.clone());

        let params_start = portal_len + stmt_len;
        if params_start < payload.len() {
            let params = params::decode_parameters(&payload[params_start..]);
            tracing::trace!(%portal, %statement, %params, "bind");
        }
        None
    }

    fn handle_execute(&mut self, payload: &[u8]) -> Option<String> {
        let portal = match read_cstr(payload) {
            Some((portal, _)) => portal,
            None => String::from_utf8_lossy(payload).into_owned(),
        };

        match self.portal_to_statement.get(&portal) {
            Some(statement) => match self.prepared_statements.get(statement) {
                Some(query) => Some(format!("[EXECUTE] {portal} \u{2192} {statement}: {query}")),
                None => Some(format!(
                    "[EXECUTE] {portal} \u{2192} unknown statement: '{statement}'"
                )),
            },
            None => Some(format!("[EXECUTE] unknown portal: '{portal}'")),
        }
    }
}

/// Reads a NUL-terminated string, returning it and the number of bytes
/// consumed (including the terminator). Returns `None` if no NUL is found —
/// a malformed frame the caller should abandon rather than guess at.
fn read_cstr(data: &[u8]) -> Option<(String, usize)> {
    let nul_pos = data.iter().position(|&b| b == 0)?;
    let s = String::from_utf8_lossy(&data[..nul_pos]).into_owned();
    Some((s, nul_pos + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(tag);
        out.extend_from_slice(&((payload.len() + 4) as u32).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn cstr(s: &str) -> Vec<u8> {
        let mut out = s.as_bytes().to_vec();
        out.push(0);
        out
    }

    #[test]
    fn simple_query_is_logged() {
        let mut decoder = Decoder::new();
        let wire = frame(b'Q', &cstr("SELECT 1;"));
        let lines = decoder.parse_client_message(&wire);
        assert_eq!(lines, vec!["[QUERY] SELECT 1;"]);
    }

    #[test]
    fn empty_query_is_not_logged() {
        let mut decoder = Decoder::new();
        let wire = frame(b'Q', &cstr(""));
        let lines = decoder.parse_client_message(&wire);
        assert!(lines.is_empty());
    }

    #[test]
    fn parse_bind_execute_round_trip() {
        let mut decoder = Decoder::new();

        let mut parse_payload = cstr("s1");
        parse_payload.extend_from_slice(&cstr("SELECT $1"));
        let parse_wire = frame(b'P', &parse_payload);

        let mut bind_payload = cstr("p1");
        bind_payload.extend_from_slice(&cstr("s1"));
        bind_payload.extend_from_slice(&1u16.to_be_bytes());
        bind_payload.push(0x01);
        bind_payload.extend_from_slice(&2u32.to_be_bytes());
        bind_payload.extend_from_slice(b"42");
        let bind_wire = frame(b'B', &bind_payload);

        let execute_wire = frame(b'E', &cstr("p1"));

        let mut wire = parse_wire;
        wire.extend_from_slice(&bind_wire);
        wire.extend_from_slice(&execute_wire);

        let lines = decoder.parse_client_message(&wire);
        assert_eq!(
            lines,
            vec!["[PREPARE] s1: SELECT $1", "[EXECUTE] p1 \u{2192} s1: SELECT $1"]
        );
    }

    #[test]
    fn execute_without_bind_reports_unknown_portal() {
        let mut decoder = Decoder::new();
        let wire = frame(b'E', &cstr("ghost"));
        let lines = decoder.parse_client_message(&wire);
        assert_eq!(lines, vec!["[EXECUTE] unknown portal: 'ghost'"]);
    }

    #[test]
    fn execute_with_unknown_statement() {
        let mut decoder = Decoder::new();

        let mut bind_payload = cstr("p1");
        bind_payload.extend_from_slice(&cstr("never-prepared"));
        decoder.parse_client_message(&frame(b'B', &bind_payload));

        let lines = decoder.parse_client_message(&frame(b'E', &cstr("p1")));
        assert_eq!(
            lines,
            vec!["[EXECUTE] p1 \u{2192} unknown statement: 'never-prepared'"]
        );
    }

    #[test]
    fn truncated_frame_forwards_but_does_not_log_until_complete() {
        let mut decoder = Decoder::new();
        let wire = frame(b'Q', &cstr("SELECT 1;"));
        let (first, second) = wire.split_at(wire.len() - 3);

        assert!(decoder.parse_client_message(first).is_empty());
        assert_eq!(
            decoder.parse_client_message(second),
            vec!["[QUERY] SELECT 1;"]
        );
    }

    #[test]
    fn sessions_do_not_share_prepared_statements() {
        let mut a = Decoder::new();
        let mut b = Decoder::new();

        let mut parse_a = cstr("s1");
        parse_a.extend_from_slice(&cstr("SELECT 'a'"));
        a.parse_client_message(&frame(b'P', &parse_a));

        let mut parse_b = cstr("s1");
        parse_b.extend_from_slice(&cstr("SELECT 'b'"));
        b.parse_client_message(&frame(b'P', &parse_b));

        let mut bind_a = cstr("p");
        bind_a.extend_from_slice(&cstr("s1"));
        a.parse_client_message(&frame(b'B', &bind_a));

        let mut bind_b = cstr("p");
        bind_b.extend_from_slice(&cstr("s1"));
        b.parse_client_message(&frame(b'B', &bind_b));

        let lines_a = a.parse_client_message(&frame(b'E', &cstr("p")));
        let lines_b = b.parse_client_message(&frame(b'E', &cstr("p")));

        assert_eq!(lines_a, vec!["[EXECUTE] p \u{2192} s1: SELECT 'a'"]);
        assert_eq!(lines_b, vec!["[EXECUTE] p \u{2192} s1: SELECT 'b'"]);
    }
}
